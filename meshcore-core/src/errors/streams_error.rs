/// Errors from the Redis Streams Transport (spec §4.2).
#[derive(Debug, thiserror::Error)]
pub enum StreamsError {
    #[error("connection unhealthy, failing fast")]
    ConnectionUnhealthy,

    #[error("redis error: {0}")]
    Redis(String),

    #[error("operation cancelled before completion")]
    Cancelled,
}
