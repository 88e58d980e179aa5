/// Errors from the Sentence Splitter & chunkers (spec §4.5).
#[derive(Debug, thiserror::Error)]
pub enum ChunkingError {
    #[error("tokenizer failed: {0}")]
    Tokenizer(String),

    #[error("invalid chunker configuration: {0}")]
    InvalidConfig(String),
}
