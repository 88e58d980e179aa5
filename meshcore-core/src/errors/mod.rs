mod breaker_error;
mod chunking_error;
mod context_error;
mod core_error;
mod credential_error;
mod crypto_error;
mod healing_error;
mod model_error;
mod session_error;
mod storage_error;
mod streams_error;

pub use breaker_error::BreakerError;
pub use chunking_error::ChunkingError;
pub use context_error::ContextError;
pub use core_error::{CoreError, CoreResult};
pub use credential_error::CredentialError;
pub use crypto_error::CryptoError;
pub use healing_error::HealingError;
pub use model_error::ModelError;
pub use session_error::SessionError;
pub use storage_error::StorageError;
pub use streams_error::StreamsError;
