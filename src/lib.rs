pub mod chat;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod server;

pub use chat::{ChatResponseBuilder, ChatStreamEncoder, TranscriptRenderer};
pub use config::AppConfig;
pub use engine::{EngineHandle, StubTokenSource, TokenStreamSource};
pub use error::ServiceError;
pub use server::build_router;
