mod handle;
mod stub;
mod types;

pub use handle::{EngineHandle, EngineState};
pub use stub::StubTokenSource;
pub use types::{
    GenerationRequest, GenerationSnapshot, PromptInput, SamplingOptions, SnapshotStream,
    TokenStreamSource,
};
