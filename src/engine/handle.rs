use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::{
    engine::{GenerationRequest, SnapshotStream, TokenStreamSource},
    error::ServiceError,
};

/// Engine lifecycle. Requests are only admitted in `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Starting,
    Ready,
    Draining,
    Stopped,
}

impl EngineState {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineState::Starting => "starting",
            EngineState::Ready => "ready",
            EngineState::Draining => "draining",
            EngineState::Stopped => "stopped",
        }
    }
}

/// Explicit handle around the backing engine, constructed once at process
/// start and passed into the router state.
pub struct EngineHandle {
    source: Arc<dyn TokenStreamSource>,
    state: RwLock<EngineState>,
}

impl EngineHandle {
    pub fn new(source: Arc<dyn TokenStreamSource>) -> Self {
        Self {
            source,
            state: RwLock::new(EngineState::Starting),
        }
    }

    pub fn state(&self) -> EngineState {
        *self.state.read()
    }

    pub fn mark_ready(&self) {
        self.transition(EngineState::Ready);
    }

    pub fn begin_drain(&self) {
        self.transition(EngineState::Draining);
    }

    pub fn stop(&self) {
        self.transition(EngineState::Stopped);
    }

    fn transition(&self, next: EngineState) {
        let mut state = self.state.write();
        info!(from = state.as_str(), to = next.as_str(), "engine state transition");
        *state = next;
    }

    pub fn source(&self) -> &Arc<dyn TokenStreamSource> {
        &self.source
    }

    pub async fn healthy(&self) -> bool {
        self.state() == EngineState::Ready && self.source.health().await
    }

    pub async fn generate(&self, request: GenerationRequest) -> Result<SnapshotStream, ServiceError> {
        let state = self.state();
        if state != EngineState::Ready {
            return Err(ServiceError::EngineUnavailable(state.as_str().into()));
        }
        self.source.generate(request).await
    }
}
