//! Per-user document sessions: state, orchestration, and the in-memory registry.

mod registry;
mod service;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;

pub use registry::{SessionHandle, SessionRegistry};
pub use service::{DocumentSession, SessionServices};
pub use types::{
    ChatMessage, MessageRole, RelatedArticles, SessionError, SessionPhase, SessionSettings,
    SessionSnapshot, SessionState,
};
