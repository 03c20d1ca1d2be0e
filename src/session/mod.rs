//! Sessions, messages, persistence contract, shared workspace

pub mod model;
pub mod store;
pub mod workspace;

pub use model::{
    MessageInfo, MessageRole, MessageWithParts, NewSession, Part, SessionInfo, ToolState,
    ToolStatus,
};
pub use store::{InMemorySessionStore, SessionStore};
pub use workspace::WorkspaceEnv;
