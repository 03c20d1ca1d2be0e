//! Agent profiles and their registry

pub mod definition;
pub mod registry;

pub use definition::{AgentDefinition, AgentMode, ModelRef};
pub use registry::AgentRegistry;
