//! Tool trait definition
//!
//! All tools implement this trait to provide a consistent interface to the
//! dispatch layer: a JSON-schema parameter description for the model, and an
//! execute method receiving validated input plus the per-call context.

use async_trait::async_trait;
use serde_json::Value;

use crate::core::context::ToolContext;
use crate::core::error::CoreResult;

/// Result of executing a tool
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Short human-readable title for the call
    pub title: String,
    /// Output returned to the model
    pub output: String,
    /// Structured metadata for the session/UI layer
    pub metadata: Value,
}

impl ToolOutput {
    pub fn new(title: impl Into<String>, output: impl Into<String>, metadata: Value) -> Self {
        Self {
            title: title.into(),
            output: output.into(),
            metadata,
        }
    }
}

/// Trait for tools the agent can invoke
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's name as exposed to the model
    fn name(&self) -> &str;

    /// One-line description of what the tool does
    fn description(&self) -> &str;

    /// JSON schema of the tool's parameters
    fn parameters(&self) -> Value;

    /// Execute the tool
    ///
    /// `input` has already been validated against the schema by the dispatch
    /// layer; tools still deserialize defensively and surface shape errors
    /// as typed failures.
    async fn execute(&self, input: Value, ctx: &ToolContext) -> CoreResult<ToolOutput>;
}
