//! Tool registry
//!
//! Holds the tools available to the dispatch layer and filters them per
//! agent through the profile's enablement map.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::agents::AgentDefinition;
use crate::core::context::ToolContext;
use crate::core::error::{CoreError, CoreResult};

use super::tool::{Tool, ToolOutput};

/// Registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        tracing::debug!(tool = %name, "registering tool");
        self.tools.insert(name, Arc::new(tool));
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Names of tools enabled for an agent profile, sorted
    pub fn enabled_for(&self, agent: &AgentDefinition) -> Vec<String> {
        let mut names: Vec<String> = self
            .tools
            .keys()
            .filter(|name| agent.tool_enabled(name))
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Execute a tool by name
    pub async fn execute(
        &self,
        name: &str,
        input: Value,
        ctx: &ToolContext,
    ) -> CoreResult<ToolOutput> {
        let tool = self
            .get(name)
            .ok_or_else(|| CoreError::other(format!("Tool not found: {name}")))?;
        if !ctx.agent.tool_enabled(name) {
            return Err(CoreError::other(format!(
                "Tool {name} is disabled for agent {}",
                ctx.agent.name
            )));
        }
        tracing::info!(tool = %name, call = %ctx.call_id, "executing tool");
        tool.execute(input, ctx).await
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
