//! Agent profile definitions
//!
//! An `AgentDefinition` binds a name to a permission rule set, a tool
//! enablement map, and optional model/prompt overrides. Definitions are
//! built once per configuration load by the registry and are immutable for
//! the lifetime of that load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::error::{CoreError, CoreResult};
use crate::permissions::{PermissionAction, Ruleset};

/// Where a profile can be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    /// Selectable as a session's top-level driver
    Primary,
    /// Invocable only through the task tool
    Subagent,
    /// Both
    All,
}

/// A provider/model binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    pub provider_id: String,
    pub model_id: String,
}

impl ModelRef {
    /// Parse a `provider/model` string
    pub fn parse(value: &str) -> CoreResult<Self> {
        match value.split_once('/') {
            Some((provider, model)) if !provider.is_empty() && !model.is_empty() => Ok(Self {
                provider_id: provider.to_string(),
                model_id: model.to_string(),
            }),
            _ => Err(CoreError::InvalidConfig(format!(
                "model must be \"provider/model\", got \"{value}\""
            ))),
        }
    }
}

/// A named agent persona
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub description: Option<String>,
    pub mode: AgentMode,
    /// Built-in profile (as opposed to purely configured)
    pub native: bool,
    /// Hidden profiles are resolvable but not offered for delegation
    pub hidden: bool,
    /// Effective permission rule set after all merges
    pub permission: Ruleset,
    /// Tool enablement map; an empty map inherits every registered tool
    pub tools: BTreeMap<String, bool>,
    pub model: Option<ModelRef>,
    pub prompt: Option<String>,
    /// Optional cap on model-inference steps per prompt
    pub steps: Option<u32>,
}

impl AgentDefinition {
    pub fn is_subagent(&self) -> bool {
        self.mode == AgentMode::Subagent
    }

    /// Whether this profile explicitly carries task (delegation) capability
    ///
    /// True when the rule set has a `task` kind whose wildcard evaluation is
    /// not deny. Targets without it get nested delegation denied in their
    /// child sessions.
    pub fn carries_task_capability(&self) -> bool {
        self.permission.has_kind("task")
            && self.permission.evaluate("task", "*") != PermissionAction::Deny
    }

    /// Whether a tool is enabled for this profile
    pub fn tool_enabled(&self, tool: &str) -> bool {
        self.tools.get(tool).copied().unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_ref_parse() {
        let model = ModelRef::parse("anthropic/claude-sonnet-4-5").unwrap();
        assert_eq!(model.provider_id, "anthropic");
        assert_eq!(model.model_id, "claude-sonnet-4-5");

        assert!(ModelRef::parse("no-slash").is_err());
        assert!(ModelRef::parse("/model").is_err());
        assert!(ModelRef::parse("provider/").is_err());
    }

    #[test]
    fn test_task_capability() {
        let mut permission = Ruleset::new();
        let mut agent = AgentDefinition {
            name: "t".into(),
            description: None,
            mode: AgentMode::All,
            native: false,
            hidden: false,
            permission: permission.clone(),
            tools: BTreeMap::new(),
            model: None,
            prompt: None,
            steps: None,
        };
        assert!(!agent.carries_task_capability());

        permission.insert("task", "*", PermissionAction::Allow);
        agent.permission = permission.clone();
        assert!(agent.carries_task_capability());

        permission.insert("task", "*", PermissionAction::Deny);
        agent.permission = permission;
        assert!(!agent.carries_task_capability());
    }

    #[test]
    fn test_tool_enablement_defaults_on() {
        let mut agent = AgentDefinition {
            name: "t".into(),
            description: None,
            mode: AgentMode::All,
            native: false,
            hidden: false,
            permission: Ruleset::new(),
            tools: BTreeMap::new(),
            model: None,
            prompt: None,
            steps: None,
        };
        assert!(agent.tool_enabled("bash"));
        agent.tools.insert("bash".into(), false);
        assert!(!agent.tool_enabled("bash"));
    }
}
