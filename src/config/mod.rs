//! Core configuration
//!
//! Everything enters through validating deserialization: unknown fields are
//! rejected, permission values are typed scalar-or-map unions, and model
//! strings parse at the boundary. The structs here are the only way user
//! configuration reaches the registry and the tools.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::agents::definition::AgentMode;
use crate::permissions::PermissionConfig;

/// Default shell when neither config nor `$SHELL` names one
const FALLBACK_SHELL: &str = "/bin/bash";
/// Default per-call command timeout
const DEFAULT_TIMEOUT_MS: u64 = 120_000;
/// Default captured-output ceiling in characters
const DEFAULT_MAX_OUTPUT: usize = 30_000;

/// Top-level configuration for the execution core
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoreConfig {
    /// Name of the agent driving new sessions (default: `build`)
    pub default_agent: Option<String>,
    /// Per-agent overrides, keyed by agent name
    #[serde(default)]
    pub agent: BTreeMap<String, AgentOverride>,
    /// Global permission overrides, merged into every profile last
    #[serde(default)]
    pub permission: PermissionConfig,
    /// Process execution knobs
    #[serde(default)]
    pub exec: ExecConfig,
    #[serde(default)]
    pub experimental: ExperimentalConfig,
}

/// Configured override for one agent profile
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentOverride {
    /// Remove the agent entirely
    #[serde(default)]
    pub disable: bool,
    pub description: Option<String>,
    pub mode: Option<AgentMode>,
    pub hidden: Option<bool>,
    /// `provider/model` string
    pub model: Option<String>,
    pub prompt: Option<String>,
    #[serde(default)]
    pub permission: PermissionConfig,
    /// Tool enablement overrides
    #[serde(default)]
    pub tools: BTreeMap<String, bool>,
    pub steps: Option<u32>,
}

/// Operator-tunable process execution settings
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecConfig {
    /// Shell executable; falls back to `$SHELL`, then `/bin/bash`
    pub shell: Option<String>,
    /// Default command timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Captured-output ceiling in characters
    pub max_output: Option<usize>,
}

impl ExecConfig {
    /// Resolve the shell executable to launch commands under
    pub fn shell(&self) -> String {
        if let Some(shell) = &self.shell {
            return shell.clone();
        }
        std::env::var("SHELL").unwrap_or_else(|_| FALLBACK_SHELL.to_string())
    }

    /// Resolve the default per-call timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }

    /// Resolve the output ceiling
    pub fn max_output(&self) -> usize {
        self.max_output.unwrap_or(DEFAULT_MAX_OUTPUT)
    }
}

/// Experimental knobs carried over from the original configuration surface
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentalConfig {
    /// Tools reserved for primary agents. Delegated child prompts run with
    /// them disabled; the matching permission grants are still seeded so a
    /// primary resuming the session can use them.
    #[serde(default)]
    pub primary_tools: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.exec.timeout(), Duration::from_millis(120_000));
        assert_eq!(config.exec.max_output(), 30_000);
        assert!(config.agent.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let config: CoreConfig = serde_json::from_value(serde_json::json!({
            "default_agent": "pentest",
            "agent": {
                "recon": { "model": "anthropic/claude-haiku-4-5", "steps": 30 },
                "explore": { "disable": true }
            },
            "permission": { "bash": { "git push *": "ask" } },
            "exec": { "shell": "/bin/zsh", "timeout_ms": 5000, "max_output": 1000 },
            "experimental": { "primary_tools": ["finding"] }
        }))
        .unwrap();

        assert_eq!(config.default_agent.as_deref(), Some("pentest"));
        assert!(config.agent["explore"].disable);
        assert_eq!(config.exec.shell(), "/bin/zsh");
        assert_eq!(config.exec.timeout(), Duration::from_millis(5000));
        assert_eq!(config.experimental.primary_tools, vec!["finding"]);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<CoreConfig, _> = serde_json::from_value(serde_json::json!({
            "defualt_agent": "build"
        }));
        assert!(result.is_err());

        let result: Result<CoreConfig, _> = serde_json::from_value(serde_json::json!({
            "agent": { "build": { "modle": "x/y" } }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_permission_shapes() {
        // Scalar and map permission values both deserialize.
        let config: CoreConfig = serde_json::from_value(serde_json::json!({
            "permission": { "webfetch": "deny", "bash": { "*": "allow" } }
        }))
        .unwrap();
        assert_eq!(config.permission.len(), 2);
    }
}
