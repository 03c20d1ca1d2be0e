//! Agent profile registry
//!
//! Built-in profiles deep-merged with user configuration, built once per
//! configuration load. The default seed allows everything except the
//! always-gated kinds (`bash_sensitive`, `doom_loop`, external directories)
//! and the mode-switch tools; each profile layers its own rules on top, and
//! user configuration merges last.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::json;

use crate::config::CoreConfig;
use crate::core::error::{CoreError, CoreResult};
use crate::permissions::{PermissionConfig, Ruleset};

use super::definition::{AgentDefinition, AgentMode, ModelRef};

/// Resolves named agent profiles
pub struct AgentRegistry {
    agents: HashMap<String, Arc<AgentDefinition>>,
    default_agent: Option<String>,
}

fn rules(value: serde_json::Value) -> Ruleset {
    let config: PermissionConfig =
        serde_json::from_value(value).expect("built-in permission table");
    Ruleset::from_config(&config)
}

/// Seed shared by every profile
fn default_rules() -> Ruleset {
    rules(json!({
        "*": "allow",
        "bash": { "*": "allow" },
        "bash_sensitive": "ask",
        "doom_loop": "ask",
        "finding": "deny",
        "external_directory": { "*": "ask" },
        "plan_enter": "deny",
        "plan_exit": "deny",
        "read": {
            "*": "allow",
            "*.env": "ask",
            "*.env.*": "ask",
            "*.env.example": "allow",
        },
    }))
}

/// Edit rules shared by the engagement subagents: read-only except the
/// shared-workspace artifacts they are expected to maintain
fn engagement_edit_rules() -> serde_json::Value {
    json!({
        "*": "deny",
        "*/engagements/*/handoff.md": "allow",
        "*/engagements/*/agents/*/results.md": "allow",
        "*/engagements/*/reports/*": "allow",
    })
}

/// Safe inspection commands the planning profile may run without asking
const PLAN_SAFE_COMMANDS: &[&str] = &[
    "ls *", "cat *", "head *", "tail *", "grep *", "rg *", "find *", "which *", "pwd *", "wc *",
    "stat *", "file *", "du *", "df *", "ps *", "echo *", "git status *", "git log *",
    "git diff *", "git show *", "git branch *",
];

fn plan_bash_rules() -> serde_json::Value {
    let mut map = serde_json::Map::new();
    map.insert("*".to_string(), json!("ask"));
    for pattern in PLAN_SAFE_COMMANDS {
        map.insert(pattern.to_string(), json!("allow"));
    }
    serde_json::Value::Object(map)
}

struct Builtin {
    name: &'static str,
    description: &'static str,
    mode: AgentMode,
    hidden: bool,
    overlay: serde_json::Value,
}

fn builtins() -> Vec<Builtin> {
    let orchestrator_overlay = json!({
        "plan_enter": "allow",
        "task": "allow",
        "finding": "allow",
        "webfetch": "allow",
        "websearch": "allow",
    });
    let engagement_subagent_overlay = json!({
        "read": "allow",
        "list": "allow",
        "glob": "allow",
        "grep": "allow",
        "bash": "allow",
        "edit": engagement_edit_rules(),
        "finding": "allow",
        "webfetch": "allow",
        "websearch": "allow",
    });

    vec![
        Builtin {
            name: "build",
            description: "The default agent. Executes tools based on configured permissions.",
            mode: AgentMode::Primary,
            hidden: false,
            overlay: json!({ "plan_enter": "allow" }),
        },
        Builtin {
            name: "plan",
            description: "Plan mode. Safe inspection commands only; edits are disallowed.",
            mode: AgentMode::Primary,
            hidden: false,
            overlay: json!({
                "plan_exit": "allow",
                "bash": plan_bash_rules(),
                "edit": { "*": "deny", "*/plans/*.md": "allow" },
            }),
        },
        Builtin {
            name: "pentest",
            description: "Primary cyber orchestrator for internal authorized engagements. Coordinates recon, validation, evidence, and reporting.",
            mode: AgentMode::Primary,
            hidden: false,
            overlay: orchestrator_overlay.clone(),
        },
        Builtin {
            name: "pentest_flow",
            description: "Primary cyber orchestrator with guided intake. Starts with essential pentest questions, then plans and delegates.",
            mode: AgentMode::Primary,
            hidden: false,
            overlay: orchestrator_overlay.clone(),
        },
        Builtin {
            name: "pentest_auto",
            description: "Deprecated alias for pentest_flow.",
            mode: AgentMode::Primary,
            hidden: true,
            overlay: orchestrator_overlay,
        },
        Builtin {
            name: "recon",
            description: "Subagent for safe internal attack-surface discovery and enumeration.",
            mode: AgentMode::Subagent,
            hidden: false,
            overlay: engagement_subagent_overlay.clone(),
        },
        Builtin {
            name: "assess",
            description: "Subagent for validation, exploitability analysis, and impact triage.",
            mode: AgentMode::Subagent,
            hidden: false,
            overlay: engagement_subagent_overlay.clone(),
        },
        Builtin {
            name: "report",
            description: "Subagent for reporting, evidence normalization, and remediation framing.",
            mode: AgentMode::Subagent,
            hidden: false,
            overlay: engagement_subagent_overlay,
        },
        Builtin {
            name: "general",
            description: "General-purpose agent for researching complex questions and executing multi-step tasks.",
            mode: AgentMode::Subagent,
            hidden: false,
            overlay: json!({ "todoread": "deny", "todowrite": "deny" }),
        },
        Builtin {
            name: "explore",
            description: "Fast agent specialized for exploring codebases: finding files by pattern, searching code, answering questions about structure.",
            mode: AgentMode::Subagent,
            hidden: false,
            overlay: json!({
                "*": "deny",
                "grep": "allow",
                "glob": "allow",
                "list": "allow",
                "read": "allow",
                "bash": "allow",
                "webfetch": "allow",
                "websearch": "allow",
            }),
        },
        Builtin {
            name: "report_writer",
            description: "Final reporting specialist for full client-grade synthesis and deliverables.",
            mode: AgentMode::Subagent,
            hidden: false,
            overlay: json!({
                "read": "allow",
                "list": "allow",
                "glob": "allow",
                "grep": "allow",
                "bash": "allow",
                "edit": "allow",
                "write": "allow",
                "finding": "allow",
                "webfetch": "allow",
                "websearch": "allow",
                "task": "deny",
            }),
        },
    ]
}

impl AgentRegistry {
    /// Build the registry from configuration
    pub fn from_config(config: &CoreConfig) -> CoreResult<Self> {
        let defaults = default_rules();
        let user = Ruleset::from_config(&config.permission);

        let mut agents: HashMap<String, AgentDefinition> = HashMap::new();
        for builtin in builtins() {
            let overlay: PermissionConfig = serde_json::from_value(builtin.overlay)?;
            let permission = defaults
                .merged(&Ruleset::from_config(&overlay))
                .merged(&user);
            agents.insert(
                builtin.name.to_string(),
                AgentDefinition {
                    name: builtin.name.to_string(),
                    description: Some(builtin.description.to_string()),
                    mode: builtin.mode,
                    native: true,
                    hidden: builtin.hidden,
                    permission,
                    tools: BTreeMap::new(),
                    model: None,
                    prompt: None,
                    steps: None,
                },
            );
        }

        for (name, over) in &config.agent {
            if over.disable {
                agents.remove(name);
                continue;
            }
            let agent = agents.entry(name.clone()).or_insert_with(|| {
                // A configured name with no built-in counterpart becomes a
                // generic all-mode agent with an empty default toolset.
                AgentDefinition {
                    name: name.clone(),
                    description: None,
                    mode: AgentMode::All,
                    native: false,
                    hidden: false,
                    permission: defaults.merged(&user),
                    tools: BTreeMap::new(),
                    model: None,
                    prompt: None,
                    steps: None,
                }
            });
            if let Some(model) = &over.model {
                agent.model = Some(ModelRef::parse(model)?);
            }
            if let Some(description) = &over.description {
                agent.description = Some(description.clone());
            }
            if let Some(mode) = over.mode {
                agent.mode = mode;
            }
            if let Some(hidden) = over.hidden {
                agent.hidden = hidden;
            }
            if let Some(prompt) = &over.prompt {
                agent.prompt = Some(prompt.clone());
            }
            if let Some(steps) = over.steps {
                agent.steps = Some(steps);
            }
            for (tool, enabled) in &over.tools {
                agent.tools.insert(tool.clone(), *enabled);
            }
            agent.permission = agent
                .permission
                .merged(&Ruleset::from_config(&over.permission));
        }

        tracing::debug!(count = agents.len(), "agent registry built");
        Ok(Self {
            agents: agents
                .into_iter()
                .map(|(name, agent)| (name, Arc::new(agent)))
                .collect(),
            default_agent: config.default_agent.clone(),
        })
    }

    /// Resolve a profile by name
    ///
    /// Absence is a fatal caller error; callers map it to
    /// `CoreError::UnknownAgent` rather than ignoring it.
    pub fn resolve(&self, name: &str) -> Option<Arc<AgentDefinition>> {
        self.agents.get(name).cloned()
    }

    /// All profiles, sorted by name
    pub fn list(&self) -> Vec<Arc<AgentDefinition>> {
        let mut agents: Vec<_> = self.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.name.cmp(&b.name));
        agents
    }

    /// Profiles reachable through delegation (non-primary, not hidden)
    pub fn delegatable(&self) -> Vec<Arc<AgentDefinition>> {
        self.list()
            .into_iter()
            .filter(|a| a.mode != AgentMode::Primary && !a.hidden)
            .collect()
    }

    /// The profile driving new sessions
    ///
    /// A configured default must exist, be visible, and not be
    /// subagent-only; otherwise the first visible primary wins, preferring
    /// `build`.
    pub fn default_agent(&self) -> CoreResult<Arc<AgentDefinition>> {
        if let Some(name) = &self.default_agent {
            let agent = self
                .resolve(name)
                .ok_or_else(|| CoreError::InvalidConfig(format!("default agent \"{name}\" not found")))?;
            if agent.is_subagent() {
                return Err(CoreError::InvalidConfig(format!(
                    "default agent \"{name}\" is a subagent"
                )));
            }
            if agent.hidden {
                return Err(CoreError::InvalidConfig(format!(
                    "default agent \"{name}\" is hidden"
                )));
            }
            return Ok(agent);
        }
        if let Some(agent) = self.resolve("build") {
            return Ok(agent);
        }
        self.list()
            .into_iter()
            .find(|a| a.mode != AgentMode::Subagent && !a.hidden)
            .ok_or_else(|| CoreError::InvalidConfig("no primary visible agent found".into()))
    }
}
