//! Task tool: delegation to specialized subagent sessions
//!
//! Resolves the target profile, gates delegation behind a `task` approval,
//! creates (or resumes) a child session seeded with restrictive rules,
//! mirrors the child's live tool activity onto the parent call's metadata,
//! and cascades cancellation. The child session is never deleted here; its
//! id is returned so a later call can resume it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;

use crate::agents::{AgentDefinition, AgentRegistry, ModelRef};
use crate::core::context::{Ask, ToolContext};
use crate::core::error::{CoreError, CoreResult};
use crate::core::id;
use crate::permissions::{PermissionAction, Ruleset};
use crate::runtime::bus::{BusEvent, EventBus};
use crate::runtime::driver::{PromptRequest, SessionDriver};
use crate::runtime::AbortOnDrop;
use crate::session::model::{MessageRole, NewSession, Part, SessionInfo, ToolStatus};
use crate::session::store::SessionStore;
use crate::session::workspace::{self, WorkspaceEnv};
use crate::tools::tool::{Tool, ToolOutput};

/// Task tool for delegating work to subagent sessions
pub struct TaskTool {
    agents: Arc<AgentRegistry>,
    store: Arc<dyn SessionStore>,
    driver: Arc<dyn SessionDriver>,
    bus: Arc<EventBus>,
    /// Tools reserved for primary agents, disabled in child sessions
    primary_tools: Vec<String>,
}

/// Input for the task tool
#[derive(Debug, Deserialize)]
struct TaskInput {
    /// A short (3-5 words) description of the task
    description: String,
    /// The task for the agent to perform
    prompt: String,
    /// The type of specialized agent to use
    subagent_type: String,
    /// Resume a previous task's session instead of creating a fresh one
    task_id: Option<String>,
    /// The command that triggered this task, when invoked via a command
    #[allow(dead_code)]
    command: Option<String>,
}

impl TaskTool {
    pub fn new(
        agents: Arc<AgentRegistry>,
        store: Arc<dyn SessionStore>,
        driver: Arc<dyn SessionDriver>,
        bus: Arc<EventBus>,
        primary_tools: Vec<String>,
    ) -> Self {
        Self {
            agents,
            store,
            driver,
            bus,
            primary_tools,
        }
    }

    /// Restrictive rules seeded into a fresh child session
    fn child_rules(&self, target: &AgentDefinition) -> Ruleset {
        let mut rules = Ruleset::new();
        rules.insert("todowrite", "*", PermissionAction::Deny);
        rules.insert("todoread", "*", PermissionAction::Deny);
        if !target.carries_task_capability() {
            rules.insert("task", "*", PermissionAction::Deny);
        }
        for tool in &self.primary_tools {
            rules.insert(tool.clone(), "*", PermissionAction::Allow);
        }
        rules
    }

    /// Tool enablement overrides for the child prompt
    fn child_tools(&self, target: &AgentDefinition) -> BTreeMap<String, bool> {
        let mut tools = BTreeMap::new();
        tools.insert("todowrite".to_string(), false);
        tools.insert("todoread".to_string(), false);
        if !target.carries_task_capability() {
            tools.insert("task".to_string(), false);
        }
        for tool in &self.primary_tools {
            tools.insert(tool.clone(), false);
        }
        tools
    }

    async fn select_session(
        &self,
        ctx: &ToolContext,
        input: &TaskInput,
        target: &AgentDefinition,
    ) -> CoreResult<SessionInfo> {
        if let Some(task_id) = &input.task_id {
            if let Ok(existing) = self.store.get(task_id).await {
                tracing::debug!(session = %existing.id, "resuming task session");
                return Ok(existing);
            }
        }
        self.store
            .create(NewSession {
                parent_id: Some(ctx.session_id.clone()),
                title: format!("{} (@{} subagent)", input.description, target.name),
                directory: None,
                permission: Some(self.child_rules(target)),
                workspace: None,
            })
            .await
    }

    /// The model binding for the child prompt: the target's own, or the one
    /// on the triggering assistant message
    async fn resolve_model(
        &self,
        ctx: &ToolContext,
        target: &AgentDefinition,
    ) -> CoreResult<ModelRef> {
        if let Some(model) = &target.model {
            return Ok(model.clone());
        }
        let messages = self.store.messages(&ctx.session_id).await?;
        messages
            .iter()
            .find(|m| m.info.id == ctx.message_id && m.info.role == MessageRole::Assistant)
            .and_then(|m| m.info.model.clone())
            .ok_or_else(|| CoreError::other("no model binding available for task"))
    }

    /// System-reminder block naming the workspace paths the child must use
    fn workspace_reminder(env: &WorkspaceEnv, child: &SessionInfo, target: &AgentDefinition) -> String {
        let mut lines = vec![
            "<system-reminder>".to_string(),
            "ENGAGEMENT SUBAGENT WORKSPACE CONTEXT".to_string(),
            format!("environment.root={}", env.root.display()),
            format!("finding.md={}", env.finding_path().display()),
            format!("handoff.md={}", env.handoff_path().display()),
            format!("results.md={}", env.results_path(&child.id).display()),
            "IMPORTANT: Paths may include spaces on this host. Always wrap absolute paths in double quotes in shell commands.".to_string(),
            format!("Example: ls -la \"{}\"", env.root.display()),
            "Do not overlap scope with parallel subagents.".to_string(),
            "Continuously update the findings log through the finding tool when validated.".to_string(),
            "Append handoff notes before finishing.".to_string(),
            "Write a concise completion summary to results.md before ending.".to_string(),
        ];
        if target.name == "report_writer" {
            lines.extend(
                [
                    "REPORT_WRITER STAGED WORKFLOW IS MANDATORY:",
                    "1) Explore all available engagement artifacts first.",
                    "2) Synthesize findings and create report-plan.md.",
                    "3) Build report-outline.md and report-draft.md in parts.",
                    "4) Produce results.md and remediation-plan.md.",
                    "5) Finalize by calling report_finalize.",
                ]
                .map(str::to_string),
            );
        }
        lines.push("</system-reminder>".to_string());
        lines.push(String::new());
        lines.join("\n")
    }
}

/// Flatten a tool part into its mirror/summary entry
fn summarize_part(part: &Part) -> Option<(String, Value)> {
    let Part::Tool {
        call_id,
        tool,
        state,
        ..
    } = part
    else {
        return None;
    };
    let title = if state.status == ToolStatus::Completed {
        state.title.clone()
    } else {
        None
    };
    Some((
        call_id.clone(),
        json!({
            "id": call_id,
            "tool": tool,
            "state": { "status": state.status, "title": title },
        }),
    ))
}

#[async_trait]
impl Tool for TaskTool {
    fn name(&self) -> &str {
        "task"
    }

    fn description(&self) -> &str {
        "Delegate a task to a specialized subagent running in its own session. Returns the subagent's final answer and a resumable task id."
    }

    fn parameters(&self) -> Value {
        let agents: Vec<String> = self
            .agents
            .delegatable()
            .iter()
            .map(|a| a.name.clone())
            .collect();
        json!({
            "type": "object",
            "properties": {
                "description": {
                    "type": "string",
                    "description": "A short (3-5 words) description of the task"
                },
                "prompt": {
                    "type": "string",
                    "description": "The task for the agent to perform"
                },
                "subagent_type": {
                    "type": "string",
                    "description": "The type of specialized agent to use for this task",
                    "enum": agents
                },
                "task_id": {
                    "type": "string",
                    "description": "Set only to resume a previous task; the task continues the same subagent session instead of creating a fresh one"
                },
                "command": {
                    "type": "string",
                    "description": "The command that triggered this task"
                }
            },
            "required": ["description", "prompt", "subagent_type"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> CoreResult<ToolOutput> {
        let input: TaskInput = serde_json::from_value(input)?;

        // Resolve before any approval or session exists.
        let target = self
            .agents
            .resolve(&input.subagent_type)
            .ok_or_else(|| CoreError::UnknownAgent(input.subagent_type.clone()))?;

        // Skip the gate when the user explicitly invoked the subagent.
        if !ctx.bypass_agent_check {
            ctx.ask(Ask {
                kind: "task".into(),
                patterns: vec![target.name.clone()],
                always: vec!["*".into()],
                title: input.description.clone(),
                metadata: json!({
                    "description": input.description,
                    "subagent_type": target.name,
                }),
            })
            .await?;
        }

        let session = self.select_session(ctx, &input, &target).await?;
        let parent = self.store.get(&ctx.session_id).await?;
        let environment = session.workspace.clone().or_else(|| parent.workspace.clone());
        if let Some(env) = &environment {
            workspace::ensure_shared_scaffold(env, &session.id).await?;
            workspace::ensure_subagent_workspace(env, &session.id).await?;
        }

        let model = self.resolve_model(ctx, &target).await?;
        ctx.push_metadata(
            Some(input.description.clone()),
            json!({ "sessionId": session.id, "model": model, "tools": {} }),
        );

        let child_message_id = id::ascending("message");

        // Mirror the child's tool activity onto this call's metadata. The
        // map is owned by this call and discarded on return; upserts are
        // idempotent per call id so duplicate or reordered bus delivery
        // cannot corrupt the view.
        let mirror: Arc<Mutex<BTreeMap<String, Value>>> = Arc::new(Mutex::new(BTreeMap::new()));
        let _mirror_guard = {
            let mut rx = self.bus.subscribe();
            let mirror = mirror.clone();
            let child_id = session.id.clone();
            let trigger_message = child_message_id.clone();
            let mirror_ctx = ctx.clone();
            let description = input.description.clone();
            let model = model.clone();
            AbortOnDrop::new(tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(BusEvent::PartUpdated {
                            session_id,
                            message_id,
                            part,
                        }) => {
                            if session_id != child_id || message_id == trigger_message {
                                continue;
                            }
                            let Some((call_id, entry)) = summarize_part(&part) else {
                                continue;
                            };
                            let snapshot = {
                                let mut mirror = mirror.lock().unwrap();
                                mirror.insert(call_id, entry);
                                serde_json::to_value(&*mirror).unwrap_or(Value::Null)
                            };
                            mirror_ctx.push_metadata(
                                Some(description.clone()),
                                json!({
                                    "sessionId": child_id,
                                    "model": model,
                                    "tools": snapshot,
                                }),
                            );
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "task mirror lagged behind bus");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }))
        };

        // Parent abort cancels the child's in-flight prompt.
        let _cancel_guard = {
            let driver = self.driver.clone();
            let child_id = session.id.clone();
            let abort = ctx.abort.clone();
            AbortOnDrop::new(tokio::spawn(async move {
                abort.cancelled().await;
                tracing::debug!(session = %child_id, "cancelling delegated prompt");
                driver.cancel(&child_id).await;
            }))
        };

        let reminder = environment
            .as_ref()
            .map(|env| Self::workspace_reminder(env, &session, &target))
            .unwrap_or_default();

        let outcome = self
            .driver
            .prompt(PromptRequest {
                session_id: session.id.clone(),
                message_id: child_message_id,
                agent: target.name.clone(),
                model: model.clone(),
                parts: vec![Part::Text {
                    id: id::ascending("part"),
                    text: format!("{reminder}{}", input.prompt),
                    synthetic: false,
                }],
                tools: self.child_tools(&target),
            })
            .await
            .map_err(|err| CoreError::ChildSession(err.to_string()))?;

        // Both guards release here, on every path: completion above on
        // success, unwinding on the error return just as well.
        drop(_mirror_guard);
        drop(_cancel_guard);

        let transcript = self.store.messages(&session.id).await?;
        let summary: Vec<Value> = transcript
            .iter()
            .filter(|m| m.info.role == MessageRole::Assistant)
            .flat_map(|m| m.parts.iter())
            .filter_map(|part| summarize_part(part).map(|(_, entry)| entry))
            .collect();

        let text = outcome
            .parts
            .iter()
            .rev()
            .find_map(|part| match part {
                Part::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .unwrap_or_default();

        let output = [
            format!("task_id: {} (for resuming to continue this task if needed)", session.id),
            String::new(),
            "<task_result>".to_string(),
            text,
            "</task_result>".to_string(),
        ]
        .join("\n");

        Ok(ToolOutput::new(
            input.description,
            output,
            json!({ "summary": summary, "sessionId": session.id, "model": model }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::core::context::MetadataUpdate;
    use crate::permissions::{PermissionBroker, PermissionReply, PermissionRequest};
    use crate::runtime::driver::PromptOutcome;
    use crate::session::model::{MessageInfo, ToolState};
    use crate::session::store::InMemorySessionStore;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Driver that writes a small transcript into the child session (through
    /// the store, so bus events fire) and records every request
    struct FakeDriver {
        store: Arc<InMemorySessionStore>,
        requests: Mutex<Vec<PromptRequest>>,
        cancelled: Mutex<Vec<String>>,
        /// When set, `prompt` stalls until cancelled
        stall: bool,
    }

    impl FakeDriver {
        fn new(store: Arc<InMemorySessionStore>) -> Self {
            Self {
                store,
                requests: Mutex::new(Vec::new()),
                cancelled: Mutex::new(Vec::new()),
                stall: false,
            }
        }

        fn stalling(store: Arc<InMemorySessionStore>) -> Self {
            Self {
                stall: true,
                ..Self::new(store)
            }
        }
    }

    #[async_trait]
    impl SessionDriver for FakeDriver {
        async fn prompt(&self, request: PromptRequest) -> CoreResult<PromptOutcome> {
            self.requests.lock().unwrap().push(request.clone());

            if self.stall {
                for _ in 0..200 {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    if self
                        .cancelled
                        .lock()
                        .unwrap()
                        .contains(&request.session_id)
                    {
                        return Ok(PromptOutcome::default());
                    }
                }
                return Err(CoreError::other("stalled prompt never cancelled"));
            }

            let assistant_id = id::ascending("message");
            self.store
                .append_message(MessageInfo {
                    id: assistant_id.clone(),
                    session_id: request.session_id.clone(),
                    role: MessageRole::Assistant,
                    agent: Some(request.agent.clone()),
                    model: Some(request.model.clone()),
                    created: 0,
                })
                .await?;

            let tool_part = |status: ToolStatus, title: Option<&str>| Part::Tool {
                id: "part_tool_1".into(),
                call_id: "call_child_1".into(),
                tool: "bash".into(),
                state: ToolState {
                    status,
                    title: title.map(String::from),
                    input: None,
                },
            };
            self.store
                .upsert_part(&request.session_id, &assistant_id, tool_part(ToolStatus::Running, None))
                .await?;
            self.store
                .upsert_part(
                    &request.session_id,
                    &assistant_id,
                    tool_part(ToolStatus::Completed, Some("ls -la")),
                )
                .await?;

            let text = Part::Text {
                id: "part_text_1".into(),
                text: "subagent findings".into(),
                synthetic: false,
            };
            self.store
                .upsert_part(&request.session_id, &assistant_id, text.clone())
                .await?;

            // Let the mirror drain the bus before returning.
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(PromptOutcome { parts: vec![text] })
        }

        async fn cancel(&self, session_id: &str) {
            self.cancelled.lock().unwrap().push(session_id.to_string());
        }
    }

    struct Harness {
        tool: TaskTool,
        store: Arc<InMemorySessionStore>,
        driver: Arc<FakeDriver>,
        bus: Arc<EventBus>,
        broker: Arc<PermissionBroker>,
        asked: Arc<Mutex<Vec<PermissionRequest>>>,
        parent: SessionInfo,
        updates: Arc<Mutex<Vec<MetadataUpdate>>>,
    }

    async fn harness(stalling: bool) -> Harness {
        let bus = Arc::new(EventBus::new());
        let store = Arc::new(InMemorySessionStore::new("/tmp/project", bus.clone()));
        let driver = Arc::new(if stalling {
            FakeDriver::stalling(store.clone())
        } else {
            FakeDriver::new(store.clone())
        });
        let agents = Arc::new(AgentRegistry::from_config(&CoreConfig::default()).unwrap());
        let tool = TaskTool::new(
            agents,
            store.clone(),
            driver.clone(),
            bus.clone(),
            Vec::new(),
        );

        let (broker, mut rx) = PermissionBroker::new();
        let asked = Arc::new(Mutex::new(Vec::new()));
        let record = asked.clone();
        tokio::spawn(async move {
            while let Some(pending) = rx.recv().await {
                record.lock().unwrap().push(pending.request.clone());
                pending.respond(PermissionReply::Approve { always: false });
            }
        });

        let parent = store
            .create(NewSession {
                title: "root".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        Harness {
            tool,
            store,
            driver,
            bus,
            broker: Arc::new(broker),
            asked,
            parent,
            updates: Arc::new(Mutex::new(Vec::new())),
        }
    }

    async fn context(h: &Harness) -> ToolContext {
        let agents = AgentRegistry::from_config(&CoreConfig::default()).unwrap();
        // Seed the triggering assistant message so model resolution works.
        let message_id = id::ascending("message");
        h.store
            .append_message(MessageInfo {
                id: message_id.clone(),
                session_id: h.parent.id.clone(),
                role: MessageRole::Assistant,
                agent: Some("pentest".into()),
                model: Some(ModelRef {
                    provider_id: "anthropic".into(),
                    model_id: "claude-sonnet-4-5".into(),
                }),
                created: 0,
            })
            .await
            .unwrap();
        let sink_updates = h.updates.clone();
        ToolContext::new(
            h.parent.id.clone(),
            message_id,
            "call_task",
            agents.resolve("pentest").unwrap(),
            h.broker.clone(),
        )
        .with_sink(Arc::new(move |update| {
            sink_updates.lock().unwrap().push(update);
        }))
    }

    fn task_input(subagent: &str) -> Value {
        json!({
            "description": "enumerate hosts",
            "prompt": "Map the internal attack surface.",
            "subagent_type": subagent,
        })
    }

    #[tokio::test]
    async fn test_unknown_agent_fails_before_session_creation() {
        let h = harness(false).await;
        let ctx = context(&h).await;
        let before = h.store.session_count().await;

        let err = h
            .tool
            .execute(task_input("ghost"), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownAgent(name) if name == "ghost"));
        assert_eq!(h.store.session_count().await, before);
        // Resolution precedes the delegation gate: nothing was asked.
        assert!(h.asked.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delegation_round_trip() {
        let h = harness(false).await;
        let ctx = context(&h).await;

        let result = h.tool.execute(task_input("recon"), &ctx).await.unwrap();

        // Gate asked once, scoped to the target, with the wildcard always hint.
        let requests = h.asked.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].kind, "task");
        assert_eq!(requests[0].patterns, vec!["recon".to_string()]);
        assert_eq!(requests[0].always, vec!["*".to_string()]);
        drop(requests);

        assert!(result.output.contains("task_id: session_"));
        assert!(result.output.contains("<task_result>"));
        assert!(result.output.contains("subagent findings"));

        let summary = result.metadata["summary"].as_array().unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0]["tool"], "bash");
        assert_eq!(summary[0]["state"]["status"], "completed");
        assert_eq!(summary[0]["state"]["title"], "ls -la");

        // Child session parented to the caller, seeded restrictively.
        let child_id = result.metadata["sessionId"].as_str().unwrap();
        let child = h.store.get(child_id).await.unwrap();
        assert_eq!(child.parent_id.as_deref(), Some(h.parent.id.as_str()));
        let seeds = child.permission.unwrap();
        assert_eq!(seeds.evaluate("todowrite", "x"), PermissionAction::Deny);
        assert_eq!(seeds.evaluate("task", "recon"), PermissionAction::Deny);

        // Child prompt had the todo/task tools disabled.
        let prompts = h.driver.requests.lock().unwrap();
        assert_eq!(prompts[0].tools.get("todowrite"), Some(&false));
        assert_eq!(prompts[0].tools.get("task"), Some(&false));
        assert_eq!(prompts[0].agent, "recon");
    }

    #[tokio::test]
    async fn test_target_with_task_capability_keeps_delegation() {
        let h = harness(false).await;
        let ctx = context(&h).await.with_bypass_agent_check(true);

        // pentest is delegatable here only in the sense of resolution; what
        // matters is that its task capability suppresses the deny seed.
        let result = h.tool.execute(task_input("pentest"), &ctx).await.unwrap();
        let child_id = result.metadata["sessionId"].as_str().unwrap();
        let seeds = h.store.get(child_id).await.unwrap().permission.unwrap();
        assert!(!seeds.has_kind("task"));

        let prompts = h.driver.requests.lock().unwrap();
        assert_eq!(prompts[0].tools.get("task"), None);
    }

    #[tokio::test]
    async fn test_mirror_pushes_live_tool_map() {
        let h = harness(false).await;
        let ctx = context(&h).await.with_bypass_agent_check(true);

        h.tool.execute(task_input("recon"), &ctx).await.unwrap();

        let updates = h.updates.lock().unwrap();
        let tool_maps: Vec<&Value> = updates
            .iter()
            .filter_map(|u| u.metadata.get("tools"))
            .filter(|tools| tools.get("call_child_1").is_some())
            .collect();
        assert!(!tool_maps.is_empty(), "mirror never pushed the tool map");
        // Running and completed updates both landed on the same entry.
        let last = tool_maps.last().unwrap();
        assert_eq!(last["call_child_1"]["state"]["status"], "completed");
        assert_eq!(last.as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resume_reuses_session() {
        let h = harness(false).await;
        let ctx = context(&h).await.with_bypass_agent_check(true);

        let first = h.tool.execute(task_input("recon"), &ctx).await.unwrap();
        let child_id = first.metadata["sessionId"].as_str().unwrap().to_string();
        let count_after_first = h.store.session_count().await;

        let mut resume = task_input("recon");
        resume["task_id"] = json!(child_id);
        let second = h.tool.execute(resume, &ctx).await.unwrap();
        assert_eq!(second.metadata["sessionId"].as_str().unwrap(), child_id);
        assert_eq!(h.store.session_count().await, count_after_first);
    }

    #[tokio::test]
    async fn test_abort_cancels_child_and_releases_subscription() {
        let h = harness(true).await;
        let ctx = context(&h).await.with_bypass_agent_check(true);

        let abort = ctx.abort.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            abort.cancel();
        });

        let baseline = h.bus.receiver_count();
        h.tool.execute(task_input("recon"), &ctx).await.unwrap();

        let cancelled = h.driver.cancelled.lock().unwrap();
        assert_eq!(cancelled.len(), 1, "child cancelled exactly once");
        drop(cancelled);

        // Give the aborted mirror task a beat to unwind.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.bus.receiver_count(), baseline, "bus subscription leaked");
    }

    #[tokio::test]
    async fn test_workspace_scaffold_and_reminder() {
        let temp = TempDir::new().unwrap();
        let h = harness(false).await;

        let mut parent = h.store.get(&h.parent.id).await.unwrap();
        let env = WorkspaceEnv::create(temp.path(), &parent.id, 0);
        parent.workspace = Some(env.clone());
        h.store.update(parent).await.unwrap();

        let ctx = context(&h).await.with_bypass_agent_check(true);
        let result = h.tool.execute(task_input("recon"), &ctx).await.unwrap();
        let child_id = result.metadata["sessionId"].as_str().unwrap();

        assert!(env.finding_path().is_file());
        assert!(env.results_path(child_id).is_file());

        let prompts = h.driver.requests.lock().unwrap();
        let Part::Text { text, .. } = &prompts[0].parts[0] else {
            panic!("expected text prompt part");
        };
        assert!(text.starts_with("<system-reminder>"));
        assert!(text.contains(&env.results_path(child_id).display().to_string()));
        assert!(text.contains("Map the internal attack surface."));
        assert!(!text.contains("REPORT_WRITER STAGED WORKFLOW"));
    }

    #[tokio::test]
    async fn test_report_writer_gets_staged_workflow_reminder() {
        let temp = TempDir::new().unwrap();
        let h = harness(false).await;

        let mut parent = h.store.get(&h.parent.id).await.unwrap();
        parent.workspace = Some(WorkspaceEnv::create(temp.path(), &parent.id, 0));
        h.store.update(parent).await.unwrap();

        let ctx = context(&h).await.with_bypass_agent_check(true);
        h.tool
            .execute(task_input("report_writer"), &ctx)
            .await
            .unwrap();

        let prompts = h.driver.requests.lock().unwrap();
        let Part::Text { text, .. } = &prompts[0].parts[0] else {
            panic!("expected text prompt part");
        };
        assert!(text.contains("REPORT_WRITER STAGED WORKFLOW IS MANDATORY"));
    }
}
