//! Plan mode switching
//!
//! Plan mode is not a stored field: it is inferred from the agent tags on
//! the session's user messages. `plan_exit` finds the agent that was active
//! immediately before the most recent run of plan-tagged messages and offers
//! to switch back; `plan_enter` offers the symmetric switch into `plan`.
//! Both confirmations ride the ask primitive, and a decline is a typed
//! cancellation with no state change. An accepted switch appends a new
//! user-authored message tagged with the target agent, carrying a synthetic
//! redirect instruction and the last known model binding.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agents::{AgentRegistry, ModelRef};
use crate::core::context::{Ask, ToolContext};
use crate::core::error::CoreResult;
use crate::core::id;
use crate::session::model::{MessageInfo, MessageRole, Part, SessionInfo};
use crate::session::store::SessionStore;
use crate::tools::tool::{Tool, ToolOutput};

/// Agent assumed when the history carries no usable tag
const FALLBACK_AGENT: &str = "pentest";

/// Map legacy aliases to the canonical execution agent
fn execution_agent(agent: &str) -> &str {
    match agent {
        "pentest_auto" | "pentest_flow" => "pentest",
        other => other,
    }
}

/// Where the session's plan file lives
fn plan_path(session: &SessionInfo) -> PathBuf {
    session
        .directory
        .join(".plans")
        .join(format!("{}.md", session.id))
}

/// Newest user message carrying a model binding
async fn last_model(
    store: &Arc<dyn SessionStore>,
    session_id: &str,
) -> CoreResult<Option<ModelRef>> {
    let messages = store.messages(session_id).await?;
    Ok(messages
        .iter()
        .rev()
        .filter(|m| m.info.role == MessageRole::User)
        .find_map(|m| m.info.model.clone()))
}

/// Newest user message's agent tag
async fn last_user_agent(store: &Arc<dyn SessionStore>, session_id: &str) -> CoreResult<String> {
    let messages = store.messages(session_id).await?;
    Ok(messages
        .iter()
        .rev()
        .filter(|m| m.info.role == MessageRole::User)
        .find_map(|m| m.info.agent.clone())
        .unwrap_or_else(|| FALLBACK_AGENT.to_string()))
}

/// The agent active immediately before the most recent run of plan messages
async fn pre_plan_agent(store: &Arc<dyn SessionStore>, session_id: &str) -> CoreResult<String> {
    let messages = store.messages(session_id).await?;
    let mut saw_plan = false;
    for message in messages.iter().rev() {
        if message.info.role != MessageRole::User {
            continue;
        }
        let Some(agent) = &message.info.agent else {
            continue;
        };
        if agent == "plan" {
            saw_plan = true;
            continue;
        }
        if saw_plan {
            return Ok(agent.clone());
        }
    }
    Ok(FALLBACK_AGENT.to_string())
}

/// Pick the execution agent to switch back to, validated against the registry
async fn resolve_execution_agent(
    agents: &Arc<AgentRegistry>,
    store: &Arc<dyn SessionStore>,
    session_id: &str,
) -> CoreResult<String> {
    let session = store.get(session_id).await?;
    let mut preferred = execution_agent(&pre_plan_agent(store, session_id).await?).to_string();
    // Inside a shared engagement the generic build agent defers to the
    // orchestrator.
    if session.workspace.is_some() && preferred == "build" {
        if let Some(pentest) = agents.resolve("pentest") {
            if !pentest.is_subagent() {
                preferred = "pentest".to_string();
            }
        }
    }
    if let Some(agent) = agents.resolve(&preferred) {
        if !agent.is_subagent() {
            return Ok(preferred);
        }
    }
    if let Some(pentest) = agents.resolve("pentest") {
        if !pentest.is_subagent() {
            return Ok("pentest".to_string());
        }
    }
    Ok(agents.default_agent()?.name.clone())
}

/// The synthetic instruction driving execution after an approved plan
fn execution_kickoff(plan: &PathBuf, agent: &str) -> String {
    if agent != "pentest" {
        return format!(
            "The plan at {} has been approved. You are now back in {agent} mode. Execute the plan.",
            plan.display()
        );
    }
    [
        format!("The plan at {} has been approved. You are now in pentest mode.", plan.display()),
        "Create or update your todo list now with concrete execution tasks and priorities.".to_string(),
        "Begin executing the approved plan immediately and capture evidence as you go.".to_string(),
        "Delegate specialized work early using the task tool with subagents (recon, assess, report).".to_string(),
    ]
    .join("\n")
}

/// Append a user-authored message tagged with `agent`, carrying a synthetic
/// redirect part
async fn append_switch_message(
    store: &Arc<dyn SessionStore>,
    session_id: &str,
    agent: &str,
    model: Option<ModelRef>,
    text: String,
) -> CoreResult<()> {
    let message_id = id::ascending("message");
    store
        .append_message(MessageInfo {
            id: message_id.clone(),
            session_id: session_id.to_string(),
            role: MessageRole::User,
            agent: Some(agent.to_string()),
            model,
            created: chrono::Utc::now().timestamp_millis(),
        })
        .await?;
    store
        .upsert_part(
            session_id,
            &message_id,
            Part::Text {
                id: id::ascending("part"),
                text,
                synthetic: true,
            },
        )
        .await
}

/// Tool switching from plan mode back to the execution agent
pub struct PlanExitTool {
    agents: Arc<AgentRegistry>,
    store: Arc<dyn SessionStore>,
}

impl PlanExitTool {
    pub fn new(agents: Arc<AgentRegistry>, store: Arc<dyn SessionStore>) -> Self {
        Self { agents, store }
    }
}

#[async_trait]
impl Tool for PlanExitTool {
    fn name(&self) -> &str {
        "plan_exit"
    }

    fn description(&self) -> &str {
        "Exit plan mode once the plan is approved and switch back to the execution agent."
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: Value, ctx: &ToolContext) -> CoreResult<ToolOutput> {
        let session = self.store.get(&ctx.session_id).await?;
        let plan = plan_path(&session);
        let target = resolve_execution_agent(&self.agents, &self.store, &ctx.session_id).await?;
        let model = last_model(&self.store, &ctx.session_id).await?;

        // Decline propagates as a typed cancellation: no message is written
        // and the active agent stays unchanged.
        ctx.ask(Ask {
            kind: "plan_exit".into(),
            patterns: vec![target.clone()],
            always: Vec::new(),
            title: format!("Exit plan mode and switch back to the {target} agent?"),
            metadata: json!({
                "agent": target,
                "plan": plan.display().to_string(),
            }),
        })
        .await?;

        append_switch_message(
            &self.store,
            &ctx.session_id,
            &target,
            model,
            execution_kickoff(&plan, &target),
        )
        .await?;

        Ok(ToolOutput::new(
            format!("Switching to {target} agent"),
            format!("Switched to {target}. Continue execution immediately."),
            json!({}),
        ))
    }
}

/// Tool switching from the execution agent into plan mode
pub struct PlanEnterTool {
    agents: Arc<AgentRegistry>,
    store: Arc<dyn SessionStore>,
}

impl PlanEnterTool {
    pub fn new(agents: Arc<AgentRegistry>, store: Arc<dyn SessionStore>) -> Self {
        Self { agents, store }
    }
}

#[async_trait]
impl Tool for PlanEnterTool {
    fn name(&self) -> &str {
        "plan_enter"
    }

    fn description(&self) -> &str {
        "Switch to the plan agent to research and write a plan before executing."
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: Value, ctx: &ToolContext) -> CoreResult<ToolOutput> {
        // The plan profile must exist for the switch to make sense.
        if self.agents.resolve("plan").is_none() {
            return Err(crate::core::error::CoreError::UnknownAgent("plan".into()));
        }
        let session = self.store.get(&ctx.session_id).await?;
        let plan = plan_path(&session);
        let current = last_user_agent(&self.store, &ctx.session_id).await?;
        let model = last_model(&self.store, &ctx.session_id).await?;

        ctx.ask(Ask {
            kind: "plan_enter".into(),
            patterns: vec!["plan".into()],
            always: Vec::new(),
            title: format!(
                "Switch to the plan agent and create a plan saved to {}?",
                plan.display()
            ),
            metadata: json!({
                "current_agent": current,
                "decline": format!("Stay with {current} to continue execution"),
            }),
        })
        .await?;

        append_switch_message(
            &self.store,
            &ctx.session_id,
            "plan",
            model,
            "User has requested to enter plan mode. Switch to plan mode and begin planning."
                .to_string(),
        )
        .await?;

        Ok(ToolOutput::new(
            "Switching to plan agent",
            format!(
                "User confirmed to switch to plan mode. A new message has been created to switch you to plan mode. The plan file will be at {}. Begin planning.",
                plan.display()
            ),
            json!({}),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::core::error::CoreError;
    use crate::permissions::{PermissionBroker, PermissionReply, PermissionRequest};
    use crate::runtime::bus::EventBus;
    use crate::session::model::NewSession;
    use crate::session::store::InMemorySessionStore;
    use crate::session::workspace::WorkspaceEnv;
    use std::sync::Mutex;

    struct Harness {
        agents: Arc<AgentRegistry>,
        store: Arc<dyn SessionStore>,
        broker: Arc<PermissionBroker>,
        asked: Arc<Mutex<Vec<PermissionRequest>>>,
        session: SessionInfo,
    }

    async fn harness(approve: bool) -> Harness {
        let agents = Arc::new(AgentRegistry::from_config(&CoreConfig::default()).unwrap());
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(
            "/tmp/project",
            Arc::new(EventBus::new()),
        ));
        let (broker, mut rx) = PermissionBroker::new();
        let asked = Arc::new(Mutex::new(Vec::new()));
        let record = asked.clone();
        tokio::spawn(async move {
            while let Some(pending) = rx.recv().await {
                record.lock().unwrap().push(pending.request.clone());
                pending.respond(if approve {
                    PermissionReply::Approve { always: false }
                } else {
                    PermissionReply::Reject
                });
            }
        });
        let session = store
            .create(NewSession {
                title: "root".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        Harness {
            agents,
            store,
            broker: Arc::new(broker),
            asked,
            session,
        }
    }

    async fn seed_user_message(h: &Harness, agent: Option<&str>, model: Option<&str>) {
        h.store
            .append_message(MessageInfo {
                id: id::ascending("message"),
                session_id: h.session.id.clone(),
                role: MessageRole::User,
                agent: agent.map(String::from),
                model: model.map(|m| ModelRef {
                    provider_id: "anthropic".into(),
                    model_id: m.into(),
                }),
                created: 0,
            })
            .await
            .unwrap();
    }

    fn context(h: &Harness) -> ToolContext {
        ToolContext::new(
            h.session.id.clone(),
            "msg_current",
            "call_plan",
            h.agents.resolve("plan").unwrap(),
            h.broker.clone(),
        )
    }

    async fn message_count(h: &Harness) -> usize {
        h.store.messages(&h.session.id).await.unwrap().len()
    }

    #[tokio::test]
    async fn test_plan_exit_returns_to_pre_plan_agent() {
        let h = harness(true).await;
        seed_user_message(&h, Some("pentest"), Some("claude-sonnet-4-5")).await;
        seed_user_message(&h, Some("plan"), Some("claude-sonnet-4-5")).await;
        seed_user_message(&h, Some("plan"), None).await;

        let tool = PlanExitTool::new(h.agents.clone(), h.store.clone());
        let result = tool.execute(json!({}), &context(&h)).await.unwrap();
        assert_eq!(result.title, "Switching to pentest agent");

        let requests = h.asked.lock().unwrap();
        assert_eq!(requests[0].kind, "plan_exit");
        assert_eq!(requests[0].patterns, vec!["pentest".to_string()]);
        drop(requests);

        let messages = h.store.messages(&h.session.id).await.unwrap();
        let appended = messages.last().unwrap();
        assert_eq!(appended.info.role, MessageRole::User);
        assert_eq!(appended.info.agent.as_deref(), Some("pentest"));
        // Model binding reused from the last user message that carried one.
        assert_eq!(
            appended.info.model.as_ref().unwrap().model_id,
            "claude-sonnet-4-5"
        );
        assert!(matches!(
            &appended.parts[0],
            Part::Text { synthetic: true, text, .. } if text.contains("has been approved")
        ));
    }

    #[tokio::test]
    async fn test_plan_exit_decline_leaves_state_unchanged() {
        let h = harness(false).await;
        seed_user_message(&h, Some("build"), Some("claude-sonnet-4-5")).await;
        seed_user_message(&h, Some("plan"), None).await;
        let before = message_count(&h).await;

        let tool = PlanExitTool::new(h.agents.clone(), h.store.clone());
        let err = tool.execute(json!({}), &context(&h)).await.unwrap_err();
        assert!(matches!(err, CoreError::PermissionRejected { .. }));
        assert_eq!(message_count(&h).await, before, "no message on decline");
    }

    #[tokio::test]
    async fn test_plan_exit_maps_legacy_alias() {
        let h = harness(true).await;
        seed_user_message(&h, Some("pentest_auto"), Some("claude-sonnet-4-5")).await;
        seed_user_message(&h, Some("plan"), None).await;

        let tool = PlanExitTool::new(h.agents.clone(), h.store.clone());
        let result = tool.execute(json!({}), &context(&h)).await.unwrap();
        assert_eq!(result.title, "Switching to pentest agent");
    }

    #[tokio::test]
    async fn test_plan_exit_falls_back_without_history() {
        let h = harness(true).await;
        let tool = PlanExitTool::new(h.agents.clone(), h.store.clone());
        let result = tool.execute(json!({}), &context(&h)).await.unwrap();
        assert_eq!(result.title, "Switching to pentest agent");
    }

    #[tokio::test]
    async fn test_plan_exit_prefers_orchestrator_in_engagement() {
        let h = harness(true).await;
        seed_user_message(&h, Some("build"), Some("claude-sonnet-4-5")).await;
        seed_user_message(&h, Some("plan"), None).await;

        let mut session = h.store.get(&h.session.id).await.unwrap();
        session.workspace = Some(WorkspaceEnv::create(
            std::path::Path::new("/tmp/engagements-base"),
            &session.id,
            0,
        ));
        h.store.update(session).await.unwrap();

        let tool = PlanExitTool::new(h.agents.clone(), h.store.clone());
        let result = tool.execute(json!({}), &context(&h)).await.unwrap();
        assert_eq!(result.title, "Switching to pentest agent");
    }

    #[tokio::test]
    async fn test_plan_enter_switches_to_plan() {
        let h = harness(true).await;
        seed_user_message(&h, Some("pentest"), Some("claude-sonnet-4-5")).await;

        let tool = PlanEnterTool::new(h.agents.clone(), h.store.clone());
        let result = tool.execute(json!({}), &context(&h)).await.unwrap();
        assert_eq!(result.title, "Switching to plan agent");

        let requests = h.asked.lock().unwrap();
        assert_eq!(requests[0].kind, "plan_enter");
        assert_eq!(requests[0].patterns, vec!["plan".to_string()]);
        // The decline option names the agent the user would stay with.
        assert_eq!(
            requests[0].metadata["decline"],
            "Stay with pentest to continue execution"
        );
        drop(requests);

        let messages = h.store.messages(&h.session.id).await.unwrap();
        let appended = messages.last().unwrap();
        assert_eq!(appended.info.agent.as_deref(), Some("plan"));
        assert!(matches!(
            &appended.parts[0],
            Part::Text { synthetic: true, .. }
        ));
    }

    #[tokio::test]
    async fn test_plan_enter_decline_is_cancellation() {
        let h = harness(false).await;
        seed_user_message(&h, Some("build"), Some("claude-sonnet-4-5")).await;
        let before = message_count(&h).await;

        let tool = PlanEnterTool::new(h.agents.clone(), h.store.clone());
        let err = tool.execute(json!({}), &context(&h)).await.unwrap_err();
        assert!(matches!(err, CoreError::PermissionRejected { .. }));
        assert_eq!(message_count(&h).await, before);
    }
}
