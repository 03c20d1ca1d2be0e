//! Per-call tool context
//!
//! Every tool invocation receives a `ToolContext` from the dispatch layer:
//! the session/message/call identity, the acting agent, the effective
//! permission rules, a cancellation signal, a metadata sink for live
//! progress, and the ask primitive for interactive approvals. The context is
//! hidden state; none of it appears in a tool's input schema.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::agents::AgentDefinition;
use crate::core::error::CoreResult;
use crate::permissions::{PermissionBroker, PermissionRequest, Ruleset};
use crate::session::workspace::WorkspaceEnv;

/// A live metadata update pushed while a tool call runs
#[derive(Debug, Clone)]
pub struct MetadataUpdate {
    /// Current call title, when known
    pub title: Option<String>,
    /// Structured progress payload
    pub metadata: Value,
}

/// Sink receiving metadata updates (the session/UI layer)
pub type MetadataSink = Arc<dyn Fn(MetadataUpdate) + Send + Sync>;

/// An approval request as raised by a tool
///
/// The context fills in the session/message/call identity before handing it
/// to the broker.
#[derive(Debug, Clone)]
pub struct Ask {
    pub kind: String,
    pub patterns: Vec<String>,
    /// Patterns recorded when the responder answers "always"
    pub always: Vec<String>,
    pub title: String,
    pub metadata: Value,
}

/// Context passed to tools during execution
#[derive(Clone)]
pub struct ToolContext {
    /// Session the call belongs to
    pub session_id: String,
    /// Message that triggered the call
    pub message_id: String,
    /// The tool call's own id
    pub call_id: String,
    /// The acting agent profile
    pub agent: Arc<AgentDefinition>,
    /// Effective permission rules: the agent's, plus any session overrides
    pub rules: Ruleset,
    /// Cancellation signal; cascades from the session's abort
    pub abort: CancellationToken,
    /// Shared workspace pointer, when the session carries one
    pub workspace: Option<WorkspaceEnv>,
    /// Set for direct, user-initiated invocations that skip delegation gates
    pub bypass_agent_check: bool,
    broker: Arc<PermissionBroker>,
    sink: MetadataSink,
}

impl ToolContext {
    /// Create a context for one tool call
    pub fn new(
        session_id: impl Into<String>,
        message_id: impl Into<String>,
        call_id: impl Into<String>,
        agent: Arc<AgentDefinition>,
        broker: Arc<PermissionBroker>,
    ) -> Self {
        let rules = agent.permission.clone();
        Self {
            session_id: session_id.into(),
            message_id: message_id.into(),
            call_id: call_id.into(),
            agent,
            rules,
            abort: CancellationToken::new(),
            workspace: None,
            bypass_agent_check: false,
            broker,
            sink: Arc::new(|_| {}),
        }
    }

    /// Merge session-scoped rule overrides into the effective rules
    pub fn with_session_rules(mut self, overrides: &Ruleset) -> Self {
        self.rules = self.rules.merged(overrides);
        self
    }

    /// Attach the metadata sink
    pub fn with_sink(mut self, sink: MetadataSink) -> Self {
        self.sink = sink;
        self
    }

    /// Attach the cancellation token driving this call
    pub fn with_abort(mut self, abort: CancellationToken) -> Self {
        self.abort = abort;
        self
    }

    /// Attach the session's shared workspace pointer
    pub fn with_workspace(mut self, workspace: Option<WorkspaceEnv>) -> Self {
        self.workspace = workspace;
        self
    }

    /// Mark the call as a direct, non-delegated invocation
    pub fn with_bypass_agent_check(mut self, bypass: bool) -> Self {
        self.bypass_agent_check = bypass;
        self
    }

    /// Push a live metadata snapshot to the session layer
    pub fn push_metadata(&self, title: Option<String>, metadata: Value) {
        (self.sink)(MetadataUpdate { title, metadata });
    }

    /// Raise an approval request and suspend until it resolves
    pub async fn ask(&self, ask: Ask) -> CoreResult<()> {
        self.broker
            .ask(PermissionRequest {
                kind: ask.kind,
                patterns: ask.patterns,
                session_id: self.session_id.clone(),
                message_id: self.message_id.clone(),
                call_id: self.call_id.clone(),
                title: ask.title,
                always: ask.always,
                metadata: ask.metadata,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentRegistry;
    use crate::config::CoreConfig;
    use crate::permissions::{PermissionAction, PermissionReply};
    use std::sync::Mutex;

    fn test_agent() -> Arc<AgentDefinition> {
        AgentRegistry::from_config(&CoreConfig::default())
            .unwrap()
            .resolve("build")
            .unwrap()
    }

    #[tokio::test]
    async fn test_ask_fills_call_identity() {
        let (broker, mut rx) = PermissionBroker::new();
        let ctx = ToolContext::new("sess", "msg", "call", test_agent(), Arc::new(broker));

        let responder = tokio::spawn(async move {
            let pending = rx.recv().await.unwrap();
            assert_eq!(pending.request.session_id, "sess");
            assert_eq!(pending.request.message_id, "msg");
            assert_eq!(pending.request.call_id, "call");
            pending.respond(PermissionReply::Approve { always: false });
        });

        ctx.ask(Ask {
            kind: "bash".into(),
            patterns: vec!["ls *".into()],
            always: Vec::new(),
            title: "ls -la".into(),
            metadata: Value::Null,
        })
        .await
        .unwrap();
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_metadata_sink_receives_updates() {
        let (broker, _rx) = PermissionBroker::new();
        let seen: Arc<Mutex<Vec<MetadataUpdate>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let ctx = ToolContext::new("s", "m", "c", test_agent(), Arc::new(broker)).with_sink(
            Arc::new(move |update| {
                sink_seen.lock().unwrap().push(update);
            }),
        );

        ctx.push_metadata(Some("title".into()), serde_json::json!({ "output": "x" }));
        let updates = seen.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].title.as_deref(), Some("title"));
    }

    #[test]
    fn test_session_rules_merge_over_agent() {
        let (broker, _rx) = PermissionBroker::new();
        let mut overrides = Ruleset::new();
        overrides.insert("task", "*", PermissionAction::Deny);
        let ctx = ToolContext::new("s", "m", "c", test_agent(), Arc::new(broker))
            .with_session_rules(&overrides);
        assert_eq!(ctx.rules.evaluate("task", "recon"), PermissionAction::Deny);
    }
}
