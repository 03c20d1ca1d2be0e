//! Interactive approval requests
//!
//! Tools never prompt directly. They hand a `PermissionRequest` to the
//! `PermissionBroker`, which suspends the calling tool on a oneshot reply
//! while an external approval responder (human or automated) drains the
//! pending-approval channel. An approval may carry an "always" shortcut:
//! the request's patterns are recorded for the session, and any later
//! request fully covered by recorded grants resolves without prompting.
//!
//! Grants are scoped to a single session and never persisted; the store only
//! grows for a session's lifetime and tolerates concurrent readers from
//! in-flight tool calls.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::core::error::{CoreError, CoreResult};

use super::ruleset::wildcard_match;

/// One pending approval, as seen by the tool that raised it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRequest {
    /// Permission kind (`bash`, `bash_sensitive`, `task`, ...)
    pub kind: String,
    /// The patterns the approval covers
    pub patterns: Vec<String>,
    /// Session the request belongs to
    pub session_id: String,
    /// Message that triggered the tool call
    pub message_id: String,
    /// The tool call raising the request
    pub call_id: String,
    /// Human-readable summary shown to the responder
    pub title: String,
    /// Patterns to record when the responder answers "always"
    ///
    /// Empty means record `patterns` themselves.
    #[serde(default)]
    pub always: Vec<String>,
    /// Structured context for the responder (command text, risk rule, ...)
    #[serde(default)]
    pub metadata: Value,
}

impl std::fmt::Display for PermissionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} for {}", self.kind, self.patterns.join(", "))
    }
}

/// The responder's decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionReply {
    /// Proceed; optionally remember the grant for the rest of the session
    Approve { always: bool },
    /// Decline; the tool call fails with `PermissionRejected`
    Reject,
}

/// A request paired with its reply channel, delivered to the responder
#[derive(Debug)]
pub struct PendingApproval {
    /// The request awaiting a decision
    pub request: PermissionRequest,
    reply: oneshot::Sender<PermissionReply>,
}

impl PendingApproval {
    /// Answer the request, waking the suspended tool call
    pub fn respond(self, reply: PermissionReply) {
        // The asking side may have been aborted; a dead receiver is fine.
        let _ = self.reply.send(reply);
    }
}

/// Receiver half handed to the external approval responder
pub type ApprovalReceiver = mpsc::UnboundedReceiver<PendingApproval>;

/// Session-scoped approval broker
pub struct PermissionBroker {
    responder: mpsc::UnboundedSender<PendingApproval>,
    /// session id → kind → granted patterns
    grants: RwLock<HashMap<String, HashMap<String, BTreeSet<String>>>>,
}

impl PermissionBroker {
    /// Create a broker and the channel the approval responder reads from
    pub fn new() -> (Self, ApprovalReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                responder: tx,
                grants: RwLock::new(HashMap::new()),
            },
            rx,
        )
    }

    /// Raise a request and suspend until the responder answers
    ///
    /// Returns `Ok(())` on approval (recording an "always" grant when asked
    /// to), `PermissionRejected` carrying the original request on decline,
    /// and `ApprovalUnavailable` if the responder has gone away.
    pub async fn ask(&self, request: PermissionRequest) -> CoreResult<()> {
        if self.covered(&request) {
            tracing::debug!(
                kind = %request.kind,
                session = %request.session_id,
                "permission request covered by session grant"
            );
            return Ok(());
        }

        let (tx, rx) = oneshot::channel();
        self.responder
            .send(PendingApproval {
                request: request.clone(),
                reply: tx,
            })
            .map_err(|_| CoreError::ApprovalUnavailable)?;

        match rx.await {
            Ok(PermissionReply::Approve { always }) => {
                if always {
                    self.record(&request);
                }
                Ok(())
            }
            Ok(PermissionReply::Reject) => Err(CoreError::PermissionRejected { request }),
            Err(_) => Err(CoreError::ApprovalUnavailable),
        }
    }

    /// Whether every requested pattern is covered by a recorded grant
    fn covered(&self, request: &PermissionRequest) -> bool {
        let grants = self.grants.read().unwrap();
        let Some(kinds) = grants.get(&request.session_id) else {
            return false;
        };
        let Some(granted) = kinds.get(&request.kind) else {
            return false;
        };
        !request.patterns.is_empty()
            && request
                .patterns
                .iter()
                .all(|p| granted.iter().any(|g| g == p || wildcard_match(g, p)))
    }

    /// Record an "always" grant for the request's session
    fn record(&self, request: &PermissionRequest) {
        let patterns = if request.always.is_empty() {
            &request.patterns
        } else {
            &request.always
        };
        let mut grants = self.grants.write().unwrap();
        let granted = grants
            .entry(request.session_id.clone())
            .or_default()
            .entry(request.kind.clone())
            .or_default();
        for pattern in patterns {
            granted.insert(pattern.clone());
        }
        tracing::info!(
            kind = %request.kind,
            session = %request.session_id,
            patterns = ?patterns,
            "recorded always grant"
        );
    }

    /// Recorded grants for a session and kind (empty set when none)
    pub fn grants_for(&self, session_id: &str, kind: &str) -> BTreeSet<String> {
        self.grants
            .read()
            .unwrap()
            .get(session_id)
            .and_then(|kinds| kinds.get(kind))
            .cloned()
            .unwrap_or_default()
    }

    /// Drop every grant recorded for a session
    pub fn forget_session(&self, session_id: &str) {
        self.grants.write().unwrap().remove(session_id);
    }
}
