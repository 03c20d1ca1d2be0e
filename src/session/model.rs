//! Session and message data model
//!
//! Sessions form a tree: delegated tasks create child sessions parented to
//! the caller, optionally pre-seeded with restrictive permission overrides
//! and a shared workspace pointer. Messages hold text parts (user/assistant
//! prose, synthetic redirects) and tool parts (one per tool call, updated in
//! place as the call progresses).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agents::ModelRef;
use crate::permissions::Ruleset;

use super::workspace::WorkspaceEnv;

/// A session record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    /// Parent session for delegated children
    pub parent_id: Option<String>,
    pub title: String,
    /// Project directory the session operates in
    pub directory: PathBuf,
    /// Restrictive rule overrides seeded at creation (delegated children)
    pub permission: Option<Ruleset>,
    /// Shared workspace pointer, inherited by children
    pub workspace: Option<WorkspaceEnv>,
    /// Creation time, epoch millis
    pub created: i64,
}

/// Parameters for creating a session
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub parent_id: Option<String>,
    pub title: String,
    /// Defaults to the store's project directory
    pub directory: Option<PathBuf>,
    pub permission: Option<Ruleset>,
    pub workspace: Option<WorkspaceEnv>,
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Message envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageInfo {
    pub id: String,
    pub session_id: String,
    pub role: MessageRole,
    /// Agent persona the message is tagged with (drives mode inference)
    pub agent: Option<String>,
    pub model: Option<ModelRef>,
    /// Creation time, epoch millis
    pub created: i64,
}

/// Lifecycle of a tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Pending,
    Running,
    Completed,
    Error,
}

/// Mutable state of a tool part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolState {
    pub status: ToolStatus,
    /// Final title, set once completed
    pub title: Option<String>,
    /// Validated input the call ran with
    pub input: Option<Value>,
}

/// One part of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Part {
    Text {
        id: String,
        text: String,
        /// Synthetic parts are injected by tools, not typed by the user
        #[serde(default)]
        synthetic: bool,
    },
    Tool {
        id: String,
        /// The dispatch layer's call id
        call_id: String,
        tool: String,
        state: ToolState,
    },
}

impl Part {
    /// The part's id
    pub fn id(&self) -> &str {
        match self {
            Part::Text { id, .. } => id,
            Part::Tool { id, .. } => id,
        }
    }
}

/// A message with its parts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageWithParts {
    pub info: MessageInfo,
    pub parts: Vec<Part>,
}

impl MessageWithParts {
    /// The last text part's content, if any
    pub fn last_text(&self) -> Option<&str> {
        self.parts.iter().rev().find_map(|part| match part {
            Part::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_text() {
        let message = MessageWithParts {
            info: MessageInfo {
                id: "m1".into(),
                session_id: "s1".into(),
                role: MessageRole::Assistant,
                agent: None,
                model: None,
                created: 0,
            },
            parts: vec![
                Part::Text {
                    id: "p1".into(),
                    text: "first".into(),
                    synthetic: false,
                },
                Part::Tool {
                    id: "p2".into(),
                    call_id: "c1".into(),
                    tool: "bash".into(),
                    state: ToolState {
                        status: ToolStatus::Completed,
                        title: Some("ls".into()),
                        input: None,
                    },
                },
                Part::Text {
                    id: "p3".into(),
                    text: "final".into(),
                    synthetic: false,
                },
            ],
        };
        assert_eq!(message.last_text(), Some("final"));
    }

    #[test]
    fn test_part_serialization_tags() {
        let part = Part::Text {
            id: "p1".into(),
            text: "hello".into(),
            synthetic: true,
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["synthetic"], true);

        let part: Part = serde_json::from_value(serde_json::json!({
            "type": "tool",
            "id": "p2",
            "call_id": "c9",
            "tool": "bash",
            "state": { "status": "running", "title": null, "input": null }
        }))
        .unwrap();
        assert!(matches!(part, Part::Tool { ref tool, .. } if tool == "bash"));
    }
}
