//! Session prompt driver contract
//!
//! Running a child session's model loop belongs to the surrounding session
//! layer; the execution core only needs to start a prompt, wait for the
//! session to go idle, and cancel it when the parent aborts. Tests plug in
//! lightweight fakes.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::agents::ModelRef;
use crate::core::error::CoreResult;
use crate::session::model::Part;

/// A prompt to run in a (child) session
#[derive(Debug, Clone)]
pub struct PromptRequest {
    pub session_id: String,
    /// Pre-allocated id of the user message carrying the prompt
    pub message_id: String,
    /// Agent persona driving the session
    pub agent: String,
    pub model: ModelRef,
    /// The prompt content
    pub parts: Vec<Part>,
    /// Tool enablement overrides for this prompt (false = disabled)
    pub tools: BTreeMap<String, bool>,
}

/// Final assistant output of a prompt
#[derive(Debug, Clone, Default)]
pub struct PromptOutcome {
    /// Parts of the final assistant message
    pub parts: Vec<Part>,
}

/// External collaborator that runs session prompts
#[async_trait]
pub trait SessionDriver: Send + Sync {
    /// Run a prompt and suspend until the session is idle or cancelled
    async fn prompt(&self, request: PromptRequest) -> CoreResult<PromptOutcome>;

    /// Cancel the session's in-flight prompt, if any
    async fn cancel(&self, session_id: &str);
}
