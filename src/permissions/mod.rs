//! Layered, pattern-based permission policy
//!
//! Two halves: `ruleset` evaluates actions against allow/ask/deny pattern
//! tables, and `broker` runs the interactive approval flow for `ask`
//! verdicts, including per-session "always" grants.

pub mod broker;
pub mod ruleset;

pub use broker::{
    ApprovalReceiver, PendingApproval, PermissionBroker, PermissionReply, PermissionRequest,
};
pub use ruleset::{
    command_match, wildcard_match, PatternRules, PermissionAction, PermissionConfig,
    PermissionValue, Ruleset,
};
