//! Execution core for an autonomous coding/security assistant.
//!
//! The crate gates and supervises everything a model-driven agent does on
//! the host: shell commands run through a layered permission policy and an
//! independent risk classifier before a process exists, delegated sub-tasks
//! run in child sessions with restrictive rule seeds and live progress
//! mirroring, and plan/execution mode switches ride the same interactive
//! approval primitive.
//!
//! The session presentation layer, the LLM provider plumbing, and durable
//! persistence are external collaborators, consumed through the
//! [`session::SessionStore`], [`runtime::SessionDriver`], and
//! [`runtime::EventBus`] contracts.

pub mod agents;
pub mod config;
pub mod core;
pub mod logging;
pub mod permissions;
pub mod risk;
pub mod runtime;
pub mod session;
pub mod shell;
pub mod tools;
