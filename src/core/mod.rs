//! Core types: errors, per-call context, identifiers

pub mod context;
pub mod error;
pub mod id;

pub use context::{Ask, MetadataSink, MetadataUpdate, ToolContext};
pub use error::{CoreError, CoreResult};
