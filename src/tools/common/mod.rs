//! Built-in tools

pub mod bash;
pub mod plan;
pub mod task;

pub use bash::BashTool;
pub use plan::{PlanEnterTool, PlanExitTool};
pub use task::TaskTool;
