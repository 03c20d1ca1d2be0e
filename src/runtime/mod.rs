//! Runtime plumbing: event bus, prompt driver contract, scoped tasks

pub mod bus;
pub mod driver;

pub use bus::{BusEvent, EventBus};
pub use driver::{PromptOutcome, PromptRequest, SessionDriver};

use tokio::task::JoinHandle;

/// Aborts a spawned task when dropped
///
/// Subscriptions and cancellation watchers are held through this guard so
/// that every acquire has exactly one release, on every exit path.
pub struct AbortOnDrop(Option<JoinHandle<()>>);

impl AbortOnDrop {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self(Some(handle))
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}
