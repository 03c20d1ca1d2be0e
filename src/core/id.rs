//! Time-ordered identifier generation
//!
//! Messages and sessions use ids that sort lexicographically by creation
//! time, so "last message" scans and resumable task ids stay cheap.

use chrono::Utc;
use uuid::Uuid;

/// Generate a new ascending id with the given prefix (e.g. `message`, `session`)
///
/// Format: `{prefix}_{millis:012x}{random-tail}`. The fixed-width millisecond
/// component makes ids created later compare greater.
pub fn ascending(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let tail = Uuid::new_v4().simple().to_string();
    format!("{}_{:012x}{}", prefix, millis, &tail[..10])
}
