pub mod types;

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Returns the next process-wide connection sequence number.
///
/// Numbers start at 1 and are never reused for the lifetime of the process.
pub fn next_connection_seq() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Generates a fresh identifier for a room or a user.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
