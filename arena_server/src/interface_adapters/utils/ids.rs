use std::sync::atomic::{AtomicU64, Ordering};

use crate::use_cases::ConnId;

/// Returns a process-unique connection id. Ids start at 1 and only grow.
pub fn next_conn_id() -> ConnId {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}
