//! In-memory audit adapters.
//!
//! Both adapters keep their rows in process memory and expose failure
//! injection so the write path can be exercised without infrastructure.

mod fallback_table;
mod store;

pub use fallback_table::InMemoryFallbackTable;
pub use store::InMemoryAuditStore;

use crate::audit::domain::{AuditAction, DateRange, StoredAuditEvent};
use crate::audit::ports::AuditStoreError;
use std::collections::BTreeMap;
use std::sync::PoisonError;

fn poisoned<T>(err: PoisonError<T>) -> AuditStoreError {
    AuditStoreError::LockPoisoned(err.to_string())
}

fn tally_actions<'a>(
    events: impl Iterator<Item = &'a StoredAuditEvent>,
    range: &DateRange,
) -> BTreeMap<AuditAction, u64> {
    let mut counts = BTreeMap::new();
    for stored in events.filter(|stored| range.contains(stored.event.occurred_at())) {
        *counts.entry(stored.event.action()).or_insert(0) += 1;
    }
    counts
}
