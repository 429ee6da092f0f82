//! Pure construction of audit events from before/after state.

use crate::audit::domain::{
    AuditAction, AuditActor, AuditEvent, AuditEventParts, DeletionType, RequestContext, StateMap,
};
use chrono::{DateTime, SecondsFormat, SubsecRound, TimeDelta, Utc};
use mockable::Clock;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Fields whose change is flagged as significant.
pub const SIGNIFICANT_FIELDS: [&str; 4] = ["status", "priority", "due_date", "assigned_to"];

/// Default number of days a soft-deleted entity stays recoverable.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Builds immutable [`AuditEvent`] values.
///
/// The builder performs no I/O and cannot fail. Timestamps come from the
/// injected clock, truncated to microseconds so they survive a round trip
/// through `PostgreSQL` unchanged.
#[derive(Debug, Clone)]
pub struct AuditEventBuilder<C>
where
    C: Clock + Send + Sync,
{
    clock: Arc<C>,
    retention_days: u32,
}

impl<C> AuditEventBuilder<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a builder with the default retention hint.
    #[must_use]
    pub const fn new(clock: Arc<C>) -> Self {
        Self {
            clock,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }

    /// Overrides the soft-delete retention hint.
    #[must_use]
    pub const fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Returns the soft-delete retention hint in days.
    #[must_use]
    pub const fn retention_days(&self) -> u32 {
        self.retention_days
    }

    /// Builds an event for a create or update, diffing `old_state` against
    /// `new_state`.
    #[must_use]
    pub fn build_from_activity(
        &self,
        entity_id: i64,
        action: AuditAction,
        old_state: StateMap,
        new_state: StateMap,
        actor: AuditActor,
        request_context: RequestContext,
    ) -> AuditEvent {
        let diff = FieldDiff::between(&old_state, &new_state);
        let subject = subject_of(entity_id, &new_state, &old_state);
        let description = if action == AuditAction::Updated {
            format!("{subject} {} ({})", action.verb_phrase(), diff.summary())
        } else {
            format!("{subject} {}", action.verb_phrase())
        };

        AuditEvent::from_parts(AuditEventParts {
            entity_id,
            action,
            old_state,
            new_state,
            actor,
            description,
            occurred_at: self.now(),
            request_context,
            metadata: diff.into_metadata(),
        })
    }

    /// Builds an event for a soft delete, force delete, or restore of
    /// `entity_state`.
    #[must_use]
    pub fn build_from_deletion(
        &self,
        entity_id: i64,
        deletion_type: DeletionType,
        entity_state: StateMap,
        actor: AuditActor,
        request_context: RequestContext,
    ) -> AuditEvent {
        let occurred_at = self.now();
        let action = deletion_type.action();
        let description = format!(
            "{} {}",
            subject_of(entity_id, &entity_state, &StateMap::new()),
            action.verb_phrase()
        );

        let (new_state, metadata) = match deletion_type {
            DeletionType::Soft => {
                let mut deleted = entity_state.clone();
                deleted.insert("deleted_at".to_owned(), timestamp_value(occurred_at));
                let purge_after = occurred_at
                    .checked_add_signed(TimeDelta::days(i64::from(self.retention_days)))
                    .unwrap_or(occurred_at);
                let metadata = json!({
                    "deletion_type": deletion_type.as_str(),
                    "recoverable": true,
                    "retention_days": self.retention_days,
                    "retention_policy": "soft_delete",
                    "purge_after": timestamp_value(purge_after),
                });
                (deleted, metadata)
            }
            DeletionType::Force => {
                let metadata = json!({
                    "deletion_type": deletion_type.as_str(),
                    "recoverable": false,
                    "irreversible": true,
                    "audit_level": "high",
                    "retention_policy": "permanent_audit",
                });
                (StateMap::new(), metadata)
            }
            DeletionType::Restore => {
                let mut restored = entity_state.clone();
                restored.insert("deleted_at".to_owned(), Value::Null);
                let metadata = json!({
                    "deletion_type": deletion_type.as_str(),
                    "recoverable": true,
                    "restored_from": "soft_delete",
                });
                (restored, metadata)
            }
        };

        AuditEvent::from_parts(AuditEventParts {
            entity_id,
            action,
            old_state: entity_state,
            new_state,
            actor,
            description,
            occurred_at,
            request_context,
            metadata: into_map(metadata),
        })
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.utc().trunc_subsecs(6)
    }
}

/// Field-level differences between two snapshots, in key order.
struct FieldDiff {
    changes: StateMap,
    changed_fields: Vec<String>,
}

impl FieldDiff {
    fn between(old_state: &StateMap, new_state: &StateMap) -> Self {
        let keys: BTreeSet<&String> = old_state.keys().chain(new_state.keys()).collect();
        let mut changes = StateMap::new();
        let mut changed_fields = Vec::new();
        for key in keys {
            let before = old_state.get(key).cloned().unwrap_or(Value::Null);
            let after = new_state.get(key).cloned().unwrap_or(Value::Null);
            if before != after {
                changes.insert(key.clone(), json!({ "old": before, "new": after }));
                changed_fields.push(key.clone());
            }
        }
        Self {
            changes,
            changed_fields,
        }
    }

    fn summary(&self) -> String {
        match self.changed_fields.len() {
            0 => "no changes".to_owned(),
            1 => format!("1 change: {}", self.changed_fields.join(", ")),
            count => format!("{count} changes: {}", self.changed_fields.join(", ")),
        }
    }

    fn into_metadata(self) -> StateMap {
        let mut flags = StateMap::new();
        let mut any_significant = false;
        for field in SIGNIFICANT_FIELDS {
            let changed = self.changes.contains_key(field);
            any_significant |= changed;
            flags.insert(format!("{field}_changed"), Value::Bool(changed));
        }

        let mut metadata = StateMap::new();
        metadata.insert(
            "change_count".to_owned(),
            Value::from(self.changed_fields.len()),
        );
        metadata.insert(
            "changed_fields".to_owned(),
            Value::from(self.changed_fields),
        );
        metadata.insert("changes".to_owned(), Value::Object(self.changes));
        metadata.insert("significant_changes".to_owned(), Value::Object(flags));
        metadata.insert(
            "has_significant_changes".to_owned(),
            Value::Bool(any_significant),
        );
        metadata
    }
}

fn subject_of(entity_id: i64, primary: &StateMap, secondary: &StateMap) -> String {
    primary
        .get("title")
        .or_else(|| secondary.get("title"))
        .and_then(Value::as_str)
        .filter(|title| !title.trim().is_empty())
        .map_or_else(
            || format!("Task #{entity_id}"),
            |title| format!("Task \"{title}\""),
        )
}

fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn into_map(value: Value) -> StateMap {
    match value {
        Value::Object(map) => map,
        _ => StateMap::new(),
    }
}
