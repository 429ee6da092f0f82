//! The immutable audit event value.

use super::{AuditAction, AuditActor, RequestContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered key/value snapshot of entity state.
pub type StateMap = Map<String, Value>;

/// Parameter object for assembling an [`AuditEvent`].
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEventParts {
    /// Identifier of the audited entity.
    pub entity_id: i64,
    /// Action that was performed.
    pub action: AuditAction,
    /// Entity state before the change.
    pub old_state: StateMap,
    /// Entity state after the change.
    pub new_state: StateMap,
    /// Actor responsible for the change.
    pub actor: AuditActor,
    /// Human-readable summary.
    pub description: String,
    /// When the change happened.
    pub occurred_at: DateTime<Utc>,
    /// HTTP request provenance.
    pub request_context: RequestContext,
    /// Derived metadata such as the field diff.
    pub metadata: StateMap,
}

/// Immutable record of one domain state change.
///
/// Events are constructed once by the event builder (or reconstructed from
/// storage) and expose read-only accessors only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    entity_id: i64,
    action: AuditAction,
    old_state: StateMap,
    new_state: StateMap,
    actor: AuditActor,
    description: String,
    occurred_at: DateTime<Utc>,
    request_context: RequestContext,
    metadata: StateMap,
}

impl AuditEvent {
    /// Assembles an event from its parts.
    #[must_use]
    pub fn from_parts(parts: AuditEventParts) -> Self {
        Self {
            entity_id: parts.entity_id,
            action: parts.action,
            old_state: parts.old_state,
            new_state: parts.new_state,
            actor: parts.actor,
            description: parts.description,
            occurred_at: parts.occurred_at,
            request_context: parts.request_context,
            metadata: parts.metadata,
        }
    }

    /// Returns the audited entity identifier.
    #[must_use]
    pub const fn entity_id(&self) -> i64 {
        self.entity_id
    }

    /// Returns the audited action.
    #[must_use]
    pub const fn action(&self) -> AuditAction {
        self.action
    }

    /// Returns the state before the change.
    #[must_use]
    pub const fn old_state(&self) -> &StateMap {
        &self.old_state
    }

    /// Returns the state after the change.
    #[must_use]
    pub const fn new_state(&self) -> &StateMap {
        &self.new_state
    }

    /// Returns the responsible actor.
    #[must_use]
    pub const fn actor(&self) -> &AuditActor {
        &self.actor
    }

    /// Returns the actor identifier, if known.
    #[must_use]
    pub const fn actor_id(&self) -> Option<i64> {
        self.actor.id
    }

    /// Returns the actor display name, if known.
    #[must_use]
    pub fn actor_name(&self) -> Option<&str> {
        self.actor.name.as_deref()
    }

    /// Returns the human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns when the change happened.
    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    /// Returns the captured request context.
    #[must_use]
    pub const fn request_context(&self) -> &RequestContext {
        &self.request_context
    }

    /// Returns the derived metadata.
    #[must_use]
    pub const fn metadata(&self) -> &StateMap {
        &self.metadata
    }

    /// Returns `true` when exactly one of the state snapshots is populated.
    ///
    /// Such events represent a creation or a destructive deletion.
    #[must_use]
    pub fn is_one_sided(&self) -> bool {
        self.old_state.is_empty() != self.new_state.is_empty()
    }

    /// Returns the payload stored by text-based sinks.
    #[must_use]
    pub fn payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("old_state".to_owned(), Value::Object(self.old_state.clone()));
        payload.insert("new_state".to_owned(), Value::Object(self.new_state.clone()));
        payload.insert("metadata".to_owned(), Value::Object(self.metadata.clone()));
        payload.insert(
            "actor_name".to_owned(),
            self.actor
                .name
                .clone()
                .map_or(Value::Null, Value::String),
        );
        payload.insert(
            "occurred_at".to_owned(),
            Value::String(self.occurred_at.to_rfc3339()),
        );
        Value::Object(payload)
    }
}
