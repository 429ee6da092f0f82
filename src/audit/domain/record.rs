//! Persisted shapes of audit events.
//!
//! The primary store keeps documents with structured JSON columns while the
//! relational fallback table keeps a flat row with a text payload. Both
//! convert losslessly back into [`AuditEvent`] values for the read side.

use super::{
    AuditAction, AuditActor, AuditDomainError, AuditEvent, AuditEventParts, RequestContext,
    SinkKind, StateMap,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

const REQUEST_CONTEXT_KEY: &str = "request_context";

/// Identifier of a persisted audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "store", content = "id", rename_all = "snake_case")]
pub enum AuditRecordId {
    /// Document identifier in the primary store.
    Document(Uuid),
    /// Row identifier in the relational fallback table.
    Fallback(i64),
}

impl fmt::Display for AuditRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document(id) => write!(f, "document:{id}"),
            Self::Fallback(id) => write!(f, "fallback:{id}"),
        }
    }
}

/// An audit event read back from a store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredAuditEvent {
    /// Record identifier.
    pub id: AuditRecordId,
    /// The reconstructed event.
    pub event: AuditEvent,
    /// Sink the record was read from.
    pub source: SinkKind,
}

/// Primary store document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditDocument {
    /// Document identifier.
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// Audited entity identifier.
    pub entity_id: i64,
    /// Audited action.
    pub action: AuditAction,
    /// State before the change.
    pub old_data: StateMap,
    /// State after the change.
    pub new_data: StateMap,
    /// Actor identifier.
    pub actor_id: Option<i64>,
    /// Actor display name.
    pub actor_name: Option<String>,
    /// Human-readable summary.
    pub description: String,
    /// When the change happened.
    pub created_at: DateTime<Utc>,
    /// When the document was written.
    pub updated_at: DateTime<Utc>,
    /// Event metadata plus the request context.
    pub metadata: StateMap,
}

impl AuditDocument {
    /// Builds a document for `event`, written at `now`.
    #[must_use]
    pub fn from_event(id: Uuid, event: &AuditEvent, now: DateTime<Utc>) -> Self {
        let mut metadata = event.metadata().clone();
        let context = event.request_context();
        if !context.is_empty() {
            metadata.insert(
                REQUEST_CONTEXT_KEY.to_owned(),
                Value::Object(context.to_map()),
            );
        }

        Self {
            id,
            entity_id: event.entity_id(),
            action: event.action(),
            old_data: event.old_state().clone(),
            new_data: event.new_state().clone(),
            actor_id: event.actor_id(),
            actor_name: event.actor_name().map(str::to_owned),
            description: event.description().to_owned(),
            created_at: event.occurred_at(),
            updated_at: now,
            metadata,
        }
    }

    /// Reconstructs the event stored in this document.
    ///
    /// # Errors
    ///
    /// Returns [`AuditDomainError::MalformedPayload`] if the embedded
    /// request context cannot be decoded.
    pub fn into_event(self) -> Result<AuditEvent, AuditDomainError> {
        let mut metadata = self.metadata;
        let request_context = match metadata.remove(REQUEST_CONTEXT_KEY) {
            Some(value) => serde_json::from_value::<RequestContext>(value)
                .map_err(|err| AuditDomainError::MalformedPayload(err.to_string()))?,
            None => RequestContext::empty(),
        };

        Ok(AuditEvent::from_parts(AuditEventParts {
            entity_id: self.entity_id,
            action: self.action,
            old_state: self.old_data,
            new_state: self.new_data,
            actor: AuditActor {
                id: self.actor_id,
                name: self.actor_name,
            },
            description: self.description,
            occurred_at: self.created_at,
            request_context,
            metadata,
        }))
    }
}

/// Row of the relational fallback table.
///
/// `id` is zero until the store assigns one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackRecord {
    /// Auto-incremented row identifier.
    pub id: i64,
    /// Audited entity identifier.
    pub entity_id: i64,
    /// Audited action.
    pub action: String,
    /// Actor identifier.
    pub actor_id: Option<i64>,
    /// JSON text holding old state, new state, and metadata.
    pub payload: String,
    /// Human-readable summary.
    pub description: String,
    /// Client IP address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Request identifier.
    pub request_id: Option<String>,
    /// HTTP method.
    pub method: Option<String>,
    /// Request URL.
    pub url: Option<String>,
    /// Error that caused the primary write to be abandoned.
    pub original_error: Option<String>,
    /// When the change happened.
    pub created_at: DateTime<Utc>,
    /// When the row was written.
    pub updated_at: DateTime<Utc>,
}

impl FallbackRecord {
    /// Builds an unsaved row for `event`, written at `now`.
    #[must_use]
    pub fn from_event(
        event: &AuditEvent,
        original_error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        let context = event.request_context();
        Self {
            id: 0,
            entity_id: event.entity_id(),
            action: event.action().as_str().to_owned(),
            actor_id: event.actor_id(),
            payload: event.payload().to_string(),
            description: event.description().to_owned(),
            ip_address: context.ip.clone(),
            user_agent: context.user_agent.clone(),
            request_id: context.request_id.clone(),
            method: context.method.clone(),
            url: context.url.clone(),
            original_error: original_error.map(str::to_owned),
            created_at: event.occurred_at(),
            updated_at: now,
        }
    }

    /// Returns a copy carrying the store-assigned identifier.
    #[must_use]
    pub const fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    /// Reconstructs the event stored in this row.
    ///
    /// # Errors
    ///
    /// Returns [`AuditDomainError`] if the action is unknown or the payload
    /// is not the expected JSON object.
    pub fn to_event(&self) -> Result<AuditEvent, AuditDomainError> {
        let action = AuditAction::try_from(self.action.as_str())?;
        let payload: Value = serde_json::from_str(&self.payload)
            .map_err(|err| AuditDomainError::MalformedPayload(err.to_string()))?;

        Ok(AuditEvent::from_parts(AuditEventParts {
            entity_id: self.entity_id,
            action,
            old_state: object_field(&payload, "old_state")?,
            new_state: object_field(&payload, "new_state")?,
            actor: AuditActor {
                id: self.actor_id,
                name: payload
                    .get("actor_name")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
            },
            description: self.description.clone(),
            occurred_at: self.created_at,
            request_context: RequestContext {
                ip: self.ip_address.clone(),
                user_agent: self.user_agent.clone(),
                request_id: self.request_id.clone(),
                method: self.method.clone(),
                url: self.url.clone(),
            },
            metadata: object_field(&payload, "metadata")?,
        }))
    }
}

fn object_field(payload: &Value, key: &str) -> Result<StateMap, AuditDomainError> {
    match payload.get(key) {
        None | Some(Value::Null) => Ok(StateMap::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(AuditDomainError::MalformedPayload(format!(
            "payload field '{key}' is not an object"
        ))),
    }
}
