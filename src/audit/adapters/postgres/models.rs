//! Diesel row models for audit persistence.

use super::schema::{audit_documents, audit_log_fallbacks};
use crate::audit::{
    domain::{AuditAction, AuditDocument, FallbackRecord, StateMap},
    ports::{AuditStoreError, AuditStoreResult},
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for primary documents.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = audit_documents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DocumentRow {
    /// Document identifier.
    pub id: uuid::Uuid,
    /// Audited entity identifier.
    pub entity_id: i64,
    /// Audited action.
    pub action: String,
    /// State before the change.
    pub old_data: Value,
    /// State after the change.
    pub new_data: Value,
    /// Acting user identifier.
    pub actor_id: Option<i64>,
    /// Acting user display name.
    pub actor_name: Option<String>,
    /// Human-readable summary.
    pub description: String,
    /// Diff, flags, and request context.
    pub metadata: Value,
    /// When the change happened.
    pub created_at: DateTime<Utc>,
    /// When the document was written.
    pub updated_at: DateTime<Utc>,
}

impl DocumentRow {
    /// Converts the row back into a domain document.
    pub fn into_document(self) -> AuditStoreResult<AuditDocument> {
        let action = AuditAction::try_from(self.action.as_str())
            .map_err(|err| AuditStoreError::serialization(err.to_string()))?;
        Ok(AuditDocument {
            id: self.id,
            entity_id: self.entity_id,
            action,
            old_data: into_state_map(self.old_data, "old_data")?,
            new_data: into_state_map(self.new_data, "new_data")?,
            actor_id: self.actor_id,
            actor_name: self.actor_name,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
            metadata: into_state_map(self.metadata, "metadata")?,
        })
    }
}

/// Insert model for primary documents.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = audit_documents)]
pub struct NewDocumentRow {
    /// Document identifier.
    pub id: uuid::Uuid,
    /// Audited entity identifier.
    pub entity_id: i64,
    /// Audited action.
    pub action: String,
    /// State before the change.
    pub old_data: Value,
    /// State after the change.
    pub new_data: Value,
    /// Acting user identifier.
    pub actor_id: Option<i64>,
    /// Acting user display name.
    pub actor_name: Option<String>,
    /// Human-readable summary.
    pub description: String,
    /// Diff, flags, and request context.
    pub metadata: Value,
    /// When the change happened.
    pub created_at: DateTime<Utc>,
    /// When the document was written.
    pub updated_at: DateTime<Utc>,
}

impl From<AuditDocument> for NewDocumentRow {
    fn from(document: AuditDocument) -> Self {
        Self {
            id: document.id,
            entity_id: document.entity_id,
            action: document.action.as_str().to_owned(),
            old_data: Value::Object(document.old_data),
            new_data: Value::Object(document.new_data),
            actor_id: document.actor_id,
            actor_name: document.actor_name,
            description: document.description,
            metadata: Value::Object(document.metadata),
            created_at: document.created_at,
            updated_at: document.updated_at,
        }
    }
}

/// Query result row for fallback records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = audit_log_fallbacks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FallbackRow {
    /// Row identifier.
    pub id: i64,
    /// Audited entity identifier.
    pub entity_id: i64,
    /// Audited action.
    pub action: String,
    /// Acting user identifier.
    pub actor_id: Option<i64>,
    /// Serialized payload.
    pub payload: String,
    /// Human-readable summary.
    pub description: String,
    /// Client address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Request correlation identifier.
    pub request_id: Option<String>,
    /// HTTP method.
    pub method: Option<String>,
    /// Request URL.
    pub url: Option<String>,
    /// Error that caused the fallback.
    pub original_error: Option<String>,
    /// When the change happened.
    pub created_at: DateTime<Utc>,
    /// When the row was written.
    pub updated_at: DateTime<Utc>,
}

impl From<FallbackRow> for FallbackRecord {
    fn from(row: FallbackRow) -> Self {
        Self {
            id: row.id,
            entity_id: row.entity_id,
            action: row.action,
            actor_id: row.actor_id,
            payload: row.payload,
            description: row.description,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            request_id: row.request_id,
            method: row.method,
            url: row.url,
            original_error: row.original_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Insert model for fallback records; the identifier is assigned by the
/// database.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = audit_log_fallbacks)]
pub struct NewFallbackRow {
    /// Audited entity identifier.
    pub entity_id: i64,
    /// Audited action.
    pub action: String,
    /// Acting user identifier.
    pub actor_id: Option<i64>,
    /// Serialized payload.
    pub payload: String,
    /// Human-readable summary.
    pub description: String,
    /// Client address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Request correlation identifier.
    pub request_id: Option<String>,
    /// HTTP method.
    pub method: Option<String>,
    /// Request URL.
    pub url: Option<String>,
    /// Error that caused the fallback.
    pub original_error: Option<String>,
    /// When the change happened.
    pub created_at: DateTime<Utc>,
    /// When the row was written.
    pub updated_at: DateTime<Utc>,
}

impl From<FallbackRecord> for NewFallbackRow {
    fn from(record: FallbackRecord) -> Self {
        Self {
            entity_id: record.entity_id,
            action: record.action,
            actor_id: record.actor_id,
            payload: record.payload,
            description: record.description,
            ip_address: record.ip_address,
            user_agent: record.user_agent,
            request_id: record.request_id,
            method: record.method,
            url: record.url,
            original_error: record.original_error,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Per-action count produced by the statistics query.
#[derive(Debug, Clone, QueryableByName)]
pub struct ActionCountRow {
    /// Audited action.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub action: String,
    /// Number of events with this action.
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub total: i64,
}

fn into_state_map(value: Value, column: &str) -> AuditStoreResult<StateMap> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(StateMap::new()),
        other => Err(AuditStoreError::serialization(format!(
            "{column} must be a JSON object, found {other}"
        ))),
    }
}
