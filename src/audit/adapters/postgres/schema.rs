//! Diesel schema for audit persistence.

diesel::table! {
    /// Primary audit documents with structured JSON state.
    audit_documents (id) {
        /// Document identifier.
        id -> Uuid,
        /// Audited entity identifier.
        entity_id -> Int8,
        /// Audited action.
        #[max_length = 32]
        action -> Varchar,
        /// State before the change.
        old_data -> Jsonb,
        /// State after the change.
        new_data -> Jsonb,
        /// Acting user identifier.
        actor_id -> Nullable<Int8>,
        /// Acting user display name.
        actor_name -> Nullable<Text>,
        /// Human-readable summary.
        description -> Text,
        /// Diff, flags, and request context.
        metadata -> Jsonb,
        /// When the change happened.
        created_at -> Timestamptz,
        /// When the document was written.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Relational fallback rows with a serialized payload.
    audit_log_fallbacks (id) {
        /// Row identifier.
        id -> Int8,
        /// Audited entity identifier.
        entity_id -> Int8,
        /// Audited action.
        #[max_length = 32]
        action -> Varchar,
        /// Acting user identifier.
        actor_id -> Nullable<Int8>,
        /// JSON text holding state, metadata, and actor name.
        payload -> Text,
        /// Human-readable summary.
        description -> Text,
        /// Client address.
        #[max_length = 45]
        ip_address -> Nullable<Varchar>,
        /// Client user agent.
        user_agent -> Nullable<Text>,
        /// Request correlation identifier.
        #[max_length = 255]
        request_id -> Nullable<Varchar>,
        /// HTTP method.
        #[max_length = 16]
        method -> Nullable<Varchar>,
        /// Request URL.
        url -> Nullable<Text>,
        /// Error that caused the fallback.
        original_error -> Nullable<Text>,
        /// When the change happened.
        created_at -> Timestamptz,
        /// When the row was written.
        updated_at -> Timestamptz,
    }
}
