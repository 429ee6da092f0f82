//! Read-side query criteria for persisted audit events.

use super::{AuditAction, AuditEvent, AuditQueryError, StoredAuditEvent};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Hard upper bound for a single page of results.
pub const MAX_QUERY_LIMIT: u32 = 1000;

/// Inclusive creation-date window. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Inclusive lower bound.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Creates a validated range.
    ///
    /// # Errors
    ///
    /// Returns [`AuditQueryError::InvertedDateRange`] if `from` is later
    /// than `to`.
    pub fn new(
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Self, AuditQueryError> {
        if let (Some(start), Some(end)) = (from, to) {
            if start > end {
                return Err(AuditQueryError::InvertedDateRange);
            }
        }
        Ok(Self { from, to })
    }

    /// Creates an unbounded range.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            from: None,
            to: None,
        }
    }

    /// Creates the window covering the `days` days up to `now`.
    #[must_use]
    pub fn last_days(days: u32, now: DateTime<Utc>) -> Self {
        Self {
            from: Some(now - Duration::days(i64::from(days))),
            to: Some(now),
        }
    }

    /// Creates the window covering the `hours` hours up to `end`.
    #[must_use]
    pub fn last_hours(hours: u32, end: DateTime<Utc>) -> Self {
        Self {
            from: Some(end - Duration::hours(i64::from(hours))),
            to: Some(end),
        }
    }

    /// Returns `true` if `instant` lies inside the window.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| instant >= from) && self.to.is_none_or(|to| instant <= to)
    }
}

/// Whitelisted sort fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Sort by event creation time.
    #[default]
    CreatedAt,
    /// Sort by action name.
    Action,
    /// Sort by entity identifier.
    EntityId,
    /// Sort by actor identifier.
    ActorId,
}

impl SortField {
    /// Returns the canonical column name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Action => "action",
            Self::EntityId => "entity_id",
            Self::ActorId => "actor_id",
        }
    }
}

impl TryFrom<&str> for SortField {
    type Error = AuditQueryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "created_at" => Ok(Self::CreatedAt),
            "action" => Ok(Self::Action),
            "entity_id" => Ok(Self::EntityId),
            "actor_id" => Ok(Self::ActorId),
            _ => Err(AuditQueryError::UnsupportedSortField(value.to_owned())),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    #[default]
    Desc,
}

impl TryFrom<&str> for SortOrder {
    type Error = AuditQueryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(AuditQueryError::UnsupportedSortOrder(value.to_owned())),
        }
    }
}

/// Page size limits applied to incoming requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLimits {
    /// Page size used when the caller omits `limit`.
    pub default_limit: u32,
    /// Largest page size a caller may request.
    pub max_limit: u32,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: MAX_QUERY_LIMIT,
        }
    }
}

/// Action filter parameter accepting a single value or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionParam {
    /// One action, or several separated by commas.
    One(String),
    /// A list of actions.
    Many(Vec<String>),
}

/// Raw read-side query parameters as received from callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditQueryRequest {
    /// Entity identifier filter.
    pub entity_id: Option<i64>,
    /// Action filter.
    pub action: Option<ActionParam>,
    /// Actor identifier filter.
    pub actor_id: Option<i64>,
    /// Inclusive lower creation-date bound.
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper creation-date bound.
    pub date_to: Option<DateTime<Utc>>,
    /// Sort field name.
    pub sort_by: Option<String>,
    /// Sort direction name.
    pub sort_order: Option<String>,
    /// Requested page size.
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub offset: Option<u64>,
}

/// Validated audit query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditQuery {
    /// Entity identifier filter.
    pub entity_id: Option<i64>,
    /// Accepted actions; empty means any action.
    pub actions: Vec<AuditAction>,
    /// Actor identifier filter.
    pub actor_id: Option<i64>,
    /// Creation-date window.
    pub date_range: DateRange,
    /// Sort field.
    pub sort_by: SortField,
    /// Sort direction.
    pub sort_order: SortOrder,
    /// Page size, within `1..=MAX_QUERY_LIMIT`.
    pub limit: u32,
    /// Number of rows to skip.
    pub offset: u64,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            entity_id: None,
            actions: Vec::new(),
            actor_id: None,
            date_range: DateRange::unbounded(),
            sort_by: SortField::CreatedAt,
            sort_order: SortOrder::Desc,
            limit: QueryLimits::default().default_limit,
            offset: 0,
        }
    }
}

impl AuditQuery {
    /// Validates raw request parameters.
    ///
    /// # Errors
    ///
    /// Returns [`AuditQueryError`] for unknown actions, sort fields, sort
    /// orders, or an inverted date range.
    pub fn try_from_request(
        request: AuditQueryRequest,
        limits: QueryLimits,
    ) -> Result<Self, AuditQueryError> {
        let actions = match request.action {
            None => Vec::new(),
            Some(ActionParam::One(value)) => parse_actions(value.split(','))?,
            Some(ActionParam::Many(values)) => {
                parse_actions(values.iter().flat_map(|value| value.split(',')))?
            }
        };
        let sort_by = request
            .sort_by
            .as_deref()
            .map(SortField::try_from)
            .transpose()?
            .unwrap_or_default();
        let sort_order = request
            .sort_order
            .as_deref()
            .map(SortOrder::try_from)
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            entity_id: request.entity_id,
            actions,
            actor_id: request.actor_id,
            date_range: DateRange::new(request.date_from, request.date_to)?,
            sort_by,
            sort_order,
            limit: clamp_limit(request.limit, limits),
            offset: request.offset.unwrap_or(0),
        })
    }

    /// Restricts the query to one entity.
    #[must_use]
    pub const fn for_entity(mut self, entity_id: i64) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    /// Restricts the query to the given actions.
    #[must_use]
    pub fn with_actions(mut self, actions: impl IntoIterator<Item = AuditAction>) -> Self {
        self.actions = actions.into_iter().collect();
        self
    }

    /// Restricts the query to a creation-date window.
    #[must_use]
    pub const fn within(mut self, date_range: DateRange) -> Self {
        self.date_range = date_range;
        self
    }

    /// Sets the page size, clamped to `1..=MAX_QUERY_LIMIT`.
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.clamp(1, MAX_QUERY_LIMIT);
        self
    }

    /// Returns `true` if `event` satisfies every filter.
    #[must_use]
    pub fn matches(&self, event: &AuditEvent) -> bool {
        self.entity_id.is_none_or(|id| event.entity_id() == id)
            && (self.actions.is_empty() || self.actions.contains(&event.action()))
            && self.actor_id.is_none_or(|id| event.actor_id() == Some(id))
            && self.date_range.contains(event.occurred_at())
    }

    /// Sorts and paginates events that already passed [`Self::matches`].
    #[must_use]
    pub fn sort_and_page(&self, mut events: Vec<StoredAuditEvent>) -> Vec<StoredAuditEvent> {
        events.sort_by(|left, right| {
            let ordering = compare_by(self.sort_by, &left.event, &right.event);
            match self.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
        let offset = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit).unwrap_or(usize::MAX);
        events.into_iter().skip(offset).take(limit).collect()
    }
}

fn parse_actions<'a>(
    values: impl Iterator<Item = &'a str>,
) -> Result<Vec<AuditAction>, AuditQueryError> {
    let mut actions = Vec::new();
    for value in values.map(str::trim).filter(|value| !value.is_empty()) {
        let action = AuditAction::try_from(value)?;
        if !actions.contains(&action) {
            actions.push(action);
        }
    }
    Ok(actions)
}

fn clamp_limit(requested: Option<u32>, limits: QueryLimits) -> u32 {
    let ceiling = limits.max_limit.clamp(1, MAX_QUERY_LIMIT);
    requested
        .unwrap_or(limits.default_limit)
        .clamp(1, ceiling)
}

/// Orders missing actor identifiers after present ones, matching the
/// `PostgreSQL` default of `NULLS LAST` for ascending sorts.
fn compare_by(field: SortField, left: &AuditEvent, right: &AuditEvent) -> Ordering {
    match field {
        SortField::CreatedAt => left.occurred_at().cmp(&right.occurred_at()),
        SortField::Action => left.action().as_str().cmp(right.action().as_str()),
        SortField::EntityId => left.entity_id().cmp(&right.entity_id()),
        SortField::ActorId => match (left.actor_id(), right.actor_id()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}
