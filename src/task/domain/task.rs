//! Task aggregate root and related lifecycle types.

use super::{ParseTaskFieldError, TaskDomainError, TaskId};
use crate::audit::domain::StateMap;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Task workflow status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Work has not started.
    #[default]
    Pending,
    /// Work is under way.
    InProgress,
    /// Work is finished.
    Completed,
    /// Work was abandoned.
    Cancelled,
}

impl TaskStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskFieldError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseTaskFieldError {
                field: "status",
                value: value.to_owned(),
            }),
        }
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Can wait.
    Low,
    /// Normal priority.
    #[default]
    Medium,
    /// Should be picked up soon.
    High,
    /// Needs attention now.
    Urgent,
}

impl TaskPriority {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl TryFrom<&str> for TaskPriority {
    type Error = ParseTaskFieldError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(ParseTaskFieldError {
                field: "priority",
                value: value.to_owned(),
            }),
        }
    }
}

/// Instruction for one field of a [`TaskUpdate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<T> {
    /// Leave the field as it is.
    Keep,
    /// Replace the field.
    Set(T),
}

impl<T> Default for Change<T> {
    fn default() -> Self {
        Self::Keep
    }
}

impl<T> Change<T> {
    fn apply_to(self, target: &mut T) {
        if let Self::Set(value) = self {
            *target = value;
        }
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    /// Title; must not be blank.
    pub title: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Initial priority.
    pub priority: TaskPriority,
    /// Optional due date.
    pub due_date: Option<NaiveDate>,
    /// Assigned user identifier.
    pub assigned_to: Option<i64>,
}

impl NewTask {
    /// Creates input with the given title and default priority.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority: TaskPriority::default(),
            due_date: None,
            assigned_to: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the due date.
    #[must_use]
    pub const fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Assigns the task to a user.
    #[must_use]
    pub const fn with_assignee(mut self, user_id: i64) -> Self {
        self.assigned_to = Some(user_id);
        self
    }
}

/// Partial update of a task. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    /// New title.
    pub title: Change<String>,
    /// New description, or `Set(None)` to clear it.
    pub description: Change<Option<String>>,
    /// New status.
    pub status: Change<TaskStatus>,
    /// New priority.
    pub priority: Change<TaskPriority>,
    /// New due date, or `Set(None)` to clear it.
    pub due_date: Change<Option<NaiveDate>>,
    /// New assignee, or `Set(None)` to unassign.
    pub assigned_to: Change<Option<i64>>,
}

impl TaskUpdate {
    /// Replaces the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Change::Set(title.into());
        self
    }

    /// Replaces or clears the description.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = Change::Set(description);
        self
    }

    /// Replaces the status.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Change::Set(status);
        self
    }

    /// Replaces the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = Change::Set(priority);
        self
    }

    /// Replaces or clears the due date.
    #[must_use]
    pub const fn with_due_date(mut self, due_date: Option<NaiveDate>) -> Self {
        self.due_date = Change::Set(due_date);
        self
    }

    /// Reassigns or unassigns the task.
    #[must_use]
    pub const fn with_assignee(mut self, user_id: Option<i64>) -> Self {
        self.assigned_to = Change::Set(user_id);
        self
    }
}

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    title: String,
    description: Option<String>,
    status: TaskStatus,
    priority: TaskPriority,
    due_date: Option<NaiveDate>,
    assigned_to: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates a pending task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] if the title is blank.
    pub fn create(
        id: TaskId,
        input: NewTask,
        clock: &impl Clock,
    ) -> Result<Self, TaskDomainError> {
        let title = validated_title(&input.title)?;
        let timestamp = clock.utc();
        Ok(Self {
            id,
            title,
            description: input.description,
            status: TaskStatus::Pending,
            priority: input.priority,
            due_date: input.due_date,
            assigned_to: input.assigned_to,
            created_at: timestamp,
            updated_at: timestamp,
            deleted_at: None,
        })
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the priority.
    #[must_use]
    pub const fn priority(&self) -> TaskPriority {
        self.priority
    }

    /// Returns the due date, if any.
    #[must_use]
    pub const fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    /// Returns the assigned user identifier, if any.
    #[must_use]
    pub const fn assigned_to(&self) -> Option<i64> {
        self.assigned_to
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest modification timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns when the task was soft-deleted, if it was.
    #[must_use]
    pub const fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    /// Returns `true` if the task is soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Applies a partial update.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::Deleted`] for a soft-deleted task and
    /// [`TaskDomainError::EmptyTitle`] if the new title is blank. The task
    /// is left unchanged on error.
    pub fn apply(
        &mut self,
        update: TaskUpdate,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        if self.is_deleted() {
            return Err(TaskDomainError::Deleted(self.id));
        }
        let title = match update.title {
            Change::Set(title) => Change::Set(validated_title(&title)?),
            Change::Keep => Change::Keep,
        };

        title.apply_to(&mut self.title);
        update.description.apply_to(&mut self.description);
        update.status.apply_to(&mut self.status);
        update.priority.apply_to(&mut self.priority);
        update.due_date.apply_to(&mut self.due_date);
        update.assigned_to.apply_to(&mut self.assigned_to);
        self.touch(clock);
        Ok(())
    }

    /// Marks the task as deleted.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::AlreadyDeleted`] if it already is.
    pub fn soft_delete(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        if self.is_deleted() {
            return Err(TaskDomainError::AlreadyDeleted(self.id));
        }
        self.deleted_at = Some(clock.utc());
        self.touch(clock);
        Ok(())
    }

    /// Clears the deletion mark.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::NotDeleted`] for a live task.
    pub fn restore(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        if !self.is_deleted() {
            return Err(TaskDomainError::NotDeleted(self.id));
        }
        self.deleted_at = None;
        self.touch(clock);
        Ok(())
    }

    /// Renders the business fields as an audit snapshot.
    ///
    /// `created_at` and `updated_at` are left out so update diffs only list
    /// fields a user changed.
    #[must_use]
    pub fn to_state_map(&self) -> StateMap {
        let mut state = StateMap::new();
        state.insert("id".to_owned(), Value::from(self.id.value()));
        state.insert("title".to_owned(), Value::from(self.title.as_str()));
        state.insert(
            "description".to_owned(),
            self.description.clone().map_or(Value::Null, Value::String),
        );
        state.insert("status".to_owned(), Value::from(self.status.as_str()));
        state.insert("priority".to_owned(), Value::from(self.priority.as_str()));
        state.insert(
            "due_date".to_owned(),
            self.due_date.map_or(Value::Null, |date| {
                Value::String(date.format("%Y-%m-%d").to_string())
            }),
        );
        state.insert(
            "assigned_to".to_owned(),
            self.assigned_to.map_or(Value::Null, Value::from),
        );
        state.insert(
            "deleted_at".to_owned(),
            self.deleted_at.map_or(Value::Null, |at| {
                Value::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }),
        );
        state
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}

fn validated_title(title: &str) -> Result<String, TaskDomainError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TaskDomainError::EmptyTitle);
    }
    Ok(trimmed.to_owned())
}
