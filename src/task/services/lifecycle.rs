//! Service layer for audited task lifecycle operations.

use crate::audit::{
    domain::{AuditAction, AuditActor, AuditEvent, DeletionType, RequestContext, StateMap},
    ports::AuditRecorder,
    services::AuditEventBuilder,
};
use crate::config::AuditConfigHandle;
use crate::task::{
    domain::{NewTask, Task, TaskDomainError, TaskId, TaskUpdate},
    ports::{TaskRepository, TaskRepositoryError},
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Who made a change and through which request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeContext {
    /// Acting user.
    pub actor: AuditActor,
    /// Request provenance.
    pub request: RequestContext,
}

impl ChangeContext {
    /// Creates a context for `actor` with no request information.
    #[must_use]
    pub const fn new(actor: AuditActor) -> Self {
        Self {
            actor,
            request: RequestContext::empty(),
        }
    }

    /// Creates a context for changes made by the system itself.
    #[must_use]
    pub const fn system() -> Self {
        Self::new(AuditActor::anonymous())
    }

    /// Attaches request provenance.
    #[must_use]
    pub fn with_request(mut self, request: RequestContext) -> Self {
        self.request = request;
        self
    }
}

/// Service-level errors for task lifecycle operations.
#[derive(Debug, Error)]
pub enum TaskLifecycleError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
    /// No task has the requested identifier.
    #[error("task not found: {0}")]
    NotFound(TaskId),
}

/// Result type for task lifecycle service operations.
pub type TaskLifecycleResult<T> = Result<T, TaskLifecycleError>;

/// Task lifecycle orchestration service.
///
/// Every mutation is committed to the repository first and then recorded
/// through the audit recorder. Recording cannot fail; an event that missed
/// the primary store is logged but never changes the operation's result.
#[derive(Clone)]
pub struct TaskLifecycleService<R, A, C>
where
    R: TaskRepository,
    A: AuditRecorder,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    recorder: Arc<A>,
    builder: AuditEventBuilder<C>,
    config: Option<AuditConfigHandle>,
    clock: Arc<C>,
}

impl<R, A, C> TaskLifecycleService<R, A, C>
where
    R: TaskRepository,
    A: AuditRecorder,
    C: Clock + Send + Sync,
{
    /// Creates a new task lifecycle service.
    #[must_use]
    pub fn new(repository: Arc<R>, recorder: Arc<A>, clock: Arc<C>) -> Self {
        Self {
            repository,
            recorder,
            builder: AuditEventBuilder::new(Arc::clone(&clock)),
            config: None,
            clock,
        }
    }

    /// Overrides the retention hint recorded with soft deletions.
    #[must_use]
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.builder = self.builder.with_retention_days(days);
        self
    }

    /// Reads the retention hint from `config` at every deletion, so a
    /// reload applies to the next one. Takes precedence over
    /// [`Self::with_retention_days`].
    #[must_use]
    pub fn with_config(mut self, config: AuditConfigHandle) -> Self {
        self.config = Some(config);
        self
    }

    /// Creates a task and records a `created` event.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError`] when validation fails or the
    /// repository rejects persistence.
    pub async fn create(
        &self,
        input: NewTask,
        context: &ChangeContext,
    ) -> TaskLifecycleResult<Task> {
        let id = self.repository.next_id().await?;
        let task = Task::create(id, input, &*self.clock)?;
        self.repository.store(&task).await?;

        let event = self.builder.build_from_activity(
            id.value(),
            AuditAction::Created,
            StateMap::new(),
            task.to_state_map(),
            context.actor.clone(),
            context.request.clone(),
        );
        self.record(event).await;
        Ok(task)
    }

    /// Applies a partial update and records an `updated` event with the
    /// field diff.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] for an unknown task and
    /// [`TaskLifecycleError::Domain`] when the update is rejected.
    pub async fn update(
        &self,
        id: TaskId,
        update: TaskUpdate,
        context: &ChangeContext,
    ) -> TaskLifecycleResult<Task> {
        let mut task = self.load(id).await?;
        let before = task.to_state_map();
        task.apply(update, &*self.clock)?;
        self.repository.update(&task).await?;

        let event = self.builder.build_from_activity(
            id.value(),
            AuditAction::Updated,
            before,
            task.to_state_map(),
            context.actor.clone(),
            context.request.clone(),
        );
        self.record(event).await;
        Ok(task)
    }

    /// Soft-deletes a task and records a `deleted` event.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] for an unknown task and
    /// [`TaskDomainError::AlreadyDeleted`] if it is already deleted.
    pub async fn delete(
        &self,
        id: TaskId,
        context: &ChangeContext,
    ) -> TaskLifecycleResult<Task> {
        let mut task = self.load(id).await?;
        let before = task.to_state_map();
        task.soft_delete(&*self.clock)?;
        self.repository.update(&task).await?;

        self.record_deletion(id, DeletionType::Soft, before, context)
            .await;
        Ok(task)
    }

    /// Restores a soft-deleted task and records a `restored` event.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] for an unknown task and
    /// [`TaskDomainError::NotDeleted`] if it is not deleted.
    pub async fn restore(
        &self,
        id: TaskId,
        context: &ChangeContext,
    ) -> TaskLifecycleResult<Task> {
        let mut task = self.load(id).await?;
        let before = task.to_state_map();
        task.restore(&*self.clock)?;
        self.repository.update(&task).await?;

        self.record_deletion(id, DeletionType::Restore, before, context)
            .await;
        Ok(task)
    }

    /// Permanently removes a task, deleted or not, and records a
    /// `force_deleted` event. Returns the removed task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] for an unknown task.
    pub async fn force_delete(
        &self,
        id: TaskId,
        context: &ChangeContext,
    ) -> TaskLifecycleResult<Task> {
        let task = self.load(id).await?;
        self.repository.remove(id).await?;

        self.record_deletion(id, DeletionType::Force, task.to_state_map(), context)
            .await;
        Ok(task)
    }

    /// Retrieves a task, including soft-deleted ones.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when lookup fails.
    pub async fn find_by_id(&self, id: TaskId) -> TaskLifecycleResult<Option<Task>> {
        Ok(self.repository.find_by_id(id).await?)
    }

    /// Lists tasks ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when lookup fails.
    pub async fn list(&self, include_deleted: bool) -> TaskLifecycleResult<Vec<Task>> {
        Ok(self.repository.list(include_deleted).await?)
    }

    async fn load(&self, id: TaskId) -> TaskLifecycleResult<Task> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(TaskLifecycleError::NotFound(id))
    }

    async fn record_deletion(
        &self,
        id: TaskId,
        deletion_type: DeletionType,
        state: StateMap,
        context: &ChangeContext,
    ) {
        let event = self.deletion_builder().build_from_deletion(
            id.value(),
            deletion_type,
            state,
            context.actor.clone(),
            context.request.clone(),
        );
        self.record(event).await;
    }

    fn deletion_builder(&self) -> AuditEventBuilder<C> {
        let retention_days = self.config.as_ref().map_or_else(
            || self.builder.retention_days(),
            |config| config.snapshot().retention.soft_delete_days,
        );
        AuditEventBuilder::new(Arc::clone(&self.clock)).with_retention_days(retention_days)
    }

    async fn record(&self, event: AuditEvent) {
        let entity_id = event.entity_id();
        let action = event.action();
        let outcome = self.recorder.record(event).await;
        if outcome.sink().is_fallback() {
            warn!(
                entity_id,
                action = %action,
                sink = %outcome.sink(),
                attempts = outcome.attempts(),
                terminal_failure = outcome.is_terminal_failure(),
                "audit event missed the primary store"
            );
        }
    }
}
