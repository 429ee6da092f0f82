//! Task operations recorded through the full write path.

use super::helpers::Stack;
use chrono::TimeDelta;
use rstest::{fixture, rstest};
use tasktrail::audit::domain::{AuditAction, AuditActor, RequestContext, SinkKind};
use tasktrail::task::{
    domain::{NewTask, TaskPriority, TaskStatus, TaskUpdate},
    services::ChangeContext,
};

#[fixture]
fn stack() -> Stack {
    Stack::new().expect("in-memory stack")
}

#[fixture]
fn context() -> ChangeContext {
    ChangeContext::new(AuditActor::new(7, "Ada")).with_request(
        RequestContext::empty()
            .with_ip("10.0.0.1")
            .with_method("PATCH")
            .with_request_id("req-42"),
    )
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn full_lifecycle_lands_in_primary_store(
    stack: Stack,
    context: ChangeContext,
) -> eyre::Result<()> {
    let created = stack
        .tasks
        .create(NewTask::new("Write report"), &context)
        .await?;
    let id = created.id();
    stack.clock.advance(TimeDelta::minutes(1));
    stack
        .tasks
        .update(
            id,
            TaskUpdate::default().with_status(TaskStatus::InProgress),
            &context,
        )
        .await?;
    stack.clock.advance(TimeDelta::minutes(1));
    stack.tasks.delete(id, &context).await?;
    stack.clock.advance(TimeDelta::minutes(1));
    stack.tasks.restore(id, &context).await?;
    stack.clock.advance(TimeDelta::minutes(1));
    stack.tasks.force_delete(id, &context).await?;

    assert_eq!(stack.primary.documents()?.len(), 5);
    assert!(stack.table.records()?.is_empty());
    assert!(stack.fallback_log_lines()?.is_empty());
    assert!(stack.stderr.contents().is_empty());

    let history = stack.queries.entity_history(id.value(), None).await?;
    let actions: Vec<AuditAction> = history
        .events
        .iter()
        .map(|stored| stored.event.action())
        .collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::ForceDeleted,
            AuditAction::Restored,
            AuditAction::Deleted,
            AuditAction::Updated,
            AuditAction::Created,
        ]
    );
    assert!(
        history
            .events
            .iter()
            .all(|stored| stored.source == SinkKind::Primary)
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn update_description_summarises_changed_fields(
    stack: Stack,
    context: ChangeContext,
) -> eyre::Result<()> {
    let created = stack
        .tasks
        .create(NewTask::new("Write report"), &context)
        .await?;
    stack.clock.advance(TimeDelta::minutes(5));
    let update = TaskUpdate::default()
        .with_status(TaskStatus::InProgress)
        .with_priority(TaskPriority::Urgent);
    stack.tasks.update(created.id(), update, &context).await?;

    let history = stack.queries.entity_history(created.id().value(), Some(1)).await?;
    let latest = history
        .events
        .first()
        .ok_or_else(|| eyre::eyre!("expected an update event"))?;
    assert_eq!(
        latest.event.description(),
        "Task \"Write report\" was updated (2 changes: priority, status)"
    );
    assert_eq!(
        latest.event.metadata().get("has_significant_changes"),
        Some(&serde_json::Value::Bool(true))
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn request_context_and_actor_survive_storage(
    stack: Stack,
    context: ChangeContext,
) -> eyre::Result<()> {
    let created = stack
        .tasks
        .create(NewTask::new("Write report"), &context)
        .await?;

    let history = stack.queries.entity_history(created.id().value(), None).await?;
    let stored = history
        .events
        .first()
        .ok_or_else(|| eyre::eyre!("expected a created event"))?;
    assert_eq!(stored.event.actor_id(), Some(7));
    assert_eq!(stored.event.actor_name(), Some("Ada"));
    assert_eq!(stored.event.request_context(), &context.request);
    assert_eq!(stored.event.description(), "Task \"Write report\" was created");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn soft_delete_carries_configured_retention(context: ChangeContext) -> eyre::Result<()> {
    let mut config = tasktrail::config::AuditConfig::fast();
    config.retention.soft_delete_days = 7;
    let stack = Stack::with_config(config)?;

    let created = stack
        .tasks
        .create(NewTask::new("Write report"), &context)
        .await?;
    stack.clock.advance(TimeDelta::seconds(1));
    stack.tasks.delete(created.id(), &context).await?;

    let history = stack.queries.entity_history(created.id().value(), Some(1)).await?;
    let deleted = history
        .events
        .first()
        .ok_or_else(|| eyre::eyre!("expected a deleted event"))?;
    assert_eq!(deleted.event.action(), AuditAction::Deleted);
    assert_eq!(
        deleted.event.metadata().get("retention_days"),
        Some(&serde_json::Value::from(7))
    );
    assert_eq!(
        deleted.event.metadata().get("purge_after"),
        Some(&serde_json::Value::from("2026-10-25T09:30:01Z"))
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reloaded_retention_applies_to_the_next_deletion(
    stack: Stack,
    context: ChangeContext,
) -> eyre::Result<()> {
    let first = stack.tasks.create(NewTask::new("Write report"), &context).await?;
    let second = stack.tasks.create(NewTask::new("Review report"), &context).await?;
    stack.tasks.delete(first.id(), &context).await?;

    let mut reloaded = stack.config.snapshot();
    reloaded.retention.soft_delete_days = 90;
    stack.config.reload(reloaded)?;
    stack.tasks.delete(second.id(), &context).await?;

    let retention_of = |history: &tasktrail::audit::services::AuditPage| {
        history
            .events
            .first()
            .and_then(|stored| stored.event.metadata().get("retention_days").cloned())
    };
    let before = stack.queries.entity_history(first.id().value(), Some(1)).await?;
    let after = stack.queries.entity_history(second.id().value(), Some(1)).await?;
    assert_eq!(retention_of(&before), Some(serde_json::Value::from(30)));
    assert_eq!(retention_of(&after), Some(serde_json::Value::from(90)));
    Ok(())
}
