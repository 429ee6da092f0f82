//! Reading the audit trail back after task activity.

use super::helpers::Stack;
use chrono::TimeDelta;
use rstest::{fixture, rstest};
use tasktrail::audit::{
    domain::{
        ActionParam, AuditAction, AuditActor, AuditQueryError, AuditQueryRequest, SinkKind,
    },
    services::QuerySource,
};
use tasktrail::task::{
    domain::{NewTask, TaskId, TaskStatus, TaskUpdate},
    services::ChangeContext,
};

#[fixture]
fn stack() -> Stack {
    Stack::new().expect("in-memory stack")
}

/// Creates two tasks as different actors and updates and deletes the first.
async fn seed(stack: &Stack) -> eyre::Result<(TaskId, TaskId)> {
    let ada = ChangeContext::new(AuditActor::new(7, "Ada"));
    let grace = ChangeContext::new(AuditActor::new(8, "Grace"));

    let first = stack.tasks.create(NewTask::new("Write report"), &ada).await?;
    stack.clock.advance(TimeDelta::hours(1));
    let second = stack.tasks.create(NewTask::new("Review report"), &grace).await?;
    stack.clock.advance(TimeDelta::hours(1));
    stack
        .tasks
        .update(
            first.id(),
            TaskUpdate::default().with_status(TaskStatus::Completed),
            &grace,
        )
        .await?;
    stack.clock.advance(TimeDelta::hours(1));
    stack.tasks.delete(first.id(), &ada).await?;
    Ok((first.id(), second.id()))
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn find_filters_by_action_list_and_actor(stack: Stack) -> eyre::Result<()> {
    seed(&stack).await?;

    let page = stack
        .queries
        .find(AuditQueryRequest {
            action: Some(ActionParam::One("created,deleted".to_owned())),
            actor_id: Some(7),
            ..AuditQueryRequest::default()
        })
        .await?;

    assert_eq!(page.source, QuerySource::Primary);
    assert_eq!(page.total_count, 2);
    let actions: Vec<AuditAction> = page
        .events
        .iter()
        .map(|stored| stored.event.action())
        .collect();
    assert_eq!(actions, vec![AuditAction::Deleted, AuditAction::Created]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn find_pages_with_offset_and_ascending_order(stack: Stack) -> eyre::Result<()> {
    seed(&stack).await?;

    let page = stack
        .queries
        .find(AuditQueryRequest {
            sort_order: Some("asc".to_owned()),
            limit: Some(2),
            offset: Some(1),
            ..AuditQueryRequest::default()
        })
        .await?;

    assert_eq!(page.total_count, 4);
    assert_eq!(page.limit, 2);
    let descriptions: Vec<&str> = page
        .events
        .iter()
        .map(|stored| stored.event.description())
        .collect();
    assert_eq!(
        descriptions,
        vec![
            "Task \"Review report\" was created",
            "Task \"Write report\" was updated (1 change: status)",
        ]
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_parameters_are_rejected(stack: Stack) -> eyre::Result<()> {
    let unknown_action = stack
        .queries
        .find(AuditQueryRequest {
            action: Some(ActionParam::One("archived".to_owned())),
            ..AuditQueryRequest::default()
        })
        .await;
    let bad_sort = stack
        .queries
        .find(AuditQueryRequest {
            sort_by: Some("description".to_owned()),
            ..AuditQueryRequest::default()
        })
        .await;

    assert!(matches!(unknown_action, Err(AuditQueryError::UnknownAction(_))));
    assert!(matches!(bad_sort, Err(AuditQueryError::UnsupportedSortField(_))));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn statistics_count_actions_and_recent_activity(stack: Stack) -> eyre::Result<()> {
    seed(&stack).await?;

    let stats = stack.queries.statistics_for_last_days(30).await?;

    assert_eq!(stats.source, QuerySource::Primary);
    assert_eq!(stats.total, 4);
    assert_eq!(stats.counts_by_action.get(&AuditAction::Created), Some(&2));
    assert_eq!(stats.counts_by_action.get(&AuditAction::Updated), Some(&1));
    assert_eq!(stats.counts_by_action.get(&AuditAction::Deleted), Some(&1));
    assert_eq!(stats.recent_count, 4);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn outage_reads_only_what_the_fallback_table_holds(stack: Stack) -> eyre::Result<()> {
    let (first, _) = seed(&stack).await?;
    stack.primary.set_unreachable(true)?;
    stack.clock.advance(TimeDelta::hours(1));
    stack
        .tasks
        .restore(first, &ChangeContext::system())
        .await?;

    let history = stack.queries.entity_history(first.value(), None).await?;
    let stats = stack.queries.statistics_for_last_days(30).await?;

    assert_eq!(history.source, QuerySource::DEGRADED);
    assert!(history.source.is_degraded());
    let [stored] = history.events.as_slice() else {
        eyre::bail!("expected one degraded event, found {}", history.events.len());
    };
    assert_eq!(stored.event.action(), AuditAction::Restored);
    assert_eq!(stored.source, SinkKind::FallbackRelational);
    assert_eq!(stats.source, QuerySource::DEGRADED);
    assert_eq!(stats.total, 1);
    Ok(())
}
