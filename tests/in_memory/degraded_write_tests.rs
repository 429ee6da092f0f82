//! Fallback cascade behaviour observed through task operations.

use super::helpers::Stack;
use rstest::{fixture, rstest};
use tasktrail::audit::ports::AuditStoreError;
use tasktrail::config::AuditConfig;
use tasktrail::task::{
    domain::{NewTask, TaskStatus, TaskUpdate},
    services::ChangeContext,
};

#[fixture]
fn stack() -> Stack {
    Stack::new().expect("in-memory stack")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn transient_failures_are_absorbed_by_retries(stack: Stack) -> eyre::Result<()> {
    stack
        .primary
        .fail_next(2, AuditStoreError::transient("could not serialize access"))?;

    stack
        .tasks
        .create(NewTask::new("Write report"), &ChangeContext::system())
        .await?;

    assert_eq!(stack.primary.insert_count()?, 3);
    assert_eq!(stack.primary.documents()?.len(), 1);
    assert!(stack.table.records()?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unreachable_primary_diverts_to_fallback_table(stack: Stack) -> eyre::Result<()> {
    stack.primary.set_unreachable(true)?;

    let created = stack
        .tasks
        .create(NewTask::new("Write report"), &ChangeContext::system())
        .await?;

    assert!(stack.primary.documents()?.is_empty());
    let records = stack.table.records()?;
    let [record] = records.as_slice() else {
        eyre::bail!("expected one fallback row, found {}", records.len());
    };
    assert_eq!(record.entity_id, created.id().value());
    assert_eq!(record.action, "created");
    assert!(record.original_error.is_some());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failing_table_diverts_to_dated_log_file(stack: Stack) -> eyre::Result<()> {
    stack.primary.set_unreachable(true)?;
    stack
        .table
        .set_failing(Some("relation \"audit_log_fallbacks\" does not exist".to_owned()))?;

    let created = stack
        .tasks
        .create(NewTask::new("Write report"), &ChangeContext::system())
        .await?;
    stack
        .tasks
        .update(
            created.id(),
            TaskUpdate::default().with_status(TaskStatus::Completed),
            &ChangeContext::system(),
        )
        .await?;

    let lines = stack.fallback_log_lines()?;
    assert_eq!(lines.len(), 2);
    let actions: Vec<&str> = lines
        .iter()
        .filter_map(|line| line.pointer("/context/action")?.as_str())
        .collect();
    assert_eq!(actions, vec!["created", "updated"]);
    assert!(stack.stderr.contents().is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn permanent_failure_skips_retries(stack: Stack) -> eyre::Result<()> {
    stack
        .primary
        .fail_next(1, AuditStoreError::serialization("invalid byte sequence"))?;

    stack
        .tasks
        .create(NewTask::new("Write report"), &ChangeContext::system())
        .await?;

    assert_eq!(stack.primary.insert_count()?, 1);
    let records = stack.table.records()?;
    assert_eq!(records.len(), 1);
    assert!(
        records
            .iter()
            .all(|record| record
                .original_error
                .as_deref()
                .is_some_and(|error| error.contains("invalid byte sequence")))
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reloaded_retry_budget_applies_to_next_write(stack: Stack) -> eyre::Result<()> {
    let mut tightened = AuditConfig::fast();
    tightened.retry.max_attempts = 1;
    stack.config.reload(tightened)?;
    stack
        .primary
        .fail_next(1, AuditStoreError::transient("deadlock detected"))?;

    stack
        .tasks
        .create(NewTask::new("Write report"), &ChangeContext::system())
        .await?;

    assert_eq!(stack.primary.insert_count()?, 1);
    assert_eq!(stack.table.records()?.len(), 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn task_operations_succeed_while_audit_is_degraded(stack: Stack) -> eyre::Result<()> {
    stack.primary.set_unreachable(true)?;
    stack.table.set_failing(Some("disk full".to_owned()))?;

    let created = stack
        .tasks
        .create(NewTask::new("Write report"), &ChangeContext::system())
        .await?;
    stack
        .tasks
        .delete(created.id(), &ChangeContext::system())
        .await?;
    let remaining = stack.tasks.list(false).await?;

    assert!(remaining.is_empty());
    assert_eq!(stack.fallback_log_lines()?.len(), 2);
    Ok(())
}
