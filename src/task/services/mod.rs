//! Application services for task lifecycle orchestration.

mod lifecycle;

pub use lifecycle::{
    ChangeContext, TaskLifecycleError, TaskLifecycleResult, TaskLifecycleService,
};
