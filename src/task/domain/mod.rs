//! Domain model for task lifecycle management.
//!
//! The task aggregate validates its own invariants and knows how to render
//! itself as an audit snapshot; persistence and auditing stay outside the
//! domain boundary.

mod error;
mod ids;
mod task;

pub use error::{ParseTaskFieldError, TaskDomainError};
pub use ids::TaskId;
pub use task::{Change, NewTask, Task, TaskPriority, TaskStatus, TaskUpdate};
