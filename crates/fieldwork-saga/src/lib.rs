//! Compensating task collections and ordered workflow transitions.
//!
//! A [`TaskPlan`] lists side-effecting tasks in order. Each run of a plan is
//! a [`TaskCollection`]: tasks execute one after the other, feeding their
//! outputs to the tasks after them, and when one fails every task already
//! attempted in that run is reverted, last first. A collection can also be
//! reverted cold, without processing, to undo a run that completed earlier.
//!
//! A [`WorkflowStateMachine`] orders the lifecycle states of an
//! [`Aggregate`] and runs the plan registered for a state to move the
//! aggregate into it, or cold-reverts it to move back out.

mod audit;
mod builder;
mod collection;
mod data;
mod error;
mod status;
mod task;
mod workflow;

pub use audit::{TaskAuditLog, TaskRecord};
pub use builder::{Empty, HasTasks, TaskFactory, TaskPlan, TaskPlanBuilder};
pub use collection::TaskCollection;
pub use data::TaskData;
pub use error::{TaskError, WorkflowError};
pub use status::TaskStatus;
pub use task::{BoxedTask, Task, TaskInstance};
pub use workflow::{Aggregate, Direction, TransformReport, Transition, WorkflowStateMachine};
