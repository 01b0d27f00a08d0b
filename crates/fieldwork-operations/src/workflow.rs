use fieldwork_core::{CollectId, CollectStatus};
use fieldwork_saga::{Aggregate, TransformReport, Transition, WorkflowStateMachine};

use crate::Result;
use crate::context::CollectContext;
use crate::data::{self, CollectData, CollectValue};
use crate::error::OperationError;
use crate::tasks::{end, finalize, start};

pub type CollectWorkflow =
    WorkflowStateMachine<CollectStatus, CollectContext, CollectValue, OperationError>;
pub type CollectTransition =
    Transition<CollectStatus, CollectContext, CollectValue, OperationError>;
pub type CollectTransform =
    TransformReport<CollectStatus, CollectContext, CollectValue, OperationError>;

/// The collect lifecycle: each status with the plan that leads into it.
///
/// # Errors
///
/// Never fails in practice; the statuses are distinct.
pub fn collect_workflow() -> Result<CollectWorkflow> {
    let states = CollectStatus::ALL.map(|status| {
        let plan = match status {
            CollectStatus::Started => start::plan(),
            CollectStatus::Ended => end::plan(),
            CollectStatus::Finalized => finalize::plan(),
        };
        (status, status.label(), plan)
    });
    Ok(WorkflowStateMachine::from_states(states)?)
}

/// A stored collect as seen by the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectHandle {
    id: CollectId,
}

impl CollectHandle {
    #[must_use]
    pub fn new(id: CollectId) -> Self {
        Self { id }
    }

    #[must_use]
    pub fn id(&self) -> CollectId {
        self.id
    }
}

impl Aggregate for CollectHandle {
    type Context = CollectContext;
    type State = CollectStatus;
    type Value = CollectValue;
    type Error = OperationError;

    fn current_state(&self, ctx: &CollectContext) -> Result<CollectStatus> {
        Ok(ctx.collect(self.id)?.status)
    }

    fn seed(&self) -> CollectData {
        data::seed(self.id)
    }
}
