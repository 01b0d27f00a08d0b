use fieldwork_core::{Collect, CollectId, CollectStatus, NewCollect};
use fieldwork_saga::{Direction, TaskData, TaskStatus};
use tracing::{info, warn};

use super::guard::TransitionGuard;
use crate::Result;
use crate::context::CollectContext;
use crate::data::{self, CollectValue, FORM};
use crate::error::OperationError;
use crate::tasks::{CollectCollection, reopen, start};
use crate::workflow::{CollectHandle, CollectTransition, collect_workflow};

/// A transition that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub collect: CollectId,
    pub collection: &'static str,
    pub status: TaskStatus,
    /// One line per task, see `TaskAuditLog::summary`.
    pub audit: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectSummary {
    pub collect: Collect,
    pub label: &'static str,
    pub targets: usize,
}

/// Collects split by lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectListing {
    /// Started or ended.
    pub active: Vec<Collect>,
    /// Finalized.
    pub archived: Vec<Collect>,
}

/// Entry point for everything done to collects.
///
/// Transitions on the same collect are serialized: a second one started
/// while the first runs fails with `TransitionInProgress`. Processes sharing
/// a store only exclude each other through a guard with a lock directory,
/// see [`CollectOperations::with_guard`].
#[derive(Debug)]
pub struct CollectOperations {
    ctx: CollectContext,
    guard: TransitionGuard,
}

impl CollectOperations {
    #[must_use]
    pub fn new(ctx: CollectContext) -> Self {
        Self::with_guard(ctx, TransitionGuard::new())
    }

    #[must_use]
    pub fn with_guard(ctx: CollectContext, guard: TransitionGuard) -> Self {
        Self { ctx, guard }
    }

    #[must_use]
    pub fn context(&self) -> &CollectContext {
        &self.ctx
    }

    #[must_use]
    pub fn guard(&self) -> &TransitionGuard {
        &self.guard
    }

    fn require_status(&self, id: CollectId, expected: CollectStatus) -> Result<()> {
        let actual = self.ctx.collect(id)?.status;
        if actual == expected {
            Ok(())
        } else {
            Err(OperationError::UnexpectedStatus {
                collect: id,
                expected,
                actual,
            })
        }
    }

    /// Open a collect and publish its survey form.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::TransitionFailed` if a task failed; every
    /// effect is undone unless the collection ended in error.
    pub fn start(&self, new: NewCollect) -> Result<TransitionOutcome> {
        let inputs = TaskData::new().with(FORM, CollectValue::NewCollect(new));
        let mut collection = start::plan().collection(inputs);
        collection.process(&self.ctx);
        let id = data::collect_id(collection.output()).ok();
        match id {
            Some(id) if collection.successful() => {
                info!(collect = %id, "collect started");
                Ok(outcome(id, &collection))
            }
            _ => Err(failure(&collection)),
        }
    }

    /// Close field collection on a started collect.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::UnexpectedStatus` if the collect is not
    /// started, `OperationError::TransitionFailed` if a task failed.
    pub fn end(&self, id: CollectId) -> Result<TransitionOutcome> {
        let _permit = self.guard.acquire(id)?;
        self.require_status(id, CollectStatus::Started)?;
        self.upgrade_unguarded(id)
    }

    /// Reconcile and export an ended collect.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::UnexpectedStatus` if the collect is not
    /// ended, `OperationError::TransitionFailed` if a task failed.
    pub fn finalize(&self, id: CollectId) -> Result<TransitionOutcome> {
        let _permit = self.guard.acquire(id)?;
        self.require_status(id, CollectStatus::Ended)?;
        self.upgrade_unguarded(id)
    }

    /// Take an ended collect back to field collection.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::UnexpectedStatus` if the collect is not
    /// ended, `OperationError::TransitionFailed` if a task failed.
    pub fn reopen(&self, id: CollectId) -> Result<TransitionOutcome> {
        let _permit = self.guard.acquire(id)?;
        self.require_status(id, CollectStatus::Ended)?;
        let mut collection = reopen::plan().collection(data::seed(id));
        collection.process(&self.ctx);
        if collection.successful() {
            info!(collect = %id, "collect reopened");
            Ok(outcome(id, &collection))
        } else {
            Err(failure(&collection))
        }
    }

    /// Move a collect to the next status.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::NothingToDo` when already finalized,
    /// `OperationError::TransitionFailed` if a task failed.
    pub fn upgrade(&self, id: CollectId) -> Result<TransitionOutcome> {
        let _permit = self.guard.acquire(id)?;
        self.upgrade_unguarded(id)
    }

    fn upgrade_unguarded(&self, id: CollectId) -> Result<TransitionOutcome> {
        let handle = CollectHandle::new(id);
        match collect_workflow()?.upgrade(&self.ctx, &handle)? {
            Some(transition) => conclude(id, &transition),
            None => Err(OperationError::NothingToDo {
                collect: id,
                direction: Direction::Upgrade,
                status: self.ctx.collect(id)?.status,
            }),
        }
    }

    /// Undo the transition that produced the collect's current status.
    ///
    /// Downgrading a started collect deletes it.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::TransitionFailed` if a revert failed.
    pub fn downgrade(&self, id: CollectId) -> Result<TransitionOutcome> {
        let _permit = self.guard.acquire(id)?;
        let handle = CollectHandle::new(id);
        match collect_workflow()?.downgrade(&self.ctx, &handle)? {
            Some(transition) => conclude(id, &transition),
            None => Err(OperationError::NothingToDo {
                collect: id,
                direction: Direction::Downgrade,
                status: self.ctx.collect(id)?.status,
            }),
        }
    }

    /// Move a collect to `target` one status at a time.
    ///
    /// Returns the transitions that ran; empty when already there.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::TransitionFailed` for the first transition
    /// that did not complete, `OperationError::TransformHalted` if the
    /// status moved unexpectedly.
    pub fn transform_to(&self, id: CollectId, target: CollectStatus) -> Result<Vec<TransitionOutcome>> {
        let _permit = self.guard.acquire(id)?;
        let handle = CollectHandle::new(id);
        let report = collect_workflow()?.transform_to(&self.ctx, &handle, &target)?;

        let mut outcomes = Vec::with_capacity(report.transitions.len());
        for transition in &report.transitions {
            outcomes.push(conclude(id, transition)?);
        }
        if !report.reached {
            let reached = self.ctx.collect(id)?.status;
            warn!(collect = %id, target = %target, reached = %reached, "transform halted");
            return Err(OperationError::TransformHalted {
                collect: id,
                target,
                reached,
            });
        }
        Ok(outcomes)
    }

    /// # Errors
    ///
    /// Returns `OperationError::CollectNotFound` if the collect does not
    /// exist.
    pub fn status(&self, id: CollectId) -> Result<CollectSummary> {
        let collect = self.ctx.collect(id)?;
        let targets = self.ctx.targets(id)?.len();
        Ok(CollectSummary {
            label: collect.status.label(),
            collect,
            targets,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn list(&self) -> Result<CollectListing> {
        let (active, archived) = self
            .ctx
            .store()
            .list_collects()?
            .into_iter()
            .partition(Collect::is_active);
        Ok(CollectListing { active, archived })
    }
}

fn outcome(id: CollectId, collection: &CollectCollection) -> TransitionOutcome {
    TransitionOutcome {
        collect: id,
        collection: collection.name(),
        status: collection.status(),
        audit: collection.audit_log().summary(),
    }
}

fn failure(collection: &CollectCollection) -> OperationError {
    OperationError::TransitionFailed {
        collection: collection.name(),
        status: collection.status(),
        audit: collection.audit_log().summary(),
        source: collection.shared_exception(),
    }
}

fn conclude(id: CollectId, transition: &CollectTransition) -> Result<TransitionOutcome> {
    if transition.completed() {
        Ok(outcome(id, &transition.collection))
    } else {
        Err(failure(&transition.collection))
    }
}
