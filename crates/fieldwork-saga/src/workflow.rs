use std::fmt::{self, Debug, Display};

use tracing::{debug, info, warn};

use crate::builder::TaskPlan;
use crate::collection::TaskCollection;
use crate::data::TaskData;
use crate::error::WorkflowError;
use crate::status::TaskStatus;

/// The persisted subject a workflow moves between states.
///
/// The state is read back from storage on every call, never cached: the
/// tasks of a transition are what changes it.
pub trait Aggregate {
    /// Shared context providing collaborators.
    type Context;

    /// Lifecycle state as persisted.
    type State;

    /// Values exchanged between tasks.
    type Value;

    /// Error type for reading the state.
    type Error;

    /// Read the current state.
    ///
    /// # Errors
    ///
    /// Returns an error if the aggregate cannot be loaded.
    fn current_state(&self, ctx: &Self::Context) -> Result<Self::State, Self::Error>;

    /// Inputs every transition collection is seeded with.
    fn seed(&self) -> TaskData<Self::Value>;
}

/// Which way a transition moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upgrade,
    Downgrade,
}

impl Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upgrade => write!(f, "upgrade"),
            Self::Downgrade => write!(f, "downgrade"),
        }
    }
}

/// A single step between two adjacent states, with the collection that ran.
pub struct Transition<S, Ctx, V, E: Debug> {
    pub direction: Direction,
    pub from: S,
    /// `None` when downgrading out of the first state.
    pub to: Option<S>,
    pub collection: TaskCollection<Ctx, V, E>,
}

impl<S, Ctx, V, E> Transition<S, Ctx, V, E>
where
    V: Clone,
    E: Debug,
{
    /// Whether the collection reached the status its direction aims for:
    /// `Success` for an upgrade, `Reverted` for a downgrade.
    #[must_use]
    pub fn completed(&self) -> bool {
        match self.direction {
            Direction::Upgrade => self.collection.successful(),
            Direction::Downgrade => self.collection.reverted(),
        }
    }

    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.collection.status()
    }
}

impl<S, Ctx, V, E> Debug for Transition<S, Ctx, V, E>
where
    S: Debug,
    V: Debug,
    E: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("direction", &self.direction)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("collection", &self.collection)
            .finish()
    }
}

/// Outcome of [`WorkflowStateMachine::transform_to`].
pub struct TransformReport<S, Ctx, V, E: Debug> {
    pub target: S,
    /// Every transition attempted, in order.
    pub transitions: Vec<Transition<S, Ctx, V, E>>,
    /// Whether the aggregate ended at the target with every transition
    /// completed.
    pub reached: bool,
}

impl<S, Ctx, V, E> Debug for TransformReport<S, Ctx, V, E>
where
    S: Debug,
    V: Debug,
    E: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformReport")
            .field("target", &self.target)
            .field("transitions", &self.transitions)
            .field("reached", &self.reached)
            .finish()
    }
}

struct WorkflowState<S, Ctx, V, E> {
    state: S,
    label: &'static str,
    plan: TaskPlan<Ctx, V, E>,
}

/// Ordered registry of lifecycle states.
///
/// Each state is paired with a label and the plan whose collection moves an
/// aggregate *into* that state. Upgrading processes the next state's plan;
/// downgrading cold-reverts the current state's plan.
pub struct WorkflowStateMachine<S, Ctx, V, E> {
    states: Vec<WorkflowState<S, Ctx, V, E>>,
}

impl<S, Ctx, V, E> WorkflowStateMachine<S, Ctx, V, E>
where
    S: Clone + PartialEq + Display,
    V: Clone,
    E: Debug,
{
    /// Build the registry; states are ordered as given.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::DuplicateState` if a state appears twice.
    pub fn from_states(
        entries: impl IntoIterator<Item = (S, &'static str, TaskPlan<Ctx, V, E>)>,
    ) -> Result<Self, WorkflowError<E>> {
        let mut states: Vec<WorkflowState<S, Ctx, V, E>> = Vec::new();
        for (state, label, plan) in entries {
            if states.iter().any(|known| known.state == state) {
                return Err(WorkflowError::DuplicateState {
                    state: state.to_string(),
                });
            }
            states.push(WorkflowState { state, label, plan });
        }
        Ok(Self { states })
    }

    #[must_use]
    pub fn index_of(&self, state: &S) -> Option<usize> {
        self.states.iter().position(|known| known.state == *state)
    }

    #[must_use]
    pub fn label(&self, state: &S) -> Option<&'static str> {
        self.states
            .iter()
            .find(|known| known.state == *state)
            .map(|known| known.label)
    }

    pub fn states(&self) -> impl Iterator<Item = &S> {
        self.states.iter().map(|known| &known.state)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Position of the aggregate's state, `None` when unrecognized.
    ///
    /// # Errors
    ///
    /// Returns the aggregate's error if its state cannot be read.
    pub fn current_index<A>(&self, ctx: &Ctx, aggregate: &A) -> Result<Option<usize>, E>
    where
        A: Aggregate<Context = Ctx, State = S, Value = V, Error = E>,
    {
        let state = aggregate.current_state(ctx)?;
        Ok(self.index_of(&state))
    }

    /// Move the aggregate one state forward.
    ///
    /// Returns `None` without doing anything when the state is unknown or
    /// already the last one.
    ///
    /// # Errors
    ///
    /// Returns the aggregate's error if its state cannot be read.
    pub fn upgrade<A>(&self, ctx: &Ctx, aggregate: &A) -> Result<Option<Transition<S, Ctx, V, E>>, E>
    where
        A: Aggregate<Context = Ctx, State = S, Value = V, Error = E>,
    {
        let state = aggregate.current_state(ctx)?;
        let Some(index) = self.index_of(&state) else {
            warn!(state = %state, "unknown workflow state, not upgrading");
            return Ok(None);
        };
        Ok(self.run_upgrade(ctx, aggregate, state, index))
    }

    /// Move the aggregate one state backward by cold-reverting the plan that
    /// produced its current state.
    ///
    /// Returns `None` without doing anything when the state is unknown.
    ///
    /// # Errors
    ///
    /// Returns the aggregate's error if its state cannot be read.
    pub fn downgrade<A>(
        &self,
        ctx: &Ctx,
        aggregate: &A,
    ) -> Result<Option<Transition<S, Ctx, V, E>>, E>
    where
        A: Aggregate<Context = Ctx, State = S, Value = V, Error = E>,
    {
        let state = aggregate.current_state(ctx)?;
        let Some(index) = self.index_of(&state) else {
            warn!(state = %state, "unknown workflow state, not downgrading");
            return Ok(None);
        };
        Ok(Some(self.run_downgrade(ctx, aggregate, state, index)))
    }

    /// Move the aggregate to `target`, one adjacent state at a time.
    ///
    /// The state is read again before every step. Progress halts as soon as
    /// a transition does not complete or the state is not the one the
    /// previous step should have produced.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::UnknownState` if `target` or the current
    /// state is not registered, `WorkflowError::Read` if the state cannot
    /// be read.
    pub fn transform_to<A>(
        &self,
        ctx: &Ctx,
        aggregate: &A,
        target: &S,
    ) -> Result<TransformReport<S, Ctx, V, E>, WorkflowError<E>>
    where
        A: Aggregate<Context = Ctx, State = S, Value = V, Error = E>,
    {
        let target_index = self
            .index_of(target)
            .ok_or_else(|| WorkflowError::UnknownState {
                state: target.to_string(),
            })?;

        let mut transitions: Vec<Transition<S, Ctx, V, E>> = Vec::new();
        let mut expected: Option<usize> = None;

        let reached = loop {
            let state = aggregate
                .current_state(ctx)
                .map_err(WorkflowError::Read)?;
            let index = self
                .index_of(&state)
                .ok_or_else(|| WorkflowError::UnknownState {
                    state: state.to_string(),
                })?;

            if expected.is_some_and(|expected| expected != index) {
                warn!(state = %state, target = %target, "state moved unexpectedly, halting");
                break false;
            }
            if index == target_index {
                break true;
            }

            let transition = if index < target_index {
                expected = Some(index + 1);
                // index < target_index keeps index + 1 in range
                self.run_upgrade(ctx, aggregate, state, index)
            } else {
                expected = index.checked_sub(1);
                Some(self.run_downgrade(ctx, aggregate, state, index))
            };

            let Some(transition) = transition else {
                break false;
            };
            let completed = transition.completed();
            transitions.push(transition);
            if !completed {
                warn!(target = %target, "transition did not complete, halting");
                break false;
            }
        };

        if reached {
            info!(target = %target, steps = transitions.len(), "workflow target reached");
        }

        Ok(TransformReport {
            target: target.clone(),
            transitions,
            reached,
        })
    }

    fn run_upgrade<A>(
        &self,
        ctx: &Ctx,
        aggregate: &A,
        state: S,
        index: usize,
    ) -> Option<Transition<S, Ctx, V, E>>
    where
        A: Aggregate<Context = Ctx, State = S, Value = V, Error = E>,
    {
        let Some(next) = self.states.get(index + 1) else {
            debug!(state = %state, "already at the last workflow state");
            return None;
        };

        info!(from = %state, to = %next.state, "upgrading");
        let mut collection = next.plan.collection(aggregate.seed());
        collection.process(ctx);

        Some(Transition {
            direction: Direction::Upgrade,
            from: state,
            to: Some(next.state.clone()),
            collection,
        })
    }

    fn run_downgrade<A>(
        &self,
        ctx: &Ctx,
        aggregate: &A,
        state: S,
        index: usize,
    ) -> Transition<S, Ctx, V, E>
    where
        A: Aggregate<Context = Ctx, State = S, Value = V, Error = E>,
    {
        let to = index
            .checked_sub(1)
            .and_then(|previous| self.states.get(previous))
            .map(|previous| previous.state.clone());

        info!(from = %state, plan = self.states[index].plan.name(), "downgrading");
        let mut collection = self.states[index].plan.collection(aggregate.seed());
        collection.revert_all(ctx);

        Transition {
            direction: Direction::Downgrade,
            from: state,
            to,
            collection,
        }
    }
}

impl<S, Ctx, V, E> Debug for WorkflowStateMachine<S, Ctx, V, E>
where
    S: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.states
                    .iter()
                    .map(|known| (&known.state, known.label, known.plan.name())),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::task::Task;

    #[derive(Default)]
    struct Store {
        state: RefCell<String>,
        reads: RefCell<usize>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct TestError(&'static str);

    #[derive(Clone)]
    struct SetState(&'static str);

    impl Task for SetState {
        type Context = Store;
        type Value = ();
        type Error = TestError;

        fn name(&self) -> &'static str {
            self.0
        }

        fn process(
            &self,
            ctx: &Store,
            _inputs: &TaskData<()>,
            _output: &mut TaskData<()>,
        ) -> Result<(), TestError> {
            *ctx.state.borrow_mut() = self.0.to_string();
            Ok(())
        }
    }

    struct Doc;

    impl Aggregate for Doc {
        type Context = Store;
        type State = String;
        type Value = ();
        type Error = TestError;

        fn current_state(&self, ctx: &Store) -> Result<String, TestError> {
            *ctx.reads.borrow_mut() += 1;
            Ok(ctx.state.borrow().clone())
        }

        fn seed(&self) -> TaskData<()> {
            TaskData::new()
        }
    }

    type Machine = WorkflowStateMachine<String, Store, (), TestError>;

    fn plan(state: &'static str) -> TaskPlan<Store, (), TestError> {
        TaskPlan::builder(state).task(SetState(state)).build()
    }

    fn machine() -> Machine {
        WorkflowStateMachine::from_states([
            ("draft".to_string(), "Draft", plan("draft")),
            ("review".to_string(), "In review", plan("review")),
            ("published".to_string(), "Published", plan("published")),
        ])
        .expect("distinct states")
    }

    fn store(state: &str) -> Store {
        Store {
            state: RefCell::new(state.to_string()),
            ..Store::default()
        }
    }

    #[test]
    fn index_and_label_follow_registration_order() {
        let machine = machine();

        assert_eq!(machine.index_of(&"review".to_string()), Some(1));
        assert_eq!(machine.index_of(&"archived".to_string()), None);
        assert_eq!(machine.label(&"published".to_string()), Some("Published"));
        assert_eq!(machine.len(), 3);
    }

    #[test]
    fn duplicate_states_are_rejected() {
        let result: Result<Machine, _> = WorkflowStateMachine::from_states([
            ("draft".to_string(), "Draft", plan("draft")),
            ("draft".to_string(), "Draft again", plan("draft")),
        ]);

        assert!(matches!(
            result,
            Err(WorkflowError::DuplicateState { state }) if state == "draft"
        ));
    }

    #[test]
    fn upgrade_processes_next_plan() {
        let ctx = store("draft");

        let transition = machine()
            .upgrade(&ctx, &Doc)
            .expect("state readable")
            .expect("not at the last state");

        assert_eq!(transition.direction, Direction::Upgrade);
        assert_eq!(transition.to.as_deref(), Some("review"));
        assert!(transition.completed());
        assert_eq!(*ctx.state.borrow(), "review");
    }

    #[test]
    fn upgrade_at_last_state_is_a_no_op() {
        let ctx = store("published");

        let transition = machine().upgrade(&ctx, &Doc).expect("state readable");

        assert!(transition.is_none());
    }

    #[test]
    fn unknown_state_is_a_no_op_for_single_steps() {
        let ctx = store("archived");
        let machine = machine();

        assert!(machine.upgrade(&ctx, &Doc).expect("readable").is_none());
        assert!(machine.downgrade(&ctx, &Doc).expect("readable").is_none());
        assert_eq!(machine.current_index(&ctx, &Doc).expect("readable"), None);
    }

    #[test]
    fn transform_to_unknown_target_fails() {
        let ctx = store("draft");

        let result = machine().transform_to(&ctx, &Doc, &"archived".to_string());

        assert!(matches!(result, Err(WorkflowError::UnknownState { .. })));
    }

    #[test]
    fn transform_to_current_state_does_nothing() {
        let ctx = store("review");

        let report = machine()
            .transform_to(&ctx, &Doc, &"review".to_string())
            .expect("known target");

        assert!(report.reached);
        assert!(report.transitions.is_empty());
    }

    #[test]
    fn transform_to_rereads_state_before_each_step() {
        let ctx = store("draft");

        let report = machine()
            .transform_to(&ctx, &Doc, &"published".to_string())
            .expect("known target");

        assert!(report.reached);
        assert_eq!(report.transitions.len(), 2);
        assert_eq!(*ctx.reads.borrow(), 3);
    }
}
