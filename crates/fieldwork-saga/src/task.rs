use std::fmt::Debug;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::data::TaskData;
use crate::error::TaskError;
use crate::status::TaskStatus;

/// A side-effecting action paired with the action that undoes it.
///
/// Implementations hold no run state; a [`TaskInstance`] carries the
/// status, inputs and output of one attempt.
///
/// # Type Parameters
///
/// - `Context`: Shared collaborators (injected, not passed between tasks)
/// - `Value`: Type of the values stored under input and output keys
/// - `Error`: The error type of the collaborators
pub trait Task {
    /// Shared context providing collaborators.
    type Context;

    /// Values exchanged between tasks.
    type Value;

    /// Error type for task failures.
    type Error;

    /// Human-readable name for logging and error messages.
    fn name(&self) -> &'static str;

    /// Keys that must be present in the inputs before processing.
    fn required_inputs(&self) -> &[&'static str] {
        &[]
    }

    /// Keys that processing must have put in the output.
    fn required_outputs(&self) -> &[&'static str] {
        &[]
    }

    /// Run the forward action.
    ///
    /// # Errors
    ///
    /// Returns an error if the action could not be completed.
    fn process(
        &self,
        ctx: &Self::Context,
        inputs: &TaskData<Self::Value>,
        output: &mut TaskData<Self::Value>,
    ) -> Result<(), Self::Error>;

    /// Undo the forward action.
    ///
    /// May be called on a task that never processed (cold revert), in which
    /// case `output` is empty. Implementations must check the effect they
    /// undo is actually present and do nothing otherwise.
    ///
    /// The default implementation is a no-op, suitable for read-only tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if the effect could not be undone.
    fn revert(
        &self,
        ctx: &Self::Context,
        inputs: &TaskData<Self::Value>,
        output: &mut TaskData<Self::Value>,
    ) -> Result<(), Self::Error> {
        let _ = (ctx, inputs, output);
        Ok(())
    }

    /// Human-readable description of what reverting will do.
    fn revert_description(&self) -> String {
        format!("undo {}", self.name())
    }
}

/// Boxed task as stored in plans and instances.
pub type BoxedTask<Ctx, V, E> = Box<dyn Task<Context = Ctx, Value = V, Error = E>>;

/// One attempt at running a [`Task`].
///
/// Created fresh for every run; never reused across a process/revert cycle.
pub struct TaskInstance<Ctx, V, E: Debug> {
    task: BoxedTask<Ctx, V, E>,
    status: TaskStatus,
    inputs: TaskData<V>,
    output: TaskData<V>,
    processing_error: Option<Arc<TaskError<E>>>,
    reverting_error: Option<Arc<TaskError<E>>>,
}

impl<Ctx, V, E> TaskInstance<Ctx, V, E>
where
    V: Clone,
    E: Debug,
{
    #[must_use]
    pub fn new(task: BoxedTask<Ctx, V, E>, inputs: TaskData<V>) -> Self {
        Self {
            task,
            status: TaskStatus::NotStarted,
            inputs,
            output: TaskData::new(),
            processing_error: None,
            reverting_error: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.task.name()
    }

    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    #[must_use]
    pub fn inputs(&self) -> &TaskData<V> {
        &self.inputs
    }

    #[must_use]
    pub fn output(&self) -> &TaskData<V> {
        &self.output
    }

    #[must_use]
    pub fn revert_description(&self) -> String {
        self.task.revert_description()
    }

    #[must_use]
    pub fn successful(&self) -> bool {
        self.status == TaskStatus::Success
    }

    #[must_use]
    pub fn reverted(&self) -> bool {
        self.status == TaskStatus::Reverted
    }

    #[must_use]
    pub fn clean_state(&self) -> bool {
        self.status.is_clean()
    }

    /// The error relevant to the current status.
    #[must_use]
    pub fn exception(&self) -> Option<&TaskError<E>> {
        if self.status.reports_processing_error() {
            self.processing_error.as_deref()
        } else if self.status == TaskStatus::Error {
            self.reverting_error.as_deref()
        } else {
            None
        }
    }

    pub(crate) fn processing_error(&self) -> Option<Arc<TaskError<E>>> {
        self.processing_error.clone()
    }

    pub(crate) fn reverting_error(&self) -> Option<Arc<TaskError<E>>> {
        self.reverting_error.clone()
    }

    /// Remove a key from the output, marking its effect as undone.
    pub fn release_output(&mut self, key: &str) -> Option<V> {
        self.output.release(key)
    }

    /// Run the forward action, reverting automatically on failure.
    ///
    /// Ends in `Success`, `Reverted` or `Error`.
    pub fn process(&mut self, ctx: &Ctx) -> TaskStatus {
        let name = self.name();
        debug!(task = name, "processing task");
        self.status = TaskStatus::Started;

        match self.run_forward(ctx) {
            Ok(()) => {
                info!(task = name, "task completed");
                self.status = TaskStatus::Success;
            }
            Err(err) => {
                error!(task = name, error = %err, cause = ?err.inner(), "task failed");
                self.processing_error = Some(Arc::new(err));
                self.status = TaskStatus::Failed;
                self.revert(ctx);
            }
        }
        self.status
    }

    /// Run the compensating action.
    ///
    /// Ends in `Reverted` or `Error`.
    pub fn revert(&mut self, ctx: &Ctx) -> TaskStatus {
        let name = self.name();
        debug!(task = name, cold = self.status == TaskStatus::NotStarted, "reverting task");
        self.status = TaskStatus::Reverting;

        match self.task.revert(ctx, &self.inputs, &mut self.output) {
            Ok(()) => {
                info!(task = name, "task reverted");
                self.status = TaskStatus::Reverted;
            }
            Err(source) => {
                let err = TaskError::RevertFailed { task: name, source };
                error!(task = name, cause = ?err.inner(), "failed to revert task");
                self.reverting_error = Some(Arc::new(err));
                self.status = TaskStatus::Error;
            }
        }
        self.status
    }

    fn run_forward(&mut self, ctx: &Ctx) -> Result<(), TaskError<E>> {
        let task = self.name();

        if let Some(key) = self.inputs.first_missing(self.task.required_inputs()) {
            return Err(TaskError::MissingInput { task, key });
        }

        self.task
            .process(ctx, &self.inputs, &mut self.output)
            .map_err(|source| TaskError::Failed { task, source })?;

        if let Some(key) = self.output.first_missing(self.task.required_outputs()) {
            return Err(TaskError::MissingOutput { task, key });
        }

        Ok(())
    }
}

impl<Ctx, V, E> Debug for TaskInstance<Ctx, V, E>
where
    V: Debug,
    E: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskInstance")
            .field("task", &self.task.name())
            .field("status", &self.status)
            .field("inputs", &self.inputs)
            .field("output", &self.output)
            .field("processing_error", &self.processing_error)
            .field("reverting_error", &self.reverting_error)
            .finish()
    }
}
