use std::fmt::Debug;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::audit::TaskAuditLog;
use crate::builder::TaskPlan;
use crate::data::TaskData;
use crate::error::TaskError;
use crate::status::TaskStatus;
use crate::task::TaskInstance;

/// One run of a [`TaskPlan`].
///
/// Tasks execute in plan order; each receives the collection's seed inputs
/// merged with the outputs of the tasks before it. When a task fails, only
/// the instances created by this run are reverted, last first.
///
/// A collection is single-use: once it left `NotStarted`, calling
/// [`process`](Self::process) or [`revert_all`](Self::revert_all) again does
/// nothing.
pub struct TaskCollection<Ctx, V, E: Debug> {
    plan: TaskPlan<Ctx, V, E>,
    status: TaskStatus,
    inputs: TaskData<V>,
    output: TaskData<V>,
    instances: Vec<TaskInstance<Ctx, V, E>>,
    processing_error: Option<Arc<TaskError<E>>>,
    reverting_error: Option<Arc<TaskError<E>>>,
    audit: TaskAuditLog,
}

impl<Ctx, V, E> TaskCollection<Ctx, V, E>
where
    V: Clone,
    E: Debug,
{
    pub(crate) fn new(plan: TaskPlan<Ctx, V, E>, inputs: TaskData<V>) -> Self {
        Self {
            plan,
            status: TaskStatus::NotStarted,
            inputs,
            output: TaskData::new(),
            instances: Vec::new(),
            processing_error: None,
            reverting_error: None,
            audit: TaskAuditLog::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.plan.name()
    }

    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.status
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
    ///
    /// This is the very error recorded by the task that caused it.
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

    /// Same as [`exception`](Self::exception), as a handle that can outlive
    /// the collection.
    #[must_use]
    pub fn shared_exception(&self) -> Option<Arc<TaskError<E>>> {
        if self.status.reports_processing_error() {
            self.processing_error.clone()
        } else if self.status == TaskStatus::Error {
            self.reverting_error.clone()
        } else {
            None
        }
    }

    /// Seed inputs merged with the outputs of every successful task so far.
    #[must_use]
    pub fn inputs(&self) -> &TaskData<V> {
        &self.inputs
    }

    /// Outputs of all tasks; only filled once the collection succeeded.
    #[must_use]
    pub fn output(&self) -> &TaskData<V> {
        &self.output
    }

    #[must_use]
    pub fn instances(&self) -> &[TaskInstance<Ctx, V, E>] {
        &self.instances
    }

    #[must_use]
    pub fn audit_log(&self) -> &TaskAuditLog {
        &self.audit
    }

    /// Run every task in order.
    ///
    /// Ends in `Success`, `Reverted` (a task failed and everything done so
    /// far was undone) or `Error` (some revert failed; effects are left
    /// as they are).
    pub fn process(&mut self, ctx: &Ctx) -> TaskStatus {
        let collection = self.name();
        if self.status != TaskStatus::NotStarted {
            warn!(collection, status = %self.status, "collection already ran, ignoring process");
            return self.status;
        }

        info!(collection, tasks = self.plan.len(), "processing task collection");
        self.status = TaskStatus::Started;

        let plan = self.plan.clone();
        for (index, factory) in plan.factories().iter().enumerate() {
            let task = match factory(&self.inputs) {
                Ok(task) => task,
                Err(source) => {
                    let err = TaskError::Instantiation {
                        collection,
                        index,
                        source,
                    };
                    error!(collection, index, cause = ?err.inner(), "failed to instantiate task");
                    self.processing_error = Some(Arc::new(err));
                    break;
                }
            };

            self.audit.record_start(task.name(), task.revert_description());
            let mut instance = TaskInstance::new(task, self.inputs.clone());
            let status = instance.process(ctx);
            self.audit.record_processed(index, status);

            match status {
                TaskStatus::Success => {
                    self.inputs.merge(instance.output());
                    self.instances.push(instance);
                }
                TaskStatus::Error => {
                    // the failing task could not undo itself; nothing before
                    // it may be reverted on top of a half-done effect
                    error!(collection, task = instance.name(), "task failed and could not revert");
                    self.processing_error = instance.processing_error();
                    self.reverting_error = instance.reverting_error();
                    self.instances.push(instance);
                    self.status = TaskStatus::Error;
                    return self.status;
                }
                _ => {
                    self.processing_error = instance.processing_error();
                    self.instances.push(instance);
                    break;
                }
            }
        }

        if self.processing_error.is_some() {
            self.status = TaskStatus::Failed;
            return self.rollback(ctx);
        }

        for instance in &self.instances {
            self.output.merge(instance.output());
        }
        self.status = TaskStatus::Success;
        info!(collection, "task collection completed");
        self.status
    }

    /// Revert every task of the plan without processing anything first.
    ///
    /// Used to undo a collection that succeeded in an earlier run. Every
    /// task is instantiated from the seed inputs and reverted last first;
    /// tasks must therefore tolerate effects that are absent.
    pub fn revert_all(&mut self, ctx: &Ctx) -> TaskStatus {
        let collection = self.name();
        if self.status != TaskStatus::NotStarted {
            warn!(collection, status = %self.status, "collection already ran, ignoring revert");
            return self.status;
        }

        info!(collection, tasks = self.plan.len(), "reverting whole task collection");
        self.status = TaskStatus::Reverting;

        let plan = self.plan.clone();
        for (index, factory) in plan.factories().iter().enumerate() {
            match factory(&self.inputs) {
                Ok(task) => {
                    self.audit.record_start(task.name(), task.revert_description());
                    self.instances
                        .push(TaskInstance::new(task, self.inputs.clone()));
                }
                Err(source) => {
                    let err = TaskError::Instantiation {
                        collection,
                        index,
                        source,
                    };
                    error!(collection, index, cause = ?err.inner(), "failed to instantiate task");
                    self.reverting_error = Some(Arc::new(err));
                    self.status = TaskStatus::Error;
                    return self.status;
                }
            }
        }

        self.rollback(ctx)
    }

    fn rollback(&mut self, ctx: &Ctx) -> TaskStatus {
        let collection = self.name();
        debug!(collection, instances = self.instances.len(), "rolling back");
        self.status = TaskStatus::Reverting;

        for (index, instance) in self.instances.iter_mut().enumerate().rev() {
            let status = match instance.status() {
                TaskStatus::Reverted | TaskStatus::Reverting => continue,
                TaskStatus::Error => TaskStatus::Error,
                _ => {
                    let status = instance.revert(ctx);
                    self.audit.record_reverted(index, status);
                    status
                }
            };

            if status == TaskStatus::Error {
                error!(collection, task = instance.name(), "rollback stopped");
                self.reverting_error = instance.reverting_error();
                self.status = TaskStatus::Error;
                return self.status;
            }
        }

        self.status = TaskStatus::Reverted;
        info!(collection, "task collection reverted");
        self.status
    }
}

impl<Ctx, V, E> Debug for TaskCollection<Ctx, V, E>
where
    V: Debug,
    E: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCollection")
            .field("name", &self.plan.name())
            .field("status", &self.status)
            .field("inputs", &self.inputs)
            .field("output", &self.output)
            .field("instances", &self.instances)
            .field("processing_error", &self.processing_error)
            .field("reverting_error", &self.reverting_error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::task::{BoxedTask, Task};

    #[derive(Default)]
    struct TestContext {
        log: RefCell<Vec<String>>,
        fail_process: Vec<&'static str>,
        fail_revert: Vec<&'static str>,
    }

    #[derive(Debug, PartialEq, thiserror::Error)]
    #[error("{0}")]
    struct TestError(String);

    #[derive(Clone)]
    struct Record {
        name: &'static str,
        produces: &'static str,
    }

    impl Task for Record {
        type Context = TestContext;
        type Value = i32;
        type Error = TestError;

        fn name(&self) -> &'static str {
            self.name
        }

        fn process(
            &self,
            ctx: &TestContext,
            inputs: &TaskData<i32>,
            output: &mut TaskData<i32>,
        ) -> Result<(), TestError> {
            ctx.log.borrow_mut().push(format!("process {}", self.name));
            if ctx.fail_process.contains(&self.name) {
                return Err(TestError(format!("{} exploded", self.name)));
            }
            output.insert(self.produces, i32::try_from(inputs.len()).unwrap_or_default());
            Ok(())
        }

        fn revert(
            &self,
            ctx: &TestContext,
            _inputs: &TaskData<i32>,
            output: &mut TaskData<i32>,
        ) -> Result<(), TestError> {
            ctx.log.borrow_mut().push(format!("revert {}", self.name));
            if ctx.fail_revert.contains(&self.name) {
                return Err(TestError(format!("{} stuck", self.name)));
            }
            output.release(self.produces);
            Ok(())
        }
    }

    fn task(name: &'static str, produces: &'static str) -> Record {
        Record { name, produces }
    }

    fn plan() -> TaskPlan<TestContext, i32, TestError> {
        TaskPlan::builder("three_tasks")
            .task(task("a", "from_a"))
            .task(task("b", "from_b"))
            .task(task("c", "from_c"))
            .build()
    }

    #[test]
    fn success_merges_outputs_and_feeds_later_tasks() {
        let ctx = TestContext::default();
        let mut collection = plan().collection(TaskData::new().with("seed", 0));

        let status = collection.process(&ctx);

        assert_eq!(status, TaskStatus::Success);
        assert_eq!(collection.output().get("from_a"), Some(&1));
        assert_eq!(collection.output().get("from_b"), Some(&2));
        assert_eq!(collection.output().get("from_c"), Some(&3));
        assert!(!collection.output().contains("seed"));
        assert!(collection.inputs().contains("from_c"));
        assert!(collection.exception().is_none());
    }

    #[test]
    fn failure_reverts_only_created_instances_in_reverse() {
        let ctx = TestContext {
            fail_process: vec!["b"],
            ..TestContext::default()
        };
        let mut collection = plan().collection(TaskData::new());

        let status = collection.process(&ctx);

        assert_eq!(status, TaskStatus::Reverted);
        assert_eq!(
            *ctx.log.borrow(),
            vec!["process a", "process b", "revert b", "revert a"]
        );
        assert_eq!(collection.instances().len(), 2);
        assert!(collection.output().is_empty());
    }

    #[test]
    fn exception_is_the_failing_tasks_error() {
        let ctx = TestContext {
            fail_process: vec!["b"],
            ..TestContext::default()
        };
        let mut collection = plan().collection(TaskData::new());

        collection.process(&ctx);

        let collection_err = collection.exception().expect("collection error");
        let task_err = collection.instances()[1].exception().expect("task error");
        assert!(std::ptr::eq(collection_err, task_err));
    }

    #[test]
    fn revert_error_stops_the_unwind() {
        let ctx = TestContext {
            fail_process: vec!["c"],
            fail_revert: vec!["b"],
            ..TestContext::default()
        };
        let mut collection = plan().collection(TaskData::new());

        let status = collection.process(&ctx);

        assert_eq!(status, TaskStatus::Error);
        assert_eq!(
            *ctx.log.borrow(),
            vec!["process a", "process b", "process c", "revert c", "revert b"]
        );
        assert!(collection.instances()[0].successful());
        assert!(matches!(
            collection.exception(),
            Some(TaskError::RevertFailed { task: "b", .. })
        ));
    }

    #[test]
    fn failing_task_that_cannot_self_revert_is_the_point_of_failure() {
        let ctx = TestContext {
            fail_process: vec!["b"],
            fail_revert: vec!["b"],
            ..TestContext::default()
        };
        let mut collection = plan().collection(TaskData::new());

        let status = collection.process(&ctx);

        assert_eq!(status, TaskStatus::Error);
        assert_eq!(
            *ctx.log.borrow(),
            vec!["process a", "process b", "revert b"]
        );
        assert!(matches!(
            collection.exception(),
            Some(TaskError::RevertFailed { task: "b", .. })
        ));
    }

    #[test]
    fn second_process_is_ignored() {
        let ctx = TestContext::default();
        let mut collection = plan().collection(TaskData::new());
        collection.process(&ctx);

        let status = collection.process(&ctx);

        assert_eq!(status, TaskStatus::Success);
        assert_eq!(ctx.log.borrow().len(), 3);
    }

    #[test]
    fn revert_all_reverts_every_task_last_first() {
        let ctx = TestContext::default();
        let mut collection = plan().collection(TaskData::new());

        let status = collection.revert_all(&ctx);

        assert_eq!(status, TaskStatus::Reverted);
        assert_eq!(*ctx.log.borrow(), vec!["revert c", "revert b", "revert a"]);
        assert!(collection.exception().is_none());
    }

    #[test]
    fn instantiation_failure_during_revert_all_reverts_nothing() {
        let ctx = TestContext::default();
        let plan: TaskPlan<TestContext, i32, TestError> = TaskPlan::builder("needs_collect")
            .task(task("a", "from_a"))
            .task_with(|inputs: &TaskData<i32>| -> Result<BoxedTask<_, _, _>, _> {
                if inputs.contains("collect") {
                    Ok(Box::new(task("b", "from_b")))
                } else {
                    Err(TestError("no collect".to_string()))
                }
            })
            .build();
        let mut collection = plan.collection(TaskData::new());

        let status = collection.revert_all(&ctx);

        assert_eq!(status, TaskStatus::Error);
        assert!(ctx.log.borrow().is_empty());
        assert!(matches!(
            collection.exception(),
            Some(TaskError::Instantiation { index: 1, .. })
        ));
    }

    #[test]
    fn instantiation_failure_during_process_rolls_back() {
        let ctx = TestContext::default();
        let plan: TaskPlan<TestContext, i32, TestError> = TaskPlan::builder("late_failure")
            .task(task("a", "from_a"))
            .task_with(|_: &TaskData<i32>| -> Result<BoxedTask<_, _, _>, _> {
                Err(TestError("template missing".to_string()))
            })
            .build();
        let mut collection = plan.collection(TaskData::new());

        let status = collection.process(&ctx);

        assert_eq!(status, TaskStatus::Reverted);
        assert_eq!(*ctx.log.borrow(), vec!["process a", "revert a"]);
        assert!(collection.exception().is_some_and(TaskError::is_precondition));
    }
}
