use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::collection::TaskCollection;
use crate::data::TaskData;
use crate::task::{BoxedTask, Task};

/// Builds a task from the inputs accumulated so far in a run.
pub type TaskFactory<Ctx, V, E> = dyn Fn(&TaskData<V>) -> Result<BoxedTask<Ctx, V, E>, E>;

/// An ordered, stateless list of task factories.
///
/// A plan is a template: it holds no run state and can create any number
/// of [`TaskCollection`]s.
pub struct TaskPlan<Ctx, V, E> {
    name: &'static str,
    factories: Vec<Arc<TaskFactory<Ctx, V, E>>>,
}

impl<Ctx, V, E> Clone for TaskPlan<Ctx, V, E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            factories: self.factories.clone(),
        }
    }
}

impl<Ctx, V, E> TaskPlan<Ctx, V, E> {
    /// Start building a plan called `name`.
    #[must_use]
    pub fn builder(name: &'static str) -> TaskPlanBuilder<Ctx, V, E, Empty> {
        TaskPlanBuilder {
            name,
            factories: Vec::new(),
            _state: PhantomData,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub(crate) fn factories(&self) -> &[Arc<TaskFactory<Ctx, V, E>>] {
        &self.factories
    }
}

impl<Ctx, V, E> TaskPlan<Ctx, V, E>
where
    V: Clone,
    E: Debug,
{
    /// Create a collection for one run of this plan, seeded with `inputs`.
    #[must_use]
    pub fn collection(&self, inputs: TaskData<V>) -> TaskCollection<Ctx, V, E> {
        TaskCollection::new(self.clone(), inputs)
    }
}

impl<Ctx, V, E> Debug for TaskPlan<Ctx, V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPlan")
            .field("name", &self.name)
            .field("tasks", &self.factories.len())
            .finish()
    }
}

/// Marker type for a builder with no tasks.
pub struct Empty;

/// Marker type for a builder with at least one task.
pub struct HasTasks;

/// Type-state builder for [`TaskPlan`].
///
/// An empty plan cannot be built:
///
/// ```compile_fail
/// use fieldwork_saga::TaskPlan;
///
/// // `build()` is only available once a task has been added
/// let plan = TaskPlan::<(), (), ()>::builder("empty").build();
/// ```
pub struct TaskPlanBuilder<Ctx, V, E, State> {
    name: &'static str,
    factories: Vec<Arc<TaskFactory<Ctx, V, E>>>,
    _state: PhantomData<State>,
}

impl<Ctx, V, E, State> TaskPlanBuilder<Ctx, V, E, State>
where
    Ctx: 'static,
    V: 'static,
    E: 'static,
{
    /// Append a task; every run gets its own clone.
    #[must_use]
    pub fn task<T>(self, task: T) -> TaskPlanBuilder<Ctx, V, E, HasTasks>
    where
        T: Task<Context = Ctx, Value = V, Error = E> + Clone + 'static,
    {
        self.task_with(move |_inputs: &TaskData<V>| -> Result<BoxedTask<Ctx, V, E>, E> {
            Ok(Box::new(task.clone()))
        })
    }

    /// Append a task built by `factory` from the inputs accumulated so far.
    ///
    /// A factory error aborts the run before the task exists.
    #[must_use]
    pub fn task_with<F>(self, factory: F) -> TaskPlanBuilder<Ctx, V, E, HasTasks>
    where
        F: Fn(&TaskData<V>) -> Result<BoxedTask<Ctx, V, E>, E> + 'static,
    {
        let mut factories = self.factories;
        factories.push(Arc::new(factory));
        TaskPlanBuilder {
            name: self.name,
            factories,
            _state: PhantomData,
        }
    }
}

impl<Ctx, V, E> TaskPlanBuilder<Ctx, V, E, HasTasks> {
    /// Build the plan from the accumulated tasks.
    #[must_use]
    pub fn build(self) -> TaskPlan<Ctx, V, E> {
        TaskPlan {
            name: self.name,
            factories: self.factories,
        }
    }
}
