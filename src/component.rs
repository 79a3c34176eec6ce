//! Operands of a pipeline.

use crate::blueprint::Blueprint;
use crate::task::TaskId;
use crate::value::{ValueId, ValuesId};

/// Anything that can appear between two operators.
///
/// Every variant can report and set its scattered state and yields the values
/// handed to the next stage. Collections differ only in how `forward` fans
/// upstream outputs out to their members.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Component {
    Task(TaskId),
    /// Literal passthrough. Can only ever be the head of a pipeline.
    Values(ValuesId),
    /// Every member receives the same upstream outputs.
    Tasks(Vec<TaskId>),
    /// Forward broadcasts the full upstream outputs to every member.
    ParallelTasks(Vec<TaskId>),
    /// Forward splits the upstream outputs by each member's arity, in order.
    DistributedTasks(Vec<TaskId>),
}

impl Component {
    pub fn tasks(tasks: impl IntoIterator<Item = TaskId>) -> Self {
        Component::Tasks(tasks.into_iter().collect())
    }

    pub fn parallel(tasks: impl IntoIterator<Item = TaskId>) -> Self {
        Component::ParallelTasks(tasks.into_iter().collect())
    }

    pub fn distributed(tasks: impl IntoIterator<Item = TaskId>) -> Self {
        Component::DistributedTasks(tasks.into_iter().collect())
    }

    /// Tasks making up the component, empty for literal containers.
    pub fn members(&self) -> &[TaskId] {
        match self {
            Component::Task(task) => std::slice::from_ref(task),
            Component::Values(_) => &[],
            Component::Tasks(tasks)
            | Component::ParallelTasks(tasks)
            | Component::DistributedTasks(tasks) => tasks,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            Component::Tasks(_) | Component::ParallelTasks(_) | Component::DistributedTasks(_)
        )
    }

    /// A collection counts as scattered only when it is non-empty and every
    /// member is.
    pub fn is_scattered(&self, blueprint: &Blueprint) -> bool {
        match self {
            Component::Values(_) => false,
            _ => {
                let members = self.members();
                !members.is_empty() && members.iter().all(|task| blueprint[*task].is_scattered())
            }
        }
    }

    pub fn use_scatter(&self, blueprint: &mut Blueprint) {
        for task in self.members() {
            blueprint.task_mut(*task).use_scatter();
        }
    }

    /// Values handed to the next stage. Collections concatenate member
    /// outputs in member order.
    pub fn outputs(&self, blueprint: &Blueprint) -> Vec<ValueId> {
        match self {
            Component::Values(values) => blueprint[*values].outputs().to_vec(),
            _ => self
                .members()
                .iter()
                .flat_map(|task| blueprint[*task].outputs())
                .collect(),
        }
    }
}

impl From<TaskId> for Component {
    fn from(task: TaskId) -> Self {
        Component::Task(task)
    }
}

impl From<ValuesId> for Component {
    fn from(values: ValuesId) -> Self {
        Component::Values(values)
    }
}
