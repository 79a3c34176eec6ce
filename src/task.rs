//! Named computation units with typed input and output slots.
use std::collections::BTreeMap;

use crate::types::WdlType;
use crate::value::ValueId;

/// A type-safe reference to a task in the blueprint.
///
/// `TaskId` is a lightweight, copyable token handed out when a task is
/// registered. Pipelines are written in terms of these tokens; the blueprint
/// resolves them back to the [`Task`] when wiring edges or emitting code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    /// Returns the declaration index of the task.
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub(crate) name: String,
    pub(crate) inputs: Vec<WdlType>,
    /// Connected values per input slot. A slot with several entries is fed by
    /// several producers.
    pub(crate) edges: Vec<Vec<ValueId>>,
    /// One value per declared output, created at registration.
    pub(crate) outputs: Vec<ValueId>,
    pub(crate) output_types: Vec<WdlType>,
    /// Index of the single Condition output of a branch-capable task.
    pub(crate) condition: Option<usize>,
    /// Tasks attached through `branch`, in attachment order.
    pub(crate) alternatives: Vec<TaskId>,
    pub(crate) scattered: bool,
    pub(crate) body: Option<String>,
    pub(crate) meta: BTreeMap<String, String>,
}

impl Task {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_types(&self) -> &[WdlType] {
        &self.inputs
    }

    pub fn output_types(&self) -> &[WdlType] {
        &self.output_types
    }

    /// Values connected to the given input slot.
    pub fn input(&self, slot: usize) -> &[ValueId] {
        self.edges.get(slot).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every output value, including the Condition one.
    pub fn all_outputs(&self) -> &[ValueId] {
        &self.outputs
    }

    /// Outputs available for ordinary forwarding, in declared order. A
    /// Condition output is only reachable through `branch`.
    pub fn outputs(&self) -> Vec<ValueId> {
        self.outputs
            .iter()
            .enumerate()
            .filter(|(slot, _)| Some(*slot) != self.condition)
            .map(|(_, value)| *value)
            .collect()
    }

    pub fn condition(&self) -> Option<ValueId> {
        self.condition.map(|slot| self.outputs[slot])
    }

    pub fn condition_slot(&self) -> Option<usize> {
        self.condition
    }

    pub fn is_branching(&self) -> bool {
        self.condition.is_some()
    }

    pub fn alternatives(&self) -> &[TaskId] {
        &self.alternatives
    }

    pub fn is_scattered(&self) -> bool {
        self.scattered
    }

    pub fn use_scatter(&mut self) {
        self.scattered = true;
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn meta(&self) -> &BTreeMap<String, String> {
        &self.meta
    }
}
