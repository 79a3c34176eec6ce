use std::collections::BTreeMap;
use std::collections::HashSet;
use std::ops::Index;

use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::CompileError;
use crate::task::{Task, TaskId};
use crate::types::{Literal, WdlType};
use crate::value::{Consumer, Producer, Role, Source, Value, ValueId, Values, ValuesId};

/// The blueprint of your workflow.
///
/// `Blueprint` owns every task, value and literal container declared for one
/// compilation unit. You declare tasks with [`Blueprint::task`], literals with
/// [`Blueprint::values`] or [`Blueprint::literal`], and get back lightweight
/// ids which are later wired together, either directly with
/// [`Blueprint::connect`] or through a [`Workflow`](crate::Workflow) handed to
/// the [`Manager`](crate::Manager).
///
/// # Example
///
/// ```rust
/// use wdlflow::{Blueprint, WdlType};
///
/// let mut blueprint = Blueprint::new();
/// let add = blueprint
///     .task("add")
///     .inputs([WdlType::Int, WdlType::Int])
///     .output(WdlType::Int)
///     .register()?;
/// # Ok::<(), wdlflow::CompileError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Blueprint {
    pub(crate) tasks: Vec<Task>,
    pub(crate) values: Vec<Value>,
    pub(crate) literals: Vec<Values>,
}

impl Blueprint {
    /// Creates a new, empty blueprint.
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry point for declaring a task.
    pub fn task(&mut self, name: impl Into<String>) -> TaskDef<'_> {
        TaskDef {
            blueprint: self,
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            body: None,
            meta: BTreeMap::new(),
        }
    }

    /// Declares a container of literal values, usable as the head of a
    /// pipeline.
    pub fn values(&mut self, literals: impl IntoIterator<Item = Literal>) -> ValuesId {
        let id = ValuesId(self.literals.len());
        let outputs = literals
            .into_iter()
            .enumerate()
            .map(|(slot, literal)| {
                let producer = Producer {
                    source: Source::Values(id),
                    slot,
                };
                self.add_literal(literal, Some(producer))
            })
            .collect();

        self.literals.push(Values {
            name: format!("Values{}", id.0),
            outputs,
        });

        id
    }

    /// Declares a standalone literal. It has no producer and is rendered inline
    /// wherever it is consumed.
    pub fn literal(&mut self, literal: impl Into<Literal>) -> ValueId {
        self.add_literal(literal.into(), None)
    }

    pub fn tasks(&self) -> impl Iterator<Item = (TaskId, &Task)> {
        self.tasks
            .iter()
            .enumerate()
            .map(|(index, task)| (TaskId(index), task))
    }

    /// Looks a task up by its declared name.
    pub fn find(&self, name: &str) -> Option<TaskId> {
        self.tasks
            .iter()
            .position(|task| task.name == name)
            .map(TaskId)
    }

    /// Connects a single value to one input slot of `task`.
    ///
    /// Returns the node the edge actually landed on, which is the wrapping
    /// array of a wrapped value or the element of a scattered array.
    pub fn connect(
        &mut self,
        value: ValueId,
        task: TaskId,
        slot: usize,
    ) -> Result<ValueId, CompileError> {
        let arity = self[task].inputs.len();
        if slot >= arity {
            return Err(CompileError::ArityMismatch {
                task: self[task].name.clone(),
                expected: arity,
                found: slot + 1,
            });
        }

        let target = self.resolve(value, task, slot)?;
        self.add_edge(target, task, slot);

        Ok(target)
    }

    /// Connects one value per input slot of `task`, in order.
    ///
    /// Every slot is checked before any edge is recorded, so a failed call
    /// leaves the graph untouched.
    pub fn connect_all(&mut self, task: TaskId, values: &[ValueId]) -> Result<(), CompileError> {
        let arity = self[task].inputs.len();
        if values.len() != arity {
            return Err(CompileError::ArityMismatch {
                task: self[task].name.clone(),
                expected: arity,
                found: values.len(),
            });
        }

        let targets = values
            .iter()
            .enumerate()
            .map(|(slot, &value)| self.resolve(value, task, slot))
            .collect::<Result<Vec<_>, _>>()?;

        for (slot, target) in targets.into_iter().enumerate() {
            self.add_edge(target, task, slot);
        }

        Ok(())
    }

    /// Connects `values` to `task` and hands back its forwardable outputs.
    pub fn call(&mut self, task: TaskId, values: &[ValueId]) -> Result<Vec<ValueId>, CompileError> {
        self.connect_all(task, values)?;
        Ok(self[task].outputs())
    }

    /// Promotes a value into a singleton array for a gather.
    ///
    /// Repeated calls return the same wrapping array.
    pub fn wrap(&mut self, value: ValueId) -> ValueId {
        if let Some(wrapper) = self[value].wrapper {
            return wrapper;
        }

        let ty = WdlType::array(self[value].ty.clone());
        let producer = self[value].producer;
        let wrapper = self.push_value(Value::new(ty, producer, Role::Wrapper(value)));
        self.values[wrapper.0].element = Some(value);

        let inner = &mut self.values[value.0];
        inner.wrapped = true;
        inner.wrapper = Some(wrapper);

        wrapper
    }

    /// Marks a value, and the element of an array, as scattered.
    pub fn scatter(&mut self, value: ValueId) -> ValueId {
        self.values[value.0].scattered = true;

        if let Some(element) = self[value].element {
            self.values[element.0].scattered = true;
        }

        value
    }

    /// Distinct tasks producing any input of `task`, in slot order.
    pub fn parents(&self, task: TaskId) -> Vec<TaskId> {
        let mut seen = HashSet::new();

        self[task]
            .edges
            .iter()
            .flatten()
            .filter_map(|value| self[*value].producer.and_then(|p| p.task()))
            .filter(|parent| seen.insert(*parent))
            .collect()
    }

    /// Task-level view of the graph: one node per task, in declaration order,
    /// and one edge per connected value whose producer is a task.
    pub fn dependency_graph(&self) -> DiGraph<TaskId, ValueId> {
        let mut graph = DiGraph::with_capacity(self.tasks.len(), self.values.len());

        for (id, _) in self.tasks() {
            graph.add_node(id);
        }

        for (id, task) in self.tasks() {
            for &value in task.edges.iter().flatten() {
                if let Some(parent) = self[value].producer.and_then(|p| p.task()) {
                    graph.add_edge(NodeIndex::new(parent.0), NodeIndex::new(id.0), value);
                }
            }
        }

        graph
    }

    fn resolve(&self, value: ValueId, task: TaskId, slot: usize) -> Result<ValueId, CompileError> {
        let expected = &self[task].inputs[slot];
        let candidate = &self[value];

        if &candidate.ty == expected {
            return Ok(value);
        }

        if let WdlType::Array(element) = expected {
            if **element == candidate.ty && candidate.wrapped {
                if let Some(wrapper) = candidate.wrapper {
                    return Ok(wrapper);
                }
            }
        }

        if candidate.ty.element() == Some(expected) && candidate.scattered {
            if let Some(element) = candidate.element {
                return Ok(element);
            }
        }

        let note = if candidate.ty.element() == Some(expected) {
            " (not scattered)"
        } else if expected.element() == Some(&candidate.ty) {
            " (not wrapped)"
        } else {
            ""
        };

        Err(CompileError::TypeMismatch {
            task: self[task].name.clone(),
            slot,
            expected: expected.clone(),
            found: format!("{}{note}", candidate.ty),
        })
    }

    fn add_edge(&mut self, value: ValueId, task: TaskId, slot: usize) {
        tracing::debug!(
            task = %self[task].name,
            slot,
            value = value.0,
            "connecting input"
        );

        self.values[value.0].consumers.push(Consumer { task, slot });
        self.tasks[task.0].edges[slot].push(value);
    }

    fn add_literal(&mut self, literal: Literal, producer: Option<Producer>) -> ValueId {
        let id = self.add_value(literal.ty(), producer, Role::Plain);
        self.values[id.0].literal = Some(literal);
        id
    }

    /// Adds a value, materializing the representative element of arrays.
    fn add_value(&mut self, ty: WdlType, producer: Option<Producer>, role: Role) -> ValueId {
        let element_ty = ty.element().cloned();
        let id = self.push_value(Value::new(ty, producer, role));

        if let Some(element_ty) = element_ty {
            let element = self.add_value(element_ty, producer, Role::Element(id));
            self.values[id.0].element = Some(element);
        }

        id
    }

    fn push_value(&mut self, value: Value) -> ValueId {
        self.values.push(value);
        ValueId(self.values.len() - 1)
    }

    pub(crate) fn task_mut(&mut self, id: TaskId) -> &mut Task {
        &mut self.tasks[id.0]
    }

    fn add_task(&mut self, def: TaskSpec) -> Result<TaskId, CompileError> {
        let TaskSpec {
            name,
            inputs,
            outputs,
            body,
            meta,
        } = def;

        let invalid = |reason: &str| CompileError::InvalidTaskDefinition {
            task: name.clone(),
            reason: reason.to_string(),
        };

        if name.trim().is_empty() {
            return Err(invalid("name can't be empty"));
        }

        if !is_identifier(&name) {
            return Err(invalid("name must be a WDL identifier"));
        }

        if self.find(&name).is_some() {
            return Err(invalid("a task with this name is already declared"));
        }

        if inputs.iter().any(WdlType::mentions_condition) {
            return Err(invalid("a Condition can't be consumed as an input"));
        }

        if outputs
            .iter()
            .any(|ty| ty.mentions_condition() && !ty.is_condition())
        {
            return Err(invalid("a Condition can't be nested in an array"));
        }

        let conditions: Vec<_> = outputs
            .iter()
            .enumerate()
            .filter(|(_, ty)| ty.is_condition())
            .map(|(slot, _)| slot)
            .collect();

        if conditions.len() > 1 {
            return Err(invalid("at most one output may be a Condition"));
        }

        let id = TaskId(self.tasks.len());
        let values = outputs
            .iter()
            .enumerate()
            .map(|(slot, ty)| {
                let producer = Producer {
                    source: Source::Task(id),
                    slot,
                };
                self.add_value(ty.clone(), Some(producer), Role::Plain)
            })
            .collect();

        tracing::debug!(task = %name, inputs = inputs.len(), outputs = outputs.len(), "declared task");

        self.tasks.push(Task {
            name,
            edges: vec![Vec::new(); inputs.len()],
            inputs,
            outputs: values,
            output_types: outputs,
            condition: conditions.first().copied(),
            alternatives: Vec::new(),
            scattered: false,
            body,
            meta,
        });

        Ok(id)
    }
}

const KEYWORDS: &[&str] = &[
    "Array", "Boolean", "Directory", "File", "Float", "Int", "Map", "None", "Object", "Pair",
    "String", "after", "alias", "as", "call", "command", "else", "false", "hints", "if",
    "import", "in", "input", "left", "meta", "object", "output", "parameter_meta",
    "requirements", "right", "runtime", "scatter", "struct", "task", "then", "true", "version",
    "workflow",
];

/// Task names end up as WDL identifiers and as script file names.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let head = chars.next().is_some_and(|c| c.is_ascii_alphabetic());

    head && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !KEYWORDS.contains(&name)
}

impl Index<TaskId> for Blueprint {
    type Output = Task;

    fn index(&self, index: TaskId) -> &Self::Output {
        &self.tasks[index.0]
    }
}

impl Index<ValueId> for Blueprint {
    type Output = Value;

    fn index(&self, index: ValueId) -> &Self::Output {
        &self.values[index.0]
    }
}

impl Index<ValuesId> for Blueprint {
    type Output = Values;

    fn index(&self, index: ValuesId) -> &Self::Output {
        &self.literals[index.0]
    }
}

impl std::fmt::Display for Blueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "graph LR")?;

        for (index, values) in self.literals.iter().enumerate() {
            writeln!(f, "    v{index}[(\"{}\")]", values.name)?;
        }

        for (id, task) in self.tasks() {
            let name = task.name.replace('"', "\\\""); // Simple escape
            writeln!(f, "    t{}[\"{}\"]", id.0, name)?;
        }

        for (id, task) in self.tasks() {
            for &value in task.edges.iter().flatten() {
                let source = match self[value].producer.map(|p| p.source) {
                    Some(Source::Task(parent)) => format!("t{}", parent.0),
                    Some(Source::Values(values)) => format!("v{}", values.0),
                    None => continue,
                };
                writeln!(
                    f,
                    "    {} -- \"{}\" --> t{}",
                    source,
                    self[value].ty.wdl_name(),
                    id.0
                )?;
            }
        }

        Ok(())
    }
}

/// Builder returned by [`Blueprint::task`].
pub struct TaskDef<'a> {
    blueprint: &'a mut Blueprint,
    name: String,
    inputs: Vec<WdlType>,
    outputs: Vec<WdlType>,
    body: Option<String>,
    meta: BTreeMap<String, String>,
}

struct TaskSpec {
    name: String,
    inputs: Vec<WdlType>,
    outputs: Vec<WdlType>,
    body: Option<String>,
    meta: BTreeMap<String, String>,
}

impl<'a> TaskDef<'a> {
    pub fn input(mut self, ty: WdlType) -> Self {
        self.inputs.push(ty);
        self
    }

    pub fn inputs(mut self, types: impl IntoIterator<Item = WdlType>) -> Self {
        self.inputs.extend(types);
        self
    }

    pub fn output(mut self, ty: WdlType) -> Self {
        self.outputs.push(ty);
        self
    }

    pub fn outputs(mut self, types: impl IntoIterator<Item = WdlType>) -> Self {
        self.outputs.extend(types);
        self
    }

    /// Source of the task's executable body, consumed by
    /// [`EmbeddedBody`](crate::EmbeddedBody).
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Free-form metadata carried along with the task.
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Validates the declaration and adds the task, creating its outputs.
    pub fn register(self) -> Result<TaskId, CompileError> {
        self.blueprint.add_task(TaskSpec {
            name: self.name,
            inputs: self.inputs,
            outputs: self.outputs,
            body: self.body,
            meta: self.meta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_task(blueprint: &mut Blueprint, name: &str, inputs: usize, outputs: usize) -> TaskId {
        blueprint
            .task(name)
            .inputs(vec![WdlType::Int; inputs])
            .outputs(vec![WdlType::Int; outputs])
            .register()
            .unwrap()
    }

    #[test]
    fn test_outputs_skip_condition() {
        let mut blueprint = Blueprint::new();
        let plain = int_task(&mut blueprint, "plain", 0, 2);
        let branching = blueprint
            .task("branching")
            .outputs([WdlType::Int, WdlType::Condition, WdlType::Boolean])
            .register()
            .unwrap();

        assert_eq!(blueprint[plain].outputs().len(), 2);
        assert!(!blueprint[plain].is_branching());

        let task = &blueprint[branching];
        assert_eq!(task.outputs().len(), 2);
        assert_eq!(task.all_outputs().len(), 3);
        assert_eq!(task.condition_slot(), Some(1));
        assert!(task.is_branching());

        let outputs = task.outputs();
        assert_eq!(blueprint[outputs[0]].ty(), &WdlType::Int);
        assert_eq!(blueprint[outputs[1]].ty(), &WdlType::Boolean);
    }

    #[test]
    fn test_outputs_carry_producer() {
        let mut blueprint = Blueprint::new();
        let task = blueprint
            .task("generate")
            .outputs([WdlType::Int, WdlType::array(WdlType::Int)])
            .register()
            .unwrap();

        let outputs = blueprint[task].outputs();
        let array = &blueprint[outputs[1]];
        assert_eq!(
            array.producer(),
            Some(Producer {
                source: Source::Task(task),
                slot: 1
            })
        );

        let element = array.element().unwrap();
        assert_eq!(blueprint[element].ty(), &WdlType::Int);
        assert_eq!(blueprint[element].role(), Role::Element(outputs[1]));
        assert_eq!(blueprint[element].producer(), array.producer());
    }

    #[test]
    fn test_invalid_definitions() {
        let mut blueprint = Blueprint::new();

        let err = blueprint
            .task("two_conditions")
            .outputs([WdlType::Condition, WdlType::Condition])
            .register()
            .unwrap_err();
        assert!(matches!(err, CompileError::InvalidTaskDefinition { .. }));

        let err = blueprint
            .task("condition_input")
            .input(WdlType::Condition)
            .register()
            .unwrap_err();
        assert!(matches!(err, CompileError::InvalidTaskDefinition { .. }));

        let err = blueprint.task("  ").register().unwrap_err();
        assert!(matches!(err, CompileError::InvalidTaskDefinition { .. }));

        for name in ["my task", "a-b", "1st", "if", "task"] {
            let err = blueprint.task(name).register().unwrap_err();
            assert!(
                matches!(&err, CompileError::InvalidTaskDefinition { task, .. } if task == name),
                "{name}: {err}"
            );
        }

        int_task(&mut blueprint, "twice", 0, 0);
        let err = blueprint.task("twice").register().unwrap_err();
        assert!(matches!(err, CompileError::InvalidTaskDefinition { .. }));
    }

    #[test]
    fn test_connect_records_both_ends() {
        let mut blueprint = Blueprint::new();
        let add = int_task(&mut blueprint, "add", 2, 1);
        let print = int_task(&mut blueprint, "print", 1, 0);

        let a = blueprint.literal(1i64);
        let b = blueprint.literal(2i64);
        let result = blueprint.call(add, &[a, b]).unwrap();
        blueprint.call(print, &result).unwrap();

        assert_eq!(blueprint[a].consumers(), &[Consumer { task: add, slot: 0 }]);
        assert_eq!(blueprint[b].consumers(), &[Consumer { task: add, slot: 1 }]);
        assert_eq!(blueprint[result[0]].consumers(), &[Consumer { task: print, slot: 0 }]);
        assert_eq!(blueprint[add].input(1), &[b]);
        assert_eq!(blueprint.parents(print), vec![add]);
    }

    #[test]
    fn test_failed_connect_leaves_no_edges() {
        let mut blueprint = Blueprint::new();
        let task = blueprint
            .task("mixed")
            .inputs([WdlType::Int, WdlType::String])
            .register()
            .unwrap();

        let a = blueprint.literal(1i64);
        let b = blueprint.literal(2i64);

        let err = blueprint.connect_all(task, &[a, b]).unwrap_err();
        assert!(matches!(err, CompileError::TypeMismatch { slot: 1, .. }));
        assert!(blueprint[a].consumers().is_empty());
        assert!(blueprint[task].input(0).is_empty());

        let err = blueprint.connect_all(task, &[a]).unwrap_err();
        assert!(matches!(
            err,
            CompileError::ArityMismatch {
                expected: 2,
                found: 1,
                ..
            }
        ));
        assert!(blueprint[a].consumers().is_empty());
    }

    #[test]
    fn test_scatter_then_wrap_round_trip() {
        let mut blueprint = Blueprint::new();
        let generate = blueprint
            .task("generate")
            .output(WdlType::array(WdlType::Int))
            .register()
            .unwrap();
        let square = int_task(&mut blueprint, "square", 1, 1);
        let sum = blueprint
            .task("sum")
            .input(WdlType::array(WdlType::Int))
            .register()
            .unwrap();

        let array = blueprint[generate].outputs()[0];

        let err = blueprint.connect(array, square, 0).unwrap_err();
        assert!(matches!(err, CompileError::TypeMismatch { .. }));

        blueprint.scatter(array);
        let element = blueprint.connect(array, square, 0).unwrap();
        assert_eq!(Some(element), blueprint[array].element());
        assert!(blueprint[array].consumers().is_empty());

        let squared = blueprint[square].outputs()[0];
        let wrapper = blueprint.wrap(squared);
        assert_eq!(blueprint.wrap(squared), wrapper);

        let landed = blueprint.connect(squared, sum, 0).unwrap();
        assert_eq!(landed, wrapper);
        assert_eq!(blueprint[wrapper].ty(), blueprint[array].ty());
        assert_eq!(blueprint[wrapper].consumers(), &[Consumer { task: sum, slot: 0 }]);
        assert!(blueprint[squared].is_wrapped());
        assert!(blueprint[squared].consumers().is_empty());
    }

    #[test]
    fn test_values_and_mermaid() {
        let mut blueprint = Blueprint::new();
        let values = blueprint.values([Literal::Int(1), Literal::from("x")]);
        let task = blueprint
            .task("consume")
            .inputs([WdlType::Int, WdlType::String])
            .register()
            .unwrap();

        let outputs = blueprint[values].outputs().to_vec();
        blueprint.connect_all(task, &outputs).unwrap();

        assert_eq!(blueprint[values].name(), "Values0");
        assert_eq!(blueprint[outputs[1]].literal(), Some(&Literal::from("x")));

        let mermaid = blueprint.to_string();
        assert!(mermaid.starts_with("graph LR\n"));
        assert!(mermaid.contains("t0[\"consume\"]"));
        assert!(mermaid.contains("v0 -- \"String\" --> t0"));
    }

    #[test]
    fn test_dependency_graph() {
        let mut blueprint = Blueprint::new();
        let first = int_task(&mut blueprint, "first", 0, 2);
        let second = int_task(&mut blueprint, "second", 2, 0);

        let outputs = blueprint[first].outputs();
        blueprint.connect_all(second, &outputs).unwrap();

        let graph = blueprint.dependency_graph();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 2);
        assert!(petgraph::algo::toposort(&graph, None).is_ok());
    }
}
