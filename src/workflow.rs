//! The pipeline algebra.
//!
//! A [`Workflow`] is just a flat list of operands separated by operators.
//! Composing two workflows concatenates them, nothing is wired until the
//! expression is handed to [`Manager::add_workflow`](crate::Manager::add_workflow).

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::component::Component;
use crate::error::CompileError;
use crate::task::TaskId;
use crate::value::ValuesId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `|` feeds the outputs of the left operand into the right one.
    Forward,
    /// `<` attaches the right operand as an alternative of a branching task.
    Branch,
    /// `&` merges the outputs of a collection into one task.
    Join,
    /// `<<` runs the right operand once per element of the left's arrays.
    Scatter,
    /// `>>` collects per-element results back into arrays.
    Gather,
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Forward => "forward",
            Operator::Branch => "branch",
            Operator::Join => "join",
            Operator::Scatter => "scatter",
            Operator::Gather => "gather",
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Operator::Forward => "|",
            Operator::Branch => "<",
            Operator::Join => "&",
            Operator::Scatter => "<<",
            Operator::Gather => ">>",
        }
    }
}

impl FromStr for Operator {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "|" | "forward" => Ok(Operator::Forward),
            "<" | "branch" => Ok(Operator::Branch),
            "&" | "join" => Ok(Operator::Join),
            "<<" | "scatter" => Ok(Operator::Scatter),
            ">>" | "gather" => Ok(Operator::Gather),
            other => Err(CompileError::UnsupportedOperator(other.to_string())),
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A flattened pipeline expression.
///
/// There is always exactly one operator fewer than there are operands.
///
/// ```rust
/// use wdlflow::{Manager, Workflow, WdlType};
///
/// let mut manager = Manager::new();
/// let first = manager.task("first").output(WdlType::Int).register()?;
/// let second = manager.task("second").input(WdlType::Int).register()?;
///
/// let workflow = Workflow::new(first).forward(second);
/// assert_eq!(workflow.operators().len(), 1);
/// # Ok::<(), wdlflow::CompileError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    operands: Vec<Component>,
    operators: Vec<Operator>,
}

impl Workflow {
    pub fn new(component: impl Into<Component>) -> Self {
        Self {
            operands: vec![component.into()],
            operators: Vec::new(),
        }
    }

    /// Appends `other`'s whole stream after `operator`.
    pub fn then(mut self, operator: Operator, other: impl Into<Workflow>) -> Self {
        let other = other.into();
        self.operators.push(operator);
        self.operands.extend(other.operands);
        self.operators.extend(other.operators);
        self
    }

    pub fn forward(self, other: impl Into<Workflow>) -> Self {
        self.then(Operator::Forward, other)
    }

    pub fn branch(self, other: impl Into<Workflow>) -> Self {
        self.then(Operator::Branch, other)
    }

    pub fn join(self, other: impl Into<Workflow>) -> Self {
        self.then(Operator::Join, other)
    }

    pub fn scatter(self, other: impl Into<Workflow>) -> Self {
        self.then(Operator::Scatter, other)
    }

    pub fn gather(self, other: impl Into<Workflow>) -> Self {
        self.then(Operator::Gather, other)
    }

    /// Token driven composition, e.g. `apply("<<", other)`.
    pub fn apply(self, token: &str, other: impl Into<Workflow>) -> Result<Self, CompileError> {
        let operator = token.parse()?;
        Ok(self.then(operator, other))
    }

    pub fn operands(&self) -> &[Component] {
        &self.operands
    }

    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    /// Consecutive `(base, operator, other)` triples, left to right.
    pub fn steps(&self) -> impl Iterator<Item = (&Component, Operator, &Component)> {
        self.operators
            .iter()
            .enumerate()
            .map(|(i, op)| (&self.operands[i], *op, &self.operands[i + 1]))
    }
}

impl From<Component> for Workflow {
    fn from(component: Component) -> Self {
        Workflow::new(component)
    }
}

impl From<TaskId> for Workflow {
    fn from(task: TaskId) -> Self {
        Workflow::new(task)
    }
}

impl From<ValuesId> for Workflow {
    fn from(values: ValuesId) -> Self {
        Workflow::new(values)
    }
}

impl Display for Workflow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let describe = |component: &Component| match component {
            Component::Task(task) => format!("t{}", task.0),
            Component::Values(values) => format!("v{}", values.0),
            Component::Tasks(tasks) => format!("tasks({})", tasks.len()),
            Component::ParallelTasks(tasks) => format!("parallel({})", tasks.len()),
            Component::DistributedTasks(tasks) => format!("distributed({})", tasks.len()),
        };

        write!(f, "{}", describe(&self.operands[0]))?;
        for (i, operator) in self.operators.iter().enumerate() {
            write!(f, " {} {}", operator.token(), describe(&self.operands[i + 1]))?;
        }

        Ok(())
    }
}

pub fn forward(base: impl Into<Workflow>, other: impl Into<Workflow>) -> Workflow {
    base.into().forward(other)
}

pub fn branch(base: impl Into<Workflow>, other: impl Into<Workflow>) -> Workflow {
    base.into().branch(other)
}

pub fn join(base: impl Into<Workflow>, other: impl Into<Workflow>) -> Workflow {
    base.into().join(other)
}

pub fn scatter(base: impl Into<Workflow>, other: impl Into<Workflow>) -> Workflow {
    base.into().scatter(other)
}

pub fn gather(base: impl Into<Workflow>, other: impl Into<Workflow>) -> Workflow {
    base.into().gather(other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_parsing() {
        assert_eq!("|".parse::<Operator>().unwrap(), Operator::Forward);
        assert_eq!("<".parse::<Operator>().unwrap(), Operator::Branch);
        assert_eq!("&".parse::<Operator>().unwrap(), Operator::Join);
        assert_eq!("<<".parse::<Operator>().unwrap(), Operator::Scatter);
        assert_eq!(">>".parse::<Operator>().unwrap(), Operator::Gather);
        assert_eq!("gather".parse::<Operator>().unwrap(), Operator::Gather);

        let err = "+".parse::<Operator>().unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedOperator(op) if op == "+"));
    }

    #[test]
    fn test_flattening() {
        let (a, b, c, d) = (TaskId(0), TaskId(1), TaskId(2), TaskId(3));

        let nested = forward(a, scatter(b, c)).gather(d);
        assert_eq!(
            nested.operands(),
            &[
                Component::Task(a),
                Component::Task(b),
                Component::Task(c),
                Component::Task(d)
            ]
        );
        assert_eq!(
            nested.operators(),
            &[Operator::Forward, Operator::Scatter, Operator::Gather]
        );
        assert_eq!(nested.to_string(), "t0 | t1 << t2 >> t3");

        let steps: Vec<_> = nested.steps().map(|(_, op, other)| (op, other.clone())).collect();
        assert_eq!(steps[1], (Operator::Scatter, Component::Task(c)));
    }

    #[test]
    fn test_apply_tokens() {
        let workflow = Workflow::new(TaskId(0)).apply("&", TaskId(1)).unwrap();
        assert_eq!(workflow.operators(), &[Operator::Join]);

        let err = Workflow::new(TaskId(0)).apply("=>", TaskId(1)).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedOperator(_)));
    }
}
