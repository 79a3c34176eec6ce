//! Typed graph nodes flowing between tasks.
//!
//! A [`Value`] never moves or disappears once created: the blueprint hands out
//! [`ValueId`]s, which are plain indices into its arena, much like a petgraph
//! `NodeIndex`. Edges are recorded on both ends, the producer on the value and
//! the value in the consuming task's input slot.

use crate::task::TaskId;
use crate::types::{Literal, WdlType};

/// Handle to a [`Value`] stored in a [`Blueprint`](crate::Blueprint).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub(crate) usize);

impl ValueId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Handle to a literal container, see [`Values`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValuesId(pub(crate) usize);

impl ValuesId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Whatever owns an output slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Task(TaskId),
    Values(ValuesId),
}

/// Where a value comes from: its owner and the output slot it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Producer {
    pub source: Source,
    pub slot: usize,
}

impl Producer {
    pub fn task(&self) -> Option<TaskId> {
        match self.source {
            Source::Task(task) => Some(task),
            Source::Values(_) => None,
        }
    }
}

/// One consuming edge: the task and the input slot the value feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Consumer {
    pub task: TaskId,
    pub slot: usize,
}

/// How a value relates to the array nodes around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// An output slot or a literal.
    Plain,
    /// The per-iteration placeholder of the given array.
    Element(ValueId),
    /// The singleton array created by wrapping the given value.
    Wrapper(ValueId),
}

#[derive(Debug, Clone)]
pub struct Value {
    pub(crate) ty: WdlType,
    pub(crate) literal: Option<Literal>,
    pub(crate) producer: Option<Producer>,
    pub(crate) consumers: Vec<Consumer>,
    pub(crate) role: Role,
    pub(crate) scattered: bool,
    pub(crate) wrapped: bool,
    /// Representative element, present on every array value.
    pub(crate) element: Option<ValueId>,
    /// Wrapping array, present once the value has been wrapped.
    pub(crate) wrapper: Option<ValueId>,
}

impl Value {
    pub(crate) fn new(ty: WdlType, producer: Option<Producer>, role: Role) -> Self {
        Self {
            ty,
            literal: None,
            producer,
            consumers: Vec::new(),
            role,
            scattered: false,
            wrapped: false,
            element: None,
            wrapper: None,
        }
    }

    pub fn ty(&self) -> &WdlType {
        &self.ty
    }

    pub fn literal(&self) -> Option<&Literal> {
        self.literal.as_ref()
    }

    pub fn producer(&self) -> Option<Producer> {
        self.producer
    }

    /// Every `(task, slot)` pair this value feeds, in connection order.
    pub fn consumers(&self) -> &[Consumer] {
        &self.consumers
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_scattered(&self) -> bool {
        self.scattered
    }

    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    pub fn element(&self) -> Option<ValueId> {
        self.element
    }

    pub fn wrapper(&self) -> Option<ValueId> {
        self.wrapper
    }
}

/// A fixed tuple of literal values with no producing task.
///
/// Its values become inputs of the emitted workflow, named after the
/// container and the slot.
#[derive(Debug, Clone)]
pub struct Values {
    pub(crate) name: String,
    pub(crate) outputs: Vec<ValueId>,
}

impl Values {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn outputs(&self) -> &[ValueId] {
        &self.outputs
    }
}
