//! Rendering of the workflow document.
//!
//! Everything here is a pure function of the blueprint, the plan and the
//! settings: the types below only borrow them and implement [`Display`].

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use crate::blueprint::Blueprint;
use crate::config::Settings;
use crate::plan::{Plan, Statement, StatementKind};
use crate::task::TaskId;
use crate::types::WdlType;
use crate::value::{Role, Source, ValueId, ValuesId};

/// The whole document: task definitions followed by the workflow block.
pub struct Document<'a> {
    blueprint: &'a Blueprint,
    plan: &'a Plan,
    tasks: &'a [TaskId],
    settings: &'a Settings,
}

impl<'a> Document<'a> {
    pub fn new(
        blueprint: &'a Blueprint,
        plan: &'a Plan,
        tasks: &'a [TaskId],
        settings: &'a Settings,
    ) -> Self {
        Self {
            blueprint,
            plan,
            tasks,
            settings,
        }
    }
}

impl Display for Document<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(version) = &self.settings.version {
            writeln!(f, "version {version}")?;
            writeln!(f)?;
        }

        for &task in self.tasks {
            writeln!(f, "{}", TaskBlock::new(self.blueprint, task, self.settings))?;
        }

        write!(
            f,
            "{}",
            WorkflowBlock::new(self.blueprint, self.plan, self.tasks, self.settings)
        )
    }
}

/// Definition of a single task.
pub struct TaskBlock<'a> {
    blueprint: &'a Blueprint,
    task: TaskId,
    settings: &'a Settings,
}

impl<'a> TaskBlock<'a> {
    pub fn new(blueprint: &'a Blueprint, task: TaskId, settings: &'a Settings) -> Self {
        Self {
            blueprint,
            task,
            settings,
        }
    }
}

impl Display for TaskBlock<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let task = &self.blueprint[self.task];
        let settings = self.settings;
        let i1 = &settings.indent;
        let i2 = settings.indent.repeat(2);

        writeln!(f, "task {} {{", task.name())?;

        writeln!(f, "{i1}input {{")?;
        for (slot, ty) in task.input_types().iter().enumerate() {
            writeln!(f, "{i2}{} {}", ty.wdl_name(), settings.input_name(slot))?;
        }
        writeln!(f, "{i1}}}")?;
        writeln!(f)?;

        let mut command = format!("{} {}", settings.interpreter, settings.script_name(task.name()));
        for (slot, ty) in task.input_types().iter().enumerate() {
            let name = settings.input_name(slot);
            if ty.element().is_some_and(WdlType::is_array) {
                command.push_str(&format!(" ${{write_json({name})}}"));
            } else if ty.is_array() {
                command.push_str(&format!(" ${{sep=\",\" {name}}}"));
            } else {
                command.push_str(&format!(" ${{{name}}}"));
            }
        }

        writeln!(f, "{i1}command {{")?;
        writeln!(f, "{i2}{command}")?;
        writeln!(f, "{i1}}}")?;

        if !task.output_types().is_empty() {
            writeln!(f)?;
            writeln!(f, "{i1}output {{")?;
            for (slot, ty) in task.output_types().iter().enumerate() {
                writeln!(
                    f,
                    "{i2}{} {} = {}(\"{}\")",
                    ty.wdl_name(),
                    settings.output_name(slot),
                    ty.read_function(),
                    settings.output_file(task.name(), slot)
                )?;
            }
            writeln!(f, "{i1}}}")?;
        }

        writeln!(f, "}}")
    }
}

/// The `workflow` block: literal inputs and the planned statements.
pub struct WorkflowBlock<'a> {
    blueprint: &'a Blueprint,
    plan: &'a Plan,
    tasks: &'a [TaskId],
    settings: &'a Settings,
}

impl<'a> WorkflowBlock<'a> {
    pub fn new(
        blueprint: &'a Blueprint,
        plan: &'a Plan,
        tasks: &'a [TaskId],
        settings: &'a Settings,
    ) -> Self {
        Self {
            blueprint,
            plan,
            tasks,
            settings,
        }
    }

    /// Literal containers feeding any task of the unit.
    fn containers(&self) -> BTreeSet<ValuesId> {
        self.tasks
            .iter()
            .flat_map(|task| self.blueprint[*task].edges.iter().flatten())
            .filter_map(|value| match self.blueprint[*value].producer()?.source {
                Source::Values(values) => Some(values),
                Source::Task(_) => None,
            })
            .collect()
    }

    /// How a value is referred to from inside the workflow.
    fn reference(&self, value: ValueId) -> String {
        let node = &self.blueprint[value];

        if let Role::Element(array) = node.role() {
            if node.is_scattered() {
                return self.scatter_variable(array);
            }
        }

        match node.producer() {
            Some(producer) => match producer.source {
                Source::Task(task) => format!(
                    "{}.{}",
                    self.blueprint[task].name(),
                    self.settings.output_name(producer.slot)
                ),
                Source::Values(values) => format!(
                    "{}_{}",
                    self.blueprint[values].name(),
                    self.settings.output_name(producer.slot)
                ),
            },
            None => match (node.literal(), node.role()) {
                (Some(literal), _) => literal.render(),
                (None, Role::Wrapper(inner)) => format!("[{}]", self.reference(inner)),
                (None, _) => format!("value{}", value.index()),
            },
        }
    }

    /// Loop variable of a scatter block over `array`.
    fn scatter_variable(&self, array: ValueId) -> String {
        let node = &self.blueprint[array];

        if let Role::Element(outer) = node.role() {
            return format!("{}_element", self.scatter_variable(outer));
        }

        let Some(producer) = node.producer() else {
            return format!("value{}_element", array.index());
        };

        let owner = match producer.source {
            Source::Task(task) => self.blueprint[task].name(),
            Source::Values(values) => self.blueprint[values].name(),
        };

        format!("{owner}_{}_element", self.settings.output_name(producer.slot))
    }

    fn slot_reference(&self, values: &[ValueId]) -> String {
        match values {
            [value] => self.reference(*value),
            _ => {
                let refs: Vec<_> = values.iter().map(|value| self.reference(*value)).collect();
                format!("select_first([{}])", refs.join(", "))
            }
        }
    }

    fn condition(&self, task: TaskId, alternative: TaskId) -> String {
        let task = &self.blueprint[task];
        let slot = task.condition_slot().unwrap_or_default();

        format!(
            "{}.{} == \"{}\"",
            task.name(),
            self.settings.output_name(slot),
            self.blueprint[alternative].name()
        )
    }

    fn statement(&self, f: &mut Formatter<'_>, statement: &Statement) -> fmt::Result {
        let indent = self.settings.indent.repeat(statement.level);

        match statement.kind {
            StatementKind::Call(task) => {
                let task = &self.blueprint[task];
                let slots = task.input_types().len();

                if slots == 0 {
                    return writeln!(f, "{indent}call {}", task.name());
                }

                let inner = self.settings.indent.repeat(statement.level + 1);
                let args = self.settings.indent.repeat(statement.level + 2);

                writeln!(f, "{indent}call {} {{", task.name())?;
                writeln!(f, "{inner}input:")?;
                for slot in 0..slots {
                    let separator = if slot + 1 < slots { "," } else { "" };
                    writeln!(
                        f,
                        "{args}{} = {}{separator}",
                        self.settings.input_name(slot),
                        self.slot_reference(task.input(slot))
                    )?;
                }
                writeln!(f, "{indent}}}")
            }
            StatementKind::Scatter { array } => writeln!(
                f,
                "{indent}scatter ({} in {}) {{",
                self.scatter_variable(array),
                self.reference(array)
            ),
            StatementKind::If { task, alternative } => {
                writeln!(f, "{indent}if ({}) {{", self.condition(task, alternative))
            }
            StatementKind::ElseIf { task, alternative } => {
                writeln!(f, "{indent}}} else if ({}) {{", self.condition(task, alternative))
            }
            StatementKind::Close => writeln!(f, "{indent}}}"),
        }
    }
}

impl Display for WorkflowBlock<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let i1 = &self.settings.indent;
        let i2 = self.settings.indent.repeat(2);

        writeln!(f, "workflow {} {{", self.settings.workflow_name)?;

        let containers = self.containers();
        if !containers.is_empty() {
            writeln!(f, "{i1}input {{")?;
            for values in containers {
                let container = &self.blueprint[values];
                for (slot, value) in container.outputs().iter().enumerate() {
                    let node = &self.blueprint[*value];
                    let literal = node.literal().map(|l| l.render()).unwrap_or_default();
                    writeln!(
                        f,
                        "{i2}{} {}_{} = {literal}",
                        node.ty().wdl_name(),
                        container.name(),
                        self.settings.output_name(slot)
                    )?;
                }
            }
            writeln!(f, "{i1}}}")?;
            writeln!(f)?;
        }

        for statement in self.plan.statements() {
            self.statement(f, statement)?;
        }

        writeln!(f, "}}")
    }
}
