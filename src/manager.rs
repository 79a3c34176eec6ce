//! Applies the pipeline algebra to the blueprint.

use crate::blueprint::{Blueprint, TaskDef};
use crate::component::Component;
use crate::config::Settings;
use crate::emit::Document;
use crate::error::CompileError;
use crate::output::Translation;
use crate::plan::Plan;
use crate::script::{ScriptExporter, render_scripts};
use crate::task::TaskId;
use crate::types::Literal;
use crate::value::{ValueId, ValuesId};
use crate::workflow::{Operator, Workflow};

/// Owns one compilation unit: the blueprint, the components seen so far and
/// the settings used to emit them.
///
/// # Example
///
/// ```rust
/// use wdlflow::{EmbeddedBody, Manager, Workflow, WdlType};
///
/// let mut manager = Manager::new();
/// let first = manager
///     .task("first")
///     .output(WdlType::Int)
///     .body("def first():\n    return 1\n")
///     .register()?;
/// let second = manager
///     .task("second")
///     .input(WdlType::Int)
///     .body("def second(x):\n    print(x)\n")
///     .register()?;
///
/// manager.add_workflow(&Workflow::new(first).forward(second))?;
///
/// let translation = manager.translate(&EmbeddedBody)?;
/// assert!(translation.document.contains("call second"));
/// # Ok::<(), wdlflow::CompileError>(())
/// ```
#[derive(Debug, Default)]
pub struct Manager {
    blueprint: Blueprint,
    components: Vec<Component>,
    settings: Settings,
}

impl Manager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn task(&mut self, name: impl Into<String>) -> TaskDef<'_> {
        self.blueprint.task(name)
    }

    pub fn values(&mut self, literals: impl IntoIterator<Item = Literal>) -> ValuesId {
        self.blueprint.values(literals)
    }

    pub fn literal(&mut self, literal: impl Into<Literal>) -> ValueId {
        self.blueprint.literal(literal)
    }

    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }

    pub fn blueprint_mut(&mut self) -> &mut Blueprint {
        &mut self.blueprint
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Components registered so far, without duplicates, in first-seen order.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Every task of the unit, collections expanded, in declaration order.
    pub fn tasks(&self) -> Vec<TaskId> {
        let mut tasks: Vec<_> = self
            .components
            .iter()
            .flat_map(|component| component.members().iter().copied())
            .collect();

        tasks.sort();
        tasks.dedup();
        tasks
    }

    /// Wires a pipeline into the blueprint.
    ///
    /// The operators are applied left to right. If any of them fails, the
    /// blueprint is left exactly as it was before the call.
    pub fn add_workflow(&mut self, workflow: &Workflow) -> Result<(), CompileError> {
        let span = tracing::info_span!("add_workflow", %workflow);
        let _enter = span.enter();

        let snapshot = self.blueprint.clone();

        for (base, operator, other) in workflow.steps() {
            if let Err(err) = self.apply(base, operator, other) {
                tracing::debug!(%operator, "rolling back: {err}");
                self.blueprint = snapshot;
                return Err(err);
            }
        }

        for component in workflow.operands() {
            if !self.components.contains(component) {
                self.components.push(component.clone());
            }
        }

        Ok(())
    }

    pub fn plan(&self) -> Result<Plan, CompileError> {
        Plan::new(&self.blueprint, &self.tasks())
    }

    /// Compiles the unit into the workflow document and one script per task.
    pub fn translate<E>(&self, exporter: &E) -> Result<Translation, CompileError>
    where
        E: ScriptExporter + ?Sized,
    {
        let span = tracing::info_span!("translate", tasks = self.components.len());
        let _enter = span.enter();

        let tasks = self.tasks();
        let plan = Plan::new(&self.blueprint, &tasks)?;
        let scripts = render_scripts(&self.blueprint, &tasks, exporter, &self.settings)?;
        let document = Document::new(&self.blueprint, &plan, &tasks, &self.settings).to_string();

        tracing::info!(
            tasks = tasks.len(),
            statements = plan.statements().len(),
            "translated workflow"
        );

        Ok(Translation {
            document,
            document_name: self.settings.document_name.clone(),
            scripts,
            plan,
        })
    }

    fn apply(
        &mut self,
        base: &Component,
        operator: Operator,
        other: &Component,
    ) -> Result<(), CompileError> {
        let invalid = |reason: &str| CompileError::InvalidOperatorUse {
            operator: operator.to_string(),
            reason: reason.to_string(),
        };

        if let Component::Values(_) = other {
            return Err(invalid("a literal container can't receive inputs"));
        }

        let blueprint = &mut self.blueprint;

        match operator {
            Operator::Forward => {
                if base.is_scattered(blueprint) {
                    other.use_scatter(blueprint);
                }
                let outputs = base.outputs(blueprint);
                fan_out(blueprint, other, &outputs)
            }
            Operator::Branch => {
                let task = match base {
                    Component::Task(task) if blueprint[*task].is_branching() => *task,
                    _ => return Err(invalid("only a task with a Condition output can branch")),
                };

                if base.is_scattered(blueprint) {
                    other.use_scatter(blueprint);
                }

                let outputs = blueprint[task].outputs();
                for &member in other.members() {
                    blueprint.connect_all(member, &outputs)?;
                    blueprint.task_mut(task).alternatives.push(member);
                }

                Ok(())
            }
            Operator::Join => {
                if !base.is_collection() {
                    return Err(invalid("only a collection of tasks can be joined"));
                }
                if base.is_scattered(blueprint) {
                    other.use_scatter(blueprint);
                }
                let outputs = base.outputs(blueprint);
                fan_out(blueprint, other, &outputs)
            }
            Operator::Scatter => {
                other.use_scatter(blueprint);

                let outputs = base.outputs(blueprint);
                for &value in &outputs {
                    if blueprint[value].ty().is_array() {
                        blueprint.scatter(value);
                    }
                }

                fan_out(blueprint, other, &outputs)
            }
            Operator::Gather => {
                if !base.is_scattered(blueprint) {
                    return Err(invalid("only a scattered component can be gathered"));
                }

                let outputs = base.outputs(blueprint);
                for &value in &outputs {
                    blueprint.wrap(value);
                }

                fan_out(blueprint, other, &outputs)
            }
        }
    }
}

/// Hands `outputs` to the members of `target`.
fn fan_out(
    blueprint: &mut Blueprint,
    target: &Component,
    outputs: &[ValueId],
) -> Result<(), CompileError> {
    match target {
        Component::Task(task) => blueprint.connect_all(*task, outputs),
        Component::Values(_) => Ok(()),
        Component::Tasks(tasks) | Component::ParallelTasks(tasks) => {
            for &task in tasks {
                blueprint.connect_all(task, outputs)?;
            }
            Ok(())
        }
        Component::DistributedTasks(tasks) => {
            let arity: usize = tasks
                .iter()
                .map(|task| blueprint[*task].input_types().len())
                .sum();

            if arity != outputs.len() {
                let names: Vec<_> = tasks.iter().map(|task| blueprint[*task].name()).collect();
                return Err(CompileError::ArityMismatch {
                    task: names.join(", "),
                    expected: arity,
                    found: outputs.len(),
                });
            }

            let mut rest = outputs;
            for &task in tasks {
                let (head, tail) = rest.split_at(blueprint[task].input_types().len());
                blueprint.connect_all(task, head)?;
                rest = tail;
            }

            Ok(())
        }
    }
}
