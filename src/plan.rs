//! Nesting levels and statement order of the emitted workflow.
//!
//! Tasks are placed one at a time into a flat list of statements, each with a
//! nesting level. Scatter and conditional blocks are represented by opener
//! statements whose body is the run of deeper statements following them. The
//! closing markers are only derived at the very end, so that statements can
//! be freely inserted in the middle of a block while planning.

use std::collections::{BTreeMap, HashMap};

use petgraph::algo::toposort;

use crate::blueprint::Blueprint;
use crate::error::CompileError;
use crate::task::TaskId;
use crate::value::{Role, ValueId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Call(TaskId),
    /// Opens a block executed once per element of `array`.
    Scatter { array: ValueId },
    /// Opens the block of the first alternative of a branching task.
    If { task: TaskId, alternative: TaskId },
    /// Closes the previous alternative and opens the next one.
    ElseIf { task: TaskId, alternative: TaskId },
    Close,
}

impl StatementKind {
    pub fn opens_block(&self) -> bool {
        matches!(
            self,
            StatementKind::Scatter { .. } | StatementKind::If { .. } | StatementKind::ElseIf { .. }
        )
    }
}

/// One line of the workflow body. Top-level statements have level 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statement {
    pub level: usize,
    pub kind: StatementKind,
}

/// Ordered statements of the workflow body, with the level of every task.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    statements: Vec<Statement>,
    levels: BTreeMap<TaskId, usize>,
}

impl Plan {
    /// Levels and orders `tasks`, which must be listed in declaration order.
    pub fn new(blueprint: &Blueprint, tasks: &[TaskId]) -> Result<Self, CompileError> {
        let span = tracing::debug_span!("plan", tasks = tasks.len());
        let _enter = span.enter();

        check_inputs(blueprint, tasks)?;
        check_cycles(blueprint)?;

        let mut planner = Planner::new(blueprint, tasks);
        planner.run(tasks)?;

        Ok(Plan {
            statements: close_blocks(&planner.statements),
            levels: planner.levels,
        })
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn level(&self, task: TaskId) -> Option<usize> {
        self.levels.get(&task).copied()
    }

    pub fn levels(&self) -> &BTreeMap<TaskId, usize> {
        &self.levels
    }

    /// Tasks in emission order.
    pub fn calls(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.statements.iter().filter_map(|s| match s.kind {
            StatementKind::Call(task) => Some(task),
            _ => None,
        })
    }
}

fn check_inputs(blueprint: &Blueprint, tasks: &[TaskId]) -> Result<(), CompileError> {
    for &task in tasks {
        let task = &blueprint[task];
        if let Some(slot) = (0..task.input_types().len()).find(|slot| task.input(*slot).is_empty()) {
            return Err(CompileError::UnresolvableGraph {
                task: task.name().to_string(),
                reason: format!("has nothing connected to input {slot}"),
            });
        }
    }

    Ok(())
}

fn check_cycles(blueprint: &Blueprint) -> Result<(), CompileError> {
    let graph = blueprint.dependency_graph();

    toposort(&graph, None).map(|_| ()).map_err(|cycle| {
        let task = graph[cycle.node_id()];
        CompileError::UnresolvableGraph {
            task: blueprint[task].name().to_string(),
            reason: "is part of a dependency cycle".to_string(),
        }
    })
}

struct Planner<'a> {
    blueprint: &'a Blueprint,
    statements: Vec<Statement>,
    levels: BTreeMap<TaskId, usize>,
    /// Branching task each alternative is attached to.
    owners: HashMap<TaskId, TaskId>,
}

impl<'a> Planner<'a> {
    fn new(blueprint: &'a Blueprint, tasks: &[TaskId]) -> Self {
        let mut owners = HashMap::new();
        for &task in tasks {
            for &alternative in blueprint[task].alternatives() {
                owners.entry(alternative).or_insert(task);
            }
        }

        Self {
            blueprint,
            statements: Vec::new(),
            levels: BTreeMap::new(),
            owners,
        }
    }

    fn run(&mut self, tasks: &[TaskId]) -> Result<(), CompileError> {
        loop {
            let before = self.levels.len();

            for &task in tasks {
                if self.levels.contains_key(&task) {
                    self.expand(task)?;
                    continue;
                }

                if self.owners.contains_key(&task) || !self.is_ready(task) {
                    continue;
                }

                self.place(task)?;
                self.expand(task)?;
            }

            let stuck = tasks.iter().find(|task| !self.levels.contains_key(*task));
            match stuck {
                None => return Ok(()),
                Some(task) if self.levels.len() == before => {
                    return Err(CompileError::UnresolvableGraph {
                        task: self.blueprint[*task].name().to_string(),
                        reason: "depends on tasks that are never placed".to_string(),
                    });
                }
                Some(_) => {}
            }
        }
    }

    fn is_ready(&self, task: TaskId) -> bool {
        self.blueprint
            .parents(task)
            .iter()
            .all(|parent| self.levels.contains_key(parent))
    }

    fn place(&mut self, task: TaskId) -> Result<(), CompileError> {
        let parents = self.blueprint.parents(task);
        let anchor = parents.iter().filter_map(|p| self.position(*p)).max();

        if let Some(array) = self.scattered_array(task) {
            self.place_in_scatter(task, array, anchor);
            return Ok(());
        }

        let Some(anchor) = anchor else {
            let at = self.front();
            self.insert(at, 1, StatementKind::Call(task));
            tracing::trace!(task = %self.blueprint[task].name(), "placed root");
            return Ok(());
        };

        let level = if self.is_fan_in(task) {
            let level = self.fan_in_level(task, &parents)?;
            level.saturating_sub(1).max(1)
        } else if let Some(producer) = self.gathered_producer(task) {
            self.level_of(producer).saturating_sub(1).max(1)
        } else {
            self.statements[anchor].level
        };

        let at = self.end_of_block(anchor, level);
        let level = self.insert(at, level, StatementKind::Call(task));
        tracing::trace!(task = %self.blueprint[task].name(), level, "placed task");

        Ok(())
    }

    fn place_in_scatter(&mut self, task: TaskId, array: ValueId, anchor: Option<usize>) {
        let outer = match self.blueprint[array].producer().and_then(|p| p.task()) {
            Some(producer) => self.level_of(producer),
            None => 1,
        };

        let start = anchor.map_or(0, |anchor| anchor + 1);
        let opener = (start..self.statements.len()).find(|&i| {
            let statement = self.statements[i];
            statement.level == outer && statement.kind == StatementKind::Scatter { array }
        });

        let level = match opener {
            Some(opener) => {
                let at = self.end_of_block(opener, outer + 1);
                self.insert(at, outer + 1, StatementKind::Call(task))
            }
            None => {
                let at = match anchor {
                    Some(anchor) => self.end_of_block(anchor, outer),
                    None => self.front(),
                };
                let outer = self.insert(at, outer, StatementKind::Scatter { array });
                self.insert(at + 1, outer + 1, StatementKind::Call(task))
            }
        };

        tracing::trace!(task = %self.blueprint[task].name(), level, "placed in scatter");
    }

    /// Places every not yet placed alternative of a branching task, each in
    /// its own conditional block. The blocks form one if/else-if chain that
    /// starts after the task and after every other producer of an
    /// alternative.
    fn expand(&mut self, task: TaskId) -> Result<(), CompileError> {
        let Some(at) = self.position(task) else {
            return Ok(());
        };

        let level = self.statements[at].level;
        let alternatives = self.blueprint[task].alternatives().to_vec();

        for alternative in alternatives {
            if self.levels.contains_key(&alternative) || !self.is_ready(alternative) {
                continue;
            }

            let Some(at) = self.position(task) else {
                return Ok(());
            };

            let earliest = self
                .blueprint
                .parents(alternative)
                .iter()
                .filter(|parent| **parent != task)
                .filter_map(|parent| self.position(*parent))
                .max()
                .map(|parent| self.end_of_block(parent, level));

            let (at, kind) = match self.chain_end(task) {
                Some(end) if earliest.is_some_and(|earliest| earliest > end) => {
                    return Err(CompileError::UnresolvableGraph {
                        task: self.blueprint[alternative].name().to_string(),
                        reason: format!(
                            "has a producer placed after the other alternatives of '{}'",
                            self.blueprint[task].name()
                        ),
                    });
                }
                Some(end) => (end, StatementKind::ElseIf { task, alternative }),
                None => (
                    earliest.map_or(at + 1, |earliest| earliest.max(at + 1)),
                    StatementKind::If { task, alternative },
                ),
            };

            let level = self.insert(at, level, kind);
            self.insert(at + 1, level + 1, StatementKind::Call(alternative));
            tracing::trace!(task = %self.blueprint[alternative].name(), "placed alternative");

            self.expand(alternative)?;
        }

        Ok(())
    }

    /// Every slot is fed by more than one producer.
    fn is_fan_in(&self, task: TaskId) -> bool {
        let task = &self.blueprint[task];
        let slots = task.input_types().len();
        slots > 0 && (0..slots).all(|slot| task.input(slot).len() > 1)
    }

    fn fan_in_level(&self, task: TaskId, parents: &[TaskId]) -> Result<usize, CompileError> {
        let levels: Vec<_> = parents.iter().map(|p| self.level_of(*p)).collect();

        match levels.split_first() {
            Some((first, rest)) if rest.iter().all(|level| level == first) => Ok(*first),
            Some(_) => {
                let levels = parents
                    .iter()
                    .zip(&levels)
                    .map(|(parent, level)| format!("{}: {level}", self.blueprint[*parent].name()))
                    .collect::<Vec<_>>()
                    .join(", ");

                Err(CompileError::InconsistentFanInLevel {
                    task: self.blueprint[task].name().to_string(),
                    levels,
                })
            }
            None => Ok(1),
        }
    }

    /// Array whose scattered element feeds one of the task's slots.
    fn scattered_array(&self, task: TaskId) -> Option<ValueId> {
        self.blueprint[task]
            .edges
            .iter()
            .flatten()
            .find_map(|value| match self.blueprint[*value].role() {
                Role::Element(array) if self.blueprint[*value].is_scattered() => Some(array),
                _ => None,
            })
    }

    /// Task whose wrapped output feeds one of the task's slots.
    fn gathered_producer(&self, task: TaskId) -> Option<TaskId> {
        self.blueprint[task]
            .edges
            .iter()
            .flatten()
            .filter(|value| matches!(self.blueprint[**value].role(), Role::Wrapper(_)))
            .find_map(|value| self.blueprint[*value].producer().and_then(|p| p.task()))
    }

    fn level_of(&self, task: TaskId) -> usize {
        self.levels.get(&task).copied().unwrap_or(1)
    }

    fn position(&self, task: TaskId) -> Option<usize> {
        self.statements
            .iter()
            .position(|s| s.kind == StatementKind::Call(task))
    }

    /// First index after the statement at `from` that is shallower than
    /// `level`.
    fn end_of_block(&self, from: usize, level: usize) -> usize {
        let mut at = from + 1;
        while at < self.statements.len() && self.statements[at].level >= level {
            at += 1;
        }
        at
    }

    /// First index after the if/else-if chain of a branching task, `None`
    /// while none of its alternatives is placed.
    fn chain_end(&self, task: TaskId) -> Option<usize> {
        let mut at = self.statements.iter().position(|s| {
            matches!(s.kind, StatementKind::If { task: owner, .. } if owner == task)
        })?;

        loop {
            at = self.end_of_block(at, self.statements[at].level + 1);
            match self.statements.get(at).map(|s| s.kind) {
                Some(StatementKind::ElseIf { task: owner, .. }) if owner == task => {}
                _ => return Some(at),
            }
        }
    }

    /// Insertion point for top-level roots: after the previously placed ones.
    fn front(&self) -> usize {
        let last = self.statements.iter().rposition(|s| match s.kind {
            StatementKind::Call(task) => s.level == 1 && self.blueprint.parents(task).is_empty(),
            _ => false,
        });

        match last.map(|at| (at, self.statements[at].kind)) {
            Some((at, StatementKind::Call(task))) => self.chain_end(task).unwrap_or(at + 1),
            _ => 0,
        }
    }

    /// Inserts a statement, keeping its level reachable from the statement
    /// before it. Returns the level actually used.
    fn insert(&mut self, at: usize, level: usize, kind: StatementKind) -> usize {
        let ceiling = match at.checked_sub(1).map(|i| self.statements[i]) {
            Some(prev) if prev.kind.opens_block() => prev.level + 1,
            Some(prev) => prev.level,
            None => 1,
        };

        let level = level.min(ceiling).max(1);
        if let StatementKind::Call(task) = kind {
            self.levels.insert(task, level);
        }

        self.statements.insert(at, Statement { level, kind });
        level
    }
}

/// Adds a closing marker wherever a block ends. An `ElseIf` ends the previous
/// alternative by itself.
fn close_blocks(statements: &[Statement]) -> Vec<Statement> {
    let mut closed = Vec::with_capacity(statements.len() * 2);
    let mut open: Vec<usize> = Vec::new();

    let close_from = |open: &mut Vec<usize>, closed: &mut Vec<Statement>, level: usize| {
        while let Some(&top) = open.last() {
            if top < level {
                break;
            }
            open.pop();
            closed.push(Statement {
                level: top,
                kind: StatementKind::Close,
            });
        }
    };

    for statement in statements {
        match statement.kind {
            StatementKind::ElseIf { .. } => {
                close_from(&mut open, &mut closed, statement.level + 1);
                if open.last() == Some(&statement.level) {
                    open.pop();
                }
            }
            _ => close_from(&mut open, &mut closed, statement.level),
        }

        closed.push(*statement);
        if statement.kind.opens_block() {
            open.push(statement.level);
        }
    }

    close_from(&mut open, &mut closed, 1);
    closed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::manager::Manager;
    use crate::types::{Literal, WdlType};
    use crate::workflow::Workflow;

    fn kinds(plan: &Plan) -> Vec<(usize, StatementKind)> {
        plan.statements().iter().map(|s| (s.level, s.kind)).collect()
    }

    #[test]
    fn test_flat_chain() {
        let mut manager = Manager::new();
        let a = manager.task("a").output(WdlType::Int).register().unwrap();
        let b = manager.task("b").input(WdlType::Int).output(WdlType::Int).register().unwrap();
        let c = manager.task("c").input(WdlType::Int).register().unwrap();

        manager
            .add_workflow(&Workflow::new(a).forward(b).forward(c))
            .unwrap();

        let plan = manager.plan().unwrap();
        assert_eq!(
            kinds(&plan),
            vec![
                (1, StatementKind::Call(a)),
                (1, StatementKind::Call(b)),
                (1, StatementKind::Call(c)),
            ]
        );
    }

    #[test]
    fn test_scatter_chain() {
        let mut manager = Manager::new();
        let a = manager.task("a").output(WdlType::array(WdlType::Int)).register().unwrap();
        let b = manager.task("b").input(WdlType::Int).output(WdlType::Int).register().unwrap();
        let c = manager.task("c").input(WdlType::Int).output(WdlType::Int).register().unwrap();
        let d = manager.task("d").input(WdlType::array(WdlType::Int)).register().unwrap();

        manager
            .add_workflow(&Workflow::new(a).scatter(b).forward(c).gather(d))
            .unwrap();

        let array = manager.blueprint()[a].outputs()[0];
        let plan = manager.plan().unwrap();
        assert_eq!(
            kinds(&plan),
            vec![
                (1, StatementKind::Call(a)),
                (1, StatementKind::Scatter { array }),
                (2, StatementKind::Call(b)),
                (2, StatementKind::Call(c)),
                (1, StatementKind::Close),
                (1, StatementKind::Call(d)),
            ]
        );
        assert_eq!(plan.level(c), Some(2));
        assert_eq!(plan.level(d), Some(1));
    }

    #[test]
    fn test_scatter_block_is_reused() {
        let mut manager = Manager::new();
        let a = manager.task("a").output(WdlType::array(WdlType::Int)).register().unwrap();
        let b = manager.task("b").input(WdlType::Int).register().unwrap();
        let c = manager.task("c").input(WdlType::Int).register().unwrap();

        manager.add_workflow(&Workflow::new(a).scatter(b)).unwrap();
        manager.add_workflow(&Workflow::new(a).scatter(c)).unwrap();

        let plan = manager.plan().unwrap();
        let scatters = plan
            .statements()
            .iter()
            .filter(|s| matches!(s.kind, StatementKind::Scatter { .. }))
            .count();
        assert_eq!(scatters, 1);
        assert_eq!(plan.calls().collect::<Vec<_>>(), vec![a, b, c]);
    }

    #[test]
    fn test_literal_scatter_opens_at_front() {
        let mut manager = Manager::new();
        let array = Literal::array(WdlType::Int, [Literal::Int(1), Literal::Int(2)]).unwrap();
        let values = manager.values([array]);
        let square = manager.task("square").input(WdlType::Int).register().unwrap();

        manager.add_workflow(&Workflow::new(values).scatter(square)).unwrap();

        let plan = manager.plan().unwrap();
        let levels: Vec<_> = plan.statements().iter().map(|s| s.level).collect();
        assert_eq!(levels, vec![1, 2, 1]);
        assert!(matches!(plan.statements()[0].kind, StatementKind::Scatter { .. }));
        assert_eq!(plan.level(square), Some(2));
    }

    #[test]
    fn test_branches_and_fan_in() {
        let mut manager = Manager::new();
        let decide = manager
            .task("decide")
            .outputs([WdlType::Int, WdlType::Condition])
            .register()
            .unwrap();
        let low = manager.task("low").input(WdlType::Int).output(WdlType::Int).register().unwrap();
        let high = manager.task("high").input(WdlType::Int).output(WdlType::Int).register().unwrap();
        let merge = manager.task("merge").input(WdlType::Int).register().unwrap();

        manager
            .add_workflow(&Workflow::new(decide).branch(Component::tasks([low, high])))
            .unwrap();
        manager.add_workflow(&Workflow::new(low).forward(merge)).unwrap();
        manager.add_workflow(&Workflow::new(high).forward(merge)).unwrap();

        let plan = manager.plan().unwrap();
        assert_eq!(
            kinds(&plan),
            vec![
                (1, StatementKind::Call(decide)),
                (1, StatementKind::If { task: decide, alternative: low }),
                (2, StatementKind::Call(low)),
                (1, StatementKind::ElseIf { task: decide, alternative: high }),
                (2, StatementKind::Call(high)),
                (1, StatementKind::Close),
                (1, StatementKind::Call(merge)),
            ]
        );
    }

    #[test]
    fn test_alternative_follows_its_other_producers() {
        let mut manager = Manager::new();
        let decide = manager
            .task("decide")
            .outputs([WdlType::Int, WdlType::Condition])
            .register()
            .unwrap();
        let extra = manager.task("extra").output(WdlType::Int).register().unwrap();
        let alt = manager.task("alt").input(WdlType::Int).register().unwrap();

        manager.add_workflow(&Workflow::new(decide).branch(alt)).unwrap();
        manager.add_workflow(&Workflow::new(extra).forward(alt)).unwrap();

        let plan = manager.plan().unwrap();
        assert_eq!(
            kinds(&plan),
            vec![
                (1, StatementKind::Call(decide)),
                (1, StatementKind::Call(extra)),
                (1, StatementKind::If { task: decide, alternative: alt }),
                (2, StatementKind::Call(alt)),
                (1, StatementKind::Close),
            ]
        );

        let calls: Vec<_> = plan.calls().collect();
        let position = |task| calls.iter().position(|call| *call == task).unwrap();
        assert!(position(extra) < position(alt));
        assert!(position(decide) < position(alt));
    }

    #[test]
    fn test_split_alternative_chain_is_rejected() {
        let mut manager = Manager::new();
        let decide = manager
            .task("decide")
            .outputs([WdlType::Int, WdlType::Condition])
            .register()
            .unwrap();
        let first = manager.task("first").input(WdlType::Int).register().unwrap();
        let second = manager.task("second").input(WdlType::Int).register().unwrap();
        let extra = manager.task("extra").output(WdlType::Int).register().unwrap();

        manager
            .add_workflow(&Workflow::new(decide).branch(Component::tasks([first, second])))
            .unwrap();
        manager.add_workflow(&Workflow::new(extra).forward(second)).unwrap();

        let err = manager.plan().unwrap_err();
        assert!(matches!(err, CompileError::UnresolvableGraph { task, .. } if task == "second"));
    }

    #[test]
    fn test_inconsistent_fan_in() {
        let mut manager = Manager::new();
        let decide = manager
            .task("decide")
            .outputs([WdlType::Int, WdlType::Condition])
            .register()
            .unwrap();
        let inner = manager.task("inner").input(WdlType::Int).output(WdlType::Int).register().unwrap();
        let outer = manager.task("outer").output(WdlType::Int).register().unwrap();
        let merge = manager.task("merge").input(WdlType::Int).register().unwrap();

        manager.add_workflow(&Workflow::new(decide).branch(inner)).unwrap();
        manager.add_workflow(&Workflow::new(inner).forward(merge)).unwrap();
        manager.add_workflow(&Workflow::new(outer).forward(merge)).unwrap();

        let err = manager.plan().unwrap_err();
        assert!(matches!(err, CompileError::InconsistentFanInLevel { task, .. } if task == "merge"));
    }

    #[test]
    fn test_dangling_input() {
        let mut manager = Manager::new();
        let a = manager.task("a").output(WdlType::Int).register().unwrap();
        let b = manager.task("b").inputs([WdlType::Int, WdlType::Int]).register().unwrap();

        manager.add_workflow(&Workflow::new(a)).unwrap();
        manager.add_workflow(&Workflow::new(b)).unwrap();

        let err = manager.plan().unwrap_err();
        assert!(matches!(err, CompileError::UnresolvableGraph { task, .. } if task == "b"));
    }

    #[test]
    fn test_cycle() {
        let mut manager = Manager::new();
        let a = manager.task("a").input(WdlType::Int).output(WdlType::Int).register().unwrap();
        let b = manager.task("b").input(WdlType::Int).output(WdlType::Int).register().unwrap();

        manager.add_workflow(&Workflow::new(a).forward(b).forward(a)).unwrap();

        let err = manager.plan().unwrap_err();
        assert!(matches!(err, CompileError::UnresolvableGraph { .. }));
    }

    #[test]
    fn test_roots_keep_declaration_order() {
        let mut manager = Manager::new();
        let a = manager.task("a").output(WdlType::Int).register().unwrap();
        let b = manager.task("b").output(WdlType::Int).register().unwrap();
        let c = manager.task("c").inputs([WdlType::Int, WdlType::Int]).register().unwrap();

        manager
            .add_workflow(&Workflow::new(Component::tasks([a, b])).join(c))
            .unwrap();

        let plan = manager.plan().unwrap();
        assert_eq!(plan.calls().collect::<Vec<_>>(), vec![a, b, c]);
        assert!(plan.statements().iter().all(|s| s.level == 1));
    }
}
