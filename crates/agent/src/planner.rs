//! Task decomposition and dependency-aware scheduling.
//!
//! Goals decompose into a DAG of tasks; dependencies always point at
//! tasks of the same goal. Scheduling is dependency resolution: a task
//! is executable once every dependency has completed, and tasks whose
//! dependencies can no longer complete become blocked.

use chrono::Utc;
use clawcraft_core::goal::{Goal, Task, TaskStatus};
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Builds and schedules the task DAG for active goals.
pub struct TaskPlanner {
    tasks: HashMap<String, Task>,
    /// Insertion order, for stable scheduling among equal priorities.
    order: Vec<String>,
}

impl TaskPlanner {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Add a task, checking that every dependency resolves to an
    /// already-known task of the same goal.
    pub fn add_task(&mut self, task: Task) -> Result<String, String> {
        for dep in &task.dependencies {
            match self.tasks.get(dep) {
                None => return Err(format!("Unknown dependency {dep}")),
                Some(existing) if existing.goal_id != task.goal_id => {
                    return Err(format!(
                        "Dependency {dep} belongs to goal {} not {}",
                        existing.goal_id, task.goal_id
                    ))
                }
                Some(_) => {}
            }
        }
        let id = task.id.clone();
        self.order.push(id.clone());
        self.tasks.insert(id.clone(), task);
        Ok(id)
    }

    /// Break a goal into an executable task chain by its description.
    ///
    /// The templates mirror the speedrun ladder: wood before tools,
    /// tools before ore, ore before the nether. Unrecognized goals get
    /// one free-form task the model can act on.
    pub fn decompose_goal(&mut self, goal: &Goal) -> Vec<String> {
        let description = goal.description.to_lowercase();

        let chain: Vec<Task> = if description.contains("wood") {
            self.chain(
                goal,
                &[
                    ("Gather logs", "mine_block", json!({"blockType": "oak_log", "count": 4}), 60),
                    ("Craft planks", "craft_item", json!({"itemName": "oak_planks", "count": 4}), 10),
                    ("Craft a crafting table", "craft_item", json!({"itemName": "crafting_table", "count": 1}), 10),
                ],
            )
        } else if description.contains("stone") {
            self.chain(
                goal,
                &[
                    ("Craft a wooden pickaxe", "craft_item", json!({"itemName": "wooden_pickaxe", "count": 1}), 15),
                    ("Mine stone", "mine_block", json!({"blockType": "stone", "count": 8}), 90),
                    ("Craft a stone pickaxe", "craft_item", json!({"itemName": "stone_pickaxe", "count": 1}), 15),
                ],
            )
        } else if description.contains("iron") {
            self.chain(
                goal,
                &[
                    ("Find and mine iron ore", "mine_block", json!({"blockType": "iron_ore", "count": 3}), 180),
                    ("Craft an iron pickaxe", "craft_item", json!({"itemName": "iron_pickaxe", "count": 1}), 20),
                ],
            )
        } else if description.contains("food") || description.contains("eat") {
            self.chain(
                goal,
                &[("Eat to restore hunger", "eat_food", json!({}), 10)],
            )
        } else {
            self.chain(
                goal,
                &[(goal.description.as_str(), "plan", json!({}), 60)],
            )
        };

        let mut ids = Vec::with_capacity(chain.len());
        for task in chain {
            // Chains are built dependency-first, so adds cannot fail.
            match self.add_task(task) {
                Ok(id) => ids.push(id),
                Err(e) => warn!(error = %e, "Dropped malformed task during decomposition"),
            }
        }
        debug!(goal = %goal.description, tasks = ids.len(), "Decomposed goal");
        ids
    }

    /// Build a linear chain where each task depends on the previous one.
    fn chain(
        &self,
        goal: &Goal,
        steps: &[(&str, &str, serde_json::Value, u64)],
    ) -> Vec<Task> {
        let mut tasks: Vec<Task> = Vec::with_capacity(steps.len());
        for (i, (description, action, parameters, estimate)) in steps.iter().enumerate() {
            let mut task = Task::new(
                &goal.id,
                *description,
                *action,
                parameters.clone(),
                goal.priority + i as u32,
            )
            .with_estimate(*estimate);
            if let Some(previous) = tasks.last() {
                task.dependencies = vec![previous.id.clone()];
            }
            tasks.push(task);
        }
        tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn tasks_for_goal(&self, goal_id: &str) -> Vec<&Task> {
        self.order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .filter(|t| t.goal_id == goal_id)
            .collect()
    }

    fn dependencies_met(&self, task: &Task) -> bool {
        task.dependencies.iter().all(|dep| {
            self.tasks
                .get(dep)
                .map(|d| d.status == TaskStatus::Completed)
                .unwrap_or(false)
        })
    }

    fn dependencies_doomed(&self, task: &Task) -> bool {
        task.dependencies.iter().any(|dep| {
            self.tasks
                .get(dep)
                .map(|d| matches!(d.status, TaskStatus::Failed | TaskStatus::Blocked))
                .unwrap_or(true)
        })
    }

    /// The next pending task whose dependencies are all completed,
    /// lowest priority value first, insertion order as tie-break.
    /// Tasks downstream of a failure are marked blocked on the way.
    pub fn next_executable_task(&mut self) -> Option<Task> {
        // Propagate failures first so blocked work never surfaces.
        let doomed: Vec<String> = self
            .order
            .iter()
            .filter(|id| {
                self.tasks
                    .get(*id)
                    .map(|t| t.status == TaskStatus::Pending && self.dependencies_doomed(t))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        for id in doomed {
            if let Some(task) = self.tasks.get_mut(&id) {
                task.status = TaskStatus::Blocked;
                debug!(task = %task.description, "Task blocked by failed dependency");
            }
        }

        self.order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .filter(|t| t.status == TaskStatus::Pending && self.dependencies_met(t))
            .min_by_key(|t| t.priority)
            .cloned()
    }

    pub fn start_task(&mut self, id: &str) -> bool {
        match self.tasks.get_mut(id) {
            Some(task) if task.status == TaskStatus::Pending => {
                task.status = TaskStatus::InProgress;
                true
            }
            _ => false,
        }
    }

    /// Mark a task completed, stamping `completed_at`.
    pub fn complete_task(&mut self, id: &str) -> bool {
        match self.tasks.get_mut(id) {
            Some(task) => {
                task.status = TaskStatus::Completed;
                task.completed_at = Some(Utc::now());
                task.error = None;
                true
            }
            None => false,
        }
    }

    /// Mark a task failed with an error message.
    pub fn fail_task(&mut self, id: &str, error: &str) -> bool {
        match self.tasks.get_mut(id) {
            Some(task) => {
                task.status = TaskStatus::Failed;
                task.completed_at = None;
                task.error = Some(error.to_string());
                true
            }
            None => false,
        }
    }

    /// Tasks layered so every task's dependencies live in an earlier
    /// group; tasks within one group can run in parallel.
    pub fn parallel_groups(&self, goal_id: &str) -> Vec<Vec<String>> {
        let mut layer_of: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<Vec<String>> = Vec::new();

        // Insertion order is creation order, so dependencies are
        // assigned a layer before their dependents.
        for id in &self.order {
            let Some(task) = self.tasks.get(id) else {
                continue;
            };
            if task.goal_id != goal_id {
                continue;
            }
            let layer = task
                .dependencies
                .iter()
                .filter_map(|dep| layer_of.get(dep.as_str()))
                .max()
                .map(|deepest| deepest + 1)
                .unwrap_or(0);
            layer_of.insert(id, layer);
            if groups.len() <= layer {
                groups.resize_with(layer + 1, Vec::new);
            }
            groups[layer].push(id.clone());
        }
        groups
    }

    /// Completed percentage across a goal's tasks (integer floor).
    pub fn progress(&self, goal_id: &str) -> u8 {
        let tasks = self.tasks_for_goal(goal_id);
        if tasks.is_empty() {
            return 0;
        }
        let completed = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
        ((completed * 100) / tasks.len()) as u8
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Default for TaskPlanner {
    fn default() -> Self {
        Self::new()
    }
}
