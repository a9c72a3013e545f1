//! Goals, tasks, and the speedrun phase model.
//!
//! A `Goal` is a strategic objective; a `Task` is an executable unit of
//! work derived from a goal, with dependencies forming a DAG within that
//! goal. The planner schedules tasks whose dependencies are satisfied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Granularity of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalType {
    Main,
    Sub,
    Task,
}

impl GoalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalType::Main => "main",
            GoalType::Sub => "sub",
            GoalType::Task => "task",
        }
    }
}

impl std::str::FromStr for GoalType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "main" => Ok(GoalType::Main),
            "sub" => Ok(GoalType::Sub),
            "task" => Ok(GoalType::Task),
            other => Err(format!("Unknown goal type: {other}")),
        }
    }
}

/// Lifecycle status of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Pending => "pending",
            GoalStatus::InProgress => "in_progress",
            GoalStatus::Completed => "completed",
            GoalStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for GoalStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(GoalStatus::Pending),
            "in_progress" => Ok(GoalStatus::InProgress),
            "completed" => Ok(GoalStatus::Completed),
            "failed" => Ok(GoalStatus::Failed),
            other => Err(format!("Unknown goal status: {other}")),
        }
    }
}

/// A strategic objective. Lower priority value = more urgent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub goal_type: GoalType,
    pub description: String,
    pub priority: u32,
    pub status: GoalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Goal {
    /// Create a new pending goal.
    pub fn new(goal_type: GoalType, description: impl Into<String>, priority: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            goal_type,
            description: description.into(),
            priority,
            status: GoalStatus::Pending,
            parent_id: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// Lifecycle status of a task. `Blocked` means a dependency failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Blocked,
}

/// An executable unit of work derived from a goal.
///
/// Invariants: `completed_at` is set iff status is `Completed`; every
/// dependency id resolves to a task of the same goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub goal_id: String,
    pub description: String,
    /// The tool/action this task maps to (e.g. "mine_block").
    pub action: String,
    /// Parameters passed to the action.
    pub parameters: serde_json::Value,
    pub priority: u32,
    pub status: TaskStatus,
    /// Ids of tasks within the same goal that must complete first.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_secs: Option<u64>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    pub fn new(
        goal_id: impl Into<String>,
        description: impl Into<String>,
        action: impl Into<String>,
        parameters: serde_json::Value,
        priority: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            goal_id: goal_id.into(),
            description: description.into(),
            action: action.into(),
            parameters,
            priority,
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
            estimated_duration_secs: None,
            created_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn with_estimate(mut self, secs: u64) -> Self {
        self.estimated_duration_secs = Some(secs);
        self
    }
}

/// Coarse strategic stage of a speedrun, derived from current inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedrunPhase {
    EarlyGame,
    NetherPrep,
    Nether,
    EndPrep,
    EndFight,
    Completed,
}

impl SpeedrunPhase {
    /// Zero-based ordinal of the phase in run order.
    pub fn ordinal(&self) -> u8 {
        match self {
            SpeedrunPhase::EarlyGame => 0,
            SpeedrunPhase::NetherPrep => 1,
            SpeedrunPhase::Nether => 2,
            SpeedrunPhase::EndPrep => 3,
            SpeedrunPhase::EndFight => 4,
            SpeedrunPhase::Completed => 5,
        }
    }

    /// Overall run progress in percent, by phase ordinal.
    pub fn progress_percent(&self) -> u8 {
        self.ordinal() * 20
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpeedrunPhase::EarlyGame => "early_game",
            SpeedrunPhase::NetherPrep => "nether_prep",
            SpeedrunPhase::Nether => "nether",
            SpeedrunPhase::EndPrep => "end_prep",
            SpeedrunPhase::EndFight => "end_fight",
            SpeedrunPhase::Completed => "completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_goal_is_pending() {
        let goal = Goal::new(GoalType::Main, "Defeat the dragon", 0);
        assert_eq!(goal.status, GoalStatus::Pending);
        assert!(goal.completed_at.is_none());
        assert!(goal.parent_id.is_none());
    }

    #[test]
    fn goal_status_roundtrip() {
        for status in [
            GoalStatus::Pending,
            GoalStatus::InProgress,
            GoalStatus::Completed,
            GoalStatus::Failed,
        ] {
            let parsed: GoalStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn task_builder_sets_dependencies() {
        let task = Task::new(
            "g1",
            "Mine three iron ore",
            "mine_block",
            serde_json::json!({"blockType": "iron_ore", "count": 3}),
            1,
        )
        .with_dependencies(vec!["t0".into()])
        .with_estimate(90);

        assert_eq!(task.dependencies, vec!["t0".to_string()]);
        assert_eq!(task.estimated_duration_secs, Some(90));
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn phases_are_ordered() {
        assert!(SpeedrunPhase::EarlyGame < SpeedrunPhase::Nether);
        assert!(SpeedrunPhase::EndFight < SpeedrunPhase::Completed);
        assert_eq!(SpeedrunPhase::EarlyGame.progress_percent(), 0);
        assert_eq!(SpeedrunPhase::EndFight.progress_percent(), 80);
        assert_eq!(SpeedrunPhase::Completed.progress_percent(), 100);
    }
}
