//! Plan, Step, and ConversationCheckpoint — the data model persisted by
//! the Plan Store (C6) and consumed by the Step Dependency Analyzer (C5).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a [`Plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PlanStatus {
    Planning,
    Ready,
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Planning => "Planning",
            Self::Ready => "Ready",
            Self::InProgress => "InProgress",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle status of a [`Step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Skipped,
    Failed,
}

impl StepStatus {
    /// Whether a step in this status counts as "resolved" for dependency
    /// wave admission (C9 rule 3).
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

/// Per-step execution metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    #[serde(default)]
    pub iterations_used: u32,
    #[serde(default)]
    pub tokens_used: u64,
}

/// A single, transactional unit of work with declared file I/O sets.
///
/// Invariant: `files_to_create` and `files_to_modify` are disjoint within
/// one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// 1-based position within the plan.
    pub index: u32,
    pub title: String,
    pub description: String,
    pub files_to_create: BTreeSet<String>,
    pub files_to_modify: BTreeSet<String>,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub metrics: StepMetrics,
}

impl Step {
    pub fn new(index: u32, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            index,
            title: title.into(),
            description: description.into(),
            files_to_create: BTreeSet::new(),
            files_to_modify: BTreeSet::new(),
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            output: String::new(),
            metrics: StepMetrics::default(),
        }
    }

    /// Whether the declared file sets are disjoint, per the step invariant.
    pub fn files_are_disjoint(&self) -> bool {
        self.files_to_create.is_disjoint(&self.files_to_modify)
    }

    /// The union of files this step touches (create + modify).
    pub fn all_files(&self) -> BTreeSet<String> {
        self.files_to_create
            .union(&self.files_to_modify)
            .cloned()
            .collect()
    }

    pub fn start(&mut self) {
        self.status = StepStatus::InProgress;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self, output: impl Into<String>) {
        self.status = StepStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.output = output.into();
    }

    pub fn fail(&mut self, output: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.output = output.into();
    }
}

/// A single append-only execution log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// The ordered list of Steps an agent intends to execute for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub task_id: String,
    pub project_id: String,
    pub task_description: String,
    /// Immutable once assigned — see [`crate::plans::filename::generate_plan_filename`].
    pub plan_filename: String,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub current_step_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub execution_log: Vec<ExecutionLogEntry>,
}

impl Plan {
    pub fn new(
        task_id: impl Into<String>,
        project_id: impl Into<String>,
        task_description: impl Into<String>,
        plan_filename: impl Into<String>,
        steps: Vec<Step>,
    ) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            project_id: project_id.into(),
            task_description: task_description.into(),
            plan_filename: plan_filename.into(),
            status: PlanStatus::Planning,
            created_at: now,
            updated_at: now,
            current_step_index: 0,
            error_message: None,
            steps,
            execution_log: Vec::new(),
        }
    }

    pub fn completed_steps_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }

    /// `completedStepsCount / |Steps|`, `0.0` when the plan has no steps.
    pub fn progress_percentage(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        self.completed_steps_count() as f64 / self.steps.len() as f64
    }

    pub fn log(&mut self, message: impl Into<String>) {
        self.execution_log.push(ExecutionLogEntry {
            timestamp: Utc::now(),
            message: message.into(),
        });
        self.updated_at = Utc::now();
    }

    /// Check the per-step invariant across the whole plan.
    pub fn files_invariant_holds(&self) -> bool {
        self.steps.iter().all(Step::files_are_disjoint)
    }

    /// Mark the step at `current_step_index` Completed, advance the
    /// index, and roll the plan itself to Completed once every step has
    /// resolved. `current_step_index` only ever reaches `steps.len()` in
    /// the same call that sets `status = Completed`, so the two can
    /// never diverge.
    pub fn complete_current_step(&mut self, output: impl Into<String>) {
        let idx = self.current_step_index;
        let output = output.into();
        if let Some(step) = self.steps.get_mut(idx) {
            step.complete(output.clone());
            self.log(format!("step {} completed: {output}", step.index));
        }
        if self.steps.iter().all(|s| s.status.is_resolved()) {
            self.status = PlanStatus::Completed;
        } else {
            self.current_step_index = (idx + 1).min(self.steps.len().saturating_sub(1));
            if self.status == PlanStatus::Planning || self.status == PlanStatus::Ready {
                self.status = PlanStatus::InProgress;
            }
        }
        self.updated_at = Utc::now();
    }

    /// Mark the step at `current_step_index` Failed and roll the plan to
    /// Failed; a failed step halts the plan rather than advancing past it.
    pub fn fail_current_step(&mut self, output: impl Into<String>) {
        let idx = self.current_step_index;
        let output = output.into();
        if let Some(step) = self.steps.get_mut(idx) {
            step.fail(output.clone());
        }
        self.status = PlanStatus::Failed;
        self.error_message = Some(output.clone());
        self.log(format!("step {idx} failed: {output}"));
        self.updated_at = Utc::now();
    }
}

/// A single conversation message exchanged with the provider during a
/// checkpointed task. `content` is preserved verbatim — see
/// `agent_runtime::types::Content` for the tagged-variant representation
/// used while the message is live in a running agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMessage {
    pub role: String,
    pub content: serde_json::Value,
}

/// A trimmed snapshot of an agent's conversation, restorable across
/// crashes. Invariant: `messages.len() <= 50` (oldest dropped first).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationCheckpoint {
    pub task_id: String,
    pub project_id: String,
    pub step_index: usize,
    pub saved_at: DateTime<Utc>,
    pub messages: Vec<CheckpointMessage>,
}

/// Maximum number of messages retained in a checkpoint.
pub const MAX_CHECKPOINT_MESSAGES: usize = 50;

impl ConversationCheckpoint {
    /// Build a checkpoint, trimming to the most recent
    /// [`MAX_CHECKPOINT_MESSAGES`] messages (oldest dropped first).
    pub fn new(
        task_id: impl Into<String>,
        project_id: impl Into<String>,
        step_index: usize,
        messages: Vec<CheckpointMessage>,
    ) -> Self {
        let mut messages = messages;
        if messages.len() > MAX_CHECKPOINT_MESSAGES {
            let drop = messages.len() - MAX_CHECKPOINT_MESSAGES;
            messages.drain(0..drop);
        }
        Self {
            task_id: task_id.into(),
            project_id: project_id.into(),
            step_index,
            saved_at: Utc::now(),
            messages,
        }
    }
}
