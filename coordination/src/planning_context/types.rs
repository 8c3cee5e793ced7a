//! Data model for the Shared Planning Context (C7).

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A running agent's view into the context it's coordinating through.
/// Lives only in memory: created on register, removed on unregister.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPlanningContext {
    pub agent_id: String,
    pub project_id: String,
    pub task_id: String,
    pub agent_type: String,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Files declared by the agent's current step; drives file-in-use
    /// admission checks in the Scheduler (C9).
    #[serde(default)]
    pub current_step_files: BTreeSet<String>,
}

impl AgentPlanningContext {
    pub fn new(
        agent_id: impl Into<String>,
        project_id: impl Into<String>,
        task_id: impl Into<String>,
        agent_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            agent_id: agent_id.into(),
            project_id: project_id.into(),
            task_id: task_id.into(),
            agent_type: agent_type.into(),
            started_at: now,
            last_activity_at: now,
            completed_at: None,
            success: None,
            error_message: None,
            current_step_files: BTreeSet::new(),
        }
    }
}

/// Inferred role of a source file, used to generate a human purpose
/// string when an agent completes steps that touch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum FileCategory {
    Service,
    Controller,
    Repository,
    Factory,
    Handler,
    Provider,
    Model,
    Test,
    Other,
}

impl FileCategory {
    /// Heuristically infer a category from a path's filename suffix and
    /// directory segments.
    pub fn infer(path: &str) -> Self {
        let lower = path.to_lowercase();
        let stem = lower.rsplit('/').next().unwrap_or(&lower);

        const SUFFIXES: &[(&str, FileCategory)] = &[
            ("service", FileCategory::Service),
            ("controller", FileCategory::Controller),
            ("repository", FileCategory::Repository),
            ("repo", FileCategory::Repository),
            ("factory", FileCategory::Factory),
            ("handler", FileCategory::Handler),
            ("provider", FileCategory::Provider),
            ("model", FileCategory::Model),
            ("test", FileCategory::Test),
            ("tests", FileCategory::Test),
            ("spec", FileCategory::Test),
        ];

        if lower.contains("/test/") || lower.contains("/tests/") || stem.ends_with("_test.rs") {
            return FileCategory::Test;
        }

        for (suffix, category) in SUFFIXES {
            if stem.trim_end_matches(|c: char| !c.is_alphanumeric()).ends_with(suffix)
                || stem.contains(&format!("{suffix}."))
                || stem.contains(&format!("_{suffix}"))
            {
                return *category;
            }
        }
        FileCategory::Other
    }
}

/// Tracked metadata about a file that some agent has created or touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub path: String,
    pub purpose: String,
    pub category: FileCategory,
    pub first_created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub created_by_tasks: Vec<String>,
    #[serde(default)]
    pub modified_by_tasks: Vec<String>,
}

/// Summary of a single completed/failed agent run, retained for
/// cross-agent context (bounded to 100 per project, FIFO by timestamp).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningInsight {
    pub insight_id: String,
    pub project_id: String,
    pub task_id: String,
    pub agent_type: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub duration_seconds: f64,
    pub step_count: usize,
    pub completed_steps: usize,
    pub total_iterations: u32,
    pub files_created: usize,
    pub files_modified: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// A self-reported progress signal recorded mid-task, capped at 50 per
/// task (oldest dropped first).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectionSignal {
    pub timestamp: DateTime<Utc>,
    pub progress_percent: u8,
    pub confidence: u8,
    pub decision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

pub const MAX_INSIGHTS_PER_PROJECT: usize = 100;
pub const MAX_REFLECTIONS_PER_TASK: usize = 50;
pub const MAX_CACHED_PROJECTS: usize = 50;

/// Per-project coordination state: active agents, the file registry, and
/// accumulated insights/reflections. Persisted to
/// `{output}/planning-context.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPlanningContext {
    pub project_id: String,
    #[serde(default)]
    pub active_agent_count: usize,
    #[serde(default)]
    pub completed_tasks_count: usize,
    #[serde(default)]
    pub failed_tasks_count: usize,
    #[serde(default)]
    pub active_agents: HashMap<String, String>,
    #[serde(default)]
    pub insights: Vec<PlanningInsight>,
    #[serde(default)]
    pub file_registry: HashMap<String, FileMetadata>,
    #[serde(default)]
    pub reflections_by_task: HashMap<String, Vec<ReflectionSignal>>,
    /// In-memory only; drives LRU eviction from the service's project
    /// cache. Not meaningful across a reload from disk.
    #[serde(skip)]
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl ProjectPlanningContext {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            active_agent_count: 0,
            completed_tasks_count: 0,
            failed_tasks_count: 0,
            active_agents: HashMap::new(),
            insights: Vec::new(),
            file_registry: HashMap::new(),
            reflections_by_task: HashMap::new(),
            last_accessed_at: Some(Utc::now()),
        }
    }

    /// Invariant check: `activeAgentCount == |activeAgents|`.
    pub fn counts_consistent(&self) -> bool {
        self.active_agent_count == self.active_agents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_category_infers_from_suffix() {
        assert_eq!(FileCategory::infer("src/user_service.rs"), FileCategory::Service);
        assert_eq!(FileCategory::infer("src/auth_controller.rs"), FileCategory::Controller);
        assert_eq!(FileCategory::infer("src/widget_repository.rs"), FileCategory::Repository);
        assert_eq!(FileCategory::infer("tests/parser_test.rs"), FileCategory::Test);
        assert_eq!(FileCategory::infer("src/lib.rs"), FileCategory::Other);
    }

    #[test]
    fn new_context_counts_are_consistent() {
        let ctx = ProjectPlanningContext::new("p1");
        assert!(ctx.counts_consistent());
    }
}
