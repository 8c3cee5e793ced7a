//! Shared Planning Context (C7): the coordination surface concurrent
//! agents on a project consult to avoid clobbering each other's files
//! and to learn from completed work.
//!
//! The hot paths (`active agents`, `insights`) live behind a single
//! mutex per project context; persisted writes are serialized by a
//! dedicated write mutex so a slow disk never blocks readers for long.
//! Project contexts are cached in memory up to [`MAX_CACHED_PROJECTS`];
//! the least-recently-accessed entry is persisted and evicted when a new
//! project would exceed the bound.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::plans::{Plan, PlanStatus, PlanStore};

use super::types::{
    AgentPlanningContext, FileCategory, FileMetadata, PlanningInsight, ProjectPlanningContext,
    ReflectionSignal, MAX_CACHED_PROJECTS, MAX_INSIGHTS_PER_PROJECT, MAX_REFLECTIONS_PER_TASK,
};

const CONTEXT_FILE: &str = "planning-context.json";

/// A related plan surfaced by [`SharedPlanningContext::get_related_plans`],
/// with the score it was ranked by.
#[derive(Debug, Clone)]
pub struct RelatedPlan {
    pub plan: Plan,
    pub score: f64,
}

/// Aggregate statistics over a project's recorded insights.
#[derive(Debug, Clone, Default)]
pub struct ProjectStatistics {
    pub total_tasks: usize,
    pub successful_tasks: usize,
    pub failed_tasks: usize,
    pub average_duration_seconds: f64,
    pub average_iterations: f64,
}

struct Inner {
    contexts: HashMap<String, ProjectPlanningContext>,
    agents: HashMap<String, AgentPlanningContext>,
}

pub struct SharedPlanningContext {
    output_root: PathBuf,
    inner: Mutex<Inner>,
    write_lock: Mutex<()>,
    store: Option<std::sync::Arc<PlanStore>>,
}

impl SharedPlanningContext {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            inner: Mutex::new(Inner {
                contexts: HashMap::new(),
                agents: HashMap::new(),
            }),
            write_lock: Mutex::new(()),
            store: None,
        }
    }

    /// Attach a Plan Store so [`Self::get_related_plans`] can consult
    /// persisted plans.
    pub fn with_plan_store(mut self, store: std::sync::Arc<PlanStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn context_path(&self, project_id: &str) -> PathBuf {
        self.output_root.join(project_id).join(CONTEXT_FILE)
    }

    fn load_from_disk(&self, project_id: &str) -> Option<ProjectPlanningContext> {
        let path = self.context_path(project_id);
        let raw = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<ProjectPlanningContext>(&raw) {
            Ok(mut ctx) => {
                ctx.last_accessed_at = Some(Utc::now());
                Some(ctx)
            }
            Err(err) => {
                warn!(?path, %err, "failed to parse planning context, starting fresh");
                None
            }
        }
    }

    fn persist(&self, ctx: &ProjectPlanningContext) {
        let _guard = self.write_lock.lock().unwrap();
        let path = self.context_path(&ctx.project_id);
        if let Some(parent) = path.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                warn!(%err, "failed to create planning context directory");
                return;
            }
        }
        match serde_json::to_string_pretty(ctx) {
            Ok(json) => {
                if let Err(err) = std::fs::write(&path, json) {
                    warn!(%err, "failed to persist planning context");
                }
            }
            Err(err) => warn!(%err, "failed to serialize planning context"),
        }
    }

    /// Return the context for `project_id`, loading from disk or
    /// creating fresh as needed. Evicts the least-recently-used cached
    /// context (persisting it first) when the cache would exceed
    /// [`MAX_CACHED_PROJECTS`].
    pub fn get_project_context(&self, project_id: &str) -> ProjectPlanningContext {
        let mut inner = self.inner.lock().unwrap();
        if let Some(ctx) = inner.contexts.get_mut(project_id) {
            ctx.last_accessed_at = Some(Utc::now());
            return ctx.clone();
        }

        let loaded = self
            .load_from_disk(project_id)
            .unwrap_or_else(|| ProjectPlanningContext::new(project_id));

        if inner.contexts.len() >= MAX_CACHED_PROJECTS {
            if let Some(evict_id) = inner
                .contexts
                .values()
                .min_by_key(|c| c.last_accessed_at.unwrap_or_else(Utc::now))
                .map(|c| c.project_id.clone())
            {
                if let Some(evicted) = inner.contexts.remove(&evict_id) {
                    self.persist(&evicted);
                }
            }
        }

        inner.contexts.insert(project_id.to_string(), loaded.clone());
        loaded
    }

    fn with_context_mut<R>(
        &self,
        project_id: &str,
        f: impl FnOnce(&mut ProjectPlanningContext) -> R,
    ) -> R {
        // Ensure the entry is populated (may load from disk) before
        // taking the mutable path.
        self.get_project_context(project_id);
        let mut inner = self.inner.lock().unwrap();
        let ctx = inner
            .contexts
            .entry(project_id.to_string())
            .or_insert_with(|| ProjectPlanningContext::new(project_id));
        let result = f(ctx);
        let snapshot = ctx.clone();
        drop(inner);
        self.persist(&snapshot);
        result
    }

    /// Register a newly started agent.
    pub fn register_agent(
        &self,
        agent_id: &str,
        project_id: &str,
        task_id: &str,
        agent_type: &str,
    ) {
        let ctx = AgentPlanningContext::new(agent_id, project_id, task_id, agent_type);
        {
            let mut inner = self.inner.lock().unwrap();
            inner.agents.insert(agent_id.to_string(), ctx);
        }
        self.with_context_mut(project_id, |c| {
            c.active_agents.insert(agent_id.to_string(), task_id.to_string());
            c.active_agent_count = c.active_agents.len();
        });
        debug!(agent_id, project_id, task_id, "agent registered");
    }

    /// Unregister a finished agent, folding its outcome into the
    /// project's insights and file registry. `completed_plan` is the
    /// agent's final plan state, used to compute the insight and to
    /// update file metadata for every file touched by a Completed step.
    pub fn unregister_agent(
        &self,
        agent_id: &str,
        success: bool,
        error_message: Option<String>,
        completed_plan: Option<&Plan>,
    ) {
        let removed = {
            let mut inner = self.inner.lock().unwrap();
            inner.agents.remove(agent_id)
        };
        let Some(agent_ctx) = removed else {
            warn!(agent_id, "unregister called for unknown agent");
            return;
        };

        let project_id = agent_ctx.project_id.clone();
        let task_id = agent_ctx.task_id.clone();

        self.with_context_mut(&project_id, |ctx| {
            ctx.active_agents.remove(agent_id);
            ctx.active_agent_count = ctx.active_agents.len();
            if success {
                ctx.completed_tasks_count += 1;
            } else {
                ctx.failed_tasks_count += 1;
            }

            if let Some(plan) = completed_plan {
                let duration = (Utc::now() - agent_ctx.started_at)
                    .to_std()
                    .map(|d| d.as_secs_f64())
                    .unwrap_or(0.0);
                let files_created: usize =
                    plan.steps.iter().map(|s| s.files_to_create.len()).sum();
                let files_modified: usize =
                    plan.steps.iter().map(|s| s.files_to_modify.len()).sum();
                let total_iterations: u32 =
                    plan.steps.iter().map(|s| s.metrics.iterations_used).sum();

                let insight = PlanningInsight {
                    insight_id: Uuid::new_v4().to_string(),
                    project_id: project_id.clone(),
                    task_id: task_id.clone(),
                    agent_type: agent_ctx.agent_type.clone(),
                    timestamp: Utc::now(),
                    success,
                    duration_seconds: duration,
                    step_count: plan.steps.len(),
                    completed_steps: plan.completed_steps_count(),
                    total_iterations,
                    files_created,
                    files_modified,
                    error_message: error_message.clone(),
                };
                ctx.insights.push(insight);
                if ctx.insights.len() > MAX_INSIGHTS_PER_PROJECT {
                    let drop = ctx.insights.len() - MAX_INSIGHTS_PER_PROJECT;
                    ctx.insights.drain(0..drop);
                }

                for step in plan.steps.iter().filter(|s| {
                    s.status == crate::plans::StepStatus::Completed
                }) {
                    let purpose = format!("{}: {}", step.title, plan.task_description);
                    for path in &step.files_to_create {
                        let entry =
                            ctx.file_registry
                                .entry(path.clone())
                                .or_insert_with(|| FileMetadata {
                                    path: path.clone(),
                                    purpose: purpose.clone(),
                                    category: FileCategory::infer(path),
                                    first_created: Utc::now(),
                                    last_modified: Utc::now(),
                                    created_by_tasks: Vec::new(),
                                    modified_by_tasks: Vec::new(),
                                });
                        entry.last_modified = Utc::now();
                        entry.created_by_tasks.push(task_id.clone());
                    }
                    for path in &step.files_to_modify {
                        let entry =
                            ctx.file_registry
                                .entry(path.clone())
                                .or_insert_with(|| FileMetadata {
                                    path: path.clone(),
                                    purpose: purpose.clone(),
                                    category: FileCategory::infer(path),
                                    first_created: Utc::now(),
                                    last_modified: Utc::now(),
                                    created_by_tasks: Vec::new(),
                                    modified_by_tasks: Vec::new(),
                                });
                        entry.last_modified = Utc::now();
                        entry.modified_by_tasks.push(task_id.clone());
                    }
                }
            }
        });
        debug!(agent_id, success, "agent unregistered");
    }

    pub fn update_agent_activity(&self, agent_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(ctx) = inner.agents.get_mut(agent_id) {
            ctx.last_activity_at = Utc::now();
        }
    }

    pub fn get_active_agents(&self, project_id: &str) -> Vec<AgentPlanningContext> {
        let inner = self.inner.lock().unwrap();
        inner
            .agents
            .values()
            .filter(|a| a.project_id == project_id)
            .cloned()
            .collect()
    }

    /// Record which files an agent's current step touches, used for
    /// file-in-use admission checks.
    pub fn set_agent_current_step_files(
        &self,
        agent_id: &str,
        files: impl IntoIterator<Item = String>,
    ) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(ctx) = inner.agents.get_mut(agent_id) {
            ctx.current_step_files = files.into_iter().collect();
        }
    }

    pub fn is_file_in_use(&self, project_id: &str, path: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .agents
            .values()
            .filter(|a| a.project_id == project_id)
            .any(|a| a.current_step_files.contains(path))
    }

    pub fn get_files_in_use(&self, project_id: &str) -> std::collections::BTreeSet<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .agents
            .values()
            .filter(|a| a.project_id == project_id)
            .flat_map(|a| a.current_step_files.iter().cloned())
            .collect()
    }

    /// Among stored plans whose status is Completed or InProgress and
    /// whose file sets intersect `files`, return up to 5 ranked by
    /// `score = 10 * |overlap| + 1 / (1 + hoursSinceUpdate)`.
    pub fn get_related_plans(
        &self,
        project_id: &str,
        current_task_id: &str,
        files: &std::collections::BTreeSet<String>,
    ) -> Vec<RelatedPlan> {
        let Some(store) = &self.store else {
            return Vec::new();
        };
        let Ok(plans) = store.list_for_project(project_id) else {
            return Vec::new();
        };

        let mut scored: Vec<RelatedPlan> = plans
            .into_iter()
            .filter(|p| p.task_id != current_task_id)
            .filter(|p| matches!(p.status, PlanStatus::Completed | PlanStatus::InProgress))
            .filter_map(|p| {
                let plan_files: std::collections::BTreeSet<String> =
                    p.steps.iter().flat_map(|s| s.all_files()).collect();
                let overlap = plan_files.intersection(files).count();
                if overlap == 0 {
                    return None;
                }
                let hours_since_update = (Utc::now() - p.updated_at)
                    .to_std()
                    .map(|d| d.as_secs_f64() / 3600.0)
                    .unwrap_or(0.0);
                let score = 10.0 * overlap as f64 + 1.0 / (1.0 + hours_since_update);
                Some(RelatedPlan { plan: p, score })
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        scored.truncate(5);
        scored
    }

    /// Append a reflection for a task, capped at [`MAX_REFLECTIONS_PER_TASK`].
    pub fn record_reflection(&self, project_id: &str, task_id: &str, reflection: ReflectionSignal) {
        self.with_context_mut(project_id, |ctx| {
            let entries = ctx.reflections_by_task.entry(task_id.to_string()).or_default();
            entries.push(reflection);
            if entries.len() > MAX_REFLECTIONS_PER_TASK {
                let drop = entries.len() - MAX_REFLECTIONS_PER_TASK;
                entries.drain(0..drop);
            }
        });
    }

    pub fn get_project_statistics(&self, project_id: &str) -> ProjectStatistics {
        let ctx = self.get_project_context(project_id);
        let total = ctx.insights.len();
        if total == 0 {
            return ProjectStatistics::default();
        }
        let successful = ctx.insights.iter().filter(|i| i.success).count();
        let avg_duration =
            ctx.insights.iter().map(|i| i.duration_seconds).sum::<f64>() / total as f64;
        let avg_iterations =
            ctx.insights.iter().map(|i| i.total_iterations as f64).sum::<f64>() / total as f64;
        ProjectStatistics {
            total_tasks: total,
            successful_tasks: successful,
            failed_tasks: total - successful,
            average_duration_seconds: avg_duration,
            average_iterations: avg_iterations,
        }
    }

    /// Insights across every currently cached project (not a disk scan).
    pub fn get_cross_project_insights(&self) -> Vec<PlanningInsight> {
        let inner = self.inner.lock().unwrap();
        inner
            .contexts
            .values()
            .flat_map(|c| c.insights.iter().cloned())
            .collect()
    }

    /// Heuristic "best practices": the most common file categories among
    /// successful insights' touched files, across cached projects.
    pub fn get_best_practices(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for ctx in inner.contexts.values() {
            for meta in ctx.file_registry.values() {
                *counts.entry(format!("{:?}", meta.category)).or_insert(0) += 1;
            }
        }
        let mut practices: Vec<(String, usize)> = counts.into_iter().collect();
        practices.sort_by(|a, b| b.1.cmp(&a.1));
        practices
            .into_iter()
            .take(5)
            .map(|(category, count)| format!("{count} files tracked under category {category}"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plans::{Plan, Step};

    #[test]
    fn register_and_unregister_keeps_counts_consistent() {
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedPlanningContext::new(dir.path());

        shared.register_agent("a1", "proj1", "task1", "kobold");
        let ctx = shared.get_project_context("proj1");
        assert_eq!(ctx.active_agent_count, 1);
        assert!(ctx.counts_consistent());

        shared.unregister_agent("a1", true, None, None);
        let ctx = shared.get_project_context("proj1");
        assert_eq!(ctx.active_agent_count, 0);
        assert!(ctx.counts_consistent());
    }

    #[test]
    fn unregister_with_plan_records_insight_and_file_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedPlanningContext::new(dir.path());
        shared.register_agent("a1", "proj1", "task1", "kobold");

        let mut step = Step::new(1, "Add widget", "build the widget");
        step.files_to_create.insert("src/widget_service.rs".into());
        step.complete("done");
        let plan = Plan::new("task1", "proj1", "Add a widget", "widget-plan", vec![step]);

        shared.unregister_agent("a1", true, None, Some(&plan));
        let ctx = shared.get_project_context("proj1");
        assert_eq!(ctx.insights.len(), 1);
        assert_eq!(ctx.completed_tasks_count, 1);
        assert!(ctx.file_registry.contains_key("src/widget_service.rs"));
    }

    #[test]
    fn files_in_use_reflects_current_step() {
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedPlanningContext::new(dir.path());
        shared.register_agent("a1", "proj1", "task1", "kobold");
        shared.set_agent_current_step_files("a1", vec!["a.rs".to_string()]);

        assert!(shared.is_file_in_use("proj1", "a.rs"));
        assert!(!shared.is_file_in_use("proj1", "b.rs"));
        assert_eq!(shared.get_files_in_use("proj1").len(), 1);
    }

    #[test]
    fn reflections_capped_at_fifty() {
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedPlanningContext::new(dir.path());
        for i in 0..60 {
            shared.record_reflection(
                "proj1",
                "task1",
                ReflectionSignal {
                    timestamp: Utc::now(),
                    progress_percent: (i % 100) as u8,
                    confidence: 50,
                    decision: "continue".into(),
                    narrative: None,
                },
            );
        }
        let ctx = shared.get_project_context("proj1");
        assert_eq!(ctx.reflections_by_task.get("task1").unwrap().len(), 50);
    }

    #[test]
    fn project_statistics_empty_when_no_insights() {
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedPlanningContext::new(dir.path());
        let stats = shared.get_project_statistics("proj1");
        assert_eq!(stats.total_tasks, 0);
    }

    #[test]
    fn persisted_context_reloads_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let shared = SharedPlanningContext::new(dir.path());
            shared.register_agent("a1", "proj1", "task1", "kobold");
        }
        let shared2 = SharedPlanningContext::new(dir.path());
        let ctx = shared2.get_project_context("proj1");
        assert_eq!(ctx.active_agent_count, 1);
    }
}
