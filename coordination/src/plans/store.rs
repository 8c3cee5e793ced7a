//! Plan Store (C6): on-disk persistence for [`Plan`]s and their
//! conversation checkpoints under `{output}/{projectId}/kobold-plans/`.
//!
//! Each plan is written as a pair of files sharing its
//! [`generate_plan_filename`]-derived stem: `{stem}-plan.json` (the
//! machine-readable [`Plan`]) and `{stem}-plan.md` (rendered via
//! [`crate::plans::markdown::render`]). A per-project `plan-index.json`
//! maps task ids to filenames so lookups don't require a directory scan.
//! Writes for a single project are serialized through a per-project
//! mutex; concurrent writers for different projects never block each
//! other.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::filename::generate_plan_filename;
use super::markdown;
use super::types::{CheckpointMessage, ConversationCheckpoint, Plan};

#[derive(Debug, thiserror::Error)]
pub enum PlanStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no plan found for project {project_id} task {task_id}")]
    NotFound { project_id: String, task_id: String },
}

pub type Result<T> = std::result::Result<T, PlanStoreError>;

const PLANS_DIR: &str = "kobold-plans";
const INDEX_FILE: &str = "plan-index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    plan_filename: String,
    updated_at: DateTime<Utc>,
}

type PlanIndex = HashMap<String, IndexEntry>;

/// Persists [`Plan`]s and [`ConversationCheckpoint`]s under a single
/// output root, one subdirectory per project.
pub struct PlanStore {
    output_root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PlanStore {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, project_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn project_dir(&self, project_id: &str) -> PathBuf {
        self.output_root.join(project_id).join(PLANS_DIR)
    }

    fn index_path(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join(INDEX_FILE)
    }

    fn plan_json_path(&self, project_id: &str, plan_filename: &str) -> PathBuf {
        self.project_dir(project_id)
            .join(format!("{plan_filename}-plan.json"))
    }

    fn plan_md_path(&self, project_id: &str, plan_filename: &str) -> PathBuf {
        self.project_dir(project_id)
            .join(format!("{plan_filename}-plan.md"))
    }

    fn checkpoint_path(&self, project_id: &str, plan_filename: &str) -> PathBuf {
        self.project_dir(project_id)
            .join(format!("{plan_filename}-context.json"))
    }

    fn read_index(&self, project_id: &str) -> Result<PlanIndex> {
        let path = self.index_path(project_id);
        if !path.exists() {
            return Ok(PlanIndex::new());
        }
        let raw = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw).unwrap_or_default())
    }

    fn write_index(&self, project_id: &str, index: &PlanIndex) -> Result<()> {
        let path = self.index_path(project_id);
        let raw = serde_json::to_string_pretty(index)?;
        fs::write(path, raw)?;
        Ok(())
    }

    /// Derive the filename for a plan that does not yet have one assigned.
    pub fn filename_for(task_description: &str, task_id: &str) -> String {
        generate_plan_filename(task_description, task_id)
    }

    /// Persist `plan`: writes the JSON and markdown files, then updates
    /// the project's index. Bumps `updated_at` before writing.
    pub fn save(&self, plan: &mut Plan) -> Result<()> {
        let _guard = self.lock_for(&plan.project_id);
        let dir = self.project_dir(&plan.project_id);
        fs::create_dir_all(&dir)?;

        plan.updated_at = Utc::now();

        let json_path = self.plan_json_path(&plan.project_id, &plan.plan_filename);
        let md_path = self.plan_md_path(&plan.project_id, &plan.plan_filename);

        let json = serde_json::to_string_pretty(plan)?;
        fs::write(&json_path, json)?;

        let md = markdown::render(plan);
        fs::write(&md_path, md)?;

        let mut index = self.read_index(&plan.project_id)?;
        index.insert(
            plan.task_id.clone(),
            IndexEntry {
                plan_filename: plan.plan_filename.clone(),
                updated_at: plan.updated_at,
            },
        );
        self.write_index(&plan.project_id, &index)?;

        debug!(project_id = %plan.project_id, task_id = %plan.task_id, "saved plan");
        Ok(())
    }

    /// Load the plan for `(project_id, task_id)`.
    pub fn load(&self, project_id: &str, task_id: &str) -> Result<Plan> {
        let _guard = self.lock_for(project_id);
        let index = self.read_index(project_id)?;
        let entry = index
            .get(task_id)
            .ok_or_else(|| PlanStoreError::NotFound {
                project_id: project_id.to_string(),
                task_id: task_id.to_string(),
            })?;
        let path = self.plan_json_path(project_id, &entry.plan_filename);
        let raw = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn exists(&self, project_id: &str, task_id: &str) -> bool {
        let _guard = self.lock_for(project_id);
        match self.read_index(project_id) {
            Ok(index) => index.contains_key(task_id),
            Err(_) => false,
        }
    }

    /// Remove a plan's JSON, markdown, and checkpoint files and its index
    /// entry. Missing files are not an error.
    pub fn delete(&self, project_id: &str, task_id: &str) -> Result<()> {
        let _guard = self.lock_for(project_id);
        let mut index = self.read_index(project_id)?;
        if let Some(entry) = index.remove(task_id) {
            for path in [
                self.plan_json_path(project_id, &entry.plan_filename),
                self.plan_md_path(project_id, &entry.plan_filename),
                self.checkpoint_path(project_id, &entry.plan_filename),
            ] {
                if path.exists() {
                    fs::remove_file(&path)?;
                }
            }
            self.write_index(project_id, &index)?;
        }
        Ok(())
    }

    /// All plans for a project, sorted by `updated_at` descending. Falls
    /// back to a directory scan for `*-plan.json` files if the index is
    /// stale or absent, logging a warning for each entry that fails to
    /// parse rather than aborting the whole listing.
    pub fn list_for_project(&self, project_id: &str) -> Result<Vec<Plan>> {
        let _guard = self.lock_for(project_id);
        let dir = self.project_dir(project_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut plans = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with("-plan.json") {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(raw) => match serde_json::from_str::<Plan>(&raw) {
                    Ok(plan) => plans.push(plan),
                    Err(err) => warn!(?path, %err, "skipping unparsable plan file"),
                },
                Err(err) => warn!(?path, %err, "skipping unreadable plan file"),
            }
        }

        plans.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(plans)
    }

    /// Persist a conversation checkpoint for `plan`, trimmed to the most
    /// recent 50 messages.
    pub fn save_conversation_checkpoint(
        &self,
        plan: &Plan,
        messages: Vec<CheckpointMessage>,
    ) -> Result<()> {
        let _guard = self.lock_for(&plan.project_id);
        let checkpoint = ConversationCheckpoint::new(
            plan.task_id.clone(),
            plan.project_id.clone(),
            plan.current_step_index,
            messages,
        );
        let path = self.checkpoint_path(&plan.project_id, &plan.plan_filename);
        fs::create_dir_all(self.project_dir(&plan.project_id))?;
        let json = serde_json::to_string_pretty(&checkpoint)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load the most recent checkpoint for `(project_id, task_id)`, if any.
    pub fn load_conversation_checkpoint(
        &self,
        project_id: &str,
        task_id: &str,
    ) -> Result<Option<ConversationCheckpoint>> {
        let _guard = self.lock_for(project_id);
        let index = self.read_index(project_id)?;
        let Some(entry) = index.get(task_id) else {
            return Ok(None);
        };
        let path = self.checkpoint_path(project_id, &entry.plan_filename);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }
}

/// Extract the restorable message list from a checkpoint.
pub fn restore_conversation(checkpoint: &ConversationCheckpoint) -> Vec<CheckpointMessage> {
    checkpoint.messages.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plans::types::Step;

    fn sample_plan(project_id: &str, task_id: &str) -> Plan {
        let filename = PlanStore::filename_for("Build a widget", task_id);
        Plan::new(task_id, project_id, "Build a widget", filename, vec![Step::new(1, "s", "d")])
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(dir.path());
        let mut plan = sample_plan("proj1", "task1");

        store.save(&mut plan).unwrap();
        let loaded = store.load("proj1", "task1").unwrap();
        assert_eq!(loaded.task_id, "task1");
        assert_eq!(loaded.steps.len(), 1);
    }

    #[test]
    fn exists_reflects_saved_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(dir.path());
        assert!(!store.exists("proj1", "task1"));
        let mut plan = sample_plan("proj1", "task1");
        store.save(&mut plan).unwrap();
        assert!(store.exists("proj1", "task1"));
    }

    #[test]
    fn delete_removes_files_and_index_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(dir.path());
        let mut plan = sample_plan("proj1", "task1");
        store.save(&mut plan).unwrap();

        let json_path = store.plan_json_path("proj1", &plan.plan_filename);
        let md_path = store.plan_md_path("proj1", &plan.plan_filename);
        assert!(json_path.exists());
        assert!(md_path.exists());

        store.delete("proj1", "task1").unwrap();
        assert!(!json_path.exists());
        assert!(!md_path.exists());
        assert!(!store.exists("proj1", "task1"));
    }

    #[test]
    fn list_for_project_sorted_by_updated_at_desc() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(dir.path());

        let mut first = sample_plan("proj1", "task1");
        store.save(&mut first).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let mut second = sample_plan("proj1", "task2");
        store.save(&mut second).unwrap();

        let listed = store.list_for_project("proj1").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].task_id, "task2");
        assert_eq!(listed[1].task_id, "task1");
    }

    #[test]
    fn list_for_project_empty_when_directory_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(dir.path());
        assert!(store.list_for_project("nope").unwrap().is_empty());
    }

    #[test]
    fn checkpoint_round_trips_and_trims() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(dir.path());
        let mut plan = sample_plan("proj1", "task1");
        store.save(&mut plan).unwrap();

        let messages: Vec<CheckpointMessage> = (0..60)
            .map(|i| CheckpointMessage {
                role: "user".into(),
                content: serde_json::json!(i),
            })
            .collect();
        store.save_conversation_checkpoint(&plan, messages).unwrap();

        let loaded = store
            .load_conversation_checkpoint("proj1", "task1")
            .unwrap()
            .expect("checkpoint present");
        assert_eq!(loaded.messages.len(), 50);
        let restored = restore_conversation(&loaded);
        assert_eq!(restored.len(), 50);
        assert_eq!(restored[0].content, serde_json::json!(10));
    }

    #[test]
    fn load_conversation_checkpoint_none_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(dir.path());
        let mut plan = sample_plan("proj1", "task1");
        store.save(&mut plan).unwrap();
        assert!(store
            .load_conversation_checkpoint("proj1", "task1")
            .unwrap()
            .is_none());
    }

    #[test]
    fn load_missing_plan_errors_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(dir.path());
        let err = store.load("proj1", "ghost").unwrap_err();
        assert!(matches!(err, PlanStoreError::NotFound { .. }));
    }
}
