//! Project configuration JSON and its debounced writer.
//!
//! Bursts of configuration updates are coalesced through a single-slot
//! channel: each [`DebouncedConfigWriter::update`] replaces the pending
//! snapshot and nudges a background task, which sleeps out the
//! remainder of the interval, drains any further nudges that arrived
//! meanwhile, and writes only the most recent snapshot. `flush_now`
//! bypasses the debounce entirely.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use crate::project::{AgentRole, RoleConfig, SandboxMode};

pub const DEFAULT_DEBOUNCE_INTERVAL: Duration = Duration::from_secs(2);

/// Environment variable names the provider layer is documented to read
/// (see spec §6). The core never reads these itself — secrets are the
/// external provider layer's responsibility — this list exists purely
/// for operator documentation and config validation.
pub const KNOWN_PROVIDER_ENV_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "GOOGLE_API_KEY",
    "AZURE_OPENAI_API_KEY",
    "GITHUB_COPILOT_TOKEN",
    "LLAMACPP_API_KEY",
    "VLLM_API_KEY",
    "ZAI_API_KEY",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfigIdentity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfigAgents {
    pub wyrm: RoleConfig,
    pub wyvern: RoleConfig,
    pub drake: RoleConfig,
    pub kobold_planner: RoleConfig,
    pub kobold: RoleConfig,
}

impl ProjectConfigAgents {
    pub fn get(&self, role: AgentRole) -> &RoleConfig {
        match role {
            AgentRole::Wyrm => &self.wyrm,
            AgentRole::Wyvern => &self.wyvern,
            AgentRole::Drake => &self.drake,
            AgentRole::KoboldPlanner => &self.kobold_planner,
            AgentRole::Kobold => &self.kobold,
        }
    }
}

impl Default for ProjectConfigAgents {
    fn default() -> Self {
        Self {
            wyrm: RoleConfig::default_for(AgentRole::Wyrm),
            wyvern: RoleConfig::default_for(AgentRole::Wyvern),
            drake: RoleConfig::default_for(AgentRole::Drake),
            kobold_planner: RoleConfig::default_for(AgentRole::KoboldPlanner),
            kobold: RoleConfig::default_for(AgentRole::Kobold),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfigSecurity {
    pub sandbox_mode: SandboxMode,
    #[serde(default)]
    pub allowed_external_paths: Vec<PathBuf>,
}

impl Default for ProjectConfigSecurity {
    fn default() -> Self {
        Self {
            sandbox_mode: SandboxMode::Workspace,
            allowed_external_paths: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfigMetadata {
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

/// On-disk project configuration, matching the recognized fields from
/// the external interface contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub project: ProjectConfigIdentity,
    #[serde(default)]
    pub agents: ProjectConfigAgents,
    #[serde(default)]
    pub security: ProjectConfigSecurity,
    pub metadata: ProjectConfigMetadata,
}

impl ProjectConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            project: ProjectConfigIdentity {
                id: id.into(),
                name: name.into(),
            },
            agents: ProjectConfigAgents::default(),
            security: ProjectConfigSecurity::default(),
            metadata: ProjectConfigMetadata {
                created_at: now,
                last_updated: now,
            },
        }
    }
}

fn write_config_sync(path: &PathBuf, config: &ProjectConfig) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, json)
}

/// Coalesces bursts of [`ProjectConfig`] updates into at most one disk
/// write per `interval`.
pub struct DebouncedConfigWriter {
    path: PathBuf,
    latest: Arc<Mutex<Option<ProjectConfig>>>,
    nudge: mpsc::Sender<()>,
}

impl DebouncedConfigWriter {
    pub fn spawn(path: PathBuf, interval: Duration) -> Self {
        let latest: Arc<Mutex<Option<ProjectConfig>>> = Arc::new(Mutex::new(None));
        let (tx, mut rx) = mpsc::channel::<()>(1);

        let bg_latest = latest.clone();
        let bg_path = path.clone();
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                tokio::time::sleep(interval).await;
                while rx.try_recv().is_ok() {}
                let snapshot = bg_latest.lock().await.clone();
                if let Some(config) = snapshot {
                    if let Err(err) = write_config_sync(&bg_path, &config) {
                        warn!(%err, "failed to write debounced project config");
                    }
                }
            }
        });

        Self {
            path,
            latest,
            nudge: tx,
        }
    }

    /// Queue `config` for the next debounced write.
    pub async fn update(&self, config: ProjectConfig) {
        *self.latest.lock().await = Some(config);
        let _ = self.nudge.try_send(());
    }

    /// Write the latest queued config immediately, bypassing the
    /// debounce interval.
    pub async fn flush_now(&self) -> std::io::Result<()> {
        let snapshot = self.latest.lock().await.clone();
        if let Some(config) = snapshot {
            write_config_sync(&self.path, &config)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flush_now_writes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let writer = DebouncedConfigWriter::spawn(path.clone(), Duration::from_secs(60));

        writer.update(ProjectConfig::new("p1", "Demo")).await;
        writer.flush_now().await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"id\": \"p1\""));
    }

    #[tokio::test]
    async fn debounced_write_lands_after_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let writer = DebouncedConfigWriter::spawn(path.clone(), Duration::from_millis(50));

        writer.update(ProjectConfig::new("p1", "Demo")).await;
        writer.update(ProjectConfig::new("p1", "Demo Renamed")).await;

        tokio::time::sleep(Duration::from_millis(200)).await;

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("Demo Renamed"));
    }

    #[test]
    fn agents_default_has_positive_caps() {
        let agents = ProjectConfigAgents::default();
        assert!(agents.get(AgentRole::Kobold).max_parallel >= 1);
    }
}
