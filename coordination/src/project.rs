//! Project entity: identity, status/execution-state machine, and
//! per-role agent configuration.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a [`Project`]. Transitions obey the graph in
/// the scheduler's admission design: `Prototype -> New -> WyrmAssigned
/// -> Analyzed -> InProgress -> {Completed, Failed}`, with `Analyzed`
/// reachable again from `SpecificationModified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ProjectStatus {
    Prototype,
    New,
    WyrmAssigned,
    Analyzed,
    SpecificationModified,
    InProgress,
    Completed,
    Failed,
}

/// Execution state, orthogonal to [`ProjectStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ExecutionState {
    Running,
    Paused,
    Suspended,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("cannot move project status from {from:?} to {to:?}")]
    InvalidStatusTransition {
        from: ProjectStatus,
        to: ProjectStatus,
    },
    #[error("cannot move execution state from {from:?} to {to:?}")]
    InvalidExecutionTransition {
        from: ExecutionState,
        to: ExecutionState,
    },
    #[error("execution state {state:?} is forbidden while status is {status:?}")]
    ForbiddenCombination {
        status: ProjectStatus,
        state: ExecutionState,
    },
}

impl ProjectStatus {
    /// Whether `self -> next` is an edge in the status graph.
    pub fn can_transition_to(self, next: ProjectStatus) -> bool {
        use ProjectStatus::*;
        matches!(
            (self, next),
            (Prototype, New)
                | (New, WyrmAssigned)
                | (WyrmAssigned, Analyzed)
                | (Analyzed, InProgress)
                | (Analyzed, SpecificationModified)
                | (SpecificationModified, WyrmAssigned)
                | (InProgress, Completed)
                | (InProgress, Failed)
        )
    }
}

impl ExecutionState {
    pub fn can_transition_to(self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        matches!(
            (self, next),
            (Running, Paused)
                | (Paused, Running)
                | (Running, Suspended)
                | (Suspended, Running)
                | (Running, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxMode {
    Workspace,
    Relaxed,
    Strict,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityConfig {
    pub sandbox_mode: SandboxModeOrDefault,
    #[serde(default)]
    pub allowed_external_paths: Vec<PathBuf>,
}

/// `SandboxMode` with a `Default` impl so `SecurityConfig` can derive one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SandboxModeOrDefault(pub SandboxMode);

impl Default for SandboxModeOrDefault {
    fn default() -> Self {
        Self(SandboxMode::Workspace)
    }
}

/// One of the five agent roles admitted by the Project Scheduler (C9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentRole {
    Wyrm,
    Wyvern,
    Drake,
    KoboldPlanner,
    Kobold,
}

impl AgentRole {
    pub const ALL: [AgentRole; 5] = [
        AgentRole::Wyrm,
        AgentRole::Wyvern,
        AgentRole::Drake,
        AgentRole::KoboldPlanner,
        AgentRole::Kobold,
    ];

    /// Process-wide default parallelism cap, overridable per project.
    pub fn default_max_parallel(self) -> u32 {
        match self {
            AgentRole::Wyrm => 1,
            AgentRole::Wyvern => 1,
            AgentRole::Drake => 2,
            AgentRole::KoboldPlanner => 2,
            AgentRole::Kobold => 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleConfig {
    pub max_parallel: u32,
    pub timeout_seconds: u64,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl RoleConfig {
    pub fn default_for(role: AgentRole) -> Self {
        Self {
            max_parallel: role.default_max_parallel(),
            timeout_seconds: 0,
            enabled: true,
            provider: None,
            model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectIdentity {
    pub id: String,
    pub name: String,
}

/// The project entity. See spec §3 for invariants: `output` must exist
/// on disk whenever `status != Prototype`; allowed external paths are
/// stored absolute; status transitions obey [`ProjectStatus::can_transition_to`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub identity: ProjectIdentity,
    pub slug: String,
    pub specification_path: PathBuf,
    pub output_dir: PathBuf,
    pub analysis_report_path: PathBuf,
    pub status: ProjectStatus,
    pub execution_state: ExecutionState,
    pub agents: HashMap<AgentRole, RoleConfig>,
    pub security: SecurityConfig,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Project {
    pub fn new(id: impl Into<String>, name: impl Into<String>, output_dir: PathBuf) -> Self {
        let now = Utc::now();
        let specification_path = output_dir.join("specification.md");
        let analysis_report_path = output_dir.join("analysis.md");
        let mut agents = HashMap::new();
        for role in AgentRole::ALL {
            agents.insert(role, RoleConfig::default_for(role));
        }
        Self {
            identity: ProjectIdentity {
                id: id.into(),
                name: name.into(),
            },
            slug: String::new(),
            specification_path,
            output_dir,
            analysis_report_path,
            status: ProjectStatus::Prototype,
            execution_state: ExecutionState::Running,
            agents,
            security: SecurityConfig::default(),
            created_at: now,
            last_updated: now,
        }
    }

    pub fn transition_status(&mut self, next: ProjectStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        if matches!(next, ProjectStatus::Completed | ProjectStatus::Failed)
            && matches!(
                self.execution_state,
                ExecutionState::Paused | ExecutionState::Suspended
            )
        {
            return Err(TransitionError::ForbiddenCombination {
                status: next,
                state: self.execution_state,
            });
        }
        self.status = next;
        self.last_updated = Utc::now();
        Ok(())
    }

    pub fn transition_execution(&mut self, next: ExecutionState) -> Result<(), TransitionError> {
        if matches!(self.status, ProjectStatus::Completed | ProjectStatus::Failed)
            && matches!(next, ExecutionState::Paused | ExecutionState::Suspended)
        {
            return Err(TransitionError::ForbiddenCombination {
                status: self.status,
                state: next,
            });
        }
        if !self.execution_state.can_transition_to(next) {
            return Err(TransitionError::InvalidExecutionTransition {
                from: self.execution_state,
                to: next,
            });
        }
        self.execution_state = next;
        self.last_updated = Utc::now();
        Ok(())
    }

    pub fn max_parallel(&self, role: AgentRole) -> u32 {
        self.agents
            .get(&role)
            .map(|c| c.max_parallel)
            .unwrap_or_else(|| role.default_max_parallel())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_graph_rejects_skipping_states() {
        let mut p = Project::new("p1", "Demo", PathBuf::from("/tmp/out"));
        assert!(p.transition_status(ProjectStatus::Analyzed).is_err());
        assert!(p.transition_status(ProjectStatus::New).is_ok());
        assert!(p.transition_status(ProjectStatus::WyrmAssigned).is_ok());
        assert!(p.transition_status(ProjectStatus::Analyzed).is_ok());
    }

    #[test]
    fn spec_change_routes_back_to_wyrm_assigned() {
        let mut p = Project::new("p1", "Demo", PathBuf::from("/tmp/out"));
        p.transition_status(ProjectStatus::New).unwrap();
        p.transition_status(ProjectStatus::WyrmAssigned).unwrap();
        p.transition_status(ProjectStatus::Analyzed).unwrap();
        p.transition_status(ProjectStatus::SpecificationModified).unwrap();
        assert!(p.transition_status(ProjectStatus::WyrmAssigned).is_ok());
    }

    #[test]
    fn completed_forbids_pause() {
        let mut p = Project::new("p1", "Demo", PathBuf::from("/tmp/out"));
        p.transition_status(ProjectStatus::New).unwrap();
        p.transition_status(ProjectStatus::WyrmAssigned).unwrap();
        p.transition_status(ProjectStatus::Analyzed).unwrap();
        p.transition_status(ProjectStatus::InProgress).unwrap();
        p.transition_status(ProjectStatus::Completed).unwrap();
        assert!(p.transition_execution(ExecutionState::Paused).is_err());
    }

    #[test]
    fn cancelled_is_terminal() {
        assert!(ExecutionState::Cancelled.can_transition_to(ExecutionState::Running) == false);
    }

    #[test]
    fn default_role_caps_are_positive() {
        let p = Project::new("p1", "Demo", PathBuf::from("/tmp/out"));
        for role in AgentRole::ALL {
            assert!(p.max_parallel(role) >= 1);
        }
    }
}
