//! Project Scheduler (C9): admission rules gating which step an agent
//! may start next.
//!
//! Rules are checked in order; the first failing rule determines the
//! [`AdmissionDenial`] returned, and the caller should defer the task
//! rather than treat it as an error.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::circuit_breaker::ProviderCircuitBreaker;
use crate::dependency_analyzer::Wave;
use crate::plans::{Step, StepStatus};
use crate::planning_context::SharedPlanningContext;
use crate::project::{AgentRole, Project};

#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionDenial {
    CapacityFull { role: AgentRole, active: u32, max: u32 },
    CircuitOpen { provider: String },
    WaveNotReady { wave_index: usize },
    FileInUse { path: String },
}

impl std::fmt::Display for AdmissionDenial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CapacityFull { role, active, max } => {
                write!(f, "role {role:?} at capacity ({active}/{max})")
            }
            Self::CircuitOpen { provider } => write!(f, "provider '{provider}' circuit is open"),
            Self::WaveNotReady { wave_index } => {
                write!(f, "wave {wave_index} not ready: an earlier wave is unresolved")
            }
            Self::FileInUse { path } => write!(f, "file '{path}' is in use by another agent"),
        }
    }
}

/// Tracks how many agents of each role are currently active per project.
#[derive(Default)]
pub struct RoleOccupancy {
    active: Mutex<HashMap<(String, AgentRole), u32>>,
}

impl RoleOccupancy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_count(&self, project_id: &str, role: AgentRole) -> u32 {
        let active = self.active.lock().unwrap();
        *active.get(&(project_id.to_string(), role)).unwrap_or(&0)
    }

    pub fn begin(&self, project_id: &str, role: AgentRole) {
        let mut active = self.active.lock().unwrap();
        *active.entry((project_id.to_string(), role)).or_insert(0) += 1;
    }

    pub fn end(&self, project_id: &str, role: AgentRole) {
        let mut active = self.active.lock().unwrap();
        if let Some(count) = active.get_mut(&(project_id.to_string(), role)) {
            *count = count.saturating_sub(1);
        }
    }
}

/// Whether every step in groups `0..wave_index` is resolved
/// (Completed or Skipped).
fn earlier_waves_resolved(waves: &[Wave], wave_index: usize, steps: &[Step]) -> bool {
    waves[..wave_index].iter().flatten().all(|&step_index| {
        steps
            .iter()
            .find(|s| s.index == step_index)
            .map(|s| s.status.is_resolved())
            .unwrap_or(false)
    })
}

/// Check all four admission rules for starting `step`, which belongs to
/// `waves[wave_index]`. Returns `Ok(())` if admitted.
#[allow(clippy::too_many_arguments)]
pub fn try_admit(
    project: &Project,
    role: AgentRole,
    provider: &str,
    occupancy: &RoleOccupancy,
    breaker: &ProviderCircuitBreaker,
    waves: &[Wave],
    wave_index: usize,
    all_steps: &[Step],
    shared: &SharedPlanningContext,
    project_id: &str,
    step: &Step,
) -> Result<(), AdmissionDenial> {
    let max = project.max_parallel(role);
    let active = occupancy.active_count(project_id, role);
    if active >= max {
        return Err(AdmissionDenial::CapacityFull { role, active, max });
    }

    if !breaker.can_retry(provider) {
        return Err(AdmissionDenial::CircuitOpen {
            provider: provider.to_string(),
        });
    }

    if wave_index > 0 && !earlier_waves_resolved(waves, wave_index, all_steps) {
        return Err(AdmissionDenial::WaveNotReady { wave_index });
    }

    let in_use = shared.get_files_in_use(project_id);
    for file in step.all_files() {
        if in_use.contains(&file) {
            return Err(AdmissionDenial::FileInUse { path: file });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plans::Step;
    use std::path::PathBuf;

    fn project() -> Project {
        let mut p = Project::new("p1", "Demo", PathBuf::from("/tmp/out"));
        p.agents.get_mut(&AgentRole::Kobold).unwrap().max_parallel = 1;
        p
    }

    #[test]
    fn denies_when_role_at_capacity() {
        let project = project();
        let occupancy = RoleOccupancy::new();
        occupancy.begin("p1", AgentRole::Kobold);
        let breaker = ProviderCircuitBreaker::default();
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedPlanningContext::new(dir.path());
        let step = Step::new(1, "s", "d");
        let waves = vec![vec![1]];

        let result = try_admit(
            &project,
            AgentRole::Kobold,
            "openai",
            &occupancy,
            &breaker,
            &waves,
            0,
            &[step.clone()],
            &shared,
            "p1",
            &step,
        );
        assert!(matches!(result, Err(AdmissionDenial::CapacityFull { .. })));
    }

    #[test]
    fn denies_when_circuit_open() {
        let project = project();
        let occupancy = RoleOccupancy::new();
        let breaker = ProviderCircuitBreaker::new(crate::circuit_breaker::BreakerConfig {
            failure_threshold: 1,
            open_duration: std::time::Duration::from_secs(600),
            reset_after_success: std::time::Duration::from_secs(300),
        });
        breaker.record_failure("openai");
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedPlanningContext::new(dir.path());
        let step = Step::new(1, "s", "d");
        let waves = vec![vec![1]];

        let result = try_admit(
            &project,
            AgentRole::Kobold,
            "openai",
            &occupancy,
            &breaker,
            &waves,
            0,
            &[step.clone()],
            &shared,
            "p1",
            &step,
        );
        assert!(matches!(result, Err(AdmissionDenial::CircuitOpen { .. })));
    }

    #[test]
    fn denies_when_earlier_wave_unresolved() {
        let project = project();
        let occupancy = RoleOccupancy::new();
        let breaker = ProviderCircuitBreaker::default();
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedPlanningContext::new(dir.path());

        let step1 = Step::new(1, "s1", "d");
        let step2 = Step::new(2, "s2", "d");
        let waves = vec![vec![1], vec![2]];

        let result = try_admit(
            &project,
            AgentRole::Kobold,
            "openai",
            &occupancy,
            &breaker,
            &waves,
            1,
            &[step1, step2.clone()],
            &shared,
            "p1",
            &step2,
        );
        assert!(matches!(result, Err(AdmissionDenial::WaveNotReady { .. })));
    }

    #[test]
    fn admits_when_earlier_wave_resolved() {
        let project = project();
        let occupancy = RoleOccupancy::new();
        let breaker = ProviderCircuitBreaker::default();
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedPlanningContext::new(dir.path());

        let mut step1 = Step::new(1, "s1", "d");
        step1.status = StepStatus::Completed;
        let step2 = Step::new(2, "s2", "d");
        let waves = vec![vec![1], vec![2]];

        let result = try_admit(
            &project,
            AgentRole::Kobold,
            "openai",
            &occupancy,
            &breaker,
            &waves,
            1,
            &[step1, step2.clone()],
            &shared,
            "p1",
            &step2,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn denies_when_file_in_use() {
        let project = project();
        let occupancy = RoleOccupancy::new();
        let breaker = ProviderCircuitBreaker::default();
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedPlanningContext::new(dir.path());
        shared.register_agent("other", "p1", "t2", "kobold");
        shared.set_agent_current_step_files("other", vec!["a.rs".to_string()]);

        let mut step = Step::new(1, "s", "d");
        step.files_to_modify.insert("a.rs".into());
        let waves = vec![vec![1]];

        let result = try_admit(
            &project,
            AgentRole::Kobold,
            "openai",
            &occupancy,
            &breaker,
            &waves,
            0,
            &[step.clone()],
            &shared,
            "p1",
            &step,
        );
        assert!(matches!(result, Err(AdmissionDenial::FileInUse { .. })));
    }
}
