//! End-to-end plan lifecycle test: persist a plan, reload it (round-trip
//! law), progress it to completion, and confirm the scheduler would
//! deny a second agent racing a file already claimed by an active step.

use coordination::{
    try_admit, AdmissionDenial, AgentRole, Plan, PlanStatus, PlanStore, Project,
    ProviderCircuitBreaker, RoleOccupancy, SharedPlanningContext, Step,
};
use std::path::PathBuf;
use tempfile::tempdir;

fn sample_plan() -> Plan {
    let mut s1 = Step::new(1, "write module a", "create a.rs");
    s1.files_to_create.insert("src/a.rs".into());
    let mut s2 = Step::new(2, "write module b", "create b.rs");
    s2.files_to_create.insert("src/b.rs".into());
    let filename = PlanStore::filename_for("add two modules", "task-1");
    Plan::new("task-1", "proj-1", "add two modules", filename, vec![s1, s2])
}

#[test]
fn save_then_load_round_trips_modulo_updated_at() {
    let dir = tempdir().unwrap();
    let store = PlanStore::new(dir.path());
    let mut plan = sample_plan();

    store.save(&mut plan).unwrap();
    let loaded = store.load(&plan.project_id, &plan.task_id).unwrap();

    assert_eq!(loaded.task_id, plan.task_id);
    assert_eq!(loaded.project_id, plan.project_id);
    assert_eq!(loaded.plan_filename, plan.plan_filename);
    assert_eq!(loaded.steps.len(), plan.steps.len());
    assert_eq!(loaded.current_step_index, plan.current_step_index);
}

#[test]
fn completing_every_step_rolls_plan_to_completed_and_persists() {
    let dir = tempdir().unwrap();
    let store = PlanStore::new(dir.path());
    let mut plan = sample_plan();
    store.save(&mut plan).unwrap();

    plan.complete_current_step("wrote a.rs");
    plan.complete_current_step("wrote b.rs");
    assert_eq!(plan.status, PlanStatus::Completed);
    store.save(&mut plan).unwrap();

    let reloaded = store.load(&plan.project_id, &plan.task_id).unwrap();
    assert_eq!(reloaded.status, PlanStatus::Completed);
}

#[test]
fn admission_denies_second_agent_on_file_already_in_use() {
    let dir = tempdir().unwrap();
    let project = Project::new("proj-1", "Demo", PathBuf::from("/tmp/out"));
    let occupancy = RoleOccupancy::new();
    let breaker = ProviderCircuitBreaker::default();
    let shared = SharedPlanningContext::new(dir.path());

    shared.register_agent("agent-1", "proj-1", "task-0", "Wyvern");
    shared.set_agent_current_step_files("agent-1", vec!["src/a.rs".to_string()]);

    let mut step = Step::new(1, "write module a", "create a.rs");
    step.files_to_create.insert("src/a.rs".into());
    let waves = vec![vec![1]];

    let result = try_admit(
        &project,
        AgentRole::Wyvern,
        "openai",
        &occupancy,
        &breaker,
        &waves,
        0,
        std::slice::from_ref(&step),
        &shared,
        "proj-1",
        &step,
    );

    assert!(matches!(result, Err(AdmissionDenial::FileInUse { .. })));
}
