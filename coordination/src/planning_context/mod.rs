//! Shared Planning Context (C7): in-memory + on-disk coordination state
//! for concurrent agents working the same project.

pub mod service;
pub mod types;

pub use service::{ProjectStatistics, RelatedPlan, SharedPlanningContext};
pub use types::{
    AgentPlanningContext, FileCategory, FileMetadata, PlanningInsight, ProjectPlanningContext,
    ReflectionSignal, MAX_CACHED_PROJECTS, MAX_INSIGHTS_PER_PROJECT, MAX_REFLECTIONS_PER_TASK,
};
