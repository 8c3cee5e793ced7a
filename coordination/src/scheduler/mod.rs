//! Project Scheduler (C9): admits agents to run subject to per-project
//! per-role parallelism caps, provider circuit state, dependency waves,
//! and file-in-use exclusion.

pub mod admission;
pub mod retry;

pub use admission::{try_admit, AdmissionDenial, RoleOccupancy};
pub use retry::{backoff_delay, decide, RetryDecision};
