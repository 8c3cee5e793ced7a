//! Per-agent runtime configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Options governing one Agent Runtime loop.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub working_directory: PathBuf,
    pub verbose: bool,
    pub max_iterations: u32,
    pub enable_streaming: bool,
    pub streaming_fallback_to_sync: bool,
    /// Recursion depth of nested agent delegation, used by providers
    /// that vary model choice by depth; opaque to the runtime itself.
    pub model_depth: u32,
    /// Idle-chunk timeout for a stalled stream (default 60s per §5).
    pub stream_idle_timeout: Duration,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            working_directory: PathBuf::from("."),
            verbose: false,
            max_iterations: 25,
            enable_streaming: false,
            streaming_fallback_to_sync: true,
            model_depth: 0,
            stream_idle_timeout: Duration::from_secs(60),
        }
    }
}

impl AgentOptions {
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
            ..Default::default()
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_streaming(mut self, enable: bool, fallback_to_sync: bool) -> Self {
        self.enable_streaming = enable;
        self.streaming_fallback_to_sync = fallback_to_sync;
        self
    }
}
