//! The `Tool` capability dispatched for each `tool_use` block. File I/O,
//! shell execution, and search are external collaborators; this trait is
//! the seam the runtime dispatches against.

use async_trait::async_trait;
use serde_json::Value;

/// A tool the runtime can dispatch a `tool_use` block to by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Execute the tool against `working_directory` with the opaque
    /// `input` the model supplied. The return value is fed back to the
    /// model verbatim; a string beginning with `"Error:"` is treated as
    /// a tool failure by the runtime loop (see §4.8, §7 `ToolError`).
    async fn execute(&self, working_directory: &std::path::Path, input: &Value) -> String;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A tool that always succeeds, echoing its input back.
    pub struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        async fn execute(&self, _working_directory: &std::path::Path, input: &Value) -> String {
            format!("OK: {input}")
        }
    }

    /// A tool that always fails.
    pub struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "fail"
        }

        async fn execute(&self, _working_directory: &std::path::Path, _input: &Value) -> String {
            "Error: simulated failure".to_string()
        }
    }
}
