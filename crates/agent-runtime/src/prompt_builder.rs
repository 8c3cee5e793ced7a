//! Composes a role-specific system prompt from independent fragments,
//! rather than a class-inheritance template hierarchy.

/// Builds a system prompt by concatenating opt-in fragments in a fixed
/// order: role text, file-ops guidance, best practices, depth guidance,
/// then any caller-supplied extra fragments.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    role_text: Option<String>,
    file_ops_guidance: bool,
    best_practices: bool,
    model_depth: Option<u32>,
    extra: Vec<String>,
}

const FILE_OPS_GUIDANCE: &str = "\
Declare every file you intend to create or modify before editing it. \
Prefer targeted edits over rewriting whole files.";

const BEST_PRACTICES: &str = "\
Keep changes minimal and focused on the task. Verify assumptions by \
reading the relevant files before acting on them.";

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, text: impl Into<String>) -> Self {
        self.role_text = Some(text.into());
        self
    }

    pub fn with_file_ops_guidance(mut self) -> Self {
        self.file_ops_guidance = true;
        self
    }

    pub fn with_best_practices(mut self) -> Self {
        self.best_practices = true;
        self
    }

    pub fn with_depth(mut self, model_depth: u32) -> Self {
        self.model_depth = Some(model_depth);
        self
    }

    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.extra.push(fragment.into());
        self
    }

    pub fn build(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(role) = &self.role_text {
            parts.push(role.clone());
        }
        if self.file_ops_guidance {
            parts.push(FILE_OPS_GUIDANCE.to_string());
        }
        if self.best_practices {
            parts.push(BEST_PRACTICES.to_string());
        }
        if let Some(depth) = self.model_depth {
            if depth > 0 {
                parts.push(format!(
                    "This is a depth-{depth} delegated agent; keep output concise for the parent agent to consume."
                ));
            }
        }
        parts.extend(self.extra.iter().cloned());
        parts.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_fragments_in_order() {
        let prompt = PromptBuilder::new()
            .role("You are Wyrm, a planning agent.")
            .with_file_ops_guidance()
            .with_best_practices()
            .build();
        let role_pos = prompt.find("Wyrm").unwrap();
        let file_ops_pos = prompt.find("Declare every file").unwrap();
        let practices_pos = prompt.find("Keep changes minimal").unwrap();
        assert!(role_pos < file_ops_pos);
        assert!(file_ops_pos < practices_pos);
    }

    #[test]
    fn depth_zero_omits_delegation_note() {
        let prompt = PromptBuilder::new().role("x").with_depth(0).build();
        assert!(!prompt.contains("delegated agent"));
    }

    #[test]
    fn depth_nonzero_adds_delegation_note() {
        let prompt = PromptBuilder::new().role("x").with_depth(2).build();
        assert!(prompt.contains("depth-2 delegated agent"));
    }

    #[test]
    fn empty_builder_produces_empty_string() {
        assert_eq!(PromptBuilder::new().build(), "");
    }
}
