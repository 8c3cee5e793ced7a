//! Deterministic, human-readable plan filename generation.
//!
//! `generate_plan_filename(description, task_id)` is a pure function of
//! its two inputs: an optional `[area-prefix]` pulled from the front of
//! the description, the first few content words of the description (with
//! common filler verbs stripped), and a 4-hex-character MD5 suffix of the
//! task id for uniqueness.

const MAX_DESCRIPTION_PORTION: usize = 40;
const MAX_WORDS: usize = 6;

const FILLER_VERBS: &[&str] = &[
    "implement", "add", "fix", "create", "update", "build", "write", "remove",
    "refactor", "improve", "support", "enable", "introduce", "make",
];

/// Generate the immutable plan filename for a `(taskDescription, taskId)`
/// pair. See spec §4.6 / §8 S6 for the exact format.
pub fn generate_plan_filename(task_description: &str, task_id: &str) -> String {
    let hash = hex_md5_prefix(task_id, 4);

    let prefix = extract_bracket_prefix(task_description)
        .map(|p| sanitize(&p))
        .filter(|p| !p.is_empty());

    let words_part = sanitize_description_words(task_description);

    let mut segments: Vec<String> = Vec::new();
    if let Some(p) = prefix {
        segments.push(p);
    }
    if !words_part.is_empty() {
        segments.push(words_part);
    }

    let description_portion = segments.join("-");
    let description_portion = truncate_chars(&description_portion, MAX_DESCRIPTION_PORTION);
    let description_portion = description_portion.trim_matches('-').to_string();

    let filename = if description_portion.is_empty() {
        hash
    } else {
        format!("{description_portion}-{hash}")
    };

    filename.to_lowercase()
}

fn extract_bracket_prefix(description: &str) -> Option<String> {
    let trimmed = description.trim();
    if !trimmed.starts_with('[') {
        return None;
    }
    let end = trimmed.find(']')?;
    Some(trimmed[1..end].to_string())
}

fn sanitize_description_words(description: &str) -> String {
    let trimmed = description.trim();
    let after_bracket = if trimmed.starts_with('[') {
        match trimmed.find(']') {
            Some(idx) => &trimmed[idx + 1..],
            None => trimmed,
        }
    } else {
        trimmed
    };

    let words: Vec<&str> = after_bracket
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect();

    let filtered: Vec<&str> = words
        .iter()
        .filter(|w| !FILLER_VERBS.contains(&w.to_lowercase().as_str()))
        .copied()
        .collect();

    let chosen: Vec<&str> = if filtered.is_empty() { words } else { filtered };

    let joined = chosen
        .into_iter()
        .take(MAX_WORDS)
        .collect::<Vec<_>>()
        .join(" ");

    sanitize(&joined)
}

/// Lowercase, collapse runs of non-alphanumerics to a single `-`, trim
/// leading/trailing dashes.
fn sanitize(input: &str) -> String {
    let mut out = String::new();
    let mut last_was_dash = false;
    for c in input.chars() {
        if c.is_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash && !out.is_empty() {
            out.push('-');
            last_was_dash = true;
        }
    }
    out.trim_end_matches('-').to_string()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn hex_md5_prefix(input: &str, len: usize) -> String {
    let digest = md5::compute(input.as_bytes());
    let hex = format!("{digest:x}");
    hex.chars().take(len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s6_plan_filename_generation() {
        let filename = generate_plan_filename(
            "[frontend-1] Implement: user authentication flow!",
            "a1b2c3d4e5",
        );
        assert!(
            filename.starts_with("frontend-1-user-authentication-flow-"),
            "got: {filename}"
        );
        let hash_suffix = filename.rsplit('-').next().unwrap();
        let expected_hash = hex_md5_prefix("a1b2c3d4e5", 4);
        assert_eq!(hash_suffix, expected_hash);

        let description_portion = filename.trim_end_matches(&format!("-{hash_suffix}"));
        assert!(description_portion.len() <= MAX_DESCRIPTION_PORTION);
    }

    #[test]
    fn empty_description_yields_hash_only() {
        let filename = generate_plan_filename("!!! ... ---", "task-xyz");
        let expected_hash = hex_md5_prefix("task-xyz", 4);
        assert_eq!(filename, expected_hash);
    }

    #[test]
    fn pure_function_of_inputs() {
        let a = generate_plan_filename("Fix the bug in parser", "t1");
        let b = generate_plan_filename("Fix the bug in parser", "t1");
        assert_eq!(a, b);
    }

    #[test]
    fn different_task_ids_differ() {
        let a = generate_plan_filename("Fix the bug", "t1");
        let b = generate_plan_filename("Fix the bug", "t2");
        assert_ne!(a, b);
    }

    #[test]
    fn no_bracket_prefix_still_works() {
        let filename = generate_plan_filename("Add dark mode toggle to settings", "abc");
        assert!(filename.contains("dark-mode-toggle"));
    }
}
