//! Human-readable markdown rendering of a [`Plan`], written alongside the
//! machine JSON file by the Plan Store. Section order and content follow
//! the external interface contract in spec §6.

use std::fmt::Write as _;

use super::types::{Plan, PlanStatus, Step, StepStatus};

const MAX_FILES_SHOWN: usize = 3;
const MAX_LOG_ENTRIES_SHOWN: usize = 20;

fn status_emoji(status: PlanStatus) -> &'static str {
    match status {
        PlanStatus::Planning => "📝",
        PlanStatus::Ready => "🟡",
        PlanStatus::InProgress => "🔵",
        PlanStatus::Completed => "✅",
        PlanStatus::Failed => "❌",
    }
}

fn step_status_icon(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "⬜",
        StepStatus::InProgress => "🔵",
        StepStatus::Completed => "✅",
        StepStatus::Skipped => "⏭️",
        StepStatus::Failed => "❌",
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

fn render_files_cell(step: &Step) -> String {
    let mut entries: Vec<String> = Vec::new();
    for f in &step.files_to_create {
        entries.push(format!("+{f}"));
    }
    for f in &step.files_to_modify {
        entries.push(format!("~{f}"));
    }
    let total = entries.len();
    let shown: Vec<String> = entries.into_iter().take(MAX_FILES_SHOWN).collect();
    let mut cell = shown.join(", ");
    if total > MAX_FILES_SHOWN {
        let _ = write!(cell, " (+{})", total - MAX_FILES_SHOWN);
    }
    if cell.is_empty() {
        cell = "-".to_string();
    }
    cell
}

/// Render the complete markdown document for `plan`.
pub fn render(plan: &Plan) -> String {
    let mut out = String::new();

    let title = truncate_chars(&plan.task_description, 60);
    let _ = writeln!(out, "# Implementation Plan: {title}\n");

    let _ = writeln!(out, "- **Task ID:** `{}`", plan.task_id);
    let _ = writeln!(out, "- **Project ID:** `{}`", plan.project_id);
    let _ = writeln!(out, "- **Plan File:** `{}`", plan.plan_filename);
    let _ = writeln!(out, "- **Created At:** {}", plan.created_at.to_rfc3339());
    let _ = writeln!(out, "- **Updated At:** {}", plan.updated_at.to_rfc3339());
    let _ = writeln!(
        out,
        "- **Status:** {} {}",
        status_emoji(plan.status),
        plan.status
    );
    let pct = plan.progress_percentage() * 100.0;
    let _ = writeln!(
        out,
        "- **Progress:** {}/{} ({:.0}%)\n",
        plan.completed_steps_count(),
        plan.steps.len(),
        pct
    );

    if let Some(err) = &plan.error_message {
        let _ = writeln!(out, "> ⚠️ {err}\n");
    }

    let _ = writeln!(out, "## Task Description\n");
    let _ = writeln!(out, "{}\n", plan.task_description);

    let _ = writeln!(out, "## Steps Overview\n");
    let _ = writeln!(out, "| # | Step | Status | Files |");
    let _ = writeln!(out, "|---|------|--------|-------|");
    for step in &plan.steps {
        let _ = writeln!(
            out,
            "| {} | {} | {} {} | {} |",
            step.index,
            step.title,
            step_status_icon(step.status),
            step.status_label(),
            render_files_cell(step)
        );
    }
    out.push('\n');

    let _ = writeln!(out, "## Step Details\n");
    for step in &plan.steps {
        let _ = writeln!(
            out,
            "### {}. {} {}\n",
            step.index,
            step_status_icon(step.status),
            step.title
        );
        if let Some(started) = step.started_at {
            let _ = writeln!(out, "- **Started:** {}", started.to_rfc3339());
        }
        if let Some(completed) = step.completed_at {
            let _ = writeln!(out, "- **Completed:** {}", completed.to_rfc3339());
        }
        if !step.files_to_create.is_empty() {
            let _ = writeln!(
                out,
                "- **Files to create:** {}",
                step.files_to_create.iter().cloned().collect::<Vec<_>>().join(", ")
            );
        }
        if !step.files_to_modify.is_empty() {
            let _ = writeln!(
                out,
                "- **Files to modify:** {}",
                step.files_to_modify.iter().cloned().collect::<Vec<_>>().join(", ")
            );
        }
        let _ = writeln!(out, "\n{}\n", step.description);
        if !step.output.is_empty() {
            let _ = writeln!(out, "```\n{}\n```\n", step.output);
        }
        out.push_str("---\n\n");
    }

    let _ = writeln!(out, "## Execution Log\n");
    let total = plan.execution_log.len();
    let start = total.saturating_sub(MAX_LOG_ENTRIES_SHOWN);
    if start > 0 {
        let _ = writeln!(out, "_{start} earlier entries omitted._\n");
    }
    for entry in &plan.execution_log[start..] {
        let _ = writeln!(out, "- `{}` {}", entry.timestamp.to_rfc3339(), entry.message);
    }

    out
}

impl Step {
    fn status_label(&self) -> &'static str {
        match self.status {
            StepStatus::Pending => "Pending",
            StepStatus::InProgress => "InProgress",
            StepStatus::Completed => "Completed",
            StepStatus::Skipped => "Skipped",
            StepStatus::Failed => "Failed",
        }
    }
}
