//! Plain-text reports for finished runs and steered tasks.

use std::time::Duration;

use scout_core::{RunDetails, RunId, TaskResult};

/// `532ms` under a second, otherwise seconds to one decimal (`1.5s`).
pub fn format_duration(duration: Duration) -> String {
    if duration < Duration::from_secs(1) {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

/// Summary line followed by one section per task.
pub fn format_run(details: &RunDetails, activity_tail: usize) -> String {
    let mut text = format!(
        "Run {}: {}/{} tasks succeeded",
        details.run_id, details.success_count, details.total_count
    );
    for (index, task) in details.tasks.iter().enumerate() {
        text.push_str("\n\n");
        text.push_str(&format_task(index, task, activity_tail));
    }
    text
}

/// Report for a single task re-run by a steer request.
pub fn format_steered_task(
    run_id: &RunId,
    index: usize,
    task: &TaskResult,
    activity_tail: usize,
) -> String {
    let mut text = format!("Steered task {} in run {}", task.task_id, run_id);
    if !task.steering_notes.is_empty() {
        text.push_str("\nSteering notes:");
        for (i, note) in task.steering_notes.iter().enumerate() {
            text.push_str(&format!("\n  {}. {}", i + 1, note));
        }
    }
    text.push_str("\n\n");
    text.push_str(&format_task(index, task, activity_tail));
    text
}

/// One task section. `index` is zero-based and shown one-based.
pub fn format_task(index: usize, task: &TaskResult, activity_tail: usize) -> String {
    let status = if task.is_success() { "completed" } else { "failed" };
    let mut lines = vec![
        format!("### {}. {} [{}]", index + 1, task.task_id, status),
        format!("Prompt: {}", or_placeholder(&task.prompt, "(none)")),
        format!("Working directory: {}", or_placeholder(&task.work_dir, "(default)")),
        format!("Duration: {}", format_duration(task.duration())),
    ];

    let skip = task.activities.len().saturating_sub(activity_tail);
    let recent: Vec<_> = task.activities.iter().skip(skip).collect();
    if !recent.is_empty() {
        lines.push("Recent activity:".to_string());
        lines.extend(recent.iter().map(|a| format!("  - {}", a.summary())));
    }

    if task.is_success() {
        lines.push("Output:".to_string());
        lines.push(or_placeholder(&task.output, "(no output)").to_string());
        if task.references.is_empty() {
            lines.push("References: None".to_string());
        } else {
            lines.push("References:".to_string());
            lines.extend(task.references.iter().map(|r| format!("  - {}", r)));
        }
    } else {
        lines.push(format!("Error: {}", or_placeholder(&task.stderr, "unknown error")));
    }

    lines.join("\n")
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        placeholder
    } else {
        trimmed
    }
}
