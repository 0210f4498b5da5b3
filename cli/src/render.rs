//! Plain-text rendering of task-list state.

use std::fmt::Write;

use chrono::{DateTime, Local, Utc};
use taskflow_core::{Filter, Stats, Task, TaskListState, TaskStatus};

fn marker(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "[ ]",
        TaskStatus::InProgress => "[~]",
        TaskStatus::Done => "[x]",
    }
}

fn when(dt: &DateTime<Utc>) -> String {
    dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub fn task(task: &Task, now: DateTime<Utc>) -> String {
    let mut out = format!(
        "{:>4} {} {} ({})",
        task.id,
        marker(task.status),
        task.title,
        task.status.as_str().replace('_', " ")
    );
    if task.is_expired_at(now) {
        out.push_str("  EXPIRED");
    }
    if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
        let _ = write!(out, "\n         {description}");
    }
    let _ = write!(out, "\n         created {}", when(&task.created_at));
    if let Some(deadline) = &task.deadline {
        let _ = write!(out, " | deadline {}", when(deadline));
    }
    if let Some(finished_at) = &task.finished_at {
        let _ = write!(out, " | completed {}", when(finished_at));
    }
    out
}

pub fn stats(stats: &Stats) -> String {
    format!(
        "total {} | active {} | completed {}",
        stats.total, stats.active, stats.completed
    )
}

pub fn task_list(state: &TaskListState, filter: Filter, now: DateTime<Utc>) -> String {
    if state.is_loading() && !state.loaded {
        return "Loading tasks...".to_string();
    }
    let visible = state.filtered(filter);
    if visible.is_empty() {
        return match filter {
            Filter::All => "No tasks found. Create your first task with `taskflow add`.".to_string(),
            other => format!("No {other} tasks yet."),
        };
    }
    visible
        .into_iter()
        .map(|t| task(t, now))
        .collect::<Vec<_>>()
        .join("\n")
}
