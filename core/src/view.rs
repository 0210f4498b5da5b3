//! Derived views over a task collection. Pure; recomputed from the
//! published list on every render rather than cached.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::Task;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Filter::All => "all",
            Filter::Active => "active",
            Filter::Completed => "completed",
        };
        f.write_str(name)
    }
}

impl FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Filter::All),
            "active" => Ok(Filter::Active),
            "completed" => Ok(Filter::Completed),
            other => Err(format!("unknown filter `{other}` (expected all, active or completed)")),
        }
    }
}

impl Filter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !task.is_finished,
            Filter::Completed => task.is_finished,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

/// Tasks passing `filter`, in backend order.
pub fn filtered(tasks: &[Task], filter: Filter) -> Vec<&Task> {
    tasks.iter().filter(|task| filter.matches(task)).collect()
}

pub fn stats(tasks: &[Task]) -> Stats {
    let completed = tasks.iter().filter(|task| task.is_finished).count();
    Stats {
        total: tasks.len(),
        active: tasks.len() - completed,
        completed,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::types::{TaskId, TaskStatus};

    fn task(id: i64, status: TaskStatus) -> Task {
        Task {
            id: TaskId(id),
            title: format!("task {id}"),
            description: None,
            status,
            is_finished: status.is_finished(),
            deadline: None,
            is_expired: false,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            finished_at: None,
        }
    }

    fn sample() -> Vec<Task> {
        vec![
            task(5, TaskStatus::Done),
            task(4, TaskStatus::Todo),
            task(3, TaskStatus::InProgress),
            task(2, TaskStatus::Done),
            task(1, TaskStatus::Todo),
        ]
    }

    fn ids(tasks: &[&Task]) -> Vec<i64> {
        tasks.iter().map(|t| t.id.0).collect()
    }

    #[test]
    fn all_returns_everything_in_order() {
        let tasks = sample();
        assert_eq!(ids(&filtered(&tasks, Filter::All)), vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn active_and_completed_partition_the_collection() {
        let tasks = sample();
        let active = filtered(&tasks, Filter::Active);
        let completed = filtered(&tasks, Filter::Completed);
        assert_eq!(ids(&active), vec![4, 3, 1]);
        assert_eq!(ids(&completed), vec![5, 2]);
        assert_eq!(active.len() + completed.len(), tasks.len());
        assert!(active.iter().all(|a| !completed.iter().any(|c| c.id == a.id)));
    }

    #[test]
    fn stats_add_up() {
        let stats = stats(&sample());
        assert_eq!(stats, Stats { total: 5, active: 3, completed: 2 });
        assert_eq!(stats.total, stats.active + stats.completed);
        assert_eq!(super::stats(&[]), Stats::default());
    }

    #[test]
    fn filter_parses_from_lowercase_names() {
        assert_eq!("active".parse::<Filter>().unwrap(), Filter::Active);
        assert_eq!(Filter::Completed.to_string(), "completed");
        assert!("done".parse::<Filter>().is_err());
    }
}
