//! Domain DTOs for the TaskFlow API.
//!
//! # Design
//! These types mirror the backend's JSON schema but are defined
//! independently of the mock server; the end-to-end tests catch drift.
//! Backend-derived fields (`is_finished`, `is_expired`, `finished_at`) are
//! read-only on the client: nothing here sends them back.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Backend-assigned task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(TaskId)
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    /// Successor in the manual toggle cycle: todo -> in_progress -> done -> todo.
    pub fn next(self) -> Self {
        match self {
            TaskStatus::Todo => TaskStatus::InProgress,
            TaskStatus::InProgress => TaskStatus::Done,
            TaskStatus::Done => TaskStatus::Todo,
        }
    }

    pub fn is_finished(self) -> bool {
        self == TaskStatus::Done
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status `{}` (expected todo, in_progress or done)", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A task as returned by `GET /tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub is_finished: bool,
    #[serde(default, with = "timestamp::option")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_expired: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Expiry as the client sees it at `now`. The backend flag wins when set;
    /// otherwise a past deadline on an unfinished task counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.is_expired
            || (!self.is_finished && self.deadline.is_some_and(|deadline| deadline < now))
    }
}

/// Request payload for `POST /tasks`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "timestamp::option")]
    pub deadline: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Request payload for `PUT /tasks/{id}`. Only the fields present in the JSON
/// are applied; omitted fields remain unchanged on the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "timestamp::option")]
    pub deadline: Option<DateTime<Utc>>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Body of `POST /register` and `POST /login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Successful `POST /login` body.
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

impl fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponse").field("token", &"<redacted>").finish()
    }
}

/// The part of a create response the client relies on. Backends answer with
/// either the full task or just `{"id": ...}`.
#[derive(Debug, Deserialize)]
pub(crate) struct Created {
    pub id: TaskId,
}

/// Body shape of backend failures.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

/// Lenient timestamp (de)serialization.
///
/// Accepts RFC 3339 and naive ISO-8601 (`YYYY-MM-DDTHH:MM[:SS[.f]]`, read as
/// UTC); always writes RFC 3339 UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, ParseError, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

    pub fn parse(s: &str) -> Result<DateTime<Utc>, ParseError> {
        let s = s.trim();
        let rfc3339 = match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => return Ok(dt.with_timezone(&Utc)),
            Err(e) => e,
        };
        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
            .map(|naive| naive.and_utc())
            .ok_or(rfc3339)
    }

    pub fn format(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => super::serialize(dt, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(s) if !s.trim().is_empty() => super::parse(&s).map(Some).map_err(de::Error::custom),
                _ => Ok(None),
            }
        }
    }
}
