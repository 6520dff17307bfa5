//! Tracker records returned by the seeBeads REST API

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Workflow state of a bead
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    Open,
    InProgress,
    Blocked,
    Deferred,
    Closed,
    Tombstone,
    Pinned,
    Hooked,
    /// A status this client does not know yet
    Other(String),
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Open => "open",
            Status::InProgress => "in_progress",
            Status::Blocked => "blocked",
            Status::Deferred => "deferred",
            Status::Closed => "closed",
            Status::Tombstone => "tombstone",
            Status::Pinned => "pinned",
            Status::Hooked => "hooked",
            Status::Other(s) => s,
        }
    }

    /// Human label used by the dashboard
    pub fn label(&self) -> &str {
        match self {
            Status::Open => "Open",
            Status::InProgress => "In Progress",
            Status::Blocked => "Blocked",
            Status::Deferred => "Deferred",
            Status::Closed => "Closed",
            Status::Tombstone => "Deleted",
            Status::Pinned => "Pinned",
            Status::Hooked => "Hooked",
            Status::Other(s) => s,
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Open
    }
}

impl From<&str> for Status {
    fn from(s: &str) -> Self {
        match s {
            "open" => Status::Open,
            "in_progress" => Status::InProgress,
            "blocked" => Status::Blocked,
            "deferred" => Status::Deferred,
            "closed" => Status::Closed,
            "tombstone" => Status::Tombstone,
            "pinned" => Status::Pinned,
            "hooked" => Status::Hooked,
            other => Status::Other(other.to_string()),
        }
    }
}

/// Kind of bead
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BeadType {
    Task,
    Bug,
    Feature,
    Epic,
    Chore,
    Message,
    MergeRequest,
    Molecule,
    Gate,
    Event,
    Other(String),
}

impl BeadType {
    pub fn as_str(&self) -> &str {
        match self {
            BeadType::Task => "task",
            BeadType::Bug => "bug",
            BeadType::Feature => "feature",
            BeadType::Epic => "epic",
            BeadType::Chore => "chore",
            BeadType::Message => "message",
            BeadType::MergeRequest => "merge-request",
            BeadType::Molecule => "molecule",
            BeadType::Gate => "gate",
            BeadType::Event => "event",
            BeadType::Other(s) => s,
        }
    }
}

impl Default for BeadType {
    fn default() -> Self {
        BeadType::Task
    }
}

impl From<&str> for BeadType {
    fn from(s: &str) -> Self {
        match s {
            "task" => BeadType::Task,
            "bug" => BeadType::Bug,
            "feature" => BeadType::Feature,
            "epic" => BeadType::Epic,
            "chore" => BeadType::Chore,
            "message" => BeadType::Message,
            "merge-request" => BeadType::MergeRequest,
            "molecule" => BeadType::Molecule,
            "gate" => BeadType::Gate,
            "event" => BeadType::Event,
            other => BeadType::Other(other.to_string()),
        }
    }
}

macro_rules! string_enum_serde {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Ok(<$ty>::from(s.as_str()))
            }
        }
    };
}

string_enum_serde!(Status);
string_enum_serde!(BeadType);

/// Human label for a priority level
pub fn priority_label(priority: i64) -> &'static str {
    match priority {
        0 => "P0 - Critical",
        1 => "P1 - High",
        2 => "P2 - Medium",
        3 => "P3 - Low",
        4 => "P4 - Lowest",
        _ => "Unknown",
    }
}

/// Relationship between two beads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub issue_id: String,
    pub depends_on_id: String,
    #[serde(rename = "type")]
    pub dep_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub issue_id: String,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A single issue record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bead {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub issue_type: BeadType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defer_until: Option<DateTime<Utc>>,
    /// Derived by the server from the id pattern (`bd-1234.1` -> `bd-1234`)
    #[serde(
        rename = "ParentID",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_string_as_none"
    )]
    pub parent_id: Option<String>,
}

fn empty_string_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// One page of `GET /api/beads`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeadsResponse {
    #[serde(default)]
    pub beads: Vec<Bead>,
    pub total: u64,
    pub has_more: bool,
}

/// `GET /api/beads/{id}` with its relations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeadDetailResponse {
    pub bead: Bead,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Bead>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blockers: Vec<Bead>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked: Vec<Bead>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Bead>,
}

/// Completion summary of an epic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpicProgress {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub status: Status,
    pub total_children: u64,
    pub closed_children: u64,
}

impl EpicProgress {
    /// Completion ratio in `0.0..=1.0`; an epic without children counts as done
    pub fn completion(&self) -> f64 {
        if self.total_children == 0 {
            return 1.0;
        }
        self.closed_children as f64 / self.total_children as f64
    }
}

/// `GET /api/health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub beads_file: String,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_beads: u64,
    #[serde(default)]
    pub version: Option<String>,
}
