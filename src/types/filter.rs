//! Issue list filter and its query-string encoding

use serde::{Deserialize, Serialize};

use super::bead::{BeadType, Status};

/// Filter for `GET /api/beads`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Filter {
    pub status: Vec<Status>,
    #[serde(rename = "type")]
    pub bead_type: Vec<BeadType>,
    pub priority: Vec<i64>,
    pub labels: Vec<String>,
    pub search: Option<String>,
    pub ready: bool,
    pub limit: u32,
    pub offset: u32,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status.push(status);
        self
    }

    pub fn with_type(mut self, bead_type: BeadType) -> Self {
        self.bead_type.push(bead_type);
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority.push(priority);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn ready_only(mut self) -> Self {
        self.ready = true;
        self
    }

    pub fn page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    /// Query parameters in the server's format. Empty fields are omitted;
    /// list fields are comma-joined.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();

        if !self.status.is_empty() {
            pairs.push(("status", join(self.status.iter().map(Status::as_str))));
        }
        if !self.bead_type.is_empty() {
            pairs.push(("type", join(self.bead_type.iter().map(BeadType::as_str))));
        }
        if !self.priority.is_empty() {
            let values: Vec<String> = self.priority.iter().map(|p| p.to_string()).collect();
            pairs.push(("priority", values.join(",")));
        }
        if !self.labels.is_empty() {
            pairs.push(("labels", self.labels.join(",")));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        if self.ready {
            pairs.push(("ready", "true".to_string()));
        }
        if self.limit > 0 {
            pairs.push(("limit", self.limit.to_string()));
        }
        if self.offset > 0 {
            pairs.push(("offset", self.offset.to_string()));
        }

        pairs
    }
}

fn join<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values.collect::<Vec<_>>().join(",")
}
