//! Aggregate statistics snapshot

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::bead::priority_label;

/// Aggregate counts describing the tracker at a point in time.
///
/// Delivered inside `init`, `update` and `reload` events and by
/// `GET /api/stats`. A new snapshot always replaces the previous one whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Stats {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_type: BTreeMap<String, u64>,
    pub by_priority: BTreeMap<String, u64>,
    pub blocked: u64,
    pub ready: u64,
    pub stale: u64,
    pub velocity: Option<Velocity>,
}

/// Creation/closure rates over the last seven days
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Velocity {
    pub created_7d: u64,
    pub closed_7d: u64,
}

impl Stats {
    /// Count for a single status, zero when absent
    pub fn status_count(&self, status: &str) -> u64 {
        self.by_status.get(status).copied().unwrap_or(0)
    }

    /// Priority counts with display labels, most urgent first.
    ///
    /// The server keys priorities as `p0`..`p4`; bare integers are accepted
    /// too. Anything else is reported as `Unknown` and sorts last.
    pub fn priority_breakdown(&self) -> Vec<(&'static str, u64)> {
        let mut levels: Vec<(i64, u64)> = self
            .by_priority
            .iter()
            .map(|(key, count)| {
                let level = key
                    .trim()
                    .trim_start_matches(|c: char| c == 'p' || c == 'P')
                    .parse()
                    .unwrap_or(i64::MAX);
                (level, *count)
            })
            .collect();
        levels.sort_by_key(|(level, _)| *level);
        levels
            .into_iter()
            .map(|(level, count)| (priority_label(level), count))
            .collect()
    }
}
