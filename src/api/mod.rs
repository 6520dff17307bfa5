//! REST API consumed by the dashboard views
//!
//! - `GET /api/stats` - aggregate counters
//! - `GET /api/beads` - filtered, paginated issue list
//! - `GET /api/beads/{id}` - issue detail with relations
//! - `GET /api/epics` - epic progress
//! - `GET /api/health` - server health
//! - `POST /api/agent-mode` - toggle agent mode
//!
//! [`version`] compares the server's reported version with the newest
//! published release tag.

pub mod client;
pub mod version;

pub use client::ApiClient;
pub use version::{compare_versions, ReleaseChecker, VersionInfo};
