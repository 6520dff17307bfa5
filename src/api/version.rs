//! Update check: the server's reported version against the latest published tag

use std::cmp::Ordering;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::client::{decode, ApiClient};
use crate::error::LiveResult;

/// Tag listing of the seeBeads repository, newest first
pub const TAGS_URL: &str = "https://api.github.com/repos/taylorkpotter/seeBeads/tags";

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

/// Outcome of an update check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub current: Option<String>,
    pub latest: Option<String>,
    pub update_available: bool,
}

impl VersionInfo {
    pub fn new(current: Option<String>, latest: Option<String>) -> Self {
        let update_available = match (&current, &latest) {
            (Some(current), Some(latest)) => {
                current != latest && compare_versions(latest, current) == Ordering::Greater
            }
            _ => false,
        };
        Self {
            current,
            latest,
            update_available,
        }
    }
}

/// Compare the first `major.minor.patch` found in each string.
/// A string without one compares as `0.0.0`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    parse_version(a).cmp(&parse_version(b))
}

fn parse_version(raw: &str) -> (u64, u64, u64) {
    let bytes = raw.as_bytes();
    (0..bytes.len())
        .filter(|&i| bytes[i].is_ascii_digit())
        .find_map(|i| parse_triple(&raw[i..]))
        .unwrap_or((0, 0, 0))
}

fn parse_triple(s: &str) -> Option<(u64, u64, u64)> {
    let (major, rest) = leading_number(s)?;
    let (minor, rest) = leading_number(rest.strip_prefix('.')?)?;
    let (patch, _) = leading_number(rest.strip_prefix('.')?)?;
    Some((major, minor, patch))
}

fn leading_number(s: &str) -> Option<(u64, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let value = s[..end].parse().ok()?;
    Some((value, &s[end..]))
}

/// Looks up the newest published tag
#[derive(Debug, Clone)]
pub struct ReleaseChecker {
    http: reqwest::Client,
    tags_url: Url,
}

impl ReleaseChecker {
    pub fn new() -> LiveResult<Self> {
        Self::with_tags_url(TAGS_URL)
    }

    /// Point at a different tag listing with the same `[{"name": ..}]` shape
    pub fn with_tags_url(tags_url: &str) -> LiveResult<Self> {
        // GitHub rejects requests without a User-Agent
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("beads-live/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            tags_url: Url::parse(tags_url)?,
        })
    }

    /// Name of the newest tag, `None` when the listing is empty
    pub async fn latest_tag(&self) -> LiveResult<Option<String>> {
        let response = self.http.get(self.tags_url.clone()).send().await?;
        let tags: Vec<Tag> = decode(response).await?;
        Ok(tags.into_iter().next().map(|tag| tag.name))
    }

    /// Compare the server's version with the newest tag.
    ///
    /// A failing tag lookup only leaves `latest` empty; a failing health
    /// request is returned.
    pub async fn check(&self, api: &ApiClient) -> LiveResult<VersionInfo> {
        let current = api.health().await?.version.filter(|v| !v.is_empty());
        let latest = match self.latest_tag().await {
            Ok(latest) => latest,
            Err(e) => {
                tracing::debug!(error = %e, "tag lookup failed, skipping update check");
                None
            }
        };
        Ok(VersionInfo::new(current, latest))
    }
}
