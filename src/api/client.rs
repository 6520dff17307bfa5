//! Typed client for the seeBeads REST endpoints

use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::LiveConfig;
use crate::error::{LiveError, LiveResult};
use crate::types::{BeadDetailResponse, BeadsResponse, EpicProgress, Filter, Health, Stats};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EpicsBody {
    #[serde(default)]
    epics: Vec<EpicProgress>,
}

#[derive(Debug, Serialize)]
struct AgentModeRequest {
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct AgentModeBody {
    #[serde(rename = "agentMode")]
    agent_mode: bool,
}

/// REST client bound to one server
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> LiveResult<Self> {
        Self::from_config(&LiveConfig::new(base_url))
    }

    pub fn from_config(config: &LiveConfig) -> LiveResult<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            base: config.base()?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `GET /api/stats`
    pub async fn stats(&self) -> LiveResult<Stats> {
        self.get_json(self.url("api/stats")?).await
    }

    /// `GET /api/beads` with the filter encoded as query parameters
    pub async fn beads(&self, filter: &Filter) -> LiveResult<BeadsResponse> {
        let mut url = self.url("api/beads")?;
        let pairs = filter.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())));
        }
        self.get_json(url).await
    }

    /// `GET /api/beads/{id}`
    pub async fn bead(&self, id: &str) -> LiveResult<BeadDetailResponse> {
        let url = self.url(&format!("api/beads/{}", urlencoding::encode(id)))?;
        self.get_json(url).await
    }

    /// `GET /api/epics`
    pub async fn epics(&self) -> LiveResult<Vec<EpicProgress>> {
        let body: EpicsBody = self.get_json(self.url("api/epics")?).await?;
        Ok(body.epics)
    }

    /// `POST /api/agent-mode`; returns the mode the server reports
    pub async fn set_agent_mode(&self, enabled: bool) -> LiveResult<bool> {
        let response = self
            .http
            .post(self.url("api/agent-mode")?)
            .json(&AgentModeRequest { enabled })
            .send()
            .await?;
        let body: AgentModeBody = decode(response).await?;
        Ok(body.agent_mode)
    }

    /// `GET /api/health`
    pub async fn health(&self) -> LiveResult<Health> {
        self.get_json(self.url("api/health")?).await
    }

    fn url(&self, path: &str) -> LiveResult<Url> {
        Ok(self.base.join(path)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> LiveResult<T> {
        tracing::trace!(%url, "GET");
        let response = self.http.get(url).send().await?;
        decode(response).await
    }
}

pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> LiveResult<T> {
    let status = response.status();
    if !status.is_success() {
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        return Err(LiveError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json().await?)
}
