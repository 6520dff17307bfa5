//! Network side of the push subscription

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tokio_stream::StreamExt;
use url::Url;

use super::sse::{SseDecoder, SseFrame};
use crate::config::LiveConfig;
use crate::error::{LiveError, LiveResult};

/// Stream of decoded frames from one open connection.
///
/// An `Err` item or the end of the stream both mean the connection is gone.
pub type FrameStream = BoxStream<'static, LiveResult<SseFrame>>;

/// Opens push-stream connections
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Resolve once the stream is established
    async fn connect(&self) -> LiveResult<FrameStream>;
}

/// `GET /api/events` over HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: Url,
    idle_timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &LiveConfig) -> LiveResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Self::with_client(client, config)
    }

    /// Reuse an existing client. It must not carry a total request timeout,
    /// which would cut the stream.
    pub fn with_client(client: reqwest::Client, config: &LiveConfig) -> LiveResult<Self> {
        Ok(Self {
            client,
            url: config.events_url()?,
            idle_timeout: config.idle_timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&self) -> LiveResult<FrameStream> {
        let response = self
            .client
            .get(self.url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LiveError::Status(status.as_u16()));
        }

        let idle = self.idle_timeout;
        let mut body = Box::pin(response.bytes_stream().timeout(idle));

        let frames = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            while let Some(item) = body.next().await {
                match item {
                    Ok(Ok(chunk)) => {
                        for frame in decoder.feed(&chunk) {
                            yield Ok(frame);
                        }
                    }
                    Ok(Err(e)) => {
                        yield Err(LiveError::Http(e));
                        return;
                    }
                    Err(_elapsed) => {
                        yield Err(LiveError::IdleTimeout(idle));
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(frames))
    }
}
