use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client, StatusCode};
use tracing::{error, info};

use crate::ingest_url::{ingest_url, Endpoints};
use crate::types::EnrichedEvent;

pub const USER_AGENT: &str = concat!("axiom-cloudwatch-forwarder/v", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Debug)]
pub struct IngestConfig {
    pub endpoints: Endpoints,
    pub token: String,
    pub dataset: String,
    pub timeout: Option<Duration>,
}

/// Posts enriched batches to the ingest API.
#[derive(Clone)]
pub struct IngestClient {
    client: Client,
    url: String,
    token: String,
}

impl IngestClient {
    pub fn new(cfg: IngestConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = cfg.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()
            .context("building ingest http client")?;
        Ok(Self {
            client,
            url: ingest_url(&cfg.endpoints, &cfg.dataset),
            token: cfg.token,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send the batch as one JSON array. Anything but 200 fails the batch.
    pub async fn push(&self, events: &[EnrichedEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let body = serde_json::to_vec(events).context("serializing ingest batch")?;
        let resp = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/json")
            .bearer_auth(&self.token)
            .body(body)
            .send()
            .await
            .map_err(|err| {
                error!(url = %self.url, "ingest request failed: {err}");
                err
            })
            .context("ingest request")?;

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            error!(
                url = %self.url,
                status = %status,
                "ingest rejected batch of {} events",
                events.len()
            );
            anyhow::bail!(
                "unexpected ingest status={} body_sample={}",
                status,
                truncate_body_snippet(&text, 500)
            );
        }

        info!("pushed {} events to axiom", events.len());
        Ok(())
    }
}

fn truncate_body_snippet(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}
