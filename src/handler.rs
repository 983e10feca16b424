//! Entry points for the four Lambda roles.

use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::cloud::{LogsApi, PermissionsApi};
use crate::config::Config;
use crate::decode::payload_from_event;
use crate::events::{LifecycleEvent, LogGroupCreated};
use crate::ingest::IngestClient;
use crate::subscription::{Creation, FilterCriteria, SubscriptionManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Forwarder,
    Subscriber,
    Unsubscriber,
    Listener,
}

impl FromStr for HandlerKind {
    type Err = anyhow::Error;

    /// Accepts a bare role or a `module.function` handler string whose
    /// module names the role.
    fn from_str(raw: &str) -> Result<Self> {
        let role = raw.trim().split('.').next().unwrap_or_default();
        match role.to_ascii_lowercase().as_str() {
            "forwarder" => Ok(Self::Forwarder),
            "subscriber" => Ok(Self::Subscriber),
            "unsubscriber" => Ok(Self::Unsubscriber),
            "listener" => Ok(Self::Listener),
            other => anyhow::bail!("unknown handler {other:?}"),
        }
    }
}

/// Shared clients for the lifetime of the execution environment.
pub struct Handlers<L, P> {
    pub config: Config,
    pub logs: L,
    pub permissions: P,
    ingest: OnceLock<IngestClient>,
}

impl<L, P> Handlers<L, P>
where
    L: LogsApi + Sync,
    P: PermissionsApi + Sync,
{
    pub fn new(config: Config, logs: L, permissions: P) -> Self {
        Self {
            config,
            logs,
            permissions,
            ingest: OnceLock::new(),
        }
    }

    /// Ingest client, built on first use and kept for warm invocations.
    pub fn ingest_client(&self) -> Result<&IngestClient> {
        if let Some(client) = self.ingest.get() {
            return Ok(client);
        }
        let client = IngestClient::new(self.config.ingest_config()?)?;
        Ok(self.ingest.get_or_init(|| client))
    }

    pub async fn handle(&self, kind: HandlerKind, event: Value) -> Result<Value> {
        match kind {
            HandlerKind::Forwarder => self.forwarder(event).await,
            HandlerKind::Subscriber => self.subscriber(event).await,
            HandlerKind::Unsubscriber => self.unsubscriber(event).await,
            HandlerKind::Listener => self.listener(event).await,
        }
    }

    fn manager(&self, forwarder_arn: &str) -> SubscriptionManager<'_, L, P> {
        SubscriptionManager::new(
            &self.logs,
            &self.permissions,
            forwarder_arn,
            self.config.log_groups_limit,
        )
    }

    /// Decode, enrich and push one delivery. A stack delete removes the
    /// filters that still point at this function.
    pub async fn forwarder(&self, event: Value) -> Result<Value> {
        if let Some(lifecycle) = LifecycleEvent::from_value(&event)? {
            if lifecycle.is_delete() {
                return self.teardown().await;
            }
            return Ok(json!({ "success": true }));
        }

        let ingest = self.ingest_client()?;
        let enricher = self.config.enricher()?;

        let Some(payload) = payload_from_event(&event) else {
            return Ok(json!({ "success": true, "events": 0 }));
        };

        let events = enricher.enrich_payload(&payload);
        info!(
            log_group = payload.log_group.as_deref().unwrap_or_default(),
            count = events.len(),
            "forwarding events"
        );
        ingest
            .push(&events)
            .await
            .context("pushing events to axiom")?;
        Ok(json!({ "success": true, "events": events.len() }))
    }

    async fn teardown(&self) -> Result<Value> {
        let arn = match self.config.forwarder_arn.clone() {
            Some(arn) => arn,
            None => {
                let name = self
                    .config
                    .function_name
                    .as_deref()
                    .context("AWS_LAMBDA_FUNCTION_NAME is not set")?;
                self.permissions
                    .function_arn(name)
                    .await
                    .context("resolving forwarder arn")?
            }
        };
        let report = self
            .manager(&arn)
            .remove_filters_targeting(&arn)
            .await
            .context("listing log groups")?;
        info!(
            removed = report.removed_groups.len(),
            "removed subscription filters targeting {arn}"
        );
        Ok(json!({ "success": true, "report": report }))
    }

    pub async fn subscriber(&self, event: Value) -> Result<Value> {
        let lifecycle = LifecycleEvent::from_value(&event)?
            .context("unknown source of invocation")?;
        let arn = self.config.require_forwarder_arn()?;
        let criteria = lifecycle.criteria(&self.config)?;
        let manager = self.manager(arn);
        let groups = manager.matching_groups(&criteria).await?;

        let report = if lifecycle.is_delete() {
            manager.unsubscribe_all(&groups).await
        } else {
            manager.subscribe_all(&groups).await
        };
        info!(report = ?report, "subscriber finished");
        Ok(json!({ "success": !report.limit_reached, "report": report }))
    }

    pub async fn unsubscriber(&self, event: Value) -> Result<Value> {
        let arn = self.config.require_forwarder_arn()?;
        let criteria = match LifecycleEvent::from_value(&event)? {
            Some(lifecycle) => lifecycle.criteria(&self.config)?,
            None => FilterCriteria::new(
                self.config.log_group_names.clone(),
                self.config.log_group_prefix.clone(),
                self.config.compiled_pattern()?,
            ),
        };
        let manager = self.manager(arn);
        let groups = manager.matching_groups(&criteria).await?;
        let report = manager.unsubscribe_all(&groups).await;
        Ok(json!({ "success": true, "report": report }))
    }

    /// Subscribe a newly created log group when it matches the prefix.
    pub async fn listener(&self, event: Value) -> Result<Value> {
        let Some(created) = LogGroupCreated::from_value(&event)? else {
            return Ok(json!({ "success": true, "subscribed": false }));
        };
        let arn = self.config.require_forwarder_arn()?;

        let prefix = self.config.log_group_prefix.as_deref().unwrap_or_default();
        if !created.log_group_name.starts_with(prefix) {
            warn!(
                log_group = %created.log_group_name,
                prefix,
                "log group did not match the prefix"
            );
            return Ok(json!({ "success": true, "subscribed": false }));
        }

        let creation = self
            .manager(arn)
            .create_subscription(&created.descriptor())
            .await
            .with_context(|| {
                format!("creating subscription filter for {}", created.log_group_name)
            })?;
        Ok(json!({
            "success": true,
            "subscribed": creation == Creation::Subscribed,
        }))
    }
}
