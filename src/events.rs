//! Invocation payloads other than log deliveries.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::config::{compile_pattern, parse_names, Config};
use crate::subscription::{log_group_arn, FilterCriteria};
use crate::types::LogGroupDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Create,
    Update,
    Delete,
}

impl LifecycleAction {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeSource {
    CloudFormation,
    Terraform,
}

#[derive(Debug, Default, Deserialize)]
struct LogGroupProperties {
    #[serde(rename = "CloudWatchLogGroupNames", default)]
    names: Option<String>,
    #[serde(rename = "CloudWatchLogGroupPrefix", default)]
    prefix: Option<String>,
    #[serde(rename = "CloudWatchLogGroupPattern", default)]
    pattern: Option<String>,
}

/// A stack create/update/delete notification.
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    pub source: InvokeSource,
    pub action: LifecycleAction,
    pub names: Option<String>,
    pub prefix: Option<String>,
    pub pattern: Option<String>,
}

impl LifecycleEvent {
    /// `None` when the event is not a stack lifecycle event at all.
    pub fn from_value(event: &Value) -> Result<Option<Self>> {
        let (source, action, props) = if let Some(tf) = event.get("tf") {
            let action = tf
                .get("action")
                .and_then(Value::as_str)
                .context("terraform event without tf.action")?;
            (InvokeSource::Terraform, action, event.clone())
        } else if let Some(request_type) = event.get("RequestType") {
            let action = request_type
                .as_str()
                .context("RequestType is not a string")?;
            let props = event
                .get("ResourceProperties")
                .cloned()
                .unwrap_or(Value::Null);
            (InvokeSource::CloudFormation, action, props)
        } else {
            return Ok(None);
        };

        let action = LifecycleAction::parse(action)
            .with_context(|| format!("unknown lifecycle action {action:?}"))?;
        let props: LogGroupProperties = if props.is_null() {
            LogGroupProperties::default()
        } else {
            serde_json::from_value(props).context("parsing log group properties")?
        };

        Ok(Some(Self {
            source,
            action,
            names: props.names,
            prefix: props.prefix,
            pattern: props.pattern,
        }))
    }

    pub fn is_delete(&self) -> bool {
        self.action == LifecycleAction::Delete
    }

    /// Criteria from the event, falling back to configured values for
    /// properties the event does not carry.
    pub fn criteria(&self, cfg: &Config) -> Result<FilterCriteria> {
        let names = match self.names.as_deref() {
            Some(raw) => parse_names(raw),
            None => cfg.log_group_names.clone(),
        };
        let prefix = self.prefix.clone().or_else(|| cfg.log_group_prefix.clone());
        let pattern = match self.pattern.as_deref() {
            Some(p) => compile_pattern(Some(p))?,
            None => cfg.compiled_pattern()?,
        };
        Ok(FilterCriteria::new(names, prefix.map(|p| p.trim().to_string()), pattern))
    }
}

/// Notification that a log group was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogGroupCreated {
    pub account: String,
    pub region: String,
    pub log_group_name: String,
}

impl LogGroupCreated {
    /// `None` when the event carries no `detail`.
    pub fn from_value(event: &Value) -> Result<Option<Self>> {
        let Some(detail) = event.get("detail") else {
            return Ok(None);
        };
        let account = event
            .get("account")
            .and_then(Value::as_str)
            .context("event without account")?;
        let region = detail
            .get("awsRegion")
            .and_then(Value::as_str)
            .context("event without detail.awsRegion")?;
        let log_group_name = detail
            .pointer("/requestParameters/logGroupName")
            .and_then(Value::as_str)
            .context("event without detail.requestParameters.logGroupName")?;
        Ok(Some(Self {
            account: account.to_string(),
            region: region.to_string(),
            log_group_name: log_group_name.to_string(),
        }))
    }

    pub fn descriptor(&self) -> LogGroupDescriptor {
        LogGroupDescriptor {
            name: self.log_group_name.clone(),
            arn: log_group_arn(&self.region, &self.account, &self.log_group_name),
        }
    }
}
