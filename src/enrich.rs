use std::collections::BTreeMap;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use serde_json::Map;

use crate::classify::extract_fields;
use crate::types::{AwsFields, EnrichedEvent, LogEvent, SubscriptionPayload};

static SERVICE_GROUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/aws/(lambda|apigateway|eks|rds)/(.*)").expect("static service group pattern")
});

pub const UNKNOWN_SERVICE: &str = "unknown";

/// Top-level keys of an ingest event; structured data may not use them.
pub const RESERVED_KEYS: [&str; 3] = ["_time", "aws", "message"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceGroup {
    pub service_name: String,
    pub log_group_name: String,
}

/// Static enrichment settings shared by every event of an invocation.
#[derive(Debug, Clone, Default)]
pub struct Enricher {
    service_override: Option<String>,
    tags: BTreeMap<String, String>,
}

impl Enricher {
    pub fn new(
        service_override: Option<String>,
        tags: BTreeMap<String, String>,
    ) -> Result<Self> {
        if let Some(key) = service_override.as_deref() {
            if RESERVED_KEYS.contains(&key) {
                anyhow::bail!("DATA_MESSAGE_KEY {key:?} clashes with a top-level event key");
            }
        }
        Ok(Self {
            service_override,
            tags,
        })
    }

    /// Derive the service and the group name relative to it.
    pub fn split_log_group(&self, log_group: &str) -> ServiceGroup {
        split_log_group(log_group, self.service_override.as_deref())
    }

    pub fn aws_fields(&self, payload: &SubscriptionPayload) -> AwsFields {
        let group = payload
            .log_group
            .as_deref()
            .map(|g| self.split_log_group(g))
            .unwrap_or_else(|| ServiceGroup {
                service_name: UNKNOWN_SERVICE.to_string(),
                log_group_name: String::new(),
            });
        AwsFields {
            owner: payload.owner.clone(),
            log_group: payload.log_group.clone(),
            log_stream: payload.log_stream.clone(),
            message_type: payload.message_type.clone(),
            subscription_filters: payload.subscription_filters.clone(),
            service_name: group.service_name,
            log_group_name: group.log_group_name,
            tags: (!self.tags.is_empty()).then(|| self.tags.clone()),
        }
    }

    /// Build the ingest events for a whole delivery.
    pub fn enrich_payload(&self, payload: &SubscriptionPayload) -> Vec<EnrichedEvent> {
        let aws = self.aws_fields(payload);
        payload
            .log_events
            .iter()
            .map(|raw| enrich_event(raw, &aws))
            .collect()
    }
}

/// Wrap a single raw event. `_time` keeps the millisecond source timestamp.
pub fn enrich_event(raw: &LogEvent, aws: &AwsFields) -> EnrichedEvent {
    let mut fields = Map::new();
    if let Some(data) = extract_fields(&raw.message) {
        fields.insert(aws.service_name.clone(), data);
    }
    EnrichedEvent {
        time: raw.timestamp,
        aws: aws.clone(),
        message: raw.message.clone(),
        fields,
    }
}

pub fn split_log_group(log_group: &str, service_override: Option<&str>) -> ServiceGroup {
    match SERVICE_GROUP.captures(log_group) {
        Some(caps) => ServiceGroup {
            service_name: service_override
                .or_else(|| caps.get(1).map(|m| m.as_str()))
                .unwrap_or(UNKNOWN_SERVICE)
                .to_string(),
            log_group_name: caps
                .get(2)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        },
        None => ServiceGroup {
            service_name: service_override.unwrap_or(UNKNOWN_SERVICE).to_string(),
            log_group_name: log_group.to_string(),
        },
    }
}

/// Parse `key=value,key=value`. Pairs that do not split into exactly two
/// parts are dropped.
pub fn parse_tags(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let parts: Vec<&str> = pair.trim().split('=').collect();
            match parts.as_slice() {
                [key, value] => Some((key.to_string(), value.to_string())),
                _ => None,
            }
        })
        .collect()
}
