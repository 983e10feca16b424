use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One line from a CloudWatch log stream. `timestamp` is epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub timestamp: i64,
    pub message: String,
}

/// Decoded body of a CloudWatch Logs subscription delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPayload {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub log_group: Option<String>,
    #[serde(default)]
    pub log_stream: Option<String>,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub subscription_filters: Vec<String>,
    #[serde(default)]
    pub log_events: Vec<LogEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsFields {
    pub owner: Option<String>,
    pub log_group: Option<String>,
    pub log_stream: Option<String>,
    pub message_type: Option<String>,
    pub subscription_filters: Vec<String>,
    pub service_name: String,
    pub log_group_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

/// Unit sent to the ingest API.
///
/// Structured data extracted from the message lives under a key named after
/// the service (`lambda`, `eks`, ...), which lands in `fields` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedEvent {
    #[serde(rename = "_time")]
    pub time: i64,
    pub aws: AwsFields,
    pub message: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EnrichedEvent {
    /// Structured data attached under the event's service key, if any.
    pub fn service_data(&self) -> Option<&Value> {
        self.fields.get(&self.aws.service_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogGroupDescriptor {
    pub name: String,
    pub arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionFilterDescriptor {
    pub filter_name: String,
    pub destination_arn: String,
}
