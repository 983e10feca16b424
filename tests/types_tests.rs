//! Tests for core types.

use logship::types::{AwsFields, EnrichedEvent, LogEvent, SubscriptionPayload};
use serde_json::{json, Map};

fn aws_fields(service: &str) -> AwsFields {
    AwsFields {
        owner: Some("123456789012".to_string()),
        log_group: Some("/aws/lambda/fn".to_string()),
        log_stream: Some("stream".to_string()),
        message_type: Some("DATA_MESSAGE".to_string()),
        subscription_filters: vec!["f".to_string()],
        service_name: service.to_string(),
        log_group_name: "fn".to_string(),
        tags: None,
    }
}

#[test]
fn test_log_event_without_id() {
    let parsed: LogEvent =
        serde_json::from_str(r#"{"timestamp": 1733900000000, "message": "hi"}"#).unwrap();
    assert!(parsed.id.is_none());
    assert_eq!(parsed.timestamp, 1_733_900_000_000);

    let json = serde_json::to_string(&parsed).unwrap();
    assert!(!json.contains("\"id\""));
}

#[test]
fn test_payload_uses_camel_case() {
    let payload: SubscriptionPayload = serde_json::from_value(json!({
        "owner": "o",
        "logGroup": "/g",
        "logStream": "s",
        "messageType": "DATA_MESSAGE",
        "subscriptionFilters": ["a", "b"],
        "logEvents": []
    }))
    .unwrap();
    assert_eq!(payload.log_stream.as_deref(), Some("s"));
    assert_eq!(payload.subscription_filters, vec!["a", "b"]);
}

#[test]
fn test_aws_fields_skip_empty_tags() {
    let value = serde_json::to_value(aws_fields("lambda")).unwrap();
    assert!(value.get("tags").is_none());
    assert_eq!(value["logGroup"], "/aws/lambda/fn");
    assert_eq!(value["subscriptionFilters"], json!(["f"]));
}

#[test]
fn test_batch_round_trip_keeps_time_and_message() {
    let events: Vec<EnrichedEvent> = (0..25)
        .map(|i| {
            let mut fields = Map::new();
            if i % 2 == 0 {
                fields.insert("lambda".to_string(), json!({"requestID": format!("r-{i}")}));
            }
            EnrichedEvent {
                time: 1_733_900_000_000 + i,
                aws: aws_fields("lambda"),
                message: format!("message {i}"),
                fields,
            }
        })
        .collect();

    let body = serde_json::to_string(&events).unwrap();
    let decoded: Vec<EnrichedEvent> = serde_json::from_str(&body).unwrap();

    assert_eq!(decoded.len(), events.len());
    for (before, after) in events.iter().zip(&decoded) {
        assert_eq!(before.time, after.time);
        assert_eq!(before.message, after.message);
        assert_eq!(before.service_data(), after.service_data());
    }
}

#[test]
fn test_enriched_event_wire_shape() {
    let mut fields = Map::new();
    fields.insert("lambda".to_string(), json!({"requestID": "r"}));
    let event = EnrichedEvent {
        time: 5,
        aws: aws_fields("lambda"),
        message: "m".to_string(),
        fields,
    };
    let value = serde_json::to_value(&event).unwrap();
    let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 4);
    assert_eq!(value["_time"], 5);
    assert_eq!(value["lambda"]["requestID"], "r");
}
