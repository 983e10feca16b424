//! Tests for log event enrichment.

use std::collections::BTreeMap;

use logship::enrich::{enrich_event, parse_tags, split_log_group, Enricher, UNKNOWN_SERVICE};
use logship::types::{LogEvent, SubscriptionPayload};
use serde_json::json;

fn payload(log_group: &str, messages: &[&str]) -> SubscriptionPayload {
    SubscriptionPayload {
        owner: Some("123456789012".to_string()),
        log_group: Some(log_group.to_string()),
        log_stream: Some("2024/01/15/[$LATEST]abcdef".to_string()),
        message_type: Some("DATA_MESSAGE".to_string()),
        subscription_filters: vec![format!("{log_group}-axiom")],
        log_events: messages
            .iter()
            .enumerate()
            .map(|(i, m)| LogEvent {
                id: Some(format!("id-{i}")),
                timestamp: 1_733_900_000_000 + i as i64,
                message: m.to_string(),
            })
            .collect(),
    }
}

#[test]
fn test_split_known_services() {
    for service in ["lambda", "apigateway", "eks", "rds"] {
        let group = split_log_group(&format!("/aws/{service}/my-thing/sub"), None);
        assert_eq!(group.service_name, service);
        assert_eq!(group.log_group_name, "my-thing/sub");
    }
}

#[test]
fn test_split_lambda_example() {
    let group = split_log_group("/aws/lambda/my-function", None);
    assert_eq!(group.service_name, "lambda");
    assert_eq!(group.log_group_name, "my-function");
}

#[test]
fn test_split_unknown_path() {
    let group = split_log_group("/custom/path", None);
    assert_eq!(group.service_name, UNKNOWN_SERVICE);
    assert_eq!(group.log_group_name, "/custom/path");
}

#[test]
fn test_split_unlisted_aws_service_is_unknown() {
    let group = split_log_group("/aws/ecs/cluster", None);
    assert_eq!(group.service_name, "unknown");
    assert_eq!(group.log_group_name, "/aws/ecs/cluster");
}

#[test]
fn test_split_with_override() {
    let matched = split_log_group("/aws/lambda/fn", Some("app"));
    assert_eq!(matched.service_name, "app");
    assert_eq!(matched.log_group_name, "fn");

    let unmatched = split_log_group("/custom/path", Some("app"));
    assert_eq!(unmatched.service_name, "app");
    assert_eq!(unmatched.log_group_name, "/custom/path");
}

#[test]
fn test_parse_tags_drops_malformed_pairs() {
    let tags = parse_tags("env=prod, team = core ,broken,a=b=c,region=eu");
    let expected: BTreeMap<String, String> = [
        ("env".to_string(), "prod".to_string()),
        ("team ".to_string(), " core".to_string()),
        ("region".to_string(), "eu".to_string()),
    ]
    .into_iter()
    .collect();
    assert_eq!(tags, expected);
}

#[test]
fn test_parse_tags_empty() {
    assert!(parse_tags("").is_empty());
}

#[test]
fn test_enrich_payload_keeps_millisecond_time() {
    let enricher = Enricher::default();
    let events = enricher.enrich_payload(&payload("/aws/lambda/fn", &["hello", "world"]));
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].time, 1_733_900_000_000);
    assert_eq!(events[1].time, 1_733_900_000_001);
    assert_eq!(events[0].message, "hello");
}

#[test]
fn test_enrich_sets_aws_fields() {
    let enricher = Enricher::default();
    let events = enricher.enrich_payload(&payload("/aws/lambda/fn", &["hello"]));
    let aws = &events[0].aws;
    assert_eq!(aws.owner.as_deref(), Some("123456789012"));
    assert_eq!(aws.log_group.as_deref(), Some("/aws/lambda/fn"));
    assert_eq!(aws.message_type.as_deref(), Some("DATA_MESSAGE"));
    assert_eq!(aws.subscription_filters, vec!["/aws/lambda/fn-axiom"]);
    assert_eq!(aws.service_name, "lambda");
    assert_eq!(aws.log_group_name, "fn");
    assert!(aws.tags.is_none());
}

#[test]
fn test_enrich_attaches_tags() {
    let enricher = Enricher::new(None, parse_tags("env=prod")).unwrap();
    let events = enricher.enrich_payload(&payload("/aws/lambda/fn", &["hello"]));
    let tags = events[0].aws.tags.as_ref().unwrap();
    assert_eq!(tags.get("env").map(String::as_str), Some("prod"));
}

#[test]
fn test_plain_message_has_no_service_data() {
    let enricher = Enricher::default();
    let events = enricher.enrich_payload(&payload("/aws/lambda/fn", &["plain text"]));
    assert!(events[0].service_data().is_none());
    assert!(events[0].fields.is_empty());
}

#[test]
fn test_report_message_lands_under_service_key() {
    let enricher = Enricher::default();
    let events = enricher.enrich_payload(&payload(
        "/aws/lambda/fn",
        &["REPORT RequestId: abc-123 Duration: 0.47 ms Billed Duration: 100 ms Memory Size: 128 MB Max Memory Used: 20 MB"],
    ));
    let data = events[0].service_data().unwrap();
    assert_eq!(data["requestID"], "abc-123");
    assert_eq!(data["billedDurationMS"], 100);
}

#[test]
fn test_json_message_lands_under_override_key() {
    let enricher = Enricher::new(Some("app".to_string()), BTreeMap::new()).unwrap();
    let events = enricher.enrich_payload(&payload("/custom/path", &[r#"{"level":"warn"}"#]));
    assert_eq!(events[0].aws.service_name, "app");
    assert_eq!(events[0].fields.get("app"), Some(&json!({"level": "warn"})));
}

#[test]
fn test_missing_log_group_defaults_to_unknown() {
    let enricher = Enricher::default();
    let mut p = payload("/ignored", &["x"]);
    p.log_group = None;
    let aws = enricher.aws_fields(&p);
    assert_eq!(aws.service_name, "unknown");
    assert_eq!(aws.log_group_name, "");
}

#[test]
fn test_enrich_event_serializes_service_key_at_top_level() {
    let enricher = Enricher::default();
    let p = payload("/aws/eks/cluster", &["END RequestId: r-1"]);
    let aws = enricher.aws_fields(&p);
    let event = enrich_event(&p.log_events[0], &aws);
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["_time"], 1_733_900_000_000_i64);
    assert_eq!(value["eks"], json!({"requestID": "r-1"}));
    assert_eq!(value["aws"]["serviceName"], "eks");
    assert_eq!(value["aws"]["logGroupName"], "cluster");
}

#[test]
fn test_reserved_service_key_is_rejected() {
    for key in ["message", "aws", "_time"] {
        assert!(Enricher::new(Some(key.to_string()), BTreeMap::new()).is_err());
    }
}

#[test]
fn test_override_serializes_to_unique_keys() {
    let enricher = Enricher::new(Some("payload".to_string()), BTreeMap::new()).unwrap();
    let events = enricher.enrich_payload(&payload("/custom/path", &[r#"{"a":1}"#]));
    let body = serde_json::to_string(&events).unwrap();
    let decoded: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(decoded[0]["message"], r#"{"a":1}"#);
    assert_eq!(decoded[0]["payload"], json!({"a": 1}));
}
