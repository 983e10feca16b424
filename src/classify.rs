//! Recognition of Lambda runtime lines and JSON messages.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::Value;

// START RequestId: b3be449c-8bd7-11e7-bb30-4f271af95c46 Version: $LATEST
static START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^START RequestId:\s+(?P<request_id>\S+)\s+Version: (?P<version>\S+)")
        .expect("static START pattern")
});

// END RequestId: b3be449c-8bd7-11e7-bb30-4f271af95c46
static END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^END RequestId:\s+(?P<request_id>\S+)").expect("static END pattern")
});

// REPORT RequestId: b3be449c-8bd7-11e7-bb30-4f271af95c46 Duration: 0.47 ms
// Billed Duration: 100 ms Memory Size: 128 MB Max Memory Used: 20 MB
static REPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^REPORT RequestId:\s+(?P<request_id>\S+)\s+",
        r"Duration: (?P<duration>\S+) ms\s+",
        r"Billed Duration: (?P<billed>\S+) ms\s+",
        r"Memory Size: (?P<memory>\S+) MB\s+",
        r"Max Memory Used: (?P<max_memory>\S+) MB",
    ))
    .expect("static REPORT pattern")
});

// 2017-08-29T12:00:00.000Z b3be449c-8bd7-11e7-bb30-4f271af95c46 ...
static STD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d\d\d\d-\d\d-\d\d\S+\s+(?P<request_id>\S+)").expect("static std pattern")
});

/// Fields extracted from a Lambda runtime line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParsedFields {
    Report {
        #[serde(rename = "requestID")]
        request_id: String,
        #[serde(rename = "durationMS")]
        duration_ms: f64,
        #[serde(rename = "billedDurationMS")]
        billed_duration_ms: i64,
        #[serde(rename = "memorySizeMB")]
        memory_size_mb: i64,
        #[serde(rename = "maxMemoryMB")]
        max_memory_mb: i64,
    },
    Start {
        #[serde(rename = "requestID")]
        request_id: String,
        version: String,
    },
    End {
        #[serde(rename = "requestID")]
        request_id: String,
    },
    Std {
        #[serde(rename = "requestID")]
        request_id: String,
    },
}

impl ParsedFields {
    pub fn request_id(&self) -> &str {
        match self {
            ParsedFields::Report { request_id, .. }
            | ParsedFields::Start { request_id, .. }
            | ParsedFields::End { request_id }
            | ParsedFields::Std { request_id } => request_id,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Classify a raw message by its literal prefix. `None` means the line is
/// unstructured text.
pub fn parse_message(message: &str) -> Option<ParsedFields> {
    if message.starts_with("REPORT") {
        REPORT.captures(message).and_then(|caps| parse_report(&caps))
    } else if message.starts_with("END") {
        END.captures(message).map(|caps| ParsedFields::End {
            request_id: capture(&caps, "request_id"),
        })
    } else if message.starts_with("START") {
        START.captures(message).map(|caps| ParsedFields::Start {
            request_id: capture(&caps, "request_id"),
            version: capture(&caps, "version"),
        })
    } else {
        STD.captures(message).map(|caps| ParsedFields::Std {
            request_id: capture(&caps, "request_id"),
        })
    }
}

fn parse_report(caps: &Captures<'_>) -> Option<ParsedFields> {
    Some(ParsedFields::Report {
        request_id: capture(caps, "request_id"),
        duration_ms: caps.name("duration")?.as_str().parse().ok()?,
        billed_duration_ms: caps.name("billed")?.as_str().parse().ok()?,
        memory_size_mb: caps.name("memory")?.as_str().parse().ok()?,
        max_memory_mb: caps.name("max_memory")?.as_str().parse().ok()?,
    })
}

fn capture(caps: &Captures<'_>, name: &str) -> String {
    caps.name(name)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Parse a message as JSON when it looks like an object literal.
pub fn structured_message(message: &str) -> Option<Value> {
    let trimmed = message.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

/// Structured data for a message: JSON first, runtime line second.
pub fn extract_fields(message: &str) -> Option<Value> {
    structured_message(message).or_else(|| parse_message(message).map(|f| f.to_value()))
}
