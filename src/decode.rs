//! Decoding of CloudWatch Logs subscription deliveries.
//!
//! The envelope is `{"awslogs": {"data": base64(gzip(json))}}`. Anything that
//! does not fit is logged and dropped; the caller returns early.

use std::io::Read;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::read::GzDecoder;
use serde_json::Value;
use tracing::warn;

use crate::types::SubscriptionPayload;

/// Decode an invocation event into a subscription payload.
pub fn payload_from_event(event: &Value) -> Option<SubscriptionPayload> {
    let Some(data) = event
        .get("awslogs")
        .and_then(|logs| logs.get("data"))
        .and_then(Value::as_str)
    else {
        warn!(event = %event, "unexpected event format");
        return None;
    };

    match decode_data(data) {
        Ok(payload) => Some(payload),
        Err(err) => {
            warn!("failed to decode awslogs data: {err:#}");
            None
        }
    }
}

/// Decode the `awslogs.data` field.
pub fn decode_data(data: &str) -> Result<SubscriptionPayload> {
    let gzipped = STANDARD.decode(data.trim()).context("base64 decode")?;
    let mut raw = String::new();
    GzDecoder::new(gzipped.as_slice())
        .read_to_string(&mut raw)
        .context("gunzip")?;
    serde_json::from_str(&raw).context("parsing subscription payload")
}
