//! Logship - CloudWatch Logs to Axiom forwarding and subscription management.

pub mod classify;
pub mod cloud;
pub mod config;
pub mod decode;
pub mod enrich;
pub mod events;
pub mod handler;
pub mod ingest;
pub mod ingest_url;
pub mod subscription;
pub mod types;
