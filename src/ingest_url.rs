//! Ingest endpoint selection.
//!
//! Precedence: edge URL (verbatim when it carries a path), edge region,
//! then the API base URL.

use url::Url;

pub const DEFAULT_AXIOM_URL: &str = "https://api.axiom.co";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoints {
    pub base_url: String,
    pub edge_url: Option<String>,
    pub edge_region: Option<String>,
}

pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// True when the URL has a path beyond `/`.
pub fn has_path(raw: &str) -> bool {
    match Url::parse(raw.trim()) {
        Ok(url) => !matches!(url.path(), "" | "/"),
        Err(_) => false,
    }
}

pub fn ingest_url(endpoints: &Endpoints, dataset: &str) -> String {
    if let Some(edge_url) = endpoints.edge_url.as_deref().map(str::trim) {
        if !edge_url.is_empty() {
            if has_path(edge_url) {
                return edge_url.to_string();
            }
            return format!("{}/v1/ingest/{}", normalize_base_url(edge_url), dataset);
        }
    }
    if let Some(region) = endpoints.edge_region.as_deref().map(str::trim) {
        if !region.is_empty() {
            return format!(
                "https://{}/v1/ingest/{}",
                region.trim_end_matches('/'),
                dataset
            );
        }
    }
    let base = if endpoints.base_url.trim().is_empty() {
        DEFAULT_AXIOM_URL.to_string()
    } else {
        normalize_base_url(&endpoints.base_url)
    };
    format!("{}/v1/datasets/{}/ingest", base, dataset)
}
