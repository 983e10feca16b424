use std::collections::BTreeMap;
use std::{env, fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use regex::Regex;
use serde::Deserialize;

use crate::enrich::{parse_tags, Enricher};
use crate::ingest::IngestConfig;
use crate::ingest_url::{normalize_base_url, Endpoints, DEFAULT_AXIOM_URL};

/// Maximum page size accepted by DescribeLogGroups.
pub const MAX_LOG_GROUPS_LIMIT: i32 = 50;

#[derive(Debug, Clone)]
pub struct Config {
    pub axiom_url: String,
    pub axiom_token: Option<String>,
    pub axiom_dataset: Option<String>,
    pub edge_url: Option<String>,
    pub edge_region: Option<String>,
    pub data_tags: BTreeMap<String, String>,
    pub service_name: Option<String>,
    pub forwarder_arn: Option<String>,
    pub function_name: Option<String>,
    pub log_group_names: Vec<String>,
    pub log_group_prefix: Option<String>,
    pub log_group_pattern: Option<String>,
    pub log_groups_limit: i32,
    /// Unset means no client timeout; the invocation deadline still applies.
    pub http_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    axiom_url: Option<String>,
    axiom_token: Option<String>,
    axiom_dataset: Option<String>,
    edge_url: Option<String>,
    edge_region: Option<String>,
    data_tags: Option<String>,
    service_name: Option<String>,
    forwarder_arn: Option<String>,
    function_name: Option<String>,
    log_group_names: Vec<String>,
    log_group_prefix: Option<String>,
    log_group_pattern: Option<String>,
    log_groups_limit: Option<i32>,
    http_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            axiom_url: DEFAULT_AXIOM_URL.to_string(),
            axiom_token: None,
            axiom_dataset: None,
            edge_url: None,
            edge_region: None,
            data_tags: BTreeMap::new(),
            service_name: None,
            forwarder_arn: None,
            function_name: None,
            log_group_names: Vec::new(),
            log_group_prefix: None,
            log_group_pattern: None,
            log_groups_limit: MAX_LOG_GROUPS_LIMIT,
            http_timeout_secs: None,
        }
    }
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        let defaults = Config::default();
        Self {
            axiom_url: non_empty(raw.axiom_url)
                .map(|u| normalize_base_url(&u))
                .unwrap_or(defaults.axiom_url),
            axiom_token: non_empty(raw.axiom_token),
            axiom_dataset: non_empty(raw.axiom_dataset),
            edge_url: non_empty(raw.edge_url).map(|u| normalize_base_url(&u)),
            edge_region: non_empty(raw.edge_region),
            data_tags: raw.data_tags.as_deref().map(parse_tags).unwrap_or_default(),
            service_name: non_empty(raw.service_name),
            forwarder_arn: non_empty(raw.forwarder_arn),
            function_name: non_empty(raw.function_name),
            log_group_names: collect_names(raw.log_group_names),
            log_group_prefix: non_empty(raw.log_group_prefix),
            log_group_pattern: non_empty(raw.log_group_pattern),
            log_groups_limit: clamp_limit(
                raw.log_groups_limit.unwrap_or(defaults.log_groups_limit),
            ),
            http_timeout_secs: raw.http_timeout_secs.filter(|secs| *secs > 0),
        }
    }
}

impl Config {
    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = path.or_else(|| env::var("LOGSHIP_CONFIG").ok().map(PathBuf::from));
        let cfg = match path {
            Some(path) => Self::from_file(&path)?,
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        let cfg = cfg.with_overrides(|key| env::var(key).ok());
        cfg.enricher()?;
        Ok(cfg)
    }

    /// Defaults plus overrides from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::default().with_overrides(lookup)
    }

    fn from_file(path: &std::path::Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let parsed: RawConfig = toml::from_str(&raw).context("parsing config")?;
        Ok(Config::from(parsed))
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| non_empty(lookup(key));

        if let Some(v) = get("AXIOM_URL") {
            self.axiom_url = normalize_base_url(&v);
        }
        maybe_set(&mut self.axiom_token, get("AXIOM_TOKEN"));
        maybe_set(&mut self.axiom_dataset, get("AXIOM_DATASET"));
        maybe_set(
            &mut self.edge_url,
            get("AXIOM_EDGE_URL").map(|u| normalize_base_url(&u)),
        );
        maybe_set(&mut self.edge_region, get("AXIOM_EDGE_REGION"));
        if let Some(v) = get("DATA_TAGS") {
            self.data_tags = parse_tags(&v);
        }
        maybe_set(&mut self.service_name, get("DATA_MESSAGE_KEY"));
        maybe_set(
            &mut self.forwarder_arn,
            get("AXIOM_CLOUDWATCH_FORWARDER_LAMBDA_ARN"),
        );
        maybe_set(&mut self.function_name, get("AWS_LAMBDA_FUNCTION_NAME"));
        if let Some(v) = get("LOG_GROUP_NAMES") {
            self.log_group_names = parse_names(&v);
        }
        maybe_set(&mut self.log_group_prefix, get("LOG_GROUP_PREFIX"));
        maybe_set(&mut self.log_group_pattern, get("LOG_GROUP_PATTERN"));
        if let Some(n) = get("LOG_GROUPS_LIMIT").and_then(|v| v.parse::<i32>().ok()) {
            self.log_groups_limit = clamp_limit(n);
        }
        if let Some(n) = get("HTTP_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
            self.http_timeout_secs = (n > 0).then_some(n);
        }
        self
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            base_url: self.axiom_url.clone(),
            edge_url: self.edge_url.clone(),
            edge_region: self.edge_region.clone(),
        }
    }

    pub fn enricher(&self) -> Result<Enricher> {
        Enricher::new(self.service_name.clone(), self.data_tags.clone())
    }

    /// Ingest settings; token and dataset are mandatory.
    pub fn ingest_config(&self) -> Result<IngestConfig> {
        let token = self
            .axiom_token
            .clone()
            .ok_or_else(|| anyhow::anyhow!("AXIOM_TOKEN is not set"))?;
        let dataset = self
            .axiom_dataset
            .clone()
            .ok_or_else(|| anyhow::anyhow!("AXIOM_DATASET is not set"))?;
        Ok(IngestConfig {
            endpoints: self.endpoints(),
            token,
            dataset,
            timeout: self.http_timeout(),
        })
    }

    pub fn require_forwarder_arn(&self) -> Result<&str> {
        match self.forwarder_arn.as_deref() {
            Some(arn) => Ok(arn),
            None => anyhow::bail!("AXIOM_CLOUDWATCH_FORWARDER_LAMBDA_ARN is not set"),
        }
    }

    pub fn compiled_pattern(&self) -> Result<Option<Regex>> {
        compile_pattern(self.log_group_pattern.as_deref())
    }
}

/// Compile a log group pattern anchored at the start of the name.
pub fn compile_pattern(pattern: Option<&str>) -> Result<Option<Regex>> {
    match pattern.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => Regex::new(&format!("^(?:{p})"))
            .map(Some)
            .with_context(|| format!("invalid log group pattern {p:?}")),
        None => Ok(None),
    }
}

/// Split a comma separated list of log group names.
pub fn parse_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_config_path() -> PathBuf {
    ProjectDirs::from("co", "axiom", "logship")
        .map(|p| p.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from(".logship/config.toml"))
}

fn clamp_limit(n: i32) -> i32 {
    n.clamp(1, MAX_LOG_GROUPS_LIMIT)
}

fn maybe_set(slot: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *slot = value;
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn collect_names(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}
