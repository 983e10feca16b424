//! Log group subscription management.
//!
//! Every mutation is keyed by a deterministic name (filter `{group}-axiom`,
//! statement `invoke-permission-for-{slug}-{digest}`), so repeating a run
//! converges on the same topology instead of duplicating it.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::cloud::{CloudApiError, FilterSpec, LogsApi, PermissionGrant, PermissionsApi};
use crate::types::LogGroupDescriptor;

/// Namespace of the forwarder's own log groups.
pub const FORWARDER_NAMESPACE: &str = "/aws/axiom/";
const STATEMENT_ID_PREFIX: &str = "invoke-permission-for-";
const STATEMENT_ID_MAX_LEN: usize = 100;
const STATEMENT_ID_HASH_LEN: usize = 16;

#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    pub names: Option<BTreeSet<String>>,
    pub prefix: Option<String>,
    pub pattern: Option<Regex>,
}

impl FilterCriteria {
    pub fn new(names: Vec<String>, prefix: Option<String>, pattern: Option<Regex>) -> Self {
        let names: BTreeSet<String> = names
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        Self {
            names: (!names.is_empty()).then_some(names),
            prefix: prefix.filter(|p| !p.is_empty()),
            pattern,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_none() && self.prefix.is_none() && self.pattern.is_none()
    }

    /// Any matching criterion includes the group; no criteria includes all.
    pub fn matches(&self, name: &str) -> bool {
        if self.is_empty() {
            return true;
        }
        self.names.as_ref().is_some_and(|n| n.contains(name))
            || self.prefix.as_deref().is_some_and(|p| name.starts_with(p))
            || self.pattern.as_ref().is_some_and(|re| re.is_match(name))
    }
}

pub fn filter_groups(
    all: Vec<LogGroupDescriptor>,
    criteria: &FilterCriteria,
) -> Vec<LogGroupDescriptor> {
    all.into_iter()
        .map(|g| LogGroupDescriptor {
            name: g.name.trim().to_string(),
            arn: g.arn,
        })
        .filter(|g| criteria.matches(&g.name))
        .collect()
}

pub fn filter_name(log_group_name: &str) -> String {
    format!("{log_group_name}-axiom")
}

/// Statement id for the invoke grant of one log group: a readable slug of
/// the name followed by a digest of the full name.
pub fn statement_id(log_group_name: &str) -> String {
    let mut slug: String = log_group_name
        .trim_start_matches('/')
        .chars()
        .map(|c| match c {
            '/' => '-',
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => c,
            _ => '_',
        })
        .collect();
    let max_slug = STATEMENT_ID_MAX_LEN - STATEMENT_ID_PREFIX.len() - STATEMENT_ID_HASH_LEN - 1;
    slug.truncate(max_slug);

    let digest = hex::encode(Sha256::digest(log_group_name.as_bytes()));
    format!(
        "{STATEMENT_ID_PREFIX}{slug}-{}",
        &digest[..STATEMENT_ID_HASH_LEN]
    )
}

/// `arn:aws:lambda:region:account:function:name` → `name`.
pub fn function_name_from_arn(arn: &str) -> &str {
    arn.rsplit(':').next().unwrap_or(arn)
}

pub fn log_group_arn(region: &str, account: &str, log_group_name: &str) -> String {
    format!("arn:aws:logs:{region}:{account}:log-group:{log_group_name}:*")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    AlreadyAbsent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Creation {
    Subscribed,
    SkippedOwnGroup,
}

/// Result of a delete: both halves are attempted independently.
#[derive(Debug)]
pub struct DeleteOutcome {
    pub filter: Result<Removal, CloudApiError>,
    pub permission: Result<Removal, CloudApiError>,
}

impl DeleteOutcome {
    pub fn errors(&self) -> Vec<String> {
        [&self.filter, &self.permission]
            .into_iter()
            .filter_map(|r| r.as_ref().err().map(ToString::to_string))
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SubscriptionReport {
    pub log_groups_count: usize,
    pub matched_log_groups: Vec<String>,
    pub added_groups: Vec<String>,
    pub added_groups_count: usize,
    pub removed_groups: Vec<String>,
    pub errors: BTreeMap<String, Vec<String>>,
    pub limit_reached: bool,
}

pub struct SubscriptionManager<'a, L, P> {
    logs: &'a L,
    permissions: &'a P,
    forwarder_arn: String,
    page_size: i32,
}

impl<'a, L, P> SubscriptionManager<'a, L, P>
where
    L: LogsApi + Sync,
    P: PermissionsApi + Sync,
{
    pub fn new(
        logs: &'a L,
        permissions: &'a P,
        forwarder_arn: impl Into<String>,
        page_size: i32,
    ) -> Self {
        Self {
            logs,
            permissions,
            forwarder_arn: forwarder_arn.into(),
            page_size,
        }
    }

    /// Log group of the forwarder function itself.
    pub fn forwarder_log_group(&self) -> String {
        format!("/aws/lambda/{}", function_name_from_arn(&self.forwarder_arn))
    }

    pub fn is_own_group(&self, name: &str) -> bool {
        name.starts_with(FORWARDER_NAMESPACE) || name == self.forwarder_log_group()
    }

    pub async fn list_log_groups(
        &self,
        prefix: Option<&str>,
    ) -> Result<Vec<LogGroupDescriptor>, CloudApiError> {
        let mut all = Vec::new();
        let mut next_token = None;
        loop {
            let page = self
                .logs
                .describe_log_groups(prefix, self.page_size, next_token)
                .await?;
            debug!(count = page.groups.len(), "describe_log_groups page");
            all.extend(page.groups);
            next_token = page.next_token;
            if next_token.is_none() {
                break;
            }
        }
        Ok(all)
    }

    pub async fn matching_groups(
        &self,
        criteria: &FilterCriteria,
    ) -> Result<Vec<LogGroupDescriptor>, CloudApiError> {
        let all = self.list_log_groups(None).await?;
        let groups = filter_groups(all, criteria);
        info!("found {} log groups that match the criteria", groups.len());
        Ok(groups)
    }

    pub async fn ensure_permission_absent(
        &self,
        log_group_name: &str,
    ) -> Result<Removal, CloudApiError> {
        let id = statement_id(log_group_name);
        match self.permissions.remove_permission(&self.forwarder_arn, &id).await {
            Ok(()) => Ok(Removal::Removed),
            Err(err) if err.is_not_found() => Ok(Removal::AlreadyAbsent),
            Err(err) => Err(err),
        }
    }

    pub async fn ensure_permission_present(
        &self,
        group: &LogGroupDescriptor,
    ) -> Result<(), CloudApiError> {
        let grant = PermissionGrant {
            function_arn: self.forwarder_arn.clone(),
            statement_id: statement_id(&group.name),
            source_arn: group.arn.clone(),
        };
        match self.permissions.add_permission(&grant).await {
            Ok(()) | Err(CloudApiError::Conflict(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub async fn ensure_filter_absent(
        &self,
        log_group_name: &str,
    ) -> Result<Removal, CloudApiError> {
        match self
            .logs
            .delete_subscription_filter(log_group_name, &filter_name(log_group_name))
            .await
        {
            Ok(()) => Ok(Removal::Removed),
            Err(err) if err.is_not_found() => Ok(Removal::AlreadyAbsent),
            Err(err) => Err(err),
        }
    }

    pub async fn ensure_filter_present(&self, log_group_name: &str) -> Result<(), CloudApiError> {
        let spec = FilterSpec {
            log_group_name: log_group_name.to_string(),
            filter_name: filter_name(log_group_name),
            filter_pattern: String::new(),
            destination_arn: self.forwarder_arn.clone(),
        };
        self.logs.put_subscription_filter(&spec).await
    }

    /// Grant invoke permission for the group and install its filter.
    pub async fn create_subscription(
        &self,
        group: &LogGroupDescriptor,
    ) -> Result<Creation, CloudApiError> {
        if self.is_own_group(&group.name) {
            debug!(log_group = %group.name, "skipping forwarder log group");
            return Ok(Creation::SkippedOwnGroup);
        }
        info!(log_group = %group.name, "creating subscription filter");
        // An existing grant is left in place; the statement id is derived
        // from the group name, which also determines the source ARN.
        self.ensure_permission_present(group).await?;
        self.ensure_filter_present(&group.name).await?;
        info!(log_group = %group.name, "subscription filter created");
        Ok(Creation::Subscribed)
    }

    pub async fn delete_subscription(&self, group: &LogGroupDescriptor) -> DeleteOutcome {
        info!(log_group = %group.name, "deleting subscription filter");
        let filter = self.ensure_filter_absent(&group.name).await;
        if let Err(err) = &filter {
            error!(log_group = %group.name, "failed to delete subscription filter: {err}");
        }
        let permission = self.ensure_permission_absent(&group.name).await;
        if let Err(err) = &permission {
            warn!(log_group = %group.name, "failed to remove invoke permission: {err}");
        }
        DeleteOutcome { filter, permission }
    }

    /// Subscribe every group in order. A capacity limit stops the batch.
    pub async fn subscribe_all(&self, groups: &[LogGroupDescriptor]) -> SubscriptionReport {
        let mut report = SubscriptionReport {
            log_groups_count: groups.len(),
            ..Default::default()
        };

        for group in groups {
            if self.is_own_group(&group.name) {
                continue;
            }
            report.matched_log_groups.push(group.name.clone());
            let errors = report.errors.entry(group.name.clone()).or_default();

            match self.create_subscription(group).await {
                Ok(Creation::Subscribed) => {
                    report.added_groups.push(group.name.clone());
                    report.added_groups_count += 1;
                }
                Ok(Creation::SkippedOwnGroup) => {}
                Err(err) if err.is_limit_exceeded() => {
                    errors.push(err.to_string());
                    error!(
                        log_group = %group.name,
                        "cannot create more subscription filters, create another forwarder \
                         with a different log group configuration: {err}"
                    );
                    report.limit_reached = true;
                    break;
                }
                Err(err) => {
                    errors.push(err.to_string());
                    error!(log_group = %group.name, "failed to create subscription filter: {err}");
                }
            }
        }
        report.errors.retain(|_, errs| !errs.is_empty());

        info!(
            "created subscription for {} log groups out of {} groups",
            report.added_groups_count,
            report.matched_log_groups.len()
        );
        report
    }

    /// Best-effort removal for every group.
    pub async fn unsubscribe_all(&self, groups: &[LogGroupDescriptor]) -> SubscriptionReport {
        let mut report = SubscriptionReport {
            log_groups_count: groups.len(),
            ..Default::default()
        };

        for group in groups {
            if group.name == self.forwarder_log_group() {
                continue;
            }
            report.matched_log_groups.push(group.name.clone());
            let outcome = self.delete_subscription(group).await;
            let errors = outcome.errors();
            if errors.is_empty() {
                report.removed_groups.push(group.name.clone());
            } else {
                report.errors.insert(group.name.clone(), errors);
            }
        }

        info!(
            "unsubscribed from {} log groups out of {} groups",
            report.removed_groups.len(),
            report.matched_log_groups.len()
        );
        report
    }

    /// Remove every filter that delivers to `destination_arn`, across all
    /// log groups. Deleting a function does not remove its filters.
    pub async fn remove_filters_targeting(
        &self,
        destination_arn: &str,
    ) -> Result<SubscriptionReport, CloudApiError> {
        let groups = self.list_log_groups(None).await?;
        let mut report = SubscriptionReport {
            log_groups_count: groups.len(),
            ..Default::default()
        };

        for group in &groups {
            let filters = match self.logs.describe_subscription_filters(&group.name).await {
                Ok(filters) => filters,
                Err(err) => {
                    warn!(
                        log_group = %group.name,
                        "failed to describe subscription filters: {err}"
                    );
                    report.errors.entry(group.name.clone()).or_default().push(err.to_string());
                    continue;
                }
            };

            for filter in filters.iter().filter(|f| f.destination_arn == destination_arn) {
                report.matched_log_groups.push(group.name.clone());
                match self
                    .logs
                    .delete_subscription_filter(&group.name, &filter.filter_name)
                    .await
                {
                    Ok(()) => {
                        info!(
                            log_group = %group.name,
                            filter = %filter.filter_name,
                            "removed subscription filter"
                        );
                        report.removed_groups.push(group.name.clone());
                    }
                    Err(err) if err.is_not_found() => {}
                    Err(err) => {
                        warn!(
                            log_group = %group.name,
                            filter = %filter.filter_name,
                            "failed to remove subscription filter: {err}"
                        );
                        report.errors.entry(group.name.clone()).or_default().push(err.to_string());
                    }
                }
            }
        }
        Ok(report)
    }
}
