//! In-memory CloudWatch Logs and Lambda permissions for tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use logship::cloud::{
    CloudApiError, FilterSpec, LogGroupPage, LogsApi, PermissionGrant, PermissionsApi,
};
use logship::types::{LogGroupDescriptor, SubscriptionFilterDescriptor};

/// CloudWatch allows two subscription filters per log group.
pub const FILTERS_PER_GROUP: usize = 2;

#[derive(Default)]
pub struct FakeState {
    pub groups: Vec<LogGroupDescriptor>,
    /// group -> filter name -> destination
    pub filters: BTreeMap<String, BTreeMap<String, String>>,
    /// statement id -> source arn
    pub permissions: BTreeMap<String, String>,
    pub describe_calls: Vec<(Option<String>, i32, Option<String>)>,
    pub put_calls: usize,
    pub fail_put_for: HashSet<String>,
    pub fail_delete_for: HashSet<String>,
    pub fail_add_permission: bool,
    pub function_arns: BTreeMap<String, String>,
}

#[derive(Default)]
pub struct FakeCloud {
    pub state: Mutex<FakeState>,
}

pub fn group(name: &str) -> LogGroupDescriptor {
    LogGroupDescriptor {
        name: name.to_string(),
        arn: format!("arn:aws:logs:us-east-1:123456789012:log-group:{name}:*"),
    }
}

pub const FORWARDER_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:axiom-forwarder";

impl FakeCloud {
    pub fn with_groups(names: &[&str]) -> Self {
        let cloud = Self::default();
        cloud.state.lock().unwrap().groups = names.iter().map(|n| group(n)).collect();
        cloud
    }

    pub fn add_filter(&self, group: &str, filter: &str, destination: &str) {
        self.state
            .lock()
            .unwrap()
            .filters
            .entry(group.to_string())
            .or_default()
            .insert(filter.to_string(), destination.to_string());
    }

    pub fn filters_for(&self, group: &str) -> BTreeMap<String, String> {
        self.state
            .lock()
            .unwrap()
            .filters
            .get(group)
            .cloned()
            .unwrap_or_default()
    }

    pub fn filter_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .filters
            .values()
            .map(|f| f.len())
            .sum()
    }

    pub fn permission_count(&self) -> usize {
        self.state.lock().unwrap().permissions.len()
    }

    pub fn permission_source(&self, statement_id: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .permissions
            .get(statement_id)
            .cloned()
    }

    pub fn has_permission(&self, statement_id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .permissions
            .contains_key(statement_id)
    }
}

impl LogsApi for FakeCloud {
    async fn describe_log_groups(
        &self,
        prefix: Option<&str>,
        limit: i32,
        next_token: Option<String>,
    ) -> Result<LogGroupPage, CloudApiError> {
        let mut state = self.state.lock().unwrap();
        state
            .describe_calls
            .push((prefix.map(str::to_string), limit, next_token.clone()));

        let matching: Vec<LogGroupDescriptor> = state
            .groups
            .iter()
            .filter(|g| prefix.map_or(true, |p| g.name.starts_with(p)))
            .cloned()
            .collect();
        let start: usize = next_token
            .as_deref()
            .map(|t| t.parse().expect("numeric token"))
            .unwrap_or(0);
        let end = (start + limit as usize).min(matching.len());
        Ok(LogGroupPage {
            groups: matching[start..end].to_vec(),
            next_token: (end < matching.len()).then(|| end.to_string()),
        })
    }

    async fn describe_subscription_filters(
        &self,
        log_group_name: &str,
    ) -> Result<Vec<SubscriptionFilterDescriptor>, CloudApiError> {
        Ok(self
            .filters_for(log_group_name)
            .into_iter()
            .map(|(filter_name, destination_arn)| SubscriptionFilterDescriptor {
                filter_name,
                destination_arn,
            })
            .collect())
    }

    async fn put_subscription_filter(&self, filter: &FilterSpec) -> Result<(), CloudApiError> {
        let mut state = self.state.lock().unwrap();
        state.put_calls += 1;
        if state.fail_put_for.contains(&filter.log_group_name) {
            return Err(CloudApiError::Service("access denied".into()));
        }
        let filters = state
            .filters
            .entry(filter.log_group_name.clone())
            .or_default();
        if !filters.contains_key(&filter.filter_name) && filters.len() >= FILTERS_PER_GROUP {
            return Err(CloudApiError::LimitExceeded(format!(
                "too many filters on {}",
                filter.log_group_name
            )));
        }
        filters.insert(filter.filter_name.clone(), filter.destination_arn.clone());
        Ok(())
    }

    async fn delete_subscription_filter(
        &self,
        log_group_name: &str,
        filter_name: &str,
    ) -> Result<(), CloudApiError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_delete_for.contains(log_group_name) {
            return Err(CloudApiError::Service("throttled".into()));
        }
        match state
            .filters
            .get_mut(log_group_name)
            .and_then(|f| f.remove(filter_name))
        {
            Some(_) => Ok(()),
            None => Err(CloudApiError::NotFound(format!(
                "{filter_name} on {log_group_name}"
            ))),
        }
    }
}

impl PermissionsApi for FakeCloud {
    async fn add_permission(&self, grant: &PermissionGrant) -> Result<(), CloudApiError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_add_permission {
            return Err(CloudApiError::Service("rate exceeded".into()));
        }
        if state.permissions.contains_key(&grant.statement_id) {
            return Err(CloudApiError::Conflict(grant.statement_id.clone()));
        }
        state
            .permissions
            .insert(grant.statement_id.clone(), grant.source_arn.clone());
        Ok(())
    }

    async fn remove_permission(
        &self,
        _function_arn: &str,
        statement_id: &str,
    ) -> Result<(), CloudApiError> {
        match self.state.lock().unwrap().permissions.remove(statement_id) {
            Some(_) => Ok(()),
            None => Err(CloudApiError::NotFound(statement_id.to_string())),
        }
    }

    async fn function_arn(&self, function_name: &str) -> Result<String, CloudApiError> {
        self.state
            .lock()
            .unwrap()
            .function_arns
            .get(function_name)
            .cloned()
            .ok_or_else(|| CloudApiError::NotFound(function_name.to_string()))
    }
}
