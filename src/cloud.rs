//! Control-plane calls used by the subscription manager.
//!
//! `LogsApi` covers CloudWatch Logs, `PermissionsApi` covers the Lambda
//! resource policy of the forwarder. Both are implemented on top of the AWS
//! SDK clients; tests provide in-memory versions.

use std::future::Future;

use aws_sdk_cloudwatchlogs::error::DisplayErrorContext;
use aws_sdk_cloudwatchlogs::types::Distribution;
use thiserror::Error;

use crate::types::{LogGroupDescriptor, SubscriptionFilterDescriptor};

pub const LOGS_PRINCIPAL: &str = "logs.amazonaws.com";
pub const INVOKE_ACTION: &str = "lambda:InvokeFunction";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CloudApiError {
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("resource already exists: {0}")]
    Conflict(String),
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),
    #[error("{0}")]
    Service(String),
}

impl CloudApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudApiError::NotFound(_))
    }

    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, CloudApiError::LimitExceeded(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogGroupPage {
    pub groups: Vec<LogGroupDescriptor>,
    pub next_token: Option<String>,
}

/// A subscription filter to install on a log group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub log_group_name: String,
    pub filter_name: String,
    pub filter_pattern: String,
    pub destination_arn: String,
}

/// An invoke grant on the forwarder function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrant {
    pub function_arn: String,
    pub statement_id: String,
    pub source_arn: String,
}

pub trait LogsApi {
    fn describe_log_groups(
        &self,
        prefix: Option<&str>,
        limit: i32,
        next_token: Option<String>,
    ) -> impl Future<Output = Result<LogGroupPage, CloudApiError>> + Send;

    fn describe_subscription_filters(
        &self,
        log_group_name: &str,
    ) -> impl Future<Output = Result<Vec<SubscriptionFilterDescriptor>, CloudApiError>> + Send;

    fn put_subscription_filter(
        &self,
        filter: &FilterSpec,
    ) -> impl Future<Output = Result<(), CloudApiError>> + Send;

    fn delete_subscription_filter(
        &self,
        log_group_name: &str,
        filter_name: &str,
    ) -> impl Future<Output = Result<(), CloudApiError>> + Send;
}

pub trait PermissionsApi {
    fn add_permission(
        &self,
        grant: &PermissionGrant,
    ) -> impl Future<Output = Result<(), CloudApiError>> + Send;

    fn remove_permission(
        &self,
        function_arn: &str,
        statement_id: &str,
    ) -> impl Future<Output = Result<(), CloudApiError>> + Send;

    fn function_arn(
        &self,
        function_name: &str,
    ) -> impl Future<Output = Result<String, CloudApiError>> + Send;
}

#[derive(Clone)]
pub struct AwsLogs {
    client: aws_sdk_cloudwatchlogs::Client,
}

impl AwsLogs {
    pub fn new(client: aws_sdk_cloudwatchlogs::Client) -> Self {
        Self { client }
    }
}

impl LogsApi for AwsLogs {
    async fn describe_log_groups(
        &self,
        prefix: Option<&str>,
        limit: i32,
        next_token: Option<String>,
    ) -> Result<LogGroupPage, CloudApiError> {
        let resp = self
            .client
            .describe_log_groups()
            .set_log_group_name_prefix(prefix.map(str::to_string))
            .limit(limit)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|err| CloudApiError::Service(DisplayErrorContext(&err).to_string()))?;

        let groups = resp
            .log_groups()
            .iter()
            .filter_map(|g| {
                Some(LogGroupDescriptor {
                    name: g.log_group_name()?.trim().to_string(),
                    arn: g.arn()?.to_string(),
                })
            })
            .collect();
        Ok(LogGroupPage {
            groups,
            next_token: resp.next_token().map(str::to_string),
        })
    }

    async fn describe_subscription_filters(
        &self,
        log_group_name: &str,
    ) -> Result<Vec<SubscriptionFilterDescriptor>, CloudApiError> {
        let mut filters = Vec::new();
        let mut next_token = None;
        loop {
            let resp = self
                .client
                .describe_subscription_filters()
                .log_group_name(log_group_name)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|err| {
                    let text = DisplayErrorContext(&err).to_string();
                    match err.into_service_error() {
                        e if e.is_resource_not_found_exception() => CloudApiError::NotFound(text),
                        _ => CloudApiError::Service(text),
                    }
                })?;

            filters.extend(resp.subscription_filters().iter().filter_map(|f| {
                Some(SubscriptionFilterDescriptor {
                    filter_name: f.filter_name()?.to_string(),
                    destination_arn: f.destination_arn()?.to_string(),
                })
            }));

            next_token = resp.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(filters)
    }

    async fn put_subscription_filter(&self, filter: &FilterSpec) -> Result<(), CloudApiError> {
        self.client
            .put_subscription_filter()
            .log_group_name(&filter.log_group_name)
            .filter_name(&filter.filter_name)
            .filter_pattern(&filter.filter_pattern)
            .destination_arn(&filter.destination_arn)
            .distribution(Distribution::ByLogStream)
            .send()
            .await
            .map_err(|err| {
                let text = DisplayErrorContext(&err).to_string();
                match err.into_service_error() {
                    e if e.is_limit_exceeded_exception() => CloudApiError::LimitExceeded(text),
                    e if e.is_resource_not_found_exception() => CloudApiError::NotFound(text),
                    _ => CloudApiError::Service(text),
                }
            })?;
        Ok(())
    }

    async fn delete_subscription_filter(
        &self,
        log_group_name: &str,
        filter_name: &str,
    ) -> Result<(), CloudApiError> {
        self.client
            .delete_subscription_filter()
            .log_group_name(log_group_name)
            .filter_name(filter_name)
            .send()
            .await
            .map_err(|err| {
                let text = DisplayErrorContext(&err).to_string();
                match err.into_service_error() {
                    e if e.is_resource_not_found_exception() => CloudApiError::NotFound(text),
                    _ => CloudApiError::Service(text),
                }
            })?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct AwsLambda {
    client: aws_sdk_lambda::Client,
}

impl AwsLambda {
    pub fn new(client: aws_sdk_lambda::Client) -> Self {
        Self { client }
    }
}

impl PermissionsApi for AwsLambda {
    async fn add_permission(&self, grant: &PermissionGrant) -> Result<(), CloudApiError> {
        self.client
            .add_permission()
            .function_name(&grant.function_arn)
            .statement_id(&grant.statement_id)
            .action(INVOKE_ACTION)
            .principal(LOGS_PRINCIPAL)
            .source_arn(&grant.source_arn)
            .send()
            .await
            .map_err(|err| {
                let text = aws_sdk_lambda::error::DisplayErrorContext(&err).to_string();
                match err.into_service_error() {
                    e if e.is_resource_conflict_exception() => CloudApiError::Conflict(text),
                    e if e.is_policy_length_exceeded_exception() => {
                        CloudApiError::LimitExceeded(text)
                    }
                    e if e.is_resource_not_found_exception() => CloudApiError::NotFound(text),
                    _ => CloudApiError::Service(text),
                }
            })?;
        Ok(())
    }

    async fn remove_permission(
        &self,
        function_arn: &str,
        statement_id: &str,
    ) -> Result<(), CloudApiError> {
        self.client
            .remove_permission()
            .function_name(function_arn)
            .statement_id(statement_id)
            .send()
            .await
            .map_err(|err| {
                let text = aws_sdk_lambda::error::DisplayErrorContext(&err).to_string();
                match err.into_service_error() {
                    e if e.is_resource_not_found_exception() => CloudApiError::NotFound(text),
                    _ => CloudApiError::Service(text),
                }
            })?;
        Ok(())
    }

    async fn function_arn(&self, function_name: &str) -> Result<String, CloudApiError> {
        let resp = self
            .client
            .get_function_configuration()
            .function_name(function_name)
            .send()
            .await
            .map_err(|err| {
                let text = aws_sdk_lambda::error::DisplayErrorContext(&err).to_string();
                match err.into_service_error() {
                    e if e.is_resource_not_found_exception() => CloudApiError::NotFound(text),
                    _ => CloudApiError::Service(text),
                }
            })?;
        resp.function_arn()
            .map(str::to_string)
            .ok_or_else(|| CloudApiError::NotFound(format!("no arn for function {function_name}")))
    }
}
