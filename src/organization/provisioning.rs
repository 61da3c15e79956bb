//! Account Provisioning
//!
//! Submits a create-account request and follows it to a terminal state:
//!
//! ```text
//! SUBMITTED -> IN_PROGRESS -> SUCCEEDED | FAILED
//!                   \-------> TIMED_OUT (deadline, at any time)
//! ```
//!
//! The poll loop and the deadline timer race each other; whichever finishes
//! first decides the outcome and the other is dropped unobserved.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::error::OrganizerError;
use super::types::{Account, ProvisioningRequest, ProvisioningState, ProvisioningStatus};

/// Account provisioning service
#[async_trait]
pub trait ProvisioningService: Send + Sync {
    /// Submit a create-account request
    async fn create_account(&self, request: &ProvisioningRequest) -> Result<ProvisioningStatus>;

    /// Current status of a create-account request
    async fn describe_create_account_status(&self, request_id: &str) -> Result<ProvisioningStatus>;

    /// Fully populated account record
    async fn describe_account(&self, account_id: &str) -> Result<Account>;
}

/// Poll cadence and deadline for account creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningSettings {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Drives create-account requests to completion
#[derive(Clone)]
pub struct AccountProvisioner {
    service: Arc<dyn ProvisioningService>,
    settings: ProvisioningSettings,
}

impl AccountProvisioner {
    pub fn new(service: Arc<dyn ProvisioningService>, settings: ProvisioningSettings) -> Self {
        Self { service, settings }
    }

    pub fn settings(&self) -> &ProvisioningSettings {
        &self.settings
    }

    /// Submit the request once. Account creation is not idempotent, so a
    /// rejected submission is never retried here.
    pub async fn submit(
        &self,
        request: &ProvisioningRequest,
    ) -> Result<ProvisioningStatus, OrganizerError> {
        info!(name = %request.name, email = %request.email, "Submitting create account request");

        let status = self
            .service
            .create_account(request)
            .await
            .map_err(|e| OrganizerError::Submission(format!("{:#}", e)))?;

        info!(
            request_id = %status.request_id,
            state = %status.state,
            "Create account request accepted"
        );
        Ok(status)
    }

    /// Wait for `status` to reach a terminal state within `deadline`
    pub async fn await_terminal(
        &self,
        status: Option<ProvisioningStatus>,
        deadline: Duration,
    ) -> Result<Account, OrganizerError> {
        self.await_terminal_with_progress(status, deadline, |_| {})
            .await
    }

    /// Like [`Self::await_terminal`], calling `on_poll` with every status
    /// observed by the poll loop
    pub async fn await_terminal_with_progress<F>(
        &self,
        status: Option<ProvisioningStatus>,
        deadline: Duration,
        mut on_poll: F,
    ) -> Result<Account, OrganizerError>
    where
        F: FnMut(&ProvisioningStatus) + Send,
    {
        let status = status.ok_or(OrganizerError::MissingStatus)?;
        let request_id = status.request_id.clone();

        tokio::select! {
            outcome = self.poll_until_terminal(status, &mut on_poll) => outcome,
            _ = sleep(deadline) => {
                warn!(
                    request_id = %request_id,
                    deadline_secs = deadline.as_secs(),
                    "Create account request did not finish before the deadline"
                );
                Err(OrganizerError::Timeout(deadline))
            }
        }
    }

    /// Submit and wait with the configured deadline, logging progress
    pub async fn provision(&self, request: &ProvisioningRequest) -> Result<Account, OrganizerError> {
        let status = self.submit(request).await?;

        let account = self
            .await_terminal_with_progress(Some(status), self.settings.timeout, |s| {
                info!(request_id = %s.request_id, state = %s.state, "Account status")
            })
            .await?;

        info!(account_id = %account.id, name = %account.display_name(), "Account created");
        Ok(account)
    }

    async fn poll_until_terminal<F>(
        &self,
        mut status: ProvisioningStatus,
        on_poll: &mut F,
    ) -> Result<Account, OrganizerError>
    where
        F: FnMut(&ProvisioningStatus) + Send,
    {
        loop {
            match status.state {
                ProvisioningState::InProgress => {
                    sleep(self.settings.poll_interval).await;

                    status = self
                        .service
                        .describe_create_account_status(&status.request_id)
                        .await
                        .map_err(|e| OrganizerError::remote("describe create account status", e))?;

                    debug!(request_id = %status.request_id, state = %status.state, "Polled create account status");
                    on_poll(&status);
                }
                ProvisioningState::Failed => {
                    return Err(OrganizerError::ProvisioningFailed {
                        reason: status
                            .failure_reason
                            .unwrap_or_else(|| "no failure reason given".to_string()),
                    });
                }
                ProvisioningState::Succeeded => {
                    let account_id = status.account_id.ok_or_else(|| OrganizerError::Remote {
                        operation: "describe create account status",
                        message: format!(
                            "request {} succeeded without an account id",
                            status.request_id
                        ),
                    })?;

                    return self
                        .service
                        .describe_account(&account_id)
                        .await
                        .map_err(|e| OrganizerError::remote("describe account", e));
                }
            }
        }
    }
}
