use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_organizations::types::{
    Account as SdkAccount, CreateAccountState, CreateAccountStatus, IamUserAccessToBilling,
};
use tracing::debug;

use super::{sdk_error, to_chrono};
use crate::organization::{
    Account, AccountPage, DirectoryService, ProvisioningRequest, ProvisioningService,
    ProvisioningState, ProvisioningStatus,
};

/// AWS Organizations client for the management account
pub struct OrganizationsClient {
    client: aws_sdk_organizations::Client,
}

impl OrganizationsClient {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_organizations::Client::new(config),
        }
    }
}

fn to_account(account: &SdkAccount) -> Result<Account> {
    let id = account
        .id()
        .context("organization returned an account without an id")?;

    // Status is being replaced by State; newer responses may carry only State.
    #[allow(deprecated)]
    let status = account
        .status()
        .map(|s| s.as_str().to_string())
        .or_else(|| account.state().map(|s| s.as_str().to_string()))
        .unwrap_or_default();

    Ok(Account {
        id: id.to_string(),
        name: account.name().map(str::to_string),
        email: account.email().map(str::to_string),
        status,
        arn: account.arn().map(str::to_string),
        joined_method: account.joined_method().map(|m| m.as_str().to_string()),
        joined_timestamp: account.joined_timestamp().and_then(to_chrono),
    })
}

fn to_status(status: &CreateAccountStatus) -> Result<ProvisioningStatus> {
    let request_id = status
        .id()
        .context("create account status has no request id")?;

    let state = match status.state() {
        Some(CreateAccountState::InProgress) => ProvisioningState::InProgress,
        Some(CreateAccountState::Succeeded) => ProvisioningState::Succeeded,
        Some(CreateAccountState::Failed) => ProvisioningState::Failed,
        Some(other) => other
            .as_str()
            .parse()
            .map_err(|e: String| anyhow!(e))?,
        None => return Err(anyhow!("create account status {} has no state", request_id)),
    };

    Ok(ProvisioningStatus {
        request_id: request_id.to_string(),
        state,
        account_id: status.account_id().map(str::to_string),
        account_name: status.account_name().map(str::to_string),
        failure_reason: status.failure_reason().map(|r| r.as_str().to_string()),
    })
}

#[async_trait]
impl DirectoryService for OrganizationsClient {
    async fn list_accounts_page(&self, next_token: Option<String>) -> Result<AccountPage> {
        let output = self
            .client
            .list_accounts()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| sdk_error("ListAccounts", e))?;

        let accounts = output
            .accounts()
            .iter()
            .map(to_account)
            .collect::<Result<Vec<_>>>()?;

        Ok(AccountPage {
            accounts,
            next_token: output.next_token().map(str::to_string),
        })
    }
}

#[async_trait]
impl ProvisioningService for OrganizationsClient {
    async fn create_account(&self, request: &ProvisioningRequest) -> Result<ProvisioningStatus> {
        let output = self
            .client
            .create_account()
            .account_name(&request.name)
            .email(&request.email)
            .iam_user_access_to_billing(IamUserAccessToBilling::Allow)
            .send()
            .await
            .map_err(|e| sdk_error("CreateAccount", e))?;

        let status = output
            .create_account_status()
            .context("CreateAccount returned no status")?;
        to_status(status)
    }

    async fn describe_create_account_status(&self, request_id: &str) -> Result<ProvisioningStatus> {
        let output = self
            .client
            .describe_create_account_status()
            .create_account_request_id(request_id)
            .send()
            .await
            .map_err(|e| sdk_error("DescribeCreateAccountStatus", e))?;

        let status = output
            .create_account_status()
            .with_context(|| format!("no status returned for request {}", request_id))?;

        debug!(request_id = %request_id, state = ?status.state(), "Create account status");
        to_status(status)
    }

    async fn describe_account(&self, account_id: &str) -> Result<Account> {
        let output = self
            .client
            .describe_account()
            .account_id(account_id)
            .send()
            .await
            .map_err(|e| sdk_error("DescribeAccount", e))?;

        let account = output
            .account()
            .with_context(|| format!("DescribeAccount returned nothing for {}", account_id))?;
        to_account(account)
    }
}
