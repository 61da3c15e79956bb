//! AWS Bindings
//!
//! Implements the organization traits with the AWS SDK and wires them into
//! a single [`Organizer`] entry point.
//!
//! ## Architecture
//!
//! - **OrganizationsClient**: account directory and account creation
//! - **StsExchange**: role assumption into member accounts
//! - **Resource queries**: S3, IAM, CloudFront and CloudTrail listings built
//!   from a delegated session's static credentials

mod organizations;
mod resources;
mod sts;

pub use organizations::OrganizationsClient;
pub use resources::{
    AliasQuery, BucketQuery, DistributionQuery, TrailPurge, TrailQuery, UserQuery,
};
pub use sts::StsExchange;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_sts::error::DisplayErrorContext;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::config::OrganizerConfig;
use crate::organization::{
    Account, AccountDirectory, AccountProvisioner, AccountSnapshot, AggregationResult,
    CredentialExchange, DelegationBroker, DirectoryService, FanOut, OrganizerError,
    ProvisioningRequest, ProvisioningService, ResourceQuery,
};

/// Provider name attached to credentials built from delegated sessions
pub(crate) const CREDENTIALS_PROVIDER: &str = "organizer";

/// Render an SDK error with its full source chain
pub(crate) fn sdk_error<E>(operation: &str, err: E) -> anyhow::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    anyhow::anyhow!("{} failed: {}", operation, DisplayErrorContext(&err))
}

/// Convert an SDK timestamp, dropping values outside chrono's range
pub(crate) fn to_chrono(value: &aws_sdk_sts::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(value.secs(), value.subsec_nanos())
}

/// Load the shared SDK configuration for `region` from the default chain
pub async fn load_sdk_config(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}

/// Cross-account inventory and provisioning backed by the AWS SDK
#[derive(Clone)]
pub struct Organizer {
    config: OrganizerConfig,
    sdk_config: SdkConfig,
    directory: AccountDirectory,
    fan_out: FanOut,
    provisioner: AccountProvisioner,
}

impl Organizer {
    /// Build every client from the caller's ambient credentials
    pub async fn from_config(config: OrganizerConfig) -> Result<Self, OrganizerError> {
        config.validate()?;

        let sdk_config = load_sdk_config(&config.region).await;
        let organizations = Arc::new(OrganizationsClient::new(&sdk_config));
        let exchange = Arc::new(StsExchange::new(&sdk_config));

        Ok(Self::from_services(
            config,
            sdk_config,
            organizations.clone(),
            exchange,
            organizations,
        ))
    }

    /// Wire the organizer around explicit service implementations.
    ///
    /// `sdk_config` only seeds the resource query clients.
    pub fn from_services(
        config: OrganizerConfig,
        sdk_config: SdkConfig,
        directory: Arc<dyn DirectoryService>,
        exchange: Arc<dyn CredentialExchange>,
        provisioning: Arc<dyn ProvisioningService>,
    ) -> Self {
        info!(
            region = %config.region,
            role_name = %config.role_name,
            concurrency = config.concurrency,
            "Organizer initialized"
        );

        Self {
            directory: AccountDirectory::new(directory),
            fan_out: FanOut::new(
                DelegationBroker::new(exchange, config.delegation_settings()),
                config.concurrency,
            ),
            provisioner: AccountProvisioner::new(provisioning, config.provisioning_settings()),
            sdk_config,
            config,
        }
    }

    pub fn provisioner(&self) -> &AccountProvisioner {
        &self.provisioner
    }

    pub fn buckets(&self) -> BucketQuery {
        BucketQuery::new(&self.sdk_config)
    }

    pub fn users(&self) -> UserQuery {
        UserQuery::new(&self.sdk_config)
    }

    pub fn aliases(&self) -> AliasQuery {
        AliasQuery::new(&self.sdk_config)
    }

    pub fn distributions(&self) -> DistributionQuery {
        DistributionQuery::new(&self.sdk_config)
    }

    pub fn trails(&self) -> TrailQuery {
        TrailQuery::new(&self.sdk_config, self.config.trail_regions.clone())
    }

    pub fn trail_purge(&self) -> TrailPurge {
        TrailPurge::new(self.trails())
    }

    /// Snapshot of every account in the organization
    pub async fn list_accounts(&self) -> Result<AccountSnapshot, OrganizerError> {
        self.directory.list_all().await
    }

    /// Run `query` against every active account
    pub async fn collect<Q>(&self, query: &Q) -> Result<AggregationResult<Q::Item>, OrganizerError>
    where
        Q: ResourceQuery + ?Sized,
    {
        let accounts = self.directory.list_active().await?;
        Ok(self.fan_out.collect(&accounts, query).await)
    }

    /// Run `query` against a single account; any failure is returned
    pub async fn query_account<Q>(
        &self,
        account_id: &str,
        query: &Q,
    ) -> Result<Vec<Q::Item>, OrganizerError>
    where
        Q: ResourceQuery + ?Sized,
    {
        self.fan_out.query_account(account_id, query).await
    }

    /// Create a member account and wait for it with the configured deadline
    pub async fn provision(&self, request: &ProvisioningRequest) -> Result<Account, OrganizerError> {
        self.provisioner.provision(request).await
    }
}
