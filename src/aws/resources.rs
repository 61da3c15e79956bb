//! Member-account resource queries
//!
//! Each query builds its service client from the delegated session alone, so
//! no call ever runs with the management account's own credentials.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{Region, SdkConfig};
use aws_sdk_s3::config::Credentials;
use std::collections::BTreeMap;
use std::time::SystemTime;
use tracing::{debug, info};

use super::{sdk_error, to_chrono, CREDENTIALS_PROVIDER};
use crate::organization::{
    AccountAlias, Bucket, DelegatedSession, Distribution, IamUser, ResourceKind, ResourceQuery,
    Trail,
};

/// Page size requested from CloudFront
const DISTRIBUTION_PAGE_SIZE: i32 = 100;

fn session_credentials(session: &DelegatedSession) -> Credentials {
    Credentials::new(
        session.credentials.access_key_id.clone(),
        session.credentials.secret_access_key.clone(),
        Some(session.credentials.session_token.clone()),
        Some(SystemTime::from(session.expires_at())),
        CREDENTIALS_PROVIDER,
    )
}

/// Buckets owned by the account
pub struct BucketQuery {
    sdk_config: SdkConfig,
}

impl BucketQuery {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            sdk_config: sdk_config.clone(),
        }
    }
}

#[async_trait]
impl ResourceQuery for BucketQuery {
    type Item = Bucket;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Buckets
    }

    async fn query(&self, session: DelegatedSession) -> Result<Vec<Bucket>> {
        let config = aws_sdk_s3::config::Builder::from(&self.sdk_config)
            .credentials_provider(session_credentials(&session))
            .build();
        let client = aws_sdk_s3::Client::from_conf(config);

        let output = client
            .list_buckets()
            .send()
            .await
            .map_err(|e| sdk_error("ListBuckets", e))?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| {
                Some(Bucket {
                    name: b.name()?.to_string(),
                    created_at: b.creation_date().and_then(to_chrono),
                })
            })
            .collect())
    }
}

fn iam_client(sdk_config: &SdkConfig, session: &DelegatedSession) -> aws_sdk_iam::Client {
    let config = aws_sdk_iam::config::Builder::from(sdk_config)
        .credentials_provider(session_credentials(session))
        .build();
    aws_sdk_iam::Client::from_conf(config)
}

/// IAM users in the account
pub struct UserQuery {
    sdk_config: SdkConfig,
}

impl UserQuery {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            sdk_config: sdk_config.clone(),
        }
    }
}

#[async_trait]
impl ResourceQuery for UserQuery {
    type Item = IamUser;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Users
    }

    async fn query(&self, session: DelegatedSession) -> Result<Vec<IamUser>> {
        let client = iam_client(&self.sdk_config, &session);

        let users = client
            .list_users()
            .into_paginator()
            .items()
            .send()
            .try_collect()
            .await
            .map_err(|e| sdk_error("ListUsers", e))?;

        Ok(users
            .iter()
            .map(|u| IamUser {
                user_name: u.user_name().to_string(),
                user_id: u.user_id().to_string(),
                arn: u.arn().to_string(),
                created_at: to_chrono(u.create_date()),
                password_last_used: u.password_last_used().and_then(to_chrono),
            })
            .collect())
    }
}

/// Account aliases registered with IAM
pub struct AliasQuery {
    sdk_config: SdkConfig,
}

impl AliasQuery {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            sdk_config: sdk_config.clone(),
        }
    }
}

#[async_trait]
impl ResourceQuery for AliasQuery {
    type Item = AccountAlias;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Aliases
    }

    async fn query(&self, session: DelegatedSession) -> Result<Vec<AccountAlias>> {
        let client = iam_client(&self.sdk_config, &session);

        let output = client
            .list_account_aliases()
            .send()
            .await
            .map_err(|e| sdk_error("ListAccountAliases", e))?;

        Ok(output
            .account_aliases()
            .iter()
            .map(|alias| AccountAlias(alias.clone()))
            .collect())
    }
}

/// CloudFront distributions, following markers until the listing ends
pub struct DistributionQuery {
    sdk_config: SdkConfig,
}

impl DistributionQuery {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            sdk_config: sdk_config.clone(),
        }
    }
}

#[async_trait]
impl ResourceQuery for DistributionQuery {
    type Item = Distribution;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Distributions
    }

    async fn query(&self, session: DelegatedSession) -> Result<Vec<Distribution>> {
        let config = aws_sdk_cloudfront::config::Builder::from(&self.sdk_config)
            .credentials_provider(session_credentials(&session))
            .build();
        let client = aws_sdk_cloudfront::Client::from_conf(config);

        let mut distributions = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = client
                .list_distributions()
                .set_marker(marker.take())
                .max_items(DISTRIBUTION_PAGE_SIZE)
                .send()
                .await
                .map_err(|e| sdk_error("ListDistributions", e))?;

            let Some(list) = output.distribution_list() else {
                break;
            };

            distributions.extend(list.items().iter().map(|d| Distribution {
                id: d.id().to_string(),
                domain_name: d.domain_name().to_string(),
                status: d.status().to_string(),
                enabled: d.enabled(),
                aliases: d
                    .aliases()
                    .map(|a| a.items().to_vec())
                    .unwrap_or_default(),
            }));

            match list.next_marker() {
                Some(next) if list.is_truncated() && !next.is_empty() => {
                    marker = Some(next.to_string())
                }
                _ => break,
            }
        }

        Ok(distributions)
    }
}

/// Merge trails seen from several regions, one entry per ARN, sorted by ARN
fn dedup_trails(trails: impl IntoIterator<Item = Trail>) -> Vec<Trail> {
    trails
        .into_iter()
        .map(|t| (t.arn.clone(), t))
        .collect::<BTreeMap<_, _>>()
        .into_values()
        .collect()
}

/// CloudTrail trails across the configured regions.
///
/// Multi-region trails show up in every region; the result holds each ARN
/// once. A failure in any region fails the account.
pub struct TrailQuery {
    sdk_config: SdkConfig,
    regions: Vec<String>,
}

impl TrailQuery {
    pub fn new(sdk_config: &SdkConfig, regions: Vec<String>) -> Self {
        Self {
            sdk_config: sdk_config.clone(),
            regions,
        }
    }

    fn client(&self, session: &DelegatedSession, region: &str) -> aws_sdk_cloudtrail::Client {
        let config = aws_sdk_cloudtrail::config::Builder::from(&self.sdk_config)
            .region(Region::new(region.to_string()))
            .credentials_provider(session_credentials(session))
            .build();
        aws_sdk_cloudtrail::Client::from_conf(config)
    }

    async fn list(&self, session: &DelegatedSession) -> Result<Vec<Trail>> {
        let mut found = Vec::new();

        for region in &self.regions {
            let output = self
                .client(session, region)
                .describe_trails()
                .include_shadow_trails(true)
                .send()
                .await
                .map_err(|e| sdk_error("DescribeTrails", e))
                .with_context(|| format!("region {}", region))?;

            let trails = output.trail_list();
            if trails.is_empty() {
                debug!(account_id = %session.account_id, region = %region, "No trails defined");
            }

            found.extend(trails.iter().filter_map(|t| {
                Some(Trail {
                    arn: t.trail_arn()?.to_string(),
                    name: t.name().map(str::to_string),
                    home_region: t.home_region().map(str::to_string),
                })
            }));
        }

        Ok(dedup_trails(found))
    }
}

#[async_trait]
impl ResourceQuery for TrailQuery {
    type Item = Trail;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Trails
    }

    async fn query(&self, session: DelegatedSession) -> Result<Vec<Trail>> {
        self.list(&session).await
    }
}

/// Deletes every trail in one account and returns what was deleted.
///
/// Meant for single-account use only; the first failed delete aborts.
pub struct TrailPurge {
    trails: TrailQuery,
}

impl TrailPurge {
    pub fn new(trails: TrailQuery) -> Self {
        Self { trails }
    }
}

#[async_trait]
impl ResourceQuery for TrailPurge {
    type Item = Trail;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Trails
    }

    async fn query(&self, session: DelegatedSession) -> Result<Vec<Trail>> {
        let trails = self.trails.list(&session).await?;
        let fallback_region = self.trails.sdk_config.region().map(|r| r.to_string());

        for trail in &trails {
            let region = trail
                .home_region
                .clone()
                .or_else(|| fallback_region.clone())
                .with_context(|| format!("no region known for trail {}", trail.arn))?;

            self.trails
                .client(&session, &region)
                .delete_trail()
                .name(&trail.arn)
                .send()
                .await
                .map_err(|e| sdk_error("DeleteTrail", e))
                .with_context(|| format!("trail {}", trail.arn))?;

            info!(account_id = %session.account_id, trail = %trail.arn, region = %region, "Deleted trail");
        }

        Ok(trails)
    }
}
