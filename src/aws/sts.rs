use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use chrono::Utc;

use super::{sdk_error, to_chrono};
use crate::organization::{CredentialExchange, SessionCredentials};

/// Role assumption through STS
pub struct StsExchange {
    client: aws_sdk_sts::Client,
}

impl StsExchange {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_sts::Client::new(config),
        }
    }
}

#[async_trait]
impl CredentialExchange for StsExchange {
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        duration_secs: i32,
    ) -> Result<SessionCredentials> {
        let output = self
            .client
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .duration_seconds(duration_secs)
            .send()
            .await
            .map_err(|e| sdk_error("AssumeRole", e))?;

        let credentials = output
            .credentials()
            .ok_or_else(|| anyhow!("AssumeRole returned no credentials for {}", role_arn))?;

        Ok(SessionCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
            expires_at: to_chrono(credentials.expiration()).unwrap_or_else(Utc::now),
        })
    }
}
