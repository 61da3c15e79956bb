//! Delegation Broker
//!
//! Exchanges the caller's identity for a short-lived session inside a
//! member account by assuming the organization access role there.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::error::OrganizerError;
use super::types::{DelegatedSession, SessionCredentials};

/// Longest role session name the provider accepts
const MAX_SESSION_NAME_LEN: usize = 64;

/// Characters allowed in a role session name
pub(crate) fn is_session_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "+=,.@-_".contains(c)
}

/// Credential-exchange service
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    /// Assume `role_arn` and return temporary credentials
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        duration_secs: i32,
    ) -> Result<SessionCredentials>;
}

/// How delegated sessions are requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationSettings {
    /// Role present in every member account
    pub role_name: String,
    pub partition: String,
    pub session_name_prefix: String,
    pub duration_secs: i32,
}

impl Default for DelegationSettings {
    fn default() -> Self {
        Self {
            role_name: "OrganizationAccountAccessRole".to_string(),
            partition: "aws".to_string(),
            session_name_prefix: "organizer".to_string(),
            duration_secs: 900,
        }
    }
}

/// Issues one fresh session per account and purpose.
///
/// Sessions are never cached: every call performs its own role assumption.
#[derive(Clone)]
pub struct DelegationBroker {
    exchange: Arc<dyn CredentialExchange>,
    settings: DelegationSettings,
}

impl DelegationBroker {
    pub fn new(exchange: Arc<dyn CredentialExchange>, settings: DelegationSettings) -> Self {
        Self { exchange, settings }
    }

    /// ARN of the access role inside `account_id`
    pub fn role_arn(&self, account_id: &str) -> String {
        format!(
            "arn:{}:iam::{}:role/{}",
            self.settings.partition, account_id, self.settings.role_name
        )
    }

    /// Role session name tagged with `purpose`, e.g. `organizer-buckets`
    pub fn session_name(&self, purpose: &str) -> String {
        let mut name: String = format!("{}-{}", self.settings.session_name_prefix, purpose)
            .chars()
            .filter(|c| is_session_name_char(*c))
            .collect();
        name.truncate(MAX_SESSION_NAME_LEN);
        name
    }

    /// Assume the access role in `account_id` for a single query
    pub async fn delegate(
        &self,
        account_id: &str,
        purpose: &str,
    ) -> Result<DelegatedSession, OrganizerError> {
        let role_arn = self.role_arn(account_id);
        let session_name = self.session_name(purpose);

        debug!(
            account_id = %account_id,
            role_arn = %role_arn,
            session_name = %session_name,
            "Assuming role"
        );

        match self
            .exchange
            .assume_role(&role_arn, &session_name, self.settings.duration_secs)
            .await
        {
            Ok(credentials) => Ok(DelegatedSession {
                account_id: account_id.to_string(),
                purpose: purpose.to_string(),
                role_arn,
                credentials,
            }),
            Err(e) => {
                debug!(account_id = %account_id, role_arn = %role_arn, error = %e, "Role assumption failed");
                Err(OrganizerError::Delegation {
                    account_id: account_id.to_string(),
                    role_arn,
                    message: format!("{:#}", e),
                })
            }
        }
    }
}
