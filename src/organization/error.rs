//! Organizer error taxonomy

use std::time::Duration;
use thiserror::Error;

use super::types::ResourceKind;

/// Errors surfaced by the organization core
#[derive(Debug, Error)]
pub enum OrganizerError {
    /// Directory or provisioning service call failed outright
    #[error("Remote call failed during {operation}: {message}")]
    Remote {
        operation: &'static str,
        message: String,
    },

    /// The create-account call itself was rejected
    #[error("Could not create account: {0}")]
    Submission(String),

    /// Role assumption failed for one account
    #[error("Could not assume role {role_arn} in account {account_id}: {message}")]
    Delegation {
        account_id: String,
        role_arn: String,
        message: String,
    },

    /// Resource query failed after successful delegation
    #[error("Could not list {kind} for account {account_id}: {message}")]
    Query {
        account_id: String,
        kind: ResourceKind,
        message: String,
    },

    /// Remote reported the create-account request as FAILED
    #[error("Failed to create account: {reason}")]
    ProvisioningFailed { reason: String },

    /// Deadline elapsed before a terminal state was observed
    #[error("Timed out after {}s waiting for account creation", .0.as_secs())]
    Timeout(Duration),

    /// Await was called without a status to follow
    #[error("Create account status is missing")]
    MissingStatus,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl OrganizerError {
    pub(crate) fn remote(operation: &'static str, err: anyhow::Error) -> Self {
        OrganizerError::Remote {
            operation,
            message: format!("{:#}", err),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, OrganizerError::Timeout(_))
    }

    /// Failures that only degrade a single account's contribution
    pub fn is_per_account(&self) -> bool {
        matches!(
            self,
            OrganizerError::Delegation { .. } | OrganizerError::Query { .. }
        )
    }

    /// Account the error concerns, if any
    pub fn account_id(&self) -> Option<&str> {
        match self {
            OrganizerError::Delegation { account_id, .. }
            | OrganizerError::Query { account_id, .. } => Some(account_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_renders_cause_chain() {
        let err = anyhow::anyhow!("throttled").context("ListAccounts failed");
        let remote = OrganizerError::remote("list accounts", err);

        assert_eq!(
            remote.to_string(),
            "Remote call failed during list accounts: ListAccounts failed: throttled"
        );
        assert!(!remote.is_per_account());
    }

    #[test]
    fn test_timeout_is_distinguishable() {
        let err = OrganizerError::Timeout(Duration::from_secs(300));
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Timed out after 300s waiting for account creation");

        let failed = OrganizerError::ProvisioningFailed {
            reason: "EMAIL_ALREADY_EXISTS".to_string(),
        };
        assert!(!failed.is_timeout());
    }

    #[test]
    fn test_per_account_errors_name_the_account() {
        let err = OrganizerError::Query {
            account_id: "222222222222".to_string(),
            kind: ResourceKind::Buckets,
            message: "AccessDenied".to_string(),
        };

        assert!(err.is_per_account());
        assert_eq!(err.account_id(), Some("222222222222"));
        assert_eq!(
            err.to_string(),
            "Could not list buckets for account 222222222222: AccessDenied"
        );
    }
}
