//! Organization Types
//!
//! Accounts, delegated sessions, provisioning state and the resource
//! records collected from member accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status value of an account that can be queried.
pub const ACTIVE_STATUS: &str = "ACTIVE";

/// A member account as reported by the organization directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier (12-digit, opaque to the core)
    pub id: String,
    /// Display name, absent while a new account is still being populated
    pub name: Option<String>,
    /// Root email address
    pub email: Option<String>,
    /// Lifecycle status (ACTIVE, SUSPENDED, PENDING_CLOSURE, ...)
    pub status: String,
    /// Account ARN within the organization
    pub arn: Option<String>,
    /// INVITED or CREATED
    pub joined_method: Option<String>,
    /// When the account joined the organization
    pub joined_timestamp: Option<DateTime<Utc>>,
}

impl Account {
    /// Minimal account record, mostly useful for tests and fixtures
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            email: None,
            status: status.into(),
            arn: None,
            joined_method: None,
            joined_timestamp: None,
        }
    }

    /// Exact, case-sensitive match on `ACTIVE`
    pub fn is_active(&self) -> bool {
        self.status == ACTIVE_STATUS
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unknown")
    }
}

/// One page of the directory listing
#[derive(Debug, Clone, Default)]
pub struct AccountPage {
    pub accounts: Vec<Account>,
    /// Continuation token; `None` or empty ends the listing
    pub next_token: Option<String>,
}

/// Point-in-time copy of the organization's accounts.
///
/// Each directory listing returns a fresh snapshot; nothing is cached
/// between calls, so callers decide how fresh their view needs to be.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSnapshot {
    pub accounts: Vec<Account>,
    pub fetched_at: DateTime<Utc>,
}

impl AccountSnapshot {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self {
            accounts,
            fetched_at: Utc::now(),
        }
    }

    /// Accounts with status `ACTIVE`, in directory order
    pub fn active(&self) -> Vec<Account> {
        self.accounts
            .iter()
            .filter(|a| a.is_active())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Temporary credentials issued by the credential-exchange service
#[derive(Clone)]
pub struct SessionCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Short-lived session scoped to one account and one purpose.
///
/// Not `Clone`: a session is moved into the single query that uses it and
/// dropped with it.
pub struct DelegatedSession {
    pub account_id: String,
    /// Purpose tag embedded in the role session name (e.g. "buckets")
    pub purpose: String,
    pub role_arn: String,
    pub credentials: SessionCredentials,
}

impl DelegatedSession {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.credentials.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.credentials.expires_at
    }
}

impl std::fmt::Debug for DelegatedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegatedSession")
            .field("account_id", &self.account_id)
            .field("purpose", &self.purpose)
            .field("role_arn", &self.role_arn)
            .field("credentials", &self.credentials)
            .finish()
    }
}

/// Name and email submitted once to create a new member account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningRequest {
    pub name: String,
    pub email: String,
}

impl ProvisioningRequest {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// State of a create-account request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisioningState {
    InProgress,
    Succeeded,
    Failed,
}

impl ProvisioningState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisioningState::InProgress => "IN_PROGRESS",
            ProvisioningState::Succeeded => "SUCCEEDED",
            ProvisioningState::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProvisioningState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(ProvisioningState::InProgress),
            "SUCCEEDED" => Ok(ProvisioningState::Succeeded),
            "FAILED" => Ok(ProvisioningState::Failed),
            other => Err(format!("unknown create account state: {}", other)),
        }
    }
}

/// Status of a create-account request as last observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningStatus {
    /// Create-account request identifier used for polling
    pub request_id: String,
    pub state: ProvisioningState,
    /// Set once the request has SUCCEEDED
    pub account_id: Option<String>,
    pub account_name: Option<String>,
    /// Remote-supplied reason when the request has FAILED
    pub failure_reason: Option<String>,
}

impl ProvisioningStatus {
    pub fn in_progress(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            state: ProvisioningState::InProgress,
            account_id: None,
            account_name: None,
            failure_reason: None,
        }
    }

    pub fn succeeded(request_id: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            state: ProvisioningState::Succeeded,
            account_id: Some(account_id.into()),
            ..Self::in_progress(request_id)
        }
    }

    pub fn failed(request_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            state: ProvisioningState::Failed,
            failure_reason: Some(reason.into()),
            ..Self::in_progress(request_id)
        }
    }
}

/// Resource kinds collected from member accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Buckets,
    Users,
    Aliases,
    Distributions,
    Trails,
}

impl ResourceKind {
    /// Purpose tag carried in the role session name so audit logs can
    /// attribute cross-account calls to the operation that made them
    pub fn purpose_tag(&self) -> &'static str {
        match self {
            ResourceKind::Buckets => "buckets",
            ResourceKind::Users | ResourceKind::Aliases => "iam",
            ResourceKind::Distributions => "cloudfront",
            ResourceKind::Trails => "cloudtrail",
        }
    }

    /// Human-readable label used in warnings
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Buckets => "buckets",
            ResourceKind::Users => "users",
            ResourceKind::Aliases => "account aliases",
            ResourceKind::Distributions => "cloudfront distributions",
            ResourceKind::Trails => "trails",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Object storage bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Identity-service user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamUser {
    pub user_name: String,
    pub user_id: String,
    pub arn: String,
    pub created_at: Option<DateTime<Utc>>,
    pub password_last_used: Option<DateTime<Utc>>,
}

/// Account alias registered with the identity service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountAlias(pub String);

/// CDN distribution summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub id: String,
    pub domain_name: String,
    pub status: String,
    pub enabled: bool,
    /// Alternate domain names (CNAMEs)
    pub aliases: Vec<String>,
}

/// Audit trail
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Trail {
    pub arn: String,
    pub name: Option<String>,
    pub home_region: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_status_is_exact_match() {
        assert!(Account::new("1", "a", "ACTIVE").is_active());
        assert!(!Account::new("2", "b", "active").is_active());
        assert!(!Account::new("3", "c", "ACTIVE ").is_active());
        assert!(!Account::new("4", "d", "SUSPENDED").is_active());
    }

    #[test]
    fn test_display_name_fallback() {
        let mut account = Account::new("111111111111", "prod", "ACTIVE");
        assert_eq!(account.display_name(), "prod");

        account.name = None;
        assert_eq!(account.display_name(), "unknown");
    }

    #[test]
    fn test_provisioning_state_parsing() {
        assert_eq!(
            "IN_PROGRESS".parse::<ProvisioningState>(),
            Ok(ProvisioningState::InProgress)
        );
        assert_eq!(
            "SUCCEEDED".parse::<ProvisioningState>(),
            Ok(ProvisioningState::Succeeded)
        );
        assert_eq!(
            "FAILED".parse::<ProvisioningState>(),
            Ok(ProvisioningState::Failed)
        );
        assert!("in_progress".parse::<ProvisioningState>().is_err());
    }

    #[test]
    fn test_session_debug_redacts_secrets() {
        let session = DelegatedSession {
            account_id: "111111111111".to_string(),
            purpose: "buckets".to_string(),
            role_arn: "arn:aws:iam::111111111111:role/OrganizationAccountAccessRole".to_string(),
            credentials: SessionCredentials {
                access_key_id: "ASIAEXAMPLE".to_string(),
                secret_access_key: "very-secret".to_string(),
                session_token: "token-value".to_string(),
                expires_at: Utc::now(),
            },
        };

        let rendered = format!("{:?}", session);
        assert!(rendered.contains("ASIAEXAMPLE"));
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("token-value"));
    }

    #[test]
    fn test_resource_kind_tags() {
        assert_eq!(ResourceKind::Buckets.purpose_tag(), "buckets");
        assert_eq!(ResourceKind::Users.purpose_tag(), "iam");
        assert_eq!(ResourceKind::Aliases.purpose_tag(), "iam");
        assert_eq!(ResourceKind::Distributions.purpose_tag(), "cloudfront");
        assert_eq!(ResourceKind::Distributions.to_string(), "cloudfront distributions");
    }

    #[test]
    fn test_snapshot_active_preserves_order() {
        let snapshot = AccountSnapshot::new(vec![
            Account::new("1", "a", "ACTIVE"),
            Account::new("2", "b", "SUSPENDED"),
            Account::new("3", "c", "ACTIVE"),
            Account::new("4", "d", "PENDING_CLOSURE"),
        ]);

        let ids: Vec<_> = snapshot.active().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(snapshot.len(), 4);
    }
}
