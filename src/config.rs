//! Organizer Configuration
//!
//! Defaults follow the conventions of an AWS Organization: member accounts
//! carry an `OrganizationAccountAccessRole` trusted by the management
//! account. Every value can be overridden from the environment.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::organization::{
    is_session_name_char, DelegationSettings, OrganizerError, ProvisioningSettings,
};

/// Provider floor for assumed-role sessions
pub const MIN_SESSION_DURATION_SECS: i32 = 900;
/// Provider ceiling for assumed-role sessions
pub const MAX_SESSION_DURATION_SECS: i32 = 43_200;

const DEFAULT_REGION: &str = "us-east-1";

/// Runtime configuration for the organizer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizerConfig {
    /// Region for the organization and identity clients
    pub region: String,
    /// Role assumed in each member account
    pub role_name: String,
    /// ARN partition (aws, aws-cn, aws-us-gov)
    pub partition: String,
    /// Prefix of every role session name
    pub session_name_prefix: String,
    /// Lifetime requested for each delegated session
    pub session_duration_secs: i32,
    /// Accounts queried concurrently during a fan-out
    pub concurrency: usize,
    /// Delay between create-account status polls
    pub poll_interval_secs: u64,
    /// Deadline for a create-account request to reach a terminal state
    pub provision_timeout_secs: u64,
    /// Regions searched for audit trails
    pub trail_regions: Vec<String>,
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        let delegation = DelegationSettings::default();
        let provisioning = ProvisioningSettings::default();

        Self {
            region: default_region(),
            role_name: delegation.role_name,
            partition: delegation.partition,
            session_name_prefix: delegation.session_name_prefix,
            session_duration_secs: delegation.duration_secs,
            concurrency: 8,
            poll_interval_secs: provisioning.poll_interval.as_secs(),
            provision_timeout_secs: provisioning.timeout.as_secs(),
            trail_regions: default_trail_regions(),
        }
    }
}

impl OrganizerConfig {
    /// Build from defaults overlaid with `ORGANIZER_*` environment variables
    pub fn from_env() -> Result<Self, OrganizerError> {
        let mut config = Self::default();

        if let Ok(role) = env::var("ORGANIZER_ROLE_NAME") {
            config.role_name = role;
        }
        if let Ok(partition) = env::var("ORGANIZER_PARTITION") {
            config.partition = partition;
        }
        if let Ok(prefix) = env::var("ORGANIZER_SESSION_PREFIX") {
            config.session_name_prefix = prefix;
        }
        if let Some(secs) = parse_env("ORGANIZER_SESSION_DURATION_SECS")? {
            config.session_duration_secs = secs;
        }
        if let Some(n) = parse_env("ORGANIZER_CONCURRENCY")? {
            config.concurrency = n;
        }
        if let Some(secs) = parse_env("ORGANIZER_POLL_INTERVAL_SECS")? {
            config.poll_interval_secs = secs;
        }
        if let Some(secs) = parse_env("ORGANIZER_PROVISION_TIMEOUT_SECS")? {
            config.provision_timeout_secs = secs;
        }
        if let Ok(regions) = env::var("ORGANIZER_TRAIL_REGIONS") {
            config.trail_regions = split_regions(&regions);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), OrganizerError> {
        if self.role_name.trim().is_empty() {
            return Err(OrganizerError::Config("role name must not be empty".to_string()));
        }
        if self.session_name_prefix.is_empty()
            || !self.session_name_prefix.chars().all(is_session_name_char)
        {
            return Err(OrganizerError::Config(format!(
                "session name prefix must be non-empty and use only letters, digits or +=,.@-_, got {:?}",
                self.session_name_prefix
            )));
        }
        if !(MIN_SESSION_DURATION_SECS..=MAX_SESSION_DURATION_SECS)
            .contains(&self.session_duration_secs)
        {
            return Err(OrganizerError::Config(format!(
                "session duration must be between {} and {} seconds, got {}",
                MIN_SESSION_DURATION_SECS, MAX_SESSION_DURATION_SECS, self.session_duration_secs
            )));
        }
        if self.concurrency == 0 {
            return Err(OrganizerError::Config("concurrency must be at least 1".to_string()));
        }
        if self.poll_interval_secs == 0 {
            return Err(OrganizerError::Config(
                "poll interval must be at least 1 second".to_string(),
            ));
        }
        if self.trail_regions.is_empty() {
            return Err(OrganizerError::Config(
                "at least one trail region is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn delegation_settings(&self) -> DelegationSettings {
        DelegationSettings {
            role_name: self.role_name.clone(),
            partition: self.partition.clone(),
            session_name_prefix: self.session_name_prefix.clone(),
            duration_secs: self.session_duration_secs,
        }
    }

    pub fn provisioning_settings(&self) -> ProvisioningSettings {
        ProvisioningSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            timeout: Duration::from_secs(self.provision_timeout_secs),
        }
    }
}

/// `AWS_REGION`, then `AWS_DEFAULT_REGION`, then us-east-1
fn default_region() -> String {
    ["AWS_REGION", "AWS_DEFAULT_REGION"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_REGION.to_string())
}

fn default_trail_regions() -> Vec<String> {
    [
        "ap-south-1",
        "eu-west-2",
        "eu-west-1",
        "ap-northeast-2",
        "ap-northeast-1",
        "sa-east-1",
        "ca-central-1",
        "ap-southeast-1",
        "ap-southeast-2",
        "eu-central-1",
        "us-east-1",
        "us-east-2",
        "us-west-1",
        "us-west-2",
    ]
    .iter()
    .map(|r| r.to_string())
    .collect()
}

fn split_regions(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, OrganizerError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| OrganizerError::Config(format!("{} is not a valid value: {}", key, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = OrganizerConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.role_name, "OrganizationAccountAccessRole");
        assert_eq!(config.session_duration_secs, 900);
        assert_eq!(config.trail_regions.len(), 14);

        let provisioning = config.provisioning_settings();
        assert_eq!(provisioning.poll_interval, Duration::from_secs(10));
        assert_eq!(provisioning.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_session_duration_bounds() {
        let mut config = OrganizerConfig::default();

        config.session_duration_secs = 899;
        assert!(config.validate().is_err());

        config.session_duration_secs = 43_201;
        assert!(config.validate().is_err());

        config.session_duration_secs = 3600;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_match_component_settings() {
        let config = OrganizerConfig::default();

        assert_eq!(config.delegation_settings(), DelegationSettings::default());
        assert_eq!(config.provisioning_settings(), ProvisioningSettings::default());
    }

    #[test]
    fn test_session_prefix_rejected_when_unusable() {
        let mut config = OrganizerConfig::default();

        config.session_name_prefix = String::new();
        assert!(matches!(config.validate(), Err(OrganizerError::Config(_))));

        config.session_name_prefix = "audit team!".to_string();
        assert!(config.validate().is_err());

        config.session_name_prefix = "audit".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = OrganizerConfig {
            concurrency: 0,
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        assert!(matches!(err, OrganizerError::Config(_)));
    }

    #[test]
    fn test_split_regions() {
        assert_eq!(
            split_regions("us-east-1, eu-west-1,,ap-southeast-2 "),
            vec!["us-east-1", "eu-west-1", "ap-southeast-2"]
        );
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: OrganizerConfig =
            serde_json::from_str(r#"{"role_name": "AuditRole", "concurrency": 2}"#).unwrap();

        assert_eq!(config.role_name, "AuditRole");
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.delegation_settings().role_name, "AuditRole");
    }
}
