//! Organizer Library
//!
//! Enumerates and manages resources across every member account of an
//! AWS Organization.
//!
//! ## Architecture
//!
//! - **Account Directory**: paginated organization account listing
//! - **Delegation Broker**: per-account assumed-role sessions
//! - **Fan-Out Aggregator**: delegate, query and collect-or-warn per account
//! - **Account Provisioner**: create-account state machine with a deadline
//!
//! The `aws` module binds the core traits to the AWS SDK.

pub mod aws;
pub mod config;
pub mod organization;

pub use aws::Organizer;
pub use config::OrganizerConfig;
pub use organization::{
    Account, AccountDirectory, AccountProvisioner, AggregationResult, DelegationBroker, FanOut,
    OrganizerError,
};
