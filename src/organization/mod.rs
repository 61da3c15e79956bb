//! Organization Core
//!
//! Cloud-agnostic control flow for cross-account work. Every remote
//! collaborator is reached through a trait so the AWS bindings in
//! [`crate::aws`] and the in-memory fakes used by tests are interchangeable.
//!
//! ## Failure policy
//!
//! - Directory listing failures abort the enclosing operation.
//! - Per-account delegation or query failures during a fan-out are logged,
//!   recorded as warnings and leave that account absent from the result.
//! - Provisioning failures and timeouts are always surfaced to the caller.

mod delegation;
mod directory;
mod error;
mod fanout;
mod provisioning;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub(crate) use delegation::is_session_name_char;
pub use delegation::{CredentialExchange, DelegationBroker, DelegationSettings};
pub use directory::{AccountDirectory, DirectoryService};
pub use error::OrganizerError;
pub use fanout::{AggregationResult, FanOut, FanOutWarning, ResourceQuery};
pub use provisioning::{AccountProvisioner, ProvisioningService, ProvisioningSettings};
pub use types::*;
