//! Resource Fan-Out Aggregator
//!
//! For every account: delegate, run one resource query with the session,
//! then record the result or warn and move on. A failure in one account
//! never aborts the batch.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::delegation::DelegationBroker;
use super::error::OrganizerError;
use super::types::{Account, DelegatedSession, ResourceKind};

/// A per-account resource query run with delegated credentials
#[async_trait]
pub trait ResourceQuery: Send + Sync {
    type Item: Send;

    /// Resource kind, used for the session purpose tag and warnings
    fn kind(&self) -> ResourceKind;

    /// List resources inside the session's account. The session is
    /// consumed: it serves exactly one query.
    async fn query(&self, session: DelegatedSession) -> Result<Vec<Self::Item>>;
}

/// A per-account failure observed during a fan-out
#[derive(Debug)]
pub struct FanOutWarning {
    pub account_id: String,
    pub account_name: String,
    pub error: OrganizerError,
}

impl std::fmt::Display for FanOutWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "account {} ({}): {}", self.account_id, self.account_name, self.error)
    }
}

/// Resources keyed by account id.
///
/// An account is present only if its query succeeded, including when it
/// found nothing; failed accounts are absent and listed in `warnings`.
#[derive(Debug)]
pub struct AggregationResult<T> {
    kind: ResourceKind,
    entries: BTreeMap<String, Vec<T>>,
    warnings: Vec<FanOutWarning>,
}

impl<T> AggregationResult<T> {
    fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn get(&self, account_id: &str) -> Option<&[T]> {
        self.entries.get(account_id).map(Vec::as_slice)
    }

    /// Whether the account was queried successfully
    pub fn contains(&self, account_id: &str) -> bool {
        self.entries.contains_key(account_id)
    }

    /// Number of accounts with an entry
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_items(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn warnings(&self) -> &[FanOutWarning] {
        &self.warnings
    }

    pub fn into_entries(self) -> BTreeMap<String, Vec<T>> {
        self.entries
    }
}

/// Runs a [`ResourceQuery`] across accounts with bounded concurrency
#[derive(Clone)]
pub struct FanOut {
    broker: DelegationBroker,
    concurrency: usize,
}

impl FanOut {
    /// `concurrency` of 1 queries accounts one at a time, in order
    pub fn new(broker: DelegationBroker, concurrency: usize) -> Self {
        Self {
            broker,
            concurrency: concurrency.max(1),
        }
    }

    /// Query every given account; never fails as a whole
    pub async fn collect<Q>(&self, accounts: &[Account], query: &Q) -> AggregationResult<Q::Item>
    where
        Q: ResourceQuery + ?Sized,
    {
        let kind = query.kind();
        let mut result = AggregationResult::new(kind);

        info!(
            kind = %kind,
            accounts = accounts.len(),
            concurrency = self.concurrency,
            "Starting fan-out"
        );

        let outcomes = stream::iter(accounts)
            .map(|account| async move {
                let outcome = self.query_account(&account.id, query).await;
                (account, outcome)
            })
            .buffer_unordered(self.concurrency);
        futures::pin_mut!(outcomes);

        while let Some((account, outcome)) = outcomes.next().await {
            match outcome {
                Ok(items) => {
                    result.entries.insert(account.id.clone(), items);
                }
                Err(error) => {
                    warn!(
                        account_id = %account.id,
                        account_name = %account.display_name(),
                        error = %error,
                        "Could not list {} for account",
                        kind
                    );
                    result.warnings.push(FanOutWarning {
                        account_id: account.id.clone(),
                        account_name: account.display_name().to_string(),
                        error,
                    });
                }
            }
        }

        info!(
            kind = %kind,
            succeeded = result.len(),
            failed = result.warnings.len(),
            items = result.total_items(),
            "Fan-out complete"
        );

        result
    }

    /// Delegate into one account and run the query there
    pub async fn query_account<Q>(
        &self,
        account_id: &str,
        query: &Q,
    ) -> Result<Vec<Q::Item>, OrganizerError>
    where
        Q: ResourceQuery + ?Sized,
    {
        let kind = query.kind();
        let session = self.broker.delegate(account_id, kind.purpose_tag()).await?;

        query
            .query(session)
            .await
            .map_err(|e| OrganizerError::Query {
                account_id: account_id.to_string(),
                kind,
                message: format!("{:#}", e),
            })
    }
}
