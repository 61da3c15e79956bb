//! Account Directory
//!
//! Paginated listing of every account in the organization.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::error::OrganizerError;
use super::types::{Account, AccountPage, AccountSnapshot};

/// Organization directory service
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Fetch one page of accounts, starting at `next_token` when given
    async fn list_accounts_page(&self, next_token: Option<String>) -> Result<AccountPage>;
}

/// Reads the organization's accounts through a [`DirectoryService`]
#[derive(Clone)]
pub struct AccountDirectory {
    service: Arc<dyn DirectoryService>,
}

impl AccountDirectory {
    pub fn new(service: Arc<dyn DirectoryService>) -> Self {
        Self { service }
    }

    /// List every account, following continuation tokens until the
    /// service returns none.
    ///
    /// Any page failure aborts the listing; no partial result is returned.
    pub async fn list_all(&self) -> Result<AccountSnapshot, OrganizerError> {
        let mut accounts = Vec::new();
        let mut next_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .service
                .list_accounts_page(next_token.take())
                .await
                .map_err(|e| OrganizerError::remote("list accounts", e))?;
            pages += 1;

            debug!(page = pages, count = page.accounts.len(), "Fetched account page");
            accounts.extend(page.accounts);

            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        info!(accounts = accounts.len(), pages = pages, "Listed organization accounts");
        Ok(AccountSnapshot::new(accounts))
    }

    /// Accounts whose status is exactly `ACTIVE`, in directory order
    pub async fn list_active(&self) -> Result<Vec<Account>, OrganizerError> {
        Ok(self.list_all().await?.active())
    }
}
