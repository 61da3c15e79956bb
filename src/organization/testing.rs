//! In-memory collaborators for unit tests

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use super::delegation::CredentialExchange;
use super::directory::DirectoryService;
use super::fanout::ResourceQuery;
use super::provisioning::ProvisioningService;
use super::types::*;

/// Directory that serves fixed pages, chaining them with tokens
pub struct MockDirectory {
    pages: Vec<Vec<Account>>,
    final_token: Option<String>,
    fail_on_page: Option<usize>,
    calls: AtomicUsize,
}

impl MockDirectory {
    pub fn new(pages: Vec<Vec<Account>>) -> Self {
        Self {
            pages,
            final_token: None,
            fail_on_page: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Token returned with the last page (`None` or empty both end paging)
    pub fn with_final_token(mut self, token: Option<String>) -> Self {
        self.final_token = token;
        self
    }

    pub fn failing_on_page(mut self, page: usize) -> Self {
        self.fail_on_page = Some(page);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectoryService for MockDirectory {
    async fn list_accounts_page(&self, next_token: Option<String>) -> Result<AccountPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let index = match next_token {
            None => 0,
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| anyhow!("InvalidInputException: bad token {}", token))?,
        };

        if self.fail_on_page == Some(index) {
            bail!("TooManyRequestsException: rate exceeded");
        }

        let accounts = self.pages.get(index).cloned().unwrap_or_default();
        let next_token = if index + 1 < self.pages.len() {
            Some(format!("page-{}", index + 1))
        } else {
            self.final_token.clone()
        };

        Ok(AccountPage {
            accounts,
            next_token,
        })
    }
}

/// Credential exchange that records every request
#[derive(Default)]
pub struct MockExchange {
    failing: HashSet<String>,
    requests: Mutex<Vec<(String, String, i32)>>,
}

impl MockExchange {
    pub fn failing_for(mut self, account_ids: &[&str]) -> Self {
        self.failing = account_ids.iter().map(|id| id.to_string()).collect();
        self
    }

    /// (role ARN, session name, duration) per call, in call order
    pub fn requests(&self) -> Vec<(String, String, i32)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialExchange for MockExchange {
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        duration_secs: i32,
    ) -> Result<SessionCredentials> {
        self.requests.lock().unwrap().push((
            role_arn.to_string(),
            session_name.to_string(),
            duration_secs,
        ));

        let account_id = role_arn.split(':').nth(4).unwrap_or_default();
        if self.failing.contains(account_id) {
            bail!("AccessDenied: not authorized to perform sts:AssumeRole on {}", role_arn);
        }

        Ok(SessionCredentials {
            access_key_id: format!("ASIA{}", account_id),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
            expires_at: Utc::now() + chrono::Duration::seconds(duration_secs as i64),
        })
    }
}

/// Resource query returning fixed names per account
pub struct MockQuery {
    kind: ResourceKind,
    items: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl MockQuery {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            items: HashMap::new(),
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_items(mut self, account_id: &str, items: &[&str]) -> Self {
        self.items.insert(
            account_id.to_string(),
            items.iter().map(|i| i.to_string()).collect(),
        );
        self
    }

    pub fn failing_for(mut self, account_ids: &[&str]) -> Self {
        self.failing = account_ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Accounts whose sessions reached the query, sorted
    pub fn sessions_seen(&self) -> Vec<String> {
        let mut seen = self.seen.lock().unwrap().clone();
        seen.sort();
        seen
    }
}

#[async_trait]
impl ResourceQuery for MockQuery {
    type Item = String;

    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn query(&self, session: DelegatedSession) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(session.account_id.clone());

        if session.purpose != self.kind.purpose_tag() {
            bail!("session tagged {} used for {}", session.purpose, self.kind);
        }
        if self.failing.contains(&session.account_id) {
            bail!("AccessDenied: listing {} is not permitted", self.kind);
        }

        Ok(self
            .items
            .get(&session.account_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Provisioning service replaying a scripted status sequence.
///
/// Once the script is exhausted every poll reports IN_PROGRESS.
pub struct MockProvisioning {
    submit_error: Option<String>,
    script: Mutex<VecDeque<Result<ProvisioningStatus, String>>>,
    poll_delay: Option<Duration>,
    submissions: AtomicUsize,
    polls: AtomicUsize,
    describes: AtomicUsize,
}

impl MockProvisioning {
    pub const REQUEST_ID: &'static str = "car-0123456789abcdef";

    pub fn new(script: Vec<Result<ProvisioningStatus, String>>) -> Self {
        Self {
            submit_error: None,
            script: Mutex::new(script.into()),
            poll_delay: None,
            submissions: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            describes: AtomicUsize::new(0),
        }
    }

    pub fn rejecting_submission(mut self, reason: &str) -> Self {
        self.submit_error = Some(reason.to_string());
        self
    }

    /// Every status call waits this long before answering
    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = Some(delay);
        self
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn describes(&self) -> usize {
        self.describes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProvisioningService for MockProvisioning {
    async fn create_account(&self, _request: &ProvisioningRequest) -> Result<ProvisioningStatus> {
        self.submissions.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = &self.submit_error {
            bail!("{}", reason);
        }
        Ok(ProvisioningStatus::in_progress(Self::REQUEST_ID))
    }

    async fn describe_create_account_status(&self, request_id: &str) -> Result<ProvisioningStatus> {
        if let Some(delay) = self.poll_delay {
            tokio::time::sleep(delay).await;
        }
        self.polls.fetch_add(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(status)) => Ok(status),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(ProvisioningStatus::in_progress(request_id)),
        }
    }

    async fn describe_account(&self, account_id: &str) -> Result<Account> {
        self.describes.fetch_add(1, Ordering::SeqCst);

        let mut account = Account::new(account_id, "sandbox", "ACTIVE");
        account.email = Some("sandbox@example.com".to_string());
        account.joined_method = Some("CREATED".to_string());
        Ok(account)
    }
}

/// Counts WARN events emitted on the current thread while installed
#[derive(Clone, Default)]
pub struct WarnCounter {
    count: Arc<AtomicUsize>,
}

impl WarnCounter {
    /// Install as the thread's default subscriber until the guard drops
    pub fn install(&self) -> DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }
}
