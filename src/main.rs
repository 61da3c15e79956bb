//! Organizer CLI
//!
//! Inventories resources across every active account of an AWS
//! Organization and creates new member accounts. Run it with management
//! account credentials.
//!
//! # Usage
//! ```bash
//! # List active accounts (or every account with --all)
//! organizer accounts
//!
//! # Buckets in every active account, or in one account
//! organizer buckets
//! organizer buckets --account-id 123456789012
//!
//! # Delete every trail in one account
//! organizer trails --account-id 123456789012 --purge
//!
//! # Create an account and wait for it
//! organizer create-account --name sandbox --email sandbox@example.com
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use organizer::organization::{
    Account, AccountAlias, Bucket, Distribution, IamUser, ProvisioningRequest, ResourceQuery,
    Trail,
};
use organizer::{Organizer, OrganizerConfig, OrganizerError};

// ============================================================
// CLI Definition
// ============================================================

#[derive(Parser)]
#[command(name = "organizer")]
#[command(about = "Cross-account inventory and provisioning for AWS Organizations", long_about = None)]
#[command(version)]
struct Cli {
    /// Region for the Organizations and STS clients
    #[arg(long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    /// Role assumed in each member account
    #[arg(long, global = true, env = "ORGANIZER_ROLE_NAME")]
    role_name: Option<String>,

    /// Accounts queried at the same time
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Print results as JSON instead of CSV
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List organization accounts
    Accounts {
        /// Include accounts that are not ACTIVE
        #[arg(long)]
        all: bool,
    },

    /// List S3 buckets
    Buckets {
        /// Only query this account
        #[arg(long)]
        account_id: Option<String>,
    },

    /// List IAM users
    Users {
        #[arg(long)]
        account_id: Option<String>,
    },

    /// List IAM account aliases
    Aliases {
        #[arg(long)]
        account_id: Option<String>,
    },

    /// List CloudFront distributions
    Cloudfront {
        #[arg(long)]
        account_id: Option<String>,
    },

    /// List CloudTrail trails
    Trails {
        #[arg(long)]
        account_id: Option<String>,

        /// Delete every trail found (single account only)
        #[arg(long, requires = "account_id")]
        purge: bool,
    },

    /// Create a member account and wait until it is ready
    CreateAccount {
        /// Account name
        #[arg(long)]
        name: String,

        /// Root email address (must be unique across AWS)
        #[arg(long)]
        email: String,

        /// Seconds to wait for the account before giving up
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Only print the new account id
        #[arg(long)]
        quiet: bool,
    },
}

// ============================================================
// Output
// ============================================================

/// One CSV line per record, prefixed with the account id
trait CsvRow {
    fn csv_fields(&self) -> Vec<String>;
}

fn timestamp(value: &Option<chrono::DateTime<chrono::Utc>>) -> String {
    value.map(|t| t.to_rfc3339()).unwrap_or_default()
}

impl CsvRow for Bucket {
    fn csv_fields(&self) -> Vec<String> {
        vec![self.name.clone(), timestamp(&self.created_at)]
    }
}

impl CsvRow for IamUser {
    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.user_name.clone(),
            self.arn.clone(),
            timestamp(&self.created_at),
            timestamp(&self.password_last_used),
        ]
    }
}

impl CsvRow for AccountAlias {
    fn csv_fields(&self) -> Vec<String> {
        vec![self.0.clone()]
    }
}

impl CsvRow for Distribution {
    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.domain_name.clone(),
            self.status.clone(),
            self.aliases.join(";"),
        ]
    }
}

impl CsvRow for Trail {
    fn csv_fields(&self) -> Vec<String> {
        vec![self.arn.clone()]
    }
}

fn account_fields(account: &Account) -> String {
    [
        account.id.as_str(),
        account.display_name(),
        account.email.as_deref().unwrap_or_default(),
        account.status.as_str(),
    ]
    .join(",")
}

fn print_accounts(accounts: &[Account], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(accounts)?);
    } else {
        for account in accounts {
            println!("{}", account_fields(account));
        }
    }
    Ok(())
}

fn print_entries<T: Serialize + CsvRow>(entries: &BTreeMap<String, Vec<T>>, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
    } else {
        for (account_id, items) in entries {
            for item in items {
                println!("{},{}", account_id, item.csv_fields().join(","));
            }
        }
    }
    Ok(())
}

// ============================================================
// Commands
// ============================================================

async fn run_query<Q>(
    organizer: &Organizer,
    query: &Q,
    account_id: Option<&str>,
    json: bool,
) -> Result<()>
where
    Q: ResourceQuery,
    Q::Item: Serialize + CsvRow,
{
    let entries = match account_id {
        Some(id) => {
            let items = organizer.query_account(id, query).await?;
            BTreeMap::from([(id.to_string(), items)])
        }
        None => {
            let result = organizer.collect(query).await?;
            if !result.warnings().is_empty() {
                info!(
                    kind = %result.kind(),
                    skipped = result.warnings().len(),
                    "Some accounts could not be queried"
                );
            }
            result.into_entries()
        }
    };

    print_entries(&entries, json)
}

async fn create_account(
    organizer: &Organizer,
    request: ProvisioningRequest,
    timeout: Duration,
    quiet: bool,
    json: bool,
) -> Result<()> {
    let provisioner = organizer.provisioner();
    let status = provisioner.submit(&request).await?;

    let account = provisioner
        .await_terminal_with_progress(Some(status), timeout, |s| {
            if !quiet {
                info!(request_id = %s.request_id, state = %s.state, "Waiting for account");
            }
        })
        .await?;

    if quiet {
        println!("{}", account.id);
    } else {
        print_accounts(std::slice::from_ref(&account), json)?;
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = OrganizerConfig::from_env()?;
    if let Some(region) = cli.region {
        config.region = region;
    }
    if let Some(role_name) = cli.role_name {
        config.role_name = role_name;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }

    let organizer = Organizer::from_config(config).await?;
    let json = cli.json;

    match cli.command {
        Commands::Accounts { all } => {
            let snapshot = organizer.list_accounts().await?;
            let accounts = if all { snapshot.accounts } else { snapshot.active() };
            print_accounts(&accounts, json)
        }
        Commands::Buckets { account_id } => {
            run_query(&organizer, &organizer.buckets(), account_id.as_deref(), json).await
        }
        Commands::Users { account_id } => {
            run_query(&organizer, &organizer.users(), account_id.as_deref(), json).await
        }
        Commands::Aliases { account_id } => {
            run_query(&organizer, &organizer.aliases(), account_id.as_deref(), json).await
        }
        Commands::Cloudfront { account_id } => {
            run_query(&organizer, &organizer.distributions(), account_id.as_deref(), json).await
        }
        Commands::Trails {
            account_id,
            purge: true,
        } => run_query(&organizer, &organizer.trail_purge(), account_id.as_deref(), json).await,
        Commands::Trails { account_id, .. } => {
            run_query(&organizer, &organizer.trails(), account_id.as_deref(), json).await
        }
        Commands::CreateAccount {
            name,
            email,
            timeout_secs,
            quiet,
        } => {
            let timeout = timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(organizer.provisioner().settings().timeout);
            create_account(
                &organizer,
                ProvisioningRequest::new(name, email),
                timeout,
                quiet,
                json,
            )
            .await
        }
    }
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

// ============================================================
// Main Entry Point
// ============================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_json) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        error!(error = %format!("{:#}", e), "Organizer failed");
        let timed_out = e
            .downcast_ref::<OrganizerError>()
            .is_some_and(OrganizerError::is_timeout);
        std::process::exit(if timed_out { 2 } else { 1 });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_purge() {
        let cli = Cli::try_parse_from([
            "organizer",
            "trails",
            "--account-id",
            "123456789012",
            "--purge",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Commands::Trails { purge: true, account_id: Some(ref id) } if id == "123456789012"
        ));
    }

    #[test]
    fn test_purge_requires_account() {
        assert!(Cli::try_parse_from(["organizer", "trails", "--purge"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["organizer", "buckets", "--json", "--concurrency", "1"])
            .unwrap();

        assert!(cli.json);
        assert_eq!(cli.concurrency, Some(1));
    }

    #[test]
    fn test_csv_rows() {
        let distribution = Distribution {
            id: "E123".to_string(),
            domain_name: "d111.cloudfront.net".to_string(),
            status: "Deployed".to_string(),
            enabled: true,
            aliases: vec!["a.example.com".to_string(), "b.example.com".to_string()],
        };
        assert_eq!(
            distribution.csv_fields().join(","),
            "E123,d111.cloudfront.net,Deployed,a.example.com;b.example.com"
        );

        let mut account = Account::new("123456789012", "prod", "ACTIVE");
        account.email = Some("prod@example.com".to_string());
        assert_eq!(
            account_fields(&account),
            "123456789012,prod,prod@example.com,ACTIVE"
        );
    }
}
