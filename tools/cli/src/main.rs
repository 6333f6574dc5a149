//! taskmirror CLI - Mirror Google Tasks into a Notion database.
//!
//! This tool runs the mirror as a daemon or a single cycle, provisions the
//! Notion database, and performs the Google OAuth consent flow.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use url::Url;

use taskmirror_common::{Error, SecretString};
use taskmirror_providers::gtasks::{AuthConfig, AuthManager, GoogleTasksConfig, GoogleTasksProvider};
use taskmirror_providers::notion::schema::DATABASE_TITLE;
use taskmirror_providers::notion::{ensure_database, NotionClient, NotionConfig, NotionProvider, Provisioned};
use taskmirror_sync::{Reconciler, SyncConfig, SyncResult};

type TaskReconciler = Reconciler<GoogleTasksProvider, NotionProvider>;

#[derive(Parser)]
#[command(name = "taskmirror")]
#[command(about = "taskmirror - Mirror Google Tasks into a Notion database")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, env = "TASKMIRROR_HTTP_TIMEOUT_SECS", default_value_t = 30, global = true)]
    http_timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the mirror: one cycle now, then one per interval.
    Run {
        #[command(flatten)]
        sync: SyncArgs,
    },

    /// Run a single cycle.
    Once {
        #[command(flatten)]
        sync: SyncArgs,

        /// Print the planned operations without applying them.
        #[arg(long)]
        dry_run: bool,
    },

    /// Create the Notion database, or reuse the configured one, and print its id.
    Setup {
        #[command(flatten)]
        notion: NotionArgs,

        /// Existing database to reuse.
        #[arg(long, env = "NOTION_DATABASE_ID")]
        database_id: Option<String>,

        /// Page under which a new database is created.
        #[arg(long, env = "NOTION_PAGE_ID")]
        page_id: Option<String>,
    },

    /// Authorize read access to Google Tasks and save the token file.
    Authorize {
        #[command(flatten)]
        google: GoogleArgs,
    },
}

#[derive(Args)]
struct NotionArgs {
    /// Notion integration token.
    #[arg(long, env = "NOTION_KEY", hide_env_values = true)]
    notion_key: String,
}

#[derive(Args)]
struct GoogleArgs {
    /// Google OAuth client id.
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    client_id: String,

    /// Google OAuth client secret.
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    /// Token file (default: <config dir>/taskmirror/google-token.json).
    #[arg(long, env = "TASKMIRROR_TOKEN_FILE")]
    token_file: Option<PathBuf>,
}

#[derive(Args)]
struct SyncArgs {
    #[command(flatten)]
    notion: NotionArgs,

    #[command(flatten)]
    google: GoogleArgs,

    /// Target Notion database.
    #[arg(long, env = "NOTION_DATABASE_ID")]
    database_id: String,

    /// Seconds between cycles.
    #[arg(long, env = "TASKMIRROR_INTERVAL_SECS", default_value_t = 180)]
    interval_secs: u64,

    /// Retries for transient provider errors.
    #[arg(long, env = "TASKMIRROR_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let timeout = Duration::from_secs(cli.http_timeout_secs);

    match cli.command {
        Commands::Run { sync } => cmd_run(&sync, timeout).await,

        Commands::Once { sync, dry_run } => cmd_once(&sync, dry_run, timeout).await,

        Commands::Setup {
            notion,
            database_id,
            page_id,
        } => cmd_setup(&notion, database_id.as_deref(), page_id.as_deref(), timeout).await,

        Commands::Authorize { google } => cmd_authorize(&google, timeout).await,
    }
}

/// Token file location, falling back to the user config directory.
fn resolve_token_file(explicit: Option<&PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.clone()),
        None => dirs::config_dir()
            .map(|dir| dir.join("taskmirror").join("google-token.json"))
            .context("Could not determine the config directory; pass --token-file"),
    }
}

fn auth_config(google: &GoogleArgs) -> AuthConfig {
    AuthConfig::new(google.client_id.as_str(), google.client_secret.as_str())
}

/// Connect both providers and build the reconciler.
async fn build_reconciler(args: &SyncArgs, timeout: Duration) -> Result<TaskReconciler> {
    let token_file = resolve_token_file(args.google.token_file.as_ref())?;

    let mut google_config = GoogleTasksConfig::new(auth_config(&args.google), token_file);
    google_config.timeout = timeout;
    let source = GoogleTasksProvider::new(google_config)
        .await
        .context("Failed to initialize Google Tasks")?;

    let mut notion_config = NotionConfig::new(
        SecretString::new(args.notion.notion_key.as_str()),
        args.database_id.as_str(),
    );
    notion_config.timeout = timeout;
    let target = NotionProvider::new(notion_config).context("Failed to initialize Notion")?;

    let config = SyncConfig {
        interval: Duration::from_secs(args.interval_secs),
        max_retries: args.max_retries,
        ..Default::default()
    };

    Ok(Reconciler::new(source, target, config))
}

/// Run the mirror until Ctrl-C.
async fn cmd_run(args: &SyncArgs, timeout: Duration) -> Result<()> {
    let mut reconciler = build_reconciler(args, timeout).await?;
    let handle = reconciler.init_scheduler().delay_first_tick();
    let reconciler = Arc::new(reconciler);

    info!(
        "Mirroring Google Tasks into database {} every {:?}",
        args.database_id,
        reconciler.config().interval
    );

    // Bad credentials abort startup; anything else waits for the next tick.
    match reconciler.run().await {
        Ok(result) => print_result(&result),
        Err(e @ Error::Authentication(_)) => {
            return Err(e).context("Google or Notion rejected the credentials");
        }
        Err(e) => error!("Initial sync failed: {}", e),
    }

    let worker = reconciler.clone();
    let scheduler_task = tokio::spawn(async move {
        handle
            .run(move |request| {
                let worker = worker.clone();
                async move { worker.process_request(request).await }
            })
            .await;
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");

    if let Some(scheduler) = reconciler.scheduler() {
        scheduler.shutdown().await;
    }
    scheduler_task.await.context("Scheduler task panicked")?;

    Ok(())
}

/// Run a single cycle, or print its plan.
async fn cmd_once(args: &SyncArgs, dry_run: bool, timeout: Duration) -> Result<()> {
    let reconciler = build_reconciler(args, timeout).await?;

    if dry_run {
        let plan = reconciler
            .plan_cycle()
            .await
            .context("Failed to compute sync plan")?;

        if plan.is_empty() {
            println!("Nothing to do.");
        } else {
            println!("{} planned operation(s):", plan.len());
            for op in &plan.ops {
                println!("  {}", op);
            }
        }
        return Ok(());
    }

    let result = reconciler.run().await.context("Sync failed")?;
    print_result(&result);

    Ok(())
}

fn print_result(result: &SyncResult) {
    println!("Sync finished in {:?}:", result.duration);
    println!("  Created: {}", result.created);
    println!("  Updated: {}", result.updated);
    println!("  Deleted: {}", result.deleted);
    println!("  Failed: {}", result.failed);
    println!("  Skipped (stale): {}", result.skipped_stale);
}

/// Provision the Notion database.
async fn cmd_setup(
    notion: &NotionArgs,
    database_id: Option<&str>,
    page_id: Option<&str>,
    timeout: Duration,
) -> Result<()> {
    let client = NotionClient::new(SecretString::new(notion.notion_key.as_str()), timeout)
        .context("Failed to create Notion client")?;

    let provisioned = ensure_database(&client, database_id, page_id)
        .await
        .context("Failed to provision the Notion database")?;

    match &provisioned {
        Provisioned::Existing(_) => println!("Reusing the existing database."),
        Provisioned::Created(_) => println!("Created database \"{}\".", DATABASE_TITLE),
    }
    println!(
        "Set your environment variable NOTION_DATABASE_ID to {}",
        compact_id(provisioned.id())
    );

    Ok(())
}

/// Database id in the dash-less form Notion shows in URLs.
fn compact_id(id: &str) -> String {
    id.replace('-', "")
}

/// Run the Google consent flow and save the tokens.
async fn cmd_authorize(google: &GoogleArgs, timeout: Duration) -> Result<()> {
    let token_file = resolve_token_file(google.token_file.as_ref())?;
    let auth = AuthManager::new(auth_config(google), timeout)
        .context("Invalid OAuth configuration")?;

    let (url, csrf_state) = auth.authorization_url();
    println!("Opening the Google consent page. If no browser opens, visit:");
    println!();
    println!("  {}", url);
    println!();
    if let Err(e) = open::that(&url) {
        warn!("Could not open a browser: {}", e);
    }

    println!("After approving, paste the code or the full redirect URL:");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let input = lines
        .next_line()
        .await
        .context("Failed to read authorization code")?
        .unwrap_or_default();
    let code = extract_code(input.trim(), &csrf_state)?;

    let tokens = auth
        .exchange_code(&code)
        .await
        .context("Failed to exchange authorization code")?;
    tokens
        .save(&token_file)
        .await
        .with_context(|| format!("Failed to write {}", token_file.display()))?;

    println!("Saved Google credentials to {}", token_file.display());
    Ok(())
}

/// Accept either a bare code or the redirect URL carrying it.
fn extract_code(input: &str, expected_state: &str) -> Result<String> {
    if input.is_empty() {
        bail!("No authorization code entered");
    }
    if !input.starts_with("http://") && !input.starts_with("https://") {
        return Ok(input.to_string());
    }

    let url = Url::parse(input).context("Invalid redirect URL")?;
    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => bail!("Authorization was denied: {}", value),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        bail!("Redirect URL state does not match this session; run authorize again");
    }
    code.context("Redirect URL has no code parameter")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_once_flags() {
        let cli = Cli::try_parse_from([
            "taskmirror",
            "once",
            "--dry-run",
            "--notion-key",
            "secret_x",
            "--client-id",
            "id",
            "--client-secret",
            "shh",
            "--database-id",
            "db",
            "--interval-secs",
            "60",
        ])
        .unwrap();

        match cli.command {
            Commands::Once { sync, dry_run } => {
                assert!(dry_run);
                assert_eq!(sync.database_id, "db");
                assert_eq!(sync.interval_secs, 60);
                assert_eq!(sync.google.client_id, "id");
            }
            _ => panic!("expected once"),
        }
    }

    #[test]
    fn test_extract_bare_code() {
        assert_eq!(extract_code("4/0Abc", "state").unwrap(), "4/0Abc");
        assert!(extract_code("", "state").is_err());
    }

    #[test]
    fn test_extract_code_from_redirect() {
        let url = "http://localhost:8080/callback?state=xyz&code=4%2F0Abc&scope=tasks";
        assert_eq!(extract_code(url, "xyz").unwrap(), "4/0Abc");
    }

    #[test]
    fn test_extract_code_rejects_wrong_state() {
        let url = "http://localhost:8080/callback?state=other&code=abc";
        assert!(extract_code(url, "xyz").is_err());
    }

    #[test]
    fn test_extract_code_reports_denial() {
        let url = "http://localhost:8080/callback?error=access_denied&state=xyz";
        let err = extract_code(url, "xyz").unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }

    #[test]
    fn test_compact_id() {
        assert_eq!(
            compact_id("1d2e3f40-aaaa-bbbb-cccc-0123456789ab"),
            "1d2e3f40aaaabbbbcccc0123456789ab"
        );
    }

    #[test]
    fn test_explicit_token_file_wins() {
        let path = PathBuf::from("/tmp/token.json");
        assert_eq!(resolve_token_file(Some(&path)).unwrap(), path);
    }
}
