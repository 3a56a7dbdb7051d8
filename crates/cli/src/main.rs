//! confab — webhook-driven chat automation core.

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::Context,
    async_trait::async_trait,
    clap::{Parser, Subcommand},
    sqlx::sqlite::SqlitePoolOptions,
    tracing::{debug, info, warn},
    tracing_subscriber::EnvFilter,
};

use {
    confab_common::{FlowEngine, InboundMessage, OutboundSender},
    confab_config::{ConfabConfig, loader},
    confab_dispatch::{CoordinatorConfig, JobQueue, LockPolicy, WebhookCoordinator},
    confab_gateway::AppState,
    confab_live::{LiveModeService, SqliteTicketRepo, TicketRepository},
    confab_locks::UserLockManager,
    confab_sessions::{SessionStore, SessionTtl},
    confab_store::{KvStore, SqliteKv},
    confab_whatsapp::CloudApiClient,
};

#[derive(Parser)]
#[command(name = "confab", about = "Confab — webhook-driven chat automation core")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,

    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Config file path (overrides discovery).
    #[arg(long, global = true, env = "CONFAB_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database URL (overrides config value).
    #[arg(long, global = true, env = "CONFAB_DATABASE_URL")]
    database_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook gateway (default when no subcommand is provided).
    Serve,
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Print the config file path that would be used.
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let mut config = match &cli.config {
        Some(path) => loader::load_config(path)?,
        None => loader::discover_and_load(),
    };
    if let Some(bind) = &cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(url) = &cli.database_url {
        config.database.url = url.clone();
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Config { action } => {
            match action {
                ConfigAction::Show => println!("{}", toml::to_string_pretty(&config)?),
                ConfigAction::Path => {
                    println!("{}", loader::find_or_default_config_path().display());
                },
            }
            Ok(())
        },
    }
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.clone()));
    if cli.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Stand-in flow engine wired until a real one is plugged in: logs the
/// message and does nothing else.
struct LogOnlyEngine;

#[async_trait]
impl FlowEngine for LogOnlyEngine {
    async fn process_inbound(&self, msg: &InboundMessage) -> anyhow::Result<()> {
        info!(
            user_id = %msg.user_id,
            message_id = %msg.message_id,
            kind = ?msg.kind,
            "flow engine not configured; message acknowledged"
        );
        Ok(())
    }
}

async fn serve(config: ConfabConfig) -> anyhow::Result<()> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database.url)
        .await
        .with_context(|| format!("failed to open database {}", config.database.url))?;
    confab_store::run_migrations(&pool).await?;
    confab_live::run_migrations(&pool).await?;

    let kv: Arc<dyn KvStore> = Arc::new(SqliteKv::with_pool(pool.clone()));
    let sessions = SessionStore::new(
        Arc::clone(&kv),
        SessionTtl {
            user: config.session.user_ttl(),
            global: config.session.global_ttl(),
        },
    );
    let locks = Arc::new(UserLockManager::with_poll_interval(
        Arc::clone(&kv),
        config.lock.poll(),
    ));
    let outbound: Arc<dyn OutboundSender> = Arc::new(CloudApiClient::new(
        &config.whatsapp.api_base,
        &config.whatsapp.phone_number_id,
        &config.whatsapp.access_token,
    ));
    let tickets: Arc<dyn TicketRepository> = Arc::new(SqliteTicketRepo::with_pool(pool));
    let live = Arc::new(LiveModeService::new(sessions.clone(), tickets, outbound));

    let queue = Arc::new(JobQueue::new(
        Arc::clone(&kv),
        config.dispatch.mode,
        config.dispatch.dedup_ttl(),
    ));
    let coordinator = Arc::new(WebhookCoordinator::new(
        CoordinatorConfig {
            app_secret: config.whatsapp.app_secret.clone(),
            verify_token: config.whatsapp.verify_token.clone(),
            phone_number_id: config.whatsapp.phone_number_id.clone(),
            lock: LockPolicy {
                lease: config.lock.lease(),
                wait: config.lock.wait(),
            },
        },
        queue,
        locks,
        Arc::clone(&live),
        Arc::new(LogOnlyEngine),
    ));

    if config.whatsapp.app_secret.is_empty() {
        warn!("whatsapp.app_secret is empty; every delivery will fail signature verification");
    }

    spawn_expiry_sweeper(Arc::clone(&kv));

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("invalid bind address")?;
    confab_gateway::serve(
        AppState {
            coordinator,
            live,
            sessions,
        },
        addr,
    )
    .await
}

/// Housekeeping: reads already filter on expiry, this just keeps the
/// table from accumulating dead rows.
fn spawn_expiry_sweeper(kv: Arc<dyn KvStore>) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            match kv.purge_expired().await {
                Ok(0) => {},
                Ok(rows) => debug!(rows, "purged expired kv entries"),
                Err(e) => warn!(error = %e, "expiry sweep failed"),
            }
        }
    });
}
