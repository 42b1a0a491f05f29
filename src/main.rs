use anyhow::Context;
use clap::Parser;
use signalbot::api::{Mt5BridgeClient, SupabaseClient};
use signalbot::config::{BackendKind, BotConfig};
use signalbot::db::PostgresStore;
use signalbot::logging::init_tracing;
use signalbot::{Bot, SignalStore, Terminal};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "signalbot")]
#[command(about = "Executes backend trading signals on an MT5 terminal")]
struct Cli {
    /// Config file (defaults to ./signalbot.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run one poll/execute/monitor cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = BotConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let _log_guard = init_tracing(&config.logging).context("failed to initialize logging")?;

    tracing::info!("🚀 MT5 signal bot starting");
    tracing::info!("  Backend: {:?}", config.backend.kind);
    tracing::info!("  Bridge: {}", config.terminal.bridge_url);
    tracing::info!("  Min confidence: {}%", config.trading.min_confidence);
    tracing::info!("  Volume: {} lots", config.trading.volume);
    tracing::info!("  Poll interval: {}s", config.trading.poll_interval_secs);

    let store = connect_store(&config).await?;
    let terminal: Arc<dyn Terminal> = Arc::new(
        Mt5BridgeClient::new(
            &config.terminal.bridge_url,
            config
                .terminal
                .api_token
                .as_ref()
                .map(|token| token.expose().to_string()),
        )
        .context("failed to create MT5 bridge client")?,
    );

    let mut bot = Bot::new(&config, store, terminal);

    if cli.once {
        let report = bot.run_once().await?;
        tracing::info!(
            "Cycle done: {} fetched, {} executed, {} failed, {} position(s) updated",
            report.fetched,
            report.executed,
            report.failed,
            report.positions.updated
        );
        return Ok(());
    }

    bot.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await?;

    Ok(())
}

async fn connect_store(config: &BotConfig) -> anyhow::Result<Arc<dyn SignalStore>> {
    match config.backend.kind {
        BackendKind::Rest => {
            tracing::info!("Using Supabase REST backend at {}", config.backend.url);
            Ok(Arc::new(SupabaseClient::new(
                config.backend.url.as_str(),
                config.backend.service_key.expose(),
            )))
        }
        BackendKind::Postgres => {
            let url = config
                .backend
                .database_url
                .as_ref()
                .context("backend.database_url is required for the postgres backend")?;
            let store = PostgresStore::connect(url.expose())
                .await
                .context("failed to connect to Postgres")?;
            tracing::info!("Postgres backend connected, migrations applied");
            Ok(Arc::new(store))
        }
    }
}
