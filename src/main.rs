mod api;
mod gateway;

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wabridge_channels::whatsapp::WhatsAppSession;
use wabridge_core::config::{self, Config, WebhookStore};
use wabridge_core::traits::SessionClient;

#[derive(Parser)]
#[command(
    name = "wabridge",
    version,
    about = "WhatsApp to webhook relay bridge"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml", env = "WABRIDGE_CONFIG")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bridge.
    Start,
    /// Show configuration, webhook and session status.
    Status,
}

/// Console plus daily rolling file logging. `RUST_LOG` overrides the configured level.
fn init_logging(cfg: &Config) -> anyhow::Result<WorkerGuard> {
    let logs = cfg.bridge.logs_path();
    std::fs::create_dir_all(&logs)?;
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&logs, "wabridge.log"));

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.bridge.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()?;
    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start => {
            let cfg = config::load(&cli.config)?;
            let _log_guard = init_logging(&cfg)?;

            let session: Arc<dyn SessionClient> = Arc::new(WhatsAppSession::new(
                cfg.whatsapp.clone(),
                cfg.bridge.data_path(),
            ));

            println!("wabridge — Starting bridge...");
            let gw = gateway::Gateway::new(cfg, session);
            gw.run(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("failed to listen for shutdown signal: {e}");
                    std::future::pending::<()>().await;
                }
            })
            .await?;
        }
        Commands::Status => {
            let cfg = config::load(&cli.config)?;
            println!("wabridge — Status Check\n");
            println!("Config: {}", cli.config);
            println!("Data dir: {}", cfg.bridge.data_path().display());
            println!();

            let webhooks = WebhookStore::new(cfg.bridge.webhook_path());
            println!(
                "  webhook: {}",
                match webhooks.load() {
                    Ok(Some(hook)) => format!("configured ({})", hook.url),
                    Ok(None) => "not configured".to_string(),
                    Err(e) => format!("unreadable ({e})"),
                }
            );

            let session = WhatsAppSession::new(cfg.whatsapp.clone(), cfg.bridge.data_path());
            println!(
                "  whatsapp session: {}",
                if session.has_persisted_session() {
                    "saved (will resume without a QR scan)"
                } else {
                    "none (a QR scan is required)"
                }
            );
            println!(
                "  api: {}",
                if cfg.api.enabled {
                    format!(
                        "http://{}:{} (auth: {})",
                        cfg.api.host,
                        cfg.api.port,
                        if cfg.api.api_key.is_empty() {
                            "disabled"
                        } else {
                            "enforced"
                        }
                    )
                } else {
                    "disabled".to_string()
                }
            );
        }
    }

    Ok(())
}
