use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidmirror::{
    config::Config,
    database::Database,
    pipeline::{Pipeline, ProviderRegistry},
    telegram::{MessagingClient, TelegramClient},
    web::{WebServer, WEBHOOK_PATH},
};

#[derive(Parser)]
#[command(name = "vidmirror")]
#[command(version)]
#[command(about = "Mirrors videos posted to a chat bot onto two hosting providers")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Print the effective configuration with secrets masked and exit
    #[arg(long)]
    dump_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("vidmirror={},tower_http=trace", cli.log_level)
    } else {
        format!("vidmirror={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting vidmirror v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }
    config.validate()?;

    if cli.dump_config {
        println!("{}", config.to_redacted_toml()?);
        return Ok(());
    }

    info!("Using database: {}", config.database.url);
    let database = Database::new(&config.database).await?;
    database.migrate().await?;
    info!("Database connection established and migrations applied");

    let telegram = Arc::new(TelegramClient::new(&config.telegram));
    let messaging: Arc<dyn MessagingClient> = telegram.clone();
    let providers = ProviderRegistry::from_config(&config.providers);
    let pipeline = Pipeline::new(&config, database.clone(), messaging, providers);

    if config.telegram.register_webhook {
        match config.web.public_url.as_deref() {
            Some(public_url) => {
                let url = format!("{}{}", public_url.trim_end_matches('/'), WEBHOOK_PATH);
                telegram
                    .set_webhook(&url, config.web.webhook_secret.as_deref())
                    .await?;
                info!("Webhook registered at {}", url);
            }
            None => warn!("telegram.register_webhook is set but web.public_url is not; skipping"),
        }
    }

    let web_server = WebServer::new(config, database, pipeline)?;
    info!(
        "Starting web server on {}:{}",
        web_server.host(),
        web_server.port()
    );
    web_server.serve().await?;

    Ok(())
}
