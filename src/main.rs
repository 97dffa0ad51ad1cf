use std::sync::Arc;

use agrochoco::{
    gateway::Gateway,
    session::{DbStore, Session},
};
use agrochoco_config::Config;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::LevelFilter, fmt::time::LocalTime, prelude::*};

mod server;

fn init_tracing(config: &Config) -> WorkerGuard {
    let file_appender =
        tracing_appender::rolling::daily(&config.log.directory, &config.log.file_prefix);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(LevelFilter::INFO)
        .with(tracing_subscriber::fmt::layer().with_timer(LocalTime::rfc_3339()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, load_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    let _guard = init_tracing(&config);
    if let Some(e) = load_error {
        warn!("Using default configuration: {e:#}");
    }
    info!("Backend at {}", config.api.base_url);

    let store = DbStore::connect(&config.session.db_url).await?;
    let session = Session::new(Arc::new(store));
    if !session.is_logged_in().await? {
        warn!("No stored session, requests will be sent without a token");
    }
    let gateway = Gateway::from_config(&config, session)?;
    server::run(gateway, config.server.port).await
}
