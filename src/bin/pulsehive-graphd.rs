//! `pulsehive-graphd` — daemon entrypoint.
//!
//! Wires together config loading, logging, the graph facade, the runtime
//! supervisor, and the protocol adapters. `--stdio` runs the line-delimited
//! stdio adapter instead of the HTTP+SSE server, for agents that talk to
//! their memory service over a pipe rather than a socket.

use std::path::PathBuf;
use std::sync::Arc;

use pulsehive_graph::{Config, PulseHive};
use tracing_subscriber::EnvFilter;

fn load_config() -> Config {
    let mut config = Config::default();
    if let Ok(path) = std::env::var("PULSEHIVE_DATABASE_PATH") {
        config.database_path = PathBuf::from(path);
    }
    if let Ok(port) = std::env::var("PULSEHIVE_PORT").and_then(|v| v.parse::<u16>().map_err(|_| std::env::VarError::NotPresent)) {
        config.port = port;
    }
    config
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    let config = load_config();
    init_tracing(&config);
    config.validate().map_err(anyhow::Error::from)?;

    let stdio_mode = std::env::args().any(|a| a == "--stdio");
    let graph = Arc::new(PulseHive::open(&config.database_path, config.clone())?);

    if config.backup_on_startup {
        if let Err(e) = pulsehive_graph::supervisor::take_backup(&config.database_path, &config.backup_dir) {
            tracing::warn!(error = %e, "startup backup failed");
        }
    }

    if stdio_mode {
        pulsehive_graph::protocol::stdio::run(&graph)?;
        return Ok(());
    }

    #[cfg(feature = "http")]
    {
        run_http_server(graph, config)?;
    }
    #[cfg(not(feature = "http"))]
    {
        tracing::error!("HTTP adapter not enabled; rebuild with --features http or pass --stdio");
    }

    Ok(())
}

#[cfg(feature = "http")]
fn run_http_server(graph: Arc<PulseHive>, config: Config) -> anyhow::Result<()> {
    use pulsehive_graph::supervisor::{negotiate_port, write_identity_file, Identity};

    let bound = negotiate_port(&config.host, config.port, config.port_probe_limit)?;
    let identity_path = config
        .database_path
        .parent()
        .unwrap_or_else(|| std::path::Path::new("."))
        .join("identity.json");
    let identity = Identity::new(&config, bound.port);
    write_identity_file(&identity_path, &identity)?;
    tracing::info!(port = bound.port, "pulsehive-graphd listening");

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async move {
        bound.listener.set_nonblocking(true)?;
        let listener = tokio::net::TcpListener::from_std(bound.listener)?;
        let router = pulsehive_graph::protocol::http::router(graph.clone(), None);

        let backup_config = config.clone();
        if backup_config.backup_interval_secs > 0 {
            tokio::spawn(backup_loop(backup_config));
        }

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok::<(), anyhow::Error>(())
    })
}

#[cfg(feature = "http")]
async fn backup_loop(config: Config) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(config.backup_interval_secs));
    loop {
        ticker.tick().await;
        if let Err(e) = pulsehive_graph::supervisor::take_backup(&config.database_path, &config.backup_dir) {
            tracing::warn!(error = %e, "periodic backup failed");
            continue;
        }
        if let Err(e) = pulsehive_graph::supervisor::prune_backups(
            &config.backup_dir,
            config.min_backups,
            config.min_backup_age_days,
        ) {
            tracing::warn!(error = %e, "backup pruning failed");
        }
    }
}

#[cfg(feature = "http")]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
