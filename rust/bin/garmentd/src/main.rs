//! `garmentd`: the garment ERP server.
//!
//! Usage:
//!   garmentd -c <context-name-or-path> [--listen <addr>]
//!
//! The context name resolves to `/etc/garment/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use garmentd::{bootstrap, build_router, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "garmentd", about = "Garment ERP server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", env = "GARMENT_CONFIG")]
    config: String,

    /// Listen address, overriding `[server] listen`.
    #[arg(long = "listen")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = ServerConfig::resolve_path(&cli.config);
    let config = ServerConfig::load(&config_path)?;

    // RUST_LOG wins over the config file.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.filter)))
        .init();
    info!(path = %config_path.display(), "loaded configuration");

    bootstrap::verify_config(&config)?;
    let db = bootstrap::open_store(&config)?;
    let app = build_router(db, config.auth_config());

    let listen = cli.listen.unwrap_or_else(|| config.server.listen.clone());
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    info!(%listen, "garmentd listening");
    axum::serve(listener, app).await?;
    Ok(())
}
