//! Multiplexer service entry point.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vfs_mux::config::Config;
use vfs_mux::Mux;

#[derive(Parser)]
#[command(name = "vfs-mux", about = "User-space virtual file system multiplexer")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration file.
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    let listener = TcpListener::bind(&config.listen).await?;
    info!(listen = %config.listen, "vfs-mux listening");

    let mux = Mux::new(config);
    vfs_mux::handle_forever(mux, listener).await
}
