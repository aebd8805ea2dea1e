use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;

use learnsite::app::remote::{HttpRemote, RemoteServices};
use learnsite::app::router::{AppState, router};
use learnsite::config::SiteConfig;
use learnsite::page::Site;
use learnsite::progress::ProgressStore;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct AppArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Content directory with `<chapter>/<subchapter>.md` files and `images/`.
    #[arg(long, default_value = "content")]
    content: PathBuf,

    /// Progress state file (created on first write).
    #[arg(long, default_value = "learnsite-state.json")]
    state: PathBuf,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    learnsite::logging::init()?;

    let args = AppArgs::parse();
    tracing::info!(?args, "starting learnsite-app");

    let config = SiteConfig::from_env().context("read configuration")?;
    if config.auth_endpoint.is_none() {
        tracing::warn!("LEARNSITE_AUTH_ENDPOINT is not set; endpoint claims will fail");
    }

    let site = Site::open(&args.content, config.clone()).context("load content")?;
    let progress = ProgressStore::open_file(&args.state)?;
    let remote: Arc<dyn RemoteServices> = Arc::new(HttpRemote::new(&config)?);

    let app = router(AppState::new(site, progress, remote));

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
