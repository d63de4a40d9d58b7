mod main_runtime;

use anyhow::Context;
use botherd::cli::{self, Cli, Commands};
use botherd::{api, AppContext};
use clap::Parser;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info};

use main_runtime::{init_logging, init_logging_simple};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config().context("loading configuration")?;

    if let Err(errors) = config.validate() {
        anyhow::bail!("invalid configuration: {}", errors.join("; "));
    }

    match &cli.command {
        Some(Commands::List) => {
            init_logging_simple();
            cli::list_workers(&config)?;
        }
        Some(Commands::Run) | None => {
            init_logging(&config.logging);
            run(config).await?;
        }
    }

    Ok(())
}

async fn run(config: botherd::AppConfig) -> anyhow::Result<()> {
    info!(
        "Starting supervisor for {} (heartbeat every {}ms, policy {})",
        config.supervisor.bot_dir.display(),
        config.supervisor.heartbeat_interval_ms,
        config.supervisor.failure_policy
    );

    let context = AppContext::build(config)
        .await
        .context("starting workers")?;

    let snapshot_task = context.snapshots.as_ref().map(|s| s.start());

    let server_task = if context.config.api.enabled {
        let addr: SocketAddr = format!("{}:{}", context.config.api.host, context.config.api.port)
            .parse()
            .context("parsing API listen address")?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {}", addr))?;
        let router = api::create_router(context.api_state());
        info!("Control API listening on http://{}", addr);
        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!("Control API stopped: {}", e);
            }
        }))
    } else {
        None
    };

    signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("Shutdown requested");

    context.shutdown().await;
    if let Some(task) = server_task {
        task.abort();
    }
    if let Some(task) = snapshot_task {
        let _ = task.await;
    }

    info!("Supervisor stopped");
    Ok(())
}
