//! opsdash CLI: poll the dashboard backend and render panels to the
//! terminal.

use std::io::stdout;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opsdash::client::DashboardClient;
use opsdash::config::Config;
use opsdash::render::{Renderer, TextRenderer};
use opsdash::status::poller::{PanelState, PollScheduler};
use opsdash::status::StatusResource;

#[derive(Debug, Parser)]
#[command(name = "opsdash", about = "Operations dashboard status watcher")]
struct Cli {
    /// Base URL of the status backend.
    #[arg(long, env = "DASHBOARD_URL")]
    url: Option<String>,

    /// Poll interval in seconds.
    #[arg(long)]
    interval: Option<u64>,

    /// Poll every resource once, render, and exit.
    #[arg(long)]
    once: bool,

    /// Only poll these resources (e.g. --resource rolls --resource capital).
    #[arg(long = "resource", value_name = "NAME")]
    resources: Vec<String>,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opsdash=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn selected_resources(names: &[String]) -> Result<Vec<StatusResource>> {
    if names.is_empty() {
        return Ok(StatusResource::ALL.to_vec());
    }
    names
        .iter()
        .map(|name| {
            StatusResource::ALL
                .into_iter()
                .find(|r| r.name() == name)
                .with_context(|| format!("unknown resource '{name}'"))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(url) = cli.url {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(secs) = cli.interval {
        config.poll_interval = std::time::Duration::from_secs(secs);
    }

    let resources = selected_resources(&cli.resources)?;
    info!(url = %config.base_url, resources = resources.len(), "starting dashboard watcher");

    let client = Arc::new(DashboardClient::new(&config)?);
    let scheduler = PollScheduler::new(client, config);
    let (mut updates, _refresh, shutdown) = scheduler.spawn(&resources);

    let mut renderer = TextRenderer::new(stdout());

    if cli.once {
        // Each resource resolves (Ready or Error) exactly once after its
        // initial Loading event.
        let mut resolved = 0;
        while resolved < resources.len() {
            let Some(update) = updates.recv().await else {
                break;
            };
            if !matches!(update.state, PanelState::Loading) {
                resolved += 1;
            }
            renderer.apply(&update);
        }
        let _ = shutdown.send(true);
        return Ok(());
    }

    loop {
        tokio::select! {
            maybe_update = updates.recv() => {
                match maybe_update {
                    Some(update) => renderer.apply(&update),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                let _ = shutdown.send(true);
                break;
            }
        }
    }

    Ok(())
}
