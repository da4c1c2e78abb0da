//! DVS Controller
//!
//! Reconciles the distributed switches, port groups and bindings listed in a
//! declaration file against vSphere, once, and exits non-zero if any object
//! could not be brought in line.

use anyhow::{Context, Result};
use clap::Parser;
use dvs_controller::config::{Action, Cli};
use dvs_controller::{Controller, Reconciler, RunSummary, StateFile, TaskAwaiter};
use dvs_resources::Declarations;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vsphere_client::VSphereClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    info!("Starting DVS Controller ({:?})", cli.action);
    info!("Configuration:");
    info!("  vCenter: {} (API release {})", cli.url, cli.api_release);
    info!("  Declarations: {}", cli.declarations.display());
    info!("  State: {}", cli.state.display());

    let declarations = Declarations::from_file(&cli.declarations)
        .with_context(|| format!("loading declarations from {}", cli.declarations.display()))?;
    let mut state = StateFile::load(&cli.state)?;

    let client = VSphereClient::login(
        cli.url.clone(),
        &cli.user,
        &cli.password,
        cli.api_release.clone(),
        cli.insecure,
    )
    .await
    .with_context(|| format!("logging in to {}", cli.url))?;
    info!("Logged in to {}", cli.url);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing the current step");
            on_signal.cancel();
        }
    });

    let reconciler = Reconciler::new(Box::new(client))
        .with_awaiter(TaskAwaiter::default().with_timeout(cli.task_timeout()))
        .with_cancellation(cancel);
    let controller = Controller::new(reconciler, declarations);

    let summary = match cli.action {
        Action::Apply => controller.apply(&mut state).await,
        Action::Destroy => controller.destroy(&mut state).await,
        Action::Refresh => controller.refresh(&mut state).await,
    };
    state.save(&cli.state)?;
    report(&summary);

    if !summary.is_success() {
        anyhow::bail!("{} object(s) failed", summary.failures.len());
    }
    Ok(())
}

fn report(summary: &RunSummary) {
    info!(
        "Done: {} created, {} unchanged, {} recreated, {} deleted, {} forgotten, {} failed",
        summary.created.len(),
        summary.unchanged.len(),
        summary.recreated.len(),
        summary.deleted.len(),
        summary.forgotten.len(),
        summary.failures.len()
    );
    for failure in &summary.failures {
        warn!("  {}: {}", failure.object, failure.error);
    }
}
