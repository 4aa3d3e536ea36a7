use std::sync::Arc;

use node_registrar::connect;
use node_registrar::metrics;
use node_registrar::Controller;
use node_registrar::Error;
use node_registrar::HttpRegistrar;
use node_registrar::KubeNodeStore;
use node_registrar::NodeWatcher;
use node_registrar::Reconciler;
use node_registrar::RegistrarConfig;
use node_registrar::Result;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    // Initializing Logs
    init_observability();

    let settings = RegistrarConfig::new()?.validate()?;
    info!(?settings, "configuration loaded");

    // Initializing Shutdown Signal
    let shutdown = CancellationToken::new();

    let client = connect(&settings.cluster).await.map_err(|e| {
        error!("cannot reach control plane: {:?}", e);
        e
    })?;

    if settings.monitoring.prometheus_enabled {
        let listen_addr = settings.monitoring.listen_addr();
        let token = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics::start_server(listen_addr, token).await {
                error!("metrics server stopped: {:?}", e);
            }
        });
    }

    // Listen on Shutdown Signal
    let token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = graceful_shutdown(token).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    let registrar = Arc::new(HttpRegistrar::new(&settings.registration)?);
    let store = Arc::new(KubeNodeStore::new(client.clone()));
    let reconciler = Reconciler::new(registrar, store, &settings);
    let events = NodeWatcher::new(client, &settings.cluster).stream();

    if let Err(e) = Controller::new(reconciler, &settings.worker)
        .run(events, shutdown)
        .await
    {
        error!("node registrar stops: {:?}", e);
        return Err(e);
    }

    info!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(shutdown: CancellationToken) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| Error::Fatal(format!("failed to install SIGINT handler: {e}")))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| Error::Fatal(format!("failed to install SIGTERM handler: {e}")))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    shutdown.cancel();
    info!("Shutdown signal sent");
    Ok(())
}

fn init_observability() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(filter)
        .init();
}
