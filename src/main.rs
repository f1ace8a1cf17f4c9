use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ota_installer::config::InstallerConfig;
use ota_installer::models::AppMetadata;
use ota_installer::server::{print_session_banner, InstallServer};
use ota_installer::status::StatusRegistry;

/// how long open connections get to drain on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// use mimalloc as the global allocator
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    // load .env file if it exists (fails silently if not found)
    let _ = dotenvy::dotenv();

    let config = InstallerConfig::from_env();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime");

    runtime.block_on(async {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .init();

        if let Err(e) = run(config).await {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    });
}

async fn run(config: InstallerConfig) -> ota_installer::Result<()> {
    let metadata_path: PathBuf = std::env::var("INSTALLER_APP_METADATA")
        .unwrap_or_else(|_| "./app.json".to_string())
        .into();
    let payload: Option<PathBuf> = std::env::var("INSTALLER_PAYLOAD").ok().map(Into::into);

    let app = AppMetadata::load(&metadata_path).await?;
    tracing::info!("Installing {} {} ({})", app.name, app.version, app.identifier);

    // the registry stands in for the ui that owns status observers
    let registry = StatusRegistry::new();
    let (status, mut status_rx) = registry.register();

    let session = InstallServer::start(Arc::new(app), status, &config).await?;
    match payload {
        Some(path) => session.assign_payload(path),
        None => tracing::warn!("INSTALLER_PAYLOAD not set, payload requests will 404"),
    }
    print_session_banner(&session);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status_rx.borrow_and_update();
                tracing::info!("Install status: {:?}", current);
                if current.is_terminal() {
                    break;
                }
            }
        }
    }

    session.stop();
    session.wait_stopped(SHUTDOWN_GRACE).await;
    Ok(())
}
