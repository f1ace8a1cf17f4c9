use axum::Router;
use rand::Rng;
use std::net::SocketAddr;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::InstallerConfig;
use crate::error::{InstallerError, Result};
use crate::manifest::Endpoints;
use crate::middleware::add_no_cache_headers;
use crate::models::AppInfoPresentable;
use crate::progress::{ProgressReporter, TransferLog};
use crate::routes::dispatch;
use crate::state::SessionState;
use crate::status::StatusHandle;

/// build the session router, every path goes through the route table
pub fn build_router(state: Arc<SessionState>) -> Router {
    tracing::debug!("Building router for session {}", state.id);
    Router::new()
        .fallback(dispatch)
        .layer(axum::middleware::from_fn(add_no_cache_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn pick_port(range: &Range<u16>) -> u16 {
    if range.is_empty() {
        return range.start;
    }
    rand::rng().random_range(range.clone())
}

pub struct InstallServer;

impl InstallServer {
    /// bind a listener on a random port and start serving one install session
    pub async fn start(
        app: Arc<dyn AppInfoPresentable>,
        status: StatusHandle,
        config: &InstallerConfig,
    ) -> Result<ServerSession> {
        let port = pick_port(&config.port_range);
        let addr = SocketAddr::new(config.bind_host, port);

        let listener = TcpListener::bind(addr).await.map_err(|source| {
            tracing::error!("Failed to bind {}: {}", addr, source);
            InstallerError::Bind { addr, source }
        })?;
        // the range may contain 0, so read the real port back
        let addr = listener.local_addr()?;
        tracing::debug!("Listener bound to {}", addr);

        let id = Uuid::new_v4();
        let endpoints = Endpoints::new(id, config, addr.port());
        let reporter = ProgressReporter::new(status, TransferLog::new(&config.log_file));
        let state = Arc::new(SessionState::new(id, endpoints, app, reporter));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = axum::serve(listener, build_router(state.clone()).into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .tcp_nodelay(true);

        let task = tokio::spawn(async move {
            if let Err(e) = server.await {
                tracing::error!("Install server error: {}", e);
            }
            tracing::debug!("Install server {} exited", id);
        });

        tracing::info!("Install session {} listening on {}", id, addr);

        Ok(ServerSession {
            state,
            addr,
            needs_shutdown: AtomicBool::new(true),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            task: Mutex::new(Some(task)),
        })
    }
}

/// one running install session; stops its listener when dropped
pub struct ServerSession {
    state: Arc<SessionState>,
    addr: SocketAddr,
    needs_shutdown: AtomicBool,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ServerSession {
    pub fn id(&self) -> Uuid {
        self.state.id
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.state.endpoints
    }

    pub fn install_link(&self) -> String {
        self.state.endpoints.install_link()
    }

    /// file served at the payload path
    pub fn assign_payload(&self, path: impl Into<PathBuf>) {
        self.state.assign_payload(path.into());
    }

    pub fn is_running(&self) -> bool {
        self.needs_shutdown.load(Ordering::Acquire)
    }

    /// stop the listener and any in-flight streams; later calls do nothing
    pub fn stop(&self) {
        if !self.needs_shutdown.swap(false, Ordering::AcqRel) {
            return;
        }

        self.state.cancel();
        let tx = match self.shutdown_tx.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(tx) = tx {
            let _ = tx.send(());
        }
        tracing::info!("Install session {} stopped", self.state.id);
    }

    /// wait up to `limit` for the serve task to drain after `stop`
    ///
    /// Connections still open when the limit passes are dropped. Returns
    /// whether the server drained on its own.
    pub async fn wait_stopped(&self, limit: Duration) -> bool {
        let task = match self.task.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(mut task) = task else {
            return true;
        };

        match tokio::time::timeout(limit, &mut task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!("Install server task failed: {}", e);
                true
            }
            Err(_) => {
                tracing::warn!(
                    "Install session {} did not drain within {:?}, closing connections",
                    self.state.id,
                    limit
                );
                task.abort();
                let _ = task.await;
                false
            }
        }
    }
}

impl Drop for ServerSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// log session info on startup
pub fn print_session_banner(session: &ServerSession) {
    let endpoints = session.endpoints();
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    tracing::info!("📡 LISTENING: http://{}", session.local_addr());
    tracing::info!("📄 MANIFEST: {}", endpoints.url(endpoints.manifest_path()));
    tracing::info!("🌐 LANDING PAGE: {}", endpoints.url(endpoints.install_path()));
    tracing::info!("📲 INSTALL LINK: {}", session.install_link());
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
