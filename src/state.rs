use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use axum::body::Bytes;
use tokio::sync::watch;
use uuid::Uuid;

use crate::manifest::{install_manifest, landing_page, Endpoints};
use crate::models::{AppInfoPresentable, FALLBACK_ICON_PNG};
use crate::progress::ProgressReporter;

/// state shared between a session and its request handlers
pub struct SessionState {
    pub id: Uuid,
    pub endpoints: Endpoints,
    pub app: Arc<dyn AppInfoPresentable>,
    pub reporter: ProgressReporter,
    /// payload file, unset until assigned
    payload: RwLock<Option<PathBuf>>,
    /// flips to true once the session is stopping
    cancelled: watch::Sender<bool>,
    manifest: Bytes,
    landing_page: Bytes,
    icon_small: Bytes,
    icon_large: Bytes,
}

impl SessionState {
    /// create session state, rendering the static documents up front
    pub fn new(
        id: Uuid,
        endpoints: Endpoints,
        app: Arc<dyn AppInfoPresentable>,
        reporter: ProgressReporter,
    ) -> Self {
        let manifest = Bytes::from(install_manifest(app.as_ref(), &endpoints));
        let landing_page = Bytes::from(landing_page(app.as_ref(), &endpoints));
        let icon_small = app
            .icon_small()
            .unwrap_or_else(|| Bytes::from_static(FALLBACK_ICON_PNG));
        let icon_large = app
            .icon_large()
            .unwrap_or_else(|| Bytes::from_static(FALLBACK_ICON_PNG));

        Self {
            id,
            endpoints,
            app,
            reporter,
            payload: RwLock::new(None),
            cancelled: watch::Sender::new(false),
            manifest,
            landing_page,
            icon_small,
            icon_large,
        }
    }

    pub fn assign_payload(&self, path: PathBuf) {
        tracing::info!("Payload for session {} set to {:?}", self.id, path);
        match self.payload.write() {
            Ok(mut slot) => *slot = Some(path),
            Err(poisoned) => *poisoned.into_inner() = Some(path),
        }
    }

    pub fn payload(&self) -> Option<PathBuf> {
        match self.payload.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.send_replace(true);
    }

    /// receiver handed to each payload stream
    pub fn cancel_signal(&self) -> watch::Receiver<bool> {
        self.cancelled.subscribe()
    }

    pub fn manifest(&self) -> Bytes {
        self.manifest.clone()
    }

    pub fn landing_page(&self) -> Bytes {
        self.landing_page.clone()
    }

    pub fn icon_small(&self) -> Bytes {
        self.icon_small.clone()
    }

    pub fn icon_large(&self) -> Bytes {
        self.icon_large.clone()
    }
}
