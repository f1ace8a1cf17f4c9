use std::sync::Arc;

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::handlers::{install_page, large_icon, manifest, payload, payload_head, small_icon};
use crate::manifest::Endpoints;
use crate::state::SessionState;

/// the fixed set of things a session answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Manifest,
    SmallIcon,
    LargeIcon,
    Payload,
    Install,
    NotFound,
}

impl Route {
    /// exact path match, query strings are not part of `path`
    pub fn resolve(path: &str, endpoints: &Endpoints) -> Self {
        if path == endpoints.manifest_path() {
            Self::Manifest
        } else if path == endpoints.small_icon_path() {
            Self::SmallIcon
        } else if path == endpoints.large_icon_path() {
            Self::LargeIcon
        } else if path == endpoints.payload_path() {
            Self::Payload
        } else if path == endpoints.install_path() {
            Self::Install
        } else {
            Self::NotFound
        }
    }
}

// single entry point for every request; any method is served like GET,
// except that HEAD on the payload never starts a transfer
pub async fn dispatch(
    State(session): State<Arc<SessionState>>,
    method: Method,
    uri: Uri,
) -> Response {
    let route = Route::resolve(uri.path(), &session.endpoints);
    tracing::debug!("{} {} -> {:?}", method, uri.path(), route);

    match route {
        Route::Manifest => manifest(&session).into_response(),
        Route::SmallIcon => small_icon(&session).into_response(),
        Route::LargeIcon => large_icon(&session).into_response(),
        Route::Payload if method == Method::HEAD => match payload_head(&session).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        },
        Route::Payload => match payload(&session).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Payload request failed: {}", e);
                e.into_response()
            }
        },
        Route::Install => install_page(&session).into_response(),
        Route::NotFound => StatusCode::NOT_FOUND.into_response(),
    }
}
