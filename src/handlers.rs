use axum::body::Bytes;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::chunker::{stream_payload, PayloadChunker};
use crate::error::{InstallerError, Result};
use crate::state::SessionState;

// install manifest, the device fetches this first
pub fn manifest(session: &SessionState) -> impl IntoResponse {
    tracing::debug!("Sending manifest for {}", session.app.identifier());
    session.reporter.manifest_requested();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/xml")],
        session.manifest(),
    )
}

pub fn small_icon(session: &SessionState) -> impl IntoResponse {
    png(session.icon_small())
}

pub fn large_icon(session: &SessionState) -> impl IntoResponse {
    png(session.icon_large())
}

fn png(data: Bytes) -> impl IntoResponse {
    (StatusCode::OK, [(header::CONTENT_TYPE, "image/png")], data)
}

pub fn install_page(session: &SessionState) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html")],
        session.landing_page(),
    )
}

// payload headers only, no file handle is kept and no status is reported
pub async fn payload_head(session: &SessionState) -> Result<Response> {
    let path = session
        .payload()
        .ok_or(InstallerError::PayloadNotAssigned)?;
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(InstallerError::PayloadOpen)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, metadata.len().to_string()),
        ],
    )
        .into_response())
}

// stream the payload file in chunks
pub async fn payload(session: &SessionState) -> Result<Response> {
    let path = session.payload().ok_or_else(|| {
        tracing::debug!("Payload requested before one was assigned");
        InstallerError::PayloadNotAssigned
    })?;

    let chunker = PayloadChunker::open(&path).await.map_err(|e| {
        tracing::error!("Failed to open payload {:?}: {}", path, e);
        e
    })?;

    session
        .reporter
        .payload_started(chunker.state().total_bytes);

    let body = stream_payload(
        chunker,
        session.reporter.clone(),
        session.cancel_signal(),
    );

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        body,
    )
        .into_response())
}
