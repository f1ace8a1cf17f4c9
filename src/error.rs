use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum InstallerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("no payload assigned to this session")]
    PayloadNotAssigned,

    #[error("could not open payload: {0}")]
    PayloadOpen(#[source] std::io::Error),

    #[error("payload stream failed: {0}")]
    PayloadStream(#[source] std::io::Error),

    #[error("client disconnected")]
    ClientDisconnected,

    #[error("session stopped")]
    SessionStopped,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid app metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl InstallerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::PayloadNotAssigned => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for InstallerError {
    fn into_response(self) -> Response {
        self.status_code().into_response()
    }
}

pub type Result<T> = std::result::Result<T, InstallerError>;
