pub mod chunker;
pub mod config;
pub mod error;
pub mod handlers;
pub mod manifest;
pub mod middleware;
pub mod models;
pub mod progress;
pub mod routes;
pub mod server;
pub mod state;
pub mod status;

pub use config::InstallerConfig;
pub use error::{InstallerError, Result};
pub use models::{AppInfoPresentable, AppMetadata};
pub use server::{InstallServer, ServerSession};
pub use status::{InstallerStatus, StatusHandle, StatusRegistry};
