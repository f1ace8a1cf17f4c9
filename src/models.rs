use std::path::{Path, PathBuf};

use axum::body::Bytes;
use serde::Deserialize;

use crate::error::Result;

/// 1x1 transparent png served when an app ships without an icon
pub const FALLBACK_ICON_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
    0x89, 0x00, 0x00, 0x00, 0x0b, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x60, 0x00, 0x02, 0x00,
    0x00, 0x05, 0x00, 0x01, 0x7a, 0x5e, 0xab, 0x3f, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44,
    0xae, 0x42, 0x60, 0x82,
];

/// metadata about the app being installed, supplied by the caller
pub trait AppInfoPresentable: Send + Sync {
    /// display name shown by the device during install
    fn name(&self) -> &str;
    /// bundle identifier
    fn identifier(&self) -> &str;
    /// bundle version string
    fn version(&self) -> &str;
    /// 57x57 display image, png encoded
    fn icon_small(&self) -> Option<Bytes>;
    /// 512x512 display image, png encoded
    fn icon_large(&self) -> Option<Bytes>;
}

// plain in-memory app metadata
#[derive(Debug, Clone)]
pub struct AppMetadata {
    pub name: String,
    pub identifier: String,
    pub version: String,
    pub icon_small: Option<Bytes>,
    pub icon_large: Option<Bytes>,
}

impl AppMetadata {
    pub fn new(
        name: impl Into<String>,
        identifier: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            identifier: identifier.into(),
            version: version.into(),
            icon_small: None,
            icon_large: None,
        }
    }

    pub fn with_icons(mut self, small: Option<Bytes>, large: Option<Bytes>) -> Self {
        self.icon_small = small;
        self.icon_large = large;
        self
    }

    /// load metadata from a json description, reading icon files next to it
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read(path).await?;
        let file: AppMetadataFile = serde_json::from_slice(&raw)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let icon_small = read_icon(base, file.icon_small.as_deref()).await?;
        let icon_large = read_icon(base, file.icon_large.as_deref()).await?;

        Ok(Self::new(file.name, file.identifier, file.version).with_icons(icon_small, icon_large))
    }
}

impl AppInfoPresentable for AppMetadata {
    fn name(&self) -> &str {
        &self.name
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn icon_small(&self) -> Option<Bytes> {
        self.icon_small.clone()
    }

    fn icon_large(&self) -> Option<Bytes> {
        self.icon_large.clone()
    }
}

// on-disk app metadata description
#[derive(Deserialize, Debug)]
pub struct AppMetadataFile {
    pub name: String,
    pub identifier: String,
    pub version: String,
    #[serde(default)]
    pub icon_small: Option<PathBuf>,
    #[serde(default)]
    pub icon_large: Option<PathBuf>,
}

async fn read_icon(base: &Path, icon: Option<&Path>) -> Result<Option<Bytes>> {
    let Some(icon) = icon else {
        return Ok(None);
    };
    let data = tokio::fs::read(base.join(icon)).await?;
    Ok(Some(Bytes::from(data)))
}
