use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::status::{InstallerStatus, StatusHandle};

const KB: f64 = 1024.0;
const MB: f64 = 1024.0 * 1024.0;
const GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// progress lines are written at most about once per step of this size
const MIN_LOG_STEP: u64 = 1024 * 1024;
/// slack after a step boundary that still counts as "on" the boundary
const LOG_WINDOW: u64 = 4096;

/// binary-unit size string, never smaller than KB
pub fn human_readable_size(bytes: u64) -> String {
    let bytes = bytes as f64;
    let gb = bytes / GB;
    if gb >= 1.0 {
        return format!("{:.2} GB", gb);
    }
    let mb = bytes / MB;
    if mb >= 1.0 {
        return format!("{:.2} MB", mb);
    }
    format!("{:.2} KB", bytes / KB)
}

/// true when `sent` lands close to a percent step of `total`
pub fn should_log_progress(sent: u64, total: u64) -> bool {
    if total == 0 {
        return false;
    }
    let step = (total / 100).max(MIN_LOG_STEP);
    sent % step < LOG_WINDOW
}

pub fn percent(sent: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    sent as f64 / total as f64 * 100.0
}

/// append-only plain text diagnostic log
///
/// Each line is an independent open/append/close, so concurrent transfers
/// may interleave lines.
#[derive(Debug, Clone)]
pub struct TransferLog {
    path: PathBuf,
}

impl TransferLog {
    /// use `path`, creating the file if it does not exist yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Err(e) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            tracing::warn!("Could not create transfer log {:?}: {}", path, e);
        }
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append_line(&self, line: &str) {
        let stamped = format!(
            "[{}] {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            line
        );
        let result: std::io::Result<()> = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            file.write_all(stamped.as_bytes()).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = result {
            tracing::warn!("Failed to append to transfer log {:?}: {}", self.path, e);
        }
    }
}

/// forwards transfer events to the status sink and the transfer log
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    status: StatusHandle,
    log: TransferLog,
}

impl ProgressReporter {
    pub fn new(status: StatusHandle, log: TransferLog) -> Self {
        Self { status, log }
    }

    pub fn manifest_requested(&self) {
        self.status.publish(InstallerStatus::SendingManifest);
    }

    pub fn payload_started(&self, total: u64) {
        tracing::info!("Sending payload ({})", human_readable_size(total));
        self.status.publish(InstallerStatus::SendingPayload);
    }

    /// called after each chunk is handed to the client
    pub async fn chunk_sent(&self, sent: u64, total: u64) {
        tracing::trace!("Sent {} / {} bytes", sent, total);
        if !should_log_progress(sent, total) {
            return;
        }
        let line = format!(
            "Sending Payload: {:.2}% ({} / {})",
            percent(sent, total),
            human_readable_size(sent),
            human_readable_size(total)
        );
        tracing::debug!("{}", line);
        self.log.append_line(&line).await;
    }

    /// the log line is written before observers see the terminal status
    pub async fn completed(&self, sent: u64) {
        let line = format!("Payload completed: {}", human_readable_size(sent));
        tracing::info!("{}", line);
        self.log.append_line(&line).await;
        self.status
            .publish(InstallerStatus::Completed { total_bytes: sent });
    }

    pub async fn failed(&self, sent: u64, total: u64, reason: &str) {
        let line = format!(
            "Payload broken after {} / {}: {}",
            human_readable_size(sent),
            human_readable_size(total),
            reason
        );
        tracing::warn!("{}", line);
        self.log.append_line(&line).await;
        self.status.publish(InstallerStatus::Broken);
    }
}
