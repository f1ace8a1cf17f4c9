use ota_installer::progress::{
    human_readable_size, percent, should_log_progress, ProgressReporter, TransferLog,
};
use ota_installer::status::{InstallerStatus, StatusRegistry};

#[test]
fn test_human_readable_size() {
    assert_eq!(human_readable_size(1_073_741_824), "1.00 GB");
    assert_eq!(human_readable_size(1_048_576), "1.00 MB");
    assert_eq!(human_readable_size(1024), "1.00 KB");
    assert_eq!(human_readable_size(500), "0.49 KB");
    assert_eq!(human_readable_size(0), "0.00 KB");

    // just below a unit falls through to the smaller one
    assert_eq!(human_readable_size(1_073_741_823), "1024.00 MB");
    assert_eq!(human_readable_size(2_000_000), "1.91 MB");
    assert_eq!(human_readable_size(5 * 1_073_741_824 / 2), "2.50 GB");
}

#[test]
fn test_should_log_progress() {
    // unknown total never logs
    assert!(!should_log_progress(1024, 0));

    // small totals step by 1 MiB
    assert!(should_log_progress(1_048_576, 2_000_000));
    assert!(!should_log_progress(524_288, 2_000_000));
    assert!(should_log_progress(1_048_576 + 100, 2_000_000));

    // large totals step by one percent
    let total = 1_000 * 1_048_576;
    assert!(should_log_progress(total / 100, total));
    assert!(!should_log_progress(total / 100 + 8192, total));
}

#[test]
fn test_percent() {
    assert_eq!(percent(0, 0), 0.0);
    assert_eq!(percent(50, 200), 25.0);
    assert_eq!(percent(200, 200), 100.0);
}

#[tokio::test]
async fn test_transfer_log_creates_and_appends() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("transfer.log");

    let log = TransferLog::new(&path);
    assert!(path.exists());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

    log.append_line("first").await;
    log.append_line("second").await;

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("] first"));
    assert!(lines[1].ends_with("] second"));
}

#[tokio::test]
async fn test_reporter_completion_and_failure() {
    let temp_dir = tempfile::tempdir().unwrap();
    let log = TransferLog::new(temp_dir.path().join("transfer.log"));

    let registry = StatusRegistry::new();
    let (handle, rx) = registry.register();
    let reporter = ProgressReporter::new(handle, log.clone());

    reporter.payload_started(2048);
    assert_eq!(*rx.borrow(), InstallerStatus::SendingPayload);

    reporter.completed(2048).await;
    assert_eq!(*rx.borrow(), InstallerStatus::Completed { total_bytes: 2048 });

    // terminal, a later failure does not overwrite it but is still logged
    reporter.failed(2048, 2048, "late").await;
    assert_eq!(*rx.borrow(), InstallerStatus::Completed { total_bytes: 2048 });

    let content = std::fs::read_to_string(log.path()).unwrap();
    assert!(content.contains("Payload completed: 2.00 KB"));
    assert!(content.contains("Payload broken after 2.00 KB / 2.00 KB: late"));
}

#[tokio::test]
async fn test_reporter_throttles_progress_lines() {
    let temp_dir = tempfile::tempdir().unwrap();
    let log = TransferLog::new(temp_dir.path().join("transfer.log"));
    let reporter = ProgressReporter::new(ota_installer::status::StatusHandle::detached(), log.clone());

    let total = 2_000_000;
    for sent in [524_288, 1_048_576, 1_572_864, 2_000_000] {
        reporter.chunk_sent(sent, total).await;
    }

    let content = std::fs::read_to_string(log.path()).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert!(content.contains("Sending Payload: 52.43% (1.00 MB / 1.91 MB)"));
}
