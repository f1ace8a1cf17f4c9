use ota_installer::config::InstallerConfig;
use ota_installer::error::InstallerError;
use ota_installer::models::AppMetadata;
use ota_installer::server::{pick_port, InstallServer, ServerSession};
use ota_installer::status::{InstallerStatus, StatusRegistry};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

// a port that was free a moment ago, keeps parallel tests apart
fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn test_config(temp_dir: &tempfile::TempDir) -> InstallerConfig {
    let port = free_port();
    InstallerConfig {
        port_range: port..port + 1,
        log_file: temp_dir.path().join("transfer.log"),
        ..InstallerConfig::default()
    }
}

async fn start(config: &InstallerConfig, registry: &Arc<StatusRegistry>) -> ServerSession {
    let (handle, _rx) = registry.register();
    let app = Arc::new(AppMetadata::new("Demo", "com.example.demo", "1.0"));
    InstallServer::start(app, handle, config).await.unwrap()
}

// minimal http/1.1 exchange, returns the status code and the raw response
async fn http_get(addr: SocketAddr, path: &str) -> (u16, Vec<u8>) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        path
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let head = String::from_utf8_lossy(&raw[..raw.len().min(32)]).to_string();
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap();
    (status, raw)
}

#[test]
fn test_pick_port_in_range() {
    for _ in 0..1000 {
        let port = pick_port(&(4000..8000));
        assert!((4000..8000).contains(&port));
    }
    assert_eq!(pick_port(&(5000..5001)), 5000);
}

#[tokio::test]
async fn test_start_binds_in_range() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = InstallerConfig {
        log_file: temp_dir.path().join("transfer.log"),
        ..InstallerConfig::default()
    };
    let registry = StatusRegistry::new();

    let session = start(&config, &registry).await;
    assert!((4000..8000).contains(&session.port()));
    assert_eq!(session.local_addr().ip().to_string(), "127.0.0.1");
    assert!(session.is_running());
    assert!(session.install_link().contains(&session.port().to_string()));
}

#[tokio::test]
async fn test_bind_error_is_returned() {
    let temp_dir = tempfile::tempdir().unwrap();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let config = InstallerConfig {
        port_range: port..port + 1,
        ..test_config(&temp_dir)
    };
    let registry = StatusRegistry::new();
    let (handle, _rx) = registry.register();
    let app = Arc::new(AppMetadata::new("Demo", "com.example.demo", "1.0"));

    let result = InstallServer::start(app, handle, &config).await;
    match result {
        Err(InstallerError::Bind { addr, .. }) => assert_eq!(addr.port(), port),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("bind should have failed"),
    }
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(&temp_dir);
    let registry = StatusRegistry::new();

    let session = start(&config, &registry).await;
    let addr = session.local_addr();

    session.stop();
    assert!(!session.is_running());
    session.stop();
    session.stop();

    assert!(session.wait_stopped(Duration::from_secs(5)).await);
    assert!(TcpStream::connect(addr).await.is_err());

    // dropping after an explicit stop does not stop again
    drop(session);
}

#[tokio::test]
async fn test_repeated_manifest_fetches() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(&temp_dir);
    let registry = StatusRegistry::new();

    let session = start(&config, &registry).await;
    let path = session.endpoints().manifest_path().to_string();

    let (status, first) = http_get(session.local_addr(), &path).await;
    assert_eq!(status, 200);
    let (status, second) = http_get(session.local_addr(), &path).await;
    assert_eq!(status, 200);

    let first = String::from_utf8_lossy(&first);
    assert!(first.to_ascii_lowercase().contains("content-type: text/xml"));
    assert!(first.contains("com.example.demo"));
    assert!(String::from_utf8_lossy(&second).contains("com.example.demo"));

    let (status, _) = http_get(session.local_addr(), "/does-not-exist").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_payload_over_the_wire() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(&temp_dir);
    let registry = StatusRegistry::new();
    let (handle, mut rx) = registry.register();
    let app = Arc::new(AppMetadata::new("Demo", "com.example.demo", "1.0"));
    let session = InstallServer::start(app, handle, &config).await.unwrap();

    let path = session.endpoints().payload_path().to_string();
    let (status, _) = http_get(session.local_addr(), &path).await;
    assert_eq!(status, 404);

    let file = temp_dir.path().join("app.ipa");
    std::fs::write(&file, vec![7u8; 1_500_000]).unwrap();
    session.assign_payload(&file);

    let (status, raw) = http_get(session.local_addr(), &path).await;
    assert_eq!(status, 200);
    assert!(raw.len() > 1_500_000);

    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.is_terminal()),
    )
    .await
    .expect("transfer never finished")
    .unwrap();
    assert_eq!(
        *rx.borrow(),
        InstallerStatus::Completed {
            total_bytes: 1_500_000
        }
    );

    // a finished transfer leaves the listener up
    let (status, _) = http_get(session.local_addr(), "/install").await;
    assert_eq!(status, 200);
}

// keep connecting until the listener refuses
async fn wait_refused(addr: SocketAddr) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while TcpStream::connect(addr).await.is_ok() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("listener still accepting connections");
}

#[tokio::test]
async fn test_drop_stops_listener() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(&temp_dir);
    let registry = StatusRegistry::new();

    let session = start(&config, &registry).await;
    let addr = session.local_addr();
    let (status, _) = http_get(addr, "/install").await;
    assert_eq!(status, 200);

    drop(session);
    wait_refused(addr).await;
}

#[tokio::test]
async fn test_wait_stopped_with_stalled_client() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(&temp_dir);
    let registry = StatusRegistry::new();
    let (handle, mut rx) = registry.register();
    let app = Arc::new(AppMetadata::new("Demo", "com.example.demo", "1.0"));
    let session = InstallServer::start(app, handle, &config).await.unwrap();

    let file = temp_dir.path().join("big.ipa");
    std::fs::write(&file, vec![1u8; 32 * 1024 * 1024]).unwrap();
    session.assign_payload(&file);

    // request the payload, read a little, then stop reading
    let mut stream = TcpStream::connect(session.local_addr()).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n",
        session.endpoints().payload_path()
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut buf = [0u8; 1024];
    stream.read_exact(&mut buf).await.unwrap();

    session.stop();
    let waited = tokio::time::timeout(
        Duration::from_secs(5),
        session.wait_stopped(Duration::from_millis(500)),
    )
    .await;
    assert!(waited.is_ok(), "wait_stopped ignored its limit");

    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| *s == InstallerStatus::Broken),
    )
    .await
    .expect("stopped transfer never reported broken")
    .unwrap();

    wait_refused(session.local_addr()).await;
    drop(stream);
}

#[tokio::test]
async fn test_port_zero_reports_bound_port() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = InstallerConfig {
        port_range: 0..1,
        ..test_config(&temp_dir)
    };
    let registry = StatusRegistry::new();

    let session = start(&config, &registry).await;
    assert_ne!(session.port(), 0);
    assert_eq!(session.local_addr().port(), session.port());
    assert!(session
        .endpoints()
        .url("/install")
        .ends_with(&format!(":{}/install", session.port())));

    let (status, _) = http_get(session.local_addr(), "/install").await;
    assert_eq!(status, 200);
}
