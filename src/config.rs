use std::net::IpAddr;
use std::ops::Range;
use std::path::PathBuf;

/// default port window the listener picks from
pub const DEFAULT_PORT_RANGE: Range<u16> = 4000..8000;

/// how manifest and landing page urls are addressed to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMethod {
    /// fully local, urls use https (tls is terminated by the host platform)
    Local,
    /// semi local, urls use plain http
    SemiLocal,
}

impl ServerMethod {
    /// parse the env representation, `None` for anything unknown
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" | "0" => Some(Self::Local),
            "semi-local" | "semilocal" | "1" => Some(Self::SemiLocal),
            _ => None,
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Local => "https",
            Self::SemiLocal => "http",
        }
    }
}

/// installer configuration, passed explicitly into every session
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// address the listener binds to
    pub bind_host: IpAddr,
    /// half-open range the session port is drawn from
    pub port_range: Range<u16>,
    /// url scheme selection
    pub server_method: ServerMethod,
    /// address urls with the bind ip instead of `public_host`
    pub ip_fix: bool,
    /// hostname written into manifest urls
    pub public_host: String,
    /// diagnostic transfer log
    pub log_file: PathBuf,
    /// number of tokio worker threads (binary only)
    pub worker_threads: usize,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            bind_host: IpAddr::from([127, 0, 0, 1]),
            port_range: DEFAULT_PORT_RANGE,
            server_method: ServerMethod::Local,
            ip_fix: false,
            public_host: "localhost.direct".to_string(),
            log_file: std::env::temp_dir().join("ota_installer.log"),
            worker_threads: 4,
        }
    }
}

impl InstallerConfig {
    /// load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port_min = std::env::var("INSTALLER_PORT_MIN")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port_range.start);
        let port_max = std::env::var("INSTALLER_PORT_MAX")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port_range.end);
        let port_range = if port_min < port_max {
            port_min..port_max
        } else {
            tracing::warn!(
                "Ignoring empty port range {}..{}, using {:?}",
                port_min,
                port_max,
                DEFAULT_PORT_RANGE
            );
            DEFAULT_PORT_RANGE
        };

        Self {
            bind_host: std::env::var("INSTALLER_BIND_HOST")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or(defaults.bind_host),
            port_range,
            server_method: std::env::var("INSTALLER_SERVER_METHOD")
                .ok()
                .and_then(|m| ServerMethod::parse(&m))
                .unwrap_or(defaults.server_method),
            ip_fix: std::env::var("INSTALLER_IP_FIX")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.ip_fix),
            public_host: std::env::var("INSTALLER_PUBLIC_HOST")
                .ok()
                .filter(|h| !h.trim().is_empty())
                .unwrap_or(defaults.public_host),
            log_file: std::env::var("INSTALLER_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_file),
            worker_threads: std::env::var("INSTALLER_WORKER_THREADS")
                .ok()
                .and_then(|t| t.parse().ok())
                .filter(|t| *t > 0)
                .unwrap_or(defaults.worker_threads),
        }
    }

    /// host that goes into urls handed to the device
    pub fn url_host(&self) -> String {
        if self.ip_fix {
            match self.bind_host {
                IpAddr::V4(ip) => ip.to_string(),
                IpAddr::V6(ip) => format!("[{}]", ip),
            }
        } else {
            self.public_host.clone()
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
