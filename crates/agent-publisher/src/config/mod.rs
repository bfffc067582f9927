use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub facebook: FacebookConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            facebook: FacebookConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Facebook app credentials and Graph API endpoint settings.
///
/// The app id/secret pair is optional: without it the OAuth endpoints report
/// the integration as unconfigured, while posting with already connected page
/// tokens keeps working.
#[derive(Debug, Clone)]
pub struct FacebookConfig {
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub graph_api_version: String,
    pub redirect_uri: Option<String>,
    pub graph_base_url: String,
    pub request_timeout: Duration,
}

impl FacebookConfig {
    pub const DEFAULT_GRAPH_API_VERSION: &'static str = "v18.0";
    pub const DEFAULT_GRAPH_BASE_URL: &'static str = "https://graph.facebook.com";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

    fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs = match non_empty_var("FB_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout)?,
            None => Self::DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            app_id: non_empty_var("FB_APP_ID"),
            app_secret: non_empty_var("FB_APP_SECRET"),
            graph_api_version: non_empty_var("FB_GRAPH_API_VERSION")
                .unwrap_or_else(|| Self::DEFAULT_GRAPH_API_VERSION.to_string()),
            redirect_uri: non_empty_var("FACEBOOK_REDIRECT_URI"),
            graph_base_url: non_empty_var("FB_GRAPH_BASE_URL")
                .unwrap_or_else(|| Self::DEFAULT_GRAPH_BASE_URL.to_string()),
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// True when the OAuth authorization-code exchange can be performed.
    pub fn oauth_enabled(&self) -> bool {
        self.app_id.is_some() && self.app_secret.is_some() && self.redirect_uri.is_some()
    }
}

impl Default for FacebookConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            app_secret: None,
            graph_api_version: Self::DEFAULT_GRAPH_API_VERSION.to_string(),
            redirect_uri: None,
            graph_base_url: Self::DEFAULT_GRAPH_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTimeout,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { source } => {
                write!(f, "APP_HOST must be an IP address or localhost: {source}")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "FB_HTTP_TIMEOUT_SECS must be a whole number of seconds")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidTimeout => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
