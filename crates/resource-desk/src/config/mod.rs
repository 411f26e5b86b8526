use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

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

/// Top-level configuration for the resource desk.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub workflow: WorkflowConfig,
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

        let defaults = WorkflowConfig::default();
        let base_url = env::var("APP_BASE_URL")
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);
        let email_domain = env::var("DESK_EMAIL_DOMAIN")
            .map(|value| value.trim().trim_start_matches('@').to_ascii_lowercase())
            .unwrap_or(defaults.email_domain);
        if email_domain.is_empty() || !email_domain.contains('.') {
            return Err(ConfigError::InvalidEmailDomain(email_domain));
        }

        let minimum_supporting_grade = match env::var("DESK_SUPPORT_MIN_GRADE") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidNumber {
                    key: "DESK_SUPPORT_MIN_GRADE",
                    value: raw,
                })?,
            Err(_) => defaults.minimum_supporting_grade,
        };

        let max_loan_days = match env::var("DESK_MAX_LOAN_DAYS") {
            Ok(raw) => match raw.trim().parse::<u32>() {
                Ok(days) if days > 0 => days,
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        key: "DESK_MAX_LOAN_DAYS",
                        value: raw,
                    })
                }
            },
            Err(_) => defaults.max_loan_days,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            workflow: WorkflowConfig {
                base_url,
                email_domain,
                minimum_supporting_grade,
                max_loan_days,
            },
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

/// Business rules shared by the approval, provisioning and loan workflows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Prefix for links embedded in notifications.
    pub base_url: String,
    /// Organisation mail domain that provisioned accounts must belong to.
    pub email_domain: String,
    /// Lowest grade allowed to act as a supporting officer.
    pub minimum_supporting_grade: u16,
    pub max_loan_days: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            email_domain: "agency.gov.my".to_string(),
            minimum_supporting_grade: 41,
            max_loan_days: 30,
        }
    }
}

impl WorkflowConfig {
    pub fn link(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidEmailDomain(String),
    InvalidNumber { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidEmailDomain(value) => {
                write!(f, "DESK_EMAIL_DOMAIN '{}' is not a mail domain", value)
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{} must be a positive number, found '{}'", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
