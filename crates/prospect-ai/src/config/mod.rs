use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::scoring::{QualitySignals, ScoringPolicy};

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
    pub outreach: OutreachConfig,
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
            outreach: OutreachConfig::from_env()?,
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

/// Letter signature details, template location, and ingestion scoring inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct OutreachConfig {
    pub org_name: String,
    pub contact_email: String,
    pub templates_dir: Option<PathBuf>,
    pub scoring_policy: ScoringPolicy,
    pub quality: QualitySignals,
}

impl Default for OutreachConfig {
    fn default() -> Self {
        Self {
            org_name: "Partnership Office".to_string(),
            contact_email: "partnerships@example.org".to_string(),
            templates_dir: None,
            scoring_policy: ScoringPolicy::Normalized,
            quality: QualitySignals::neutral(),
        }
    }
}

impl OutreachConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let org_name = env::var("OUTREACH_ORG_NAME").unwrap_or(defaults.org_name);
        let contact_email = env::var("OUTREACH_CONTACT_EMAIL").unwrap_or(defaults.contact_email);
        let templates_dir = env::var("OUTREACH_TEMPLATES_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let scoring_policy = match env::var("OUTREACH_SCORING_POLICY") {
            Ok(raw) => ScoringPolicy::parse(&raw).ok_or(ConfigError::InvalidScoringPolicy(raw))?,
            Err(_) => defaults.scoring_policy,
        };

        let company_size_score = factor_from_env("OUTREACH_SIZE_SCORE")?
            .unwrap_or(defaults.quality.company_size_score);
        let growth_score =
            factor_from_env("OUTREACH_GROWTH_SCORE")?.unwrap_or(defaults.quality.growth_score);

        Ok(Self {
            org_name,
            contact_email,
            templates_dir,
            scoring_policy,
            quality: QualitySignals::new(company_size_score, growth_score),
        })
    }
}

fn factor_from_env(key: &'static str) -> Result<Option<f64>, ConfigError> {
    let Ok(raw) = env::var(key) else {
        return Ok(None);
    };

    match raw.trim().parse::<f64>() {
        Ok(value) if (0.0..=1.0).contains(&value) => Ok(Some(value)),
        _ => Err(ConfigError::InvalidFactor { key, value: raw }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidFactor { key: &'static str, value: String },
    InvalidScoringPolicy(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidFactor { key, value } => {
                write!(f, "{key} must be a number between 0 and 1, got '{value}'")
            }
            ConfigError::InvalidScoringPolicy(value) => write!(
                f,
                "OUTREACH_SCORING_POLICY must be 'normalized' or 'legacy', got '{value}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidFactor { .. }
            | ConfigError::InvalidScoringPolicy(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "OUTREACH_ORG_NAME",
            "OUTREACH_CONTACT_EMAIL",
            "OUTREACH_TEMPLATES_DIR",
            "OUTREACH_SCORING_POLICY",
            "OUTREACH_SIZE_SCORE",
            "OUTREACH_GROWTH_SCORE",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.outreach, OutreachConfig::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn outreach_settings_read_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("OUTREACH_ORG_NAME", "Ural Federal University");
        env::set_var("OUTREACH_TEMPLATES_DIR", "/srv/templates");
        env::set_var("OUTREACH_SCORING_POLICY", "legacy");
        env::set_var("OUTREACH_GROWTH_SCORE", "0.8");

        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.outreach.org_name, "Ural Federal University");
        assert_eq!(
            config.outreach.templates_dir,
            Some(PathBuf::from("/srv/templates"))
        );
        assert_eq!(config.outreach.scoring_policy, ScoringPolicy::Legacy);
        assert_eq!(config.outreach.quality.growth_score, 0.8);
        assert_eq!(config.outreach.quality.company_size_score, 0.5);
        reset_env();
    }

    #[test]
    fn rejects_out_of_range_factor() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("OUTREACH_SIZE_SCORE", "1.5");

        match AppConfig::load() {
            Err(ConfigError::InvalidFactor { key, .. }) => assert_eq!(key, "OUTREACH_SIZE_SCORE"),
            other => panic!("expected invalid factor, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn rejects_unknown_scoring_policy() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("OUTREACH_SCORING_POLICY", "vibes");

        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidScoringPolicy(_))
        ));
        reset_env();
    }
}
