use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
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

// thirty days
const MAX_CACHE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub incentives: IncentiveConfig,
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

        let defaults = IncentiveConfig::default();
        let cache = CacheConfig {
            capacity: env_number("INCENTIVE_CACHE_CAPACITY", defaults.cache.capacity)?,
            ttl: Duration::from_secs(env_number(
                "INCENTIVE_CACHE_TTL_SECS",
                defaults.cache.ttl.as_secs(),
            )?),
            sweep_interval: Duration::from_secs(env_number(
                "INCENTIVE_CACHE_SWEEP_SECS",
                defaults.cache.sweep_interval.as_secs(),
            )?),
        };
        if cache.capacity == 0 {
            return Err(ConfigError::OutOfRange {
                variable: "INCENTIVE_CACHE_CAPACITY",
                expected: "greater than zero",
            });
        }
        if cache.ttl.is_zero() || cache.ttl > MAX_CACHE_TTL {
            return Err(ConfigError::OutOfRange {
                variable: "INCENTIVE_CACHE_TTL_SECS",
                expected: "between 1 and 2592000 seconds",
            });
        }
        if cache.sweep_interval.is_zero() {
            return Err(ConfigError::OutOfRange {
                variable: "INCENTIVE_CACHE_SWEEP_SECS",
                expected: "greater than zero",
            });
        }

        let default_project_cost =
            env_number("INCENTIVE_DEFAULT_PROJECT_COST", defaults.default_project_cost)?;
        if !(default_project_cost.is_finite() && default_project_cost > 0.0) {
            return Err(ConfigError::OutOfRange {
                variable: "INCENTIVE_DEFAULT_PROJECT_COST",
                expected: "a positive amount",
            });
        }

        let incentives = IncentiveConfig {
            cache,
            default_project_cost,
            history_limit: env_number("INCENTIVE_HISTORY_LIMIT", defaults.history_limit)?,
            demographics_seed: env_number(
                "INCENTIVE_DEMOGRAPHICS_SEED",
                defaults.demographics_seed,
            )?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            incentives,
        })
    }
}

fn env_number<T: FromStr>(variable: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { variable, raw }),
        Err(_) => Ok(default),
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

/// Lookup cache sizing and expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// Engine-level knobs for the incentive analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct IncentiveConfig {
    pub cache: CacheConfig,
    /// Placeholder project cost used when the caller supplies none.
    pub default_project_cost: f64,
    /// Number of completed analyses retained by the service.
    pub history_limit: usize,
    pub demographics_seed: u64,
}

impl Default for IncentiveConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            default_project_cost: 1_000_000.0,
            history_limit: 10,
            demographics_seed: 2024,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str, raw: String },
    OutOfRange {
        variable: &'static str,
        expected: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable, raw } => {
                write!(f, "{variable} must be numeric (got '{raw}')")
            }
            ConfigError::OutOfRange { variable, expected } => {
                write!(f, "{variable} must be {expected}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::OutOfRange { .. } => None,
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
        for variable in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "INCENTIVE_CACHE_CAPACITY",
            "INCENTIVE_CACHE_TTL_SECS",
            "INCENTIVE_CACHE_SWEEP_SECS",
            "INCENTIVE_DEFAULT_PROJECT_COST",
            "INCENTIVE_HISTORY_LIMIT",
            "INCENTIVE_DEMOGRAPHICS_SEED",
        ] {
            env::remove_var(variable);
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
        assert_eq!(config.incentives, IncentiveConfig::default());
        assert_eq!(config.incentives.cache.capacity, 1000);
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
    fn reads_cache_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("INCENTIVE_CACHE_CAPACITY", "25");
        env::set_var("INCENTIVE_CACHE_TTL_SECS", "90");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.incentives.cache.capacity, 25);
        assert_eq!(config.incentives.cache.ttl, Duration::from_secs(90));
        reset_env();
    }

    #[test]
    fn rejects_non_numeric_and_zero_values() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("INCENTIVE_HISTORY_LIMIT", "ten");
        match AppConfig::load() {
            Err(ConfigError::InvalidNumber { variable, raw }) => {
                assert_eq!(variable, "INCENTIVE_HISTORY_LIMIT");
                assert_eq!(raw, "ten");
            }
            other => panic!("expected invalid number, got {other:?}"),
        }

        reset_env();
        env::set_var("INCENTIVE_CACHE_CAPACITY", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::OutOfRange {
                variable: "INCENTIVE_CACHE_CAPACITY",
                ..
            })
        ));
        reset_env();
    }

    fn out_of_range_variable(variable: &str, raw: &str) -> Option<&'static str> {
        reset_env();
        env::set_var(variable, raw);
        let result = AppConfig::load();
        reset_env();
        match result {
            Err(ConfigError::OutOfRange { variable, .. }) => Some(variable),
            _ => None,
        }
    }

    #[test]
    fn rejects_cache_timings_that_would_disable_or_break_the_cache() {
        let _lock = env_guard().lock().expect("env mutex poisoned");

        assert_eq!(
            out_of_range_variable("INCENTIVE_CACHE_TTL_SECS", "0"),
            Some("INCENTIVE_CACHE_TTL_SECS")
        );
        assert_eq!(
            out_of_range_variable("INCENTIVE_CACHE_TTL_SECS", "18446744073709551615"),
            Some("INCENTIVE_CACHE_TTL_SECS")
        );
        assert_eq!(
            out_of_range_variable("INCENTIVE_CACHE_SWEEP_SECS", "0"),
            Some("INCENTIVE_CACHE_SWEEP_SECS")
        );
        assert_eq!(out_of_range_variable("INCENTIVE_CACHE_TTL_SECS", "2592000"), None);
    }
}
