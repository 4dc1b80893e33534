//! Service configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Missing required variables and
//! invalid enum values are fatal at boot, before any component starts.

use std::fmt;

use crate::error::VigilError;

/// Deployment environment. Controls only the default log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
    Test,
}

impl AppEnv {
    /// Default `tracing` filter directive when `RUST_LOG` is unset.
    #[must_use]
    pub const fn default_log_level(self) -> &'static str {
        match self {
            Self::Development | Self::Production => "info",
            Self::Test => "warn",
        }
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => f.write_str("development"),
            Self::Production => f.write_str("production"),
            Self::Test => f.write_str("test"),
        }
    }
}

impl std::str::FromStr for AppEnv {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(VigilError::Config(format!(
                "NODE_ENV must be development, production, or test, got {other:?}"
            ))),
        }
    }
}

/// Earthquake early-warning replay settings, present only when both
/// simulation variables are set.
#[derive(Debug, Clone)]
pub struct PewsSimConfig {
    /// Historical event id to replay.
    pub eqk_id: String,
    /// Replay window start, `YYYYMMDDHHMMSS` in KST.
    pub start_at: String,
}

/// Top-level service configuration.
///
/// Loaded once at startup via [`Config::from_env`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Deployment environment.
    pub env: AppEnv,

    /// HTTP bind host (e.g. `localhost` or `0.0.0.0`).
    pub host: String,

    /// HTTP bind port.
    pub port: u16,

    /// Enable permissive CORS.
    pub cors: bool,

    /// Expose the OpenAPI document and Swagger UI.
    pub swagger: bool,

    /// When false, neither the ingest scheduler nor the worker starts and
    /// the instance serves reads only.
    pub ingest_enabled: bool,

    /// PostgreSQL connection string.
    pub database_url: String,

    /// Redis connection string, backing both the job queue and the event bus.
    pub redis_url: String,

    /// Credentials for the weather-warning adapter.
    pub kma_api_key: Option<String>,

    /// Earthquake early-warning simulation mode.
    pub pews_sim: Option<PewsSimConfig>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Config`] when `DATABASE_URL` or `REDIS_URL`
    /// is missing, `NODE_ENV` or `PORT` is invalid, or only one of the two
    /// simulation variables is set.
    pub fn from_env() -> Result<Self, VigilError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an injectable lookup, so tests can
    /// substitute the process environment.
    ///
    /// # Errors
    ///
    /// Same contract as [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, VigilError> {
        let env: AppEnv = lookup("NODE_ENV")
            .unwrap_or_else(|| "development".to_string())
            .parse()?;

        let host = lookup("HOST").unwrap_or_else(|| "localhost".to_string());
        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| VigilError::Config(format!("PORT must be a port number, got {raw:?}")))?,
            None => 3000,
        };

        let cors = parse_flag(&lookup, "CORS", false)?;
        let swagger = parse_flag(&lookup, "SWAGGER", true)?;
        let ingest_enabled = parse_flag(&lookup, "INGEST_ENABLED", false)?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| VigilError::Config("DATABASE_URL is required".to_string()))?;
        let redis_url = lookup("REDIS_URL")
            .ok_or_else(|| VigilError::Config("REDIS_URL is required".to_string()))?;

        let kma_api_key = lookup("KMA_API_KEY").filter(|key| !key.is_empty());

        let pews_sim = match (lookup("KMA_PEWS_SIM_EQK_ID"), lookup("KMA_PEWS_SIM_START_AT")) {
            (Some(eqk_id), Some(start_at)) => Some(PewsSimConfig { eqk_id, start_at }),
            (None, None) => None,
            _ => {
                return Err(VigilError::Config(
                    "KMA_PEWS_SIM_EQK_ID and KMA_PEWS_SIM_START_AT must be set together"
                        .to_string(),
                ));
            }
        };

        Ok(Self {
            env,
            host,
            port,
            cors,
            swagger,
            ingest_enabled,
            database_url,
            redis_url,
            kma_api_key,
            pews_sim,
        })
    }

    /// The `host:port` pair the HTTP server binds to.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parses a `0`/`1` flag variable. Returns `default` when unset.
fn parse_flag(
    lookup: impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> Result<bool, VigilError> {
    match lookup(key).as_deref() {
        None => Ok(default),
        Some("0") => Ok(false),
        Some("1") => Ok(true),
        Some(other) => Err(VigilError::Config(format!(
            "{key} must be 0 or 1, got {other:?}"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, VigilError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DATABASE_URL", "postgres://localhost/vigil"),
            ("REDIS_URL", "redis://localhost"),
        ]
    }

    #[test]
    fn defaults_apply() {
        let Ok(config) = load(&minimal()) else {
            panic!("minimal config should load");
        };
        assert_eq!(config.env, AppEnv::Development);
        assert_eq!(config.bind_addr(), "localhost:3000");
        assert!(!config.cors);
        assert!(config.swagger);
        assert!(!config.ingest_enabled);
        assert!(config.pews_sim.is_none());
    }

    #[test]
    fn missing_database_url_is_fatal() {
        let result = load(&[("REDIS_URL", "redis://localhost")]);
        assert!(result.is_err());
    }

    #[test]
    fn missing_redis_url_is_fatal() {
        let result = load(&[("DATABASE_URL", "postgres://localhost/vigil")]);
        assert!(result.is_err());
    }

    #[test]
    fn invalid_node_env_is_fatal() {
        let mut vars = minimal();
        vars.push(("NODE_ENV", "staging"));
        assert!(load(&vars).is_err());
    }

    #[test]
    fn invalid_flag_is_fatal() {
        let mut vars = minimal();
        vars.push(("INGEST_ENABLED", "yes"));
        assert!(load(&vars).is_err());
    }

    #[test]
    fn sim_vars_must_come_together() {
        let mut vars = minimal();
        vars.push(("KMA_PEWS_SIM_EQK_ID", "2024000001"));
        assert!(load(&vars).is_err());

        vars.push(("KMA_PEWS_SIM_START_AT", "20241201093000"));
        let Ok(config) = load(&vars) else {
            panic!("paired sim vars should load");
        };
        let Some(sim) = config.pews_sim else {
            panic!("sim config should be present");
        };
        assert_eq!(sim.eqk_id, "2024000001");
    }

    #[test]
    fn flags_parse_zero_and_one() {
        let mut vars = minimal();
        vars.push(("CORS", "1"));
        vars.push(("SWAGGER", "0"));
        let Ok(config) = load(&vars) else {
            panic!("config should load");
        };
        assert!(config.cors);
        assert!(!config.swagger);
    }
}
