use std::env;
use std::net::SocketAddr;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub addr: SocketAddr,
    pub max_connections: u32,
    /// Insert sample categories and tasks when the database has none.
    pub seed: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://taskflow.db".to_string(),
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            max_connections: 5,
            seed: true,
        }
    }
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").unwrap_or(defaults.database_url);

        let addr = match lookup("TASKFLOW_ADDR") {
            Some(raw) => raw
                .parse::<SocketAddr>()
                .map_err(|e| AppError::Config(format!("TASKFLOW_ADDR is invalid: {}", e)))?,
            None => defaults.addr,
        };

        let max_connections = match lookup("TASKFLOW_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    AppError::Config(format!("TASKFLOW_MAX_CONNECTIONS is invalid: {}", raw))
                })?,
            None => defaults.max_connections,
        };

        let seed = match lookup("TASKFLOW_SEED").as_deref() {
            None => defaults.seed,
            Some("1" | "true" | "yes" | "on") => true,
            Some("0" | "false" | "no" | "off") => false,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "TASKFLOW_SEED is invalid: {}",
                    other
                )));
            }
        };

        Ok(Self {
            database_url,
            addr,
            max_connections,
            seed,
        })
    }
}
