use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

/// Where requests are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Json,
    Postgres,
}

impl StorageBackend {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "json" | "file" => Ok(Self::Json),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => bail!("Unknown STORAGE_BACKEND '{other}' (expected memory, json or postgres)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // Storage
    pub storage_backend: StorageBackend,
    pub requests_file: PathBuf,
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Auth
    pub jwt_secret: String,

    // Request lifecycle
    /// Show requests submitted without an account to every logged-in buyer
    pub guest_requests_visible_to_buyers: bool,
    pub write_retry_max_elapsed_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: Environment::Dev,
            server_addr: "0.0.0.0:8080".to_string(),
            storage_backend: StorageBackend::Memory,
            requests_file: PathBuf::from("data/requests.json"),
            database_url: None,
            database_max_connections: 10,
            cors_allow_origins: vec!["http://localhost:3000".to_string()],
            jwt_secret: String::new(),
            guest_requests_visible_to_buyers: false,
            write_retry_max_elapsed_ms: 2000,
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// HS256 secrets may be short in dev but never empty.
fn check_jwt_secret(secret: &str, env: &Environment) -> Result<()> {
    if secret.trim().is_empty() {
        bail!("JWT_SECRET must not be empty");
    }
    if secret.len() < 32 && !env.is_dev() {
        bail!("JWT_SECRET must be at least 32 bytes outside dev");
    }
    Ok(())
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let env = Environment::from_str(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or(defaults.server_addr);

        // Storage
        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => StorageBackend::parse(&value)?,
            Err(_) => StorageBackend::Json,
        };
        let requests_file = env::var("REQUESTS_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.requests_file);
        let database_url = env::var("DATABASE_URL").ok();
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when STORAGE_BACKEND=postgres");
        }
        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.database_max_connections);

        // CORS
        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Auth
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        check_jwt_secret(&jwt_secret, &env)?;

        // Request lifecycle
        let guest_requests_visible_to_buyers = env_flag("GUEST_REQUESTS_VISIBLE_TO_BUYERS");
        let write_retry_max_elapsed_ms = env::var("WRITE_RETRY_MAX_ELAPSED_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.write_retry_max_elapsed_ms);

        Ok(Settings {
            env,
            server_addr,
            storage_backend,
            requests_file,
            database_url,
            database_max_connections,
            cors_allow_origins,
            jwt_secret,
            guest_requests_visible_to_buyers,
            write_retry_max_elapsed_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_storage_backends() {
        assert_eq!(StorageBackend::parse("memory").unwrap(), StorageBackend::Memory);
        assert_eq!(StorageBackend::parse("FILE").unwrap(), StorageBackend::Json);
        assert_eq!(
            StorageBackend::parse("postgresql").unwrap(),
            StorageBackend::Postgres
        );
        assert!(StorageBackend::parse("redis").is_err());
    }

    #[test]
    fn unknown_environment_falls_back_to_dev() {
        assert_eq!(Environment::from_str("production"), Environment::Prod);
        assert!(Environment::from_str("whatever").is_dev());
        assert!(!Environment::from_str("staging").is_prod());
    }

    #[test]
    fn jwt_secret_rules() {
        assert!(check_jwt_secret("", &Environment::Dev).is_err());
        assert!(check_jwt_secret("   ", &Environment::Dev).is_err());
        assert!(check_jwt_secret("", &Environment::Prod).is_err());
        assert!(check_jwt_secret("dev-secret", &Environment::Dev).is_ok());
        assert!(check_jwt_secret("dev-secret", &Environment::Staging).is_err());
        assert!(check_jwt_secret(&"x".repeat(32), &Environment::Prod).is_ok());
    }
}
