use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Runtime configuration loaded from environment variables (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub rules_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: env_or("DATABASE_URL", "sqlite://timetable.db?mode=rwc"),
            rules_path: PathBuf::from(env_or("TIMETABLE_RULES_PATH", "timetable_rules.yaml")),
            bind_addr: env_or("BIND_ADDR", "127.0.0.1:8080")
                .parse()
                .context("BIND_ADDR must be a socket address such as 127.0.0.1:8080")?,
            log_level: env_or("RUST_LOG", "info"),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Initialises `env_logger` with `level` unless `RUST_LOG` overrides it.
pub fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}
