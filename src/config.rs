// src/config.rs

use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: String,
    /// Interval of the background expiry sweep. Zero disables it.
    pub expiry_sweep_seconds: u64,
    /// Optional JSON file of quizzes loaded into the question bank at startup.
    pub quiz_seed_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let expiry_sweep_seconds = parsed_or("EXPIRY_SWEEP_SECONDS", 30)?;

        let quiz_seed_path = env::var("QUIZ_SEED_PATH").ok().map(PathBuf::from);

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            expiry_sweep_seconds,
            quiz_seed_path,
        })
    }
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::InternalServerError(format!("{key} must be set")))
}

fn parsed_or(key: &str, default: u64) -> Result<u64, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::InternalServerError(format!("{key} must be an integer"))),
        Err(_) => Ok(default),
    }
}
