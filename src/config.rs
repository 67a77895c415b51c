// config.rs
// Runtime configuration read from the environment (.env is loaded by main).

use std::{env, net::SocketAddr};

use anyhow::{Context, Result, bail};

use crate::liquidation::DEFAULT_PROFESSIONAL_PERCENTAGE;

pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 60 * 60 * 24; // 1 day

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mongodb_uri: String,
    pub mongodb_db: String,
    pub bind_address: SocketAddr,
    /// Share of attended revenue paid to professionals without their own rate.
    pub professional_percentage: f64,
    pub session_ttl_seconds: u64,
    pub seed_file: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mongodb_uri =
            env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let mongodb_db = env::var("MONGODB_DB").unwrap_or_else(|_| "tense".to_string());

        let bind_address = env::var("BIND_ADDRESS")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDRESS must be host:port")?;

        let professional_percentage = match env::var("PROFESSIONAL_PERCENTAGE") {
            Ok(raw) => raw
                .trim()
                .parse::<f64>()
                .context("PROFESSIONAL_PERCENTAGE must be numeric")?,
            Err(_) => DEFAULT_PROFESSIONAL_PERCENTAGE,
        };
        if !(0.0..=1.0).contains(&professional_percentage) {
            bail!("PROFESSIONAL_PERCENTAGE must be between 0 and 1, got {professional_percentage}");
        }

        let session_ttl_seconds = match env::var("SESSION_TTL_SECONDS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .context("SESSION_TTL_SECONDS must be a positive integer")?,
            Err(_) => DEFAULT_SESSION_TTL_SECONDS,
        };

        let seed_file = env::var("SEED_FILE").unwrap_or_else(|_| "./data/seed.json".to_string());

        Ok(AppConfig {
            mongodb_uri,
            mongodb_db,
            bind_address,
            professional_percentage,
            session_ttl_seconds,
            seed_file,
        })
    }
}
