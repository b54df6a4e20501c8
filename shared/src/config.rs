//! Configuration management for the calendar backend.

use std::env;
use std::path::PathBuf;

use crate::{Error, Result};

/// Port used when `PORT` is not set.
pub const DEFAULT_PORT: u16 = 8000;

/// Upload directory used when `UPLOAD_DIR` is not set.
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the local HTTP server
    pub port: u16,
    /// Document store connection URL (`memory://` selects the in-process store)
    pub database_url: Option<String>,
    /// Database name applied on top of the connection URL
    pub database_name: Option<String>,
    /// Directory holding uploaded images
    pub upload_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("PORT must be a port number: {}", e)))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            port,
            database_url: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
            database_name: lookup("DATABASE_NAME").filter(|v| !v.is_empty()),
            upload_dir: lookup("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
        })
    }
}
