//! Database connection management.

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::store::{DocumentStore, MemoryDocumentStore, PgDocumentStore, Store};
use crate::{Config, Error, Result};

/// URL scheme selecting the in-process store.
pub const MEMORY_URL_PREFIX: &str = "memory:";

/// Create a database connection pool.
pub async fn create_pool(database_url: &str, database_name: Option<&str>) -> Result<PgPool> {
    let mut options = PgConnectOptions::from_str(database_url)
        .map_err(|e| Error::Config(format!("Invalid DATABASE_URL: {}", e)))?;
    if let Some(name) = database_name {
        options = options.database(name);
    }

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Open the document store described by `config`.
///
/// Never fails: a missing or unreachable database yields `Store::Unavailable`.
pub async fn connect(config: &Config) -> Store {
    let Some(database_url) = config.database_url.as_deref() else {
        warn!("DATABASE_URL not set, document store unavailable");
        return Store::unavailable("DATABASE_URL not set");
    };

    let name = config
        .database_name
        .clone()
        .unwrap_or_else(|| "calendar".to_string());

    if database_url.starts_with(MEMORY_URL_PREFIX) {
        info!("Using in-memory document store {}", name);
        return Store::available(MemoryDocumentStore::new(name));
    }

    let store = match create_pool(database_url, config.database_name.as_deref()).await {
        Ok(pool) => PgDocumentStore::new(pool, name).await,
        Err(e) => Err(e),
    };

    match store {
        Ok(store) => {
            info!("Connected to document store {}", store.name());
            Store::available(store)
        }
        Err(e) => {
            warn!("Document store unavailable: {}", e);
            Store::unavailable(e.to_string())
        }
    }
}
