//! Liveness and document store diagnostics.

use serde::Serialize;

use crate::store::Store;
use crate::Config;

/// Liveness message for `GET /`.
pub const LIVENESS_MESSAGE: &str = "Calendar backend running";

/// At most this many collection names are reported.
const MAX_COLLECTIONS: usize = 10;

/// Error strings are cut to this many characters.
const MAX_ERROR_CHARS: usize = 50;

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct Liveness {
    pub message: &'static str,
}

pub fn liveness() -> Liveness {
    Liveness {
        message: LIVENESS_MESSAGE,
    }
}

/// Store reachability report. Degrades to status strings instead of failing.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub backend: String,
    pub database: String,
    pub database_url: String,
    pub database_name: String,
    pub connection_status: String,
    pub collections: Vec<String>,
}

/// Probe the store and report what works.
pub async fn diagnostics(store: &Store, config: &Config) -> Diagnostics {
    let mut report = Diagnostics {
        backend: "✅ Running".to_string(),
        database: "❌ Not Available".to_string(),
        database_url: set_or_not(config.database_url.is_some()),
        database_name: set_or_not(config.database_name.is_some()),
        connection_status: "Not Connected".to_string(),
        collections: Vec::new(),
    };

    match store {
        Store::Available(client) => {
            report.connection_status = "Connected".to_string();
            match client.collection_names().await {
                Ok(mut names) => {
                    names.truncate(MAX_COLLECTIONS);
                    report.collections = names;
                    report.database = "✅ Connected & Working".to_string();
                }
                Err(e) => {
                    report.database = format!("⚠️  Connected but Error: {}", truncate(&e.to_string()));
                }
            }
        }
        Store::Unavailable { reason } => {
            report.database = format!("⚠️  Available but not initialized: {}", truncate(reason));
        }
    }

    report
}

fn set_or_not(present: bool) -> String {
    let label = if present { "✅ Set" } else { "❌ Not Set" };
    label.to_string()
}

fn truncate(message: &str) -> String {
    message.chars().take(MAX_ERROR_CHARS).collect()
}
