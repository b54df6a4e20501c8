//! HTTP surface of the photo calendar backend.
//!
//! Endpoints:
//! - GET /                                - Liveness
//! - GET /test                            - Document store diagnostics
//! - POST /upload                         - Upload an image (multipart field `file`)
//! - GET /uploads/{filename}              - Serve an uploaded image
//! - POST /calendars                      - Create a calendar
//! - GET /calendars?limit=                - List calendars
//! - GET /calendars/{id}                  - Get a calendar
//! - PUT /calendars/{id}/pages/{month}    - Set a page's image and/or note

use shared::{CalendarService, Config, Store, UploadStore};

pub mod multipart;
pub mod routes;
pub mod server;

pub use routes::handler;

/// Application state shared across requests.
pub struct AppState {
    pub config: Config,
    pub calendars: CalendarService,
    pub uploads: UploadStore,
}

impl AppState {
    pub fn new(config: Config, store: Store, uploads: UploadStore) -> Self {
        Self {
            config,
            calendars: CalendarService::new(store),
            uploads,
        }
    }

    /// Build state from configuration: open the upload directory and the store.
    pub async fn from_config(config: Config) -> shared::Result<Self> {
        let uploads = UploadStore::open(config.upload_dir.clone()).await?;
        let store = shared::db::connect(&config).await;
        Ok(Self::new(config, store, uploads))
    }

    pub fn store(&self) -> &Store {
        self.calendars.store()
    }
}
