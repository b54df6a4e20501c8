//! Shared library for the photo calendar backend.
//!
//! This crate holds the calendar model, the document store boundary and the
//! services the HTTP layer calls into.

pub mod calendar;
pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod http;
pub mod models;
pub mod store;
pub mod uploads;

pub use calendar::{CalendarService, CALENDAR_COLLECTION, DEFAULT_LIST_LIMIT};
pub use config::Config;
pub use error::{Error, Result};
pub use models::{Calendar, NewCalendar, Page, PageUpdate, StoredCalendar};
pub use store::{DocumentStore, MemoryDocumentStore, Store};
pub use uploads::{IncomingFile, UploadStore};
