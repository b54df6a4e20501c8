//! Calendar use cases over the document store.
//!
//! The service keeps no state of its own between calls. Page updates are a
//! read-modify-write of the whole `pages` array, so concurrent updates to the
//! same calendar are last-writer-wins.

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use validator::Validate;

use crate::models::{
    upsert_page, validate_month, Calendar, NewCalendar, Page, PageUpdate, RawPage, StoredCalendar,
};
use crate::store::{parse_document_id, Document, DocumentBody, Filter, Store};
use crate::{Error, Result};

/// Collection holding calendar documents.
pub const CALENDAR_COLLECTION: &str = "calendar";

/// Result-count limit used when the caller does not give one.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Calendar creation, lookup and page upsert.
#[derive(Debug, Clone)]
pub struct CalendarService {
    store: Store,
}

impl CalendarService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Create a calendar with twelve empty pages and return its identifier.
    pub async fn create_calendar(&self, request: NewCalendar) -> Result<String> {
        request.validate()?;

        let calendar = Calendar::from_request(request, Utc::now());
        let document = encode(&calendar)?;

        let client = self.store.client()?;
        let id = client.insert(CALENDAR_COLLECTION, document).await?;

        info!(
            "Created calendar {} for {} starting at month {}",
            id, calendar.year, calendar.start_month
        );
        Ok(id.to_string())
    }

    /// Look up one calendar by identifier.
    pub async fn get_calendar(&self, calendar_id: &str) -> Result<StoredCalendar> {
        let id = parse_document_id(calendar_id)?;
        let client = self.store.client()?;

        let document = client
            .find_one(CALENDAR_COLLECTION, id)
            .await?
            .ok_or_else(calendar_not_found)?;

        decode_calendar(document)
    }

    /// Calendars in stored order, at most `limit` of them (`0` for all).
    ///
    /// Documents that do not decode are logged and skipped; they do not count
    /// towards `limit`.
    pub async fn list_calendars(&self, limit: usize) -> Result<Vec<StoredCalendar>> {
        let client = self.store.client()?;
        let documents = client.find(CALENDAR_COLLECTION, &Filter::new(), 0).await?;
        let limit = if limit == 0 { usize::MAX } else { limit };

        Ok(documents
            .into_iter()
            .filter_map(|document| {
                let id = document.id;
                match decode_calendar(document) {
                    Ok(calendar) => Some(calendar),
                    Err(e) => {
                        warn!("Skipping undecodable calendar {}: {}", id, e);
                        None
                    }
                }
            })
            .take(limit)
            .collect())
    }

    /// Set the image and/or note of one month's page.
    ///
    /// The month is checked before the identifier, and both before the store
    /// is touched.
    pub async fn update_page(&self, calendar_id: &str, month: i32, update: PageUpdate) -> Result<()> {
        let month = validate_month(month)?;
        let id = parse_document_id(calendar_id)?;
        let client = self.store.client()?;

        let document = client
            .find_one(CALENDAR_COLLECTION, id)
            .await?
            .ok_or_else(calendar_not_found)?;

        let mut pages = decode_pages(&document)?;
        upsert_page(&mut pages, month, &update);

        let mut fields = DocumentBody::new();
        fields.insert("pages".to_string(), serde_json::to_value(&pages)?);
        fields.insert("updated_at".to_string(), serde_json::to_value(Utc::now())?);

        if !client.set_fields(CALENDAR_COLLECTION, id, fields).await? {
            return Err(calendar_not_found());
        }

        info!("Updated page {} of calendar {}", month, id);
        Ok(())
    }
}

fn calendar_not_found() -> Error {
    Error::NotFound("Calendar not found".to_string())
}

fn encode(calendar: &Calendar) -> Result<DocumentBody> {
    match serde_json::to_value(calendar)? {
        Value::Object(body) => Ok(body),
        _ => Err(Error::StoreUnavailable("calendar did not encode to an object".to_string())),
    }
}

/// Typed view of a stored document. Shape errors are store problems; range
/// errors are field problems.
fn decode_calendar(document: Document) -> Result<StoredCalendar> {
    let id = document.id;
    let calendar: Calendar = serde_json::from_value(Value::Object(document.body))
        .map_err(|e| Error::StoreUnavailable(format!("calendar {} could not be decoded: {}", id, e)))?;
    calendar.validate()?;

    Ok(StoredCalendar {
        id: id.to_string(),
        calendar,
    })
}

/// Stored pages as raw maps, so keys `Page` does not model survive a rewrite.
/// Each page must still decode as a `Page`.
fn decode_pages(document: &Document) -> Result<Vec<RawPage>> {
    let undecodable = |e: serde_json::Error| {
        Error::StoreUnavailable(format!(
            "pages of calendar {} could not be decoded: {}",
            document.id, e
        ))
    };

    let pages: Vec<RawPage> = match document.body.get("pages") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(pages) => serde_json::from_value(pages.clone()).map_err(undecodable)?,
    };
    for page in &pages {
        serde_json::from_value::<Page>(Value::Object(page.clone())).map_err(undecodable)?;
    }

    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentId, DocumentStore, MemoryDocumentStore};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Barrier;

    fn service() -> CalendarService {
        CalendarService::new(Store::available(MemoryDocumentStore::default()))
    }

    fn months(calendar: &StoredCalendar) -> Vec<i32> {
        calendar.calendar.pages.iter().map(|p| p.month).collect()
    }

    #[tokio::test]
    async fn test_create_and_update_end_to_end() {
        let service = service();
        let id = service
            .create_calendar(NewCalendar::new("Team 2025", 2025).with_start_month(4))
            .await
            .unwrap();

        let created = service.get_calendar(&id).await.unwrap();
        assert_eq!(created.id, id);
        assert_eq!(created.calendar.pages.len(), 12);
        assert_eq!(created.calendar.pages[0].month, 4);

        service
            .update_page(&id, 4, PageUpdate::image("/uploads/x.jpg"))
            .await
            .unwrap();

        let updated = service.get_calendar(&id).await.unwrap();
        let page = updated.calendar.page(4).unwrap();
        assert_eq!(page.image_url.as_deref(), Some("/uploads/x.jpg"));
        assert!(page.note.is_none());
        assert_eq!(months(&updated), months(&created));
        assert!(updated.calendar.updated_at >= created.calendar.updated_at);
    }

    #[tokio::test]
    async fn test_create_rejects_out_of_range_fields() {
        let service = service();

        let err = service.create_calendar(NewCalendar::new("t", 1899)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidField(_)));

        let err = service
            .create_calendar(NewCalendar::new("t", 2025).with_start_month(13))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidField(_)));
    }

    #[tokio::test]
    async fn test_create_keeps_style_and_owner() {
        let service = service();
        let id = service
            .create_calendar(NewCalendar::new("", 2030).with_style("minimal").with_owner("user-7"))
            .await
            .unwrap();

        let calendar = service.get_calendar(&id).await.unwrap().calendar;
        assert_eq!(calendar.title, "");
        assert_eq!(calendar.style, "minimal");
        assert_eq!(calendar.owner.as_deref(), Some("user-7"));
    }

    #[tokio::test]
    async fn test_get_calendar_errors() {
        let service = service();

        let err = service.get_calendar("xyz").await.unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));

        let missing = uuid::Uuid::new_v4().to_string();
        let err = service.get_calendar(&missing).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_calendars_in_stored_order_with_limit() {
        let service = service();
        let mut ids = Vec::new();
        for year in 2020..2025 {
            ids.push(service.create_calendar(NewCalendar::new("t", year)).await.unwrap());
        }

        let all = service.list_calendars(DEFAULT_LIST_LIMIT).await.unwrap();
        let listed: Vec<String> = all.iter().map(|c| c.id.clone()).collect();
        assert_eq!(listed, ids);

        let first_two = service.list_calendars(2).await.unwrap();
        assert_eq!(first_two.len(), 2);
        assert_eq!(first_two[1].calendar.year, 2021);

        assert_eq!(service.list_calendars(0).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_list_skips_corrupt_documents() {
        let store = Arc::new(MemoryDocumentStore::default());
        let service = CalendarService::new(Store::Available(store.clone()));
        service.create_calendar(NewCalendar::new("good", 2025)).await.unwrap();
        store
            .insert(CALENDAR_COLLECTION, json!({"title": "bad"}).as_object().unwrap().clone())
            .await
            .unwrap();

        let listed = service.list_calendars(10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].calendar.title, "good");
    }

    #[tokio::test]
    async fn test_list_limit_counts_only_decodable_calendars() {
        let store = Arc::new(MemoryDocumentStore::default());
        let service = CalendarService::new(Store::Available(store.clone()));
        store
            .insert(CALENDAR_COLLECTION, json!({"year": "soon"}).as_object().unwrap().clone())
            .await
            .unwrap();
        for year in [2025, 2026, 2027] {
            service.create_calendar(NewCalendar::new("t", year)).await.unwrap();
        }

        let listed = service.list_calendars(2).await.unwrap();
        let years: Vec<i32> = listed.iter().map(|c| c.calendar.year).collect();
        assert_eq!(years, vec![2025, 2026]);
        assert_eq!(service.list_calendars(0).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_keeps_unknown_page_fields() {
        let store = Arc::new(MemoryDocumentStore::default());
        let service = CalendarService::new(Store::Available(store.clone()));
        let document = json!({
            "title": "imported",
            "year": 2025,
            "pages": [{"month": 1, "caption": "keep"}, {"month": 3, "frame": "gold"}]
        });
        let id = store
            .insert(CALENDAR_COLLECTION, document.as_object().unwrap().clone())
            .await
            .unwrap();

        service.update_page(&id.to_string(), 2, PageUpdate::note("n")).await.unwrap();
        service.update_page(&id.to_string(), 3, PageUpdate::image("/uploads/m.jpg")).await.unwrap();

        let stored = store.find_one(CALENDAR_COLLECTION, id).await.unwrap().unwrap();
        assert_eq!(
            stored.body["pages"],
            json!([
                {"month": 1, "caption": "keep"},
                {"month": 3, "frame": "gold", "image_url": "/uploads/m.jpg"},
                {"month": 2, "image_url": null, "note": "n"}
            ])
        );
    }

    #[tokio::test]
    async fn test_update_rejects_malformed_stored_pages() {
        let store = Arc::new(MemoryDocumentStore::default());
        let service = CalendarService::new(Store::Available(store.clone()));
        let document = json!({"title": "t", "year": 2025, "pages": [{"caption": "no month"}]});
        let id = store
            .insert(CALENDAR_COLLECTION, document.as_object().unwrap().clone())
            .await
            .unwrap();

        let err = service
            .update_page(&id.to_string(), 1, PageUpdate::note("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_update_note_keeps_image() {
        let service = service();
        let id = service.create_calendar(NewCalendar::new("t", 2025)).await.unwrap();

        service.update_page(&id, 6, PageUpdate::image("/uploads/june.png")).await.unwrap();
        service.update_page(&id, 6, PageUpdate::note("Summer")).await.unwrap();

        let calendar = service.get_calendar(&id).await.unwrap();
        let page = calendar.calendar.page(6).unwrap();
        assert_eq!(page.image_url.as_deref(), Some("/uploads/june.png"));
        assert_eq!(page.note.as_deref(), Some("Summer"));
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let service = service();
        let id = service.create_calendar(NewCalendar::new("t", 2025)).await.unwrap();
        let update = PageUpdate {
            image_url: Some("/uploads/a.jpg".into()),
            note: Some("same".into()),
        };

        service.update_page(&id, 2, update.clone()).await.unwrap();
        let once = service.get_calendar(&id).await.unwrap().calendar.pages;
        service.update_page(&id, 2, update).await.unwrap();
        let twice = service.get_calendar(&id).await.unwrap().calendar.pages;

        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_update_rejects_month_before_anything_else() {
        let service = service();
        let missing = uuid::Uuid::new_v4().to_string();
        let unavailable = CalendarService::new(Store::unavailable("down"));

        for month in [0, 13] {
            for calendar_id in [missing.as_str(), "garbage"] {
                let err = service
                    .update_page(calendar_id, month, PageUpdate::note("x"))
                    .await
                    .unwrap_err();
                assert!(matches!(err, Error::InvalidField(_)));
            }

            let err = unavailable
                .update_page(&missing, month, PageUpdate::note("x"))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidField(_)));
        }
    }

    #[tokio::test]
    async fn test_update_error_order() {
        let unavailable = CalendarService::new(Store::unavailable("down"));
        let err = unavailable
            .update_page("garbage", 3, PageUpdate::note("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));

        let missing = uuid::Uuid::new_v4().to_string();
        let err = unavailable
            .update_page(&missing, 3, PageUpdate::note("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));

        let err = service()
            .update_page(&missing, 3, PageUpdate::note("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_appends_missing_month() {
        let store = Arc::new(MemoryDocumentStore::default());
        let service = CalendarService::new(Store::Available(store.clone()));
        let document = json!({
            "title": "partial",
            "year": 2025,
            "pages": [{"month": 1}, {"month": 2}]
        });
        let id = store
            .insert(CALENDAR_COLLECTION, document.as_object().unwrap().clone())
            .await
            .unwrap();

        service
            .update_page(&id.to_string(), 8, PageUpdate::image("/uploads/aug.jpg"))
            .await
            .unwrap();

        let calendar = service.get_calendar(&id.to_string()).await.unwrap();
        assert_eq!(months(&calendar), vec![1, 2, 8]);
        assert_eq!(calendar.calendar.pages[2].image_url.as_deref(), Some("/uploads/aug.jpg"));
        assert_eq!(calendar.calendar.start_month, 1);
        assert_eq!(calendar.calendar.style, "classic");
    }

    #[tokio::test]
    async fn test_store_unavailable() {
        let service = CalendarService::new(Store::unavailable("DATABASE_URL not set"));
        let id = uuid::Uuid::new_v4().to_string();

        assert!(matches!(
            service.create_calendar(NewCalendar::new("t", 2025)).await,
            Err(Error::StoreUnavailable(_))
        ));
        assert!(matches!(service.get_calendar(&id).await, Err(Error::StoreUnavailable(_))));
        assert!(matches!(service.list_calendars(5).await, Err(Error::StoreUnavailable(_))));
    }

    /// Holds the first two reads until both have happened, so two updates
    /// start from the same snapshot.
    struct SnapshotGate {
        inner: MemoryDocumentStore,
        barrier: Barrier,
        gated_reads: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for SnapshotGate {
        fn name(&self) -> &str {
            self.inner.name()
        }

        async fn insert(&self, collection: &str, document: DocumentBody) -> Result<DocumentId> {
            self.inner.insert(collection, document).await
        }

        async fn find(&self, collection: &str, filter: &Filter, limit: usize) -> Result<Vec<Document>> {
            self.inner.find(collection, filter, limit).await
        }

        async fn find_one(&self, collection: &str, id: DocumentId) -> Result<Option<Document>> {
            let document = self.inner.find_one(collection, id).await;
            if self.gated_reads.fetch_add(1, Ordering::SeqCst) < 2 {
                self.barrier.wait().await;
            }
            document
        }

        async fn set_fields(&self, collection: &str, id: DocumentId, fields: DocumentBody) -> Result<bool> {
            self.inner.set_fields(collection, id, fields).await
        }

        async fn collection_names(&self) -> Result<Vec<String>> {
            self.inner.collection_names().await
        }
    }

    #[tokio::test]
    async fn test_concurrent_updates_from_one_snapshot_lose_a_write() {
        let gate = SnapshotGate {
            inner: MemoryDocumentStore::default(),
            barrier: Barrier::new(2),
            gated_reads: AtomicUsize::new(2),
        };
        let store = Arc::new(gate);
        let service = CalendarService::new(Store::Available(store.clone()));
        let id = service.create_calendar(NewCalendar::new("race", 2025)).await.unwrap();

        // Arm the gate for the next two reads.
        store.gated_reads.store(0, Ordering::SeqCst);

        let (first, second) = tokio::join!(
            service.update_page(&id, 1, PageUpdate::note("january")),
            service.update_page(&id, 2, PageUpdate::note("february")),
        );
        first.unwrap();
        second.unwrap();

        let calendar = service.get_calendar(&id).await.unwrap().calendar;
        let january = calendar.page(1).unwrap().note.is_some();
        let february = calendar.page(2).unwrap().note.is_some();

        assert!(january || february);
        assert!(!(january && february), "both writes survived a shared snapshot");
    }

    #[tokio::test]
    async fn test_sequential_updates_both_survive() {
        let service = service();
        let id = service.create_calendar(NewCalendar::new("calm", 2025)).await.unwrap();

        service.update_page(&id, 1, PageUpdate::note("january")).await.unwrap();
        service.update_page(&id, 2, PageUpdate::note("february")).await.unwrap();

        let calendar = service.get_calendar(&id).await.unwrap().calendar;
        assert_eq!(calendar.page(1).unwrap().note.as_deref(), Some("january"));
        assert_eq!(calendar.page(2).unwrap().note.as_deref(), Some("february"));
    }
}
