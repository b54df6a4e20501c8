//! Calendar data models.
//!
//! A calendar embeds its pages; pages have no identity outside their parent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::{Error, Result};

/// Number of pages a freshly created calendar carries.
pub const MONTHS_PER_YEAR: i32 = 12;

/// Style key used when the client does not pick one.
pub const DEFAULT_STYLE: &str = "classic";

fn default_start_month() -> i32 {
    1
}

fn default_style() -> String {
    DEFAULT_STYLE.to_string()
}

/// One month's page of a calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Page {
    /// Month number 1-12
    #[validate(range(min = 1, max = 12))]
    pub month: i32,
    /// URL path to uploaded image for this month
    #[serde(default)]
    pub image_url: Option<String>,
    /// Optional note shown on the page
    #[serde(default)]
    pub note: Option<String>,
}

impl Page {
    /// Create a page with neither image nor note.
    pub fn empty(month: i32) -> Self {
        Self {
            month,
            image_url: None,
            note: None,
        }
    }

}

/// A page as stored, including fields `Page` does not model.
pub type RawPage = Map<String, Value>;

/// Calendar document as persisted in the `calendar` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Calendar {
    pub title: String,
    #[validate(range(min = 1900, max = 3000))]
    pub year: i32,
    #[serde(default = "default_start_month")]
    #[validate(range(min = 1, max = 12))]
    pub start_month: i32,
    /// Visual style key
    #[serde(default = "default_style")]
    pub style: String,
    /// Optional owner identifier, never resolved
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Calendar {
    /// Build a calendar with one empty page per month, rotated from `start_month`.
    ///
    /// Does not validate; callers validate the request first.
    pub fn from_request(request: NewCalendar, now: DateTime<Utc>) -> Self {
        let pages = rotated_months(request.start_month).map(Page::empty).collect();

        Self {
            title: request.title,
            year: request.year,
            start_month: request.start_month,
            style: request.style,
            owner: request.owner,
            pages,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// Page for `month`, if the calendar has one.
    pub fn page(&self, month: i32) -> Option<&Page> {
        self.pages.iter().find(|page| page.month == month)
    }
}

/// A calendar together with its store-assigned identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCalendar {
    pub id: String,
    #[serde(flatten)]
    pub calendar: Calendar,
}

/// Create calendar request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewCalendar {
    pub title: String,
    #[validate(range(min = 1900, max = 3000))]
    pub year: i32,
    #[serde(default = "default_start_month")]
    #[validate(range(min = 1, max = 12))]
    pub start_month: i32,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default)]
    pub owner: Option<String>,
}

impl NewCalendar {
    /// Request with default start month, style and no owner.
    pub fn new(title: impl Into<String>, year: i32) -> Self {
        Self {
            title: title.into(),
            year,
            start_month: default_start_month(),
            style: default_style(),
            owner: None,
        }
    }

    pub fn with_start_month(mut self, start_month: i32) -> Self {
        self.start_month = start_month;
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

/// Update page request. `None` means "leave as is".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageUpdate {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl PageUpdate {
    pub fn image(image_url: impl Into<String>) -> Self {
        Self {
            image_url: Some(image_url.into()),
            note: None,
        }
    }

    pub fn note(note: impl Into<String>) -> Self {
        Self {
            image_url: None,
            note: Some(note.into()),
        }
    }

    /// Apply to a stored page. Omitted fields and unknown keys are left unchanged.
    pub fn apply_to(&self, page: &mut RawPage) {
        if let Some(image_url) = &self.image_url {
            page.insert("image_url".to_string(), Value::String(image_url.clone()));
        }
        if let Some(note) = &self.note {
            page.insert("note".to_string(), Value::String(note.clone()));
        }
    }
}

/// Check that `month` is a calendar month.
pub fn validate_month(month: i32) -> Result<i32> {
    if (1..=MONTHS_PER_YEAR).contains(&month) {
        Ok(month)
    } else {
        Err(Error::InvalidField("Month must be 1..12".to_string()))
    }
}

/// The twelve months in page order, starting at `start_month` and wrapping.
pub fn rotated_months(start_month: i32) -> impl Iterator<Item = i32> {
    (0..MONTHS_PER_YEAR).map(move |i| (start_month - 1 + i).rem_euclid(MONTHS_PER_YEAR) + 1)
}

/// Update the page for `month` in place, appending a new page if none exists.
///
/// Appended pages carry only the supplied fields. Other months are not
/// backfilled and duplicates are not merged.
pub fn upsert_page(pages: &mut Vec<RawPage>, month: i32, update: &PageUpdate) {
    let is_month = |page: &RawPage| page.get("month").and_then(Value::as_i64) == Some(i64::from(month));

    match pages.iter_mut().find(|page| is_month(page)) {
        Some(page) => update.apply_to(page),
        None => {
            let mut page = RawPage::new();
            page.insert("month".to_string(), Value::from(month));
            page.insert("image_url".to_string(), Value::Null);
            page.insert("note".to_string(), Value::Null);
            update.apply_to(&mut page);
            pages.push(page);
        }
    }
}
