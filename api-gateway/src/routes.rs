//! Request routing for the calendar API.

use lambda_http::{Body, Error, Request, RequestExt, Response};
use serde::Serialize;
use serde_json::{json, Value};
use shared::health::{diagnostics, liveness};
use shared::http::{bytes_response, empty_response, error_to_response, json_response, parse_json_body};
use shared::uploads::StoredFile;
use shared::{NewCalendar, PageUpdate, DEFAULT_LIST_LIMIT};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::multipart::extract_file;
use crate::AppState;

/// What a route produced, before it becomes an HTTP response.
enum Reply {
    Json(u16, Value),
    File(StoredFile),
    Empty(u16),
}

impl Reply {
    fn ok<T: Serialize>(data: &T) -> shared::Result<Self> {
        Ok(Reply::Json(200, serde_json::to_value(data)?))
    }
}

/// Entry point for every request, whether from Lambda or the local server.
pub async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let method = event.method().as_str().to_string();
    let raw_path = event.uri().path().to_string();
    let path = strip_stage(&raw_path);

    info!("Calendar API request: {} {}", method, path);

    match route(&state, &event, &method, path).await {
        Ok(Reply::Json(status, value)) => json_response(status, &value),
        Ok(Reply::File(file)) => bytes_response(200, file.content_type, file.bytes),
        Ok(Reply::Empty(status)) => empty_response(status),
        Err(e) if e.status_code() >= 500 => {
            error!("{} {} failed: {}", method, path, e);
            error_to_response(&e)
        }
        Err(e) => {
            warn!("{} {} rejected: {}", method, path, e);
            error_to_response(&e)
        }
    }
}

async fn route(state: &AppState, event: &Request, method: &str, path: &str) -> shared::Result<Reply> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (method, segments.as_slice()) {
        ("OPTIONS", _) => Ok(Reply::Empty(204)),

        ("GET", []) => Reply::ok(&liveness()),

        ("GET", ["test"]) => Reply::ok(&diagnostics(state.store(), &state.config).await),

        ("POST", ["upload"]) => {
            let content_type = event
                .headers()
                .get("content-type")
                .and_then(|value| value.to_str().ok());
            let file = extract_file(content_type, event.body().as_ref().to_vec()).await?;
            let url = state.uploads.save(&file).await?;
            Reply::ok(&json!({ "url": url }))
        }

        ("GET", ["uploads", filename]) => {
            let filename = urlencoding::decode(filename)
                .map_err(|_| shared::Error::NotFound("File not found".to_string()))?;
            Ok(Reply::File(state.uploads.read(&filename).await?))
        }

        ("POST", ["calendars"]) => {
            let request: NewCalendar = parse_json_body(event.body())?;
            let id = state.calendars.create_calendar(request).await?;
            Reply::ok(&json!({ "id": id }))
        }

        ("GET", ["calendars"]) => {
            let limit = list_limit(event)?;
            Reply::ok(&state.calendars.list_calendars(limit).await?)
        }

        ("GET", ["calendars", calendar_id]) => Reply::ok(&state.calendars.get_calendar(calendar_id).await?),

        ("PUT", ["calendars", calendar_id, "pages", month]) => {
            let month = parse_month(month)?;
            let update: PageUpdate = if event.body().as_ref().is_empty() {
                PageUpdate::default()
            } else {
                parse_json_body(event.body())?
            };
            state.calendars.update_page(calendar_id, month, update).await?;
            Reply::ok(&json!({ "status": "ok" }))
        }

        _ => Err(shared::Error::NotFound("Not found".to_string())),
    }
}

/// API Gateway REST APIs include the stage in the path.
fn strip_stage(raw_path: &str) -> &str {
    match raw_path.strip_prefix("/api") {
        Some("") => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => raw_path,
    }
}

fn parse_month(raw: &str) -> shared::Result<i32> {
    raw.parse()
        .map_err(|_| shared::Error::InvalidField("Month must be 1..12".to_string()))
}

fn list_limit(event: &Request) -> shared::Result<usize> {
    match query_param(event, "limit") {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| shared::Error::InvalidField("limit must be a non-negative integer".to_string())),
        None => Ok(DEFAULT_LIST_LIMIT),
    }
}

/// Query parameter from the Lambda event, falling back to the raw URI for
/// requests that did not come through API Gateway.
fn query_param(event: &Request, name: &str) -> Option<String> {
    if let Some(value) = event
        .query_string_parameters_ref()
        .and_then(|params| params.first(name))
    {
        return Some(value.to_string());
    }

    event
        .uri()
        .query()?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .map(|value| value.into_owned())
}
