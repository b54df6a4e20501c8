//! HTTP helpers for the API handlers.

use lambda_http::{Body, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::Error;

/// Error envelope; successes of this API return bare payloads.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub error: String,
}

impl ApiResponse {
    pub fn error(message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            error: message.into(),
        }
    }
}

/// Headers every response carries; any origin may call the API.
const CORS_HEADERS: [(&str, &str); 3] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "GET, POST, PUT, OPTIONS"),
    ("access-control-allow-headers", "*"),
];

fn builder(status: u16) -> lambda_http::http::response::Builder {
    CORS_HEADERS
        .iter()
        .fold(Response::builder().status(status), |builder, (name, value)| {
            builder.header(*name, *value)
        })
}

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(status: u16, data: &T) -> Result<Response<Body>, lambda_http::Error> {
    Ok(builder(status)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(data)?))?)
}

/// Create a raw bytes response.
pub fn bytes_response(
    status: u16,
    content_type: &str,
    bytes: Vec<u8>,
) -> Result<Response<Body>, lambda_http::Error> {
    Ok(builder(status)
        .header("content-type", content_type)
        .body(Body::from(bytes))?)
}

/// Create an empty response, used for CORS preflight.
pub fn empty_response(status: u16) -> Result<Response<Body>, lambda_http::Error> {
    Ok(builder(status).body(Body::Empty)?)
}

/// Create an error response with the given status code and message.
pub fn error_response(status: u16, message: impl Into<String>) -> Result<Response<Body>, lambda_http::Error> {
    json_response(status, &ApiResponse::error(message))
}

/// Map a domain error onto its status code and public message.
pub fn error_to_response(err: &Error) -> Result<Response<Body>, lambda_http::Error> {
    error_response(err.status_code(), err.public_message())
}

/// Parse request body as JSON, mapping failures to `InvalidField`.
pub fn parse_json_body<T: DeserializeOwned>(body: &Body) -> crate::Result<T> {
    serde_json::from_slice(body.as_ref())
        .map_err(|e| Error::InvalidField(format!("Invalid request body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Probe {
        name: String,
    }

    #[test]
    fn test_error_response_envelope() {
        let response = error_to_response(&Error::NotFound("Calendar not found".into())).unwrap();
        assert_eq!(response.status(), 404);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");

        let body: serde_json::Value = serde_json::from_slice(response.body().as_ref()).unwrap();
        assert_eq!(body, serde_json::json!({"success": false, "error": "Calendar not found"}));
    }

    #[test]
    fn test_parse_json_body() {
        let probe: Probe = parse_json_body(&Body::from(r#"{"name":"ok"}"#)).unwrap();
        assert_eq!(probe.name, "ok");

        let err = parse_json_body::<Probe>(&Body::from("{")).unwrap_err();
        assert!(matches!(err, Error::InvalidField(_)));
    }
}
