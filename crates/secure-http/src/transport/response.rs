//! Parsed transport responses.

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{Result, TransportError};

/// The body of a response, read in full.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
    /// No content.
    Empty,
    /// A body parsed as JSON.
    Json(serde_json::Value),
    /// Any other body, decoded as text.
    Text(String),
}

impl ResponseBody {
    /// Parse raw bytes, preferring JSON when `prefer_json` is set and the
    /// bytes are valid JSON.
    pub(crate) fn parse(bytes: &Bytes, prefer_json: bool) -> Self {
        if bytes.is_empty() {
            return Self::Empty;
        }
        if prefer_json {
            if let Ok(value) = serde_json::from_slice(bytes) {
                return Self::Json(value);
            }
        }
        Self::Text(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// A response from the reqwest transport, with its body already read.
#[derive(Clone, Debug)]
pub struct TransportResponse {
    status: u16,
    headers: http::HeaderMap,
    url: String,
    body: ResponseBody,
}

impl TransportResponse {
    pub(crate) fn new(
        status: u16,
        headers: http::HeaderMap,
        url: String,
        body: ResponseBody,
    ) -> Self {
        Self {
            status,
            headers,
            url,
            body,
        }
    }

    /// Get the HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Check if the response indicates success (2xx status).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the response is a client error (4xx status).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if the response is a server error (5xx status).
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Get the response headers.
    pub fn headers(&self) -> &http::HeaderMap {
        &self.headers
    }

    /// Get a specific header value.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Get the Content-Type header value.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Get the final URL after redirects.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The parsed body.
    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Consume the response, returning the parsed body.
    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// The body as text. JSON bodies are re-serialized.
    pub fn text(&self) -> String {
        match &self.body {
            ResponseBody::Empty => String::new(),
            ResponseBody::Json(value) => value.to_string(),
            ResponseBody::Text(text) => text.clone(),
        }
    }

    /// Deserialize the body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.body {
            ResponseBody::Json(value) => serde_json::from_value(value.clone())
                .map_err(|e| TransportError::InvalidBody(e.to_string())),
            ResponseBody::Text(text) => serde_json::from_str(text)
                .map_err(|e| TransportError::InvalidBody(e.to_string())),
            ResponseBody::Empty => Err(TransportError::InvalidBody(
                "Response body is empty".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefers_json() {
        let bytes = Bytes::from_static(br#"{"ok":true}"#);
        assert_eq!(
            ResponseBody::parse(&bytes, true),
            ResponseBody::Json(serde_json::json!({"ok": true}))
        );
        assert_eq!(
            ResponseBody::parse(&bytes, false),
            ResponseBody::Text(r#"{"ok":true}"#.to_string())
        );
    }

    #[test]
    fn test_parse_falls_back_to_text() {
        let bytes = Bytes::from_static(b"plain words");
        assert_eq!(
            ResponseBody::parse(&bytes, true),
            ResponseBody::Text("plain words".to_string())
        );
        assert_eq!(ResponseBody::parse(&Bytes::new(), true), ResponseBody::Empty);
    }

    #[test]
    fn test_status_classes() {
        let response = TransportResponse::new(
            404,
            http::HeaderMap::new(),
            "http://host/x".to_string(),
            ResponseBody::Empty,
        );
        assert!(response.is_client_error());
        assert!(!response.is_success());
        assert!(response.json::<serde_json::Value>().is_err());
    }

    #[test]
    fn test_json_from_text_body() {
        let response = TransportResponse::new(
            200,
            http::HeaderMap::new(),
            "http://host/x".to_string(),
            ResponseBody::Text("[1,2]".to_string()),
        );
        let values: Vec<u32> = response.json().unwrap();
        assert_eq!(values, vec![1, 2]);
    }
}
