//! HTTP capabilities: the future-based client and the legacy callback-style
//! request object, plus the decoding helpers both interceptor paths share.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::error::NetworkError;
use crate::guard::attempt;
use crate::model::payload::{display_value, UNREADABLE_BODY};
use crate::model::HeaderMap;

/// Keys a host header object may carry that are accessors rather than headers.
const HEADER_ACCESSOR_KEYS: [&str; 3] = ["map", "entries", "forEach"];

/// Header collection as the host runtime hands it over.
#[derive(Debug, Clone, PartialEq)]
pub enum RawHeaders {
    /// Ordered `(name, value)` pairs.
    Entries(Vec<(String, String)>),
    /// Loosely typed representation: a pair list, an object with a nested
    /// `map` object, or a plain key/value object.
    Dynamic(Value),
}

impl RawHeaders {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        RawHeaders::Entries(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Request handed to an [`HttpClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    /// `None` means GET.
    pub method: Option<String>,
    pub headers: Option<RawHeaders>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: None,
            headers: None,
            body: None,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_headers(mut self, headers: RawHeaders) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Upper-cased method, GET when unset.
    pub fn normalized_method(&self) -> String {
        self.method
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or("GET")
            .to_uppercase()
    }
}

/// Response returned by an [`HttpClient`].
///
/// The body is a shared buffer: [`HttpResponse::duplicate`] hands out a second
/// handle that can be consumed without affecting the caller's copy.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: RawHeaders,
    body: Arc<[u8]>,
}

impl HttpResponse {
    pub fn new(status: u16, headers: RawHeaders, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: Arc::from(body.into()),
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Independent handle onto the same response.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    pub fn text(&self) -> Option<String> {
        std::str::from_utf8(&self.body).ok().map(str::to_string)
    }

    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Future-based HTTP client.
pub trait HttpClient: Send + Sync {
    fn fetch(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, NetworkError>>;
}

/// Completion data delivered to a legacy request's load handler.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadEvent {
    pub status: u16,
    /// `None` when the host could not expose the body as text.
    pub response_text: Option<String>,
    /// Raw `Name: value\r\n` block, when available.
    pub raw_headers: Option<String>,
}

pub type LoadHandler = Arc<dyn Fn(&LoadEvent) + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(&NetworkError) + Send + Sync>;

/// Callback-style request object: open, set headers, send, then the host
/// invokes whichever handler is attached when the exchange settles.
pub trait LegacyRequest: Send {
    fn open(&mut self, method: &str, url: &str) -> Result<(), NetworkError>;
    fn set_request_header(&mut self, name: &str, value: &str) -> Result<(), NetworkError>;
    fn on_load(&self) -> Option<LoadHandler>;
    fn set_on_load(&mut self, handler: Option<LoadHandler>);
    fn on_error(&self) -> Option<ErrorHandler>;
    fn set_on_error(&mut self, handler: Option<ErrorHandler>);
    fn send(&mut self, body: Option<Value>) -> Result<(), NetworkError>;
}

/// Constructor for legacy request objects.
pub trait RequestFactory: Send + Sync {
    fn create(&self) -> Box<dyn LegacyRequest>;
}

/// Flatten any header shape into a map, degrading to empty.
pub fn extract_headers(raw: &RawHeaders) -> HeaderMap {
    attempt(
        "extract headers",
        || match raw {
            RawHeaders::Entries(pairs) => pairs.iter().cloned().collect(),
            RawHeaders::Dynamic(value) => extract_dynamic(value),
        },
        HeaderMap::new(),
    )
}

fn extract_dynamic(value: &Value) -> HeaderMap {
    if let Some(entries) = headers_from_entries(value) {
        return entries;
    }
    if let Some(Value::Object(map)) = value.get("map") {
        return headers_from_object(map, &[]);
    }
    if let Value::Object(map) = value {
        return headers_from_object(map, &HEADER_ACCESSOR_KEYS);
    }
    HeaderMap::new()
}

fn headers_from_entries(value: &Value) -> Option<HeaderMap> {
    let items = value.as_array()?;
    let mut out = HeaderMap::new();
    for item in items {
        let pair = item.as_array()?;
        let name = pair.first()?.as_str()?;
        let value = pair.get(1).map(display_value).unwrap_or_default();
        out.insert(name.to_string(), value);
    }
    Some(out)
}

fn headers_from_object(map: &Map<String, Value>, skip: &[&str]) -> HeaderMap {
    map.iter()
        .filter(|(key, _)| !skip.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), display_value(value)))
        .collect()
}

/// Parse a raw `Name: value` header block, skipping malformed lines.
pub fn parse_header_block(block: &str) -> HeaderMap {
    block
        .split("\r\n")
        .filter_map(|line| line.split_once(": "))
        .filter(|(name, value)| !name.is_empty() && !value.is_empty())
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// Best-effort body decode: JSON, then UTF-8 text, then a placeholder.
pub fn decode_body(bytes: &[u8]) -> Value {
    if let Ok(json) = serde_json::from_slice::<Value>(bytes) {
        return json;
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => Value::String(UNREADABLE_BODY.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entries_shape() {
        let headers = extract_headers(&RawHeaders::from_pairs([("content-type", "text/plain")]));
        assert_eq!(headers.get("content-type").unwrap(), "text/plain");
    }

    #[test]
    fn dynamic_pair_list_shape() {
        let raw = RawHeaders::Dynamic(json!([["x-id", "7"], ["x-n", 3]]));
        let headers = extract_headers(&raw);
        assert_eq!(headers.get("x-id").unwrap(), "7");
        assert_eq!(headers.get("x-n").unwrap(), "3");
    }

    #[test]
    fn dynamic_nested_map_shape() {
        let raw = RawHeaders::Dynamic(json!({"map": {"accept": "application/json"}}));
        let headers = extract_headers(&raw);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("accept").unwrap(), "application/json");
    }

    #[test]
    fn dynamic_plain_object_skips_accessors() {
        let raw = RawHeaders::Dynamic(json!({"authorization": "t", "entries": "fn", "forEach": "fn"}));
        let headers = extract_headers(&raw);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key("authorization"));
    }

    #[test]
    fn unusable_shape_degrades_to_empty() {
        assert!(extract_headers(&RawHeaders::Dynamic(json!(42))).is_empty());
        assert!(extract_headers(&RawHeaders::Dynamic(json!([1, 2]))).is_empty());
    }

    #[test]
    fn header_block_parsing() {
        let headers = parse_header_block("content-type: text/html\r\nbroken-line\r\nx-a: 1\r\n");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("x-a").unwrap(), "1");
    }

    #[test]
    fn body_decode_fallback_chain() {
        assert_eq!(decode_body(br#"{"ok":true}"#), json!({"ok": true}));
        assert_eq!(decode_body(b"plain"), json!("plain"));
        assert_eq!(decode_body(&[0xff, 0xfe, 0x00]), json!(UNREADABLE_BODY));
    }

    #[test]
    fn method_normalization() {
        assert_eq!(HttpRequest::get("u").normalized_method(), "GET");
        assert_eq!(HttpRequest::get("u").with_method("post").normalized_method(), "POST");
    }

    #[test]
    fn duplicate_shares_body() {
        let response = HttpResponse::new(200, RawHeaders::Entries(vec![]), b"abc".to_vec());
        let copy = response.duplicate();
        assert_eq!(copy.body(), response.body());
        assert_eq!(response.text().as_deref(), Some("abc"));
    }
}
