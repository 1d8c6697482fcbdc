//! Search/filter evaluator used on every store read.
//!
//! Stateless: restricts a buffer to one category, preserving order, then
//! keeps entries whose searchable text contains the query (case-insensitive).
//! A field that cannot be serialized simply does not match.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::model::{Category, LogEntry, Payload};

/// Entries of `category` matching `query`, in buffer order.
pub fn filter_entries<'a, I>(entries: I, category: Category, query: &str) -> Vec<LogEntry>
where
    I: IntoIterator<Item = &'a LogEntry>,
{
    let in_category = entries
        .into_iter()
        .filter(|entry| entry.category() == category);

    if query.trim().is_empty() {
        return in_category.cloned().collect();
    }

    let needle = query.to_lowercase();
    in_category
        .filter(|entry| matches_query(entry, &needle))
        .cloned()
        .collect()
}

/// `needle` must already be lower-cased.
pub fn matches_query(entry: &LogEntry, needle: &str) -> bool {
    if contains(&entry.summary, needle) {
        return true;
    }

    match &entry.payload {
        Payload::Console(console) => console.args.iter().any(|arg| match arg {
            Value::String(s) => contains(s, needle),
            Value::Object(_) | Value::Array(_) => serialized_contains(arg, needle),
            _ => false,
        }),
        Payload::Network(net) => {
            contains(&net.url, needle)
                || contains(&net.method, needle)
                || serialized_contains(&or_empty(&net.request_body), needle)
                || serialized_contains(&or_empty(&net.response_body), needle)
        }
        Payload::Analytics(event) => {
            contains(&event.name, needle)
                || match &event.properties {
                    Some(props) => serialized_contains(props, needle),
                    None => serialized_contains(&Map::new(), needle),
                }
        }
        Payload::Socket(socket) => {
            socket
                .url
                .as_deref()
                .map(|url| contains(url, needle))
                .unwrap_or(false)
                || contains(socket.phase.as_str(), needle)
                || serialized_contains(&or_empty(&socket.data), needle)
        }
    }
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn or_empty(value: &Option<Value>) -> Value {
    value.clone().unwrap_or_else(|| Value::Object(Map::new()))
}

fn serialized_contains<T: Serialize + ?Sized>(value: &T, needle: &str) -> bool {
    serde_json::to_string(value)
        .map(|text| text.to_lowercase().contains(needle))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LogLevel, NetworkPayload, SocketPayload, SocketPhase};
    use serde::ser::Error as _;
    use serde_json::json;

    fn net(url: &str, status: Option<u16>, body: Option<Value>) -> LogEntry {
        LogEntry::network(NetworkPayload {
            method: "GET".to_string(),
            url: url.to_string(),
            status_code: status,
            response_body: body,
            ..Default::default()
        })
    }

    #[test]
    fn empty_query_returns_category_slice_in_order() {
        let buffer = vec![
            net("https://a.test/2", Some(200), None),
            LogEntry::console(LogLevel::Info, vec![json!("x")]),
            net("https://a.test/1", Some(200), None),
        ];
        let result = filter_entries(&buffer, Category::Network, "   ");
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, buffer[0].id);
        assert_eq!(result[1].id, buffer[2].id);
    }

    #[test]
    fn network_matches_url_status_and_body() {
        let buffer = vec![
            net("https://a.test/missing", Some(404), None),
            net("https://a.test/ok", Some(200), Some(json!({"note": "ERR-404 upstream"}))),
            net("https://a.test/ok", Some(200), Some(json!({"note": "fine"}))),
            net("https://a.test/404-page", Some(200), None),
        ];
        let result = filter_entries(&buffer, Category::Network, "404");
        assert_eq!(result.len(), 3);
        assert!(result.iter().all(|e| e.id != buffer[2].id));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let buffer = vec![LogEntry::analytics("Checkout_Started", None)];
        assert_eq!(filter_entries(&buffer, Category::Analytics, "checkout").len(), 1);
        assert_eq!(filter_entries(&buffer, Category::Analytics, "CHECKOUT").len(), 1);
    }

    #[test]
    fn console_searches_object_arguments() {
        let buffer = vec![LogEntry::console(
            LogLevel::Warn,
            vec![json!("retrying"), json!({"attempt": 3, "host": "Cache-01"})],
        )];
        assert_eq!(filter_entries(&buffer, Category::Console, "cache-01").len(), 1);
        assert!(filter_entries(&buffer, Category::Console, "db-02").is_empty());
    }

    #[test]
    fn socket_searches_phase_and_payload() {
        let buffer = vec![LogEntry::socket(SocketPayload {
            phase: SocketPhase::Message,
            url: Some("wss://feed.test".to_string()),
            data: Some(json!({"type": "heartbeat"})),
        })];
        assert_eq!(filter_entries(&buffer, Category::Socket, "heartbeat").len(), 1);
        assert_eq!(filter_entries(&buffer, Category::Socket, "MESSAGE").len(), 1);
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("cyclic structure"))
        }
    }

    #[test]
    fn serialization_failure_is_a_non_match() {
        assert!(!serialized_contains(&Unserializable, "anything"));
    }
}
