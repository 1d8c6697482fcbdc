//! End-to-end: simulated host capabilities patched by a store's interceptors.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bugbubble::capability::{
    ConsoleMethod, HttpRequest, LoadEvent, MessageData, RawHeaders, SocketEvent,
};
use bugbubble::error::NetworkError;
use bugbubble::interceptors::Interceptor;
use bugbubble::model::{Payload, SocketPhase};
use bugbubble::scheduler::{default_scheduler, ManualScheduler};
use bugbubble::testing::{SimulatedHost, CONNECTION_REFUSED};
use bugbubble::{Category, LogEntry, LogLevel, LogStore, PartialConfig};
use serde_json::json;

struct Harness {
    sim: SimulatedHost,
    scheduler: Arc<ManualScheduler>,
    store: Arc<LogStore>,
}

fn harness(config: PartialConfig) -> Harness {
    let sim = SimulatedHost::new();
    let scheduler = Arc::new(ManualScheduler::new());
    let store = LogStore::new(sim.host.clone(), scheduler.clone());
    store.initialize(config);
    Harness {
        sim,
        scheduler,
        store,
    }
}

fn network(entry: &LogEntry) -> &bugbubble::model::NetworkPayload {
    match &entry.payload {
        Payload::Network(net) => net,
        other => panic!("expected network payload, got {:?}", other),
    }
}

#[test]
fn initialize_starts_only_enabled_interceptors() {
    let h = harness(PartialConfig::default().with_category(Category::Socket, false));
    let status = h.store.interceptor_status();
    assert!(status[&Category::Network]);
    assert!(!status[&Category::Socket]);
    assert!(status[&Category::Console]);
    assert!(status[&Category::Analytics]);

    h.store.shutdown_interceptors();
    assert!(h.store.interceptor_status().values().all(|active| !active));
}

#[tokio::test]
async fn fetch_is_recorded_after_the_caller_sees_the_response() {
    let h = harness(PartialConfig::default());
    h.sim
        .routes
        .respond("https://api.test/users", 200, r#"{"users":[1,2]}"#);

    let response = h
        .sim
        .host
        .fetch(
            HttpRequest::get("https://api.test/users")
                .with_method("post")
                .with_headers(RawHeaders::Dynamic(json!({"map": {"x-id": "7"}})))
                .with_body(json!({"q": 1})),
        )
        .await
        .unwrap();
    assert_eq!(response.json(), Some(json!({"users": [1, 2]})));
    assert!(h.store.is_empty());

    h.scheduler.run_pending();
    let logs = h.store.get_filtered(Category::Network);
    assert_eq!(logs.len(), 1);
    let net = network(&logs[0]);
    assert_eq!(logs[0].summary, "POST https://api.test/users (200)");
    assert_eq!(net.request_headers.as_ref().unwrap()["x-id"], "7");
    assert_eq!(net.request_body, Some(json!({"q": 1})));
    assert_eq!(net.response_body, Some(json!({"users": [1, 2]})));
    assert!(net.duration_ms.is_some());
}

#[tokio::test]
async fn failed_fetch_passes_error_through_unchanged() {
    let h = harness(PartialConfig::default());
    let err = h
        .sim
        .host
        .fetch(HttpRequest::get("https://down.test/"))
        .await
        .unwrap_err();
    assert_eq!(err, NetworkError::new(CONNECTION_REFUSED));

    h.scheduler.run_pending();
    let logs = h.store.get_filtered(Category::Network);
    let net = network(&logs[0]);
    assert_eq!(net.status_code, None);
    assert_eq!(net.response_body, Some(json!(CONNECTION_REFUSED)));
    assert_eq!(logs[0].level, LogLevel::Info);
}

#[tokio::test]
async fn error_status_is_logged_at_error_level() {
    let h = harness(PartialConfig::default());
    h.sim
        .routes
        .respond("https://api.test/missing", 404, "not json at all");
    h.sim
        .host
        .fetch(HttpRequest::get("https://api.test/missing"))
        .await
        .unwrap();
    h.scheduler.run_pending();

    let logs = h.store.get_filtered(Category::Network);
    assert_eq!(logs[0].level, LogLevel::Error);
    assert_eq!(network(&logs[0]).response_body, Some(json!("not json at all")));
}

#[test]
fn legacy_request_snapshots_headers_at_send_and_keeps_caller_handler() {
    let h = harness(PartialConfig::default());
    h.sim
        .routes
        .respond("https://api.test/legacy", 201, "created");

    let seen_by_caller = Arc::new(Mutex::new(Vec::new()));
    let sink = seen_by_caller.clone();
    let mut request = h.sim.host.new_request().unwrap();
    request.open("put", "https://api.test/legacy").unwrap();
    request.set_request_header("x-before", "1").unwrap();
    request.set_on_load(Some(Arc::new(move |event: &LoadEvent| {
        sink.lock().unwrap().push(event.status)
    })));
    request.set_request_header("x-late", "2").unwrap();
    request.send(Some(json!("payload"))).unwrap();

    assert_eq!(*seen_by_caller.lock().unwrap(), vec![201]);

    h.scheduler.run_pending();
    let logs = h.store.get_filtered(Category::Network);
    assert_eq!(logs.len(), 1);
    let net = network(&logs[0]);
    assert_eq!(net.method, "PUT");
    let headers = net.request_headers.as_ref().unwrap();
    assert_eq!(headers.len(), 2);
    assert_eq!(headers["x-late"], "2");
    assert_eq!(net.response_body, Some(json!("created")));
    assert_eq!(
        net.response_headers.as_ref().unwrap()["content-type"],
        "application/json"
    );
}

#[test]
fn reused_legacy_request_records_each_exchange() {
    let h = harness(PartialConfig::default());
    h.sim.routes.respond("https://a.test/first", 201, "one");
    h.sim.routes.respond("https://a.test/second", 200, "two");

    let mut request = h.sim.host.new_request().unwrap();
    request.open("get", "https://a.test/first").unwrap();
    request.send(None).unwrap();

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();
    request.set_on_load(Some(Arc::new(move |event: &LoadEvent| {
        sink.lock().unwrap().push(event.status)
    })));
    request.open("post", "https://a.test/second").unwrap();
    request.set_request_header("x-second", "2").unwrap();
    request.send(Some(json!({"n": 2}))).unwrap();
    h.scheduler.run_pending();

    assert_eq!(*statuses.lock().unwrap(), vec![200]);
    let logs = h.store.get_filtered(Category::Network);
    assert_eq!(logs.len(), 2);

    let second = network(&logs[0]);
    assert_eq!(second.method, "POST");
    assert_eq!(second.url, "https://a.test/second");
    assert_eq!(second.status_code, Some(200));
    assert_eq!(second.request_body, Some(json!({"n": 2})));
    let headers = second.request_headers.as_ref().unwrap();
    assert_eq!(headers.len(), 1);
    assert_eq!(headers["x-second"], "2");

    let first = network(&logs[1]);
    assert_eq!(first.method, "GET");
    assert_eq!(first.url, "https://a.test/first");
    assert_eq!(first.status_code, Some(201));
    assert!(first.request_headers.as_ref().unwrap().is_empty());
}

#[test]
fn legacy_failure_reports_network_error() {
    let h = harness(PartialConfig::default());
    let caller_errors = Arc::new(Mutex::new(Vec::new()));
    let sink = caller_errors.clone();

    let mut request = h.sim.host.new_request().unwrap();
    request.open("GET", "https://nowhere.test/").unwrap();
    request.set_on_error(Some(Arc::new(move |err: &NetworkError| {
        sink.lock().unwrap().push(err.message.clone())
    })));
    request.send(None).unwrap();
    h.scheduler.run_pending();

    assert_eq!(
        *caller_errors.lock().unwrap(),
        vec![CONNECTION_REFUSED.to_string()]
    );
    let logs = h.store.get_filtered(Category::Network);
    assert_eq!(network(&logs[0]).status_code, None);
    assert_eq!(network(&logs[0]).response_body, Some(json!("Network Error")));
}

#[test]
fn socket_lifecycle_is_recorded_in_order() {
    let h = harness(PartialConfig::default());
    let url = "wss://feed.test/live";
    let mut socket = h.sim.host.connect(url, &[]).unwrap();
    h.sim.sockets.emit(url, SocketEvent::Open);
    socket
        .send(MessageData::Text(r#"{"type":"ping"}"#.to_string()))
        .unwrap();
    h.sim.sockets.emit(
        url,
        SocketEvent::Error {
            message: "reset".to_string(),
        },
    );
    socket.close(Some(4000), Some("bye")).unwrap();
    h.scheduler.run_pending();

    let logs = h.store.get_filtered(Category::Socket);
    let phases: Vec<SocketPhase> = logs
        .iter()
        .rev()
        .map(|entry| match &entry.payload {
            Payload::Socket(socket) => socket.phase,
            other => panic!("unexpected payload {:?}", other),
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            SocketPhase::Open,
            SocketPhase::Message,
            SocketPhase::Error,
            SocketPhase::Close
        ]
    );
    assert_eq!(logs[0].summary, format!("close ({})", url));
    assert_eq!(logs[1].level, LogLevel::Error);
    match &logs[0].payload {
        Payload::Socket(close) => assert_eq!(
            close.data,
            Some(json!({"code": 4000, "reason": "bye", "wasClean": true}))
        ),
        other => panic!("unexpected payload {:?}", other),
    }
}

#[test]
fn sockets_sharing_a_url_keep_their_own_traffic() {
    let h = harness(PartialConfig::default());
    let url = "wss://feed.test/shared";
    let mut first = h.sim.host.connect(url, &[]).unwrap();
    let mut second = h.sim.host.connect(url, &[]).unwrap();

    first
        .send(MessageData::Text("only-first".to_string()))
        .unwrap();
    h.scheduler.run_pending();
    let messages = h.store.get_filtered(Category::Socket);
    assert_eq!(messages.len(), 1);
    assert!(matches!(
        &messages[0].payload,
        Payload::Socket(socket) if socket.phase == SocketPhase::Message
    ));

    second.close(None, None).unwrap();
    assert_eq!(h.sim.sockets.open_count(url), 1);
    h.sim.sockets.emit(url, SocketEvent::Open);
    h.scheduler.run_pending();
    // one close for the second socket, one open for the first
    assert_eq!(h.store.get_filtered(Category::Socket).len(), 3);
}

#[test]
fn console_output_is_preserved_and_recorded() {
    let h = harness(PartialConfig::default());
    h.sim
        .host
        .console(ConsoleMethod::Error, &[json!("boom"), json!({"code": 1})]);
    h.sim.host.console(ConsoleMethod::Log, &[json!("hello")]);

    assert_eq!(
        h.sim.console.lines(),
        vec![r#"boom {"code":1}"#.to_string(), "hello".to_string()]
    );
    h.scheduler.run_pending();

    let logs = h.store.get_filtered(Category::Console);
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[1].summary, r#"boom {"code":1}"#);
    assert_eq!(logs[1].level, LogLevel::Error);
    assert_eq!(logs[0].level, LogLevel::Info);
}

#[test]
fn disabled_category_is_dropped_even_while_patched() {
    let h = harness(PartialConfig::default());
    h.store.set_category_enabled(Category::Console, false);
    h.sim.host.console(ConsoleMethod::Warn, &[json!("quiet")]);
    h.scheduler.run_pending();

    assert_eq!(h.sim.console.lines(), vec!["quiet".to_string()]);
    assert!(h.store.get_filtered(Category::Console).is_empty());
    assert!(h.store.interceptors().console.is_active());
}

#[test]
fn stop_restores_host_behaviour() {
    let h = harness(PartialConfig::default());
    h.store.shutdown_interceptors();
    h.sim.host.console(ConsoleMethod::Info, &[json!("after stop")]);
    h.scheduler.run_pending();

    assert_eq!(h.sim.console.lines(), vec!["after stop".to_string()]);
    assert!(h.store.is_empty());
}

#[test]
fn stop_puts_back_every_original_capability() {
    let sim = SimulatedHost::new();
    let original_http = sim.host.http.current().unwrap();
    let original_factory = sim.host.legacy_http.current().unwrap();
    let original_connector = sim.host.socket.current().unwrap();
    let scheduler = Arc::new(ManualScheduler::new());
    let store = LogStore::new(sim.host.clone(), scheduler.clone());

    store.initialize(PartialConfig::default());
    assert!(!sim.host.legacy_http.holds(&original_factory));
    assert!(!sim.host.socket.holds(&original_connector));

    store.shutdown_interceptors();
    assert!(sim.host.http.holds(&original_http));
    assert!(sim.host.legacy_http.holds(&original_factory));
    assert!(sim.host.socket.holds(&original_connector));

    sim.routes.respond("https://api.test/after", 200, "{}");
    let mut request = sim.host.new_request().unwrap();
    request.open("GET", "https://api.test/after").unwrap();
    request.send(None).unwrap();
    let mut socket = sim.host.connect("wss://feed.test/after", &[]).unwrap();
    socket.send(MessageData::Text("late".to_string())).unwrap();
    scheduler.run_pending();

    assert!(store.is_empty());
}

#[test]
fn analytics_track_records_immediately() {
    let h = harness(PartialConfig::default());
    h.store.interceptors().analytics.track("checkout", None);
    let logs = h.store.get_filtered(Category::Analytics);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].summary, "checkout");
}

#[tokio::test]
async fn runtime_scheduler_delivers_reports_without_draining() {
    let sim = SimulatedHost::new();
    let store = LogStore::new(sim.host.clone(), default_scheduler());
    store.initialize(PartialConfig::default());
    let mut entries = store.subscribe_entries();

    sim.host.console(ConsoleMethod::Info, &[json!("async path")]);
    let entry = tokio::time::timeout(Duration::from_secs(5), entries.recv())
        .await
        .expect("report delivered")
        .unwrap();
    assert_eq!(entry.summary, "async path");
    store.shutdown_interceptors();
}
