use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use bugbubble::capability::{ConsoleMethod, HttpRequest, MessageData, RawHeaders, SocketEvent};
use bugbubble::scheduler::ManualScheduler;
use bugbubble::testing::SimulatedHost;
use bugbubble::{init_tracing, Category, LogStore, PartialConfig};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};

const API: &str = "https://api.example.test";
const FEED: &str = "wss://feed.example.test/live";

#[derive(Parser, Debug)]
#[command(
    name = "bugbubble_demo",
    about = "Drive a simulated host through every BugBubble interceptor"
)]
struct Cli {
    /// JSON file with a partial configuration (maxLogs, trackingOptions, ...)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the buffer capacity
    #[arg(long)]
    max_logs: Option<usize>,
    /// Categories to switch off before the session runs (repeatable)
    #[arg(long = "disable")]
    disabled: Vec<Category>,
    /// Emit internal diagnostics to stderr
    #[arg(long)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the entries of one category matching a query
    Filter {
        #[arg(long, default_value = "network")]
        category: Category,
        #[arg(long, default_value = "")]
        query: String,
    },
    /// Print the full store snapshot
    State,
    /// Print every accepted entry as one JSON line, in arrival order
    Stream,
    /// Print the categories the gate lets through
    Categories,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    if cli.verbose {
        init_tracing();
    }

    let mut partial = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str::<PartialConfig>(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => PartialConfig::default(),
    };
    if let Some(max_logs) = cli.max_logs {
        partial = partial.with_max_logs(max_logs);
    }
    for category in &cli.disabled {
        partial = partial.with_category(*category, false);
    }

    let sim = SimulatedHost::new();
    let scheduler = Arc::new(ManualScheduler::new());
    let store = LogStore::new(sim.host.clone(), scheduler.clone());
    store.initialize(partial);
    let mut entries = store.subscribe_entries();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building runtime")?;
    runtime.block_on(drive_session(&sim, &store))?;
    scheduler.run_pending();

    match cli.command {
        Commands::Filter { category, query } => {
            store.set_search_text(query);
            let filtered = store.get_filtered(category);
            println!("{}", serde_json::to_string_pretty(&filtered)?);
        }
        Commands::State => {
            println!("{}", serde_json::to_string_pretty(&store.get_state())?);
        }
        Commands::Stream => {
            while let Ok(entry) = entries.try_recv() {
                println!("{}", serde_json::to_string(&entry)?);
            }
        }
        Commands::Categories => {
            let names: Vec<&str> = store
                .enabled_categories()
                .iter()
                .map(|category| category.as_str())
                .collect();
            println!("{}", names.join(" "));
        }
    }

    store.shutdown_interceptors();
    Ok(ExitCode::SUCCESS)
}

/// One scripted session touching every capability.
async fn drive_session(sim: &SimulatedHost, store: &LogStore) -> Result<()> {
    sim.routes
        .respond(&format!("{API}/users"), 200, r#"[{"id":1,"name":"Ada"}]"#);
    sim.routes.respond(
        &format!("{API}/orders/77"),
        404,
        r#"{"error":"ERR-404 order not found"}"#,
    );
    sim.routes
        .respond(&format!("{API}/legacy/ping"), 200, "pong");

    let host = &sim.host;
    let users = HttpRequest::get(format!("{API}/users"))
        .with_headers(RawHeaders::from_pairs([("accept", "application/json")]));
    host.fetch(users).await.context("fetching users")?;

    let order = host.fetch(HttpRequest::get(format!("{API}/orders/77"))).await?;
    if order.status >= 400 {
        host.console(
            ConsoleMethod::Warn,
            &[json!("order lookup failed"), json!({ "status": order.status })],
        );
    }

    if let Err(err) = host
        .fetch(HttpRequest::get("https://offline.example.test/health"))
        .await
    {
        host.console(ConsoleMethod::Error, &[json!("health check"), json!(err.message)]);
    }

    if let Some(mut request) = host.new_request() {
        request.open("post", &format!("{API}/legacy/ping"))?;
        request.set_request_header("x-trace-id", "demo-1")?;
        request.send(Some(json!({ "hello": "world" })))?;
    }

    let mut socket = host.connect(FEED, &[])?;
    sim.sockets.emit(FEED, SocketEvent::Open);
    socket.send(MessageData::Text(r#"{"type":"ping"}"#.to_string()))?;
    socket.close(Some(1000), Some("session over"))?;

    host.console(ConsoleMethod::Log, &[json!("demo session finished")]);

    let mut properties = Map::new();
    properties.insert("source".to_string(), Value::from("demo"));
    store
        .interceptors()
        .analytics
        .track("session_completed", Some(properties));
    Ok(())
}
