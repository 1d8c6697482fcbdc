// BugBubble Core - runtime observability layer
// Intercepts network, socket, console and analytics traffic into a bounded,
// searchable in-memory log.

// Module declarations
pub mod api;
pub mod capability;
pub mod config;
pub mod error;
pub mod gate;
pub mod guard;
pub mod interceptors;
pub mod model;
pub mod scheduler;
pub mod search;
pub mod store;
pub mod testing;

// Re-exports for convenience
pub use api::{initialize, log_console, log_event, log_network, log_socket};
pub use capability::{host, HostCapabilities};
pub use config::{BugBubbleConfig, PartialConfig};
pub use model::{Category, LogEntry, LogLevel, SocketPhase};
pub use store::{store, LogStore, StoreSnapshot, Subscription};

/// Install a global tracing subscriber for this crate's diagnostics.
///
/// Safe to call more than once; only the first call installs anything.
/// Diagnostics go to logcat on Android and to stderr elsewhere, never through
/// an intercepted console channel.
#[cfg(target_os = "android")]
pub fn init_tracing() {
    use tracing_subscriber::prelude::*;

    match tracing_android::layer("BugBubble") {
        Ok(layer) => {
            let _ = tracing_subscriber::registry().with(layer).try_init();
        }
        Err(err) => eprintln!("BugBubble: android tracing unavailable: {err}"),
    }
}

#[cfg(not(target_os = "android"))]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_twice_is_harmless() {
        init_tracing();
        init_tracing();
    }
}
