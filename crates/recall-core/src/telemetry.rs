//! Subscriber setup for hosts that embed the memory core.
//!
//! The `turn.*`, `session.*`, `compaction.*` and `context.*` events from
//! [`crate::obs`] and the ledger's storage logs are emitted under the
//! `recall_core` and `recall_ledger` targets. [`init_tracing`] shows those
//! at the requested level and keeps dependency chatter (SurrealDB, hyper,
//! reqwest) at `warn` unless `RUST_LOG` says otherwise.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    format!("warn,recall_core={level},recall_ledger={level}")
}

/// Install the global subscriber. Only the first call in a process wins.
///
/// * `json`: newline-delimited JSON, one object per memory event.
/// * `level`: verbosity for the recall crates when `RUST_LOG` is unset.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}
