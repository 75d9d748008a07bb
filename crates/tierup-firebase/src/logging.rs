//! Process logging setup.
//!
//! Text output by default, JSON with `LOG_FORMAT=json`. `RUST_LOG` sets the
//! base filter; the Firestore client's own verbosity is layered on top and
//! can be changed at runtime.

use std::sync::OnceLock;

use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

use tierup_firestore::{log_level, set_log_level, LogLevel, LOG_TARGET};

use crate::error::{FirebaseError, FirebaseResult};

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

fn build_filter() -> EnvFilter {
    let base = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format!("{}={}", LOG_TARGET, log_level().as_directive()).parse::<Directive>() {
        Ok(directive) => base.add_directive(directive),
        Err(_) => base,
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_tracing() -> FirebaseResult<()> {
    if FILTER_HANDLE.get().is_some() {
        return Ok(());
    }

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let (filter, handle) = reload::Layer::new(build_filter());

    let installed = if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .try_init()
    };
    installed.map_err(|e| FirebaseError::Logging(e.to_string()))?;

    let _ = FILTER_HANDLE.set(handle);
    Ok(())
}

/// Set Firestore client verbosity for the whole process.
///
/// Takes effect immediately when [`init_tracing`] has run, and is picked up
/// by it otherwise.
pub fn set_firestore_log_level(level: LogLevel) -> FirebaseResult<()> {
    set_log_level(level);
    if let Some(handle) = FILTER_HANDLE.get() {
        handle
            .reload(build_filter())
            .map_err(|e| FirebaseError::Logging(e.to_string()))?;
    }
    Ok(())
}
