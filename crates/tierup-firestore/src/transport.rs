//! HTTP transport selection.
//!
//! Some proxies and corporate middleboxes break HTTP/2 or hold long-lived
//! streams open. In auto-detect mode the client starts on the default
//! (HTTP/2-capable) transport and, after the first connection-level failure,
//! latches onto a plain HTTP/1.1 request/response client for the rest of the
//! process.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use tracing::warn;

use crate::metrics::record_transport_fallback;

/// How requests reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    /// Default transport with automatic HTTP/1.1 fallback.
    #[default]
    AutoDetect,
    /// Always HTTP/1.1.
    Http1Only,
    /// Default transport, never fall back.
    Default,
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "autodetect" | "auto-detect" => Ok(Self::AutoDetect),
            "http1" | "http1-only" | "long-polling" => Ok(Self::Http1Only),
            "default" | "streaming" => Ok(Self::Default),
            other => Err(format!("unknown transport mode: {}", other)),
        }
    }
}

/// Timeouts shared by both underlying clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub mode: TransportMode,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

/// Pair of HTTP clients plus the fallback latch.
#[derive(Clone)]
pub struct Transport {
    mode: TransportMode,
    primary: Client,
    http1: Client,
    fell_back: Arc<AtomicBool>,
}

impl Transport {
    pub fn new(config: &TransportConfig) -> Result<Self, reqwest::Error> {
        let builder = || {
            Client::builder()
                .timeout(config.timeout)
                .connect_timeout(config.connect_timeout)
                .pool_idle_timeout(Duration::from_secs(90))
                .pool_max_idle_per_host(10)
                .user_agent(config.user_agent.clone())
        };

        Ok(Self {
            mode: config.mode,
            primary: builder().build()?,
            http1: builder().http1_only().build()?,
            fell_back: Arc::new(AtomicBool::new(config.mode == TransportMode::Http1Only)),
        })
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    /// True once requests are routed over HTTP/1.1.
    pub fn is_http1(&self) -> bool {
        self.fell_back.load(Ordering::Acquire)
    }

    /// Build and send a request, falling back to HTTP/1.1 when allowed.
    ///
    /// `build` may be called twice, so it must be side-effect free.
    pub async fn send<F>(&self, build: F) -> Result<Response, reqwest::Error>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        if self.is_http1() {
            return build(&self.http1).send().await;
        }

        match build(&self.primary).send().await {
            Err(e) if self.mode == TransportMode::AutoDetect && is_transport_failure(&e) => {
                if !self.fell_back.swap(true, Ordering::AcqRel) {
                    warn!("Default transport failed ({}), falling back to HTTP/1.1", e);
                    record_transport_fallback();
                }
                build(&self.http1).send().await
            }
            other => other,
        }
    }
}

fn is_transport_failure(e: &reqwest::Error) -> bool {
    (e.is_connect() || e.is_request()) && !e.is_timeout()
}
