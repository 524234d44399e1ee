//! HTTP transport abstraction
//!
//! All network traffic goes through the [`Transport`] trait so tests can
//! substitute a scripted implementation. The default [`UreqTransport`]
//! chooses between two paths per request:
//!
//! - a dedicated agent when the TLS policy needs precise control
//!   (trust-all or a combined system+custom trust store)
//! - a shared agent cached by TLS-configuration fingerprint otherwise
//!
//! The cache is an explicit object owned by the orchestrator, not hidden
//! process state; [`ClientCache::invalidate`] forces recreation.

use crate::error::{BridgeError, BridgeResult};
use crate::ssl::TlsPolicy;
use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("bridge-acquire/", env!("CARGO_PKG_VERSION"));

/// Upper bound for a single request/download attempt
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// A response with its body still unread
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Declared Content-Length, when present and numeric
    pub content_length: Option<u64>,
    /// Response body stream
    pub body: Box<dyn Read + Send>,
}

impl HttpResponse {
    /// Drain the body into a string (for small metadata responses)
    pub fn into_text(mut self) -> BridgeResult<String> {
        let mut text = String::new();
        self.body
            .read_to_string(&mut text)
            .map_err(|e| BridgeError::Transport(format!("failed to read response body: {e}")))?;
        Ok(text)
    }
}

/// Issues HTTP(S) GET requests, following redirects
pub trait Transport: Send + Sync {
    /// Perform a GET; returns the response for any HTTP status. Only
    /// transport-level failures (connect, timeout, TLS) are errors.
    fn get(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        policy: &TlsPolicy,
    ) -> BridgeResult<HttpResponse>;
}

struct CachedAgent {
    fingerprint: String,
    agent: ureq::Agent,
}

/// Shared HTTP client cache keyed by TLS-configuration fingerprint
///
/// Pure memoization: a stale entry is never incorrect, only wasteful, and
/// configuration changes once per pipeline run at most.
#[derive(Default)]
pub struct ClientCache {
    slot: Mutex<Option<CachedAgent>>,
}

impl ClientCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop any cached client so the next request rebuilds it
    pub fn invalidate(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
        debug!("HTTP client cache invalidated");
    }

    fn get_or_build(&self, policy: &TlsPolicy) -> BridgeResult<ureq::Agent> {
        let fingerprint = policy.fingerprint();
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| BridgeError::Transport("client cache poisoned".into()))?;
        if let Some(cached) = slot.as_ref() {
            if cached.fingerprint == fingerprint {
                return Ok(cached.agent.clone());
            }
            debug!("TLS configuration changed, rebuilding shared HTTP client");
        }
        let agent = build_agent(policy)?;
        *slot = Some(CachedAgent {
            fingerprint,
            agent: agent.clone(),
        });
        Ok(agent)
    }
}

/// Default transport backed by `ureq`
pub struct UreqTransport {
    cache: Arc<ClientCache>,
}

impl UreqTransport {
    /// Create a transport sharing the given client cache
    pub fn new(cache: Arc<ClientCache>) -> Self {
        Self { cache }
    }
}

impl Transport for UreqTransport {
    fn get(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        policy: &TlsPolicy,
    ) -> BridgeResult<HttpResponse> {
        let agent = if policy.needs_direct_transport() {
            debug!("Using direct transport with enhanced SSL support");
            build_agent(policy)?
        } else {
            self.cache.get_or_build(policy)?
        };

        let mut request = agent.get(url);
        for (name, value) in headers {
            request = request.set(name, value);
        }

        match request.call() {
            Ok(response) => Ok(into_http_response(response)),
            // Non-2xx statuses are data, not transport failures; the caller
            // owns status classification.
            Err(ureq::Error::Status(_, response)) => Ok(into_http_response(response)),
            Err(ureq::Error::Transport(err)) => Err(BridgeError::Transport(err.to_string())),
        }
    }
}

fn into_http_response(response: ureq::Response) -> HttpResponse {
    let status = response.status();
    let content_length = response
        .header("Content-Length")
        .and_then(|v| v.trim().parse::<u64>().ok());
    HttpResponse {
        status,
        content_length,
        body: Box::new(response.into_reader()),
    }
}

fn build_agent(policy: &TlsPolicy) -> BridgeResult<ureq::Agent> {
    let mut builder = ureq::AgentBuilder::new()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .redirects(5);
    if policy.needs_direct_transport() {
        builder = builder.tls_connector(Arc::new(policy.build_connector()?));
    }
    Ok(builder.build())
}
