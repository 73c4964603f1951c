#![forbid(unsafe_code)]

//! Fixed-window rate limiting per client IP.
//!
//! Each client gets `max` requests per window; its window opens on the first
//! request and a request arriving after it closes opens a fresh one.
//! Requests whose path starts with an exempt prefix pass through uncounted.
//!
//! Counted responses carry `RateLimit-Limit`, `RateLimit-Remaining` and
//! `RateLimit-Reset` (whole seconds until the window closes). Rejections are
//! `429 {"error":"Many request"}` with `Retry-After`.
//!
//! # Failure Modes
//!
//! - A poisoned lock is recovered; the counters stay usable.
//! - Without `ConnectInfo` or `X-Forwarded-For` every request is keyed to
//!   `0.0.0.0` and shares one budget.

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::response::{IntoResponse, Response};
use http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode};
use tokio::time::Instant;
use tower::{Layer, Service};
use tracing::warn;

/// Path prefix that is never limited.
pub const RESET_PATH: &str = "/api/reset";

const REJECTION: &str = r#"{"error":"Many request"}"#;
const PRUNE_THRESHOLD: usize = 4096;

const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

/// Verdict for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the client's window closes.
    pub reset_after: Duration,
}

impl Decision {
    /// `reset_after` rounded up to whole seconds.
    #[must_use]
    pub fn reset_secs(&self) -> u64 {
        self.reset_after.as_secs() + u64::from(self.reset_after.subsec_nanos() > 0)
    }

    fn write_headers(&self, headers: &mut HeaderMap) {
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(RATELIMIT_RESET, HeaderValue::from(self.reset_secs()));
    }
}

/// Shared per-client counters.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    max: u32,
    window: Duration,
    clients: Mutex<HashMap<IpAddr, Window>>,
}

impl FixedWindowLimiter {
    #[must_use]
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Count one request from `client` now.
    pub fn check(&self, client: IpAddr) -> Decision {
        self.check_at(client, Instant::now())
    }

    /// Count one request from `client` at `now`.
    pub fn check_at(&self, client: IpAddr, now: Instant) -> Decision {
        let mut clients = match self.clients.lock() {
            Ok(clients) => clients,
            Err(poisoned) => poisoned.into_inner(),
        };
        if clients.len() >= PRUNE_THRESHOLD {
            let window = self.window;
            clients.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = clients.entry(client).or_insert(Window {
            started: now,
            hits: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                hits: 0,
            };
        }
        entry.hits = entry.hits.saturating_add(1);

        Decision {
            allowed: entry.hits <= self.max,
            limit: self.max,
            remaining: self.max.saturating_sub(entry.hits),
            reset_after: self
                .window
                .saturating_sub(now.duration_since(entry.started)),
        }
    }

    /// Clients with a counter, expired or not.
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        match self.clients.lock() {
            Ok(clients) => clients.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// Client address: the peer from `ConnectInfo`, else the first
/// `X-Forwarded-For` entry, else `0.0.0.0`.
pub fn client_ip<B>(req: &Request<B>) -> IpAddr {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip();
    }
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn too_many_requests(decision: &Decision) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        [(http::header::CONTENT_TYPE, "application/json")],
        REJECTION,
    )
        .into_response();
    let headers = response.headers_mut();
    decision.write_headers(headers);
    headers.insert(
        http::header::RETRY_AFTER,
        HeaderValue::from(decision.reset_secs()),
    );
    response
}

/// Tower `Layer` applying a [`FixedWindowLimiter`].
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<FixedWindowLimiter>,
    exempt: Arc<[String]>,
}

impl RateLimitLayer {
    /// Limit everything except [`RESET_PATH`].
    pub fn new(limiter: Arc<FixedWindowLimiter>) -> Self {
        Self {
            limiter,
            exempt: Arc::from([RESET_PATH.to_owned()]),
        }
    }

    /// Replace the exempt path prefixes.
    #[must_use]
    pub fn with_exempt<I>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.exempt = prefixes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn limiter(&self) -> &Arc<FixedWindowLimiter> {
        &self.limiter
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: Arc::clone(&self.limiter),
            exempt: Arc::clone(&self.exempt),
        }
    }
}

/// Tower `Service` counting requests before forwarding them.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<FixedWindowLimiter>,
    exempt: Arc<[String]>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Error = Infallible> + Clone + Send + 'static,
    S::Response: IntoResponse,
    S::Future: Send,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let path = req.uri().path();
        let decision = if self.exempt.iter().any(|p| path.starts_with(p.as_str())) {
            None
        } else {
            Some(self.limiter.check(client_ip(&req)))
        };

        Box::pin(async move {
            if let Some(decision) = decision.filter(|d| !d.allowed) {
                warn!(
                    client = %client_ip(&req),
                    path = req.uri().path(),
                    retry_after = decision.reset_secs(),
                    "rate limit exceeded"
                );
                return Ok(too_many_requests(&decision));
            }
            let mut response = inner
                .call(req)
                .await
                .unwrap_or_else(|infallible| match infallible {})
                .into_response();
            if let Some(decision) = decision {
                decision.write_headers(response.headers_mut());
            }
            Ok(response)
        })
    }
}
