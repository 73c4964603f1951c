#![forbid(unsafe_code)]

//! CORS for a fixed origin allow-list.
//!
//! A request whose `Origin` is on the list gets it echoed back in
//! `Access-Control-Allow-Origin`; any other origin gets no CORS headers and
//! the browser blocks the read. `OPTIONS` requests are answered here with
//! `204` and never reach the inner service.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_REQUEST_HEADERS, CONTENT_LENGTH, ORIGIN, VARY,
};
use http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use tower::{Layer, Service};
use tracing::warn;

/// Methods advertised to preflight requests.
pub const ALLOWED_METHODS: &str = "POST";

/// Tower `Layer` applying the allow-list.
#[derive(Clone)]
pub struct CorsLayer {
    origins: Arc<[HeaderValue]>,
}

impl CorsLayer {
    /// Allow exactly `origins`. Values that are not valid header text are
    /// skipped.
    pub fn new<I>(origins: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let origins = origins
            .into_iter()
            .filter_map(|origin| {
                let origin = origin.as_ref();
                HeaderValue::from_str(origin)
                    .inspect_err(|_| warn!(origin, "ignoring unusable CORS origin"))
                    .ok()
            })
            .collect();
        Self { origins }
    }

    #[must_use]
    pub fn allows(&self, origin: &HeaderValue) -> bool {
        self.origins.iter().any(|allowed| allowed == origin)
    }
}

impl<S> Layer<S> for CorsLayer {
    type Service = CorsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorsService {
            inner,
            policy: self.clone(),
        }
    }
}

/// Tower `Service` adding CORS headers and answering preflights.
#[derive(Clone)]
pub struct CorsService<S> {
    inner: S,
    policy: CorsLayer,
}

fn write_origin(headers: &mut HeaderMap, origin: Option<HeaderValue>) {
    headers.append(VARY, HeaderValue::from_static("Origin"));
    if let Some(origin) = origin {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
}

fn preflight(origin: Option<HeaderValue>, request_headers: Option<HeaderValue>) -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    write_origin(headers, origin);
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    if let Some(requested) = request_headers {
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested);
        headers.append(VARY, HeaderValue::from_static("Access-Control-Request-Headers"));
    }
    headers.insert(CONTENT_LENGTH, HeaderValue::from(0u32));
    response
}

impl<S> Service<Request<Body>> for CorsService<S>
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
        let origin = req
            .headers()
            .get(ORIGIN)
            .filter(|origin| self.policy.allows(origin))
            .cloned();

        if req.method() == Method::OPTIONS {
            let requested = req.headers().get(ACCESS_CONTROL_REQUEST_HEADERS).cloned();
            return Box::pin(async move { Ok(preflight(origin, requested)) });
        }

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move {
            let mut response = inner
                .call(req)
                .await
                .unwrap_or_else(|infallible| match infallible {})
                .into_response();
            write_origin(response.headers_mut(), origin);
            Ok(response)
        })
    }
}
