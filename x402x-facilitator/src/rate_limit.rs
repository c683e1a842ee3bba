//! Per-client-IP rate limiting: `/verify` and `/settle` are each rate
//! limited per deployment, with `/verify` permitting a higher rate than
//! `/settle`; `/health`, `/ready`, and `/supported` are exempt.
//!
//! No `tower`-ecosystem rate-limit crate is in this workspace's dependency
//! graph, so this is a small fixed-window counter keyed by client IP: a
//! `Layer`/`Service` pair sharing one `Arc`-wrapped table, wrapping an
//! inner `axum::Router`.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::ConnectInfo;
use dashmap::DashMap;
use http::{Request, Response, StatusCode};
use tower::{Layer, Service};

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Bucket {
    window_start: Instant,
    count: u32,
}

/// Tower [`Layer`] enforcing `limit_per_minute` requests per client IP.
#[derive(Debug, Clone)]
pub struct RateLimitLayer {
    limit_per_minute: u32,
    buckets: Arc<DashMap<IpAddr, Bucket>>,
}

impl RateLimitLayer {
    /// Builds a layer admitting at most `limit_per_minute` requests per IP
    /// in any rolling 60-second window.
    #[must_use]
    pub fn new(limit_per_minute: u32) -> Self {
        Self { limit_per_minute, buckets: Arc::new(DashMap::new()) }
    }

    fn admit(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut bucket = self.buckets.entry(ip).or_insert_with(|| Bucket { window_start: now, count: 0 });
        if now.duration_since(bucket.window_start) >= WINDOW {
            bucket.window_start = now;
            bucket.count = 0;
        }
        if bucket.count >= self.limit_per_minute {
            false
        } else {
            bucket.count += 1;
            true
        }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService { inner, layer: self.clone() }
    }
}

/// Tower [`Service`] created by [`RateLimitLayer`].
#[derive(Debug, Clone)]
pub struct RateLimitService<S> {
    inner: S,
    layer: RateLimitLayer,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<Box<dyn std::error::Error + Send + Sync>> + Send,
{
    type Response = Response<Body>;
    type Error = Box<dyn std::error::Error + Send + Sync>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let ip = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
        let admitted = ip.is_none_or(|ip| self.layer.admit(ip));

        if !admitted {
            return Box::pin(async move { Ok(too_many_requests()) });
        }

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await.map_err(Into::into) })
    }
}

fn too_many_requests() -> Response<Body> {
    let body = serde_json::json!({ "error": "rate limit exceeded" });
    Response::builder()
        .status(StatusCode::TOO_MANY_REQUESTS)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_limit_then_rejects() {
        let layer = RateLimitLayer::new(3);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert!(layer.admit(ip));
        assert!(layer.admit(ip));
        assert!(layer.admit(ip));
        assert!(!layer.admit(ip));
    }

    #[test]
    fn distinct_ips_have_independent_buckets() {
        let layer = RateLimitLayer::new(1);
        let a: IpAddr = "127.0.0.1".parse().unwrap();
        let b: IpAddr = "127.0.0.2".parse().unwrap();
        assert!(layer.admit(a));
        assert!(layer.admit(b));
        assert!(!layer.admit(a));
    }

    #[test]
    fn window_resets_after_it_elapses() {
        let mut layer = RateLimitLayer::new(1);
        layer.buckets = Arc::new(DashMap::new());
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        assert!(layer.admit(ip));
        assert!(!layer.admit(ip));
        layer.buckets.get_mut(&ip).unwrap().window_start -= WINDOW + Duration::from_secs(1);
        assert!(layer.admit(ip));
    }
}
