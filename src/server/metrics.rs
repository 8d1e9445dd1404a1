// src/server/metrics.rs
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;
use tracing::error;

use crate::metrics::MetricsRegistry;

/// Prometheus text exposition on a single path.
#[derive(Clone)]
pub struct MetricsHandler {
    registry: Arc<MetricsRegistry>,
    path: Arc<str>,
}

impl MetricsHandler {
    pub fn new(registry: Arc<MetricsRegistry>, path: impl Into<String>) -> Self {
        Self {
            registry,
            path: Arc::from(path.into()),
        }
    }

    fn respond(&self, req: &Request<Body>) -> Response<Body> {
        if req.uri().path() != &*self.path {
            return text_response(StatusCode::NOT_FOUND, "Not Found");
        }

        match self.registry.gather() {
            Ok(metrics) => {
                let mut response = Response::new(Body::from(metrics));
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; version=0.0.4"),
                );
                response
            }
            Err(e) => {
                error!("Failed to encode metrics: {}", e);
                text_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics")
            }
        }
    }
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}

impl Service<Request<Body>> for MetricsHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        futures::future::ready(Ok(self.respond(&req)))
    }
}
