// src/server/handler.rs
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;
use tracing::{debug, error, info_span, Instrument};
use uuid::Uuid;

use crate::health::{HealthError, HealthProvider};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Serves the aggregated health document on `health_path` and single
/// components on `health_path/{name}`.
#[derive(Clone)]
pub struct RequestHandler {
    provider: Arc<dyn HealthProvider>,
    health_path: Arc<str>,
}

impl RequestHandler {
    pub fn new(provider: Arc<dyn HealthProvider>, health_path: impl Into<String>) -> Self {
        Self {
            provider,
            health_path: Arc::from(health_path.into()),
        }
    }
}

impl Service<Request<Body>> for RequestHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let provider = self.provider.clone();
        let health_path = self.health_path.clone();
        let request_id = Uuid::new_v4();
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let span = info_span!("health_request", %request_id, %method, %path);

        Box::pin(
            async move {
                let mut response = route(provider.as_ref(), &health_path, &method, &path)
                    .await
                    .unwrap_or_else(Response::from);

                if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                    response.headers_mut().insert(REQUEST_ID_HEADER, value);
                }
                debug!(status = %response.status(), "health request served");
                Ok(response)
            }
            .instrument(span),
        )
    }
}

async fn route(
    provider: &dyn HealthProvider,
    health_path: &str,
    method: &Method,
    path: &str,
) -> Result<Response<Body>, HandlerError> {
    let component = match_component(health_path, path)?;

    if method != Method::GET {
        return Err(HandlerError::MethodNotAllowed);
    }

    match component {
        None => {
            let aggregate = provider.check_health().await?;
            json_response(status_code(aggregate.is_up()), &aggregate)
        }
        Some(name) => match provider.check_component(name).await? {
            Some(result) => json_response(status_code(result.is_up()), &result),
            None => Err(HandlerError::UnknownComponent(name.to_string())),
        },
    }
}

/// `None` for the aggregate path, `Some(name)` for a component path.
fn match_component<'a>(health_path: &str, path: &'a str) -> Result<Option<&'a str>, HandlerError> {
    if path == health_path {
        return Ok(None);
    }

    match path
        .strip_prefix(health_path.trim_end_matches('/'))
        .and_then(|rest| rest.strip_prefix('/'))
    {
        Some(name) if !name.is_empty() && !name.contains('/') => Ok(Some(name)),
        _ => Err(HandlerError::NotFound),
    }
}

fn status_code(up: bool) -> StatusCode {
    if up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Result<Response<Body>, HandlerError> {
    let bytes = serde_json::to_vec(body)?;
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Not Found")]
    NotFound,

    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error(transparent)]
    Health(#[from] HealthError),

    #[error("Failed to encode health document: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<HandlerError> for Response<Body> {
    fn from(err: HandlerError) -> Self {
        let status = match err {
            HandlerError::NotFound | HandlerError::UnknownComponent(_) => StatusCode::NOT_FOUND,
            HandlerError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            HandlerError::Health(_) | HandlerError::Encode(_) => {
                error!("Health request failed: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({
            "status": "DOWN",
            "error": err.to_string(),
        });

        let mut response = Response::new(Body::from(body.to_string()));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if status == StatusCode::METHOD_NOT_ALLOWED {
            response
                .headers_mut()
                .insert(hyper::header::ALLOW, HeaderValue::from_static("GET"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_aggregate_and_component_paths() {
        assert_eq!(match_component("/health", "/health").unwrap(), None);
        assert_eq!(
            match_component("/health", "/health/product").unwrap(),
            Some("product")
        );
        assert_eq!(match_component("/", "/review").unwrap(), Some("review"));
    }

    #[test]
    fn rejects_unrelated_paths() {
        assert!(match_component("/health", "/healthz").is_err());
        assert!(match_component("/health", "/health/").is_err());
        assert!(match_component("/health", "/health/a/b").is_err());
        assert!(match_component("/health", "/metrics").is_err());
    }
}
