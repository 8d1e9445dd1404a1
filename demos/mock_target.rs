//! demos/mock_target.rs
//! Stand-in downstream service for manual runs of the aggregator.
//! Run: cargo run --example mock_target -- <port> [name]

use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use rand::Rng;
use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::sleep;

#[derive(Clone)]
struct TargetState {
    name: String,
    healthy: Arc<AtomicBool>,
    jitter_ms: u64,
}

async fn handle(req: Request<Body>, state: TargetState) -> Result<Response<Body>, Infallible> {
    if req.uri().path() != "/actuator/health" {
        let mut response = Response::new(Body::from("Not Found"));
        *response.status_mut() = StatusCode::NOT_FOUND;
        return Ok(response);
    }

    if state.jitter_ms > 0 {
        let delay = rand::thread_rng().gen_range(0..=state.jitter_ms);
        sleep(Duration::from_millis(delay)).await;
    }

    let (status, body) = if state.healthy.load(Ordering::SeqCst) {
        (StatusCode::OK, r#"{"status":"UP"}"#)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, r#"{"status":"DOWN"}"#)
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    Ok(response)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let port: u16 = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "4004".into())
        .parse()?;
    let name = std::env::args()
        .nth(2)
        .unwrap_or_else(|| format!("target-{port}"));
    let jitter_ms = std::env::var("JITTER_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let flip_secs: u64 = std::env::var("FLIP_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30);

    let state = TargetState {
        name: name.clone(),
        healthy: Arc::new(AtomicBool::new(true)),
        jitter_ms,
    };

    // Flip health periodically so the aggregator sees transitions
    {
        let st = state.clone();
        tokio::spawn(async move {
            loop {
                sleep(Duration::from_secs(flip_secs)).await;
                let was = st.healthy.fetch_xor(true, Ordering::SeqCst);
                println!("[{}] health -> {}", st.name, if was { "DOWN" } else { "UP" });
            }
        });
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let make_svc = make_service_fn(move |_conn| {
        let st = state.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| handle(req, st.clone()))) }
    });

    println!("Mock target '{}' on http://{}  [jitter={}ms flip={}s]", name, addr, jitter_ms, flip_secs);

    Server::bind(&addr).serve(make_svc).await?;
    Ok(())
}
