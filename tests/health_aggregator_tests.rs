// tests/health_aggregator_tests.rs
use gateway_health::config::HealthCheckConfig;
use gateway_health::health::{
    CompositeHealthIndicator, HealthError, HealthMonitor, HealthStatus, Target,
};
use gateway_health::metrics::MetricsRegistry;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::watch;
use url::Url;

const HEALTH_PATH: &str = "/actuator/health";

fn config(timeout_ms: u64) -> HealthCheckConfig {
    HealthCheckConfig {
        timeout_ms,
        ..HealthCheckConfig::default()
    }
}

fn target(name: &str, url: &str) -> Target {
    Target::new(name, Url::parse(url).unwrap())
}

/// An address nothing listens on.
fn refused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Accepts connections and never answers.
async fn silent_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    format!("http://{}", addr)
}

async fn healthy_server() -> (mockito::ServerGuard, mockito::Mock) {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", HEALTH_PATH)
        .with_status(200)
        .with_body("ok")
        .create_async()
        .await;
    (server, mock)
}

#[tokio::test]
async fn all_five_targets_up_reports_up() {
    let names = [
        "auth-server",
        "product",
        "recommendation",
        "review",
        "product-composite",
    ];
    let mut servers = Vec::new();
    let mut targets = Vec::new();
    for name in names {
        let (server, mock) = healthy_server().await;
        targets.push(target(name, &server.url()));
        servers.push((server, mock));
    }

    let indicator = CompositeHealthIndicator::new(targets, config(2000)).unwrap();
    let aggregate = indicator.check_health().await.unwrap();

    assert_eq!(aggregate.status, HealthStatus::Up);
    assert_eq!(aggregate.components.len(), 5);
    for name in names {
        assert_eq!(aggregate.get(name).unwrap().status, HealthStatus::Up);
    }
}

#[tokio::test]
async fn non_2xx_target_is_down_and_isolated() {
    let (a, _a_mock) = healthy_server().await;
    let mut b = mockito::Server::new_async().await;
    let _b_mock = b
        .mock("GET", HEALTH_PATH)
        .with_status(503)
        .with_body("unavailable")
        .create_async()
        .await;

    let indicator = CompositeHealthIndicator::new(
        vec![target("a", &a.url()), target("b", &b.url())],
        config(2000),
    )
    .unwrap();
    let aggregate = indicator.check_health().await.unwrap();

    assert_eq!(aggregate.status, HealthStatus::Down);
    assert_eq!(aggregate.get("a").unwrap().status, HealthStatus::Up);
    assert!(aggregate.get("a").unwrap().error.is_none());

    let b = aggregate.get("b").unwrap();
    assert_eq!(b.status, HealthStatus::Down);
    assert!(b.error.as_deref().unwrap().contains("503"));
}

#[tokio::test]
async fn connection_refused_is_down_with_detail() {
    let (a, _a_mock) = healthy_server().await;

    let indicator = CompositeHealthIndicator::new(
        vec![target("a", &a.url()), target("b", &refused_url())],
        config(2000),
    )
    .unwrap();
    let aggregate = indicator.check_health().await.unwrap();

    assert_eq!(aggregate.status, HealthStatus::Down);
    assert_eq!(aggregate.get("a").unwrap().status, HealthStatus::Up);

    let b = aggregate.get("b").unwrap();
    assert_eq!(b.status, HealthStatus::Down);
    let detail = b.error.as_deref().unwrap();
    assert_eq!(detail.matches("Connection refused").count(), 1, "{}", detail);
}

#[tokio::test]
async fn unresponsive_target_times_out_without_hanging() {
    let (a, _a_mock) = healthy_server().await;
    let silent = silent_url().await;

    let indicator = CompositeHealthIndicator::new(
        vec![target("a", &a.url()), target("silent", &silent)],
        config(300),
    )
    .unwrap();

    let start = Instant::now();
    let aggregate = indicator.check_health().await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(3));
    assert_eq!(aggregate.status, HealthStatus::Down);
    assert_eq!(aggregate.get("a").unwrap().status, HealthStatus::Up);

    let silent = aggregate.get("silent").unwrap();
    assert_eq!(silent.status, HealthStatus::Down);
    assert!(silent.error.as_deref().unwrap().contains("timeout"));
}

#[tokio::test]
async fn probes_run_concurrently() {
    let mut targets = Vec::new();
    for i in 0..4 {
        targets.push(target(&format!("silent-{}", i), &silent_url().await));
    }

    let indicator = CompositeHealthIndicator::new(targets, config(500)).unwrap();

    let start = Instant::now();
    let aggregate = indicator.check_health().await.unwrap();

    // four sequential timeouts would take 2s
    assert!(start.elapsed() < Duration::from_millis(1500));
    assert_eq!(aggregate.components.len(), 4);
    assert_eq!(aggregate.up_count(), 0);
}

#[tokio::test]
async fn repeated_checks_keep_the_same_shape() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", HEALTH_PATH)
        .with_status(200)
        .expect(2)
        .create_async()
        .await;

    let indicator = CompositeHealthIndicator::new(
        vec![target("a", &server.url()), target("b", &refused_url())],
        config(2000),
    )
    .unwrap();

    let first = indicator.check_health().await.unwrap();
    let second = indicator.check_health().await.unwrap();

    // no caching: every call hits the target again
    mock.assert_async().await;
    assert_eq!(first.status, second.status);
    assert_eq!(
        first.components.keys().collect::<Vec<_>>(),
        second.components.keys().collect::<Vec<_>>()
    );
    for (name, result) in &first.components {
        assert_eq!(result.status, second.get(name).unwrap().status);
    }
}

#[tokio::test]
async fn body_is_ignored_unless_strict() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", HEALTH_PATH)
        .with_status(200)
        .with_body(r#"{"status":"DOWN"}"#)
        .create_async()
        .await;
    let targets = vec![target("nested-down", &server.url())];

    let shallow = CompositeHealthIndicator::new(targets.clone(), config(2000)).unwrap();
    assert_eq!(shallow.check_health().await.unwrap().status, HealthStatus::Up);

    let strict = CompositeHealthIndicator::new(
        targets,
        HealthCheckConfig {
            strict: true,
            ..config(2000)
        },
    )
    .unwrap();
    let aggregate = strict.check_health().await.unwrap();
    let result = aggregate.get("nested-down").unwrap();

    assert_eq!(result.status, HealthStatus::Down);
    assert!(result.error.as_deref().unwrap().contains("DOWN"));
}

#[tokio::test]
async fn health_path_is_appended_to_base_path() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/review/health")
        .with_status(200)
        .create_async()
        .await;

    let indicator = CompositeHealthIndicator::new(
        vec![target("review", &format!("{}/review/", server.url()))],
        HealthCheckConfig {
            path: "/health".to_string(),
            ..config(2000)
        },
    )
    .unwrap();

    assert!(indicator.check_health().await.unwrap().is_up());
    mock.assert_async().await;
}

#[tokio::test]
async fn duplicate_targets_are_rejected() {
    let result = CompositeHealthIndicator::new(
        vec![
            target("product", "http://product:4004"),
            target("product", "http://other:4004"),
        ],
        config(2000),
    );

    assert!(matches!(result, Err(HealthError::DuplicateTarget(name)) if name == "product"));
}

#[tokio::test]
async fn empty_target_set_is_up() {
    let indicator = CompositeHealthIndicator::new(Vec::new(), config(2000)).unwrap();
    let aggregate = indicator.check_health().await.unwrap();

    assert!(aggregate.is_up());
    assert!(aggregate.components.is_empty());
}

#[tokio::test]
async fn single_component_check() {
    let (a, _a_mock) = healthy_server().await;
    let indicator = CompositeHealthIndicator::new(
        vec![target("a", &a.url()), target("b", &refused_url())],
        config(2000),
    )
    .unwrap();

    let a = indicator.check_component("a").await.unwrap().unwrap();
    assert_eq!(a.target, "a");
    assert_eq!(a.status, HealthStatus::Up);

    let b = indicator.check_component("b").await.unwrap().unwrap();
    assert_eq!(b.status, HealthStatus::Down);

    assert!(indicator.check_component("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn caller_can_cancel_a_check() {
    let silent = silent_url().await;
    let indicator =
        CompositeHealthIndicator::new(vec![target("silent", &silent)], config(10_000)).unwrap();
    let (cancel_tx, cancel_rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = cancel_tx.send(true);
    });

    let start = Instant::now();
    let result = indicator.check_health_until(cancel_rx).await;

    assert!(matches!(result, Err(HealthError::Cancelled)));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn dropped_cancel_sender_never_cancels() {
    let (a, _a_mock) = healthy_server().await;
    let indicator =
        CompositeHealthIndicator::new(vec![target("a", &a.url())], config(2000)).unwrap();
    let (cancel_tx, cancel_rx) = watch::channel(false);
    drop(cancel_tx);

    let aggregate = indicator.check_health_until(cancel_rx).await.unwrap();
    assert!(aggregate.is_up());
}

#[tokio::test]
async fn probes_and_checks_are_recorded_in_metrics() {
    let (a, _a_mock) = healthy_server().await;
    let registry = MetricsRegistry::new().unwrap();
    let indicator = CompositeHealthIndicator::new(
        vec![target("a", &a.url()), target("b", &refused_url())],
        config(2000),
    )
    .unwrap()
    .with_metrics(registry.collector());

    indicator.check_health().await.unwrap();

    let text = String::from_utf8(registry.gather().unwrap()).unwrap();
    assert!(text.contains(r#"health_target_up{target="a"} 1"#));
    assert!(text.contains(r#"health_target_up{target="b"} 0"#));
    assert!(text.contains(r#"health_checks_total{status="DOWN"} 1"#));
    assert!(text.contains("health_targets_total 2"));
}

#[tokio::test]
async fn monitor_tracks_overall_verdict() {
    let (a, _a_mock) = healthy_server().await;
    let indicator = Arc::new(
        CompositeHealthIndicator::new(vec![target("a", &a.url())], config(2000)).unwrap(),
    );
    let monitor = Arc::new(HealthMonitor::new(indicator, Duration::from_millis(50)));

    assert!(monitor.last_verdict().await.is_none());
    assert_eq!(monitor.run_once().await, Some(HealthStatus::Up));

    let (status, first_seen) = monitor.last_verdict().await.unwrap();
    assert_eq!(status, HealthStatus::Up);

    // unchanged verdict keeps the original timestamp
    monitor.run_once().await;
    assert_eq!(monitor.last_verdict().await.unwrap().1, first_seen);
}

#[tokio::test]
async fn monitor_stops_on_shutdown() {
    let (a, _a_mock) = healthy_server().await;
    let indicator = Arc::new(
        CompositeHealthIndicator::new(vec![target("a", &a.url())], config(2000)).unwrap(),
    );
    let monitor = Arc::new(HealthMonitor::new(indicator, Duration::from_millis(20)));

    let handle = tokio::spawn(monitor.clone().start());
    tokio::time::sleep(Duration::from_millis(100)).await;
    monitor.shutdown();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("monitor did not stop")
        .unwrap();
    assert_eq!(monitor.last_verdict().await.unwrap().0, HealthStatus::Up);
}

/// Collects formatted log lines for inspection.
#[derive(Clone, Default)]
struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn healthy_check_is_quiet_at_info() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let (a, _a_mock) = healthy_server().await;
    let indicator = CompositeHealthIndicator::new(vec![target("a", &a.url())], config(2000)).unwrap();
    for _ in 0..3 {
        assert_eq!(indicator.check_health().await.unwrap().status, HealthStatus::Up);
    }

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(!output.contains("Health check complete"), "{}", output);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn every_target_reported_exactly_once(
        names in prop::collection::hash_set("[a-z][a-z0-9-]{0,10}", 0..8)
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let url = refused_url();
        let targets: Vec<_> = names.iter().map(|name| target(name, &url)).collect();

        let aggregate = runtime.block_on(async {
            CompositeHealthIndicator::new(targets, config(1000))
                .unwrap()
                .check_health()
                .await
                .unwrap()
        });

        prop_assert_eq!(aggregate.components.len(), names.len());
        for name in &names {
            let result = aggregate.get(name).unwrap();
            prop_assert_eq!(&result.target, name);
            prop_assert_eq!(result.status, HealthStatus::Down);
        }
        prop_assert_eq!(aggregate.is_up(), names.is_empty());
    }
}
