//! Prometheus metrics for the user store and the scrape endpoint serving them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use common::MetricsConfig;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::context::RequestContext;
use crate::repository::{StoreResult, UserRepository};
use domain::User;

const OUTCOME_OK: &str = "ok";

/// Registry plus the store's metric families.
#[derive(Debug)]
pub struct StoreMetrics {
    registry: Registry,
    operations: IntCounterVec,
    duration: HistogramVec,
}

impl StoreMetrics {
    /// Create the metric families in a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let operations = IntCounterVec::new(
            Opts::new(
                "user_store_operations_total",
                "User store calls by operation and outcome",
            ),
            &["operation", "outcome"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new(
                "user_store_operation_duration_seconds",
                "User store call latency",
            ),
            &["operation"],
        )?;

        registry.register(Box::new(operations.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            operations,
            duration,
        })
    }

    /// Record one finished call.
    pub fn observe(&self, operation: &str, outcome: &str, elapsed: Duration) {
        self.operations
            .with_label_values(&[operation, outcome])
            .inc();
        self.duration
            .with_label_values(&[operation])
            .observe(elapsed.as_secs_f64());
    }

    /// Current call count for an operation/outcome pair.
    pub fn operation_count(&self, operation: &str, outcome: &str) -> u64 {
        self.operations
            .with_label_values(&[operation, outcome])
            .get()
    }

    /// Encode the registry in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

// =============================================================================
// Instrumentation
// =============================================================================

/// Repository decorator counting calls and timing them.
pub struct InstrumentedRepository {
    inner: Arc<dyn UserRepository>,
    metrics: Arc<StoreMetrics>,
}

impl InstrumentedRepository {
    pub fn new(inner: Arc<dyn UserRepository>, metrics: Arc<StoreMetrics>) -> Self {
        Self { inner, metrics }
    }

    fn record<T>(&self, operation: &str, started: Instant, result: &StoreResult<T>) {
        let outcome = match result {
            Ok(_) => OUTCOME_OK,
            Err(err) => err.kind().as_str(),
        };
        self.metrics.observe(operation, outcome, started.elapsed());
    }
}

#[async_trait]
impl UserRepository for InstrumentedRepository {
    async fn save(
        &self,
        ctx: &RequestContext,
        login: &str,
        password_hash: &[u8],
    ) -> StoreResult<i64> {
        let started = Instant::now();
        let result = self.inner.save(ctx, login, password_hash).await;
        self.record("save", started, &result);
        result
    }

    async fn find_by_login(&self, ctx: &RequestContext, login: &str) -> StoreResult<User> {
        let started = Instant::now();
        let result = self.inner.find_by_login(ctx, login).await;
        self.record("find_by_login", started, &result);
        result
    }

    async fn close(&self) -> StoreResult<()> {
        let started = Instant::now();
        let result = self.inner.close().await;
        self.record("close", started, &result);
        result
    }
}

// =============================================================================
// Scrape endpoint (Axum)
// =============================================================================

/// Router exposing `GET /metrics`.
pub fn metrics_routes(metrics: Arc<StoreMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(scrape))
        .with_state(metrics)
}

async fn scrape(State(metrics): State<Arc<StoreMetrics>>) -> Response {
    match metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// HTTP server publishing the metrics registry.
pub struct MetricsServer {
    config: MetricsConfig,
    metrics: Arc<StoreMetrics>,
}

impl MetricsServer {
    pub fn new(config: MetricsConfig, metrics: Arc<StoreMetrics>) -> Self {
        Self { config, metrics }
    }

    /// Serve until `shutdown` is cancelled.
    pub async fn serve(self, shutdown: CancellationToken) -> std::io::Result<()> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("Metrics server listening on http://{}/metrics", addr);

        axum::serve(listener, metrics_routes(self.metrics))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::info!("Metrics server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Interrupted;
    use crate::repository::{ErrorKind, MockUserRepository, StoreError};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn instrumented(repo: MockUserRepository) -> (InstrumentedRepository, Arc<StoreMetrics>) {
        let metrics = Arc::new(StoreMetrics::new().unwrap());
        (
            InstrumentedRepository::new(Arc::new(repo), metrics.clone()),
            metrics,
        )
    }

    #[tokio::test]
    async fn test_counts_successful_save() {
        let mut repo = MockUserRepository::new();
        repo.expect_save().returning(|_, _, _| Ok(7));

        let (store, metrics) = instrumented(repo);
        let id = store
            .save(&RequestContext::background(), "alice", &[0xAA])
            .await
            .unwrap();

        assert_eq!(id, 7);
        assert_eq!(metrics.operation_count("save", "ok"), 1);
    }

    #[tokio::test]
    async fn test_counts_error_outcomes_by_kind() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_login()
            .returning(|_, _| Err(StoreError::UserNotFound { op: "test" }));
        repo.expect_save().returning(|_, _, _| {
            Err(StoreError::Interrupted {
                op: "test",
                reason: Interrupted::DeadlineExceeded,
            })
        });

        let (store, metrics) = instrumented(repo);
        let ctx = RequestContext::background();

        let err = store.find_by_login(&ctx, "bob").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UserNotFound);
        let err = store.save(&ctx, "bob", &[1]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);

        assert_eq!(metrics.operation_count("find_by_login", "user_not_found"), 1);
        assert_eq!(metrics.operation_count("save", "deadline_exceeded"), 1);
        assert_eq!(metrics.operation_count("save", "ok"), 0);
    }

    #[tokio::test]
    async fn test_close_is_forwarded() {
        let mut repo = MockUserRepository::new();
        repo.expect_close().times(1).returning(|| Ok(()));

        let (store, metrics) = instrumented(repo);
        store.close().await.unwrap();

        assert_eq!(metrics.operation_count("close", "ok"), 1);
    }

    #[tokio::test]
    async fn test_scrape_endpoint_serves_text_format() {
        let metrics = Arc::new(StoreMetrics::new().unwrap());
        metrics.observe("save", "ok", Duration::from_millis(3));

        let response = metrics_routes(metrics)
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(text.contains("user_store_operations_total{operation=\"save\",outcome=\"ok\"} 1"));
        assert!(text.contains("user_store_operation_duration_seconds"));
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let metrics = Arc::new(StoreMetrics::new().unwrap());
        let response = metrics_routes(metrics)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
