//! Prometheus-compatible metrics endpoint for the Keepsake server.
//!
//! Tracks request counts, per-tier write activity, and sweep totals.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Global metrics registry.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// Total HTTP requests served.
    pub http_requests_total: AtomicU64,
    /// Total HTTP errors (4xx + 5xx).
    pub http_errors_total: AtomicU64,
    /// Total fragments written to the short-term tier.
    pub fragments_created_total: AtomicU64,
    /// Total embeddings written to the long-term tier.
    pub embeddings_created_total: AtomicU64,
    /// Total embedding creates resolved to an existing row.
    pub embeddings_deduplicated_total: AtomicU64,
    /// Total similarity searches executed.
    pub similarity_searches_total: AtomicU64,
    /// Total fragments removed by retention sweeps.
    pub swept_fragments_total: AtomicU64,
    /// Total embeddings removed by retention sweeps.
    pub swept_embeddings_total: AtomicU64,
    /// Server start time for uptime calculation.
    pub started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                http_requests_total: AtomicU64::new(0),
                http_errors_total: AtomicU64::new(0),
                fragments_created_total: AtomicU64::new(0),
                embeddings_created_total: AtomicU64::new(0),
                embeddings_deduplicated_total: AtomicU64::new(0),
                similarity_searches_total: AtomicU64::new(0),
                swept_fragments_total: AtomicU64::new(0),
                swept_embeddings_total: AtomicU64::new(0),
                started_at: Instant::now(),
            }),
        }
    }

    pub fn inc_http_requests(&self) {
        self.inner
            .http_requests_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_http_errors(&self) {
        self.inner.http_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fragments_created(&self) {
        self.inner
            .fragments_created_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_embeddings_created(&self) {
        self.inner
            .embeddings_created_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_embeddings_deduplicated(&self) {
        self.inner
            .embeddings_deduplicated_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_similarity_searches(&self) {
        self.inner
            .similarity_searches_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_swept_fragments(&self, removed: u64) {
        self.inner
            .swept_fragments_total
            .fetch_add(removed, Ordering::Relaxed);
    }

    pub fn add_swept_embeddings(&self, removed: u64) {
        self.inner
            .swept_embeddings_total
            .fetch_add(removed, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }

    /// Render metrics in Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let m = &self.inner;

        format!(
            r#"# HELP keepsake_uptime_seconds Time since the server started.
# TYPE keepsake_uptime_seconds gauge
keepsake_uptime_seconds {}

# HELP keepsake_http_requests_total Total HTTP requests served.
# TYPE keepsake_http_requests_total counter
keepsake_http_requests_total {}

# HELP keepsake_http_errors_total Total HTTP errors (4xx/5xx).
# TYPE keepsake_http_errors_total counter
keepsake_http_errors_total {}

# HELP keepsake_fragments_created_total Total short-term fragments stored.
# TYPE keepsake_fragments_created_total counter
keepsake_fragments_created_total {}

# HELP keepsake_embeddings_created_total Total long-term embeddings stored.
# TYPE keepsake_embeddings_created_total counter
keepsake_embeddings_created_total {}

# HELP keepsake_embeddings_deduplicated_total Total embedding creates resolved to an existing row.
# TYPE keepsake_embeddings_deduplicated_total counter
keepsake_embeddings_deduplicated_total {}

# HELP keepsake_similarity_searches_total Total similarity searches executed.
# TYPE keepsake_similarity_searches_total counter
keepsake_similarity_searches_total {}

# HELP keepsake_swept_fragments_total Total fragments removed by retention sweeps.
# TYPE keepsake_swept_fragments_total counter
keepsake_swept_fragments_total {}

# HELP keepsake_swept_embeddings_total Total embeddings removed by retention sweeps.
# TYPE keepsake_swept_embeddings_total counter
keepsake_swept_embeddings_total {}
"#,
            self.uptime_secs(),
            m.http_requests_total.load(Ordering::Relaxed),
            m.http_errors_total.load(Ordering::Relaxed),
            m.fragments_created_total.load(Ordering::Relaxed),
            m.embeddings_created_total.load(Ordering::Relaxed),
            m.embeddings_deduplicated_total.load(Ordering::Relaxed),
            m.similarity_searches_total.load(Ordering::Relaxed),
            m.swept_fragments_total.load(Ordering::Relaxed),
            m.swept_embeddings_total.load(Ordering::Relaxed),
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
