use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total HTTP requests handled. Labels: path, status.
pub const REQUESTS_TOTAL: &str = "bokad_requests_total";

/// Histogram: HTTP request latency in seconds. Labels: path.
pub const REQUEST_DURATION_SECONDS: &str = "bokad_request_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Counter: booking-conflict rejections (facility unavailable).
pub const BOOKING_CONFLICTS_TOTAL: &str = "bokad_booking_conflicts_total";

/// Counter: transactional emails handed to the provider.
pub const EMAILS_SENT_TOTAL: &str = "bokad_emails_sent_total";

/// Counter: transactional emails that failed.
pub const EMAILS_FAILED_TOTAL: &str = "bokad_emails_failed_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "bokad_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "bokad_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
