use std::net::SocketAddr;

use crate::error::Error;
use crate::wire::Request;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total requests handled. Labels: request, status.
pub const REQUESTS_TOTAL: &str = "tableslot_requests_total";

/// Histogram: request latency in seconds. Labels: request.
pub const REQUEST_DURATION_SECONDS: &str = "tableslot_request_duration_seconds";

/// Counter: bookings refused for overlapping another. Labels: stage
/// (`precheck` in the scheduler, `commit` in the ledger).
pub const CONFLICTS_TOTAL: &str = "tableslot_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "tableslot_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "tableslot_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "tableslot_connections_rejected_total";

/// Gauge: bookings currently held by the ledger.
pub const BOOKINGS_ACTIVE: &str = "tableslot_bookings_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "tableslot_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "tableslot_wal_flush_batch_size";

/// Install the Prometheus exporter on `port`. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Error> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| Error::Config(format!("metrics exporter: {e}")))?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short label for a request, for metrics.
pub fn request_label(req: &Request) -> &'static str {
    match req {
        Request::ListResources => "list_resources",
        Request::ListBookings => "list_bookings",
        Request::CreateResource { .. } => "create_resource",
        Request::CreateBooking { .. } => "create_booking",
        Request::UpdateBooking { .. } => "update_booking",
        Request::DeleteBooking { .. } => "delete_booking",
    }
}
