use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command.
pub const QUERIES_TOTAL: &str = "tanseeq_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "tanseeq_query_duration_seconds";

/// Counter: booking creations rejected by the conflict check.
pub const BOOKING_CONFLICTS_TOTAL: &str = "tanseeq_booking_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "tanseeq_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "tanseeq_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "tanseeq_connections_rejected_total";

/// Gauge: number of active tenants (loaded engines).
pub const TENANTS_ACTIVE: &str = "tanseeq_tenants_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "tanseeq_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "tanseeq_wal_flush_batch_size";

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

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertBooking { .. } => "insert_booking",
        Command::SelectBookings { .. } => "select_bookings",
        Command::SelectCalendar { .. } => "select_calendar",
        Command::SelectConflictCheck { .. } => "select_conflict_check",
        Command::SelectConflicts { .. } => "select_conflicts",
        Command::SelectTimeline { .. } => "select_timeline",
        Command::SelectRecommendations { .. } => "select_recommendations",
        Command::SelectOptimization { .. } => "select_optimization",
        Command::UpdateStatus { .. } => "update_status",
        Command::CancelBooking { .. } => "cancel_booking",
        Command::AddReview { .. } => "add_review",
        Command::Listen { .. } => "listen",
    }
}
