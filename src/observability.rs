use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "paddock_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "paddock_query_duration_seconds";

/// Counter: booking attempts rejected because the unit was taken.
pub const BOOKING_CONFLICTS_TOTAL: &str = "paddock_booking_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "paddock_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "paddock_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "paddock_connections_rejected_total";

/// Gauge: number of active tenants (loaded engines).
pub const TENANTS_ACTIVE: &str = "paddock_tenants_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "paddock_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "paddock_wal_flush_batch_size";

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
        Command::InsertResource { .. } => "insert_resource",
        Command::UpdateResource { .. } => "update_resource",
        Command::DeleteResource { .. } => "delete_resource",
        Command::InsertReservation { .. } => "insert_reservation",
        Command::BatchBookRequests { .. } => "batch_book_requests",
        Command::CancelReservation { .. } => "cancel_reservation",
        Command::UpdateReservationStatus { .. } => "update_reservation_status",
        Command::AssignReservation { .. } => "assign_reservation",
        Command::SelectResources => "select_resources",
        Command::SelectReservations { .. } => "select_reservations",
        Command::SelectAvailability { .. } => "select_availability",
        Command::SelectFreeWindows { .. } => "select_free_windows",
        Command::Listen { .. } => "listen",
    }
}
