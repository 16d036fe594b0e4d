use std::net::SocketAddr;

// ── RED metrics (operation-driven) ──────────────────────────────

/// Counter: bookings created.
pub const BOOKINGS_CREATED_TOTAL: &str = "lessonbook_bookings_created_total";

/// Counter: bookings confirmed (settlement or direct).
pub const BOOKINGS_CONFIRMED_TOTAL: &str = "lessonbook_bookings_confirmed_total";

/// Counter: bookings cancelled.
pub const BOOKINGS_CANCELLED_TOTAL: &str = "lessonbook_bookings_cancelled_total";

/// Counter: create/reschedule attempts rejected by the conflict detector.
pub const CONFLICTS_DETECTED_TOTAL: &str = "lessonbook_conflicts_detected_total";

/// Counter: organizations created.
pub const ORGANIZATIONS_CREATED_TOTAL: &str = "lessonbook_organizations_created_total";

/// Counter: membership requests opened.
pub const MEMBERSHIP_REQUESTS_TOTAL: &str = "lessonbook_membership_requests_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: snapshot write duration in seconds.
pub const SNAPSHOT_WRITE_DURATION_SECONDS: &str = "lessonbook_snapshot_write_duration_seconds";

/// Histogram: snapshots coalesced per write (1 = no batching win).
pub const SNAPSHOT_COALESCED_WRITES: &str = "lessonbook_snapshot_coalesced_writes";

/// Histogram: snapshot payload size in bytes.
pub const SNAPSHOT_BYTES: &str = "lessonbook_snapshot_bytes";

/// Counter: settlement timers aborted by a cancellation.
pub const SETTLEMENTS_ABORTED_TOTAL: &str = "lessonbook_settlements_aborted_total";

/// Install the Prometheus metrics exporter on the given port. No-op if
/// `port` is None. Call once from the host process.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Install the default fmt tracing subscriber. Convenience for hosts and
/// benches that don't bring their own.
pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}
