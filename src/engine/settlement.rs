use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::model::BookingId;

use super::Engine;

/// Simulated payment settlement: confirm `booking_id` after `delay`.
///
/// The timer is keyed by booking id; cancelling the booking aborts it, and
/// a timer that fires anyway loses to the state machine — confirming a
/// cancelled booking is rejected and logged, never applied.
pub fn schedule_confirmation(engine: &Arc<Engine>, booking_id: BookingId, delay: Duration) {
    let engine2 = Arc::clone(engine);
    let handle = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        engine2.settlements.remove(&booking_id);
        match engine2.confirm_booking(booking_id).await {
            Ok(_) => info!("settled booking {booking_id}"),
            Err(e) => {
                // Cancelled (or otherwise resolved) while the timer ran — that's fine
                debug!("settlement skip {booking_id}: {e}");
            }
        }
    });
    if let Some(previous) = engine.settlements.insert(booking_id, handle) {
        previous.abort();
    }
}

impl Engine {
    /// Abort a scheduled settlement, if one is still pending.
    /// Returns whether a timer was aborted.
    pub(super) fn abort_settlement(&self, booking_id: &BookingId) -> bool {
        if let Some((_, handle)) = self.settlements.remove(booking_id) {
            handle.abort();
            metrics::counter!(crate::observability::SETTLEMENTS_ABORTED_TOTAL).increment(1);
            return true;
        }
        false
    }

    /// Whether a settlement timer is currently scheduled for the booking.
    pub fn settlement_pending(&self, booking_id: &BookingId) -> bool {
        self.settlements.contains_key(booking_id)
    }
}
