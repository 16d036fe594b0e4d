use chrono::NaiveDate;

use crate::model::*;

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

pub(crate) fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

pub(crate) fn validate_interval(start: Ms, end: Ms) -> Result<(), EngineError> {
    use crate::limits::*;
    if start >= end {
        return Err(EngineError::Validation("lesson must end after it starts"));
    }
    if start < MIN_VALID_TIMESTAMP_MS || end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if end - start > MAX_LESSON_DURATION_MS {
        return Err(EngineError::LimitExceeded("lesson too long"));
    }
    Ok(())
}

/// Scan `bookings` for the first active (pending or confirmed) future
/// booking of `party_id` whose half-open interval overlaps `span`.
/// Registry order decides which conflict is reported. `exclude` lets a
/// reschedule skip the booking being moved.
pub fn find_conflict<'a>(
    bookings: &'a [Booking],
    party_id: UserId,
    span: &Span,
    now: Ms,
    exclude: Option<BookingId>,
) -> Option<&'a Booking> {
    bookings.iter().find(|b| {
        if exclude.is_some_and(|skip| skip == b.id) {
            return false;
        }
        (b.learner_id == party_id || b.tutor_id == party_id)
            && b.status.is_active()
            && b.start_time > now
            && b.span().overlaps(span)
    })
}

/// Public probe result for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictCheck {
    pub conflicting: Option<Booking>,
}

impl ConflictCheck {
    pub fn has_conflict(&self) -> bool {
        self.conflicting.is_some()
    }
}

pub(crate) fn check_no_conflict(
    bookings: &[Booking],
    party_id: UserId,
    span: &Span,
    now: Ms,
    exclude: Option<BookingId>,
) -> Result<(), EngineError> {
    if let Some(hit) = find_conflict(bookings, party_id, span, now, exclude) {
        metrics::counter!(crate::observability::CONFLICTS_DETECTED_TOTAL).increment(1);
        return Err(EngineError::Conflict(hit.id));
    }
    Ok(())
}
