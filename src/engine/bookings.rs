use crate::limits::*;
use crate::model::*;
use crate::notify::Notice;

use super::conflict::{check_no_conflict, now_ms, validate_interval};
use super::{Engine, EngineError};

impl Engine {
    fn notify_parties(&self, booking: &Booking, notice: Notice) {
        self.notify.send(booking.learner_id, &notice);
        self.notify.send(booking.tutor_id, &notice);
    }

    /// Create a pending booking for a learner. The price falls back to the
    /// tutor's hourly rate when the draft doesn't override it. The conflict
    /// check and the insert happen under one write lock, so two learners
    /// racing for overlapping intervals cannot both pass.
    pub async fn create_booking(&self, draft: BookingDraft) -> Result<Booking, EngineError> {
        if draft.learner_id.is_nil() {
            return Err(EngineError::Validation("missing learner id"));
        }
        if draft.tutor_id.is_nil() {
            return Err(EngineError::Validation("missing tutor id"));
        }
        if draft.subject.len() > MAX_SUBJECT_LEN {
            return Err(EngineError::LimitExceeded("subject too long"));
        }
        validate_interval(draft.start_time, draft.end_time)?;

        let mut state = self.state.write().await;
        let tutor = state
            .tutor(&draft.tutor_id)
            .ok_or(EngineError::NotFound(draft.tutor_id))?;
        let price = draft.price.unwrap_or(tutor.hourly_rate);

        let active = state
            .bookings
            .iter()
            .filter(|b| b.learner_id == draft.learner_id && b.status.is_active())
            .count();
        if active >= MAX_ACTIVE_BOOKINGS_PER_LEARNER {
            return Err(EngineError::LimitExceeded("too many active bookings"));
        }

        let span = Span::new(draft.start_time, draft.end_time);
        check_no_conflict(&state.bookings, draft.learner_id, &span, now_ms(), None)?;

        let booking = Booking {
            id: BookingId::new(),
            learner_id: draft.learner_id,
            tutor_id: draft.tutor_id,
            subject: draft.subject,
            start_time: draft.start_time,
            end_time: draft.end_time,
            status: BookingStatus::Pending,
            price,
            review_given: false,
        };

        let mut next = state.clone();
        next.bookings.push(booking.clone());
        self.commit(&mut state, next).await?;

        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
        self.notify_parties(&booking, Notice::BookingCreated { booking: booking.clone() });
        Ok(booking)
    }

    async fn transition(
        &self,
        id: BookingId,
        to: BookingStatus,
    ) -> Result<Booking, EngineError> {
        let mut state = self.state.write().await;
        let current = state.booking(&id).ok_or(EngineError::NotFound(id))?;
        let from = current.status;
        if !from.allows(to) {
            return Err(EngineError::InvalidTransition { from, to });
        }

        let mut next = state.clone();
        let booking = next.booking_mut(&id).expect("booking present under lock");
        booking.status = to;
        let updated = booking.clone();
        self.commit(&mut state, next).await?;
        Ok(updated)
    }

    /// pending → confirmed. Fired by the settlement timer or directly when
    /// a subscription covers the lesson.
    pub async fn confirm_booking(&self, id: BookingId) -> Result<Booking, EngineError> {
        let booking = self.transition(id, BookingStatus::Confirmed).await?;
        metrics::counter!(crate::observability::BOOKINGS_CONFIRMED_TOTAL).increment(1);
        self.notify_parties(&booking, Notice::BookingConfirmed { booking: booking.clone() });
        Ok(booking)
    }

    /// Cancel an active booking. Idempotent on an already-cancelled
    /// booking; completed and no-show reject the transition. Any scheduled
    /// settlement for the booking is aborted.
    pub async fn cancel_booking(&self, id: BookingId) -> Result<Booking, EngineError> {
        let mut state = self.state.write().await;
        let current = state.booking(&id).ok_or(EngineError::NotFound(id))?;
        let from = current.status;
        if from == BookingStatus::Cancelled {
            return Ok(current.clone());
        }
        if !from.allows(BookingStatus::Cancelled) {
            return Err(EngineError::InvalidTransition { from, to: BookingStatus::Cancelled });
        }

        let mut next = state.clone();
        let target = next.booking_mut(&id).expect("booking present under lock");
        target.status = BookingStatus::Cancelled;
        let booking = target.clone();
        self.commit(&mut state, next).await?;

        self.abort_settlement(&id);
        metrics::counter!(crate::observability::BOOKINGS_CANCELLED_TOTAL).increment(1);
        self.notify_parties(&booking, Notice::BookingCancelled { booking: booking.clone() });
        Ok(booking)
    }

    /// confirmed → completed (terminal).
    pub async fn complete_booking(&self, id: BookingId) -> Result<Booking, EngineError> {
        self.transition(id, BookingStatus::Completed).await
    }

    /// confirmed → no_show (terminal). Modeled for the tutor side; nothing
    /// in the engine triggers it.
    pub async fn mark_no_show(&self, id: BookingId) -> Result<Booking, EngineError> {
        self.transition(id, BookingStatus::NoShow).await
    }

    /// Move an active booking to a new interval. The conflict check runs
    /// against the learner's other bookings; on conflict the booking is
    /// left untouched. Id and status are preserved.
    pub async fn reschedule_booking(
        &self,
        id: BookingId,
        start_time: Ms,
        end_time: Ms,
    ) -> Result<Booking, EngineError> {
        validate_interval(start_time, end_time)?;

        let mut state = self.state.write().await;
        let current = state.booking(&id).ok_or(EngineError::NotFound(id))?;
        if !current.status.is_active() {
            return Err(EngineError::Validation(
                "only pending or confirmed lessons can be rescheduled",
            ));
        }
        let learner_id = current.learner_id;

        let span = Span::new(start_time, end_time);
        check_no_conflict(&state.bookings, learner_id, &span, now_ms(), Some(id))?;

        let mut next = state.clone();
        let booking = next.booking_mut(&id).expect("booking present under lock");
        booking.start_time = start_time;
        booking.end_time = end_time;
        let updated = booking.clone();
        self.commit(&mut state, next).await?;
        Ok(updated)
    }

    /// Mark the review as given. Only a completed lesson can be reviewed,
    /// and only once.
    pub async fn set_review_given(&self, id: BookingId) -> Result<Booking, EngineError> {
        let mut state = self.state.write().await;
        let current = state.booking(&id).ok_or(EngineError::NotFound(id))?;
        if current.status != BookingStatus::Completed {
            return Err(EngineError::Validation("review requires a completed lesson"));
        }
        if current.review_given {
            return Err(EngineError::Validation("review already given"));
        }

        let mut next = state.clone();
        let booking = next.booking_mut(&id).expect("booking present under lock");
        booking.review_given = true;
        let updated = booking.clone();
        self.commit(&mut state, next).await?;
        Ok(updated)
    }
}
