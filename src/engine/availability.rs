use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};

use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError};

/// Bookable buckets are fixed-length hours.
pub const SLOT_MINUTES: u16 = 60;

pub(crate) fn validate_slots(slots: &[AvailabilitySlot]) -> Result<(), EngineError> {
    if slots.len() > MAX_WEEKLY_SLOTS {
        return Err(EngineError::LimitExceeded("too many weekly slots"));
    }
    for slot in slots {
        if slot.day > 6 {
            return Err(EngineError::Validation("day must be 0-6"));
        }
        if slot.end_minute > MINUTES_PER_DAY {
            return Err(EngineError::Validation("slot must end by midnight"));
        }
        if slot.start_minute >= slot.end_minute {
            return Err(EngineError::Validation("slot must end after it starts"));
        }
    }
    Ok(())
}

/// Turn a tutor's weekly pattern into the bookable buckets for one date.
///
/// Each availability range on `date`'s weekday is partitioned into
/// hour-long buckets from its start; a trailing partial bucket is dropped.
/// Blocked dates and dates before `today` yield nothing. Pure — recomputed
/// from its inputs, no hidden state.
pub fn lesson_slots(
    slots: &[AvailabilitySlot],
    blocked: &BTreeSet<NaiveDate>,
    date: NaiveDate,
    today: NaiveDate,
) -> Vec<TimeSlot> {
    if date < today || blocked.contains(&date) {
        return Vec::new();
    }
    let weekday = date.weekday().num_days_from_sunday() as u8;

    let mut out = Vec::new();
    for slot in slots.iter().filter(|s| s.day == weekday) {
        let mut start = slot.start_minute;
        while start + SLOT_MINUTES <= slot.end_minute {
            out.push(TimeSlot { start_minute: start, end_minute: start + SLOT_MINUTES });
            start += SLOT_MINUTES;
        }
    }
    out.sort_by_key(|s| s.start_minute);
    out
}

impl Engine {
    /// Insert or replace a tutor profile.
    pub async fn register_tutor(&self, profile: TutorProfile) -> Result<(), EngineError> {
        if profile.id.is_nil() {
            return Err(EngineError::Validation("missing tutor id"));
        }
        if profile.name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("tutor name too long"));
        }
        if profile.languages.len() > MAX_LANGUAGES {
            return Err(EngineError::LimitExceeded("too many languages"));
        }
        if profile.blocked_dates.len() > MAX_BLOCKED_DATES {
            return Err(EngineError::LimitExceeded("too many blocked dates"));
        }
        validate_slots(&profile.availability_slots)?;

        let mut state = self.state.write().await;
        let mut next = state.clone();
        match next.tutor_mut(&profile.id) {
            Some(existing) => *existing = profile,
            None => next.tutors.push(profile),
        }
        self.commit(&mut state, next).await
    }

    /// Replace a tutor's full weekly slot set. Overlapping slots on the
    /// same day are permitted at this layer.
    pub async fn set_weekly_availability(
        &self,
        tutor_id: TutorId,
        slots: Vec<AvailabilitySlot>,
    ) -> Result<(), EngineError> {
        validate_slots(&slots)?;
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let tutor = next
            .tutor_mut(&tutor_id)
            .ok_or(EngineError::NotFound(tutor_id))?;
        tutor.availability_slots = slots;
        self.commit(&mut state, next).await
    }

    /// Idempotent: blocking an already-blocked date is a no-op.
    pub async fn add_blocked_date(
        &self,
        tutor_id: TutorId,
        date: NaiveDate,
    ) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let tutor = next
            .tutor_mut(&tutor_id)
            .ok_or(EngineError::NotFound(tutor_id))?;
        if tutor.blocked_dates.contains(&date) {
            return Ok(());
        }
        if tutor.blocked_dates.len() >= MAX_BLOCKED_DATES {
            return Err(EngineError::LimitExceeded("too many blocked dates"));
        }
        tutor.blocked_dates.insert(date);
        self.commit(&mut state, next).await
    }

    /// Idempotent: unblocking a date that is not blocked is a no-op.
    pub async fn remove_blocked_date(
        &self,
        tutor_id: TutorId,
        date: NaiveDate,
    ) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let tutor = next
            .tutor_mut(&tutor_id)
            .ok_or(EngineError::NotFound(tutor_id))?;
        if !tutor.blocked_dates.remove(&date) {
            return Ok(());
        }
        self.commit(&mut state, next).await
    }
}
