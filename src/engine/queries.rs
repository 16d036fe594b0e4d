use chrono::NaiveDate;

use crate::model::*;

use super::availability::lesson_slots;
use super::conflict::{self, now_ms, ConflictCheck};
use super::{Engine, EngineError};

impl Engine {
    pub async fn booking(&self, id: &BookingId) -> Option<Booking> {
        self.state.read().await.booking(id).cloned()
    }

    /// A learner's bookings in registry order.
    pub async fn bookings_for_learner(&self, learner_id: &UserId) -> Vec<Booking> {
        self.state
            .read()
            .await
            .bookings
            .iter()
            .filter(|b| b.learner_id == *learner_id)
            .cloned()
            .collect()
    }

    /// A tutor's bookings in registry order.
    pub async fn bookings_for_tutor(&self, tutor_id: &TutorId) -> Vec<Booking> {
        self.state
            .read()
            .await
            .bookings
            .iter()
            .filter(|b| b.tutor_id == *tutor_id)
            .cloned()
            .collect()
    }

    /// Active future lessons for either party, soonest first. Computed on
    /// read — nothing caches this view.
    pub async fn upcoming_lessons(&self, party_id: &UserId) -> Vec<Booking> {
        let now = now_ms();
        let mut lessons: Vec<Booking> = self
            .state
            .read()
            .await
            .bookings
            .iter()
            .filter(|b| {
                (b.learner_id == *party_id || b.tutor_id == *party_id)
                    && b.status.is_active()
                    && b.start_time > now
            })
            .cloned()
            .collect();
        lessons.sort_by_key(|b| b.start_time);
        lessons
    }

    /// Would a booking over `[start_time, end_time)` collide with one of
    /// the party's active future bookings?
    pub async fn check_conflict(
        &self,
        party_id: &UserId,
        start_time: Ms,
        end_time: Ms,
    ) -> ConflictCheck {
        if start_time >= end_time {
            return ConflictCheck { conflicting: None };
        }
        let span = Span::new(start_time, end_time);
        let state = self.state.read().await;
        let conflicting =
            conflict::find_conflict(&state.bookings, *party_id, &span, now_ms(), None).cloned();
        ConflictCheck { conflicting }
    }

    pub async fn tutor(&self, id: &TutorId) -> Option<TutorProfile> {
        self.state.read().await.tutor(id).cloned()
    }

    /// Tutors matching `filter`, registry order.
    pub async fn list_tutors(&self, filter: &TutorFilter) -> Vec<TutorProfile> {
        self.state
            .read()
            .await
            .tutors
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect()
    }

    /// Bookable buckets for a tutor on `date`, bound to the current day.
    pub async fn tutor_lesson_slots(
        &self,
        tutor_id: &TutorId,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, EngineError> {
        let state = self.state.read().await;
        let tutor = state.tutor(tutor_id).ok_or(EngineError::NotFound(*tutor_id))?;
        Ok(lesson_slots(
            &tutor.availability_slots,
            &tutor.blocked_dates,
            date,
            conflict::today(),
        ))
    }

    pub async fn organization(&self, id: &OrgId) -> Option<Organization> {
        self.state.read().await.organization(id).cloned()
    }

    /// Organizations the user belongs to, through memberships.
    pub async fn organizations_for_user(&self, user_id: &UserId) -> Vec<Organization> {
        let state = self.state.read().await;
        state
            .organizations
            .iter()
            .filter(|o| state.membership_role(user_id, &o.id).is_some())
            .cloned()
            .collect()
    }

    pub async fn membership_role(
        &self,
        user_id: &UserId,
        organization_id: &OrgId,
    ) -> Option<MemberRole> {
        self.state.read().await.membership_role(user_id, organization_id)
    }

    /// Pending requests for an organization, oldest first.
    pub async fn pending_requests(&self, organization_id: &OrgId) -> Vec<MembershipRequest> {
        self.state
            .read()
            .await
            .membership_requests
            .iter()
            .filter(|r| r.organization_id == *organization_id && r.status == RequestStatus::Pending)
            .cloned()
            .collect()
    }

    pub async fn has_pending_request(&self, user_id: &UserId, organization_id: &OrgId) -> bool {
        self.state
            .read()
            .await
            .has_pending_request(user_id, organization_id)
    }

    pub async fn current_user(&self) -> Option<UserRecord> {
        self.state.read().await.current_user.clone()
    }
}
