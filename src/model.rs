use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only instant type.
pub type Ms = i64;

pub type UserId = Ulid;
pub type TutorId = Ulid;
pub type BookingId = Ulid;
pub type OrgId = Ulid;
pub type RequestId = Ulid;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Touching endpoints never overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

// ── Availability ─────────────────────────────────────────────────

/// A recurring weekly window in which a tutor accepts bookings.
/// `day` is 0–6 with 0 = Sunday; minutes are offsets from midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySlot {
    pub day: u8,
    pub start_minute: u16,
    pub end_minute: u16,
}

/// One concrete bookable bucket on a specific day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub start_minute: u16,
    pub end_minute: u16,
}

impl TimeSlot {
    /// "HH:MM" label for the slot start.
    pub fn label(&self) -> String {
        format!("{:02}:{:02}", self.start_minute / 60, self.start_minute % 60)
    }
}

// ── Bookings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    /// Active bookings occupy their interval for conflict purposes.
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// The transition table. Terminal states allow nothing.
    pub fn allows(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
                | (Confirmed, NoShow)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        };
        f.write_str(s)
    }
}

/// A scheduled or requested lesson between a learner and a tutor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub learner_id: UserId,
    pub tutor_id: TutorId,
    pub subject: String,
    pub start_time: Ms,
    pub end_time: Ms,
    pub status: BookingStatus,
    pub price: u32,
    #[serde(default)]
    pub review_given: bool,
}

impl Booking {
    pub fn span(&self) -> Span {
        Span::new(self.start_time, self.end_time)
    }
}

/// Caller-supplied payload for `create_booking`. Price defaults to the
/// tutor's hourly rate when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    pub learner_id: UserId,
    pub tutor_id: TutorId,
    pub subject: String,
    pub start_time: Ms,
    pub end_time: Ms,
    #[serde(default)]
    pub price: Option<u32>,
}

// ── Actors ───────────────────────────────────────────────────────

/// Account role. A center owner is a tutor who also administers a center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Learner,
    Tutor,
    CenterOwner,
}

/// What a role may do. Derived once from the role instead of re-deriving
/// booleans at each call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub book_lessons: bool,
    pub manage_availability: bool,
    pub manage_organization: bool,
    pub manage_tutors: bool,
    pub manage_learners: bool,
}

impl Role {
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Role::Learner => Capabilities {
                book_lessons: true,
                manage_availability: false,
                manage_organization: false,
                manage_tutors: false,
                manage_learners: false,
            },
            Role::Tutor => Capabilities {
                book_lessons: false,
                manage_availability: true,
                manage_organization: false,
                manage_tutors: false,
                manage_learners: false,
            },
            Role::CenterOwner => Capabilities {
                book_lessons: false,
                manage_availability: true,
                manage_organization: true,
                manage_tutors: true,
                manage_learners: true,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub role: Role,
}

/// A tutor's profile plus the availability data the engine owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorProfile {
    pub id: TutorId,
    pub name: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    pub hourly_rate: u32,
    #[serde(default)]
    pub availability_slots: Vec<AvailabilitySlot>,
    /// Calendar dates excluded from bookability regardless of the weekly
    /// pattern. Serialized as ISO dates.
    #[serde(default)]
    pub blocked_dates: BTreeSet<NaiveDate>,
}

/// Tutor search filter. Absent fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TutorFilter {
    pub subject: Option<String>,
    pub language: Option<String>,
    pub min_hourly_rate: Option<u32>,
    pub max_hourly_rate: Option<u32>,
}

impl TutorFilter {
    pub fn matches(&self, tutor: &TutorProfile) -> bool {
        if let Some(ref s) = self.subject
            && !tutor.subjects.iter().any(|x| x == s) {
                return false;
            }
        if let Some(ref l) = self.language
            && !tutor.languages.iter().any(|x| x == l) {
                return false;
            }
        if let Some(min) = self.min_hourly_rate
            && tutor.hourly_rate < min {
                return false;
            }
        if let Some(max) = self.max_hourly_rate
            && tutor.hourly_rate > max {
                return false;
            }
        true
    }
}

// ── Organizations ────────────────────────────────────────────────

/// Membership role within one organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Tutor,
    Learner,
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MemberRole::Owner => "owner",
            MemberRole::Tutor => "tutor",
            MemberRole::Learner => "learner",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub languages: Vec<String>,
    pub owner_id: UserId,
    #[serde(default)]
    pub tutor_ids: Vec<UserId>,
    #[serde(default)]
    pub learner_ids: Vec<UserId>,
    pub created_at: Ms,
}

/// Caller-supplied attributes for `create_organization`.
#[derive(Debug, Clone, Default)]
pub struct OrganizationAttrs {
    pub name: String,
    pub description: String,
    pub country: String,
    pub languages: Vec<String>,
}

/// A user holds at most one role per organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub user_id: UserId,
    pub organization_id: OrgId,
    pub role: MemberRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// A request to join a center. At most one pending request per
/// `(user_id, organization_id)`; deleted when approval promotes it to a
/// membership, kept with status `rejected` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipRequest {
    pub id: RequestId,
    pub user_id: UserId,
    pub organization_id: OrgId,
    pub role: MemberRole,
    pub status: RequestStatus,
    pub created_at: Ms,
}

// ── Durable state ────────────────────────────────────────────────

/// The full engine state — also the durable snapshot format. Collections
/// keep registry (insertion) order; serde shapes are the documented
/// camelCase records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_user: Option<UserRecord>,
    #[serde(default)]
    pub tutors: Vec<TutorProfile>,
    #[serde(default)]
    pub bookings: Vec<Booking>,
    #[serde(default)]
    pub organizations: Vec<Organization>,
    #[serde(default)]
    pub memberships: Vec<Membership>,
    #[serde(default)]
    pub membership_requests: Vec<MembershipRequest>,
}

impl Snapshot {
    pub fn tutor(&self, id: &TutorId) -> Option<&TutorProfile> {
        self.tutors.iter().find(|t| t.id == *id)
    }

    pub fn tutor_mut(&mut self, id: &TutorId) -> Option<&mut TutorProfile> {
        self.tutors.iter_mut().find(|t| t.id == *id)
    }

    pub fn booking(&self, id: &BookingId) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == *id)
    }

    pub fn booking_mut(&mut self, id: &BookingId) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == *id)
    }

    pub fn organization(&self, id: &OrgId) -> Option<&Organization> {
        self.organizations.iter().find(|o| o.id == *id)
    }

    pub fn organization_mut(&mut self, id: &OrgId) -> Option<&mut Organization> {
        self.organizations.iter_mut().find(|o| o.id == *id)
    }

    pub fn membership_role(&self, user_id: &UserId, organization_id: &OrgId) -> Option<MemberRole> {
        self.memberships
            .iter()
            .find(|m| m.user_id == *user_id && m.organization_id == *organization_id)
            .map(|m| m.role)
    }

    pub fn has_pending_request(&self, user_id: &UserId, organization_id: &OrgId) -> bool {
        self.membership_requests.iter().any(|r| {
            r.user_id == *user_id
                && r.organization_id == *organization_id
                && r.status == RequestStatus::Pending
        })
    }
}
