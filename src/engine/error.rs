use ulid::Ulid;

use crate::model::{BookingId, BookingStatus, OrgId, UserId};

#[derive(Debug)]
pub enum EngineError {
    Validation(&'static str),
    Conflict(BookingId),
    DuplicateRequest {
        user_id: UserId,
        organization_id: OrgId,
    },
    DuplicateMembership {
        user_id: UserId,
        organization_id: OrgId,
    },
    NotFound(Ulid),
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    LimitExceeded(&'static str),
    Storage(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "validation failed: {msg}"),
            EngineError::Conflict(id) => write!(f, "conflict with booking: {id}"),
            EngineError::DuplicateRequest { user_id, organization_id } => {
                write!(f, "pending request already exists for {user_id} in {organization_id}")
            }
            EngineError::DuplicateMembership { user_id, organization_id } => {
                write!(f, "{user_id} is already a member of {organization_id}")
            }
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::InvalidTransition { from, to } => {
                write!(f, "invalid transition: {from} -> {to}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
