//! Booking and availability engine for a tutoring marketplace.
//!
//! The engine owns tutor availability, the booking lifecycle, and the
//! organization/membership model behind it. It is consumed as a library —
//! callers construct an [`engine::Engine`] over a [`repo::SnapshotRepository`]
//! and talk to it directly; there is no wire protocol.

pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod repo;
