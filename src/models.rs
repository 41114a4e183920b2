// ABOUTME: Core data models for the capacity & booking engine
// ABOUTME: Defines Course, Slot, Reservation and the reservation lifecycle state machine
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ensenia

//! # Data Models
//!
//! Core data structures for bookable course offerings: the course record
//! with its seat ledger, schedulable time slots, and student reservations
//! moving through their lifecycle.
//!
//! ## Design Principles
//!
//! - **Serializable**: all models support JSON serialization for the routing layer
//! - **Type Safe**: lifecycle states and delivery modes are enums, not strings
//! - **Storage Friendly**: every enum round-trips through a stable string form

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// How a course is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Remote sessions only
    #[default]
    Online,
    /// On-site sessions only
    InPerson,
    /// Mix of remote and on-site sessions
    Hybrid,
}

impl DeliveryMode {
    /// Convert to database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::InPerson => "in_person",
            Self::Hybrid => "hybrid",
        }
    }

    /// Parse from database string representation
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "in_person" => Self::InPerson,
            "hybrid" => Self::Hybrid,
            _ => Self::Online,
        }
    }
}

/// Publication state of a course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    /// Open for booking
    #[default]
    Active,
    /// Temporarily not bookable
    Inactive,
    /// Cancelled by the tutor
    Cancelled,
}

impl CourseStatus {
    /// Convert to database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse from database string representation
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "inactive" => Self::Inactive,
            "cancelled" => Self::Cancelled,
            _ => Self::Active,
        }
    }
}

/// Lifecycle state of a reservation
///
/// Legal transitions:
///
/// ```text
/// pending ──> confirmed ──> completed
///    │            │
///    └─> cancelled <┘   (cancelled may re-activate to pending/confirmed)
/// ```
///
/// `completed` is terminal. `cancelled` is terminal except for explicit
/// re-activation; it never transitions to `completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Requested by a student, awaiting tutor action
    #[default]
    Pending,
    /// Accepted by the tutor, slot attached
    Confirmed,
    /// Rejected or cancelled; does not consume a seat
    Cancelled,
    /// Session held; kept for history
    Completed,
}

impl ReservationStatus {
    /// Convert to database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// Parse from database string representation
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => Self::Confirmed,
            "cancelled" => Self::Cancelled,
            "completed" => Self::Completed,
            _ => Self::Pending,
        }
    }

    /// Whether a reservation in this state holds a seat in the course ledger
    #[must_use]
    pub const fn consumes_seat(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    /// Whether the transition `self -> next` is legal
    ///
    /// A same-state "transition" is always allowed so that updates touching
    /// only other fields (e.g. the paid flag) pass through unchanged.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed | Self::Cancelled)
                | (Self::Confirmed, Self::Cancelled | Self::Completed)
                | (Self::Cancelled, Self::Pending | Self::Confirmed)
        ) || *self == next
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A bookable course offering
///
/// The course owns the authoritative seat counter: `occupied_seats` is only
/// ever mutated through the database layer's guarded increment/decrement,
/// driven by reservation state transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    /// Unique identifier
    pub id: Uuid,
    /// Owning tutor (resolved from the caller's credential on create)
    pub tutor_id: String,
    /// Display name
    pub name: String,
    /// Optional short description
    pub description: Option<String>,
    /// How the course is delivered
    pub delivery_mode: DeliveryMode,
    /// Estimated duration in weeks
    pub duration_weeks: Option<u32>,
    /// One-time enrollment price
    pub enrollment_price: Option<f64>,
    /// Price of a reservation against this course
    pub course_price: Option<f64>,
    /// Whether the seat ledger enforces a capacity
    pub has_capacity_limit: bool,
    /// Maximum seats (meaningful only when `has_capacity_limit`)
    pub capacity: Option<i64>,
    /// Seats currently consumed by non-cancelled reservations
    pub occupied_seats: i64,
    /// Publication state
    pub status: CourseStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Course {
    /// Effective capacity of the seat ledger; `None` means unbounded
    #[must_use]
    pub const fn effective_capacity(&self) -> Option<i64> {
        if self.has_capacity_limit {
            self.capacity
        } else {
            None
        }
    }

    /// Seats still available, or `None` when the course is unbounded
    #[must_use]
    pub fn remaining_seats(&self) -> Option<i64> {
        self.effective_capacity()
            .map(|cap| (cap - self.occupied_seats).max(0))
    }
}

/// Request to create a new course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCourseRequest {
    /// Owning tutor; resolved from the bearer token when absent
    #[serde(default)]
    pub tutor_id: Option<String>,
    /// Display name
    pub name: String,
    /// Optional short description
    #[serde(default)]
    pub description: Option<String>,
    /// How the course is delivered
    #[serde(default)]
    pub delivery_mode: DeliveryMode,
    /// Estimated duration in weeks
    #[serde(default)]
    pub duration_weeks: Option<u32>,
    /// One-time enrollment price
    #[serde(default)]
    pub enrollment_price: Option<f64>,
    /// Price of a reservation against this course
    #[serde(default)]
    pub course_price: Option<f64>,
    /// Whether the seat ledger enforces a capacity
    #[serde(default)]
    pub has_capacity_limit: bool,
    /// Maximum seats (required when `has_capacity_limit`)
    #[serde(default)]
    pub capacity: Option<i64>,
}

impl CreateCourseRequest {
    /// Validate field-level invariants
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the name is empty, a price is negative, or
    /// the capacity configuration is inconsistent.
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::invalid_input("Course name cannot be empty"));
        }
        if let Some(price) = self.enrollment_price {
            if price < 0.0 {
                return Err(AppError::invalid_input(
                    "Enrollment price cannot be negative",
                ));
            }
        }
        if let Some(price) = self.course_price {
            if price < 0.0 {
                return Err(AppError::invalid_input("Course price cannot be negative"));
            }
        }
        if self.has_capacity_limit {
            match self.capacity {
                Some(capacity) if capacity > 0 => {}
                Some(_) => {
                    return Err(AppError::invalid_input(
                        "Capacity must be greater than zero when the limit is enabled",
                    ))
                }
                None => {
                    return Err(AppError::invalid_input(
                        "Capacity is required when the limit is enabled",
                    ))
                }
            }
        }
        Ok(())
    }
}

/// Request to update an existing course (all fields optional)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCourseRequest {
    /// Re-assign the course to another tutor (validated against the user directory)
    pub tutor_id: Option<String>,
    /// New display name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New delivery mode
    pub delivery_mode: Option<DeliveryMode>,
    /// New duration in weeks
    pub duration_weeks: Option<u32>,
    /// New enrollment price
    pub enrollment_price: Option<f64>,
    /// New course price
    pub course_price: Option<f64>,
    /// Toggle the capacity limit
    pub has_capacity_limit: Option<bool>,
    /// New capacity
    pub capacity: Option<i64>,
    /// New publication state
    pub status: Option<CourseStatus>,
}

/// A scheduled time interval belonging to a course
///
/// Intervals are half-open: `[start_time, end_time)`. Touching endpoints do
/// not conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    /// Unique identifier
    pub id: Uuid,
    /// Owning course
    pub course_id: Uuid,
    /// Start instant (inclusive)
    pub start_time: DateTime<Utc>,
    /// End instant (exclusive), strictly after `start_time`
    pub end_time: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Request to create a new slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlotRequest {
    /// Owning course
    pub course_id: Uuid,
    /// Start instant (inclusive)
    pub start_time: DateTime<Utc>,
    /// End instant (exclusive)
    pub end_time: DateTime<Utc>,
}

impl CreateSlotRequest {
    /// Validate that the interval is well-formed
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `end_time` is not strictly after `start_time`.
    pub fn validate(&self) -> AppResult<()> {
        if self.end_time <= self.start_time {
            return Err(AppError::invalid_input(
                "Slot end time must be after its start time",
            ));
        }
        Ok(())
    }
}

/// Request to update an existing slot (all fields optional)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSlotRequest {
    /// Move the slot to another course
    pub course_id: Option<Uuid>,
    /// New start instant
    pub start_time: Option<DateTime<Utc>>,
    /// New end instant
    pub end_time: Option<DateTime<Utc>>,
}

/// A student's booking against a course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique identifier
    pub id: Uuid,
    /// Booked course
    pub course_id: Uuid,
    /// Booking student (opaque upstream identity)
    pub student_id: String,
    /// Attached slot; set once a tutor accepts the reservation
    pub slot_id: Option<Uuid>,
    /// Monetary amount, defaulted from the course price at creation
    pub amount: f64,
    /// Whether payment was made
    pub paid: bool,
    /// Lifecycle state
    pub status: ReservationStatus,
    /// Start of the confirmed session (copied from the slot on accept)
    pub reserved_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Request to create a new reservation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReservationRequest {
    /// Course to book
    pub course_id: Uuid,
    /// Booking student
    pub student_id: String,
    /// Optional upfront slot; must belong to the course
    #[serde(default)]
    pub slot_id: Option<Uuid>,
    /// Monetary amount; defaults to the course price, then zero
    #[serde(default)]
    pub amount: Option<f64>,
    /// Whether payment was already made
    #[serde(default)]
    pub paid: bool,
    /// Initial lifecycle state; defaults to `pending`
    #[serde(default)]
    pub status: Option<ReservationStatus>,
}

/// Request to update an existing reservation (all fields optional)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateReservationRequest {
    /// New paid flag
    pub paid: Option<bool>,
    /// New lifecycle state; validated against the transition table
    pub status: Option<ReservationStatus>,
}

/// Request for the tutor-facing accept convenience
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptReservationRequest {
    /// Session start instant
    pub start_time: DateTime<Utc>,
    /// Session length; defaults to the configured slot duration
    #[serde(default)]
    pub duration_minutes: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ReservationStatus::Pending,
            ReservationStatus::Confirmed,
            ReservationStatus::Cancelled,
            ReservationStatus::Completed,
        ] {
            assert_eq!(ReservationStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_transition_table() {
        use ReservationStatus::{Cancelled, Completed, Confirmed, Pending};

        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Completed));

        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(!Confirmed.can_transition_to(Pending));

        // Re-activation is allowed; completing a cancelled reservation is not.
        assert!(Cancelled.can_transition_to(Pending));
        assert!(Cancelled.can_transition_to(Confirmed));
        assert!(!Cancelled.can_transition_to(Completed));

        // Completed is terminal.
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Confirmed));
        assert!(!Completed.can_transition_to(Cancelled));

        // Same-state updates pass through.
        assert!(Pending.can_transition_to(Pending));
        assert!(Completed.can_transition_to(Completed));
    }

    #[test]
    fn test_seat_consumption() {
        assert!(ReservationStatus::Pending.consumes_seat());
        assert!(ReservationStatus::Confirmed.consumes_seat());
        assert!(ReservationStatus::Completed.consumes_seat());
        assert!(!ReservationStatus::Cancelled.consumes_seat());
    }

    #[test]
    fn test_course_request_capacity_validation() {
        let mut request = CreateCourseRequest {
            tutor_id: Some("tutor-1".to_owned()),
            name: "Linear Algebra".to_owned(),
            description: None,
            delivery_mode: DeliveryMode::Online,
            duration_weeks: Some(12),
            enrollment_price: None,
            course_price: Some(25.0),
            has_capacity_limit: true,
            capacity: None,
        };
        assert!(request.validate().is_err());

        request.capacity = Some(0);
        assert!(request.validate().is_err());

        request.capacity = Some(10);
        assert!(request.validate().is_ok());

        request.has_capacity_limit = false;
        request.capacity = None;
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_remaining_seats() {
        let now = Utc::now();
        let course = Course {
            id: Uuid::new_v4(),
            tutor_id: "tutor-1".to_owned(),
            name: "Calculus".to_owned(),
            description: None,
            delivery_mode: DeliveryMode::Online,
            duration_weeks: None,
            enrollment_price: None,
            course_price: None,
            has_capacity_limit: true,
            capacity: Some(5),
            occupied_seats: 3,
            status: CourseStatus::Active,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(course.remaining_seats(), Some(2));

        let unbounded = Course {
            has_capacity_limit: false,
            ..course
        };
        assert_eq!(unbounded.remaining_seats(), None);
    }

    #[test]
    fn test_slot_request_validation() {
        let start = Utc::now();
        let request = CreateSlotRequest {
            course_id: Uuid::new_v4(),
            start_time: start,
            end_time: start,
        };
        assert!(request.validate().is_err());

        let request = CreateSlotRequest {
            end_time: start + chrono::Duration::hours(1),
            ..request
        };
        assert!(request.validate().is_ok());
    }
}
