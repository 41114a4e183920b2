// ABOUTME: Reservation lifecycle service coupling state transitions to the seat ledger
// ABOUTME: Implements create/update/delete plus the tutor-facing accept/reject/complete flows

use crate::config::environment::BookingConfig;
use crate::database::{Database, ReservationFilter};
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::models::{
    AcceptReservationRequest, CreateReservationRequest, Reservation, ReservationStatus,
    UpdateReservationRequest,
};
use crate::services::slots::{build_slot, SlotService};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Booking availability for a (course, student) pair
#[derive(Debug, Clone, serde::Serialize)]
pub struct Availability {
    /// Course under consideration
    pub course_id: Uuid,
    /// Student under consideration
    pub student_id: String,
    /// The student's active reservation, if any
    pub active_reservation_id: Option<Uuid>,
    /// Seats still open, `None` when the course is unbounded
    pub remaining_seats: Option<i64>,
    /// Whether a new reservation would be accepted right now
    pub can_reserve: bool,
}

/// Reservation lifecycle service
///
/// The single writer of the course seat ledger: every state transition
/// computes its seat delta and applies it through the database layer's
/// guarded increment/decrement, transactionally coupled to the row update.
#[derive(Clone)]
pub struct ReservationService {
    database: Arc<Database>,
    slots: SlotService,
    config: BookingConfig,
}

impl ReservationService {
    /// Create a new reservation service
    #[must_use]
    pub fn new(database: Arc<Database>, config: BookingConfig) -> Self {
        let slots = SlotService::new(Arc::clone(&database), config.clone());
        Self {
            database,
            slots,
            config,
        }
    }

    /// List reservations with optional filtering
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn list(&self, filter: &ReservationFilter) -> AppResult<Vec<Reservation>> {
        self.database.list_reservations(filter).await
    }

    /// Get a reservation by ID
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the reservation does not exist.
    pub async fn get(&self, reservation_id: Uuid) -> AppResult<Reservation> {
        self.database
            .get_reservation(reservation_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Reservation {reservation_id}")))
    }

    /// Create a reservation, consuming a seat unless it starts cancelled
    ///
    /// Idempotent by lookup: when the student already holds an active
    /// reservation against the course, that reservation is returned
    /// unchanged and the seat ledger is untouched. The amount defaults to
    /// the course price, then zero.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for a missing course or slot,
    /// `InvalidInput` when the supplied slot belongs to another course,
    /// and `CapacityExceeded` when the course is full.
    pub async fn create(&self, request: &CreateReservationRequest) -> AppResult<Reservation> {
        let course = self
            .database
            .get_course(request.course_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Course {}", request.course_id)))?;

        if let Some(slot_id) = request.slot_id {
            let slot = self
                .database
                .get_slot(slot_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Slot {slot_id}")))?;
            if slot.course_id != course.id {
                return Err(AppError::invalid_input(
                    "The supplied slot does not belong to the course",
                ));
            }
        }

        if let Some(amount) = request.amount {
            if amount < 0.0 {
                return Err(AppError::invalid_input("Amount cannot be negative"));
            }
        }

        if let Some(existing) = self
            .database
            .find_active_reservation(course.id, &request.student_id)
            .await?
        {
            debug!(
                reservation_id = %existing.id,
                "Active reservation already exists, returning it"
            );
            return Ok(existing);
        }

        let now = Utc::now();
        let status = request.status.unwrap_or_default();
        let reservation = Reservation {
            id: Uuid::new_v4(),
            course_id: course.id,
            student_id: request.student_id.clone(),
            slot_id: request.slot_id,
            amount: request.amount.or(course.course_price).unwrap_or(0.0),
            paid: request.paid,
            status,
            reserved_at: None,
            created_at: now,
            updated_at: now,
        };

        match self.database.create_reservation(&reservation).await {
            Ok(()) => {}
            // Lost the race against a concurrent create for the same pair:
            // the unique index fired, so return the winner's reservation.
            Err(e) if e.code == ErrorCode::ResourceAlreadyExists => {
                if let Some(existing) = self
                    .database
                    .find_active_reservation(course.id, &request.student_id)
                    .await?
                {
                    return Ok(existing);
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        }

        info!(
            reservation_id = %reservation.id,
            course_id = %course.id,
            status = %status,
            "Reservation created"
        );
        Ok(reservation)
    }

    /// Update a reservation, applying the seat delta of any state change
    ///
    /// The delta is `sign(new) - sign(old)` where cancelled counts zero and
    /// every other state counts one; the ledger change and the row update
    /// are sequenced so a capacity rejection aborts the state change.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` for an illegal state change and
    /// `CapacityExceeded` when re-activation would overflow the course.
    pub async fn update(
        &self,
        reservation_id: Uuid,
        request: &UpdateReservationRequest,
    ) -> AppResult<Reservation> {
        let current = self.get(reservation_id).await?;
        let new_status = request.status.unwrap_or(current.status);

        if !current.status.can_transition_to(new_status) {
            return Err(AppError::invalid_transition(current.status, new_status));
        }

        if new_status == current.status && request.paid.is_none() {
            return Ok(current);
        }

        self.database
            .transition_reservation(&current, new_status, request.paid)
            .await
    }

    /// Delete a reservation, releasing its seat when it held one
    ///
    /// Capacity is reconciled regardless of the deletion path: a
    /// non-cancelled reservation decrements the ledger exactly as if it had
    /// been cancelled first.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the reservation does not exist.
    pub async fn delete(&self, reservation_id: Uuid) -> AppResult<()> {
        let current = self.get(reservation_id).await?;
        self.database.delete_reservation(&current).await?;

        info!(reservation_id = %reservation_id, "Reservation deleted");
        Ok(())
    }

    /// Accept a reservation: create a slot, attach it, confirm
    ///
    /// The slot is built from the supplied start instant and duration
    /// (defaulting to the configured slot length) and validated under the
    /// overlap policy — which, in this flow, allows overlaps by default
    /// since a tutor may run concurrent sessions. Accepting a cancelled
    /// reservation re-activates it and consumes a seat again.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when the reservation is already
    /// confirmed or completed, `SlotConflict` under a strict overlap
    /// policy, and `CapacityExceeded` when re-activation would overflow
    /// the course.
    pub async fn accept(
        &self,
        reservation_id: Uuid,
        request: &AcceptReservationRequest,
    ) -> AppResult<Reservation> {
        let current = self.get(reservation_id).await?;

        if !matches!(
            current.status,
            ReservationStatus::Pending | ReservationStatus::Cancelled
        ) {
            return Err(AppError::invalid_transition(
                current.status,
                ReservationStatus::Confirmed,
            ));
        }

        let duration_minutes = request
            .duration_minutes
            .unwrap_or(self.config.default_slot_duration_minutes);
        if duration_minutes <= 0 {
            return Err(AppError::invalid_input("Duration must be positive"));
        }

        let start_time = request.start_time;
        let end_time = start_time + Duration::minutes(duration_minutes);

        if self.database.get_course(current.course_id).await?.is_none() {
            return Err(AppError::not_found(format!("Course {}", current.course_id)));
        }

        self.slots
            .ensure_no_conflict(current.course_id, start_time, end_time, None)
            .await?;

        let slot = build_slot(current.course_id, start_time, end_time);
        let confirmed = self
            .database
            .confirm_reservation_with_slot(&current, &slot)
            .await?;

        info!(
            reservation_id = %confirmed.id,
            slot_id = %slot.id,
            "Reservation accepted"
        );
        Ok(confirmed)
    }

    /// Reject a reservation, releasing its seat
    ///
    /// Idempotent: rejecting an already-cancelled reservation returns it
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when the reservation is completed.
    pub async fn reject(&self, reservation_id: Uuid) -> AppResult<Reservation> {
        let current = self.get(reservation_id).await?;

        if current.status == ReservationStatus::Cancelled {
            return Ok(current);
        }

        if !current
            .status
            .can_transition_to(ReservationStatus::Cancelled)
        {
            return Err(AppError::invalid_transition(
                current.status,
                ReservationStatus::Cancelled,
            ));
        }

        self.database
            .transition_reservation(&current, ReservationStatus::Cancelled, None)
            .await
    }

    /// Mark a confirmed reservation's session as held
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when the reservation is cancelled or
    /// still pending.
    pub async fn complete(&self, reservation_id: Uuid) -> AppResult<Reservation> {
        let current = self.get(reservation_id).await?;

        if current.status == ReservationStatus::Completed {
            return Ok(current);
        }

        if !current
            .status
            .can_transition_to(ReservationStatus::Completed)
        {
            return Err(AppError::invalid_transition(
                current.status,
                ReservationStatus::Completed,
            ));
        }

        self.database
            .transition_reservation(&current, ReservationStatus::Completed, None)
            .await
    }

    /// Report booking availability for a (course, student) pair
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the course does not exist.
    pub async fn availability(
        &self,
        course_id: Uuid,
        student_id: &str,
    ) -> AppResult<Availability> {
        let course = self
            .database
            .get_course(course_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Course {course_id}")))?;

        let active = self
            .database
            .find_active_reservation(course_id, student_id)
            .await?;
        let remaining_seats = course.remaining_seats();

        let can_reserve = active.is_none() && remaining_seats.map_or(true, |seats| seats > 0);

        Ok(Availability {
            course_id,
            student_id: student_id.to_string(),
            active_reservation_id: active.map(|r| r.id),
            remaining_seats,
            can_reserve,
        })
    }
}
