// ABOUTME: Slot scheduling service with policy-gated overlap validation
// ABOUTME: Half-open interval semantics; touching endpoints never conflict

use crate::config::environment::BookingConfig;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{CreateSlotRequest, Slot, UpdateSlotRequest};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Whether two half-open intervals `[a_start, a_end)` and `[b_start, b_end)` overlap
///
/// Touching endpoints do not conflict: `[10:00, 11:00)` and `[11:00, 12:00)`
/// are disjoint.
#[must_use]
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// Slot scheduling service
#[derive(Clone)]
pub struct SlotService {
    database: Arc<Database>,
    config: BookingConfig,
}

impl SlotService {
    /// Create a new slot service
    #[must_use]
    pub fn new(database: Arc<Database>, config: BookingConfig) -> Self {
        Self { database, config }
    }

    /// List slots, optionally restricted to one course
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn list(&self, course_id: Option<Uuid>) -> AppResult<Vec<Slot>> {
        self.database.list_slots(course_id).await
    }

    /// Get a slot by ID
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the slot does not exist.
    pub async fn get(&self, slot_id: Uuid) -> AppResult<Slot> {
        self.database
            .get_slot(slot_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Slot {slot_id}")))
    }

    /// Create a new slot under the overlap policy
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a malformed interval, `ResourceNotFound`
    /// if the course does not exist, and `SlotConflict` when overlap
    /// checking is enabled and the interval collides with an existing slot
    /// of the same course.
    pub async fn create(&self, request: &CreateSlotRequest) -> AppResult<Slot> {
        request.validate()?;

        if self.database.get_course(request.course_id).await?.is_none() {
            return Err(AppError::not_found(format!("Course {}", request.course_id)));
        }

        self.ensure_no_conflict(request.course_id, request.start_time, request.end_time, None)
            .await?;

        let slot = build_slot(request.course_id, request.start_time, request.end_time);
        self.database.create_slot(&slot).await?;

        debug!(slot_id = %slot.id, course_id = %slot.course_id, "Slot created");
        Ok(slot)
    }

    /// Update an existing slot under the overlap policy
    ///
    /// The slot being updated is excluded from the conflict scan by
    /// identity.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the slot or target course does not
    /// exist, `InvalidInput` for a malformed interval, and `SlotConflict`
    /// on collision when overlap checking is enabled.
    pub async fn update(&self, slot_id: Uuid, request: &UpdateSlotRequest) -> AppResult<Slot> {
        let current = self.get(slot_id).await?;

        let course_id = request.course_id.unwrap_or(current.course_id);
        let start_time = request.start_time.unwrap_or(current.start_time);
        let end_time = request.end_time.unwrap_or(current.end_time);

        if end_time <= start_time {
            return Err(AppError::invalid_input(
                "Slot end time must be after its start time",
            ));
        }

        if self.database.get_course(course_id).await?.is_none() {
            return Err(AppError::not_found(format!("Course {course_id}")));
        }

        self.ensure_no_conflict(course_id, start_time, end_time, Some(slot_id))
            .await?;

        let updated = Slot {
            course_id,
            start_time,
            end_time,
            updated_at: Utc::now(),
            ..current
        };

        if !self.database.update_slot(&updated).await? {
            return Err(AppError::not_found(format!("Slot {slot_id}")));
        }

        Ok(updated)
    }

    /// Delete a slot
    ///
    /// # Errors
    ///
    /// Returns `ResourceInUse` while reservations reference the slot and
    /// `ResourceNotFound` if it does not exist.
    pub async fn delete(&self, slot_id: Uuid) -> AppResult<()> {
        if self.database.count_reservations_for_slot(slot_id).await? > 0 {
            return Err(AppError::resource_in_use(
                "Cannot delete slot: reservations reference it",
            ));
        }

        if !self.database.delete_slot(slot_id).await? {
            return Err(AppError::not_found(format!("Slot {slot_id}")));
        }

        Ok(())
    }

    /// Reject the interval when it collides with another slot of the course
    ///
    /// Skipped entirely when the policy allows overlapping slots.
    ///
    /// # Errors
    ///
    /// Returns `SlotConflict` on collision.
    pub(crate) async fn ensure_no_conflict(
        &self,
        course_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_slot: Option<Uuid>,
    ) -> AppResult<()> {
        if self.config.allow_overlapping_slots {
            return Ok(());
        }

        let existing = self.database.list_slots(Some(course_id)).await?;
        for slot in existing {
            if Some(slot.id) == exclude_slot {
                continue;
            }
            if overlaps(start_time, end_time, slot.start_time, slot.end_time) {
                return Err(AppError::slot_conflict(format!(
                    "Interval collides with slot {} ({} - {})",
                    slot.id, slot.start_time, slot.end_time
                )));
            }
        }

        Ok(())
    }
}

/// Construct a slot entity with fresh identity and timestamps
pub(crate) fn build_slot(
    course_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Slot {
    let now = Utc::now();
    Slot {
        id: Uuid::new_v4(),
        course_id,
        start_time,
        end_time,
        created_at: now,
        updated_at: now,
    }
}
