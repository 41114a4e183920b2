// ABOUTME: Reservation record operations with transactional seat-ledger coupling
// ABOUTME: Every state transition applies its seat delta and row mutation atomically

use super::courses::{floored_decrement, guarded_increment, parse_timestamp};
use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{Reservation, ReservationStatus, Slot};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

/// Filter options for listing reservations
#[derive(Debug, Clone, Default)]
pub struct ReservationFilter {
    /// Restrict to reservations against this course
    pub course_id: Option<Uuid>,
    /// Restrict to reservations attached to this slot
    pub slot_id: Option<Uuid>,
    /// Restrict to reservations made by this student
    pub student_id: Option<String>,
    /// Restrict to this lifecycle state
    pub status: Option<ReservationStatus>,
}

impl Database {
    /// Create reservations table and indexes
    ///
    /// The partial unique index enforces at most one non-cancelled
    /// reservation per (course, student) pair at the storage layer; the
    /// service keeps its lookup-before-insert for idempotent returns.
    pub(super) async fn migrate_reservations(&self) -> anyhow::Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS reservations (
                id TEXT PRIMARY KEY,
                course_id TEXT NOT NULL REFERENCES courses(id),
                student_id TEXT NOT NULL,
                slot_id TEXT REFERENCES slots(id),
                amount REAL NOT NULL DEFAULT 0,
                paid INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'confirmed', 'cancelled', 'completed')),
                reserved_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_reservations_course ON reservations(course_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_reservations_student ON reservations(student_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_reservations_active_pair
            ON reservations(course_id, student_id)
            WHERE status != 'cancelled'
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a new reservation, consuming a seat when its state requires one
    ///
    /// The seat increment and the insert run in one transaction: a capacity
    /// rejection leaves no reservation row, and an insert failure releases
    /// the provisional seat.
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` if the course is full,
    /// `ResourceAlreadyExists` if an active reservation for the same
    /// (course, student) pair already exists, or a database error.
    pub async fn create_reservation(&self, reservation: &Reservation) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        if reservation.status.consumes_seat() {
            guarded_increment(&mut tx, reservation.course_id, 1).await?;
        }

        sqlx::query(
            r"
            INSERT INTO reservations (
                id, course_id, student_id, slot_id, amount, paid, status,
                reserved_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(reservation.id.to_string())
        .bind(reservation.course_id.to_string())
        .bind(&reservation.student_id)
        .bind(reservation.slot_id.map(|id| id.to_string()))
        .bind(reservation.amount)
        .bind(i64::from(reservation.paid))
        .bind(reservation.status.as_str())
        .bind(reservation.reserved_at.map(|t| t.to_rfc3339()))
        .bind(reservation.created_at.to_rfc3339())
        .bind(reservation.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::already_exists(
                    "An active reservation already exists for this student and course",
                )
            } else {
                AppError::database(format!("Failed to create reservation: {e}"))
            }
        })?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit reservation: {e}")))?;

        Ok(())
    }

    /// Get a reservation by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn get_reservation(&self, reservation_id: Uuid) -> AppResult<Option<Reservation>> {
        let row = sqlx::query("SELECT * FROM reservations WHERE id = $1")
            .bind(reservation_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get reservation: {e}")))?;

        row.map(|r| row_to_reservation(&r)).transpose()
    }

    /// List reservations with optional filtering
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn list_reservations(
        &self,
        filter: &ReservationFilter,
    ) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM reservations
            WHERE ($1 IS NULL OR course_id = $1)
              AND ($2 IS NULL OR slot_id = $2)
              AND ($3 IS NULL OR student_id = $3)
              AND ($4 IS NULL OR status = $4)
            ORDER BY created_at DESC
            ",
        )
        .bind(filter.course_id.map(|id| id.to_string()))
        .bind(filter.slot_id.map(|id| id.to_string()))
        .bind(filter.student_id.as_deref())
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list reservations: {e}")))?;

        rows.iter().map(row_to_reservation).collect()
    }

    /// Find the non-cancelled reservation for a (course, student) pair
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn find_active_reservation(
        &self,
        course_id: Uuid,
        student_id: &str,
    ) -> AppResult<Option<Reservation>> {
        let row = sqlx::query(
            r"
            SELECT * FROM reservations
            WHERE course_id = $1 AND student_id = $2 AND status != 'cancelled'
            LIMIT 1
            ",
        )
        .bind(course_id.to_string())
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to find active reservation: {e}")))?;

        row.map(|r| row_to_reservation(&r)).transpose()
    }

    /// Count the reservations referencing a course
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn count_reservations_for_course(&self, course_id: Uuid) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM reservations WHERE course_id = $1")
            .bind(course_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count reservations: {e}")))?;

        Ok(row.get("count"))
    }

    /// Count the reservations referencing a slot
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn count_reservations_for_slot(&self, slot_id: Uuid) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM reservations WHERE slot_id = $1")
            .bind(slot_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count reservations: {e}")))?;

        Ok(row.get("count"))
    }

    /// Apply a state transition, coupling the seat delta to the row update
    ///
    /// The ledger mutation and the reservation update run in one
    /// transaction; a failed ledger update aborts the state change with no
    /// partial write.
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` when re-activation would overflow the
    /// course, `ResourceNotFound` when the reservation vanished, or a
    /// database error.
    pub async fn transition_reservation(
        &self,
        current: &Reservation,
        new_status: ReservationStatus,
        paid: Option<bool>,
    ) -> AppResult<Reservation> {
        let now = Utc::now();
        let seat_delta =
            i64::from(new_status.consumes_seat()) - i64::from(current.status.consumes_seat());

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        if seat_delta > 0 {
            guarded_increment(&mut tx, current.course_id, seat_delta).await?;
        } else if seat_delta < 0 {
            floored_decrement(&mut tx, current.course_id, -seat_delta).await?;
        }

        let paid = paid.unwrap_or(current.paid);
        let result = sqlx::query(
            r"
            UPDATE reservations SET status = $1, paid = $2, updated_at = $3
            WHERE id = $4
            ",
        )
        .bind(new_status.as_str())
        .bind(i64::from(paid))
        .bind(now.to_rfc3339())
        .bind(current.id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to update reservation: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Reservation {}", current.id)));
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit transition: {e}")))?;

        Ok(Reservation {
            status: new_status,
            paid,
            updated_at: now,
            ..current.clone()
        })
    }

    /// Confirm a reservation against a freshly created slot
    ///
    /// Inserts the slot, attaches it, moves the reservation to `confirmed`,
    /// and applies the seat delta for re-activated reservations, all in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` when re-activation would overflow the
    /// course, `ResourceNotFound` when the reservation vanished, or a
    /// database error.
    pub async fn confirm_reservation_with_slot(
        &self,
        current: &Reservation,
        slot: &Slot,
    ) -> AppResult<Reservation> {
        let now = Utc::now();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        if !current.status.consumes_seat() {
            guarded_increment(&mut tx, current.course_id, 1).await?;
        }

        sqlx::query(
            r"
            INSERT INTO slots (id, course_id, start_time, end_time, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(slot.id.to_string())
        .bind(slot.course_id.to_string())
        .bind(slot.start_time.to_rfc3339())
        .bind(slot.end_time.to_rfc3339())
        .bind(slot.created_at.to_rfc3339())
        .bind(slot.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to create slot: {e}")))?;

        let result = sqlx::query(
            r"
            UPDATE reservations SET
                slot_id = $1, status = $2, reserved_at = $3, updated_at = $4
            WHERE id = $5
            ",
        )
        .bind(slot.id.to_string())
        .bind(ReservationStatus::Confirmed.as_str())
        .bind(slot.start_time.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(current.id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to confirm reservation: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Reservation {}", current.id)));
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit confirmation: {e}")))?;

        Ok(Reservation {
            slot_id: Some(slot.id),
            status: ReservationStatus::Confirmed,
            reserved_at: Some(slot.start_time),
            updated_at: now,
            ..current.clone()
        })
    }

    /// Delete a reservation, releasing its seat when it held one
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the reservation does not exist, or a
    /// database error.
    pub async fn delete_reservation(&self, current: &Reservation) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        if current.status.consumes_seat() {
            floored_decrement(&mut tx, current.course_id, 1).await?;
        }

        let result = sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(current.id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete reservation: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Reservation {}", current.id)));
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit deletion: {e}")))?;

        Ok(())
    }
}

/// Whether a sqlx error is a unique-constraint violation
fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db_err) if db_err.message().contains("UNIQUE constraint failed")
    )
}

/// Convert a database row to a [`Reservation`]
fn row_to_reservation(row: &SqliteRow) -> AppResult<Reservation> {
    let id_str: String = row.get("id");
    let course_id_str: String = row.get("course_id");
    let slot_id_str: Option<String> = row.get("slot_id");
    let status_str: String = row.get("status");
    let paid: i64 = row.get("paid");
    let reserved_at_str: Option<String> = row.get("reserved_at");

    Ok(Reservation {
        id: Uuid::parse_str(&id_str).map_err(|e| AppError::internal(format!("Invalid UUID: {e}")))?,
        course_id: Uuid::parse_str(&course_id_str)
            .map_err(|e| AppError::internal(format!("Invalid UUID: {e}")))?,
        student_id: row.get("student_id"),
        slot_id: slot_id_str
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| AppError::internal(format!("Invalid UUID: {e}")))?,
        amount: row.get("amount"),
        paid: paid == 1,
        status: ReservationStatus::parse(&status_str),
        reserved_at: reserved_at_str.as_deref().map(parse_timestamp).transpose()?,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}
