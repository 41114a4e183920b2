// ABOUTME: Slot record operations for course schedules
// ABOUTME: Overlap policy lives in the service layer; this module is plain storage

use super::courses::parse_timestamp;
use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::Slot;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

impl Database {
    /// Create slots table and indexes
    pub(super) async fn migrate_slots(&self) -> anyhow::Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS slots (
                id TEXT PRIMARY KEY,
                course_id TEXT NOT NULL REFERENCES courses(id),
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_slots_course ON slots(course_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert a new slot
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn create_slot(&self, slot: &Slot) -> AppResult<()> {
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
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create slot: {e}")))?;

        Ok(())
    }

    /// Get a slot by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn get_slot(&self, slot_id: Uuid) -> AppResult<Option<Slot>> {
        let row = sqlx::query("SELECT * FROM slots WHERE id = $1")
            .bind(slot_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get slot: {e}")))?;

        row.map(|r| row_to_slot(&r)).transpose()
    }

    /// List slots, optionally restricted to one course
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn list_slots(&self, course_id: Option<Uuid>) -> AppResult<Vec<Slot>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM slots
            WHERE ($1 IS NULL OR course_id = $1)
            ORDER BY start_time ASC
            ",
        )
        .bind(course_id.map(|id| id.to_string()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list slots: {e}")))?;

        rows.iter().map(row_to_slot).collect()
    }

    /// Count the slots belonging to a course
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn count_slots_for_course(&self, course_id: Uuid) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM slots WHERE course_id = $1")
            .bind(course_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count slots: {e}")))?;

        Ok(row.get("count"))
    }

    /// Persist new interval/course values for a slot
    ///
    /// Returns whether a row was updated.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn update_slot(&self, slot: &Slot) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE slots SET
                course_id = $1, start_time = $2, end_time = $3, updated_at = $4
            WHERE id = $5
            ",
        )
        .bind(slot.course_id.to_string())
        .bind(slot.start_time.to_rfc3339())
        .bind(slot.end_time.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .bind(slot.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update slot: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a slot
    ///
    /// Returns whether a row was removed. The reservation guard lives in
    /// the service layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn delete_slot(&self, slot_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM slots WHERE id = $1")
            .bind(slot_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete slot: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

/// Convert a database row to a [`Slot`]
fn row_to_slot(row: &SqliteRow) -> AppResult<Slot> {
    let id_str: String = row.get("id");
    let course_id_str: String = row.get("course_id");

    Ok(Slot {
        id: Uuid::parse_str(&id_str).map_err(|e| AppError::internal(format!("Invalid UUID: {e}")))?,
        course_id: Uuid::parse_str(&course_id_str)
            .map_err(|e| AppError::internal(format!("Invalid UUID: {e}")))?,
        start_time: parse_timestamp(&row.get::<String, _>("start_time"))?,
        end_time: parse_timestamp(&row.get::<String, _>("end_time"))?,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}
