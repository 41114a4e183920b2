// ABOUTME: Course record operations and the per-course seat ledger
// ABOUTME: The guarded seat increment is the engine's only capacity-checked mutation

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{Course, CourseStatus, CreateCourseRequest, DeliveryMode, UpdateCourseRequest};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

/// Filter options for listing courses
#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    /// Free-text match against name and description
    pub query: Option<String>,
    /// Restrict to courses owned by this tutor
    pub tutor_id: Option<String>,
}

impl Database {
    /// Create courses table and indexes
    pub(super) async fn migrate_courses(&self) -> anyhow::Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS courses (
                id TEXT PRIMARY KEY,
                tutor_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                delivery_mode TEXT NOT NULL DEFAULT 'online'
                    CHECK (delivery_mode IN ('online', 'in_person', 'hybrid')),
                duration_weeks INTEGER,
                enrollment_price REAL,
                course_price REAL,
                has_capacity_limit INTEGER NOT NULL DEFAULT 0,
                capacity INTEGER,
                occupied_seats INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'active'
                    CHECK (status IN ('active', 'inactive', 'cancelled')),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_courses_tutor ON courses(tutor_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Create a new course owned by `tutor_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn create_course(
        &self,
        tutor_id: &str,
        request: &CreateCourseRequest,
    ) -> AppResult<Course> {
        let now = Utc::now();
        let id = Uuid::new_v4();

        sqlx::query(
            r"
            INSERT INTO courses (
                id, tutor_id, name, description, delivery_mode, duration_weeks,
                enrollment_price, course_price, has_capacity_limit, capacity,
                occupied_seats, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 0, $11, $12, $12)
            ",
        )
        .bind(id.to_string())
        .bind(tutor_id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.delivery_mode.as_str())
        .bind(request.duration_weeks.map(i64::from))
        .bind(request.enrollment_price)
        .bind(request.course_price)
        .bind(i64::from(request.has_capacity_limit))
        .bind(request.capacity)
        .bind(CourseStatus::Active.as_str())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create course: {e}")))?;

        Ok(Course {
            id,
            tutor_id: tutor_id.to_owned(),
            name: request.name.clone(),
            description: request.description.clone(),
            delivery_mode: request.delivery_mode,
            duration_weeks: request.duration_weeks,
            enrollment_price: request.enrollment_price,
            course_price: request.course_price,
            has_capacity_limit: request.has_capacity_limit,
            capacity: request.capacity,
            occupied_seats: 0,
            status: CourseStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a course by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn get_course(&self, course_id: Uuid) -> AppResult<Option<Course>> {
        let row = sqlx::query("SELECT * FROM courses WHERE id = $1")
            .bind(course_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get course: {e}")))?;

        row.map(|r| row_to_course(&r)).transpose()
    }

    /// List courses with optional filtering
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn list_courses(&self, filter: &CourseFilter) -> AppResult<Vec<Course>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM courses
            WHERE ($1 IS NULL OR tutor_id = $1)
              AND ($2 IS NULL
                   OR name LIKE '%' || $2 || '%'
                   OR COALESCE(description, '') LIKE '%' || $2 || '%')
            ORDER BY created_at DESC
            ",
        )
        .bind(filter.tutor_id.as_deref())
        .bind(filter.query.as_deref())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list courses: {e}")))?;

        rows.iter().map(row_to_course).collect()
    }

    /// Count the courses owned by a tutor
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn count_courses_for_tutor(&self, tutor_id: &str) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM courses WHERE tutor_id = $1")
            .bind(tutor_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count courses: {e}")))?;

        Ok(row.get("count"))
    }

    /// Update an existing course
    ///
    /// Returns `None` when the course does not exist. Rejects updates that
    /// would leave `occupied_seats` above the (possibly shrunk) capacity.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the merged record
    /// violates the capacity invariant.
    pub async fn update_course(
        &self,
        course_id: Uuid,
        request: &UpdateCourseRequest,
    ) -> AppResult<Option<Course>> {
        let Some(existing) = self.get_course(course_id).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        let tutor_id = request.tutor_id.as_ref().unwrap_or(&existing.tutor_id);
        let name = request.name.as_ref().unwrap_or(&existing.name);
        let description = request.description.clone().or(existing.description);
        let delivery_mode = request.delivery_mode.unwrap_or(existing.delivery_mode);
        let duration_weeks = request.duration_weeks.or(existing.duration_weeks);
        let enrollment_price = request.enrollment_price.or(existing.enrollment_price);
        let course_price = request.course_price.or(existing.course_price);
        let has_capacity_limit = request
            .has_capacity_limit
            .unwrap_or(existing.has_capacity_limit);
        let capacity = request.capacity.or(existing.capacity);
        let status = request.status.unwrap_or(existing.status);

        if has_capacity_limit {
            if let Some(capacity) = capacity {
                if existing.occupied_seats > capacity {
                    return Err(AppError::invalid_input(format!(
                        "Capacity {capacity} is below the {} seats already occupied",
                        existing.occupied_seats
                    )));
                }
            }
        }

        sqlx::query(
            r"
            UPDATE courses SET
                tutor_id = $1, name = $2, description = $3, delivery_mode = $4,
                duration_weeks = $5, enrollment_price = $6, course_price = $7,
                has_capacity_limit = $8, capacity = $9, status = $10, updated_at = $11
            WHERE id = $12
            ",
        )
        .bind(tutor_id)
        .bind(name)
        .bind(&description)
        .bind(delivery_mode.as_str())
        .bind(duration_weeks.map(i64::from))
        .bind(enrollment_price)
        .bind(course_price)
        .bind(i64::from(has_capacity_limit))
        .bind(capacity)
        .bind(status.as_str())
        .bind(now.to_rfc3339())
        .bind(course_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update course: {e}")))?;

        self.get_course(course_id).await
    }

    /// Delete a course
    ///
    /// Returns whether a row was removed. Referential guards (slots,
    /// reservations) live in the service layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn delete_course(&self, course_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(course_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete course: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Atomically consume seats in the course ledger
    ///
    /// This is a single conditional `UPDATE` guarded by the capacity
    /// predicate: either the whole increment applies, or nothing is
    /// written. Two racing increments can never overshoot the capacity.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the course does not exist and
    /// `CapacityExceeded` if the increment would overflow the capacity.
    pub async fn increment_occupied_seats(
        &self,
        course_id: Uuid,
        amount: i64,
    ) -> AppResult<Course> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::database(format!("Failed to acquire connection: {e}")))?;

        guarded_increment(&mut conn, course_id, amount).await?;
        drop(conn);

        self.get_course(course_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Course {course_id}")))
    }

    /// Release seats in the course ledger, flooring at zero
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the course does not exist.
    pub async fn decrement_occupied_seats(
        &self,
        course_id: Uuid,
        amount: i64,
    ) -> AppResult<Course> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::database(format!("Failed to acquire connection: {e}")))?;

        floored_decrement(&mut conn, course_id, amount).await?;
        drop(conn);

        self.get_course(course_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Course {course_id}")))
    }
}

/// Consume `amount` seats iff the result stays within capacity
///
/// Runs on a borrowed connection so reservation transitions can apply the
/// ledger change and their own row mutation inside one transaction.
pub(super) async fn guarded_increment(
    conn: &mut SqliteConnection,
    course_id: Uuid,
    amount: i64,
) -> AppResult<()> {
    let result = sqlx::query(
        r"
        UPDATE courses
        SET occupied_seats = occupied_seats + $1, updated_at = $2
        WHERE id = $3
          AND (has_capacity_limit = 0
               OR capacity IS NULL
               OR occupied_seats + $1 <= capacity)
        ",
    )
    .bind(amount)
    .bind(Utc::now().to_rfc3339())
    .bind(course_id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::database(format!("Failed to increment seat ledger: {e}")))?;

    if result.rows_affected() == 0 {
        let exists = sqlx::query("SELECT 1 FROM courses WHERE id = $1")
            .bind(course_id.to_string())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| AppError::database(format!("Failed to check course existence: {e}")))?;

        return if exists.is_some() {
            Err(
                AppError::capacity_exceeded("No seats available for this course")
                    .with_resource_id(course_id.to_string()),
            )
        } else {
            Err(AppError::not_found(format!("Course {course_id}")))
        };
    }

    Ok(())
}

/// Release `amount` seats, never dropping below zero
pub(super) async fn floored_decrement(
    conn: &mut SqliteConnection,
    course_id: Uuid,
    amount: i64,
) -> AppResult<()> {
    let result = sqlx::query(
        r"
        UPDATE courses
        SET occupied_seats = MAX(occupied_seats - $1, 0), updated_at = $2
        WHERE id = $3
        ",
    )
    .bind(amount)
    .bind(Utc::now().to_rfc3339())
    .bind(course_id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::database(format!("Failed to decrement seat ledger: {e}")))?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("Course {course_id}")));
    }

    Ok(())
}

/// Convert a database row to a [`Course`]
fn row_to_course(row: &SqliteRow) -> AppResult<Course> {
    let id_str: String = row.get("id");
    let delivery_mode_str: String = row.get("delivery_mode");
    let status_str: String = row.get("status");
    let duration_weeks: Option<i64> = row.get("duration_weeks");
    let has_capacity_limit: i64 = row.get("has_capacity_limit");

    Ok(Course {
        id: Uuid::parse_str(&id_str).map_err(|e| AppError::internal(format!("Invalid UUID: {e}")))?,
        tutor_id: row.get("tutor_id"),
        name: row.get("name"),
        description: row.get("description"),
        delivery_mode: DeliveryMode::parse(&delivery_mode_str),
        duration_weeks: duration_weeks.and_then(|w| u32::try_from(w).ok()),
        enrollment_price: row.get("enrollment_price"),
        course_price: row.get("course_price"),
        has_capacity_limit: has_capacity_limit == 1,
        capacity: row.get("capacity"),
        occupied_seats: row.get("occupied_seats"),
        status: CourseStatus::parse(&status_str),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}

/// Parse an RFC 3339 timestamp stored as TEXT
pub(super) fn parse_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::internal(format!("Invalid datetime: {e}")))
}
