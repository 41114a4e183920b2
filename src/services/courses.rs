// ABOUTME: Course lifecycle service with tutor validation and referential delete guards
// ABOUTME: Seat-ledger mutation is owned by the reservation service, never by course edits

use crate::database::{CourseFilter, Database};
use crate::errors::{AppError, AppResult};
use crate::external::UserDirectory;
use crate::models::{Course, CreateCourseRequest, UpdateCourseRequest};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Course lifecycle service
#[derive(Clone)]
pub struct CourseService {
    database: Arc<Database>,
    users: Arc<dyn UserDirectory>,
}

impl CourseService {
    /// Create a new course service
    #[must_use]
    pub fn new(database: Arc<Database>, users: Arc<dyn UserDirectory>) -> Self {
        Self { database, users }
    }

    /// List courses with optional filtering
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn list(&self, filter: &CourseFilter) -> AppResult<Vec<Course>> {
        self.database.list_courses(filter).await
    }

    /// Get a course by ID
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the course does not exist.
    pub async fn get(&self, course_id: Uuid) -> AppResult<Course> {
        self.database
            .get_course(course_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Course {course_id}")))
    }

    /// Create a new course
    ///
    /// When the request names no tutor, the owner is resolved from the
    /// bearer credential through the user directory. The tutor profile is
    /// validated either way. Quota enforcement runs before this call (see
    /// [`crate::services::quota::QuotaGuard`]); this method only performs
    /// the write path.
    ///
    /// # Errors
    ///
    /// Returns `AuthRequired` when neither a tutor id nor a credential is
    /// supplied, `ResourceNotFound` when the tutor does not exist, or an
    /// error from the user directory.
    pub async fn create(
        &self,
        request: &CreateCourseRequest,
        token: Option<&str>,
    ) -> AppResult<Course> {
        request.validate()?;

        let tutor_id = match &request.tutor_id {
            Some(id) => id.clone(),
            None => {
                let token = token.ok_or_else(AppError::auth_required)?;
                self.users.resolve_tutor_id(token).await?
            }
        };

        let profile = self.users.get_tutor_profile(&tutor_id, token).await?;
        if profile.is_none() {
            return Err(AppError::not_found(format!("Tutor {tutor_id}")));
        }

        let course = self.database.create_course(&tutor_id, request).await?;

        info!(course_id = %course.id, tutor_id = %tutor_id, "Course created");
        Ok(course)
    }

    /// Update a course
    ///
    /// Re-assigning the course to another tutor validates the new tutor
    /// against the user directory. Capacity edits that would drop below
    /// the occupied seat count are rejected by the storage layer.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for a missing course or re-assigned
    /// tutor, or `InvalidInput` when the capacity invariant would break.
    pub async fn update(
        &self,
        course_id: Uuid,
        request: &UpdateCourseRequest,
        token: Option<&str>,
    ) -> AppResult<Course> {
        if let Some(new_tutor) = &request.tutor_id {
            let profile = self.users.get_tutor_profile(new_tutor, token).await?;
            if profile.is_none() {
                return Err(AppError::not_found(format!("Tutor {new_tutor}")));
            }
        }

        self.database
            .update_course(course_id, request)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Course {course_id}")))
    }

    /// Delete a course with no remaining slots or reservations
    ///
    /// # Errors
    ///
    /// Returns `ResourceInUse` while slots or reservations reference the
    /// course and `ResourceNotFound` if it does not exist.
    pub async fn delete(&self, course_id: Uuid) -> AppResult<()> {
        if self.database.count_slots_for_course(course_id).await? > 0 {
            return Err(AppError::resource_in_use(
                "Cannot delete course: slots are scheduled against it",
            ));
        }

        if self
            .database
            .count_reservations_for_course(course_id)
            .await?
            > 0
        {
            return Err(AppError::resource_in_use(
                "Cannot delete course: reservations reference it",
            ));
        }

        if !self.database.delete_course(course_id).await? {
            return Err(AppError::not_found(format!("Course {course_id}")));
        }

        info!(course_id = %course_id, "Course deleted");
        Ok(())
    }
}
