// ABOUTME: Tests for course lifecycle operations, tutor validation, and delete guards
// ABOUTME: Exercises tutor resolution from credentials and the capacity-shrink invariant
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ensenia

#![allow(missing_docs, clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use course_booking_engine::config::environment::BookingConfig;
use course_booking_engine::database::{CourseFilter, Database};
use course_booking_engine::errors::ErrorCode;
use course_booking_engine::models::{
    CreateCourseRequest, CreateReservationRequest, CreateSlotRequest, DeliveryMode,
    UpdateCourseRequest,
};
use course_booking_engine::external::MockUserDirectory;
use course_booking_engine::services::{CourseService, ReservationService, SlotService};
use std::sync::Arc;
use uuid::Uuid;

const TOKEN: &str = "token-1";
const TUTOR: &str = "tutor-1";

async fn setup() -> (Arc<Database>, Arc<MockUserDirectory>, CourseService) {
    let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
    let users = Arc::new(MockUserDirectory::new());
    users.register_token(TOKEN, TUTOR).await;
    let service = CourseService::new(Arc::clone(&db), users.clone());
    (db, users, service)
}

fn course_request(name: &str) -> CreateCourseRequest {
    CreateCourseRequest {
        tutor_id: None,
        name: name.to_owned(),
        description: Some("Weekly sessions".to_owned()),
        delivery_mode: DeliveryMode::Hybrid,
        duration_weeks: Some(8),
        enrollment_price: Some(10.0),
        course_price: Some(25.0),
        has_capacity_limit: true,
        capacity: Some(10),
    }
}

#[tokio::test]
async fn test_create_resolves_tutor_from_credential() {
    let (_db, _users, service) = setup().await;

    let course = service
        .create(&course_request("Linear Algebra"), Some(TOKEN))
        .await
        .unwrap();

    assert_eq!(course.tutor_id, TUTOR);
    assert_eq!(course.name, "Linear Algebra");
    assert_eq!(course.occupied_seats, 0);
    assert!(course.has_capacity_limit);
}

#[tokio::test]
async fn test_create_requires_tutor_or_credential() {
    let (_db, _users, service) = setup().await;

    let err = service
        .create(&course_request("Orphan Course"), None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::AuthRequired);
}

#[tokio::test]
async fn test_create_validates_explicit_tutor() {
    let (_db, users, service) = setup().await;

    let mut request = course_request("Chemistry");
    request.tutor_id = Some("ghost-tutor".to_owned());
    let err = service.create(&request, Some(TOKEN)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ResourceNotFound);

    users
        .register_profile(course_booking_engine::external::TutorProfile {
            id: "ghost-tutor".to_owned(),
            user_id: None,
            full_name: Some("Dr. Ghost".to_owned()),
            verified: true,
        })
        .await;
    let course = service.create(&request, Some(TOKEN)).await.unwrap();
    assert_eq!(course.tutor_id, "ghost-tutor");
}

#[tokio::test]
async fn test_create_validates_request_fields() {
    let (_db, _users, service) = setup().await;

    let mut request = course_request("");
    let err = service.create(&request, Some(TOKEN)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);

    request.name = "Physics".to_owned();
    request.capacity = None;
    let err = service.create(&request, Some(TOKEN)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
}

#[tokio::test]
async fn test_update_reassignment_validates_new_tutor() {
    let (_db, users, service) = setup().await;
    let course = service
        .create(&course_request("History"), Some(TOKEN))
        .await
        .unwrap();

    let err = service
        .update(
            course.id,
            &UpdateCourseRequest {
                tutor_id: Some("nobody".to_owned()),
                ..UpdateCourseRequest::default()
            },
            Some(TOKEN),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ResourceNotFound);

    users
        .register_profile(course_booking_engine::external::TutorProfile {
            id: "tutor-2".to_owned(),
            user_id: None,
            full_name: None,
            verified: true,
        })
        .await;
    let updated = service
        .update(
            course.id,
            &UpdateCourseRequest {
                tutor_id: Some("tutor-2".to_owned()),
                ..UpdateCourseRequest::default()
            },
            Some(TOKEN),
        )
        .await
        .unwrap();
    assert_eq!(updated.tutor_id, "tutor-2");
}

#[tokio::test]
async fn test_update_cannot_shrink_capacity_below_occupancy() {
    let (db, _users, service) = setup().await;
    let course = service
        .create(&course_request("Biology"), Some(TOKEN))
        .await
        .unwrap();

    db.increment_occupied_seats(course.id, 3).await.unwrap();

    let err = service
        .update(
            course.id,
            &UpdateCourseRequest {
                capacity: Some(2),
                ..UpdateCourseRequest::default()
            },
            Some(TOKEN),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);

    // Shrinking down to the current occupancy is allowed
    let updated = service
        .update(
            course.id,
            &UpdateCourseRequest {
                capacity: Some(3),
                ..UpdateCourseRequest::default()
            },
            Some(TOKEN),
        )
        .await
        .unwrap();
    assert_eq!(updated.capacity, Some(3));
}

#[tokio::test]
async fn test_delete_guards_on_dependent_records() {
    let (db, _users, service) = setup().await;
    let course = service
        .create(&course_request("Music"), Some(TOKEN))
        .await
        .unwrap();

    let slots = SlotService::new(Arc::clone(&db), BookingConfig::default());
    let slot = slots
        .create(&CreateSlotRequest {
            course_id: course.id,
            start_time: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap(),
        })
        .await
        .unwrap();

    let err = service.delete(course.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ResourceInUse);

    slots.delete(slot.id).await.unwrap();

    let reservations = ReservationService::new(Arc::clone(&db), BookingConfig::default());
    let reservation = reservations
        .create(&CreateReservationRequest {
            course_id: course.id,
            student_id: "student-1".to_owned(),
            slot_id: None,
            amount: None,
            paid: false,
            status: None,
        })
        .await
        .unwrap();

    let err = service.delete(course.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ResourceInUse);

    reservations.delete(reservation.id).await.unwrap();
    service.delete(course.id).await.unwrap();

    let err = service.get(course.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ResourceNotFound);
}

#[tokio::test]
async fn test_delete_missing_course() {
    let (_db, _users, service) = setup().await;
    let err = service.delete(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ResourceNotFound);
}

#[tokio::test]
async fn test_list_filters() {
    let (_db, users, service) = setup().await;
    users.register_token("token-2", "tutor-2").await;

    service
        .create(&course_request("Linear Algebra"), Some(TOKEN))
        .await
        .unwrap();
    service
        .create(&course_request("Abstract Algebra"), Some(TOKEN))
        .await
        .unwrap();
    service
        .create(&course_request("Poetry"), Some("token-2"))
        .await
        .unwrap();

    let mine = service
        .list(&CourseFilter {
            tutor_id: Some(TUTOR.to_owned()),
            query: None,
        })
        .await
        .unwrap();
    assert_eq!(mine.len(), 2);

    let algebra = service
        .list(&CourseFilter {
            tutor_id: None,
            query: Some("Algebra".to_owned()),
        })
        .await
        .unwrap();
    assert_eq!(algebra.len(), 2);

    let poetry_by_other = service
        .list(&CourseFilter {
            tutor_id: Some("tutor-2".to_owned()),
            query: Some("Poetry".to_owned()),
        })
        .await
        .unwrap();
    assert_eq!(poetry_by_other.len(), 1);
}
