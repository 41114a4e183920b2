// ABOUTME: Tests for the reservation state machine and its seat-ledger coupling
// ABOUTME: Covers idempotent creation, round trips, accept/reject/complete, and the capacity scenario
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ensenia

#![allow(missing_docs, clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use course_booking_engine::config::environment::BookingConfig;
use course_booking_engine::database::Database;
use course_booking_engine::errors::ErrorCode;
use course_booking_engine::models::{
    AcceptReservationRequest, Course, CreateCourseRequest, CreateReservationRequest,
    CreateSlotRequest, DeliveryMode, ReservationStatus, UpdateReservationRequest,
};
use course_booking_engine::services::{ReservationService, SlotService};
use std::sync::Arc;
use uuid::Uuid;

async fn setup() -> (Arc<Database>, ReservationService) {
    let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
    let service = ReservationService::new(Arc::clone(&db), BookingConfig::default());
    (db, service)
}

async fn create_course(db: &Database, capacity: Option<i64>, price: Option<f64>) -> Course {
    db.create_course(
        "tutor-1",
        &CreateCourseRequest {
            tutor_id: Some("tutor-1".to_owned()),
            name: "Test Course".to_owned(),
            description: None,
            delivery_mode: DeliveryMode::Online,
            duration_weeks: None,
            enrollment_price: None,
            course_price: price,
            has_capacity_limit: capacity.is_some(),
            capacity,
        },
    )
    .await
    .unwrap()
}

fn booking(course_id: Uuid, student: &str) -> CreateReservationRequest {
    CreateReservationRequest {
        course_id,
        student_id: student.to_owned(),
        slot_id: None,
        amount: None,
        paid: false,
        status: None,
    }
}

async fn occupied_seats(db: &Database, course_id: Uuid) -> i64 {
    db.get_course(course_id).await.unwrap().unwrap().occupied_seats
}

#[tokio::test]
async fn test_create_pending_consumes_seat() {
    let (db, service) = setup().await;
    let course = create_course(&db, Some(5), Some(30.0)).await;

    let reservation = service.create(&booking(course.id, "student-1")).await.unwrap();

    assert_eq!(reservation.status, ReservationStatus::Pending);
    assert_eq!(reservation.slot_id, None);
    assert!(!reservation.paid);
    assert_eq!(occupied_seats(&db, course.id).await, 1);
}

#[tokio::test]
async fn test_create_defaults_amount_from_course_price() {
    let (db, service) = setup().await;
    let course = create_course(&db, None, Some(42.5)).await;

    let reservation = service.create(&booking(course.id, "student-1")).await.unwrap();
    assert!((reservation.amount - 42.5).abs() < f64::EPSILON);

    let free_course = create_course(&db, None, None).await;
    let reservation = service
        .create(&booking(free_course.id, "student-1"))
        .await
        .unwrap();
    assert!(reservation.amount.abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_create_is_idempotent_per_student_course_pair() {
    let (db, service) = setup().await;
    let course = create_course(&db, Some(5), None).await;

    let first = service.create(&booking(course.id, "student-1")).await.unwrap();
    let second = service.create(&booking(course.id, "student-1")).await.unwrap();

    assert_eq!(first.id, second.id);
    // The seat ledger was incremented once, not twice
    assert_eq!(occupied_seats(&db, course.id).await, 1);
}

#[tokio::test]
async fn test_create_against_missing_course_or_foreign_slot() {
    let (db, service) = setup().await;
    let course = create_course(&db, None, None).await;
    let other_course = create_course(&db, None, None).await;

    let err = service
        .create(&booking(Uuid::new_v4(), "student-1"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ResourceNotFound);

    let slots = SlotService::new(Arc::clone(&db), BookingConfig::default());
    let slot = slots
        .create(&CreateSlotRequest {
            course_id: other_course.id,
            start_time: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap(),
        })
        .await
        .unwrap();

    let mut request = booking(course.id, "student-1");
    request.slot_id = Some(slot.id);
    let err = service.create(&request).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);

    request.slot_id = Some(Uuid::new_v4());
    let err = service.create(&request).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ResourceNotFound);
}

#[tokio::test]
async fn test_cancel_round_trip_returns_seat() {
    let (db, service) = setup().await;
    let course = create_course(&db, Some(2), None).await;

    let reservation = service.create(&booking(course.id, "student-1")).await.unwrap();
    assert_eq!(occupied_seats(&db, course.id).await, 1);

    let cancelled = service
        .update(
            reservation.id,
            &UpdateReservationRequest {
                paid: None,
                status: Some(ReservationStatus::Cancelled),
            },
        )
        .await
        .unwrap();

    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    assert_eq!(occupied_seats(&db, course.id).await, 0);
}

#[tokio::test]
async fn test_reactivation_consumes_seat_again() {
    let (db, service) = setup().await;
    let course = create_course(&db, Some(1), None).await;

    let reservation = service.create(&booking(course.id, "student-1")).await.unwrap();
    service
        .update(
            reservation.id,
            &UpdateReservationRequest {
                paid: None,
                status: Some(ReservationStatus::Cancelled),
            },
        )
        .await
        .unwrap();
    assert_eq!(occupied_seats(&db, course.id).await, 0);

    let reactivated = service
        .update(
            reservation.id,
            &UpdateReservationRequest {
                paid: None,
                status: Some(ReservationStatus::Pending),
            },
        )
        .await
        .unwrap();
    assert_eq!(reactivated.status, ReservationStatus::Pending);
    assert_eq!(occupied_seats(&db, course.id).await, 1);
}

#[tokio::test]
async fn test_reactivation_respects_capacity() {
    let (db, service) = setup().await;
    let course = create_course(&db, Some(1), None).await;

    let reservation = service.create(&booking(course.id, "student-1")).await.unwrap();
    service
        .update(
            reservation.id,
            &UpdateReservationRequest {
                paid: None,
                status: Some(ReservationStatus::Cancelled),
            },
        )
        .await
        .unwrap();

    // Someone else takes the last seat
    service.create(&booking(course.id, "student-2")).await.unwrap();

    let err = service
        .update(
            reservation.id,
            &UpdateReservationRequest {
                paid: None,
                status: Some(ReservationStatus::Pending),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::CapacityExceeded);

    // The aborted transition left the reservation cancelled
    let unchanged = service.get(reservation.id).await.unwrap();
    assert_eq!(unchanged.status, ReservationStatus::Cancelled);
    assert_eq!(occupied_seats(&db, course.id).await, 1);
}

#[tokio::test]
async fn test_accept_attaches_slot_and_confirms() {
    let (db, service) = setup().await;
    let course = create_course(&db, Some(3), None).await;

    let reservation = service.create(&booking(course.id, "student-1")).await.unwrap();
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();

    let confirmed = service
        .accept(
            reservation.id,
            &AcceptReservationRequest {
                start_time: start,
                duration_minutes: Some(90),
            },
        )
        .await
        .unwrap();

    assert_eq!(confirmed.status, ReservationStatus::Confirmed);
    assert_eq!(confirmed.reserved_at, Some(start));

    let slot_id = confirmed.slot_id.unwrap();
    let slot = db.get_slot(slot_id).await.unwrap().unwrap();
    assert_eq!(slot.course_id, course.id);
    assert_eq!(slot.start_time, start);
    assert_eq!(slot.end_time, start + chrono::Duration::minutes(90));

    // Accepting a pending reservation does not double-count the seat
    assert_eq!(occupied_seats(&db, course.id).await, 1);
}

#[tokio::test]
async fn test_accept_default_duration() {
    let (db, service) = setup().await;
    let course = create_course(&db, None, None).await;

    let reservation = service.create(&booking(course.id, "student-1")).await.unwrap();
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();

    let confirmed = service
        .accept(
            reservation.id,
            &AcceptReservationRequest {
                start_time: start,
                duration_minutes: None,
            },
        )
        .await
        .unwrap();

    let slot = db
        .get_slot(confirmed.slot_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(slot.end_time, start + chrono::Duration::minutes(60));
}

#[tokio::test]
async fn test_accept_then_reject_round_trip() {
    let (db, service) = setup().await;
    let course = create_course(&db, Some(2), None).await;

    let reservation = service.create(&booking(course.id, "student-1")).await.unwrap();
    let confirmed = service
        .accept(
            reservation.id,
            &AcceptReservationRequest {
                start_time: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
                duration_minutes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(occupied_seats(&db, course.id).await, 1);

    let rejected = service.reject(confirmed.id).await.unwrap();
    assert_eq!(rejected.status, ReservationStatus::Cancelled);
    assert_eq!(occupied_seats(&db, course.id).await, 0);
}

#[tokio::test]
async fn test_accept_rejected_for_confirmed_reservation() {
    let (db, service) = setup().await;
    let course = create_course(&db, None, None).await;

    let reservation = service.create(&booking(course.id, "student-1")).await.unwrap();
    let request = AcceptReservationRequest {
        start_time: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
        duration_minutes: None,
    };
    let confirmed = service.accept(reservation.id, &request).await.unwrap();

    let err = service.accept(confirmed.id, &request).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidTransition);
}

#[tokio::test]
async fn test_reject_is_idempotent() {
    let (db, service) = setup().await;
    let course = create_course(&db, Some(2), None).await;

    let reservation = service.create(&booking(course.id, "student-1")).await.unwrap();
    let rejected = service.reject(reservation.id).await.unwrap();
    assert_eq!(rejected.status, ReservationStatus::Cancelled);
    assert_eq!(occupied_seats(&db, course.id).await, 0);

    // A second rejection returns the reservation unchanged
    let rejected_again = service.reject(reservation.id).await.unwrap();
    assert_eq!(rejected_again.status, ReservationStatus::Cancelled);
    assert_eq!(occupied_seats(&db, course.id).await, 0);
}

#[tokio::test]
async fn test_complete_transitions() {
    let (db, service) = setup().await;
    let course = create_course(&db, None, None).await;

    // Pending reservations cannot complete
    let reservation = service.create(&booking(course.id, "student-1")).await.unwrap();
    let err = service.complete(reservation.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidTransition);

    // Confirmed reservations complete and keep their seat counted
    let confirmed = service
        .accept(
            reservation.id,
            &AcceptReservationRequest {
                start_time: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
                duration_minutes: None,
            },
        )
        .await
        .unwrap();
    let completed = service.complete(confirmed.id).await.unwrap();
    assert_eq!(completed.status, ReservationStatus::Completed);
    assert_eq!(occupied_seats(&db, course.id).await, 1);

    // Cancelled reservations never complete
    let other = service.create(&booking(course.id, "student-2")).await.unwrap();
    service.reject(other.id).await.unwrap();
    let err = service.complete(other.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidTransition);
}

#[tokio::test]
async fn test_completed_is_terminal() {
    let (db, service) = setup().await;
    let course = create_course(&db, None, None).await;

    let reservation = service.create(&booking(course.id, "student-1")).await.unwrap();
    service
        .accept(
            reservation.id,
            &AcceptReservationRequest {
                start_time: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
                duration_minutes: None,
            },
        )
        .await
        .unwrap();
    service.complete(reservation.id).await.unwrap();

    let err = service
        .update(
            reservation.id,
            &UpdateReservationRequest {
                paid: None,
                status: Some(ReservationStatus::Cancelled),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidTransition);
}

#[tokio::test]
async fn test_delete_reconciles_seat_ledger() {
    let (db, service) = setup().await;
    let course = create_course(&db, Some(2), None).await;

    let active = service.create(&booking(course.id, "student-1")).await.unwrap();
    assert_eq!(occupied_seats(&db, course.id).await, 1);

    service.delete(active.id).await.unwrap();
    assert_eq!(occupied_seats(&db, course.id).await, 0);

    // Deleting a cancelled reservation does not double-release
    let other = service.create(&booking(course.id, "student-2")).await.unwrap();
    service.reject(other.id).await.unwrap();
    assert_eq!(occupied_seats(&db, course.id).await, 0);
    service.delete(other.id).await.unwrap();
    assert_eq!(occupied_seats(&db, course.id).await, 0);
}

#[tokio::test]
async fn test_update_paid_flag_without_state_change() {
    let (db, service) = setup().await;
    let course = create_course(&db, None, None).await;

    let reservation = service.create(&booking(course.id, "student-1")).await.unwrap();
    let updated = service
        .update(
            reservation.id,
            &UpdateReservationRequest {
                paid: Some(true),
                status: None,
            },
        )
        .await
        .unwrap();

    assert!(updated.paid);
    assert_eq!(updated.status, ReservationStatus::Pending);
    assert_eq!(occupied_seats(&db, course.id).await, 1);
}

#[tokio::test]
async fn test_capacity_scenario() {
    // Course with capacity 2: A and B book, C is rejected, cancelling A
    // frees the seat, then C succeeds.
    let (db, service) = setup().await;
    let course = create_course(&db, Some(2), None).await;

    let a = service.create(&booking(course.id, "student-a")).await.unwrap();
    assert_eq!(occupied_seats(&db, course.id).await, 1);

    service.create(&booking(course.id, "student-b")).await.unwrap();
    assert_eq!(occupied_seats(&db, course.id).await, 2);

    let err = service.create(&booking(course.id, "student-c")).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::CapacityExceeded);
    assert_eq!(occupied_seats(&db, course.id).await, 2);

    service.reject(a.id).await.unwrap();
    assert_eq!(occupied_seats(&db, course.id).await, 1);

    service.create(&booking(course.id, "student-c")).await.unwrap();
    assert_eq!(occupied_seats(&db, course.id).await, 2);
}

#[tokio::test]
async fn test_list_reservations_filters() {
    use course_booking_engine::database::ReservationFilter;

    let (db, service) = setup().await;
    let course = create_course(&db, None, None).await;
    let other = create_course(&db, None, None).await;

    let first = service.create(&booking(course.id, "student-1")).await.unwrap();
    service.create(&booking(course.id, "student-2")).await.unwrap();
    service.create(&booking(other.id, "student-1")).await.unwrap();
    service.reject(first.id).await.unwrap();

    let by_course = service
        .list(&ReservationFilter {
            course_id: Some(course.id),
            ..ReservationFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(by_course.len(), 2);

    let by_student = service
        .list(&ReservationFilter {
            student_id: Some("student-1".to_owned()),
            ..ReservationFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(by_student.len(), 2);

    let cancelled = service
        .list(&ReservationFilter {
            status: Some(ReservationStatus::Cancelled),
            ..ReservationFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].id, first.id);
}

#[tokio::test]
async fn test_availability_report() {
    let (db, service) = setup().await;
    let course = create_course(&db, Some(2), None).await;

    let availability = service.availability(course.id, "student-1").await.unwrap();
    assert!(availability.can_reserve);
    assert_eq!(availability.remaining_seats, Some(2));
    assert_eq!(availability.active_reservation_id, None);

    let reservation = service.create(&booking(course.id, "student-1")).await.unwrap();

    let availability = service.availability(course.id, "student-1").await.unwrap();
    assert!(!availability.can_reserve);
    assert_eq!(availability.active_reservation_id, Some(reservation.id));
    assert_eq!(availability.remaining_seats, Some(1));

    // A full course blocks even students without a reservation
    service.create(&booking(course.id, "student-2")).await.unwrap();
    let availability = service.availability(course.id, "student-3").await.unwrap();
    assert!(!availability.can_reserve);
    assert_eq!(availability.remaining_seats, Some(0));
}
