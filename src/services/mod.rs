// ABOUTME: Domain service layer for the booking engine's business logic
// ABOUTME: Provides protocol-agnostic services reusable behind any routing layer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ensenia

//! Domain service layer
//!
//! Protocol-agnostic business logic for the booking engine. Services return
//! entities or typed [`crate::errors::AppError`]s; transport concerns live
//! in the calling routers.

/// Course lifecycle operations: CRUD, tutor validation, delete guards
pub mod courses;

/// Course-creation quota guard against subscription entitlements
pub mod quota;

/// Reservation state machine and seat-ledger coupling
pub mod reservations;

/// Slot scheduling with policy-gated overlap validation
pub mod slots;

pub use courses::CourseService;
pub use quota::{CourseLimit, QuotaDecision, QuotaGuard};
pub use reservations::{Availability, ReservationService};
pub use slots::SlotService;
