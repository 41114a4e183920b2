// ABOUTME: Main library entry point for the course booking engine
// ABOUTME: Exposes the reservation state machine, seat ledger, slot validator, and quota guard
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ensenia

#![deny(unsafe_code)]

//! # Course Booking Engine
//!
//! Capacity and booking engine for tutor-led course offerings. The engine
//! coordinates three tightly coupled concerns:
//!
//! - **Seat ledger**: each course exposes a finite seat quota; reservations
//!   consume and release seats as they move through their lifecycle. The
//!   increment is a single atomic conditional update, so concurrent
//!   bookings can never overshoot capacity.
//! - **Reservation state machine**: `pending → confirmed → completed`,
//!   with cancellation from either active state and explicit re-activation.
//!   Every transition applies its seat delta transactionally.
//! - **Quota guard**: tutors are gated on course creation against the
//!   course limit implied by their subscription tier, with configurable
//!   fail-open/fail-closed behavior when the subscription service is down.
//!
//! HTTP routing, schema validation, and authentication policy are out of
//! scope: the engine returns entities or typed errors and leaves transport
//! concerns to the calling routers.
//!
//! ## Example
//!
//! ```rust,no_run
//! use course_booking_engine::config::environment::EngineConfig;
//! use course_booking_engine::database::Database;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = EngineConfig::from_env()?;
//! let database = Database::new(&config.database.url.to_connection_string()).await?;
//! # Ok(())
//! # }
//! ```

/// Configuration management and environment parsing
pub mod config;

/// Application constants and configuration defaults
pub mod constants;

/// Record store: courses (with the seat ledger), slots, and reservations
pub mod database;

/// Unified error handling system with stable error codes
pub mod errors;

/// Clients for upstream collaborators (user directory, payments)
pub mod external;

/// Structured logging configuration
pub mod logging;

/// Core data models and the reservation lifecycle
pub mod models;

/// Domain services: courses, slots, reservations, quota guard
pub mod services;
