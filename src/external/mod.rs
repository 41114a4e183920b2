// ABOUTME: External service client modules (user directory, payments/subscriptions)
// ABOUTME: Defines the collaborator seams the quota guard and course service depend on
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ensenia

//! External Service Clients
//!
//! Clients for the upstream collaborators of the booking engine: the
//! user/tutor directory and the payments/subscription service. Each
//! collaborator is consumed through a trait so services can run against
//! the HTTP client in production and a mock in tests.

pub mod payments_client;
pub mod users_client;

// Re-export commonly used types
pub use payments_client::{
    MockSubscriptionCatalog, PaymentsClient, PaymentsClientConfig, Plan, Subscription,
    SubscriptionCatalog,
};
pub use users_client::{MockUserDirectory, TutorProfile, UserDirectory, UsersClient, UsersClientConfig};
