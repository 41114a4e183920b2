// ABOUTME: Configuration management module for centralized engine settings
// ABOUTME: Handles environment-sourced configuration for storage, quotas, and booking policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ensenia

//! Configuration module for the booking engine
//!
//! Centralized configuration management for all components of the engine:
//!
//! - **Environment**: typed configuration loaded from environment variables
//!   (database, external services, quota policy, booking policy)

/// Environment and engine configuration
pub mod environment;
