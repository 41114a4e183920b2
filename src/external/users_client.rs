// ABOUTME: User directory client for tutor identity resolution and profile lookup
// ABOUTME: Resolves the tutor behind a bearer credential in two hops (user, then tutor profile)
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ensenia

//! User Directory Client
//!
//! Client for the user/tutor directory service. The engine consumes it for
//! two things: resolving the tutor identity behind a caller's bearer
//! credential, and validating tutor profiles on course creation and
//! re-assignment.
//!
//! Resolution is a two-hop flow mirroring the upstream API:
//!
//! 1. `GET /v1/auth/me` — the user record behind the credential
//! 2. `GET /v1/tutors/by-user/{user_id}` — that user's tutor profile
//!
//! Failure to resolve surfaces as an authorization-shaped error; an
//! unreachable directory surfaces as `ServiceUnavailable`.

use crate::constants::limits;
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// User directory client configuration
#[derive(Debug, Clone)]
pub struct UsersClientConfig {
    /// Base URL of the directory service, without trailing slash
    pub base_url: String,
    /// Total request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for UsersClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://users-service:8081".to_string(),
            timeout_secs: limits::DEFAULT_EXTERNAL_TIMEOUT_SECS,
        }
    }
}

/// A tutor profile as exposed by the directory service
#[derive(Debug, Clone)]
pub struct TutorProfile {
    /// Stable tutor identifier
    pub id: String,
    /// Backing user account, when exposed
    pub user_id: Option<String>,
    /// Display name
    pub full_name: Option<String>,
    /// Whether the directory has verified this tutor
    pub verified: bool,
}

/// Seam for the tutor/identity resolver collaborator
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve the tutor identity behind a bearer credential
    async fn resolve_tutor_id(&self, token: &str) -> AppResult<String>;

    /// Fetch a tutor profile by id; `None` when the tutor does not exist
    async fn get_tutor_profile(
        &self,
        tutor_id: &str,
        token: Option<&str>,
    ) -> AppResult<Option<TutorProfile>>;
}

/// HTTP client for the user directory service
pub struct UsersClient {
    config: UsersClientConfig,
    http_client: reqwest::Client,
}

impl UsersClient {
    /// Create a new user directory client
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the HTTP client cannot be constructed.
    pub fn new(config: UsersClientConfig) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(
                limits::DEFAULT_EXTERNAL_CONNECT_TIMEOUT_SECS,
            ))
            .build()
            .map_err(|e| AppError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    async fn get_json(&self, path: &str, token: Option<&str>) -> AppResult<Option<Value>> {
        let url = format!("{}{path}", self.config.base_url);
        let mut request = self.http_client.get(&url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            warn!("User directory unreachable at {url}: {e}");
            AppError::service_unavailable("User directory").with_source(e)
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(AppError::external_service(
                "User directory",
                format!(
                    "HTTP {}: {}",
                    response.status(),
                    response.text().await.unwrap_or_default()
                ),
            ));
        }

        let value = response.json().await.map_err(|e| {
            AppError::external_service("User directory", format!("JSON parse error: {e}"))
        })?;

        Ok(Some(value))
    }
}

#[async_trait]
impl UserDirectory for UsersClient {
    async fn resolve_tutor_id(&self, token: &str) -> AppResult<String> {
        let user = self
            .get_json("/v1/auth/me", Some(token))
            .await?
            .ok_or_else(|| AppError::auth_invalid("Credential does not resolve to a user"))?;

        let user_id = extract_id(&user)
            .ok_or_else(|| AppError::auth_invalid("User record carries no identifier"))?;

        debug!("Resolved user {user_id} from credential");

        let tutor = self
            .get_json(&format!("/v1/tutors/by-user/{user_id}"), Some(token))
            .await?
            .ok_or_else(|| {
                AppError::auth_invalid("Authenticated user has no tutor profile")
            })?;

        extract_id(&tutor)
            .ok_or_else(|| AppError::auth_invalid("Tutor record carries no identifier"))
    }

    async fn get_tutor_profile(
        &self,
        tutor_id: &str,
        token: Option<&str>,
    ) -> AppResult<Option<TutorProfile>> {
        let Some(value) = self
            .get_json(&format!("/v1/tutors/{tutor_id}"), token)
            .await?
        else {
            return Ok(None);
        };

        Ok(Some(profile_from_value(tutor_id, &value)))
    }
}

/// Extract an identifier under either of the upstream's key spellings
fn extract_id(value: &Value) -> Option<String> {
    value
        .get("id")
        .or_else(|| value.get("_id"))
        .and_then(|id| match id {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Normalize a raw directory payload into a [`TutorProfile`]
fn profile_from_value(tutor_id: &str, value: &Value) -> TutorProfile {
    TutorProfile {
        id: extract_id(value).unwrap_or_else(|| tutor_id.to_string()),
        user_id: value
            .get("userId")
            .or_else(|| value.get("user_id"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        full_name: value
            .get("fullName")
            .or_else(|| value.get("full_name"))
            .or_else(|| value.get("name"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        verified: value
            .get("verified")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

/// Mock user directory for tests (no network)
#[derive(Default)]
pub struct MockUserDirectory {
    tokens: RwLock<HashMap<String, String>>,
    profiles: RwLock<HashMap<String, TutorProfile>>,
    unavailable: RwLock<bool>,
}

impl MockUserDirectory {
    /// Create an empty mock directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a credential resolving to a tutor id
    pub async fn register_token(&self, token: &str, tutor_id: &str) {
        self.tokens
            .write()
            .await
            .insert(token.to_string(), tutor_id.to_string());
        self.profiles.write().await.insert(
            tutor_id.to_string(),
            TutorProfile {
                id: tutor_id.to_string(),
                user_id: None,
                full_name: None,
                verified: true,
            },
        );
    }

    /// Register a bare tutor profile without a credential
    pub async fn register_profile(&self, profile: TutorProfile) {
        self.profiles
            .write()
            .await
            .insert(profile.id.clone(), profile);
    }

    /// Simulate the directory being unreachable
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }
}

#[async_trait]
impl UserDirectory for MockUserDirectory {
    async fn resolve_tutor_id(&self, token: &str) -> AppResult<String> {
        if *self.unavailable.read().await {
            return Err(AppError::service_unavailable("User directory"));
        }
        self.tokens
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or_else(|| AppError::auth_invalid("Authenticated user has no tutor profile"))
    }

    async fn get_tutor_profile(
        &self,
        tutor_id: &str,
        _token: Option<&str>,
    ) -> AppResult<Option<TutorProfile>> {
        if *self.unavailable.read().await {
            return Err(AppError::service_unavailable("User directory"));
        }
        Ok(self.profiles.read().await.get(tutor_id).cloned())
    }
}
