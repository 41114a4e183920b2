// ABOUTME: Payments/subscription service client for plan entitlement lookup
// ABOUTME: Normalizes heterogeneous upstream payloads into typed subscriptions and plans
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ensenia

//! Payments / Subscription Client
//!
//! Client for the payments service consumed by the quota guard: lists the
//! caller's subscriptions and resolves a plan's course-count entitlement.
//!
//! The upstream API has grown organically and answers with heterogeneous
//! shapes — status under `estado` or `status`, the plan reference under
//! `id_plan` or `plan_id` (bare id or embedded object), the entitlement
//! under `cantidadCursos`, `cantidad_cursos`, or `course_limit`, as int or
//! numeric string. All of that is normalized here, at the integration
//! boundary; the engine only ever sees typed values. An entitlement that
//! cannot be determined is a `ConfigError`, not a guess.

use crate::constants::limits;
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;

/// Payments client configuration
#[derive(Debug, Clone)]
pub struct PaymentsClientConfig {
    /// Base URL of the payments service, without trailing slash
    pub base_url: String,
    /// Total request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for PaymentsClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://payments-service:8002".to_string(),
            timeout_secs: limits::DEFAULT_EXTERNAL_TIMEOUT_SECS,
        }
    }
}

/// A normalized subscription record
#[derive(Debug, Clone)]
pub struct Subscription {
    /// Subscription identifier, when exposed
    pub id: Option<String>,
    /// Whether the subscription is currently active
    pub active: bool,
    /// Reference to the subscribed plan
    pub plan_id: Option<String>,
}

/// A normalized subscription plan
#[derive(Debug, Clone)]
pub struct Plan {
    /// Plan identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Courses a subscribed tutor may create
    pub course_limit: u32,
}

/// Seam for the subscription/plan lookup collaborator
#[async_trait]
pub trait SubscriptionCatalog: Send + Sync {
    /// List the caller's subscriptions
    async fn list_subscriptions(&self, token: &str) -> AppResult<Vec<Subscription>>;

    /// Fetch a plan and its course-count entitlement
    async fn get_plan(&self, token: &str, plan_id: &str) -> AppResult<Plan>;
}

/// HTTP client for the payments service
pub struct PaymentsClient {
    config: PaymentsClientConfig,
    http_client: reqwest::Client,
}

impl PaymentsClient {
    /// Create a new payments client
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the HTTP client cannot be constructed.
    pub fn new(config: PaymentsClientConfig) -> AppResult<Self> {
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

    async fn get(&self, path: &str, token: &str) -> AppResult<reqwest::Response> {
        let url = format!("{}{path}", self.config.base_url);
        self.http_client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                warn!("Payments service unreachable at {url}: {e}");
                AppError::service_unavailable("Payments service").with_source(e)
            })
    }
}

#[async_trait]
impl SubscriptionCatalog for PaymentsClient {
    async fn list_subscriptions(&self, token: &str) -> AppResult<Vec<Subscription>> {
        let response = self.get("/v1/subscriptions/mine", token).await?;

        if !response.status().is_success() {
            return Err(AppError::external_service(
                "Payments service",
                format!(
                    "HTTP {}: {}",
                    response.status(),
                    response.text().await.unwrap_or_default()
                ),
            ));
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::external_service("Payments service", format!("JSON parse error: {e}"))
        })?;

        let Value::Array(entries) = body else {
            return Ok(Vec::new());
        };

        Ok(entries.iter().map(subscription_from_value).collect())
    }

    async fn get_plan(&self, token: &str, plan_id: &str) -> AppResult<Plan> {
        // Some deployments route plans with a trailing slash; try both.
        for path in [format!("/v1/plans/{plan_id}"), format!("/v1/plans/{plan_id}/")] {
            let response = self.get(&path, token).await?;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                continue;
            }

            if !response.status().is_success() {
                return Err(AppError::external_service(
                    "Payments service",
                    format!(
                        "HTTP {}: {}",
                        response.status(),
                        response.text().await.unwrap_or_default()
                    ),
                ));
            }

            let body: Value = response.json().await.map_err(|e| {
                AppError::external_service("Payments service", format!("JSON parse error: {e}"))
            })?;

            return plan_from_value(plan_id, &body);
        }

        Err(AppError::not_found(format!("Plan {plan_id}")))
    }
}

/// Normalize a raw subscription payload
///
/// Accepts `estado`/`status` with the active spellings the upstream emits,
/// and a plan reference under `id_plan`/`plan_id` as either a bare id or an
/// embedded object.
pub(crate) fn subscription_from_value(value: &Value) -> Subscription {
    let status = value
        .get("estado")
        .or_else(|| value.get("status"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    Subscription {
        id: value
            .get("id")
            .or_else(|| value.get("_id"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        active: matches!(status.as_str(), "activa" | "activo" | "active"),
        plan_id: extract_plan_reference(value),
    }
}

/// Extract the plan reference from a subscription payload
fn extract_plan_reference(value: &Value) -> Option<String> {
    let reference = value.get("id_plan").or_else(|| value.get("plan_id"))?;
    match reference {
        Value::Object(map) => map
            .get("id")
            .or_else(|| map.get("_id"))
            .and_then(|id| match id {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Normalize a raw plan payload, resolving the course-count entitlement
///
/// # Errors
///
/// Returns `ConfigError` when the entitlement is missing, unparseable, or
/// non-positive.
pub(crate) fn plan_from_value(plan_id: &str, value: &Value) -> AppResult<Plan> {
    let raw_limit = value
        .get("cantidadCursos")
        .or_else(|| value.get("cantidad_cursos"))
        .or_else(|| value.get("course_limit"));

    let course_limit = match raw_limit {
        Some(Value::Number(n)) => n.as_i64(),
        // Legacy deployments deliver the entitlement as a string
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    let course_limit = course_limit
        .filter(|limit| *limit > 0)
        .and_then(|limit| u32::try_from(limit).ok())
        .ok_or_else(|| {
            AppError::config(format!(
                "Plan {plan_id} carries no usable course-count entitlement"
            ))
        })?;

    let name = value
        .get("nombre")
        .or_else(|| value.get("name"))
        .and_then(Value::as_str)
        .unwrap_or(plan_id)
        .to_string();

    Ok(Plan {
        id: plan_id.to_string(),
        name,
        course_limit,
    })
}

/// Mock subscription catalog for tests (no network)
#[derive(Default)]
pub struct MockSubscriptionCatalog {
    subscriptions: RwLock<HashMap<String, Vec<Subscription>>>,
    plans: RwLock<HashMap<String, Plan>>,
    unavailable: RwLock<bool>,
}

impl MockSubscriptionCatalog {
    /// Create an empty mock catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the subscriptions returned for a credential
    pub async fn register_subscriptions(&self, token: &str, subscriptions: Vec<Subscription>) {
        self.subscriptions
            .write()
            .await
            .insert(token.to_string(), subscriptions);
    }

    /// Register a plan
    pub async fn register_plan(&self, plan: Plan) {
        self.plans.write().await.insert(plan.id.clone(), plan);
    }

    /// Simulate the payments service being unreachable
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }
}

#[async_trait]
impl SubscriptionCatalog for MockSubscriptionCatalog {
    async fn list_subscriptions(&self, token: &str) -> AppResult<Vec<Subscription>> {
        if *self.unavailable.read().await {
            return Err(AppError::service_unavailable("Payments service"));
        }
        Ok(self
            .subscriptions
            .read()
            .await
            .get(token)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_plan(&self, _token: &str, plan_id: &str) -> AppResult<Plan> {
        if *self.unavailable.read().await {
            return Err(AppError::service_unavailable("Payments service"));
        }
        self.plans
            .read()
            .await
            .get(plan_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Plan {plan_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_subscription_status_spellings() {
        for status in ["activa", "activo", "active", "ACTIVA"] {
            let sub = subscription_from_value(&json!({ "estado": status }));
            assert!(sub.active, "{status} should be active");
        }
        for status in ["cancelada", "expired", ""] {
            let sub = subscription_from_value(&json!({ "estado": status }));
            assert!(!sub.active, "{status} should be inactive");
        }

        // Legacy key name
        let sub = subscription_from_value(&json!({ "status": "active" }));
        assert!(sub.active);
    }

    #[test]
    fn test_plan_reference_shapes() {
        let bare = subscription_from_value(&json!({ "id_plan": "plan-1" }));
        assert_eq!(bare.plan_id.as_deref(), Some("plan-1"));

        let legacy = subscription_from_value(&json!({ "plan_id": "plan-2" }));
        assert_eq!(legacy.plan_id.as_deref(), Some("plan-2"));

        let embedded = subscription_from_value(&json!({ "id_plan": { "_id": "plan-3" } }));
        assert_eq!(embedded.plan_id.as_deref(), Some("plan-3"));

        let numeric = subscription_from_value(&json!({ "id_plan": 7 }));
        assert_eq!(numeric.plan_id.as_deref(), Some("7"));

        let missing = subscription_from_value(&json!({}));
        assert_eq!(missing.plan_id, None);
    }

    #[test]
    fn test_plan_entitlement_normalization() {
        let plan = plan_from_value("plan-1", &json!({ "nombre": "Pro", "cantidadCursos": 10 }))
            .unwrap();
        assert_eq!(plan.course_limit, 10);
        assert_eq!(plan.name, "Pro");

        // Entitlement delivered as a string
        let plan =
            plan_from_value("plan-1", &json!({ "cantidadCursos": "5" })).unwrap();
        assert_eq!(plan.course_limit, 5);

        // Legacy key name
        let plan =
            plan_from_value("plan-1", &json!({ "cantidad_cursos": 4 })).unwrap();
        assert_eq!(plan.course_limit, 4);
    }

    #[test]
    fn test_plan_entitlement_failures() {
        for body in [
            json!({}),
            json!({ "cantidadCursos": 0 }),
            json!({ "cantidadCursos": -3 }),
            json!({ "cantidadCursos": "plenty" }),
        ] {
            let err = plan_from_value("plan-1", &body).unwrap_err();
            assert_eq!(err.code, ErrorCode::ConfigError, "body: {body}");
        }
    }

    #[tokio::test]
    async fn test_mock_catalog() {
        let catalog = MockSubscriptionCatalog::new();
        catalog
            .register_subscriptions(
                "token-1",
                vec![Subscription {
                    id: Some("sub-1".to_owned()),
                    active: true,
                    plan_id: Some("plan-1".to_owned()),
                }],
            )
            .await;
        catalog
            .register_plan(Plan {
                id: "plan-1".to_owned(),
                name: "Pro".to_owned(),
                course_limit: 10,
            })
            .await;

        let subs = catalog.list_subscriptions("token-1").await.unwrap();
        assert_eq!(subs.len(), 1);
        assert!(subs[0].active);

        let plan = catalog.get_plan("token-1", "plan-1").await.unwrap();
        assert_eq!(plan.course_limit, 10);

        catalog.set_unavailable(true).await;
        let err = catalog.list_subscriptions("token-1").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ServiceUnavailable);
    }
}
