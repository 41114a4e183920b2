// ABOUTME: Course-creation quota guard gating tutors against subscription entitlements
// ABOUTME: Fail-open/fail-closed behavior on payments outage is first-class configuration

use crate::config::environment::QuotaConfig;
use crate::database::Database;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::external::{SubscriptionCatalog, UserDirectory};
use std::sync::Arc;
use tracing::{info, warn};

/// The resolved course-creation limit and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseLimit {
    /// No active subscription; the configured free-tier limit applies
    FreeTier(u32),
    /// Active subscription; the plan's entitlement applies
    Plan {
        /// Display name of the plan
        name: String,
        /// Courses the plan entitles the tutor to
        limit: u32,
    },
}

impl CourseLimit {
    /// The numeric limit
    #[must_use]
    pub const fn limit(&self) -> u32 {
        match self {
            Self::FreeTier(limit) | Self::Plan { limit, .. } => *limit,
        }
    }
}

/// Outcome of a successful quota check
#[derive(Debug, Clone)]
pub struct QuotaDecision {
    /// Tutor resolved from the caller's credential
    pub tutor_id: String,
    /// Courses the tutor already owns
    pub existing_courses: i64,
    /// The limit that was applied; `None` when the check was skipped under
    /// the fail-open policy
    pub limit: Option<CourseLimit>,
}

/// Gate limiting tutor course creation by subscription entitlement
///
/// Runs to completion before the course write: resolve the tutor, count
/// their courses, resolve the applicable limit, and allow or reject. When
/// the subscription service is unreachable the configured fail policy
/// decides between rejecting (`ServiceUnavailable`, the default) and
/// permitting creation unverified.
pub struct QuotaGuard {
    database: Arc<Database>,
    users: Arc<dyn UserDirectory>,
    subscriptions: Arc<dyn SubscriptionCatalog>,
    config: QuotaConfig,
}

impl QuotaGuard {
    /// Create a new quota guard
    #[must_use]
    pub fn new(
        database: Arc<Database>,
        users: Arc<dyn UserDirectory>,
        subscriptions: Arc<dyn SubscriptionCatalog>,
        config: QuotaConfig,
    ) -> Self {
        Self {
            database,
            users,
            subscriptions,
            config,
        }
    }

    /// Enforce the course-creation quota for the caller
    ///
    /// # Errors
    ///
    /// Returns `AuthRequired` for an empty credential, `QuotaExceeded`
    /// when the tutor is at their limit, `ServiceUnavailable` when the
    /// subscription lookup fails under the fail-closed policy, and
    /// `ConfigError` when an active plan carries no usable entitlement.
    pub async fn enforce(&self, token: &str) -> AppResult<QuotaDecision> {
        if token.trim().is_empty() {
            return Err(AppError::auth_required());
        }

        let tutor_id = self.users.resolve_tutor_id(token).await?;

        let existing_courses = self.database.count_courses_for_tutor(&tutor_id).await?;

        let limit = match self.resolve_limit(token).await {
            Ok(limit) => limit,
            Err(e)
                if matches!(
                    e.code,
                    ErrorCode::ServiceUnavailable | ErrorCode::ExternalServiceError
                ) =>
            {
                warn!(tutor_id = %tutor_id, "Could not validate course limit: {e}");

                if self.config.fail_open {
                    // Degraded mode: creation proceeds without a verified limit.
                    warn!(tutor_id = %tutor_id, "Quota check skipped (fail-open)");
                    return Ok(QuotaDecision {
                        tutor_id,
                        existing_courses,
                        limit: None,
                    });
                }

                return Err(AppError::new(
                    ErrorCode::ServiceUnavailable,
                    "Your plan could not be validated right now. Please try again.",
                )
                .with_actor_id(tutor_id));
            }
            Err(e) => return Err(e),
        };

        if existing_courses >= i64::from(limit.limit()) {
            let message = match &limit {
                CourseLimit::FreeTier(limit) => format!(
                    "You have reached the limit of {limit} free courses. \
                     Subscribe to a plan to create more."
                ),
                CourseLimit::Plan { name, limit } => format!(
                    "You have reached the limit of {limit} courses allowed by your plan '{name}'."
                ),
            };
            return Err(AppError::quota_exceeded(message)
                .with_actor_id(tutor_id)
                .with_details(serde_json::json!({
                    "limit": limit.limit(),
                    "origin": match &limit {
                        CourseLimit::FreeTier(_) => "free",
                        CourseLimit::Plan { .. } => "plan",
                    },
                })));
        }

        info!(
            tutor_id = %tutor_id,
            existing_courses,
            limit = limit.limit(),
            "Course quota check passed"
        );

        Ok(QuotaDecision {
            tutor_id,
            existing_courses,
            limit: Some(limit),
        })
    }

    /// Resolve the applicable course limit from the subscription catalog
    ///
    /// No active subscription yields the free-tier limit; an active one
    /// yields its plan's entitlement.
    async fn resolve_limit(&self, token: &str) -> AppResult<CourseLimit> {
        let subscriptions = self.subscriptions.list_subscriptions(token).await?;

        let Some(active) = subscriptions.iter().find(|sub| sub.active) else {
            return Ok(CourseLimit::FreeTier(self.config.free_course_limit));
        };

        let plan_id = active.plan_id.as_ref().ok_or_else(|| {
            AppError::config("Active subscription carries no plan reference")
        })?;

        let plan = self.subscriptions.get_plan(token, plan_id).await?;

        Ok(CourseLimit::Plan {
            name: plan.name,
            limit: plan.course_limit,
        })
    }
}
