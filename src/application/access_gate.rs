//! Access Gate - Authentication and subscription guards
//!
//! Two guards share one contract: inspect a request context and either let
//! it through (possibly enriching it) or deny it with a typed error. Routes
//! compose them in order with a [`GuardChain`]; premium routes always run
//! authentication before the subscription check.

use crate::domain::entities::Identity;
use crate::domain::ports::AuthBackend;
use crate::domain::protocol::{AuthReply, SubscriptionReply};
use crate::domain::value_objects::BearerToken;
use async_trait::async_trait;
use std::sync::Arc;

/// Per-request state the guards read and enrich.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Raw `Authorization` header value, if present
    pub authorization: Option<String>,
    /// Attached by [`AuthGuard`]
    pub identity: Option<Identity>,
}

impl RequestContext {
    pub fn new(authorization: Option<String>) -> Self {
        Self {
            authorization,
            identity: None,
        }
    }
}

/// Why a request was denied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// Missing or malformed credentials (401)
    #[error("{0}")]
    AuthenticationRequired(String),
    /// The backend refused the token (401)
    #[error("Authentication failed: {0}")]
    AuthenticationRejected(String),
    /// The backend could not be reached (401)
    #[error("{0}")]
    ServiceUnavailable(String),
    /// Authenticated but not allowed (403)
    #[error("{0}")]
    AccessDenied(String),
}

impl GateError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::AccessDenied(_) => 403,
            _ => 401,
        }
    }

    /// HTTP reason phrase for the status.
    pub fn error_name(&self) -> &'static str {
        match self {
            Self::AccessDenied(_) => "Forbidden",
            _ => "Unauthorized",
        }
    }
}

/// "Can this request proceed" contract.
#[async_trait]
pub trait Guard: Send + Sync {
    async fn check(&self, ctx: &mut RequestContext) -> Result<(), GateError>;
}

/// Verifies the bearer token and attaches the caller's identity.
pub struct AuthGuard {
    backend: Arc<dyn AuthBackend>,
}

impl AuthGuard {
    pub fn new(backend: Arc<dyn AuthBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Guard for AuthGuard {
    async fn check(&self, ctx: &mut RequestContext) -> Result<(), GateError> {
        let Some(header) = ctx.authorization.as_deref() else {
            tracing::warn!("no authorization header provided");
            return Err(GateError::AuthenticationRequired(
                "Authorization header is required".to_string(),
            ));
        };

        let Some(token) = BearerToken::from_header(header) else {
            tracing::warn!("invalid authorization header format");
            return Err(GateError::AuthenticationRequired(
                "Invalid authorization header format".to_string(),
            ));
        };

        match self.backend.verify_authentication(token.as_str()).await {
            Ok(AuthReply::Authenticated { user_id }) => {
                tracing::debug!("user authenticated: {}", user_id);
                ctx.identity = Some(Identity::authenticated(user_id, token.into_inner()));
                Ok(())
            }
            Ok(AuthReply::Rejected { reason }) => {
                tracing::warn!("authentication failed: {}", reason);
                Err(GateError::AuthenticationRejected(reason))
            }
            Err(e) => {
                tracing::error!("authentication service error: {}", e);
                Err(GateError::ServiceUnavailable(
                    "Authentication service unavailable".to_string(),
                ))
            }
        }
    }
}

/// Requires an active subscription. Must run after [`AuthGuard`].
pub struct SubscriberGuard {
    backend: Arc<dyn AuthBackend>,
}

impl SubscriberGuard {
    pub fn new(backend: Arc<dyn AuthBackend>) -> Self {
        Self { backend }
    }
}

fn denied(message: &str) -> GateError {
    GateError::AccessDenied(message.to_string())
}

#[async_trait]
impl Guard for SubscriberGuard {
    async fn check(&self, ctx: &mut RequestContext) -> Result<(), GateError> {
        let Some(header) = ctx.authorization.as_deref() else {
            tracing::warn!("no authorization header provided for subscription check");
            return Err(denied("Authorization header is required"));
        };

        let Some(token) = BearerToken::from_header(header) else {
            tracing::warn!("invalid authorization header format for subscription check");
            return Err(denied("Invalid authorization header format"));
        };

        if ctx.identity.is_none() {
            tracing::error!("subscription check ran without an authenticated identity");
            return Err(denied("Authentication is required before subscription check"));
        }

        match self.backend.check_subscription(token.as_str()).await {
            Ok(SubscriptionReply::Checked { is_subscriber: true }) => {
                ctx.identity = ctx.identity.take().map(Identity::with_subscription);
                tracing::debug!("subscription verified");
                Ok(())
            }
            Ok(SubscriptionReply::Checked { is_subscriber: false }) => {
                tracing::warn!("user is not a subscriber");
                Err(denied("Premium content requires an active subscription"))
            }
            Ok(SubscriptionReply::Rejected { reason }) => {
                tracing::warn!("subscription check failed: {}", reason);
                Err(GateError::AccessDenied(format!(
                    "Subscription check failed: {}",
                    reason
                )))
            }
            Err(e) => {
                tracing::error!("subscription service error: {}", e);
                Err(denied("Subscription verification service unavailable"))
            }
        }
    }
}

/// Ordered guards; the first denial stops the chain.
#[derive(Clone, Default)]
pub struct GuardChain {
    guards: Vec<Arc<dyn Guard>>,
}

impl GuardChain {
    pub fn new(guards: Vec<Arc<dyn Guard>>) -> Self {
        Self { guards }
    }

    /// Authentication only.
    pub fn authenticated(backend: Arc<dyn AuthBackend>) -> Self {
        Self::new(vec![Arc::new(AuthGuard::new(backend))])
    }

    /// Authentication, then subscription.
    pub fn subscriber(backend: Arc<dyn AuthBackend>) -> Self {
        Self::new(vec![
            Arc::new(AuthGuard::new(backend.clone())),
            Arc::new(SubscriberGuard::new(backend)),
        ])
    }

    pub async fn run(&self, ctx: &mut RequestContext) -> Result<(), GateError> {
        for guard in &self.guards {
            guard.check(ctx).await?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}
