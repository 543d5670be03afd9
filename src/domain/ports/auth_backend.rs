//! Authorization Backend Port
//!
//! Defines the interface for verifying bearer tokens and subscription status.
//! The production implementation talks to a remote process over a raw socket.

use crate::domain::protocol::{AuthReply, SubscriptionReply};
use async_trait::async_trait;

/// Transport-level failure of an RPC.
///
/// Backend-reported failures are not errors: they come back as
/// [`AuthReply::Rejected`] / [`SubscriptionReply::Rejected`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthBackendError {
    #[error("not connected")]
    NotConnected,
    #[error("response timeout")]
    Timeout,
    #[error("connection closed")]
    ConnectionClosed,
    #[error("invalid response format")]
    InvalidResponse,
    #[error("failed to encode request: {0}")]
    Encode(String),
}

/// Remote authority for tokens and subscriptions.
///
/// This is an outbound port. The access gate calls it without knowing
/// how (or whether) the backend is reached over the network.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Verify a bearer token and resolve the owning user id.
    async fn verify_authentication(&self, token: &str) -> Result<AuthReply, AuthBackendError>;

    /// Check whether the token's user holds an active subscription.
    async fn check_subscription(&self, token: &str)
        -> Result<SubscriptionReply, AuthBackendError>;
}
