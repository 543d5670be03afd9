//! Domain Entities - Core business objects
//!
//! These entities represent the core concepts of the gateway domain.
//! They have no I/O dependencies and contain only business logic.

use serde::{Deserialize, Serialize};

/// Resolved caller identity attached to a request by the access gate.
///
/// Created only after a successful authentication exchange. The subscriber
/// flag stays absent until a separate subscription exchange succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// User identifier returned by the authorization backend
    pub id: String,
    /// Duplicate of `id`, kept for clients that read `uid`
    pub uid: String,
    /// Raw bearer token the identity was resolved from
    pub token: String,
    /// Set to `Some(true)` once the subscription check passes
    #[serde(rename = "isSubscriber", skip_serializing_if = "Option::is_none", default)]
    pub is_subscriber: Option<bool>,
}

impl Identity {
    /// Create an identity for an authenticated user.
    pub fn authenticated(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        let id = user_id.into();
        Self {
            uid: id.clone(),
            id,
            token: token.into(),
            is_subscriber: None,
        }
    }

    /// Merge the subscriber flag without touching the other fields.
    pub fn with_subscription(mut self) -> Self {
        self.is_subscriber = Some(true);
        self
    }

    /// Whether a subscription check has confirmed this identity.
    pub fn is_subscriber(&self) -> bool {
        self.is_subscriber == Some(true)
    }
}

/// A named, time-boxed snapshot of a computed value.
///
/// Expiration is stored as unix milliseconds so the entry survives a round
/// trip through an external store unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Stored value
    pub value: serde_json::Value,
    /// Expiration timestamp (unix ms)
    pub expires_at_ms: u64,
}

impl CacheEntry {
    /// Create an entry that expires `ttl_ms` after `now_ms`.
    pub fn new(value: serde_json::Value, now_ms: u64, ttl_ms: u64) -> Self {
        Self {
            value,
            expires_at_ms: now_ms.saturating_add(ttl_ms),
        }
    }

    /// An entry is fresh strictly before its expiration timestamp.
    pub fn is_fresh(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at_ms
    }

    /// Milliseconds left before expiry (zero once expired).
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at_ms.saturating_sub(now_ms)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    // ===== Identity Tests =====

    #[test]
    fn test_identity_authenticated_duplicates_uid() {
        let identity = Identity::authenticated("u1", "abc");
        assert_eq!(identity.id, "u1");
        assert_eq!(identity.uid, "u1");
        assert_eq!(identity.token, "abc");
        assert_eq!(identity.is_subscriber, None);
        assert!(!identity.is_subscriber());
    }

    #[test]
    fn test_identity_with_subscription_keeps_fields() {
        let identity = Identity::authenticated("u1", "abc").with_subscription();
        assert_eq!(identity.id, "u1");
        assert_eq!(identity.uid, "u1");
        assert_eq!(identity.token, "abc");
        assert!(identity.is_subscriber());
    }

    #[test]
    fn test_identity_serializes_without_subscriber_flag() {
        let identity = Identity::authenticated("u1", "abc");
        let value = serde_json::to_value(&identity).unwrap();
        assert_eq!(value, json!({"id": "u1", "uid": "u1", "token": "abc"}));
    }

    #[test]
    fn test_identity_serializes_subscriber_flag() {
        let identity = Identity::authenticated("u1", "abc").with_subscription();
        let value = serde_json::to_value(&identity).unwrap();
        assert_eq!(value["isSubscriber"], json!(true));
    }

    // ===== CacheEntry Tests =====

    #[test]
    fn test_cache_entry_freshness_boundary() {
        let entry = CacheEntry::new(json!({"page": 1}), 1_000, 60_000);
        assert_eq!(entry.expires_at_ms, 61_000);
        assert!(entry.is_fresh(1_000));
        assert!(entry.is_fresh(60_999));
        assert!(!entry.is_fresh(61_000));
        assert!(!entry.is_fresh(62_000));
    }

    #[test]
    fn test_cache_entry_remaining() {
        let entry = CacheEntry::new(json!(null), 0, 500);
        assert_eq!(entry.remaining_ms(100), 400);
        assert_eq!(entry.remaining_ms(900), 0);
    }

    #[test]
    fn test_cache_entry_saturates() {
        let entry = CacheEntry::new(json!(1), u64::MAX - 1, 10);
        assert_eq!(entry.expires_at_ms, u64::MAX);
    }
}
