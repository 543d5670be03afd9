//! Authorization Backend Wire Protocol
//!
//! Newline-delimited JSON exchanged with the authorization backend.
//!
//! Uses Sans-IO pattern: encoding/decoding is separated from I/O for testability.
//!
//! ```text
//! -> {"id":7,"type":"authenticated","token":"abc"}
//! <- {"id":7,"success":true,"userId":"u1"}
//! <- {"type":"connected"}                          (unsolicited welcome)
//! ```

use serde::{Deserialize, Serialize};

/// RPC selector carried in the `type` field of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Verify a bearer token and resolve the user id
    Authenticated,
    /// Check whether the token's user holds an active subscription
    Subscriber,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authenticated => "authenticated",
            Self::Subscriber => "subscriber",
        }
    }
}

#[derive(Serialize)]
struct RequestFrame<'a> {
    id: u64,
    #[serde(rename = "type")]
    kind: RequestKind,
    token: &'a str,
}

/// Raw inbound object before classification.
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    id: Option<u64>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(rename = "userId", default)]
    user_id: Option<String>,
    #[serde(rename = "isSubscriber", default)]
    is_subscriber: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

/// Untyped RPC response payload.
///
/// Interpreted per request kind by [`ResponseBody::into_auth_reply`] and
/// [`ResponseBody::into_subscription_reply`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseBody {
    pub success: bool,
    pub user_id: Option<String>,
    pub is_subscriber: Option<bool>,
    pub error: Option<String>,
}

/// Outcome of a verify-authentication exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthReply {
    Authenticated { user_id: String },
    Rejected { reason: String },
}

/// Outcome of a check-subscription exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionReply {
    Checked { is_subscriber: bool },
    Rejected { reason: String },
}

impl ResponseBody {
    /// A success needs a non-empty user id, anything else is a rejection.
    pub fn into_auth_reply(self) -> AuthReply {
        match self.user_id {
            Some(user_id) if self.success && !user_id.is_empty() => {
                AuthReply::Authenticated { user_id }
            }
            _ => AuthReply::Rejected {
                reason: self
                    .error
                    .unwrap_or_else(|| "Authentication failed".to_string()),
            },
        }
    }

    /// A success needs a boolean `isSubscriber`, anything else is a rejection.
    pub fn into_subscription_reply(self) -> SubscriptionReply {
        match self.is_subscriber {
            Some(is_subscriber) if self.success => SubscriptionReply::Checked { is_subscriber },
            _ => SubscriptionReply::Rejected {
                reason: self
                    .error
                    .unwrap_or_else(|| "Subscription check failed".to_string()),
            },
        }
    }
}

/// A classified inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// `{"type":"connected"}` sent by the backend after accept
    Welcome,
    /// Any other unsolicited typed message
    Notice(String),
    /// Reply to a request. `id` is absent when the backend does not echo ids.
    Response { id: Option<u64>, body: ResponseBody },
    /// Not a JSON object
    Malformed(String),
}

/// Encode a request as a single newline-terminated line.
pub fn encode_request(id: u64, kind: RequestKind, token: &str) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(&RequestFrame { id, kind, token })?;
    line.push('\n');
    Ok(line)
}

/// Classify one inbound line.
///
/// An object with a `type` field and no `success` field is unsolicited.
/// Every other object is a response; a missing `success` reads as `false`.
pub fn decode_frame(line: &str) -> InboundFrame {
    let line = line.trim();
    let raw: RawFrame = match serde_json::from_str(line) {
        Ok(raw) => raw,
        Err(e) => return InboundFrame::Malformed(e.to_string()),
    };

    if raw.success.is_none() {
        if let Some(kind) = raw.kind {
            return if kind == "connected" {
                InboundFrame::Welcome
            } else {
                InboundFrame::Notice(kind)
            };
        }
    }

    InboundFrame::Response {
        id: raw.id,
        body: ResponseBody {
            success: raw.success.unwrap_or(false),
            user_id: raw.user_id,
            is_subscriber: raw.is_subscriber,
            error: raw.error,
        },
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    // ===== Encoding Tests =====

    #[test]
    fn test_encode_authenticated_request() {
        let line = encode_request(1, RequestKind::Authenticated, "abc").unwrap();
        assert!(line.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"id": 1, "type": "authenticated", "token": "abc"})
        );
    }

    #[test]
    fn test_encode_subscriber_request() {
        let line = encode_request(42, RequestKind::Subscriber, "tok").unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["type"], "subscriber");
        assert_eq!(value["id"], 42);
    }

    #[test]
    fn test_encode_escapes_token() {
        let line = encode_request(1, RequestKind::Authenticated, "a\"b\nc").unwrap();
        // Exactly one line terminator, at the end
        assert_eq!(line.matches('\n').count(), 1);
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["token"], "a\"b\nc");
    }

    // ===== Decoding Tests =====

    #[test]
    fn test_decode_welcome() {
        assert_eq!(decode_frame(r#"{"type":"connected"}"#), InboundFrame::Welcome);
        assert_eq!(decode_frame("  {\"type\":\"connected\"}\r\n"), InboundFrame::Welcome);
    }

    #[test]
    fn test_decode_notice() {
        assert_eq!(
            decode_frame(r#"{"type":"maintenance"}"#),
            InboundFrame::Notice("maintenance".to_string())
        );
    }

    #[test]
    fn test_decode_auth_success_without_id() {
        let frame = decode_frame(r#"{"success":true,"userId":"u1"}"#);
        match frame {
            InboundFrame::Response { id, body } => {
                assert_eq!(id, None);
                assert_eq!(
                    body.into_auth_reply(),
                    AuthReply::Authenticated { user_id: "u1".to_string() }
                );
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_decode_response_with_id() {
        let frame = decode_frame(r#"{"id":9,"success":true,"isSubscriber":false}"#);
        match frame {
            InboundFrame::Response { id, body } => {
                assert_eq!(id, Some(9));
                assert_eq!(
                    body.into_subscription_reply(),
                    SubscriptionReply::Checked { is_subscriber: false }
                );
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_decode_typed_response_is_not_unsolicited() {
        // A response that also echoes the request type is still a response
        let frame = decode_frame(r#"{"type":"authenticated","success":false,"error":"expired"}"#);
        assert!(matches!(frame, InboundFrame::Response { .. }));
    }

    #[test]
    fn test_decode_object_without_success_is_failed_response() {
        let frame = decode_frame(r#"{"userId":"u1"}"#);
        match frame {
            InboundFrame::Response { body, .. } => {
                assert!(!body.success);
                assert_eq!(
                    body.into_auth_reply(),
                    AuthReply::Rejected { reason: "Authentication failed".to_string() }
                );
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(decode_frame("not json"), InboundFrame::Malformed(_)));
        assert!(matches!(decode_frame("42"), InboundFrame::Malformed(_)));
        assert!(matches!(decode_frame(""), InboundFrame::Malformed(_)));
    }

    // ===== Reply Normalization Tests =====

    #[test]
    fn test_auth_reply_rejected_carries_backend_error() {
        let body = ResponseBody {
            success: false,
            error: Some("Token expired".to_string()),
            ..Default::default()
        };
        assert_eq!(
            body.into_auth_reply(),
            AuthReply::Rejected { reason: "Token expired".to_string() }
        );
    }

    #[test]
    fn test_auth_reply_success_without_user_id_is_rejected() {
        let body = ResponseBody { success: true, ..Default::default() };
        assert_eq!(
            body.into_auth_reply(),
            AuthReply::Rejected { reason: "Authentication failed".to_string() }
        );
    }

    #[test]
    fn test_auth_reply_empty_user_id_is_rejected() {
        let body = ResponseBody {
            success: true,
            user_id: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(body.into_auth_reply(), AuthReply::Rejected { .. }));
    }

    #[test]
    fn test_subscription_reply_without_flag_is_rejected() {
        let body = ResponseBody { success: true, ..Default::default() };
        assert_eq!(
            body.into_subscription_reply(),
            SubscriptionReply::Rejected { reason: "Subscription check failed".to_string() }
        );
    }

    #[test]
    fn test_subscription_reply_failure_with_error() {
        let body = ResponseBody {
            success: false,
            is_subscriber: Some(true),
            error: Some("user not found".to_string()),
            ..Default::default()
        };
        assert_eq!(
            body.into_subscription_reply(),
            SubscriptionReply::Rejected { reason: "user not found".to_string() }
        );
    }

    #[test]
    fn test_request_kind_as_str() {
        assert_eq!(RequestKind::Authenticated.as_str(), "authenticated");
        assert_eq!(RequestKind::Subscriber.as_str(), "subscriber");
    }
}
