//! Wire formats exchanged with Lambda mailboxes.
//!
//! Outbound envelopes (broker → Lambda) are a fixed shape. Inbound
//! envelopes (Lambda → broker) are deliberately *not* modeled as one
//! strict struct: `send`/`forward`/`subject` are mutually exclusive in
//! different ways, and a malformed `send` array element must only fail
//! that element rather than the whole envelope. [`parse_out_message`]
//! validates one such target in isolation; the decision tree that walks
//! a full Lambda return body lives in [`crate::mailbox`].

use serde::Serialize;
use serde_json::Value;

use crate::address::Address;

/// The envelope dispatched to a Lambda invocation.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEnvelope {
    pub subject: String,
    pub from: Address,
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// One send/forward target named by a Lambda return body: `{to, subject, body?}`.
#[derive(Debug, Clone)]
pub struct OutMessage {
    pub to: String,
    pub subject: String,
    pub body: Option<Value>,
}

/// Validates a single `send`/`forward` target.
///
/// Returns `None` if `value` is not an object, or lacks a string `to` or
/// a string `subject` — the caller turns that into the
/// `{"body":"Invalid message"}` 400 reply.
pub fn parse_out_message(value: &Value) -> Option<OutMessage> {
    let object = value.as_object()?;
    let to = object.get("to")?.as_str()?.to_owned();
    let subject = object.get("subject")?.as_str()?.to_owned();
    let body = object.get("body").cloned();
    Some(OutMessage { to, subject, body })
}

/// The reply delivered back to an HTTP caller: `{"from":...,"subject":...,"body":?}`.
#[derive(Debug, Clone, Serialize)]
pub struct HttpReplyBody {
    pub from: Address,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outbound_envelope_omits_null_body() {
        let envelope = OutboundEnvelope {
            subject: "greet".into(),
            from: Address::http_connection(1),
            address: Address::from_parts("echo", "42").unwrap(),
            body: None,
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert!(value.get("body").is_none());
    }

    #[test]
    fn outbound_envelope_includes_present_body() {
        let envelope = OutboundEnvelope {
            subject: "greet".into(),
            from: Address::http_connection(1),
            address: Address::from_parts("echo", "42").unwrap(),
            body: Some(json!("hi")),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["body"], json!("hi"));
    }

    #[test]
    fn valid_out_message_parses() {
        let value = json!({"to": "worker/9", "subject": "task", "body": {}});
        let parsed = parse_out_message(&value).unwrap();
        assert_eq!(parsed.to, "worker/9");
        assert_eq!(parsed.subject, "task");
    }

    #[test]
    fn out_message_missing_subject_is_rejected() {
        let value = json!({"to": "worker/9"});
        assert!(parse_out_message(&value).is_none());
    }

    #[test]
    fn out_message_must_be_object() {
        let value = json!("worker/9");
        assert!(parse_out_message(&value).is_none());
    }
}
