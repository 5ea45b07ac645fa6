//! A single enqueued message and the decision tree that interprets its
//! Lambda response.

use serde_json::Value;

use crate::address::Address;
use crate::aws::{LambdaResponse, TransportError};
use crate::envelope::parse_out_message;

/// One message waiting for (or currently undergoing) dispatch.
#[derive(Debug, Clone)]
pub struct MailboxItem {
    pub from: Address,
    pub subject: String,
    pub body: Option<Value>,
}

/// What the server should do as a consequence of interpreting one
/// Lambda response. A [`Mailbox`](super::Mailbox) never calls back into
/// the server directly — it returns these, and the server (which owns
/// both the mailbox registry and the parked-connection table) performs them.
#[derive(Debug, Clone)]
pub enum RouteAction {
    /// `server.send(to, from, subject, body)` — routes to either a
    /// parked HTTP connection or another mailbox depending on `to`.
    Route {
        to: String,
        from: Address,
        subject: String,
        body: Option<Value>,
    },
    /// `server.send_error(to, status, body)` — only acted on if `to` is
    /// an HTTP synthetic address; otherwise the server drops it.
    RouteError {
        to: Address,
        status: u16,
        body: Vec<u8>,
    },
}

fn invalid_message_error(from: &Address) -> RouteAction {
    RouteAction::RouteError {
        to: from.clone(),
        status: 400,
        body: br#"{"body":"Invalid message"}"#.to_vec(),
    }
}

fn invalid_json_error(from: &Address) -> RouteAction {
    RouteAction::RouteError {
        to: from.clone(),
        status: 400,
        body: br#"{"body":"Invalid json"}"#.to_vec(),
    }
}

/// Interprets a Lambda invocation's outcome for the item that was
/// in-flight, producing zero or more [`RouteAction`]s.
///
/// Mirrors spec.md §4.3's 7-step response-interpretation tree.
pub fn interpret_response(
    item: &MailboxItem,
    self_address: &Address,
    outcome: Result<LambdaResponse, TransportError>,
) -> Vec<RouteAction> {
    let response = match outcome {
        Ok(response) => response,
        // Transport failure: the spec records this as a known limitation
        // (the mailbox stays BUSY); the server logs and moves on.
        Err(_) => return Vec::new(),
    };

    // Step 1: function error or non-2xx status forwards the body and
    // skips envelope interpretation entirely. Lambda's `Invoke` API
    // returns HTTP 200 even for an unhandled function error (only
    // `X-Amz-Function-Error` signals it); a 2xx status is clamped to 400
    // so the HTTP caller actually sees an error rather than a 200.
    if response.function_error || response.status >= 300 {
        let status = if response.function_error && response.status < 300 {
            400
        } else {
            response.status
        };
        return vec![RouteAction::RouteError {
            to: item.from.clone(),
            status,
            body: response.body.to_vec(),
        }];
    }

    // Step 2: parse body as JSON.
    let body: Value = match serde_json::from_slice(&response.body) {
        Ok(value) => value,
        Err(_) => return vec![invalid_json_error(&item.from)],
    };

    let Some(object) = body.as_object() else {
        return vec![invalid_json_error(&item.from)];
    };

    let mut actions = Vec::new();

    // Step 3: `send` — one or more fan-out targets. An invalid element
    // stops processing subsequent `send` items (but forward/reply below
    // are independent steps and still apply).
    if let Some(send) = object.get("send") {
        let targets: Vec<&Value> = match send {
            Value::Object(_) => vec![send],
            Value::Array(items) => items.iter().collect(),
            _ => {
                actions.push(invalid_message_error(&item.from));
                return actions;
            }
        };

        for target in targets {
            match parse_out_message(target) {
                Some(message) => actions.push(RouteAction::Route {
                    to: message.to,
                    from: self_address.clone(),
                    subject: message.subject,
                    body: message.body,
                }),
                None => {
                    actions.push(invalid_message_error(&item.from));
                    return actions;
                }
            }
        }
    }

    // Step 4: `forward` wins over an inline reply.
    if let Some(forward) = object.get("forward") {
        match parse_out_message(forward) {
            Some(message) => actions.push(RouteAction::Route {
                to: message.to,
                from: item.from.clone(),
                subject: message.subject,
                body: message.body,
            }),
            None => actions.push(invalid_message_error(&item.from)),
        }
        return actions;
    }

    // Step 5/6: inline reply, or `body` without `subject` is an error.
    match object.get("subject") {
        Some(Value::String(subject)) => actions.push(RouteAction::Route {
            to: item.from.to_string(),
            from: self_address.clone(),
            subject: subject.clone(),
            body: object.get("body").cloned(),
        }),
        Some(_) => actions.push(invalid_message_error(&item.from)),
        None if object.contains_key("body") => actions.push(invalid_message_error(&item.from)),
        None => {}
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok_response(body: Value) -> LambdaResponse {
        LambdaResponse {
            status: 200,
            function_error: false,
            body: serde_json::to_vec(&body).unwrap().into(),
        }
    }

    fn item() -> MailboxItem {
        MailboxItem {
            from: Address::http_connection(1),
            subject: "greet".into(),
            body: Some(json!("hi")),
        }
    }

    fn mailbox_address() -> Address {
        Address::from_parts("echo", "42").unwrap()
    }

    #[test]
    fn direct_reply_routes_to_originating_caller() {
        let actions = interpret_response(
            &item(),
            &mailbox_address(),
            Ok(ok_response(json!({"subject": "greeting", "body": "hi back"}))),
        );
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            RouteAction::Route { to, subject, body, .. } => {
                assert_eq!(to, "$http/1");
                assert_eq!(subject, "greeting");
                assert_eq!(body, &Some(json!("hi back")));
            }
            _ => panic!("expected a route action"),
        }
    }

    #[test]
    fn forward_wins_over_inline_reply() {
        let body = json!({
            "forward": {"to": "worker/9", "subject": "task", "body": {}},
            "subject": "ignored",
        });
        let actions = interpret_response(&item(), &mailbox_address(), Ok(ok_response(body)));
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            RouteAction::Route { to, from, subject, .. } => {
                assert_eq!(to, "worker/9");
                assert_eq!(from, &item().from);
                assert_eq!(subject, "task");
            }
            _ => panic!("expected a route action"),
        }
    }

    #[test]
    fn fan_out_send_produces_one_action_per_target() {
        let body = json!({"send": [
            {"to": "a/1", "subject": "s"},
            {"to": "b/2", "subject": "s"},
        ]});
        let actions = interpret_response(&item(), &mailbox_address(), Ok(ok_response(body)));
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn function_error_forwards_status_and_body_verbatim() {
        let response = LambdaResponse {
            status: 500,
            function_error: true,
            body: br#"{"errorMessage":"boom"}"#.to_vec().into(),
        };
        let actions = interpret_response(&item(), &mailbox_address(), Ok(response));
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            RouteAction::RouteError { to, status, body } => {
                assert_eq!(to, &item().from);
                assert_eq!(*status, 500);
                assert_eq!(body, br#"{"errorMessage":"boom"}"#);
            }
            _ => panic!("expected a route error"),
        }
    }

    #[test]
    fn function_error_on_200_status_is_clamped_to_400() {
        let response = LambdaResponse {
            status: 200,
            function_error: true,
            body: br#"{"errorMessage":"boom"}"#.to_vec().into(),
        };
        let actions = interpret_response(&item(), &mailbox_address(), Ok(response));
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            RouteAction::RouteError { status, body, .. } => {
                assert_eq!(*status, 400);
                assert_eq!(body, br#"{"errorMessage":"boom"}"#);
            }
            _ => panic!("expected a route error"),
        }
    }

    #[test]
    fn malformed_body_is_invalid_json() {
        let response = LambdaResponse {
            status: 200,
            function_error: false,
            body: b"not json".to_vec().into(),
        };
        let actions = interpret_response(&item(), &mailbox_address(), Ok(response));
        match &actions[0] {
            RouteAction::RouteError { body, .. } => {
                assert_eq!(body, br#"{"body":"Invalid json"}"#);
            }
            _ => panic!("expected a route error"),
        }
    }

    #[test]
    fn body_without_subject_is_invalid_message() {
        let actions = interpret_response(&item(), &mailbox_address(), Ok(ok_response(json!({"body": "x"}))));
        match &actions[0] {
            RouteAction::RouteError { body, .. } => {
                assert_eq!(body, br#"{"body":"Invalid message"}"#);
            }
            _ => panic!("expected a route error"),
        }
    }

    #[test]
    fn empty_object_reply_produces_no_action() {
        let actions = interpret_response(&item(), &mailbox_address(), Ok(ok_response(json!({}))));
        assert!(actions.is_empty());
    }

    #[test]
    fn invalid_send_element_stops_processing_and_errors() {
        let body = json!({"send": [{"to": "a/1"}, {"to": "b/2", "subject": "s"}]});
        let actions = interpret_response(&item(), &mailbox_address(), Ok(ok_response(body)));
        assert_eq!(actions.len(), 1);
        matches!(actions[0], RouteAction::RouteError { .. });
    }
}
