//! Per-address FIFO mailbox: one outstanding Lambda invocation at a time.

pub mod item;

use std::collections::VecDeque;

use serde_json::Value;

pub use item::{interpret_response, MailboxItem, RouteAction};

use crate::address::Address;
use crate::aws::{LambdaResponse, TransportError};
use crate::envelope::OutboundEnvelope;

/// `IDLE` / `BUSY` per spec.md §4.3. `BUSY` with a non-empty `queue` means
/// items are waiting behind the in-flight invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Busy,
}

/// A per-address FIFO queue with at most one in-flight Lambda invocation.
///
/// Invariant (spec.md §8, invariant 1): if `state == Idle` then `queue`
/// is empty — enforced by always dispatching as soon as an item makes
/// the mailbox non-idle.
pub struct Mailbox {
    pub address: Address,
    state: State,
    queue: VecDeque<MailboxItem>,
}

impl Mailbox {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            state: State::Idle,
            queue: VecDeque::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Enqueues a message. Returns the envelope to dispatch immediately
    /// if the mailbox was idle; otherwise the item just joins the queue
    /// behind the in-flight invocation.
    pub fn enqueue(&mut self, from: Address, subject: String, body: Option<Value>) -> Option<OutboundEnvelope> {
        let item = MailboxItem { from, subject, body };
        let was_idle = self.is_idle();
        self.queue.push_back(item);

        if was_idle {
            self.state = State::Busy;
            Some(self.build_envelope())
        } else {
            None
        }
    }

    fn build_envelope(&self) -> OutboundEnvelope {
        let item = self.queue.front().expect("dispatch only happens with a front item");
        OutboundEnvelope {
            subject: item.subject.clone(),
            from: item.from.clone(),
            address: self.address.clone(),
            body: item.body.clone(),
        }
    }

    /// The item currently undergoing invocation, if any.
    pub fn current(&self) -> Option<&MailboxItem> {
        self.queue.front()
    }

    /// Completes the in-flight item, interprets its response into route
    /// actions, and dispatches the next queued item if one exists.
    ///
    /// Returns `(actions, next_envelope)`: `next_envelope` is `Some` when
    /// the caller should issue another `invoke_lambda` for this mailbox.
    pub fn complete(
        &mut self,
        outcome: Result<LambdaResponse, TransportError>,
    ) -> (Vec<RouteAction>, Option<OutboundEnvelope>) {
        let item = self.queue.pop_front().expect("complete called with no in-flight item");
        let actions = interpret_response(&item, &self.address, outcome);

        if self.queue.is_empty() {
            self.state = State::Idle;
            (actions, None)
        } else {
            let envelope = self.build_envelope();
            (actions, Some(envelope))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(body: Value) -> Result<LambdaResponse, TransportError> {
        Ok(LambdaResponse {
            status: 200,
            function_error: false,
            body: serde_json::to_vec(&body).unwrap().into(),
        })
    }

    #[test]
    fn first_enqueue_dispatches_immediately() {
        let mut mailbox = Mailbox::new(Address::from_parts("echo", "42").unwrap());
        let envelope = mailbox.enqueue(Address::http_connection(1), "greet".into(), Some(json!("hi")));
        assert!(envelope.is_some());
        assert!(!mailbox.is_idle());
    }

    #[test]
    fn second_enqueue_while_busy_just_queues() {
        let mut mailbox = Mailbox::new(Address::from_parts("worker", "7").unwrap());
        mailbox.enqueue(Address::http_connection(1), "do".into(), Some(json!(1)));
        let second = mailbox.enqueue(Address::http_connection(2), "do".into(), Some(json!(2)));
        assert!(second.is_none());
    }

    #[test]
    fn complete_dispatches_next_queued_item() {
        let mut mailbox = Mailbox::new(Address::from_parts("worker", "7").unwrap());
        mailbox.enqueue(Address::http_connection(1), "do".into(), Some(json!(1)));
        mailbox.enqueue(Address::http_connection(2), "do".into(), Some(json!(2)));

        let (_, next) = mailbox.complete(ok(json!({"subject": "done", "body": "ok"})));
        assert!(next.is_some());
        assert!(!mailbox.is_idle());
    }

    #[test]
    fn complete_with_empty_queue_goes_idle() {
        let mut mailbox = Mailbox::new(Address::from_parts("echo", "42").unwrap());
        mailbox.enqueue(Address::http_connection(1), "greet".into(), Some(json!("hi")));
        let (_, next) = mailbox.complete(ok(json!({"subject": "greeting", "body": "hi back"})));
        assert!(next.is_none());
        assert!(mailbox.is_idle());
    }
}
