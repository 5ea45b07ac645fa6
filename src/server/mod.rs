//! The server actor: HTTP ingress, URL routing, the parked-connection
//! registry, the mailbox registry, and the top-level event loop.
//!
//! Everything here runs on one Tokio task. [`ServerHandle`] is the only
//! way in from outside — the actix-web handlers in [`handlers`] never
//! touch [`ServerActor`]'s state directly, they send a [`ServerCommand`]
//! and await its reply.

pub mod handlers;

use std::collections::HashMap;

use rand::Rng;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::address::Address;
use crate::aws::{refresh_interval, AwsClient, AwsEvent};
use crate::envelope::{HttpReplyBody, OutboundEnvelope};
use crate::error::Error;
use crate::mailbox::{Mailbox, RouteAction};

/// The reply delivered back to a parked HTTP connection.
#[derive(Debug)]
pub enum HttpReply {
    Ok(HttpReplyBody),
    Error { status: u16, body: Vec<u8> },
}

/// A request the actix-web ingress layer sends into the server actor.
pub enum ServerCommand {
    Ingress {
        actor_type: String,
        actor_id: String,
        subject: String,
        body: Value,
        respond_to: oneshot::Sender<HttpReply>,
    },
}

/// A cloneable, cheap-to-pass handle the HTTP layer uses to talk to the
/// server actor without sharing any mutable state.
#[derive(Clone)]
pub struct ServerHandle {
    tx: mpsc::Sender<ServerCommand>,
}

impl ServerHandle {
    /// Routes one HTTP-originated message and awaits its eventual reply.
    ///
    /// The returned future only resolves once an actor replies, forwards
    /// to something that replies, or the process begins shutting down
    /// (in which case the channel closes and this errors).
    pub async fn ingress(
        &self,
        actor_type: String,
        actor_id: String,
        subject: String,
        body: Value,
    ) -> Result<HttpReply, Error> {
        let (respond_to, rx) = oneshot::channel();
        self.tx
            .send(ServerCommand::Ingress {
                actor_type,
                actor_id,
                subject,
                body,
                respond_to,
            })
            .await
            .map_err(|_| Error::ActorGone)?;
        rx.await.map_err(|_| Error::ActorGone)
    }
}

/// Owns every piece of mutable broker state. No locks: only this task
/// ever touches `mailboxes` or `connections`.
pub struct ServerActor {
    mailboxes: HashMap<Address, Mailbox>,
    connections: HashMap<u64, oneshot::Sender<HttpReply>>,
    next_connection_id: u64,
    aws: AwsClient,
    rx: mpsc::Receiver<ServerCommand>,
    refresh_on_timer: bool,
}

impl ServerActor {
    /// Spawns the actor task and returns a handle to it plus the
    /// computed external endpoint string (`http://ip:port`).
    pub fn spawn(aws: AwsClient, refresh_on_timer: bool) -> ServerHandle {
        let (tx, rx) = mpsc::channel(1024);
        let actor = Self {
            mailboxes: HashMap::new(),
            connections: HashMap::new(),
            next_connection_id: rand::thread_rng().gen(),
            aws,
            rx,
            refresh_on_timer,
        };
        tokio::spawn(actor.run());
        ServerHandle { tx }
    }

    async fn run(mut self) {
        let mut refresh_timer = if self.refresh_on_timer {
            Some(tokio::time::interval(refresh_interval()))
        } else {
            None
        };

        loop {
            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                () = self.aws.ingest() => {
                    while let Some(event) = self.aws.pop_ready() {
                        self.handle_aws_event(event);
                    }
                }
                () = Self::tick(&mut refresh_timer) => {
                    self.aws.refresh_credentials();
                }
            }
        }
    }

    async fn tick(interval: &mut Option<tokio::time::Interval>) {
        match interval {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Ingress {
                actor_type,
                actor_id,
                subject,
                body,
                respond_to,
            } => {
                let address = match Address::from_parts(&actor_type, &actor_id) {
                    Ok(address) => address,
                    Err(_) => {
                        let _ = respond_to.send(HttpReply::Error {
                            status: 400,
                            body: br#"{"error":"invalid address"}"#.to_vec(),
                        });
                        return;
                    }
                };

                let connection_id = self.next_connection_id;
                self.next_connection_id = self.next_connection_id.wrapping_add(1);
                self.connections.insert(connection_id, respond_to);

                let from = Address::http_connection(connection_id);
                let body = if body.is_null() { None } else { Some(body) };
                self.dispatch_send(address.as_str(), from, subject, body);
            }
        }
    }

    fn handle_aws_event(&mut self, event: AwsEvent) {
        match event {
            AwsEvent::LambdaResult { mailbox: address, result } => {
                let Some(mailbox) = self.mailboxes.get_mut(&address) else {
                    tracing::warn!(%address, "lambda result for unknown mailbox");
                    return;
                };
                let (actions, next_envelope) = mailbox.complete(result);

                for action in actions {
                    match action {
                        RouteAction::Route { to, from, subject, body } => {
                            self.dispatch_send(&to, from, subject, body)
                        }
                        RouteAction::RouteError { to, status, body } => {
                            self.dispatch_error(&to, status, body)
                        }
                    }
                }

                if let Some(envelope) = next_envelope {
                    self.start_invoke(address, envelope);
                }
            }
            AwsEvent::CredentialsReady => {
                tracing::info!("AWS credentials acquired");
            }
            AwsEvent::CredentialsFailed => {
                tracing::error!("AWS credential bootstrap failed; retaining prior credentials");
            }
        }
    }

    /// `server.send(to, from, subject, body)`.
    fn dispatch_send(&mut self, to: &str, from: Address, subject: String, body: Option<Value>) {
        if let Some(connection_id) = to.strip_prefix("$http/").and_then(|id| id.parse::<u64>().ok()) {
            match self.connections.remove(&connection_id) {
                Some(sender) => {
                    let _ = sender.send(HttpReply::Ok(HttpReplyBody { from, subject, body }));
                }
                None => {
                    tracing::warn!(connection_id, "reply for an expired or already-consumed connection");
                }
            }
            return;
        }

        let address = match Address::parse(to) {
            Ok(address) => address,
            Err(_) => {
                tracing::warn!(to, "dropping send to invalid address");
                return;
            }
        };

        let mailbox = self
            .mailboxes
            .entry(address.clone())
            .or_insert_with(|| Mailbox::new(address.clone()));

        if let Some(envelope) = mailbox.enqueue(from, subject, body) {
            if let Some(item) = mailbox.current() {
                tracing::debug!(%address, subject = %item.subject, "dispatching mailbox item to lambda");
            }
            self.start_invoke(address, envelope);
        }
    }

    /// `server.send_error(to, status, body)`. Errors destined for actor
    /// mailboxes are dropped — only HTTP synthetic addresses receive them.
    fn dispatch_error(&mut self, to: &Address, status: u16, body: Vec<u8>) {
        let Some(connection_id) = to.http_connection_id() else {
            tracing::debug!(%to, "dropping actor-to-actor error propagation");
            return;
        };

        if let Some(sender) = self.connections.remove(&connection_id) {
            let _ = sender.send(HttpReply::Error { status, body });
        }
    }

    fn start_invoke(&mut self, address: Address, envelope: OutboundEnvelope) {
        let function_name = address.actor_type().to_owned();
        if let Err(e) = self.aws.invoke_lambda(&function_name, address, &envelope) {
            // Known limitation (spec.md §9.3): the mailbox stays BUSY
            // after a transport-level dispatch failure.
            tracing::error!(error = %e, "failed to dispatch lambda invocation");
        }
    }
}
