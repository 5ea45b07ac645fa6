//! Centralized error type for startup and actor-boundary failures.
//!
//! In-band protocol errors (malformed Lambda envelopes, function errors,
//! invalid HTTP requests) are not represented here — they are valid broker
//! outcomes and flow back to callers as plain [`crate::server::HttpReply`]
//! values, not as `Err`.

use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to load configuration from environment"))]
    Config { source: envy::Error },

    #[snafu(display(
        "you must provide aws-region, aws-access-key and aws-secret together, or none of them"
    ))]
    IncompleteStaticCredentials,

    #[snafu(display("failed to bootstrap AWS credentials from the instance metadata service"))]
    CredentialBootstrap,

    #[snafu(display("failed to bind HTTP listener on port {port}"))]
    Bind { port: u16, source: std::io::Error },

    #[snafu(display("invalid address: {address}"))]
    InvalidAddress { address: String },

    #[snafu(display("server actor is no longer running"))]
    ActorGone,
}

impl From<envy::Error> for Error {
    fn from(source: envy::Error) -> Self {
        Self::Config { source }
    }
}
