//! Credential storage and the IMDS bootstrap state machine.

use secrecy::{ExposeSecret, SecretString};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AWS credentials used to sign Lambda invocations.
///
/// `secret` and `session_token` are wiped in place when dropped, matching
/// the original signer's explicit `memset` on teardown.
#[derive(Clone, ZeroizeOnDrop)]
pub struct Credentials {
    #[zeroize(skip)]
    pub access_key: String,
    pub secret: String,
    #[zeroize(skip)]
    pub region: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn static_config(access_key: &str, secret: &str, region: &str) -> Self {
        Self {
            access_key: access_key.to_owned(),
            secret: secret.to_owned(),
            region: region.to_owned(),
            session_token: None,
        }
    }

    pub fn from_imds(access_key: String, secret: SecretString, region: String, session_token: String) -> Self {
        Self {
            access_key,
            secret: secret.expose_secret().to_owned(),
            region,
            session_token: Some(session_token),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("region", &self.region)
            .field("secret", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Progress of the IMDS credential bootstrap.
///
/// `Error` absorbs: once entered, only a fresh [`BootstrapState::starting`]
/// call restarts the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Region,
    Role,
    Credentials,
    Done,
    Error,
}

impl BootstrapState {
    /// The state a fresh bootstrap attempt starts in, given what is
    /// already known (per spec.md §4.2.1's entry-condition table).
    pub fn starting(region_known: bool, role_known: bool) -> Self {
        if !region_known {
            Self::Region
        } else if !role_known {
            Self::Role
        } else {
            Self::Credentials
        }
    }
}
