//! Routing addresses.
//!
//! An [`Address`] names either a Lambda mailbox (`actor_type/actor_id`) or a
//! parked HTTP connection (the synthetic `$http/<id>` form). Both shapes
//! share one 255-byte length cap and one wire representation, so callers
//! can route on an `Address` without caring which kind it is until they
//! actually need to act on it.

use crate::error::Error;

/// Maximum length of a routing key, matching `MQL_ROUTING_KEY_MAX_LEN` in
/// the original implementation.
pub const MAX_LEN: usize = 255;

const HTTP_PREFIX: &str = "$http/";

/// A validated routing address of the form `actor_type/actor_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Builds an address from an already-combined `actor_type/actor_id`
    /// string, validating its length.
    pub fn parse(raw: impl Into<String>) -> Result<Self, Error> {
        let raw = raw.into();
        if raw.is_empty() || raw.len() > MAX_LEN {
            return Err(Error::InvalidAddress { address: raw });
        }
        Ok(Self(raw))
    }

    /// Builds an address from separately-supplied type and id segments, as
    /// they arrive from the HTTP route.
    pub fn from_parts(actor_type: &str, actor_id: &str) -> Result<Self, Error> {
        Self::parse(format!("{actor_type}/{actor_id}"))
    }

    /// Builds the synthetic address of a parked HTTP connection.
    pub fn http_connection(id: u64) -> Self {
        // `u64::MAX` is 20 digits; "$http/" + 20 digits is well under MAX_LEN.
        Self(format!("{HTTP_PREFIX}{id}"))
    }

    /// The actor type segment, i.e. everything before the first `/`.
    pub fn actor_type(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(t, _)| t)
    }

    /// The actor id segment, i.e. everything after the first `/`.
    pub fn actor_id(&self) -> &str {
        self.0.split_once('/').map_or("", |(_, id)| id)
    }

    /// Whether this address refers to a parked HTTP connection rather than
    /// a Lambda mailbox.
    pub fn is_http_connection(&self) -> bool {
        self.0.starts_with(HTTP_PREFIX)
    }

    /// The synthetic connection id, if this is an HTTP connection address.
    pub fn http_connection_id(&self) -> Option<u64> {
        self.0.strip_prefix(HTTP_PREFIX)?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}
