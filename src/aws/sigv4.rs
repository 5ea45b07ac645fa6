//! AWS Signature Version 4 request signing.
//!
//! Implements the exact canonicalization quirks of the original signer,
//! including its double URI-encoding pass — intentionally not a strict
//! RFC 3986 encoder, to stay byte-compatible with it.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

fn hex_sha256(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex::encode(digest)
}

fn hmac_sha256(key: &[u8], data: &str) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts key of any length");
    mac.update(data.as_bytes());
    mac.finalize().into_bytes().into()
}

/// Whether a byte must be percent-encoded.
///
/// `legacy` relaxes `$&,:;=@` to unreserved, matching how the first
/// encoding pass treats them; the second pass sets `legacy = false` so
/// those characters are escaped, per RFC 3986 §2.2.
fn should_encode_char(c: u8, legacy: bool) -> bool {
    if c.is_ascii_alphanumeric() {
        return false;
    }
    match c {
        b'-' | b'_' | b'.' | b'~' | b'/' => false,
        b'$' | b'&' | b',' | b':' | b';' | b'=' | b'@' => !legacy,
        _ => true,
    }
}

fn encode_path(path: &str, legacy: bool) -> String {
    let mut out = String::with_capacity(path.len());
    for &byte in path.as_bytes() {
        if should_encode_char(byte, legacy) {
            out.push_str(&format!("%{byte:02X}"));
        } else {
            out.push(byte as char);
        }
    }
    out
}

/// Encodes a path with the legacy pass, then encodes the result again
/// with the strict pass — matching the original signer byte-for-byte,
/// including its re-escaping of the `%` introduced by the first pass.
fn encode_path_double(path: &str) -> String {
    let once = encode_path(path, true);
    encode_path(&once, false)
}

fn canonical_request(
    method: &str,
    host: &str,
    path: &str,
    query: &str,
    datetime: &str,
    payload: &[u8],
) -> String {
    let escaped_path = encode_path_double(path);
    let payload_hash = hex_sha256(payload);
    format!(
        "{method}\n{escaped_path}\n{query}\nhost:{host}\nx-amz-date:{datetime}\n\nhost;x-amz-date\n{payload_hash}"
    )
}

/// Derives `Authorization` headers for AWS requests, caching the derived
/// signing key for the current UTC date.
pub struct Signer {
    access_key: String,
    secret: SecretString,
    region: String,
    service: String,
    cached_date: Option<String>,
    cached_key: [u8; 32],
}

impl Signer {
    pub fn new(
        access_key: impl Into<String>,
        secret: SecretString,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret,
            region: region.into(),
            service: service.into(),
            cached_date: None,
            cached_key: [0u8; 32],
        }
    }

    fn signing_key(&mut self, date: &str) -> [u8; 32] {
        if self.cached_date.as_deref() == Some(date) {
            return self.cached_key;
        }

        let k_secret = format!("AWS4{}", self.secret.expose_secret());
        let k_date = hmac_sha256(k_secret.as_bytes(), date);
        let k_region = hmac_sha256(&k_date, &self.region);
        let k_service = hmac_sha256(&k_region, &self.service);
        let k_signing = hmac_sha256(&k_service, "aws4_request");

        self.cached_date = Some(date.to_owned());
        self.cached_key = k_signing;
        k_signing
    }

    /// Produces the `Authorization` header value for a request.
    ///
    /// `datetime` must be in `YYYYMMDDTHHMMSSZ` form; `query` must
    /// already be canonicalized by the caller.
    pub fn sign(
        &mut self,
        method: &str,
        host: &str,
        path: &str,
        query: &str,
        datetime: &str,
        payload: &[u8],
    ) -> String {
        let date = &datetime[..8];

        let canonical = canonical_request(method, host, path, query, datetime, payload);
        let canonical_hash = hex_sha256(canonical.as_bytes());

        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{datetime}\n{date}/{region}/{service}/aws4_request\n{canonical_hash}",
            region = self.region,
            service = self.service,
        );

        let signing_key = self.signing_key(date);
        let signature = hex::encode(hmac_sha256(&signing_key, &string_to_sign));

        format!(
            "AWS4-HMAC-SHA256 Credential={}/{}/{}/{}/aws4_request, SignedHeaders=host;x-amz-date, Signature={}",
            self.access_key, date, self.region, self.service, signature
        )
    }
}
