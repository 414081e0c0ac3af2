use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hmac::Mac;
use hmac::digest::InvalidLength;
use thiserror::Error;

use super::signing::{HmacSha256, SIGNATURE_VERSION, compute_mac};

/// Header carrying the Unix time at which the request was signed.
pub const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";
/// Header carrying the `v0=<hex>` signature.
pub const SIGNATURE_HEADER: &str = "X-Slack-Signature";
/// Maximum distance between the request timestamp and the local clock.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
    #[error("missing request timestamp")]
    MissingTimestamp,
    #[error("malformed request timestamp")]
    MalformedTimestamp,
    #[error("request expired")]
    Expired,
    #[error("missing request signature")]
    MissingSignature,
    #[error("malformed request signature")]
    MalformedSignature,
    #[error("invalid signature")]
    InvalidSignature,
}

/// Borrowed view of the parts of an inbound request that are verified.
#[derive(Debug, Clone, Copy)]
pub struct SignedRequest<'a> {
    pub method: &'a str,
    pub timestamp: Option<&'a str>,
    pub signature: Option<&'a str>,
    pub body: &'a [u8],
}

/// Verifies signed inbound requests against a shared secret.
///
/// Stateless: every request is judged on its own method, timestamp, body and
/// signature.
#[derive(Clone)]
pub struct RequestVerifier {
    mac: HmacSha256,
    tolerance: Duration,
}

impl fmt::Debug for RequestVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestVerifier").field("tolerance", &self.tolerance).finish_non_exhaustive()
    }
}

impl RequestVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, InvalidLength> {
        Ok(Self { mac: HmacSha256::new_from_slice(secret.as_ref())?, tolerance: DEFAULT_TOLERANCE })
    }

    /// Change the accepted clock distance (default five minutes).
    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Produce the signature header value for `timestamp` and `body`.
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> String {
        let digest = compute_mac(&self.mac, timestamp, body).finalize().into_bytes();
        format!("{}={}", SIGNATURE_VERSION, hex::encode(digest))
    }

    /// Verify a request as of `now`.
    ///
    /// The MAC comparison runs in constant time.
    pub fn verify(&self, request: &SignedRequest<'_>, now: SystemTime) -> Result<(), VerificationError> {
        if request.method != "POST" {
            return Err(VerificationError::MethodNotAllowed(request.method.to_string()));
        }

        let timestamp = request.timestamp.ok_or(VerificationError::MissingTimestamp)?;
        let seconds: i64 = timestamp.parse().map_err(|_| VerificationError::MalformedTimestamp)?;
        self.check_freshness(seconds, now)?;

        let signature = request.signature.ok_or(VerificationError::MissingSignature)?;
        let provided = signature
            .strip_prefix(SIGNATURE_VERSION)
            .and_then(|rest| rest.strip_prefix('='))
            .ok_or(VerificationError::MalformedSignature)?;
        let provided = hex::decode(provided).map_err(|_| VerificationError::MalformedSignature)?;

        compute_mac(&self.mac, timestamp, request.body)
            .verify_slice(&provided)
            .map_err(|_| VerificationError::InvalidSignature)
    }

    /// Reject timestamps more than `tolerance` away from `now`, in either
    /// direction. The boundary itself is accepted.
    fn check_freshness(&self, seconds: i64, now: SystemTime) -> Result<(), VerificationError> {
        let now_micros = match now.duration_since(UNIX_EPOCH) {
            Ok(since) => since.as_micros() as i128,
            Err(before) => -(before.duration().as_micros() as i128),
        };
        let then_micros = i128::from(seconds) * 1_000_000;

        if (now_micros - then_micros).abs() > self.tolerance.as_micros() as i128 {
            return Err(VerificationError::Expired);
        }
        Ok(())
    }
}
