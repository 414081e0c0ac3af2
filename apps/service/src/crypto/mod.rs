/// Cryptographic operations for the check service.
///
/// Inbound command requests are authenticated with the webhook sender's
/// HMAC-SHA256 scheme: a shared secret signs `v0:{timestamp}:{body}` and the
/// request is only accepted inside a bounded freshness window.
pub mod signing;
pub mod verification;

pub use verification::{
    DEFAULT_TOLERANCE, RequestVerifier, SIGNATURE_HEADER, SignedRequest, TIMESTAMP_HEADER,
    VerificationError,
};
