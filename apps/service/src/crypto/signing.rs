use hmac::{Hmac, Mac};
use sha2::Sha256;

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Version tag of the signature scheme, used both in the signed base string
/// and as the `v0=` prefix of the signature header.
pub const SIGNATURE_VERSION: &str = "v0";

/// The byte string covered by the signature: `v0:{timestamp}:{body}`.
pub fn signature_base(timestamp: &str, body: &[u8]) -> Vec<u8> {
    let mut base = Vec::with_capacity(SIGNATURE_VERSION.len() + timestamp.len() + body.len() + 2);
    base.extend_from_slice(SIGNATURE_VERSION.as_bytes());
    base.push(b':');
    base.extend_from_slice(timestamp.as_bytes());
    base.push(b':');
    base.extend_from_slice(body);
    base
}

/// Compute the raw MAC of a request with an already keyed HMAC.
pub(crate) fn compute_mac(mac: &HmacSha256, timestamp: &str, body: &[u8]) -> HmacSha256 {
    let mut mac = mac.clone();
    mac.update(&signature_base(timestamp, body));
    mac
}
