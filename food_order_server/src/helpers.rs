use hmac::{Hmac, Mac};
use log::warn;
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Signs `data` with `secret` using HMAC-SHA512 and returns the base64-encoded signature. This is what the payment
/// gateway sends in the `X-Payment-Signature` header.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> Option<String> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(data);
    Some(base64::encode(mac.finalize().into_bytes()))
}

/// Checks a base64-encoded HMAC-SHA512 `signature` over `data` in constant time.
pub fn verify_hmac(secret: &str, data: &[u8], signature: &str) -> bool {
    let sig_bytes = match base64::decode(signature.trim()) {
        Ok(b) => b,
        Err(e) => {
            warn!("🔐️ Signature is not valid base64. {e}");
            return false;
        },
    };
    match HmacSha512::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(data);
            mac.verify_slice(&sig_bytes).is_ok()
        },
        Err(e) => {
            warn!("🔐️ Could not initialise HMAC with the configured secret. {e}");
            false
        },
    }
}
