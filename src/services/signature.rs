//! Notification signature: a deterministic fingerprint integrators use to
//! check that a payload came from a party holding the server key.

use sha2::{Digest, Sha512};

/// SHA-512 over `order_id ‖ status_code ‖ amount ‖ server_key`, lowercase hex.
pub fn sign(order_id: &str, status_code: u16, amount: i64, server_key: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(format!("{}{}{}{}", order_id, status_code, amount, server_key).as_bytes());
    hex::encode(hasher.finalize())
}
