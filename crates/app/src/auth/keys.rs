//! Service key generation and hashing.
//!
//! Keys look like `wb_sk_<64 hex chars>`. Only the SHA-256 hex digest of the
//! full key string is ever persisted.

use std::fmt;

use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// Prefix identifying a service key in logs and config files.
pub const SERVICE_KEY_PREFIX: &str = "wb_sk_";

/// Number of random bytes in a key.
pub const SERVICE_KEY_SECRET_BYTES: usize = 32;

const SERVICE_KEY_HEX_CHARS: usize = SERVICE_KEY_SECRET_BYTES * 2;

/// A raw service key. Only ever held in memory long enough to show it once.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceKeySecret {
    raw: String,
}

impl ServiceKeySecret {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn hash(&self) -> String {
        hash_service_key(&self.raw)
    }
}

impl fmt::Debug for ServiceKeySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServiceKeySecret(**redacted**)")
    }
}

impl Drop for ServiceKeySecret {
    fn drop(&mut self) {
        self.raw.zeroize();
    }
}

#[must_use]
pub fn generate_service_key() -> ServiceKeySecret {
    let mut bytes = [0_u8; SERVICE_KEY_SECRET_BYTES];

    OsRng.fill_bytes(&mut bytes);

    let mut raw = String::with_capacity(SERVICE_KEY_PREFIX.len() + SERVICE_KEY_HEX_CHARS);
    raw.push_str(SERVICE_KEY_PREFIX);
    encode_hex(&bytes, &mut raw);

    bytes.zeroize();

    ServiceKeySecret { raw }
}

/// One-way hash used to look a presented key up.
#[must_use]
pub fn hash_service_key(raw: &str) -> String {
    format!("{:x}", Sha256::digest(raw.trim().as_bytes()))
}

/// Lowercase hex. Nibbles are always below 16, so no digit is dropped.
fn encode_hex(bytes: &[u8], out: &mut String) {
    out.extend(
        bytes
            .iter()
            .flat_map(|byte| [byte >> 4, byte & 0x0f])
            .filter_map(|nibble| char::from_digit(u32::from(nibble), 16)),
    );
}
