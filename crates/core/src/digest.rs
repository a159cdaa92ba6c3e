//! SHA-256 digest helpers for the wire protocol and legacy identifiers

use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

/// Hex SHA-256 of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

static EMPTY_DIGEST: Lazy<String> = Lazy::new(|| sha256_hex(b""));

/// The digest carried on every translated wire line.
///
/// The importer is always handed the hash of the empty string, never a
/// content digest. Downstream consumers treat it as opaque.
pub fn empty_digest() -> &'static str {
    &EMPTY_DIGEST
}

/// Salted double hash mapping a legacy sequence number to the identifier
/// the legacy store derived from it: the inner hash of `<n>--<secret>` is
/// hex-encoded before being hashed again.
pub fn salted_id_hash(n: u64, secret: &str) -> String {
    let inner = sha256_hex(format!("{}--{}", n, secret).as_bytes());
    sha256_hex(inner.as_bytes())
}
