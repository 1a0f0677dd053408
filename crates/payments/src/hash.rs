//! Hashes the ledger uses to bind a payment to its input and result.
//!
//! `serde_json` maps are sorted by key (no `preserve_order`), so serializing a
//! value is canonical.

use sha2::{Digest, Sha256};

use docmint_core::JobInput;

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// `sha256(purchaser ";" canonical_json(input))`, hex encoded.
pub fn input_hash(purchaser_identifier: &str, input: &JobInput) -> String {
    let json = serde_json::to_string(input).unwrap_or_default();
    sha256_hex(format!("{purchaser_identifier};{json}").as_bytes())
}

/// `sha256(canonical_json(result))`, hex encoded.
pub fn result_hash(result: &serde_json::Value) -> String {
    sha256_hex(result.to_string().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_hash_ignores_insertion_order() {
        let a: JobInput = [("text", "hello"), ("lang", "en")].into_iter().collect();
        let b: JobInput = [("lang", "en"), ("text", "hello")].into_iter().collect();
        assert_eq!(input_hash("p1", &a), input_hash("p1", &b));
        assert_ne!(input_hash("p1", &a), input_hash("p2", &a));
        assert_eq!(input_hash("p1", &a).len(), 64);
    }

    #[test]
    fn known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
