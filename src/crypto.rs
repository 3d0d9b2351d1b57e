//! Identity keys and hostname key mixing
//!
//! The base identity is an ed25519 key in the Yggdrasil `PrivateKey` form
//! (hex of `seed || public key`). Hostname labels are mixed into it with
//! BLAKE3 in keyed mode:
//!
//! ```text
//! mixing_key = BLAKE3-derive_key(MIXIN_CONTEXT, base_seed)
//! seed'      = BLAKE3-keyed_hash(mixing_key, label)
//! ```
//!
//! Any 32-byte string is a valid ed25519 seed, so every label yields a
//! usable keypair. Keyed BLAKE3 is a PRF: derived seeds reveal nothing
//! about the base seed or about seeds for other labels.

use ed25519_dalek::{SigningKey, KEYPAIR_LENGTH, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use std::fmt;

use crate::types::PublicKey;

/// Domain separation context for deriving the hostname mixing key
const MIXIN_CONTEXT: &str = "ygg-mixin-dns 2024-01-01 hostname mixing v1";

/// The process-wide identity that hostname labels are mixed into
pub struct BaseIdentity {
    signing_key: SigningKey,
}

impl BaseIdentity {
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// Parse a hex encoded private key.
    ///
    /// Accepts the 64-byte Yggdrasil form (`seed || public key`, the public
    /// half must match the seed) or a bare 32-byte seed.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|e| KeyError::InvalidHex(e.to_string()))?;

        let signing_key = match bytes.len() {
            KEYPAIR_LENGTH => {
                let mut keypair = [0u8; KEYPAIR_LENGTH];
                keypair.copy_from_slice(&bytes);
                SigningKey::from_keypair_bytes(&keypair).map_err(|_| KeyError::PublicKeyMismatch)?
            }
            SECRET_KEY_LENGTH => {
                let mut seed = [0u8; SECRET_KEY_LENGTH];
                seed.copy_from_slice(&bytes);
                SigningKey::from_bytes(&seed)
            }
            other => return Err(KeyError::InvalidLength(other)),
        };

        Ok(Self { signing_key })
    }

    /// Generate a fresh random identity
    pub fn generate() -> Self {
        Self::new(SigningKey::generate(&mut OsRng))
    }

    pub fn public_key(&self) -> PublicKey {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Hex of `seed || public key`, as written in Yggdrasil configs
    pub fn to_hex(&self) -> String {
        hex::encode(self.signing_key.to_keypair_bytes())
    }

    /// Derive the keypair for a hostname label
    pub fn mix(&self, label: &[u8]) -> SigningKey {
        mix(&self.signing_key, label)
    }
}

impl fmt::Debug for BaseIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseIdentity")
            .field("public_key", &hex::encode(self.public_key()))
            .finish_non_exhaustive()
    }
}

/// Mix a label into a base key, producing an independent derived key
pub fn mix(base: &SigningKey, label: &[u8]) -> SigningKey {
    let mixing_key = blake3::derive_key(MIXIN_CONTEXT, base.as_bytes());
    let seed = blake3::keyed_hash(&mixing_key, label);
    SigningKey::from_bytes(seed.as_bytes())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("Private key is not valid hex: {0}")]
    InvalidHex(String),

    #[error("Private key must be 32 or 64 bytes, got {0}")]
    InvalidLength(usize),

    #[error("Public half of the private key does not match its seed")]
    PublicKeyMismatch,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    use crate::address::addr_for_key;

    /// Fixed 64-byte test identity: seed of 0x07 bytes followed by its public key
    pub(crate) fn test_identity() -> BaseIdentity {
        let seed = SigningKey::from_bytes(&[7u8; 32]);
        BaseIdentity::from_hex(&hex::encode(seed.to_keypair_bytes())).unwrap()
    }

    #[test]
    fn test_from_hex_keypair_and_seed() {
        let identity = test_identity();
        let from_seed = BaseIdentity::from_hex(&hex::encode([7u8; 32])).unwrap();
        assert_eq!(identity.public_key(), from_seed.public_key());
        assert_eq!(identity.to_hex().len(), 128);
        assert_eq!(BaseIdentity::from_hex(&identity.to_hex()).unwrap().public_key(), identity.public_key());
    }

    #[test]
    fn test_from_hex_rejects_bad_keys() {
        assert!(matches!(BaseIdentity::from_hex("zz"), Err(KeyError::InvalidHex(_))));
        assert_eq!(
            BaseIdentity::from_hex(&hex::encode([1u8; 16])).unwrap_err(),
            KeyError::InvalidLength(16)
        );

        // Seed of one key, public half of another
        let mut bytes = [7u8; 64];
        bytes[32..].copy_from_slice(&SigningKey::from_bytes(&[8u8; 32]).verifying_key().to_bytes());
        assert_eq!(
            BaseIdentity::from_hex(&hex::encode(bytes)).unwrap_err(),
            KeyError::PublicKeyMismatch
        );
    }

    #[test]
    fn test_debug_hides_secret() {
        let identity = test_identity();
        let debug = format!("{:?}", identity);
        assert!(!debug.contains(&hex::encode([7u8; 32])));
        assert!(debug.contains(&hex::encode(identity.public_key())));
    }

    #[test]
    fn test_mix_is_deterministic() {
        let identity = test_identity();
        let a = identity.mix(b"alice");
        let b = identity.mix(b"alice");
        assert_eq!(a.to_bytes(), b.to_bytes());
        assert_eq!(a.verifying_key(), b.verifying_key());
    }

    #[test]
    fn test_mix_distinct_labels() {
        let identity = test_identity();
        let mut keys = HashSet::new();
        let mut addrs = HashSet::new();

        for i in 0..2000 {
            let label = format!("host{}", i);
            let public = identity.mix(label.as_bytes()).verifying_key().to_bytes();
            assert!(keys.insert(public), "duplicate key for {}", label);
            assert!(addrs.insert(addr_for_key(&public)), "duplicate address for {}", label);
        }
    }

    #[test]
    fn test_mix_depends_on_base_key() {
        let other = BaseIdentity::from_hex(&hex::encode([8u8; 32])).unwrap();
        assert_ne!(
            test_identity().mix(b"alice").to_bytes(),
            other.mix(b"alice").to_bytes()
        );
    }

    #[test]
    fn test_mix_empty_label() {
        let identity = test_identity();
        let derived = identity.mix(b"");
        assert_ne!(derived.to_bytes(), [7u8; 32]);
        assert_eq!(derived.to_bytes(), identity.mix(b"").to_bytes());
    }

    proptest! {
        #[test]
        fn prop_mix_not_trivially_related(seed in any::<[u8; 32]>(), label in proptest::collection::vec(any::<u8>(), 0..64)) {
            let base = SigningKey::from_bytes(&seed);
            let derived = mix(&base, &label).to_bytes();

            prop_assert_eq!(derived, mix(&base, &label).to_bytes());
            prop_assert_ne!(derived, seed);

            let mut xored = seed;
            for (b, l) in xored.iter_mut().zip(label.iter().cycle()) {
                *b ^= l;
            }
            prop_assert_ne!(derived, xored);

            let mut concat = seed.to_vec();
            concat.extend_from_slice(&label);
            prop_assert_ne!(&derived[..], &concat[..32]);
        }
    }
}
