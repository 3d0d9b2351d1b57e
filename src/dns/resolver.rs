//! Label resolvers
//!
//! Both query forms share the same pipeline: strip the suffix, turn the label
//! into a public key, derive the overlay address. They differ only in how the
//! label becomes a key, which is what [`AnswerProducer`] abstracts.

use std::sync::Arc;
use tracing::debug;

use crate::address::{addr_for_key, Address};
use crate::base32;
use crate::crypto::BaseIdentity;
use crate::dns::error::QueryError;
use crate::types::PublicKey;

/// Turns a stripped query label into an overlay address
pub trait AnswerProducer: Send + Sync {
    /// Short name used in logs
    fn kind(&self) -> &'static str;

    /// `label` is the raw label bytes, which need not be UTF-8
    fn produce(&self, label: &[u8]) -> Result<Address, QueryError>;
}

/// Hostname form: mixes the label into the base identity
pub struct HostnameResolver {
    identity: Arc<BaseIdentity>,
}

impl HostnameResolver {
    pub fn new(identity: Arc<BaseIdentity>) -> Self {
        Self { identity }
    }
}

impl AnswerProducer for HostnameResolver {
    fn kind(&self) -> &'static str {
        "hostname"
    }

    fn produce(&self, label: &[u8]) -> Result<Address, QueryError> {
        // DNS names are case-insensitive; Alice and alice are one host.
        let label = label.to_ascii_lowercase();
        let mixed = self.identity.mix(&label);
        let address = addr_for_key(&mixed.verifying_key().to_bytes());
        debug!("Mixed hostname {:?} -> {}", String::from_utf8_lossy(&label), address);
        Ok(address)
    }
}

/// Key form: the label is a base32 encoded public key
#[derive(Default)]
pub struct KeyResolver;

impl KeyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Decode a key label into raw public key bytes
    pub fn decode_key(label: &[u8]) -> Result<PublicKey, QueryError> {
        let bytes = base32::decode_nopad(label)?;
        let len = bytes.len();
        bytes.try_into().map_err(|_| {
            QueryError::InvalidKeyEncoding(format!("decoded key is {} bytes, expected 32", len))
        })
    }
}

impl AnswerProducer for KeyResolver {
    fn kind(&self) -> &'static str {
        "key"
    }

    fn produce(&self, label: &[u8]) -> Result<Address, QueryError> {
        let key = Self::decode_key(label)?;
        Ok(addr_for_key(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::tests::test_identity;

    #[test]
    fn test_hostname_resolver() {
        let identity = Arc::new(test_identity());
        let resolver = HostnameResolver::new(identity.clone());

        let expected = addr_for_key(&identity.mix(b"alice").verifying_key().to_bytes());
        assert_eq!(resolver.produce(b"alice").unwrap(), expected);
        assert_eq!(resolver.produce(b"ALICE").unwrap(), expected);
        assert_ne!(resolver.produce(b"bob").unwrap(), expected);
        assert!(resolver.produce(b"").unwrap().is_valid());
    }

    #[test]
    fn test_hostname_resolver_non_utf8_label() {
        let identity = Arc::new(test_identity());
        let resolver = HostnameResolver::new(identity.clone());

        // Only ASCII letters fold; 0xC9 and 0xE9 stay distinct.
        let expected = addr_for_key(&identity.mix(b"caf\xe9").verifying_key().to_bytes());
        assert_eq!(resolver.produce(b"CAF\xe9").unwrap(), expected);
        assert_ne!(resolver.produce(b"caf\xc9").unwrap(), expected);
    }

    #[test]
    fn test_key_resolver() {
        let key = test_identity().public_key();
        let label = base32::encode_nopad(&key);

        let resolver = KeyResolver::new();
        assert_eq!(resolver.produce(label.as_bytes()).unwrap(), addr_for_key(&key));
        assert_eq!(
            resolver.produce(label.to_lowercase().as_bytes()).unwrap(),
            addr_for_key(&key)
        );
    }

    #[test]
    fn test_key_resolver_rejects_bad_labels() {
        let resolver = KeyResolver::new();
        let labels: [&[u8]; 6] = [b"", b"not-base32!", b"MZXW6YTBOI", b"alice", b"caf\xe9", b"\xff\xfe"];
        for label in labels {
            assert!(
                matches!(resolver.produce(label), Err(QueryError::InvalidKeyEncoding(_))),
                "{:?} should be rejected",
                label
            );
        }

        // 33 bytes
        let label = base32::encode_nopad(&[1u8; 33]);
        assert!(matches!(
            resolver.produce(label.as_bytes()),
            Err(QueryError::InvalidKeyEncoding(_))
        ));
    }
}
