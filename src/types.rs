//! Shared primitive types

/// Raw ed25519 public key bytes
pub type PublicKey = [u8; 32];

/// DNS record type for IPv6 host addresses
pub const TYPE_AAAA: u16 = 28;

/// DNS record type for IPv4 host addresses
pub const TYPE_A: u16 = 1;

/// DNS class IN
pub const CLASS_IN: u16 = 1;

/// Default TTL for synthesized answers (seconds).
/// Answers are computed, not cached, so a short TTL is enough.
pub const DEFAULT_TTL: u32 = 10;
