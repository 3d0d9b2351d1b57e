//! Yggdrasil address derivation
//!
//! Node addresses live in `200::/7`. The layout, bit for bit as in the
//! Yggdrasil address package:
//!
//! ```text
//! byte 0     : 0x02 prefix
//! byte 1     : number of leading 1 bits of the inverted public key
//! bytes 2..16: inverted key bits following the first 0 bit, packed MSB first
//! ```
//!
//! Keys with more leading zero bits yield "smaller" addresses, so the count
//! in byte 1 makes brute-forced keys visibly stronger.

use std::fmt;
use std::net::Ipv6Addr;

use crate::types::PublicKey;

/// Address prefix for node addresses (`200::/7`)
pub const ADDRESS_PREFIX: u8 = 0x02;

/// Size of an overlay address in bytes
pub const ADDRESS_LENGTH: usize = 16;

/// A 16-byte Yggdrasil node address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    pub fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Whether the address carries the node address prefix
    pub fn is_valid(&self) -> bool {
        self.0[0] == ADDRESS_PREFIX
    }

    pub fn to_ipv6(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.0)
    }
}

impl From<Address> for Ipv6Addr {
    fn from(addr: Address) -> Self {
        addr.to_ipv6()
    }
}

impl From<Ipv6Addr> for Address {
    fn from(ip: Ipv6Addr) -> Self {
        Self(ip.octets())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_ipv6().fmt(f)
    }
}

/// Compute the overlay address for an ed25519 public key
pub fn addr_for_key(public_key: &PublicKey) -> Address {
    let mut inverted = *public_key;
    for byte in inverted.iter_mut() {
        *byte = !*byte;
    }

    let mut addr = [0u8; ADDRESS_LENGTH];
    addr[0] = ADDRESS_PREFIX;

    // u8 counter wraps as in Yggdrasil; only an all-zero key reaches 256.
    let mut ones: u8 = 0;
    let mut done = false;
    let mut bits: u8 = 0;
    let mut nbits = 0;
    let mut out = 2;

    for idx in 0..8 * inverted.len() {
        let bit = (inverted[idx / 8] >> (7 - (idx % 8))) & 1;

        if !done {
            if bit != 0 {
                ones = ones.wrapping_add(1);
            } else {
                done = true;
            }
            continue;
        }

        bits = (bits << 1) | bit;
        nbits += 1;
        if nbits == 8 {
            nbits = 0;
            if out < ADDRESS_LENGTH {
                addr[out] = bits;
                out += 1;
            }
        }
    }

    addr[1] = ones;
    Address(addr)
}
