//! Base 32 decoding for key labels
//!
//! Key-form queries carry an ed25519 public key encoded with the standard
//! RFC 4648 alphabet (`A-Z2-7`) and no `=` padding. DNS names are case
//! insensitive, so lowercase input decodes the same as uppercase.

use thiserror::Error;

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("illegal base32 byte 0x{0:02x} at position {1}")]
    IllegalByte(u8, usize),

    #[error("invalid base32 length {0}")]
    InvalidLength(usize),
}

/// Decode unpadded base32 text. Any byte outside the alphabet, including
/// non-ASCII, is an error.
pub fn decode_nopad(input: impl AsRef<[u8]>) -> Result<Vec<u8>, DecodeError> {
    let input = input.as_ref();
    // A trailing group of 1, 3 or 6 symbols cannot come out of an encoder.
    if matches!(input.len() % 8, 1 | 3 | 6) {
        return Err(DecodeError::InvalidLength(input.len()));
    }

    let mut out = Vec::with_capacity(input.len() * 5 / 8);
    let mut acc: u64 = 0;
    let mut nbits = 0u32;

    for (pos, &b) in input.iter().enumerate() {
        let value = symbol_value(b).ok_or(DecodeError::IllegalByte(b, pos))?;
        acc = (acc << 5) | u64::from(value);
        nbits += 5;
        if nbits >= 8 {
            nbits -= 8;
            out.push((acc >> nbits) as u8);
            acc &= (1 << nbits) - 1;
        }
    }

    Ok(out)
}

/// Encode bytes as unpadded uppercase base32
pub fn encode_nopad(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8 + 4) / 5);
    let mut acc: u64 = 0;
    let mut nbits = 0u32;

    for &byte in data {
        acc = (acc << 8) | u64::from(byte);
        nbits += 8;
        while nbits >= 5 {
            nbits -= 5;
            out.push(ALPHABET[((acc >> nbits) & 0x1f) as usize] as char);
        }
        acc &= (1 << nbits) - 1;
    }

    if nbits > 0 {
        out.push(ALPHABET[((acc << (5 - nbits)) & 0x1f) as usize] as char);
    }

    out
}

fn symbol_value(b: u8) -> Option<u8> {
    match b {
        b'A'..=b'Z' => Some(b - b'A'),
        b'a'..=b'z' => Some(b - b'a'),
        b'2'..=b'7' => Some(b - b'2' + 26),
        _ => None,
    }
}
