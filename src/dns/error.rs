//! Per-query failures
//!
//! None of these leave the listener loop; each one drops the response for a
//! single datagram.

use crate::base32::DecodeError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// Inbound bytes are not a well formed DNS message
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    /// A key-form label does not decode to a public key
    #[error("Invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// No AAAA question matches a configured suffix
    #[error("No answerable question in message")]
    NoAnswerableQuestion,

    /// A response could not be serialized
    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl From<DecodeError> for QueryError {
    fn from(e: DecodeError) -> Self {
        QueryError::InvalidKeyEncoding(e.to_string())
    }
}

pub(crate) fn malformed(msg: impl Into<String>) -> QueryError {
    QueryError::MalformedPacket(msg.into())
}

pub(crate) fn encoding(msg: impl Into<String>) -> QueryError {
    QueryError::Encoding(msg.into())
}
