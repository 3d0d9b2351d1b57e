//! DNS Responder Module
//!
//! Answers AAAA queries with Yggdrasil addresses computed on the fly.
//!
//! ## Query forms
//!
//! - `<label><hostname suffix>`: label mixed into the base identity
//! - `<base32 key><key suffix>`: address of the given public key
//!
//! Anything else gets no response, so the client falls back to its other
//! resolvers.

pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod resolver;
pub mod server;

pub use dispatcher::QueryDispatcher;
pub use error::QueryError;
pub use server::DnsServer;
