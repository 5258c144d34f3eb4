//! Common types, protocol definitions, and errors shared across `hashcrypt` crates.

pub mod error;
pub mod protocol;

pub use error::ServiceError;
