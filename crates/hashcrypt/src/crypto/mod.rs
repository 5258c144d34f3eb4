//! Field-level crypto primitives.
//!
//! This module is free of AWS and HTTP dependencies. It provides the
//! symmetric transform used for reversible protection and the salted digest
//! used for pseudonyms.
//!
//! # Envelope format
//!
//! ```text
//! base64( iv[16] || AES-128-CBC-PKCS7(plaintext) )
//! ```
//!
//! Base64 encoding happens one layer up, in [`crate::cryptor`].

pub mod cipher;
pub mod digest;

pub use cipher::{CipherError, KEY_LEN};
pub use digest::{DigestError, HashAlgorithm, SaltedHasher};
