//! Field pseudonymisation with salted hashes and KMS envelope encryption.
//!
//! For each configured field of a record the service produces a deterministic
//! salted digest (searchable, joinable) and a reversible AES-128-CBC
//! ciphertext. The data key is generated by AWS KMS and replaced after a
//! configurable number of encryptions; the wrapped copy travels with each
//! record as its decryption context.
//!
//! Layering, leaf first: [`crypto`] → [`dek`] → [`cryptor`] → [`fields`] →
//! [`server`].

pub mod aws;
pub mod config;
pub mod crypto;
pub mod cryptor;
pub mod dek;
pub mod fields;
pub mod server;
pub mod telemetry;
