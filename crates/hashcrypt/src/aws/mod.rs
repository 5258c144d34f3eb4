//! AWS KMS as the key authority.
//!
//! KMS calls can be routed through a local forwarding proxy by overriding the
//! endpoint URL, for hosts without direct egress to the AWS APIs.

pub mod kms;

pub use kms::{KmsKeyAuthority, KmsSettings};
