//! Core library components.
//!
//! The envelope protocol, leaves first: KMS adapters, the envelope AEAD,
//! key pair management, recipients, and envelope building/opening.

pub mod aead;
pub mod carrier;
pub mod config;
pub mod constants;
pub mod envelope;
pub mod fetch;
pub mod hybrid;
pub mod keys;
pub mod kms;
pub mod recipient;
