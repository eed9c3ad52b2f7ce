//! Symmetric AEAD layers.
//!
//! - [`EnvelopeAead`]: data keys wrapped by a KMS master key, used to
//!   protect the private keyset at rest
//! - [`ContentKey`]: per-document AES-128-GCM content key

pub mod content;
pub mod envelope;

pub use content::ContentKey;
pub use envelope::EnvelopeAead;
