//! docseal - multi-recipient document envelopes with KMS-protected keys.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── keygen        # Generate and protect a key pair
//! │   ├── rotate        # Add a new primary key
//! │   ├── encrypt       # Seal an HTML document
//! │   ├── decrypt       # Open a sealed document as a domain
//! │   └── inspect       # Show recipients and requirements
//! └── core/             # Core library components
//!     ├── kms/          # KMS client trait
//!     │   ├── aws       # AWS KMS (feature `aws`)
//!     │   ├── gcp       # GCP Cloud KMS via gcloud (feature `gcp`)
//!     │   └── stub      # In-process KMS (feature `test-kms`)
//!     ├── aead/         # Envelope AEAD and content keys
//!     ├── hybrid        # age X25519 wrapping
//!     ├── keys/         # Document key pairs and protected keysets
//!     ├── recipient     # Domains and the recipient directory
//!     ├── fetch         # Public keyset retrieval
//!     ├── envelope/     # Document envelope builder and opener
//!     ├── carrier       # HTML carrier documents
//!     └── config        # docseal.toml management
//! ```
//!
//! # Layers
//!
//! KMS master key → envelope AEAD data key → document key pair →
//! per-recipient content key → document body. Each layer's ciphertext is
//! useless without the key from the layer above it.
//!
//! ```no_run
//! use docseal::core::aead::EnvelopeAead;
//! use docseal::core::envelope::{EnvelopeBuilder, EnvelopeOpener};
//! use docseal::core::fetch::HttpKeyFetcher;
//! use docseal::core::keys::KeyManager;
//! use docseal::core::kms::{self, Credentials, KeyReference};
//! use docseal::core::recipient::{KeyLocation, RecipientDirectory};
//!
//! # fn main() -> docseal::error::Result<()> {
//! let reference = KeyReference::parse("aws-kms://arn:aws:kms:us-east-1:123456789012:key/abc")?;
//! let client = kms::connect(&reference, &Credentials::default())?;
//! let manager = KeyManager::new(EnvelopeAead::new(client));
//!
//! let pair = manager.generate();
//! let protected = manager.protect(pair.private())?;
//!
//! let mut directory = RecipientDirectory::new();
//! directory.insert("local", KeyLocation::Inline(pair.public().clone()))?;
//!
//! let fetcher = HttpKeyFetcher::new()?;
//! let envelope = EnvelopeBuilder::new(&fetcher).build(b"hello", ["subscriber"], &directory)?;
//!
//! let private = manager.recover(&protected)?;
//! let body = EnvelopeOpener::new().open(&envelope, "local", &private)?;
//! assert_eq!(body, b"hello");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod core;
pub mod error;

pub use error::{Error, ErrorKind, Result};
