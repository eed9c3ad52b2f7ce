//! Error types.
//!
//! Each concern has its own enum; [`Error`] unifies them so that `?` works
//! across layers without discarding the failure kind. No variant carries
//! secret key material or recovered plaintext.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Kms(#[from] KmsError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad failure category, used by callers to decide between aborting,
/// retrying, or reporting the input back to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad key reference, missing credentials, denied key, bad config.
    Configuration,
    /// KMS or network unreachable. The caller owns retry policy.
    Transport,
    /// Authentication failure or unparsable ciphertext. Never retried.
    Cryptographic,
    /// Input rejected: recipients, access requirements, carrier layout.
    Policy,
    Io,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Kms(KmsError::Unavailable(_)) => ErrorKind::Transport,
            Self::Kms(_) => ErrorKind::Configuration,
            Self::Cipher(_) => ErrorKind::Cryptographic,
            Self::Key(KeyError::RecoveryFailed(inner)) => inner.kind(),
            Self::Key(KeyError::Fetch { .. }) => ErrorKind::Transport,
            Self::Key(KeyError::AlreadyExists(_)) => ErrorKind::Io,
            Self::Key(_) => ErrorKind::Cryptographic,
            Self::Policy(_) | Self::Document(_) => ErrorKind::Policy,
            Self::Config(_) => ErrorKind::Configuration,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// True for failures that mean "the data did not authenticate".
    pub fn is_integrity_failure(&self) -> bool {
        match self {
            Self::Cipher(CipherError::IntegrityFailure) => true,
            Self::Key(KeyError::RecoveryFailed(inner)) => inner.is_integrity_failure(),
            _ => false,
        }
    }
}

/// KMS adapter errors.
#[derive(Error, Debug)]
pub enum KmsError {
    #[error("invalid KMS key reference: {0}")]
    InvalidKeyReference(String),

    #[error("KMS credentials unavailable: {0}")]
    Credentials(String),

    #[error("KMS unavailable: {0}")]
    Unavailable(String),

    #[error("KMS access denied: {0}")]
    AccessDenied(String),
}

/// Symmetric and hybrid encryption errors.
#[derive(Error, Debug)]
pub enum CipherError {
    /// Authentication failed. Deliberately carries no detail.
    #[error("integrity check failed")]
    IntegrityFailure,

    #[error("malformed ciphertext blob: {0}")]
    MalformedBlob(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
}

/// Document key pair errors.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("failed to recover private keyset: {0}")]
    RecoveryFailed(#[source] Box<Error>),

    #[error("invalid keyset: {0}")]
    InvalidKeyset(String),

    #[error("failed to fetch public keyset from {location}: {reason}")]
    Fetch { location: String, reason: String },

    #[error("key file already exists: {0} (use --force to overwrite)")]
    AlreadyExists(PathBuf),
}

/// Input policy errors. Messages name the offending input, never secrets.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("at least one access requirement is required")]
    EmptyAccessRequirements,

    #[error("invalid domain '{domain}': {reason}")]
    InvalidDomain { domain: String, reason: String },

    #[error("invalid recipient set: {0}")]
    InvalidRecipientSet(String),

    #[error("public key retrieval failed for '{domain}': {reason}")]
    PublicKeyRetrievalFailed { domain: String, reason: String },

    #[error("recipient not authorized: {0}")]
    RecipientNotAuthorized(String),
}

/// Configuration file errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read config: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("missing required value: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Carrier document and envelope artifact errors.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("no content section found (expected <section subscriptions-section=\"content\">)")]
    MissingSection,

    #[error("unterminated content section")]
    UnterminatedSection,

    #[error("no </head> tag found to hold the key block")]
    MissingHead,

    #[error("no cryptokeys block found")]
    MissingKeyBlock,

    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("decrypted content is not valid UTF-8")]
    InvalidUtf8,
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let err: Error = KmsError::Unavailable("timeout".into()).into();
        assert_eq!(err.kind(), ErrorKind::Transport);

        let err: Error = KmsError::AccessDenied("nope".into()).into();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err: Error = CipherError::IntegrityFailure.into();
        assert_eq!(err.kind(), ErrorKind::Cryptographic);

        let err: Error = PolicyError::EmptyAccessRequirements.into();
        assert_eq!(err.kind(), ErrorKind::Policy);
    }

    #[test]
    fn test_recovery_failure_keeps_inner_kind() {
        let inner: Error = CipherError::IntegrityFailure.into();
        let err: Error = KeyError::RecoveryFailed(Box::new(inner)).into();
        assert_eq!(err.kind(), ErrorKind::Cryptographic);
        assert!(err.is_integrity_failure());

        let inner: Error = KmsError::Unavailable("down".into()).into();
        let err: Error = KeyError::RecoveryFailed(Box::new(inner)).into();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(!err.is_integrity_failure());
    }

    #[test]
    fn test_integrity_message_has_no_detail() {
        let err: Error = CipherError::IntegrityFailure.into();
        assert_eq!(err.to_string(), "integrity check failed");
    }
}
