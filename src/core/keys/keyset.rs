//! Document keysets.
//!
//! A keyset holds one or more age X25519 keys, each tagged with a random
//! numeric id, one of which is primary. New wrapped keys always target the
//! primary key; decryption tries every private key.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use age::secrecy::ExposeSecret;
use age::x25519;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::core::constants::KEY_ALGORITHM;
use crate::error::{KeyError, Result};

/// Public half of a keyset. Contains no secret material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyset {
    primary_key_id: u32,
    keys: Vec<PublicKey>,
}

/// One public key in a [`PublicKeyset`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    key_id: u32,
    algorithm: String,
    public_key: String,
}

impl PublicKey {
    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    /// The `age1...` recipient string.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }
}

impl PublicKeyset {
    /// Parse and validate a JSON public keyset.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidKeyset` if the JSON is malformed, the key
    /// list is empty, ids repeat, the primary id is absent, or a key is not
    /// a valid age X25519 recipient. A Tink keyset (as served by the default
    /// fallback key URL) is named as such in the error.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let keyset: Self = serde_json::from_slice(bytes).map_err(|e| {
            if is_tink_keyset(bytes) {
                KeyError::InvalidKeyset(format!(
                    "found a Tink keyset, not an {} keyset",
                    KEY_ALGORITHM
                ))
            } else {
                KeyError::InvalidKeyset(format!("invalid public keyset JSON: {}", e))
            }
        })?;
        keyset.validate()?;
        Ok(keyset)
    }

    /// Pretty-printed JSON, the persisted public-key artifact.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| KeyError::InvalidKeyset(format!("failed to serialize: {}", e)).into())
    }

    fn validate(&self) -> Result<()> {
        validate_ids(self.primary_key_id, self.keys.iter().map(|k| k.key_id))?;
        for key in &self.keys {
            if key.algorithm != KEY_ALGORITHM {
                return Err(KeyError::InvalidKeyset(format!(
                    "key {} has unsupported algorithm '{}'",
                    key.key_id, key.algorithm
                ))
                .into());
            }
            parse_recipient(&key.public_key)?;
        }
        Ok(())
    }

    pub fn primary_key_id(&self) -> u32 {
        self.primary_key_id
    }

    pub fn keys(&self) -> &[PublicKey] {
        &self.keys
    }

    /// Recipient for the primary key.
    pub fn primary_recipient(&self) -> Result<x25519::Recipient> {
        let primary = self
            .keys
            .iter()
            .find(|k| k.key_id == self.primary_key_id)
            .ok_or_else(|| KeyError::InvalidKeyset("primary key missing".to_string()))?;
        parse_recipient(&primary.public_key)
    }
}

struct PrivateKey {
    key_id: u32,
    identity: x25519::Identity,
}

/// Private half of a keyset.
///
/// Deliberately implements neither `Serialize` nor `Display`. The only
/// byte form is produced inside the key manager and goes straight into the
/// envelope AEAD.
pub struct PrivateKeyset {
    primary_key_id: u32,
    keys: Vec<PrivateKey>,
}

impl PrivateKeyset {
    pub fn primary_key_id(&self) -> u32 {
        self.primary_key_id
    }

    pub fn key_ids(&self) -> Vec<u32> {
        self.keys.iter().map(|k| k.key_id).collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Every identity, primary first.
    pub fn identities(&self) -> impl Iterator<Item = &x25519::Identity> {
        let primary = self.primary_key_id;
        self.keys
            .iter()
            .filter(move |k| k.key_id == primary)
            .chain(self.keys.iter().filter(move |k| k.key_id != primary))
            .map(|k| &k.identity)
    }

    fn public(&self) -> PublicKeyset {
        PublicKeyset {
            primary_key_id: self.primary_key_id,
            keys: self
                .keys
                .iter()
                .map(|k| PublicKey {
                    key_id: k.key_id,
                    algorithm: KEY_ALGORITHM.to_string(),
                    public_key: k.identity.to_public().to_string(),
                })
                .collect(),
        }
    }

    /// Canonical JSON bytes, held in a zeroizing buffer.
    pub(crate) fn to_canonical_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        let stored = StoredKeyset {
            primary_key_id: self.primary_key_id,
            keys: self
                .keys
                .iter()
                .map(|k| StoredKey {
                    key_id: k.key_id,
                    algorithm: KEY_ALGORITHM.to_string(),
                    secret_key: k.identity.to_string().expose_secret().to_string(),
                })
                .collect(),
        };

        let mut buf = Zeroizing::new(Vec::with_capacity(128 * stored.keys.len() + 64));
        serde_json::to_writer(&mut *buf, &stored)
            .map_err(|e| KeyError::InvalidKeyset(format!("failed to serialize: {}", e)))?;
        Ok(buf)
    }

    /// Parse bytes produced by [`PrivateKeyset::to_canonical_bytes`].
    pub(crate) fn from_canonical_bytes(bytes: &[u8]) -> Result<Self> {
        let stored: StoredKeyset = serde_json::from_slice(bytes)
            .map_err(|_| KeyError::InvalidKeyset("private keyset is not valid JSON".to_string()))?;

        validate_ids(stored.primary_key_id, stored.keys.iter().map(|k| k.key_id))?;

        let mut keys = Vec::with_capacity(stored.keys.len());
        for key in &stored.keys {
            if key.algorithm != KEY_ALGORITHM {
                return Err(KeyError::InvalidKeyset(format!(
                    "key {} has unsupported algorithm '{}'",
                    key.key_id, key.algorithm
                ))
                .into());
            }
            let identity = x25519::Identity::from_str(&key.secret_key).map_err(|_| {
                KeyError::InvalidKeyset(format!("key {} is not a valid age identity", key.key_id))
            })?;
            keys.push(PrivateKey {
                key_id: key.key_id,
                identity,
            });
        }

        Ok(Self {
            primary_key_id: stored.primary_key_id,
            keys,
        })
    }
}

impl fmt::Debug for PrivateKeyset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyset")
            .field("primary_key_id", &self.primary_key_id)
            .field("key_ids", &self.key_ids())
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
struct StoredKeyset {
    primary_key_id: u32,
    keys: Vec<StoredKey>,
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
struct StoredKey {
    key_id: u32,
    algorithm: String,
    secret_key: String,
}

/// A document key pair: the public keyset and its private counterpart.
#[derive(Debug)]
pub struct DocumentKeyPair {
    public: PublicKeyset,
    private: PrivateKeyset,
}

impl DocumentKeyPair {
    /// Fresh keyset with a single key.
    pub fn generate() -> Self {
        let key_id = fresh_key_id(&[]);
        let private = PrivateKeyset {
            primary_key_id: key_id,
            keys: vec![PrivateKey {
                key_id,
                identity: x25519::Identity::generate(),
            }],
        };
        debug!(key_id, "generated document key pair");
        Self::from_private(private)
    }

    /// Rebuild the pair from a recovered private keyset.
    pub fn from_private(private: PrivateKeyset) -> Self {
        Self {
            public: private.public(),
            private,
        }
    }

    pub fn public(&self) -> &PublicKeyset {
        &self.public
    }

    pub fn private(&self) -> &PrivateKeyset {
        &self.private
    }

    /// Add a fresh key and make it primary. Returns the new key id.
    pub fn rotate(&mut self) -> u32 {
        let key_id = fresh_key_id(&self.private.key_ids());
        self.private.keys.push(PrivateKey {
            key_id,
            identity: x25519::Identity::generate(),
        });
        self.private.primary_key_id = key_id;
        self.public = self.private.public();
        debug!(key_id, keys = self.private.len(), "rotated document key pair");
        key_id
    }

    /// Drop a non-primary key.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidKeyset` if `key_id` is the primary key or
    /// not present.
    pub fn remove(&mut self, key_id: u32) -> Result<()> {
        if key_id == self.private.primary_key_id {
            return Err(KeyError::InvalidKeyset(format!(
                "key {} is primary and cannot be removed",
                key_id
            ))
            .into());
        }
        let before = self.private.keys.len();
        self.private.keys.retain(|k| k.key_id != key_id);
        if self.private.keys.len() == before {
            return Err(KeyError::InvalidKeyset(format!("no key with id {}", key_id)).into());
        }
        self.public = self.private.public();
        debug!(key_id, "removed key from document key pair");
        Ok(())
    }
}

fn parse_recipient(public_key: &str) -> Result<x25519::Recipient> {
    x25519::Recipient::from_str(public_key).map_err(|_| {
        KeyError::InvalidKeyset(format!("invalid age public key: {}", public_key)).into()
    })
}

/// Tink JSON keysets carry `key[].keyData` where ours carry `keys[]`.
fn is_tink_keyset(bytes: &[u8]) -> bool {
    serde_json::from_slice::<serde_json::Value>(bytes)
        .ok()
        .and_then(|v| v.get("key").and_then(|k| k.as_array()).cloned())
        .map_or(false, |keys| keys.iter().any(|k| k.get("keyData").is_some()))
}

fn validate_ids(primary: u32, ids: impl Iterator<Item = u32>) -> Result<()> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(KeyError::InvalidKeyset(format!("duplicate key id {}", id)).into());
        }
    }
    if seen.is_empty() {
        return Err(KeyError::InvalidKeyset("keyset has no keys".to_string()).into());
    }
    if !seen.contains(&primary) {
        return Err(KeyError::InvalidKeyset(format!("primary key {} not in keyset", primary)).into());
    }
    Ok(())
}

fn fresh_key_id(existing: &[u32]) -> u32 {
    let mut rng = rand::thread_rng();
    loop {
        let id: u32 = rng.gen_range(1..=u32::MAX);
        if !existing.contains(&id) {
            return id;
        }
    }
}
