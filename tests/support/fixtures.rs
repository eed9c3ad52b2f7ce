//! Test fixtures: an in-memory KMS, a static key fetcher and sample pages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use zeroize::Zeroizing;

use docseal::core::aead::EnvelopeAead;
use docseal::core::fetch::KeyFetcher;
use docseal::core::keys::{KeyManager, PublicKeyset};
use docseal::core::kms::{KmsClient, KmsProvider};
use docseal::error::{CipherError, KeyError, KmsError, Result};

/// Sample carrier page with a nested section inside the content section.
pub const PAGE: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Morning edition</title>
</head>
<body>
<article>
<p>Everyone can read this.</p>
<section subscriptions-section="content" encrypted>
<p>Subscribers only.</p>
<section class="aside"><p>Nested aside</p></section>
</section>
</article>
</body>
</html>
"#;

/// Content section of [`PAGE`].
pub const PAGE_CONTENT: &str = "\n<p>Subscribers only.</p>\n<section class=\"aside\"><p>Nested aside</p></section>\n";

/// A Tink ECIES public keyset, the shape served by the default fallback
/// key URL.
pub const TINK_KEYSET: &str = r#"{
  "primaryKeyId": 1749387223,
  "key": [{
    "keyData": {
      "typeUrl": "type.googleapis.com/google.crypto.tink.EciesAeadHkdfPublicKey",
      "value": "EkQKBAgCEAMSOhI4CjB0eXBlLmdvb2dsZWFwaXMuY29t",
      "keyMaterialType": "ASYMMETRIC_PUBLIC"
    },
    "status": "ENABLED",
    "keyId": 1749387223,
    "outputPrefixType": "TINK"
  }]
}"#;

/// KMS stand-in holding an AES-256-GCM master key in memory.
///
/// Can be switched off to simulate an outage; counts wrap/unwrap calls.
#[derive(Debug)]
pub struct FakeKms {
    key: [u8; 32],
    down: AtomicBool,
    calls: AtomicUsize,
}

impl FakeKms {
    pub fn new() -> Self {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self {
            key,
            down: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(KmsError::Unavailable("fake kms is down".to_string()).into());
        }
        Ok(Aes256Gcm::new((&self.key).into()))
    }
}

impl KmsClient for FakeKms {
    fn wrap(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = self.cipher()?;
        let mut nonce = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ct = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CipherError::EncryptionFailed("fake kms".to_string()))?;
        let mut out = nonce.to_vec();
        out.extend_from_slice(&ct);
        Ok(out)
    }

    fn unwrap(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let cipher = self.cipher()?;
        if ciphertext.len() < 12 {
            return Err(CipherError::IntegrityFailure.into());
        }
        let (nonce, ct) = ciphertext.split_at(12);
        cipher
            .decrypt(Nonce::from_slice(nonce), ct)
            .map(Zeroizing::new)
            .map_err(|_| CipherError::IntegrityFailure.into())
    }

    fn provider(&self) -> KmsProvider {
        KmsProvider::Stub
    }
}

/// Key manager over a fresh [`FakeKms`].
pub fn fake_manager(kms: &Arc<FakeKms>) -> KeyManager {
    KeyManager::new(EnvelopeAead::new(kms.clone()))
}

/// Serves public keysets from memory by location.
///
/// Raw bodies registered with [`StaticFetcher::with_body`] go through
/// `PublicKeyset::from_json`, as an HTTP response would.
#[derive(Default)]
pub struct StaticFetcher {
    keys: HashMap<String, PublicKeyset>,
    bodies: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, location: &str, keyset: &PublicKeyset) -> Self {
        self.keys.insert(location.to_string(), keyset.clone());
        self
    }

    pub fn with_body(mut self, location: &str, body: &str) -> Self {
        self.bodies.insert(location.to_string(), body.to_string());
        self
    }
}

impl KeyFetcher for StaticFetcher {
    fn fetch(&self, location: &str) -> Result<PublicKeyset> {
        if let Some(body) = self.bodies.get(location) {
            return PublicKeyset::from_json(body.as_bytes());
        }
        self.keys.get(location).cloned().ok_or_else(|| {
            KeyError::Fetch {
                location: location.to_string(),
                reason: "404 Not Found".to_string(),
            }
            .into()
        })
    }
}
