//! Constants used throughout docseal.
//!
//! Centralizes magic strings and protocol values.

/// Configuration file name (docseal.toml).
pub const CONFIG_FILE: &str = "docseal.toml";

/// Environment variable overriding the config file path.
pub const CONFIG_ENV: &str = "DOCSEAL_CONFIG";

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "DOCSEAL_LOG";

/// Default file name of the envelope-encrypted private keyset.
pub const PRIVATE_KEYSET_FILE: &str = "private_keyset.b64";

/// Default file name of the exported public keyset.
pub const PUBLIC_KEYSET_FILE: &str = "public_keyset.json";

/// Recipient domain of the publisher's own key pair.
pub const LOCAL_DOMAIN: &str = "local";

/// Reserved recipient domain that is always present in a built envelope.
pub const FALLBACK_DOMAIN: &str = "google.com";

/// Public keyset location used for [`FALLBACK_DOMAIN`] when none is configured.
pub const DEFAULT_FALLBACK_KEY_URL: &str =
    "https://news.google.com/swg/encryption/keys/dev/tink/public_key";

/// Timeout for public keyset retrieval.
pub const FETCH_TIMEOUT_SECS: u64 = 10;

/// Keyset key algorithm tag.
pub const KEY_ALGORITHM: &str = "age-x25519";

/// Opening tag prefix of the encrypted content section in a carrier.
pub const SECTION_OPEN: &str = "<section subscriptions-section=\"content\"";

/// Opening tag of the key block in a carrier.
pub const KEY_BLOCK_OPEN: &str = "<script type=\"application/json\" cryptokeys>";
