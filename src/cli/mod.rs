//! Command-line interface.

pub mod decrypt;
pub mod encrypt;
pub mod inspect;
pub mod keygen;
pub mod output;
pub mod rotate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use crate::core::config::Config;
use crate::core::constants;
use crate::core::kms::{self, KeyReference, KmsClient};
use crate::error::{ConfigError, Result};

/// docseal - multi-recipient document envelopes with KMS-protected keys.
#[derive(Parser)]
#[command(name = "docseal", version, about)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the config file
    #[arg(long, global = true, env = constants::CONFIG_ENV, default_value = constants::CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// KMS selection shared by commands that touch the private keyset.
#[derive(Args, Debug, Clone, Default)]
pub struct KmsArgs {
    /// KMS master key (aws-kms://arn:... or gcp-kms://projects/...)
    #[arg(long = "kms", env = "DOCSEAL_KMS_KEY")]
    pub key: Option<String>,

    /// GCP service-account credentials file
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// AWS profile name
    #[arg(long)]
    pub profile: Option<String>,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Generate a document key pair, protect the private half with KMS
    Keygen {
        #[command(flatten)]
        kms: KmsArgs,
        /// Where to write the protected private keyset
        #[arg(long)]
        private: Option<PathBuf>,
        /// Where to write the public keyset
        #[arg(long)]
        public: Option<PathBuf>,
        /// Overwrite existing key files
        #[arg(short, long)]
        force: bool,
    },

    /// Add a new primary key to an existing key pair
    Rotate {
        #[command(flatten)]
        kms: KmsArgs,
        #[arg(long)]
        private: Option<PathBuf>,
        #[arg(long)]
        public: Option<PathBuf>,
        /// Drop every non-primary key after rotating
        #[arg(long)]
        prune: bool,
    },

    /// Encrypt the content section of an HTML document
    Encrypt {
        /// Input HTML file
        #[arg(short, long)]
        input: PathBuf,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
        /// Access requirement granted on decryption (repeatable)
        #[arg(short = 'a', long = "access-requirement", required = true)]
        access_requirements: Vec<String>,
        /// Recipient as `<domain>,<key-url>` (repeatable)
        #[arg(short, long = "recipient", value_parser = parse_recipient_arg)]
        recipients: Vec<(String, String)>,
        /// Write the envelope as JSON instead of a sealed HTML document
        #[arg(long)]
        json: bool,
    },

    /// Decrypt a sealed document for a recipient domain
    Decrypt {
        #[command(flatten)]
        kms: KmsArgs,
        /// Sealed HTML document or envelope JSON
        #[arg(short, long)]
        input: PathBuf,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Recipient domain to decrypt as
        #[arg(short, long, default_value = constants::LOCAL_DOMAIN)]
        domain: String,
        /// Protected private keyset
        #[arg(long)]
        private: Option<PathBuf>,
    },

    /// Show the recipients and access requirements of a sealed document
    Inspect {
        /// Sealed HTML document or envelope JSON
        input: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Parse `<domain>,<url>`.
fn parse_recipient_arg(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once(',') {
        Some((domain, url)) if !domain.trim().is_empty() && !url.trim().is_empty() => {
            Ok((domain.trim().to_string(), url.trim().to_string()))
        }
        _ => Err(format!("expected <domain>,<url>, got '{}'", raw)),
    }
}

/// Execute a command.
pub fn execute(command: Command, config_path: &Path) -> Result<()> {
    use Command::*;

    let config = Config::load_or_default(config_path)?;

    match command {
        Keygen {
            kms,
            private,
            public,
            force,
        } => keygen::execute(&config, &kms, private, public, force),
        Rotate {
            kms,
            private,
            public,
            prune,
        } => rotate::execute(&config, &kms, private, public, prune),
        Encrypt {
            input,
            output,
            access_requirements,
            recipients,
            json,
        } => encrypt::execute(&config, &input, &output, access_requirements, recipients, json),
        Decrypt {
            kms,
            input,
            output,
            domain,
            private,
        } => decrypt::execute(&config, &kms, &input, output.as_deref(), &domain, private),
        Inspect { input, json } => inspect::execute(&input, json),
    }
}

/// Connect to the KMS named by flags, falling back to the config file.
pub(crate) fn connect_kms(config: &Config, args: &KmsArgs) -> Result<Arc<dyn KmsClient>> {
    let reference = match &args.key {
        Some(key) => KeyReference::parse(key)?,
        None => config
            .key_reference()?
            .ok_or(ConfigError::MissingField { field: "kms.key" })?,
    };

    let mut credentials = config.credentials();
    if args.credentials.is_some() {
        credentials.credentials_file = args.credentials.clone();
    }
    if args.profile.is_some() {
        credentials.profile = args.profile.clone();
    }

    kms::connect(&reference, &credentials)
}

/// Read a sealed input, accepting either envelope JSON or a sealed carrier.
pub(crate) fn read_envelope(
    input: &Path,
) -> Result<(String, crate::core::envelope::DocumentEnvelope, bool)> {
    let text = std::fs::read_to_string(input)?;
    if text.trim_start().starts_with('{') {
        let envelope = crate::core::envelope::DocumentEnvelope::from_json(&text)?;
        Ok((text, envelope, true))
    } else {
        let envelope = crate::core::carrier::extract(&text)?;
        Ok((text, envelope, false))
    }
}
