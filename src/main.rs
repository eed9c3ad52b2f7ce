//! docseal - multi-recipient document envelopes with KMS-protected keys.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use docseal::cli::output;
use docseal::cli::{execute, Cli};
use docseal::core::constants::LOG_ENV;
use docseal::error::{ConfigError, Error, KeyError, KmsError, PolicyError};

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("docseal=debug")
        } else {
            EnvFilter::new("docseal=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).without_time())
        .init();

    if let Err(e) = execute(cli.command, &cli.config) {
        output::error(&e.to_string());
        if let Some(hint) = suggestion(&e) {
            output::hint(hint);
        }
        std::process::exit(1);
    }
}

fn suggestion(e: &Error) -> Option<&'static str> {
    match e {
        Error::Config(ConfigError::MissingField { field: "kms.key" }) => {
            Some("pass --kms or set [kms] key in docseal.toml")
        }
        Error::Kms(KmsError::Credentials(_)) => {
            Some("check --credentials / --profile or your cloud login")
        }
        Error::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
            Some("run: docseal keygen")
        }
        Error::Policy(PolicyError::RecipientNotAuthorized(_)) => {
            Some("run: docseal inspect <file> to list recipient domains")
        }
        Error::Key(KeyError::RecoveryFailed(inner)) if inner.is_integrity_failure() => {
            Some("the private keyset was sealed under a different KMS key")
        }
        _ => None,
    }
}
