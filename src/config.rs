//! Configuration for the broker.
//!
//! Values come from environment variables (`MQLESS_*`, loaded via `envy`,
//! the config-file-loader's values-only replacement — see SPEC_FULL.md)
//! with CLI flags from [`Cli`] overlaid on top, matching the precedence of
//! the original `mqless` binary's explicit `--aws-*` flags over its config
//! file.

use clap::Parser;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use crate::error::Error;

/// Default configuration values used when not specified in environment or CLI.
pub mod defaults {
    pub const PORT: u16 = 34543;
    pub const AWS_ROLE: &str = "mqless-role";
}

/// Command-line flags, mirroring the original binary's `zargs`-based parser.
#[derive(Parser, Debug)]
#[command(name = "mqless", about = "Serverless-actor message broker")]
pub struct Cli {
    /// Load config-file (accepted for compatibility; this build resolves
    /// all configuration from environment variables and the flags below).
    #[arg(short = 'c', long = "config", default_value = "mqless.cfg")]
    pub config_file: String,

    /// Listening port
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Set aws access key
    #[arg(long = "aws-access-key")]
    pub aws_access_key: Option<String>,

    /// Set aws secret
    #[arg(long = "aws-secret")]
    pub aws_secret: Option<String>,

    /// Set aws region
    #[arg(long = "aws-region")]
    pub aws_region: Option<String>,
}

#[derive(Clone, Deserialize, Default)]
/// Broker configuration, loaded from `MQLESS_`-prefixed environment
/// variables and overridden by CLI flags.
pub struct Config {
    port: Option<u16>,
    aws_region: Option<String>,
    aws_access_key: Option<String>,
    aws_secret: Option<SecretString>,
    aws_endpoint: Option<Url>,
    aws_role: Option<String>,
}

impl Config {
    /// Loads configuration from the environment, then applies CLI overrides.
    ///
    /// Returns [`Error::IncompleteStaticCredentials`] if only some of
    /// `aws_region`/`aws_access_key`/`aws_secret` were provided — per the
    /// spec, these three must arrive together or not at all, in which case
    /// credentials are instead acquired from the instance metadata service.
    pub fn load(cli: &Cli) -> Result<Self, Error> {
        let mut config: Config = envy::prefixed("MQLESS_").from_env()?;

        if let Some(port) = cli.port {
            config.port = Some(port);
        }
        if let Some(region) = &cli.aws_region {
            config.aws_region = Some(region.clone());
        }
        if let Some(access_key) = &cli.aws_access_key {
            config.aws_access_key = Some(access_key.clone());
        }
        if let Some(secret) = &cli.aws_secret {
            config.aws_secret = Some(secret.clone().into());
        }

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        let provided = [
            self.aws_region.is_some(),
            self.aws_access_key.is_some(),
            self.aws_secret.is_some(),
        ];
        let count = provided.iter().filter(|p| **p).count();

        if count != 0 && count != 3 {
            return Err(Error::IncompleteStaticCredentials);
        }

        Ok(())
    }

    /// The TCP port the HTTP ingress listens on.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(defaults::PORT)
    }

    /// Explicit static credentials, if all three were provided. When this
    /// is `None` the broker acquires credentials from IMDS instead.
    pub fn static_credentials(&self) -> Option<(&str, &str, &str)> {
        match (&self.aws_region, &self.aws_access_key, &self.aws_secret) {
            (Some(region), Some(access_key), Some(secret)) => {
                Some((region, access_key, secret.expose_secret()))
            }
            _ => None,
        }
    }

    /// Override for the Lambda invocation base URL, used to point at a
    /// local Lambda emulator instead of `lambda.{region}.amazonaws.com`.
    pub fn aws_endpoint(&self) -> Option<&Url> {
        self.aws_endpoint.as_ref()
    }

    /// Instance role hint used when resolving IMDS credentials.
    pub fn aws_role(&self) -> &str {
        self.aws_role.as_deref().unwrap_or(defaults::AWS_ROLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(port: Option<u16>) -> Cli {
        Cli {
            config_file: "mqless.cfg".into(),
            port,
            aws_access_key: None,
            aws_secret: None,
            aws_region: None,
        }
    }

    #[test]
    fn default_port_is_spec_default() {
        let config = Config::default();
        assert_eq!(config.port(), defaults::PORT);
    }

    #[test]
    fn cli_port_overrides_default() {
        let mut config = Config::default();
        let cli = cli(Some(9000));
        config.port = cli.port;
        assert_eq!(config.port(), 9000);
    }

    #[test]
    fn partial_static_credentials_are_rejected() {
        let config = Config {
            aws_region: Some("us-west-2".into()),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::IncompleteStaticCredentials)
        ));
    }

    #[test]
    fn no_static_credentials_is_valid() {
        assert!(Config::default().validate().is_ok());
    }
}
