//! Configuration types for Lakelog
//!
//! Every field has a default so a partial TOML file (or none at all) is a
//! valid configuration. Values are layered: defaults, then the optional
//! file, then `LAKELOG__`-prefixed environment variables.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Environment variable prefix, e.g. `LAKELOG__COMMITS__DELETE_BATCH_SIZE=50`
pub const ENV_PREFIX: &str = "LAKELOG";

/// Root configuration for Lakelog
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Metadata store configuration
    pub store: StoreConfig,
    /// Coordinated commits configuration
    pub commits: CommitsConfig,
}

impl Config {
    /// Load configuration from an optional file plus the environment.
    ///
    /// # Errors
    /// Returns `Error::Configuration` if a source cannot be parsed or the
    /// resulting values are invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let config: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the commit log cannot operate with.
    ///
    /// # Errors
    /// Returns `Error::Configuration` naming the offending key.
    pub fn validate(&self) -> Result<()> {
        self.commits.validate()
    }
}

/// HTTP server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address for the HTTP API
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

/// Metadata store configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// redb database file
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/lakelog/meta.redb"),
        }
    }
}

/// Coordinated commits configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitsConfig {
    /// Ceiling on retained (not yet trimmed) commits per table. Also bounds
    /// how many commits a single `getCommits` call fetches.
    pub max_commits_per_table: u64,
    /// Rows deleted per trim transaction
    pub delete_batch_size: u64,
    /// Trim batches attempted per backfill report
    pub delete_max_retries: u32,
}

impl Default for CommitsConfig {
    fn default() -> Self {
        Self {
            max_commits_per_table: 50,
            delete_batch_size: 100,
            delete_max_retries: 5,
        }
    }
}

impl CommitsConfig {
    /// # Errors
    /// Returns `Error::Configuration` if any limit is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_commits_per_table == 0 {
            return Err(Error::configuration(
                "commits.max_commits_per_table must be greater than 0",
            ));
        }
        if self.delete_batch_size == 0 {
            return Err(Error::configuration(
                "commits.delete_batch_size must be greater than 0",
            ));
        }
        if self.delete_max_retries == 0 {
            return Err(Error::configuration(
                "commits.delete_max_retries must be greater than 0",
            ));
        }
        Ok(())
    }
}
