//! Runtime options for the VFK readers.
//!
//! Options are an explicit value handed to a reader at construction, so two
//! readers in one process never share hidden state. They are layered with
//! `figment`, later layers winning:
//!
//! 1. built-in defaults ([`ReaderOptions::default`]),
//! 2. an optional TOML file ([`ReaderOptions::from_file`]),
//! 3. `OGR_VFK_DB_*` environment variables.
//!
//! | Key         | Environment variable   | Meaning                                   |
//! |-------------|------------------------|-------------------------------------------|
//! | `name`      | `OGR_VFK_DB_NAME`      | Cache file location override              |
//! | `overwrite` | `OGR_VFK_DB_OVERWRITE` | Always rebuild an existing cache          |
//! | `delete`    | `OGR_VFK_DB_DELETE`    | Delete the cache file when the reader is dropped |
//! | `spatial`   | `OGR_VFK_DB_SPATIAL`   | Persist rebuilt geometry into the cache   |

pub mod error;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of the environment variables read by [`ReaderOptions::from_env`].
pub const ENV_PREFIX: &str = "OGR_VFK_DB_";

/// Options controlling where and how the cache-backed reader persists data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Explicit cache location. When set, the cache is never considered
    /// stale because of its modification time.
    #[serde(rename = "name", skip_serializing_if = "Option::is_none")]
    pub db_name: Option<PathBuf>,
    /// Delete and rebuild an existing cache unconditionally.
    #[serde(deserialize_with = "flag")]
    pub overwrite: bool,
    /// Delete the cache file when the reader is dropped.
    #[serde(rename = "delete", deserialize_with = "flag")]
    pub delete_on_close: bool,
    /// Persist geometry into the cache once it has been rebuilt.
    #[serde(deserialize_with = "flag")]
    pub spatial: bool,
}
impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            db_name: None,
            overwrite: false,
            delete_on_close: false,
            spatial: true,
        }
    }
}
impl ReaderOptions {
    /// Defaults overlaid with the environment.
    pub fn from_env() -> Result<Self> {
        Self::extract(Self::base())
    }

    /// Defaults overlaid with a TOML file, then the environment.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        let figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX));
        Self::extract(figment)
    }

    fn base() -> Figment {
        Figment::from(Serialized::defaults(Self::default())).merge(Env::prefixed(ENV_PREFIX))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let options: Self = figment.extract().or_raise(|| ErrorKind::Invalid)?;
        tracing::debug!(?options, "Loaded reader options");
        Ok(options)
    }

    pub fn with_db_name(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_name = Some(path.into());
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_delete_on_close(mut self, delete: bool) -> Self {
        self.delete_on_close = delete;
        self
    }

    pub fn with_spatial(mut self, spatial: bool) -> Self {
        self.spatial = spatial;
        self
    }
}

/// Boolean accepting the spellings operators actually type into environment
/// variables: `YES`/`NO`, `ON`/`OFF`, `TRUE`/`FALSE`, `1`/`0`.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }
    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Int(value) => Ok(value != 0),
        Flag::Text(value) => parse_flag(&value).ok_or_else(|| D::Error::custom(format!("not a boolean: {value}"))),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_uppercase().as_str() {
        "YES" | "ON" | "TRUE" | "1" => Some(true),
        "NO" | "OFF" | "FALSE" | "0" | "" => Some(false),
        _ => None,
    }
}
