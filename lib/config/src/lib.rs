use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;

/// Loads a config file, if one is given and exists, and deserializes
/// it into `T`. The caller is expected to layer environment variable
/// overrides on top of the result (see `bin/core/src/config.rs`),
/// mirroring how a config-path-plus-env composition root is built.
pub struct ConfigLoader<'a> {
  /// Path to a single TOML config file. `None` (or a nonexistent
  /// path) falls back to `T::default()`.
  pub path: Option<&'a Path>,
  /// Print the merged config to stdout before returning it.
  pub debug_print: bool,
}

impl<'a> ConfigLoader<'a> {
  pub fn new(path: Option<&'a Path>) -> Self {
    Self { path, debug_print: false }
  }

  pub fn debug_print(mut self, debug_print: bool) -> Self {
    self.debug_print = debug_print;
    self
  }

  pub fn load<T: DeserializeOwned + Default + std::fmt::Debug>(
    &self,
  ) -> anyhow::Result<T> {
    let config = match self.path {
      Some(path) if path.exists() => {
        let contents = std::fs::read_to_string(path)
          .with_context(|| format!("failed to read config file at {path:?}"))?;
        toml::from_str(&contents).with_context(|| {
          format!("failed to parse config file at {path:?} as TOML")
        })?
      }
      _ => T::default(),
    };
    if self.debug_print {
      println!("{config:#?}");
    }
    Ok(config)
  }
}

/// Resolves a config file path from a CLI override or a default
/// location, returning `None` if neither exists.
pub fn resolve_config_path(
  cli_override: Option<PathBuf>,
  default: &Path,
) -> Option<PathBuf> {
  let path = cli_override.unwrap_or_else(|| default.to_path_buf());
  path.exists().then_some(path)
}
