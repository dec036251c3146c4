// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Options for the natives plugin.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{NativesError, Result};

/// Name of the optional project-level options file.
pub const OPTIONS_FILE: &str = "forge-vite.toml";

/// Options for the natives plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativesOptions {
    /// Directory under `outDir` receiving the CommonJS bundles
    pub natives_dir: String,

    /// File extension of compiled native addons
    pub binary_extension: String,

    /// Node.js executable used to run webpack and to introspect exports
    pub node: PathBuf,

    /// webpack `target` for the CommonJS bundles
    pub target: String,

    /// Directory, relative to the bundle, that relocated binaries are copied to
    pub asset_base: String,

    /// Remember packages proven to have no binary for the rest of the process
    pub cache_not_native: bool,
}

impl Default for NativesOptions {
    fn default() -> Self {
        Self {
            natives_dir: ".natives".to_string(),
            binary_extension: "node".to_string(),
            node: PathBuf::from("node"),
            target: "node14".to_string(),
            asset_base: "native_modules".to_string(),
            cache_not_native: false,
        }
    }
}

/// Layout of `forge-vite.toml`.
#[derive(Debug, Default, Deserialize)]
struct OptionsFile {
    #[serde(default)]
    natives: Option<NativesOptions>,
}

impl NativesOptions {
    /// Load options for a project: defaults, then `forge-vite.toml`, then the environment.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(OPTIONS_FILE);
        let mut options = if path.is_file() {
            debug!("Loading options from {}", path.display());
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        options.load_from_env();
        options.validate()?;

        Ok(options)
    }

    /// Parse options from a TOML file with a `[natives]` table.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: OptionsFile = toml::from_str(&content)?;
        Ok(file.natives.unwrap_or_default())
    }

    /// Apply `FORGE_VITE_*` environment overrides.
    fn load_from_env(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(option) = key.strip_prefix("FORGE_VITE_") {
                self.set(&option.to_lowercase(), &value);
            }
        }
    }

    /// Set an option by its snake_case name. Unknown names are ignored.
    pub fn set(&mut self, key: &str, value: &str) {
        match key {
            "natives_dir" => self.natives_dir = value.to_string(),
            "binary_extension" => self.binary_extension = value.trim_start_matches('.').to_string(),
            "node" => self.node = PathBuf::from(value),
            "target" => self.target = value.to_string(),
            "asset_base" => self.asset_base = value.to_string(),
            "cache_not_native" => self.cache_not_native = value == "true" || value == "1",
            _ => {}
        }
    }

    /// Reject options that would produce unusable paths.
    pub fn validate(&self) -> Result<()> {
        if self.natives_dir.is_empty() || Path::new(&self.natives_dir).is_absolute() {
            return Err(NativesError::Config(format!(
                "natives_dir must be a relative directory name, got '{}'",
                self.natives_dir
            )));
        }
        if self.binary_extension.is_empty() {
            return Err(NativesError::Config("binary_extension must not be empty".into()));
        }
        Ok(())
    }
}
