// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Plugin configuration as written in the Forge config

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which Electron process a build entry targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildTarget {
    /// Main process
    #[default]
    Main,
    /// Preload script
    Preload,
}

/// A main process or preload build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VitePluginBuildConfig {
    /// Relative or absolute path to the entry file
    pub entry: Option<String>,
    /// Path to the user's Vite config for this build
    pub config: Option<String>,
    /// Target process
    #[serde(default)]
    pub target: BuildTarget,
}

/// A renderer (browser window)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VitePluginRendererConfig {
    /// Human friendly name of the window
    pub name: String,
    /// Path to the user's Vite config for this renderer
    pub config: Option<String>,
}

/// Configuration of the Vite plugin
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VitePluginConfig {
    /// Main process and preload builds
    #[serde(default)]
    pub build: Vec<VitePluginBuildConfig>,
    /// Renderer windows, one per `BrowserWindow` the app opens
    #[serde(default)]
    pub renderer: Vec<VitePluginRendererConfig>,
}

impl VitePluginConfig {
    /// Read the configuration from a JSON file
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize() {
        let config: VitePluginConfig = serde_json::from_str(
            r#"{
                "build": [
                    { "entry": "src/main.js", "config": "vite.main.config.mjs" },
                    { "entry": "src/preload.js", "target": "preload" }
                ],
                "renderer": [{ "name": "main_window", "config": "vite.renderer.config.mjs" }]
            }"#,
        )
        .unwrap();

        assert_eq!(config.build.len(), 2);
        assert_eq!(config.build[0].target, BuildTarget::Main);
        assert_eq!(config.build[1].target, BuildTarget::Preload);
        assert_eq!(config.build[1].config, None);
        assert_eq!(config.renderer[0].name, "main_window");
    }

    #[test]
    fn test_empty_config() {
        let config: VitePluginConfig = serde_json::from_str("{}").unwrap();
        assert!(config.build.is_empty());
        assert!(config.renderer.is_empty());
    }
}
