// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Vite configuration assembly for the main process, preload scripts and
//! renderers. The generated objects are the base configs the user's own Vite
//! configs get merged onto.

mod types;

pub use types::{BuildTarget, VitePluginBuildConfig, VitePluginConfig, VitePluginRendererConfig};

use crate::error::{NativesError, Result};
use crate::natives::PLUGIN_NAME;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Node.js built-in modules, always external to main/preload bundles
pub const BUILTIN_MODULES: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
    "crypto", "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "http", "http2",
    "https", "inspector", "module", "net", "os", "path", "perf_hooks", "process", "punycode",
    "querystring", "readline", "repl", "stream", "string_decoder", "sys", "timers", "tls",
    "trace_events", "tty", "url", "util", "v8", "vm", "wasi", "worker_threads", "zlib",
];

/// First port handed to renderer dev servers
pub const DEFAULT_DEV_SERVER_PORT: u16 = 5173;

/// Modules left to `require()` at runtime: `electron` plus every built-in,
/// bare and `node:`-prefixed
pub fn external_modules() -> Vec<String> {
    std::iter::once("electron".to_string())
        .chain(BUILTIN_MODULES.iter().map(|m| m.to_string()))
        .chain(BUILTIN_MODULES.iter().map(|m| format!("node:{m}")))
        .collect()
}

/// One generated build config
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedBuildConfig {
    /// Target process
    pub target: BuildTarget,
    /// User config to merge onto `vite`
    pub user_config: Option<String>,
    /// Base Vite config
    pub vite: Value,
}

/// Generates Vite configs from the plugin configuration
#[derive(Debug, Clone)]
pub struct ViteConfigGenerator {
    config: VitePluginConfig,
    project_dir: PathBuf,
    is_prod: bool,
    dev_server_ports: HashMap<String, u16>,
}

impl ViteConfigGenerator {
    /// Create a generator for the project at `project_dir`
    pub fn new(config: VitePluginConfig, project_dir: impl Into<PathBuf>, is_prod: bool) -> Self {
        Self {
            config,
            project_dir: project_dir.into(),
            is_prod,
            dev_server_ports: HashMap::new(),
        }
    }

    /// Record the port a renderer's dev server actually listens on
    pub fn set_dev_server_port(&mut self, renderer: &str, port: u16) {
        self.dev_server_ports.insert(renderer.to_string(), port);
    }

    /// Port of a renderer's dev server
    pub fn dev_server_port(&self, index: usize, renderer: &str) -> u16 {
        self.dev_server_ports
            .get(renderer)
            .copied()
            .unwrap_or_else(|| DEFAULT_DEV_SERVER_PORT.saturating_add(index as u16))
    }

    /// Root of all build output
    pub fn base_dir(&self) -> PathBuf {
        self.project_dir.join(".vite")
    }

    fn mode(&self) -> &'static str {
        if self.is_prod { "production" } else { "development" }
    }

    /// Entry point defines injected into the main process, keyed by constant name
    ///
    /// Values are JavaScript expressions: JSON strings, or `undefined`.
    pub fn defines(&self) -> BTreeMap<String, String> {
        let mut define = BTreeMap::new();

        for (index, renderer) in self.config.renderer.iter().enumerate() {
            let name = define_name(&renderer.name);
            let url = if self.is_prod {
                "undefined".to_string()
            } else {
                quote(&format!("http://localhost:{}", self.dev_server_port(index, &renderer.name)))
            };
            define.insert(format!("{name}_VITE_DEV_SERVER_URL"), url);
            define.insert(format!("{name}_VITE_NAME"), quote(&renderer.name));
        }

        define
    }

    /// Base configs for every main process and preload build
    pub fn build_configs(&self) -> Result<Vec<GeneratedBuildConfig>> {
        self.config
            .build
            .iter()
            .map(|build| {
                let entry = build
                    .entry
                    .as_deref()
                    .ok_or_else(|| NativesError::Config("build entry requires an \"entry\" path".into()))?;

                let mut vite = self.base_build_config();
                let specific = match build.target {
                    BuildTarget::Main => self.main_config(entry),
                    BuildTarget::Preload => preload_config(entry),
                };
                merge(&mut vite, specific);

                Ok(GeneratedBuildConfig {
                    target: build.target,
                    user_config: build.config.clone(),
                    vite,
                })
            })
            .collect()
    }

    /// Base configs for every renderer
    pub fn renderer_configs(&self) -> Vec<Value> {
        self.config
            .renderer
            .iter()
            .map(|renderer| {
                json!({
                    "mode": self.mode(),
                    "base": "./",
                    "build": {
                        "outDir": path_value(&self.base_dir().join("renderer").join(&renderer.name)),
                    },
                    "clearScreen": false,
                })
            })
            .collect()
    }

    fn base_build_config(&self) -> Value {
        let mut build = json!({
            "emptyOutDir": false,
            "outDir": path_value(&self.base_dir().join("build")),
            "rollupOptions": { "external": external_modules() },
        });
        if !self.is_prod {
            build["watch"] = json!({});
        }

        json!({
            "mode": self.mode(),
            "build": build,
            "clearScreen": false,
            "plugins": [PLUGIN_NAME],
        })
    }

    fn main_config(&self, entry: &str) -> Value {
        json!({
            "build": {
                "lib": {
                    "entry": entry,
                    "fileName": "[name].js",
                    "formats": ["cjs"],
                },
            },
            "define": self.defines(),
            "resolve": {
                // Load the Node.js entry
                "conditions": ["node"],
                "mainFields": ["module", "jsnext:main", "jsnext"],
            },
        })
    }
}

fn preload_config(entry: &str) -> Value {
    json!({
        "build": {
            "rollupOptions": {
                // Preload scripts may pull in web assets, so `input` rather than `lib.entry`
                "input": entry,
                "output": {
                    "format": "cjs",
                    // Must not split chunks
                    "inlineDynamicImports": true,
                    "entryFileNames": "[name].js",
                    "chunkFileNames": "[name].js",
                    "assetFileNames": "[name].[ext]",
                },
            },
        },
    })
}

/// `main window` -> `MAIN_WINDOW`
fn define_name(renderer: &str) -> String {
    renderer.to_uppercase().replace(' ', "_")
}

fn quote(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

/// Deep-merge `overrides` into `base`; objects merge, everything else replaces
fn merge(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => merge_maps(base, overrides),
        (base, overrides) => *base = overrides,
    }
}

fn merge_maps(base: &mut Map<String, Value>, overrides: Map<String, Value>) {
    for (key, value) in overrides {
        match base.get_mut(&key) {
            Some(existing) => merge(existing, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}
