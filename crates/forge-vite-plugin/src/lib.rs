// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # forge-vite-plugin
//!
//! Vite plugin core for building Electron applications: main process,
//! preload scripts and renderer windows.
//!
//! The interesting part is the **natives** plugin. Native addons (`.node`
//! files) are CommonJS-only and cannot be bundled by Rollup, so every bare
//! import that resolves to a package containing a compiled binary is:
//!
//! 1. bundled on its own by webpack into `<outDir>/.natives/<name>.cjs`,
//! 2. introspected in Node.js to learn its top-level export names,
//! 3. replaced in the Vite module graph by a generated ES module shim that
//!    `require()`s the CommonJS bundle at runtime and re-exports each name.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use forge_vite_plugin::{NativesCache, NativesOptions, NativesPlugin, Plugin, ResolvedConfig};
//!
//! #[tokio::main]
//! async fn main() -> forge_vite_plugin::Result<()> {
//!     let mut plugin = NativesPlugin::new(NativesCache::shared(), NativesOptions::default());
//!     plugin.config_resolved(&ResolvedConfig::new("/app", ".vite/build", false));
//!
//!     if let Some(resolved) = plugin.resolve_id("better-sqlite3", Some("/app/src/main.js".as_ref())).await? {
//!         let shim = plugin.load(&resolved.id).await?;
//!         println!("{resolved:?} => {shim:?}");
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod natives;
mod node;
pub mod plugin;
pub mod vite_config;

// Re-exports
pub use config::NativesOptions;
pub use error::{NativesError, Result};
pub use natives::{
    Detection, ExportIntrospector, NativeModuleRecord, NativesCache, NativesPlugin,
    NodeIntrospector, SecondaryBundler, WebpackBundler, ID_PREFIX,
};
pub use plugin::{Enforce, Plugin, ResolvedConfig, ResolvedId};
pub use vite_config::{VitePluginConfig, ViteConfigGenerator};

/// Version of the plugin crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
