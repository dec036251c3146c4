// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host plugin contract
//!
//! The subset of the Vite (Rollup) plugin interface the plugins in this crate
//! implement: `configResolved`, `resolveId` and `load`. Every hook declines
//! with `Ok(None)` for anything the plugin does not own, so the host falls
//! through to its default behavior.

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Plugin ordering relative to the host's core plugins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enforce {
    /// Run before `vite:resolve`
    Pre,
    /// Run after the core plugins
    Post,
}

/// Read-only snapshot of the resolved build options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Project root (`config.root`)
    pub root: PathBuf,
    /// Output directory, relative to `root` unless absolute (`config.build.outDir`)
    pub out_dir: PathBuf,
    /// Whether the build minifies (`!!config.build.minify`)
    pub minify: bool,
}

impl ResolvedConfig {
    /// Create a new build options snapshot
    pub fn new(root: impl Into<PathBuf>, out_dir: impl Into<PathBuf>, minify: bool) -> Self {
        Self {
            root: root.into(),
            out_dir: out_dir.into(),
            minify,
        }
    }

    /// Absolute output directory
    pub fn out_dir_path(&self) -> PathBuf {
        self.root.join(&self.out_dir)
    }
}

/// Result of a `resolveId` hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedId {
    /// Module id placed in the host's module graph
    pub id: String,
    /// Whether the host should treat the module as external
    pub external: bool,
}

impl ResolvedId {
    /// Create a new resolved id
    pub fn new(id: impl Into<String>, external: bool) -> Self {
        Self {
            id: id.into(),
            external,
        }
    }
}

/// A Vite plugin
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique plugin name
    fn name(&self) -> &str;

    /// Ordering hint for the host
    fn enforce(&self) -> Option<Enforce> {
        None
    }

    /// Called once with the final build options
    fn config_resolved(&mut self, _config: &ResolvedConfig) {}

    /// Resolve an import specifier; `importer` is `None` for entry points
    async fn resolve_id(&self, _specifier: &str, _importer: Option<&Path>) -> Result<Option<ResolvedId>> {
        Ok(None)
    }

    /// Provide the source of a module id
    async fn load(&self, _id: &str) -> Result<Option<String>> {
        Ok(None)
    }
}
