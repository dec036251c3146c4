// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The `natives` Vite plugin

use crate::config::NativesOptions;
use crate::error::Result;
use crate::natives::bundler::{BundleRequest, SecondaryBundler, WebpackBundler};
use crate::natives::cache::{NativeModuleRecord, NativesCache};
use crate::natives::detector::{Detection, NativeDetector, NativePackage};
use crate::natives::introspect::{ExportIntrospector, NodeIntrospector};
use crate::natives::shim;
use crate::plugin::{Enforce, Plugin, ResolvedConfig, ResolvedId};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Prefix of the synthetic ids given to diverted modules.
///
/// The leading NUL keeps Vite and other plugins from treating the id as a path.
pub const ID_PREFIX: &str = "\0forge-vite:";

/// Plugin name reported to the host
pub const PLUGIN_NAME: &str = "@electron-forge/plugin-vite:natives";

/// Build the synthetic id for a module
pub fn synthetic_id(module_name: &str) -> String {
    format!("{ID_PREFIX}{module_name}")
}

/// Diverts native packages through webpack and serves ES module shims for them
pub struct NativesPlugin {
    cache: Arc<NativesCache>,
    options: NativesOptions,
    detector: NativeDetector,
    bundler: Arc<dyn SecondaryBundler>,
    introspector: Arc<dyn ExportIntrospector>,
    config: Option<ResolvedConfig>,
}

impl std::fmt::Debug for NativesPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativesPlugin")
            .field("options", &self.options)
            .field("config", &self.config)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl NativesPlugin {
    /// Create the plugin with webpack and Node.js introspection
    pub fn new(cache: Arc<NativesCache>, options: NativesOptions) -> Self {
        let bundler = Arc::new(WebpackBundler::new(options.node.clone()));
        let introspector = Arc::new(NodeIntrospector::new(options.node.clone()));
        Self::with_services(cache, options, bundler, introspector)
    }

    /// Create the plugin with custom bundling and introspection services
    pub fn with_services(
        cache: Arc<NativesCache>,
        options: NativesOptions,
        bundler: Arc<dyn SecondaryBundler>,
        introspector: Arc<dyn ExportIntrospector>,
    ) -> Self {
        let detector = NativeDetector::new(Arc::clone(&cache), options.binary_extension.clone(), options.cache_not_native);
        Self {
            cache,
            options,
            detector,
            bundler,
            introspector,
            config: None,
        }
    }

    /// The cache this plugin reads and fills
    pub fn cache(&self) -> &Arc<NativesCache> {
        &self.cache
    }

    /// Inspect an import without building anything
    pub async fn detect(&self, specifier: &str, importer: Option<&Path>) -> Detection {
        self.detector.detect(specifier, importer).await
    }

    /// Bundle, introspect and shim a detected package
    async fn build_native(&self, config: &ResolvedConfig, package: &NativePackage, importer: &Path) -> Result<NativeModuleRecord> {
        let module_name = package.module_name.as_str();
        debug!(
            "Bundling native module \"{}\" from {} (binary {})",
            module_name,
            package.root.display(),
            package.binary.display()
        );
        let output_dir = config.out_dir_path().join(&self.options.natives_dir);
        let request = BundleRequest::new(module_name, &config.root, &output_dir, config.minify, &self.options);

        self.bundler.build(&request).await?;

        // The original package, not the fresh bundle, is what gets introspected
        let exports = self.introspector.exports_of(module_name, importer).await?;
        let reference = format!("./{}/{}.cjs", self.options.natives_dir, module_name);
        let shim_source = shim::generate(module_name, &exports, &reference)?;

        Ok(NativeModuleRecord {
            module_name: module_name.to_string(),
            bundle_file_path: request.bundle_file_path(),
            shim_source,
        })
    }
}

#[async_trait]
impl Plugin for NativesPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    // Must run before `vite:resolve`
    fn enforce(&self) -> Option<Enforce> {
        Some(Enforce::Pre)
    }

    fn config_resolved(&mut self, config: &ResolvedConfig) {
        self.config = Some(config.clone());
    }

    async fn resolve_id(&self, specifier: &str, importer: Option<&Path>) -> Result<Option<ResolvedId>> {
        let package = match self.detector.detect(specifier, importer).await {
            Detection::Skip | Detection::NotNative => return Ok(None),
            Detection::Cached(record) => {
                return Ok(Some(ResolvedId::new(synthetic_id(&record.module_name), false)));
            }
            Detection::Pending(package) => package,
        };

        let (Some(config), Some(importer)) = (self.config.as_ref(), importer) else {
            warn!("Native module \"{}\" found before the build config was resolved", specifier);
            return Ok(None);
        };

        let built = self
            .cache
            .get_or_try_insert_with(specifier, || self.build_native(config, &package, importer))
            .await;

        match built {
            Ok(record) => {
                info!(
                    "Native module \"{}\" build success:\n{}",
                    record.module_name,
                    record.bundle_file_path.display()
                );
                Ok(Some(ResolvedId::new(synthetic_id(&record.module_name), false)))
            }
            Err(e) => {
                // Fall through to normal resolution, which reports its own error
                warn!("{}", e);
                Ok(None)
            }
        }
    }

    async fn load(&self, id: &str) -> Result<Option<String>> {
        let Some(module_name) = id.strip_prefix(ID_PREFIX) else {
            return Ok(None);
        };
        Ok(self.cache.get(module_name).map(|record| record.shim_source.clone()))
    }
}
