// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Native module detection

use crate::natives::cache::{NativeModuleRecord, NativesCache};
use crate::natives::resolver::{is_bare_import, PackageResolver};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Outcome of inspecting one import
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// Entry point, relative/absolute path or URL: never a candidate
    Skip,
    /// Not installed, not a package, or no compiled binary inside
    NotNative,
    /// Already bundled and shimmed
    Cached(Arc<NativeModuleRecord>),
    /// A package with a compiled binary that still needs bundling
    Pending(NativePackage),
}

/// A package found to contain a compiled binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativePackage {
    /// Bare specifier it was imported with
    pub module_name: String,
    /// Package directory
    pub root: PathBuf,
    /// First compiled binary found in the package
    pub binary: PathBuf,
}

/// Decides whether an import has to be diverted
#[derive(Debug)]
pub struct NativeDetector {
    resolver: PackageResolver,
    cache: Arc<NativesCache>,
    binary_extension: String,
    cache_not_native: bool,
}

impl NativeDetector {
    /// Create a detector backed by `cache`
    pub fn new(cache: Arc<NativesCache>, binary_extension: impl Into<String>, cache_not_native: bool) -> Self {
        Self {
            resolver: PackageResolver::new(),
            cache,
            binary_extension: binary_extension.into(),
            cache_not_native,
        }
    }

    /// Inspect `specifier` imported from `importer`
    pub async fn detect(&self, specifier: &str, importer: Option<&Path>) -> Detection {
        let Some(importer) = importer else {
            return Detection::Skip;
        };
        if !is_bare_import(specifier) {
            return Detection::Skip;
        }

        if let Some(record) = self.cache.get(specifier) {
            debug!("Native module cache hit: {}", specifier);
            return Detection::Cached(record);
        }
        if self.cache_not_native && self.cache.is_not_native(specifier) {
            return Detection::NotNative;
        }

        let root = match self.resolver.package_root(specifier, importer).await {
            Ok(root) => root,
            Err(e) => {
                debug!("{}", e);
                return Detection::NotNative;
            }
        };

        let dir = root.clone();
        let extension = self.binary_extension.clone();
        let binary = match tokio::task::spawn_blocking(move || find_binary(&dir, &extension)).await {
            Ok(binary) => binary,
            Err(e) => {
                warn!("Scanning {} failed: {}", root.display(), e);
                None
            }
        };

        match binary {
            Some(binary) => {
                debug!("Found native module: {} ({})", specifier, binary.display());
                Detection::Pending(NativePackage {
                    module_name: specifier.to_string(),
                    root,
                    binary,
                })
            }
            None => {
                if self.cache_not_native {
                    self.cache.mark_not_native(specifier);
                }
                Detection::NotNative
            }
        }
    }
}

/// First file under `dir` with the given extension, skipping dot-directories
pub fn find_binary(dir: &Path, extension: &str) -> Option<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|entry| entry.ok())
        .find(|entry| {
            entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == extension)
        })
        .map(|entry| entry.into_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn project_with(package: &str, files: &[&str]) -> TempDir {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("node_modules").join(package);
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(pkg.join("package.json"), format!(r#"{{"name":"{package}"}}"#)).unwrap();
        for file in files {
            let path = pkg.join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, b"\0").unwrap();
        }
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        dir
    }

    fn detector(cache_not_native: bool) -> NativeDetector {
        NativeDetector::new(Arc::new(NativesCache::new()), "node", cache_not_native)
    }

    #[tokio::test]
    async fn test_skip_without_importer() {
        assert_eq!(detector(false).detect("better-sqlite3", None).await, Detection::Skip);
    }

    #[tokio::test]
    async fn test_skip_non_bare() {
        let importer = Path::new("/app/src/main.js");
        let detector = detector(false);
        for specifier in ["./db", "../db", "/abs/db.js", "C:\\db.js", "file:///db.js", "\0forge-vite:x"] {
            assert_eq!(detector.detect(specifier, Some(importer)).await, Detection::Skip, "{specifier}");
        }
    }

    #[tokio::test]
    async fn test_detects_binary() {
        let project = project_with("better-sqlite3", &["lib/index.js", "build/Release/better_sqlite3.node"]);
        let importer = project.path().join("src").join("main.js");

        match detector(false).detect("better-sqlite3", Some(&importer)).await {
            Detection::Pending(package) => {
                assert_eq!(package.module_name, "better-sqlite3");
                assert!(package.binary.ends_with("build/Release/better_sqlite3.node"));
                assert!(package.root.ends_with("node_modules/better-sqlite3"));
            }
            other => panic!("expected pending, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_manifest_with_bom() {
        let project = project_with("bom-addon", &["build/Release/addon.node"]);
        let manifest = project.path().join("node_modules/bom-addon/package.json");
        std::fs::write(&manifest, "\u{feff}{\"name\":\"bom-addon\"}").unwrap();
        let importer = project.path().join("src").join("main.js");

        assert!(matches!(
            detector(false).detect("bom-addon", Some(&importer)).await,
            Detection::Pending(_)
        ));
    }

    #[tokio::test]
    async fn test_package_without_binary() {
        let project = project_with("lodash", &["lodash.js", "fp/map.js"]);
        let importer = project.path().join("src").join("main.js");
        assert_eq!(detector(false).detect("lodash", Some(&importer)).await, Detection::NotNative);
    }

    #[tokio::test]
    async fn test_missing_package() {
        let project = project_with("lodash", &[]);
        let importer = project.path().join("src").join("main.js");
        assert_eq!(detector(false).detect("not-installed", Some(&importer)).await, Detection::NotNative);
    }

    #[tokio::test]
    async fn test_hidden_dirs_ignored() {
        let project = project_with("cached-pkg", &[".cache/prebuilt.node", "index.js"]);
        let importer = project.path().join("src").join("main.js");
        assert_eq!(detector(false).detect("cached-pkg", Some(&importer)).await, Detection::NotNative);
    }

    #[tokio::test]
    async fn test_not_native_caching() {
        let project = project_with("lodash", &["lodash.js"]);
        let importer = project.path().join("src").join("main.js");
        let detector = detector(true);

        assert_eq!(detector.detect("lodash", Some(&importer)).await, Detection::NotNative);
        assert!(detector.cache.is_not_native("lodash"));

        // A binary appearing later is not noticed while the outcome is cached
        std::fs::write(project.path().join("node_modules/lodash/late.node"), b"\0").unwrap();
        assert_eq!(detector.detect("lodash", Some(&importer)).await, Detection::NotNative);
    }

    #[test]
    fn test_find_binary_custom_extension() {
        let project = project_with("addon", &["bin/addon.dylib"]);
        let pkg = project.path().join("node_modules").join("addon");
        assert!(find_binary(&pkg, "node").is_none());
        assert!(find_binary(&pkg, "dylib").is_some());
    }
}
