// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Package root resolution (Node.js `node_modules` lookup)

use crate::error::{NativesError, Result};
use std::path::{Path, PathBuf};

/// Check whether a specifier names a package rather than a path or URL.
///
/// A bare specifier starts with a word character or `@`, is not a Windows
/// drive path (`C:`), and contains no `://` scheme separator.
pub fn is_bare_import(specifier: &str) -> bool {
    let bytes = specifier.as_bytes();

    // Windows drive letter
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return false;
    }

    match bytes.first() {
        Some(&b) if b.is_ascii_alphanumeric() || b == b'_' || b == b'@' => {}
        _ => return false,
    }

    !specifier[1..].contains("://")
}

/// Locates `<specifier>/package.json` the way `require.resolve` does with
/// `paths: [importer]`: walking up from the importer through every
/// `node_modules` directory.
#[derive(Debug, Default, Clone)]
pub struct PackageResolver;

impl PackageResolver {
    /// Create a new package resolver
    pub fn new() -> Self {
        Self
    }

    /// Directories searched for `node_modules`, nearest first
    pub fn lookup_dirs(importer: &Path) -> impl Iterator<Item = &Path> {
        importer
            .ancestors()
            .filter(|dir| dir.file_name().is_none_or(|name| name != "node_modules"))
    }

    /// Resolve the root directory of the package `specifier` as seen from `importer`.
    ///
    /// Only the presence of `package.json` matters; its content is never read.
    pub async fn package_root(&self, specifier: &str, importer: &Path) -> Result<PathBuf> {
        for dir in Self::lookup_dirs(importer) {
            let package_dir = dir.join("node_modules").join(specifier);
            if !tokio::fs::metadata(package_dir.join("package.json"))
                .await
                .is_ok_and(|meta| meta.is_file())
            {
                continue;
            }

            return Ok(tokio::fs::canonicalize(&package_dir).await.unwrap_or(package_dir));
        }

        Err(NativesError::resolution(
            specifier,
            format!("no package.json found from {}", importer.display()),
        ))
    }
}
