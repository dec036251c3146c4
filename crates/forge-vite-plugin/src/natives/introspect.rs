// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Export surface introspection
//!
//! The only reliable way to learn what a native module exports is to load it.
//! [`NodeIntrospector`] does that in a child Node.js process, which runs the
//! addon's initialization code on the build host. The host must therefore be
//! able to load the binary: same platform, architecture and Node ABI.

use crate::error::{NativesError, Result};
use crate::node::run_script;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads a module and enumerates its top-level names
#[async_trait]
pub trait ExportIntrospector: Send + Sync {
    /// Own property names of `require(module_name)` as seen from `importer`,
    /// in the runtime's enumeration order
    async fn exports_of(&self, module_name: &str, importer: &Path) -> Result<Vec<String>>;
}

const INTROSPECT_SCRIPT: &str = r#"
const { createRequire } = require("module");
const [specifier, from] = process.argv.slice(1);
const loaded = createRequire(from)(specifier);
reportResult(Object.getOwnPropertyNames(loaded));
"#;

/// Introspects the original package with `Object.getOwnPropertyNames(require(name))`
#[derive(Debug, Clone)]
pub struct NodeIntrospector {
    node: PathBuf,
}

impl NodeIntrospector {
    /// Create an introspector running the given Node.js executable
    pub fn new(node: impl Into<PathBuf>) -> Self {
        Self { node: node.into() }
    }
}

impl Default for NodeIntrospector {
    fn default() -> Self {
        Self::new("node")
    }
}

#[async_trait]
impl ExportIntrospector for NodeIntrospector {
    async fn exports_of(&self, module_name: &str, importer: &Path) -> Result<Vec<String>> {
        let cwd = importer.parent().unwrap_or(Path::new("."));
        let from = importer.to_string_lossy();

        let output = run_script(&self.node, INTROSPECT_SCRIPT, &[module_name, &*from], cwd)
            .await
            .map_err(|e| NativesError::introspection(module_name, e.to_string()))?;

        let names = match output.report::<Vec<String>>() {
            Some(report) => report
                .map_err(|e| NativesError::introspection(module_name, format!("unexpected output: {}", e)))?,
            None => {
                return Err(NativesError::introspection(
                    module_name,
                    format!("exited with status {:?}: {}", output.status, output.stderr.trim()),
                ));
            }
        };

        debug!("Module \"{}\" exports {:?}", module_name, names);
        Ok(names)
    }
}
