// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Secondary (CommonJS) bundling of native packages
//!
//! webpack follows the CommonJS semantics native addons depend on, and its
//! loader ecosystem knows how to carry `.node` binaries along. Each native
//! package is bundled on its own into `<outputDir>/<moduleName>.cjs`.

use crate::config::NativesOptions;
use crate::error::{NativesError, Result};
use crate::node::run_script;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A webpack `module.rules` entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderRule {
    /// Source of the `test` regular expression
    pub test: String,
    /// Loader package name
    pub loader: String,
    /// Loader options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
    /// Disable AMD parsing for matched modules
    pub disable_amd: bool,
}

/// Everything needed to bundle one native package
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleRequest {
    /// Bare specifier, used as the entry so webpack's resolver finds the package
    pub module_name: String,
    /// Directory receiving `<moduleName>.cjs`
    pub output_dir: PathBuf,
    /// Project root; webpack and its loaders are resolved from here
    pub root_dir: PathBuf,
    /// Minify the bundle (`mode: "production"`)
    pub minify: bool,
    /// webpack target
    pub target: String,
    /// Loader rules
    pub rules: Vec<LoaderRule>,
}

impl BundleRequest {
    /// Build the request for `module_name`
    pub fn new(module_name: &str, root_dir: &Path, output_dir: &Path, minify: bool, options: &NativesOptions) -> Self {
        let ext = regex::escape(&options.binary_extension);

        let rules = vec![
            // Binaries already relocated into the native modules directory
            LoaderRule {
                test: format!(r"{}[/\\].+\.{}$", regex::escape(&options.asset_base), ext),
                loader: "node-loader".to_string(),
                options: None,
                disable_amd: false,
            },
            // Rewrite `require`/`__dirname` asset references inside dependencies
            LoaderRule {
                test: format!(r"[/\\]node_modules[/\\].+\.(m?js|{})$", ext),
                loader: "@vercel/webpack-asset-relocator-loader".to_string(),
                options: Some(serde_json::json!({ "outputAssetBase": options.asset_base })),
                disable_amd: true,
            },
        ];

        Self {
            module_name: module_name.to_string(),
            output_dir: output_dir.to_path_buf(),
            root_dir: root_dir.to_path_buf(),
            minify,
            target: options.target.clone(),
            rules,
        }
    }

    /// Path of the bundle this request produces
    pub fn bundle_file_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.cjs", self.module_name))
    }
}

/// Produces a single-file CommonJS bundle for a package
#[async_trait]
pub trait SecondaryBundler: Send + Sync {
    /// Bundle `request.module_name`; fails with [`NativesError::Build`]
    async fn build(&self, request: &BundleRequest) -> Result<()>;
}

const WEBPACK_SCRIPT: &str = r#"
const { createRequire } = require("module");
const path = require("path");
const request = JSON.parse(process.argv[1]);
const projectRequire = createRequire(path.join(request.rootDir, "package.json"));
const { webpack } = projectRequire("webpack");

const options = {
  mode: request.minify ? "production" : "none",
  target: request.target,
  context: request.rootDir,
  entry: { [request.moduleName]: request.moduleName },
  output: {
    library: { type: "commonjs2" },
    path: request.outputDir,
    filename: "[name].cjs",
  },
  module: {
    rules: request.rules.map((rule) => ({
      test: new RegExp(rule.test),
      ...(rule.disableAmd ? { parser: { amd: false } } : {}),
      use: rule.options ? { loader: rule.loader, options: rule.options } : rule.loader,
    })),
  },
};

const compiler = webpack(options);
compiler.run((error, stats) => {
  const errors = [];
  if (error) {
    errors.push(String((error && error.stack) || error));
  } else if (stats && stats.hasErrors()) {
    for (const e of stats.toJson().errors || []) errors.push(e.message);
  }
  const finish = () => reportResult({ errors });
  if (typeof compiler.close === "function") {
    compiler.close(finish);
  } else {
    finish();
  }
});
"#;

/// Report printed by the webpack runner script
#[derive(Debug, Default, Deserialize)]
struct BuildReport {
    #[serde(default)]
    errors: Vec<String>,
}

/// Runs webpack from the project's `node_modules` in a Node.js child process
#[derive(Debug, Clone)]
pub struct WebpackBundler {
    node: PathBuf,
}

impl WebpackBundler {
    /// Create a bundler running the given Node.js executable
    pub fn new(node: impl Into<PathBuf>) -> Self {
        Self { node: node.into() }
    }
}

impl Default for WebpackBundler {
    fn default() -> Self {
        Self::new("node")
    }
}

#[async_trait]
impl SecondaryBundler for WebpackBundler {
    async fn build(&self, request: &BundleRequest) -> Result<()> {
        let payload = serde_json::to_string(request)?;
        debug!("webpack request: {}", payload);

        let output = run_script(&self.node, WEBPACK_SCRIPT, &[payload.as_str()], &request.root_dir)
            .await
            .map_err(|e| NativesError::build(&request.module_name, e.to_string()))?;

        match output.report::<BuildReport>() {
            // Both hard failures and "compiled with errors" land here
            Some(Ok(report)) if !report.errors.is_empty() => {
                Err(NativesError::build(&request.module_name, report.errors.join("\n")))
            }
            Some(Ok(_)) if output.success() => Ok(()),
            Some(Err(e)) => Err(NativesError::build(
                &request.module_name,
                format!("unreadable webpack report: {}", e),
            )),
            _ => Err(NativesError::build(
                &request.module_name,
                format!(
                    "webpack runner exited with status {:?}: {}",
                    output.status,
                    output.stderr.trim()
                ),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn node_available() -> bool {
        std::process::Command::new("node")
            .arg("--version")
            .output()
            .is_ok_and(|output| output.status.success())
    }

    /// A project whose `webpack` package runs `run_body` as `compiler.run(cb)`
    fn project_with_webpack(run_body: &str) -> TempDir {
        let dir = tempdir().unwrap();
        let webpack = dir.path().join("node_modules").join("webpack");
        std::fs::create_dir_all(&webpack).unwrap();
        std::fs::write(webpack.join("package.json"), r#"{"name":"webpack","main":"index.js"}"#).unwrap();
        std::fs::write(
            webpack.join("index.js"),
            format!(
                "exports.webpack = (options) => ({{\n  run(cb) {{ {run_body} }},\n  close(cb) {{ setInterval(() => {{}}, 1000); cb(); }},\n}});\n"
            ),
        )
        .unwrap();
        dir
    }

    fn request_in(project: &TempDir) -> BundleRequest {
        BundleRequest::new(
            "x",
            project.path(),
            &project.path().join("out"),
            false,
            &NativesOptions::default(),
        )
    }

    #[test]
    fn test_request_defaults() {
        let options = NativesOptions::default();
        let request = BundleRequest::new(
            "better-sqlite3",
            Path::new("/app"),
            Path::new("/app/.vite/build/.natives"),
            false,
            &options,
        );

        assert_eq!(request.target, "node14");
        assert_eq!(
            request.bundle_file_path(),
            PathBuf::from("/app/.vite/build/.natives/better-sqlite3.cjs")
        );
        assert_eq!(request.rules.len(), 2);
        assert_eq!(request.rules[0].test, r"native_modules[/\\].+\.node$");
        assert_eq!(request.rules[0].loader, "node-loader");
        assert_eq!(request.rules[1].test, r"[/\\]node_modules[/\\].+\.(m?js|node)$");
        assert!(request.rules[1].disable_amd);
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let request = BundleRequest::new(
            "@scope/native",
            Path::new("/app"),
            Path::new("/app/out/.natives"),
            true,
            &NativesOptions::default(),
        );
        let json: serde_json::Value = serde_json::to_value(&request).unwrap();

        assert_eq!(json["moduleName"], "@scope/native");
        assert_eq!(json["outputDir"], "/app/out/.natives");
        assert_eq!(json["minify"], true);
        assert_eq!(json["rules"][1]["options"]["outputAssetBase"], "native_modules");
        assert!(json["rules"][0].get("options").is_none());
    }

    #[test]
    fn test_rule_patterns_escape_options() {
        let options = NativesOptions {
            binary_extension: "node.bin".to_string(),
            asset_base: "assets+native".to_string(),
            ..NativesOptions::default()
        };
        let request = BundleRequest::new("addon", Path::new("/app"), Path::new("/app/out"), false, &options);

        assert_eq!(request.rules[0].test, r"assets\+native[/\\].+\.node\.bin$");
        assert_eq!(request.rules[1].test, r"[/\\]node_modules[/\\].+\.(m?js|node\.bin)$");
    }

    #[tokio::test]
    async fn test_missing_node_fails() {
        let request = BundleRequest::new(
            "sqlite3",
            Path::new("."),
            Path::new("./out"),
            false,
            &NativesOptions::default(),
        );
        let result = WebpackBundler::new("/nonexistent/forge-vite/node").build(&request).await;
        assert!(matches!(result, Err(NativesError::Build { .. })));
    }

    #[tokio::test]
    async fn test_success_despite_stdout_noise() {
        if !node_available() {
            return;
        }
        let project = project_with_webpack(
            r#"console.log("compiling", options.entry); process.stdout.write("{\"errors\":"); cb(null, { hasErrors: () => false });"#,
        );

        WebpackBundler::default().build(&request_in(&project)).await.unwrap();
    }

    #[tokio::test]
    async fn test_compile_errors_are_reported() {
        if !node_available() {
            return;
        }
        let project = project_with_webpack(
            r#"console.log("compiling"); cb(null, { hasErrors: () => true, toJson: () => ({ errors: [{ message: "Module not found: Error: Can't resolve 'bindings'" }] }) });"#,
        );

        match WebpackBundler::default().build(&request_in(&project)).await {
            Err(NativesError::Build { module, message }) => {
                assert_eq!(module, "x");
                assert_eq!(message, "Module not found: Error: Can't resolve 'bindings'");
            }
            other => panic!("expected build error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_webpack_reports_stderr() {
        if !node_available() {
            return;
        }
        let project = tempdir().unwrap();
        match WebpackBundler::default().build(&request_in(&project)).await {
            Err(NativesError::Build { message, .. }) => assert!(message.contains("webpack")),
            other => panic!("expected build error, got {other:?}"),
        }
    }
}
