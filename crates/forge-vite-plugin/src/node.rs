// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Running inline scripts in a Node.js child process
//!
//! Scripts hand their result back through `reportResult(value)`. It writes one
//! marker-prefixed JSON line straight to fd 1 and exits, so whatever the loaded
//! code prints cannot corrupt the result, and open handles (timers, watchers,
//! sockets) cannot keep the child alive.

use crate::error::{NativesError, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Prefix of the line carrying a script's result
pub(crate) const REPORT_MARKER: &str = "@@forge-vite-report@@";

/// Defines `reportResult` ahead of every script
fn prelude() -> String {
    format!(
        r#"const reportResult = (value) => {{
  const fs = require("fs");
  let buf = Buffer.from("\n{REPORT_MARKER}" + JSON.stringify(value) + "\n");
  while (buf.length > 0) {{
    try {{
      buf = buf.subarray(fs.writeSync(1, buf));
    }} catch (e) {{
      if (e.code !== "EAGAIN") throw e;
    }}
  }}
  process.exit(0);
}};
"#
    )
}

/// Captured result of a script run
#[derive(Debug)]
pub(crate) struct ScriptOutput {
    /// stdout data
    pub stdout: String,
    /// stderr data
    pub stderr: String,
    /// Exit status
    pub status: Option<i32>,
}

impl ScriptOutput {
    /// Whether the process exited with status 0
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// The value passed to `reportResult`, if the script got that far
    pub fn report<T: DeserializeOwned>(&self) -> Option<serde_json::Result<T>> {
        self.stdout
            .lines()
            .rev()
            .find_map(|line| line.strip_prefix(REPORT_MARKER))
            .map(serde_json::from_str)
    }
}

/// Evaluate `script` with `node -e`, passing `args` as `process.argv.slice(1)`.
///
/// The child runs in `cwd` and inherits the environment. There is no timeout.
pub(crate) async fn run_script(node: &Path, script: &str, args: &[&str], cwd: &Path) -> Result<ScriptOutput> {
    debug!("Running {} in {}", node.display(), cwd.display());

    let output = Command::new(node)
        .arg("-e")
        .arg(format!("{}{}", prelude(), script))
        .arg("--")
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| NativesError::Process(format!("Failed to spawn {}: {}", node.display(), e)))?;

    Ok(ScriptOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        status: output.status.code(),
    })
}
