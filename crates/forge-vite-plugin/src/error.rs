// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the plugin

use thiserror::Error;

/// Result type for plugin operations
pub type Result<T> = std::result::Result<T, NativesError>;

/// Errors that can occur while diverting native modules
#[derive(Debug, Error)]
pub enum NativesError {
    /// The package root of a bare specifier could not be located
    #[error("Cannot resolve package '{module}': {reason}")]
    Resolution {
        /// Module specifier
        module: String,
        /// Reason for failure
        reason: String,
    },

    /// The secondary bundler failed or finished with compilation errors
    #[error("Native module '{module}' build failed:\n{message}")]
    Build {
        /// Module being bundled
        module: String,
        /// Diagnostics reported by the bundler
        message: String,
    },

    /// Loading the package in Node.js to enumerate its exports failed
    #[error("Cannot enumerate exports of '{module}': {reason}")]
    Introspection {
        /// Module being introspected
        module: String,
        /// Reason for failure
        reason: String,
    },

    /// An export name cannot be written as an ES module export
    #[error("Module '{module}' exports '{name}', which is not a valid export name")]
    InvalidExportName {
        /// Module being shimmed
        module: String,
        /// Offending export name
        name: String,
    },

    /// Child process error
    #[error("Process error: {0}")]
    Process(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system error
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl NativesError {
    /// Create a resolution error
    pub fn resolution(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            module: module.into(),
            reason: reason.into(),
        }
    }

    /// Create a build error
    pub fn build(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Build {
            module: module.into(),
            message: message.into(),
        }
    }

    /// Create an introspection error
    pub fn introspection(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Introspection {
            module: module.into(),
            reason: reason.into(),
        }
    }
}
