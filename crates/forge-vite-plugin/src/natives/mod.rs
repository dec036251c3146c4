// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Native addon interop
//!
//! A `.node` file is a CommonJS module that only `require()` can load at
//! runtime. Rollup works on ES module syntax and cannot bundle it, while
//! webpack follows CommonJS semantics and has loaders for native binaries.
//! So native packages are built by webpack and fed back to Vite as ES modules:
//!
//! - [`resolver`] locates a bare import's package root
//! - [`detector`] decides whether the package ships a compiled binary
//! - [`bundler`] builds `<outDir>/.natives/<name>.cjs` with webpack
//! - [`introspect`] lists the package's top-level export names
//! - [`shim`] writes the ES module wrapper re-exporting those names
//! - [`plugin`] wires it all into the `resolveId`/`load` hooks
//! - [`cache`] keeps finished modules for the lifetime of the process, so the
//!   main and preload builds share one webpack run per package

pub mod bundler;
pub mod cache;
pub mod detector;
pub mod introspect;
pub mod plugin;
pub mod resolver;
pub mod shim;

pub use bundler::{BundleRequest, LoaderRule, SecondaryBundler, WebpackBundler};
pub use cache::{NativeModuleRecord, NativesCache};
pub use detector::{Detection, NativeDetector, NativePackage};
pub use introspect::{ExportIntrospector, NodeIntrospector};
pub use plugin::{synthetic_id, NativesPlugin, ID_PREFIX, PLUGIN_NAME};
pub use resolver::{is_bare_import, PackageResolver};
