// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! forge-vite CLI - Electron builds with Vite

use anyhow::Context;
use clap::{Parser, Subcommand};
use forge_vite_plugin::{
    NativesCache, NativesOptions, NativesPlugin, Plugin, ResolvedConfig, ViteConfigGenerator,
    VitePluginConfig, VERSION,
};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "forge-vite",
    about = "Electron builds with Vite, native addons included",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Divert one import through the natives plugin and print its shim
    Natives {
        /// Bare import specifier, e.g. `better-sqlite3`
        specifier: String,

        /// File containing the import
        #[arg(long)]
        importer: PathBuf,

        /// Project root
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Build output directory, relative to the root
        #[arg(long, default_value = ".vite/build")]
        out_dir: PathBuf,

        /// Minify the CommonJS bundle
        #[arg(long)]
        minify: bool,
    },

    /// Print the generated Vite configs for a plugin configuration
    Config {
        /// Plugin configuration (JSON)
        file: PathBuf,

        /// Generate production configs
        #[arg(long)]
        prod: bool,
    },

    /// Remove bundled native modules
    Clean {
        /// Project root
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Build output directory, relative to the root
        #[arg(long, default_value = ".vite/build")]
        out_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("forge_vite_plugin=debug")
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter("warn").init();
    }

    match cli.command {
        Command::Natives {
            specifier,
            importer,
            root,
            out_dir,
            minify,
        } => natives(&specifier, &importer, &root, out_dir, minify).await,
        Command::Config { file, prod } => config(&file, prod),
        Command::Clean { root, out_dir } => clean(&root, out_dir).await,
    }
}

async fn natives(specifier: &str, importer: &Path, root: &Path, out_dir: PathBuf, minify: bool) -> anyhow::Result<()> {
    let root = std::path::absolute(root)?;
    let importer = root.join(importer);
    let options = NativesOptions::load(&root)?;

    let mut plugin = NativesPlugin::new(NativesCache::shared(), options);
    plugin.config_resolved(&ResolvedConfig::new(&root, out_dir, minify));

    let Some(resolved) = plugin.resolve_id(specifier, Some(&importer)).await? else {
        println!("{} is not diverted", specifier.yellow());
        return Ok(());
    };

    let shim = plugin
        .load(&resolved.id)
        .await?
        .with_context(|| format!("no shim cached for {specifier}"))?;

    println!("{} {}", "Resolved".green().bold(), resolved.id.escape_default());
    if let Some(record) = plugin.cache().get(specifier) {
        println!("{} {}", "Bundle".green().bold(), record.bundle_file_path.display());
    }
    println!();
    print!("{shim}");

    Ok(())
}

fn config(file: &Path, prod: bool) -> anyhow::Result<()> {
    let config = VitePluginConfig::read(file).with_context(|| format!("reading {}", file.display()))?;
    let project_dir = file.parent().unwrap_or(Path::new(""));
    let generator = ViteConfigGenerator::new(config, project_dir, prod);

    let output = serde_json::json!({
        "define": generator.defines(),
        "build": generator.build_configs()?,
        "renderer": generator.renderer_configs(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

async fn clean(root: &Path, out_dir: PathBuf) -> anyhow::Result<()> {
    let options = NativesOptions::load(root)?;
    let natives_dir = ResolvedConfig::new(root, out_dir, false)
        .out_dir_path()
        .join(&options.natives_dir);

    if !natives_dir.exists() {
        println!("Nothing to clean");
        return Ok(());
    }

    tokio::fs::remove_dir_all(&natives_dir)
        .await
        .with_context(|| format!("removing {}", natives_dir.display()))?;
    println!("{} {}", "Removed".green().bold(), natives_dir.display());

    Ok(())
}
