// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod caption;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Dual caption CLI
#[derive(Parser, Debug)]
#[command(name = "caption-cli")]
#[command(version)]
#[command(about = "Caption images with BLIP and BLIP-2", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Caption an image with one or both models
    Caption(caption::CaptionArgs),

    /// Print both captions side by side using the default prompts
    Compare(caption::CompareArgs),
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Caption(args) => caption::caption(args).await,
        Commands::Compare(args) => caption::compare(args).await,
    }
}
