// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use crate::config::HostConfig;
use crate::vision::{
    BackendId, CaptionHost, DevicePreference, ImageSource, ModelSource, DEFAULT_BLIP2_PROMPT,
    DEFAULT_BLIP_PROMPT, DEFAULT_MAX_NEW_TOKENS,
};

/// Which backend(s) the caption command runs
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendChoice {
    Blip,
    Blip2,
    Both,
}

/// Options shared by every command that loads the models
#[derive(Args, Debug, Clone, Default)]
pub struct ModelArgs {
    /// Compute device: auto, cpu or gpu
    #[arg(long)]
    pub device: Option<DevicePreference>,

    /// Local BLIP ONNX export (overrides BLIP_MODEL_DIR)
    #[arg(long)]
    pub blip_model_dir: Option<PathBuf>,

    /// Local BLIP-2 ONNX export (overrides BLIP2_MODEL_DIR)
    #[arg(long)]
    pub blip2_model_dir: Option<PathBuf>,
}

impl ModelArgs {
    /// Config from `CAPTION_CONFIG` and the environment, then these flags
    pub fn host_config(&self) -> Result<HostConfig> {
        Ok(self.apply(HostConfig::load()?))
    }

    /// Overlay the flags that were given onto `config`
    pub fn apply(&self, mut config: HostConfig) -> HostConfig {
        if let Some(device) = self.device {
            config.device = device;
        }
        if let Some(dir) = &self.blip_model_dir {
            config.blip = ModelSource::local(dir);
        }
        if let Some(dir) = &self.blip2_model_dir {
            config.blip2 = ModelSource::local(dir);
        }
        config
    }
}

/// Arguments for the caption command
#[derive(Args, Debug)]
pub struct CaptionArgs {
    /// Image to caption (jpg, jpeg or png)
    #[arg(long)]
    pub image: PathBuf,

    #[arg(long, value_enum, default_value = "both")]
    pub backend: BackendChoice,

    /// BLIP cue phrase
    #[arg(long, default_value = DEFAULT_BLIP_PROMPT)]
    pub prompt: String,

    /// BLIP-2 instruction
    #[arg(long, default_value = DEFAULT_BLIP2_PROMPT)]
    pub blip2_prompt: String,

    /// BLIP-2 generation cap
    #[arg(long, default_value_t = DEFAULT_MAX_NEW_TOKENS)]
    pub max_new_tokens: usize,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub models: ModelArgs,
}

/// Arguments for the compare command
#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Image to caption with both models
    #[arg(long)]
    pub image: PathBuf,

    #[command(flatten)]
    pub models: ModelArgs,
}

async fn load_host(models: &ModelArgs) -> Result<CaptionHost> {
    let config = models.host_config()?;
    info!(
        "Loading caption models (device {}, blip {}, blip2 {})",
        config.device, config.blip, config.blip2
    );
    CaptionHost::load(&config)
        .await
        .context("Failed to load caption models")
}

pub async fn caption(args: CaptionArgs) -> Result<()> {
    let host = load_host(&args.models).await?;
    let image = ImageSource::from_path(&args.image);
    let max_new_tokens = Some(args.max_new_tokens);

    match args.backend {
        BackendChoice::Blip => {
            let caption = host.generate(BackendId::Blip, &image, &args.prompt, None)?;
            print_single(BackendId::Blip, &caption, args.json)?;
        }
        BackendChoice::Blip2 => {
            let caption =
                host.generate(BackendId::Blip2, &image, &args.blip2_prompt, max_new_tokens)?;
            print_single(BackendId::Blip2, &caption, args.json)?;
        }
        BackendChoice::Both => {
            let pair =
                host.generate_both(&image, &args.prompt, &args.blip2_prompt, max_new_tokens)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&pair)?);
            } else {
                println!("{}: {}", BackendId::Blip, pair.blip);
                println!("{}: {}", BackendId::Blip2, pair.blip2);
            }
        }
    }

    Ok(())
}

pub async fn compare(args: CompareArgs) -> Result<()> {
    let host = load_host(&args.models).await?;
    let report = host.compare(&ImageSource::from_path(&args.image))?;
    println!("{}", report);
    Ok(())
}

fn print_single(backend: BackendId, caption: &str, json: bool) -> Result<()> {
    if json {
        let value = serde_json::json!({ backend.key(): caption });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}: {}", backend, caption);
    }
    Ok(())
}
