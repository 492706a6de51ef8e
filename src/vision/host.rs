// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption host: owns both backends and routes generation requests
//!
//! Built once at startup and shared as `Arc<CaptionHost>`. The compute
//! device is resolved during construction and never changes afterwards.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, instrument};

use super::backend::{BackendConfig, BackendId, BackendInfo, CaptionBackend};
use super::blip::BlipModel;
use super::blip2::Blip2Model;
use super::device::{gpu_available, ComputeDevice, HostDevices};
use super::error::CaptionError;
use super::image_utils::{load_image, ImageSource};
use crate::config::HostConfig;

/// Captions from both backends for the same image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionPair {
    pub blip: String,
    pub blip2: String,
}

/// Side-by-side output of both backends using their default prompts
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub device: ComputeDevice,
    pub blip_prompt: String,
    pub blip2_prompt: String,
    pub captions: CaptionPair,
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "{}", rule)?;
        writeln!(f, "CAPTION COMPARISON ({})", self.device)?;
        writeln!(f, "{}", rule)?;
        for (id, prompt, caption) in [
            (BackendId::Blip, &self.blip_prompt, &self.captions.blip),
            (BackendId::Blip2, &self.blip2_prompt, &self.captions.blip2),
        ] {
            writeln!(f)?;
            writeln!(f, "{} Caption:", id)?;
            writeln!(f, "{}", "-".repeat(20))?;
            writeln!(f, "Prompt: {}", prompt)?;
            writeln!(f, "{}", caption)?;
        }
        writeln!(f)?;
        write!(f, "{}", rule)
    }
}

/// Owns one BLIP and one BLIP-2 backend bound to the same device
pub struct CaptionHost {
    devices: HostDevices,
    blip: Box<dyn CaptionBackend>,
    blip2: Box<dyn CaptionBackend>,
    sources: BTreeMap<BackendId, String>,
}

impl fmt::Debug for CaptionHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptionHost")
            .field("devices", &self.devices)
            .field("sources", &self.sources)
            .finish_non_exhaustive()
    }
}

impl CaptionHost {
    /// Resolve the device, fetch artifacts and load BLIP then BLIP-2.
    ///
    /// Any failure aborts construction; there is no partially loaded host.
    pub async fn load(config: &HostConfig) -> Result<Self, CaptionError> {
        Self::load_with_probe(config, gpu_available()).await
    }

    /// Same as [`load`](Self::load) with an explicit GPU probe result
    #[instrument(skip(config), fields(device = %config.device))]
    pub async fn load_with_probe(
        config: &HostConfig,
        gpu_available: bool,
    ) -> Result<Self, CaptionError> {
        let devices = HostDevices::resolve(config.device, gpu_available)?;
        info!(
            "Resolved device {} (requested {}, gpu available: {})",
            devices.device, config.device, gpu_available
        );

        let blip_config = BackendConfig::for_backend(BackendId::Blip, devices.device);
        let blip_dir = config
            .blip
            .fetch(&BlipModel::artifact_files())
            .await
            .map_err(|e| CaptionError::load(BackendId::Blip, e))?;
        let blip =
            construct(BackendId::Blip, move || BlipModel::new(&blip_dir, blip_config)).await?;

        let blip2_config = BackendConfig::for_backend(BackendId::Blip2, devices.device);
        let blip2_dir = config
            .blip2
            .fetch(&Blip2Model::artifact_files(devices.blip2))
            .await
            .map_err(|e| CaptionError::load(BackendId::Blip2, e))?;
        let blip2 =
            construct(BackendId::Blip2, move || Blip2Model::new(&blip2_dir, blip2_config)).await?;

        let mut host = Self::from_backends(Box::new(blip), Box::new(blip2));
        host.sources.insert(BackendId::Blip, config.blip.to_string());
        host.sources.insert(BackendId::Blip2, config.blip2.to_string());

        info!("✅ Caption host ready on {}", devices.device);
        Ok(host)
    }

    /// Compose a host from already-constructed backends.
    ///
    /// The host device is the one BLIP is bound to; both backends must agree.
    pub fn from_backends(blip: Box<dyn CaptionBackend>, blip2: Box<dyn CaptionBackend>) -> Self {
        let blip_config = blip.config();
        let blip2_config = blip2.config();
        debug_assert_eq!(
            blip_config.device, blip2_config.device,
            "BLIP and BLIP-2 must share one device"
        );

        Self {
            devices: HostDevices {
                device: blip_config.device,
                blip: blip_config.precision,
                blip2: blip2_config.precision,
            },
            blip,
            blip2,
            sources: BTreeMap::new(),
        }
    }

    pub fn device(&self) -> ComputeDevice {
        self.devices.device
    }

    pub fn devices(&self) -> HostDevices {
        self.devices
    }

    /// Both backends in load order
    pub fn backend_info(&self) -> Vec<BackendInfo> {
        BackendId::ALL
            .iter()
            .map(|&id| {
                let mut info = BackendInfo::from_backend(self.backend(id));
                info.source = self.sources.get(&id).cloned();
                info
            })
            .collect()
    }

    /// Caption one image with one backend
    #[instrument(skip(self, image, prompt), fields(backend = %backend))]
    pub fn generate(
        &self,
        backend: BackendId,
        image: &ImageSource,
        prompt: &str,
        max_new_tokens: Option<usize>,
    ) -> Result<String, CaptionError> {
        validate_prompt(backend, prompt)?;
        let image = load_image(image)?;
        self.caption_image(backend, &image, prompt, max_new_tokens)
    }

    /// Caption an image that is already decoded to RGB
    pub fn caption_image(
        &self,
        backend: BackendId,
        image: &DynamicImage,
        prompt: &str,
        max_new_tokens: Option<usize>,
    ) -> Result<String, CaptionError> {
        validate_prompt(backend, prompt)?;
        self.backend(backend)
            .caption(image, prompt, max_new_tokens)
            .map_err(|e| CaptionError::generation(backend, e))
    }

    /// Caption with BLIP then BLIP-2, decoding the image once.
    ///
    /// The first failure is returned and no partial pair is produced.
    #[instrument(skip(self, image, blip_prompt, blip2_prompt))]
    pub fn generate_both(
        &self,
        image: &ImageSource,
        blip_prompt: &str,
        blip2_prompt: &str,
        max_new_tokens: Option<usize>,
    ) -> Result<CaptionPair, CaptionError> {
        validate_prompt(BackendId::Blip, blip_prompt)?;
        validate_prompt(BackendId::Blip2, blip2_prompt)?;
        let image = load_image(image)?;
        self.caption_pair(&image, blip_prompt, blip2_prompt, max_new_tokens)
    }

    /// Caption an already-decoded image with BLIP then BLIP-2
    pub fn caption_pair(
        &self,
        image: &DynamicImage,
        blip_prompt: &str,
        blip2_prompt: &str,
        max_new_tokens: Option<usize>,
    ) -> Result<CaptionPair, CaptionError> {
        validate_prompt(BackendId::Blip, blip_prompt)?;
        validate_prompt(BackendId::Blip2, blip2_prompt)?;

        info!("Generating BLIP caption");
        let blip = self.caption_image(BackendId::Blip, image, blip_prompt, max_new_tokens)?;
        info!("Generating BLIP-2 caption");
        let blip2 = self.caption_image(BackendId::Blip2, image, blip2_prompt, max_new_tokens)?;

        Ok(CaptionPair { blip, blip2 })
    }

    /// Run both backends with their default prompts
    pub fn compare(&self, image: &ImageSource) -> Result<ComparisonReport, CaptionError> {
        let blip_prompt = BackendId::Blip.default_prompt();
        let blip2_prompt = BackendId::Blip2.default_prompt();
        let captions = self.generate_both(image, blip_prompt, blip2_prompt, None)?;

        Ok(ComparisonReport {
            device: self.device(),
            blip_prompt: blip_prompt.to_string(),
            blip2_prompt: blip2_prompt.to_string(),
            captions,
        })
    }

    fn backend(&self, id: BackendId) -> &dyn CaptionBackend {
        match id {
            BackendId::Blip => self.blip.as_ref(),
            BackendId::Blip2 => self.blip2.as_ref(),
        }
    }
}

/// Build a backend on the blocking pool; session commits are synchronous
async fn construct<B, F>(backend: BackendId, build: F) -> Result<B, CaptionError>
where
    B: Send + 'static,
    F: FnOnce() -> anyhow::Result<B> + Send + 'static,
{
    tokio::task::spawn_blocking(build)
        .await
        .map_err(|e| CaptionError::load(backend, anyhow::anyhow!("load task failed: {}", e)))?
        .map_err(|e| CaptionError::load(backend, e))
}

fn validate_prompt(backend: BackendId, prompt: &str) -> Result<(), CaptionError> {
    if prompt.trim().is_empty() {
        return Err(CaptionError::InvalidPrompt { backend });
    }
    Ok(())
}
