// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Locating model artifacts on disk or on the Hugging Face hub

use anyhow::{Context, Result};
use hf_hub::api::tokio::Api;
use hf_hub::{Repo, RepoType};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Where a backend's ONNX export lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelSource {
    /// A local directory laid out like the hub repository
    Local { dir: PathBuf },
    /// A hub repository, downloaded into the local hub cache on first use
    Hub {
        repo: String,
        #[serde(default)]
        revision: Option<String>,
    },
}

impl ModelSource {
    pub fn local(dir: impl Into<PathBuf>) -> Self {
        Self::Local { dir: dir.into() }
    }

    pub fn hub(repo: impl Into<String>) -> Self {
        Self::Hub {
            repo: repo.into(),
            revision: None,
        }
    }

    /// Resolve to a directory containing every file in `files`.
    ///
    /// `files` are paths relative to the model root (e.g.
    /// `onnx/vision_model.onnx`). Hub sources download missing files.
    pub async fn fetch(&self, files: &[String]) -> Result<PathBuf> {
        match self {
            Self::Local { dir } => {
                if !dir.exists() {
                    anyhow::bail!("Model directory not found: {}", dir.display());
                }
                let missing: Vec<_> = files
                    .iter()
                    .filter(|f| !dir.join(f.as_str()).exists())
                    .collect();
                if !missing.is_empty() {
                    anyhow::bail!(
                        "Model files not found in {}: {:?}",
                        dir.display(),
                        missing
                    );
                }
                Ok(dir.clone())
            }
            Self::Hub { repo, revision } => {
                let api = Api::new().context("Failed to initialize Hugging Face hub client")?;
                let repo_handle = match revision {
                    Some(rev) => api.repo(Repo::with_revision(
                        repo.clone(),
                        RepoType::Model,
                        rev.clone(),
                    )),
                    None => api.model(repo.clone()),
                };

                let mut root = None;
                for file in files {
                    info!("Fetching {}/{}", repo, file);
                    let path = repo_handle
                        .get(file)
                        .await
                        .with_context(|| format!("Failed to download {} from {}", file, repo))?;
                    if root.is_none() {
                        root = Some(model_root(&path, file)?);
                    }
                }

                root.ok_or_else(|| anyhow::anyhow!("No artifact files requested for {}", repo))
            }
        }
    }
}

impl std::fmt::Display for ModelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { dir } => write!(f, "{}", dir.display()),
            Self::Hub {
                repo,
                revision: Some(rev),
            } => write!(f, "hf://{}@{}", repo, rev),
            Self::Hub { repo, .. } => write!(f, "hf://{}", repo),
        }
    }
}

/// Strip the relative artifact path from a downloaded file to get the root
fn model_root(downloaded: &Path, relative: &str) -> Result<PathBuf> {
    let depth = Path::new(relative).components().count();
    downloaded
        .ancestors()
        .nth(depth)
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Cannot derive model root from {} and {}",
                downloaded.display(),
                relative
            )
        })
}
