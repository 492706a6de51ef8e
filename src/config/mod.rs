// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod settings;

pub use settings::{ApiSettings, HostConfig, CONFIG_PATH_ENV, DEFAULT_BLIP2_DIR, DEFAULT_BLIP_DIR};
