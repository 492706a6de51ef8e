// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use dual_caption_node::{
    api::{errors::MISSING_MODELS_HINT, start_server, AppState},
    config::HostConfig,
    version,
    vision::CaptionHost,
};
use std::{env, sync::Arc};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("🚀 Starting {}...\n", version::get_version_string());
    println!("📦 BUILD VERSION: {}", version::VERSION);
    println!("🧩 Features: {}", version::FEATURES.join(", "));
    println!();

    let config = HostConfig::load().context("Failed to load configuration")?;
    println!("🖥️  Device preference: {}", config.device);
    println!("📁 BLIP models: {}", config.blip);
    println!("📁 BLIP-2 models: {}", config.blip2);

    // Serve the page and /health while the models load; caption routes
    // answer 503 until the host is set
    let state = AppState::new(config.api.clone());
    let mut server = tokio::spawn(start_server(state.clone()));

    println!("🧠 Loading BLIP and BLIP-2...");
    let host = tokio::select! {
        loaded = CaptionHost::load(&config) => match loaded {
            Ok(host) => Arc::new(host),
            Err(e) => {
                server.abort();
                eprintln!("❌ Failed to load caption models: {}", e);
                if e.is_load_error() {
                    eprintln!("   {}", MISSING_MODELS_HINT);
                }
                return Err(e.into());
            }
        },
        result = &mut server => {
            result.context("API server task panicked")??;
            return Ok(());
        }
    };

    for info in host.backend_info() {
        println!(
            "✅ {} loaded on {} ({}) from {}",
            info.name,
            info.device,
            info.precision,
            info.source.as_deref().unwrap_or("memory")
        );
    }
    state.set_host(host).await;

    println!(
        "\n🌐 Open http://{}:{}/ to caption images",
        config.api.host, config.api.port
    );
    println!("Press Ctrl+C to shutdown...");

    tokio::select! {
        result = &mut server => {
            result.context("API server task panicked")??;
        }
        _ = signal::ctrl_c() => {
            println!("\n🛑 Shutting down...");
            server.abort();
        }
    }

    Ok(())
}
