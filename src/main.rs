// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Avatar Robot bridge host.
//!
//! Reads page calls (`AndroidBluetooth.*`, `AndroidTTS.*`) from stdin and
//! prints return values and page hooks to stdout. Logs go to stderr.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use avatar_robot::bluetooth::{CommandChannel, LinkConfig, NoRadio, Radio};
use avatar_robot::bridge::{BridgeCall, BridgeHost, PageHook};
use avatar_robot::config::Config;
use avatar_robot::speech;

#[derive(Debug, Parser)]
#[command(version, about = "Avatar Robot bridge host")]
struct Args {
    /// Configuration file (defaults to the user config directory).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("avatar_robot=info".parse().unwrap()),
        )
        .init();

    info!(
        "Starting Avatar Robot bridge v{}...",
        env!("CARGO_PKG_VERSION")
    );

    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!("Configuration loaded");

    let radio = create_radio().await;
    let (channel, mut notifications) =
        CommandChannel::spawn(radio, LinkConfig::from(&config.bluetooth));

    let tts = speech::create_synthesizer(config.speech.enabled, &config.speech.language);
    info!("Speech backend: {}", tts.backend_name());

    let host = BridgeHost::new(channel, tts);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    info!("Ready. Waiting for page calls on stdin.");

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => match BridgeCall::parse(&line) {
                    Some(call) => {
                        if let Some(reply) = host.dispatch(call).await {
                            println!("{}", reply);
                        }
                    }
                    None => warn!("Unknown page call: {}", line.trim()),
                },
                None => {
                    info!("Input closed");
                    break;
                }
            },
            Some(notification) = notifications.recv() => {
                println!("{}", PageHook(&notification));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    host.bluetooth().disconnect_and_wait().await;
    info!("Avatar Robot bridge stopped");
    Ok(())
}

#[cfg(feature = "bluez")]
async fn create_radio() -> Arc<dyn Radio> {
    match avatar_robot::bluetooth::BluezRadio::new().await {
        Ok(radio) => Arc::new(radio),
        Err(e) => {
            warn!("BlueZ unavailable: {}", e);
            Arc::new(NoRadio)
        }
    }
}

#[cfg(not(feature = "bluez"))]
async fn create_radio() -> Arc<dyn Radio> {
    warn!("Built without BlueZ support, Bluetooth will report as unsupported");
    Arc::new(NoRadio)
}
