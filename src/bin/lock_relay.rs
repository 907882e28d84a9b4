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

//! Object-lock relay server.
//!
//! Viewers connect over WebSocket and every JSON message one of them sends
//! is forwarded to all the others. Also serves the remote control page.

use anyhow::Result;
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use avatar_robot::config::Config;
use avatar_robot::relay::RelayServer;

#[derive(Debug, Parser)]
#[command(version, about = "Object-lock WebSocket relay")]
struct Args {
    /// Configuration file (defaults to the user config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind.
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Remote control page to serve.
    #[arg(long)]
    page: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("avatar_robot=info".parse().unwrap())
                .add_directive("lock_relay=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let mut relay = match &args.config {
        Some(path) => Config::load_from(path)?.relay,
        None => Config::load()?.relay,
    };
    if let Some(port) = args.port {
        relay.port = port;
    }
    if let Some(bind) = args.bind {
        relay.bind_address = bind;
    }
    if let Some(page) = args.page {
        relay.page_path = page;
    }

    info!("Starting lock relay v{}...", env!("CARGO_PKG_VERSION"));

    let server = RelayServer::new(relay.page_path.clone());
    server
        .run(relay.socket_addr(), async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
