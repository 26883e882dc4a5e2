// ABOUTME: Relay server binary - parses CLI flags, initializes logging, runs the server
// ABOUTME: CLI flags override environment configuration where provided
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hookrelay Contributors

//! Hookrelay server entry point

use anyhow::Result;
use clap::Parser;
use hookrelay::config::environment::ServerConfig;
use hookrelay::logging;
use hookrelay::server;

#[derive(Parser)]
#[command(
    name = "hookrelay-server",
    about = "Real-time webhook event relay over SSE",
    version
)]
struct Args {
    /// HTTP listen port (overrides HTTP_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// HTTP listen host (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Event source variant: push or pull (overrides RELAY_SOURCE_MODE)
    #[arg(long)]
    source: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(port) = args.port {
        config.http_port = port;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(source) = args.source {
        config.relay.source_mode =
            hookrelay::config::environment::SourceMode::from_str_or_default(&source);
    }

    server::run(config).await
}
