//! dirnoded - agent-record directory node
//!
//! Serves the Store, Routing, Search, Sync, and Sign gRPC contracts behind
//! one listener, backed by the content-addressed store (C2), the relational
//! search index (C3), and the libp2p DHT/gossip overlay (C4-C6).

use clap::Parser;
use dirnoded::config::Config;
use dirnoded::server::Server;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Config::parse();

    let filter = EnvFilter::from_default_env().add_directive("dirnoded=info".parse().unwrap());
    if cli.log_format.as_deref() == Some("json") {
        tracing_subscriber::registry().with(fmt::layer().json()).with(filter).init();
    } else {
        tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
    }

    let resolved = match cli.load() {
        Ok(resolved) => resolved,
        Err(e) => {
            error!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = Server::new(resolved).run().await {
        error!("server error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
