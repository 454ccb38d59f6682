//! CLI client binary for the kakehashi signaling broker.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kakehashi-client -- --username alice
//! cargo run --bin kakehashi-client -- --url ws://example.net:8080/ws --username bob
//! ```

use std::path::PathBuf;

use clap::Parser;

use kakehashi_client::runner::run_client;
use kakehashi_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "kakehashi-client")]
#[command(about = "CLI client for the kakehashi signaling broker", long_about = None)]
struct Args {
    /// WebSocket URL of the signaling broker
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,

    /// Display name shown to the other room member
    #[arg(short = 'n', long, default_value = "anonymous")]
    username: String,

    /// Directory where received files are saved
    #[arg(short = 'd', long, default_value = ".")]
    download_dir: PathBuf,

    /// Host the peer channel listener advertises to the other endpoint
    #[arg(long, default_value = "127.0.0.1")]
    peer_host: String,
}

#[tokio::main]
async fn main() {
    // Initialize tracing (quiet by default, the terminal is the chat UI)
    setup_logger(env!("CARGO_BIN_NAME"), "warn");

    let args = Args::parse();

    if let Err(e) = run_client(args.url, args.username, &args.download_dir, args.peer_host).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
