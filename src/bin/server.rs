//! keysync Server Binary
//!
//! Starts the TCP server for keysync.

use clap::Parser;
use keysync::network::Server;
use keysync::Config;
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing_subscriber::{fmt, EnvFilter};

/// keysync Server
#[derive(Parser, Debug)]
#[command(name = "keysync-server")]
#[command(about = "Real-time document sync server")]
#[command(version)]
struct Args {
    /// Storage root directory
    #[arg(short, long, default_value = "./keysync_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:4700")]
    listen: String,

    /// Tenant bucket to store documents under
    #[arg(short, long)]
    bucket: Option<String>,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Milliseconds to wait for in-flight requests on shutdown
    #[arg(long, default_value = "5000")]
    drain_timeout_ms: u64,

    /// Skip fsync after document writes
    #[arg(long)]
    no_fsync: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,keysync=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("keysync server v{}", keysync::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);

    // Build config from args
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .bucket(args.bucket)
        .max_connections(args.max_connections)
        .drain_timeout_ms(args.drain_timeout_ms)
        .fsync_writes(!args.no_fsync)
        .build();

    let server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    // SIGINT/SIGTERM stop the accept loop; run() then drains and returns
    for signal in [SIGINT, SIGTERM] {
        if let Err(e) = signal_hook::flag::register(signal, server.shutdown_flag()) {
            tracing::error!("Failed to register signal handler: {}", e);
            std::process::exit(1);
        }
    }

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
