//! Entry point for `udptest`.
//!
//! Parses CLI arguments and dispatches into either server or client mode.
//! All protocol work lives in the library; this file owns process setup
//! (logging, signal handling, argument parsing).

use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use udptest::protocol::constants;
use udptest::config::parse_bitrate;
use udptest::{Client, ClientConfig, Server, ServerConfig, UdptestError};

/// UDP throughput, loss and latency test bench.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Args)]
struct Endpoint {
    /// Server address.
    #[arg(short, long, default_value = constants::DEFAULT_ADDRESS)]
    address: String,

    /// Server control port.
    #[arg(short, long, default_value_t = constants::DEFAULT_PORT)]
    port: u16,
}

#[derive(Subcommand)]
enum Mode {
    /// Accept test sessions and echo their packets.
    Server {
        #[command(flatten)]
        endpoint: Endpoint,
    },
    /// Run one test session against a server.
    Client {
        #[command(flatten)]
        endpoint: Endpoint,

        /// Bits per second to send, optionally suffixed with k, m or g.
        #[arg(short, long, default_value = constants::DEFAULT_BITRATE)]
        bitrate: String,

        /// Packets per second to send.
        #[arg(short = 'r', long, default_value_t = constants::DEFAULT_PACKET_RATE)]
        packetrate: u32,

        /// Total time to test, in seconds.
        #[arg(short, long, default_value_t = constants::DEFAULT_DURATION_SECS)]
        time: u64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli.mode).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("UDP Test failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(mode: Mode) -> Result<(), UdptestError> {
    match mode {
        Mode::Server { endpoint } => {
            let config = ServerConfig {
                address: endpoint.address,
                port: endpoint.port,
            };
            let server = Server::bind(&config).await?;
            server.run(shutdown_signal()).await;
            Ok(())
        }
        Mode::Client {
            endpoint,
            bitrate,
            packetrate,
            time,
        } => {
            let config = ClientConfig {
                address: endpoint.address,
                port: endpoint.port,
                bitrate: parse_bitrate(&bitrate)?,
                packet_rate: packetrate,
                duration: Duration::from_secs(time),
            };
            let client = Client::new(&config).await?;
            client.run(shutdown_signal()).await?;
            Ok(())
        }
    }
}

/// Completes on SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::debug!("Intercepted SIGINT"),
        _ = terminate => tracing::debug!("Intercepted SIGTERM"),
    }
}
