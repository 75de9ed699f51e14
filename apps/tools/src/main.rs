use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod simulator;

use simulator::{router, DeviceConfig, DeviceState};

#[derive(Parser, Debug)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve a fake wing actuator that acknowledges setAngle commands with telemetry.
    SimulateDevice {
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
        /// Delay before each telemetry reply.
        #[arg(long, default_value_t = 0)]
        lag_ms: u64,
        /// Added to every reported angle to mimic an actuator that undershoots or overshoots.
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        offset: f64,
    },
}

fn log_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(log_filter("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::SimulateDevice {
            bind,
            lag_ms,
            offset,
        } => {
            let state = DeviceState::new(DeviceConfig::new(lag_ms, offset));
            let listener = TcpListener::bind(&bind)
                .await
                .with_context(|| format!("failed to bind simulator on {bind}"))?;
            info!(addr = %listener.local_addr()?, "simulated wing device listening");
            axum::serve(listener, router(state))
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await
                .context("simulator server failed")?;
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
