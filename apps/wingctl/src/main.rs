use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use client_core::spawn_session;
use tracing_subscriber::EnvFilter;

mod console;
mod settings;

#[derive(Parser, Debug)]
#[command(name = "wingctl", about = "Remote control for a morphing-wing actuator")]
struct Args {
    /// Settings file; defaults to ./wingctl.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Endpoint used by a bare `connect`.
    #[arg(long)]
    endpoint: Option<String>,
    /// Connect to the default endpoint on startup.
    #[arg(long)]
    connect: bool,
    #[arg(long)]
    preset_delay_ms: Option<u64>,
    #[arg(long)]
    log_filter: Option<String>,
}

impl Args {
    fn apply(&self, settings: &mut settings::Settings) {
        if let Some(endpoint) = &self.endpoint {
            settings.default_endpoint = endpoint.clone();
        }
        if let Some(delay) = self.preset_delay_ms {
            settings.preset_delay_ms = delay;
        }
        if let Some(filter) = &self.log_filter {
            settings.log_filter = filter.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = settings::load_settings(args.config.as_deref())?;
    args.apply(&mut settings);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let (session, runtime) = spawn_session(settings.session_options());
    console::run(session, &settings, args.connect).await?;
    runtime.await?;
    Ok(())
}
