//! SPE Expert Remote Console
//!
//! A terminal remote control for SPE Expert linear amplifiers reached
//! through a serial-to-TCP bridge.

mod cli;
mod console;
mod error;
mod power_on;
mod settings;

use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Command};
use error::ConsoleError;
use settings::Settings;
use spe_sim::{run_virtual_amp_task, VirtualAmplifier};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Buffer size of the in-process pipe used with `--simulate`
const SIMULATION_PIPE: usize = 4096;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "spe_control=info,spe_protocol=info,spe_link=info,spe_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, ConsoleError> {
    let mut settings = Settings::load(cli.overrides.config.as_deref())?;
    cli.apply(&mut settings);

    match cli.action() {
        Command::PowerOn { .. } => {
            let port = settings.serial_port.ok_or(ConsoleError::NoSerialPort)?;
            power_on::power_on(&port).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Run if cli.overrides.simulate => run_simulated(&settings).await,
        Command::Run => {
            let addr = settings.address();
            info!("Connecting to {}", addr);
            let stream = TcpStream::connect(&addr)
                .await
                .map_err(|source| ConsoleError::Connect {
                    addr: addr.clone(),
                    source,
                })?;
            // Commands are single small frames
            stream.set_nodelay(true).map_err(|source| ConsoleError::Connect {
                addr: addr.clone(),
                source,
            })?;
            info!("Connected to {}", addr);

            console::run_console(stream, &settings).await
        }
    }
}

/// Run the console against a virtual amplifier in this process
async fn run_simulated(settings: &Settings) -> Result<ExitCode, ConsoleError> {
    let amp = VirtualAmplifier::from_config(settings.simulation.clone());
    info!("Simulating {} ({})", amp.id(), amp.status());

    let (host, device) = tokio::io::duplex(SIMULATION_PIPE);
    let (_amp_cmd_tx, amp_cmd_rx) = mpsc::channel(8);
    let (state_tx, _) = broadcast::channel(8);
    let amp_task = tokio::spawn(run_virtual_amp_task(device, amp, amp_cmd_rx, state_tx));

    let code = console::run_console(host, settings).await;
    amp_task.abort();
    code
}
