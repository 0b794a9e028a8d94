//! Command-line parsing

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use spe_link::PollPolicy;

use crate::settings::Settings;

#[derive(Debug, Parser)]
#[command(
    name = "spe-control",
    version,
    about = "Terminal remote control for SPE Expert amplifiers",
    after_help = "Logging is controlled with RUST_LOG."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Connect and run the remote console (default)
    Run,
    /// Pulse the amplifier's power-on line
    PowerOn {
        /// Serial port wired to the power-on lines (default: from settings)
        serial_port: Option<String>,
    },
}

/// Options that override the settings file
#[derive(Debug, Args, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Settings file (default: ~/.config/spe-control/settings.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Bridge host
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Bridge TCP port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Poll policy: screen-only, status-only or alternate
    #[arg(long = "poll", global = true, value_name = "POLICY")]
    pub poll_policy: Option<PollPolicy>,

    /// Talk to a built-in virtual amplifier instead of the network
    #[arg(long, global = true)]
    pub simulate: bool,
}

impl Cli {
    pub fn action(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Run)
    }

    /// Apply command-line overrides on top of loaded settings
    pub fn apply(&self, settings: &mut Settings) {
        let o = &self.overrides;
        if let Some(host) = &o.host {
            settings.host = host.clone();
        }
        if let Some(port) = o.port {
            settings.port = port;
        }
        if let Some(policy) = o.poll_policy {
            settings.link.poll_policy = policy;
        }
        if let Command::PowerOn {
            serial_port: Some(port),
        } = self.action()
        {
            settings.serial_port = Some(port.clone());
        }
    }
}
