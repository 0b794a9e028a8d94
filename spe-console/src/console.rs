//! Interactive console
//!
//! Reads command names from stdin and sends them to the amplifier while
//! logging status, screen and liveness changes. Switching the amplifier off
//! needs a confirmation line.

use std::process::ExitCode;
use std::sync::Arc;

use spe_link::{spawn_session, LinkError, LinkEvent, SessionEnd, SessionHandle};
use spe_protocol::{CommandCode, ScreenSnapshot, StatusSnapshot};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tracing::{debug, info, warn};

use crate::error::ConsoleError;
use crate::settings::Settings;

/// What a line of input asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send a command to the amplifier
    Send(CommandCode),
    /// Print the latest status and screen
    Show,
    /// Print decoder counters
    Stats,
    /// Print a message for the user
    Reply(String),
    /// End the session
    Quit,
    /// Nothing to do
    Nothing,
}

/// Line interpreter with the power-off confirmation state
#[derive(Debug, Default)]
pub struct Prompt {
    confirm_off: bool,
}

impl Prompt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpret one line of input
    pub fn handle(&mut self, line: &str) -> Action {
        let line = line.trim();

        if self.confirm_off {
            self.confirm_off = false;
            return if line.eq_ignore_ascii_case("y") || line.eq_ignore_ascii_case("yes") {
                Action::Send(CommandCode::SwitchOff)
            } else {
                Action::Reply("Power off cancelled".to_string())
            };
        }

        match line.to_ascii_lowercase().as_str() {
            "" => Action::Nothing,
            "quit" | "exit" => Action::Quit,
            "show" => Action::Show,
            "stats" => Action::Stats,
            "help" | "?" => Action::Reply(help_text()),
            _ => match line.parse::<CommandCode>() {
                Ok(CommandCode::SwitchOff) => {
                    self.confirm_off = true;
                    Action::Reply("Switch the amplifier off? [y/N]".to_string())
                }
                Ok(code) => Action::Send(code),
                Err(e) => Action::Reply(format!("{e} (type 'help' for a list)")),
            },
        }
    }
}

fn help_text() -> String {
    let names: Vec<_> = CommandCode::ALL.iter().map(|c| c.name()).collect();
    format!(
        "Commands: {}\nAlso: show, stats, help, quit",
        names.join(", ")
    )
}

/// Tracks what has been logged so repeated polls stay quiet
#[derive(Debug, Default)]
struct Reporter {
    last_status: Option<Arc<StatusSnapshot>>,
    last_screen: Option<Arc<ScreenSnapshot>>,
}

impl Reporter {
    fn status(&mut self, status: Arc<StatusSnapshot>) {
        if self.last_status.as_deref() != Some(&*status) {
            info!("Status: {}", status);
            self.last_status = Some(status);
        }
    }

    fn screen(&mut self, screen: Arc<ScreenSnapshot>) {
        if self.last_screen.as_deref() != Some(&*screen) {
            info!("Screen:\n{}", screen);
            self.last_screen = Some(screen);
        }
    }
}

fn log_event(event: &LinkEvent) {
    if event.is_poll() {
        return;
    }
    match event {
        LinkEvent::DeviceSilent => warn!("Amplifier is not responding"),
        LinkEvent::DeviceResponding => info!("Amplifier is responding"),
        LinkEvent::Acknowledged {
            command: Some(code),
            ..
        } => info!("Amplifier acknowledged {}", code),
        LinkEvent::Acknowledged {
            value,
            command: None,
        } => debug!("Acknowledgment for unknown command 0x{:02X}", value),
        _ => {}
    }
}

fn show(handle: &SessionHandle) {
    println!("{}", handle.status());
    println!("{}", handle.screen());
    let leds = handle.leds();
    println!(
        "LEDs: power={} operate={} tx={} tune={} set={} alarm={}",
        leds.power, leds.operate, leds.transmit, leds.tune, leds.set, leds.alarm
    );
}

/// Run the console over an open transport until the session ends
///
/// Both a clean close and a requested quit exit successfully; a transport
/// error exits with failure.
pub async fn run_console<T>(io: T, settings: &Settings) -> Result<ExitCode, ConsoleError>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut session, mut handle) = spawn_session(io, settings.link.clone())?;
    let mut status_rx = handle.status_receiver();
    let mut screen_rx = handle.screen_receiver();
    let commands = handle.commands();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut prompt = Prompt::new();
    let mut reporter = Reporter::default();

    println!("Type a command name (e.g. operate, tune, band-up) or 'help'.");

    let joined = loop {
        tokio::select! {
            joined = &mut session => break joined,

            Ok(()) = status_rx.changed() => {
                reporter.status(status_rx.borrow_and_update().clone());
            }

            Ok(()) = screen_rx.changed() => {
                reporter.screen(screen_rx.borrow_and_update().clone());
            }

            Some(event) = handle.next_event() => log_event(&event),

            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => match prompt.handle(&line) {
                        Action::Send(code) => {
                            if let Err(e) = commands.send(code).await {
                                warn!("Could not send {}: {}", code, e);
                            }
                        }
                        Action::Show => show(&handle),
                        Action::Stats => println!("{:?}", handle.stats()),
                        Action::Reply(text) => println!("{text}"),
                        Action::Quit => handle.shutdown(),
                        Action::Nothing => {}
                    },
                    Ok(None) => {
                        debug!("stdin closed, continuing without command entry");
                        stdin_open = false;
                    }
                    Err(e) => {
                        warn!("stdin error: {}", e);
                        stdin_open = false;
                    }
                }
            }
        }
    };

    match joined? {
        Ok(SessionEnd::Closed) => {
            info!("Connection closed by the bridge");
            Ok(ExitCode::SUCCESS)
        }
        Ok(SessionEnd::Shutdown) => Ok(ExitCode::SUCCESS),
        Err(LinkError::Io(e)) => {
            warn!("Connection failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
