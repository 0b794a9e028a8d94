//! Remote power-on through the bridge's serial control lines
//!
//! The amplifier's remote-on input is wired to the USB adapter's handshake
//! lines. Holding RTS with DTR released for a second switches it on.

use std::time::Duration;

use tracing::info;

use crate::error::ConsoleError;

/// Baud rate the bridge uses for the amplifier port
pub const BAUD_RATE: u32 = 115_200;

/// How long the power-on pulse is held
pub const PULSE: Duration = Duration::from_secs(1);

/// Pulse the power-on line of the amplifier attached to `port_name`
pub async fn power_on(port_name: &str) -> Result<(), ConsoleError> {
    info!("Sending power-on pulse on {}", port_name);

    let mut port = serialport::new(port_name, BAUD_RATE)
        .timeout(Duration::from_millis(100))
        .open()?;

    port.write_data_terminal_ready(false)?;
    port.write_request_to_send(true)?;
    tokio::time::sleep(PULSE).await;
    port.write_data_terminal_ready(true)?;
    port.write_request_to_send(false)?;

    info!("Power-on pulse sent");
    Ok(())
}
