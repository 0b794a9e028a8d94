//! Virtual SPE Expert amplifier
//!
//! Answers polls with well-formed status and screen frames and acknowledges
//! every other command, updating its state the way the front-panel keys
//! would. Useful for exercising the link layer without hardware.

use serde::Deserialize;
use spe_protocol::encode::{ack_frame, screen_frame, status_frame};
use spe_protocol::status::BANDS_METERS;
use spe_protocol::{AmpModel, CommandCode, StatusSnapshot};
use tracing::debug;

use crate::panel::render_panel;

/// Configuration for creating a virtual amplifier
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VirtualAmplifierConfig {
    /// Identifier for logging
    pub id: String,
    /// Model reported in the status record
    pub model: AmpModel,
    /// Initial band index
    pub band: u8,
    /// Whether the amplifier starts switched on
    pub powered: bool,
}

impl Default for VirtualAmplifierConfig {
    fn default() -> Self {
        Self {
            id: "Virtual Expert".to_string(),
            model: AmpModel::Expert1_3K,
            band: 5, // 20m
            powered: true,
        }
    }
}

/// Virtual amplifier
///
/// Tracks the status fields the front-panel keys change. Used by the virtual
/// amplifier task, which feeds it decoded command frames.
#[derive(Debug)]
pub struct VirtualAmplifier {
    id: String,
    status: StatusSnapshot,
    powered: bool,
    backlight: bool,
    /// Commands received (for test verification)
    received_commands: Vec<CommandCode>,
}

impl VirtualAmplifier {
    pub fn new(id: impl Into<String>, model: AmpModel) -> Self {
        Self::from_config(VirtualAmplifierConfig {
            id: id.into(),
            model,
            ..VirtualAmplifierConfig::default()
        })
    }

    pub fn from_config(config: VirtualAmplifierConfig) -> Self {
        let status = StatusSnapshot {
            amp_id: config.model.id(),
            band: config.band % BANDS_METERS.len() as u8,
            atu_status: b'b',
            pa_voltage: 487,
            temp_upper: 31,
            temp_lower: 30,
            temp_combiner: 29,
            ..StatusSnapshot::default()
        };
        Self {
            id: config.id,
            status,
            powered: config.powered,
            backlight: true,
            received_commands: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current status record contents
    pub fn status(&self) -> &StatusSnapshot {
        &self.status
    }

    /// Whether the amplifier is switched on and answering
    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn backlight(&self) -> bool {
        self.backlight
    }

    /// Commands received so far
    pub fn received_commands(&self) -> &[CommandCode] {
        &self.received_commands
    }

    /// Key or unkey the simulated exciter
    ///
    /// Transmitting in operate produces output power and PA current; in
    /// standby the amplifier passes the drive through.
    pub fn set_transmit(&mut self, transmit: bool) {
        self.status.receive_transmit = if transmit { b'T' } else { b'R' };
        self.update_meters();
    }

    /// Raise an alarm code (`b'N'` clears it)
    pub fn set_alarm(&mut self, code: u8) {
        self.status.alarm = code;
        if code != b'N' {
            self.status.standby_operate = b'S';
            self.update_meters();
        }
    }

    pub fn set_warning(&mut self, code: u8) {
        self.status.warning = code;
    }

    /// Process one command and return the frame the amplifier sends back
    ///
    /// A switched-off amplifier ignores everything except `SwitchOn`, which
    /// the bridge handles without a reply.
    pub fn process_command(&mut self, code: CommandCode) -> Option<Vec<u8>> {
        self.received_commands.push(code);

        if !self.powered {
            if code == CommandCode::SwitchOn {
                debug!("Virtual amp {} switched on", self.id);
                self.powered = true;
            }
            return None;
        }

        match code {
            CommandCode::Status => return Some(status_frame(&self.status.to_payload())),
            CommandCode::ScreenDump => return Some(screen_frame(&render_panel(&self.status))),
            CommandCode::Operate => {
                self.status.standby_operate = if self.status.is_operate() { b'S' } else { b'O' };
                self.update_meters();
            }
            CommandCode::BandUp => {
                self.status.band = (self.status.band + 1) % BANDS_METERS.len() as u8;
            }
            CommandCode::BandDown => {
                let bands = BANDS_METERS.len() as u8;
                self.status.band = (self.status.band + bands - 1) % bands;
            }
            CommandCode::Power => {
                self.status.power_level = match self.status.power_level {
                    b'L' => b'M',
                    b'M' => b'H',
                    _ => b'L',
                };
                self.update_meters();
            }
            CommandCode::Input => {
                self.status.input = if self.status.input == b'1' { b'2' } else { b'1' };
            }
            CommandCode::Antenna => {
                self.status.tx_antenna = match self.status.tx_antenna {
                    b'1' => b'2',
                    b'2' => b'3',
                    b'3' => b'4',
                    _ => b'1',
                };
            }
            CommandCode::SwitchOff => {
                debug!("Virtual amp {} switching off", self.id);
                self.powered = false;
                self.status.standby_operate = b'S';
                self.status.receive_transmit = b'R';
                self.update_meters();
                return Some(ack_frame(code.code()).to_vec());
            }
            CommandCode::BacklightOn => self.backlight = true,
            CommandCode::BacklightOff => self.backlight = false,
            _ => {}
        }

        Some(ack_frame(code.code()).to_vec())
    }

    fn update_meters(&mut self) {
        let s = &mut self.status;
        if s.is_operate() && s.is_transmit() {
            let (watts, amps) = match s.power_level {
                b'H' => (1300, 380),
                b'M' => (900, 270),
                _ => (500, 160),
            };
            s.output_power = watts;
            s.pa_current = amps;
            s.pa_voltage = 472;
            s.swr_antenna = 115;
            s.swr_atu = 105;
        } else {
            s.output_power = 0;
            s.pa_current = 0;
            s.pa_voltage = 487;
            s.swr_antenna = 1;
            s.swr_atu = 1;
        }
    }
}
