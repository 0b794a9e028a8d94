//! Amplifier command codes and the outbound command frame
//!
//! Every host → amplifier message is a fixed 6-byte frame:
//!
//! ```text
//! 55 55 55 01 <code> <code>
//! ```
//!
//! - `55 55 55`: Preamble
//! - `01`: Length (always one data byte)
//! - `<code>`: Command byte
//! - `<code>`: Checksum (sum of one byte is the byte itself)

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use tracing::trace;

use crate::error::ProtocolError;

/// Host → amplifier preamble byte
pub const COMMAND_PREAMBLE: u8 = 0x55;

/// Length of an encoded command frame
pub const COMMAND_FRAME_LEN: usize = 6;

/// Amplifier command codes
///
/// Most codes mirror a front-panel key. `SwitchOn` is not understood by the
/// amplifier itself; it is handled by the serial-to-network bridge, which
/// toggles the amplifier's remote power line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CommandCode {
    /// INPUT key: select input 1/2
    Input = 0x01,
    /// BAND ◁ key
    BandDown = 0x02,
    /// BAND ▷ key
    BandUp = 0x03,
    /// ANT key: select antenna
    Antenna = 0x04,
    /// L ◁ key: tuner inductance down
    LDown = 0x05,
    /// L ▷ key: tuner inductance up
    LUp = 0x06,
    /// C ◁ key: tuner capacitance down
    CDown = 0x07,
    /// C ▷ key: tuner capacitance up
    CUp = 0x08,
    /// TUNE key
    Tune = 0x09,
    /// OFF key: power the amplifier down
    SwitchOff = 0x0A,
    /// POWER key: cycle power level
    Power = 0x0B,
    /// DISPLAY key
    Display = 0x0C,
    /// OPERATE key: toggle standby/operate
    Operate = 0x0D,
    /// CAT key
    Cat = 0x0E,
    /// ◁ △ key
    LeftArrow = 0x0F,
    /// ▽ ▷ key
    RightArrow = 0x10,
    /// SET key
    Set = 0x11,
    /// Power the amplifier up (bridge-handled)
    SwitchOn = 0x12,
    /// Request a screen image frame
    ScreenDump = 0x80,
    /// Turn the LCD backlight on
    BacklightOn = 0x82,
    /// Turn the LCD backlight off
    BacklightOff = 0x83,
    /// Request a status record frame
    Status = 0x90,
}

impl CommandCode {
    /// All command codes, in code order
    pub const ALL: [CommandCode; 22] = [
        CommandCode::Input,
        CommandCode::BandDown,
        CommandCode::BandUp,
        CommandCode::Antenna,
        CommandCode::LDown,
        CommandCode::LUp,
        CommandCode::CDown,
        CommandCode::CUp,
        CommandCode::Tune,
        CommandCode::SwitchOff,
        CommandCode::Power,
        CommandCode::Display,
        CommandCode::Operate,
        CommandCode::Cat,
        CommandCode::LeftArrow,
        CommandCode::RightArrow,
        CommandCode::Set,
        CommandCode::SwitchOn,
        CommandCode::ScreenDump,
        CommandCode::BacklightOn,
        CommandCode::BacklightOff,
        CommandCode::Status,
    ];

    /// The raw command byte
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Encode this command as a wire frame
    pub fn frame(self) -> [u8; COMMAND_FRAME_LEN] {
        let code = self.code();
        [
            COMMAND_PREAMBLE,
            COMMAND_PREAMBLE,
            COMMAND_PREAMBLE,
            0x01,
            code,
            code,
        ]
    }

    /// Command name as accepted by [`FromStr`]
    pub fn name(self) -> &'static str {
        match self {
            CommandCode::Input => "input",
            CommandCode::BandDown => "band-down",
            CommandCode::BandUp => "band-up",
            CommandCode::Antenna => "antenna",
            CommandCode::LDown => "l-down",
            CommandCode::LUp => "l-up",
            CommandCode::CDown => "c-down",
            CommandCode::CUp => "c-up",
            CommandCode::Tune => "tune",
            CommandCode::SwitchOff => "off",
            CommandCode::Power => "power",
            CommandCode::Display => "display",
            CommandCode::Operate => "operate",
            CommandCode::Cat => "cat",
            CommandCode::LeftArrow => "left",
            CommandCode::RightArrow => "right",
            CommandCode::Set => "set",
            CommandCode::SwitchOn => "on",
            CommandCode::ScreenDump => "screen",
            CommandCode::BacklightOn => "backlight-on",
            CommandCode::BacklightOff => "backlight-off",
            CommandCode::Status => "status",
        }
    }

    /// Returns true for the two poll requests used by the heartbeat
    pub fn is_poll(self) -> bool {
        matches!(self, CommandCode::Status | CommandCode::ScreenDump)
    }
}

/// Encode a command as a wire frame
pub fn encode_command(code: CommandCode) -> [u8; COMMAND_FRAME_LEN] {
    code.frame()
}

/// Streaming parser for host → amplifier command frames
///
/// This is the amplifier's side of the link. Frames are accepted only when
/// the preamble, length and echoed code all match; anything else is skipped
/// one byte at a time.
#[derive(Debug, Default)]
pub struct CommandDecoder {
    buffer: Vec<u8>,
    ready: VecDeque<Result<CommandCode, ProtocolError>>,
}

impl CommandDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes received from the host
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        while self.buffer.len() >= COMMAND_FRAME_LEN {
            let frame = &self.buffer[..COMMAND_FRAME_LEN];
            let framed = frame[..3].iter().all(|&b| b == COMMAND_PREAMBLE)
                && frame[3] == 0x01
                && frame[4] == frame[5];
            if framed {
                self.ready.push_back(CommandCode::try_from(frame[4]));
                self.buffer.drain(..COMMAND_FRAME_LEN);
            } else {
                trace!("skipping byte 0x{:02X} outside a command frame", frame[0]);
                self.buffer.remove(0);
            }
        }
    }

    /// Take the next complete frame
    ///
    /// Well-formed frames with a code outside [`CommandCode`] are reported
    /// as [`ProtocolError::UnknownCommandCode`].
    pub fn next_command(&mut self) -> Option<Result<CommandCode, ProtocolError>> {
        self.ready.pop_front()
    }
}

impl TryFrom<u8> for CommandCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        CommandCode::ALL
            .iter()
            .copied()
            .find(|c| c.code() == value)
            .ok_or(ProtocolError::UnknownCommandCode(value))
    }
}

impl FromStr for CommandCode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        CommandCode::ALL
            .iter()
            .copied()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| ProtocolError::UnknownCommandName(s.trim().to_string()))
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
