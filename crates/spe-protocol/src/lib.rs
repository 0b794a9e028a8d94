//! SPE Expert Remote Protocol Library
//!
//! This crate provides decoding and encoding for the binary remote-control
//! protocol spoken by SPE Expert linear amplifiers (1.3K-FA, 1.5K-FA, 2K-FA):
//!
//! - **Command frames** (host → amplifier): 6 bytes, `55 55 55 01 <code> <code>`
//! - **ACK frames** (amplifier → host): 6 bytes, `AA AA AA 01 <ack> <ack>`
//! - **Status frames**: a 67-byte ASCII status record with a 16-bit sum checksum
//! - **Screen frames**: a 361-byte image of the front-panel LCD with a 16-bit
//!   sum checksum
//!
//! # Architecture
//!
//! - [`frame::FrameDecoder`] is a byte-at-a-time state machine. It tolerates
//!   arbitrary chunking of the incoming stream and resynchronizes silently on
//!   any framing or checksum mismatch (the device has no NAK).
//! - [`status::StatusSnapshot`] and [`screen::ScreenSnapshot`] interpret the
//!   validated payloads carried by a [`Message`].
//! - [`encode`] builds the amplifier-side frames, which the simulator and
//!   tests use to produce well-formed input.
//!
//! # Example
//!
//! ```rust
//! use spe_protocol::{CommandCode, FrameDecoder, Message};
//!
//! // The device echoes a command back as an ACK frame
//! let mut decoder = FrameDecoder::new();
//! decoder.push_bytes(&[0xAA, 0xAA, 0xAA, 0x01, 0x05, 0x05]);
//!
//! let msg = decoder.next_message().unwrap();
//! assert_eq!(msg, Message::Ack(CommandCode::LDown as u8));
//! ```

pub mod command;
pub mod encode;
pub mod error;
pub mod frame;
pub mod screen;
pub mod status;

pub use command::{CommandCode, CommandDecoder};
pub use error::ProtocolError;
pub use frame::{DecoderStats, FrameDecoder, ProtocolState};
pub use screen::{Leds, ScreenLine, ScreenSnapshot};
pub use status::{Alarm, AmpModel, StatusSnapshot, Warning};

/// Length of a status record payload in bytes
pub const STATUS_PAYLOAD_LEN: usize = 67;

/// Length of a screen image payload in bytes
pub const SCREEN_PAYLOAD_LEN: usize = 361;

/// A validated frame received from the amplifier
///
/// Messages carry raw payloads; interpretation into snapshots is a separate
/// step so that decoding never touches published state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Command acknowledgment carrying the echoed command byte
    Ack(u8),
    /// Status record
    Status([u8; STATUS_PAYLOAD_LEN]),
    /// Screen image
    Screen(Box<[u8; SCREEN_PAYLOAD_LEN]>),
}

impl Message {
    /// Short name of the frame kind, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Ack(_) => "ack",
            Message::Status(_) => "status",
            Message::Screen(_) => "screen",
        }
    }

    /// Interpret the ACK value as a known command, if it is one
    pub fn acked_command(&self) -> Option<CommandCode> {
        match self {
            Message::Ack(code) => CommandCode::try_from(*code).ok(),
            _ => None,
        }
    }
}
