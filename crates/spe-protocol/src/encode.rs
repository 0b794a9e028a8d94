//! Encoders for amplifier → host frames
//!
//! The client never sends these; they are what a device (or the simulator)
//! puts on the wire, and they give tests a way to build well-formed input.

use crate::frame::{
    LEN_ACK, LEN_SCREEN, LEN_STATUS, PREAMBLE, SCREEN_DISCRIMINATOR, SCREEN_LENGTH_TAIL,
};
use crate::{SCREEN_PAYLOAD_LEN, STATUS_PAYLOAD_LEN};

/// 16-bit wrapping sum of `bytes`, starting from `seed`
pub fn checksum(seed: u16, bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(seed, |sum, &b| sum.wrapping_add(u16::from(b)))
}

/// Encode an ACK frame echoing `value`
pub fn ack_frame(value: u8) -> [u8; 6] {
    [PREAMBLE, PREAMBLE, PREAMBLE, LEN_ACK, value, value]
}

/// Encode a status frame around a 67-byte status record
pub fn status_frame(payload: &[u8; STATUS_PAYLOAD_LEN]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(4 + STATUS_PAYLOAD_LEN + 2);
    frame.extend_from_slice(&[PREAMBLE, PREAMBLE, PREAMBLE, LEN_STATUS]);
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&checksum(0, payload).to_le_bytes());
    frame
}

/// Encode a screen frame around a 361-byte screen image
pub fn screen_frame(payload: &[u8; SCREEN_PAYLOAD_LEN]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(8 + SCREEN_PAYLOAD_LEN + 2);
    frame.extend_from_slice(&[PREAMBLE, PREAMBLE, PREAMBLE, LEN_SCREEN]);
    frame.extend_from_slice(&SCREEN_LENGTH_TAIL);
    frame.push(SCREEN_DISCRIMINATOR);
    frame.extend_from_slice(payload);
    let sum = checksum(u16::from(SCREEN_DISCRIMINATOR), payload);
    frame.extend_from_slice(&sum.to_le_bytes());
    frame
}
