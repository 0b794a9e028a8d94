//! Streaming frame decoder for amplifier → host traffic
//!
//! # Frame Formats
//! ```text
//! ACK:    AA AA AA 01 <ack> <ack>
//! Status: AA AA AA 43 <67 bytes> <cs_lo> <cs_hi>
//! Screen: AA AA AA 6A 01 95 FE 01 <361 bytes> <cs_lo> <cs_hi>
//! ```
//!
//! - `AA AA AA`: Preamble
//! - `01` / `43` / `6A`: Length byte, which also selects the frame kind
//! - `01 95 FE`: Remainder of the screen frame's length prefix
//!   (length 0x16A followed by its negation 0xFE95)
//! - `01`: Screen discriminator, included in the screen checksum
//! - `cs_lo cs_hi`: Little-endian 16-bit sum of the payload bytes
//!
//! The decoder consumes one byte at a time, so frames may be split across
//! reads at any position and several frames may arrive in a single read.
//! A byte that does not fit the grammar discards the partial frame and the
//! decoder waits for the next preamble. The rejecting byte itself is consumed.

use std::collections::VecDeque;

use tracing::trace;

use crate::{Message, SCREEN_PAYLOAD_LEN, STATUS_PAYLOAD_LEN};

/// Amplifier → host preamble byte
pub const PREAMBLE: u8 = 0xAA;
/// Length byte of an ACK frame
pub const LEN_ACK: u8 = 0x01;
/// Length byte of a status frame
pub const LEN_STATUS: u8 = 0x43;
/// First length byte of a screen frame
pub const LEN_SCREEN: u8 = 0x6A;
/// Remaining screen length-prefix bytes, in wire order
pub const SCREEN_LENGTH_TAIL: [u8; 3] = [0x01, 0x95, 0xFE];
/// Screen frame discriminator byte
pub const SCREEN_DISCRIMINATOR: u8 = 0x01;

/// Position within the frame grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProtocolState {
    /// Waiting for the first preamble byte
    #[default]
    Preamble1,
    /// Waiting for the second preamble byte
    Preamble2,
    /// Waiting for the third preamble byte
    Preamble3,
    /// Waiting for the length byte
    Length,
    /// Waiting for the ACK value
    AckByte,
    /// Waiting for the repeated ACK value
    AckCheck,
    /// Accumulating the status payload, then the low checksum byte
    StatusPayload,
    /// Waiting for the high status checksum byte
    StatusCheck2,
    /// Waiting for screen length byte 2 (0x01)
    ScreenLength2,
    /// Waiting for screen length byte 3 (0x95)
    ScreenLength3,
    /// Waiting for screen length byte 4 (0xFE)
    ScreenLength4,
    /// Waiting for the screen discriminator
    Discriminator,
    /// Accumulating the screen payload, then the low checksum byte
    ScreenPayload,
    /// Waiting for the high screen checksum byte
    ScreenCheck2,
}

/// Side effect attached to a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Grammar byte, nothing to record
    None,
    /// Reset checksum and buffer cursor for a status payload
    BeginStatus,
    /// Seed checksum with the discriminator and reset the buffer cursor
    BeginScreen,
    /// Remember the ACK value
    StoreAck,
    /// Append to the payload buffer and add to the checksum
    Accumulate,
    /// Remember the low checksum byte
    StoreChecksumLow,
    /// Compare the repeated ACK value and emit on match
    FinishAck,
    /// Verify the status checksum and emit on match
    FinishStatus,
    /// Verify the screen checksum and emit on match
    FinishScreen,
}

/// Result of feeding one byte to a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move to the given state, performing the action
    Next(ProtocolState, Action),
    /// Byte does not fit the grammar; discard the partial frame
    Restart,
}

impl ProtocolState {
    /// Transition table of the frame grammar
    ///
    /// `payload_full` reports whether the payload buffer already holds the
    /// full payload for the current frame kind; it is only consulted in the
    /// payload states.
    pub fn on_byte(self, byte: u8, payload_full: bool) -> Transition {
        use Action as A;
        use ProtocolState as S;
        use Transition::{Next, Restart};

        match (self, byte) {
            (S::Preamble1, PREAMBLE) => Next(S::Preamble2, A::None),
            (S::Preamble2, PREAMBLE) => Next(S::Preamble3, A::None),
            (S::Preamble3, PREAMBLE) => Next(S::Length, A::None),

            (S::Length, LEN_ACK) => Next(S::AckByte, A::None),
            (S::Length, LEN_STATUS) => Next(S::StatusPayload, A::BeginStatus),
            (S::Length, LEN_SCREEN) => Next(S::ScreenLength2, A::None),

            (S::AckByte, _) => Next(S::AckCheck, A::StoreAck),
            (S::AckCheck, _) => Next(S::Preamble1, A::FinishAck),

            (S::StatusPayload, _) if !payload_full => Next(S::StatusPayload, A::Accumulate),
            (S::StatusPayload, _) => Next(S::StatusCheck2, A::StoreChecksumLow),
            (S::StatusCheck2, _) => Next(S::Preamble1, A::FinishStatus),

            (S::ScreenLength2, b) if b == SCREEN_LENGTH_TAIL[0] => {
                Next(S::ScreenLength3, A::None)
            }
            (S::ScreenLength3, b) if b == SCREEN_LENGTH_TAIL[1] => {
                Next(S::ScreenLength4, A::None)
            }
            (S::ScreenLength4, b) if b == SCREEN_LENGTH_TAIL[2] => {
                Next(S::Discriminator, A::None)
            }
            (S::Discriminator, SCREEN_DISCRIMINATOR) => Next(S::ScreenPayload, A::BeginScreen),

            (S::ScreenPayload, _) if !payload_full => Next(S::ScreenPayload, A::Accumulate),
            (S::ScreenPayload, _) => Next(S::ScreenCheck2, A::StoreChecksumLow),
            (S::ScreenCheck2, _) => Next(S::Preamble1, A::FinishScreen),

            _ => Restart,
        }
    }

    /// Payload length accumulated in this state, if it is a payload state
    pub fn payload_len(self) -> Option<usize> {
        match self {
            ProtocolState::StatusPayload => Some(STATUS_PAYLOAD_LEN),
            ProtocolState::ScreenPayload => Some(SCREEN_PAYLOAD_LEN),
            _ => None,
        }
    }
}

/// Counters kept by the decoder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecoderStats {
    /// Valid ACK frames
    pub acks: u64,
    /// Valid status frames
    pub status_frames: u64,
    /// Valid screen frames
    pub screen_frames: u64,
    /// Partial frames discarded on a grammar mismatch
    pub restarts: u64,
    /// Complete frames discarded on a checksum or ACK echo mismatch
    pub checksum_failures: u64,
    /// Bytes dropped while hunting for a preamble
    pub skipped_bytes: u64,
}

/// Streaming decoder for amplifier frames
pub struct FrameDecoder {
    state: ProtocolState,
    buffer: [u8; SCREEN_PAYLOAD_LEN],
    cursor: usize,
    checksum: u16,
    checksum_low: u8,
    pending_ack: u8,
    ready: VecDeque<Message>,
    stats: DecoderStats,
}

impl FrameDecoder {
    /// Create a decoder waiting for a preamble
    pub fn new() -> Self {
        Self {
            state: ProtocolState::Preamble1,
            buffer: [0u8; SCREEN_PAYLOAD_LEN],
            cursor: 0,
            checksum: 0,
            checksum_low: 0,
            pending_ack: 0,
            ready: VecDeque::new(),
            stats: DecoderStats::default(),
        }
    }

    /// Current grammar position
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// Frame and error counters since creation
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Feed one byte, returning a message if it completed a valid frame
    pub fn push(&mut self, byte: u8) -> Option<Message> {
        let payload_full = self
            .state
            .payload_len()
            .is_some_and(|len| self.cursor >= len);

        match self.state.on_byte(byte, payload_full) {
            Transition::Restart => {
                self.restart(byte);
                None
            }
            Transition::Next(next, action) => {
                let msg = self.apply(action, byte);
                self.state = next;
                msg
            }
        }
    }

    /// Feed a chunk of bytes, queueing any completed messages
    pub fn push_bytes(&mut self, data: &[u8]) {
        for &byte in data {
            if let Some(msg) = self.push(byte) {
                self.ready.push_back(msg);
            }
        }
    }

    /// Take the next queued message
    pub fn next_message(&mut self) -> Option<Message> {
        self.ready.pop_front()
    }

    /// Feed a chunk of bytes and return every message it completed
    pub fn decode(&mut self, data: &[u8]) -> Vec<Message> {
        self.push_bytes(data);
        self.ready.drain(..).collect()
    }

    /// Drop any partial frame and queued messages
    pub fn clear(&mut self) {
        self.state = ProtocolState::Preamble1;
        self.cursor = 0;
        self.checksum = 0;
        self.ready.clear();
    }

    fn apply(&mut self, action: Action, byte: u8) -> Option<Message> {
        match action {
            Action::None => None,
            Action::BeginStatus => {
                self.checksum = 0;
                self.cursor = 0;
                None
            }
            Action::BeginScreen => {
                self.checksum = u16::from(byte);
                self.cursor = 0;
                None
            }
            Action::StoreAck => {
                self.pending_ack = byte;
                None
            }
            Action::Accumulate => {
                self.buffer[self.cursor] = byte;
                self.cursor += 1;
                self.checksum = self.checksum.wrapping_add(u16::from(byte));
                None
            }
            Action::StoreChecksumLow => {
                self.checksum_low = byte;
                None
            }
            Action::FinishAck => {
                if byte == self.pending_ack {
                    self.stats.acks += 1;
                    Some(Message::Ack(byte))
                } else {
                    self.reject("ack echo mismatch");
                    None
                }
            }
            Action::FinishStatus => {
                if self.checksum_matches(byte) {
                    let mut payload = [0u8; STATUS_PAYLOAD_LEN];
                    payload.copy_from_slice(&self.buffer[..STATUS_PAYLOAD_LEN]);
                    self.stats.status_frames += 1;
                    Some(Message::Status(payload))
                } else {
                    self.reject("status checksum mismatch");
                    None
                }
            }
            Action::FinishScreen => {
                if self.checksum_matches(byte) {
                    self.stats.screen_frames += 1;
                    Some(Message::Screen(Box::new(self.buffer)))
                } else {
                    self.reject("screen checksum mismatch");
                    None
                }
            }
        }
    }

    /// Compare the transmitted checksum with the running 16-bit sum
    fn checksum_matches(&self, high: u8) -> bool {
        let received = u16::from(self.checksum_low) | (u16::from(high) << 8);
        received == self.checksum
    }

    fn reject(&mut self, reason: &'static str) {
        self.stats.checksum_failures += 1;
        trace!(reason, computed = self.checksum, "Discarding frame");
    }

    fn restart(&mut self, byte: u8) {
        if self.state == ProtocolState::Preamble1 {
            self.stats.skipped_bytes += 1;
        } else {
            self.stats.restarts += 1;
            trace!(state = ?self.state, byte, "Frame grammar mismatch, resynchronizing");
        }
        self.state = ProtocolState::Preamble1;
        self.cursor = 0;
        self.checksum = 0;
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDecoder")
            .field("state", &self.state)
            .field("cursor", &self.cursor)
            .field("queued", &self.ready.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{ack_frame, screen_frame, status_frame};
    use crate::CommandCode;
    use proptest::prelude::*;

    fn zero_status() -> [u8; STATUS_PAYLOAD_LEN] {
        [b'0'; STATUS_PAYLOAD_LEN]
    }

    fn sample_screen() -> [u8; SCREEN_PAYLOAD_LEN] {
        let mut payload = [0u8; SCREEN_PAYLOAD_LEN];
        for (i, b) in payload.iter_mut().enumerate() {
            *b = (i % 0x5E) as u8 + 1;
        }
        payload
    }

    #[test]
    fn test_ack_frame() {
        let mut decoder = FrameDecoder::new();
        let msgs = decoder.decode(&[0xAA, 0xAA, 0xAA, 0x01, 0x05, 0x05]);
        assert_eq!(msgs, vec![Message::Ack(0x05)]);
        assert_eq!(decoder.state(), ProtocolState::Preamble1);
        assert_eq!(decoder.stats().acks, 1);
    }

    #[test]
    fn test_ack_mismatch_discarded() {
        let mut decoder = FrameDecoder::new();
        let msgs = decoder.decode(&[0xAA, 0xAA, 0xAA, 0x01, 0x05, 0x06]);
        assert!(msgs.is_empty());
        assert_eq!(decoder.state(), ProtocolState::Preamble1);
        assert_eq!(decoder.stats().checksum_failures, 1);
    }

    #[test]
    fn test_status_frame() {
        let payload = zero_status();
        let mut decoder = FrameDecoder::new();
        let msgs = decoder.decode(&status_frame(&payload));
        assert_eq!(msgs, vec![Message::Status(payload)]);
    }

    #[test]
    fn test_screen_frame() {
        let payload = sample_screen();
        let mut decoder = FrameDecoder::new();
        let msgs = decoder.decode(&screen_frame(&payload));
        assert_eq!(msgs, vec![Message::Screen(Box::new(payload))]);
        assert_eq!(decoder.stats().screen_frames, 1);
    }

    #[test]
    fn test_screen_checksum_includes_discriminator() {
        let payload = [0u8; SCREEN_PAYLOAD_LEN];
        let mut wire = vec![0xAA, 0xAA, 0xAA, 0x6A, 0x01, 0x95, 0xFE, 0x01];
        wire.extend_from_slice(&payload);
        // Sum of the payload alone (0) must be rejected
        wire.extend_from_slice(&[0x00, 0x00]);

        let mut decoder = FrameDecoder::new();
        assert!(decoder.decode(&wire).is_empty());

        let len = wire.len();
        wire[len - 2] = 0x01;
        assert_eq!(decoder.decode(&wire).len(), 1);
    }

    #[test]
    fn test_status_checksum_split_bytes() {
        // All 0xFF: sum = 67 * 255 = 17085 = 0x42BD
        let payload = [0xFFu8; STATUS_PAYLOAD_LEN];
        let wire = status_frame(&payload);
        assert_eq!(&wire[wire.len() - 2..], &[0xBD, 0x42]);
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.decode(&wire).len(), 1);
    }

    #[test]
    fn test_screen_checksum_wraps() {
        // 1 + 361 * 255 = 92056, which wraps to 0x6798
        let payload = [0xFFu8; SCREEN_PAYLOAD_LEN];
        let wire = screen_frame(&payload);
        assert_eq!(&wire[wire.len() - 2..], &[0x98, 0x67]);
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.decode(&wire).len(), 1);
    }

    #[test]
    fn test_multiple_frames_in_one_chunk() {
        let mut wire = ack_frame(0x0D).to_vec();
        wire.extend(status_frame(&zero_status()));
        wire.extend(ack_frame(0x09));

        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(&wire);
        assert_eq!(decoder.next_message(), Some(Message::Ack(0x0D)));
        assert!(matches!(decoder.next_message(), Some(Message::Status(_))));
        assert_eq!(decoder.next_message(), Some(Message::Ack(0x09)));
        assert_eq!(decoder.next_message(), None);
    }

    #[test]
    fn test_restart_consumes_rejecting_byte() {
        // Fourth 0xAA is not a valid length: it restarts and is dropped,
        // so the rest of the would-be frame does not decode
        let mut decoder = FrameDecoder::new();
        let msgs = decoder.decode(&[0xAA, 0xAA, 0xAA, 0xAA, 0x01, 0x05, 0x05]);
        assert!(msgs.is_empty());
        assert_eq!(decoder.stats().restarts, 1);
    }

    #[test]
    fn test_bad_screen_length_prefix() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(&[0xAA, 0xAA, 0xAA, 0x6A, 0x01, 0x96]);
        assert_eq!(decoder.state(), ProtocolState::Preamble1);
        decoder.push_bytes(&ack_frame(0x11));
        assert_eq!(decoder.next_message(), Some(Message::Ack(0x11)));
    }

    #[test]
    fn test_bad_discriminator() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(&[0xAA, 0xAA, 0xAA, 0x6A, 0x01, 0x95, 0xFE, 0x02]);
        assert_eq!(decoder.state(), ProtocolState::Preamble1);
        assert_eq!(decoder.stats().restarts, 1);
    }

    #[test]
    fn test_partial_frame_state() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(&[0xAA, 0xAA, 0xAA, 0x43, b'1', b'2']);
        assert_eq!(decoder.state(), ProtocolState::StatusPayload);
        assert!(decoder.next_message().is_none());
    }

    #[test]
    fn test_clear_drops_partial_frame() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(&[0xAA, 0xAA, 0xAA, 0x43, b'1']);
        decoder.clear();
        assert_eq!(decoder.state(), ProtocolState::Preamble1);
    }

    #[test]
    fn test_transition_table_restarts_from_preamble() {
        for byte in 0u8..=255 {
            let t = ProtocolState::Preamble1.on_byte(byte, false);
            if byte == PREAMBLE {
                assert_eq!(t, Transition::Next(ProtocolState::Preamble2, Action::None));
            } else {
                assert_eq!(t, Transition::Restart);
            }
        }
    }

    #[test]
    fn test_transition_table_length_byte() {
        for byte in 0u8..=255 {
            let t = ProtocolState::Length.on_byte(byte, false);
            match byte {
                LEN_ACK | LEN_STATUS | LEN_SCREEN => assert!(matches!(t, Transition::Next(..))),
                _ => assert_eq!(t, Transition::Restart),
            }
        }
    }

    #[test]
    fn test_check_states_always_return_to_preamble() {
        for state in [
            ProtocolState::AckCheck,
            ProtocolState::StatusCheck2,
            ProtocolState::ScreenCheck2,
        ] {
            for byte in 0u8..=255 {
                assert!(matches!(
                    state.on_byte(byte, false),
                    Transition::Next(ProtocolState::Preamble1, _)
                ));
            }
        }
    }

    fn non_preamble_byte() -> impl Strategy<Value = u8> {
        any::<u8>().prop_filter("not a preamble byte", |b| *b != PREAMBLE)
    }

    proptest! {
        #[test]
        fn status_chunking_is_irrelevant(
            payload in prop::collection::vec(any::<u8>(), STATUS_PAYLOAD_LEN),
            cuts in prop::collection::vec(0usize..80, 0..12),
        ) {
            let mut record = [0u8; STATUS_PAYLOAD_LEN];
            record.copy_from_slice(&payload);
            let wire = status_frame(&record);

            let mut whole = FrameDecoder::new();
            let expected = whole.decode(&wire);
            prop_assert_eq!(expected.len(), 1);

            let mut cuts = cuts;
            cuts.push(wire.len());
            cuts.sort_unstable();
            let mut chunked = FrameDecoder::new();
            let mut got = Vec::new();
            let mut start = 0;
            for cut in cuts {
                let cut = cut.min(wire.len());
                got.extend(chunked.decode(&wire[start..cut]));
                start = cut;
            }
            prop_assert_eq!(got, expected);
        }

        #[test]
        fn byte_at_a_time_matches_whole(payload in prop::collection::vec(any::<u8>(), SCREEN_PAYLOAD_LEN)) {
            let mut image = [0u8; SCREEN_PAYLOAD_LEN];
            image.copy_from_slice(&payload);
            let wire = screen_frame(&image);

            let mut decoder = FrameDecoder::new();
            let mut got = Vec::new();
            for &b in &wire {
                got.extend(decoder.push(b));
            }
            prop_assert_eq!(got, vec![Message::Screen(Box::new(image))]);
        }

        #[test]
        fn corrupted_payload_byte_is_discarded(
            index in 0usize..STATUS_PAYLOAD_LEN,
            delta in 1u8..=255,
        ) {
            let mut record = [b'0'; STATUS_PAYLOAD_LEN];
            let mut wire = status_frame(&record);
            record[index] = record[index].wrapping_add(delta);
            wire[4 + index] = record[index];

            let mut decoder = FrameDecoder::new();
            prop_assert!(decoder.decode(&wire).is_empty());
            prop_assert_eq!(decoder.state(), ProtocolState::Preamble1);
        }

        #[test]
        fn corrupted_screen_byte_is_discarded(
            index in 0usize..SCREEN_PAYLOAD_LEN,
            delta in 1u8..=255,
        ) {
            let image = sample_screen();
            let mut wire = screen_frame(&image);
            wire[8 + index] = image[index].wrapping_add(delta);

            let mut decoder = FrameDecoder::new();
            prop_assert!(decoder.decode(&wire).is_empty());
            prop_assert_eq!(decoder.stats().checksum_failures, 1);
            prop_assert_eq!(decoder.state(), ProtocolState::Preamble1);
        }

        #[test]
        fn mismatched_ack_echo_is_discarded(value in any::<u8>(), delta in 1u8..=255) {
            let mut wire = ack_frame(value);
            wire[5] = value.wrapping_add(delta);

            let mut decoder = FrameDecoder::new();
            prop_assert!(decoder.decode(&wire).is_empty());
            prop_assert_eq!(decoder.stats().acks, 0);
        }

        #[test]
        fn stray_bytes_before_frame_are_tolerated(
            stray in prop::collection::vec(non_preamble_byte(), 0..64),
            value in any::<u8>(),
        ) {
            let mut wire = stray;
            wire.extend_from_slice(&ack_frame(value));
            wire.extend(status_frame(&[b'1'; STATUS_PAYLOAD_LEN]));

            let mut decoder = FrameDecoder::new();
            let msgs = decoder.decode(&wire);
            prop_assert_eq!(msgs.len(), 2);
            prop_assert_eq!(&msgs[0], &Message::Ack(value));
        }

        #[test]
        fn command_echo_round_trips(index in 0usize..CommandCode::ALL.len()) {
            let code = CommandCode::ALL[index];
            // The device echoes the command frame's data bytes back under its own preamble
            let mut echo = code.frame();
            echo[..3].copy_from_slice(&[PREAMBLE; 3]);

            let mut decoder = FrameDecoder::new();
            let msgs = decoder.decode(&echo);
            prop_assert_eq!(msgs.len(), 1);
            prop_assert_eq!(msgs[0].acked_command(), Some(code));
        }

        #[test]
        fn arbitrary_noise_never_panics(noise in prop::collection::vec(any::<u8>(), 0..2048)) {
            let mut decoder = FrameDecoder::new();
            let _ = decoder.decode(&noise);
            // A clean frame after noise always decodes once any partial frame is flushed
            decoder.clear();
            prop_assert_eq!(decoder.decode(&ack_frame(0x42)), vec![Message::Ack(0x42)]);
        }
    }
}
