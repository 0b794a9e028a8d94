//! Event stream for session observers
//!
//! Snapshots are published through watch channels; events carry the things a
//! watch channel cannot express, such as acknowledgments and liveness edges.

use spe_protocol::CommandCode;

/// Session activity reported to the presentation side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A command frame was queued for the transport
    CommandSent {
        /// Command that was sent
        code: CommandCode,
    },

    /// The amplifier acknowledged a command
    Acknowledged {
        /// Echoed command byte
        value: u8,
        /// The echoed byte as a known command, if it is one
        command: Option<CommandCode>,
    },

    /// No valid frame for the whole watchdog countdown
    ///
    /// Emitted once per silent episode.
    DeviceSilent,

    /// Valid frames resumed after a silent episode
    DeviceResponding,
}

impl LinkEvent {
    /// Check if this event was caused by a poll rather than a user command
    pub fn is_poll(&self) -> bool {
        match self {
            LinkEvent::CommandSent { code } => code.is_poll(),
            LinkEvent::Acknowledged {
                command: Some(code),
                ..
            } => code.is_poll(),
            _ => false,
        }
    }
}
