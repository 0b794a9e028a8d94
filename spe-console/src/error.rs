//! Application errors

use std::path::PathBuf;

use spe_link::LinkError;
use thiserror::Error;

/// Errors that end the application with a failure status
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Settings file could not be read
    #[error("failed to read settings {path}: {source}")]
    SettingsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file is not valid JSON for [`crate::settings::Settings`]
    #[error("invalid settings in {path}: {source}")]
    SettingsParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// TCP connection to the bridge failed
    #[error("could not connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Power-on requested without a serial port
    #[error("no serial port given and none configured")]
    NoSerialPort,

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error(transparent)]
    Link(#[from] LinkError),

    /// The session or simulator task panicked or was cancelled
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
