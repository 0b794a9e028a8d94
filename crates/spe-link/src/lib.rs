//! SPE Expert Link Engine
//!
//! This crate drives a conversation with an SPE Expert amplifier over any
//! ordered byte stream (TCP, a serial bridge, or an in-process pipe).
//!
//! # Architecture
//!
//! A [`Session`] runs as one task and owns all protocol state:
//!
//! - Incoming bytes go through a [`spe_protocol::FrameDecoder`] in order
//! - Validated frames are applied to an [`AmpMonitor`], which publishes the
//!   latest status and screen through watch channels
//! - A poll timer sends one poll per tick chosen by the [`PollPolicy`] and
//!   advances the [`Watchdog`]; when it runs out the screen is replaced by a
//!   placeholder until frames resume
//! - Commands queued on the [`SessionHandle`] are written between polls
//!
//! Transport close or failure ends the session; reconnecting means starting
//! a new one.
//!
//! # Example
//!
//! ```rust,no_run
//! use spe_link::{spawn_session, LinkConfig};
//! use spe_protocol::CommandCode;
//!
//! # async fn demo() -> Result<(), spe_link::LinkError> {
//! let stream = tokio::net::TcpStream::connect("usb.local:50000").await?;
//! let (task, handle) = spawn_session(stream, LinkConfig::default())?;
//!
//! handle.send(CommandCode::Operate).await?;
//! println!("{}", handle.status());
//!
//! drop(handle);
//! let _ = task.await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod monitor;
pub mod session;
pub mod watchdog;

pub use config::{LinkConfig, PollPolicy, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WATCHDOG_TICKS};
pub use error::LinkError;
pub use events::LinkEvent;
pub use monitor::AmpMonitor;
pub use session::{spawn_session, CommandSender, Session, SessionEnd, SessionHandle};
pub use watchdog::{Watchdog, WatchdogTick};
