//! SPE Expert Amplifier Simulation Library
//!
//! This crate provides a simulated amplifier for exercising the remote
//! protocol without hardware. It includes:
//!
//! - **VirtualAmplifier**: Answers status and screen polls with well-formed
//!   frames and acknowledges front-panel commands
//! - **run_virtual_amp_task**: Serves a virtual amplifier over any async
//!   byte stream
//!
//! # Example
//!
//! ```rust
//! use spe_protocol::{AmpModel, CommandCode, FrameDecoder, Message};
//! use spe_sim::VirtualAmplifier;
//!
//! let mut amp = VirtualAmplifier::new("Bench", AmpModel::Expert1_5K);
//!
//! // Keys are acknowledged by echoing the command code
//! let reply = amp.process_command(CommandCode::Operate).unwrap();
//! let messages = FrameDecoder::new().decode(&reply);
//! assert_eq!(messages, vec![Message::Ack(0x0D)]);
//! assert!(amp.status().is_operate());
//! ```

pub mod amplifier;
pub mod amplifier_task;
pub mod panel;

pub use amplifier::{VirtualAmplifier, VirtualAmplifierConfig};
pub use amplifier_task::{run_virtual_amp_task, VirtualAmpCommand, VirtualAmpStateEvent};
pub use panel::render_panel;
