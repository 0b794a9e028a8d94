//! Virtual amplifier actor task
//!
//! Owns a [`VirtualAmplifier`] and serves it over an async byte stream. The
//! task uses a select! loop to:
//! - Read command frames from the stream and write back the replies
//! - Handle control commands (keying, alarms, shutdown) from a channel
//! - Emit state change events via a broadcast channel

use std::io;

use spe_protocol::{CommandDecoder, StatusSnapshot};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::VirtualAmplifier;

/// Commands that can be sent to a virtual amplifier actor
#[derive(Debug, Clone)]
pub enum VirtualAmpCommand {
    /// Key or unkey the simulated exciter
    SetTransmit(bool),
    /// Raise an alarm code (`b'N'` clears)
    SetAlarm(u8),
    /// Set the warning code (`b'N'` clears)
    SetWarning(u8),
    /// Shutdown the virtual amplifier actor
    Shutdown,
}

/// State event emitted when virtual amplifier state changes
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualAmpStateEvent {
    /// Current status record contents
    pub status: StatusSnapshot,
    /// Whether the amplifier is switched on
    pub powered: bool,
    /// Whether the display backlight is on
    pub backlight: bool,
}

impl VirtualAmpStateEvent {
    fn capture(amp: &VirtualAmplifier) -> Self {
        Self {
            status: amp.status().clone(),
            powered: amp.is_powered(),
            backlight: amp.backlight(),
        }
    }
}

/// Run the virtual amplifier actor task
///
/// This task owns the VirtualAmplifier and processes:
/// 1. Command frames read from the stream, answering each one
/// 2. Control commands from the command channel
///
/// Returns when the stream closes, a shutdown command arrives or the command
/// channel is dropped. State changes are emitted via the broadcast channel.
pub async fn run_virtual_amp_task<S>(
    mut stream: S,
    mut amp: VirtualAmplifier,
    mut cmd_rx: mpsc::Receiver<VirtualAmpCommand>,
    state_tx: broadcast::Sender<VirtualAmpStateEvent>,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut decoder = CommandDecoder::new();
    let mut buf = [0u8; 256];
    let mut last = VirtualAmpStateEvent::capture(&amp);

    info!("Starting virtual amplifier task for {}", amp.id());
    let _ = state_tx.send(last.clone());

    loop {
        tokio::select! {
            result = stream.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("Virtual amplifier stream closed for {}", amp.id());
                        break;
                    }
                    Ok(n) => {
                        decoder.push_bytes(&buf[..n]);
                        while let Some(cmd) = decoder.next_command() {
                            let code = match cmd {
                                Ok(code) => code,
                                Err(e) => {
                                    debug!("Virtual amplifier {} ignoring frame: {}", amp.id(), e);
                                    continue;
                                }
                            };
                            debug!("Virtual amplifier {} processing {}", amp.id(), code);

                            if let Some(reply) = amp.process_command(code) {
                                stream.write_all(&reply).await?;
                                stream.flush().await?;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Virtual amplifier {} stream error: {}", amp.id(), e);
                        return Err(e);
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(VirtualAmpCommand::SetTransmit(tx)) => amp.set_transmit(tx),
                    Some(VirtualAmpCommand::SetAlarm(code)) => amp.set_alarm(code),
                    Some(VirtualAmpCommand::SetWarning(code)) => amp.set_warning(code),
                    Some(VirtualAmpCommand::Shutdown) => {
                        info!("Shutdown requested for virtual amplifier {}", amp.id());
                        break;
                    }
                    None => {
                        debug!("Command channel closed for virtual amplifier {}", amp.id());
                        break;
                    }
                }
            }
        }

        let current = VirtualAmpStateEvent::capture(&amp);
        if current != last {
            debug!("Virtual amplifier {} state changed: {}", amp.id(), current.status);
            let _ = state_tx.send(current.clone());
            last = current;
        }
    }

    info!("Virtual amplifier task ended for {}", amp.id());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spe_protocol::{AmpModel, CommandCode, FrameDecoder, Message};
    use std::time::Duration;

    async fn read_messages<R: AsyncRead + Unpin>(
        stream: &mut R,
        decoder: &mut FrameDecoder,
        count: usize,
    ) -> Vec<Message> {
        let mut messages = Vec::new();
        let mut buf = [0u8; 512];
        while messages.len() < count {
            let n = tokio::time::timeout(Duration::from_millis(500), stream.read(&mut buf))
                .await
                .unwrap()
                .unwrap();
            assert!(n > 0, "stream closed early");
            messages.extend(decoder.decode(&buf[..n]));
        }
        messages
    }

    #[tokio::test]
    async fn test_virtual_amp_answers_polls() {
        let (mut host, amp_stream) = tokio::io::duplex(1024);

        let amp = VirtualAmplifier::new("Test", AmpModel::Expert1_3K);
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (state_tx, _state_rx) = broadcast::channel(32);
        let task_handle = tokio::spawn(run_virtual_amp_task(amp_stream, amp, cmd_rx, state_tx));

        host.write_all(&CommandCode::Status.frame()).await.unwrap();
        host.write_all(&CommandCode::ScreenDump.frame()).await.unwrap();
        host.write_all(&CommandCode::Tune.frame()).await.unwrap();

        let mut decoder = FrameDecoder::new();
        let messages = read_messages(&mut host, &mut decoder, 3).await;
        assert!(matches!(messages[0], Message::Status(_)));
        assert!(matches!(messages[1], Message::Screen(_)));
        assert_eq!(messages[2], Message::Ack(CommandCode::Tune.code()));

        drop(cmd_tx);
        drop(host);
        let _ = task_handle.await;
    }

    #[tokio::test]
    async fn test_virtual_amp_emits_state_changes() {
        let (mut host, amp_stream) = tokio::io::duplex(1024);

        let amp = VirtualAmplifier::new("Test", AmpModel::Expert1_3K);
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (state_tx, mut state_rx) = broadcast::channel(32);
        let task_handle = tokio::spawn(run_virtual_amp_task(amp_stream, amp, cmd_rx, state_tx));

        let initial = state_rx.recv().await.unwrap();
        assert!(!initial.status.is_operate());

        host.write_all(&CommandCode::Operate.frame()).await.unwrap();
        let event = tokio::time::timeout(Duration::from_millis(100), state_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(event.status.is_operate());

        cmd_tx.send(VirtualAmpCommand::SetTransmit(true)).await.unwrap();
        let event = tokio::time::timeout(Duration::from_millis(100), state_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(event.status.is_transmit());
        assert!(event.status.output_power > 0);

        host.write_all(&CommandCode::BacklightOff.frame()).await.unwrap();
        let event = tokio::time::timeout(Duration::from_millis(100), state_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(!event.backlight);
        assert!(event.powered);

        drop(cmd_tx);
        drop(host);
        let _ = task_handle.await;
    }

    #[tokio::test]
    async fn test_virtual_amp_silent_when_switched_off() {
        let (mut host, amp_stream) = tokio::io::duplex(1024);

        let amp = VirtualAmplifier::new("Test", AmpModel::Expert1_3K);
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (state_tx, _state_rx) = broadcast::channel(32);
        let task_handle = tokio::spawn(run_virtual_amp_task(amp_stream, amp, cmd_rx, state_tx));

        let mut decoder = FrameDecoder::new();
        host.write_all(&CommandCode::SwitchOff.frame()).await.unwrap();
        let messages = read_messages(&mut host, &mut decoder, 1).await;
        assert_eq!(messages[0], Message::Ack(CommandCode::SwitchOff.code()));

        host.write_all(&CommandCode::Status.frame()).await.unwrap();
        let mut buf = [0u8; 64];
        let silent =
            tokio::time::timeout(Duration::from_millis(50), host.read(&mut buf)).await;
        assert!(silent.is_err(), "switched-off amplifier answered");

        host.write_all(&CommandCode::SwitchOn.frame()).await.unwrap();
        host.write_all(&CommandCode::Status.frame()).await.unwrap();
        let messages = read_messages(&mut host, &mut decoder, 1).await;
        assert!(matches!(messages[0], Message::Status(_)));

        drop(cmd_tx);
        drop(host);
        let _ = task_handle.await;
    }

    #[tokio::test]
    async fn test_virtual_amp_shutdown_command() {
        let (_host, amp_stream) = tokio::io::duplex(1024);

        let amp = VirtualAmplifier::new("Test", AmpModel::Expert1_3K);
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (state_tx, _state_rx) = broadcast::channel(32);
        let task_handle = tokio::spawn(run_virtual_amp_task(amp_stream, amp, cmd_rx, state_tx));

        cmd_tx.send(VirtualAmpCommand::Shutdown).await.unwrap();

        let result = tokio::time::timeout(Duration::from_millis(100), task_handle)
            .await
            .unwrap();
        assert!(result.is_ok());
    }
}
