//! Session controller
//!
//! A [`Session`] owns everything that advances protocol state: the frame
//! decoder, the watchdog and the transport. It runs as a single task whose
//! select! loop serializes incoming bytes, poll ticks and outbound commands,
//! so no locking is needed. The presentation side talks to it through a
//! [`SessionHandle`].
//!
//! Outbound frames go through a bounded queue to a writer future polled
//! alongside the loop. A send that cannot complete never holds up reading
//! or the poll timer.

use std::io;
use std::sync::Arc;

use spe_protocol::{
    CommandCode, DecoderStats, FrameDecoder, Leds, Message, ScreenSnapshot, StatusSnapshot,
};
use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::events::LinkEvent;
use crate::monitor::AmpMonitor;
use crate::watchdog::{Watchdog, WatchdogTick};

/// Queued commands waiting for the session task
const COMMAND_CAPACITY: usize = 32;

/// Encoded frames waiting for the transport
const FRAME_CAPACITY: usize = 8;

/// How a session ended without a transport error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The amplifier side closed the stream
    Closed,
    /// Shutdown was requested through the handle, or the handle was dropped
    Shutdown,
}

/// Cloneable sender for queueing commands to a session
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<CommandCode>,
}

impl CommandSender {
    /// Queue a command; it is written by the session task
    pub async fn send(&self, code: CommandCode) -> Result<(), LinkError> {
        self.tx.send(code).await.map_err(|_| LinkError::SessionClosed)
    }
}

/// Presentation-side handle to a running session
///
/// Dropping the handle shuts the session down.
#[derive(Debug)]
pub struct SessionHandle {
    commands: CommandSender,
    shutdown_tx: Option<oneshot::Sender<()>>,
    status_rx: watch::Receiver<Arc<StatusSnapshot>>,
    screen_rx: watch::Receiver<Arc<ScreenSnapshot>>,
    stats_rx: watch::Receiver<DecoderStats>,
    event_rx: mpsc::Receiver<LinkEvent>,
}

impl SessionHandle {
    /// Queue a command for the amplifier
    pub async fn send(&self, code: CommandCode) -> Result<(), LinkError> {
        self.commands.send(code).await
    }

    /// A sender that can be moved to another task
    pub fn commands(&self) -> CommandSender {
        self.commands.clone()
    }

    /// Latest status snapshot
    pub fn status(&self) -> Arc<StatusSnapshot> {
        self.status_rx.borrow().clone()
    }

    /// Latest screen snapshot
    pub fn screen(&self) -> Arc<ScreenSnapshot> {
        self.screen_rx.borrow().clone()
    }

    /// Front-panel LEDs from the latest screen
    pub fn leds(&self) -> Leds {
        self.screen_rx.borrow().leds()
    }

    /// Decoder counters as of the last received chunk
    pub fn stats(&self) -> DecoderStats {
        *self.stats_rx.borrow()
    }

    pub fn status_receiver(&self) -> watch::Receiver<Arc<StatusSnapshot>> {
        self.status_rx.clone()
    }

    pub fn screen_receiver(&self) -> watch::Receiver<Arc<ScreenSnapshot>> {
        self.screen_rx.clone()
    }

    /// Wait for the next session event
    ///
    /// Returns `None` once the session has ended.
    pub async fn next_event(&mut self) -> Option<LinkEvent> {
        self.event_rx.recv().await
    }

    /// Take an already-queued event without waiting
    pub fn try_next_event(&mut self) -> Option<LinkEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Ask the session to stop
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// One conversation with an amplifier over a byte stream
///
/// Generic over the transport so TCP streams, serial bridges and in-process
/// duplex pipes are driven the same way. A new session always starts with a
/// fresh decoder.
pub struct Session<T> {
    reader: ReadHalf<T>,
    outbound: Option<Outbound<T>>,
    frame_tx: mpsc::Sender<[u8; 6]>,
    config: LinkConfig,
    decoder: FrameDecoder,
    watchdog: Watchdog,
    monitor: AmpMonitor,
    cmd_rx: mpsc::Receiver<CommandCode>,
    shutdown_rx: oneshot::Receiver<()>,
    event_tx: mpsc::Sender<LinkEvent>,
    polls_sent: u64,
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a session and its handle
    pub fn new(io: T, config: LinkConfig) -> Result<(Self, SessionHandle), LinkError> {
        config.validate()?;

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity);
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CAPACITY);
        let monitor = AmpMonitor::new();
        let (reader, writer) = split(io);

        let handle = SessionHandle {
            commands: CommandSender { tx: cmd_tx },
            shutdown_tx: Some(shutdown_tx),
            status_rx: monitor.subscribe_status(),
            screen_rx: monitor.subscribe_screen(),
            stats_rx: monitor.subscribe_stats(),
            event_rx,
        };

        let session = Self {
            reader,
            outbound: Some(Outbound {
                writer,
                frames: frame_rx,
            }),
            frame_tx,
            watchdog: Watchdog::new(config.watchdog_ticks),
            config,
            decoder: FrameDecoder::new(),
            monitor,
            cmd_rx,
            shutdown_rx,
            event_tx,
            polls_sent: 0,
        };

        Ok((session, handle))
    }

    /// Run the session until the stream ends or shutdown is requested
    ///
    /// A clean close of the stream returns [`SessionEnd::Closed`]; read and
    /// write failures return [`LinkError::Io`]. Neither is retried.
    pub async fn run(mut self) -> Result<SessionEnd, LinkError> {
        let Some(outbound) = self.outbound.take() else {
            return Err(LinkError::SessionClosed);
        };
        let writer = outbound.run();
        tokio::pin!(writer);

        info!(
            "Session starting (poll every {} ms, {:?}, watchdog {} ticks)",
            self.config.poll_interval_ms, self.config.poll_policy, self.config.watchdog_ticks
        );

        let mut poll_timer = interval(self.config.poll_interval());
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut buffer = [0u8; 1024];

        let end = loop {
            tokio::select! {
                _ = &mut self.shutdown_rx => {
                    break SessionEnd::Shutdown;
                }

                _ = poll_timer.tick() => self.on_tick(),

                Some(code) = self.cmd_rx.recv() => self.queue_command(code),

                // Only returns on a write error; the session holds the frame sender
                result = &mut writer => {
                    result?;
                    break SessionEnd::Closed;
                }

                result = self.reader.read(&mut buffer) => {
                    match result {
                        Ok(0) => break SessionEnd::Closed,
                        Ok(n) => self.on_bytes(&buffer[..n]),
                        Err(e) => {
                            warn!("Read error: {}", e);
                            return Err(e.into());
                        }
                    }
                }
            }
        };

        info!("Session ended: {:?} ({:?})", end, self.decoder.stats());
        Ok(end)
    }

    fn on_tick(&mut self) {
        match self.watchdog.tick() {
            WatchdogTick::Counting(remaining) => {
                trace!("watchdog: {} ticks left", remaining);
            }
            WatchdogTick::Expired { first } => {
                self.monitor.show_placeholder();
                if first {
                    warn!(
                        "No valid frame for {} polls, amplifier not responding",
                        self.watchdog.max()
                    );
                    self.emit(LinkEvent::DeviceSilent);
                }
            }
        }

        let poll = self.config.poll_policy.poll_for(self.polls_sent);
        self.polls_sent = self.polls_sent.wrapping_add(1);
        self.queue_command(poll);
    }

    fn on_bytes(&mut self, data: &[u8]) {
        trace!("received {} bytes", data.len());
        self.decoder.push_bytes(data);

        while let Some(message) = self.decoder.next_message() {
            if self.watchdog.feed() {
                info!("Amplifier responding again");
                self.emit(LinkEvent::DeviceResponding);
            }

            debug!("Received {} frame", message.kind());
            if let Message::Ack(value) = message {
                self.emit(LinkEvent::Acknowledged {
                    value,
                    command: message.acked_command(),
                });
            }
            self.monitor.apply(&message);
        }

        self.monitor.record_stats(self.decoder.stats());
    }

    fn queue_command(&mut self, code: CommandCode) {
        match self.frame_tx.try_send(code.frame()) {
            Ok(()) => {
                if code.is_poll() {
                    trace!("Polling with {}", code);
                } else {
                    debug!("Sending command {}", code);
                }
                self.emit(LinkEvent::CommandSent { code });
            }
            Err(_) if code.is_poll() => {
                trace!("Transport backed up, skipping {}", code);
            }
            Err(_) => {
                warn!("Transport backed up, dropping {}", code);
            }
        }
    }

    /// Events never block the session; a full channel drops them
    fn emit(&self, event: LinkEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            trace!("event dropped: {}", e);
        }
    }
}

/// Write half of the transport and the frames queued for it
struct Outbound<T> {
    writer: WriteHalf<T>,
    frames: mpsc::Receiver<[u8; 6]>,
}

impl<T: AsyncWrite> Outbound<T> {
    async fn run(mut self) -> io::Result<()> {
        while let Some(frame) = self.frames.recv().await {
            if let Err(e) = self.writer.write_all(&frame).await {
                warn!("Write error: {}", e);
                return Err(e);
            }
            self.writer.flush().await?;
        }
        Ok(())
    }
}

/// Spawn a session on the current runtime
pub fn spawn_session<T>(
    io: T,
    config: LinkConfig,
) -> Result<(JoinHandle<Result<SessionEnd, LinkError>>, SessionHandle), LinkError>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (session, handle) = Session::new(io, config)?;
    Ok((tokio::spawn(session.run()), handle))
}
