//! Published amplifier state
//!
//! Decoded messages are applied here to replace the latest status and screen
//! snapshots. Each snapshot is published as an `Arc` through a watch channel,
//! so readers always see a complete value.

use std::sync::Arc;

use spe_protocol::{DecoderStats, Message, ScreenSnapshot, StatusSnapshot};
use tokio::sync::watch;
use tracing::trace;

/// Owner of the published snapshots
#[derive(Debug)]
pub struct AmpMonitor {
    status_tx: watch::Sender<Arc<StatusSnapshot>>,
    screen_tx: watch::Sender<Arc<ScreenSnapshot>>,
    stats_tx: watch::Sender<DecoderStats>,
}

impl AmpMonitor {
    /// Start with the default status and the placeholder screen
    pub fn new() -> Self {
        let (status_tx, _) = watch::channel(Arc::new(StatusSnapshot::default()));
        let (screen_tx, _) = watch::channel(Arc::new(ScreenSnapshot::placeholder()));
        let (stats_tx, _) = watch::channel(DecoderStats::default());
        Self {
            status_tx,
            screen_tx,
            stats_tx,
        }
    }

    pub fn subscribe_status(&self) -> watch::Receiver<Arc<StatusSnapshot>> {
        self.status_tx.subscribe()
    }

    pub fn subscribe_screen(&self) -> watch::Receiver<Arc<ScreenSnapshot>> {
        self.screen_tx.subscribe()
    }

    pub fn subscribe_stats(&self) -> watch::Receiver<DecoderStats> {
        self.stats_tx.subscribe()
    }

    /// Latest status snapshot
    pub fn status(&self) -> Arc<StatusSnapshot> {
        self.status_tx.borrow().clone()
    }

    /// Latest screen snapshot
    pub fn screen(&self) -> Arc<ScreenSnapshot> {
        self.screen_tx.borrow().clone()
    }

    /// Publish the snapshot carried by a validated message
    ///
    /// ACKs carry no state and leave both snapshots untouched.
    pub fn apply(&self, message: &Message) {
        match message {
            Message::Ack(_) => {}
            Message::Status(record) => {
                let status = StatusSnapshot::from_payload(record);
                trace!("publishing status: {}", status);
                self.status_tx.send_replace(Arc::new(status));
            }
            Message::Screen(image) => {
                let screen = ScreenSnapshot::from_payload(image);
                self.screen_tx.send_replace(Arc::new(screen));
            }
        }
    }

    /// Replace the screen with the disconnected placeholder
    ///
    /// Subscribers are only notified when the screen was showing something
    /// else. Returns true if the screen changed.
    pub fn show_placeholder(&self) -> bool {
        self.screen_tx.send_if_modified(|screen| {
            if screen.is_placeholder() {
                false
            } else {
                *screen = Arc::new(ScreenSnapshot::placeholder());
                true
            }
        })
    }

    pub fn record_stats(&self, stats: DecoderStats) {
        self.stats_tx.send_if_modified(|current| {
            let changed = *current != stats;
            *current = stats;
            changed
        });
    }
}

impl Default for AmpMonitor {
    fn default() -> Self {
        Self::new()
    }
}
