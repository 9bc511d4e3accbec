use clickpath_common::protocol::InteractionRecord;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Destination for interaction records. Delivery is fire-and-forget.
pub trait MessageSink: Send + Sync {
    fn send(&self, record: InteractionRecord);
}

/// Writes `SCANNER_INTERACTION{json}` lines to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl MessageSink for ConsoleSink {
    fn send(&self, record: InteractionRecord) {
        match record.to_console_line() {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to encode interaction record: {}", e),
        }
    }
}

/// Forwards records to an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<InteractionRecord>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<InteractionRecord>) -> Self {
        Self { tx }
    }

    /// A sink together with the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<InteractionRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl MessageSink for ChannelSink {
    fn send(&self, record: InteractionRecord) {
        if self.tx.send(record).is_err() {
            debug!("Interaction receiver dropped; record discarded");
        }
    }
}
