//! Capture sessions: pull clicks from a live page and feed them to the
//! dispatcher.

use crate::dom::{Document, locate_target};
use crate::reporter::{ClickDispatcher, ClickEvent};
use async_trait::async_trait;
use clickpath_common::error::ProtocolError;
use clickpath_common::protocol::ClickCapture;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to launch capture source: {0}")]
    Launch(String),
    #[error("Navigation failed: {0}")]
    Navigation(String),
    #[error("Failed to inject capture script: {0}")]
    Injection(String),
    #[error("Capture source is not running")]
    NotRunning,
    #[error("Failed to shut down capture source: {0}")]
    Shutdown(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Something that yields clicks captured in a page.
#[async_trait]
pub trait CaptureSource: Send {
    async fn launch(&mut self) -> Result<(), SourceError>;

    async fn navigate(&mut self, url: &str) -> Result<(), SourceError>;

    /// The next captured click, or `None` once the source has ended.
    async fn next_capture(&mut self) -> Option<ClickCapture>;

    async fn close(&mut self) -> Result<(), SourceError>;
}

/// Dispatch every capture until the source ends. Returns the number of clicks
/// delivered to the dispatcher.
pub async fn record<S>(source: &mut S, dispatcher: &ClickDispatcher) -> usize
where
    S: CaptureSource + ?Sized,
{
    let mut delivered = 0;
    while let Some(capture) = source.next_capture().await {
        let doc = Document::from_snapshot(&capture.snapshot);
        let Some(target) = locate_target(&doc, &capture) else {
            warn!(
                "Capture on {} points outside its snapshot ({:?})",
                capture.url, capture.target
            );
            continue;
        };
        debug!("Dispatching click captured on {}", capture.url);
        dispatcher.dispatch(
            &doc,
            &ClickEvent {
                target,
                button: capture.button,
            },
        );
        delivered += 1;
    }
    info!("Capture source ended after {} clicks", delivered);
    delivered
}
