use crate::cdp::{CdpClient, PageEvent};
use crate::inject::{inject_capture, install_capture};
use async_trait::async_trait;
use clickpath_engine::formatter::format_session_message;
use clickpath_engine::protocol::{ClickCapture, SessionMessage};
use clickpath_engine::session::{CaptureSource, SourceError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::info;

/// Records clicks from a Chromium page driven over CDP.
pub struct HeadlessRecorder {
    client: Option<CdpClient>,
    events: Option<UnboundedReceiver<PageEvent>>,
    session_tx: Option<UnboundedSender<SessionMessage>>,
    visible: bool,
}

impl HeadlessRecorder {
    pub fn new() -> Self {
        Self::new_with_visibility(false)
    }

    pub fn new_with_visibility(visible: bool) -> Self {
        Self {
            client: None,
            events: None,
            session_tx: None,
            visible,
        }
    }

    /// Forward session messages (URL changes, page logs) to `tx` as well as
    /// logging them.
    pub fn with_session_channel(mut self, tx: UnboundedSender<SessionMessage>) -> Self {
        self.session_tx = Some(tx);
        self
    }

    pub fn get_client(&self) -> Option<&CdpClient> {
        self.client.as_ref()
    }

    fn on_session_message(&self, msg: SessionMessage) {
        info!("{}", format_session_message(&msg));
        if let Some(tx) = &self.session_tx {
            let _ = tx.send(msg);
        }
    }
}

impl Default for HeadlessRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureSource for HeadlessRecorder {
    async fn launch(&mut self) -> Result<(), SourceError> {
        info!("Launching Headless Recorder (Chromium)...");
        let (tx, rx) = mpsc::unbounded_channel();
        let client = CdpClient::launch(self.visible, tx)
            .await
            .map_err(|e| SourceError::Launch(e.to_string()))?;
        install_capture(&client.page)
            .await
            .map_err(|e| SourceError::Injection(e.to_string()))?;
        self.client = Some(client);
        self.events = Some(rx);
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<(), SourceError> {
        let client = self.client.as_ref().ok_or(SourceError::NotRunning)?;

        info!("Navigating to: {}", url);
        client
            .page
            .goto(url)
            .await
            .map_err(|e| SourceError::Navigation(e.to_string()))?;
        inject_capture(&client.page)
            .await
            .map_err(|e| SourceError::Injection(e.to_string()))?;
        Ok(())
    }

    async fn next_capture(&mut self) -> Option<ClickCapture> {
        loop {
            let event = self.events.as_mut()?.recv().await?;
            match event {
                PageEvent::Capture(capture) => return Some(capture),
                PageEvent::Session(msg) => self.on_session_message(msg),
            }
        }
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        self.events = None;
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| SourceError::Shutdown(e.to_string()))?;
        }
        Ok(())
    }
}
