use chromiumoxide::cdp::browser_protocol::page::{
    EventFrameNavigated, EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{EventConsoleApiCalled, RemoteObject};
use chromiumoxide::{Browser, BrowserConfig, Page};
use clickpath_engine::protocol::{ClickCapture, SessionMessage};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

type CdpResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// What the page reports back while recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Capture(ClickCapture),
    Session(SessionMessage),
}

pub struct CdpClient {
    pub browser: Browser,
    pub handler_task: JoinHandle<()>,
    pub page: Page,
    user_data_dir: Option<PathBuf>,
    cleanup_user_data_dir: bool,
}

impl CdpClient {
    pub async fn launch(visible: bool, events: UnboundedSender<PageEvent>) -> CdpResult<Self> {
        let mut config_builder = BrowserConfig::builder();
        config_builder = config_builder.no_sandbox();
        let (user_data_dir, cleanup_user_data_dir) = resolve_user_data_dir()?;
        config_builder = config_builder.user_data_dir(&user_data_dir);

        if visible {
            tracing::info!("Launching browser in visible mode");
            config_builder = config_builder.with_head();
        } else {
            tracing::info!("Launching browser in headless mode");
        }

        if let Ok(chrome_bin) = std::env::var("CHROME_BIN") {
            tracing::info!("Using custom Chrome binary: {}", chrome_bin);
            config_builder = config_builder.chrome_executable(chrome_bin);
        }

        let (browser, mut handler) = Browser::launch(
            config_builder
                .build()
                .map_err(|e| format!("Failed to build browser config: {}", e))?,
        )
        .await
        .map_err(|e| format!("Failed to launch browser: {}", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(e) = h {
                    tracing::error!("Browser handler error (ignoring): {}", e);
                    continue;
                }
            }
            tracing::info!("Browser handler task ended");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| format!("Failed to create page: {}", e))?;

        let mut console_events = page
            .event_listener::<EventConsoleApiCalled>()
            .await
            .map_err(|e| format!("Failed to subscribe to console events: {}", e))?;

        let console_tx = events.clone();
        tokio::spawn(async move {
            while let Some(event) = console_events.next().await {
                let text = console_text(&event.args);
                match classify_console_text(&text) {
                    Some(page_event) => {
                        if console_tx.send(page_event).is_err() {
                            break;
                        }
                    }
                    None => tracing::debug!("Browser Console [{:?}]: {}", event.r#type, text),
                }
            }
        });

        let mut navigations = page
            .event_listener::<EventFrameNavigated>()
            .await
            .map_err(|e| format!("Failed to subscribe to navigation events: {}", e))?;

        tokio::spawn(async move {
            while let Some(event) = navigations.next().await {
                // Only the main frame changes the page URL.
                if event.frame.parent_id.is_some() {
                    continue;
                }
                let msg = SessionMessage::UrlChanged(event.frame.url.clone());
                if events.send(PageEvent::Session(msg)).is_err() {
                    break;
                }
            }
        });

        // A pending alert/confirm blocks the page's event loop and with it
        // every later click.
        let mut dialog_events = page
            .event_listener::<EventJavascriptDialogOpening>()
            .await
            .map_err(|e| format!("Failed to subscribe to dialog events: {}", e))?;

        let page_clone = page.clone();
        tokio::spawn(async move {
            while let Some(event) = dialog_events.next().await {
                tracing::info!(
                    "Handling JavaScript Dialog: {} ({:?})",
                    event.message,
                    event.r#type
                );
                let cmd = HandleJavaScriptDialogParams::new(true);
                if let Err(e) = page_clone.execute(cmd).await {
                    tracing::error!("Failed to handle/accept dialog: {}", e);
                }
            }
        });

        Ok(Self {
            browser,
            handler_task,
            page,
            user_data_dir: Some(user_data_dir),
            cleanup_user_data_dir,
        })
    }

    pub async fn close(mut self) -> CdpResult<()> {
        self.browser
            .close()
            .await
            .map_err(|e| format!("Error closing browser: {}", e))?;
        self.handler_task
            .await
            .map_err(|e| format!("Error awaiting handler: {}", e))?;

        if self.cleanup_user_data_dir
            && let Some(dir) = &self.user_data_dir
            && let Err(e) = std::fs::remove_dir_all(dir)
        {
            tracing::debug!("Failed to clean up user-data-dir {}: {}", dir.display(), e);
        }

        Ok(())
    }
}

/// Join console arguments the way the browser prints them: string values
/// verbatim, everything else by description.
fn console_text(args: &[RemoteObject]) -> String {
    args.iter()
        .map(|arg| match arg.value.as_ref().and_then(|v| v.as_str()) {
            Some(s) => s.to_string(),
            None => arg
                .description
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Recognise capture payloads in console output. Anything else is not ours.
pub fn classify_console_text(text: &str) -> Option<PageEvent> {
    match ClickCapture::from_console_text(text) {
        Ok(Some(capture)) => Some(PageEvent::Capture(capture)),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("Malformed capture payload: {}", e);
            Some(PageEvent::Session(SessionMessage::Log(format!(
                "malformed capture payload: {}",
                e
            ))))
        }
    }
}

fn resolve_user_data_dir() -> CdpResult<(PathBuf, bool)> {
    if let Ok(dir) = std::env::var("CLICKPATH_USER_DATA_DIR") {
        let path = PathBuf::from(dir);
        std::fs::create_dir_all(&path)?;
        tracing::info!(
            "Using user data dir from CLICKPATH_USER_DATA_DIR: {}",
            path.display()
        );
        return Ok((path, false));
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("System clock error: {}", e))?
        .as_nanos();
    let unique = format!("clickpath-chromium-profile-{}-{}", std::process::id(), nanos);
    let path = std::env::temp_dir().join(unique);
    std::fs::create_dir_all(&path)?;
    tracing::info!("Using isolated user data dir: {}", path.display());
    Ok((path, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_are_recognised() {
        let text = r#"CLICKPATH_CAPTURE{"url":"about:blank","button":0,"target":[0],"snapshot":{"tag":"HTML","children":[{"tag":"BODY"}]}}"#;
        match classify_console_text(text) {
            Some(PageEvent::Capture(capture)) => {
                assert_eq!(capture.target, vec![0]);
                assert_eq!(capture.snapshot.children[0].tag, "BODY");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn other_console_output_is_ignored() {
        assert_eq!(classify_console_text("hello from the page"), None);
        assert_eq!(
            classify_console_text(r##"SCANNER_INTERACTION{"event":"click","selector":"#a"}"##),
            None
        );
    }

    #[test]
    fn malformed_payload_becomes_log_message() {
        assert!(matches!(
            classify_console_text("CLICKPATH_CAPTURE{not json"),
            Some(PageEvent::Session(SessionMessage::Log(_)))
        ));
    }

    #[test]
    fn console_args_prefer_string_values() {
        let arg: RemoteObject = serde_json::from_value(serde_json::json!({
            "type": "string",
            "value": "CLICKPATH_CAPTURE{}"
        }))
        .unwrap();
        assert_eq!(console_text(&[arg]), "CLICKPATH_CAPTURE{}");
    }
}
