use clickpath_engine::provider::RobustPathSlot;
use clickpath_engine::reporter::{
    ClickDispatcher, InteractionReporter, ReporterConfig, register_interaction_listener,
};
use clickpath_engine::session::{CaptureSource, record};
use clickpath_engine::sink::ChannelSink;
use clickpath_h::HeadlessRecorder;
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;

const PAGE: &str = "<html><head><title>List</title></head><body><ul id='list'><li>A</li><li id='second'>B</li></ul><button>Go</button></body></html>";

#[tokio::test]
#[serial]
async fn test_click_is_captured_and_reported() {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::INFO)
        .try_init()
        .ok();

    let mut recorder = HeadlessRecorder::new();
    match recorder.launch().await {
        Ok(_) => {}
        Err(e) => {
            eprintln!("Failed to launch browser (is Chromium installed?): {}", e);
            return;
        }
    }

    let url = format!("data:text/html,{}", PAGE);
    recorder.navigate(&url).await.expect("Navigation failed");

    let page = recorder.get_client().expect("client").page.clone();
    page.find_element("button")
        .await
        .expect("button")
        .click()
        .await
        .expect("click");

    let capture = tokio::time::timeout(Duration::from_secs(10), recorder.next_capture())
        .await
        .expect("no capture within timeout")
        .expect("capture stream ended");
    assert_eq!(capture.target, vec![1, 1]);
    assert_eq!(capture.snapshot.tag.to_lowercase(), "html");

    let (sink, mut rx) = ChannelSink::channel();
    let reporter = Arc::new(InteractionReporter::new(
        ReporterConfig::default(),
        Arc::new(RobustPathSlot::new()),
        Arc::new(sink),
    ));
    let dispatcher = ClickDispatcher::new();
    let _token = register_interaction_listener(&dispatcher, &reporter);

    struct Replay(Option<clickpath_engine::protocol::ClickCapture>);

    #[async_trait::async_trait]
    impl CaptureSource for Replay {
        async fn launch(&mut self) -> Result<(), clickpath_engine::session::SourceError> {
            Ok(())
        }
        async fn navigate(&mut self, _url: &str) -> Result<(), clickpath_engine::session::SourceError> {
            Ok(())
        }
        async fn next_capture(&mut self) -> Option<clickpath_engine::protocol::ClickCapture> {
            self.0.take()
        }
        async fn close(&mut self) -> Result<(), clickpath_engine::session::SourceError> {
            Ok(())
        }
    }

    assert_eq!(record(&mut Replay(Some(capture)), &dispatcher).await, 1);
    assert_eq!(rx.try_recv().unwrap().selector, "html > body > button");

    recorder.close().await.expect("close failed");
}

#[tokio::test]
#[serial]
async fn test_navigate_before_launch_fails() {
    let mut recorder = HeadlessRecorder::new();
    assert!(recorder.navigate("about:blank").await.is_err());
    assert!(recorder.close().await.is_ok());
}
