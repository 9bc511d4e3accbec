use async_trait::async_trait;
use clickpath_common::error::SelectorError;
use clickpath_engine::dom::Document;
use clickpath_engine::provider::{
    ProviderLoader, ProviderState, RobulaLoader, RobustPathProvider, RobustPathSlot,
};
use clickpath_engine::selector::RobulaPlus;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

const PAGE: &str = r#"<html><body><ul id="list"><li>A</li><li>B</li></ul></body></html>"#;

/// Holds the load until released.
struct GatedLoader {
    gate: Arc<Notify>,
    calls: AtomicUsize,
}

#[async_trait]
impl ProviderLoader for GatedLoader {
    async fn load(&self) -> Result<Arc<dyn RobustPathProvider>, SelectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(Arc::new(RobulaPlus::default()))
    }
}

struct FailingLoader;

#[async_trait]
impl ProviderLoader for FailingLoader {
    async fn load(&self) -> Result<Arc<dyn RobustPathProvider>, SelectorError> {
        Err(SelectorError::Load("script blocked".into()))
    }
}

#[test]
fn test_unloaded_slot_is_not_ready() {
    let doc = Document::parse_markup(PAGE).unwrap();
    let slot = RobustPathSlot::new();
    assert_eq!(slot.state(), ProviderState::Unloaded);
    assert!(!slot.is_ready());

    let li = doc.elements()[3];
    let err = slot.robust_selector(&doc, li).unwrap_err();
    assert!(err.is_not_ready());
    assert_eq!(
        err,
        SelectorError::NotReady {
            state: "unloaded".into()
        }
    );
}

#[tokio::test]
async fn test_wait_ready_does_not_block_when_nothing_loads() {
    let slot = RobustPathSlot::new();
    assert!(slot.wait_ready().await.unwrap_err().is_not_ready());
}

#[tokio::test]
async fn test_builtin_loader_reaches_ready() {
    let doc = Document::parse_markup(PAGE).unwrap();
    let slot = Arc::new(RobustPathSlot::new());

    assert!(slot.start_loading(Arc::new(RobulaLoader::default())));
    slot.wait_ready().await.unwrap();
    assert_eq!(slot.state(), ProviderState::Ready);

    let second = doc.elements()[4];
    assert_eq!(
        slot.robust_selector(&doc, second).unwrap(),
        "//*[contains(text(),'B')]"
    );
}

#[tokio::test]
async fn test_loading_happens_once() {
    let gate = Arc::new(Notify::new());
    let loader = Arc::new(GatedLoader {
        gate: gate.clone(),
        calls: AtomicUsize::new(0),
    });
    let slot = Arc::new(RobustPathSlot::new());

    assert!(slot.start_loading(loader.clone()));
    assert!(!slot.start_loading(loader.clone()));
    assert_eq!(slot.state(), ProviderState::Loading);

    let doc = Document::parse_markup(PAGE).unwrap();
    let err = slot.robust_selector(&doc, doc.elements()[3]).unwrap_err();
    assert_eq!(
        err,
        SelectorError::NotReady {
            state: "loading".into()
        }
    );

    gate.notify_one();
    slot.wait_ready().await.unwrap();
    assert!(!slot.start_loading(loader.clone()));
    assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    assert!(slot.robust_selector(&doc, doc.elements()[3]).is_ok());
}

#[tokio::test]
async fn test_failed_load_is_terminal() {
    let slot = Arc::new(RobustPathSlot::new());
    assert!(slot.start_loading(Arc::new(FailingLoader)));

    let err = slot.wait_ready().await.unwrap_err();
    assert_eq!(err, SelectorError::Load("script blocked".into()));
    assert_eq!(
        slot.state(),
        ProviderState::Failed("script blocked".into())
    );
    assert!(!slot.start_loading(Arc::new(RobulaLoader::default())));
}

#[test]
fn test_preloaded_slot() {
    let slot = RobustPathSlot::with_provider(Arc::new(RobulaPlus::default()));
    assert_eq!(slot.state(), ProviderState::Ready);
    assert!(slot.is_ready());
}
