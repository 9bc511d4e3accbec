//! Click interaction reporting.
//!
//! A [`ClickDispatcher`] stands in for the page's event target. Reporters are
//! attached with [`register_interaction_listener`], which is idempotent per
//! reporter: repeated registration hands out another [`ListenerToken`] for the
//! same listener instead of attaching a second one.

use crate::dom::{Document, NodeId};
use crate::provider::RobustPathSlot;
use crate::selector::{IdAnchor, build_structural_selector_with};
use crate::sink::MessageSink;
use clickpath_common::error::SelectorError;
use clickpath_common::protocol::{CLICK_EVENT, InteractionRecord, PointerButton, Selector};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickEvent {
    pub target: NodeId,
    pub button: PointerButton,
}

impl ClickEvent {
    pub fn primary(target: NodeId) -> Self {
        Self {
            target,
            button: PointerButton::Primary,
        }
    }
}

pub trait ClickListener: Send + Sync {
    fn on_click(&self, doc: &Document, event: &ClickEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Entry {
    id: ListenerId,
    listener: Arc<dyn ClickListener>,
    refs: usize,
}

/// Delivers click events to attached listeners in attachment order.
#[derive(Default)]
pub struct ClickDispatcher {
    entries: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
}

impl ClickDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Attach a listener. Attaching the same `Arc` again only bumps its
    /// reference count and returns the existing id.
    pub fn add_listener(&self, listener: Arc<dyn ClickListener>) -> ListenerId {
        let mut entries = self.entries();
        let ptr = Arc::as_ptr(&listener) as *const ();
        if let Some(entry) = entries
            .iter_mut()
            .find(|e| Arc::as_ptr(&e.listener) as *const () == ptr)
        {
            entry.refs += 1;
            debug!("Listener {:?} already attached ({} refs)", entry.id, entry.refs);
            return entry.id;
        }

        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        entries.push(Entry {
            id,
            listener,
            refs: 1,
        });
        id
    }

    /// Drop one reference. Returns true when the listener was detached.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut entries = self.entries();
        let Some(index) = entries.iter().position(|e| e.id == id) else {
            return false;
        };
        entries[index].refs -= 1;
        if entries[index].refs == 0 {
            entries.remove(index);
            true
        } else {
            false
        }
    }

    pub fn listener_count(&self) -> usize {
        self.entries().len()
    }

    /// Deliver an event; returns how many listeners saw it.
    pub fn dispatch(&self, doc: &Document, event: &ClickEvent) -> usize {
        // Listeners run outside the lock so they may register or unregister.
        let listeners: Vec<Arc<dyn ClickListener>> = self
            .entries()
            .iter()
            .map(|e| Arc::clone(&e.listener))
            .collect();
        for listener in &listeners {
            listener.on_click(doc, event);
        }
        listeners.len()
    }
}

/// Proof of one registration. Hand it back to [`unregister`].
#[must_use = "dropping the token leaves the listener registered for good"]
#[derive(Debug, PartialEq, Eq)]
pub struct ListenerToken {
    id: ListenerId,
}

impl ListenerToken {
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

/// Attach `reporter` to `dispatcher` unless it is already attached.
pub fn register_interaction_listener(
    dispatcher: &ClickDispatcher,
    reporter: &Arc<InteractionReporter>,
) -> ListenerToken {
    let listener: Arc<dyn ClickListener> = reporter.clone();
    ListenerToken {
        id: dispatcher.add_listener(listener),
    }
}

/// Release a registration. Returns true when it was the last one and the
/// listener is gone.
pub fn unregister(dispatcher: &ClickDispatcher, token: ListenerToken) -> bool {
    dispatcher.remove_listener(token.id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorStrategy {
    #[default]
    Structural,
    Robust,
}

/// What a robust reporter does while the provider is still loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotReadyPolicy {
    #[default]
    Fallback,
    Drop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReporterConfig {
    #[serde(default)]
    pub strategy: SelectorStrategy,
    #[serde(default)]
    pub not_ready: NotReadyPolicy,
    #[serde(default)]
    pub id_anchor: IdAnchor,
    #[serde(default = "default_event_name")]
    pub event_name: String,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            strategy: SelectorStrategy::default(),
            not_ready: NotReadyPolicy::default(),
            id_anchor: IdAnchor::default(),
            event_name: default_event_name(),
        }
    }
}

fn default_event_name() -> String {
    CLICK_EVENT.to_string()
}

pub struct InteractionReporter {
    config: ReporterConfig,
    slot: Arc<RobustPathSlot>,
    sink: Arc<dyn MessageSink>,
}

impl InteractionReporter {
    pub fn new(config: ReporterConfig, slot: Arc<RobustPathSlot>, sink: Arc<dyn MessageSink>) -> Self {
        Self { config, slot, sink }
    }

    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    pub fn slot(&self) -> &Arc<RobustPathSlot> {
        &self.slot
    }

    /// Compute the selector this reporter would emit for `target`.
    pub fn select(&self, doc: &Document, target: NodeId) -> Result<Selector, SelectorError> {
        let element = match doc.text(target) {
            Some(_) => doc.parent(target).ok_or(SelectorError::Detached)?,
            None => target,
        };
        let structural = || {
            Selector::Structural(build_structural_selector_with(
                doc,
                element,
                self.config.id_anchor,
            ))
        };

        match self.config.strategy {
            SelectorStrategy::Structural => Ok(structural()),
            SelectorStrategy::Robust => match self.slot.robust_selector(doc, element) {
                Ok(xpath) => Ok(Selector::Robust(xpath)),
                Err(e) if e.is_not_ready() && self.config.not_ready == NotReadyPolicy::Fallback => {
                    debug!("{}; falling back to structural selector", e);
                    Ok(structural())
                }
                Err(e) => Err(e),
            },
        }
    }

    /// Handle one click. Returns the record sent to the sink, if any.
    pub fn report_click(&self, doc: &Document, event: &ClickEvent) -> Option<InteractionRecord> {
        if event.button != PointerButton::Primary {
            debug!("Ignoring {:?} button click", event.button);
            return None;
        }

        match self.select(doc, event.target) {
            Ok(selector) => {
                debug!("Click on {} selector {}", selector.kind(), selector);
                let record = InteractionRecord::new(self.config.event_name.as_str(), selector.into_string());
                self.sink.send(record.clone());
                Some(record)
            }
            Err(e) if e.is_not_ready() => {
                debug!("Click dropped: {}", e);
                None
            }
            Err(e) => {
                warn!("Click dropped: {}", e);
                None
            }
        }
    }
}

impl ClickListener for InteractionReporter {
    fn on_click(&self, doc: &Document, event: &ClickEvent) {
        let _ = self.report_click(doc, event);
    }
}
