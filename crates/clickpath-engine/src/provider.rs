//! Lazily loaded robust-path algorithm.
//!
//! The provider moves through `Unloaded -> Loading -> Ready` exactly once (or
//! ends in `Failed`). Until it is ready every request fails fast with
//! [`SelectorError::NotReady`]; callers decide whether to fall back to the
//! structural builder or drop the interaction.

use crate::dom::{Document, NodeId};
use crate::selector::{RobulaOptions, RobulaPlus};
use async_trait::async_trait;
use clickpath_common::error::SelectorError;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// A robust XPath algorithm.
pub trait RobustPathProvider: Send + Sync {
    fn name(&self) -> &str;

    fn robust_xpath(&self, doc: &Document, element: NodeId) -> Result<String, SelectorError>;
}

impl RobustPathProvider for RobulaPlus {
    fn name(&self) -> &str {
        "robula-plus"
    }

    fn robust_xpath(&self, doc: &Document, element: NodeId) -> Result<String, SelectorError> {
        self.generate(doc, element).map(|xpath| xpath.to_string())
    }
}

/// Produces the provider instance. Called once per slot.
#[async_trait]
pub trait ProviderLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn RobustPathProvider>, SelectorError>;
}

/// Loads the bundled Robula+ implementation.
#[derive(Debug, Clone, Default)]
pub struct RobulaLoader {
    options: RobulaOptions,
}

impl RobulaLoader {
    pub fn new(options: RobulaOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl ProviderLoader for RobulaLoader {
    async fn load(&self) -> Result<Arc<dyn RobustPathProvider>, SelectorError> {
        Ok(Arc::new(RobulaPlus::new(self.options.clone())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderState {
    Unloaded,
    Loading,
    Ready,
    Failed(String),
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderState::Unloaded => write!(f, "unloaded"),
            ProviderState::Loading => write!(f, "loading"),
            ProviderState::Ready => write!(f, "ready"),
            ProviderState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Holds the provider once loaded, for the rest of the process.
pub struct RobustPathSlot {
    state: watch::Sender<ProviderState>,
    provider: OnceLock<Arc<dyn RobustPathProvider>>,
}

impl Default for RobustPathSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl RobustPathSlot {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ProviderState::Unloaded);
        Self {
            state,
            provider: OnceLock::new(),
        }
    }

    /// A slot that starts out ready with the given provider.
    pub fn with_provider(provider: Arc<dyn RobustPathProvider>) -> Self {
        let slot = Self::new();
        let _ = slot.provider.set(provider);
        slot.state.send_replace(ProviderState::Ready);
        slot
    }

    pub fn state(&self) -> ProviderState {
        self.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.provider.get().is_some()
    }

    /// Begin loading in the background. Only the first call on an `Unloaded`
    /// slot does anything; it returns whether a load was started.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_loading(self: &Arc<Self>, loader: Arc<dyn ProviderLoader>) -> bool {
        let started = self.state.send_if_modified(|state| {
            if *state == ProviderState::Unloaded {
                *state = ProviderState::Loading;
                true
            } else {
                false
            }
        });
        if !started {
            debug!("Robust path provider already {}", self.state());
            return false;
        }

        info!("Loading robust path provider");
        let slot = Arc::clone(self);
        tokio::spawn(async move {
            match loader.load().await {
                Ok(provider) => {
                    info!("Robust path provider '{}' ready", provider.name());
                    let _ = slot.provider.set(provider);
                    slot.state.send_replace(ProviderState::Ready);
                }
                Err(e) => {
                    warn!("Robust path provider failed to load: {}", e);
                    let reason = match e {
                        SelectorError::Load(reason) => reason,
                        other => other.to_string(),
                    };
                    slot.state.send_replace(ProviderState::Failed(reason));
                }
            }
        });
        true
    }

    /// Wait until loading finishes. Returns immediately when no load was
    /// started.
    pub async fn wait_ready(&self) -> Result<(), SelectorError> {
        let mut rx = self.state.subscribe();
        let settled = rx
            .wait_for(|state| *state != ProviderState::Loading)
            .await
            .map_err(|e| SelectorError::Load(e.to_string()))?;
        let state = (*settled).clone();
        drop(settled);

        match state {
            ProviderState::Ready => Ok(()),
            ProviderState::Failed(reason) => Err(SelectorError::Load(reason)),
            other => Err(SelectorError::NotReady {
                state: other.to_string(),
            }),
        }
    }

    /// Run the provider, or fail with `NotReady` without waiting.
    pub fn robust_selector(&self, doc: &Document, element: NodeId) -> Result<String, SelectorError> {
        match self.provider.get() {
            Some(provider) => provider.robust_xpath(doc, element),
            None => Err(SelectorError::NotReady {
                state: self.state().to_string(),
            }),
        }
    }
}
