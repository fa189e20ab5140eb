use std::sync::Arc;

use indexmap::IndexSet;
use itertools::Itertools;
use parking_lot::Mutex;
use tracing::{info, warn};

use super::{Mount, SingleFlight, ViewContext};
use crate::{
    client::RemoteClient,
    model::{IngestionStatus, Symbol},
    poll::Lane,
    slot::Slot,
};

/// Symbols the ingestion service can subscribe to.
pub const SYMBOL_CATALOGUE: [&str; 10] = [
    "BTCUSDT",
    "ETHUSDT",
    "BNBUSDT",
    "SOLUSDT",
    "ADAUSDT",
    "XRPUSDT",
    "DOGEUSDT",
    "MATICUSDT",
    "DOTUSDT",
    "AVAXUSDT",
];

/// Candidates selected when the view is first opened.
pub const DEFAULT_CANDIDATES: [&str; 2] = ["BTCUSDT", "ETHUSDT"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    Success,
    Error,
}

/// Transient message shown after an explicit start/stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub kind: BannerKind,
    pub text: String,
}

impl Banner {
    fn success(text: impl Into<String>) -> Self {
        Self {
            kind: BannerKind::Success,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            kind: BannerKind::Error,
            text: text.into(),
        }
    }
}

/// Outcome of [`IngestionActions::start`] and [`IngestionActions::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Another action was still in flight; nothing happened
    Ignored,
    /// Rejected before any request was issued
    Rejected,
    Succeeded,
    Failed,
}

/// Ingestion control: status poll plus start/stop over a candidate symbol set.
#[derive(Debug)]
pub struct ControlsView {
    _mount: Mount,
    actions: IngestionActions,
}

impl ControlsView {
    pub fn mount(context: &ViewContext) -> Self {
        let mut mount = Mount::new("controls");
        let status = Slot::new();

        let client = context.client.clone();
        let slot = status.clone();
        mount.poll("ingestion_status", context.intervals.ingestion_status, move |generation| {
            let client = client.clone();
            let slot = slot.clone();
            async move {
                generation.apply(&slot, client.ingestion_status().await);
            }
        });

        let candidates = DEFAULT_CANDIDATES.into_iter().map(Symbol::from).collect();

        Self {
            actions: IngestionActions {
                client: context.client.clone(),
                status,
                refresh: mount.lane(),
                candidates: Arc::new(Mutex::new(candidates)),
                banner: Arc::default(),
                busy: SingleFlight::default(),
            },
            _mount: mount,
        }
    }

    /// Handle for running start/stop detached from the view. It does not keep the view
    /// mounted.
    pub fn actions(&self) -> IngestionActions {
        self.actions.clone()
    }

    pub fn status(&self) -> &Slot<IngestionStatus> {
        &self.actions.status
    }

    pub fn banner(&self) -> Option<Banner> {
        self.actions.banner.lock().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.actions.busy.is_busy()
    }

    /// Candidate symbols in the order they were picked
    pub fn candidates(&self) -> Vec<Symbol> {
        self.actions.candidates()
    }

    pub fn is_candidate(&self, symbol: &str) -> bool {
        self.actions.candidates.lock().contains(symbol)
    }

    pub fn toggle_symbol(&self, symbol: Symbol) {
        let mut candidates = self.actions.candidates.lock();
        if !candidates.shift_remove(&symbol) {
            candidates.insert(symbol);
        }
    }

    pub fn select_all(&self) {
        *self.actions.candidates.lock() = SYMBOL_CATALOGUE.into_iter().map(Symbol::from).collect();
    }

    pub fn clear_all(&self) {
        self.actions.candidates.lock().clear();
    }

    pub async fn start(&self) -> ActionOutcome {
        self.actions.start().await
    }

    pub async fn stop(&self) -> ActionOutcome {
        self.actions.stop().await
    }
}

/// Start/stop state shared between a [`ControlsView`] and its detached actions.
#[derive(Debug, Clone)]
pub struct IngestionActions {
    client: RemoteClient,
    status: Slot<IngestionStatus>,
    refresh: Lane,
    candidates: Arc<Mutex<IndexSet<Symbol>>>,
    banner: Arc<Mutex<Option<Banner>>>,
    busy: SingleFlight,
}

impl IngestionActions {
    fn candidates(&self) -> Vec<Symbol> {
        self.candidates.lock().iter().cloned().collect()
    }

    /// Start ingestion for the candidate set
    pub async fn start(&self) -> ActionOutcome {
        let Some(_flight) = self.busy.try_begin() else {
            return ActionOutcome::Ignored;
        };

        let symbols = self.candidates();
        if symbols.is_empty() {
            self.set_banner(Banner::error("Please select at least one symbol"));
            return ActionOutcome::Rejected;
        }

        self.clear_banner();
        match self.client.start_ingestion(symbols.clone()).await {
            Ok(_) => {
                let listed = symbols.iter().join(", ");
                info!(symbols = %listed, "ingestion started");
                self.set_banner(Banner::success(format!("Started ingestion for {listed}")));
                self.refresh_status().await;
                ActionOutcome::Succeeded
            }
            Err(error) => {
                warn!(%error, "failed to start ingestion");
                self.set_banner(Banner::error(format!("Failed to start: {error}")));
                ActionOutcome::Failed
            }
        }
    }

    pub async fn stop(&self) -> ActionOutcome {
        let Some(_flight) = self.busy.try_begin() else {
            return ActionOutcome::Ignored;
        };

        self.clear_banner();
        match self.client.stop_ingestion().await {
            Ok(_) => {
                info!("ingestion stopped");
                self.set_banner(Banner::success("Ingestion stopped successfully"));
                self.refresh_status().await;
                ActionOutcome::Succeeded
            }
            Err(error) => {
                warn!(%error, "failed to stop ingestion");
                self.set_banner(Banner::error(format!("Failed to stop: {error}")));
                ActionOutcome::Failed
            }
        }
    }

    /// Out-of-band status fetch; skipped once the view is unmounted
    async fn refresh_status(&self) {
        if self.refresh.fence().is_closed() {
            return;
        }
        let generation = self.refresh.advance();
        generation.apply(&self.status, self.client.ingestion_status().await);
    }

    fn set_banner(&self, banner: Banner) {
        *self.banner.lock() = Some(banner);
    }

    fn clear_banner(&self) {
        *self.banner.lock() = None;
    }
}
