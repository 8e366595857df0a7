//! The state-owning refresh actor and its handle.
//!
//! The actor task is the only place the cache and the published snapshot
//! are mutated. Handles and change observers talk to it through a command
//! channel; refresh cycles run as separate tasks and report back through an
//! update channel tagged with their generation.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::PortfolioCache;
use crate::config::{Config, DisplayConfig};
use crate::error::RefreshError;
use crate::format::FiatFormatter;
use crate::models::{CoinType, NftMetadata, Timeframe, TokenId};
use crate::sources::{CurrencyPreference, PortfolioSources};

use super::cycle::{Cycle, CycleSettings, StateUpdate};
use super::derived::{compute_snapshot, patch_nft_metadata};
use super::{FanOutFetcher, NetworkFilter, PortfolioSnapshot, RefreshStage};

/// Why a refresh was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshTrigger {
    Manual,
    CurrencyChanged(String),
    NetworkFilterChanged(NetworkFilter),
    TimeframeChanged(Timeframe),
    AccountsChanged,
    NetworksChanged,
    ActiveNetworkChanged(CoinType),
    SelectedAccountChanged(CoinType),
    Unlocked,
}

impl RefreshTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshTrigger::Manual => "manual",
            RefreshTrigger::CurrencyChanged(_) => "currency_changed",
            RefreshTrigger::NetworkFilterChanged(_) => "network_filter_changed",
            RefreshTrigger::TimeframeChanged(_) => "timeframe_changed",
            RefreshTrigger::AccountsChanged => "accounts_changed",
            RefreshTrigger::NetworksChanged => "networks_changed",
            RefreshTrigger::ActiveNetworkChanged(_) => "active_network_changed",
            RefreshTrigger::SelectedAccountChanged(_) => "selected_account_changed",
            RefreshTrigger::Unlocked => "unlocked",
        }
    }
}

/// Settings for [`PortfolioStore::spawn`].
#[derive(Debug, Clone)]
pub struct RefreshOptions {
    pub currency: String,
    pub timeframe: Timeframe,
    pub network_filter: NetworkFilter,
    pub coins: Vec<CoinType>,
    pub test_chain_ids: Vec<String>,
    pub fetcher: FanOutFetcher,
    pub display: DisplayConfig,
    pub initial_refresh: bool,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl RefreshOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            currency: config.currency.trim().to_uppercase(),
            timeframe: config.timeframe,
            network_filter: NetworkFilter::AllNetworks,
            coins: config.networks.coins.clone(),
            test_chain_ids: config.networks.test_chain_ids.clone(),
            fetcher: FanOutFetcher::from_config(&config.fetch),
            display: config.display.clone(),
            initial_refresh: config.fetch.initial_refresh,
        }
    }

    pub fn with_currency(mut self, currency: impl AsRef<str>) -> Self {
        self.currency = currency.as_ref().trim().to_uppercase();
        self
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    pub fn with_network_filter(mut self, filter: NetworkFilter) -> Self {
        self.network_filter = filter;
        self
    }

    pub fn with_coins(mut self, coins: Vec<CoinType>) -> Self {
        self.coins = coins;
        self
    }

    pub fn with_fetcher(mut self, fetcher: FanOutFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_initial_refresh(mut self, initial_refresh: bool) -> Self {
        self.initial_refresh = initial_refresh;
        self
    }
}

enum Command {
    Trigger {
        trigger: RefreshTrigger,
        done: Option<oneshot::Sender<PortfolioSnapshot>>,
    },
    PatchNftMetadata {
        token_id: TokenId,
        metadata: NftMetadata,
    },
    Shutdown,
}

/// Posts refresh triggers to a running store. Held by change observers.
#[derive(Clone)]
pub struct TriggerSender {
    commands: mpsc::UnboundedSender<Command>,
}

impl TriggerSender {
    pub fn send(&self, trigger: RefreshTrigger) -> Result<(), RefreshError> {
        self.commands
            .send(Command::Trigger {
                trigger,
                done: None,
            })
            .map_err(|_| RefreshError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Resolves once the store has shut down.
    pub async fn closed(&self) {
        self.commands.closed().await
    }
}

/// Handle to a running portfolio store.
///
/// Cloning is cheap; all clones talk to the same actor. The actor stops
/// when [`PortfolioStore::shutdown`] is called or every handle and trigger
/// sender has been dropped.
#[derive(Clone)]
pub struct PortfolioStore {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<PortfolioSnapshot>,
    stage: watch::Receiver<RefreshStage>,
    currency: Arc<dyn CurrencyPreference>,
}

impl PortfolioStore {
    /// Start the store actor on the current tokio runtime.
    pub fn spawn(sources: PortfolioSources, options: RefreshOptions) -> Self {
        Self::spawn_with_handle(sources, options).0
    }

    /// Like [`PortfolioStore::spawn`], also returning the actor task.
    pub fn spawn_with_handle(
        sources: PortfolioSources,
        options: RefreshOptions,
    ) -> (Self, JoinHandle<()>) {
        let formatter = FiatFormatter::from_display(&options.currency, &options.display);
        let initial = PortfolioSnapshot::empty(
            formatter.format(rust_decimal::Decimal::ZERO),
            formatter.currency_code(),
            options.timeframe,
            options.network_filter.clone(),
        );

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);
        let (stage_tx, stage_rx) = watch::channel(RefreshStage::Idle);

        let currency = sources.currency.clone();
        let actor = StoreActor {
            sources,
            formatter,
            currency: options.currency.clone(),
            last_cycle_currency: None,
            timeframe: options.timeframe,
            network_filter: options.network_filter.clone(),
            options,
            cache: PortfolioCache::new(),
            snapshot: snapshot_tx,
            stage: stage_tx,
            generation: 0,
            in_flight: None,
            waiters: Vec::new(),
            updates: updates_tx,
        };
        let task = tokio::spawn(actor.run(commands_rx, updates_rx));

        let store = Self {
            commands: commands_tx,
            snapshot: snapshot_rx,
            stage: stage_rx,
            currency,
        };
        (store, task)
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> PortfolioSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PortfolioSnapshot> {
        self.snapshot.clone()
    }

    pub fn stage(&self) -> RefreshStage {
        *self.stage.borrow()
    }

    pub fn subscribe_stage(&self) -> watch::Receiver<RefreshStage> {
        self.stage.clone()
    }

    pub fn refresh(&self) -> Result<(), RefreshError> {
        self.trigger(RefreshTrigger::Manual)
    }

    /// Refresh and wait for the snapshot of the cycle that finally
    /// completes. Superseding cycles inherit the wait.
    pub async fn refresh_and_wait(&self) -> Result<PortfolioSnapshot, RefreshError> {
        let (done, rx) = oneshot::channel();
        self.commands
            .send(Command::Trigger {
                trigger: RefreshTrigger::Manual,
                done: Some(done),
            })
            .map_err(|_| RefreshError::Closed)?;
        rx.await.map_err(|_| RefreshError::Closed)
    }

    pub fn set_network_filter(&self, filter: NetworkFilter) -> Result<(), RefreshError> {
        self.trigger(RefreshTrigger::NetworkFilterChanged(filter))
    }

    pub fn set_timeframe(&self, timeframe: Timeframe) -> Result<(), RefreshError> {
        self.trigger(RefreshTrigger::TimeframeChanged(timeframe))
    }

    /// Store the new currency in the preference, then refresh in it.
    pub async fn set_currency(&self, code: &str) -> anyhow::Result<()> {
        let code = code.trim().to_uppercase();
        self.currency.set(&code).await?;
        self.trigger(RefreshTrigger::CurrencyChanged(code))?;
        Ok(())
    }

    /// Replace one NFT's metadata without a refresh.
    pub fn patch_nft_metadata(
        &self,
        token_id: TokenId,
        metadata: NftMetadata,
    ) -> Result<(), RefreshError> {
        self.commands
            .send(Command::PatchNftMetadata { token_id, metadata })
            .map_err(|_| RefreshError::Closed)
    }

    pub fn trigger_sender(&self) -> TriggerSender {
        TriggerSender {
            commands: self.commands.clone(),
        }
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    fn trigger(&self, trigger: RefreshTrigger) -> Result<(), RefreshError> {
        self.trigger_sender().send(trigger)
    }
}

struct StoreActor {
    sources: PortfolioSources,
    options: RefreshOptions,
    formatter: FiatFormatter,
    currency: String,
    /// Currency of the most recently started cycle; `None` before the first.
    last_cycle_currency: Option<String>,
    timeframe: Timeframe,
    network_filter: NetworkFilter,
    cache: PortfolioCache,
    snapshot: watch::Sender<PortfolioSnapshot>,
    stage: watch::Sender<RefreshStage>,
    generation: u64,
    in_flight: Option<CancellationToken>,
    waiters: Vec<oneshot::Sender<PortfolioSnapshot>>,
    updates: mpsc::UnboundedSender<StateUpdate>,
}

impl StoreActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut updates: mpsc::UnboundedReceiver<StateUpdate>,
    ) {
        self.start().await;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Trigger { trigger, done }) => self.handle_trigger(trigger, done),
                    Some(Command::PatchNftMetadata { token_id, metadata }) => {
                        self.patch(token_id, metadata)
                    }
                    Some(Command::Shutdown) | None => break,
                },
                Some(update) = updates.recv() => self.apply(update),
            }
        }

        if let Some(cancel) = self.in_flight.take() {
            cancel.cancel();
        }
        debug!(generation = self.generation, "Portfolio store stopped");
    }

    async fn start(&mut self) {
        match self.sources.currency.get().await {
            Ok(code) => {
                let code = code.trim().to_uppercase();
                if code != self.currency {
                    self.use_currency(code);
                    let empty = PortfolioSnapshot::empty(
                        self.formatter.format(rust_decimal::Decimal::ZERO),
                        self.formatter.currency_code(),
                        self.timeframe,
                        self.network_filter.clone(),
                    );
                    self.snapshot.send_replace(empty);
                }
            }
            Err(err) => warn!(
                currency = %self.currency,
                error = %format!("{err:#}"),
                "Failed to read currency preference; using configured currency"
            ),
        }

        if !self.options.initial_refresh {
            return;
        }
        match self.sources.accounts.is_locked().await {
            Ok(false) => self.start_cycle(&RefreshTrigger::Manual, None),
            Ok(true) => debug!("Wallet is locked; waiting for unlock before refreshing"),
            Err(err) => warn!(
                error = %format!("{err:#}"),
                "Failed to read lock state; skipping initial refresh"
            ),
        }
    }

    fn use_currency(&mut self, code: String) {
        self.formatter = self.formatter.for_currency(&code);
        self.currency = code;
    }

    fn handle_trigger(
        &mut self,
        trigger: RefreshTrigger,
        done: Option<oneshot::Sender<PortfolioSnapshot>>,
    ) {
        let changed = match &trigger {
            RefreshTrigger::CurrencyChanged(code) => {
                let code = code.trim().to_uppercase();
                // Compared against what was last fetched, not the adopted
                // currency: the preference read at startup may already hold it.
                let changed = self.last_cycle_currency.as_deref() != Some(code.as_str());
                if code != self.currency {
                    self.use_currency(code);
                }
                changed
            }
            RefreshTrigger::TimeframeChanged(timeframe) => {
                let changed = *timeframe != self.timeframe;
                self.timeframe = *timeframe;
                changed
            }
            RefreshTrigger::NetworkFilterChanged(filter) => {
                self.network_filter = filter.clone();
                true
            }
            _ => true,
        };

        if changed {
            self.start_cycle(&trigger, done);
        } else {
            debug!(trigger = trigger.as_str(), "Trigger does not change inputs; ignoring");
            if let Some(done) = done {
                let _ = done.send(self.snapshot.borrow().clone());
            }
        }
    }

    fn start_cycle(
        &mut self,
        trigger: &RefreshTrigger,
        done: Option<oneshot::Sender<PortfolioSnapshot>>,
    ) {
        if let Some(previous) = self.in_flight.take() {
            previous.cancel();
            debug!(generation = self.generation, "Superseding in-flight refresh cycle");
        }
        self.generation += 1;
        self.last_cycle_currency = Some(self.currency.clone());
        if let Some(done) = done {
            self.waiters.push(done);
        }

        let cancel = CancellationToken::new();
        self.in_flight = Some(cancel.clone());

        let cycle = Cycle {
            generation: self.generation,
            sources: self.sources.clone(),
            fetcher: self.options.fetcher.clone(),
            settings: CycleSettings {
                currency: self.currency.clone(),
                timeframe: self.timeframe,
                network_filter: self.network_filter.clone(),
                coins: self.options.coins.clone(),
                test_chain_ids: self.options.test_chain_ids.clone(),
            },
            cache: self.cache.clone(),
            updates: self.updates.clone(),
            cancel,
        };

        info!(
            generation = self.generation,
            trigger = trigger.as_str(),
            currency = %self.currency,
            timeframe = %self.timeframe,
            network = self.network_filter.title(),
            "Starting refresh cycle"
        );
        tokio::spawn(cycle.run());
    }

    fn apply(&mut self, update: StateUpdate) {
        if update.generation() != self.generation {
            debug!(
                generation = update.generation(),
                current = self.generation,
                "Dropping update from superseded cycle"
            );
            return;
        }

        match update {
            StateUpdate::Stage { generation, stage } => {
                debug!(generation, stage = %stage, "Refresh stage");
                self.stage.send_replace(stage);
            }
            StateUpdate::Merge { generation, merge } => {
                debug!(
                    generation,
                    kind = merge.kind(),
                    entries = merge.len(),
                    "Merging fetch results"
                );
                self.cache.apply(merge);
            }
            StateUpdate::Recompute {
                assets, loading, ..
            } => {
                let snapshot = compute_snapshot(
                    &assets,
                    &self.cache,
                    &self.formatter,
                    self.timeframe,
                    &self.network_filter,
                    loading,
                );
                self.snapshot.send_replace(snapshot.clone());
                if !loading {
                    self.finish(snapshot);
                }
            }
            StateUpdate::Aborted { .. } => {
                self.snapshot.send_modify(|snapshot| snapshot.is_loading = false);
                let snapshot = self.snapshot.borrow().clone();
                self.finish(snapshot);
            }
        }
    }

    fn finish(&mut self, snapshot: PortfolioSnapshot) {
        self.in_flight = None;
        self.stage.send_replace(RefreshStage::Idle);
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(snapshot.clone());
        }
    }

    fn patch(&mut self, token_id: TokenId, metadata: NftMetadata) {
        self.cache.metadata.put(token_id.clone(), metadata.clone());
        let patched = self.snapshot.send_if_modified(|snapshot| {
            patch_nft_metadata(&mut snapshot.nfts, &token_id, metadata)
        });
        debug!(token = %token_id, patched, "Patched NFT metadata");
    }
}
