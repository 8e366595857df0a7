//! One run through the refresh stages.
//!
//! A cycle works on its own copy of the cache taken when it started and
//! reports everything it learns to the store actor as [`StateUpdate`]s. It
//! never touches published state itself.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheMerge, PortfolioCache};
use crate::error::RefreshError;
use crate::models::{
    AccountInfo, CoinType, NetworkAssets, NetworkInfo, PriceKey, Timeframe, Token,
};
use crate::sources::PortfolioSources;

use super::{FanOutFetcher, NetworkFilter, RefreshStage};

/// Messages from a running cycle to the store actor. Every message carries
/// the generation of the cycle that produced it.
#[derive(Debug)]
pub(crate) enum StateUpdate {
    Stage {
        generation: u64,
        stage: RefreshStage,
    },
    Merge {
        generation: u64,
        merge: CacheMerge,
    },
    /// Rebuild the snapshot from these assets and the actor's cache.
    Recompute {
        generation: u64,
        assets: Arc<Vec<NetworkAssets>>,
        loading: bool,
    },
    /// Enumeration failed; keep the previous snapshot.
    Aborted { generation: u64 },
}

impl StateUpdate {
    pub(crate) fn generation(&self) -> u64 {
        match self {
            StateUpdate::Stage { generation, .. }
            | StateUpdate::Merge { generation, .. }
            | StateUpdate::Recompute { generation, .. }
            | StateUpdate::Aborted { generation } => *generation,
        }
    }
}

/// Inputs fixed for the lifetime of a cycle.
#[derive(Debug, Clone)]
pub(crate) struct CycleSettings {
    pub currency: String,
    pub timeframe: Timeframe,
    pub network_filter: NetworkFilter,
    pub coins: Vec<CoinType>,
    pub test_chain_ids: Vec<String>,
}

impl CycleSettings {
    fn is_test_network(&self, network: &NetworkInfo) -> bool {
        self.test_chain_ids
            .iter()
            .any(|id| id.eq_ignore_ascii_case(&network.chain_id))
    }
}

#[derive(Debug, Clone)]
struct BalanceUnit {
    token: Token,
    network: NetworkInfo,
    accounts: Arc<Vec<AccountInfo>>,
}

pub(crate) struct Cycle {
    pub generation: u64,
    pub sources: PortfolioSources,
    pub fetcher: FanOutFetcher,
    pub settings: CycleSettings,
    pub cache: PortfolioCache,
    pub updates: mpsc::UnboundedSender<StateUpdate>,
    pub cancel: CancellationToken,
}

impl Cycle {
    pub(crate) async fn run(mut self) {
        let generation = self.generation;
        match self.stages().await {
            Ok(()) => {}
            Err(RefreshError::Cancelled) | Err(RefreshError::Superseded { .. }) => {
                debug!(generation, "refresh cycle cancelled");
            }
            Err(RefreshError::Closed) => {
                debug!(generation, "portfolio store closed during refresh cycle");
            }
        }
    }

    async fn stages(&mut self) -> Result<(), RefreshError> {
        let generation = self.generation;

        self.stage(RefreshStage::Enumerating)?;
        let assets = match self.enumerate().await? {
            Ok(assets) => Arc::new(assets),
            Err(err) => {
                error!(
                    generation,
                    error = %format!("{err:#}"),
                    "Failed to enumerate portfolio assets"
                );
                self.send(StateUpdate::Aborted { generation })?;
                return Ok(());
            }
        };

        // Show what the cache already knows before any fetch goes out.
        self.send(StateUpdate::Recompute {
            generation,
            assets: assets.clone(),
            loading: true,
        })?;

        self.stage(RefreshStage::FetchingBalances)?;
        self.fetch_balances(&assets).await?;

        self.stage(RefreshStage::FetchingPrices)?;
        self.fetch_prices(&assets).await?;

        self.stage(RefreshStage::FetchingHistory)?;
        self.fetch_history(&assets).await?;

        self.stage(RefreshStage::FetchingMetadata)?;
        self.fetch_metadata(&assets).await?;

        self.stage(RefreshStage::Recomputing)?;
        let (nfts, fungible): (Vec<&Token>, Vec<&Token>) =
            tokens(&assets).partition(|t| t.is_non_fungible());
        info!(
            generation,
            networks = assets.len(),
            assets = fungible.len(),
            nfts = nfts.len(),
            "Refresh cycle complete"
        );
        self.send(StateUpdate::Recompute {
            generation,
            assets,
            loading: false,
        })
    }

    async fn enumerate(&self) -> Result<anyhow::Result<Vec<NetworkAssets>>, RefreshError> {
        let listing = async {
            let networks = match &self.settings.network_filter {
                NetworkFilter::AllNetworks => self
                    .sources
                    .networks
                    .list_networks(&self.settings.coins)
                    .await
                    .context("Failed to list networks")?
                    .into_iter()
                    .filter(|network| !self.settings.is_test_network(network))
                    .collect::<Vec<_>>(),
                NetworkFilter::Network { network } => vec![network.clone()],
            };
            self.sources
                .catalog
                .list_visible_assets(&networks)
                .await
                .context("Failed to list visible assets")
        };
        self.fetcher.fetch_one(listing, &self.cancel).await
    }

    /// Accounts per coin type present in `assets`. A coin whose listing
    /// fails is left out, which skips its balance fetches.
    async fn list_accounts(
        &self,
        assets: &[NetworkAssets],
    ) -> Result<HashMap<CoinType, Arc<Vec<AccountInfo>>>, RefreshError> {
        let mut coins: Vec<CoinType> = Vec::new();
        for group in assets {
            if !coins.contains(&group.network.coin) {
                coins.push(group.network.coin);
            }
        }

        let mut by_coin = HashMap::new();
        for coin in coins {
            let listing = self.sources.accounts.list_accounts(coin);
            match self.fetcher.fetch_one(listing, &self.cancel).await? {
                Ok(accounts) => {
                    by_coin.insert(coin, Arc::new(accounts));
                }
                Err(err) => warn!(
                    generation = self.generation,
                    coin = %coin,
                    error = %format!("{err:#}"),
                    "Failed to list accounts; keeping cached balances"
                ),
            }
        }
        Ok(by_coin)
    }

    async fn fetch_balances(&mut self, assets: &[NetworkAssets]) -> Result<(), RefreshError> {
        let accounts = self.list_accounts(assets).await?;
        let units: Vec<BalanceUnit> = assets
            .iter()
            .flat_map(|group| {
                let accounts = accounts.get(&group.network.coin).cloned();
                group.tokens.iter().filter_map(move |token| {
                    accounts.clone().map(|accounts| BalanceUnit {
                        token: token.clone(),
                        network: group.network.clone(),
                        accounts,
                    })
                })
            })
            .collect();

        let provider = self.sources.balances.clone();
        let out = self
            .fetcher
            .fetch_all(
                units,
                |unit| unit.token.asset_key(),
                move |unit| {
                    let provider = provider.clone();
                    async move {
                        provider
                            .fetch_total_balance(&unit.token, &unit.network, &unit.accounts)
                            .await
                    }
                },
                &self.cancel,
            )
            .await?;

        for (key, err) in &out.failed {
            warn!(generation = self.generation, asset = %key, error = %err, "Balance fetch failed; keeping cached value");
        }
        self.merge(CacheMerge::Balances(out.values))
    }

    async fn fetch_prices(&mut self, assets: &[NetworkAssets]) -> Result<(), RefreshError> {
        let mut keys: Vec<PriceKey> = Vec::new();
        for token in tokens(assets).filter(|t| !t.is_non_fungible()) {
            let key = token.price_key();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        if keys.is_empty() {
            return Ok(());
        }

        let request = self.sources.prices.fetch_prices(
            &keys,
            &self.settings.currency,
            self.settings.timeframe,
        );
        let result = self.fetcher.fetch_one(request, &self.cancel).await?;
        match result {
            Ok(prices) => {
                debug!(
                    generation = self.generation,
                    provider = self.sources.prices.name(),
                    requested = keys.len(),
                    received = prices.len(),
                    "Fetched prices"
                );
                self.merge(CacheMerge::Prices(prices))
            }
            Err(err) => {
                warn!(
                    generation = self.generation,
                    provider = self.sources.prices.name(),
                    currency = %self.settings.currency,
                    error = %format!("{err:#}"),
                    "Price fetch failed; keeping cached prices"
                );
                Ok(())
            }
        }
    }

    async fn fetch_history(&mut self, assets: &[NetworkAssets]) -> Result<(), RefreshError> {
        let keys: Vec<PriceKey> = tokens(assets)
            .filter(|t| !t.is_non_fungible())
            .filter(|t| self.cache.balance(&t.asset_key()) > Decimal::ZERO)
            .map(Token::price_key)
            .collect();

        let provider = self.sources.prices.clone();
        let currency = self.settings.currency.clone();
        let timeframe = self.settings.timeframe;
        let out = self
            .fetcher
            .fetch_all(
                keys,
                PriceKey::clone,
                move |key| {
                    let provider = provider.clone();
                    let currency = currency.clone();
                    async move {
                        let mut points = provider
                            .fetch_price_history(&key, &currency, timeframe)
                            .await?;
                        points.sort_by_key(|point| point.timestamp);
                        Ok(points)
                    }
                },
                &self.cancel,
            )
            .await?;

        for (key, err) in &out.failed {
            warn!(generation = self.generation, price_key = %key, error = %err, "Price history fetch failed; keeping cached history");
        }
        self.merge(CacheMerge::History(out.values))
    }

    async fn fetch_metadata(&mut self, assets: &[NetworkAssets]) -> Result<(), RefreshError> {
        let nfts: Vec<Token> = tokens(assets)
            .filter(|t| t.is_non_fungible())
            .cloned()
            .collect();
        if nfts.is_empty() {
            return Ok(());
        }

        let request = self.sources.metadata.fetch_metadata(&nfts);
        let result = self.fetcher.fetch_one(request, &self.cancel).await?;
        match result {
            Ok(metadata) => self.merge(CacheMerge::Metadata(metadata)),
            Err(err) => {
                warn!(
                    generation = self.generation,
                    nfts = nfts.len(),
                    error = %format!("{err:#}"),
                    "NFT metadata fetch failed; keeping cached metadata"
                );
                Ok(())
            }
        }
    }

    fn stage(&self, stage: RefreshStage) -> Result<(), RefreshError> {
        self.send(StateUpdate::Stage {
            generation: self.generation,
            stage,
        })
    }

    fn merge(&mut self, merge: CacheMerge) -> Result<(), RefreshError> {
        if merge.is_empty() {
            return Ok(());
        }
        self.cache.apply(merge.clone());
        self.send(StateUpdate::Merge {
            generation: self.generation,
            merge,
        })
    }

    /// Nothing is reported once the cycle has been cancelled.
    fn send(&self, update: StateUpdate) -> Result<(), RefreshError> {
        if self.cancel.is_cancelled() {
            return Err(RefreshError::Superseded {
                generation: self.generation,
            });
        }
        self.updates.send(update).map_err(|_| RefreshError::Closed)
    }
}

fn tokens(assets: &[NetworkAssets]) -> impl Iterator<Item = &Token> {
    assets.iter().flat_map(|group| group.tokens.iter())
}
