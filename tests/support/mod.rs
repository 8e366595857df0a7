#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use walletfolio::models::{
    AccountInfo, AssetKey, CoinType, NetworkAssets, NetworkInfo, PriceKey, PricePoint, Timeframe,
    Token,
};
use walletfolio::portfolio::{PortfolioSnapshot, PortfolioStore, RefreshOptions, RefreshStage};
use walletfolio::sources::{
    AssetCatalog, BalanceProvider, MemoryWallet, PortfolioSources, PriceProvider,
};

const WAIT: Duration = Duration::from_secs(5);

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Seconds relative to a fixed instant.
pub fn ts(offset_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).unwrap()
}

pub fn ethereum() -> NetworkInfo {
    NetworkInfo::new("0x1", "Ethereum Mainnet", CoinType::Eth).with_symbol("ETH")
}

pub fn polygon() -> NetworkInfo {
    NetworkInfo::new("0x89", "Polygon Mainnet", CoinType::Eth).with_symbol("MATIC")
}

pub fn sepolia() -> NetworkInfo {
    NetworkInfo::new("0xaa36a7", "Sepolia", CoinType::Eth).with_symbol("ETH")
}

pub fn eth_account() -> AccountInfo {
    AccountInfo::new("0x00000000000000000000000000000000000000a1", "Account 1", CoinType::Eth)
}

/// Engine options for tests: Ethereum family only, no refresh on start.
pub fn options() -> RefreshOptions {
    RefreshOptions::default()
        .with_coins(vec![CoinType::Eth])
        .with_initial_refresh(false)
}

/// A wallet with one account and the given networks.
pub async fn wallet_with_networks(networks: &[NetworkInfo]) -> Arc<MemoryWallet> {
    let wallet = Arc::new(MemoryWallet::new());
    for network in networks {
        wallet.add_network(network.clone()).await;
    }
    wallet.add_account(eth_account()).await;
    wallet
}

/// Add a token with a balance to the wallet.
pub async fn add_holding(wallet: &MemoryWallet, token: &Token, balance: &str) {
    wallet.add_token(token.clone()).await;
    wallet.set_balance(token.asset_key(), dec(balance)).await;
}

pub async fn wait_for_snapshot(
    store: &PortfolioStore,
    predicate: impl FnMut(&PortfolioSnapshot) -> bool,
) -> Result<PortfolioSnapshot> {
    let mut rx = store.subscribe();
    let snapshot = tokio::time::timeout(WAIT, rx.wait_for(predicate))
        .await
        .map_err(|_| anyhow!("timed out waiting for snapshot"))??
        .clone();
    Ok(snapshot)
}

pub async fn wait_for_stage(store: &PortfolioStore, stage: RefreshStage) -> Result<()> {
    let mut rx = store.subscribe_stage();
    tokio::time::timeout(WAIT, rx.wait_for(|current| *current == stage))
        .await
        .map_err(|_| anyhow!("timed out waiting for stage {stage}"))??;
    Ok(())
}

/// Poll `condition` until it holds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> Result<()> {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .map_err(|_| anyhow!("timed out waiting for condition"))
}

/// Price provider wrapping a wallet, with call counters and scripted
/// behaviour per currency.
pub struct ScriptedPrices {
    wallet: Arc<MemoryWallet>,
    by_currency: Mutex<HashMap<String, HashMap<PriceKey, String>>>,
    blocked: Mutex<HashSet<String>>,
    failing: AtomicBool,
    price_calls: Mutex<Vec<String>>,
    history_calls: Mutex<HashMap<PriceKey, usize>>,
}

impl ScriptedPrices {
    pub fn new(wallet: Arc<MemoryWallet>) -> Self {
        Self {
            wallet,
            by_currency: Mutex::new(HashMap::new()),
            blocked: Mutex::new(HashSet::new()),
            failing: AtomicBool::new(false),
            price_calls: Mutex::new(Vec::new()),
            history_calls: Mutex::new(HashMap::new()),
        }
    }

    /// Answer price requests in `currency` from this table instead of the wallet.
    pub fn with_currency_prices(self, currency: &str, prices: &[(&str, &str)]) -> Self {
        let table = prices
            .iter()
            .map(|(key, price)| (PriceKey::new(key), price.to_string()))
            .collect();
        self.by_currency
            .lock()
            .unwrap()
            .insert(currency.to_uppercase(), table);
        self
    }

    /// Price requests in `currency` never complete.
    pub fn block_currency(self, currency: &str) -> Self {
        self.blocked.lock().unwrap().insert(currency.to_uppercase());
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Currencies of every batched price request, in order.
    pub fn price_calls(&self) -> Vec<String> {
        self.price_calls.lock().unwrap().clone()
    }

    pub fn history_calls(&self, key: &str) -> usize {
        self.history_calls
            .lock()
            .unwrap()
            .get(&PriceKey::new(key))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl PriceProvider for ScriptedPrices {
    async fn fetch_prices(
        &self,
        keys: &[PriceKey],
        currency: &str,
        timeframe: Timeframe,
    ) -> Result<HashMap<PriceKey, String>> {
        let currency = currency.to_uppercase();
        self.price_calls.lock().unwrap().push(currency.clone());

        if self.blocked.lock().unwrap().contains(&currency) {
            return std::future::pending().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("price service unavailable"));
        }

        let table = self.by_currency.lock().unwrap().get(&currency).cloned();
        match table {
            Some(table) => Ok(keys
                .iter()
                .filter_map(|key| table.get(key).map(|p| (key.clone(), p.clone())))
                .collect()),
            None => self.wallet.fetch_prices(keys, &currency, timeframe).await,
        }
    }

    async fn fetch_price_history(
        &self,
        key: &PriceKey,
        currency: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<PricePoint>> {
        *self
            .history_calls
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_default() += 1;
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("price service unavailable"));
        }
        self.wallet
            .fetch_price_history(key, currency, timeframe)
            .await
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Balance provider wrapping a wallet with per-asset failure injection.
pub struct ScriptedBalances {
    wallet: Arc<MemoryWallet>,
    calls: AtomicUsize,
    fail_after_first: Mutex<HashSet<AssetKey>>,
    seen: Mutex<HashSet<AssetKey>>,
}

impl ScriptedBalances {
    pub fn new(wallet: Arc<MemoryWallet>) -> Self {
        Self {
            wallet,
            calls: AtomicUsize::new(0),
            fail_after_first: Mutex::new(HashSet::new()),
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// The first fetch for `key` succeeds, every later one fails.
    pub fn fail_after_first(self, key: AssetKey) -> Self {
        self.fail_after_first.lock().unwrap().insert(key);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceProvider for ScriptedBalances {
    async fn fetch_total_balance(
        &self,
        token: &Token,
        network: &NetworkInfo,
        accounts: &[AccountInfo],
    ) -> Result<Decimal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = token.asset_key();
        let seen_before = !self.seen.lock().unwrap().insert(key.clone());
        if seen_before && self.fail_after_first.lock().unwrap().contains(&key) {
            return Err(anyhow!("balance service unavailable for {key}"));
        }
        self.wallet
            .fetch_total_balance(token, network, accounts)
            .await
    }
}

/// Asset catalog that can be switched to failing.
pub struct FlakyCatalog {
    wallet: Arc<MemoryWallet>,
    failing: AtomicBool,
}

impl FlakyCatalog {
    pub fn new(wallet: Arc<MemoryWallet>) -> Self {
        Self {
            wallet,
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl AssetCatalog for FlakyCatalog {
    async fn list_visible_assets(&self, networks: &[NetworkInfo]) -> Result<Vec<NetworkAssets>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("asset catalog unavailable"));
        }
        self.wallet.list_visible_assets(networks).await
    }
}

/// Sources backed by `wallet`, with scripted prices and balances.
pub fn scripted_sources(
    wallet: Arc<MemoryWallet>,
    prices: Arc<ScriptedPrices>,
    balances: Arc<ScriptedBalances>,
) -> PortfolioSources {
    PortfolioSources::from_wallet(wallet)
        .with_prices(prices)
        .with_balances(balances)
}
