//! Interfaces of the collaborators the portfolio engine consumes.
//!
//! Directories and catalogs are owned by the wallet; providers are assumed
//! remote, asynchronous and fallible.

#[cfg(feature = "coingecko")]
pub mod coingecko;
mod events;
mod memory;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use tokio::sync::broadcast;

use crate::models::{
    AccountInfo, CoinType, NetworkAssets, NetworkInfo, NftMetadata, PriceKey, PricePoint,
    Timeframe, Token, TokenId,
};

#[cfg(feature = "coingecko")]
pub use coingecko::CoinGeckoPriceProvider;
pub use events::{KeyringEvent, NetworkEvent, PreferenceEvent};
pub use memory::{MemoryWallet, WalletFile, WalletToken};

#[async_trait::async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn list_accounts(&self, coin: CoinType) -> Result<Vec<AccountInfo>>;

    async fn is_locked(&self) -> Result<bool>;

    fn subscribe(&self) -> broadcast::Receiver<KeyringEvent>;
}

#[async_trait::async_trait]
pub trait NetworkDirectory: Send + Sync {
    async fn list_networks(&self, coins: &[CoinType]) -> Result<Vec<NetworkInfo>>;

    fn subscribe(&self) -> broadcast::Receiver<NetworkEvent>;
}

#[async_trait::async_trait]
pub trait AssetCatalog: Send + Sync {
    /// Visible tokens for each of `networks`, grouped per network in the
    /// order the networks were given.
    async fn list_visible_assets(&self, networks: &[NetworkInfo]) -> Result<Vec<NetworkAssets>>;
}

#[async_trait::async_trait]
pub trait BalanceProvider: Send + Sync {
    /// Total balance of `token` on `network` summed over `accounts`, in
    /// whole-token units.
    async fn fetch_total_balance(
        &self,
        token: &Token,
        network: &NetworkInfo,
        accounts: &[AccountInfo],
    ) -> Result<Decimal>;
}

#[async_trait::async_trait]
pub trait PriceProvider: Send + Sync {
    /// One batched request for every key. Keys the provider does not know
    /// are simply missing from the result.
    async fn fetch_prices(
        &self,
        keys: &[PriceKey],
        currency: &str,
        timeframe: Timeframe,
    ) -> Result<HashMap<PriceKey, String>>;

    async fn fetch_price_history(
        &self,
        key: &PriceKey,
        currency: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<PricePoint>>;

    fn name(&self) -> &str;
}

#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn fetch_metadata(&self, tokens: &[Token]) -> Result<HashMap<TokenId, NftMetadata>>;
}

#[async_trait::async_trait]
pub trait CurrencyPreference: Send + Sync {
    async fn get(&self) -> Result<String>;

    async fn set(&self, code: &str) -> Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<PreferenceEvent>;
}

/// Every collaborator the refresh coordinator talks to.
#[derive(Clone)]
pub struct PortfolioSources {
    pub accounts: Arc<dyn AccountDirectory>,
    pub networks: Arc<dyn NetworkDirectory>,
    pub catalog: Arc<dyn AssetCatalog>,
    pub balances: Arc<dyn BalanceProvider>,
    pub prices: Arc<dyn PriceProvider>,
    pub metadata: Arc<dyn MetadataProvider>,
    pub currency: Arc<dyn CurrencyPreference>,
}

impl PortfolioSources {
    /// Use a single wallet for every collaborator.
    pub fn from_wallet(wallet: Arc<MemoryWallet>) -> Self {
        Self {
            accounts: wallet.clone(),
            networks: wallet.clone(),
            catalog: wallet.clone(),
            balances: wallet.clone(),
            prices: wallet.clone(),
            metadata: wallet.clone(),
            currency: wallet,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn AssetCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_prices(mut self, prices: Arc<dyn PriceProvider>) -> Self {
        self.prices = prices;
        self
    }

    pub fn with_balances(mut self, balances: Arc<dyn BalanceProvider>) -> Self {
        self.balances = balances;
        self
    }

    pub fn with_metadata(mut self, metadata: Arc<dyn MetadataProvider>) -> Self {
        self.metadata = metadata;
        self
    }
}
