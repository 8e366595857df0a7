use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{AssetKey, NetworkInfo, NftMetadata, PricePoint, Timeframe, Token, TokenId};

/// Which networks the portfolio covers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NetworkFilter {
    /// Every supported network except test networks.
    #[default]
    AllNetworks,
    Network { network: NetworkInfo },
}

impl NetworkFilter {
    pub fn network(network: NetworkInfo) -> Self {
        NetworkFilter::Network { network }
    }

    pub fn title(&self) -> &str {
        match self {
            NetworkFilter::AllNetworks => "All Networks",
            NetworkFilter::Network { network } => &network.chain_name,
        }
    }
}

/// A fungible token as displayed in the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRow {
    pub token: Token,
    pub network: NetworkInfo,
    pub decimal_balance: Decimal,
    /// Fiat price as reported by the provider; empty when unknown.
    pub price: String,
    pub history: Vec<PricePoint>,
}

impl AssetRow {
    pub fn key(&self) -> AssetKey {
        self.token.asset_key()
    }
}

/// A non-fungible token as displayed in the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftRow {
    pub token: Token,
    pub network: NetworkInfo,
    pub balance: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<NftMetadata>,
}

impl NftRow {
    pub fn token_id(&self) -> TokenId {
        self.token.id()
    }
}

/// Portfolio value at one point of the price history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancePoint {
    pub timestamp: DateTime<Utc>,
    pub value: Decimal,
    pub formatted: String,
}

/// The published state of the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    /// Formatted fiat total of all fungible rows.
    pub balance: String,
    pub total_value: Decimal,
    pub assets: Vec<AssetRow>,
    pub nfts: Vec<NftRow>,
    pub historical_balances: Vec<BalancePoint>,
    pub is_loading: bool,
    pub currency_code: String,
    pub timeframe: Timeframe,
    pub network_filter: NetworkFilter,
}

impl PortfolioSnapshot {
    /// The state before any refresh has run.
    pub fn empty(
        balance: String,
        currency_code: impl Into<String>,
        timeframe: Timeframe,
        network_filter: NetworkFilter,
    ) -> Self {
        Self {
            balance,
            total_value: Decimal::ZERO,
            assets: Vec::new(),
            nfts: Vec::new(),
            historical_balances: Vec::new(),
            is_loading: false,
            currency_code: currency_code.into(),
            timeframe,
            network_filter,
        }
    }

    pub fn asset(&self, key: &AssetKey) -> Option<&AssetRow> {
        self.assets.iter().find(|row| &row.key() == key)
    }

    pub fn nft(&self, token_id: &TokenId) -> Option<&NftRow> {
        self.nfts.iter().find(|row| &row.token_id() == token_id)
    }
}

/// Progress of the refresh coordinator through a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStage {
    #[default]
    Idle,
    Enumerating,
    FetchingBalances,
    FetchingPrices,
    FetchingHistory,
    FetchingMetadata,
    Recomputing,
}

impl RefreshStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshStage::Idle => "idle",
            RefreshStage::Enumerating => "enumerating",
            RefreshStage::FetchingBalances => "fetching_balances",
            RefreshStage::FetchingPrices => "fetching_prices",
            RefreshStage::FetchingHistory => "fetching_history",
            RefreshStage::FetchingMetadata => "fetching_metadata",
            RefreshStage::Recomputing => "recomputing",
        }
    }
}

impl std::fmt::Display for RefreshStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
