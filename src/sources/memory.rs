//! In-memory wallet backing every collaborator interface.
//!
//! Used by the CLI to render a portfolio from a JSON wallet file, and by
//! tests as a programmable stand-in for the real wallet services.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};

use crate::models::{
    AccountInfo, AssetKey, CoinType, NetworkAssets, NetworkInfo, NftMetadata, PriceKey,
    PricePoint, Timeframe, Token, TokenId,
};

use super::{
    AccountDirectory, AssetCatalog, BalanceProvider, CurrencyPreference, KeyringEvent,
    MetadataProvider, NetworkDirectory, NetworkEvent, PreferenceEvent, PriceProvider,
};

const EVENT_CAPACITY: usize = 64;

fn default_currency() -> String {
    "USD".to_string()
}

/// On-disk wallet description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletFile {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub networks: Vec<NetworkInfo>,
    #[serde(default)]
    pub accounts: Vec<AccountInfo>,
    #[serde(default)]
    pub tokens: Vec<WalletToken>,
    #[serde(default)]
    pub prices: HashMap<String, String>,
    #[serde(default)]
    pub price_history: HashMap<String, Vec<PricePoint>>,
}

/// A token plus the balance and metadata the wallet reports for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletToken {
    #[serde(flatten)]
    pub token: Token,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<NftMetadata>,
}

pub struct MemoryWallet {
    networks: Mutex<Vec<NetworkInfo>>,
    accounts: Mutex<Vec<AccountInfo>>,
    tokens: Mutex<Vec<Token>>,
    balances: Mutex<HashMap<AssetKey, Decimal>>,
    prices: Mutex<HashMap<PriceKey, String>>,
    history: Mutex<HashMap<PriceKey, Vec<PricePoint>>>,
    metadata: Mutex<HashMap<TokenId, NftMetadata>>,
    currency: Mutex<String>,
    locked: Mutex<bool>,
    keyring_events: broadcast::Sender<KeyringEvent>,
    network_events: broadcast::Sender<NetworkEvent>,
    preference_events: broadcast::Sender<PreferenceEvent>,
}

impl MemoryWallet {
    pub fn new() -> Self {
        Self::from_file(WalletFile {
            currency: default_currency(),
            ..Default::default()
        })
    }

    pub fn from_file(file: WalletFile) -> Self {
        let mut tokens = Vec::with_capacity(file.tokens.len());
        let mut balances = HashMap::new();
        let mut metadata = HashMap::new();
        for entry in file.tokens {
            if let Some(balance) = entry.balance {
                balances.insert(entry.token.asset_key(), balance);
            }
            if let Some(meta) = entry.metadata {
                metadata.insert(entry.token.id(), meta);
            }
            tokens.push(entry.token);
        }

        let prices = file
            .prices
            .into_iter()
            .map(|(key, price)| (PriceKey::new(key), price))
            .collect();
        let history = file
            .price_history
            .into_iter()
            .map(|(key, points)| (PriceKey::new(key), points))
            .collect();

        let (keyring_events, _) = broadcast::channel(EVENT_CAPACITY);
        let (network_events, _) = broadcast::channel(EVENT_CAPACITY);
        let (preference_events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            networks: Mutex::new(file.networks),
            accounts: Mutex::new(file.accounts),
            tokens: Mutex::new(tokens),
            balances: Mutex::new(balances),
            prices: Mutex::new(prices),
            history: Mutex::new(history),
            metadata: Mutex::new(metadata),
            currency: Mutex::new(file.currency.trim().to_uppercase()),
            locked: Mutex::new(file.locked),
            keyring_events,
            network_events,
            preference_events,
        }
    }

    /// Load a wallet from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read wallet file: {}", path.display()))?;
        let file: WalletFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse wallet file: {}", path.display()))?;
        Ok(Self::from_file(file))
    }

    pub async fn add_network(&self, network: NetworkInfo) {
        self.networks.lock().await.push(network);
        let _ = self.network_events.send(NetworkEvent::NetworkListChanged);
    }

    pub async fn add_token(&self, token: Token) {
        self.tokens.lock().await.push(token);
    }

    pub async fn add_account(&self, account: AccountInfo) {
        let coin = account.coin;
        let address = account.address.clone();
        self.accounts.lock().await.push(account);
        let _ = self.keyring_events.send(KeyringEvent::AccountsAdded {
            coin,
            addresses: vec![address],
        });
        let _ = self.keyring_events.send(KeyringEvent::AccountsChanged);
    }

    pub async fn set_balance(&self, key: AssetKey, amount: Decimal) {
        self.balances.lock().await.insert(key, amount);
    }

    pub async fn set_price(&self, key: PriceKey, price: impl Into<String>) {
        self.prices.lock().await.insert(key, price.into());
    }

    pub async fn set_price_history(&self, key: PriceKey, points: Vec<PricePoint>) {
        self.history.lock().await.insert(key, points);
    }

    pub async fn set_metadata(&self, token: TokenId, metadata: NftMetadata) {
        self.metadata.lock().await.insert(token, metadata);
    }

    pub async fn lock(&self) {
        *self.locked.lock().await = true;
        let _ = self.keyring_events.send(KeyringEvent::Locked);
    }

    pub async fn unlock(&self) {
        *self.locked.lock().await = false;
        let _ = self.keyring_events.send(KeyringEvent::Unlocked);
    }

    pub fn select_chain(&self, chain_id: impl Into<String>, coin: CoinType) {
        let _ = self.network_events.send(NetworkEvent::ChainChanged {
            chain_id: chain_id.into(),
            coin,
        });
    }

    /// Publish an arbitrary keyring notification.
    pub fn emit_keyring(&self, event: KeyringEvent) {
        let _ = self.keyring_events.send(event);
    }

    pub fn emit_preference(&self, event: PreferenceEvent) {
        let _ = self.preference_events.send(event);
    }
}

impl Default for MemoryWallet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AccountDirectory for MemoryWallet {
    async fn list_accounts(&self, coin: CoinType) -> Result<Vec<AccountInfo>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts.iter().filter(|a| a.coin == coin).cloned().collect())
    }

    async fn is_locked(&self) -> Result<bool> {
        Ok(*self.locked.lock().await)
    }

    fn subscribe(&self) -> broadcast::Receiver<KeyringEvent> {
        self.keyring_events.subscribe()
    }
}

#[async_trait::async_trait]
impl NetworkDirectory for MemoryWallet {
    async fn list_networks(&self, coins: &[CoinType]) -> Result<Vec<NetworkInfo>> {
        let networks = self.networks.lock().await;
        Ok(networks
            .iter()
            .filter(|n| coins.contains(&n.coin))
            .cloned()
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<NetworkEvent> {
        self.network_events.subscribe()
    }
}

#[async_trait::async_trait]
impl AssetCatalog for MemoryWallet {
    async fn list_visible_assets(&self, networks: &[NetworkInfo]) -> Result<Vec<NetworkAssets>> {
        let tokens = self.tokens.lock().await;
        Ok(networks
            .iter()
            .map(|network| {
                let visible = tokens
                    .iter()
                    .filter(|t| t.visible && t.chain_id.eq_ignore_ascii_case(&network.chain_id))
                    .cloned()
                    .collect();
                NetworkAssets::new(network.clone(), visible)
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl BalanceProvider for MemoryWallet {
    async fn fetch_total_balance(
        &self,
        token: &Token,
        _network: &NetworkInfo,
        accounts: &[AccountInfo],
    ) -> Result<Decimal> {
        if accounts.is_empty() {
            return Ok(Decimal::ZERO);
        }
        let balances = self.balances.lock().await;
        Ok(balances
            .get(&token.asset_key())
            .copied()
            .unwrap_or(Decimal::ZERO))
    }
}

#[async_trait::async_trait]
impl PriceProvider for MemoryWallet {
    async fn fetch_prices(
        &self,
        keys: &[PriceKey],
        _currency: &str,
        _timeframe: Timeframe,
    ) -> Result<HashMap<PriceKey, String>> {
        let prices = self.prices.lock().await;
        Ok(keys
            .iter()
            .filter_map(|key| prices.get(key).map(|p| (key.clone(), p.clone())))
            .collect())
    }

    async fn fetch_price_history(
        &self,
        key: &PriceKey,
        _currency: &str,
        _timeframe: Timeframe,
    ) -> Result<Vec<PricePoint>> {
        let history = self.history.lock().await;
        history
            .get(key)
            .cloned()
            .with_context(|| format!("No price history for {key}"))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[async_trait::async_trait]
impl MetadataProvider for MemoryWallet {
    async fn fetch_metadata(&self, tokens: &[Token]) -> Result<HashMap<TokenId, NftMetadata>> {
        let metadata = self.metadata.lock().await;
        Ok(tokens
            .iter()
            .filter_map(|t| {
                let id = t.id();
                metadata.get(&id).map(|m| (id, m.clone()))
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl CurrencyPreference for MemoryWallet {
    async fn get(&self) -> Result<String> {
        Ok(self.currency.lock().await.clone())
    }

    async fn set(&self, code: &str) -> Result<()> {
        let code = code.trim().to_uppercase();
        {
            let mut currency = self.currency.lock().await;
            if *currency == code {
                return Ok(());
            }
            *currency = code.clone();
        }
        let _ = self
            .preference_events
            .send(PreferenceEvent::DefaultBaseCurrencyChanged { currency: code });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PreferenceEvent> {
        self.preference_events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const WALLET_JSON: &str = r#"{
        "currency": "eur",
        "networks": [
            {"chain_id": "0x1", "chain_name": "Ethereum Mainnet", "coin": "eth"},
            {"chain_id": "0x65", "chain_name": "Solana Mainnet", "coin": "sol", "decimals": 9}
        ],
        "accounts": [{"address": "0xabc", "name": "Account 1", "coin": "eth"}],
        "tokens": [
            {"name": "Ethereum", "symbol": "ETH", "decimals": 18, "chain_id": "0x1", "coin": "eth", "balance": "1.25"},
            {"name": "Hidden", "symbol": "HID", "contract_address": "0xdead", "chain_id": "0x1", "coin": "eth", "visible": false}
        ],
        "prices": {"ETH": "3000.10"}
    }"#;

    #[tokio::test]
    async fn loads_wallet_file_and_serves_collaborators() -> Result<()> {
        let file: WalletFile = serde_json::from_str(WALLET_JSON)?;
        let wallet = MemoryWallet::from_file(file);

        assert_eq!(CurrencyPreference::get(&wallet).await?, "EUR");

        let networks = wallet.list_networks(&[CoinType::Eth]).await?;
        assert_eq!(networks.len(), 1);

        let assets = wallet.list_visible_assets(&networks).await?;
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].tokens.len(), 1, "hidden token is not listed");

        let eth = &assets[0].tokens[0];
        let accounts = wallet.list_accounts(CoinType::Eth).await?;
        let balance = wallet.fetch_total_balance(eth, &networks[0], &accounts).await?;
        assert_eq!(balance, Decimal::from_str("1.25")?);

        let prices = wallet
            .fetch_prices(&[eth.price_key()], "EUR", Timeframe::OneDay)
            .await?;
        assert_eq!(prices.get(&PriceKey::new("eth")).map(String::as_str), Some("3000.10"));

        Ok(())
    }

    #[tokio::test]
    async fn missing_history_is_an_error() {
        let wallet = MemoryWallet::new();
        let result = wallet
            .fetch_price_history(&PriceKey::new("btc"), "USD", Timeframe::OneDay)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn setting_same_currency_emits_nothing() -> Result<()> {
        let wallet = MemoryWallet::new();
        let mut events = CurrencyPreference::subscribe(&wallet);

        wallet.set("usd").await?;
        assert!(events.try_recv().is_err());

        wallet.set("gbp").await?;
        assert_eq!(
            events.try_recv()?,
            PreferenceEvent::DefaultBaseCurrencyChanged {
                currency: "GBP".to_string()
            }
        );
        Ok(())
    }
}
