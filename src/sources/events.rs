use serde::{Deserialize, Serialize};

use crate::models::{CoinType, Token};

/// Notifications from the keyring / account subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyringEvent {
    KeyringReset,
    AccountsChanged,
    BackedUp,
    KeyringCreated { keyring_id: String },
    KeyringRestored { keyring_id: String },
    Locked,
    Unlocked,
    AutoLockMinutesChanged,
    SelectedAccountChanged { coin: CoinType },
    AccountsAdded { coin: CoinType, addresses: Vec<String> },
}

/// Notifications from the network / RPC subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NetworkEvent {
    /// The active network for `coin` changed.
    ChainChanged { chain_id: String, coin: CoinType },
    NetworkListChanged,
    Eip1559Changed { chain_id: String, is_eip1559: bool },
    AddChainRequestCompleted { chain_id: String, error: String },
}

/// Notifications from the wallet preferences service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreferenceEvent {
    DefaultBaseCurrencyChanged { currency: String },
    DefaultBaseCryptocurrencyChanged { cryptocurrency: String },
    DefaultWalletChanged,
    ActiveOriginChanged { origin: String },
    DiscoverAssetsCompleted { tokens: Vec<Token> },
}
