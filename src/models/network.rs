use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Coin family a network and its accounts belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoinType {
    Eth,
    Sol,
    Fil,
    Btc,
}

impl CoinType {
    pub const ALL: [CoinType; 4] = [CoinType::Eth, CoinType::Sol, CoinType::Fil, CoinType::Btc];

    pub fn as_str(&self) -> &'static str {
        match self {
            CoinType::Eth => "eth",
            CoinType::Sol => "sol",
            CoinType::Fil => "fil",
            CoinType::Btc => "btc",
        }
    }

    /// UTXO-model chains track unspent outputs instead of account balances.
    pub fn is_utxo(&self) -> bool {
        matches!(self, CoinType::Btc)
    }
}

impl fmt::Display for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoinType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "eth" => Ok(CoinType::Eth),
            "sol" => Ok(CoinType::Sol),
            "fil" => Ok(CoinType::Fil),
            "btc" => Ok(CoinType::Btc),
            _ => Err(ParseError::CoinType(s.to_string())),
        }
    }
}

/// A chain the wallet knows about. Supplied by the network directory and
/// treated as immutable for the duration of a refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub chain_id: String,
    pub chain_name: String,
    pub coin: CoinType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u32,
}

fn default_decimals() -> u32 {
    18
}

impl NetworkInfo {
    pub fn new(chain_id: impl Into<String>, chain_name: impl Into<String>, coin: CoinType) -> Self {
        Self {
            chain_id: chain_id.into(),
            chain_name: chain_name.into(),
            coin,
            symbol: String::new(),
            decimals: default_decimals(),
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coin_type_round_trips_through_str() {
        for coin in CoinType::ALL {
            assert_eq!(coin.as_str().parse::<CoinType>().unwrap(), coin);
        }
        assert_eq!(" ETH ".parse::<CoinType>().unwrap(), CoinType::Eth);
        assert!("doge".parse::<CoinType>().is_err());
    }

    #[test]
    fn network_info_deserializes_with_defaults() {
        let json = r#"{"chain_id":"0x1","chain_name":"Ethereum Mainnet","coin":"eth"}"#;
        let network: NetworkInfo = serde_json::from_str(json).unwrap();
        assert_eq!(network.coin, CoinType::Eth);
        assert_eq!(network.decimals, 18);
        assert!(network.symbol.is_empty());
    }
}
