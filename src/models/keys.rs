use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a token independent of the network it is viewed on.
///
/// Contract tokens are identified by their lowercase contract address (plus
/// the NFT serial, when present); native assets have no contract and fall
/// back to their lowercase symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    pub fn new(contract_address: &str, symbol: &str, token_id: Option<&str>) -> Self {
        let contract = normalize_lower(contract_address);
        let base = if contract.is_empty() {
            normalize_lower(symbol)
        } else {
            contract
        };
        match token_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(serial) => Self(format!("{base}#{}", serial.to_lowercase())),
            None => Self(base),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TokenId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TokenId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Balance cache key: one token on one network.
///
/// Kept as a structured pair rather than a concatenated string so that two
/// distinct (token, network) pairs can never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetKey {
    pub token: TokenId,
    pub chain_id: String,
}

impl AssetKey {
    pub fn new(token: TokenId, chain_id: impl Into<String>) -> Self {
        Self {
            token,
            chain_id: chain_id.into().trim().to_lowercase(),
        }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.token, self.chain_id)
    }
}

/// Fiat pricing identity. Several [`AssetKey`]s (the same asset bridged to
/// different networks) may share one price key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceKey(String);

impl PriceKey {
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(normalize_lower(value.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PriceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for PriceKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for PriceKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

fn normalize_lower(value: &str) -> String {
    value.trim().to_lowercase()
}
