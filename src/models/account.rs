use serde::{Deserialize, Serialize};

use super::CoinType;

/// A wallet account whose balances are summed into the portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountInfo {
    pub address: String,
    #[serde(default)]
    pub name: String,
    pub coin: CoinType,
}

impl AccountInfo {
    pub fn new(address: impl Into<String>, name: impl Into<String>, coin: CoinType) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            coin,
        }
    }
}
