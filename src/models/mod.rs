mod account;
mod keys;
mod metadata;
mod network;
mod price;
mod timeframe;
mod token;

use serde::{Deserialize, Serialize};

pub use account::AccountInfo;
pub use keys::{AssetKey, PriceKey, TokenId};
pub use metadata::NftMetadata;
pub use network::{CoinType, NetworkInfo};
pub use price::PricePoint;
pub use timeframe::Timeframe;
pub use token::Token;

/// Visible tokens of one network, as grouped by the asset catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAssets {
    pub network: NetworkInfo,
    pub tokens: Vec<Token>,
}

impl NetworkAssets {
    pub fn new(network: NetworkInfo, tokens: Vec<Token>) -> Self {
        Self { network, tokens }
    }
}
