use serde::{Deserialize, Serialize};

use super::{AssetKey, CoinType, NetworkInfo, PriceKey, TokenId};

/// A token as listed by the asset catalog for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Empty for the network's native asset.
    #[serde(default)]
    pub contract_address: String,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub decimals: u32,
    #[serde(default)]
    pub is_erc721: bool,
    #[serde(default)]
    pub is_nft: bool,
    /// Serial of a non-fungible token within its collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub coingecko_id: String,
    pub chain_id: String,
    pub coin: CoinType,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl Token {
    /// Native asset of `network`.
    pub fn native(network: &NetworkInfo, symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            contract_address: String::new(),
            name: name.into(),
            symbol: symbol.into(),
            decimals: network.decimals,
            is_erc721: false,
            is_nft: false,
            token_id: None,
            coingecko_id: String::new(),
            chain_id: network.chain_id.clone(),
            coin: network.coin,
            visible: true,
        }
    }

    /// Contract token deployed on `network`.
    pub fn contract(
        network: &NetworkInfo,
        contract_address: impl Into<String>,
        symbol: impl Into<String>,
        decimals: u32,
    ) -> Self {
        let symbol = symbol.into();
        Self {
            contract_address: contract_address.into(),
            name: symbol.clone(),
            symbol,
            decimals,
            is_erc721: false,
            is_nft: false,
            token_id: None,
            coingecko_id: String::new(),
            chain_id: network.chain_id.clone(),
            coin: network.coin,
            visible: true,
        }
    }

    pub fn with_coingecko_id(mut self, id: impl Into<String>) -> Self {
        self.coingecko_id = id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn as_erc721(mut self, token_id: impl Into<String>) -> Self {
        self.is_erc721 = true;
        self.decimals = 0;
        self.token_id = Some(token_id.into());
        self
    }

    pub fn as_nft(mut self) -> Self {
        self.is_nft = true;
        self.decimals = 0;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn is_native(&self) -> bool {
        self.contract_address.trim().is_empty()
    }

    /// Whether the token is displayed as an NFT instead of a fungible balance.
    pub fn is_non_fungible(&self) -> bool {
        self.is_erc721 || self.is_nft
    }

    pub fn id(&self) -> TokenId {
        TokenId::new(&self.contract_address, &self.symbol, self.token_id.as_deref())
    }

    pub fn asset_key(&self) -> AssetKey {
        AssetKey::new(self.id(), &self.chain_id)
    }

    /// The coingecko id when known, otherwise the symbol of a native asset or
    /// the contract address of a contract token.
    pub fn price_key(&self) -> PriceKey {
        if !self.coingecko_id.trim().is_empty() {
            PriceKey::new(&self.coingecko_id)
        } else if self.is_native() {
            PriceKey::new(&self.symbol)
        } else {
            PriceKey::new(&self.contract_address)
        }
    }
}
