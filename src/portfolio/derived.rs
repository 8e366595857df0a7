//! Pure functions turning cached values into the displayed portfolio.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::warn;

use crate::cache::PortfolioCache;
use crate::format::FiatFormatter;
use crate::models::{NetworkAssets, NftMetadata, Timeframe, TokenId};

use super::{AssetRow, BalancePoint, NetworkFilter, NftRow, PortfolioSnapshot};

/// Parse a provider price string. Unparseable (including empty) prices are
/// `None` and contribute nothing to totals.
pub fn parse_price(price: &str) -> Option<Decimal> {
    let price = price.trim();
    if price.is_empty() {
        return None;
    }
    Decimal::from_str(price)
        .or_else(|_| Decimal::from_scientific(price))
        .ok()
}

/// Split the enumerated tokens into fungible and NFT rows, filling each row
/// from whatever the cache currently holds.
pub fn build_rows(assets: &[NetworkAssets], cache: &PortfolioCache) -> (Vec<AssetRow>, Vec<NftRow>) {
    let mut rows = Vec::new();
    let mut nfts = Vec::new();

    for group in assets {
        for token in &group.tokens {
            let balance = cache.balance(&token.asset_key());
            if token.is_non_fungible() {
                nfts.push(NftRow {
                    token: token.clone(),
                    network: group.network.clone(),
                    balance: balance.trunc().to_u64().unwrap_or(0),
                    metadata: cache.metadata.get(&token.id()).cloned(),
                });
            } else {
                let price_key = token.price_key();
                rows.push(AssetRow {
                    token: token.clone(),
                    network: group.network.clone(),
                    decimal_balance: balance,
                    price: cache.prices.get(&price_key).cloned().unwrap_or_default(),
                    history: cache.history.get(&price_key).cloned().unwrap_or_default(),
                });
            }
        }
    }

    (rows, nfts)
}

/// Add `balance × price` to `total`. A product or sum outside the decimal
/// range contributes nothing, like an unparseable price.
fn add_value(total: Decimal, row: &AssetRow, price: Decimal) -> Decimal {
    match row
        .decimal_balance
        .checked_mul(price)
        .and_then(|value| total.checked_add(value))
    {
        Some(sum) => sum,
        None => {
            warn!(
                asset = %row.key(),
                balance = %row.decimal_balance,
                price = %price,
                "Fiat value out of range; counting it as zero"
            );
            total
        }
    }
}

/// Sum of balance × price over the fungible rows. Rows whose price does not
/// parse, or whose value overflows, are skipped.
pub fn fiat_balance(rows: &[AssetRow]) -> Decimal {
    rows.iter().fold(Decimal::ZERO, |total, row| {
        match parse_price(&row.price) {
            Some(price) => add_value(total, row, price),
            None => total,
        }
    })
}

/// Portfolio value over time, weighting each row's price history by its
/// current balance.
///
/// Only rows with a non-empty history take part. The shortest history sets
/// the length of the series; longer histories are not truncated from the
/// front, so point `i` of every row is combined. Each point is stamped with
/// the latest of the combined timestamps.
pub fn historical_balances(rows: &[AssetRow], formatter: &FiatFormatter) -> Vec<BalancePoint> {
    let included: Vec<&AssetRow> = rows.iter().filter(|row| !row.history.is_empty()).collect();
    let Some(len) = included.iter().map(|row| row.history.len()).min() else {
        return Vec::new();
    };

    (0..len)
        .filter_map(|index| {
            let timestamp = included
                .iter()
                .map(|row| row.history[index].timestamp)
                .max()?;
            let value = included.iter().fold(Decimal::ZERO, |total, row| {
                match parse_price(&row.history[index].price) {
                    Some(price) => add_value(total, row, price),
                    None => total,
                }
            });
            Some(BalancePoint {
                timestamp,
                value,
                formatted: formatter.format(value),
            })
        })
        .collect()
}

/// Replace the metadata of one NFT row in place, keeping its position.
/// Returns whether a row for `token_id` was found.
pub fn patch_nft_metadata(nfts: &mut [NftRow], token_id: &TokenId, metadata: NftMetadata) -> bool {
    match nfts.iter_mut().find(|row| &row.token_id() == token_id) {
        Some(row) => {
            row.metadata = Some(metadata);
            true
        }
        None => false,
    }
}

/// Recompute the complete snapshot from the enumerated assets and the cache.
pub fn compute_snapshot(
    assets: &[NetworkAssets],
    cache: &PortfolioCache,
    formatter: &FiatFormatter,
    timeframe: Timeframe,
    network_filter: &NetworkFilter,
    is_loading: bool,
) -> PortfolioSnapshot {
    let (rows, nfts) = build_rows(assets, cache);
    let total_value = fiat_balance(&rows);
    let historical_balances = historical_balances(&rows, formatter);

    PortfolioSnapshot {
        balance: formatter.format(total_value),
        total_value,
        assets: rows,
        nfts,
        historical_balances,
        is_loading,
        currency_code: formatter.currency_code().to_string(),
        timeframe,
        network_filter: network_filter.clone(),
    }
}
