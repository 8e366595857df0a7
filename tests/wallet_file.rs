mod support;

use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;
use walletfolio::models::TokenId;
use walletfolio::portfolio::{NetworkFilter, PortfolioStore};
use walletfolio::sources::{MemoryWallet, PortfolioSources};

use support::*;

const DEMO_WALLET: &str = include_str!("../demos/wallet.json");

fn load_demo_wallet() -> Result<(TempDir, Arc<MemoryWallet>)> {
    let dir = TempDir::new()?;
    let path = dir.path().join("wallet.json");
    std::fs::write(&path, DEMO_WALLET)?;
    let wallet = MemoryWallet::load(&path)?;
    Ok((dir, Arc::new(wallet)))
}

#[tokio::test]
async fn demo_wallet_snapshot_across_mainnets() -> Result<()> {
    let (_dir, wallet) = load_demo_wallet()?;
    let store = PortfolioStore::spawn(PortfolioSources::from_wallet(wallet), options());

    let snapshot = store.refresh_and_wait().await?;

    // Sepolia is a test network and stays out of "all networks".
    assert_eq!(snapshot.assets.len(), 2);
    assert!(snapshot.assets.iter().all(|row| row.network.chain_id != "0xaa36a7"));
    assert_eq!(snapshot.balance, "$3,100.00");

    // Only ETH has a history, so the series follows it alone.
    let values: Vec<_> = snapshot
        .historical_balances
        .iter()
        .map(|point| point.value)
        .collect();
    assert_eq!(values, vec![dec("2800"), dec("3000")]);

    assert_eq!(snapshot.nfts.len(), 1);
    let punk = snapshot
        .nft(&TokenId::from("0xb47e3cd837ddf8e4c57f05d70ab865de6e193bbb#7804"))
        .expect("punk row");
    assert_eq!(punk.balance, 1);
    assert_eq!(
        punk.metadata.as_ref().and_then(|m| m.name.as_deref()),
        Some("CryptoPunk #7804")
    );
    Ok(())
}

#[tokio::test]
async fn demo_wallet_single_test_network() -> Result<()> {
    let (_dir, wallet) = load_demo_wallet()?;
    let store = PortfolioStore::spawn(
        PortfolioSources::from_wallet(wallet),
        options().with_network_filter(NetworkFilter::network(sepolia())),
    );

    let snapshot = store.refresh_and_wait().await?;

    // Explicitly selected test networks are shown; the unpriced asset counts as zero.
    assert_eq!(snapshot.assets.len(), 1);
    assert_eq!(snapshot.assets[0].decimal_balance, dec("50"));
    assert_eq!(snapshot.balance, "$0.00");
    assert!(snapshot.nfts.is_empty());
    Ok(())
}

#[test]
fn malformed_wallet_file_is_reported() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("wallet.json");
    std::fs::write(&path, "{ not json")?;

    let err = match MemoryWallet::load(&path) {
        Ok(_) => anyhow::bail!("malformed wallet file loaded"),
        Err(err) => err,
    };
    assert!(err.to_string().contains("Failed to parse wallet file"));
    Ok(())
}
