mod support;

use anyhow::Result;
use walletfolio::models::{NftMetadata, Token, TokenId};
use walletfolio::portfolio::PortfolioStore;
use walletfolio::sources::PortfolioSources;

use support::*;

#[tokio::test]
async fn patch_replaces_one_row_in_place() -> Result<()> {
    let wallet = wallet_with_networks(&[ethereum()]).await;
    let punks: Vec<Token> = ["1", "2", "3"]
        .iter()
        .map(|serial| Token::contract(&ethereum(), "0xb47e", "PUNK", 0).as_erc721(*serial))
        .collect();
    for punk in &punks {
        add_holding(&wallet, punk, "1").await;
    }
    wallet
        .set_metadata(punks[0].id(), NftMetadata::named("Punk #1"))
        .await;

    let store = PortfolioStore::spawn(PortfolioSources::from_wallet(wallet), options());
    let before = store.refresh_and_wait().await?;
    assert_eq!(before.nfts.len(), 3);
    assert!(before.nfts[1].metadata.is_none());

    let patched = NftMetadata::named("Punk #2").with_image_url("ipfs://punk-2.png");
    store.patch_nft_metadata(punks[1].id(), patched.clone())?;
    let after = wait_for_snapshot(&store, |s| s.nfts[1].metadata.is_some()).await?;

    let order: Vec<TokenId> = after.nfts.iter().map(|row| row.token_id()).collect();
    assert_eq!(order, punks.iter().map(Token::id).collect::<Vec<_>>());
    assert_eq!(after.nfts[1].metadata, Some(patched.clone()));
    assert_eq!(after.nfts[0], before.nfts[0]);
    assert_eq!(after.nfts[2], before.nfts[2]);
    assert_eq!(after.assets, before.assets);

    // The provider knows nothing about #2, so the patched value survives a refresh.
    let refreshed = store.refresh_and_wait().await?;
    assert_eq!(refreshed.nfts[1].metadata, Some(patched));
    Ok(())
}

#[tokio::test]
async fn patch_for_unknown_token_changes_nothing() -> Result<()> {
    let wallet = wallet_with_networks(&[ethereum()]).await;
    let punk = Token::contract(&ethereum(), "0xb47e", "PUNK", 0).as_erc721("9");
    add_holding(&wallet, &punk, "1").await;

    let store = PortfolioStore::spawn(PortfolioSources::from_wallet(wallet), options());
    let before = store.refresh_and_wait().await?;

    store.patch_nft_metadata(TokenId::from("0xdead#1"), NftMetadata::named("Nobody"))?;
    // Round-trip through the actor so the patch has been handled.
    let after = store.refresh_and_wait().await?;

    assert_eq!(after.nfts, before.nfts);
    Ok(())
}
