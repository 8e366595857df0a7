use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use walletfolio::config::{default_config_path, Config};
use walletfolio::models::{CoinType, Timeframe};
use walletfolio::portfolio::{NetworkFilter, PortfolioStore, RefreshOptions};
use walletfolio::sources::{
    CoinGeckoPriceProvider, CurrencyPreference, MemoryWallet, NetworkDirectory, PortfolioSources,
};

#[derive(Parser)]
#[command(name = "walletfolio")]
#[command(about = "Multi-chain wallet portfolio snapshots")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show current configuration
    Config,

    /// Refresh a wallet once and print the portfolio snapshot as JSON
    Snapshot {
        /// Wallet description (JSON)
        #[arg(long)]
        wallet: PathBuf,

        /// Only include the network with this chain id
        #[arg(long)]
        network: Option<String>,

        /// Price timeframe (live, 1d, 1w, 1m, 3m, 1y, all)
        #[arg(long)]
        timeframe: Option<Timeframe>,

        /// Fiat currency code, overriding the wallet's preference
        #[arg(long)]
        currency: Option<String>,

        /// Fetch prices from CoinGecko instead of the wallet file
        #[arg(long)]
        online: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .json(),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config: {}", config_path.display()))?;

    match cli.command {
        Some(Command::Config) => {
            println!("Config file: {}", config_path.display());
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Some(Command::Snapshot {
            wallet,
            network,
            timeframe,
            currency,
            online,
        }) => {
            let snapshot = run_snapshot(
                &config,
                SnapshotArgs {
                    wallet,
                    network,
                    timeframe,
                    currency,
                    online,
                },
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        None => {
            println!("walletfolio - wallet portfolio snapshots");
            println!("========================================\n");
            println!("Config: {}\n", config_path.display());
            println!("Commands:");
            println!("  config      Show current configuration");
            println!("  snapshot    Refresh a wallet and print its portfolio\n");
            println!("Run 'walletfolio --help' for more options.");
        }
    }

    Ok(())
}

struct SnapshotArgs {
    wallet: PathBuf,
    network: Option<String>,
    timeframe: Option<Timeframe>,
    currency: Option<String>,
    online: bool,
}

async fn run_snapshot(
    config: &Config,
    args: SnapshotArgs,
) -> Result<walletfolio::portfolio::PortfolioSnapshot> {
    let wallet = Arc::new(MemoryWallet::load(&args.wallet)?);
    if let Some(code) = &args.currency {
        CurrencyPreference::set(wallet.as_ref(), code).await?;
    }

    let mut sources = PortfolioSources::from_wallet(wallet.clone());
    if args.online {
        let mut provider = CoinGeckoPriceProvider::new();
        if let Some(base_url) = &config.coingecko.base_url {
            provider = provider.with_base_url(base_url);
        }
        if let Some(api_key) = &config.coingecko.api_key {
            provider = provider.with_api_key(api_key);
        }
        sources = sources.with_prices(Arc::new(provider));
    }

    let mut options = RefreshOptions::from_config(config).with_initial_refresh(false);
    if let Some(timeframe) = args.timeframe {
        options = options.with_timeframe(timeframe);
    }
    if let Some(chain_id) = &args.network {
        let networks = NetworkDirectory::list_networks(wallet.as_ref(), &CoinType::ALL).await?;
        let network = networks
            .into_iter()
            .find(|n| n.chain_id.eq_ignore_ascii_case(chain_id))
            .with_context(|| format!("Unknown network {chain_id:?} in wallet file"))?;
        options = options.with_network_filter(NetworkFilter::network(network));
    }

    let store = PortfolioStore::spawn(sources, options);
    let snapshot = store.refresh_and_wait().await?;
    info!(
        balance = %snapshot.balance,
        assets = snapshot.assets.len(),
        nfts = snapshot.nfts.len(),
        "Portfolio snapshot ready"
    );
    store.shutdown();

    Ok(snapshot)
}
