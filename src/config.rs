use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::duration::{deserialize_duration, serialize_duration};
use crate::models::{CoinType, Timeframe};

/// Default fiat currency used until the currency preference answers.
fn default_currency() -> String {
    "USD".to_string()
}

/// Display/output formatting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Decimal places fiat values are rounded to.
    pub currency_decimals: u32,

    /// Render fiat values with thousands separators.
    pub currency_grouping: bool,

    /// Symbol to use instead of the one derived from the currency code.
    pub currency_symbol: Option<String>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            currency_decimals: 2,
            currency_grouping: true,
            currency_symbol: None,
        }
    }
}

fn default_test_chain_ids() -> Vec<String> {
    [
        "0x5",      // Goerli
        "0xaa36a7", // Sepolia
        "0x539",    // Localhost
        "0x66",     // Solana testnet
        "0x67",     // Solana devnet
        "t",        // Filecoin testnet
    ]
    .iter()
    .map(|id| id.to_string())
    .collect()
}

/// Which networks the "all networks" filter covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworksConfig {
    /// Coin families whose networks and accounts are included.
    pub coins: Vec<CoinType>,

    /// Chain ids excluded from the "all networks" view.
    pub test_chain_ids: Vec<String>,
}

impl Default for NetworksConfig {
    fn default() -> Self {
        Self {
            coins: vec![CoinType::Eth, CoinType::Sol, CoinType::Fil],
            test_chain_ids: default_test_chain_ids(),
        }
    }
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(15)
}

/// Fan-out behaviour of a refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum number of fetches in flight at once within a stage.
    pub concurrency: usize,

    /// Per-fetch timeout. A fetch that times out counts as failed.
    #[serde(
        default = "default_fetch_timeout",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub timeout: Duration,

    /// Start a refresh as soon as the coordinator starts (when unlocked).
    pub initial_refresh: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            timeout: default_fetch_timeout(),
            initial_refresh: true,
        }
    }
}

/// CoinGecko provider settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoinGeckoConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fiat currency used until the currency preference is known (e.g. "USD").
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Initial price timeframe.
    pub timeframe: Timeframe,

    #[serde(default)]
    pub networks: NetworksConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub coingecko: CoinGeckoConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            timeframe: Timeframe::default(),
            networks: NetworksConfig::default(),
            fetch: FetchConfig::default(),
            display: DisplayConfig::default(),
            coingecko: CoinGeckoConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./walletfolio.toml` if it exists in current directory
/// 2. `~/.local/share/walletfolio/walletfolio.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("walletfolio.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("walletfolio").join("walletfolio.toml");
    }

    local_config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_load_empty_config_uses_defaults() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("walletfolio.toml");
        std::fs::File::create(&config_path)?;

        let config = Config::load(&config_path)?;
        assert_eq!(config, Config::default());
        assert_eq!(config.currency, "USD");
        assert_eq!(config.timeframe, Timeframe::OneDay);
        assert_eq!(config.fetch.concurrency, 8);
        assert_eq!(config.fetch.timeout, Duration::from_secs(15));
        assert!(config.fetch.initial_refresh);

        Ok(())
    }

    #[test]
    fn test_load_fetch_config() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("walletfolio.toml");

        let mut file = std::fs::File::create(&config_path)?;
        writeln!(file, "[fetch]")?;
        writeln!(file, "concurrency = 2")?;
        writeln!(file, "timeout = \"500ms\"")?;
        writeln!(file, "initial_refresh = false")?;

        let config = Config::load(&config_path)?;
        assert_eq!(config.fetch.concurrency, 2);
        assert_eq!(config.fetch.timeout, Duration::from_millis(500));
        assert!(!config.fetch.initial_refresh);

        Ok(())
    }

    #[test]
    fn test_load_networks_and_timeframe() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("walletfolio.toml");

        let mut file = std::fs::File::create(&config_path)?;
        writeln!(file, "currency = \"EUR\"")?;
        writeln!(file, "timeframe = \"1w\"")?;
        writeln!(file, "[networks]")?;
        writeln!(file, "coins = [\"eth\"]")?;
        writeln!(file, "test_chain_ids = [\"0x5\"]")?;

        let config = Config::load(&config_path)?;
        assert_eq!(config.currency, "EUR");
        assert_eq!(config.timeframe, Timeframe::OneWeek);
        assert_eq!(config.networks.coins, vec![CoinType::Eth]);
        assert_eq!(config.networks.test_chain_ids, vec!["0x5".to_string()]);

        Ok(())
    }

    #[test]
    fn test_invalid_timeframe_is_rejected() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("walletfolio.toml");

        let mut file = std::fs::File::create(&config_path)?;
        writeln!(file, "timeframe = \"2d\"")?;

        assert!(Config::load(&config_path).is_err());
        Ok(())
    }

    #[test]
    fn test_load_display_config() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("walletfolio.toml");

        let mut file = std::fs::File::create(&config_path)?;
        writeln!(file, "[display]")?;
        writeln!(file, "currency_decimals = 4")?;
        writeln!(file, "currency_grouping = false")?;
        writeln!(file, "currency_symbol = \"US$\"")?;

        let config = Config::load(&config_path)?;
        assert_eq!(config.display.currency_decimals, 4);
        assert!(!config.display.currency_grouping);
        assert_eq!(config.display.currency_symbol.as_deref(), Some("US$"));

        Ok(())
    }

    #[test]
    fn test_config_load_or_default_missing_file() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("missing.toml");

        let config = Config::load_or_default(&config_path)?;
        assert_eq!(config, Config::default());

        Ok(())
    }

    #[test]
    fn test_default_config_serializes_to_toml() -> Result<()> {
        let rendered = toml::to_string(&Config::default())?;
        assert!(rendered.contains("timeout = \"15s\""));
        assert!(rendered.contains("timeframe = \"1d\""));

        let reparsed: Config = toml::from_str(&rendered)?;
        assert_eq!(reparsed, Config::default());
        Ok(())
    }
}
