/// Failures parsing user-facing identifiers.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown timeframe {0:?}: expected one of live, 1d, 1w, 1m, 3m, 1y, all")]
    Timeframe(String),
    #[error("Unknown coin type {0:?}: expected one of eth, sol, fil, btc")]
    CoinType(String),
}

/// Control-flow outcomes of the refresh machinery that are not fetch errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RefreshError {
    /// A newer cycle replaced this one; its remaining results are discarded.
    #[error("refresh cycle {generation} was superseded")]
    Superseded { generation: u64 },
    /// The work was abandoned because its cancellation token fired.
    #[error("fetch cancelled")]
    Cancelled,
    /// The coordinator has shut down and no longer accepts requests.
    #[error("portfolio coordinator has shut down")]
    Closed,
}
