use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use anyhow::anyhow;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::config::FetchConfig;
use crate::duration::format_duration;
use crate::error::RefreshError;

/// Outcome of one fan-out: successful values by key, plus the keys that
/// failed with their error message. Failed keys have no entry in `values`.
#[derive(Debug)]
pub struct FanOut<K, V> {
    pub values: HashMap<K, V>,
    pub failed: Vec<(K, String)>,
}

impl<K, V> Default for FanOut<K, V> {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
            failed: Vec::new(),
        }
    }
}

/// Runs independent fetch units concurrently, best effort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutFetcher {
    concurrency: usize,
    unit_timeout: Option<Duration>,
}

impl Default for FanOutFetcher {
    fn default() -> Self {
        Self {
            concurrency: 8,
            unit_timeout: None,
        }
    }
}

impl FanOutFetcher {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            unit_timeout: None,
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(config.concurrency).with_timeout(config.timeout)
    }

    /// A zero timeout disables the limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.unit_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetch every unit once per unique key.
    ///
    /// Units whose key was already seen are dropped before anything is
    /// issued. At most `concurrency` fetches are in flight. Returns
    /// `Err(RefreshError::Cancelled)` as soon as `cancel` fires; fetches
    /// still in flight are dropped and nothing is returned for them.
    pub async fn fetch_all<U, K, V, KF, F, Fut>(
        &self,
        units: impl IntoIterator<Item = U>,
        key_of: KF,
        fetch: F,
        cancel: &CancellationToken,
    ) -> Result<FanOut<K, V>, RefreshError>
    where
        K: Eq + Hash + Clone,
        KF: Fn(&U) -> K,
        F: Fn(U) -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        let mut seen = HashSet::new();
        let unique: Vec<(K, U)> = units
            .into_iter()
            .filter_map(|unit| {
                let key = key_of(&unit);
                seen.insert(key.clone()).then_some((key, unit))
            })
            .collect();

        let mut out = FanOut::default();
        if unique.is_empty() {
            return Ok(out);
        }

        let timeout = self.unit_timeout;
        let mut pending = stream::iter(unique.into_iter().map(|(key, unit)| {
            let fut = fetch(unit);
            async move { (key, with_timeout(timeout, fut).await) }
        }))
        .buffer_unordered(self.concurrency);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RefreshError::Cancelled),
                next = pending.next() => match next {
                    Some((key, Ok(value))) => {
                        out.values.insert(key, value);
                    }
                    Some((key, Err(err))) => out.failed.push((key, format!("{err:#}"))),
                    None => break,
                },
            }
        }

        Ok(out)
    }

    /// Run a single (typically batched) fetch under the same timeout and
    /// cancellation rules as a fan-out unit.
    pub async fn fetch_one<V, Fut>(
        &self,
        fetch: Fut,
        cancel: &CancellationToken,
    ) -> Result<anyhow::Result<V>, RefreshError>
    where
        Fut: Future<Output = anyhow::Result<V>>,
    {
        until_cancelled(cancel, with_timeout(self.unit_timeout, fetch)).await
    }
}

/// Await `fut` unless `cancel` fires first.
pub async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, RefreshError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RefreshError::Cancelled),
        out = fut => Ok(out),
    }
}

async fn with_timeout<V>(
    timeout: Option<Duration>,
    fut: impl Future<Output = anyhow::Result<V>>,
) -> anyhow::Result<V> {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!("timed out after {}", format_duration(limit))),
        },
        None => fut.await,
    }
}
