//! Adapters from wallet notifications to refresh triggers.

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::sources::{KeyringEvent, NetworkEvent, PortfolioSources, PreferenceEvent};

use super::{PortfolioStore, RefreshTrigger, TriggerSender};

/// A notification that may ask for a refresh.
pub trait IntoRefreshTrigger {
    /// `None` for purely informational notifications.
    fn refresh_trigger(&self) -> Option<RefreshTrigger>;

    fn kind(&self) -> &'static str;
}

impl IntoRefreshTrigger for KeyringEvent {
    fn refresh_trigger(&self) -> Option<RefreshTrigger> {
        match self {
            KeyringEvent::AccountsChanged => Some(RefreshTrigger::AccountsChanged),
            KeyringEvent::Unlocked => Some(RefreshTrigger::Unlocked),
            KeyringEvent::SelectedAccountChanged { coin } => {
                Some(RefreshTrigger::SelectedAccountChanged(*coin))
            }
            // Locking keeps the cache so data reappears on unlock.
            KeyringEvent::Locked
            | KeyringEvent::KeyringReset
            | KeyringEvent::BackedUp
            | KeyringEvent::KeyringCreated { .. }
            | KeyringEvent::KeyringRestored { .. }
            | KeyringEvent::AutoLockMinutesChanged
            | KeyringEvent::AccountsAdded { .. } => None,
        }
    }

    fn kind(&self) -> &'static str {
        "keyring"
    }
}

impl IntoRefreshTrigger for NetworkEvent {
    fn refresh_trigger(&self) -> Option<RefreshTrigger> {
        match self {
            NetworkEvent::ChainChanged { coin, .. } => {
                Some(RefreshTrigger::ActiveNetworkChanged(*coin))
            }
            NetworkEvent::NetworkListChanged => Some(RefreshTrigger::NetworksChanged),
            NetworkEvent::Eip1559Changed { .. } | NetworkEvent::AddChainRequestCompleted { .. } => {
                None
            }
        }
    }

    fn kind(&self) -> &'static str {
        "network"
    }
}

impl IntoRefreshTrigger for PreferenceEvent {
    fn refresh_trigger(&self) -> Option<RefreshTrigger> {
        match self {
            PreferenceEvent::DefaultBaseCurrencyChanged { currency } => {
                Some(RefreshTrigger::CurrencyChanged(currency.clone()))
            }
            PreferenceEvent::DefaultBaseCryptocurrencyChanged { .. }
            | PreferenceEvent::DefaultWalletChanged
            | PreferenceEvent::ActiveOriginChanged { .. }
            | PreferenceEvent::DiscoverAssetsCompleted { .. } => None,
        }
    }

    fn kind(&self) -> &'static str {
        "preference"
    }
}

/// Forwards notifications from broadcast subscriptions into a store.
pub struct ChangeObserverBridge {
    triggers: TriggerSender,
}

impl ChangeObserverBridge {
    pub fn new(store: &PortfolioStore) -> Self {
        Self {
            triggers: store.trigger_sender(),
        }
    }

    /// Subscribe to the keyring, network and preference notifications of
    /// `sources`.
    pub fn attach_sources(&self, sources: &PortfolioSources) -> Vec<JoinHandle<()>> {
        vec![
            self.attach(sources.accounts.subscribe()),
            self.attach(sources.networks.subscribe()),
            self.attach(sources.currency.subscribe()),
        ]
    }

    /// Spawn a task forwarding `events`. The task ends when the
    /// subscription closes or the store shuts down.
    pub fn attach<E>(&self, events: broadcast::Receiver<E>) -> JoinHandle<()>
    where
        E: IntoRefreshTrigger + Clone + Send + 'static,
    {
        tokio::spawn(forward(events, self.triggers.clone()))
    }
}

async fn forward<E>(mut events: broadcast::Receiver<E>, triggers: TriggerSender)
where
    E: IntoRefreshTrigger + Clone + Send + 'static,
{
    loop {
        let received = tokio::select! {
            received = events.recv() => received,
            _ = triggers.closed() => return,
        };

        let trigger = match received {
            Ok(event) => match event.refresh_trigger() {
                Some(trigger) => trigger,
                None => continue,
            },
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "Missed wallet notifications; refreshing");
                RefreshTrigger::Manual
            }
            Err(RecvError::Closed) => {
                debug!("Wallet notification channel closed");
                return;
            }
        };

        debug!(trigger = trigger.as_str(), "Wallet notification triggers refresh");
        if triggers.send(trigger).is_err() {
            return;
        }
    }
}
