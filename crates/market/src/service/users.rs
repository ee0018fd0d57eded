use std::sync::Arc;

use log::{error, info};
use model::{address::Address, errors::MarketError, user::UserState};
use parking_lot::Mutex;
use storage::UserStateStore;
use tokio::sync::Mutex as AsyncMutex;

/// Local state of the connected identity.
///
/// Mutations happen in memory first; the store is a write-behind cache and a
/// failed write is logged, never surfaced. Writes reach the store in the
/// order the mutations were applied.
#[derive(Clone)]
pub struct Users {
    store: Arc<dyn UserStateStore>,
    current: Arc<Mutex<Option<UserState>>>,
    saving: Arc<AsyncMutex<()>>,
}

impl Users {
    pub(crate) fn new(store: Arc<dyn UserStateStore>) -> Self {
        Users {
            store,
            current: Arc::new(Mutex::new(None)),
            saving: Arc::new(AsyncMutex::new(())),
        }
    }

    pub async fn connect(&self, address: Address) -> Result<UserState, MarketError> {
        let state = match self.store.load(address).await? {
            Some(state) => state,
            None => {
                info!("New identity {}", address);
                let state = UserState::new(address);
                self.store.save(&state).await?;
                state
            }
        };
        *self.current.lock() = Some(state.clone());
        Ok(state)
    }

    pub fn disconnect(&self) {
        if let Some(state) = self.current.lock().take() {
            info!("Disconnected {}", state.address);
        }
    }

    pub fn identity(&self) -> Option<Address> {
        self.current.lock().as_ref().map(|state| state.address)
    }

    pub fn require_identity(&self) -> Result<Address, MarketError> {
        self.identity().ok_or(MarketError::NotConnected)
    }

    pub fn snapshot(&self) -> Option<UserState> {
        self.current.lock().clone()
    }

    /// Applies `f` to the state of `address` if it is still the connected
    /// identity, then persists the result.
    pub async fn update<R>(
        &self,
        address: Address,
        f: impl FnOnce(&mut UserState) -> R,
    ) -> Option<R> {
        let _saving = self.saving.lock().await;
        let (result, state) = {
            let mut current = self.current.lock();
            let state = current.as_mut().filter(|s| s.address == address)?;
            let result = f(state);
            (result, state.clone())
        };
        if let Err(err) = self.store.save(&state).await {
            error!("Failed to persist state of {}: {:#}", address, err);
        }
        Some(result)
    }
}
