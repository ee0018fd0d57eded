use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use eyre::{bail, Result};
use model::{address::Address, user::UserState};
use parking_lot::Mutex;

use crate::UserStateStore;

#[derive(Clone, Default)]
pub struct MemoryUserStore {
    states: Arc<Mutex<HashMap<Address, UserState>>>,
    failing: Arc<Mutex<bool>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails until switched back.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    fn check(&self) -> Result<()> {
        if *self.failing.lock() {
            bail!("user store unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl UserStateStore for MemoryUserStore {
    async fn load(&self, address: Address) -> Result<Option<UserState>> {
        self.check()?;
        Ok(self.states.lock().get(&address).cloned())
    }

    async fn save(&self, state: &UserState) -> Result<()> {
        self.check()?;
        self.states.lock().insert(state.address, state.clone());
        Ok(())
    }

    async fn delete(&self, address: Address) -> Result<()> {
        self.check()?;
        self.states.lock().remove(&address);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_delete() {
        let store = MemoryUserStore::new();
        let address = Address::from_index(0xAC, 1);
        assert!(store.load(address).await.unwrap().is_none());

        let state = UserState::new(address);
        store.save(&state).await.unwrap();
        assert_eq!(store.load(address).await.unwrap(), Some(state));

        store.set_failing(true);
        assert!(store.load(address).await.is_err());
        store.set_failing(false);

        store.delete(address).await.unwrap();
        assert!(store.load(address).await.unwrap().is_none());
    }
}
