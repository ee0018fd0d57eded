use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result;
use log::{debug, info};
use model::{address::Address, user::UserState};
use mongodb::{bson::doc, Collection};

use crate::{session::Db, UserStateStore};

const COLLECTION: &str = "users";

#[derive(Clone)]
pub struct MongoUserStore {
    pub(crate) users: Arc<Collection<UserState>>,
}

impl MongoUserStore {
    pub(crate) fn new(db: &Db) -> Self {
        MongoUserStore {
            users: Arc::new(db.collection(COLLECTION)),
        }
    }
}

#[async_trait]
impl UserStateStore for MongoUserStore {
    async fn load(&self, address: Address) -> Result<Option<UserState>> {
        Ok(self
            .users
            .find_one(doc! { "_id": address.to_string() })
            .await?)
    }

    async fn save(&self, state: &UserState) -> Result<()> {
        debug!(
            "Saving state of {}: {} bookings",
            state.address,
            state.booked.len()
        );
        self.users
            .replace_one(doc! { "_id": state.address.to_string() }, state)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn delete(&self, address: Address) -> Result<()> {
        info!("Deleting state of {}", address);
        self.users
            .delete_one(doc! { "_id": address.to_string() })
            .await?;
        Ok(())
    }
}
