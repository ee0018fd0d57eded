pub mod memory;
pub mod session;
pub mod user;

use async_trait::async_trait;
use eyre::Result;
use model::{address::Address, user::UserState};
use session::Db;
use user::MongoUserStore;

pub use memory::MemoryUserStore;

const DB_NAME: &str = "sportchain_db";

/// Persisted per-identity state, keyed by address.
#[async_trait]
pub trait UserStateStore: Send + Sync {
    async fn load(&self, address: Address) -> Result<Option<UserState>>;

    async fn save(&self, state: &UserState) -> Result<()>;

    async fn delete(&self, address: Address) -> Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    pub db: Db,
    pub users: MongoUserStore,
}

impl Storage {
    pub async fn new(uri: &str) -> Result<Self> {
        let db = Db::connect(uri, DB_NAME).await?;
        let users = MongoUserStore::new(&db);
        Ok(Storage { db, users })
    }
}
