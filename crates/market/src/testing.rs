//! In-process fixture: a development chain with a registry, an in-memory
//! content store and user store, and a connected trainer.

use std::sync::Arc;

use chain::{DevChain, ItemClient, RegistryClient, Settlement};
use chrono::{DateTime, Duration, Utc};
use ipfs::MemoryStore;
use model::{
    address::Address,
    amount::Amount,
    clock::{Clock, ManualClock},
    course::{CourseDraft, SportType},
    metadata::ContentAddress,
    schedule::Schedule,
};
use storage::MemoryUserStore;

use crate::{
    config::MarketConfig,
    service::{await_confirmation, trainers::ProfileDraft},
    Market,
};

pub const SECRET: &str = "sportchain-secret";
pub const START: i64 = 1_900_000_000;

pub struct Harness {
    pub clock: ManualClock,
    pub dev: DevChain,
    pub content: MemoryStore,
    pub store: MemoryUserStore,
    pub admin: Address,
    pub registry: Address,
    pub trainer: Address,
    /// Connected as `trainer`.
    pub market: Market,
}

impl Harness {
    pub async fn new() -> Harness {
        let clock = ManualClock::at_unix(START);
        let dev = DevChain::new(Arc::new(clock.clone()));
        let admin = dev.new_account();
        let registry = dev.deploy_registry(admin, SECRET);
        let trainer = dev.new_account();
        dev.fund(trainer, Amount::whole(10));

        let content = MemoryStore::new();
        let store = MemoryUserStore::new();
        let market = build_market(&dev, &content, &store, &clock, registry, trainer);
        let harness = Harness {
            clock,
            dev,
            content,
            store,
            admin,
            registry,
            trainer,
            market,
        };
        harness.market.connect().await.unwrap();
        harness
            .market
            .register_as_trainer(
                ProfileDraft {
                    name: "Trainer".to_owned(),
                    bio: "Runs the park sessions".to_owned(),
                    avatar: String::new(),
                },
                SECRET,
            )
            .await
            .unwrap();
        harness
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn hours_from_now(&self, hours: i64) -> DateTime<Utc> {
        self.now() + Duration::hours(hours)
    }

    pub fn price(&self) -> Amount {
        Amount::try_from("0.05").unwrap()
    }

    pub fn chain_for(&self, identity: Address) -> Arc<dyn Settlement> {
        Arc::new(self.dev.with_identity(identity))
    }

    /// Market acting as `identity`, sharing chain, content and user stores.
    /// Not connected yet.
    pub fn market_for(&self, identity: Address) -> Market {
        build_market(
            &self.dev,
            &self.content,
            &self.store,
            &self.clock,
            self.registry,
            identity,
        )
    }

    /// A funded, connected non-trainer.
    pub async fn renter(&self) -> (Address, Market) {
        let address = self.dev.new_account();
        self.dev.fund(address, Amount::whole(10));
        let market = self.market_for(address);
        market.connect().await.unwrap();
        (address, market)
    }

    pub fn draft(&self, title: &str, capacity: u32, end: DateTime<Utc>) -> CourseDraft {
        CourseDraft {
            title: title.to_owned(),
            description: format!("{} with the park crew", title),
            image: Some("ipfs://QmImage".to_owned()),
            price: self.price(),
            location: Some("Central park".to_owned()),
            schedule: Schedule::window(self.now(), end),
            capacity,
            sport: SportType::Running,
        }
    }

    /// Creates and registers a course owned by `trainer`.
    pub async fn course(&self, title: &str, capacity: u32, end: DateTime<Utc>) -> Address {
        self.market
            .create_course(self.draft(title, capacity, end), SECRET)
            .await
            .unwrap()
            .id
    }

    pub async fn resolver_uri(&self, course: Address) -> ContentAddress {
        ItemClient::new(self.chain_for(self.trainer), course)
            .token_uri()
            .await
            .unwrap()
            .unwrap()
    }

    /// Burns a course but leaves it in the registry.
    pub async fn burn_unlisted(&self, course: Address) {
        let chain = self.chain_for(self.trainer);
        let tx = ItemClient::new(chain.clone(), course).burn().await.unwrap();
        await_confirmation(chain.as_ref(), tx, "burn", self.market.config.confirm_notice, |_| {})
            .await
            .unwrap();
    }

    /// The course owner releases `renter` behind the renter's back.
    pub async fn unrent_as_owner(&self, course: Address, renter: Address) {
        let chain = self.chain_for(self.trainer);
        let tx = ItemClient::new(chain.clone(), course)
            .unrent(renter)
            .await
            .unwrap();
        await_confirmation(chain.as_ref(), tx, "unrent", self.market.config.confirm_notice, |_| {})
            .await
            .unwrap();
    }

    /// The renter re-rents outside of its market, e.g. from another device.
    pub async fn rent_directly(&self, course: Address, renter: Address, expiry: DateTime<Utc>) {
        let chain = self.chain_for(renter);
        let tx = ItemClient::new(chain.clone(), course)
            .rent(renter, expiry.timestamp() as u64, self.price())
            .await
            .unwrap();
        await_confirmation(chain.as_ref(), tx, "rent", self.market.config.confirm_notice, |_| {})
            .await
            .unwrap();
    }

    pub fn registry_client(&self) -> RegistryClient {
        RegistryClient::new(self.chain_for(self.admin), self.registry)
    }
}

fn build_market(
    dev: &DevChain,
    content: &MemoryStore,
    store: &MemoryUserStore,
    clock: &ManualClock,
    registry: Address,
    identity: Address,
) -> Market {
    Market::new(
        MarketConfig::new(registry),
        Arc::new(dev.with_identity(identity)),
        Arc::new(content.clone()),
        Arc::new(store.clone()),
        Arc::new(clock.clone()),
    )
}
