use std::sync::Arc;

use model::{
    address::Address, amount::Amount, clock::from_unix, course::OnChainCourse,
    metadata::ContentAddress,
};

use crate::{
    revert::ChainError,
    settlement::{
        Command, ItemCommand, ItemInfo, ItemInit, ItemQuery, Query, RegistryCommand,
        RegistryQuery, Reply, Settlement, TxHandle,
    },
};

macro_rules! expect_reply {
    ($reply:expr, $variant:ident, $what:literal) => {
        match $reply {
            Reply::$variant(value) => Ok(value),
            _ => Err(ChainError::UnexpectedReply($what)),
        }
    };
}

/// Typed view of one course contract.
#[derive(Clone)]
pub struct ItemClient {
    chain: Arc<dyn Settlement>,
    address: Address,
}

impl ItemClient {
    pub fn new(chain: Arc<dyn Settlement>, address: Address) -> ItemClient {
        ItemClient { chain, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    async fn query(&self, query: ItemQuery) -> Result<Reply, ChainError> {
        self.chain.call(Query::Item(self.address, query)).await
    }

    pub async fn info(&self) -> Result<ItemInfo, ChainError> {
        expect_reply!(self.query(ItemQuery::Info).await?, Item, "item info")
    }

    /// Everything the contract knows about the course in one read.
    pub async fn course(&self) -> Result<OnChainCourse, ChainError> {
        let info = self.info().await?;
        Ok(OnChainCourse {
            id: self.address,
            token_id: info.token_id,
            owner: info.owner,
            title: info.title,
            description: info.description,
            price: info.price,
            capacity: info.capacity,
            active_renters: info.active_renters,
            metadata_uri: info.token_uri,
            created_at: from_unix(info.created_at),
            burned: info.burned,
        })
    }

    pub async fn capacity(&self) -> Result<u32, ChainError> {
        expect_reply!(self.query(ItemQuery::Capacity).await?, Count, "capacity")
    }

    pub async fn active_renter_count(&self) -> Result<u32, ChainError> {
        expect_reply!(
            self.query(ItemQuery::ActiveRenterCount).await?,
            Count,
            "active renter count"
        )
    }

    pub async fn is_active_renter(&self, renter: Address) -> Result<bool, ChainError> {
        expect_reply!(
            self.query(ItemQuery::IsActiveRenter(renter)).await?,
            Bool,
            "active renter flag"
        )
    }

    /// Unix seconds, zero when `renter` never rented or was released.
    pub async fn renter_expires(&self, renter: Address) -> Result<u64, ChainError> {
        expect_reply!(
            self.query(ItemQuery::RenterExpires(renter)).await?,
            Timestamp,
            "renter expiry"
        )
    }

    pub async fn price(&self) -> Result<Amount, ChainError> {
        expect_reply!(self.query(ItemQuery::Price).await?, Amount, "price")
    }

    pub async fn owner(&self) -> Result<Address, ChainError> {
        expect_reply!(self.query(ItemQuery::Owner).await?, Address, "owner")
    }

    pub async fn token_uri(&self) -> Result<Option<ContentAddress>, ChainError> {
        expect_reply!(self.query(ItemQuery::TokenUri).await?, Uri, "token uri")
    }

    async fn send(&self, command: ItemCommand, value: Amount) -> Result<TxHandle, ChainError> {
        self.chain
            .submit(Command::Item(self.address, command), value)
            .await
    }

    pub async fn rent(
        &self,
        renter: Address,
        expiry: u64,
        payment: Amount,
    ) -> Result<TxHandle, ChainError> {
        self.send(ItemCommand::Rent { renter, expiry }, payment).await
    }

    pub async fn unrent(&self, renter: Address) -> Result<TxHandle, ChainError> {
        self.send(ItemCommand::Unrent { renter }, Amount::zero())
            .await
    }

    pub async fn burn(&self) -> Result<TxHandle, ChainError> {
        self.send(ItemCommand::Burn, Amount::zero()).await
    }

    pub async fn set_metadata(
        &self,
        title: String,
        description: String,
        uri: ContentAddress,
    ) -> Result<TxHandle, ChainError> {
        self.send(
            ItemCommand::SetMetadata {
                title,
                description,
                uri,
            },
            Amount::zero(),
        )
        .await
    }

    pub async fn change_price(&self, price: Amount) -> Result<TxHandle, ChainError> {
        self.send(ItemCommand::ChangePrice(price), Amount::zero())
            .await
    }
}

/// Typed view of the course registry.
#[derive(Clone)]
pub struct RegistryClient {
    chain: Arc<dyn Settlement>,
    address: Address,
}

impl RegistryClient {
    pub fn new(chain: Arc<dyn Settlement>, address: Address) -> RegistryClient {
        RegistryClient { chain, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    async fn query(&self, query: RegistryQuery) -> Result<Reply, ChainError> {
        self.chain.call(Query::Registry(self.address, query)).await
    }

    /// Registered course contracts in registration order.
    pub async fn list(&self) -> Result<Vec<Address>, ChainError> {
        expect_reply!(self.query(RegistryQuery::List).await?, Addresses, "course list")
    }

    pub async fn is_registered(&self, course: Address) -> Result<bool, ChainError> {
        expect_reply!(
            self.query(RegistryQuery::IsRegistered(course)).await?,
            Bool,
            "registration flag"
        )
    }

    pub async fn is_trainer(&self, who: Address) -> Result<bool, ChainError> {
        expect_reply!(
            self.query(RegistryQuery::IsTrainer(who)).await?,
            Bool,
            "trainer flag"
        )
    }

    async fn send(&self, command: RegistryCommand) -> Result<TxHandle, ChainError> {
        self.chain
            .submit(Command::Registry(self.address, command), Amount::zero())
            .await
    }

    pub async fn register(&self, course: Address, secret: &str) -> Result<TxHandle, ChainError> {
        self.send(RegistryCommand::Register {
            course,
            secret: secret.to_owned(),
        })
        .await
    }

    pub async fn remove(&self, course: Address, secret: &str) -> Result<TxHandle, ChainError> {
        self.send(RegistryCommand::Remove {
            course,
            secret: secret.to_owned(),
        })
        .await
    }

    pub async fn register_as_trainer(&self, secret: &str) -> Result<TxHandle, ChainError> {
        self.send(RegistryCommand::RegisterAsTrainer {
            secret: secret.to_owned(),
        })
        .await
    }
}

pub async fn balance_of(chain: &dyn Settlement, who: Address) -> Result<Amount, ChainError> {
    expect_reply!(chain.call(Query::Balance(who)).await?, Amount, "balance")
}

pub async fn deploy_item(
    chain: &Arc<dyn Settlement>,
    init: ItemInit,
) -> Result<TxHandle, ChainError> {
    chain.submit(Command::DeployItem(init), Amount::zero()).await
}
