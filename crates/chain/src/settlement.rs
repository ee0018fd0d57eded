use async_trait::async_trait;
use model::{address::Address, amount::Amount, metadata::ContentAddress};

use crate::{
    events::Event,
    revert::{ChainError, Revert},
};

/// Read-only request. Free and side-effect free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Item(Address, ItemQuery),
    Registry(Address, RegistryQuery),
    Balance(Address),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemQuery {
    Info,
    IsActiveRenter(Address),
    RenterExpires(Address),
    ActiveRenterCount,
    Capacity,
    Price,
    Owner,
    TokenUri,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryQuery {
    List,
    IsRegistered(Address),
    IsTrainer(Address),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Bool(bool),
    Timestamp(u64),
    Count(u32),
    Amount(Amount),
    Address(Address),
    Addresses(Vec<Address>),
    Uri(Option<ContentAddress>),
    Item(ItemInfo),
}

/// Snapshot of a course contract's public state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInfo {
    pub owner: Address,
    pub token_id: u64,
    pub title: String,
    pub description: String,
    pub price: Amount,
    pub capacity: u32,
    pub active_renters: u32,
    pub token_uri: Option<ContentAddress>,
    pub created_at: u64,
    pub burned: bool,
}

/// State-changing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Item(Address, ItemCommand),
    Registry(Address, RegistryCommand),
    DeployItem(ItemInit),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemCommand {
    Rent { renter: Address, expiry: u64 },
    Unrent { renter: Address },
    Burn,
    SetMetadata {
        title: String,
        description: String,
        uri: ContentAddress,
    },
    ChangePrice(Amount),
}

/// The secret is a plain credential parameter; the registry only keeps its digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCommand {
    Register { course: Address, secret: String },
    Remove { course: Address, secret: String },
    RegisterAsTrainer { secret: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInit {
    pub name: String,
    pub symbol: String,
    pub token_id: u64,
    pub price: Amount,
    pub capacity: u32,
    pub title: String,
    pub description: String,
    pub token_uri: Option<ContentAddress>,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Item(_, ItemCommand::Rent { .. }) => "rent",
            Command::Item(_, ItemCommand::Unrent { .. }) => "unrent",
            Command::Item(_, ItemCommand::Burn) => "burn",
            Command::Item(_, ItemCommand::SetMetadata { .. }) => "set_metadata",
            Command::Item(_, ItemCommand::ChangePrice(_)) => "change_price",
            Command::Registry(_, RegistryCommand::Register { .. }) => "register",
            Command::Registry(_, RegistryCommand::Remove { .. }) => "remove",
            Command::Registry(_, RegistryCommand::RegisterAsTrainer { .. }) => {
                "register_as_trainer"
            }
            Command::DeployItem(_) => "deploy_item",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxHandle(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx: TxHandle,
    pub block: u64,
    /// Address of the contract created by a deploy.
    pub contract: Option<Address>,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    Confirmed(Receipt),
    Reverted(Revert),
}

impl TxOutcome {
    pub fn into_result(self) -> Result<Receipt, Revert> {
        match self {
            TxOutcome::Confirmed(receipt) => Ok(receipt),
            TxOutcome::Reverted(revert) => Err(revert),
        }
    }
}

/// What the client core needs from the chain.
///
/// The settlement layer alone orders competing submissions; a submission that
/// passed a client-side pre-flight check may still revert.
#[async_trait]
pub trait Settlement: Send + Sync {
    async fn call(&self, query: Query) -> Result<Reply, ChainError>;

    async fn submit(&self, command: Command, value: Amount) -> Result<TxHandle, ChainError>;

    /// Waits for finality. Bounded only by the settlement layer's liveness.
    async fn confirm(&self, tx: TxHandle) -> Result<TxOutcome, ChainError>;

    fn current_identity(&self) -> Option<Address>;
}
