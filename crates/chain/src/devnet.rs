use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use log::{debug, info, warn};
use model::{address::Address, amount::Amount, clock::Clock};
use parking_lot::Mutex;
use tx_macro::tx;

use crate::{
    contracts::{item::ItemNft, registry::NftCounter, Exec},
    events::Event,
    revert::{ChainError, Revert},
    settlement::{
        Command, ItemCommand, ItemQuery, Query, Receipt, RegistryCommand, RegistryQuery, Reply,
        Settlement, TxHandle, TxOutcome,
    },
};

const ACCOUNT_PREFIX: u8 = 0xAC;
const ITEM_PREFIX: u8 = 0xC0;
const REGISTRY_PREFIX: u8 = 0xF0;
const CONFIRM_POLL: Duration = Duration::from_millis(50);

/// Contract state and native balances.
#[derive(Debug, Clone, Default)]
struct World {
    items: BTreeMap<Address, ItemNft>,
    registries: BTreeMap<Address, NftCounter>,
    balances: BTreeMap<Address, Amount>,
    contracts: u64,
}

impl World {
    fn balance(&self, who: Address) -> Amount {
        self.balances.get(&who).copied().unwrap_or_default()
    }

    fn debit(&mut self, who: Address, amount: Amount) -> Result<(), Revert> {
        let left = self
            .balance(who)
            .checked_sub(amount)
            .ok_or(Revert::InsufficientFunds)?;
        self.balances.insert(who, left);
        Ok(())
    }

    fn credit(&mut self, who: Address, amount: Amount) {
        *self.balances.entry(who).or_default() += amount;
    }

    fn item(&self, address: Address) -> Result<&ItemNft, Revert> {
        self.items
            .get(&address)
            .ok_or(Revert::UnknownContract(address))
    }

    fn item_mut(&mut self, address: Address) -> Result<&mut ItemNft, Revert> {
        self.items
            .get_mut(&address)
            .ok_or(Revert::UnknownContract(address))
    }

    fn registry_mut(&mut self, address: Address) -> Result<&mut NftCounter, Revert> {
        self.registries
            .get_mut(&address)
            .ok_or(Revert::UnknownContract(address))
    }

    fn next_contract(&mut self, prefix: u8) -> Address {
        self.contracts += 1;
        Address::from_index(prefix, self.contracts)
    }

    /// Applies one command. Any revert leaves the world untouched.
    #[tx]
    fn execute(&mut self, exec: &mut Exec, command: Command) -> Result<Option<Address>, Revert> {
        let payable = matches!(command, Command::Item(_, ItemCommand::Rent { .. }));
        if !payable && !exec.value.is_zero() {
            return Err(Revert::NonPayable);
        }

        match command {
            Command::Item(address, ItemCommand::Rent { renter, expiry }) => {
                let value = exec.value;
                let item = self.item_mut(address)?;
                item.rent(exec, renter, expiry)?;
                let owner = item.owner;
                self.debit(exec.caller, value)?;
                self.credit(owner, value);
            }
            Command::Item(address, ItemCommand::Unrent { renter }) => {
                self.item_mut(address)?.unrent(exec, renter)?;
            }
            Command::Item(address, ItemCommand::Burn) => {
                self.item_mut(address)?.burn(exec)?;
            }
            Command::Item(
                address,
                ItemCommand::SetMetadata {
                    title,
                    description,
                    uri,
                },
            ) => {
                self.item_mut(address)?
                    .set_metadata(exec, title, description, uri)?;
            }
            Command::Item(address, ItemCommand::ChangePrice(price)) => {
                self.item_mut(address)?.change_price(exec, price)?;
            }
            Command::Registry(address, RegistryCommand::Register { course, secret }) => {
                self.item(course)?;
                self.registry_mut(address)?
                    .register(exec, course, &secret)?;
            }
            Command::Registry(address, RegistryCommand::Remove { course, secret }) => {
                let course_owner = self.items.get(&course).map(|item| item.owner);
                self.registry_mut(address)?
                    .remove(exec, course, course_owner, &secret)?;
            }
            Command::Registry(address, RegistryCommand::RegisterAsTrainer { secret }) => {
                self.registry_mut(address)?
                    .register_as_trainer(exec, &secret)?;
            }
            Command::DeployItem(init) => {
                let address = self.next_contract(ITEM_PREFIX);
                let item = ItemNft::new(address, exec.caller, init, exec.now)?;
                self.items.insert(address, item);
                exec.emit(Event::Deployed {
                    course: address,
                    owner: exec.caller,
                });
                return Ok(Some(address));
            }
        }
        Ok(None)
    }

    fn read(&self, query: Query, now: u64) -> Result<Reply, ChainError> {
        match query {
            Query::Balance(who) => Ok(Reply::Amount(self.balance(who))),
            Query::Item(address, query) => {
                let item = self
                    .items
                    .get(&address)
                    .ok_or(ChainError::UnknownContract(address))?;
                Ok(match query {
                    ItemQuery::Info => Reply::Item(item.info()),
                    ItemQuery::IsActiveRenter(who) => Reply::Bool(item.is_active_renter(who, now)),
                    ItemQuery::RenterExpires(who) => Reply::Timestamp(item.renter_expires(who)),
                    ItemQuery::ActiveRenterCount => Reply::Count(item.active_renter_count()),
                    ItemQuery::Capacity => Reply::Count(item.capacity),
                    ItemQuery::Price => Reply::Amount(item.price),
                    ItemQuery::Owner => Reply::Address(item.owner),
                    ItemQuery::TokenUri => Reply::Uri(item.token_uri.clone()),
                })
            }
            Query::Registry(address, query) => {
                let registry = self
                    .registries
                    .get(&address)
                    .ok_or(ChainError::UnknownContract(address))?;
                Ok(match query {
                    RegistryQuery::List => Reply::Addresses(registry.list()),
                    RegistryQuery::IsRegistered(course) => {
                        Reply::Bool(registry.is_registered(course))
                    }
                    RegistryQuery::IsTrainer(who) => Reply::Bool(registry.is_trainer(who)),
                })
            }
        }
    }
}

struct Pending {
    tx: TxHandle,
    caller: Address,
    command: Command,
    value: Amount,
}

#[derive(Default)]
struct Node {
    world: World,
    mempool: VecDeque<Pending>,
    outcomes: HashMap<TxHandle, TxOutcome>,
    log: Vec<Event>,
    txs: u64,
    block: u64,
    accounts: u64,
    offline: bool,
    paused: bool,
    reject_next: bool,
    failing_reads: HashSet<Address>,
}

impl Node {
    fn mine_one(&mut self, now: u64) -> Option<TxHandle> {
        let pending = self.mempool.pop_front()?;
        self.block += 1;
        let mut exec = Exec::new(pending.caller, pending.value, now);
        let result = self.world.execute(&mut exec, pending.command);
        let outcome = match result {
            Ok(contract) => {
                let events = exec.into_events();
                self.log.extend(events.iter().cloned());
                TxOutcome::Confirmed(Receipt {
                    tx: pending.tx,
                    block: self.block,
                    contract,
                    events,
                })
            }
            Err(revert) => {
                debug!("tx {} reverted: {}", pending.tx.0, revert);
                TxOutcome::Reverted(revert)
            }
        };
        self.outcomes.insert(pending.tx, outcome);
        Some(pending.tx)
    }

    fn mine_through(&mut self, tx: TxHandle, now: u64) {
        while self.mempool.iter().any(|p| p.tx == tx) {
            if self.mine_one(now).is_none() {
                break;
            }
        }
    }
}

/// In-process chain executing the course contracts.
///
/// Submissions queue in a FIFO mempool and execute when some caller confirms
/// them (or calls [`DevChain::mine`]), so two clients racing for the last
/// slot are ordered by submission. Clones share one world; each clone may act
/// as a different identity.
#[derive(Clone)]
pub struct DevChain {
    node: Arc<Mutex<Node>>,
    identity: Option<Address>,
    clock: Arc<dyn Clock>,
}

impl DevChain {
    pub fn new(clock: Arc<dyn Clock>) -> DevChain {
        DevChain {
            node: Arc::new(Mutex::new(Node::default())),
            identity: None,
            clock,
        }
    }

    /// Handle acting as `identity` on the same world.
    pub fn with_identity(&self, identity: Address) -> DevChain {
        DevChain {
            node: self.node.clone(),
            identity: Some(identity),
            clock: self.clock.clone(),
        }
    }

    pub fn disconnected(&self) -> DevChain {
        DevChain {
            node: self.node.clone(),
            identity: None,
            clock: self.clock.clone(),
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn new_account(&self) -> Address {
        let mut node = self.node.lock();
        node.accounts += 1;
        Address::from_index(ACCOUNT_PREFIX, node.accounts)
    }

    pub fn fund(&self, who: Address, amount: Amount) {
        self.node.lock().world.credit(who, amount);
    }

    pub fn balance(&self, who: Address) -> Amount {
        self.node.lock().world.balance(who)
    }

    /// Creates a registry at genesis, outside the mempool.
    pub fn deploy_registry(&self, owner: Address, secret: &str) -> Address {
        let mut node = self.node.lock();
        let address = node.world.next_contract(REGISTRY_PREFIX);
        node.world
            .registries
            .insert(address, NftCounter::new(address, owner, secret));
        info!("Registry deployed at {} (owner {})", address, owner);
        address
    }

    /// Executes every pending transaction in submission order.
    pub fn mine(&self) -> Vec<TxHandle> {
        let now = self.clock.unix();
        let mut node = self.node.lock();
        let mut mined = Vec::new();
        while let Some(tx) = node.mine_one(now) {
            mined.push(tx);
        }
        mined
    }

    pub fn pending(&self) -> usize {
        self.node.lock().mempool.len()
    }

    /// All events of confirmed transactions, oldest first.
    pub fn events(&self) -> Vec<Event> {
        self.node.lock().log.clone()
    }

    pub fn set_offline(&self, offline: bool) {
        self.node.lock().offline = offline;
    }

    pub fn fail_reads_for(&self, contract: Address, fail: bool) {
        let mut node = self.node.lock();
        if fail {
            node.failing_reads.insert(contract);
        } else {
            node.failing_reads.remove(&contract);
        }
    }

    /// The wallet refuses the next submission.
    pub fn reject_next_submission(&self) {
        self.node.lock().reject_next = true;
    }

    /// While paused, `confirm` keeps waiting.
    pub fn pause_mining(&self, paused: bool) {
        self.node.lock().paused = paused;
    }
}

#[async_trait]
impl Settlement for DevChain {
    async fn call(&self, query: Query) -> Result<Reply, ChainError> {
        let node = self.node.lock();
        if node.offline {
            return Err(ChainError::Transport("node unreachable".to_owned()));
        }
        let target = match &query {
            Query::Item(address, _) | Query::Registry(address, _) => Some(*address),
            Query::Balance(_) => None,
        };
        if let Some(target) = target {
            if node.failing_reads.contains(&target) {
                return Err(ChainError::Transport(format!("read of {} failed", target)));
            }
        }
        node.world.read(query, self.clock.unix())
    }

    async fn submit(&self, command: Command, value: Amount) -> Result<TxHandle, ChainError> {
        let caller = self.identity.ok_or(ChainError::NotConnected)?;
        let mut node = self.node.lock();
        if node.reject_next {
            node.reject_next = false;
            warn!("Wallet rejected {} for {}", command.name(), caller);
            return Err(ChainError::Rejected);
        }
        if node.offline {
            return Err(ChainError::Transport("node unreachable".to_owned()));
        }
        node.txs += 1;
        let tx = TxHandle(node.txs);
        debug!("tx {} queued: {} from {}", tx.0, command.name(), caller);
        node.mempool.push_back(Pending {
            tx,
            caller,
            command,
            value,
        });
        Ok(tx)
    }

    async fn confirm(&self, tx: TxHandle) -> Result<TxOutcome, ChainError> {
        loop {
            {
                let mut node = self.node.lock();
                if let Some(outcome) = node.outcomes.get(&tx) {
                    return Ok(outcome.clone());
                }
                if !node.mempool.iter().any(|p| p.tx == tx) {
                    return Err(ChainError::UnknownTransaction(tx.0));
                }
                if !node.paused && !node.offline {
                    node.mine_through(tx, self.clock.unix());
                    continue;
                }
            }
            tokio::time::sleep(CONFIRM_POLL).await;
        }
    }

    fn current_identity(&self) -> Option<Address> {
        self.identity
    }
}
