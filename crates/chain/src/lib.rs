pub mod client;
pub mod contracts;
pub mod devnet;
pub mod events;
pub mod revert;
pub mod settlement;

pub use client::{balance_of, deploy_item, ItemClient, RegistryClient};
pub use devnet::DevChain;
pub use revert::{ChainError, Revert};
pub use settlement::{ItemInit, Settlement, TxHandle, TxOutcome};
