use model::{
    address::Address,
    errors::{MarketError, UnavailableReason},
};
use thiserror::Error;

/// Reason a transaction executed and reverted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Revert {
    #[error("unauthorized")]
    Unauthorized,
    #[error("capacity exceeded")]
    CapacityExceeded,
    #[error("insufficient payment")]
    InsufficientPayment,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("invalid expiry")]
    InvalidExpiry,
    #[error("not an active renter")]
    NotActiveRenter,
    #[error("course has active renters")]
    HasActiveRenters,
    #[error("token burned")]
    TokenBurned,
    #[error("course not registered")]
    NotRegistered,
    #[error("invalid capacity")]
    InvalidCapacity,
    #[error("call does not accept value")]
    NonPayable,
    #[error("unknown contract: {0}")]
    UnknownContract(Address),
}

/// Failure to reach the settlement layer or to get a verdict from it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rejected by wallet")]
    Rejected,
    #[error("no connected identity")]
    NotConnected,
    #[error("unknown contract: {0}")]
    UnknownContract(Address),
    #[error("unknown transaction: {0}")]
    UnknownTransaction(u64),
    #[error("unexpected reply, expected {0}")]
    UnexpectedReply(&'static str),
}

impl From<Revert> for MarketError {
    fn from(value: Revert) -> Self {
        match value {
            Revert::Unauthorized => MarketError::Unauthorized("caller lacks rights".to_owned()),
            Revert::CapacityExceeded => MarketError::CapacityExceeded,
            Revert::InsufficientPayment => MarketError::InsufficientPayment,
            Revert::InsufficientFunds => MarketError::InsufficientFunds,
            Revert::InvalidExpiry => MarketError::InvalidExpiry,
            Revert::NotActiveRenter => MarketError::NotActiveRenter,
            Revert::HasActiveRenters => MarketError::HasActiveRenters,
            Revert::TokenBurned | Revert::NotRegistered => {
                MarketError::Unavailable(UnavailableReason::Removed)
            }
            Revert::UnknownContract(address) => MarketError::CourseNotFound(address),
            Revert::InvalidCapacity | Revert::NonPayable => {
                MarketError::Common(eyre::eyre!("invalid call: {}", value))
            }
        }
    }
}

impl From<ChainError> for MarketError {
    fn from(value: ChainError) -> Self {
        match value {
            ChainError::Rejected => MarketError::Rejected,
            ChainError::NotConnected => MarketError::NotConnected,
            ChainError::UnknownContract(address) => MarketError::CourseNotFound(address),
            ChainError::Transport(_)
            | ChainError::UnknownTransaction(_)
            | ChainError::UnexpectedReply(_) => {
                MarketError::TransientNetworkError(value.to_string())
            }
        }
    }
}
