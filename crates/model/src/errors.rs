use thiserror::Error;

use crate::address::Address;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Course is at capacity")]
    CapacityExceeded,
    #[error("Payment is below the course price")]
    InsufficientPayment,
    #[error("Not enough funds")]
    InsufficientFunds,
    #[error("Rental expiry must be in the future")]
    InvalidExpiry,
    #[error("Caller is not an active renter")]
    NotActiveRenter,
    #[error("Course still has active renters")]
    HasActiveRenters,
    #[error("Course unavailable: {0}")]
    Unavailable(UnavailableReason),
    #[error("Network error: {0}")]
    TransientNetworkError(String),
    #[error("Metadata unresolvable: {0}")]
    MetadataUnresolvable(String),
    #[error("Request rejected by the wallet")]
    Rejected,
    #[error("Wallet is not connected")]
    NotConnected,
    #[error("Course not found: {0}")]
    CourseNotFound(Address),
    #[error("Common error: {0:#}")]
    Common(#[from] eyre::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    Full,
    Ended,
    Removed,
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnavailableReason::Full => write!(f, "no free places"),
            UnavailableReason::Ended => write!(f, "course has ended"),
            UnavailableReason::Removed => write!(f, "course was removed"),
        }
    }
}

/// What the user can do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// "You cannot do this."
    Denied,
    /// "Try again later."
    RetryLater,
    /// "This no longer exists."
    Gone,
}

impl MarketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketError::Unauthorized(_)
            | MarketError::CapacityExceeded
            | MarketError::InsufficientPayment
            | MarketError::InsufficientFunds
            | MarketError::InvalidExpiry
            | MarketError::NotActiveRenter
            | MarketError::HasActiveRenters
            | MarketError::Rejected
            | MarketError::NotConnected
            | MarketError::Unavailable(UnavailableReason::Full) => ErrorKind::Denied,
            MarketError::Unavailable(UnavailableReason::Ended)
            | MarketError::Unavailable(UnavailableReason::Removed)
            | MarketError::CourseNotFound(_) => ErrorKind::Gone,
            MarketError::TransientNetworkError(_)
            | MarketError::MetadataUnresolvable(_)
            | MarketError::Common(_) => ErrorKind::RetryLater,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::RetryLater
    }

    pub fn user_message(&self) -> String {
        let hint = match self.kind() {
            ErrorKind::Denied => "You cannot do this",
            ErrorKind::RetryLater => "Try again later",
            ErrorKind::Gone => "This no longer exists",
        };
        format!("{}: {}", hint, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(MarketError::CapacityExceeded.kind(), ErrorKind::Denied);
        assert_eq!(
            MarketError::Unauthorized("wrong secret".to_owned()).kind(),
            ErrorKind::Denied
        );
        assert_eq!(
            MarketError::TransientNetworkError("timeout".to_owned()).kind(),
            ErrorKind::RetryLater
        );
        assert_eq!(
            MarketError::Unavailable(UnavailableReason::Ended).kind(),
            ErrorKind::Gone
        );
        assert_eq!(
            MarketError::Unavailable(UnavailableReason::Full).kind(),
            ErrorKind::Denied
        );
        assert!(MarketError::Common(eyre::eyre!("boom")).is_transient());
    }

    #[test]
    fn test_user_message() {
        let msg = MarketError::Unavailable(UnavailableReason::Ended).user_message();
        assert_eq!(msg, "This no longer exists: Course unavailable: course has ended");
    }
}
