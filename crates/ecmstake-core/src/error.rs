//! Error types for ECM staking engine operations

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur in ECM staking engine operations
///
/// All errors are local to a single operation: a failed operation leaves no
/// partial ledger mutation behind. Deficit is a reported status, never an
/// error (see [`crate::ledger::BalanceStatus`]).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    // === Configuration ===
    /// Pool parameters rejected at creation
    #[error("Invalid pool config: {0}")]
    InvalidPoolConfig(String),

    /// Requested stake duration is not in the pool's allowed set
    #[error("Duration {duration}s is not permitted by the pool")]
    DurationNotAllowed { duration: u64 },

    /// Accrual strategy activation is a one-time step per pool
    #[error("Reward strategy already activated for pool {0}")]
    StrategyAlreadyActive(u64),

    /// Strategy activation requires a reward allocation
    #[error("Pool {0} has no reward allocation")]
    NoRewardAllocation(u64),

    // === Authorization ===
    /// Caller lacks the required role
    #[error("Caller is not authorized for this operation")]
    Unauthorized,

    // === Insufficient resources ===
    /// External ledger balance too low
    #[error("Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u128, available: u128 },

    /// External ledger allowance too low
    #[error("Insufficient allowance: need {needed}, have {available}")]
    InsufficientAllowance { needed: u128, available: u128 },

    /// Liquidity transfer exceeds the pool's staked inventory
    #[error("Insufficient pool inventory for transfer: requested {requested}, available {available}")]
    InsufficientBalanceForTransfer { requested: u128, available: u128 },

    /// Sale would exceed the for-sale allocation
    #[error("Sale of {requested} exceeds remaining sale allocation {remaining}")]
    ExceedsSaleAllocation { requested: u128, remaining: u128 },

    // === Invariant protection ===
    /// Zero amount where a non-zero amount is semantically required, or a
    /// debit that no inventory category can absorb
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Stake below the pool's configured purchase floor
    #[error("Stake of {amount} is below the pool minimum {minimum}")]
    BelowMinimumStake { amount: u128, minimum: u128 },

    // === Not found ===
    /// Unknown pool id
    #[error("Pool not found: {0}")]
    PoolNotFound(u64),

    /// Claim or unstake with no active stake
    #[error("No stake found for user in pool {0}")]
    NoStakeFound(u64),

    // === Collaborators ===
    /// An external collaborator call failed
    #[error("Collaborator call failed: {0}")]
    CollaboratorFailed(String),
}

impl EngineError {
    /// Error code for API responses
    pub fn code(&self) -> u32 {
        match self {
            Self::InvalidPoolConfig(_) => 2001,
            Self::DurationNotAllowed { .. } => 2002,
            Self::StrategyAlreadyActive(_) => 2003,
            Self::NoRewardAllocation(_) => 2004,
            Self::Unauthorized => 2101,
            Self::InsufficientBalance { .. } => 2201,
            Self::InsufficientAllowance { .. } => 2202,
            Self::InsufficientBalanceForTransfer { .. } => 2203,
            Self::ExceedsSaleAllocation { .. } => 2204,
            Self::InvalidAmount(_) => 2301,
            Self::BelowMinimumStake { .. } => 2302,
            Self::PoolNotFound(_) => 2401,
            Self::NoStakeFound(_) => 2402,
            Self::CollaboratorFailed(_) => 2501,
        }
    }

    /// Whether retrying the same call later could succeed without any
    /// configuration change
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance { .. }
                | Self::InsufficientAllowance { .. }
                | Self::InsufficientBalanceForTransfer { .. }
                | Self::CollaboratorFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = EngineError::PoolNotFound(7);
        assert_eq!(err.code(), 2401);

        let err = EngineError::Unauthorized;
        assert_eq!(err.code(), 2101);
    }

    #[test]
    fn test_error_display() {
        let err = EngineError::BelowMinimumStake { amount: 10, minimum: 100 };
        let msg = format!("{}", err);
        assert!(msg.contains("below the pool minimum"));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(EngineError::InsufficientBalance { needed: 5, available: 1 }.is_retryable());
        assert!(!EngineError::Unauthorized.is_retryable());
    }
}
