//! # ECM Staking Core - Pool Ledger & Reward Accrual Engine
//!
//! Accounting engine for the ECM multi-pool staking platform: per-pool token
//! inventories, time-weighted reward accrual, and penalty-based early-exit
//! economics.
//!
//! ## Components
//!
//! | Component | Module | Responsibility |
//! |-----------|--------|----------------|
//! | Inventory Ledger | [`ledger`] | Per-pool counters for every token movement category |
//! | Reward Accrual Engine | [`accrual`] | Lazy `acc_reward_per_share` accumulator, three strategies |
//! | Stake Position Manager | [`position`] + [`engine`] | Per-user stake records, claim/unstake transitions |
//! | Pool Config & Reporter | [`pool`] | Parameter validation and derived balance status |
//!
//! ## Reward model
//!
//! Rewards distribute through a shared per-pool accumulator: every settlement
//! advances `acc_reward_per_share` by `increment * PRECISION / total_staked`,
//! and a position's pending reward is the snapshot difference
//! `(acc - reward_debt) * staked / PRECISION`. Settlement is O(1) per
//! position regardless of staker count.
//!
//! ## Accrual strategies
//!
//! | Strategy | Emission | Granularity |
//! |----------|----------|-------------|
//! | Linear | `allocated / total_secs` per second | 1 second |
//! | Periodic | fixed amount per period | pro-rated within a period |
//! | Weekly | explicit per-week table | whole weeks only |

pub mod accrual;
pub mod collaborators;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod math;
pub mod pool;
pub mod position;

// Re-exports
pub use accrual::{AccrualStrategy, RewardAccrual, SettleOutcome};
pub use collaborators::{AssetLedger, LiquidityManager, ReserveOracle, VestingScheduler};
pub use engine::{StakingEngine, UnstakeOutcome};
pub use error::{EngineError, Result};
pub use ledger::{BalanceStatus, PoolInventory};
pub use pool::{Pool, PoolConfig, PoolInfo};
pub use position::StakePosition;

/// Pool identifier, assigned sequentially at creation
pub type PoolId = u64;

/// Account identifier (asset mints, users, and collaborators alike)
pub type AccountId = [u8; 32];

/// ECM token constants
pub mod constants {
    /// Token symbol
    pub const SYMBOL: &str = "ECM";

    /// Decimal places (same as ETH)
    pub const DECIMALS: u8 = 18;

    /// One ECM in smallest unit (like wei for ETH)
    pub const ONE_ECM: u128 = 1_000_000_000_000_000_000; // 10^18

    /// Accumulator fixed-point scale. 10^12 rather than 10^18 keeps typical
    /// `increment * PRECISION` products on the single-u128 fast path of
    /// [`crate::math::mul_div`]; larger products take its widened path.
    pub const PRECISION: u128 = 1_000_000_000_000; // 10^12

    /// Basis-point denominator: 10000 bps = 100%
    pub const BPS_DENOMINATOR: u128 = 10_000;

    /// Maximum penalty rate (100%)
    pub const MAX_PENALTY_BPS: u16 = 10_000;

    /// Seconds per day
    pub const SECONDS_PER_DAY: u64 = 24 * 3600;

    /// Seconds per week (weekly-bucket strategy granularity)
    pub const SECONDS_PER_WEEK: u64 = 7 * 24 * 3600;

    /// The null account, rejected wherever a real account is required
    pub const NULL_ACCOUNT: [u8; 32] = [0u8; 32];
}

pub use constants::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_headroom() {
        // A 1-billion-ECM increment scaled by PRECISION exceeds u128; the
        // widened multiply still settles it exactly.
        let increment = 1_000_000_000 * ONE_ECM;
        assert!(increment.checked_mul(PRECISION).is_none());
        assert_eq!(
            math::mul_div(increment, PRECISION, ONE_ECM),
            1_000_000_000 * PRECISION
        );
    }

    #[test]
    fn test_bps_denominator() {
        assert_eq!(BPS_DENOMINATOR, 10_000);
        assert_eq!(MAX_PENALTY_BPS as u128, BPS_DENOMINATOR);
    }
}
