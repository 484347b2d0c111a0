//! # Stake Positions
//!
//! One record per (pool, user). Pending reward is the snapshot difference
//! against the pool accumulator:
//!
//! ```text
//! pending = (acc_reward_per_share - reward_debt) * staked / PRECISION
//! ```
//!
//! Lifecycle: `Empty -> Staked -> (Claimed* ->) Unstaked`. A full unstake
//! zeroes the position rather than deleting it, so cumulative historical
//! fields and the unique-staker count survive.

use serde::{Deserialize, Serialize};

use crate::constants::{BPS_DENOMINATOR, PRECISION};
use crate::math::mul_div;

/// Per-user, per-pool stake record
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StakePosition {
    /// Currently staked ECM
    pub staked: u128,

    /// Start of the current stake commitment
    pub stake_start_time: i64,

    /// Committed duration in seconds. Reset on top-up along with the start
    /// time: topping up restarts the maturity clock.
    pub stake_duration: u64,

    /// Accumulator snapshot at last settlement; baseline for pending reward
    pub reward_debt: u128,

    /// Cumulative rewards ever claimed (direct or vested)
    pub total_rewards_claimed: u128,

    /// Cumulative penalties ever paid on early exits
    pub total_penalties_paid: u128,
}

impl StakePosition {
    /// Fresh position anchored at the current accumulator, so no backdated
    /// reward accrues
    pub fn new(acc_reward_per_share: u128) -> Self {
        Self {
            reward_debt: acc_reward_per_share,
            ..Default::default()
        }
    }

    /// Reward earned since the last settlement
    pub fn pending_reward(&self, acc_reward_per_share: u128) -> u128 {
        if self.staked == 0 {
            return 0;
        }
        mul_div(acc_reward_per_share - self.reward_debt, self.staked, PRECISION)
    }

    /// Settle against the accumulator: returns the pending reward and
    /// resets the debt baseline
    pub fn settle_to(&mut self, acc_reward_per_share: u128) -> u128 {
        let pending = self.pending_reward(acc_reward_per_share);
        self.reward_debt = acc_reward_per_share;
        pending
    }

    /// Add stake, resetting the maturity schedule to the new parameters
    pub fn add_stake(&mut self, amount: u128, duration: u64, now: i64) {
        self.staked += amount;
        self.stake_start_time = now;
        self.stake_duration = duration;
    }

    /// Whether the committed duration has fully elapsed
    pub fn is_mature(&self, now: i64) -> bool {
        now >= self.stake_start_time + self.stake_duration as i64
    }

    /// Early-exit penalty at the given rate, floor division. The systematic
    /// sub-unit under-penalization is accepted.
    pub fn penalty_at(&self, penalty_bps: u16) -> u128 {
        self.staked * penalty_bps as u128 / BPS_DENOMINATOR
    }

    /// Zero the live stake, retaining cumulative historical fields
    pub fn clear_stake(&mut self) {
        self.staked = 0;
        self.stake_start_time = 0;
        self.stake_duration = 0;
    }
}
