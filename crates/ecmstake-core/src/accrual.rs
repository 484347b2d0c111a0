//! # Reward Accrual Engine
//!
//! Maintains the per-pool `acc_reward_per_share` accumulator, advanced
//! lazily whenever time passes or the staked total changes. Three emission
//! strategies share the one accrual model:
//!
//! ```text
//! Linear:    reward(t) = rate_per_second * elapsed      (second precision)
//! Periodic:  fixed amount per period, pro-rated inside a partial period
//! Weekly:    explicit per-week table, whole weeks only (no pro-ration)
//! ```
//!
//! Every strategy is expressed as a cumulative emission function `f(t)`;
//! the increment between settlements is `f(to) - f(from)`, which makes
//! settlement idempotent and the accumulator monotone by construction.
//!
//! When `total_staked == 0` at settlement time the increment is recorded as
//! accrued-but-undistributed and does not inflate the accumulator, so a
//! later staker cannot retroactively capture reward that accrued while no
//! one was staked.

use serde::{Deserialize, Serialize};

use crate::constants::{PRECISION, SECONDS_PER_WEEK};
use crate::error::{EngineError, Result};
use crate::math::mul_div;
use crate::PoolId;

/// Emission strategy, one variant per schedule shape
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccrualStrategy {
    /// No strategy activated yet; nothing accrues
    Inactive,

    /// Continuous per-second emission over a fixed window
    Linear {
        /// `allocated_for_rewards / total_distribution_secs`, floor division.
        /// The undistributed remainder is accepted (bounded under 1% of the
        /// allocation in steady-state tests).
        rate_per_second: u128,
        start_time: i64,
        end_time: i64,
    },

    /// Fixed reward amount per non-overlapping period (e.g. monthly),
    /// pro-rated within a partial period
    Periodic {
        period_rewards: Vec<u128>,
        period_secs: u64,
        start_time: i64,
        /// Cursor advanced during settlement; derived, never authoritative
        current_period: usize,
    },

    /// Explicit per-week reward table, credited only for fully elapsed weeks
    Weekly {
        week_rewards: Vec<u128>,
        start_time: i64,
        /// Cursor advanced during settlement; derived, never authoritative
        current_week: usize,
    },
}

impl AccrualStrategy {
    /// Cumulative emission from strategy start through `t`
    pub fn cumulative_emitted(&self, t: i64) -> u128 {
        match self {
            Self::Inactive => 0,

            Self::Linear { rate_per_second, start_time, end_time } => {
                let clamped = t.clamp(*start_time, *end_time);
                let elapsed = (clamped - start_time) as u128;
                rate_per_second * elapsed
            }

            Self::Periodic { period_rewards, period_secs, start_time, .. } => {
                if t <= *start_time || *period_secs == 0 {
                    return 0;
                }
                let elapsed = (t - start_time) as u64;
                let full = (elapsed / period_secs) as usize;
                let mut total: u128 = period_rewards.iter().take(full).sum();
                if full < period_rewards.len() {
                    let into_period = (elapsed % period_secs) as u128;
                    total += period_rewards[full] * into_period / *period_secs as u128;
                }
                total
            }

            Self::Weekly { week_rewards, start_time, .. } => {
                if t <= *start_time {
                    return 0;
                }
                let weeks = ((t - start_time) as u64 / SECONDS_PER_WEEK) as usize;
                week_rewards.iter().take(weeks).sum()
            }
        }
    }

    /// Raw emission between two settlement points, before the allocation
    /// clamp. Zero when `to <= from`.
    pub fn pending_increment(&self, from: i64, to: i64) -> u128 {
        if to <= from {
            return 0;
        }
        self.cumulative_emitted(to)
            .saturating_sub(self.cumulative_emitted(from))
    }

    /// Index of the period/week containing `t`, capped at the table length
    fn cursor_at(&self, t: i64) -> usize {
        match self {
            Self::Inactive | Self::Linear { .. } => 0,
            Self::Periodic { period_rewards, period_secs, start_time, .. } => {
                if t <= *start_time || *period_secs == 0 {
                    return 0;
                }
                let idx = ((t - start_time) as u64 / period_secs) as usize;
                idx.min(period_rewards.len())
            }
            Self::Weekly { week_rewards, start_time, .. } => {
                if t <= *start_time {
                    return 0;
                }
                let idx = ((t - start_time) as u64 / SECONDS_PER_WEEK) as usize;
                idx.min(week_rewards.len())
            }
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Inactive)
    }
}

/// Result of one settlement pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SettleOutcome {
    /// Total newly accrued reward (clamped at the remaining allocation)
    pub increment: u128,

    /// Portion folded into the accumulator
    pub distributed: u128,

    /// Portion accrued while nothing was staked (bookkeeping only)
    pub undistributed: u128,
}

/// Lazy per-pool accumulator state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RewardAccrual {
    /// Cumulative reward per staked unit, scaled by [`PRECISION`].
    /// Monotonically non-decreasing.
    pub acc_reward_per_share: u128,

    /// Last settlement timestamp
    pub last_reward_timestamp: i64,

    /// Emission strategy, activated once per pool
    pub strategy: AccrualStrategy,
}

impl Default for RewardAccrual {
    fn default() -> Self {
        Self::new(chrono::Utc::now().timestamp())
    }
}

impl RewardAccrual {
    pub fn new(now: i64) -> Self {
        Self {
            acc_reward_per_share: 0,
            last_reward_timestamp: now,
            strategy: AccrualStrategy::Inactive,
        }
    }

    fn require_inactive(&self, pool: PoolId) -> Result<()> {
        if self.strategy.is_active() {
            return Err(EngineError::StrategyAlreadyActive(pool));
        }
        Ok(())
    }

    /// Activate continuous emission: `allocated / total_secs` per second,
    /// floor division, over `[now, now + total_secs]`
    pub fn activate_linear(
        &mut self,
        pool: PoolId,
        allocated_for_rewards: u128,
        total_distribution_secs: u64,
        now: i64,
    ) -> Result<()> {
        self.require_inactive(pool)?;
        if allocated_for_rewards == 0 {
            return Err(EngineError::NoRewardAllocation(pool));
        }
        if total_distribution_secs == 0 {
            return Err(EngineError::InvalidAmount(
                "distribution window must be non-zero".into(),
            ));
        }
        let rate_per_second = allocated_for_rewards / total_distribution_secs as u128;
        if rate_per_second == 0 {
            return Err(EngineError::InvalidAmount(
                "distribution window floors the per-second rate to zero".into(),
            ));
        }
        self.strategy = AccrualStrategy::Linear {
            rate_per_second,
            start_time: now,
            end_time: now + total_distribution_secs as i64,
        };
        self.last_reward_timestamp = now;
        Ok(())
    }

    /// Activate fixed-period emission
    pub fn activate_periodic(
        &mut self,
        pool: PoolId,
        allocated_for_rewards: u128,
        period_rewards: Vec<u128>,
        period_secs: u64,
        now: i64,
    ) -> Result<()> {
        self.require_inactive(pool)?;
        if allocated_for_rewards == 0 {
            return Err(EngineError::NoRewardAllocation(pool));
        }
        if period_rewards.is_empty() || period_secs == 0 {
            return Err(EngineError::InvalidAmount(
                "period table and period length must be non-zero".into(),
            ));
        }
        self.strategy = AccrualStrategy::Periodic {
            period_rewards,
            period_secs,
            start_time: now,
            current_period: 0,
        };
        self.last_reward_timestamp = now;
        Ok(())
    }

    /// Activate weekly-bucket emission
    pub fn activate_weekly(
        &mut self,
        pool: PoolId,
        allocated_for_rewards: u128,
        week_rewards: Vec<u128>,
        now: i64,
    ) -> Result<()> {
        self.require_inactive(pool)?;
        if allocated_for_rewards == 0 {
            return Err(EngineError::NoRewardAllocation(pool));
        }
        if week_rewards.is_empty() {
            return Err(EngineError::InvalidAmount("week table must be non-empty".into()));
        }
        self.strategy = AccrualStrategy::Weekly {
            week_rewards,
            start_time: now,
            current_week: 0,
        };
        self.last_reward_timestamp = now;
        Ok(())
    }

    /// Advance the accumulator to `now`.
    ///
    /// `already_accrued` is the pool's cumulative `total_rewards_accrued`
    /// counter; emission is clamped so that the lifetime accrual never
    /// exceeds `allocated_for_rewards`, upstream of any payout.
    pub fn settle(
        &mut self,
        now: i64,
        total_staked: u128,
        allocated_for_rewards: u128,
        already_accrued: u128,
    ) -> SettleOutcome {
        if now <= self.last_reward_timestamp {
            return SettleOutcome::default();
        }

        let raw = self.strategy.pending_increment(self.last_reward_timestamp, now);
        let remaining = allocated_for_rewards.saturating_sub(already_accrued);
        let increment = raw.min(remaining);

        let outcome = if total_staked > 0 {
            self.acc_reward_per_share += mul_div(increment, PRECISION, total_staked);
            SettleOutcome { increment, distributed: increment, undistributed: 0 }
        } else {
            SettleOutcome { increment, distributed: 0, undistributed: increment }
        };

        self.last_reward_timestamp = now;
        self.advance_cursor(now);
        outcome
    }

    /// Accumulator value as if settled at `now`, without mutating anything.
    /// Backs the read-only `pending_rewards` projection.
    pub fn projected_acc_per_share(
        &self,
        now: i64,
        total_staked: u128,
        allocated_for_rewards: u128,
        already_accrued: u128,
    ) -> u128 {
        if now <= self.last_reward_timestamp || total_staked == 0 {
            return self.acc_reward_per_share;
        }
        let raw = self.strategy.pending_increment(self.last_reward_timestamp, now);
        let remaining = allocated_for_rewards.saturating_sub(already_accrued);
        let increment = raw.min(remaining);
        self.acc_reward_per_share + mul_div(increment, PRECISION, total_staked)
    }

    fn advance_cursor(&mut self, now: i64) {
        let idx = self.strategy.cursor_at(now);
        match &mut self.strategy {
            AccrualStrategy::Periodic { current_period, .. } => *current_period = idx,
            AccrualStrategy::Weekly { current_week, .. } => *current_week = idx,
            _ => {}
        }
    }
}
