//! # Pool Configuration & Aggregate
//!
//! A [`Pool`] is one staking campaign: validated configuration, inventory
//! counters, the accrual accumulator, and the positions of its stakers.
//! Each pool is an independently lockable aggregate; no counter lives
//! outside exactly one pool record.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::accrual::RewardAccrual;
use crate::constants::{MAX_PENALTY_BPS, NULL_ACCOUNT};
use crate::error::{EngineError, Result};
use crate::ledger::{BalanceStatus, PoolInventory};
use crate::position::StakePosition;
use crate::{AccountId, PoolId};

/// Pool parameters, validated at creation and immutable afterwards
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    /// The staked/sold asset
    pub ecm_asset: AccountId,

    /// The purchase-side asset
    pub quote_asset: AccountId,

    /// Receiver of early-exit penalties
    pub penalty_receiver: AccountId,

    /// Liquidity manager account authorized for the deployment callback
    pub liquidity_manager: AccountId,

    /// Permitted stake durations in seconds
    pub allowed_durations: Vec<u64>,

    /// Upper bound on any stake duration
    pub max_duration: u64,

    /// Duration applied to vesting schedules created for reward payouts
    pub default_vesting_duration: u64,

    /// Route reward payouts through the vesting collaborator
    pub vest_rewards_by_default: bool,

    /// Early-exit penalty in basis points (2500 = 25%)
    pub penalty_bps: u16,

    /// Purchase/stake floor in smallest units
    pub minimum_stake: u128,
}

impl PoolConfig {
    /// Validate creation parameters; rejected configs leave no state behind
    pub fn validate(&self) -> Result<()> {
        if self.ecm_asset == NULL_ACCOUNT || self.quote_asset == NULL_ACCOUNT {
            return Err(EngineError::InvalidPoolConfig(
                "asset identifiers must be non-null".into(),
            ));
        }
        if self.ecm_asset == self.quote_asset {
            return Err(EngineError::InvalidPoolConfig(
                "traded assets must be distinct".into(),
            ));
        }
        if self.penalty_bps > MAX_PENALTY_BPS {
            return Err(EngineError::InvalidPoolConfig(format!(
                "penalty rate {} exceeds {} bps",
                self.penalty_bps, MAX_PENALTY_BPS
            )));
        }
        if self.allowed_durations.is_empty() {
            return Err(EngineError::InvalidPoolConfig(
                "allowed durations must be non-empty".into(),
            ));
        }
        if let Some(bad) = self
            .allowed_durations
            .iter()
            .find(|d| **d == 0 || **d > self.max_duration)
        {
            return Err(EngineError::InvalidPoolConfig(format!(
                "duration {}s outside (0, {}]",
                bad, self.max_duration
            )));
        }
        Ok(())
    }

    /// Check a requested stake duration against the allowed set
    pub fn check_duration(&self, duration: u64) -> Result<()> {
        if duration > self.max_duration || !self.allowed_durations.contains(&duration) {
            return Err(EngineError::DurationNotAllowed { duration });
        }
        Ok(())
    }
}

/// One staking campaign: config, inventory, accumulator, and positions
#[derive(Clone, Debug)]
pub struct Pool {
    pub id: PoolId,
    pub config: PoolConfig,
    pub inventory: PoolInventory,
    pub accrual: RewardAccrual,
    positions: HashMap<AccountId, StakePosition>,
}

/// Read-only pool snapshot for external callers
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolInfo {
    pub id: PoolId,
    pub config: PoolConfig,
    pub inventory: PoolInventory,
    pub acc_reward_per_share: u128,
    pub last_reward_timestamp: i64,
    pub position_count: usize,
}

impl Pool {
    pub fn new(id: PoolId, config: PoolConfig, now: i64) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            id,
            config,
            inventory: PoolInventory::default(),
            accrual: RewardAccrual::new(now),
            positions: HashMap::new(),
        })
    }

    /// Existing position for a user, if any
    pub fn position(&self, user: &AccountId) -> Option<&StakePosition> {
        self.positions.get(user)
    }

    /// Position for a user, created at the current accumulator on first
    /// touch. Returns whether the user is a first-ever staker.
    pub fn position_entry(&mut self, user: AccountId) -> (&mut StakePosition, bool) {
        let acc = self.accrual.acc_reward_per_share;
        let mut first = false;
        let pos = self.positions.entry(user).or_insert_with(|| {
            first = true;
            StakePosition::new(acc)
        });
        (pos, first)
    }

    pub fn position_mut(&mut self, user: &AccountId) -> Option<&mut StakePosition> {
        self.positions.get_mut(user)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Settle the accrual accumulator to `now`, folding the increment into
    /// the inventory's lifetime accrual counter
    pub fn settle(&mut self, now: i64) -> crate::accrual::SettleOutcome {
        let outcome = self.accrual.settle(
            now,
            self.inventory.total_staked,
            self.inventory.allocated_for_rewards,
            self.inventory.total_rewards_accrued,
        );
        self.inventory.record_accrued(outcome.increment);
        outcome
    }

    /// Derived balance report (never settles, never stores)
    pub fn balance_status(&self) -> BalanceStatus {
        self.inventory.balance_status()
    }

    pub fn snapshot(&self) -> PoolInfo {
        PoolInfo {
            id: self.id,
            config: self.config.clone(),
            inventory: self.inventory.clone(),
            acc_reward_per_share: self.accrual.acc_reward_per_share,
            last_reward_timestamp: self.accrual.last_reward_timestamp,
            position_count: self.positions.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> PoolConfig {
        PoolConfig {
            ecm_asset: [1u8; 32],
            quote_asset: [2u8; 32],
            penalty_receiver: [3u8; 32],
            liquidity_manager: [4u8; 32],
            allowed_durations: vec![30 * 24 * 3600, 90 * 24 * 3600],
            max_duration: 365 * 24 * 3600,
            default_vesting_duration: 180 * 24 * 3600,
            vest_rewards_by_default: false,
            penalty_bps: 2_500,
            minimum_stake: 100,
        }
    }

    #[test]
    fn test_valid_config_accepted() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_null_and_identical_assets_rejected() {
        let mut config = base_config();
        config.ecm_asset = NULL_ACCOUNT;
        assert!(matches!(config.validate(), Err(EngineError::InvalidPoolConfig(_))));

        let mut config = base_config();
        config.quote_asset = config.ecm_asset;
        assert!(matches!(config.validate(), Err(EngineError::InvalidPoolConfig(_))));
    }

    #[test]
    fn test_penalty_rate_bounds() {
        let mut config = base_config();
        config.penalty_bps = 10_000;
        assert!(config.validate().is_ok());

        config.penalty_bps = 10_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_set_validation() {
        let mut config = base_config();
        config.allowed_durations.clear();
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.allowed_durations.push(config.max_duration + 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_check_duration() {
        let config = base_config();
        assert!(config.check_duration(30 * 24 * 3600).is_ok());
        assert!(matches!(
            config.check_duration(31 * 24 * 3600),
            Err(EngineError::DurationNotAllowed { .. })
        ));
    }

    #[test]
    fn test_snapshot_serializes() {
        let pool = Pool::new(1, base_config(), 0).unwrap();
        let json = serde_json::to_string(&pool.snapshot()).unwrap();
        assert!(json.contains("\"penalty_bps\":2500"));
        assert!(json.contains("\"acc_reward_per_share\":0"));
    }

    #[test]
    fn test_first_staker_flag() {
        let mut pool = Pool::new(1, base_config(), 0).unwrap();
        let user = [9u8; 32];

        let (_, first) = pool.position_entry(user);
        assert!(first);
        let (_, first) = pool.position_entry(user);
        assert!(!first);
    }
}
