//! # Staking Engine
//!
//! Facade over the pool arena. Every state-mutating operation:
//!
//! 1. locks exactly one pool for its whole duration (pools are independent
//!    units of concurrency, no cross-pool coordination),
//! 2. settles the accrual accumulator before reading it or changing the
//!    staked total,
//! 3. performs fallible collaborator calls before committing ledger
//!    mutations, so a rejected operation leaves no partial effect.
//!
//! The engine holds custody of pool inventories under a single asset-ledger
//! account; conservation between that account's literal balance and the
//! inventory counters is checked continuously by the simulation harness.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collaborators::{AssetLedger, LiquidityManager, ReserveOracle, VestingScheduler};
use crate::error::{EngineError, Result};
use crate::ledger::BalanceStatus;
use crate::pool::{Pool, PoolConfig, PoolInfo};
use crate::position::StakePosition;
use crate::{AccountId, PoolId};

/// Result of a full unstake
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct UnstakeOutcome {
    /// Gross principal removed from the stake
    pub staked: u128,

    /// Principal returned to the user (gross minus penalty)
    pub principal_returned: u128,

    /// Early-exit penalty sent to the pool's penalty receiver
    pub penalty: u128,

    /// Pending reward settled as part of the unstake
    pub reward: u128,

    /// Whether the reward went into a vesting schedule instead of a direct
    /// transfer
    pub reward_vested: bool,
}

/// Multi-pool staking engine
pub struct StakingEngine {
    /// Custody account holding pool inventories in the asset ledger
    account: AccountId,
    pools: RwLock<HashMap<PoolId, Arc<RwLock<Pool>>>>,
    next_pool_id: AtomicU64,
    ledger: Arc<dyn AssetLedger>,
    oracle: Arc<dyn ReserveOracle>,
    vesting: Arc<dyn VestingScheduler>,
    liquidity: Arc<dyn LiquidityManager>,
}

impl StakingEngine {
    pub fn new(
        account: AccountId,
        ledger: Arc<dyn AssetLedger>,
        oracle: Arc<dyn ReserveOracle>,
        vesting: Arc<dyn VestingScheduler>,
        liquidity: Arc<dyn LiquidityManager>,
    ) -> Self {
        Self {
            account,
            pools: RwLock::new(HashMap::new()),
            next_pool_id: AtomicU64::new(1),
            ledger,
            oracle,
            vesting,
            liquidity,
        }
    }

    /// The engine's custody account
    pub fn account(&self) -> AccountId {
        self.account
    }

    fn pool(&self, id: PoolId) -> Result<Arc<RwLock<Pool>>> {
        self.pools
            .read()
            .get(&id)
            .cloned()
            .ok_or(EngineError::PoolNotFound(id))
    }

    // === Pool lifecycle ===

    /// Validate and register a new pool
    pub fn create_pool(&self, config: PoolConfig, now: i64) -> Result<PoolId> {
        let id = self.next_pool_id.fetch_add(1, Ordering::SeqCst);
        let pool = Pool::new(id, config, now)?;
        self.pools.write().insert(id, Arc::new(RwLock::new(pool)));
        info!(pool = id, "pool created");
        Ok(id)
    }

    /// Deposit ECM into the for-sale allocation. The funder must hold the
    /// amount; the deposit lands in the engine's custody account.
    pub fn allocate_for_sale(
        &self,
        pool_id: PoolId,
        funder: AccountId,
        amount: u128,
    ) -> Result<()> {
        let pool_arc = self.pool(pool_id)?;
        let mut pool = pool_arc.write();
        if amount == 0 {
            return Err(EngineError::InvalidAmount("sale allocation must be non-zero".into()));
        }
        self.ledger
            .transfer_from(pool.config.ecm_asset, funder, self.account, amount)?;
        pool.inventory.allocate_for_sale(amount)?;
        info!(pool = pool_id, amount, "sale allocation deposited");
        Ok(())
    }

    /// Deposit ECM into the reward allocation
    pub fn allocate_for_rewards(
        &self,
        pool_id: PoolId,
        funder: AccountId,
        amount: u128,
    ) -> Result<()> {
        let pool_arc = self.pool(pool_id)?;
        let mut pool = pool_arc.write();
        if amount == 0 {
            return Err(EngineError::InvalidAmount("reward allocation must be non-zero".into()));
        }
        self.ledger
            .transfer_from(pool.config.ecm_asset, funder, self.account, amount)?;
        pool.inventory.allocate_for_rewards(amount)?;
        info!(pool = pool_id, amount, "reward allocation deposited");
        Ok(())
    }

    // === Strategy activation (one-shot per pool) ===

    /// Activate continuous per-second emission over `total_distribution_secs`
    pub fn set_linear_reward_rate(
        &self,
        pool_id: PoolId,
        total_distribution_secs: u64,
        now: i64,
    ) -> Result<()> {
        let pool_arc = self.pool(pool_id)?;
        let mut pool = pool_arc.write();
        let allocated = pool.inventory.allocated_for_rewards;
        pool.accrual
            .activate_linear(pool_id, allocated, total_distribution_secs, now)?;
        info!(pool = pool_id, secs = total_distribution_secs, "linear reward rate activated");
        Ok(())
    }

    /// Activate fixed-period emission from an explicit per-period table
    pub fn set_period_rewards(
        &self,
        pool_id: PoolId,
        period_rewards: Vec<u128>,
        period_secs: u64,
        now: i64,
    ) -> Result<()> {
        let pool_arc = self.pool(pool_id)?;
        let mut pool = pool_arc.write();
        let allocated = pool.inventory.allocated_for_rewards;
        pool.accrual
            .activate_periodic(pool_id, allocated, period_rewards, period_secs, now)?;
        info!(pool = pool_id, "periodic rewards activated");
        Ok(())
    }

    /// Activate weekly-bucket emission
    pub fn set_weekly_rewards(
        &self,
        pool_id: PoolId,
        week_rewards: Vec<u128>,
        now: i64,
    ) -> Result<()> {
        let pool_arc = self.pool(pool_id)?;
        let mut pool = pool_arc.write();
        let allocated = pool.inventory.allocated_for_rewards;
        pool.accrual
            .activate_weekly(pool_id, allocated, week_rewards, now)?;
        info!(pool = pool_id, "weekly rewards activated");
        Ok(())
    }

    // === Staking operations ===

    /// Stake ECM the user already holds
    pub fn stake(
        &self,
        pool_id: PoolId,
        user: AccountId,
        amount: u128,
        duration: u64,
        now: i64,
    ) -> Result<()> {
        let pool_arc = self.pool(pool_id)?;
        let mut pool = pool_arc.write();
        pool.config.check_duration(duration)?;
        if amount == 0 {
            return Err(EngineError::InvalidAmount("stake must be non-zero".into()));
        }
        if amount < pool.config.minimum_stake {
            return Err(EngineError::BelowMinimumStake {
                amount,
                minimum: pool.config.minimum_stake,
            });
        }

        self.settle_pool(&mut pool, now);
        let acc = pool.accrual.acc_reward_per_share;
        let pending = pool
            .position(&user)
            .map(|p| p.pending_reward(acc))
            .unwrap_or(0);
        self.check_reward_funds(&pool, pending)?;

        // Pull the principal, then settle the open position's reward so a
        // top-up never forfeits unclaimed reward.
        self.ledger
            .transfer_from(pool.config.ecm_asset, user, self.account, amount)?;
        let vested = if pending > 0 {
            self.pay_reward(&mut pool, user, pending)?
        } else {
            false
        };

        pool.inventory.record_stake(amount)?;
        let (pos, first) = pool.position_entry(user);
        pos.reward_debt = acc;
        pos.total_rewards_claimed += pending;
        pos.add_stake(amount, duration, now);
        if first {
            pool.inventory.record_unique_staker();
        }
        info!(
            pool = pool_id,
            user = %hex::encode(&user[..4]),
            amount,
            duration,
            auto_claimed = pending,
            vested,
            "stake"
        );
        Ok(())
    }

    /// Buy ECM at the oracle's spot rate and stake it in one operation.
    /// Returns the purchased ECM amount. `sold == total_staked` holds after
    /// every buy-and-stake while no standalone stake is open.
    pub fn buy_and_stake(
        &self,
        pool_id: PoolId,
        user: AccountId,
        quote_amount: u128,
        duration: u64,
        now: i64,
    ) -> Result<u128> {
        let pool_arc = self.pool(pool_id)?;
        let mut pool = pool_arc.write();
        pool.config.check_duration(duration)?;
        if quote_amount == 0 {
            return Err(EngineError::InvalidAmount("purchase must be non-zero".into()));
        }

        let (ecm_reserve, quote_reserve) = self
            .oracle
            .get_reserves(pool.config.ecm_asset, pool.config.quote_asset)?;
        if quote_reserve == 0 {
            return Err(EngineError::CollaboratorFailed("oracle reported empty reserves".into()));
        }
        let ecm_amount = quote_amount * ecm_reserve / quote_reserve;
        if ecm_amount < pool.config.minimum_stake {
            return Err(EngineError::BelowMinimumStake {
                amount: ecm_amount,
                minimum: pool.config.minimum_stake,
            });
        }
        let remaining = pool
            .inventory
            .allocated_for_sale
            .saturating_sub(pool.inventory.sold);
        if ecm_amount > remaining {
            return Err(EngineError::ExceedsSaleAllocation {
                requested: ecm_amount,
                remaining,
            });
        }

        self.settle_pool(&mut pool, now);
        let acc = pool.accrual.acc_reward_per_share;
        let pending = pool
            .position(&user)
            .map(|p| p.pending_reward(acc))
            .unwrap_or(0);
        self.check_reward_funds(&pool, pending)?;

        self.ledger
            .transfer_from(pool.config.quote_asset, user, self.account, quote_amount)?;
        let vested = if pending > 0 {
            self.pay_reward(&mut pool, user, pending)?
        } else {
            false
        };

        pool.inventory.record_sale(ecm_amount, quote_amount)?;
        pool.inventory.record_stake(ecm_amount)?;
        let (pos, first) = pool.position_entry(user);
        pos.reward_debt = acc;
        pos.total_rewards_claimed += pending;
        pos.add_stake(ecm_amount, duration, now);
        if first {
            pool.inventory.record_unique_staker();
        }
        info!(
            pool = pool_id,
            user = %hex::encode(&user[..4]),
            quote_amount,
            ecm_amount,
            auto_claimed = pending,
            vested,
            "buy and stake"
        );
        Ok(ecm_amount)
    }

    /// Claim pending reward. Zero pending is a soft no-op returning 0;
    /// claiming with no stake is an error.
    pub fn claim_rewards(&self, pool_id: PoolId, user: AccountId, now: i64) -> Result<u128> {
        let pool_arc = self.pool(pool_id)?;
        let mut pool = pool_arc.write();
        self.settle_pool(&mut pool, now);
        let acc = pool.accrual.acc_reward_per_share;

        let pending = match pool.position(&user) {
            Some(pos) if pos.staked > 0 => pos.pending_reward(acc),
            _ => return Err(EngineError::NoStakeFound(pool_id)),
        };
        if pending == 0 {
            return Ok(0);
        }

        let vested = self.pay_reward(&mut pool, user, pending)?;
        if let Some(pos) = pool.position_mut(&user) {
            pos.reward_debt = acc;
            pos.total_rewards_claimed += pending;
        }
        info!(
            pool = pool_id,
            user = %hex::encode(&user[..4]),
            amount = pending,
            vested,
            "rewards claimed"
        );
        Ok(pending)
    }

    /// Unstake the full position: settles and pays pending reward, then
    /// returns the principal. An early exit (before maturity) forfeits
    /// `staked * penalty_bps / 10000` to the pool's penalty receiver.
    pub fn unstake(&self, pool_id: PoolId, user: AccountId, now: i64) -> Result<UnstakeOutcome> {
        let pool_arc = self.pool(pool_id)?;
        let mut pool = pool_arc.write();
        self.settle_pool(&mut pool, now);
        let acc = pool.accrual.acc_reward_per_share;

        let (staked, pending, penalty) = match pool.position(&user) {
            Some(pos) if pos.staked > 0 => {
                let penalty = if pos.is_mature(now) {
                    0
                } else {
                    pos.penalty_at(pool.config.penalty_bps)
                };
                (pos.staked, pos.pending_reward(acc), penalty)
            }
            _ => return Err(EngineError::NoStakeFound(pool_id)),
        };
        let net = staked - penalty;

        // The whole outflow must be coverable before anything moves.
        let available = self.ledger.balance_of(pool.config.ecm_asset, self.account);
        let needed = staked + pending;
        if available < needed {
            return Err(EngineError::InsufficientBalance { needed, available });
        }

        let vested = if pending > 0 {
            self.pay_reward(&mut pool, user, pending)?
        } else {
            false
        };
        if net > 0 {
            self.ledger
                .transfer_from(pool.config.ecm_asset, self.account, user, net)?;
        }
        if penalty > 0 {
            self.ledger.transfer_from(
                pool.config.ecm_asset,
                self.account,
                pool.config.penalty_receiver,
                penalty,
            )?;
        }

        pool.inventory.record_unstake(staked, net)?;
        if penalty > 0 {
            pool.inventory.record_penalty(penalty);
        }
        if let Some(pos) = pool.position_mut(&user) {
            pos.reward_debt = acc;
            pos.total_rewards_claimed += pending;
            pos.total_penalties_paid += penalty;
            pos.clear_stake();
        }
        info!(
            pool = pool_id,
            user = %hex::encode(&user[..4]),
            staked,
            net,
            penalty,
            reward = pending,
            "unstake"
        );
        Ok(UnstakeOutcome {
            staked,
            principal_returned: net,
            penalty,
            reward: pending,
            reward_vested: vested,
        })
    }

    // === Liquidity flow ===

    /// Move staked-asset inventory plus collected quote funds to the
    /// liquidity manager. The ECM leg is tracked as both a debit and a
    /// receivable until the manager reports deployment back.
    pub fn transfer_to_liquidity(
        &self,
        pool_id: PoolId,
        ecm_amount: u128,
        quote_amount: u128,
    ) -> Result<()> {
        let pool_arc = self.pool(pool_id)?;
        let mut pool = pool_arc.write();
        pool.inventory.check_liquidity_transfer(ecm_amount, quote_amount)?;

        let manager = pool.config.liquidity_manager;
        self.ledger
            .transfer_from(pool.config.ecm_asset, self.account, manager, ecm_amount)?;
        if quote_amount > 0 {
            self.ledger
                .transfer_from(pool.config.quote_asset, self.account, manager, quote_amount)?;
        }
        self.liquidity.notify_received(
            pool.config.ecm_asset,
            ecm_amount,
            pool.config.quote_asset,
            quote_amount,
        )?;

        pool.inventory
            .record_liquidity_transfer(ecm_amount, quote_amount)?;
        info!(pool = pool_id, ecm_amount, quote_amount, "moved to liquidity manager");
        Ok(())
    }

    /// Inbound callback from the liquidity manager reporting deployed
    /// liquidity. The caller must be the pool's registered manager account.
    pub fn record_liquidity_added(
        &self,
        caller: AccountId,
        pool_id: PoolId,
        ecm_amount: u128,
        quote_amount: u128,
    ) -> Result<()> {
        let pool_arc = self.pool(pool_id)?;
        let mut pool = pool_arc.write();
        if caller != pool.config.liquidity_manager {
            return Err(EngineError::Unauthorized);
        }
        pool.inventory.record_liquidity_added(ecm_amount, quote_amount)?;
        info!(pool = pool_id, ecm_amount, quote_amount, "liquidity deployment reported");
        Ok(())
    }

    // === Read interfaces ===

    /// Full pool snapshot
    pub fn get_pool_info(&self, pool_id: PoolId) -> Result<PoolInfo> {
        Ok(self.pool(pool_id)?.read().snapshot())
    }

    /// Position snapshot; an untouched user reads as an empty position
    pub fn get_user_info(&self, pool_id: PoolId, user: AccountId) -> Result<StakePosition> {
        Ok(self
            .pool(pool_id)?
            .read()
            .position(&user)
            .cloned()
            .unwrap_or_default())
    }

    /// Derived balance report. Deficits are reported, never thrown.
    pub fn get_pool_balance_status(&self, pool_id: PoolId) -> Result<BalanceStatus> {
        let status = self.pool(pool_id)?.read().balance_status();
        if status.deficit > 0 {
            warn!(pool = pool_id, deficit = status.deficit, "pool reports a deficit");
        }
        Ok(status)
    }

    /// Read-only pending-reward projection, computed as-if settled at `now`
    /// without mutating the stored accumulator
    pub fn pending_rewards(&self, pool_id: PoolId, user: AccountId, now: i64) -> Result<u128> {
        let pool_arc = self.pool(pool_id)?;
        let pool = pool_arc.read();
        let acc = pool.accrual.projected_acc_per_share(
            now,
            pool.inventory.total_staked,
            pool.inventory.allocated_for_rewards,
            pool.inventory.total_rewards_accrued,
        );
        Ok(pool
            .position(&user)
            .map(|pos| pos.pending_reward(acc))
            .unwrap_or(0))
    }

    // === Internals ===

    fn settle_pool(&self, pool: &mut Pool, now: i64) {
        let outcome = pool.settle(now);
        if outcome.undistributed > 0 {
            debug!(
                pool = pool.id,
                undistributed = outcome.undistributed,
                "reward accrued with nothing staked"
            );
        }
    }

    /// Reject up front when the custody account cannot cover a direct
    /// reward payout, so later transfers in the same operation cannot
    /// strand a partial effect.
    fn check_reward_funds(&self, pool: &Pool, pending: u128) -> Result<()> {
        if pending == 0 {
            return Ok(());
        }
        let available = self.ledger.balance_of(pool.config.ecm_asset, self.account);
        if available < pending {
            return Err(EngineError::InsufficientBalance { needed: pending, available });
        }
        Ok(())
    }

    /// Route a reward payout: vesting pools forward tokens to the vesting
    /// depository and register a schedule, others transfer directly.
    /// Returns whether the payout was vested.
    fn pay_reward(&self, pool: &mut Pool, user: AccountId, amount: u128) -> Result<bool> {
        if pool.config.vest_rewards_by_default {
            self.ledger.transfer_from(
                pool.config.ecm_asset,
                self.account,
                self.vesting.depository(),
                amount,
            )?;
            self.vesting.create_vesting_schedule(
                user,
                amount,
                pool.config.default_vesting_duration,
            )?;
            pool.inventory.record_vested(amount);
            Ok(true)
        } else {
            self.ledger
                .transfer_from(pool.config.ecm_asset, self.account, user, amount)?;
            pool.inventory.record_rewards_paid(amount);
            Ok(false)
        }
    }
}
