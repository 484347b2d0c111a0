//! # Inventory Ledger
//!
//! Per-pool counters tracking every token movement category. Pure
//! bookkeeping: business operations in [`crate::engine`] mutate these
//! counters atomically with their side effects, and the derived
//! [`BalanceStatus`] view reconciles the counters for external auditing.
//!
//! ## Counter categories
//!
//! | Counter | Moves when |
//! |---------|------------|
//! | `allocated_for_sale` / `allocated_for_rewards` | operator deposits inventory |
//! | `sold`, `collected_quote_asset` | buy-and-stake purchase |
//! | `total_staked` | stake / unstake |
//! | `ecm_moved_to_liquidity`, `liquidity_pool_owed_ecm` | transfer to liquidity manager |
//! | `ecm_added_to_uniswap` | liquidity manager reports deployment |
//! | `ecm_vested`, `rewards_paid` | reward claim (vested vs direct) |
//! | `total_penalties_collected` | early unstake |
//!
//! `sold` is a permanent historical counter and is never decremented; after
//! a full unstake the divergence `sold > total_staked` is expected.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Per-pool token inventory
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PoolInventory {
    /// ECM deposited for sale to buyers
    pub allocated_for_sale: u128,

    /// ECM deposited to fund rewards
    pub allocated_for_rewards: u128,

    /// ECM sold to buyers (never decremented)
    pub sold: u128,

    /// ECM currently staked across all positions
    pub total_staked: u128,

    /// Quote asset collected from purchases, not yet moved to liquidity
    pub collected_quote_asset: u128,

    /// ECM transferred out to the liquidity manager
    pub ecm_moved_to_liquidity: u128,

    /// Receivable: transferred to the liquidity manager but not yet
    /// reported as deployed
    pub liquidity_pool_owed_ecm: u128,

    /// ECM the liquidity manager has reported as deployed
    pub ecm_added_to_uniswap: u128,

    /// ECM forwarded into vesting schedules instead of direct payout
    pub ecm_vested: u128,

    /// ECM paid out directly as rewards
    pub rewards_paid: u128,

    /// ECM collected as early-unstake penalties
    pub total_penalties_collected: u128,

    /// Cumulative reward accrued by the accumulator, distributed or not
    pub total_rewards_accrued: u128,

    /// Gross ECM ever staked (purchases and standalone stakes)
    pub lifetime_stake_volume: u128,

    /// Net ECM ever returned to unstakers (after penalties)
    pub lifetime_unstake_volume: u128,

    /// Users who have ever held a stake in this pool
    pub total_unique_stakers: u64,
}

/// Derived consistency report, recomputed on demand and never stored
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BalanceStatus {
    /// `allocated_for_sale + allocated_for_rewards`
    pub total_allocated: u128,

    /// Signed available inventory; negative values surface as `deficit`
    pub available_in_contract: i128,

    /// `max(0, -available_in_contract)`
    pub deficit: u128,
}

fn require_nonzero(amount: u128, what: &str) -> Result<()> {
    if amount == 0 {
        return Err(EngineError::InvalidAmount(format!("{} must be non-zero", what)));
    }
    Ok(())
}

impl PoolInventory {
    /// Record an operator deposit into the for-sale allocation
    pub fn allocate_for_sale(&mut self, amount: u128) -> Result<()> {
        require_nonzero(amount, "sale allocation")?;
        self.allocated_for_sale += amount;
        Ok(())
    }

    /// Record an operator deposit into the reward allocation
    pub fn allocate_for_rewards(&mut self, amount: u128) -> Result<()> {
        require_nonzero(amount, "reward allocation")?;
        self.allocated_for_rewards += amount;
        Ok(())
    }

    /// Record a purchase: `ecm_amount` sold against `quote_amount` received
    pub fn record_sale(&mut self, ecm_amount: u128, quote_amount: u128) -> Result<()> {
        require_nonzero(ecm_amount, "sale")?;
        let remaining = self.allocated_for_sale.saturating_sub(self.sold);
        if ecm_amount > remaining {
            return Err(EngineError::ExceedsSaleAllocation {
                requested: ecm_amount,
                remaining,
            });
        }
        self.sold += ecm_amount;
        self.collected_quote_asset += quote_amount;
        Ok(())
    }

    /// Record ECM entering the staked inventory
    pub fn record_stake(&mut self, amount: u128) -> Result<()> {
        require_nonzero(amount, "stake")?;
        self.total_staked += amount;
        self.lifetime_stake_volume += amount;
        Ok(())
    }

    /// Record ECM leaving the staked inventory.
    ///
    /// `gross` is the principal removed from the stake, `net` the amount
    /// actually returned to the user (gross minus penalty). Lifetime
    /// unstake volume counts the net amount.
    pub fn record_unstake(&mut self, gross: u128, net: u128) -> Result<()> {
        require_nonzero(gross, "unstake")?;
        if gross > self.total_staked {
            return Err(EngineError::InsufficientBalance {
                needed: gross,
                available: self.total_staked,
            });
        }
        self.total_staked -= gross;
        self.lifetime_unstake_volume += net;
        Ok(())
    }

    /// Record a collected early-exit penalty
    pub fn record_penalty(&mut self, amount: u128) {
        self.total_penalties_collected += amount;
    }

    /// Record a direct reward payout
    pub fn record_rewards_paid(&mut self, amount: u128) {
        self.rewards_paid += amount;
    }

    /// Record a reward forwarded into a vesting schedule
    pub fn record_vested(&mut self, amount: u128) {
        self.ecm_vested += amount;
    }

    /// Record reward accrued by the accumulator (distributed or not)
    pub fn record_accrued(&mut self, amount: u128) {
        self.total_rewards_accrued += amount;
    }

    /// Record a first-time staker
    pub fn record_unique_staker(&mut self) {
        self.total_unique_stakers += 1;
    }

    /// Preflight for [`Self::record_liquidity_transfer`]; used by the engine
    /// before any token leaves custody so a rejection has no side effect.
    pub fn check_liquidity_transfer(&self, ecm_amount: u128, quote_amount: u128) -> Result<()> {
        require_nonzero(ecm_amount, "liquidity transfer")?;
        if ecm_amount > self.total_staked {
            return Err(EngineError::InsufficientBalanceForTransfer {
                requested: ecm_amount,
                available: self.total_staked,
            });
        }
        if quote_amount > self.collected_quote_asset {
            return Err(EngineError::InsufficientBalanceForTransfer {
                requested: quote_amount,
                available: self.collected_quote_asset,
            });
        }
        Ok(())
    }

    /// Record an outbound transfer to the liquidity manager: a debit of the
    /// quote inventory plus an ECM receivable until the manager reports back
    pub fn record_liquidity_transfer(&mut self, ecm_amount: u128, quote_amount: u128) -> Result<()> {
        self.check_liquidity_transfer(ecm_amount, quote_amount)?;
        self.ecm_moved_to_liquidity += ecm_amount;
        self.liquidity_pool_owed_ecm += ecm_amount;
        self.collected_quote_asset -= quote_amount;
        Ok(())
    }

    /// Reconcile the liquidity receivable against a deployment report.
    /// Over-reporting beyond the outstanding receivable is rejected.
    pub fn record_liquidity_added(&mut self, ecm_amount: u128, _quote_amount: u128) -> Result<()> {
        require_nonzero(ecm_amount, "liquidity report")?;
        if ecm_amount > self.liquidity_pool_owed_ecm {
            return Err(EngineError::InvalidAmount(format!(
                "liquidity report of {} exceeds outstanding receivable {}",
                ecm_amount, self.liquidity_pool_owed_ecm
            )));
        }
        self.ecm_added_to_uniswap += ecm_amount;
        self.liquidity_pool_owed_ecm -= ecm_amount;
        Ok(())
    }

    /// Signed available inventory per the conservation equation
    pub fn available(&self) -> i128 {
        let credits = self.allocated_for_sale
            + self.allocated_for_rewards
            + self.liquidity_pool_owed_ecm;
        let debits = self.sold
            + self.rewards_paid
            + self.ecm_moved_to_liquidity
            + self.ecm_vested
            + self.total_penalties_collected;
        credits as i128 - debits as i128
    }

    /// Derived balance report, recomputed on demand
    pub fn balance_status(&self) -> BalanceStatus {
        let available = self.available();
        BalanceStatus {
            total_allocated: self.allocated_for_sale + self.allocated_for_rewards,
            available_in_contract: available,
            deficit: if available < 0 { (-available) as u128 } else { 0 },
        }
    }
}
