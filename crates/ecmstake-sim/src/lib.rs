//! # ECM Staking Simulation Harness
//!
//! Drives long randomized operation sequences against a [`StakingEngine`]
//! wired to the in-memory collaborators, and audits the ledger invariants
//! after every single step:
//!
//! - the accumulator never decreases,
//! - any reported deficit stays bounded by the availability formula's
//!   double-debits (collected penalties and deployed liquidity),
//! - reward outflow never exceeds the reward allocation,
//! - the custody account's literal balance always equals
//!   `available + total_staked + penalties_collected - liquidity_owed`.
//!
//! Sequences are reproducible from a seed, so a violated invariant is a
//! replayable bug report.
//!
//! ## Usage
//!
//! ```bash
//! # Default scenario: 10k operations, 16 users, linear emission
//! cargo run --package ecmstake-sim
//!
//! # Reproduce a reported failure
//! cargo run --package ecmstake-sim -- --seed 42 --ops 50000 --strategy weekly
//! ```

use std::sync::Arc;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ecmstake_core::collaborators::mock::{
    FixedReserveOracle, InMemoryLedger, PassiveLiquidityManager, RecordingVesting,
};
use ecmstake_core::constants::SECONDS_PER_DAY;
use ecmstake_core::{AccountId, AssetLedger, PoolConfig, PoolId, StakingEngine};

const ENGINE_ACCOUNT: AccountId = [0xEE; 32];
const ECM: AccountId = [0x01; 32];
const USDX: AccountId = [0x02; 32];
const TREASURY: AccountId = [0x03; 32];
const LIQ_MANAGER: AccountId = [0x04; 32];
const VEST_DEPOSITORY: AccountId = [0x05; 32];
const OPERATOR: AccountId = [0x06; 32];

/// Emission strategy under test
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    Linear,
    Periodic,
    Weekly,
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(Self::Linear),
            "periodic" => Ok(Self::Periodic),
            "weekly" => Ok(Self::Weekly),
            other => Err(format!("unknown strategy '{}'", other)),
        }
    }
}

/// Simulation configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimConfig {
    /// RNG seed; identical seeds replay identical sequences
    pub seed: u64,

    /// Number of operations to attempt
    pub ops: u64,

    /// Simulated users
    pub users: u8,

    /// Maximum simulated-clock advance between operations, in seconds
    pub max_wait_secs: u64,

    /// Emission strategy to activate
    pub strategy: StrategyKind,

    /// Route rewards through the vesting collaborator
    pub vest_rewards: bool,

    /// ECM allocated for sale
    pub sale_allocation: u128,

    /// ECM allocated for rewards
    pub reward_allocation: u128,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            ops: 10_000,
            users: 16,
            max_wait_secs: 6 * 3600,
            strategy: StrategyKind::Linear,
            vest_rewards: false,
            sale_allocation: 100_000_000,
            // One year of seconds times 1000, so the linear strategy derives
            // a whole per-second rate instead of flooring to zero
            reward_allocation: 31_536_000_000,
        }
    }
}

/// Aggregated simulation outcome
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimReport {
    pub ops_attempted: u64,
    pub ops_applied: u64,
    pub ops_rejected: u64,
    pub stakes: u64,
    pub buys: u64,
    pub claims: u64,
    pub unstakes: u64,
    pub liquidity_moves: u64,
    pub liquidity_reports: u64,
    pub final_total_staked: u128,
    pub final_sold: u128,
    pub rewards_paid: u128,
    pub ecm_vested: u128,
    pub penalties_collected: u128,
    pub unique_stakers: u64,
    pub final_available: i128,
    pub max_deficit: u128,
    pub invariant_checks: u64,
}

/// An invariant violation, with everything needed to replay it
#[derive(Debug, thiserror::Error)]
#[error("invariant '{invariant}' violated at op {op} (seed {seed}): {detail}")]
pub struct InvariantViolation {
    pub invariant: &'static str,
    pub op: u64,
    pub seed: u64,
    pub detail: String,
}

/// Randomized operation driver around one engine and one pool
pub struct Simulator {
    config: SimConfig,
    engine: StakingEngine,
    ledger: Arc<InMemoryLedger>,
    pool: PoolId,
    rng: ChaCha8Rng,
    now: i64,
    last_acc: u128,
    report: SimReport,
}

impl Simulator {
    pub fn new(config: SimConfig) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let oracle = Arc::new(FixedReserveOracle { ecm_reserve: 50, quote_reserve: 1 });
        let vesting = Arc::new(RecordingVesting::new(VEST_DEPOSITORY));
        let liquidity = Arc::new(PassiveLiquidityManager::new());
        let engine = StakingEngine::new(
            ENGINE_ACCOUNT,
            ledger.clone(),
            oracle,
            vesting,
            liquidity,
        );

        let month = 30 * SECONDS_PER_DAY;
        let pool = engine
            .create_pool(
                PoolConfig {
                    ecm_asset: ECM,
                    quote_asset: USDX,
                    penalty_receiver: TREASURY,
                    liquidity_manager: LIQ_MANAGER,
                    allowed_durations: vec![month, 3 * month, 6 * month],
                    max_duration: 12 * month,
                    default_vesting_duration: 6 * month,
                    vest_rewards_by_default: config.vest_rewards,
                    penalty_bps: 2_500,
                    minimum_stake: 10,
                },
                0,
            )
            .expect("static pool config is valid");

        ledger.mint(ECM, OPERATOR, config.sale_allocation + config.reward_allocation);
        engine
            .allocate_for_sale(pool, OPERATOR, config.sale_allocation)
            .expect("funded allocation");
        engine
            .allocate_for_rewards(pool, OPERATOR, config.reward_allocation)
            .expect("funded allocation");

        let distribution = 365 * SECONDS_PER_DAY;
        match config.strategy {
            StrategyKind::Linear => engine
                .set_linear_reward_rate(pool, distribution, 0)
                .expect("activation on fresh pool"),
            StrategyKind::Periodic => {
                let per_period = config.reward_allocation / 12;
                engine
                    .set_period_rewards(pool, vec![per_period; 12], 30 * SECONDS_PER_DAY, 0)
                    .expect("activation on fresh pool")
            }
            StrategyKind::Weekly => {
                let per_week = config.reward_allocation / 52;
                engine
                    .set_weekly_rewards(pool, vec![per_week; 52], 0)
                    .expect("activation on fresh pool")
            }
        }

        // Users hold both assets so every operation kind stays reachable
        for n in 0..config.users {
            let account = Self::user(n);
            ledger.mint(ECM, account, 10_000_000);
            ledger.mint(USDX, account, 1_000_000);
        }

        let seed = config.seed;
        Self {
            config,
            engine,
            ledger,
            pool,
            rng: ChaCha8Rng::seed_from_u64(seed),
            now: 0,
            last_acc: 0,
            report: SimReport::default(),
        }
    }

    fn user(n: u8) -> AccountId {
        let mut id = [0u8; 32];
        id[0] = 0xA0;
        id[1] = n;
        id
    }

    /// Run the configured number of operations, auditing after each one
    pub fn run(mut self) -> Result<SimReport, InvariantViolation> {
        for op in 0..self.config.ops {
            self.step();
            self.audit(op)?;
        }
        info!(
            applied = self.report.ops_applied,
            rejected = self.report.ops_rejected,
            "simulation complete"
        );
        self.finalize();
        Ok(self.report)
    }

    fn step(&mut self) {
        self.now += self.rng.gen_range(0..=self.config.max_wait_secs) as i64;
        let user = Self::user(self.rng.gen_range(0..self.config.users));
        let month = 30 * SECONDS_PER_DAY;
        let durations = [month, 3 * month, 6 * month];
        let duration = durations[self.rng.gen_range(0..durations.len())];

        self.report.ops_attempted += 1;
        let applied = match self.rng.gen_range(0..100u32) {
            0..=29 => {
                let amount = self.rng.gen_range(10..100_000u128);
                let ok = self
                    .engine
                    .stake(self.pool, user, amount, duration, self.now)
                    .is_ok();
                if ok {
                    self.report.stakes += 1;
                }
                ok
            }
            30..=54 => {
                let quote = self.rng.gen_range(1..2_000u128);
                let ok = self
                    .engine
                    .buy_and_stake(self.pool, user, quote, duration, self.now)
                    .is_ok();
                if ok {
                    self.report.buys += 1;
                }
                ok
            }
            55..=74 => {
                let ok = self.engine.claim_rewards(self.pool, user, self.now).is_ok();
                if ok {
                    self.report.claims += 1;
                }
                ok
            }
            75..=89 => {
                let ok = self.engine.unstake(self.pool, user, self.now).is_ok();
                if ok {
                    self.report.unstakes += 1;
                }
                ok
            }
            90..=94 => {
                let ecm = self.rng.gen_range(1..50_000u128);
                let quote = self.rng.gen_range(0..500u128);
                let ok = self
                    .engine
                    .transfer_to_liquidity(self.pool, ecm, quote)
                    .is_ok();
                if ok {
                    self.report.liquidity_moves += 1;
                }
                ok
            }
            _ => {
                let owed = self
                    .engine
                    .get_pool_info(self.pool)
                    .expect("pool exists")
                    .inventory
                    .liquidity_pool_owed_ecm;
                if owed == 0 {
                    false
                } else {
                    let ecm = self.rng.gen_range(1..=owed);
                    let ok = self
                        .engine
                        .record_liquidity_added(LIQ_MANAGER, self.pool, ecm, 0)
                        .is_ok();
                    if ok {
                        self.report.liquidity_reports += 1;
                    }
                    ok
                }
            }
        };

        if applied {
            self.report.ops_applied += 1;
        } else {
            self.report.ops_rejected += 1;
            debug!(op = self.report.ops_attempted, "operation rejected");
        }
    }

    fn audit(&mut self, op: u64) -> Result<(), InvariantViolation> {
        let info = self.engine.get_pool_info(self.pool).expect("pool exists");
        let status = self
            .engine
            .get_pool_balance_status(self.pool)
            .expect("pool exists");

        if info.acc_reward_per_share < self.last_acc {
            return Err(self.violation("accumulator-monotone", op, format!(
                "acc {} < previous {}",
                info.acc_reward_per_share, self.last_acc
            )));
        }
        self.last_acc = info.acc_reward_per_share;

        // Deficit is a reported status, not an error: the availability
        // formula debits an early-exit penalty twice (inside `sold` and
        // again as collected penalties) and likewise debits deployed
        // liquidity taken from staked principal. Those two sources bound
        // any legitimate deficit.
        let deficit_bound = info.inventory.total_penalties_collected
            + info.inventory.ecm_added_to_uniswap;
        if status.deficit > deficit_bound {
            return Err(self.violation("deficit-bounded", op, format!(
                "deficit {} exceeds penalty + deployed-liquidity bound {}",
                status.deficit, deficit_bound
            )));
        }
        self.report.max_deficit = self.report.max_deficit.max(status.deficit);

        if info.inventory.rewards_paid + info.inventory.ecm_vested
            > info.inventory.allocated_for_rewards
        {
            return Err(self.violation("reward-allocation-cap", op, format!(
                "paid {} + vested {} > allocated {}",
                info.inventory.rewards_paid,
                info.inventory.ecm_vested,
                info.inventory.allocated_for_rewards
            )));
        }

        // Conservation: the custody balance must match the counters exactly.
        // Liquidity owed is subtracted because those tokens have physically
        // left custody while the receivable keeps them in `available`.
        let expected = status.available_in_contract
            + info.inventory.total_staked as i128
            + info.inventory.total_penalties_collected as i128
            - info.inventory.liquidity_pool_owed_ecm as i128;
        let actual = self.ledger.balance_of(ECM, ENGINE_ACCOUNT) as i128;
        if actual != expected {
            return Err(self.violation("conservation", op, format!(
                "custody balance {} != derived {}",
                actual, expected
            )));
        }

        self.report.invariant_checks += 1;
        Ok(())
    }

    fn violation(&self, invariant: &'static str, op: u64, detail: String) -> InvariantViolation {
        InvariantViolation {
            invariant,
            op,
            seed: self.config.seed,
            detail,
        }
    }

    fn finalize(&mut self) {
        let info = self.engine.get_pool_info(self.pool).expect("pool exists");
        let status = self
            .engine
            .get_pool_balance_status(self.pool)
            .expect("pool exists");
        self.report.final_total_staked = info.inventory.total_staked;
        self.report.final_sold = info.inventory.sold;
        self.report.rewards_paid = info.inventory.rewards_paid;
        self.report.ecm_vested = info.inventory.ecm_vested;
        self.report.penalties_collected = info.inventory.total_penalties_collected;
        self.report.unique_stakers = info.inventory.total_unique_stakers;
        self.report.final_available = status.available_in_contract;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scenario_holds_invariants() {
        let report = Simulator::new(SimConfig {
            ops: 2_000,
            ..Default::default()
        })
        .run()
        .expect("no invariant violation");

        assert_eq!(report.invariant_checks, 2_000);
        assert!(report.ops_applied > 0);
        // The derived linear rate is non-zero, so rewards actually flow
        assert!(report.rewards_paid > 0);
    }

    #[test]
    fn test_same_seed_replays_identically() {
        let config = SimConfig { ops: 500, seed: 7, ..Default::default() };
        let a = Simulator::new(config.clone()).run().unwrap();
        let b = Simulator::new(config).run().unwrap();

        assert_eq!(a.ops_applied, b.ops_applied);
        assert_eq!(a.rewards_paid, b.rewards_paid);
        assert_eq!(a.final_total_staked, b.final_total_staked);
    }

    #[test]
    fn test_weekly_strategy_scenario() {
        let report = Simulator::new(SimConfig {
            ops: 1_000,
            strategy: StrategyKind::Weekly,
            seed: 3,
            ..Default::default()
        })
        .run()
        .expect("no invariant violation");
        assert_eq!(report.invariant_checks, 1_000);
    }

    #[test]
    fn test_vested_scenario() {
        let report = Simulator::new(SimConfig {
            ops: 1_000,
            vest_rewards: true,
            seed: 5,
            ..Default::default()
        })
        .run()
        .expect("no invariant violation");
        assert!(report.ecm_vested > 0, "claims must route through vesting");
        assert_eq!(report.rewards_paid, 0, "vesting pools never pay directly");
    }
}
