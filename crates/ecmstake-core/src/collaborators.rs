//! # External Collaborators
//!
//! Narrow, synchronous-or-failing interfaces consumed by the engine. Their
//! internal logic is out of scope; the engine only requires that a failed
//! call has no effect, so an enclosing operation can reject before any
//! ledger mutation commits.
//!
//! The [`mock`] module carries in-memory reference implementations used by
//! the integration tests and the simulation harness.

use crate::error::Result;
use crate::AccountId;

/// Fungible asset ledger moving balances between accounts.
///
/// Implementations fail with `InsufficientBalance` / `InsufficientAllowance`
/// and nothing else; a successful call has moved exactly `amount`.
pub trait AssetLedger: Send + Sync {
    fn transfer_from(
        &self,
        asset: AccountId,
        owner: AccountId,
        recipient: AccountId,
        amount: u128,
    ) -> Result<()>;

    fn balance_of(&self, asset: AccountId, account: AccountId) -> u128;
}

/// Reserve-backed price oracle. The quote is a point-in-time snapshot with
/// no staleness guarantee; callers must not cache it across operations.
pub trait ReserveOracle: Send + Sync {
    /// Current reserves as `(ecm_reserve, quote_reserve)`
    fn get_reserves(&self, ecm_asset: AccountId, quote_asset: AccountId) -> Result<(u128, u128)>;
}

/// Vesting schedule service: accepts a beneficiary, amount, and duration,
/// and releases linearly over time
pub trait VestingScheduler: Send + Sync {
    fn create_vesting_schedule(
        &self,
        beneficiary: AccountId,
        amount: u128,
        duration: u64,
    ) -> Result<u64>;

    /// Custody account receiving the vested tokens
    fn depository(&self) -> AccountId;
}

/// Liquidity-provisioning manager. Receives asset transfers and later calls
/// back into the engine via `record_liquidity_added` once deployed.
pub trait LiquidityManager: Send + Sync {
    fn notify_received(
        &self,
        ecm_asset: AccountId,
        ecm_amount: u128,
        quote_asset: AccountId,
        quote_amount: u128,
    ) -> Result<()>;
}

/// In-memory collaborator implementations for tests and simulation
pub mod mock {
    use std::collections::HashMap;

    use parking_lot::Mutex;

    use super::*;
    use crate::error::EngineError;

    /// Balance-map asset ledger. Allowances are treated as granted; only
    /// balances gate transfers.
    #[derive(Default)]
    pub struct InMemoryLedger {
        balances: Mutex<HashMap<(AccountId, AccountId), u128>>,
    }

    impl InMemoryLedger {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn mint(&self, asset: AccountId, account: AccountId, amount: u128) {
            *self.balances.lock().entry((asset, account)).or_insert(0) += amount;
        }
    }

    impl AssetLedger for InMemoryLedger {
        fn transfer_from(
            &self,
            asset: AccountId,
            owner: AccountId,
            recipient: AccountId,
            amount: u128,
        ) -> Result<()> {
            let mut balances = self.balances.lock();
            let available = balances.get(&(asset, owner)).copied().unwrap_or(0);
            if available < amount {
                return Err(EngineError::InsufficientBalance { needed: amount, available });
            }
            *balances.get_mut(&(asset, owner)).unwrap() -= amount;
            *balances.entry((asset, recipient)).or_insert(0) += amount;
            Ok(())
        }

        fn balance_of(&self, asset: AccountId, account: AccountId) -> u128 {
            self.balances.lock().get(&(asset, account)).copied().unwrap_or(0)
        }
    }

    /// Oracle with fixed reserves, quoting a constant exchange rate
    pub struct FixedReserveOracle {
        pub ecm_reserve: u128,
        pub quote_reserve: u128,
    }

    impl ReserveOracle for FixedReserveOracle {
        fn get_reserves(
            &self,
            _ecm_asset: AccountId,
            _quote_asset: AccountId,
        ) -> Result<(u128, u128)> {
            Ok((self.ecm_reserve, self.quote_reserve))
        }
    }

    /// Vesting collaborator that records every schedule it is asked to create
    pub struct RecordingVesting {
        depository: AccountId,
        schedules: Mutex<Vec<(AccountId, u128, u64)>>,
    }

    impl RecordingVesting {
        pub fn new(depository: AccountId) -> Self {
            Self {
                depository,
                schedules: Mutex::new(Vec::new()),
            }
        }

        pub fn schedules(&self) -> Vec<(AccountId, u128, u64)> {
            self.schedules.lock().clone()
        }

        pub fn total_vested(&self) -> u128 {
            self.schedules.lock().iter().map(|(_, amount, _)| amount).sum()
        }
    }

    impl VestingScheduler for RecordingVesting {
        fn create_vesting_schedule(
            &self,
            beneficiary: AccountId,
            amount: u128,
            duration: u64,
        ) -> Result<u64> {
            let mut schedules = self.schedules.lock();
            schedules.push((beneficiary, amount, duration));
            Ok(schedules.len() as u64 - 1)
        }

        fn depository(&self) -> AccountId {
            self.depository
        }
    }

    /// Liquidity manager that accepts everything and remembers what arrived
    #[derive(Default)]
    pub struct PassiveLiquidityManager {
        received: Mutex<Vec<(u128, u128)>>,
    }

    impl PassiveLiquidityManager {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn received(&self) -> Vec<(u128, u128)> {
            self.received.lock().clone()
        }
    }

    impl LiquidityManager for PassiveLiquidityManager {
        fn notify_received(
            &self,
            _ecm_asset: AccountId,
            ecm_amount: u128,
            _quote_asset: AccountId,
            quote_amount: u128,
        ) -> Result<()> {
            self.received.lock().push((ecm_amount, quote_amount));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;
    use crate::error::EngineError;

    const ECM: AccountId = [1u8; 32];
    const ALICE: AccountId = [10u8; 32];
    const BOB: AccountId = [11u8; 32];

    #[test]
    fn test_ledger_transfer() {
        let ledger = InMemoryLedger::new();
        ledger.mint(ECM, ALICE, 1_000);

        ledger.transfer_from(ECM, ALICE, BOB, 400).unwrap();
        assert_eq!(ledger.balance_of(ECM, ALICE), 600);
        assert_eq!(ledger.balance_of(ECM, BOB), 400);
    }

    #[test]
    fn test_ledger_insufficient_balance() {
        let ledger = InMemoryLedger::new();
        ledger.mint(ECM, ALICE, 100);

        let err = ledger.transfer_from(ECM, ALICE, BOB, 200).unwrap_err();
        assert_eq!(err, EngineError::InsufficientBalance { needed: 200, available: 100 });
        // Failed transfer moved nothing
        assert_eq!(ledger.balance_of(ECM, ALICE), 100);
        assert_eq!(ledger.balance_of(ECM, BOB), 0);
    }

    #[test]
    fn test_recording_vesting() {
        let vesting = RecordingVesting::new([7u8; 32]);
        let id = vesting.create_vesting_schedule(ALICE, 500, 3600).unwrap();
        assert_eq!(id, 0);
        assert_eq!(vesting.total_vested(), 500);
    }
}
