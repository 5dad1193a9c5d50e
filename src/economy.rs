//! The city treasury.
//!
//! Facilities bill the treasury as they treat patients and the city earns a fixed amount per
//! healthy character at the end of every day. Billing may drive the balance negative; voluntary
//! purchases (beds, vaccine research) go through [`ContextEconomyExt::try_spend`] and are refused
//! without enough funds.
use serde::{Deserialize, Serialize};

use crate::characters::{ContextCharacterExt, HealthCondition};
use crate::context::Context;
use crate::define_data_plugin;
use crate::log::{debug, trace};
use crate::schedule::HookHandle;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EconomyParams {
    pub starting_money: i64,
    pub income_per_healthy: i64,
}

impl Default for EconomyParams {
    fn default() -> Self {
        EconomyParams {
            starting_money: 400,
            income_per_healthy: 10,
        }
    }
}

/// Money moved during one simulated day
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DailyLedger {
    pub income: i64,
    pub expenses: i64,
}

struct Treasury {
    money: i64,
    income_per_healthy: i64,
    today: DailyLedger,
    last_day: DailyLedger,
    income_hook: Option<HookHandle>,
}

define_data_plugin!(
    TreasuryPlugin,
    Treasury,
    Treasury {
        money: EconomyParams::default().starting_money,
        income_per_healthy: EconomyParams::default().income_per_healthy,
        today: DailyLedger::default(),
        last_day: DailyLedger::default(),
        income_hook: None,
    }
);

fn collect_income(context: &mut Context) {
    let healthy = i64::try_from(context.count_by_health(HealthCondition::Healthy)).unwrap_or(i64::MAX);
    let treasury = context.get_data_mut(TreasuryPlugin);
    let income = healthy.saturating_mul(treasury.income_per_healthy);
    treasury.money += income;
    treasury.today.income += income;
    treasury.last_day = std::mem::take(&mut treasury.today);
    debug!("collected {income} from {healthy} healthy characters");
}

pub trait ContextEconomyExt {
    /// Set the balance and income rate and start collecting income at every day end. Calling it
    /// again resets the treasury without collecting twice.
    fn init_economy(&mut self, params: EconomyParams);

    fn money(&self) -> i64;

    /// What the city would earn if the day ended now
    fn projected_income(&self) -> i64;

    /// Deduct a bill. The balance may go negative.
    fn spend(&mut self, amount: i64, reason: &str);

    /// Deduct `amount` only if the balance covers it
    fn try_spend(&mut self, amount: i64, reason: &str) -> bool;

    /// Money moved during the current day so far
    fn ledger_today(&self) -> DailyLedger;

    /// Money moved during the last completed day
    fn ledger_last_day(&self) -> DailyLedger;
}

impl ContextEconomyExt for Context {
    fn init_economy(&mut self, params: EconomyParams) {
        let previous = self.get_data_mut(TreasuryPlugin).income_hook.take();
        if let Some(handle) = previous {
            self.unsubscribe_end_of_day(handle);
        }
        let handle = self.subscribe_end_of_day(collect_income);
        let treasury = self.get_data_mut(TreasuryPlugin);
        treasury.money = params.starting_money;
        treasury.income_per_healthy = params.income_per_healthy;
        treasury.today = DailyLedger::default();
        treasury.last_day = DailyLedger::default();
        treasury.income_hook = Some(handle);
    }

    fn money(&self) -> i64 {
        self.get_data(TreasuryPlugin)
            .map_or(EconomyParams::default().starting_money, |treasury| treasury.money)
    }

    fn projected_income(&self) -> i64 {
        let rate = self
            .get_data(TreasuryPlugin)
            .map_or(EconomyParams::default().income_per_healthy, |treasury| {
                treasury.income_per_healthy
            });
        let healthy = i64::try_from(self.count_by_health(HealthCondition::Healthy)).unwrap_or(i64::MAX);
        healthy.saturating_mul(rate)
    }

    fn spend(&mut self, amount: i64, reason: &str) {
        let treasury = self.get_data_mut(TreasuryPlugin);
        treasury.money -= amount;
        treasury.today.expenses += amount;
        trace!("spent {amount} on {reason}, balance {}", treasury.money);
    }

    fn try_spend(&mut self, amount: i64, reason: &str) -> bool {
        if self.money() < amount {
            debug!("cannot afford {reason} ({amount})");
            return false;
        }
        self.spend(amount, reason);
        true
    }

    fn ledger_today(&self) -> DailyLedger {
        self.get_data(TreasuryPlugin)
            .map(|treasury| treasury.today)
            .unwrap_or_default()
    }

    fn ledger_last_day(&self) -> DailyLedger {
        self.get_data(TreasuryPlugin)
            .map(|treasury| treasury.last_day)
            .unwrap_or_default()
    }
}
