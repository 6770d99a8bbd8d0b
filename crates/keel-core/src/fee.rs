//! Maker/taker fee lookup.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::fixed::Amount;
use crate::order::FeeId;

/// Fee rates in percent of notional.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Fee {
    pub maker_rate: Decimal,
    pub taker_rate: Decimal,
}

impl Fee {
    pub fn new(maker_rate: Decimal, taker_rate: Decimal) -> Self {
        Self { maker_rate, taker_rate }
    }

    /// `None` when the fee on `notional` cannot be represented.
    #[inline]
    pub fn maker_fee(&self, notional: Amount, scale: u32) -> Option<Amount> {
        notional.percent(self.maker_rate, scale)
    }

    #[inline]
    pub fn taker_fee(&self, notional: Amount, scale: u32) -> Option<Amount> {
        notional.percent(self.taker_rate, scale)
    }
}

/// Source of fee rates, keyed by the order's fee id.
pub trait FeeProvider {
    fn get_fee(&self, fee_id: FeeId) -> Fee;
}

/// Fixed table of fee tiers with a fallback for unknown ids.
#[derive(Clone, Debug, Default)]
pub struct FeeSchedule {
    tiers: HashMap<FeeId, Fee>,
    fallback: Fee,
}

impl FeeSchedule {
    /// Schedule charging `fallback` to every fee id.
    pub fn flat(fallback: Fee) -> Self {
        Self { tiers: HashMap::new(), fallback }
    }

    pub fn with_tier(mut self, fee_id: FeeId, fee: Fee) -> Self {
        self.tiers.insert(fee_id, fee);
        self
    }
}

impl FeeProvider for FeeSchedule {
    fn get_fee(&self, fee_id: FeeId) -> Fee {
        self.tiers.get(&fee_id).copied().unwrap_or(self.fallback)
    }
}
