//! Order types and lifecycle state.
//!
//! A submission arrives as a flat [`NewOrder`]. Admission turns it into an
//! [`Order`] whose [`OrderType`] only admits legal combinations of
//! market/limit, stop and iceberg. From then on the engine mutates the
//! order in place for its whole resting life.

use crate::fixed::{Amount, Price, Quantity};

/// Unique order identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct OrderId(pub u64);

impl OrderId {
    pub const MIN: Self = Self(u64::MIN);
    pub const MAX: Self = Self(u64::MAX);
}

/// Owner of an order. Self-match prevention compares these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct UserId(pub u64);

impl UserId {
    pub const MIN: Self = Self(u64::MIN);
    pub const MAX: Self = Self(u64::MAX);
}

/// Key into the fee schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct FeeId(pub u32);

/// Side of the order book.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    /// Bid side (buyers).
    Buy = 0,
    /// Ask side (sellers).
    Sell = 1,
}

impl Side {
    /// Get the opposite side.
    #[inline(always)]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    #[inline(always)]
    pub const fn is_buy(self) -> bool {
        matches!(self, Side::Buy)
    }
}

impl TryFrom<u8> for Side {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(Side::Buy),
            1 => Ok(Side::Sell),
            other => Err(other),
        }
    }
}

/// Time-in-force condition attached to a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum OrderCondition {
    /// Rest until filled, cancelled or expired.
    #[default]
    None = 0,
    /// Match what crosses now, cancel the rest.
    ImmediateOrCancel = 1,
    /// Fill completely right now or not at all.
    FillOrKill = 2,
    /// Only ever add liquidity; cancelled if it crossed on entry.
    BookOrCancel = 3,
}

impl TryFrom<u8> for OrderCondition {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(OrderCondition::None),
            1 => Ok(OrderCondition::ImmediateOrCancel),
            2 => Ok(OrderCondition::FillOrKill),
            3 => Ok(OrderCondition::BookOrCancel),
            other => Err(other),
        }
    }
}

/// What to do when an incoming order meets a resting order of the same user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SelfMatchAction {
    /// Trade as if the owners were different.
    #[default]
    Match = 0,
    /// Cancel the resting order and keep matching.
    CancelOldest = 1,
    /// Cancel the incoming order.
    CancelNewest = 2,
    /// Net both orders by the smaller open quantity.
    Decrement = 3,
}

impl TryFrom<u8> for SelfMatchAction {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(SelfMatchAction::Match),
            1 => Ok(SelfMatchAction::CancelOldest),
            2 => Ok(SelfMatchAction::CancelNewest),
            3 => Ok(SelfMatchAction::Decrement),
            other => Err(other),
        }
    }
}

/// Raw order submission, exactly as a client sends it.
///
/// Zero values carry meaning: `price == 0` is a market order,
/// `stop_price == 0` is not a stop, `total_quantity == 0` is not an
/// iceberg, `cancel_on == 0` never expires, `order_amount == 0` has no
/// notional budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub side: Side,
    pub price: Price,
    pub open_quantity: Quantity,
    pub stop_price: Price,
    pub total_quantity: Quantity,
    pub condition: OrderCondition,
    pub cancel_on: u64,
    pub order_amount: Amount,
    pub self_match_action: SelfMatchAction,
    pub fee_id: FeeId,
}

impl NewOrder {
    /// Plain good-till-cancel limit order.
    pub fn limit(order_id: u64, user_id: u64, side: Side, price: Price, qty: Quantity) -> Self {
        Self {
            order_id: OrderId(order_id),
            user_id: UserId(user_id),
            side,
            price,
            open_quantity: qty,
            stop_price: Price::ZERO,
            total_quantity: Quantity::ZERO,
            condition: OrderCondition::None,
            cancel_on: 0,
            order_amount: Amount::ZERO,
            self_match_action: SelfMatchAction::Match,
            fee_id: FeeId::default(),
        }
    }

    /// Market order for a quantity.
    pub fn market(order_id: u64, user_id: u64, side: Side, qty: Quantity) -> Self {
        Self::limit(order_id, user_id, side, Price::ZERO, qty)
    }

    pub fn with_condition(mut self, condition: OrderCondition) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_stop_price(mut self, stop_price: Price) -> Self {
        self.stop_price = stop_price;
        self
    }

    /// Turn into an iceberg showing `open_quantity` out of `total`.
    pub fn with_total_quantity(mut self, total: Quantity) -> Self {
        self.total_quantity = total;
        self
    }

    pub fn with_cancel_on(mut self, cancel_on: u64) -> Self {
        self.cancel_on = cancel_on;
        self
    }

    pub fn with_order_amount(mut self, amount: Amount) -> Self {
        self.order_amount = amount;
        self
    }

    pub fn with_self_match_action(mut self, action: SelfMatchAction) -> Self {
        self.self_match_action = action;
        self
    }

    pub fn with_fee_id(mut self, fee_id: FeeId) -> Self {
        self.fee_id = fee_id;
        self
    }
}

/// Validated shape of an order. Illegal flag combinations have no variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderType {
    Limit { price: Price },
    /// Market order bounded by its open quantity.
    Market,
    /// Market buy bounded by a notional budget. When `capped` the open
    /// quantity is an additional bound, otherwise only the budget limits it.
    MarketAmount { budget: Amount, capped: bool },
    StopLimit { price: Price, stop_price: Price },
    StopMarket { stop_price: Price },
    /// `total` is everything not yet filled, the visible tip included.
    Iceberg { price: Price, tip: Quantity, total: Quantity },
}

/// An admitted order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub side: Side,
    pub order_type: OrderType,
    pub condition: OrderCondition,
    /// Visible quantity still available for matching.
    pub open_quantity: Quantity,
    pub cancel_on: u64,
    pub self_match_action: SelfMatchAction,
    pub fee_id: FeeId,
    /// Time priority inside a price level; set on every entry into a book.
    pub sequence: Option<u64>,
    /// Accumulated notional traded.
    pub cost: Amount,
    /// Accumulated fee charged.
    pub fee: Amount,
}

impl Order {
    /// Build the working order for an admitted submission.
    pub fn admit(new_order: &NewOrder, order_type: OrderType) -> Self {
        Self {
            order_id: new_order.order_id,
            user_id: new_order.user_id,
            side: new_order.side,
            order_type,
            condition: new_order.condition,
            open_quantity: new_order.open_quantity,
            cancel_on: new_order.cancel_on,
            self_match_action: new_order.self_match_action,
            fee_id: new_order.fee_id,
            sequence: None,
            cost: Amount::ZERO,
            fee: Amount::ZERO,
        }
    }

    /// Limit price; zero for market and stop-market orders.
    #[inline]
    pub fn price(&self) -> Price {
        match self.order_type {
            OrderType::Limit { price }
            | OrderType::StopLimit { price, .. }
            | OrderType::Iceberg { price, .. } => price,
            OrderType::Market | OrderType::MarketAmount { .. } | OrderType::StopMarket { .. } => {
                Price::ZERO
            }
        }
    }

    /// Trigger price while the stop is still pending.
    #[inline]
    pub fn stop_price(&self) -> Option<Price> {
        match self.order_type {
            OrderType::StopLimit { stop_price, .. } | OrderType::StopMarket { stop_price } => {
                Some(stop_price)
            }
            _ => None,
        }
    }

    #[inline]
    pub fn is_market(&self) -> bool {
        matches!(self.order_type, OrderType::Market | OrderType::MarketAmount { .. })
    }

    #[inline]
    pub fn is_iceberg(&self) -> bool {
        matches!(self.order_type, OrderType::Iceberg { .. })
    }

    /// Remaining notional budget of an amount-bounded market buy.
    #[inline]
    pub fn budget(&self) -> Option<Amount> {
        match self.order_type {
            OrderType::MarketAmount { budget, .. } => Some(budget),
            _ => None,
        }
    }

    /// Everything not yet filled: the hidden reserve for icebergs,
    /// the open quantity otherwise.
    #[inline]
    pub fn remaining_total(&self) -> Quantity {
        match self.order_type {
            OrderType::Iceberg { total, .. } => total,
            _ => self.open_quantity,
        }
    }

    /// Iceberg quantity not yet shown.
    #[inline]
    pub fn hidden_quantity(&self) -> Quantity {
        match self.order_type {
            OrderType::Iceberg { total, .. } => total.saturating_sub(self.open_quantity),
            _ => Quantity::ZERO,
        }
    }

    /// Whether the order can still trade.
    pub fn has_remaining(&self) -> bool {
        match self.order_type {
            OrderType::MarketAmount { budget, capped } => {
                budget.is_positive() && (!capped || self.open_quantity.is_positive())
            }
            OrderType::Iceberg { total, .. } => total.is_positive(),
            _ => self.open_quantity.is_positive(),
        }
    }

    /// Whether a resting order at `resting_price` is marketable for this order.
    #[inline]
    pub fn crosses(&self, resting_price: Price) -> bool {
        let limit = self.price();
        if limit.is_zero() {
            return true;
        }
        match self.side {
            Side::Buy => limit >= resting_price,
            Side::Sell => limit <= resting_price,
        }
    }

    /// Remove `qty` that was traded or netted away.
    ///
    /// # Panics
    /// Panics if `qty` exceeds the open quantity.
    pub fn reduce(&mut self, qty: Quantity) {
        assert!(
            qty <= self.open_quantity || matches!(self.order_type, OrderType::MarketAmount { capped: false, .. }),
            "reduce of {} exceeds open quantity {} on order {:?}",
            qty,
            self.open_quantity,
            self.order_id
        );
        self.open_quantity = self.open_quantity.saturating_sub(qty);
        if let OrderType::Iceberg { total, .. } = &mut self.order_type {
            *total = total.saturating_sub(qty);
        }
    }

    /// Show the next slice of an iceberg once its tip is gone.
    /// Returns true if a new tip was exposed.
    pub fn refresh_tip(&mut self) -> bool {
        if let OrderType::Iceberg { tip, total, .. } = self.order_type {
            if self.open_quantity.is_zero() && total.is_positive() {
                self.open_quantity = tip.min(total);
                return true;
            }
        }
        false
    }

    /// Spend part of a market buy budget.
    pub fn spend(&mut self, notional: Amount) {
        if let OrderType::MarketAmount { budget, .. } = &mut self.order_type {
            *budget = budget.saturating_sub(notional);
        }
    }

    /// Release a pending stop into its live counterpart.
    pub fn trigger(&mut self) {
        self.order_type = match self.order_type {
            OrderType::StopLimit { price, .. } => OrderType::Limit { price },
            OrderType::StopMarket { .. } => OrderType::Market,
            other => other,
        };
    }
}
