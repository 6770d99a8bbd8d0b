//! Engine event sink.
//!
//! Every outcome the engine produces while processing a call is reported
//! synchronously through [`TradeListener`]. The engine holds the listener
//! as an `Option`; without one, events are simply not produced.

use crate::fixed::{Amount, Price, Quantity};
use crate::order::{OrderId, Side, UserId};

/// Why an order left the book without trading its remainder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CancelReason {
    UserRequested = 0,
    ImmediateOrCancel = 1,
    FillOrKill = 2,
    BookOrCancel = 3,
    ValidityExpired = 4,
    MarketOrderNoLiquidity = 5,
    /// Remaining budget buys less than one quantity step.
    MarketOrderCannotMatchLessThanStepSize = 6,
    SelfMatch = 7,
    /// The next trade's notional or fee would not fit in an [`Amount`].
    NotionalOverflow = 8,
}

/// Aggregate cost and fee of an order that is done trading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub cost: Amount,
    pub fee: Amount,
}

/// One execution between a resting maker and an incoming taker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fill {
    pub maker_order_id: OrderId,
    pub maker_user_id: UserId,
    pub taker_order_id: OrderId,
    pub taker_user_id: UserId,
    pub taker_side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub timestamp: u64,
    /// Set only when this fill finishes the maker.
    pub maker_final: Option<Settlement>,
    /// Set only when this fill finishes the taker.
    pub taker_final: Option<Settlement>,
}

/// An order leaving the engine untraded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cancel {
    pub order_id: OrderId,
    pub user_id: UserId,
    /// Quantity that will never trade, hidden iceberg reserve included.
    pub remaining_quantity: Quantity,
    pub cost: Amount,
    pub fee: Amount,
    pub reason: CancelReason,
}

/// What caused a decrement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DecrementOrigin {
    UserRequested = 0,
    SelfMatch = 1,
}

impl TryFrom<u8> for DecrementOrigin {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(DecrementOrigin::UserRequested),
            1 => Ok(DecrementOrigin::SelfMatch),
            other => Err(other),
        }
    }
}

/// Quantity taken off an order without trading it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decrement {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub quantity: Quantity,
    pub timestamp: u64,
    pub origin: DecrementOrigin,
}

/// Receives engine events. All methods default to no-ops.
pub trait TradeListener {
    fn on_accept(&mut self, _order_id: OrderId, _user_id: UserId) {}

    fn on_trade(&mut self, _fill: &Fill) {}

    fn on_cancel(&mut self, _cancel: &Cancel) {}

    fn on_order_triggered(&mut self, _order_id: OrderId, _user_id: UserId) {}

    fn on_self_match(&mut self, _incoming_order_id: OrderId, _resting_order_id: OrderId, _user_id: UserId) {}

    fn on_decrement(&mut self, _decrement: &Decrement) {}
}

/// Listener that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullListener;

impl TradeListener for NullListener {}
