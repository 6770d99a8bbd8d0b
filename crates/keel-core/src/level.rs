//! Price level queue management.
//!
//! A price level contains all orders at a specific price,
//! organized as a FIFO queue (price-time priority). The level keeps a
//! running total of visible quantity so best-quantity queries are O(1).

use std::collections::VecDeque;

use crate::fixed::{Price, Quantity};
use crate::order::Order;
use crate::pool::OrderHandle;

/// A single price level in the order book.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    price: Price,
    /// Total visible quantity at this level.
    total_qty: Quantity,
    /// Handles in ascending sequence order.
    orders: VecDeque<OrderHandle>,
    /// Sequence of the most recent arrival, for the ordering check.
    last_sequence: u64,
}

impl PriceLevel {
    /// Create a new empty price level.
    pub fn new(price: Price) -> Self {
        Self {
            price,
            total_qty: Quantity::ZERO,
            orders: VecDeque::new(),
            last_sequence: 0,
        }
    }

    #[inline(always)]
    pub fn price(&self) -> Price {
        self.price
    }

    /// Move an empty level to another price.
    ///
    /// # Panics
    /// Panics if the level still holds orders.
    pub fn set_price(&mut self, price: Price) {
        assert!(
            self.orders.is_empty(),
            "cannot reprice level {} to {} while it holds {} orders",
            self.price,
            price,
            self.orders.len()
        );
        self.price = price;
        self.total_qty = Quantity::ZERO;
        self.last_sequence = 0;
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Number of orders at this level.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Aggregate visible quantity.
    #[inline(always)]
    pub fn quantity(&self) -> Quantity {
        self.total_qty
    }

    /// Append an order at the tail. Its sequence must already be assigned
    /// and be newer than everything queued here.
    pub fn add_order(&mut self, handle: OrderHandle, order: &Order) {
        let sequence = order.sequence.unwrap_or(0);
        debug_assert!(
            sequence > self.last_sequence,
            "sequence {} arrived after {}",
            sequence,
            self.last_sequence
        );
        self.last_sequence = sequence;
        self.orders.push_back(handle);
        self.total_qty += order.open_quantity;
    }

    /// Remove an order from anywhere in the queue.
    ///
    /// Returns false if the handle is not queued here.
    pub fn remove_order(&mut self, handle: OrderHandle, order: &Order) -> bool {
        match self.orders.iter().position(|h| *h == handle) {
            Some(pos) => {
                self.orders.remove(pos);
                self.total_qty = self.total_qty.saturating_sub(order.open_quantity);
                true
            }
            None => false,
        }
    }

    /// Head of the queue (for matching).
    #[inline(always)]
    pub fn front(&self) -> Option<OrderHandle> {
        self.orders.front().copied()
    }

    /// Execute `qty` against a queued order.
    ///
    /// Returns true when the order's visible quantity is exhausted, in
    /// which case it has been dequeued.
    ///
    /// # Panics
    /// Panics if `qty` exceeds the order's open quantity.
    pub fn fill(&mut self, handle: OrderHandle, order: &mut Order, qty: Quantity) -> bool {
        assert!(
            qty <= order.open_quantity,
            "fill of {} exceeds open quantity {} on order {:?}",
            qty,
            order.open_quantity,
            order.order_id
        );
        order.reduce(qty);
        self.total_qty = self.total_qty.saturating_sub(qty);

        if order.open_quantity.is_zero() {
            if let Some(pos) = self.orders.iter().position(|h| *h == handle) {
                self.orders.remove(pos);
            }
            true
        } else {
            false
        }
    }

    /// Take up to `amount` off an order's visible quantity (and, for an
    /// iceberg, off its total). The order stays queued even at zero.
    ///
    /// Returns the quantity actually removed.
    pub fn decrement_quantity(&mut self, order: &mut Order, amount: Quantity) -> Quantity {
        let applied = amount.min(order.open_quantity);
        order.reduce(applied);
        self.total_qty = self.total_qty.saturating_sub(applied);
        applied
    }

    /// Handles in time priority.
    pub fn iter(&self) -> impl Iterator<Item = OrderHandle> + '_ {
        self.orders.iter().copied()
    }
}
