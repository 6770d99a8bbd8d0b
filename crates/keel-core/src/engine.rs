//! Matching engine core.
//!
//! Price-time priority matching for a single instrument. Every call runs
//! to completion synchronously: admission, expiry sweep, matching, stop
//! triggering and time-in-force handling all happen before it returns,
//! and every outcome is reported through the [`TradeListener`].
//!
//! Stop orders released by a trade are not matched recursively. They are
//! queued and processed, in release order, once the order that triggered
//! them is finished.

use std::collections::{BTreeSet, HashSet, VecDeque};

use tracing::{debug, trace};

use crate::book::OrderBook;
use crate::config::EngineConfig;
use crate::fee::FeeProvider;
use crate::fixed::{Amount, Price, Quantity};
use crate::listener::{Cancel, CancelReason, Decrement, DecrementOrigin, Fill, Settlement, TradeListener};
use crate::order::{NewOrder, Order, OrderCondition, OrderId, OrderType, SelfMatchAction, Side};
use crate::pool::OrderHandle;
use crate::validate::{validate, RejectReason};

/// Synchronous answer to an engine call.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderMatchingResult {
    OrderAccepted,
    CancelAccepted,
    DecrementAccepted,
    OrderDoesNotExists,
    Rejected(RejectReason),
}

/// How the matching loop ended for an incoming order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MatchOutcome {
    /// Nothing left to match against, or nothing left to match.
    Exhausted,
    /// Remaining budget cannot buy a single step.
    Dust,
    /// Self-match prevention already cancelled the incoming order.
    Cancelled,
    /// The next trade's money would not fit in an [`Amount`].
    Overflow,
}

/// Terms of one trade, worked out before anything is mutated.
#[derive(Clone, Copy, Debug)]
struct TradeTerms {
    price: Price,
    quantity: Quantity,
    notional: Amount,
    maker_fee: Amount,
    taker_fee: Amount,
}

/// Single-instrument matching engine.
pub struct MatchingEngine<L, F> {
    book: OrderBook,
    config: EngineConfig,
    fee_provider: F,
    listener: Option<L>,
    /// Every id ever admitted.
    accepted_orders: HashSet<OrderId>,
    /// (cancel_on, id) of resting good-till-date orders, live or stop.
    expiries: BTreeSet<(u64, OrderId)>,
    /// Stop orders released and waiting to be processed as takers.
    triggered: VecDeque<Order>,
    /// Price of the most recent trade.
    market_price: Option<Price>,
    /// Timestamp of the most recent `add_order`.
    timestamp: u64,
}

impl<L: TradeListener, F: FeeProvider> MatchingEngine<L, F> {
    pub fn new(config: EngineConfig, fee_provider: F, listener: Option<L>) -> Self {
        Self {
            book: OrderBook::new(),
            config,
            fee_provider,
            listener,
            accepted_orders: HashSet::new(),
            expiries: BTreeSet::new(),
            triggered: VecDeque::new(),
            market_price: None,
            timestamp: 0,
        }
    }

    /// Submit a new order.
    pub fn add_order(&mut self, new_order: NewOrder, timestamp: u64) -> OrderMatchingResult {
        if self.accepted_orders.contains(&new_order.order_id) {
            debug!(order_id = new_order.order_id.0, "duplicate order id rejected");
            return OrderMatchingResult::Rejected(RejectReason::DuplicateOrder);
        }
        let order_type = match validate(&new_order, &self.config) {
            Ok(order_type) => order_type,
            Err(reason) => {
                debug!(order_id = new_order.order_id.0, %reason, "order rejected");
                return OrderMatchingResult::Rejected(reason);
            }
        };

        self.timestamp = timestamp;
        self.accepted_orders.insert(new_order.order_id);
        let (order_id, user_id) = (new_order.order_id, new_order.user_id);
        self.emit(|l| l.on_accept(order_id, user_id));

        self.expire_orders(timestamp);

        self.triggered.push_back(Order::admit(&new_order, order_type));
        while let Some(order) = self.triggered.pop_front() {
            self.process(order, timestamp);
        }
        OrderMatchingResult::OrderAccepted
    }

    /// Cancel a resting order, live or stop.
    pub fn cancel_order(&mut self, order_id: OrderId) -> OrderMatchingResult {
        let Some(handle) = self.book.handle_of(order_id) else {
            return OrderMatchingResult::OrderDoesNotExists;
        };
        let order = self.book.remove_order(handle);
        self.untrack_expiry(&order);
        self.cancel(&order, CancelReason::UserRequested);
        OrderMatchingResult::CancelAccepted
    }

    /// Take up to `amount` off a resting order's visible quantity. The
    /// order keeps its place even at zero.
    pub fn decrement_quantity(&mut self, order_id: OrderId, amount: Quantity) -> OrderMatchingResult {
        if !amount.is_positive() {
            return OrderMatchingResult::Rejected(RejectReason::InvalidQuantity);
        }
        let Some(handle) = self.book.handle_of(order_id) else {
            return OrderMatchingResult::OrderDoesNotExists;
        };
        let applied = self.book.decrement_order(handle, amount);
        let order = self.book.order(handle);
        let decrement = Decrement {
            order_id,
            user_id: order.user_id,
            quantity: applied,
            timestamp: self.timestamp,
            origin: DecrementOrigin::UserRequested,
        };
        self.emit(|l| l.on_decrement(&decrement));
        OrderMatchingResult::DecrementAccepted
    }

    #[inline]
    fn emit(&mut self, event: impl FnOnce(&mut L)) {
        if let Some(listener) = self.listener.as_mut() {
            event(listener);
        }
    }

    fn cancel(&mut self, order: &Order, reason: CancelReason) {
        let cancel = Cancel {
            order_id: order.order_id,
            user_id: order.user_id,
            remaining_quantity: order.remaining_total(),
            cost: order.cost,
            fee: order.fee,
            reason,
        };
        self.emit(|l| l.on_cancel(&cancel));
    }

    /// Cancel every resting order whose validity ended at or before `timestamp`.
    fn expire_orders(&mut self, timestamp: u64) {
        while let Some(&(cancel_on, order_id)) = self.expiries.first() {
            if cancel_on > timestamp {
                break;
            }
            self.expiries.pop_first();
            if let Some(handle) = self.book.handle_of(order_id) {
                let order = self.book.remove_order(handle);
                debug!(order_id = order_id.0, cancel_on, timestamp, "resting order expired");
                self.cancel(&order, CancelReason::ValidityExpired);
            }
        }
    }

    fn track_expiry(&mut self, order: &Order) {
        if order.cancel_on != 0 {
            self.expiries.insert((order.cancel_on, order.order_id));
        }
    }

    /// Forget the expiry of an order that left the book.
    fn untrack_expiry(&mut self, order: &Order) {
        if order.cancel_on != 0 {
            self.expiries.remove(&(order.cancel_on, order.order_id));
        }
    }

    /// Run one order through stop handling, matching and time in force.
    fn process(&mut self, mut order: Order, timestamp: u64) {
        if order.cancel_on != 0 && order.cancel_on <= timestamp {
            debug!(order_id = order.order_id.0, cancel_on = order.cancel_on, "order expired on arrival");
            self.cancel(&order, CancelReason::ValidityExpired);
            return;
        }

        if let Some(stop_price) = order.stop_price() {
            let in_the_money = self.market_price.is_some_and(|last| match order.side {
                Side::Buy => last >= stop_price,
                Side::Sell => last <= stop_price,
            });
            if !in_the_money {
                self.track_expiry(&order);
                self.book.add_stop_order(order);
                return;
            }
            debug!(order_id = order.order_id.0, %stop_price, "stop order triggered on arrival");
            let (order_id, user_id) = (order.order_id, order.user_id);
            self.emit(|l| l.on_order_triggered(order_id, user_id));
            order.trigger();
        }

        if order.condition == OrderCondition::FillOrKill && !self.can_fill_completely(&order) {
            debug!(order_id = order.order_id.0, "fill-or-kill order cannot fill");
            self.cancel(&order, CancelReason::FillOrKill);
            return;
        }

        let crossed_at_entry = order.condition == OrderCondition::BookOrCancel
            && self
                .best_opposite_price(order.side)
                .is_some_and(|price| order.crosses(price));

        let outcome = self.match_order(&mut order, timestamp);
        if outcome == MatchOutcome::Cancelled {
            return;
        }

        if !order.has_remaining() {
            if crossed_at_entry {
                self.cancel(&order, CancelReason::BookOrCancel);
            }
            return;
        }

        let reason = match order.condition {
            _ if outcome == MatchOutcome::Overflow => Some(CancelReason::NotionalOverflow),
            // A budget down to dust is spent, whatever the time in force.
            _ if outcome == MatchOutcome::Dust => Some(CancelReason::MarketOrderCannotMatchLessThanStepSize),
            OrderCondition::ImmediateOrCancel => Some(CancelReason::ImmediateOrCancel),
            OrderCondition::FillOrKill => Some(CancelReason::FillOrKill),
            OrderCondition::BookOrCancel if crossed_at_entry => Some(CancelReason::BookOrCancel),
            _ if order.is_market() => Some(CancelReason::MarketOrderNoLiquidity),
            _ => None,
        };
        match reason {
            Some(reason) => self.cancel(&order, reason),
            None => {
                self.track_expiry(&order);
                self.book.add_order_open_book(order);
            }
        }
    }

    fn best_opposite_price(&self, side: Side) -> Option<Price> {
        match side {
            Side::Buy => self.book.best_ask_price(),
            Side::Sell => self.book.best_bid_price(),
        }
    }

    /// Check whether a fill-or-kill order would fill completely.
    fn can_fill_completely(&self, order: &Order) -> bool {
        let action = self_match_action(order);
        let owner = (action != SelfMatchAction::Match).then_some((order.user_id, action));
        match order.order_type {
            OrderType::MarketAmount { budget, capped } => {
                self.book.check_can_fill_market_order_amount(order.side, budget, owner)
                    || (capped
                        && self
                            .book
                            .check_can_fill_order(order.side, order.open_quantity, Price::ZERO, owner))
            }
            _ => self
                .book
                .check_can_fill_order(order.side, order.remaining_total(), order.price(), owner),
        }
    }

    /// Match an incoming order against the opposite side.
    fn match_order(&mut self, order: &mut Order, timestamp: u64) -> MatchOutcome {
        while order.has_remaining() {
            let Some(handle) = self.book.best_order_to_match(order.side.opposite()) else {
                break;
            };
            let resting = *self.book.order(handle);
            if !order.crosses(resting.price()) {
                break;
            }

            if resting.open_quantity.is_zero() {
                self.replenish_or_drop(handle);
                continue;
            }

            if resting.user_id == order.user_id && order.self_match_action != SelfMatchAction::Match {
                if self.prevent_self_match(order, handle, &resting) {
                    continue;
                }
                return MatchOutcome::Cancelled;
            }

            let price = resting.price();
            let mut qty = match order.order_type {
                OrderType::MarketAmount { capped: false, .. } => resting.open_quantity,
                _ => order.open_quantity.min(resting.open_quantity),
            };
            if let Some(budget) = order.budget() {
                let affordable = budget
                    .units_at(price)
                    .unwrap_or(Quantity::ZERO)
                    .floor_to_step(self.config.step_size);
                qty = qty.min(affordable);
                if qty.is_zero() {
                    debug!(order_id = order.order_id.0, %budget, %price, "budget below one step");
                    return MatchOutcome::Dust;
                }
            }

            let Some(terms) = self.terms(order, &resting, price, qty) else {
                debug!(order_id = order.order_id.0, %price, %qty, "trade value out of range");
                return MatchOutcome::Overflow;
            };
            self.execute(order, handle, &resting, terms, timestamp);
        }
        MatchOutcome::Exhausted
    }

    /// Resolve a resting order whose visible quantity was decremented away.
    fn replenish_or_drop(&mut self, handle: OrderHandle) {
        let mut order = self.book.remove_order(handle);
        if order.refresh_tip() {
            self.book.add_order_open_book(order);
        } else {
            debug!(order_id = order.order_id.0, "dropping exhausted resting order");
            self.untrack_expiry(&order);
        }
    }

    /// Apply the incoming order's self-match action. Returns true if
    /// matching should continue.
    fn prevent_self_match(&mut self, order: &mut Order, handle: OrderHandle, resting: &Order) -> bool {
        let (incoming_id, resting_id, user_id) = (order.order_id, resting.order_id, order.user_id);
        self.emit(|l| l.on_self_match(incoming_id, resting_id, user_id));

        let action = self_match_action(order);
        debug!(
            incoming = incoming_id.0,
            resting = resting_id.0,
            user_id = user_id.0,
            ?action,
            "self match"
        );

        match action {
            SelfMatchAction::CancelNewest => {
                self.cancel(order, CancelReason::SelfMatch);
                false
            }
            SelfMatchAction::Decrement if resting.open_quantity <= order.open_quantity => {
                let removed = self.book.remove_order(handle);
                self.untrack_expiry(&removed);
                self.cancel(&removed, CancelReason::SelfMatch);

                order.reduce(removed.open_quantity);
                order.refresh_tip();
                let decrement = Decrement {
                    order_id: incoming_id,
                    user_id,
                    quantity: removed.open_quantity,
                    timestamp: self.timestamp,
                    origin: DecrementOrigin::SelfMatch,
                };
                self.emit(|l| l.on_decrement(&decrement));
                true
            }
            SelfMatchAction::Decrement => {
                let applied = self.book.decrement_order(handle, order.open_quantity);
                let decrement = Decrement {
                    order_id: resting_id,
                    user_id,
                    quantity: applied,
                    timestamp: self.timestamp,
                    origin: DecrementOrigin::SelfMatch,
                };
                self.emit(|l| l.on_decrement(&decrement));
                self.cancel(order, CancelReason::SelfMatch);
                false
            }
            // Match never reaches here.
            SelfMatchAction::CancelOldest | SelfMatchAction::Match => {
                let removed = self.book.remove_order(handle);
                self.untrack_expiry(&removed);
                self.cancel(&removed, CancelReason::SelfMatch);
                true
            }
        }
    }

    /// Notional and fees of a trade, or `None` if either side's running
    /// totals would leave the representable range.
    fn terms(
        &self,
        order: &Order,
        resting: &Order,
        price: Price,
        quantity: Quantity,
    ) -> Option<TradeTerms> {
        let notional = price.notional(quantity)?;
        let scale = self.config.fee_scale();
        let maker_fee = self.fee_provider.get_fee(resting.fee_id).maker_fee(notional, scale)?;
        let taker_fee = self.fee_provider.get_fee(order.fee_id).taker_fee(notional, scale)?;
        resting.cost.checked_add(notional)?;
        resting.fee.checked_add(maker_fee)?;
        order.cost.checked_add(notional)?;
        order.fee.checked_add(taker_fee)?;
        Some(TradeTerms { price, quantity, notional, maker_fee, taker_fee })
    }

    /// Trade between the incoming order and a resting maker.
    fn execute(
        &mut self,
        order: &mut Order,
        handle: OrderHandle,
        resting: &Order,
        terms: TradeTerms,
        timestamp: u64,
    ) {
        let TradeTerms { price, quantity: qty, notional, maker_fee, taker_fee } = terms;

        self.book.accrue(handle, notional, maker_fee);
        let depleted = self.book.fill_order(handle, qty);

        order.reduce(qty);
        order.spend(notional);
        order.cost += notional;
        order.fee += taker_fee;

        let maker_final = depleted
            .as_ref()
            .filter(|maker| maker.hidden_quantity().is_zero())
            .map(|maker| Settlement { cost: maker.cost, fee: maker.fee });
        let taker_final =
            (!order.has_remaining()).then_some(Settlement { cost: order.cost, fee: order.fee });

        let fill = Fill {
            maker_order_id: resting.order_id,
            maker_user_id: resting.user_id,
            taker_order_id: order.order_id,
            taker_user_id: order.user_id,
            taker_side: order.side,
            price,
            quantity: qty,
            timestamp,
            maker_final,
            taker_final,
        };
        trace!(
            maker = fill.maker_order_id.0,
            taker = fill.taker_order_id.0,
            %price,
            %qty,
            "trade"
        );
        self.emit(|l| l.on_trade(&fill));

        if let Some(mut maker) = depleted {
            if maker.refresh_tip() {
                self.book.add_order_open_book(maker);
            } else {
                self.untrack_expiry(&maker);
            }
        }
        order.refresh_tip();

        self.market_price = Some(price);
        self.release_stops(price);
    }

    /// Queue every stop order the last trade at `price` has triggered.
    fn release_stops(&mut self, price: Price) {
        let released = [self.book.remove_stop_bids(price), self.book.remove_stop_asks(price)];
        for mut order in released.into_iter().flatten().flatten() {
            debug!(order_id = order.order_id.0, %price, "stop order triggered");
            let (order_id, user_id) = (order.order_id, order.user_id);
            self.emit(|l| l.on_order_triggered(order_id, user_id));
            self.untrack_expiry(&order);
            order.trigger();
            self.triggered.push_back(order);
        }
    }

    /// Resting order by id, live or stop.
    pub fn current_order(&self, order_id: OrderId) -> Option<&Order> {
        self.book.get(order_id)
    }

    /// Whether `order_id` was ever admitted.
    #[inline]
    pub fn is_accepted(&self, order_id: OrderId) -> bool {
        self.accepted_orders.contains(&order_id)
    }

    /// Price of the last trade.
    #[inline]
    pub fn market_price(&self) -> Option<Price> {
        self.market_price
    }

    #[inline]
    pub fn best_bid_price(&self) -> Option<Price> {
        self.book.best_bid_price()
    }

    #[inline]
    pub fn best_ask_price(&self) -> Option<Price> {
        self.book.best_ask_price()
    }

    #[inline]
    pub fn best_stop_bid_price(&self) -> Option<Price> {
        self.book.best_stop_bid_price()
    }

    #[inline]
    pub fn best_stop_ask_price(&self) -> Option<Price> {
        self.book.best_stop_ask_price()
    }

    #[inline]
    pub fn best_bid_quantity(&self) -> Option<Quantity> {
        self.book.best_bid_quantity()
    }

    #[inline]
    pub fn best_ask_quantity(&self) -> Option<Quantity> {
        self.book.best_ask_quantity()
    }

    /// Orders currently resting, stops included.
    #[inline]
    pub fn resting_order_count(&self) -> usize {
        self.book.len()
    }

    #[inline]
    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn listener(&self) -> Option<&L> {
        self.listener.as_ref()
    }

    pub fn listener_mut(&mut self) -> Option<&mut L> {
        self.listener.as_mut()
    }
}

/// Self-match action as the matching loop applies it.
fn self_match_action(order: &Order) -> SelfMatchAction {
    match (order.self_match_action, order.order_type) {
        // Nothing to net a budget-only order against.
        (SelfMatchAction::Decrement, OrderType::MarketAmount { capped: false, .. }) => {
            SelfMatchAction::CancelOldest
        }
        (action, _) => action,
    }
}
