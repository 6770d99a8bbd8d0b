//! Order book data structures.
//!
//! The book keeps four sides: live bids and asks, plus the pending stop
//! orders on either side. Each side is a price-sorted map of
//! [`PriceLevel`]s; every level holds only [`OrderHandle`]s into the
//! book's [`OrderPool`].

use std::collections::BTreeMap;

use arrayvec::ArrayVec;

use crate::fixed::{Amount, Price, Quantity};
use crate::level::PriceLevel;
use crate::order::{Order, OrderId, SelfMatchAction, Side, UserId};
use crate::pool::{OrderHandle, OrderPool};

/// Which end of a side is the best price.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PriceOrdering {
    /// Lowest price first (asks, stop bids).
    Ascending,
    /// Highest price first (bids, stop asks).
    Descending,
}

/// One side of the order book.
#[derive(Debug)]
pub struct BookSide {
    levels: BTreeMap<Price, PriceLevel>,
    ordering: PriceOrdering,
    /// Last level emptied on this side, reused for the next new price.
    spare: Option<PriceLevel>,
}

impl BookSide {
    pub fn new(ordering: PriceOrdering) -> Self {
        Self {
            levels: BTreeMap::new(),
            ordering,
            spare: None,
        }
    }

    /// Queue an order at `price`, opening the level if needed.
    pub fn add_order(&mut self, price: Price, handle: OrderHandle, order: &Order) {
        let spare = &mut self.spare;
        let level = self.levels.entry(price).or_insert_with(|| match spare.take() {
            Some(mut level) => {
                level.set_price(price);
                level
            }
            None => PriceLevel::new(price),
        });
        level.add_order(handle, order);
    }

    /// Best level, if any.
    #[inline]
    pub fn best_level(&self) -> Option<&PriceLevel> {
        match self.ordering {
            PriceOrdering::Ascending => self.levels.values().next(),
            PriceOrdering::Descending => self.levels.values().next_back(),
        }
    }

    #[inline]
    pub fn best_price(&self) -> Option<Price> {
        self.best_level().map(PriceLevel::price)
    }

    /// Levels from best to worst.
    pub fn iter(&self) -> impl Iterator<Item = &PriceLevel> + '_ {
        let (ascending, descending) = match self.ordering {
            PriceOrdering::Ascending => (Some(self.levels.values()), None),
            PriceOrdering::Descending => (None, Some(self.levels.values().rev())),
        };
        ascending
            .into_iter()
            .flatten()
            .chain(descending.into_iter().flatten())
    }

    #[inline]
    pub fn level(&self, price: Price) -> Option<&PriceLevel> {
        self.levels.get(&price)
    }

    #[inline]
    pub fn level_mut(&mut self, price: Price) -> Option<&mut PriceLevel> {
        self.levels.get_mut(&price)
    }

    /// Drop the level at `price` if it no longer holds orders.
    pub fn prune(&mut self, price: Price) {
        if self.levels.get(&price).is_some_and(PriceLevel::is_empty) {
            self.spare = self.levels.remove(&price);
        }
    }

    /// Detach the best level if `pred` accepts its price.
    pub fn pop_best_if(&mut self, pred: impl Fn(Price) -> bool) -> Option<PriceLevel> {
        let price = self.best_price()?;
        if pred(price) {
            self.levels.remove(&price)
        } else {
            None
        }
    }

    /// Number of price levels.
    #[inline]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Where a resting order is queued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Location {
    side: Side,
    stop: bool,
    price: Price,
}

impl Location {
    fn of(order: &Order) -> Self {
        match order.stop_price() {
            Some(stop_price) => Self { side: order.side, stop: true, price: stop_price },
            None => Self { side: order.side, stop: false, price: order.price() },
        }
    }
}

/// Complete order book for one instrument.
#[derive(Debug)]
pub struct OrderBook {
    bids: BookSide,
    asks: BookSide,
    /// Buy stops, lowest trigger first.
    stop_bids: BookSide,
    /// Sell stops, highest trigger first.
    stop_asks: BookSide,
    pool: OrderPool,
    /// Last sequence handed out.
    sequence: u64,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Pre-size the arena for `capacity` resting orders.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bids: BookSide::new(PriceOrdering::Descending),
            asks: BookSide::new(PriceOrdering::Ascending),
            stop_bids: BookSide::new(PriceOrdering::Ascending),
            stop_asks: BookSide::new(PriceOrdering::Descending),
            pool: OrderPool::with_capacity(capacity),
            sequence: 0,
        }
    }

    /// Last assigned sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[inline]
    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    #[inline]
    fn side(&self, side: Side, stop: bool) -> &BookSide {
        match (stop, side) {
            (false, Side::Buy) => &self.bids,
            (false, Side::Sell) => &self.asks,
            (true, Side::Buy) => &self.stop_bids,
            (true, Side::Sell) => &self.stop_asks,
        }
    }

    /// Split borrow of a side and the arena.
    #[inline]
    fn parts(&mut self, side: Side, stop: bool) -> (&mut BookSide, &mut OrderPool) {
        let book_side = match (stop, side) {
            (false, Side::Buy) => &mut self.bids,
            (false, Side::Sell) => &mut self.asks,
            (true, Side::Buy) => &mut self.stop_bids,
            (true, Side::Sell) => &mut self.stop_asks,
        };
        (book_side, &mut self.pool)
    }

    fn insert(&mut self, mut order: Order, stop: bool) -> OrderHandle {
        order.sequence = Some(self.next_sequence());
        let location = Location::of(&order);
        debug_assert_eq!(location.stop, stop);
        let (book_side, pool) = self.parts(location.side, stop);
        let handle = pool.insert(order);
        book_side.add_order(location.price, handle, pool.get(handle));
        handle
    }

    /// Rest an order on the live book, assigning its sequence.
    ///
    /// # Panics
    /// Panics if the order is an untriggered stop or has no limit price.
    pub fn add_order_open_book(&mut self, order: Order) -> OrderHandle {
        assert!(
            order.stop_price().is_none() && !order.price().is_zero(),
            "order {:?} cannot rest on the live book",
            order.order_id
        );
        self.insert(order, false)
    }

    /// Park a stop order until the market trades through its stop price.
    ///
    /// # Panics
    /// Panics if the order is not a stop.
    pub fn add_stop_order(&mut self, order: Order) -> OrderHandle {
        assert!(order.stop_price().is_some(), "order {:?} is not a stop", order.order_id);
        self.insert(order, true)
    }

    /// Head of the best live level on `side` (the resting side).
    #[inline]
    pub fn best_order_to_match(&self, side: Side) -> Option<OrderHandle> {
        self.side(side, false).best_level().and_then(PriceLevel::front)
    }

    #[inline]
    pub fn order(&self, handle: OrderHandle) -> &Order {
        self.pool.get(handle)
    }

    #[inline]
    pub fn handle_of(&self, order_id: OrderId) -> Option<OrderHandle> {
        self.pool.handle_of(order_id)
    }

    /// A resting order by id.
    pub fn get(&self, order_id: OrderId) -> Option<&Order> {
        self.pool.handle_of(order_id).map(|h| self.pool.get(h))
    }

    /// Add traded notional and fee to a resting order.
    pub fn accrue(&mut self, handle: OrderHandle, cost: Amount, fee: Amount) {
        let order = self.pool.get_mut(handle);
        order.cost += cost;
        order.fee += fee;
    }

    /// Take an order out of whichever side holds it.
    pub fn remove_order(&mut self, handle: OrderHandle) -> Order {
        let location = Location::of(self.pool.get(handle));
        let (book_side, pool) = self.parts(location.side, location.stop);
        let removed = book_side
            .level_mut(location.price)
            .is_some_and(|level| level.remove_order(handle, pool.get(handle)));
        assert!(removed, "order handle {:?} is not queued at {}", handle, location.price);
        book_side.prune(location.price);
        pool.remove(handle)
    }

    /// Trade `qty` against a resting order.
    ///
    /// Returns the detached order once its visible quantity is used up.
    pub fn fill_order(&mut self, handle: OrderHandle, qty: Quantity) -> Option<Order> {
        let location = Location::of(self.pool.get(handle));
        let (book_side, pool) = self.parts(location.side, location.stop);
        let level = book_side
            .level_mut(location.price)
            .unwrap_or_else(|| panic!("no level at {} for order handle {:?}", location.price, handle));
        if level.fill(handle, pool.get_mut(handle), qty) {
            book_side.prune(location.price);
            Some(pool.remove(handle))
        } else {
            None
        }
    }

    /// Reduce a resting order without trading it. Returns the quantity
    /// actually removed.
    pub fn decrement_order(&mut self, handle: OrderHandle, amount: Quantity) -> Quantity {
        let location = Location::of(self.pool.get(handle));
        let (book_side, pool) = self.parts(location.side, location.stop);
        let level = book_side
            .level_mut(location.price)
            .unwrap_or_else(|| panic!("no level at {} for order handle {:?}", location.price, handle));
        level.decrement_quantity(pool.get_mut(handle), amount)
    }

    /// Whether an incoming `side` order could take `requested` right now at
    /// prices no worse than `limit_price` (zero means no limit).
    ///
    /// With `owner` set, resting orders of that user count the way the
    /// matching loop treats them: skipped when the incoming order cancels
    /// the oldest, a hard stop otherwise.
    pub fn check_can_fill_order(
        &self,
        side: Side,
        requested: Quantity,
        limit_price: Price,
        owner: Option<(UserId, SelfMatchAction)>,
    ) -> bool {
        let mut available = Quantity::ZERO;
        for level in self.side(side.opposite(), false).iter() {
            let crosses = limit_price.is_zero()
                || match side {
                    Side::Buy => level.price() <= limit_price,
                    Side::Sell => level.price() >= limit_price,
                };
            if !crosses {
                break;
            }
            match owner {
                None => available += level.quantity(),
                Some((user_id, action)) => {
                    for handle in level.iter() {
                        let resting = self.pool.get(handle);
                        if resting.user_id != user_id {
                            available += resting.open_quantity;
                        } else if action != SelfMatchAction::CancelOldest {
                            return available >= requested;
                        }
                        if available >= requested {
                            return true;
                        }
                    }
                }
            }
            if available >= requested {
                return true;
            }
        }
        available >= requested
    }

    /// Whether an incoming `side` order could spend `requested` notional
    /// right now, at any price. `owner` works as in
    /// [`Self::check_can_fill_order`].
    pub fn check_can_fill_market_order_amount(
        &self,
        side: Side,
        requested: Amount,
        owner: Option<(UserId, SelfMatchAction)>,
    ) -> bool {
        // Anything past the representable range is more than any budget.
        let worth = |price: Price, qty: Quantity| price.notional(qty).unwrap_or(Amount::MAX);
        let mut available = Amount::ZERO;
        for level in self.side(side.opposite(), false).iter() {
            match owner {
                None => available = available.saturating_add(worth(level.price(), level.quantity())),
                Some((user_id, action)) => {
                    for handle in level.iter() {
                        let resting = self.pool.get(handle);
                        if resting.user_id != user_id {
                            let value = worth(resting.price(), resting.open_quantity);
                            available = available.saturating_add(value);
                        } else if action != SelfMatchAction::CancelOldest {
                            return available >= requested;
                        }
                        if available >= requested {
                            return true;
                        }
                    }
                }
            }
            if available >= requested {
                return true;
            }
        }
        false
    }

    fn release_stops(&mut self, side: Side, pred: impl Fn(Price) -> bool) -> Option<Vec<Order>> {
        let mut released = Vec::new();
        loop {
            let (book_side, pool) = self.parts(side, true);
            let Some(level) = book_side.pop_best_if(&pred) else {
                break;
            };
            released.extend(level.iter().map(|handle| pool.remove(handle)));
        }
        if released.is_empty() {
            None
        } else {
            Some(released)
        }
    }

    /// Pop every buy stop whose stop price is at or below `price_limit`,
    /// lowest stop first, FIFO within a level.
    pub fn remove_stop_bids(&mut self, price_limit: Price) -> Option<Vec<Order>> {
        self.release_stops(Side::Buy, |stop| stop <= price_limit)
    }

    /// Pop every sell stop whose stop price is at or above `price_limit`,
    /// highest stop first, FIFO within a level.
    pub fn remove_stop_asks(&mut self, price_limit: Price) -> Option<Vec<Order>> {
        self.release_stops(Side::Sell, |stop| stop >= price_limit)
    }

    #[inline]
    pub fn best_bid_price(&self) -> Option<Price> {
        self.bids.best_price()
    }

    #[inline]
    pub fn best_ask_price(&self) -> Option<Price> {
        self.asks.best_price()
    }

    #[inline]
    pub fn best_stop_bid_price(&self) -> Option<Price> {
        self.stop_bids.best_price()
    }

    #[inline]
    pub fn best_stop_ask_price(&self) -> Option<Price> {
        self.stop_asks.best_price()
    }

    /// Visible quantity at the best bid.
    #[inline]
    pub fn best_bid_quantity(&self) -> Option<Quantity> {
        self.bids.best_level().map(PriceLevel::quantity)
    }

    /// Visible quantity at the best ask.
    #[inline]
    pub fn best_ask_quantity(&self) -> Option<Quantity> {
        self.asks.best_level().map(PriceLevel::quantity)
    }

    /// Best `N` live levels of `side` as (price, visible quantity).
    pub fn depth<const N: usize>(&self, side: Side) -> ArrayVec<(Price, Quantity), N> {
        self.side(side, false)
            .iter()
            .take(N)
            .map(|level| (level.price(), level.quantity()))
            .collect()
    }

    /// Orders resting on any side, stops included.
    #[inline]
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{NewOrder, OrderType};

    fn limit(id: u64, side: Side, price: i64, qty: i64) -> Order {
        let price = Price::from_int(price);
        let new_order = NewOrder::limit(id, id, side, price, Quantity::from_int(qty));
        Order::admit(&new_order, OrderType::Limit { price })
    }

    fn stop(id: u64, side: Side, stop_price: i64) -> Order {
        let stop_price = Price::from_int(stop_price);
        let new_order = NewOrder::market(id, id, side, Quantity::from_int(10)).with_stop_price(stop_price);
        Order::admit(&new_order, OrderType::StopMarket { stop_price })
    }

    #[test]
    fn test_best_prices_per_side() {
        let mut book = OrderBook::new();
        book.add_order_open_book(limit(1, Side::Buy, 99, 10));
        book.add_order_open_book(limit(2, Side::Buy, 100, 10));
        book.add_order_open_book(limit(3, Side::Sell, 102, 10));
        book.add_order_open_book(limit(4, Side::Sell, 101, 10));
        book.add_stop_order(stop(5, Side::Buy, 105));
        book.add_stop_order(stop(6, Side::Buy, 104));
        book.add_stop_order(stop(7, Side::Sell, 95));
        book.add_stop_order(stop(8, Side::Sell, 96));

        assert_eq!(book.best_bid_price(), Some(Price::from_int(100)));
        assert_eq!(book.best_ask_price(), Some(Price::from_int(101)));
        assert_eq!(book.best_stop_bid_price(), Some(Price::from_int(104)));
        assert_eq!(book.best_stop_ask_price(), Some(Price::from_int(96)));
        assert_eq!(book.len(), 8);
        assert_eq!(book.sequence(), 8);
    }

    #[test]
    fn test_sequence_assigned_on_entry() {
        let mut book = OrderBook::new();
        let h1 = book.add_order_open_book(limit(1, Side::Sell, 10, 5));
        let h2 = book.add_order_open_book(limit(2, Side::Sell, 10, 5));
        assert_eq!(book.order(h1).sequence, Some(1));
        assert_eq!(book.order(h2).sequence, Some(2));
        assert_eq!(book.best_order_to_match(Side::Sell), Some(h1));
    }

    #[test]
    fn test_fill_prunes_level() {
        let mut book = OrderBook::new();
        let h1 = book.add_order_open_book(limit(1, Side::Sell, 10, 5));
        book.add_order_open_book(limit(2, Side::Sell, 11, 5));

        assert!(book.fill_order(h1, Quantity::from_int(2)).is_none());
        assert_eq!(book.best_ask_quantity(), Some(Quantity::from_int(3)));

        let done = book.fill_order(h1, Quantity::from_int(3)).unwrap();
        assert_eq!(done.order_id, OrderId(1));
        assert_eq!(book.best_ask_price(), Some(Price::from_int(11)));
        assert!(book.get(OrderId(1)).is_none());
    }

    #[test]
    fn test_remove_from_any_side() {
        let mut book = OrderBook::new();
        let live = book.add_order_open_book(limit(1, Side::Buy, 10, 5));
        let parked = book.add_stop_order(stop(2, Side::Sell, 8));

        assert_eq!(book.remove_order(parked).order_id, OrderId(2));
        assert_eq!(book.best_stop_ask_price(), None);
        assert_eq!(book.remove_order(live).order_id, OrderId(1));
        assert!(book.is_empty());
        assert_eq!(book.best_bid_price(), None);
    }

    #[test]
    fn test_decrement_keeps_order_resting() {
        let mut book = OrderBook::new();
        let handle = book.add_order_open_book(limit(1, Side::Buy, 10, 5));
        assert_eq!(book.decrement_order(handle, Quantity::from_int(9)), Quantity::from_int(5));
        assert_eq!(book.best_bid_price(), Some(Price::from_int(10)));
        assert_eq!(book.best_bid_quantity(), Some(Quantity::ZERO));
        assert!(book.order(handle).open_quantity.is_zero());
    }

    #[test]
    fn test_check_can_fill_respects_limit() {
        let mut book = OrderBook::new();
        book.add_order_open_book(limit(1, Side::Sell, 10, 5));
        book.add_order_open_book(limit(2, Side::Sell, 11, 5));
        book.add_order_open_book(limit(3, Side::Sell, 12, 5));

        let ten = Quantity::from_int(10);
        assert!(book.check_can_fill_order(Side::Buy, ten, Price::from_int(11), None));
        assert!(!book.check_can_fill_order(Side::Buy, Quantity::from_int(11), Price::from_int(11), None));
        assert!(book.check_can_fill_order(Side::Buy, Quantity::from_int(15), Price::ZERO, None));
        assert!(!book.check_can_fill_order(Side::Sell, Quantity::from_int(1), Price::ZERO, None));
    }

    #[test]
    fn test_check_can_fill_skips_own_orders() {
        let mut book = OrderBook::new();
        book.add_order_open_book(limit(1, Side::Sell, 10, 5));
        book.add_order_open_book(limit(2, Side::Sell, 10, 5));
        book.add_order_open_book(limit(3, Side::Sell, 11, 5));

        let owner = UserId(1);
        let ten = Quantity::from_int(10);
        assert!(book.check_can_fill_order(
            Side::Buy,
            ten,
            Price::ZERO,
            Some((owner, SelfMatchAction::CancelOldest))
        ));
        assert!(!book.check_can_fill_order(
            Side::Buy,
            Quantity::from_int(11),
            Price::ZERO,
            Some((owner, SelfMatchAction::CancelOldest))
        ));
        assert!(!book.check_can_fill_order(
            Side::Buy,
            Quantity::from_int(1),
            Price::ZERO,
            Some((owner, SelfMatchAction::CancelNewest))
        ));
    }

    #[test]
    fn test_check_can_fill_amount() {
        let mut book = OrderBook::new();
        book.add_order_open_book(limit(1, Side::Sell, 10, 5));
        book.add_order_open_book(limit(2, Side::Sell, 20, 5));
        assert!(book.check_can_fill_market_order_amount(Side::Buy, Amount::from_int(150), None));
        assert!(!book.check_can_fill_market_order_amount(Side::Buy, Amount::from_int(151), None));
    }

    #[test]
    fn test_check_can_fill_amount_skips_own_orders() {
        let mut book = OrderBook::new();
        book.add_order_open_book(limit(2, Side::Sell, 10, 5));
        book.add_order_open_book(limit(1, Side::Sell, 11, 5));
        book.add_order_open_book(limit(3, Side::Sell, 12, 5));

        let oldest = Some((UserId(1), SelfMatchAction::CancelOldest));
        assert!(book.check_can_fill_market_order_amount(Side::Buy, Amount::from_int(110), oldest));
        assert!(!book.check_can_fill_market_order_amount(Side::Buy, Amount::from_int(111), oldest));

        // Matching stops at the first own order, so only the 50 ahead of it counts.
        let newest = Some((UserId(1), SelfMatchAction::CancelNewest));
        assert!(book.check_can_fill_market_order_amount(Side::Buy, Amount::from_int(50), newest));
        assert!(!book.check_can_fill_market_order_amount(Side::Buy, Amount::from_int(51), newest));
        let decrement = Some((UserId(1), SelfMatchAction::Decrement));
        assert!(!book.check_can_fill_market_order_amount(Side::Buy, Amount::from_int(51), decrement));
    }

    #[test]
    fn test_check_can_fill_amount_saturates() {
        let mut book = OrderBook::new();
        book.add_order_open_book(limit(1, Side::Sell, i64::MAX, i64::MAX));
        book.add_order_open_book(limit(2, Side::Sell, i64::MAX, i64::MAX));
        assert!(book.check_can_fill_market_order_amount(Side::Buy, Amount::MAX, None));
        let other = Some((UserId(9), SelfMatchAction::CancelOldest));
        assert!(book.check_can_fill_market_order_amount(Side::Buy, Amount::MAX, other));
    }

    #[test]
    fn test_release_stops_in_trigger_order() {
        let mut book = OrderBook::new();
        book.add_stop_order(stop(1, Side::Buy, 12));
        book.add_stop_order(stop(2, Side::Buy, 11));
        book.add_stop_order(stop(3, Side::Buy, 11));
        book.add_stop_order(stop(4, Side::Buy, 13));

        let released: Vec<u64> = book
            .remove_stop_bids(Price::from_int(12))
            .unwrap()
            .iter()
            .map(|o| o.order_id.0)
            .collect();
        assert_eq!(released, vec![2, 3, 1]);
        assert_eq!(book.best_stop_bid_price(), Some(Price::from_int(13)));
        assert!(book.remove_stop_bids(Price::from_int(12)).is_none());

        book.add_stop_order(stop(5, Side::Sell, 9));
        book.add_stop_order(stop(6, Side::Sell, 10));
        let released: Vec<u64> = book
            .remove_stop_asks(Price::from_int(9))
            .unwrap()
            .iter()
            .map(|o| o.order_id.0)
            .collect();
        assert_eq!(released, vec![6, 5]);
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_depth_snapshot() {
        let mut book = OrderBook::new();
        book.add_order_open_book(limit(1, Side::Buy, 98, 1));
        book.add_order_open_book(limit(2, Side::Buy, 99, 2));
        book.add_order_open_book(limit(3, Side::Buy, 99, 3));
        book.add_order_open_book(limit(4, Side::Buy, 97, 4));

        let depth = book.depth::<2>(Side::Buy);
        assert_eq!(
            depth.as_slice(),
            &[
                (Price::from_int(99), Quantity::from_int(5)),
                (Price::from_int(98), Quantity::from_int(1)),
            ]
        );
    }

    #[test]
    fn test_spare_level_reused() {
        let mut book = OrderBook::new();
        let h = book.add_order_open_book(limit(1, Side::Sell, 10, 5));
        book.remove_order(h);
        book.add_order_open_book(limit(2, Side::Sell, 12, 7));
        assert_eq!(book.best_ask_price(), Some(Price::from_int(12)));
        assert_eq!(book.best_ask_quantity(), Some(Quantity::from_int(7)));
    }

    #[test]
    #[should_panic(expected = "cannot rest on the live book")]
    fn test_market_order_cannot_rest() {
        let mut book = OrderBook::new();
        let new_order = NewOrder::market(1, 1, Side::Buy, Quantity::from_int(1));
        book.add_order_open_book(Order::admit(&new_order, OrderType::Market));
    }
}
