//! Deterministic synthetic order flow.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use keel_core::{
    Amount, FeeId, NewOrder, OrderCondition, OrderId, Price, Quantity, SelfMatchAction, Side,
};

/// Mid price the flow oscillates around.
const MID: i64 = 1_000;
/// Half-width of the band limit prices are drawn from.
const BAND: i64 = 10;
const USERS: u64 = 20;

/// One step of the workload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Submit(NewOrder),
    Cancel(OrderId),
    Decrement(OrderId, Quantity),
}

/// Seeded generator covering every order shape the engine accepts.
pub struct Workload {
    rng: ChaCha8Rng,
    next_id: u64,
    submitted: Vec<OrderId>,
    pending: Option<NewOrder>,
}

impl Workload {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_id: 1,
            submitted: Vec::new(),
            pending: None,
        }
    }

    /// Next command. `timestamp` drives GTD expiry; `last_price` anchors stops.
    pub fn next(&mut self, timestamp: u64, last_price: Option<Price>) -> Command {
        if let Some(order) = self.pending.take() {
            return self.submit(order);
        }
        let roll = self.rng.gen_range(0..100);
        match roll {
            0..=39 => self.limit(timestamp),
            40..=47 => self.iceberg(),
            48..=54 => self.market(),
            55..=61 => self.stop(last_price),
            62..=69 => self.self_cross(),
            70..=86 => match self.pick() {
                Some(id) => Command::Cancel(id),
                None => self.limit(timestamp),
            },
            _ => match self.pick() {
                Some(id) => Command::Decrement(id, Quantity::from_int(self.rng.gen_range(1..=5))),
                None => self.limit(timestamp),
            },
        }
    }

    fn limit(&mut self, timestamp: u64) -> Command {
        let user = self.user();
        let mut order = self.base_limit(user);
        order.condition = match self.rng.gen_range(0..100) {
            0..=5 => OrderCondition::ImmediateOrCancel,
            6..=9 => OrderCondition::FillOrKill,
            10..=13 => OrderCondition::BookOrCancel,
            _ => OrderCondition::None,
        };
        if self.rng.gen_bool(0.05) {
            order.cancel_on = timestamp + self.rng.gen_range(20..400);
        }
        self.submit(order)
    }

    fn iceberg(&mut self) -> Command {
        let user = self.user();
        let mut order = self.base_limit(user);
        order.open_quantity = Quantity::from_int(self.rng.gen_range(1..=10));
        order.total_quantity = order.open_quantity + Quantity::from_int(self.rng.gen_range(10..=100));
        self.submit(order)
    }

    fn market(&mut self) -> Command {
        let id = self.id();
        let user = self.user();
        let side = self.side();
        let quantity = Quantity::from_int(self.rng.gen_range(1..=40));
        let mut order = NewOrder::market(id, user, side, quantity);
        if side == Side::Buy && self.rng.gen_bool(0.3) {
            order.order_amount = Amount::from_int(self.rng.gen_range(500..=20_000));
            if self.rng.gen_bool(0.5) {
                order.open_quantity = Quantity::ZERO;
            }
        }
        self.submit(order)
    }

    fn stop(&mut self, last_price: Option<Price>) -> Command {
        let id = self.id();
        let user = self.user();
        let side = self.side();
        let anchor = last_price.unwrap_or(Price::from_int(MID));
        let offset = Price::from_int(self.rng.gen_range(1..=5));
        let stop_price = match side {
            Side::Buy => anchor + offset,
            Side::Sell => anchor - offset,
        };
        let quantity = Quantity::from_int(self.rng.gen_range(1..=20));
        let order = if self.rng.gen_bool(0.5) {
            NewOrder::market(id, user, side, quantity)
        } else {
            let limit = match side {
                Side::Buy => stop_price + Price::from_int(2),
                Side::Sell => stop_price - Price::from_int(2),
            };
            NewOrder::limit(id, user, side, limit, quantity)
        };
        self.submit(order.with_stop_price(stop_price))
    }

    /// Two crossing orders from the same user, the second carrying a
    /// random self-match action.
    fn self_cross(&mut self) -> Command {
        let user = self.user();
        let resting = self.base_limit(user);
        let mut incoming = self.base_limit(user);
        incoming.side = resting.side.opposite();
        incoming.price = resting.price;
        incoming.self_match_action = match self.rng.gen_range(0..4) {
            0 => SelfMatchAction::Match,
            1 => SelfMatchAction::CancelOldest,
            2 => SelfMatchAction::CancelNewest,
            _ => SelfMatchAction::Decrement,
        };
        // The crossing half follows on the next call.
        self.pending = Some(incoming);
        self.submit(resting)
    }

    fn base_limit(&mut self, user: u64) -> NewOrder {
        let id = self.id();
        let side = self.side();
        let offset = self.rng.gen_range(-BAND..=BAND);
        let price = Price::from_int(MID + offset);
        let quantity = Quantity::from_int(self.rng.gen_range(1..=50));
        NewOrder::limit(id, user, side, price, quantity).with_fee_id(FeeId((user % 3) as u32))
    }

    fn submit(&mut self, order: NewOrder) -> Command {
        self.submitted.push(order.order_id);
        Command::Submit(order)
    }

    fn pick(&mut self) -> Option<OrderId> {
        if self.submitted.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.submitted.len());
        Some(self.submitted[index])
    }

    fn id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn user(&mut self) -> u64 {
        self.rng.gen_range(1..=USERS)
    }

    fn side(&mut self) -> Side {
        if self.rng.gen_bool(0.5) {
            Side::Buy
        } else {
            Side::Sell
        }
    }
}
