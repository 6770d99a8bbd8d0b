//! Shared fixtures for engine scenario tests.

#![allow(dead_code)]

use keel_core::{
    Cancel, CancelReason, Decrement, EngineConfig, Fee, FeeSchedule, Fill, MatchingEngine, NewOrder,
    OrderId, Price, Quantity, Side, TradeListener, UserId,
};
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Accept(OrderId),
    Trade(Fill),
    Cancel(Cancel),
    Triggered(OrderId),
    SelfMatch { incoming: OrderId, resting: OrderId, user: UserId },
    Decrement(Decrement),
}

/// Listener that keeps every event in arrival order.
#[derive(Debug, Default)]
pub struct RecordingListener {
    pub events: Vec<Event>,
}

impl RecordingListener {
    pub fn trades(&self) -> Vec<Fill> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Trade(fill) => Some(*fill),
                _ => None,
            })
            .collect()
    }

    pub fn cancels(&self) -> Vec<Cancel> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Cancel(cancel) => Some(*cancel),
                _ => None,
            })
            .collect()
    }

    pub fn decrements(&self) -> Vec<Decrement> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Decrement(decrement) => Some(*decrement),
                _ => None,
            })
            .collect()
    }

    pub fn triggered(&self) -> Vec<OrderId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Triggered(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn cancel_reason(&self, order_id: u64) -> Option<CancelReason> {
        self.cancels()
            .into_iter()
            .find(|c| c.order_id == OrderId(order_id))
            .map(|c| c.reason)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl TradeListener for RecordingListener {
    fn on_accept(&mut self, order_id: OrderId, _user_id: UserId) {
        self.events.push(Event::Accept(order_id));
    }

    fn on_trade(&mut self, fill: &Fill) {
        self.events.push(Event::Trade(*fill));
    }

    fn on_cancel(&mut self, cancel: &Cancel) {
        self.events.push(Event::Cancel(*cancel));
    }

    fn on_order_triggered(&mut self, order_id: OrderId, _user_id: UserId) {
        self.events.push(Event::Triggered(order_id));
    }

    fn on_self_match(&mut self, incoming: OrderId, resting: OrderId, user: UserId) {
        self.events.push(Event::SelfMatch { incoming, resting, user });
    }

    fn on_decrement(&mut self, decrement: &Decrement) {
        self.events.push(Event::Decrement(*decrement));
    }
}

pub type TestEngine = MatchingEngine<RecordingListener, FeeSchedule>;

/// Maker 0.2%, taker 0.5%.
pub fn fees() -> FeeSchedule {
    FeeSchedule::flat(Fee::new(Decimal::new(2, 1), Decimal::new(5, 1)))
}

pub fn engine() -> TestEngine {
    MatchingEngine::new(EngineConfig::default(), fees(), Some(RecordingListener::default()))
}

pub fn engine_with(config: EngineConfig) -> TestEngine {
    MatchingEngine::new(config, fees(), Some(RecordingListener::default()))
}

pub fn events(engine: &TestEngine) -> &RecordingListener {
    engine.listener().expect("listener installed")
}

pub fn clear(engine: &mut TestEngine) {
    if let Some(listener) = engine.listener_mut() {
        listener.clear();
    }
}

pub fn qty(value: i64) -> Quantity {
    Quantity::from_int(value)
}

pub fn px(value: i64) -> Price {
    Price::from_int(value)
}

pub fn buy(id: u64, user: u64, price: i64, quantity: i64) -> NewOrder {
    NewOrder::limit(id, user, Side::Buy, px(price), qty(quantity))
}

pub fn sell(id: u64, user: u64, price: i64, quantity: i64) -> NewOrder {
    NewOrder::limit(id, user, Side::Sell, px(price), qty(quantity))
}
