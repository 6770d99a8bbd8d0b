//! # Keel Core
//!
//! Single-instrument order book and matching engine.
//!
//! ## Design Principles
//! - Exact decimal arithmetic (no floats)
//! - One arena owns every resting order; the book stores handles
//! - Single-threaded: callers serialize access per instrument
//! - Stop cascades run on an explicit work queue, never recursion

pub mod book;
pub mod config;
pub mod engine;
pub mod fee;
pub mod fixed;
pub mod level;
pub mod listener;
pub mod order;
pub mod pool;
pub mod validate;

pub use book::{BookSide, OrderBook, PriceOrdering};
pub use config::{ConfigError, EngineConfig};
pub use engine::{MatchingEngine, OrderMatchingResult};
pub use fee::{Fee, FeeProvider, FeeSchedule};
pub use fixed::{Amount, Price, Quantity, DECIMAL_WIRE_SIZE};
pub use level::PriceLevel;
pub use listener::{
    Cancel, CancelReason, Decrement, DecrementOrigin, Fill, NullListener, Settlement, TradeListener,
};
pub use order::{FeeId, NewOrder, Order, OrderCondition, OrderId, OrderType, SelfMatchAction, Side, UserId};
pub use pool::{OrderHandle, OrderPool};
pub use validate::{validate, RejectReason};
