//! Admission checks for new orders.
//!
//! Validation is pure: a rejected submission leaves no trace in the engine.
//! A submission that passes is reduced to its [`OrderType`].

use thiserror::Error;

use crate::config::EngineConfig;
use crate::order::{NewOrder, OrderCondition, OrderType, Side};

/// Why a submission was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum RejectReason {
    #[error("price is negative")]
    InvalidPrice,
    #[error("quantity is negative, or zero without an order amount")]
    InvalidQuantity,
    #[error("stop price is negative")]
    InvalidStopPrice,
    #[error("order amount is negative")]
    InvalidOrderAmount,
    #[error("total quantity is negative")]
    InvalidTotalQuantity,
    #[error("order amount is only allowed on a plain market buy")]
    OrderAmountOnlyForMarketBuy,
    #[error("iceberg order cannot be a stop or market order")]
    IcebergCannotBeStopOrMarket,
    #[error("book-or-cancel order cannot be a stop or market order")]
    BookOrCancelCannotBeStopOrMarket,
    #[error("fill-or-kill order cannot be a stop order")]
    FillOrKillCannotBeStop,
    #[error("iceberg total quantity must exceed its open quantity")]
    InvalidIcebergTotalQuantity,
    #[error("quantity is not a multiple of the step size")]
    QuantityNotMultipleOfStepSize,
    #[error("price times quantity is out of range")]
    NotionalOverflow,
    #[error("order id was already used")]
    DuplicateOrder,
}

/// Check a submission and resolve its order type.
pub fn validate(order: &NewOrder, config: &EngineConfig) -> Result<OrderType, RejectReason> {
    if order.price.is_negative() {
        return Err(RejectReason::InvalidPrice);
    }
    if order.stop_price.is_negative() {
        return Err(RejectReason::InvalidStopPrice);
    }
    if order.order_amount.is_negative() {
        return Err(RejectReason::InvalidOrderAmount);
    }
    if order.total_quantity.is_negative() {
        return Err(RejectReason::InvalidTotalQuantity);
    }
    if order.open_quantity.is_negative()
        || (order.open_quantity.is_zero() && order.order_amount.is_zero())
    {
        return Err(RejectReason::InvalidQuantity);
    }

    let is_market = order.price.is_zero();
    let is_stop = order.stop_price.is_positive();
    let is_iceberg = order.total_quantity.is_positive();

    if order.order_amount.is_positive()
        && (!is_market || is_stop || is_iceberg || order.side != Side::Buy)
    {
        return Err(RejectReason::OrderAmountOnlyForMarketBuy);
    }
    if is_iceberg && (is_stop || is_market) {
        return Err(RejectReason::IcebergCannotBeStopOrMarket);
    }
    if order.condition == OrderCondition::BookOrCancel && (is_stop || is_market) {
        return Err(RejectReason::BookOrCancelCannotBeStopOrMarket);
    }
    if order.condition == OrderCondition::FillOrKill && is_stop {
        return Err(RejectReason::FillOrKillCannotBeStop);
    }
    if is_iceberg && order.total_quantity <= order.open_quantity {
        return Err(RejectReason::InvalidIcebergTotalQuantity);
    }
    if !order.open_quantity.is_multiple_of(config.step_size)
        || !order.total_quantity.is_multiple_of(config.step_size)
    {
        return Err(RejectReason::QuantityNotMultipleOfStepSize);
    }
    // Bounds the notional of every trade against the order while it rests.
    let largest = order.open_quantity.max(order.total_quantity);
    if order.price.is_positive() && order.price.notional(largest).is_none() {
        return Err(RejectReason::NotionalOverflow);
    }

    let order_type = if is_stop {
        if is_market {
            OrderType::StopMarket { stop_price: order.stop_price }
        } else {
            OrderType::StopLimit { price: order.price, stop_price: order.stop_price }
        }
    } else if is_iceberg {
        OrderType::Iceberg {
            price: order.price,
            tip: order.open_quantity,
            total: order.total_quantity,
        }
    } else if is_market && order.order_amount.is_positive() {
        OrderType::MarketAmount {
            budget: order.order_amount,
            capped: order.open_quantity.is_positive(),
        }
    } else if is_market {
        OrderType::Market
    } else {
        OrderType::Limit { price: order.price }
    };
    Ok(order_type)
}
