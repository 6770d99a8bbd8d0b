//! Reference scenarios with literal expected values.

mod common;

use common::*;
use keel_core::{
    Amount, CancelReason, DecrementOrigin, OrderCondition, OrderId, OrderMatchingResult,
    SelfMatchAction, Settlement, Side, UserId,
};

#[test]
fn limit_cross_charges_maker_and_taker_fees() {
    let mut engine = engine();
    assert_eq!(engine.add_order(buy(1, 1, 10, 1000), 1), OrderMatchingResult::OrderAccepted);
    assert_eq!(engine.add_order(sell(2, 2, 10, 1000), 2), OrderMatchingResult::OrderAccepted);

    let trades = events(&engine).trades();
    assert_eq!(trades.len(), 1);
    let fill = trades[0];
    assert_eq!(fill.maker_order_id, OrderId(1));
    assert_eq!(fill.taker_order_id, OrderId(2));
    assert_eq!(fill.taker_side, Side::Sell);
    assert_eq!(fill.price, px(10));
    assert_eq!(fill.quantity, qty(1000));
    assert_eq!(fill.timestamp, 2);
    assert_eq!(
        fill.maker_final,
        Some(Settlement { cost: Amount::from_int(10_000), fee: Amount::from_int(20) })
    );
    assert_eq!(
        fill.taker_final,
        Some(Settlement { cost: Amount::from_int(10_000), fee: Amount::from_int(50) })
    );

    assert_eq!(engine.resting_order_count(), 0);
    assert!(engine.current_order(OrderId(1)).is_none());
    assert!(engine.current_order(OrderId(2)).is_none());
}

#[test]
fn iceberg_maker_replenishes_its_tip() {
    let mut engine = engine();
    let iceberg = sell(1, 1, 10, 500).with_total_quantity(qty(5000));
    let _ = engine.add_order(iceberg, 1);
    let _ = engine.add_order(buy(2, 2, 10, 500), 2);

    let trades = events(&engine).trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].quantity, qty(500));
    assert_eq!(trades[0].maker_final, None);
    assert!(trades[0].taker_final.is_some());

    let resting = engine.current_order(OrderId(1)).unwrap();
    assert_eq!(resting.open_quantity, qty(500));
    assert_eq!(resting.remaining_total(), qty(4500));
    assert_eq!(engine.best_ask_quantity(), Some(qty(500)));
}

#[test]
fn order_expiring_at_submission_never_enters_the_book() {
    let mut engine = engine();
    let order = buy(1, 1, 10, 100).with_cancel_on(10);
    assert_eq!(engine.add_order(order, 10), OrderMatchingResult::OrderAccepted);

    let cancels = events(&engine).cancels();
    assert_eq!(cancels.len(), 1);
    assert_eq!(cancels[0].reason, CancelReason::ValidityExpired);
    assert_eq!(cancels[0].remaining_quantity, qty(100));
    assert_eq!(engine.book().sequence(), 0);
    assert_eq!(engine.resting_order_count(), 0);
}

#[test]
fn book_or_cancel_trades_then_cancels_with_nothing_left() {
    let mut engine = engine();
    let _ = engine.add_order(sell(1, 1, 10, 500), 1);
    let boc = buy(2, 2, 10, 500).with_condition(OrderCondition::BookOrCancel);
    let _ = engine.add_order(boc, 2);

    let recorded = events(&engine);
    assert_eq!(recorded.trades().len(), 1);
    let cancels = recorded.cancels();
    assert_eq!(cancels.len(), 1);
    assert_eq!(cancels[0].order_id, OrderId(2));
    assert_eq!(cancels[0].reason, CancelReason::BookOrCancel);
    assert!(cancels[0].remaining_quantity.is_zero());
}

#[test]
fn self_match_decrement_with_equal_quantities() {
    let mut engine = engine();
    let resting = sell(1, 7, 10, 100).with_self_match_action(SelfMatchAction::Decrement);
    let incoming = buy(2, 7, 10, 100).with_self_match_action(SelfMatchAction::Decrement);
    let _ = engine.add_order(resting, 1);
    let _ = engine.add_order(incoming, 2);

    let recorded = events(&engine);
    assert!(recorded.trades().is_empty());

    let decrements = recorded.decrements();
    assert_eq!(decrements.len(), 1);
    assert_eq!(decrements[0].order_id, OrderId(2));
    assert_eq!(decrements[0].quantity, qty(100));
    assert_eq!(decrements[0].origin, DecrementOrigin::SelfMatch);

    let cancels = recorded.cancels();
    assert_eq!(cancels.len(), 1);
    assert_eq!(cancels[0].order_id, OrderId(1));
    assert_eq!(cancels[0].reason, CancelReason::SelfMatch);

    assert_eq!(engine.resting_order_count(), 0);
}

#[test]
fn self_trade_in_match_mode_reports_resting_as_maker() {
    let mut engine = engine();
    let _ = engine.add_order(sell(1, 7, 10, 100), 1);
    let _ = engine.add_order(buy(2, 7, 10, 100), 2);

    let trades = events(&engine).trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].maker_order_id, OrderId(1));
    assert_eq!(trades[0].maker_user_id, UserId(7));
    assert_eq!(trades[0].taker_order_id, OrderId(2));
    assert_eq!(trades[0].taker_user_id, UserId(7));
}
