//! Listener that pushes every engine event through the wire codec.

use keel_core::{Cancel, CancelReason, Decrement, Fill, OrderId, TradeListener, UserId};
use keel_proto::{DecrementRecord, FillRecord, MessageBuilder, MessageParser, ParseError};
use tracing::trace;

use core::mem::size_of;

/// Event counters collected during a run.
#[derive(Clone, Copy, Debug, Default)]
pub struct EventCounts {
    pub accepted: u64,
    pub fills: u64,
    pub cancels: u64,
    pub expired: u64,
    pub triggered: u64,
    pub self_matches: u64,
    pub decrements: u64,
}

/// Encodes fills and decrements into records and reads each one back.
/// Keeps the first codec failure and counts records that decode to
/// something other than what was encoded.
pub struct EncodingSink {
    builder: MessageBuilder,
    buffer: [u8; size_of::<FillRecord>()],
    pub counts: EventCounts,
    pub bytes_encoded: u64,
    pub first_error: Option<ParseError>,
    pub mismatches: u64,
}

impl EncodingSink {
    pub fn new() -> Self {
        Self {
            builder: MessageBuilder::new(),
            buffer: [0; size_of::<FillRecord>()],
            counts: EventCounts::default(),
            bytes_encoded: 0,
            first_error: None,
            mismatches: 0,
        }
    }

    fn record_error(&mut self, error: ParseError) {
        self.first_error.get_or_insert(error);
    }
}

impl Default for EncodingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl TradeListener for EncodingSink {
    fn on_accept(&mut self, _order_id: OrderId, _user_id: UserId) {
        self.counts.accepted += 1;
    }

    fn on_trade(&mut self, fill: &Fill) {
        self.counts.fills += 1;
        let size = self.builder.build_fill(&mut self.buffer, fill);
        self.bytes_encoded += size as u64;
        match MessageParser::decode_fill(&self.buffer[..size]) {
            Ok(report) if report.quantity == fill.quantity && report.taker_final == fill.taker_final => {
                trace!(fill_sequence = report.fill_sequence, "fill encoded");
            }
            Ok(_) => self.mismatches += 1,
            Err(error) => self.record_error(error),
        }
    }

    fn on_cancel(&mut self, cancel: &Cancel) {
        self.counts.cancels += 1;
        if cancel.reason == CancelReason::ValidityExpired {
            self.counts.expired += 1;
        }
    }

    fn on_order_triggered(&mut self, _order_id: OrderId, _user_id: UserId) {
        self.counts.triggered += 1;
    }

    fn on_self_match(&mut self, _incoming: OrderId, _resting: OrderId, _user_id: UserId) {
        self.counts.self_matches += 1;
    }

    fn on_decrement(&mut self, decrement: &Decrement) {
        self.counts.decrements += 1;
        let size = self.builder.build_decrement(&mut self.buffer, decrement);
        self.bytes_encoded += size as u64;
        debug_assert_eq!(size, size_of::<DecrementRecord>());
        match MessageParser::decode_decrement(&self.buffer[..size]) {
            Ok(decoded) if decoded == *decrement => {}
            Ok(_) => self.mismatches += 1,
            Err(error) => self.record_error(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::{Amount, DecrementOrigin, Price, Quantity, Settlement, Side};

    #[test]
    fn fills_and_decrements_survive_the_codec() {
        let mut sink = EncodingSink::new();
        sink.on_trade(&Fill {
            maker_order_id: OrderId(1),
            maker_user_id: UserId(1),
            taker_order_id: OrderId(2),
            taker_user_id: UserId(2),
            taker_side: Side::Buy,
            price: Price::new(1005, 1),
            quantity: Quantity::from_int(4),
            timestamp: 3,
            maker_final: None,
            taker_final: Some(Settlement { cost: Amount::new(4020, 1), fee: Amount::new(2, 0) }),
        });
        sink.on_decrement(&Decrement {
            order_id: OrderId(1),
            user_id: UserId(1),
            quantity: Quantity::from_int(2),
            timestamp: 4,
            origin: DecrementOrigin::UserRequested,
        });

        assert_eq!(sink.first_error, None);
        assert_eq!(sink.mismatches, 0);
        assert_eq!(sink.counts.fills, 1);
        assert_eq!(sink.counts.decrements, 1);
        assert_eq!(sink.bytes_encoded, 135 + 47);
    }
}
