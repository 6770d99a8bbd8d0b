//! Record parser and builder.
//!
//! Parsing borrows the record straight out of the buffer via bytemuck;
//! decoding then turns it into engine types, checking every enum code and
//! decimal field on the way.

use bytemuck::try_from_bytes;
use core::mem::size_of;
use thiserror::Error;

use keel_core::{
    Amount, Decrement, DecrementOrigin, FeeId, Fill, NewOrder, Order, OrderCondition, OrderId,
    Price, Quantity, SelfMatchAction, Settlement, Side, UserId,
};

use crate::messages::*;

/// Offset of the type discriminator.
const TYPE_OFFSET: usize = 4;
/// Offset of the version byte.
const VERSION_OFFSET: usize = 5;
/// Highest scale a serialized decimal may carry.
const MAX_DECIMAL_SCALE: u8 = 28;

/// Why a buffer could not be read as a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid record length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("invalid message type: expected {expected}, got {actual}")]
    InvalidMessageType { expected: u8, actual: u8 },
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),
    #[error("record ends before the version byte")]
    MissingVersion,
    #[error("unsupported record version {0}")]
    UnsupportedVersion(u8),
    #[error("invalid value {value} for {field}")]
    InvalidEnumValue { field: &'static str, value: u8 },
    #[error("malformed decimal in {field}")]
    InvalidDecimal { field: &'static str },
}

/// Settlement-aware view of a decoded fill record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FillReport {
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub taker_side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub timestamp: u64,
    pub maker_final: Option<Settlement>,
    pub taker_final: Option<Settlement>,
    pub fill_sequence: u64,
}

/// Zero-copy record parser.
pub struct MessageParser;

impl MessageParser {
    /// Peek at the discriminator without validating the rest.
    pub fn message_type(buffer: &[u8]) -> Result<MessageType, ParseError> {
        let Some(&code) = buffer.get(TYPE_OFFSET) else {
            return Err(ParseError::InvalidLength {
                expected: size_of::<MessageHeader>(),
                actual: buffer.len(),
            });
        };
        MessageType::try_from(code).map_err(ParseError::UnknownMessageType)
    }

    /// Parse an Order record (zero-copy).
    #[inline]
    pub fn parse_order(buffer: &[u8]) -> Result<&OrderRecord, ParseError> {
        Self::parse(buffer, MessageType::Order)
    }

    /// Parse a Fill record (zero-copy).
    #[inline]
    pub fn parse_fill(buffer: &[u8]) -> Result<&FillRecord, ParseError> {
        Self::parse(buffer, MessageType::Fill)
    }

    /// Parse a DecrementQuantity record (zero-copy).
    #[inline]
    pub fn parse_decrement(buffer: &[u8]) -> Result<&DecrementRecord, ParseError> {
        Self::parse(buffer, MessageType::DecrementQuantity)
    }

    /// Parse and decode an Order record into a submission.
    pub fn decode_order(buffer: &[u8]) -> Result<NewOrder, ParseError> {
        let record = Self::parse_order(buffer)?;
        // Copy fields out of the packed record
        let (side, condition, action) = (record.side, record.condition, record.self_match_action);
        let (price, open, stop) = (record.price, record.open_quantity, record.stop_price);
        let (total, amount) = (record.total_quantity, record.order_amount);

        Ok(NewOrder {
            order_id: OrderId(u64::from_le(record.order_id)),
            user_id: UserId(u64::from_le(record.user_id)),
            side: enum_field("side", side)?,
            price: Price::from_bytes(decimal("price", price)?),
            open_quantity: Quantity::from_bytes(decimal("open_quantity", open)?),
            stop_price: Price::from_bytes(decimal("stop_price", stop)?),
            total_quantity: Quantity::from_bytes(decimal("total_quantity", total)?),
            condition: enum_field::<OrderCondition>("condition", condition)?,
            cancel_on: u64::from_le(record.cancel_on),
            order_amount: Amount::from_bytes(decimal("order_amount", amount)?),
            self_match_action: enum_field::<SelfMatchAction>("self_match_action", action)?,
            fee_id: FeeId(u32::from_le(record.fee_id)),
        })
    }

    /// Parse and decode a Fill record.
    pub fn decode_fill(buffer: &[u8]) -> Result<FillReport, ParseError> {
        let record = Self::parse_fill(buffer)?;
        let flags = record.flags();
        let (price, quantity) = (record.price, record.quantity);
        let (maker_cost, maker_fee) = (record.maker_cost, record.maker_fee);
        let (taker_cost, taker_fee) = (record.taker_cost, record.taker_fee);

        let maker = settlement("maker_cost", maker_cost, "maker_fee", maker_fee)?;
        let taker = settlement("taker_cost", taker_cost, "taker_fee", taker_fee)?;

        Ok(FillReport {
            maker_order_id: OrderId(u64::from_le(record.maker_order_id)),
            taker_order_id: OrderId(u64::from_le(record.taker_order_id)),
            taker_side: if flags.contains(SettlementFlags::TAKER_BUY) { Side::Buy } else { Side::Sell },
            price: Price::from_bytes(decimal("price", price)?),
            quantity: Quantity::from_bytes(decimal("quantity", quantity)?),
            timestamp: u64::from_le(record.timestamp),
            maker_final: flags.contains(SettlementFlags::MAKER_FINAL).then_some(maker),
            taker_final: flags.contains(SettlementFlags::TAKER_FINAL).then_some(taker),
            fill_sequence: u64::from_le(record.fill_sequence),
        })
    }

    /// Parse and decode a DecrementQuantity record.
    pub fn decode_decrement(buffer: &[u8]) -> Result<Decrement, ParseError> {
        let record = Self::parse_decrement(buffer)?;
        let (quantity, origin) = (record.quantity, record.origin);

        Ok(Decrement {
            order_id: OrderId(u64::from_le(record.order_id)),
            user_id: UserId(u64::from_le(record.user_id)),
            quantity: Quantity::from_bytes(decimal("quantity", quantity)?),
            timestamp: u64::from_le(record.timestamp),
            origin: enum_field::<DecrementOrigin>("origin", origin)?,
        })
    }

    fn parse<T: bytemuck::Pod>(buffer: &[u8], expected: MessageType) -> Result<&T, ParseError> {
        let size = size_of::<T>();
        check_header(buffer, expected, size)?;
        // Packed records have alignment 1, so this only fails on length.
        try_from_bytes(buffer).map_err(|_| ParseError::InvalidLength {
            expected: size,
            actual: buffer.len(),
        })
    }
}

fn check_header(buffer: &[u8], expected: MessageType, size: usize) -> Result<(), ParseError> {
    let actual = buffer.len();
    if actual <= TYPE_OFFSET {
        return Err(ParseError::InvalidLength { expected: size, actual });
    }

    let msg_type = buffer[TYPE_OFFSET];
    if msg_type != expected as u8 {
        return Err(ParseError::InvalidMessageType { expected: expected as u8, actual: msg_type });
    }

    if actual <= VERSION_OFFSET {
        return Err(ParseError::MissingVersion);
    }

    if actual != size {
        return Err(ParseError::InvalidLength { expected: size, actual });
    }

    let prefix = u32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
    if prefix != size {
        return Err(ParseError::InvalidLength { expected: size, actual: prefix });
    }

    match buffer[VERSION_OFFSET] {
        WIRE_VERSION => Ok(()),
        other => Err(ParseError::UnsupportedVersion(other)),
    }
}

/// The flags word is `[0, 0, scale, sign]`; only the sign bit may be set
/// in the last byte.
fn decimal(field: &'static str, bytes: WireDecimal) -> Result<WireDecimal, ParseError> {
    let valid = bytes[0] == 0 && bytes[1] == 0 && bytes[2] <= MAX_DECIMAL_SCALE && bytes[3] & 0x7F == 0;
    if valid {
        Ok(bytes)
    } else {
        Err(ParseError::InvalidDecimal { field })
    }
}

fn enum_field<T: TryFrom<u8, Error = u8>>(field: &'static str, value: u8) -> Result<T, ParseError> {
    T::try_from(value).map_err(|value| ParseError::InvalidEnumValue { field, value })
}

fn settlement(
    cost_field: &'static str,
    cost: WireDecimal,
    fee_field: &'static str,
    fee: WireDecimal,
) -> Result<Settlement, ParseError> {
    Ok(Settlement {
        cost: Amount::from_bytes(decimal(cost_field, cost)?),
        fee: Amount::from_bytes(decimal(fee_field, fee)?),
    })
}

/// Record builder for outbound messages.
pub struct MessageBuilder {
    fill_sequence: u64,
}

impl MessageBuilder {
    pub const fn new() -> Self {
        Self { fill_sequence: 0 }
    }

    /// Get next fill sequence number.
    #[inline(always)]
    pub fn next_fill_sequence(&mut self) -> u64 {
        self.fill_sequence += 1;
        self.fill_sequence
    }

    /// Number of fills built so far.
    #[inline]
    pub fn fills_built(&self) -> u64 {
        self.fill_sequence
    }

    /// Build an Order record for a submission into a buffer.
    #[inline]
    pub fn build_order(&mut self, buffer: &mut [u8], order: &NewOrder) -> usize {
        write(buffer, &OrderRecord::from_new_order(order))
    }

    /// Build an Order record for a resting order into a buffer.
    #[inline]
    pub fn build_order_snapshot(&mut self, buffer: &mut [u8], order: &Order) -> usize {
        write(buffer, &OrderRecord::from_order(order))
    }

    /// Build a Fill record into a buffer, stamping the next fill sequence.
    #[inline]
    pub fn build_fill(&mut self, buffer: &mut [u8], fill: &Fill) -> usize {
        let sequence = self.next_fill_sequence();
        write(buffer, &FillRecord::new(fill, sequence))
    }

    /// Build a DecrementQuantity record into a buffer.
    #[inline]
    pub fn build_decrement(&mut self, buffer: &mut [u8], decrement: &Decrement) -> usize {
        write(buffer, &DecrementRecord::new(decrement))
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn write<T: bytemuck::Pod>(buffer: &mut [u8], record: &T) -> usize {
    let size = size_of::<T>();
    debug_assert!(buffer.len() >= size);
    buffer[..size].copy_from_slice(bytemuck::bytes_of(record));
    size
}
