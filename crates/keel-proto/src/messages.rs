//! Binary record definitions.
//!
//! All records use fixed-size packed layouts and can be read straight out
//! of a byte buffer. Integers are little-endian; decimals use the 16-byte
//! `rust_decimal` serialization.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use core::mem::size_of;

use keel_core::{Decrement, Fill, NewOrder, Order, OrderType, DECIMAL_WIRE_SIZE};

/// Current record version.
pub const WIRE_VERSION: u8 = 1;

/// Record type discriminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Order = 0x01,
    Fill = 0x02,
    DecrementQuantity = 0x03,
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0x01 => Ok(MessageType::Order),
            0x02 => Ok(MessageType::Fill),
            0x03 => Ok(MessageType::DecrementQuantity),
            other => Err(other),
        }
    }
}

/// Record header (6 bytes).
#[derive(Clone, Copy, Debug, Default)]
#[repr(C, packed)]
pub struct MessageHeader {
    /// Total record length, header included.
    pub length: u32,
    pub msg_type: u8,
    pub version: u8,
}

const _: () = assert!(size_of::<MessageHeader>() == 6);

// SAFETY: packed, every field is plain data, no padding
unsafe impl Pod for MessageHeader {}
unsafe impl Zeroable for MessageHeader {}

impl MessageHeader {
    pub const fn new(msg_type: MessageType, length: usize) -> Self {
        Self {
            length: (length as u32).to_le(),
            msg_type: msg_type as u8,
            version: WIRE_VERSION,
        }
    }

    /// Length prefix in native order.
    #[inline]
    pub fn length(&self) -> u32 {
        u32::from_le(self.length)
    }
}

/// Decimal field as carried on the wire.
pub type WireDecimal = [u8; DECIMAL_WIRE_SIZE];

/// Order record (144 bytes). Carries either a submission or a snapshot of
/// a resting order.
#[derive(Clone, Copy, Debug, Default)]
#[repr(C, packed)]
pub struct OrderRecord {
    pub header: MessageHeader,      // 6 bytes
    pub side: u8,                   // 0=Buy, 1=Sell
    pub condition: u8,
    pub self_match_action: u8,
    pub order_id: u64,
    pub user_id: u64,
    pub price: WireDecimal,
    pub open_quantity: WireDecimal,
    pub stop_price: WireDecimal,
    pub total_quantity: WireDecimal,
    /// Zero unless the order is an iceberg.
    pub tip_quantity: WireDecimal,
    pub order_amount: WireDecimal,
    pub cancel_on: u64,
    /// Zero while unassigned.
    pub sequence: u64,
    pub fee_id: u32,
    pub _reserved: [u8; 3],
}

const _: () = assert!(size_of::<OrderRecord>() == 144);

unsafe impl Pod for OrderRecord {}
unsafe impl Zeroable for OrderRecord {}

impl OrderRecord {
    /// Encode a submission.
    pub fn from_new_order(order: &NewOrder) -> Self {
        Self {
            header: MessageHeader::new(MessageType::Order, size_of::<Self>()),
            side: order.side as u8,
            condition: order.condition as u8,
            self_match_action: order.self_match_action as u8,
            order_id: order.order_id.0.to_le(),
            user_id: order.user_id.0.to_le(),
            price: order.price.to_bytes(),
            open_quantity: order.open_quantity.to_bytes(),
            stop_price: order.stop_price.to_bytes(),
            total_quantity: order.total_quantity.to_bytes(),
            tip_quantity: [0; DECIMAL_WIRE_SIZE],
            order_amount: order.order_amount.to_bytes(),
            cancel_on: order.cancel_on.to_le(),
            sequence: 0,
            fee_id: order.fee_id.0.to_le(),
            _reserved: [0; 3],
        }
    }

    /// Encode the current state of an admitted order.
    pub fn from_order(order: &Order) -> Self {
        let zero = [0; DECIMAL_WIRE_SIZE];
        let (total, tip) = match order.order_type {
            OrderType::Iceberg { tip, total, .. } => (total.to_bytes(), tip.to_bytes()),
            _ => (zero, zero),
        };
        Self {
            header: MessageHeader::new(MessageType::Order, size_of::<Self>()),
            side: order.side as u8,
            condition: order.condition as u8,
            self_match_action: order.self_match_action as u8,
            order_id: order.order_id.0.to_le(),
            user_id: order.user_id.0.to_le(),
            price: order.price().to_bytes(),
            open_quantity: order.open_quantity.to_bytes(),
            stop_price: order.stop_price().map_or(zero, |p| p.to_bytes()),
            total_quantity: total,
            tip_quantity: tip,
            order_amount: order.budget().map_or(zero, |a| a.to_bytes()),
            cancel_on: order.cancel_on.to_le(),
            sequence: order.sequence.unwrap_or(0).to_le(),
            fee_id: order.fee_id.0.to_le(),
            _reserved: [0; 3],
        }
    }
}

bitflags! {
    /// Which sides of a fill are final, and the taker's direction.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SettlementFlags: u8 {
        const MAKER_FINAL = 0b0000_0001;
        const TAKER_FINAL = 0b0000_0010;
        const TAKER_BUY   = 0b0000_0100;
    }
}

/// Fill record (135 bytes).
#[derive(Clone, Copy, Debug, Default)]
#[repr(C, packed)]
pub struct FillRecord {
    pub header: MessageHeader,      // 6 bytes
    pub maker_order_id: u64,
    pub taker_order_id: u64,
    pub price: WireDecimal,
    pub quantity: WireDecimal,
    pub timestamp: u64,
    pub maker_cost: WireDecimal,
    pub maker_fee: WireDecimal,
    pub taker_cost: WireDecimal,
    pub taker_fee: WireDecimal,
    /// [`SettlementFlags`] bits.
    pub flags: u8,
    pub fill_sequence: u64,
}

const _: () = assert!(size_of::<FillRecord>() == 135);

unsafe impl Pod for FillRecord {}
unsafe impl Zeroable for FillRecord {}

impl FillRecord {
    /// Encode a fill. Settlement fields are zero for a side that is not final.
    pub fn new(fill: &Fill, fill_sequence: u64) -> Self {
        let zero = [0; DECIMAL_WIRE_SIZE];
        let mut flags = SettlementFlags::empty();
        flags.set(SettlementFlags::MAKER_FINAL, fill.maker_final.is_some());
        flags.set(SettlementFlags::TAKER_FINAL, fill.taker_final.is_some());
        flags.set(SettlementFlags::TAKER_BUY, fill.taker_side.is_buy());

        Self {
            header: MessageHeader::new(MessageType::Fill, size_of::<Self>()),
            maker_order_id: fill.maker_order_id.0.to_le(),
            taker_order_id: fill.taker_order_id.0.to_le(),
            price: fill.price.to_bytes(),
            quantity: fill.quantity.to_bytes(),
            timestamp: fill.timestamp.to_le(),
            maker_cost: fill.maker_final.map_or(zero, |s| s.cost.to_bytes()),
            maker_fee: fill.maker_final.map_or(zero, |s| s.fee.to_bytes()),
            taker_cost: fill.taker_final.map_or(zero, |s| s.cost.to_bytes()),
            taker_fee: fill.taker_final.map_or(zero, |s| s.fee.to_bytes()),
            flags: flags.bits(),
            fill_sequence: fill_sequence.to_le(),
        }
    }

    /// Flag bits; unknown bits are dropped.
    #[inline]
    pub fn flags(&self) -> SettlementFlags {
        SettlementFlags::from_bits_truncate(self.flags)
    }
}

/// Decrement record (47 bytes).
#[derive(Clone, Copy, Debug, Default)]
#[repr(C, packed)]
pub struct DecrementRecord {
    pub header: MessageHeader,      // 6 bytes
    pub order_id: u64,
    pub user_id: u64,
    pub quantity: WireDecimal,
    pub timestamp: u64,
    /// 0=user request, 1=self-match.
    pub origin: u8,
}

const _: () = assert!(size_of::<DecrementRecord>() == 47);

unsafe impl Pod for DecrementRecord {}
unsafe impl Zeroable for DecrementRecord {}

impl DecrementRecord {
    pub fn new(decrement: &Decrement) -> Self {
        Self {
            header: MessageHeader::new(MessageType::DecrementQuantity, size_of::<Self>()),
            order_id: decrement.order_id.0.to_le(),
            user_id: decrement.user_id.0.to_le(),
            quantity: decrement.quantity.to_bytes(),
            timestamp: decrement.timestamp.to_le(),
            origin: decrement.origin as u8,
        }
    }
}
