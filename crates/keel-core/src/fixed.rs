//! Fixed-precision decimal types for prices, quantities and notional amounts.
//!
//! All three wrap `rust_decimal::Decimal`, which gives exact base-10
//! arithmetic with up to 28 fractional digits and no IEEE 754 rounding.
//! The wrappers exist so a price can never be passed where a quantity
//! is expected.

use core::fmt;
use core::ops::{Add, AddAssign, Sub, SubAssign};
use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

/// Size of the wire form of any decimal value.
pub const DECIMAL_WIRE_SIZE: usize = 16;

macro_rules! decimal_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(Decimal);

        impl $name {
            /// Zero.
            pub const ZERO: Self = Self(Decimal::ZERO);

            /// Smallest representable value.
            pub const MIN: Self = Self(Decimal::MIN);

            /// Largest representable value.
            pub const MAX: Self = Self(Decimal::MAX);

            /// Create from a mantissa and a decimal scale (`new(25, 1)` is 2.5).
            #[inline]
            pub fn new(num: i64, scale: u32) -> Self {
                Self(Decimal::new(num, scale))
            }

            /// Create from a whole number.
            #[inline]
            pub fn from_int(value: i64) -> Self {
                Self(Decimal::from(value))
            }

            /// Get the inner decimal.
            #[inline(always)]
            pub const fn as_decimal(self) -> Decimal {
                self.0
            }

            #[inline(always)]
            pub fn is_zero(self) -> bool {
                self.0.is_zero()
            }

            #[inline(always)]
            pub fn is_negative(self) -> bool {
                self.0.is_sign_negative() && !self.0.is_zero()
            }

            #[inline(always)]
            pub fn is_positive(self) -> bool {
                self.0.is_sign_positive() && !self.0.is_zero()
            }

            /// Minimum of two values.
            #[inline(always)]
            pub fn min(self, other: Self) -> Self {
                if self.0 <= other.0 { self } else { other }
            }

            /// Subtraction floored at zero.
            #[inline]
            pub fn saturating_sub(self, other: Self) -> Self {
                if other.0 >= self.0 { Self::ZERO } else { Self(self.0 - other.0) }
            }

            /// `None` when the sum does not fit.
            #[inline]
            pub fn checked_add(self, other: Self) -> Option<Self> {
                self.0.checked_add(other.0).map(Self)
            }

            /// Addition clamped at [`Self::MAX`] and [`Self::MIN`].
            #[inline]
            pub fn saturating_add(self, other: Self) -> Self {
                Self(self.0.saturating_add(other.0))
            }

            /// 16-byte little-endian wire form.
            #[inline]
            pub fn to_bytes(self) -> [u8; DECIMAL_WIRE_SIZE] {
                self.0.serialize()
            }

            /// Inverse of [`Self::to_bytes`]. The caller is responsible for
            /// checking the scale byte; see `keel_proto::parser`.
            #[inline]
            pub fn from_bytes(bytes: [u8; DECIMAL_WIRE_SIZE]) -> Self {
                Self(Decimal::deserialize(bytes))
            }
        }

        impl From<Decimal> for $name {
            #[inline(always)]
            fn from(value: Decimal) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = rust_decimal::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Decimal::from_str(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl Add for $name {
            type Output = Self;

            #[inline(always)]
            fn add(self, other: Self) -> Self {
                Self(self.0 + other.0)
            }
        }

        impl Sub for $name {
            type Output = Self;

            #[inline(always)]
            fn sub(self, other: Self) -> Self {
                Self(self.0 - other.0)
            }
        }

        impl AddAssign for $name {
            #[inline(always)]
            fn add_assign(&mut self, other: Self) {
                self.0 += other.0;
            }
        }

        impl SubAssign for $name {
            #[inline(always)]
            fn sub_assign(&mut self, other: Self) {
                self.0 -= other.0;
            }
        }
    };
}

decimal_newtype! {
    /// Limit or stop price. Zero on a limit price means "market".
    Price
}

decimal_newtype! {
    /// Quantity in base units.
    Quantity
}

decimal_newtype! {
    /// Notional value (price × quantity) and fees, in quote units.
    Amount
}

impl Quantity {
    /// True when `self` is an exact multiple of `step`.
    ///
    /// `step` must be positive; a zero step accepts everything.
    pub fn is_multiple_of(self, step: Quantity) -> bool {
        if step.is_zero() {
            return true;
        }
        (self.0 % step.0).is_zero()
    }

    /// Round down to the nearest multiple of `step`.
    pub fn floor_to_step(self, step: Quantity) -> Quantity {
        if step.is_zero() {
            return self;
        }
        Quantity((self.0 / step.0).floor() * step.0)
    }
}

impl Amount {
    /// How many units of `price` this amount buys, unrounded.
    /// Returns `None` for a zero price.
    pub fn units_at(self, price: Price) -> Option<Quantity> {
        self.0.checked_div(price.0).map(Quantity)
    }

    /// `self × percent / 100`, rounded half away from zero to `scale` places.
    /// `None` if the product does not fit.
    pub fn percent(self, percent: Decimal, scale: u32) -> Option<Amount> {
        let raw = self.0.checked_mul(percent)?.checked_div(Decimal::ONE_HUNDRED)?;
        Some(Amount(raw.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)))
    }
}

impl Price {
    /// Number of decimal places carried by this price.
    #[inline]
    pub fn scale(self) -> u32 {
        self.0.scale()
    }

    /// Notional value of `qty` at this price, or `None` when it does not
    /// fit in 96 bits.
    #[inline]
    pub fn notional(self, qty: Quantity) -> Option<Amount> {
        self.0.checked_mul(qty.0).map(Amount)
    }
}
