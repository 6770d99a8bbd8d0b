//! Engine configuration.
//!
//! Construction-time settings for one instrument: the quantity step every
//! submitted quantity must be a multiple of, and the price tick whose
//! decimal scale fees are rounded to.

use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

use crate::fixed::{Price, Quantity};

/// Environment variable for the quantity step.
pub const STEP_SIZE_ENV: &str = "KEEL_STEP_SIZE";
/// Environment variable for the price tick.
pub const TICK_SIZE_ENV: &str = "KEEL_TICK_SIZE";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("step size must be positive, got {0}")]
    InvalidStepSize(Quantity),
    #[error("tick size must be positive, got {0}")]
    InvalidTickSize(Price),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Quantity granularity.
    pub step_size: Quantity,
    /// Price granularity. Only its scale is used, for fee rounding.
    pub tick_size: Price,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_size: Quantity::from_int(1),
            tick_size: Price::from_int(1),
        }
    }
}

impl EngineConfig {
    pub fn new(step_size: Quantity, tick_size: Price) -> Result<Self, ConfigError> {
        if !step_size.is_positive() {
            return Err(ConfigError::InvalidStepSize(step_size));
        }
        if !tick_size.is_positive() {
            return Err(ConfigError::InvalidTickSize(tick_size));
        }
        Ok(Self { step_size, tick_size })
    }

    /// Load from `KEEL_STEP_SIZE` / `KEEL_TICK_SIZE`, falling back to the
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with a caller-supplied variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let step_size = parse_or(&lookup, STEP_SIZE_ENV, defaults.step_size);
        let tick_size = parse_or(&lookup, TICK_SIZE_ENV, defaults.tick_size);
        Self::new(step_size, tick_size)
    }

    /// Decimal places fees are rounded to.
    #[inline]
    pub fn fee_scale(&self) -> u32 {
        self.tick_size.scale()
    }
}

fn parse_or<T: FromStr + std::fmt::Display>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, fallback = %default, "unparseable setting, using default");
                default
            }
        },
    }
}
