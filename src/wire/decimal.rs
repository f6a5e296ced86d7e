//! Fixed-exponent price decimal.
//!
//! Prices travel as `{ mantissa: i64, exponent: -9 }`: wire mantissa `m`
//! represents the real value `m × 10⁻⁹`. The exponent is fixed by schema,
//! so decoders always divide by `1e9` rather than deriving a scale from the
//! wire. `i64::MAX` is the null sentinel.

use crate::wire::WireError;
use serde::{Deserialize, Serialize};

/// Schema-fixed exponent.
pub const DECIMAL_EXPONENT: i8 = -9;

/// Mantissa value that encodes null.
pub const NULL_MANTISSA: i64 = i64::MAX;

const SCALE: f64 = 1e9;

/// A Decimal(−9) price as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceDecimal {
    mantissa: i64,
}

impl PriceDecimal {
    /// The null price.
    pub const NULL: Self = Self {
        mantissa: NULL_MANTISSA,
    };

    /// Wraps a raw wire mantissa.
    pub fn from_mantissa(mantissa: i64) -> Self {
        Self { mantissa }
    }

    /// Converts a floating-point price with banker's rounding.
    ///
    /// # Errors
    /// [`WireError::DecimalOverflow`] when the price is not finite or its
    /// scaled magnitude does not fit the mantissa (|price| ≳ 9.2e9).
    pub fn from_f64(price: f64) -> Result<Self, WireError> {
        let scaled = (price * SCALE).round_ties_even();
        // The null sentinel is excluded from the representable range.
        if !scaled.is_finite() || scaled >= NULL_MANTISSA as f64 || scaled < i64::MIN as f64 {
            return Err(WireError::DecimalOverflow(price));
        }
        Ok(Self {
            mantissa: scaled as i64,
        })
    }

    pub fn mantissa(self) -> i64 {
        self.mantissa
    }

    pub fn is_null(self) -> bool {
        self.mantissa == NULL_MANTISSA
    }

    /// The real value, or `None` for the null sentinel.
    pub fn to_f64(self) -> Option<f64> {
        if self.is_null() {
            None
        } else {
            Some(self.mantissa as f64 / SCALE)
        }
    }
}

impl Default for PriceDecimal {
    fn default() -> Self {
        Self::NULL
    }
}

/// Infallible ladder key for an in-memory price: the same banker's rounding
/// as [`PriceDecimal::from_f64`], saturating at the representable range.
///
/// Order books key their ladders with this so "same price" means exactly
/// what the wire says it means.
pub fn price_key(price: f64) -> i64 {
    (price * SCALE).round_ties_even() as i64
}
