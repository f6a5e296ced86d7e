//! Instrument reference data.
//!
//! An [`Instrument`] is created at startup and keeps its identity for the
//! lifetime of the server. Kind-specific reference fields live in
//! [`InstrumentDetails`]; everything venue- or protocol-specific that does
//! not deserve its own field goes into the open-ended `properties` map.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Discriminating kind of a tradable product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentKind {
    Future,
    Option,
    FxSpot,
    FxForward,
    Equity,
    Spread,
    Unknown,
}

/// Heterogeneous property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl PropertyValue {
    /// Returns the value as `f64` when it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

/// Call/put discriminator for options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionRight {
    Call,
    Put,
}

/// Kind-specific reference fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstrumentDetails {
    Future {
        underlying: String,
        /// YYYY-MM-DD.
        maturity_date: String,
        /// Exchange contract-month code, e.g. `Z4`.
        contract_month: String,
        contract_size: f64,
    },
    Option {
        underlying: String,
        strike_price: f64,
        expiry_date: String,
        right: OptionRight,
        /// `American` or `European`.
        exercise_style: String,
    },
    FxSpot {
        base_currency: String,
        quote_currency: String,
        /// T+1, T+2.
        settlement_convention: String,
        standard_lot_size: f64,
        primary_venue: Option<String>,
    },
    Spread {
        leg_instrument_ids: Vec<u32>,
        /// Signed ratio per leg, e.g. `[1, -1]` for a calendar spread.
        leg_ratios: Vec<i32>,
    },
}

/// An identified tradable product.
///
/// Identity (`instrument_id`, `symbol`, `kind`) is immutable after
/// construction; properties may be updated while the server runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    /// Internal unique id.
    pub instrument_id: u32,
    /// Primary exchange symbol, at most 16 printable characters.
    pub symbol: String,
    pub description: String,
    kind: InstrumentKind,
    /// Smallest price increment; submitted prices snap to a multiple of it.
    pub tick_size: f64,
    /// Contract price multiplier.
    pub multiplier: f64,
    pub min_price_increment: f64,
    pub max_price_variation: Option<f64>,
    /// Protocol name → external symbol, e.g. `{"RIC": "EUR="}`.
    pub external_ids: HashMap<String, String>,
    /// Open-ended reference properties.
    pub properties: HashMap<String, PropertyValue>,
    /// Kind-specific fields, when the kind has any.
    pub details: Option<InstrumentDetails>,
}

impl Instrument {
    /// Creates an instrument with default trading parameters
    /// (tick 0.01, multiplier 1.0).
    pub fn new(instrument_id: u32, symbol: impl Into<String>, kind: InstrumentKind) -> Self {
        Self {
            instrument_id,
            symbol: symbol.into(),
            description: String::new(),
            kind,
            tick_size: 0.01,
            multiplier: 1.0,
            min_price_increment: 0.01,
            max_price_variation: None,
            external_ids: HashMap::new(),
            properties: HashMap::new(),
            details: None,
        }
    }

    /// Convenience constructor for an FX spot pair, deriving the currency
    /// legs from the six-letter symbol when possible.
    pub fn fx_spot(instrument_id: u32, symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        let (base, quote) = if symbol.len() >= 6 && symbol.is_ascii() {
            (symbol[..3].to_string(), symbol[3..6].to_string())
        } else {
            (String::new(), String::new())
        };
        let mut instrument = Self::new(instrument_id, symbol, InstrumentKind::FxSpot);
        instrument.details = Some(InstrumentDetails::FxSpot {
            base_currency: base,
            quote_currency: quote,
            settlement_convention: "T+2".to_string(),
            standard_lot_size: 1_000_000.0,
            primary_venue: None,
        });
        instrument
    }

    pub fn kind(&self) -> InstrumentKind {
        self.kind
    }

    /// Sets the tick size, builder style.
    #[must_use = "builders do nothing unless consumed"]
    pub fn with_tick_size(mut self, tick_size: f64) -> Self {
        self.tick_size = tick_size;
        self.min_price_increment = tick_size;
        self
    }

    /// Sets a property, builder style.
    #[must_use = "builders do nothing unless consumed"]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Updates or inserts a property.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Looks up a numeric property.
    pub fn property_f64(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(PropertyValue::as_f64)
    }

    /// Looks up a property of any type.
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// External symbol registered for a protocol, e.g. `external_id("RIC")`.
    pub fn external_id(&self, protocol: &str) -> Option<&str> {
        self.external_ids.get(protocol).map(String::as_str)
    }

    /// Currency legs for wire encoding: `(currency1, currency2)`.
    ///
    /// FX instruments report their actual legs; everything else falls back
    /// to USD against an empty second leg.
    pub fn currency_pair(&self) -> (String, String) {
        match &self.details {
            Some(InstrumentDetails::FxSpot {
                base_currency,
                quote_currency,
                ..
            }) => (base_currency.clone(), quote_currency.clone()),
            _ => ("USD".to_string(), String::new()),
        }
    }
}
