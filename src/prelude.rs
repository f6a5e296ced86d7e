//! Prelude module that re-exports commonly used types and traits.
//!
//! Instead of importing each type individually, you can use:
//!
//! ```rust
//! use fxcast_rs::prelude::*;
//! ```

// Market model
pub use crate::market::book::{BookConfig, MarketStats, OrderBook, PriceLevel, Trade};
pub use crate::market::events::{
    MarketEvent, MarketEventListener, QuoteUpdate, Side, SnapshotEvent, StatisticsEvent,
    TradeEvent, UpdateAction,
};
pub use crate::market::generator::{GeneratorStats, MarketDataGenerator, MarketRegime};
pub use crate::market::instrument::{Instrument, InstrumentDetails, InstrumentKind, PropertyValue};
pub use crate::market::manager::{BookError, BookManager};

// Wire codec
pub use crate::wire::{
    DecodedMessage, DecodedPacket, Encoder, PriceDecimal, WireError, decode_message, decode_packet,
};

// Transport and distribution
pub use crate::publisher::{
    ConfigError, FeedConfig, MulticastConfig, MulticastPublisher, PublisherStats,
};
pub use crate::transport::{Transport, TransportError, TransportFactory, UdpMulticastTransport};

// Server driver
pub use crate::server::{ServerDriver, ServerError};
