//! # Synthetic FX Multicast Market-Data Publisher
//!
//! A deterministic, replayable synthetic market-data feed modeled on a real
//! exchange multicast feed. The crate maintains per-instrument limit order
//! books in memory, synthesizes a continuous stream of realistic quote,
//! trade, snapshot, and statistics events under configurable market
//! regimes, and distributes those events as a framed binary protocol over
//! redundant UDP multicast feeds.
//!
//! ## Architecture
//!
//! - **Order-book engine** ([`market::book`], [`market::manager`]) —
//!   price-level aggregated bid/ask ladders in concurrent skip lists, a
//!   bounded trade tape, and derived session statistics (OHLC, VWAP, last
//!   trade, cumulative volume), all behind a registry with centralized
//!   event routing.
//! - **Market-data generator** ([`market::generator`]) — a stochastic,
//!   regime-driven event synthesizer. Six regimes (normal, fast, volatile,
//!   thin, trending, stressed) set volatility, update rate, trade
//!   probability, trend bias, spread factor, and target depth. Every event
//!   is applied to the books *before* listeners hear about it, so
//!   consumers always observe post-event state.
//! - **Wire codec** ([`wire`]) — a two-layer framing: a 20-byte
//!   little-endian packet header carrying the per-channel sequence, then
//!   an SBE-style message (8-byte header, fixed block, repeating groups).
//!   Prices travel as fixed-point Decimal(−9) mantissas with banker's
//!   rounding at the float boundary.
//! - **Multicast publisher** ([`publisher`]) — partitions instruments onto
//!   channels, duplicates every packet onto redundant A and B feeds with
//!   identical sequence numbers, and runs dedicated feeds for snapshots
//!   and security definitions. Runtime failures are counted, never fatal.
//! - **Transport** ([`transport`]) — one non-blocking UDP multicast socket
//!   per feed, with TTL, loopback, and buffer-size control.
//! - **Server driver** ([`server`]) — ties generator to publisher and runs
//!   the tick / heartbeat / snapshot / security-definition loop until a
//!   signal stops it.
//!
//! ## Wire guarantees
//!
//! Within a channel, packet sequence numbers are strictly monotone
//! (1, 2, 3, …); a gap means loss. Feeds A and B carry byte-identical
//! packets, so a receiver uses whichever arrives first. Across channels no
//! ordering is defined. Periodic full snapshots plus the A/B duplication
//! are the only recovery mechanisms — there is no retransmission protocol.
//!
//! ## Example
//!
//! ```no_run
//! use fxcast_rs::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = Arc::new(BookManager::new());
//! let instrument = Instrument::fx_spot(1001, "EURUSD")
//!     .with_tick_size(0.00001)
//!     .with_property("initial_price", 1.0850);
//! manager.add_instrument(instrument)?;
//! manager.create_order_book(1001, BookConfig::default())?;
//!
//! let generator = MarketDataGenerator::with_seed(Arc::clone(&manager), 42);
//! let publisher = Arc::new(MulticastPublisher::initialize(
//!     MulticastConfig::default_local(),
//!     &manager.all_instruments(),
//! )?);
//! let listener: Arc<dyn MarketEventListener> = publisher.clone();
//! generator.add_listener(&listener);
//!
//! generator.generate_batch(100);
//! # Ok(())
//! # }
//! ```

pub mod market;
pub mod prelude;
pub mod publisher;
pub mod server;
pub mod transport;
mod utils;
pub mod wire;

pub use market::{
    BookConfig, BookError, BookManager, Instrument, InstrumentKind, MarketDataGenerator,
    MarketEvent, MarketEventListener, MarketRegime, MarketStats, OrderBook, PriceLevel,
    QuoteUpdate, Side, SnapshotEvent, TradeEvent, UpdateAction,
};
pub use publisher::{ConfigError, FeedConfig, MulticastConfig, MulticastPublisher, PublisherStats};
pub use server::{ServerDriver, ServerError};
pub use transport::{Transport, TransportError, TransportFactory, UdpMulticastTransport};
pub use utils::current_time_nanos;
pub use wire::{Encoder, PriceDecimal, WireError, decode_packet};
