//! Typed market events flowing from the generator through the books to the
//! publisher.
//!
//! Every event carries the instrument id it belongs to, a nanosecond
//! timestamp, and the generator's per-instrument sequence stamp. Wire-level
//! sequencing is a separate concern handled by the publisher.

use serde::{Deserialize, Serialize};

/// Book side of a quote or trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy side.
    Bid,
    /// Sell side.
    Ask,
    /// No side (e.g. a trade with an unknown aggressor).
    None,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Bid => write!(f, "bid"),
            Side::Ask => write!(f, "ask"),
            Side::None => write!(f, "none"),
        }
    }
}

/// What a quote update does to the targeted price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateAction {
    /// Insert a new level.
    Add,
    /// Modify an existing level.
    Change,
    /// Remove the level at the quoted price.
    Delete,
    /// Full replacement of the level.
    Overlay,
    /// Remove every level on the quoted side.
    Clear,
}

/// Statistic kinds carried by [`StatisticsEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatType {
    Open,
    High,
    Low,
    Close,
    Settlement,
    Vwap,
    TradeVolume,
}

/// Trading-session states carried by [`StatusEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketStatus {
    PreOpen,
    OpeningAuction,
    Continuous,
    ClosingAuction,
    PostClose,
    Halted,
    Paused,
}

/// A single price-level delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteUpdate {
    /// Instrument this update applies to.
    pub instrument_id: u32,
    /// Event time, nanoseconds since the UNIX epoch.
    pub timestamp_ns: u64,
    /// Generator sequence stamp, per instrument.
    pub sequence: u32,
    /// Side of the book being updated.
    pub side: Side,
    /// Level price.
    pub price: f64,
    /// Level quantity. Zero combined with `Change` removes the level.
    pub quantity: u64,
    /// What to do with the level.
    pub action: UpdateAction,
    /// Number of orders aggregated at the level.
    pub order_count: u32,
    /// Explicit 1-based level number, when the protocol carries one.
    pub price_level: Option<u8>,
    /// Per-instrument report sequence, when carried.
    pub rpt_seq: Option<u32>,
    /// Contributing market maker, when carried.
    pub market_maker: Option<String>,
    /// Implied quantity at the level, when carried.
    pub implied_quantity: Option<u64>,
}

impl QuoteUpdate {
    /// Creates a quote update with the common fields set and all optional
    /// protocol fields empty.
    pub fn new(instrument_id: u32) -> Self {
        Self {
            instrument_id,
            timestamp_ns: 0,
            sequence: 0,
            side: Side::Bid,
            price: 0.0,
            quantity: 0,
            action: UpdateAction::Add,
            order_count: 0,
            price_level: None,
            rpt_seq: None,
            market_maker: None,
            implied_quantity: None,
        }
    }
}

/// A synthesized trade print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub instrument_id: u32,
    pub timestamp_ns: u64,
    pub sequence: u32,
    pub price: f64,
    pub quantity: u64,
    /// Side that crossed the spread, when known.
    pub aggressor_side: Option<Side>,
    /// Venue-assigned trade identifier, when known.
    pub trade_id: Option<String>,
    pub rpt_seq: Option<u32>,
}

impl TradeEvent {
    pub fn new(instrument_id: u32) -> Self {
        Self {
            instrument_id,
            timestamp_ns: 0,
            sequence: 0,
            price: 0.0,
            quantity: 0,
            aggressor_side: None,
            trade_id: None,
            rpt_seq: None,
        }
    }
}

/// Full book state for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEvent {
    pub instrument_id: u32,
    pub timestamp_ns: u64,
    pub sequence: u32,
    /// Bid levels, best first.
    pub bid_levels: Vec<QuoteUpdate>,
    /// Ask levels, best first.
    pub ask_levels: Vec<QuoteUpdate>,
    pub last_trade_price: Option<f64>,
    pub total_volume: Option<u64>,
    pub rpt_seq: Option<u32>,
}

impl SnapshotEvent {
    pub fn new(instrument_id: u32) -> Self {
        Self {
            instrument_id,
            timestamp_ns: 0,
            sequence: 0,
            bid_levels: Vec::new(),
            ask_levels: Vec::new(),
            last_trade_price: None,
            total_volume: None,
            rpt_seq: None,
        }
    }
}

/// A single session statistic (OHLC, settlement, VWAP, volume).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsEvent {
    pub instrument_id: u32,
    pub timestamp_ns: u64,
    pub sequence: u32,
    pub stat_type: StatType,
    pub value: f64,
    pub volume: Option<u64>,
}

impl StatisticsEvent {
    pub fn new(instrument_id: u32) -> Self {
        Self {
            instrument_id,
            timestamp_ns: 0,
            sequence: 0,
            stat_type: StatType::Close,
            value: 0.0,
            volume: None,
        }
    }
}

/// Trading-session status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub instrument_id: u32,
    pub timestamp_ns: u64,
    pub sequence: u32,
    pub status: MarketStatus,
    pub halt_reason: Option<String>,
}

/// Instruction to drop the entire book for an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookClearEvent {
    pub instrument_id: u32,
    pub timestamp_ns: u64,
    pub sequence: u32,
}

/// Auction-imbalance notification. Reserved: the shape is fixed but no
/// producer in this crate emits it yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImbalanceEvent {
    pub instrument_id: u32,
    pub timestamp_ns: u64,
    pub sequence: u32,
}

/// The market event sum type.
///
/// The `Imbalance` variant is reserved for auction-imbalance feeds; nothing
/// in this crate constructs it yet, but the discriminant is stable so
/// downstream matches can already handle it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketEvent {
    Quote(QuoteUpdate),
    Trade(TradeEvent),
    Snapshot(SnapshotEvent),
    Statistics(StatisticsEvent),
    Status(StatusEvent),
    BookClear(BookClearEvent),
    /// Reserved.
    Imbalance(ImbalanceEvent),
}

impl MarketEvent {
    /// Instrument the event applies to.
    pub fn instrument_id(&self) -> u32 {
        match self {
            MarketEvent::Quote(e) => e.instrument_id,
            MarketEvent::Trade(e) => e.instrument_id,
            MarketEvent::Snapshot(e) => e.instrument_id,
            MarketEvent::Statistics(e) => e.instrument_id,
            MarketEvent::Status(e) => e.instrument_id,
            MarketEvent::BookClear(e) => e.instrument_id,
            MarketEvent::Imbalance(e) => e.instrument_id,
        }
    }

    /// Event time, nanoseconds since the UNIX epoch.
    pub fn timestamp_ns(&self) -> u64 {
        match self {
            MarketEvent::Quote(e) => e.timestamp_ns,
            MarketEvent::Trade(e) => e.timestamp_ns,
            MarketEvent::Snapshot(e) => e.timestamp_ns,
            MarketEvent::Statistics(e) => e.timestamp_ns,
            MarketEvent::Status(e) => e.timestamp_ns,
            MarketEvent::BookClear(e) => e.timestamp_ns,
            MarketEvent::Imbalance(e) => e.timestamp_ns,
        }
    }

    /// Generator sequence stamp.
    pub fn sequence(&self) -> u32 {
        match self {
            MarketEvent::Quote(e) => e.sequence,
            MarketEvent::Trade(e) => e.sequence,
            MarketEvent::Snapshot(e) => e.sequence,
            MarketEvent::Statistics(e) => e.sequence,
            MarketEvent::Status(e) => e.sequence,
            MarketEvent::BookClear(e) => e.sequence,
            MarketEvent::Imbalance(e) => e.sequence,
        }
    }

    /// Short lowercase tag used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            MarketEvent::Quote(_) => "quote",
            MarketEvent::Trade(_) => "trade",
            MarketEvent::Snapshot(_) => "snapshot",
            MarketEvent::Statistics(_) => "statistics",
            MarketEvent::Status(_) => "status",
            MarketEvent::BookClear(_) => "book_clear",
            MarketEvent::Imbalance(_) => "imbalance",
        }
    }
}

/// Receiver of generated market events.
///
/// Listeners are registered on the generator as weak references; an expired
/// listener is pruned during dispatch. Events arrive after they have been
/// applied to the books, so a listener always observes post-event state.
pub trait MarketEventListener: Send + Sync {
    /// Called for every generated event, in generation order per instrument.
    fn on_market_event(&self, event: &MarketEvent);
}
