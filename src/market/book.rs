//! Per-instrument order book with price-level aggregation and derived
//! session statistics.
//!
//! Ladders are stored in concurrent ordered maps (skip lists) keyed by the
//! fixed-point price mantissa, so level lookup and best-price queries are
//! lock-free and the rounding that defines "same price" is exactly the
//! rounding the wire codec uses. Mutations are expected to flow through
//! [`BookManager::apply_event`](crate::market::manager::BookManager), which
//! serializes them per registry.

use crate::market::events::{
    BookClearEvent, MarketEvent, QuoteUpdate, Side, SnapshotEvent, TradeEvent, UpdateAction,
};
use crate::utils::current_time_nanos;
use crate::wire::price_key;
use crossbeam::atomic::AtomicCell;
use crossbeam_skiplist::SkipMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

/// Maximum number of trades retained on the tape.
const TRADE_TAPE_CAPACITY: usize = 100;

/// A single aggregated price level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    /// Aggregate resting quantity. Never zero for a stored level.
    pub quantity: u64,
    /// Number of orders aggregated at this price.
    pub order_count: u32,
    /// Time of the last update to this level, nanoseconds since the epoch.
    pub last_update_time_ns: u64,
    pub implied_quantity: Option<u64>,
    pub market_maker_id: Option<String>,
    /// Explicit 1-based level number when the source protocol carries one.
    pub level_number: Option<u8>,
}

/// One executed trade on the tape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub price: f64,
    pub quantity: u64,
    pub timestamp_ns: u64,
    pub aggressor_side: Option<Side>,
    pub trade_id: Option<String>,
}

/// Session statistics derived from the trade stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketStats {
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub last_price: f64,
    pub settlement_price: f64,
    pub total_volume: u64,
    pub trade_count: u32,
    pub vwap: f64,
    pub previous_settlement: Option<f64>,
    pub open_interest: Option<f64>,
    pub cleared_volume: Option<f64>,
}

/// Per-book behavior switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookConfig {
    /// How many levels a side is expected to expose to consumers.
    pub max_visible_levels: usize,
    /// Track implied quantities alongside outright ones.
    pub maintain_implied_prices: bool,
    /// Keep market-maker attribution on levels.
    pub track_market_makers: bool,
    /// Aggregate orders at the same price into one level.
    pub aggregate_by_price: bool,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            max_visible_levels: 10,
            maintain_implied_prices: false,
            track_market_makers: false,
            aggregate_by_price: true,
        }
    }
}

/// Price-sorted bid/ask ladders plus trade tape and statistics for one
/// instrument.
///
/// Bids are best at the greatest key, asks best at the least key; both
/// ladders share the same mantissa keying so a price is either present once
/// or absent on each side.
#[derive(Debug)]
pub struct OrderBook {
    instrument_id: u32,
    symbol: String,
    config: BookConfig,

    /// Bid ladder keyed by price mantissa; best bid is the back entry.
    bids: SkipMap<i64, PriceLevel>,
    /// Ask ladder keyed by price mantissa; best ask is the front entry.
    asks: SkipMap<i64, PriceLevel>,

    /// Most recent trades, oldest first, bounded to [`TRADE_TAPE_CAPACITY`].
    recent_trades: Mutex<VecDeque<Trade>>,
    stats: Mutex<MarketStats>,

    /// Lock-free mirror of the last trade price for snapshot reads.
    last_trade_price: AtomicCell<f64>,
    has_traded: AtomicBool,
}

impl OrderBook {
    pub fn new(instrument_id: u32, symbol: impl Into<String>) -> Self {
        Self::with_config(instrument_id, symbol, BookConfig::default())
    }

    pub fn with_config(instrument_id: u32, symbol: impl Into<String>, config: BookConfig) -> Self {
        Self {
            instrument_id,
            symbol: symbol.into(),
            config,
            bids: SkipMap::new(),
            asks: SkipMap::new(),
            recent_trades: Mutex::new(VecDeque::with_capacity(TRADE_TAPE_CAPACITY)),
            stats: Mutex::new(MarketStats::default()),
            last_trade_price: AtomicCell::new(0.0),
            has_traded: AtomicBool::new(false),
        }
    }

    pub fn instrument_id(&self) -> u32 {
        self.instrument_id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn config(&self) -> &BookConfig {
        &self.config
    }

    fn side_map(&self, side: Side) -> Option<&SkipMap<i64, PriceLevel>> {
        match side {
            Side::Bid => Some(&self.bids),
            Side::Ask => Some(&self.asks),
            Side::None => None,
        }
    }

    /// Inserts or replaces the level at `level.price` on `side`.
    pub fn add_level(&self, side: Side, level: PriceLevel) {
        if let Some(map) = self.side_map(side) {
            map.insert(price_key(level.price), level);
        }
    }

    /// Like [`add_level`](Self::add_level), except a zero quantity deletes
    /// the level instead.
    pub fn update_level(&self, side: Side, level: PriceLevel) {
        if level.quantity == 0 {
            self.remove_level(side, level.price);
            return;
        }
        self.add_level(side, level);
    }

    /// Removes the level at `price` if present; no-op otherwise.
    pub fn remove_level(&self, side: Side, price: f64) {
        if let Some(map) = self.side_map(side) {
            map.remove(&price_key(price));
        }
    }

    /// Removes every level on `side`.
    pub fn clear_side(&self, side: Side) {
        if let Some(map) = self.side_map(side) {
            while map.pop_front().is_some() {}
        }
    }

    /// Empties both ladders, the trade tape, and the statistics.
    pub fn clear(&self) {
        self.clear_side(Side::Bid);
        self.clear_side(Side::Ask);
        self.recent_trades
            .lock()
            .expect("trade tape lock poisoned")
            .clear();
        *self.stats.lock().expect("stats lock poisoned") = MarketStats::default();
        self.last_trade_price.store(0.0);
        self.has_traded.store(false, Ordering::Release);
    }

    /// Appends a trade to the tape (dropping the oldest beyond the cap) and
    /// folds it into the session statistics.
    pub fn add_trade(&self, trade: Trade) {
        {
            let mut tape = self
                .recent_trades
                .lock()
                .expect("trade tape lock poisoned");
            tape.push_back(trade.clone());
            while tape.len() > TRADE_TAPE_CAPACITY {
                tape.pop_front();
            }
        }
        self.update_stats_on_trade(&trade);
    }

    fn update_stats_on_trade(&self, trade: &Trade) {
        let mut stats = self.stats.lock().expect("stats lock poisoned");

        stats.last_price = trade.price;

        if stats.trade_count == 0 {
            stats.open_price = trade.price;
            stats.high_price = trade.price;
            stats.low_price = trade.price;
            stats.vwap = trade.price;
        } else {
            stats.high_price = stats.high_price.max(trade.price);
            stats.low_price = stats.low_price.min(trade.price);
            // The incremental VWAP must use the volume *before* this trade.
            let previous_volume = stats.total_volume as f64;
            let new_volume = previous_volume + trade.quantity as f64;
            stats.vwap =
                (stats.vwap * previous_volume + trade.price * trade.quantity as f64) / new_volume;
        }

        stats.total_volume += trade.quantity;
        stats.trade_count += 1;

        drop(stats);
        self.last_trade_price.store(trade.price);
        self.has_traded.store(true, Ordering::Release);
    }

    /// Up to `max_levels` bid levels, best (highest price) first.
    pub fn get_bids(&self, max_levels: usize) -> Vec<PriceLevel> {
        self.bids
            .iter()
            .rev()
            .take(max_levels)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Up to `max_levels` ask levels, best (lowest price) first.
    pub fn get_asks(&self, max_levels: usize) -> Vec<PriceLevel> {
        self.asks
            .iter()
            .take(max_levels)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// The most recent `count` trades, oldest first.
    pub fn recent_trades(&self, count: usize) -> Vec<Trade> {
        let tape = self
            .recent_trades
            .lock()
            .expect("trade tape lock poisoned");
        let skip = tape.len().saturating_sub(count);
        tape.iter().skip(skip).cloned().collect()
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.bids.back().map(|entry| entry.value().price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.front().map(|entry| entry.value().price)
    }

    /// `(best_bid + best_ask) / 2`, when both sides exist.
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            _ => None,
        }
    }

    /// `best_ask - best_bid`, when both sides exist.
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// True when `best_bid >= best_ask`. A crossed book is observable but
    /// never corrected here.
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid >= ask,
            _ => false,
        }
    }

    pub fn bid_depth(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_depth(&self) -> usize {
        self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// A copy of the current session statistics.
    pub fn stats(&self) -> MarketStats {
        self.stats.lock().expect("stats lock poisoned").clone()
    }

    /// Replaces the session statistics wholesale.
    pub fn update_stats(&self, stats: MarketStats) {
        let has_traded = stats.trade_count > 0;
        self.last_trade_price.store(stats.last_price);
        self.has_traded.store(has_traded, Ordering::Release);
        *self.stats.lock().expect("stats lock poisoned") = stats;
    }

    /// Builds a [`SnapshotEvent`] from the current book state, stamped with
    /// the current time.
    pub fn create_snapshot(&self, max_levels: usize) -> SnapshotEvent {
        let now = current_time_nanos();
        let mut snapshot = SnapshotEvent::new(self.instrument_id);
        snapshot.timestamp_ns = now;

        for (index, level) in self.get_bids(max_levels).into_iter().enumerate() {
            snapshot
                .bid_levels
                .push(self.level_to_quote(Side::Bid, index, level, now));
        }
        for (index, level) in self.get_asks(max_levels).into_iter().enumerate() {
            snapshot
                .ask_levels
                .push(self.level_to_quote(Side::Ask, index, level, now));
        }

        if self.has_traded.load(Ordering::Acquire) {
            snapshot.last_trade_price = Some(self.last_trade_price.load());
        }
        snapshot.total_volume = Some(self.stats().total_volume);

        trace!(
            instrument_id = self.instrument_id,
            bids = snapshot.bid_levels.len(),
            asks = snapshot.ask_levels.len(),
            "created snapshot"
        );
        snapshot
    }

    fn level_to_quote(
        &self,
        side: Side,
        index: usize,
        level: PriceLevel,
        timestamp_ns: u64,
    ) -> QuoteUpdate {
        let mut quote = QuoteUpdate::new(self.instrument_id);
        quote.timestamp_ns = timestamp_ns;
        quote.side = side;
        quote.price = level.price;
        quote.quantity = level.quantity;
        quote.order_count = level.order_count;
        quote.implied_quantity = level.implied_quantity;
        if self.config.track_market_makers {
            quote.market_maker = level.market_maker_id;
        }
        quote.price_level = level.level_number.or(Some((index + 1) as u8));
        quote
    }

    /// Routes an event into the book: quotes, trades, and book-clears
    /// mutate state; every other event kind is ignored.
    pub fn apply_event(&self, event: &MarketEvent) {
        match event {
            MarketEvent::Quote(quote) => self.apply_quote(quote),
            MarketEvent::Trade(trade) => self.apply_trade(trade),
            MarketEvent::BookClear(clear) => self.apply_clear(clear),
            _ => {}
        }
    }

    fn apply_quote(&self, quote: &QuoteUpdate) {
        let level = PriceLevel {
            price: quote.price,
            quantity: quote.quantity,
            order_count: quote.order_count,
            last_update_time_ns: quote.timestamp_ns,
            implied_quantity: quote.implied_quantity,
            market_maker_id: quote.market_maker.clone(),
            level_number: quote.price_level,
        };

        match quote.action {
            UpdateAction::Add | UpdateAction::Change | UpdateAction::Overlay => {
                self.update_level(quote.side, level);
            }
            UpdateAction::Delete => self.remove_level(quote.side, quote.price),
            UpdateAction::Clear => self.clear_side(quote.side),
        }
    }

    fn apply_trade(&self, trade: &TradeEvent) {
        self.add_trade(Trade {
            price: trade.price,
            quantity: trade.quantity,
            timestamp_ns: trade.timestamp_ns,
            aggressor_side: trade.aggressor_side,
            trade_id: trade.trade_id.clone(),
        });
    }

    fn apply_clear(&self, _clear: &BookClearEvent) {
        trace!(instrument_id = self.instrument_id, "book clear");
        self.clear();
    }
}
