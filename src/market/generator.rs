//! Regime-driven stochastic market-data generator.
//!
//! Each tick the generator samples the current book state, synthesizes a
//! quote or trade consistent with it, applies the event to the book through
//! the manager, and only then fans it out to listeners — so a listener
//! observing event N sees book state reflecting events 1..N for that
//! instrument.

use crate::market::events::{
    MarketEvent, MarketEventListener, QuoteUpdate, Side, SnapshotEvent, StatType, StatisticsEvent,
    TradeEvent, UpdateAction,
};
use crate::market::instrument::{Instrument, InstrumentKind};
use crate::market::manager::BookManager;
use crate::utils::current_time_nanos;
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Poisson};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;
use tracing::{debug, trace};
use uuid::Uuid;

/// Named market regimes with preset dynamics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketRegime {
    /// Steady two-sided market.
    Normal,
    /// High update rate, frequent trades.
    Fast,
    /// Large price moves.
    Volatile,
    /// Sparse, shallow market.
    Thin,
    /// Drifting market with an upward bias.
    Trending,
    /// Stressed market: very fast, very volatile, wide spreads.
    Stressed,
}

/// Tunable parameters a regime resolves to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeParams {
    /// Relative per-update price volatility.
    pub volatility: f64,
    /// Intended update rate; the driver owns the actual tick cadence.
    pub updates_per_second: u32,
    /// Probability that an update is a trade rather than a quote.
    pub trade_probability: f64,
    /// Directional drift, in units of volatility.
    pub trend_bias: f64,
    /// Spread-widening characteristic of the regime.
    pub spread_factor: f64,
    /// Target number of levels per side.
    pub book_depth_target: usize,
}

impl MarketRegime {
    /// The preset parameters for this regime.
    pub fn params(self) -> RegimeParams {
        match self {
            MarketRegime::Normal => RegimeParams {
                volatility: 1e-4,
                updates_per_second: 10,
                trade_probability: 0.30,
                trend_bias: 0.0,
                spread_factor: 1.0,
                book_depth_target: 5,
            },
            MarketRegime::Fast => RegimeParams {
                volatility: 2e-4,
                updates_per_second: 50,
                trade_probability: 0.50,
                trend_bias: 0.0,
                spread_factor: 1.0,
                book_depth_target: 5,
            },
            MarketRegime::Volatile => RegimeParams {
                volatility: 1e-3,
                updates_per_second: 20,
                trade_probability: 0.40,
                trend_bias: 0.0,
                spread_factor: 1.0,
                book_depth_target: 5,
            },
            MarketRegime::Thin => RegimeParams {
                volatility: 5e-5,
                updates_per_second: 3,
                trade_probability: 0.10,
                trend_bias: 0.0,
                spread_factor: 1.0,
                book_depth_target: 2,
            },
            MarketRegime::Trending => RegimeParams {
                volatility: 1e-4,
                updates_per_second: 15,
                trade_probability: 0.30,
                trend_bias: 0.3,
                spread_factor: 1.0,
                book_depth_target: 5,
            },
            MarketRegime::Stressed => RegimeParams {
                volatility: 2e-3,
                updates_per_second: 100,
                trade_probability: 0.70,
                trend_bias: 0.0,
                spread_factor: 3.0,
                book_depth_target: 5,
            },
        }
    }
}

/// Point-in-time copy of the generator counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorStats {
    pub updates_generated: u64,
    pub trades_generated: u64,
    pub quotes_generated: u64,
    pub snapshots_generated: u64,
    /// Trade draws abandoned because the book had no two-sided market.
    pub trades_skipped: u64,
}

/// Stochastic event source for all registered instruments.
///
/// All methods take `&self`; interior state is independently locked so the
/// generator can be shared behind an `Arc` with the driver and tests.
pub struct MarketDataGenerator {
    manager: Arc<BookManager>,

    regime: Mutex<MarketRegime>,
    params: Mutex<RegimeParams>,
    rng: Mutex<StdRng>,
    normal: Normal<f64>,
    quantity_dist: Poisson<f64>,

    /// Listeners held weakly; expired entries are pruned during dispatch.
    listeners: Mutex<Vec<Weak<dyn MarketEventListener>>>,

    /// Per-instrument event sequence stamps.
    sequences: DashMap<u32, u32>,

    updates_generated: AtomicU64,
    trades_generated: AtomicU64,
    quotes_generated: AtomicU64,
    snapshots_generated: AtomicU64,
    trades_skipped: AtomicU64,
    start_time: Mutex<Instant>,
}

impl MarketDataGenerator {
    /// Creates a generator seeded from OS entropy.
    pub fn new(manager: Arc<BookManager>) -> Self {
        Self::with_rng(manager, StdRng::from_entropy())
    }

    /// Creates a generator with a fixed seed for reproducible streams.
    pub fn with_seed(manager: Arc<BookManager>, seed: u64) -> Self {
        Self::with_rng(manager, StdRng::seed_from_u64(seed))
    }

    fn with_rng(manager: Arc<BookManager>, rng: StdRng) -> Self {
        Self {
            manager,
            regime: Mutex::new(MarketRegime::Normal),
            params: Mutex::new(MarketRegime::Normal.params()),
            rng: Mutex::new(rng),
            normal: Normal::new(0.0, 1.0).expect("standard normal is well formed"),
            quantity_dist: Poisson::new(3.0).expect("positive poisson mean"),
            listeners: Mutex::new(Vec::new()),
            sequences: DashMap::new(),
            updates_generated: AtomicU64::new(0),
            trades_generated: AtomicU64::new(0),
            quotes_generated: AtomicU64::new(0),
            snapshots_generated: AtomicU64::new(0),
            trades_skipped: AtomicU64::new(0),
            start_time: Mutex::new(Instant::now()),
        }
    }

    /// Switches the active regime, replacing all dynamic parameters.
    pub fn set_regime(&self, regime: MarketRegime) {
        *self.regime.lock().expect("regime lock poisoned") = regime;
        *self.params.lock().expect("params lock poisoned") = regime.params();
        debug!(?regime, "market regime changed");
    }

    pub fn regime(&self) -> MarketRegime {
        *self.regime.lock().expect("regime lock poisoned")
    }

    /// The active regime parameters.
    pub fn params(&self) -> RegimeParams {
        *self.params.lock().expect("params lock poisoned")
    }

    /// Registers a listener. Held weakly: dropping the listener's `Arc`
    /// deregisters it on the next dispatch.
    pub fn add_listener(&self, listener: &Arc<dyn MarketEventListener>) {
        self.listeners
            .lock()
            .expect("listeners lock poisoned")
            .push(Arc::downgrade(listener));
    }

    /// Explicitly removes a listener (expired entries go too).
    pub fn remove_listener(&self, listener: &Arc<dyn MarketEventListener>) {
        let target = Arc::downgrade(listener);
        self.listeners
            .lock()
            .expect("listeners lock poisoned")
            .retain(|weak| weak.upgrade().is_some() && !Weak::ptr_eq(weak, &target));
    }

    pub fn clear_listeners(&self) {
        self.listeners
            .lock()
            .expect("listeners lock poisoned")
            .clear();
    }

    /// Synthesizes one update for `instrument_id`: a trade with the regime's
    /// trade probability when a two-sided market exists, otherwise a quote.
    pub fn generate_update(&self, instrument_id: u32) {
        let (instrument, book) = self.manager.get_instrument_and_book(instrument_id);
        let (Some(instrument), Some(_)) = (instrument, book) else {
            return;
        };

        let params = self.params();
        let wants_trade = self.rng.lock().expect("rng lock poisoned").gen::<f64>()
            < params.trade_probability;

        if wants_trade {
            match self.generate_trade(&instrument) {
                Some(trade) => {
                    self.emit(MarketEvent::Trade(trade));
                    self.trades_generated.fetch_add(1, Ordering::Relaxed);
                }
                None => {
                    self.trades_skipped.fetch_add(1, Ordering::Relaxed);
                }
            }
        } else if let Some(quote) = self.generate_quote(&instrument, &params) {
            self.emit(MarketEvent::Quote(quote));
            self.quotes_generated.fetch_add(1, Ordering::Relaxed);
        }

        self.updates_generated.fetch_add(1, Ordering::Relaxed);
    }

    /// Generates `count` updates, each against a randomly drawn instrument.
    pub fn generate_batch(&self, count: usize) {
        let ids = self.manager.all_instrument_ids();
        if ids.is_empty() {
            return;
        }
        for _ in 0..count {
            let index = self
                .rng
                .lock()
                .expect("rng lock poisoned")
                .gen_range(0..ids.len());
            self.generate_update(ids[index]);
        }
    }

    /// Generates one update per registered instrument, e.g. to seed books.
    pub fn generate_all_instruments(&self) {
        for id in self.manager.all_instrument_ids() {
            self.generate_update(id);
        }
    }

    fn generate_quote(&self, instrument: &Instrument, params: &RegimeParams) -> Option<QuoteUpdate> {
        let instrument_id = instrument.instrument_id;
        let book = self.manager.get_order_book(instrument_id)?;

        let mut quote = QuoteUpdate::new(instrument_id);
        quote.timestamp_ns = current_time_nanos();
        quote.sequence = self.next_sequence(instrument_id);

        let best_bid = book.best_bid();
        let best_ask = book.best_ask();

        let (side_draw, action_draw, noise) = {
            let mut rng = self.rng.lock().expect("rng lock poisoned");
            (
                rng.gen::<f64>(),
                rng.gen::<f64>(),
                self.normal.sample(&mut *rng),
            )
        };

        quote.side = if side_draw < 0.5 { Side::Bid } else { Side::Ask };
        quote.action = if action_draw < 0.6 {
            UpdateAction::Add
        } else if action_draw < 0.8 {
            UpdateAction::Change
        } else {
            UpdateAction::Delete
        };

        let reference_price = book
            .mid_price()
            .or_else(|| instrument.property_f64("initial_price"))
            .unwrap_or(100.0);

        let movement = params.trend_bias * params.volatility * reference_price
            + noise * params.volatility * reference_price;
        quote.price = round_to_tick(reference_price + movement, instrument.tick_size);

        // New quotes keep at least one tick away from the touch so
        // additions do not cross by construction.
        if quote.action == UpdateAction::Add {
            match quote.side {
                Side::Bid => {
                    if let Some(bid) = best_bid {
                        quote.price = quote.price.min(bid - instrument.tick_size);
                    }
                }
                Side::Ask => {
                    if let Some(ask) = best_ask {
                        quote.price = quote.price.max(ask + instrument.tick_size);
                    }
                }
                Side::None => {}
            }
        }

        quote.quantity = self.calculate_quantity(instrument);
        quote.order_count = (quote.quantity / 1000).max(1) as u32;
        let depth = match quote.side {
            Side::Bid => book.bid_depth(),
            _ => book.ask_depth(),
        };
        quote.price_level = Some((depth + 1).min(u8::MAX as usize) as u8);

        trace!(
            instrument_id,
            side = %quote.side,
            ?quote.action,
            price = quote.price,
            quantity = quote.quantity,
            "generated quote"
        );
        Some(quote)
    }

    fn generate_trade(&self, instrument: &Instrument) -> Option<TradeEvent> {
        let instrument_id = instrument.instrument_id;
        let book = self.manager.get_order_book(instrument_id)?;

        let best_bid = book.best_bid()?;
        let best_ask = book.best_ask()?;

        let mut trade = TradeEvent::new(instrument_id);
        trade.timestamp_ns = current_time_nanos();
        trade.sequence = self.next_sequence(instrument_id);

        let aggressor = if self.rng.lock().expect("rng lock poisoned").gen::<f64>() < 0.5 {
            Side::Bid
        } else {
            Side::Ask
        };
        trade.aggressor_side = Some(aggressor);
        // Aggressing bid lifts the offer; aggressing ask hits the bid.
        trade.price = if aggressor == Side::Bid {
            best_ask
        } else {
            best_bid
        };
        trade.quantity = self.calculate_quantity(instrument) / 2;
        trade.trade_id = Some(Uuid::new_v4().to_string());

        trace!(
            instrument_id,
            price = trade.price,
            quantity = trade.quantity,
            aggressor = %aggressor,
            "generated trade"
        );
        Some(trade)
    }

    /// Synthesizes a statistics event from the book's session stats,
    /// choosing one of the seven statistic kinds at random.
    pub fn generate_statistics(&self, instrument_id: u32) -> Option<StatisticsEvent> {
        let book = self.manager.get_order_book(instrument_id)?;
        let book_stats = book.stats();

        let mut event = StatisticsEvent::new(instrument_id);
        event.timestamp_ns = current_time_nanos();
        event.sequence = self.next_sequence(instrument_id);

        let choice = self
            .rng
            .lock()
            .expect("rng lock poisoned")
            .gen_range(0..7u8);
        match choice {
            0 => {
                event.stat_type = StatType::Open;
                event.value = book_stats.open_price;
            }
            1 => {
                event.stat_type = StatType::High;
                event.value = book_stats.high_price;
            }
            2 => {
                event.stat_type = StatType::Low;
                event.value = book_stats.low_price;
            }
            3 => {
                event.stat_type = StatType::Close;
                event.value = book_stats.last_price;
            }
            4 => {
                event.stat_type = StatType::Settlement;
                event.value = book_stats.settlement_price;
            }
            5 => {
                event.stat_type = StatType::Vwap;
                event.value = book_stats.vwap;
            }
            _ => {
                event.stat_type = StatType::TradeVolume;
                event.value = book_stats.total_volume as f64;
                event.volume = Some(book_stats.total_volume);
            }
        }
        Some(event)
    }

    /// Builds a snapshot for `instrument_id` at the regime's target depth
    /// and stamps it with the next sequence number.
    pub fn generate_snapshot(&self, instrument_id: u32) -> Option<SnapshotEvent> {
        let depth = self.params().book_depth_target;
        let mut snapshot = self.manager.create_snapshot(instrument_id, depth)?;
        snapshot.sequence = self.next_sequence(instrument_id);
        self.snapshots_generated.fetch_add(1, Ordering::Relaxed);
        Some(snapshot)
    }

    /// Applies the event to the books, then dispatches it to listeners.
    /// Expired listeners are dropped in the same pass.
    pub fn emit(&self, event: MarketEvent) {
        self.manager.apply_event(&event);

        let mut listeners = self.listeners.lock().expect("listeners lock poisoned");
        listeners.retain(|weak| match weak.upgrade() {
            Some(listener) => {
                listener.on_market_event(&event);
                true
            }
            None => false,
        });
    }

    fn calculate_quantity(&self, instrument: &Instrument) -> u64 {
        let draw = {
            let mut rng = self.rng.lock().expect("rng lock poisoned");
            self.quantity_dist.sample(&mut *rng)
        };
        let mut quantity = (draw as u64) * 100;
        if instrument.kind() == InstrumentKind::FxSpot {
            quantity *= 10_000;
        }
        quantity.max(100)
    }

    fn next_sequence(&self, instrument_id: u32) -> u32 {
        let mut entry = self.sequences.entry(instrument_id).or_insert(0);
        *entry += 1;
        *entry
    }

    /// A copy of the counters.
    pub fn stats(&self) -> GeneratorStats {
        GeneratorStats {
            updates_generated: self.updates_generated.load(Ordering::Relaxed),
            trades_generated: self.trades_generated.load(Ordering::Relaxed),
            quotes_generated: self.quotes_generated.load(Ordering::Relaxed),
            snapshots_generated: self.snapshots_generated.load(Ordering::Relaxed),
            trades_skipped: self.trades_skipped.load(Ordering::Relaxed),
        }
    }

    /// Seconds since construction or the last [`reset_statistics`](Self::reset_statistics).
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time
            .lock()
            .expect("start time lock poisoned")
            .elapsed()
            .as_secs()
    }

    /// Zeroes all counters and sequence stamps.
    pub fn reset_statistics(&self) {
        self.updates_generated.store(0, Ordering::Relaxed);
        self.trades_generated.store(0, Ordering::Relaxed);
        self.quotes_generated.store(0, Ordering::Relaxed);
        self.snapshots_generated.store(0, Ordering::Relaxed);
        self.trades_skipped.store(0, Ordering::Relaxed);
        self.sequences.clear();
        *self.start_time.lock().expect("start time lock poisoned") = Instant::now();
    }
}

/// Snaps a price to the nearest multiple of `tick_size`.
fn round_to_tick(price: f64, tick_size: f64) -> f64 {
    if tick_size <= 0.0 {
        return price;
    }
    (price / tick_size).round() * tick_size
}
