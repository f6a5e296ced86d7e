//! Server driver: wires the generator to the publisher and runs the
//! periodic loop.
//!
//! One main thread ticks the generator at the configured incremental
//! cadence, polls the publisher for heartbeats, broadcasts snapshots and
//! security definitions on the snapshot cadence, and sleeps briefly
//! between iterations. SIGINT/SIGTERM flip the shared `running` flag and
//! the loop drains out through a clean shutdown.

use crate::market::book::BookConfig;
use crate::market::events::MarketEvent;
use crate::market::generator::{MarketDataGenerator, MarketRegime};
use crate::market::instrument::Instrument;
use crate::market::manager::{BookError, BookManager};
use crate::publisher::{ConfigError, MulticastConfig, MulticastPublisher};
use crate::transport::TransportError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// How many instruments get an update on each generator tick.
const INSTRUMENTS_PER_TICK: usize = 2;

/// Cadence of the periodic statistics log line.
const STATS_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Idle sleep between loop iterations.
const LOOP_SLEEP: Duration = Duration::from_millis(1);

/// Fatal initialization failures. Anything that happens after startup is
/// counted, logged, and survived instead.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Book(#[from] BookError),
}

/// The seven-pair FX spot universe the server publishes.
///
/// Ids, ticks, and reference prices follow the venue's production feed
/// layout: majors on channel 1, commodity currencies on channel 2.
fn fx_universe() -> Vec<Instrument> {
    let spot = |id: u32, symbol: &str, tick: f64, price: f64, spread: f64| {
        Instrument::fx_spot(id, symbol)
            .with_tick_size(tick)
            .with_property("initial_price", price)
            .with_property("initial_spread", spread)
    };

    vec![
        spot(1001, "EURUSD", 0.00001, 1.0850, 0.00002),
        spot(1002, "GBPUSD", 0.00001, 1.2650, 0.00003),
        spot(1003, "USDJPY", 0.001, 149.50, 0.002),
        spot(1004, "USDCHF", 0.00001, 0.8950, 0.00002),
        spot(1005, "AUDUSD", 0.00001, 0.6680, 0.00002),
        spot(1006, "NZDUSD", 0.00001, 0.6020, 0.00003),
        spot(1007, "USDCAD", 0.00001, 1.3620, 0.00002),
    ]
}

/// Owns every component and runs the main loop.
pub struct ServerDriver {
    manager: Arc<BookManager>,
    generator: Arc<MarketDataGenerator>,
    publisher: Arc<MulticastPublisher>,
    running: Arc<AtomicBool>,
}

impl ServerDriver {
    /// Builds the full pipeline: instruments, books, generator, publisher,
    /// and the listener wiring.
    pub fn new(config: MulticastConfig) -> Result<Self, ServerError> {
        let manager = Arc::new(BookManager::new());

        info!("creating FX instruments");
        for instrument in fx_universe() {
            manager.add_instrument(instrument)?;
        }

        let book_config = BookConfig {
            max_visible_levels: config.book_depth,
            track_market_makers: true,
            ..BookConfig::default()
        };
        for id in manager.all_instrument_ids() {
            manager.create_order_book(id, book_config.clone())?;
        }
        info!(
            instruments = manager.instrument_count(),
            "instruments and books ready"
        );

        let generator = Arc::new(MarketDataGenerator::new(Arc::clone(&manager)));
        generator.set_regime(MarketRegime::Normal);

        let publisher = Arc::new(MulticastPublisher::initialize(
            config,
            &manager.all_instruments(),
        )?);

        let listener: Arc<dyn crate::market::events::MarketEventListener> = publisher.clone();
        generator.add_listener(&listener);

        Ok(Self {
            manager,
            generator,
            publisher,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// The shutdown flag, for wiring into a signal handler.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn manager(&self) -> &Arc<BookManager> {
        &self.manager
    }

    pub fn generator(&self) -> &Arc<MarketDataGenerator> {
        &self.generator
    }

    pub fn publisher(&self) -> &Arc<MulticastPublisher> {
        &self.publisher
    }

    /// Seeds initial market state and broadcasts the instrument universe.
    fn startup(&self) {
        info!("seeding initial market state");
        self.generator.generate_all_instruments();

        for instrument in self.manager.all_instruments() {
            self.publisher.publish_security_definition(&instrument);
        }
    }

    /// Broadcasts a snapshot, a statistics event, and a security definition
    /// per instrument.
    fn broadcast_snapshots(&self) {
        for id in self.manager.all_instrument_ids() {
            if let Some(snapshot) = self.generator.generate_snapshot(id) {
                self.publisher.publish_snapshot(&snapshot);
            }
            if let Some(statistics) = self.generator.generate_statistics(id) {
                self.generator.emit(MarketEvent::Statistics(statistics));
            }
        }
        for instrument in self.manager.all_instruments() {
            self.publisher.publish_security_definition(&instrument);
        }
    }

    fn log_stats(&self) {
        let generator = self.generator.stats();
        let publisher = self.publisher.stats();
        info!(
            uptime_s = self.generator.uptime_seconds(),
            updates = generator.updates_generated,
            quotes = generator.quotes_generated,
            trades = generator.trades_generated,
            sent_a = publisher.messages_sent_a,
            sent_b = publisher.messages_sent_b,
            snapshots = publisher.snapshots_sent,
            "server statistics"
        );
    }

    /// Runs the main loop until the `running` flag clears, then shuts the
    /// publisher down and prints the final report.
    pub fn run(&self) -> Result<(), ServerError> {
        self.startup();

        let incremental_interval =
            Duration::from_millis(self.publisher.config().incremental_interval_ms);
        let snapshot_interval =
            Duration::from_secs(self.publisher.config().snapshot_interval_seconds);

        let mut last_update = Instant::now();
        let mut last_snapshot = Instant::now();
        let mut last_stats = Instant::now();

        info!("server running");
        while self.running.load(Ordering::Acquire) {
            let now = Instant::now();

            if now.duration_since(last_update) >= incremental_interval {
                self.generator.generate_batch(INSTRUMENTS_PER_TICK);
                last_update = now;
            }

            self.publisher.poll_heartbeat();

            if now.duration_since(last_snapshot) >= snapshot_interval {
                debug!("periodic snapshot broadcast");
                self.broadcast_snapshots();
                last_snapshot = now;
            }

            if now.duration_since(last_stats) >= STATS_LOG_INTERVAL {
                self.log_stats();
                last_stats = now;
            }

            std::thread::sleep(LOOP_SLEEP);
        }

        info!("shutting down");
        self.publisher.shutdown();
        self.print_final_report();
        Ok(())
    }

    /// Uptime and counters, printed to stdout on clean shutdown.
    fn print_final_report(&self) {
        let generator = self.generator.stats();
        let publisher = self.publisher.stats();

        println!("\nFinal statistics:");
        println!("  Uptime: {} seconds", self.publisher.uptime_seconds());
        println!("  Updates generated: {}", generator.updates_generated);
        println!("  Quotes generated: {}", generator.quotes_generated);
        println!("  Trades generated: {}", generator.trades_generated);
        println!("  Snapshots generated: {}", generator.snapshots_generated);
        println!("  Messages sent (A): {}", publisher.messages_sent_a);
        println!("  Messages sent (B): {}", publisher.messages_sent_b);
        println!("  Snapshots sent: {}", publisher.snapshots_sent);
        println!("  Definitions sent: {}", publisher.definitions_sent);
        println!("  Heartbeats sent: {}", publisher.heartbeats_sent);
        println!("  Bytes sent: {}", publisher.bytes_sent);
        println!("  Send errors: {}", publisher.send_errors);
    }

    /// Applies a single externally produced event (test and tooling hook).
    pub fn inject_event(&self, event: MarketEvent) {
        self.generator.emit(event);
    }
}
