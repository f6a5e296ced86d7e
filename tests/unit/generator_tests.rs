//! Generator behavior against live books: coherence of the generated
//! stream, listener ordering, and the end-to-end pipe into the publisher.

use crate::common::{CaptureFactory, test_config, test_manager};
use fxcast_rs::market::events::{MarketEvent, MarketEventListener};
use fxcast_rs::market::generator::{MarketDataGenerator, MarketRegime};
use fxcast_rs::publisher::MulticastPublisher;
use std::sync::{Arc, Mutex};

/// Listener that records every event it sees plus the book depth at
/// delivery time, to observe apply-before-dispatch ordering.
struct RecordingListener {
    events: Mutex<Vec<MarketEvent>>,
}

impl RecordingListener {
    fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }
}

impl MarketEventListener for RecordingListener {
    fn on_market_event(&self, event: &MarketEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[test]
fn test_generated_stream_is_coherent() {
    let manager = test_manager();
    let generator = MarketDataGenerator::with_seed(Arc::clone(&manager), 1234);
    generator.set_regime(MarketRegime::Fast);

    for _ in 0..500 {
        generator.generate_update(1001);
    }

    let book = manager.get_order_book(1001).unwrap();
    // Quantities stay positive and prices unique per side.
    for level in book.get_bids(usize::MAX).iter().chain(&book.get_asks(usize::MAX)) {
        assert!(level.quantity > 0);
        assert!(level.price > 0.0);
    }
    // FX quantities come in 100-multiples scaled for spot size.
    let stats = book.stats();
    if stats.trade_count > 0 {
        assert!(stats.high_price >= stats.low_price);
        assert!(stats.total_volume > 0);
    }

    let counters = generator.stats();
    assert_eq!(counters.updates_generated, 500);
    assert_eq!(
        counters.quotes_generated + counters.trades_generated + counters.trades_skipped,
        500
    );
}

#[test]
fn test_trades_print_inside_or_at_the_touch() {
    let manager = test_manager();
    let generator = MarketDataGenerator::with_seed(Arc::clone(&manager), 77);

    // Build a market first, then force trades.
    for _ in 0..300 {
        generator.generate_update(1001);
    }
    let book = manager.get_order_book(1001).unwrap();
    let trades = book.recent_trades(usize::MAX);
    for trade in &trades {
        // Each trade printed at the then-best bid or ask, so it must carry
        // an aggressor and a positive quantity.
        assert!(trade.aggressor_side.is_some());
        assert!(trade.quantity > 0);
        assert!(trade.trade_id.is_some());
    }
}

#[test]
fn test_listeners_observe_post_event_state() {
    let manager = test_manager();
    let generator = MarketDataGenerator::with_seed(Arc::clone(&manager), 5);

    let recorder = Arc::new(RecordingListener::new());
    let listener: Arc<dyn MarketEventListener> = recorder.clone();
    generator.add_listener(&listener);

    generator.generate_update(1001);
    let events = recorder.events.lock().unwrap();
    assert_eq!(events.len(), 1);

    // The event was already applied when dispatched: a quote add must be
    // visible in the book.
    if let MarketEvent::Quote(quote) = &events[0] {
        let book = manager.get_order_book(1001).unwrap();
        let on_book = book
            .get_bids(usize::MAX)
            .iter()
            .chain(&book.get_asks(usize::MAX))
            .any(|level| (level.price - quote.price).abs() < 1e-9);
        if quote.quantity > 0 {
            assert!(on_book, "listener saw a quote the book does not reflect");
        }
    }
}

#[test]
fn test_dropped_listener_is_pruned() {
    let manager = test_manager();
    let generator = MarketDataGenerator::with_seed(Arc::clone(&manager), 9);

    let recorder = Arc::new(RecordingListener::new());
    let listener: Arc<dyn MarketEventListener> = recorder.clone();
    generator.add_listener(&listener);

    generator.generate_update(1001);
    assert_eq!(recorder.events.lock().unwrap().len(), 1);

    drop(listener);
    drop(recorder);
    // The weak reference expired; dispatch prunes it without panicking.
    generator.generate_update(1001);
    generator.generate_update(1001);
}

#[test]
fn test_snapshot_honors_regime_depth() {
    let manager = test_manager();
    let generator = MarketDataGenerator::with_seed(Arc::clone(&manager), 21);
    generator.set_regime(MarketRegime::Thin);

    for _ in 0..200 {
        generator.generate_update(1001);
    }
    let snapshot = generator.generate_snapshot(1001).unwrap();
    // Thin regime targets two levels per side.
    assert!(snapshot.bid_levels.len() <= 2);
    assert!(snapshot.ask_levels.len() <= 2);
    assert_eq!(generator.stats().snapshots_generated, 1);
}

#[test]
fn test_end_to_end_generator_to_feed() {
    let manager = test_manager();
    let generator = MarketDataGenerator::with_seed(Arc::clone(&manager), 4242);
    let factory = CaptureFactory::new();
    let publisher = Arc::new(
        MulticastPublisher::initialize_with(test_config(), &factory, &manager.all_instruments())
            .unwrap(),
    );
    let listener: Arc<dyn MarketEventListener> = publisher.clone();
    generator.add_listener(&listener);

    generator.generate_batch(200);

    let stats = publisher.stats();
    let emitted = generator.stats().quotes_generated + generator.stats().trades_generated;
    assert_eq!(stats.messages_sent_a, emitted);
    assert_eq!(stats.messages_sent_b, emitted);
    assert_eq!(stats.send_errors, 0);
    assert_eq!(stats.encode_drops, 0);
}
