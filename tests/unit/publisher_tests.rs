//! Publisher routing, sequencing, redundancy, and heartbeat behavior,
//! exercised through capture transports.

use crate::common::{CaptureFactory, test_config, test_manager};
use fxcast_rs::market::events::{
    MarketEvent, MarketEventListener, QuoteUpdate, Side, SnapshotEvent, TradeEvent, UpdateAction,
};
use fxcast_rs::publisher::MulticastPublisher;
use fxcast_rs::wire::{DecodedMessage, decode_packet};
use std::sync::Arc;

fn build_publisher() -> (Arc<MulticastPublisher>, CaptureFactory) {
    let manager = test_manager();
    let factory = CaptureFactory::new();
    let publisher = MulticastPublisher::initialize_with(
        test_config(),
        &factory,
        &manager.all_instruments(),
    )
    .expect("capture transports never fail");
    (Arc::new(publisher), factory)
}

fn quote_for(instrument_id: u32) -> QuoteUpdate {
    let mut quote = QuoteUpdate::new(instrument_id);
    quote.side = Side::Bid;
    quote.action = UpdateAction::Add;
    quote.price = 1.0850;
    quote.quantity = 1_000_000;
    quote
}

// --- Scenario S5: channel routing ---

#[test]
fn test_incrementals_route_to_their_channel() {
    let (publisher, factory) = build_publisher();

    // EURUSD is on channel 1.
    publisher.publish_incremental_quote(&quote_for(1001));
    assert_eq!(factory.transport("239.100.2.1:15101").packet_count(), 1);
    assert_eq!(factory.transport("239.100.2.2:15102").packet_count(), 1);
    assert_eq!(factory.transport("239.100.1.1:15001").packet_count(), 0);

    // USDCAD is on channel 2.
    publisher.publish_incremental_quote(&quote_for(1007));
    assert_eq!(factory.transport("239.100.3.1:15201").packet_count(), 1);
    assert_eq!(factory.transport("239.100.3.2:15202").packet_count(), 1);

    // An unmapped instrument falls back to the global feeds.
    publisher.publish_incremental_quote(&quote_for(4242));
    assert_eq!(factory.transport("239.100.1.1:15001").packet_count(), 1);
    assert_eq!(factory.transport("239.100.1.2:15002").packet_count(), 1);
    assert_eq!(factory.transport("239.100.2.1:15101").packet_count(), 1);

    let stats = publisher.stats();
    assert_eq!(stats.messages_sent_a, 3);
    assert_eq!(stats.messages_sent_b, 3);
    assert_eq!(stats.send_errors, 0);
}

#[test]
fn test_disabled_channel_falls_back_to_global() {
    let (publisher, factory) = build_publisher();
    publisher.enable_channel(1, false);
    publisher.publish_incremental_quote(&quote_for(1001));
    assert_eq!(factory.transport("239.100.2.1:15101").packet_count(), 0);
    assert_eq!(factory.transport("239.100.1.1:15001").packet_count(), 1);
}

// --- Scenario S6: sequence monotonicity ---

#[test]
fn test_channel_sequences_are_gap_free() {
    let (publisher, factory) = build_publisher();
    for _ in 0..1000 {
        publisher.publish_incremental_quote(&quote_for(1001));
    }

    let packets = factory.transport("239.100.2.1:15101").packets();
    assert_eq!(packets.len(), 1000);
    for (index, packet) in packets.iter().enumerate() {
        let decoded = decode_packet(packet).expect("valid packet");
        assert_eq!(decoded.header.msg_seq_num.get(), index as u64 + 1);
        assert_eq!(decoded.header.packet_len.get() as usize, packet.len());
    }
}

#[test]
fn test_a_and_b_carry_identical_packets() {
    let (publisher, factory) = build_publisher();
    for _ in 0..10 {
        publisher.publish_incremental_quote(&quote_for(1001));
        publisher.publish_incremental_trade(&{
            let mut trade = TradeEvent::new(1001);
            trade.price = 1.0851;
            trade.quantity = 500;
            trade
        });
    }
    let feed_a = factory.transport("239.100.2.1:15101").packets();
    let feed_b = factory.transport("239.100.2.2:15102").packets();
    assert_eq!(feed_a, feed_b);
}

// --- Snapshots and security definitions ride their own feeds ---

#[test]
fn test_snapshot_goes_to_snapshot_feed_only() {
    let (publisher, factory) = build_publisher();
    let mut snapshot = SnapshotEvent::new(1001);
    for price in [1.0850, 1.0849] {
        let mut quote = quote_for(1001);
        quote.price = price;
        snapshot.bid_levels.push(quote);
    }
    publisher.publish_snapshot(&snapshot);

    let packets = factory.transport("239.100.1.20:15020").packets();
    assert_eq!(packets.len(), 1);
    assert_eq!(factory.transport("239.100.2.1:15101").packet_count(), 0);

    let decoded = decode_packet(&packets[0]).expect("valid packet");
    assert!(matches!(decoded.message, DecodedMessage::FullRefresh(_)));
    assert_eq!(publisher.stats().snapshots_sent, 1);
}

#[test]
fn test_oversized_snapshot_is_split_not_dropped() {
    let (publisher, factory) = build_publisher();
    let mut snapshot = SnapshotEvent::new(1001);
    for i in 0..8000 {
        let mut quote = quote_for(1001);
        quote.price = 1.0 + i as f64 * 0.0001;
        quote.quantity = 100;
        snapshot.bid_levels.push(quote);
    }
    publisher.publish_snapshot(&snapshot);

    let packets = factory.transport("239.100.1.20:15020").packets();
    assert!(packets.len() >= 2, "snapshot must be split across packets");
    assert_eq!(publisher.stats().encode_drops, 0);

    let mut total_entries = 0;
    for packet in &packets {
        assert!(packet.len() <= 65_507);
        let decoded = decode_packet(packet).expect("valid packet");
        let DecodedMessage::FullRefresh(body) = decoded.message else {
            panic!("expected full refresh");
        };
        total_entries += body.entries.len();
    }
    assert_eq!(total_entries, 8000);
}

#[test]
fn test_security_definitions_on_their_feed() {
    let manager = test_manager();
    let factory = CaptureFactory::new();
    let publisher =
        MulticastPublisher::initialize_with(test_config(), &factory, &manager.all_instruments())
            .unwrap();

    for instrument in manager.all_instruments() {
        publisher.publish_security_definition(&instrument);
    }

    let packets = factory.transport("239.100.1.10:15010").packets();
    assert_eq!(packets.len(), 3);
    let decoded = decode_packet(&packets[0]).expect("valid packet");
    assert!(matches!(
        decoded.message,
        DecodedMessage::SecurityDefinition(_)
    ));
    assert_eq!(publisher.stats().definitions_sent, 3);
}

// --- Heartbeats fan out to every enabled channel ---

#[test]
fn test_heartbeat_reaches_all_enabled_feeds() {
    let (publisher, factory) = build_publisher();
    publisher.enable_channel(2, false);
    publisher.send_heartbeat();

    for address in [
        "239.100.1.1:15001",
        "239.100.1.2:15002",
        "239.100.2.1:15101",
        "239.100.2.2:15102",
    ] {
        assert_eq!(factory.transport(address).packet_count(), 1, "{address}");
        let packet = &factory.transport(address).packets()[0];
        let decoded = decode_packet(packet).expect("valid packet");
        assert_eq!(decoded.message, DecodedMessage::Heartbeat);
    }
    // Channel 2 was disabled.
    assert_eq!(factory.transport("239.100.3.1:15201").packet_count(), 0);
    assert_eq!(publisher.stats().heartbeats_sent, 1);
}

// --- End-of-conflation marker ---

#[test]
fn test_end_of_conflation_only_when_configured() {
    let manager = test_manager();

    let factory = CaptureFactory::new();
    let publisher =
        MulticastPublisher::initialize_with(test_config(), &factory, &manager.all_instruments())
            .unwrap();
    publisher.send_end_of_conflation();
    // conflation_interval_ms == 0: nothing goes out.
    assert_eq!(factory.transport("239.100.1.1:15001").packet_count(), 0);

    let mut config = test_config();
    config.conflation_interval_ms = 500;
    let factory = CaptureFactory::new();
    let publisher =
        MulticastPublisher::initialize_with(config, &factory, &manager.all_instruments()).unwrap();
    publisher.send_end_of_conflation();

    let packets = factory.transport("239.100.1.1:15001").packets();
    assert_eq!(packets.len(), 1);
    // Legacy 23-byte header-only marker with the end-of-stream flag.
    assert_eq!(packets[0].len(), 23);
    assert_eq!(packets[0][22], 0x02);
    assert_eq!(factory.transport("239.100.1.2:15002").packet_count(), 1);
}

// --- The publisher as a generator listener ---

#[test]
fn test_listener_routes_event_kinds() {
    let (publisher, factory) = build_publisher();
    let listener: Arc<dyn MarketEventListener> = publisher.clone();

    listener.on_market_event(&MarketEvent::Quote(quote_for(1001)));
    let mut trade = TradeEvent::new(1001);
    trade.price = 1.0850;
    trade.quantity = 100;
    listener.on_market_event(&MarketEvent::Trade(trade));

    let packets = factory.transport("239.100.2.1:15101").packets();
    assert_eq!(packets.len(), 2);
    assert!(matches!(
        decode_packet(&packets[0]).unwrap().message,
        DecodedMessage::Incremental(_)
    ));
    assert!(matches!(
        decode_packet(&packets[1]).unwrap().message,
        DecodedMessage::Trades(_)
    ));
}
