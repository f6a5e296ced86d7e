//! Wire codec: exact byte layouts, round trips, and the size cap.

use fxcast_rs::market::events::{
    QuoteUpdate, Side, SnapshotEvent, StatType, StatisticsEvent, TradeEvent, UpdateAction,
};
use fxcast_rs::market::instrument::{Instrument, InstrumentKind};
use fxcast_rs::wire::frame::{PACKET_HEADER_LEN, PacketHeader};
use fxcast_rs::wire::messages::{aggressor, entry_type, update_action};
use fxcast_rs::wire::{
    DecodedMessage, Encoder, PriceDecimal, WireError, decode_message, decode_packet,
};
use zerocopy::IntoBytes;

fn wrap(sequence: u64, message: &[u8]) -> Vec<u8> {
    let total = PACKET_HEADER_LEN + message.len();
    let header = PacketHeader::new(sequence, 1_700_000_000_000_000_000, total as u16);
    let mut packet = Vec::with_capacity(total);
    packet.extend_from_slice(header.as_bytes());
    packet.extend_from_slice(message);
    packet
}

// --- Scenario S4: incremental refresh layout and round trip ---

#[test]
fn test_incremental_refresh_layout_and_round_trip() {
    let mut quote = QuoteUpdate::new(1001);
    quote.timestamp_ns = 1_700_000_000_000_000_000;
    quote.rpt_seq = Some(42);
    quote.side = Side::Bid;
    quote.action = UpdateAction::Add;
    quote.price = 1.08500;
    quote.quantity = 1_000_000;

    let message = Encoder::new().encode_incremental_quote(&quote).unwrap();
    let packet = wrap(1, &message);

    // 20 (packet) + 8 (message header) + 32 (block) + 4 (group) + 18 (entry)
    assert_eq!(packet.len(), 20 + 8 + 32 + 4 + 18);

    let decoded = decode_packet(&packet).unwrap();
    assert_eq!(decoded.header.msg_seq_num.get(), 1);
    assert_eq!(decoded.header.packet_len.get() as usize, packet.len());
    assert_eq!(decoded.message_header.schema_id.get(), 101);
    assert_eq!(decoded.message_header.version.get(), 1);

    let DecodedMessage::Incremental(body) = decoded.message else {
        panic!("expected incremental refresh");
    };
    assert_eq!(body.security_id, 1001);
    assert_eq!(body.rpt_seq, 42);
    assert_eq!(body.transact_time_ns, 1_700_000_000_000_000_000);
    assert_eq!(body.entries.len(), 1);
    assert_eq!(body.entries[0].update_action, update_action::NEW);
    assert_eq!(body.entries[0].entry_type, entry_type::BID);
    assert_eq!(body.entries[0].price.mantissa(), 1_085_000_000);
    assert_eq!(body.entries[0].size, 1_000_000);
}

#[test]
fn test_trade_round_trip() {
    let mut trade = TradeEvent::new(1002);
    trade.timestamp_ns = 1_700_000_000_000_000_123;
    trade.price = 1.2650;
    trade.quantity = 500_000;
    trade.aggressor_side = Some(Side::Bid);

    let message = Encoder::new().encode_incremental_trade(&trade).unwrap();
    let (_, decoded) = decode_message(&message).unwrap();

    let DecodedMessage::Trades(body) = decoded else {
        panic!("expected trades message");
    };
    assert_eq!(body.security_id, 1002);
    assert_eq!(body.entries.len(), 1);
    let entry = body.entries[0];
    assert_eq!(entry.transact_time_ns, 1_700_000_000_000_000_123);
    assert_eq!(entry.price.to_f64(), Some(1.2650));
    assert_eq!(entry.size, 500_000);
    assert_eq!(entry.aggressor_side, aggressor::BUY);
}

#[test]
fn test_trade_without_aggressor() {
    let mut trade = TradeEvent::new(1);
    trade.price = 100.0;
    trade.quantity = 1;
    let message = Encoder::new().encode_incremental_trade(&trade).unwrap();
    let (_, decoded) = decode_message(&message).unwrap();
    let DecodedMessage::Trades(body) = decoded else {
        panic!("expected trades message");
    };
    assert_eq!(body.entries[0].aggressor_side, aggressor::NONE);
}

#[test]
fn test_full_refresh_round_trip() {
    let mut snapshot = SnapshotEvent::new(1001);
    snapshot.timestamp_ns = 1_700_000_000_000_000_000;
    snapshot.sequence = 9;
    for (i, price) in [1.0850, 1.0849, 1.0848].iter().enumerate() {
        let mut quote = QuoteUpdate::new(1001);
        quote.side = Side::Bid;
        quote.price = *price;
        quote.quantity = (i as u64 + 1) * 100_000;
        snapshot.bid_levels.push(quote);
    }
    for price in [1.0852, 1.0853] {
        let mut quote = QuoteUpdate::new(1001);
        quote.side = Side::Ask;
        quote.price = price;
        quote.quantity = 250_000;
        snapshot.ask_levels.push(quote);
    }

    let message = Encoder::new()
        .encode_full_refresh(&snapshot, 77, InstrumentKind::FxSpot)
        .unwrap();
    // 8 (header) + 42 (block) + 4 (group) + 5 * 17 (entries)
    assert_eq!(message.len(), 8 + 42 + 4 + 5 * 17);

    let (_, decoded) = decode_message(&message).unwrap();
    let DecodedMessage::FullRefresh(body) = decoded else {
        panic!("expected full refresh");
    };
    assert_eq!(body.last_msg_seq_num_processed, 77);
    assert_eq!(body.security_id, 1001);
    assert_eq!(body.rpt_seq, 9);
    assert_eq!(body.market_depth, 3);
    assert_eq!(body.entries.len(), 5);
    assert_eq!(body.entries[0].entry_type, entry_type::BID);
    assert_eq!(body.entries[0].price.to_f64(), Some(1.0850));
    assert_eq!(body.entries[3].entry_type, entry_type::OFFER);
    assert_eq!(body.entries[4].price.mantissa(), 1_085_300_000);
}

#[test]
fn test_security_definition_round_trip() {
    let mut instrument = Instrument::fx_spot(1003, "USDJPY").with_tick_size(0.001);
    instrument.max_price_variation = Some(5.0);

    let message = Encoder::new()
        .encode_security_definition(&instrument, 1_700_000_000_000_000_000)
        .unwrap();
    let (header, decoded) = decode_message(&message).unwrap();
    assert_eq!(header.block_length.get(), 106);

    let DecodedMessage::SecurityDefinition(body) = decoded else {
        panic!("expected security definition");
    };
    assert_eq!(body.security_id, 1003);
    assert_eq!(body.symbol, "USDJPY");
    assert_eq!(body.currency1, "USD");
    assert_eq!(body.currency2, "JPY");
    assert_eq!(body.security_update_action, b'A');
    assert_eq!(body.last_update_time_ns, 1_700_000_000_000_000_000);
    assert_eq!(body.price_decimal_precision, 3);
    assert_eq!(body.tick_size.to_f64(), Some(0.001));
    assert_eq!(body.max_price_variation.to_f64(), Some(5.0));
    assert_eq!(body.md_entry_originator, "FXCAST");
}

#[test]
fn test_security_definition_null_sentinels() {
    // No price banding: the optional field carries its null sentinel.
    let instrument = Instrument::fx_spot(1, "EURUSD");
    let message = Encoder::new()
        .encode_security_definition(&instrument, 0)
        .unwrap();
    let (_, decoded) = decode_message(&message).unwrap();
    let DecodedMessage::SecurityDefinition(body) = decoded else {
        panic!("expected security definition");
    };
    assert!(body.max_price_variation.is_null());
}

#[test]
fn test_statistics_round_trip() {
    let mut stats = StatisticsEvent::new(1001);
    stats.timestamp_ns = 7;
    stats.sequence = 3;
    stats.stat_type = StatType::Vwap;
    stats.value = 1.08533;

    let message = Encoder::new().encode_incremental_statistics(&stats).unwrap();
    let (_, decoded) = decode_message(&message).unwrap();
    let DecodedMessage::Incremental(body) = decoded else {
        panic!("expected incremental refresh");
    };
    assert_eq!(body.entries[0].entry_type, entry_type::VWAP);
    assert_eq!(body.entries[0].price.to_f64(), Some(1.08533));
}

#[test]
fn test_heartbeat_round_trip() {
    let message = Encoder::new().encode_heartbeat().unwrap();
    let (header, decoded) = decode_message(&message).unwrap();
    assert_eq!(header.template_id.get(), 1);
    assert_eq!(header.block_length.get(), 0);
    assert_eq!(decoded, DecodedMessage::Heartbeat);
}

// --- Invariant 8: price mantissa round trip ---

#[test]
fn test_price_mantissa_round_trip() {
    // Any mantissa within f64's exact-integer range survives the float
    // boundary bit-for-bit.
    for mantissa in [
        0i64,
        1,
        -1,
        1_085_000_000,
        149_500_000_000,
        4_503_599_627_370_495,
        -4_503_599_627_370_495,
    ] {
        let decimal = PriceDecimal::from_mantissa(mantissa);
        let price = decimal.to_f64().unwrap();
        assert_eq!(
            PriceDecimal::from_f64(price).unwrap().mantissa(),
            mantissa,
            "mantissa {mantissa} did not survive the float boundary"
        );
    }
}

// --- Boundary 13: the encoder size cap ---

#[test]
fn test_oversized_snapshot_rejected() {
    let mut snapshot = SnapshotEvent::new(1);
    for i in 0..4000 {
        let mut quote = QuoteUpdate::new(1);
        quote.side = Side::Bid;
        quote.price = 1.0 + i as f64 * 0.0001;
        quote.quantity = 100;
        snapshot.bid_levels.push(quote);
    }
    // 4000 entries * 17 bytes ≈ 68 KB, above the 64 KiB default cap.
    let result = Encoder::new().encode_full_refresh(&snapshot, 0, InstrumentKind::FxSpot);
    assert!(matches!(result, Err(WireError::MessageTooLarge { .. })));
}

#[test]
fn test_tight_cap_rejects_small_messages() {
    let encoder = Encoder::new().with_max_message_size(16);
    let mut quote = QuoteUpdate::new(1);
    quote.price = 1.0;
    quote.quantity = 1;
    assert!(matches!(
        encoder.encode_incremental_quote(&quote),
        Err(WireError::MessageTooLarge { size: 62, max: 16 })
    ));
}

// --- Boundary 14: packet_len equals the transmitted byte count ---

#[test]
fn test_packet_len_matches_bytes() {
    let message = Encoder::new().encode_heartbeat().unwrap();
    let packet = wrap(5, &message);
    let decoded = decode_packet(&packet).unwrap();
    assert_eq!(decoded.header.packet_len.get() as usize, packet.len());
    assert_eq!(decoded.header.hdr_len as usize, 20);
    assert_eq!(decoded.header.hdr_ver, 1);
}

#[test]
fn test_truncated_packet_rejected() {
    let message = Encoder::new().encode_heartbeat().unwrap();
    let packet = wrap(5, &message);
    assert_eq!(
        decode_packet(&packet[..packet.len() - 3]),
        Err(WireError::TruncatedHeader)
    );
    assert_eq!(decode_packet(&packet[..10]), Err(WireError::TruncatedHeader));
}
