//! Event-to-message encoding.
//!
//! The encoder turns typed market events into complete SBE messages
//! (message header + fixed block + groups). It never frames packets: the
//! publisher owns sequencing and prepends the packet header.

use crate::market::events::{
    QuoteUpdate, Side, SnapshotEvent, StatisticsEvent, TradeEvent,
};
use crate::market::instrument::{Instrument, InstrumentKind};
use crate::wire::decimal::PriceDecimal;
use crate::wire::frame::PACKET_HEADER_LEN;
use crate::wire::messages::{
    self, GroupHeader, MdFullRefreshBlock, MdIncrementalBlock, MdIncrementalEntry, MdSnapshotEntry,
    MdTradeEntry, MdTradesBlock, MessageHeader, SecurityDefinitionBlock, aggressor, pack_str,
    template,
};
use crate::wire::WireError;
use zerocopy::IntoBytes;
use zerocopy::little_endian::{I32, I64, U16, U32, U64};

/// Largest UDP payload a single datagram can carry.
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// Default encoder size cap: 64 KiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// FIX security-id source "exchange symbol".
const SECURITY_ID_SOURCE_EXCHANGE: u32 = 8;

/// Stateless message encoder with a configurable size cap.
#[derive(Debug, Clone)]
pub struct Encoder {
    max_message_size: usize,
    originator: [u8; 16],
}

impl Default for Encoder {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            originator: pack_str("FXCAST"),
        }
    }
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the encoded-message size cap, builder style.
    #[must_use = "builders do nothing unless consumed"]
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Sets the 16-byte `md_entry_originator` field, builder style.
    #[must_use = "builders do nothing unless consumed"]
    pub fn with_originator(mut self, originator: &str) -> Self {
        self.originator = pack_str(originator);
        self
    }

    /// The effective cap: the configured limit, but never more than what a
    /// packet-wrapped datagram can carry.
    fn size_cap(&self) -> usize {
        self.max_message_size
            .min(MAX_UDP_PAYLOAD - PACKET_HEADER_LEN)
    }

    fn finish(&self, buffer: Vec<u8>) -> Result<Vec<u8>, WireError> {
        let cap = self.size_cap();
        if buffer.len() > cap {
            return Err(WireError::MessageTooLarge {
                size: buffer.len(),
                max: cap,
            });
        }
        Ok(buffer)
    }

    /// Template 1: header-only admin heartbeat.
    pub fn encode_heartbeat(&self) -> Result<Vec<u8>, WireError> {
        let header = MessageHeader::new(0, template::ADMIN_HEARTBEAT);
        self.finish(header.as_bytes().to_vec())
    }

    /// Template 18: full reference data for one instrument.
    pub fn encode_security_definition(
        &self,
        instrument: &Instrument,
        timestamp_ns: u64,
    ) -> Result<Vec<u8>, WireError> {
        let (currency1, currency2) = instrument.currency_pair();
        let tick_size = PriceDecimal::from_f64(instrument.tick_size)?;
        let multiplier = PriceDecimal::from_f64(instrument.multiplier)?;
        let max_variation = match instrument.max_price_variation {
            Some(value) => PriceDecimal::from_f64(value)?,
            None => PriceDecimal::NULL,
        };
        // Spot instruments settle T+2 from the reference date carried in
        // properties, when present; otherwise the date fields stay zero.
        let (year, month, day) = settlement_date(instrument);

        let block = SecurityDefinitionBlock {
            security_update_action: b'A',
            last_update_time_ns: U64::new(timestamp_ns),
            md_entry_originator: self.originator,
            symbol: pack_str(&instrument.symbol),
            security_id: I32::new(instrument.instrument_id as i32),
            security_id_source: U32::new(SECURITY_ID_SOURCE_EXCHANGE),
            security_type: messages::security_type_code(instrument.kind()),
            settlement_year: U16::new(year),
            settlement_month: month,
            settlement_day: day,
            currency1: pack_str(&currency1),
            currency2: pack_str(&currency2),
            price_decimal_precision: decimal_precision(instrument.tick_size),
            qty_decimal_precision: 0,
            depth_of_book: instrument
                .property_f64("depth_of_book")
                .map(|d| d as u8)
                .unwrap_or(10),
            min_trade_vol: U64::new(
                instrument
                    .property_f64("min_trade_vol")
                    .map(|v| v as u64)
                    .unwrap_or(1),
            ),
            incremental_conflation_interval_ms: U32::new(
                instrument
                    .property_f64("conflation_interval_ms")
                    .map(|v| v as u32)
                    .unwrap_or(0),
            ),
            snapshot_interval_sec: U32::new(
                instrument
                    .property_f64("snapshot_interval_seconds")
                    .map(|v| v as u32)
                    .unwrap_or(60),
            ),
            tick_size_mantissa: I64::new(tick_size.mantissa()),
            contract_multiplier_mantissa: I64::new(multiplier.mantissa()),
            max_price_variation_mantissa: I64::new(max_variation.mantissa()),
            settlement_price_precision: decimal_precision(instrument.tick_size),
            reserved: [0; 2],
        };

        let mut buffer = Vec::with_capacity(MessageHeader::LEN + SecurityDefinitionBlock::LEN);
        buffer.extend_from_slice(
            MessageHeader::new(
                SecurityDefinitionBlock::LEN as u16,
                template::SECURITY_DEFINITION,
            )
            .as_bytes(),
        );
        buffer.extend_from_slice(block.as_bytes());
        self.finish(buffer)
    }

    /// Template 20: complete book state for one instrument.
    ///
    /// `last_msg_seq_num_processed` is the newest incremental packet
    /// sequence the snapshot reflects.
    pub fn encode_full_refresh(
        &self,
        snapshot: &SnapshotEvent,
        last_msg_seq_num_processed: u64,
        security_type: InstrumentKind,
    ) -> Result<Vec<u8>, WireError> {
        let entries = snapshot.bid_levels.len() + snapshot.ask_levels.len();
        let block = MdFullRefreshBlock {
            last_msg_seq_num_processed: U64::new(last_msg_seq_num_processed),
            security_id: I32::new(snapshot.instrument_id as i32),
            rpt_seq: U32::new(snapshot.rpt_seq.unwrap_or(snapshot.sequence)),
            transact_time_ns: U64::new(snapshot.timestamp_ns),
            md_entry_originator: self.originator,
            market_depth: snapshot.bid_levels.len().max(snapshot.ask_levels.len()) as u8,
            security_type: messages::security_type_code(security_type),
        };

        let mut buffer = Vec::with_capacity(
            MessageHeader::LEN
                + MdFullRefreshBlock::LEN
                + GroupHeader::LEN
                + entries * MdSnapshotEntry::LEN,
        );
        buffer.extend_from_slice(
            MessageHeader::new(MdFullRefreshBlock::LEN as u16, template::MD_FULL_REFRESH)
                .as_bytes(),
        );
        buffer.extend_from_slice(block.as_bytes());
        buffer.extend_from_slice(
            GroupHeader::new(MdSnapshotEntry::LEN as u16, entries as u16).as_bytes(),
        );

        for quote in snapshot.bid_levels.iter().chain(&snapshot.ask_levels) {
            let entry = MdSnapshotEntry {
                md_entry_type: messages::side_entry_type(quote.side),
                price_mantissa: I64::new(PriceDecimal::from_f64(quote.price)?.mantissa()),
                md_entry_size: I64::new(quote.quantity as i64),
            };
            buffer.extend_from_slice(entry.as_bytes());
        }

        self.finish(buffer)
    }

    /// Template 21: one price-level delta.
    pub fn encode_incremental_quote(&self, quote: &QuoteUpdate) -> Result<Vec<u8>, WireError> {
        let entry = MdIncrementalEntry {
            md_update_action: messages::action_code(quote.action),
            md_entry_type: messages::side_entry_type(quote.side),
            price_mantissa: I64::new(PriceDecimal::from_f64(quote.price)?.mantissa()),
            md_entry_size: I64::new(quote.quantity as i64),
        };
        self.encode_incremental(
            quote.instrument_id,
            quote.rpt_seq.unwrap_or(quote.sequence),
            quote.timestamp_ns,
            entry,
        )
    }

    /// Template 21 with a statistic entry: session statistics ride the
    /// incremental stream with their own entry-type codes.
    pub fn encode_incremental_statistics(
        &self,
        stats: &StatisticsEvent,
    ) -> Result<Vec<u8>, WireError> {
        let entry = MdIncrementalEntry {
            md_update_action: messages::update_action::NEW,
            md_entry_type: messages::stat_entry_type(stats.stat_type),
            price_mantissa: I64::new(PriceDecimal::from_f64(stats.value)?.mantissa()),
            md_entry_size: I64::new(stats.volume.unwrap_or(0) as i64),
        };
        self.encode_incremental(stats.instrument_id, stats.sequence, stats.timestamp_ns, entry)
    }

    fn encode_incremental(
        &self,
        instrument_id: u32,
        rpt_seq: u32,
        transact_time_ns: u64,
        entry: MdIncrementalEntry,
    ) -> Result<Vec<u8>, WireError> {
        let block = MdIncrementalBlock {
            security_id: I32::new(instrument_id as i32),
            rpt_seq: U32::new(rpt_seq),
            transact_time_ns: U64::new(transact_time_ns),
            md_entry_originator: self.originator,
        };

        let mut buffer = Vec::with_capacity(
            MessageHeader::LEN + MdIncrementalBlock::LEN + GroupHeader::LEN + MdIncrementalEntry::LEN,
        );
        buffer.extend_from_slice(
            MessageHeader::new(
                MdIncrementalBlock::LEN as u16,
                template::MD_INCREMENTAL_REFRESH,
            )
            .as_bytes(),
        );
        buffer.extend_from_slice(block.as_bytes());
        buffer.extend_from_slice(GroupHeader::new(MdIncrementalEntry::LEN as u16, 1).as_bytes());
        buffer.extend_from_slice(entry.as_bytes());
        self.finish(buffer)
    }

    /// Template 111: one trade print.
    pub fn encode_incremental_trade(&self, trade: &TradeEvent) -> Result<Vec<u8>, WireError> {
        let block = MdTradesBlock {
            security_id: I32::new(trade.instrument_id as i32),
        };
        let entry = MdTradeEntry {
            transact_time_ns: U64::new(trade.timestamp_ns),
            price_mantissa: I64::new(PriceDecimal::from_f64(trade.price)?.mantissa()),
            md_entry_size: I64::new(trade.quantity as i64),
            aggressor_side: match trade.aggressor_side {
                Some(Side::Bid) => aggressor::BUY,
                Some(Side::Ask) => aggressor::SELL,
                Some(Side::None) | None => aggressor::NONE,
            },
        };

        let mut buffer = Vec::with_capacity(
            MessageHeader::LEN + MdTradesBlock::LEN + GroupHeader::LEN + MdTradeEntry::LEN,
        );
        buffer.extend_from_slice(
            MessageHeader::new(
                MdTradesBlock::LEN as u16,
                template::MD_INCREMENTAL_REFRESH_TRADES,
            )
            .as_bytes(),
        );
        buffer.extend_from_slice(block.as_bytes());
        buffer.extend_from_slice(GroupHeader::new(MdTradeEntry::LEN as u16, 1).as_bytes());
        buffer.extend_from_slice(entry.as_bytes());
        self.finish(buffer)
    }
}

/// Number of decimal digits in a tick size, e.g. 0.00001 → 5. Capped at
/// the wire decimal's own precision.
fn decimal_precision(tick_size: f64) -> u8 {
    if tick_size <= 0.0 {
        return 0;
    }
    let mut precision = 0u8;
    let mut scaled = tick_size;
    while precision < 9 && (scaled - scaled.round()).abs() > 1e-9 {
        scaled *= 10.0;
        precision += 1;
    }
    precision
}

/// Settlement date from the instrument's `settlement_date` property
/// (`YYYY-MM-DD`), or zeros when absent or malformed.
fn settlement_date(instrument: &Instrument) -> (u16, u8, u8) {
    let Some(date) = instrument
        .property("settlement_date")
        .and_then(|p| p.as_str())
    else {
        return (0, 0, 0);
    };
    let mut parts = date.splitn(3, '-');
    let year = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let month = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let day = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    (year, month, day)
}
