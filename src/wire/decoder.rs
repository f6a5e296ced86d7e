//! Message and packet decoding.
//!
//! The decoder exists to honor the round-trip contract of the encoder: any
//! packet this crate publishes can be parsed back into its packet header,
//! message header, and a typed body. Unknown templates, truncation, and
//! byte-swapped producers are reported as errors, never panics.

use crate::wire::decimal::PriceDecimal;
use crate::wire::frame::{PACKET_HEADER_LEN, PACKET_HEADER_VERSION, PacketHeader};
use crate::wire::messages::{
    GroupHeader, MdFullRefreshBlock, MdIncrementalBlock, MdIncrementalEntry, MdSnapshotEntry,
    MdTradeEntry, MdTradesBlock, MessageHeader, SCHEMA_ID, SecurityDefinitionBlock, template,
    unpack_str,
};
use crate::wire::WireError;
use zerocopy::FromBytes;

/// A decoded security definition (template 18).
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityDefinitionMsg {
    pub security_update_action: u8,
    pub last_update_time_ns: u64,
    pub md_entry_originator: String,
    pub symbol: String,
    pub security_id: i32,
    pub security_id_source: u32,
    pub security_type: i8,
    pub settlement_date: (u16, u8, u8),
    pub currency1: String,
    pub currency2: String,
    pub price_decimal_precision: u8,
    pub depth_of_book: u8,
    pub min_trade_vol: u64,
    pub incremental_conflation_interval_ms: u32,
    pub snapshot_interval_sec: u32,
    pub tick_size: PriceDecimal,
    pub contract_multiplier: PriceDecimal,
    pub max_price_variation: PriceDecimal,
}

/// One decoded full-refresh entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotEntry {
    pub entry_type: u8,
    pub price: PriceDecimal,
    pub size: i64,
}

/// A decoded full refresh (template 20).
#[derive(Debug, Clone, PartialEq)]
pub struct FullRefreshMsg {
    pub last_msg_seq_num_processed: u64,
    pub security_id: i32,
    pub rpt_seq: u32,
    pub transact_time_ns: u64,
    pub md_entry_originator: String,
    pub market_depth: u8,
    pub security_type: i8,
    pub entries: Vec<SnapshotEntry>,
}

/// One decoded incremental entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncrementalEntry {
    pub update_action: u8,
    pub entry_type: u8,
    pub price: PriceDecimal,
    pub size: i64,
}

/// A decoded incremental refresh (template 21).
#[derive(Debug, Clone, PartialEq)]
pub struct IncrementalMsg {
    pub security_id: i32,
    pub rpt_seq: u32,
    pub transact_time_ns: u64,
    pub md_entry_originator: String,
    pub entries: Vec<IncrementalEntry>,
}

/// One decoded trade entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeEntry {
    pub transact_time_ns: u64,
    pub price: PriceDecimal,
    pub size: i64,
    pub aggressor_side: u8,
}

/// A decoded trade incremental (template 111).
#[derive(Debug, Clone, PartialEq)]
pub struct TradesMsg {
    pub security_id: i32,
    pub entries: Vec<TradeEntry>,
}

/// Typed view of a decoded message body.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    Heartbeat,
    SecurityDefinition(SecurityDefinitionMsg),
    FullRefresh(FullRefreshMsg),
    Incremental(IncrementalMsg),
    Trades(TradesMsg),
}

/// A fully decoded datagram.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPacket {
    pub header: PacketHeader,
    pub message_header: MessageHeader,
    pub message: DecodedMessage,
}

/// Decodes a whole datagram: packet header, message header, typed body.
pub fn decode_packet(buffer: &[u8]) -> Result<DecodedPacket, WireError> {
    let (header, _) =
        PacketHeader::read_from_prefix(buffer).map_err(|_| WireError::TruncatedHeader)?;
    if header.hdr_len as usize != PACKET_HEADER_LEN || header.hdr_ver != PACKET_HEADER_VERSION {
        return Err(WireError::TruncatedHeader);
    }
    let packet_len = header.packet_len.get() as usize;
    if packet_len < PACKET_HEADER_LEN || packet_len > buffer.len() {
        return Err(WireError::TruncatedHeader);
    }

    let (message_header, message) = decode_message(&buffer[PACKET_HEADER_LEN..packet_len])?;
    Ok(DecodedPacket {
        header,
        message_header,
        message,
    })
}

/// Decodes a bare SBE message (no packet header).
pub fn decode_message(buffer: &[u8]) -> Result<(MessageHeader, DecodedMessage), WireError> {
    let (header, body) =
        MessageHeader::read_from_prefix(buffer).map_err(|_| WireError::TruncatedHeader)?;

    let schema_id = header.schema_id.get();
    if schema_id != SCHEMA_ID {
        if schema_id.swap_bytes() == SCHEMA_ID {
            return Err(WireError::BadEndianness);
        }
        return Err(WireError::UnknownTemplate(header.template_id.get()));
    }

    let block_length = header.block_length.get() as usize;
    if body.len() < block_length {
        return Err(WireError::TruncatedHeader);
    }
    let (block, groups) = body.split_at(block_length);

    let message = match header.template_id.get() {
        template::ADMIN_HEARTBEAT => DecodedMessage::Heartbeat,
        template::SECURITY_DEFINITION => {
            DecodedMessage::SecurityDefinition(decode_security_definition(block)?)
        }
        template::MD_FULL_REFRESH => DecodedMessage::FullRefresh(decode_full_refresh(block, groups)?),
        template::MD_INCREMENTAL_REFRESH => {
            DecodedMessage::Incremental(decode_incremental(block, groups)?)
        }
        template::MD_INCREMENTAL_REFRESH_TRADES => {
            DecodedMessage::Trades(decode_trades(block, groups)?)
        }
        other => return Err(WireError::UnknownTemplate(other)),
    };

    Ok((header, message))
}

fn decode_security_definition(block: &[u8]) -> Result<SecurityDefinitionMsg, WireError> {
    let (raw, _) = SecurityDefinitionBlock::read_from_prefix(block)
        .map_err(|_| WireError::TruncatedHeader)?;
    Ok(SecurityDefinitionMsg {
        security_update_action: raw.security_update_action,
        last_update_time_ns: raw.last_update_time_ns.get(),
        md_entry_originator: unpack_str(&raw.md_entry_originator),
        symbol: unpack_str(&raw.symbol),
        security_id: raw.security_id.get(),
        security_id_source: raw.security_id_source.get(),
        security_type: raw.security_type,
        settlement_date: (
            raw.settlement_year.get(),
            raw.settlement_month,
            raw.settlement_day,
        ),
        currency1: unpack_str(&raw.currency1),
        currency2: unpack_str(&raw.currency2),
        price_decimal_precision: raw.price_decimal_precision,
        depth_of_book: raw.depth_of_book,
        min_trade_vol: raw.min_trade_vol.get(),
        incremental_conflation_interval_ms: raw.incremental_conflation_interval_ms.get(),
        snapshot_interval_sec: raw.snapshot_interval_sec.get(),
        tick_size: PriceDecimal::from_mantissa(raw.tick_size_mantissa.get()),
        contract_multiplier: PriceDecimal::from_mantissa(raw.contract_multiplier_mantissa.get()),
        max_price_variation: PriceDecimal::from_mantissa(raw.max_price_variation_mantissa.get()),
    })
}

fn decode_full_refresh(block: &[u8], groups: &[u8]) -> Result<FullRefreshMsg, WireError> {
    let (raw, _) =
        MdFullRefreshBlock::read_from_prefix(block).map_err(|_| WireError::TruncatedHeader)?;
    let entries = decode_group(groups, MdSnapshotEntry::LEN, |bytes| {
        let (entry, _) =
            MdSnapshotEntry::read_from_prefix(bytes).map_err(|_| WireError::TruncatedHeader)?;
        Ok(SnapshotEntry {
            entry_type: entry.md_entry_type,
            price: PriceDecimal::from_mantissa(entry.price_mantissa.get()),
            size: entry.md_entry_size.get(),
        })
    })?;

    Ok(FullRefreshMsg {
        last_msg_seq_num_processed: raw.last_msg_seq_num_processed.get(),
        security_id: raw.security_id.get(),
        rpt_seq: raw.rpt_seq.get(),
        transact_time_ns: raw.transact_time_ns.get(),
        md_entry_originator: unpack_str(&raw.md_entry_originator),
        market_depth: raw.market_depth,
        security_type: raw.security_type,
        entries,
    })
}

fn decode_incremental(block: &[u8], groups: &[u8]) -> Result<IncrementalMsg, WireError> {
    let (raw, _) =
        MdIncrementalBlock::read_from_prefix(block).map_err(|_| WireError::TruncatedHeader)?;
    let entries = decode_group(groups, MdIncrementalEntry::LEN, |bytes| {
        let (entry, _) =
            MdIncrementalEntry::read_from_prefix(bytes).map_err(|_| WireError::TruncatedHeader)?;
        Ok(IncrementalEntry {
            update_action: entry.md_update_action,
            entry_type: entry.md_entry_type,
            price: PriceDecimal::from_mantissa(entry.price_mantissa.get()),
            size: entry.md_entry_size.get(),
        })
    })?;

    Ok(IncrementalMsg {
        security_id: raw.security_id.get(),
        rpt_seq: raw.rpt_seq.get(),
        transact_time_ns: raw.transact_time_ns.get(),
        md_entry_originator: unpack_str(&raw.md_entry_originator),
        entries,
    })
}

fn decode_trades(block: &[u8], groups: &[u8]) -> Result<TradesMsg, WireError> {
    let (raw, _) =
        MdTradesBlock::read_from_prefix(block).map_err(|_| WireError::TruncatedHeader)?;
    let entries = decode_group(groups, MdTradeEntry::LEN, |bytes| {
        let (entry, _) =
            MdTradeEntry::read_from_prefix(bytes).map_err(|_| WireError::TruncatedHeader)?;
        Ok(TradeEntry {
            transact_time_ns: entry.transact_time_ns.get(),
            price: PriceDecimal::from_mantissa(entry.price_mantissa.get()),
            size: entry.md_entry_size.get(),
            aggressor_side: entry.aggressor_side,
        })
    })?;

    Ok(TradesMsg {
        security_id: raw.security_id.get(),
        entries,
    })
}

/// Walks one repeating group. The group header's own `block_length` drives
/// entry strides, so a producer may append fields we do not know about; it
/// must still be at least our known layout.
fn decode_group<T>(
    groups: &[u8],
    min_entry_len: usize,
    mut parse: impl FnMut(&[u8]) -> Result<T, WireError>,
) -> Result<Vec<T>, WireError> {
    let (header, mut rest) =
        GroupHeader::read_from_prefix(groups).map_err(|_| WireError::TruncatedHeader)?;
    let stride = header.block_length.get() as usize;
    let count = header.num_in_group.get() as usize;
    if stride < min_entry_len {
        return Err(WireError::TruncatedHeader);
    }

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        if rest.len() < stride {
            return Err(WireError::TruncatedHeader);
        }
        entries.push(parse(&rest[..stride])?);
        rest = &rest[stride..];
    }
    Ok(entries)
}
