//! SBE-style message layouts.
//!
//! Every message is an 8-byte [`MessageHeader`] followed by a fixed block
//! of `block_length` bytes, then zero or more repeating groups. A group is
//! a 4-byte [`GroupHeader`] followed by `num_in_group` fixed-size entries.
//! All layouts here are plain little-endian wire structs; the encoder and
//! decoder own all construction and interpretation.

use crate::market::events::{Side, StatType, UpdateAction};
use crate::market::instrument::InstrumentKind;
use zerocopy::little_endian::{I32, I64, U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Schema id carried by every message header.
pub const SCHEMA_ID: u16 = 101;

/// Schema version carried by every message header.
pub const SCHEMA_VERSION: u16 = 1;

/// Template ids used by this feed.
pub mod template {
    pub const ADMIN_HEARTBEAT: u16 = 1;
    pub const SECURITY_DEFINITION: u16 = 18;
    pub const MD_FULL_REFRESH: u16 = 20;
    pub const MD_INCREMENTAL_REFRESH: u16 = 21;
    pub const MD_INCREMENTAL_REFRESH_TRADES: u16 = 111;
}

/// Wire codes for `md_update_action`.
pub mod update_action {
    pub const NEW: u8 = 0;
    pub const CHANGE: u8 = 1;
    pub const DELETE: u8 = 2;
    pub const OVERLAY: u8 = 3;
    pub const CLEAR: u8 = 4;
}

/// Wire codes for `md_entry_type`.
pub mod entry_type {
    pub const BID: u8 = b'0';
    pub const OFFER: u8 = b'1';
    pub const TRADE: u8 = b'2';
    pub const OPENING_PRICE: u8 = b'4';
    pub const CLOSING_PRICE: u8 = b'5';
    pub const SETTLEMENT_PRICE: u8 = b'6';
    pub const HIGH_PRICE: u8 = b'7';
    pub const LOW_PRICE: u8 = b'8';
    pub const VWAP: u8 = b'9';
    pub const TRADE_VOLUME: u8 = b'B';
}

/// Wire codes for `aggressor_side`.
pub mod aggressor {
    pub const NONE: u8 = 0;
    pub const BUY: u8 = 1;
    pub const SELL: u8 = 2;
}

/// Maps a book side onto its entry-type code. A sideless quote degrades to
/// the bid code.
pub fn side_entry_type(side: Side) -> u8 {
    match side {
        Side::Ask => entry_type::OFFER,
        Side::Bid | Side::None => entry_type::BID,
    }
}

/// Maps an update action onto its wire code.
pub fn action_code(action: UpdateAction) -> u8 {
    match action {
        UpdateAction::Add => update_action::NEW,
        UpdateAction::Change => update_action::CHANGE,
        UpdateAction::Delete => update_action::DELETE,
        UpdateAction::Overlay => update_action::OVERLAY,
        UpdateAction::Clear => update_action::CLEAR,
    }
}

/// Maps a statistic kind onto its entry-type code.
pub fn stat_entry_type(stat: StatType) -> u8 {
    match stat {
        StatType::Open => entry_type::OPENING_PRICE,
        StatType::High => entry_type::HIGH_PRICE,
        StatType::Low => entry_type::LOW_PRICE,
        StatType::Close => entry_type::CLOSING_PRICE,
        StatType::Settlement => entry_type::SETTLEMENT_PRICE,
        StatType::Vwap => entry_type::VWAP,
        StatType::TradeVolume => entry_type::TRADE_VOLUME,
    }
}

/// Wire code for an instrument kind in `security_type`.
pub fn security_type_code(kind: InstrumentKind) -> i8 {
    match kind {
        InstrumentKind::Unknown => 0,
        InstrumentKind::Future => 1,
        InstrumentKind::Option => 2,
        InstrumentKind::FxSpot => 3,
        InstrumentKind::FxForward => 4,
        InstrumentKind::Equity => 5,
        InstrumentKind::Spread => 6,
    }
}

/// The 8-byte message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct MessageHeader {
    /// Size of the fixed block that follows this header.
    pub block_length: U16,
    pub template_id: U16,
    /// Always [`SCHEMA_ID`].
    pub schema_id: U16,
    /// Always [`SCHEMA_VERSION`].
    pub version: U16,
}

impl MessageHeader {
    pub const LEN: usize = 8;

    pub fn new(block_length: u16, template_id: u16) -> Self {
        Self {
            block_length: U16::new(block_length),
            template_id: U16::new(template_id),
            schema_id: U16::new(SCHEMA_ID),
            version: U16::new(SCHEMA_VERSION),
        }
    }
}

/// The 4-byte repeating-group header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct GroupHeader {
    /// Size of one entry.
    pub block_length: U16,
    pub num_in_group: U16,
}

impl GroupHeader {
    pub const LEN: usize = 4;

    pub fn new(block_length: u16, num_in_group: u16) -> Self {
        Self {
            block_length: U16::new(block_length),
            num_in_group: U16::new(num_in_group),
        }
    }
}

/// Fixed block of the security definition (template 18).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct SecurityDefinitionBlock {
    /// 'A' add, 'M' modify, 'D' delete.
    pub security_update_action: u8,
    pub last_update_time_ns: U64,
    pub md_entry_originator: [u8; 16],
    pub symbol: [u8; 16],
    pub security_id: I32,
    pub security_id_source: U32,
    pub security_type: i8,
    pub settlement_year: U16,
    pub settlement_month: u8,
    pub settlement_day: u8,
    pub currency1: [u8; 3],
    pub currency2: [u8; 3],
    pub price_decimal_precision: u8,
    pub qty_decimal_precision: u8,
    pub depth_of_book: u8,
    pub min_trade_vol: U64,
    pub incremental_conflation_interval_ms: U32,
    pub snapshot_interval_sec: U32,
    pub tick_size_mantissa: I64,
    pub contract_multiplier_mantissa: I64,
    /// Null when the instrument has no price banding.
    pub max_price_variation_mantissa: I64,
    pub settlement_price_precision: u8,
    pub reserved: [u8; 2],
}

impl SecurityDefinitionBlock {
    pub const LEN: usize = 106;
}

/// Fixed block of the full refresh (template 20).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct MdFullRefreshBlock {
    pub last_msg_seq_num_processed: U64,
    pub security_id: I32,
    pub rpt_seq: U32,
    pub transact_time_ns: U64,
    pub md_entry_originator: [u8; 16],
    pub market_depth: u8,
    pub security_type: i8,
}

impl MdFullRefreshBlock {
    pub const LEN: usize = 42;
}

/// One full-refresh group entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct MdSnapshotEntry {
    pub md_entry_type: u8,
    pub price_mantissa: I64,
    pub md_entry_size: I64,
}

impl MdSnapshotEntry {
    pub const LEN: usize = 17;
}

/// Fixed block of the incremental refresh (template 21).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct MdIncrementalBlock {
    pub security_id: I32,
    pub rpt_seq: U32,
    pub transact_time_ns: U64,
    pub md_entry_originator: [u8; 16],
}

impl MdIncrementalBlock {
    pub const LEN: usize = 32;
}

/// One incremental-refresh group entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct MdIncrementalEntry {
    pub md_update_action: u8,
    pub md_entry_type: u8,
    pub price_mantissa: I64,
    pub md_entry_size: I64,
}

impl MdIncrementalEntry {
    pub const LEN: usize = 18;
}

/// Fixed block of the trade incremental (template 111).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct MdTradesBlock {
    pub security_id: I32,
}

impl MdTradesBlock {
    pub const LEN: usize = 4;
}

/// One trade group entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct MdTradeEntry {
    pub transact_time_ns: U64,
    pub price_mantissa: I64,
    pub md_entry_size: I64,
    pub aggressor_side: u8,
}

impl MdTradeEntry {
    pub const LEN: usize = 25;
}

/// Packs a string into a fixed-length ASCII field, zero-padded on the
/// right. Oversized input is truncated at the field length.
pub fn pack_str<const N: usize>(value: &str) -> [u8; N] {
    let mut field = [0u8; N];
    let bytes = value.as_bytes();
    let len = bytes.len().min(N);
    field[..len].copy_from_slice(&bytes[..len]);
    field
}

/// Reads a fixed-length ASCII field up to the first NUL.
pub fn unpack_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
