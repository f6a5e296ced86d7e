//! Framed binary wire protocol: fixed-point decimals, the two-layer
//! packet/message framing, and the template-tagged message codec.
//!
//! Everything multi-byte on the wire is little-endian; the byte order is
//! fixed here at the codec layer with explicit little-endian field types,
//! never by host conversion at call sites.

pub mod decimal;
pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod messages;

pub use decimal::{DECIMAL_EXPONENT, NULL_MANTISSA, PriceDecimal, price_key};
pub use decoder::{
    DecodedMessage, DecodedPacket, FullRefreshMsg, IncrementalEntry, IncrementalMsg,
    SecurityDefinitionMsg, SnapshotEntry, TradeEntry, TradesMsg, decode_message, decode_packet,
};
pub use encoder::{DEFAULT_MAX_MESSAGE_SIZE, Encoder, MAX_UDP_PAYLOAD};
pub use frame::{
    LEGACY_HEADER_LEN, LegacyMulticastHeader, PACKET_HEADER_LEN, PACKET_HEADER_VERSION,
    PacketFlags, PacketHeader,
};
pub use messages::{GroupHeader, MessageHeader, SCHEMA_ID, SCHEMA_VERSION, template};

use thiserror::Error;

/// Failures raised by the codec on either direction.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WireError {
    /// The encoded message would exceed the configured size cap.
    #[error("encoded message is {size} bytes, above the {max} byte cap")]
    MessageTooLarge { size: usize, max: usize },

    /// A price cannot be represented as a Decimal(−9) mantissa.
    #[error("price {0} overflows the fixed-point decimal mantissa")]
    DecimalOverflow(f64),

    /// The buffer ends before the framing it declares.
    #[error("buffer truncated inside a header or declared body")]
    TruncatedHeader,

    /// The message header names a template this codec does not know.
    #[error("unknown template id {0}")]
    UnknownTemplate(u16),

    /// The schema id reads byte-swapped: the producer framed in the wrong
    /// byte order.
    #[error("schema id is byte-swapped; wrong endianness on the wire")]
    BadEndianness,
}
