//! Transport-layer framing.
//!
//! Every outbound datagram starts with the 20-byte packet header; the SBE
//! message follows immediately. The 23-byte legacy multicast header exists
//! only for the end-of-conflation marker kept for old consumers.

use bitflags::bitflags;
use zerocopy::little_endian::{U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Size of [`PacketHeader`] on the wire.
pub const PACKET_HEADER_LEN: usize = 20;

/// Current packet header version.
pub const PACKET_HEADER_VERSION: u8 = 1;

/// Size of [`LegacyMulticastHeader`] on the wire.
pub const LEGACY_HEADER_LEN: usize = 23;

bitflags! {
    /// Flag bits of the legacy multicast header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PacketFlags: u8 {
        /// Last packet of a conflation interval / of the stream.
        const END_OF_STREAM = 0x02;
    }
}

/// The 20-byte little-endian packet header prepended to every datagram.
///
/// `msg_seq_num` is strictly monotone per channel; a receiver seeing a gap
/// must infer loss. `packet_len` covers the whole datagram including this
/// header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct PacketHeader {
    pub msg_seq_num: U64,
    /// Send time, nanoseconds since the UNIX epoch.
    pub sending_time_ns: U64,
    /// Always [`PACKET_HEADER_LEN`].
    pub hdr_len: u8,
    /// Always [`PACKET_HEADER_VERSION`].
    pub hdr_ver: u8,
    /// Total datagram length including this header.
    pub packet_len: U16,
}

impl PacketHeader {
    pub fn new(msg_seq_num: u64, sending_time_ns: u64, packet_len: u16) -> Self {
        Self {
            msg_seq_num: U64::new(msg_seq_num),
            sending_time_ns: U64::new(sending_time_ns),
            hdr_len: PACKET_HEADER_LEN as u8,
            hdr_ver: PACKET_HEADER_VERSION,
            packet_len: U16::new(packet_len),
        }
    }
}

/// The superseded 23-byte multicast header.
///
/// New consumers only understand [`PacketHeader`]; this layout is emitted
/// solely as the header-only end-of-conflation marker on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct LegacyMulticastHeader {
    pub sequence_number: U64,
    pub channel_id: U32,
    pub send_time_ns: U64,
    pub message_count: U16,
    pub flags: u8,
}

impl LegacyMulticastHeader {
    /// Builds the header-only end-of-stream marker.
    pub fn end_of_stream(sequence_number: u64, channel_id: u32, send_time_ns: u64) -> Self {
        Self {
            sequence_number: U64::new(sequence_number),
            channel_id: U32::new(channel_id),
            send_time_ns: U64::new(send_time_ns),
            message_count: U16::new(0),
            flags: PacketFlags::END_OF_STREAM.bits(),
        }
    }
}
