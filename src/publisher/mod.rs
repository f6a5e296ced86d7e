//! Sequenced, A/B-redundant multicast publisher.
//!
//! The publisher listens to the generator, encodes each event, routes it to
//! the owning channel (or the global channel 0), wraps it with a freshly
//! sequenced packet header, and sends the identical packet on both the A
//! and B feeds of that channel. Snapshots and security definitions ride
//! their own dedicated feeds on channel-0 sequencing.
//!
//! Runtime failures never propagate: send errors and oversized encodes are
//! counted and logged, and the feed keeps flowing.

pub mod config;

pub use config::{ConfigError, FeedConfig, MulticastConfig};

use crate::market::events::{
    MarketEvent, MarketEventListener, QuoteUpdate, SnapshotEvent, StatisticsEvent, TradeEvent,
};
use crate::market::instrument::{Instrument, InstrumentKind};
use crate::transport::udp::UdpTransportFactory;
use crate::transport::{Transport, TransportError, TransportFactory};
use crate::utils::current_time_nanos;
use crate::wire::encoder::Encoder;
use crate::wire::frame::{LegacyMulticastHeader, PACKET_HEADER_LEN, PacketHeader};
use crate::wire::WireError;
use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};
use zerocopy::IntoBytes;

/// Point-in-time copy of the publisher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    /// Successful sends on A feeds (one per physical datagram).
    pub messages_sent_a: u64,
    /// Successful sends on B feeds.
    pub messages_sent_b: u64,
    pub snapshots_sent: u64,
    pub definitions_sent: u64,
    pub heartbeats_sent: u64,
    pub bytes_sent: u64,
    /// Runtime send failures (the feed is lossy by design).
    pub send_errors: u64,
    /// Events dropped because they could not be encoded.
    pub encode_drops: u64,
}

#[derive(Default)]
struct Counters {
    messages_sent_a: AtomicU64,
    messages_sent_b: AtomicU64,
    snapshots_sent: AtomicU64,
    definitions_sent: AtomicU64,
    heartbeats_sent: AtomicU64,
    bytes_sent: AtomicU64,
    send_errors: AtomicU64,
    encode_drops: AtomicU64,
}

/// Multicast fan-out with per-channel sequencing.
pub struct MulticastPublisher {
    config: MulticastConfig,
    encoder: Encoder,

    incremental_a: Arc<dyn Transport>,
    incremental_b: Arc<dyn Transport>,
    security_def_transport: Arc<dyn Transport>,
    snapshot_transport: Arc<dyn Transport>,

    channels_a: HashMap<u16, Arc<dyn Transport>>,
    channels_b: HashMap<u16, Arc<dyn Transport>>,

    /// Monotone per-channel packet sequence counters (channel 0 included).
    sequences: DashMap<u16, AtomicU64>,
    channel_enabled: DashMap<u16, AtomicBool>,

    instrument_channel: HashMap<u32, u16>,
    instrument_kind: HashMap<u32, InstrumentKind>,

    counters: Counters,
    last_heartbeat: Mutex<Instant>,
    start_time: Instant,
}

impl MulticastPublisher {
    /// Builds the publisher with real UDP multicast senders.
    ///
    /// `instruments` is the universe at startup; it resolves the config's
    /// per-channel symbol lists to instrument ids and records each
    /// instrument's kind for snapshot encoding.
    pub fn initialize(
        config: MulticastConfig,
        instruments: &[Arc<Instrument>],
    ) -> Result<Self, TransportError> {
        Self::initialize_with(config, &UdpTransportFactory, instruments)
    }

    /// Builds the publisher with a caller-supplied transport factory.
    pub fn initialize_with(
        config: MulticastConfig,
        factory: &dyn TransportFactory,
        instruments: &[Arc<Instrument>],
    ) -> Result<Self, TransportError> {
        let make = |feed: &FeedConfig| {
            factory.sender(&feed.multicast_ip, feed.port, &feed.interface_ip)
        };

        let incremental_a = make(&config.incremental_feed_a)?;
        let incremental_b = make(&config.incremental_feed_b)?;
        let security_def_transport = make(&config.security_definition_feed)?;
        let snapshot_transport = make(&config.snapshot_feed)?;

        let symbol_to_id: HashMap<&str, u32> = instruments
            .iter()
            .map(|i| (i.symbol.as_str(), i.instrument_id))
            .collect();
        let instrument_kind = instruments
            .iter()
            .map(|i| (i.instrument_id, i.kind()))
            .collect();

        let sequences = DashMap::new();
        sequences.insert(0u16, AtomicU64::new(0));
        let channel_enabled = DashMap::new();

        let mut channels_a = HashMap::new();
        let mut instrument_channel = HashMap::new();
        for feed in &config.channel_feeds_a {
            channels_a.insert(feed.channel_id, make(feed)?);
            sequences.insert(feed.channel_id, AtomicU64::new(0));
            channel_enabled.insert(feed.channel_id, AtomicBool::new(true));

            for symbol in &feed.instruments {
                // Symbols outside the registry keep the legacy hash-derived
                // id so their mapping stays deterministic.
                let id = symbol_to_id
                    .get(symbol.as_str())
                    .copied()
                    .unwrap_or_else(|| symbol_hash_id(symbol));
                instrument_channel.insert(id, feed.channel_id);
            }
        }

        let mut channels_b = HashMap::new();
        for feed in &config.channel_feeds_b {
            channels_b.insert(feed.channel_id, make(feed)?);
        }

        info!(
            incremental_a = %incremental_a.description(),
            incremental_b = %incremental_b.description(),
            security_definitions = %security_def_transport.description(),
            snapshots = %snapshot_transport.description(),
            channels = channels_a.len(),
            "multicast publisher initialized"
        );

        Ok(Self {
            config,
            encoder: Encoder::new(),
            incremental_a,
            incremental_b,
            security_def_transport,
            snapshot_transport,
            channels_a,
            channels_b,
            sequences,
            channel_enabled,
            instrument_channel,
            instrument_kind,
            counters: Counters::default(),
            last_heartbeat: Mutex::new(Instant::now()),
            start_time: Instant::now(),
        })
    }

    /// The channel owning an instrument; 0 when unmapped.
    pub fn channel_for_instrument(&self, instrument_id: u32) -> u16 {
        self.instrument_channel
            .get(&instrument_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn enable_channel(&self, channel_id: u16, enabled: bool) {
        self.channel_enabled
            .entry(channel_id)
            .or_insert_with(|| AtomicBool::new(enabled))
            .store(enabled, Ordering::Release);
    }

    pub fn is_channel_enabled(&self, channel_id: u16) -> bool {
        self.channel_enabled
            .get(&channel_id)
            .map(|flag| flag.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Assigns the next packet sequence number on a channel (1, 2, 3, …).
    fn next_sequence(&self, channel_id: u16) -> u64 {
        self.sequences
            .entry(channel_id)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::AcqRel)
            + 1
    }

    /// The newest sequence already assigned on a channel.
    fn current_sequence(&self, channel_id: u16) -> u64 {
        self.sequences
            .get(&channel_id)
            .map(|seq| seq.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    fn wrap_packet(&self, sequence: u64, message: &[u8]) -> Vec<u8> {
        let total = PACKET_HEADER_LEN + message.len();
        let header = PacketHeader::new(sequence, current_time_nanos(), total as u16);
        let mut packet = Vec::with_capacity(total);
        packet.extend_from_slice(header.as_bytes());
        packet.extend_from_slice(message);
        packet
    }

    /// Wraps once per channel and sends the identical packet to both feeds.
    fn send_pair(
        &self,
        channel_id: u16,
        message: &[u8],
        feed_a: Option<&Arc<dyn Transport>>,
        feed_b: Option<&Arc<dyn Transport>>,
    ) {
        let sequence = self.next_sequence(channel_id);
        let packet = self.wrap_packet(sequence, message);

        if let Some(transport) = feed_a {
            match transport.send(&packet) {
                Ok(()) => {
                    self.counters.messages_sent_a.fetch_add(1, Ordering::Relaxed);
                    self.counters
                        .bytes_sent
                        .fetch_add(packet.len() as u64, Ordering::Relaxed);
                }
                Err(err) => {
                    self.counters.send_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(channel_id, error = %err, "feed A send failed");
                }
            }
        }
        if let Some(transport) = feed_b {
            match transport.send(&packet) {
                Ok(()) => {
                    self.counters.messages_sent_b.fetch_add(1, Ordering::Relaxed);
                    self.counters
                        .bytes_sent
                        .fetch_add(packet.len() as u64, Ordering::Relaxed);
                }
                Err(err) => {
                    self.counters.send_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(channel_id, error = %err, "feed B send failed");
                }
            }
        }
    }

    /// Routes an encoded incremental message to the instrument's channel
    /// feeds, or to the global feeds when the channel is unmapped or
    /// disabled.
    fn route_incremental(&self, instrument_id: u32, message: &[u8]) {
        let channel_id = self.channel_for_instrument(instrument_id);
        if channel_id > 0 && self.is_channel_enabled(channel_id) {
            let feed_a = self.channels_a.get(&channel_id);
            let feed_b = self.channels_b.get(&channel_id);
            if feed_a.is_some() || feed_b.is_some() {
                self.send_pair(channel_id, message, feed_a, feed_b);
                return;
            }
        }
        self.send_pair(
            0,
            message,
            Some(&self.incremental_a),
            Some(&self.incremental_b),
        );
    }

    fn record_encode_error(&self, err: &WireError, what: &'static str) {
        self.counters.encode_drops.fetch_add(1, Ordering::Relaxed);
        warn!(error = %err, what, "dropped unencodable event");
    }

    /// Publishes one quote delta on the incremental stream.
    pub fn publish_incremental_quote(&self, quote: &QuoteUpdate) {
        match self.encoder.encode_incremental_quote(quote) {
            Ok(message) => self.route_incremental(quote.instrument_id, &message),
            Err(err) => self.record_encode_error(&err, "quote"),
        }
    }

    /// Publishes one trade print on the incremental stream.
    pub fn publish_incremental_trade(&self, trade: &TradeEvent) {
        match self.encoder.encode_incremental_trade(trade) {
            Ok(message) => self.route_incremental(trade.instrument_id, &message),
            Err(err) => self.record_encode_error(&err, "trade"),
        }
    }

    /// Publishes a session statistic on the incremental stream, when
    /// statistics are enabled in the config.
    pub fn publish_statistics(&self, stats: &StatisticsEvent) {
        if !self.config.send_statistics {
            return;
        }
        match self.encoder.encode_incremental_statistics(stats) {
            Ok(message) => self.route_incremental(stats.instrument_id, &message),
            Err(err) => self.record_encode_error(&err, "statistics"),
        }
    }

    /// Publishes a full refresh on the snapshot feed with channel-0
    /// sequencing. A snapshot whose level set overflows the encoder cap is
    /// split in half and re-tried until every part fits.
    pub fn publish_snapshot(&self, snapshot: &SnapshotEvent) {
        let kind = self
            .instrument_kind
            .get(&snapshot.instrument_id)
            .copied()
            .unwrap_or(InstrumentKind::Unknown);
        let incremental_channel = self.channel_for_instrument(snapshot.instrument_id);

        let mut parts = VecDeque::new();
        parts.push_back(snapshot.clone());

        while let Some(part) = parts.pop_front() {
            let last_processed = self.current_sequence(incremental_channel);
            match self
                .encoder
                .encode_full_refresh(&part, last_processed, kind)
            {
                Ok(message) => {
                    let sequence = self.next_sequence(0);
                    let packet = self.wrap_packet(sequence, &message);
                    match self.snapshot_transport.send(&packet) {
                        Ok(()) => {
                            self.counters.snapshots_sent.fetch_add(1, Ordering::Relaxed);
                            self.counters
                                .bytes_sent
                                .fetch_add(packet.len() as u64, Ordering::Relaxed);
                        }
                        Err(err) => {
                            self.counters.send_errors.fetch_add(1, Ordering::Relaxed);
                            warn!(error = %err, "snapshot send failed");
                        }
                    }
                }
                Err(WireError::MessageTooLarge { size, max })
                    if part.bid_levels.len() + part.ask_levels.len() > 1 =>
                {
                    debug!(size, max, "splitting oversized snapshot");
                    let (first, second) = split_snapshot(part);
                    parts.push_front(second);
                    parts.push_front(first);
                }
                Err(err) => self.record_encode_error(&err, "snapshot"),
            }
        }
    }

    /// Publishes a security definition on its dedicated feed with
    /// channel-0 sequencing.
    pub fn publish_security_definition(&self, instrument: &Instrument) {
        let message = match self
            .encoder
            .encode_security_definition(instrument, current_time_nanos())
        {
            Ok(message) => message,
            Err(err) => {
                self.record_encode_error(&err, "security definition");
                return;
            }
        };
        let sequence = self.next_sequence(0);
        let packet = self.wrap_packet(sequence, &message);
        match self.security_def_transport.send(&packet) {
            Ok(()) => {
                self.counters
                    .definitions_sent
                    .fetch_add(1, Ordering::Relaxed);
                self.counters
                    .bytes_sent
                    .fetch_add(packet.len() as u64, Ordering::Relaxed);
            }
            Err(err) => {
                self.counters.send_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "security definition send failed");
            }
        }
    }

    /// Emits a heartbeat on channel 0 and every enabled channel, A and B.
    pub fn send_heartbeat(&self) {
        let message = match self.encoder.encode_heartbeat() {
            Ok(message) => message,
            Err(err) => {
                self.record_encode_error(&err, "heartbeat");
                return;
            }
        };

        self.send_pair(
            0,
            &message,
            Some(&self.incremental_a),
            Some(&self.incremental_b),
        );
        for (channel_id, feed_a) in &self.channels_a {
            if self.is_channel_enabled(*channel_id) {
                self.send_pair(*channel_id, &message, Some(feed_a), self.channels_b.get(channel_id));
            }
        }

        self.counters.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
        *self.last_heartbeat.lock().expect("heartbeat lock poisoned") = Instant::now();
    }

    /// Sends a heartbeat when the configured interval has elapsed. The
    /// driver calls this every loop iteration.
    pub fn poll_heartbeat(&self) {
        let due = {
            let last = self.last_heartbeat.lock().expect("heartbeat lock poisoned");
            last.elapsed() >= Duration::from_secs(self.config.heartbeat_interval_seconds)
        };
        if due {
            self.send_heartbeat();
        }
    }

    /// Emits the legacy header-only end-of-stream marker on channel 0 A/B.
    /// Only applies when conflation is configured.
    pub fn send_end_of_conflation(&self) {
        if self.config.conflation_interval_ms == 0 {
            return;
        }
        let header = LegacyMulticastHeader::end_of_stream(
            self.next_sequence(0),
            0,
            current_time_nanos(),
        );
        let packet = header.as_bytes();
        for (transport, counter) in [
            (&self.incremental_a, &self.counters.messages_sent_a),
            (&self.incremental_b, &self.counters.messages_sent_b),
        ] {
            match transport.send(packet) {
                Ok(()) => {
                    counter.fetch_add(1, Ordering::Relaxed);
                    self.counters
                        .bytes_sent
                        .fetch_add(packet.len() as u64, Ordering::Relaxed);
                }
                Err(err) => {
                    self.counters.send_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %err, "end-of-conflation send failed");
                }
            }
        }
        info!("sent end-of-conflation marker");
    }

    /// Sends the end-of-conflation marker (when configured) and logs the
    /// final counters. Sockets close when the publisher drops.
    pub fn shutdown(&self) {
        self.send_end_of_conflation();
        let stats = self.stats();
        info!(
            messages_a = stats.messages_sent_a,
            messages_b = stats.messages_sent_b,
            snapshots = stats.snapshots_sent,
            definitions = stats.definitions_sent,
            heartbeats = stats.heartbeats_sent,
            bytes = stats.bytes_sent,
            send_errors = stats.send_errors,
            encode_drops = stats.encode_drops,
            "multicast publisher shut down"
        );
    }

    pub fn stats(&self) -> PublisherStats {
        PublisherStats {
            messages_sent_a: self.counters.messages_sent_a.load(Ordering::Relaxed),
            messages_sent_b: self.counters.messages_sent_b.load(Ordering::Relaxed),
            snapshots_sent: self.counters.snapshots_sent.load(Ordering::Relaxed),
            definitions_sent: self.counters.definitions_sent.load(Ordering::Relaxed),
            heartbeats_sent: self.counters.heartbeats_sent.load(Ordering::Relaxed),
            bytes_sent: self.counters.bytes_sent.load(Ordering::Relaxed),
            send_errors: self.counters.send_errors.load(Ordering::Relaxed),
            encode_drops: self.counters.encode_drops.load(Ordering::Relaxed),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn config(&self) -> &MulticastConfig {
        &self.config
    }
}

impl MarketEventListener for MulticastPublisher {
    fn on_market_event(&self, event: &MarketEvent) {
        match event {
            MarketEvent::Quote(quote) => self.publish_incremental_quote(quote),
            MarketEvent::Trade(trade) => self.publish_incremental_trade(trade),
            MarketEvent::Snapshot(snapshot) => self.publish_snapshot(snapshot),
            MarketEvent::Statistics(stats) => self.publish_statistics(stats),
            other => trace!(kind = other.kind(), "event kind not published"),
        }
    }
}

/// Splits a snapshot's combined level list in half, preserving best-first
/// ordering and side assignment in both parts.
fn split_snapshot(snapshot: SnapshotEvent) -> (SnapshotEvent, SnapshotEvent) {
    let SnapshotEvent {
        instrument_id,
        timestamp_ns,
        sequence,
        bid_levels,
        ask_levels,
        last_trade_price,
        total_volume,
        rpt_seq,
    } = snapshot;

    let all: Vec<(bool, QuoteUpdate)> = bid_levels
        .into_iter()
        .map(|q| (true, q))
        .chain(ask_levels.into_iter().map(|q| (false, q)))
        .collect();
    let half = (all.len() / 2).max(1);

    let build = |entries: &[(bool, QuoteUpdate)]| {
        let mut part = SnapshotEvent::new(instrument_id);
        part.timestamp_ns = timestamp_ns;
        part.sequence = sequence;
        part.last_trade_price = last_trade_price;
        part.total_volume = total_volume;
        part.rpt_seq = rpt_seq;
        for (is_bid, quote) in entries {
            if *is_bid {
                part.bid_levels.push(quote.clone());
            } else {
                part.ask_levels.push(quote.clone());
            }
        }
        part
    };

    (build(&all[..half]), build(&all[half..]))
}

/// Stable 16-bit id for symbols outside the registry (FNV-1a, masked), the
/// legacy mapping for unresolvable channel assignments.
fn symbol_hash_id(symbol: &str) -> u32 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in symbol.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    (hash & 0xFFFF) as u32
}
