//! Multicast feed configuration.
//!
//! Loaded from a JSON file whose shape mirrors [`MulticastConfig`]; unknown
//! fields are ignored so config files can carry operator annotations.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Configuration failures. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate channel id {0}")]
    DuplicateChannel(u16),

    #[error("{0} is not a multicast address (expected 224.0.0.0/4)")]
    NotMulticast(String),
}

fn default_interface() -> String {
    "0.0.0.0".to_string()
}

/// One multicast feed: a group address plus the instruments it carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub channel_id: u16,
    pub multicast_ip: String,
    pub port: u16,
    #[serde(default = "default_interface")]
    pub interface_ip: String,
    #[serde(default)]
    pub description: String,
    /// Symbols partitioned onto this channel. Empty for the global feeds.
    #[serde(default)]
    pub instruments: Vec<String>,
}

impl FeedConfig {
    pub fn new(multicast_ip: &str, port: u16) -> Self {
        Self {
            channel_id: 0,
            multicast_ip: multicast_ip.to_string(),
            port,
            interface_ip: default_interface(),
            description: String::new(),
            instruments: Vec::new(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let parsed: Result<Ipv4Addr, _> = self.multicast_ip.parse();
        match parsed {
            Ok(addr) if addr.is_multicast() => Ok(()),
            _ => Err(ConfigError::NotMulticast(self.multicast_ip.clone())),
        }
    }
}

fn default_incremental_interval_ms() -> u64 {
    100
}

fn default_snapshot_interval_seconds() -> u64 {
    60
}

fn default_heartbeat_interval_seconds() -> u64 {
    30
}

fn default_book_depth() -> usize {
    10
}

fn default_send_statistics() -> bool {
    true
}

/// The complete multicast layout and timing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MulticastConfig {
    /// Global incremental feeds, channel 0 (A and B are redundant twins).
    pub incremental_feed_a: FeedConfig,
    pub incremental_feed_b: FeedConfig,
    pub security_definition_feed: FeedConfig,
    pub snapshot_feed: FeedConfig,

    /// Channel-partitioned incremental feeds.
    #[serde(default)]
    pub channel_feeds_a: Vec<FeedConfig>,
    #[serde(default)]
    pub channel_feeds_b: Vec<FeedConfig>,

    #[serde(default = "default_incremental_interval_ms")]
    pub incremental_interval_ms: u64,
    #[serde(default = "default_snapshot_interval_seconds")]
    pub snapshot_interval_seconds: u64,
    #[serde(default = "default_heartbeat_interval_seconds")]
    pub heartbeat_interval_seconds: u64,
    /// 0 disables conflation and the end-of-conflation marker.
    #[serde(default)]
    pub conflation_interval_ms: u64,
    #[serde(default = "default_book_depth")]
    pub book_depth: usize,
    #[serde(default = "default_send_statistics")]
    pub send_statistics: bool,
}

impl MulticastConfig {
    /// Loads and validates a config file.
    ///
    /// A missing file is not an error: the built-in default layout is used
    /// with a warning, matching how the server has always behaved when run
    /// outside its deployment directory. A file that exists but fails to
    /// parse or validate is fatal.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "config file not found, using default layout");
                let config = Self::default_local();
                config.validate()?;
                return Ok(config);
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        let config: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates multicast ranges and channel-id uniqueness.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for feed in self.all_feeds() {
            feed.validate()?;
        }

        let mut seen = std::collections::HashSet::new();
        for feed in &self.channel_feeds_a {
            if !seen.insert(feed.channel_id) {
                return Err(ConfigError::DuplicateChannel(feed.channel_id));
            }
        }
        let mut seen_b = std::collections::HashSet::new();
        for feed in &self.channel_feeds_b {
            if !seen_b.insert(feed.channel_id) {
                return Err(ConfigError::DuplicateChannel(feed.channel_id));
            }
        }
        Ok(())
    }

    fn all_feeds(&self) -> impl Iterator<Item = &FeedConfig> {
        [
            &self.incremental_feed_a,
            &self.incremental_feed_b,
            &self.security_definition_feed,
            &self.snapshot_feed,
        ]
        .into_iter()
        .chain(&self.channel_feeds_a)
        .chain(&self.channel_feeds_b)
    }

    /// The built-in local layout: global feeds on 239.100.1.x, channel 1
    /// (majors) on 239.100.2.x, channel 2 (commodity currencies) on
    /// 239.100.3.x.
    pub fn default_local() -> Self {
        let majors = ["EURUSD", "GBPUSD", "USDJPY", "USDCHF"];
        let commodities = ["AUDUSD", "NZDUSD", "USDCAD"];

        let channel = |id: u16, ip: &str, port: u16, desc: &str, symbols: &[&str]| FeedConfig {
            channel_id: id,
            multicast_ip: ip.to_string(),
            port,
            interface_ip: default_interface(),
            description: desc.to_string(),
            instruments: symbols.iter().map(|s| s.to_string()).collect(),
        };

        Self {
            incremental_feed_a: FeedConfig::new("239.100.1.1", 15001),
            incremental_feed_b: FeedConfig::new("239.100.1.2", 15002),
            security_definition_feed: FeedConfig::new("239.100.1.10", 15010),
            snapshot_feed: FeedConfig::new("239.100.1.20", 15020),
            channel_feeds_a: vec![
                channel(1, "239.100.2.1", 15101, "Major FX pairs", &majors),
                channel(2, "239.100.3.1", 15201, "Commodity currencies", &commodities),
            ],
            channel_feeds_b: vec![
                channel(1, "239.100.2.2", 15102, "Major FX pairs", &majors),
                channel(2, "239.100.3.2", 15202, "Commodity currencies", &commodities),
            ],
            incremental_interval_ms: default_incremental_interval_ms(),
            snapshot_interval_seconds: default_snapshot_interval_seconds(),
            heartbeat_interval_seconds: default_heartbeat_interval_seconds(),
            conflation_interval_ms: 0,
            book_depth: default_book_depth(),
            send_statistics: default_send_statistics(),
        }
    }
}
