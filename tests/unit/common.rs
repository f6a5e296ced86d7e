//! Shared fixtures: a capture transport that records every datagram, and
//! builders for the FX test universe.

use fxcast_rs::market::book::BookConfig;
use fxcast_rs::market::instrument::Instrument;
use fxcast_rs::market::manager::BookManager;
use fxcast_rs::publisher::MulticastConfig;
use fxcast_rs::transport::{Transport, TransportError, TransportFactory};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A transport that appends every sent datagram to an in-memory log.
pub struct CaptureTransport {
    description: String,
    packets: Mutex<Vec<Vec<u8>>>,
}

impl CaptureTransport {
    fn new(description: String) -> Self {
        Self {
            description,
            packets: Mutex::new(Vec::new()),
        }
    }

    pub fn packets(&self) -> Vec<Vec<u8>> {
        self.packets.lock().unwrap().clone()
    }

    pub fn packet_count(&self) -> usize {
        self.packets.lock().unwrap().len()
    }
}

impl Transport for CaptureTransport {
    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        self.packets.lock().unwrap().push(payload.to_vec());
        Ok(())
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

/// Factory handing out capture transports, retrievable by `ip:port`.
#[derive(Default)]
pub struct CaptureFactory {
    transports: Mutex<HashMap<String, Arc<CaptureTransport>>>,
}

impl CaptureFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The transport created for `ip:port`, if the publisher asked for one.
    pub fn transport(&self, address: &str) -> Arc<CaptureTransport> {
        self.transports
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_else(|| panic!("no transport was created for {address}"))
    }
}

impl TransportFactory for CaptureFactory {
    fn sender(
        &self,
        multicast_ip: &str,
        port: u16,
        _interface_ip: &str,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        let address = format!("{multicast_ip}:{port}");
        let transport = Arc::new(CaptureTransport::new(address.clone()));
        self.transports
            .lock()
            .unwrap()
            .insert(address, Arc::clone(&transport));
        Ok(transport)
    }
}

/// A registry holding the EURUSD/GBPUSD/USDCAD subset used across suites.
pub fn test_manager() -> Arc<BookManager> {
    let manager = Arc::new(BookManager::new());
    for (id, symbol, tick, price) in [
        (1001u32, "EURUSD", 0.00001, 1.0850),
        (1002, "GBPUSD", 0.00001, 1.2650),
        (1007, "USDCAD", 0.00001, 1.3620),
    ] {
        manager
            .add_instrument(
                Instrument::fx_spot(id, symbol)
                    .with_tick_size(tick)
                    .with_property("initial_price", price),
            )
            .unwrap();
        manager.create_order_book(id, BookConfig::default()).unwrap();
    }
    manager
}

/// The default multicast layout with channel 1 = {EURUSD, GBPUSD} and
/// channel 2 = {USDCAD}, as the routing scenarios expect.
pub fn test_config() -> MulticastConfig {
    let mut config = MulticastConfig::default_local();
    config.channel_feeds_a[0].instruments = vec!["EURUSD".into(), "GBPUSD".into()];
    config.channel_feeds_a[1].instruments = vec!["USDCAD".into()];
    config.channel_feeds_b[0].instruments = vec!["EURUSD".into(), "GBPUSD".into()];
    config.channel_feeds_b[1].instruments = vec!["USDCAD".into()];
    config
}
