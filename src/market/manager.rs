//! Instrument and book registry with centralized event routing.
//!
//! One exclusive lock guards both maps; every observation or mutation of
//! the registry happens under it, and book mutations flow through
//! [`BookManager::apply_event`] so a reader that grabs a book afterwards
//! sees a consistent per-book state.

use crate::market::book::{BookConfig, OrderBook};
use crate::market::events::{MarketEvent, SnapshotEvent};
use crate::market::instrument::Instrument;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{info, trace, warn};

/// Registry-level failures. Steady-state event routing never errors (an
/// unknown instrument is a silent no-op); these only arise from setup calls.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BookError {
    #[error("no instrument registered with id {0}")]
    UnknownInstrument(u32),
    #[error("order book already exists for instrument {0}")]
    BookExists(u32),
    #[error("instrument id {0} already registered")]
    InstrumentExists(u32),
}

#[derive(Default)]
struct Registry {
    instruments: HashMap<u32, Arc<Instrument>>,
    books: HashMap<u32, Arc<OrderBook>>,
}

/// Thread-safe registry of instruments and their order books.
#[derive(Default)]
pub struct BookManager {
    registry: Mutex<Registry>,
}

impl BookManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().expect("book registry lock poisoned")
    }

    /// Registers an instrument. Fails if the id is already taken.
    pub fn add_instrument(&self, instrument: Instrument) -> Result<Arc<Instrument>, BookError> {
        let mut registry = self.lock();
        let id = instrument.instrument_id;
        if registry.instruments.contains_key(&id) {
            return Err(BookError::InstrumentExists(id));
        }
        let instrument = Arc::new(instrument);
        registry.instruments.insert(id, Arc::clone(&instrument));
        info!(instrument_id = id, symbol = %instrument.symbol, "registered instrument");
        Ok(instrument)
    }

    pub fn get_instrument(&self, instrument_id: u32) -> Option<Arc<Instrument>> {
        self.lock().instruments.get(&instrument_id).cloned()
    }

    /// All registered instruments, in no particular order.
    pub fn all_instruments(&self) -> Vec<Arc<Instrument>> {
        self.lock().instruments.values().cloned().collect()
    }

    pub fn all_instrument_ids(&self) -> Vec<u32> {
        self.lock().instruments.keys().copied().collect()
    }

    pub fn instrument_count(&self) -> usize {
        self.lock().instruments.len()
    }

    /// Creates the order book for a registered instrument.
    ///
    /// # Errors
    /// [`BookError::UnknownInstrument`] when the id is not registered,
    /// [`BookError::BookExists`] when a book was already created.
    pub fn create_order_book(
        &self,
        instrument_id: u32,
        config: BookConfig,
    ) -> Result<Arc<OrderBook>, BookError> {
        let mut registry = self.lock();
        let symbol = registry
            .instruments
            .get(&instrument_id)
            .ok_or(BookError::UnknownInstrument(instrument_id))?
            .symbol
            .clone();
        if registry.books.contains_key(&instrument_id) {
            return Err(BookError::BookExists(instrument_id));
        }
        let book = Arc::new(OrderBook::with_config(instrument_id, symbol, config));
        registry.books.insert(instrument_id, Arc::clone(&book));
        info!(instrument_id, "created order book");
        Ok(book)
    }

    pub fn get_order_book(&self, instrument_id: u32) -> Option<Arc<OrderBook>> {
        self.lock().books.get(&instrument_id).cloned()
    }

    /// Instrument and book for an id, resolved under a single critical
    /// section so the pair is consistent.
    pub fn get_instrument_and_book(
        &self,
        instrument_id: u32,
    ) -> (Option<Arc<Instrument>>, Option<Arc<OrderBook>>) {
        let registry = self.lock();
        (
            registry.instruments.get(&instrument_id).cloned(),
            registry.books.get(&instrument_id).cloned(),
        )
    }

    /// Routes an event to the owning book. Events for instruments without a
    /// book are dropped silently; a publisher must keep publishing.
    pub fn apply_event(&self, event: &MarketEvent) {
        let registry = self.lock();
        match registry.books.get(&event.instrument_id()) {
            Some(book) => book.apply_event(event),
            None => trace!(
                instrument_id = event.instrument_id(),
                kind = event.kind(),
                "dropped event for unknown instrument"
            ),
        }
    }

    /// Builds a snapshot for one instrument, or `None` when it has no book.
    pub fn create_snapshot(&self, instrument_id: u32, max_levels: usize) -> Option<SnapshotEvent> {
        let registry = self.lock();
        registry
            .books
            .get(&instrument_id)
            .map(|book| book.create_snapshot(max_levels))
    }

    /// Empties every book (ladders, tapes, statistics) without removing it.
    pub fn clear_all_books(&self) {
        let registry = self.lock();
        for book in registry.books.values() {
            book.clear();
        }
        warn!(books = registry.books.len(), "cleared all order books");
    }

    /// Drops every book from the registry. Instruments stay registered.
    pub fn reset_all_books(&self) {
        let mut registry = self.lock();
        let dropped = registry.books.len();
        registry.books.clear();
        warn!(books = dropped, "reset all order books");
    }
}
