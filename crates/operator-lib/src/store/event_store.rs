//! redb-backed decision store

use std::path::Path;
use std::sync::{Arc, RwLock};

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::tables::*;
use super::{DecisionStore, StoreError, StoreResult};
use crate::models::{DailyWindowSet, PlacementEvent, ScalingDecision, ScalingEvent, Window};

macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

type EventTable = TableDefinition<'static, u64, &'static [u8]>;

/// Store handle with an explicit open/close lifecycle.
///
/// Clones share the same database; once any clone calls `close`, every
/// operation on every clone fails with `StoreError::Closed`.
#[derive(Clone)]
pub struct EventStore {
    db: Arc<RwLock<Option<Database>>>,
}

impl EventStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self::from_database(db)?;
        debug!(?path, "decision store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store.
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self::from_database(db)?;
        debug!("in-memory decision store opened");
        Ok(store)
    }

    fn from_database(db: Database) -> StoreResult<Self> {
        let store = Self {
            db: Arc::new(RwLock::new(Some(db))),
        };
        store.ensure_tables()?;
        Ok(store)
    }

    /// Release the database. Later calls fail with `StoreError::Closed`.
    pub fn close(&self) {
        if let Ok(mut guard) = self.db.write() {
            if guard.take().is_some() {
                debug!("decision store closed");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.db.read().map(|guard| guard.is_none()).unwrap_or(true)
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> StoreResult<T>) -> StoreResult<T> {
        let guard = self.db.read().map_err(|_| StoreError::Closed)?;
        match guard.as_ref() {
            Some(db) => f(db),
            None => Err(StoreError::Closed),
        }
    }

    fn ensure_tables(&self) -> StoreResult<()> {
        self.with_db(|db| {
            let txn = db.begin_write().map_err(map_err!(Transaction))?;
            txn.open_table(WINDOWS).map_err(map_err!(Table))?;
            txn.open_table(SCALING_EVENTS).map_err(map_err!(Table))?;
            txn.open_table(PLACEMENT_EVENTS).map_err(map_err!(Table))?;
            txn.commit().map_err(map_err!(Transaction))?;
            Ok(())
        })
    }

    fn append<T: Serialize>(&self, table: EventTable, item: &T) -> StoreResult<u64> {
        let value = serde_json::to_vec(item).map_err(map_err!(Serialize))?;
        self.with_db(|db| {
            let txn = db.begin_write().map_err(map_err!(Transaction))?;
            let id;
            {
                let mut table = txn.open_table(table).map_err(map_err!(Table))?;
                let last = table
                    .last()
                    .map_err(map_err!(Read))?
                    .map(|(key, _)| key.value());
                id = last.map(|k| k + 1).unwrap_or(1);
                table
                    .insert(id, value.as_slice())
                    .map_err(map_err!(Write))?;
            }
            txn.commit().map_err(map_err!(Transaction))?;
            Ok(id)
        })
    }

    fn recent<T: DeserializeOwned>(
        &self,
        table: EventTable,
        limit: usize,
    ) -> StoreResult<Vec<(u64, T)>> {
        self.with_db(|db| {
            let txn = db.begin_read().map_err(map_err!(Transaction))?;
            let table = txn.open_table(table).map_err(map_err!(Table))?;
            let mut results = Vec::new();
            for entry in table.iter().map_err(map_err!(Read))?.rev().take(limit) {
                let (key, value) = entry.map_err(map_err!(Read))?;
                let item: T =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push((key.value(), item));
            }
            Ok(results)
        })
    }
}

impl DecisionStore for EventStore {
    fn get_windows(&self, date: &str) -> StoreResult<Option<Vec<Window>>> {
        self.with_db(|db| {
            let txn = db.begin_read().map_err(map_err!(Transaction))?;
            let table = txn.open_table(WINDOWS).map_err(map_err!(Table))?;
            match table.get(date).map_err(map_err!(Read))? {
                Some(guard) => {
                    let set: DailyWindowSet =
                        serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                    Ok(Some(set.windows))
                }
                None => Ok(None),
            }
        })
    }

    fn put_windows(&self, date: &str, windows: &[Window]) -> StoreResult<()> {
        let set = DailyWindowSet {
            date: date.to_string(),
            windows: windows.to_vec(),
        };
        let value = serde_json::to_vec(&set).map_err(map_err!(Serialize))?;
        self.with_db(|db| {
            let txn = db.begin_write().map_err(map_err!(Transaction))?;
            {
                let mut table = txn.open_table(WINDOWS).map_err(map_err!(Table))?;
                table
                    .insert(date, value.as_slice())
                    .map_err(map_err!(Write))?;
            }
            txn.commit().map_err(map_err!(Transaction))?;
            debug!(%date, windows = windows.len(), "windows stored");
            Ok(())
        })
    }

    fn append_event(&self, decision: &ScalingDecision) -> StoreResult<u64> {
        self.append(SCALING_EVENTS, decision)
    }

    fn recent_events(&self, limit: usize) -> StoreResult<Vec<ScalingEvent>> {
        Ok(self
            .recent::<ScalingDecision>(SCALING_EVENTS, limit)?
            .into_iter()
            .map(|(id, decision)| ScalingEvent { id, decision })
            .collect())
    }

    fn append_placement(&self, event: &PlacementEvent) -> StoreResult<u64> {
        self.append(PLACEMENT_EVENTS, event)
    }

    fn recent_placements(&self, limit: usize) -> StoreResult<Vec<PlacementEvent>> {
        Ok(self
            .recent::<PlacementEvent>(PLACEMENT_EVENTS, limit)?
            .into_iter()
            .map(|(_, event)| event)
            .collect())
    }
}
