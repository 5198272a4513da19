//! Data providers: where observation tables come from.
//!
//! The checker and the dashboard only ever ask a `DataProvider` for a table.
//! `WorkbookProvider` reads the operations workbook; `FixtureProvider` serves
//! tables built in memory.

use crate::{
    error::LoadError,
    loader::{load_table, ObservationTable},
    types::EntityKind,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub trait DataProvider: Send + Sync {
    fn table(&self, kind: EntityKind) -> Result<Arc<ObservationTable>, LoadError>;

    /// Forget anything memoized so the next request reads fresh data.
    fn invalidate(&self) {}
}

type TableCache = HashMap<EntityKind, Arc<ObservationTable>>;

/// Reads sheets from the workbook on disk, memoizing successful loads.
pub struct WorkbookProvider {
    path:  PathBuf,
    cache: Mutex<TableCache>,
}

impl WorkbookProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path:  path.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cache only ever holds fully loaded tables, so a guard left behind
    /// by a panicking thread is still safe to reuse.
    fn cache(&self) -> MutexGuard<'_, TableCache> {
        self.cache.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            log::warn!("workbook cache lock was poisoned; recovering it");
            poisoned.into_inner()
        })
    }
}

impl DataProvider for WorkbookProvider {
    fn table(&self, kind: EntityKind) -> Result<Arc<ObservationTable>, LoadError> {
        if let Some(hit) = self.cache().get(&kind).cloned() {
            return Ok(hit);
        }

        let table = Arc::new(load_table(&self.path, kind)?);
        self.cache().insert(kind, Arc::clone(&table));
        Ok(table)
    }

    fn invalidate(&self) {
        self.cache().clear();
        log::info!("workbook cache cleared for {}", self.path.display());
    }
}

/// In-memory tables. A kind with no table reads as a missing sheet.
#[derive(Default)]
pub struct FixtureProvider {
    tables: HashMap<EntityKind, Arc<ObservationTable>>,
}

impl FixtureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: ObservationTable) -> Self {
        self.tables.insert(table.kind, Arc::new(table));
        self
    }
}

impl DataProvider for FixtureProvider {
    fn table(&self, kind: EntityKind) -> Result<Arc<ObservationTable>, LoadError> {
        self.tables
            .get(&kind)
            .cloned()
            .ok_or_else(|| LoadError::SheetNotFound {
                sheet:     kind.sheet_name().to_string(),
                available: self
                    .tables
                    .keys()
                    .map(|k| k.sheet_name())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poison(provider: &WorkbookProvider) {
        let _ = std::thread::scope(|s| {
            s.spawn(|| {
                let _guard = provider.cache.lock();
                panic!("poison the cache lock");
            })
            .join()
        });
        assert!(provider.cache.is_poisoned());
    }

    #[test]
    fn poisoned_cache_keeps_serving_memoized_tables() {
        let provider = WorkbookProvider::new("no/such/workbook.xlsx");
        poison(&provider);

        provider.cache().insert(
            EntityKind::Agence,
            Arc::new(ObservationTable::empty(EntityKind::Agence)),
        );

        // The file does not exist, so only the cache can answer.
        let table = provider.table(EntityKind::Agence).unwrap();
        assert_eq!(table.kind, EntityKind::Agence);

        provider.invalidate();
        assert!(provider.table(EntityKind::Agence).is_err());
    }
}
