use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use super::{Document, Kind, Store};
use crate::domain::EntityId;
use crate::errors::StoreError;

#[derive(Default)]
struct Tables {
    documents: HashMap<Kind, BTreeMap<EntityId, (u64, Value)>>,
    sequences: HashMap<Kind, EntityId>,
}

impl Tables {
    fn check_version(&self, kind: Kind, document: &Document) -> Result<(), StoreError> {
        let stored = self
            .documents
            .get(&kind)
            .and_then(|table| table.get(&document.id))
            .map(|(version, _)| *version)
            .unwrap_or(0);

        if stored == document.version {
            Ok(())
        } else {
            Err(StoreError::Conflict {
                kind,
                id: document.id,
            })
        }
    }

    fn write(&mut self, kind: Kind, document: &Document) -> u64 {
        let version = document.version + 1;
        self.documents
            .entry(kind)
            .or_default()
            .insert(document.id, (version, document.body.clone()));
        version
    }
}

/// In-process store, used by tests and when embedding the engine
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A poisoned lock only means another test thread panicked mid-write
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self, kind: Kind) -> usize {
        self.lock().documents.get(&kind).map_or(0, BTreeMap::len)
    }
}

impl Store for MemoryStore {
    fn allocate_id(&self, kind: Kind) -> Result<EntityId, StoreError> {
        let mut tables = self.lock();
        let highest_stored = tables
            .documents
            .get(&kind)
            .and_then(|table| table.keys().next_back().copied())
            .unwrap_or(0);
        let sequence = tables.sequences.entry(kind).or_insert(0);
        *sequence = (*sequence).max(highest_stored) + 1;
        Ok(*sequence)
    }

    fn get(&self, kind: Kind, id: EntityId) -> Result<Option<Document>, StoreError> {
        let tables = self.lock();
        Ok(tables
            .documents
            .get(&kind)
            .and_then(|table| table.get(&id))
            .map(|(version, body)| Document {
                id,
                version: *version,
                body: body.clone(),
            }))
    }

    fn put(&self, kind: Kind, document: &Document) -> Result<u64, StoreError> {
        let mut tables = self.lock();
        tables.check_version(kind, document)?;
        Ok(tables.write(kind, document))
    }

    fn get_multi(&self, kind: Kind, ids: &[EntityId]) -> Result<Vec<Option<Document>>, StoreError> {
        ids.iter().map(|&id| self.get(kind, id)).collect()
    }

    fn put_multi(&self, kind: Kind, documents: &[Document]) -> Result<Vec<u64>, StoreError> {
        let mut tables = self.lock();
        for document in documents {
            tables.check_version(kind, document)?;
        }
        Ok(documents
            .iter()
            .map(|document| tables.write(kind, document))
            .collect())
    }

    fn query(&self, kind: Kind, field: &str, value: &Value) -> Result<Vec<Document>, StoreError> {
        if !(value.is_string() || value.is_number() || value.is_boolean()) {
            return Err(StoreError::UnsupportedQuery {
                field: field.to_string(),
            });
        }

        let tables = self.lock();
        let Some(table) = tables.documents.get(&kind) else {
            return Ok(Vec::new());
        };

        Ok(table
            .iter()
            .filter(|(_, (_, body))| body.get(field) == Some(value))
            .map(|(&id, (version, body))| Document {
                id,
                version: *version,
                body: body.clone(),
            })
            .collect())
    }
}
