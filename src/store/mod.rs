pub mod memory;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::EntityId;
use crate::errors::{AggregationError, StoreError};

pub use memory::MemoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    User,
    Team,
    Tournament,
    Match,
    Prediction,
    ScoreRecord,
    AccuracySeries,
    Activity,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::User => "User",
            Kind::Team => "Team",
            Kind::Tournament => "Tournament",
            Kind::Match => "Match",
            Kind::Prediction => "Prediction",
            Kind::ScoreRecord => "ScoreRecord",
            Kind::AccuracySeries => "AccuracySeries",
            Kind::Activity => "Activity",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored record. `version` is 0 until the document is first written.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: EntityId,
    pub version: u64,
    pub body: Value,
}

/// Key-value document store the aggregators persist through.
///
/// `put` is a compare-and-swap on `version`: it fails with
/// [`StoreError::Conflict`] unless the stored version equals the document's
/// (an absent document has version 0), and returns the new version.
pub trait Store: Send + Sync {
    fn allocate_id(&self, kind: Kind) -> Result<EntityId, StoreError>;

    fn get(&self, kind: Kind, id: EntityId) -> Result<Option<Document>, StoreError>;

    fn put(&self, kind: Kind, document: &Document) -> Result<u64, StoreError>;

    /// One entry per requested id, in request order
    fn get_multi(&self, kind: Kind, ids: &[EntityId]) -> Result<Vec<Option<Document>>, StoreError>;

    /// All-or-nothing
    fn put_multi(&self, kind: Kind, documents: &[Document]) -> Result<Vec<u64>, StoreError>;

    /// Documents whose top-level `field` equals `value`, ordered by id
    fn query(&self, kind: Kind, field: &str, value: &Value) -> Result<Vec<Document>, StoreError>;
}

pub trait Entity: Serialize + DeserializeOwned {
    const KIND: Kind;

    fn id(&self) -> EntityId;
}

/// Entity together with the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

impl<T: Entity> Versioned<T> {
    pub fn new(value: T) -> Self {
        Self { version: 0, value }
    }

    pub fn is_new(&self) -> bool {
        self.version == 0
    }

    fn from_document(document: Document) -> Result<Self, StoreError> {
        Ok(Self {
            version: document.version,
            value: serde_json::from_value(document.body)?,
        })
    }

    fn to_document(&self) -> Result<Document, StoreError> {
        Ok(Document {
            id: self.value.id(),
            version: self.version,
            body: serde_json::to_value(&self.value)?,
        })
    }
}

pub fn load<T: Entity>(store: &dyn Store, id: EntityId) -> Result<Option<Versioned<T>>, StoreError> {
    store
        .get(T::KIND, id)?
        .map(Versioned::from_document)
        .transpose()
}

/// Like [`load`], but a missing entity is an error
pub fn fetch<T: Entity>(store: &dyn Store, id: EntityId) -> Result<Versioned<T>, AggregationError> {
    load(store, id)?.ok_or_else(|| AggregationError::not_found(T::KIND, id))
}

pub fn load_many<T: Entity>(
    store: &dyn Store,
    ids: &[EntityId],
) -> Result<Vec<Option<Versioned<T>>>, StoreError> {
    store
        .get_multi(T::KIND, ids)?
        .into_iter()
        .map(|doc| doc.map(Versioned::from_document).transpose())
        .collect()
}

/// Writes the entity and bumps `entity.version` to the stored version
pub fn save<T: Entity>(store: &dyn Store, entity: &mut Versioned<T>) -> Result<(), StoreError> {
    let document = entity.to_document()?;
    entity.version = store.put(T::KIND, &document)?;
    Ok(())
}

/// Inserts new entities in one batch
pub fn insert_all<T: Entity>(store: &dyn Store, values: &[T]) -> Result<(), StoreError> {
    let documents = values
        .iter()
        .map(|value| {
            Ok(Document {
                id: value.id(),
                version: 0,
                body: serde_json::to_value(value)?,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    store.put_multi(T::KIND, &documents)?;
    Ok(())
}

pub fn find_by<T: Entity>(
    store: &dyn Store,
    field: &str,
    value: impl Into<Value>,
) -> Result<Vec<Versioned<T>>, StoreError> {
    store
        .query(T::KIND, field, &value.into())?
        .into_iter()
        .map(Versioned::from_document)
        .collect()
}
