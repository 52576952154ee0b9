// ── Ordered entity collections ──
//
// Insertion order is processing order: later items may reference ids
// assigned to earlier ones, so collections are `IndexMap`s, never hashed.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;

use crate::cursor::Cursor;
use crate::model::{EntityId, EntityKind, Item};

/// An ordered mapping from item key to [`Item`].
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Collection {
    items: IndexMap<String, Item>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item, returning the one it replaced (if any).
    pub fn insert(&mut self, key: impl Into<String>, item: impl Into<Item>) -> Option<Item> {
        self.items.insert(key.into(), item.into())
    }

    pub fn get(&self, key: &str) -> Option<&Item> {
        self.items.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut Item> {
        self.items.get_mut(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Item)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Item)> {
        self.items.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// A cursor over the keys as they stand now.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.keys().map(String::from).collect())
    }
}

impl<K: Into<String>, I: Into<Item>> FromIterator<(K, I)> for Collection {
    fn from_iter<T: IntoIterator<Item = (K, I)>>(iter: T) -> Self {
        Self {
            items: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// The collections registered on a runner, one per entity kind.
///
/// Registration is write-once: a second collection for the same kind is
/// ignored with a warning.
#[derive(Debug, Default)]
pub struct DataCollections {
    by_kind: IndexMap<EntityKind, Collection>,
}

impl DataCollections {
    /// Register a collection. Returns `false` if the kind was taken.
    pub fn register(&mut self, kind: EntityKind, collection: Collection) -> bool {
        if self.by_kind.contains_key(&kind) {
            warn!(
                collection = kind.collection_name(),
                "data collection already defined, ignoring"
            );
            return false;
        }
        self.by_kind.insert(kind, collection);
        true
    }

    pub fn get(&self, kind: EntityKind) -> Option<&Collection> {
        self.by_kind.get(&kind)
    }

    pub(crate) fn get_mut(&mut self, kind: EntityKind) -> Option<&mut Collection> {
        self.by_kind.get_mut(&kind)
    }

    /// Registered collections in chain order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, &Collection)> {
        EntityKind::ALL
            .into_iter()
            .filter_map(|kind| self.by_kind.get(&kind).map(|c| (kind, c)))
    }

    /// The remote id of `kind/key`, once known.
    pub fn id_of(&self, kind: EntityKind, key: &str) -> Option<EntityId> {
        self.get(kind)?.get(key)?.id()
    }

    /// The remote id of the template an item of `kind` refers to.
    pub fn template_id(&self, kind: EntityKind, key: &str) -> Option<EntityId> {
        let template_kind = kind.template_kind()?;
        let template_key = self.get(kind)?.get(key)?.template()?;
        self.id_of(template_kind, template_key)
    }
}
