//! In-memory index of installed extensions across repositories.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use tracing::debug;

use crate::config::RepositoryEntry;
use crate::error::Result;
use crate::extension::ExtensionUnit;
use crate::fs::list_subdirs;
use crate::loader::ExtensionLoader;
use crate::types::{DEFAULT_COLLECTION, QualifiedName};

pub type Collection = BTreeMap<String, Rc<ExtensionUnit>>;

/// `collection -> name -> unit`, where each unit comes from the first
/// repository in search order that provides it.
#[derive(Debug, Clone)]
pub struct CollectionIndex {
    collections: BTreeMap<String, Collection>,
}

impl Default for CollectionIndex {
    fn default() -> Self {
        let mut collections = BTreeMap::new();
        collections.insert(DEFAULT_COLLECTION.to_string(), Collection::new());
        Self { collections }
    }
}

fn visible(name: &str) -> bool {
    !name.starts_with('.')
}

impl CollectionIndex {
    /// Walk every repository in order and index what it provides.
    ///
    /// Missing repository or collection directories contribute nothing.
    pub fn build(
        repositories: &[RepositoryEntry],
        loader: &Rc<dyn ExtensionLoader>,
    ) -> Result<Self> {
        let roots: Vec<_> = repositories.iter().map(|r| (r, r.path())).collect();

        let mut collection_names = BTreeSet::new();
        collection_names.insert(DEFAULT_COLLECTION.to_string());
        for (_, root) in &roots {
            collection_names.extend(list_subdirs(root)?.into_iter().filter(|n| visible(n)));
        }

        let mut index = Self::default();
        for collection in collection_names {
            let entries = index.collections.entry(collection.clone()).or_default();
            for (repository, root) in &roots {
                for name in list_subdirs(&root.join(&collection))? {
                    if !visible(&name) || entries.contains_key(&name) {
                        continue;
                    }
                    let unit = ExtensionUnit::new(
                        &repository.name,
                        root,
                        QualifiedName::new(&collection, &name),
                        Rc::clone(loader),
                    );
                    entries.insert(name, Rc::new(unit));
                }
            }
        }

        debug!(
            repositories = repositories.len(),
            collections = index.collections.len(),
            extensions = index.len(),
            "Rebuilt collection index"
        );
        Ok(index)
    }

    pub fn get(&self, name: &QualifiedName) -> Option<&Rc<ExtensionUnit>> {
        self.collections.get(&name.collection)?.get(&name.name)
    }

    pub fn contains(&self, name: &QualifiedName) -> bool {
        self.get(name).is_some()
    }

    /// Drop an entry without touching disk.
    pub fn remove(&mut self, name: &QualifiedName) -> Option<Rc<ExtensionUnit>> {
        self.collections.get_mut(&name.collection)?.remove(&name.name)
    }

    pub fn collection(&self, collection: &str) -> Option<&Collection> {
        self.collections.get(collection)
    }

    /// Collections in name order, the default collection included.
    pub fn collections(&self) -> impl Iterator<Item = (&str, &Collection)> {
        self.collections.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn units(&self) -> impl Iterator<Item = &Rc<ExtensionUnit>> {
        self.collections.values().flat_map(|c| c.values())
    }

    pub fn len(&self) -> usize {
        self.collections.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
