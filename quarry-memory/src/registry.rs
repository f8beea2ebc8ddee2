//! Shared in-memory namespaces.
//!
//! A [`NamespaceRegistry`] owns every namespace that several [`InMemoryStore`]s may
//! share. It is an ordinary value: create one, hand clones of it to the stores that
//! should see the same data, and drop it when done. Namespaces are created the first
//! time a store asks for them and live as long as the registry or any store holding
//! them.
//!
//! [`InMemoryStore`]: crate::store::InMemoryStore

use bson::Document;
use log::debug;
use mea::rwlock::RwLock;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

/// The documents of one namespace, keyed by identifier.
pub type Namespace = Arc<RwLock<BTreeMap<String, Document>>>;

/// Registry of named, shared document maps.
///
/// Cloning a registry yields another handle to the same namespaces.
#[derive(Default, Clone, Debug)]
pub struct NamespaceRegistry {
    namespaces: Arc<RwLock<HashMap<String, Namespace>>>,
}

impl NamespaceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the namespace called `name`, creating it on first use.
    pub async fn namespace(&self, name: &str) -> Namespace {
        if let Some(namespace) = self.namespaces.read().await.get(name) {
            return namespace.clone();
        }

        let mut namespaces = self.namespaces.write().await;
        namespaces
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("created namespace {name}");
                Namespace::default()
            })
            .clone()
    }

    /// Lists the names of every namespace created so far.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Detaches a namespace from the registry.
    ///
    /// Stores already holding the namespace keep their data; the next request for
    /// `name` starts empty. Returns `false` if no such namespace existed.
    pub async fn drop_namespace(&self, name: &str) -> bool {
        self.namespaces.write().await.remove(name).is_some()
    }
}
