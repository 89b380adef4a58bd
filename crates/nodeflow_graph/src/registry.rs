// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of node delegate factories.

use crate::delegate::NodeDelegateModel;
use indexmap::IndexMap;

/// Factory producing a fresh delegate
pub type DelegateFactory = Box<dyn Fn() -> Box<dyn NodeDelegateModel>>;

struct RegistryEntry {
    category: String,
    factory: DelegateFactory,
}

/// Node types available to a data-flow graph, keyed by delegate name
#[derive(Default)]
pub struct NodeDelegateModelRegistry {
    entries: IndexMap<String, RegistryEntry>,
}

impl NodeDelegateModelRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a delegate type under its own name
    pub fn register_model<T>(&mut self, category: impl Into<String>)
    where
        T: NodeDelegateModel + Default + 'static,
    {
        self.register_factory(category, || Box::new(T::default()));
    }

    /// Register a factory under the name of the delegate it produces.
    ///
    /// Registering a name twice replaces the earlier factory.
    pub fn register_factory<F>(&mut self, category: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn NodeDelegateModel> + 'static,
    {
        let name = factory().name();
        let category = category.into();
        tracing::trace!("Registered node type '{}' in '{}'", name, category);
        self.entries.insert(
            name,
            RegistryEntry {
                category,
                factory: Box::new(factory),
            },
        );
    }

    /// Instantiate a delegate by name
    pub fn create(&self, name: &str) -> Option<Box<dyn NodeDelegateModel>> {
        self.entries.get(name).map(|entry| (entry.factory)())
    }

    /// Whether a name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, in registration order
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Category of a registered name
    pub fn category_of(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|entry| entry.category.as_str())
    }

    /// Distinct categories, in first-registration order
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for entry in self.entries.values() {
            if !categories.contains(&entry.category.as_str()) {
                categories.push(&entry.category);
            }
        }
        categories
    }

    /// Names registered in a category
    pub fn models_in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(_, entry)| entry.category == category)
            .map(|(name, _)| name.as_str())
    }

    /// Number of registered names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for NodeDelegateModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDelegateModelRegistry")
            .field("models", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
