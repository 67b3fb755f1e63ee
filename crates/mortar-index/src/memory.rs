//! In-memory recipe index and artifact store.
//!
//! The in-memory index backs tests and embedders that already hold their
//! recipe data; remote indexes implement [`crate::RecipeIndex`] themselves.

use std::collections::BTreeMap;

use dashmap::{DashMap, DashSet};

use mortar_core::error::{MortarError, MortarResult};
use mortar_core::types::{Reference, Version};
use mortar_core::PackageId;

use crate::recipe::Recipe;
use crate::{ArtifactStore, RecipeIndex};

/// Recipe index backed by an in-process map
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    // name -> version -> recipe; BTreeMap keeps versions ordered
    packages: DashMap<String, BTreeMap<Version, Recipe>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a recipe; its reference supplies name and version
    pub fn add(&self, recipe: Recipe) {
        let name = recipe.reference.name.clone();
        let version = recipe.reference.version.clone();
        self.packages
            .entry(name)
            .or_default()
            .insert(version, recipe);
    }

    /// Number of distinct package names
    pub fn package_count(&self) -> usize {
        self.packages.len()
    }
}

impl RecipeIndex for InMemoryIndex {
    async fn versions(&self, name: &str) -> MortarResult<Vec<Version>> {
        let entry = self
            .packages
            .get(name)
            .ok_or_else(|| MortarError::RecipeLookup {
                reference: name.to_string(),
                reason: "package not known to the index".to_string(),
            })?;
        Ok(entry.keys().cloned().collect())
    }

    async fn recipe(&self, reference: &Reference) -> MortarResult<Recipe> {
        self.packages
            .get(&reference.name)
            .and_then(|versions| versions.get(&reference.version).cloned())
            .ok_or_else(|| MortarError::RecipeLookup {
                reference: reference.to_string(),
                reason: "no recipe for this version".to_string(),
            })
    }
}

/// Artifact store backed by an in-process set of package ids
#[derive(Debug, Default)]
pub struct InMemoryStore {
    ids: DashSet<PackageId>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a prebuilt artifact
    pub fn put(&self, id: PackageId) {
        self.ids.insert(id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl ArtifactStore for InMemoryStore {
    fn contains(&self, id: &PackageId) -> bool {
        self.ids.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(r: &str) -> Recipe {
        Recipe::new(r.parse().unwrap())
    }

    #[tokio::test]
    async fn test_versions_are_ordered() {
        let index = InMemoryIndex::new();
        index.add(recipe("zlib/1.2.13"));
        index.add(recipe("zlib/1.2.8"));
        index.add(recipe("zlib/1.3.0"));

        let versions = index.versions("zlib").await.unwrap();
        let rendered: Vec<_> = versions.iter().map(|v| v.to_string()).collect();
        assert_eq!(rendered, vec!["1.2.8", "1.2.13", "1.3.0"]);
    }

    #[tokio::test]
    async fn test_lookup_failures_carry_the_reference() {
        let index = InMemoryIndex::new();
        index.add(recipe("zlib/1.2.13"));

        let err = index.versions("nosuch").await.unwrap_err();
        assert!(err.to_string().contains("nosuch"));

        let missing: Reference = "zlib/9.9.9".parse().unwrap();
        let err = index.recipe(&missing).await.unwrap_err();
        assert!(err.to_string().contains("zlib/9.9.9"));
        assert!(err.is_collaborator_failure());
    }

    #[test]
    fn test_store_membership() {
        let store = InMemoryStore::new();
        let id = PackageId::new([9u8; 32]);
        assert!(!store.contains(&id));
        store.put(id);
        assert!(store.contains(&id));
        assert_eq!(store.len(), 1);
    }
}
