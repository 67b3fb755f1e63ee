//! Memoizing wrapper around any recipe index.
//!
//! Resolution may ask for the same name or reference many times (conflict
//! re-intersection, learned-pin restarts). Lookups are idempotent by
//! contract, so answering repeats from memory is always safe.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use mortar_core::error::MortarResult;
use mortar_core::types::{Reference, Version};

use crate::recipe::Recipe;
use crate::RecipeIndex;

/// Hit/miss counters for a caching index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub version_entries: usize,
    pub recipe_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Caches version lists and recipes from an inner index
///
/// Recipe data is immutable per (name, version), so entries never go stale.
/// Errors are not cached: a failed lookup is retried on the next call.
#[derive(Debug)]
pub struct CachingIndex<I> {
    inner: I,
    versions: DashMap<String, Vec<Version>>,
    recipes: DashMap<Reference, Recipe>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<I> CachingIndex<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            versions: DashMap::new(),
            recipes: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The wrapped index
    pub fn inner(&self) -> &I {
        &self.inner
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            version_entries: self.versions.len(),
            recipe_entries: self.recipes.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drop all cached entries
    pub fn clear(&self) {
        self.versions.clear();
        self.recipes.clear();
    }
}

impl<I: RecipeIndex> RecipeIndex for CachingIndex<I> {
    async fn versions(&self, name: &str) -> MortarResult<Vec<Version>> {
        if let Some(cached) = self.versions.get(name) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let fetched = self.inner.versions(name).await?;
        self.versions.insert(name.to_string(), fetched.clone());
        Ok(fetched)
    }

    async fn recipe(&self, reference: &Reference) -> MortarResult<Recipe> {
        if let Some(cached) = self.recipes.get(reference) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let fetched = self.inner.recipe(reference).await?;
        self.recipes.insert(reference.clone(), fetched.clone());
        Ok(fetched)
    }
}
