//! Recipe index and artifact store contracts for Mortar.
//!
//! This crate defines the collaborator seams the resolution engine depends
//! on: looking up available versions and recipe metadata, and checking for
//! prebuilt artifacts. Transport, retries and authentication live behind
//! these traits, never in the engine.

pub mod cache;
pub mod memory;
pub mod recipe;

// Re-export main types
pub use cache::{CacheStats, CachingIndex};
pub use memory::{InMemoryIndex, InMemoryStore};
pub use recipe::{OptionDecl, Recipe};

use mortar_core::error::MortarResult;
use mortar_core::types::{Reference, Version};
use mortar_core::PackageId;

/// Source of recipe metadata, keyed by name and concrete reference
///
/// The only suspension point of a resolution. Implementations must be
/// idempotent: the engine may ask for the same reference more than once.
/// Failures must carry the requesting name or reference; they are surfaced
/// to the caller, never treated as "no candidates".
#[allow(async_fn_in_trait)]
pub trait RecipeIndex {
    /// Available versions of a package, in ascending order
    async fn versions(&self, name: &str) -> MortarResult<Vec<Version>>;

    /// Recipe metadata for one concrete reference
    async fn recipe(&self, reference: &Reference) -> MortarResult<Recipe>;
}

/// Prebuilt-artifact presence check, consulted after package ids are computed
pub trait ArtifactStore {
    fn contains(&self, id: &PackageId) -> bool;
}
