//! # mortar-core
//!
//! Core types and utilities shared across the Mortar workspace.
//!
//! This crate provides:
//! - `Version`, `VersionRange` and `VersionExpr` with one total ordering
//! - `Reference` and `RequirementSpec` value types
//! - `SettingsView`/`OptionsView`/`Profile` for per-node configuration
//! - `PackageId` and `IdHasher` for binary-identity hashing
//! - `MortarError` for unified error handling
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: core data types (references, versions, requirements, settings)
//! - `error`: error types and result aliases
//! - `hash`: package-identity hashing

pub mod error;
pub mod hash;
pub mod types;

// Re-export commonly used types
pub use error::{MortarError, MortarResult};
pub use hash::{IdHasher, PackageId};
pub use types::{
    Profile, Reference, RequirementSpec, SettingsView, OptionsView, Version, VersionExpr,
    VersionRange,
};
