//! Core data types for Mortar graph resolution.
//!
//! This module provides the fundamental value types used throughout the
//! Mortar workspace:
//! - Version and range types with one total ordering
//! - Concrete package references
//! - Requirement specifications (edge data)
//! - Settings/options views and the resolution profile

pub mod reference;
pub mod requirement;
pub mod settings;
pub mod version;

// Re-export all public types
pub use reference::Reference;
pub use requirement::RequirementSpec;
pub use settings::{
    OptionValue, OptionsView, Profile, SettingsView, DEFAULT_PROPAGATED_SETTINGS,
};
pub use version::{Comparator, Op, Segment, Version, VersionExpr, VersionRange};
