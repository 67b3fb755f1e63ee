//! Error types and result aliases for Mortar operations.
//!
//! Provides a unified error type covering every failure mode of graph
//! resolution with actionable, fully attributed error messages.

use thiserror::Error;

/// Unified error type for all Mortar operations
#[derive(Error, Debug)]
pub enum MortarError {
    // Requirement parsing errors
    #[error("Malformed reference '{input}': {reason}")]
    MalformedReference { input: String, reason: String },

    // Version solving errors
    #[error("No version of '{name}' satisfies '{range}'. Available: [{available}]")]
    NoMatch {
        name: String,
        range: String,
        available: String,
    },

    // Graph resolution errors
    #[error(
        "Version conflict on '{name}': {first_path} resolved {first_version}, \
         but {second_path} requires {second_version}"
    )]
    VersionConflict {
        name: String,
        first_version: String,
        first_path: String,
        second_version: String,
        second_path: String,
    },

    #[error("Circular dependency detected: {cycle}")]
    CyclicDependency { cycle: String },

    #[error("Invalid option '{option}' for package '{package}': {reason}")]
    InvalidOption {
        package: String,
        option: String,
        reason: String,
    },

    // Collaborator errors
    #[error("Recipe lookup failed for '{reference}': {reason}")]
    RecipeLookup { reference: String, reason: String },

    // Internal invariant violations
    #[error("Corrupt graph: {message}")]
    CorruptGraph { message: String },

    // Lock snapshot errors
    #[error("Failed to read lock snapshot: {message}")]
    LockSnapshot { message: String },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for Mortar operations
pub type MortarResult<T> = Result<T, MortarError>;

impl MortarError {
    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// Check if this error came from a collaborator rather than the graph itself
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(self, MortarError::RecipeLookup { .. } | MortarError::Io { .. })
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            MortarError::MalformedReference { .. } => {
                Some("References use the form name/version@user/channel, ranges use name/[>=1.0,<2.0]")
            },
            MortarError::NoMatch { .. } => {
                Some("Relax the version range or publish a matching version to the index")
            },
            MortarError::VersionConflict { .. } => {
                Some("Add an override requirement near the root to force a single version")
            },
            MortarError::CyclicDependency { .. } => {
                Some("Remove circular requirements by restructuring your packages")
            },
            MortarError::RecipeLookup { .. } => {
                Some("Check that the package is published to the configured recipe index")
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_attribution() {
        let err = MortarError::VersionConflict {
            name: "zlib".to_string(),
            first_version: "1.2.11".to_string(),
            first_path: "root -> libb/1.0".to_string(),
            second_version: "1.3.0".to_string(),
            second_path: "root -> libc/1.0".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("libb/1.0"));
        assert!(msg.contains("libc/1.0"));
        assert!(msg.contains("zlib"));
    }

    #[test]
    fn test_suggestions() {
        let err = MortarError::CyclicDependency {
            cycle: "a/1.0 -> b/1.0 -> a/1.0".to_string(),
        };
        assert!(err.suggestion().is_some());

        let err = MortarError::CorruptGraph {
            message: "node 3 missing".to_string(),
        };
        assert!(err.suggestion().is_none());
    }

    #[test]
    fn test_collaborator_failures() {
        let err = MortarError::RecipeLookup {
            reference: "zlib/1.2.11".to_string(),
            reason: "index unreachable".to_string(),
        };
        assert!(err.is_collaborator_failure());
        assert!(err.to_string().contains("zlib/1.2.11"));
    }
}
