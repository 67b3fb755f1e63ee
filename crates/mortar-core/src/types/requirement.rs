//! Requirement specifications attached to graph edges.
//!
//! A `RequirementSpec` describes how one consumer requires one dependency.
//! It lives on the edge, not the node: the same package can be required
//! differently by different consumers.

use indexmap::IndexMap;

use crate::error::{MortarError, MortarResult};
use crate::types::reference::Reference;
use crate::types::version::{Version, VersionExpr};

/// How one consumer requires one dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementSpec {
    /// Target package name
    pub name: String,
    /// Concrete pin or version range
    pub expr: VersionExpr,
    /// Target user namespace, if any
    pub user: Option<String>,
    /// Target channel, if any
    pub channel: Option<String>,
    /// Needed only to build the consumer, resolved in a separate context
    pub is_build_require: bool,
    /// Resolved into the graph but hidden from the consumer's dependents
    pub is_private: bool,
    /// Carries an explicit version that wins downstream conflicts
    pub override_allowed: bool,
    /// Fold this build-require's package id into the consumer's id
    pub embed_in_package_id: bool,
    /// Option values assigned to the target
    pub options: IndexMap<String, String>,
    /// Extra setting keys propagated to the target beyond the defaults
    pub propagate_settings: Option<Vec<String>>,
    /// Let `options` flow through the target's whole subtree
    pub propagate_options: bool,
}

impl RequirementSpec {
    /// Create a regular requirement from name and version expression
    pub fn new(name: impl Into<String>, expr: VersionExpr) -> Self {
        Self {
            name: name.into(),
            expr,
            user: None,
            channel: None,
            is_build_require: false,
            is_private: false,
            override_allowed: false,
            embed_in_package_id: false,
            options: IndexMap::new(),
            propagate_settings: None,
            propagate_options: false,
        }
    }

    /// Parse a requirement string such as `zlib/1.2.11@corp/stable` or
    /// `zlib/[>=1.2,<2.0]`
    pub fn parse(s: &str) -> MortarResult<Self> {
        let input = s.trim();
        let malformed = |reason: &str| MortarError::MalformedReference {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (body, namespace) = match input.rsplit_once('@') {
            Some((body, ns)) => (body, Some(ns)),
            None => (input, None),
        };

        let (name, expr_token) = body
            .split_once('/')
            .ok_or_else(|| malformed("expected name/version"))?;
        if name.is_empty() {
            return Err(malformed("missing package name"));
        }
        let expr = VersionExpr::parse(expr_token)?;

        let mut spec = Self::new(name, expr);
        if let Some(ns) = namespace {
            let (user, channel) = ns
                .split_once('/')
                .ok_or_else(|| malformed("expected @user/channel"))?;
            if user.is_empty() || channel.is_empty() {
                return Err(malformed("invalid user or channel"));
            }
            spec.user = Some(user.to_string());
            spec.channel = Some(channel.to_string());
        }
        Ok(spec)
    }

    /// Mark as a build-time requirement
    pub fn build_require(mut self) -> Self {
        self.is_build_require = true;
        self
    }

    /// Mark as private to the consumer
    pub fn private(mut self) -> Self {
        self.is_private = true;
        self
    }

    /// Mark as an override: the pinned version wins downstream conflicts
    pub fn as_override(mut self) -> Self {
        self.override_allowed = true;
        self
    }

    /// Fold the build tool's exact binary id into the consumer's id
    pub fn embedded(mut self) -> Self {
        self.embed_in_package_id = true;
        self
    }

    /// Assign an option value on the target
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Propagate the assigned options through the target's subtree
    pub fn propagating_options(mut self) -> Self {
        self.propagate_options = true;
        self
    }

    /// Propagate extra setting keys to the target beyond the defaults
    pub fn propagating_settings(mut self, keys: &[&str]) -> Self {
        self.propagate_settings = Some(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    /// The concrete reference this spec designates at a chosen version
    pub fn target(&self, version: Version) -> Reference {
        Reference {
            name: self.name.clone(),
            version,
            user: self.user.clone(),
            channel: self.channel.clone(),
        }
    }

    /// Render the requirement the way the user wrote it
    pub fn display_target(&self) -> String {
        match (&self.user, &self.channel) {
            (Some(u), Some(c)) => format!("{}/{}@{}/{}", self.name, self.expr, u, c),
            _ => format!("{}/{}", self.name, self.expr),
        }
    }
}
