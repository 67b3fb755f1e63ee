//! Per-node settings and options views, plus the resolution profile.
//!
//! Settings are global toolchain axes (`build_type`, `arch`, `compiler`)
//! scoped down to each node; options are package-specific knobs declared by
//! the recipe. Both are ordered mappings; identity filtering decides what
//! folds into a node's package id.

use std::collections::BTreeSet;

use indexmap::IndexMap;

/// Setting keys propagated from the profile to every node by default
pub const DEFAULT_PROPAGATED_SETTINGS: &[&str] =
    &["build_type", "arch", "compiler", "compiler.version"];

/// Ordered settings scoped to one node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsView {
    values: IndexMap<String, String>,
    id_ignored: BTreeSet<String>,
}

impl SettingsView {
    /// Create a view from key/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            id_ignored: BTreeSet::new(),
        }
    }

    /// Exclude keys from identity hashing (settings marked "none" by the recipe)
    pub fn ignore_for_id<I: IntoIterator<Item = String>>(&mut self, keys: I) {
        self.id_ignored.extend(keys);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// All entries, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Identity-affecting entries, sorted by key for stable hashing
    pub fn identity_iter(&self) -> impl Iterator<Item = (&str, &str)> {
        let mut entries: Vec<_> = self
            .values
            .iter()
            .filter(|(k, _)| !self.id_ignored.contains(k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        entries.sort_unstable_by_key(|(k, _)| *k);
        entries.into_iter()
    }
}

/// One resolved option value on a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionValue {
    pub value: String,
    /// Folded into the package id unless the recipe declares otherwise
    pub affects_id: bool,
}

/// Ordered package-specific options scoped to one node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionsView {
    values: IndexMap<String, OptionValue>,
}

impl OptionsView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option value, replacing any previous assignment
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>, affects_id: bool) {
        self.values.insert(
            key.into(),
            OptionValue {
                value: value.into(),
                affects_id,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|v| v.value.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All entries, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.value.as_str()))
    }

    /// Identity-affecting entries, sorted by key for stable hashing
    pub fn identity_iter(&self) -> impl Iterator<Item = (&str, &str)> {
        let mut entries: Vec<_> = self
            .values
            .iter()
            .filter(|(_, v)| v.affects_id)
            .map(|(k, v)| (k.as_str(), v.value.as_str()))
            .collect();
        entries.sort_unstable_by_key(|(k, _)| *k);
        entries.into_iter()
    }
}

/// Immutable resolution-wide configuration passed into the graph builder
///
/// Holds the global settings (the root's toolchain axes) and per-package
/// option assignments keyed `package:option`. Never ambient: callers build
/// one and hand it in.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    settings: IndexMap<String, String>,
    options: IndexMap<String, String>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a global setting axis
    pub fn setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Assign an option for one package (`package`, `option`, `value`)
    pub fn package_option(
        mut self,
        package: impl Into<String>,
        option: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.options
            .insert(format!("{}:{}", package.into(), option.into()), value.into());
        self
    }

    /// The full global settings, for the root node
    pub fn root_settings(&self) -> SettingsView {
        SettingsView::from_pairs(self.settings.iter().map(|(k, v)| (k.clone(), v.clone())))
    }

    /// Settings for a child node: the profile filtered to the keys the
    /// recipe declares, intersected with the propagated set (defaults plus
    /// any extra keys the requiring edge declares).
    pub fn settings_for(&self, schema: &[String], extra: Option<&[String]>) -> SettingsView {
        let propagated = |key: &str| {
            DEFAULT_PROPAGATED_SETTINGS.contains(&key)
                || extra.is_some_and(|keys| keys.iter().any(|k| k == key))
        };
        SettingsView::from_pairs(schema.iter().filter_map(|key| {
            if !propagated(key) {
                return None;
            }
            self.settings
                .get(key)
                .map(|value| (key.clone(), value.clone()))
        }))
    }

    /// Option assigned to one package in this profile, if any
    pub fn option_for(&self, package: &str, option: &str) -> Option<&str> {
        self.options
            .get(&format!("{package}:{option}"))
            .map(String::as_str)
    }

    /// All option assignments targeting one package, in declaration order
    pub fn options_for<'a>(&'a self, package: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        let prefix = format!("{package}:");
        self.options.iter().filter_map(move |(key, value)| {
            key.strip_prefix(&prefix).map(|opt| (opt, value.as_str()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_identity_filter() {
        let mut view = SettingsView::from_pairs([
            ("compiler", "gcc"),
            ("build_type", "Release"),
            ("arch", "x86_64"),
        ]);
        view.ignore_for_id(["build_type".to_string()]);

        let keys: Vec<_> = view.identity_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["arch", "compiler"]); // sorted, ignored key dropped
        assert_eq!(view.len(), 3); // full view untouched
    }

    #[test]
    fn test_options_identity_filter() {
        let mut opts = OptionsView::new();
        opts.set("shared", "true", true);
        opts.set("fPIC", "true", true);
        opts.set("verbose_makefile", "off", false);

        let keys: Vec<_> = opts.identity_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["fPIC", "shared"]);
        assert_eq!(opts.get("verbose_makefile"), Some("off"));
    }

    #[test]
    fn test_profile_propagation_defaults() {
        let profile = Profile::new()
            .setting("build_type", "Release")
            .setting("arch", "armv8")
            .setting("compiler", "clang")
            .setting("compiler.cppstd", "20");

        let schema = vec![
            "build_type".to_string(),
            "arch".to_string(),
            "compiler.cppstd".to_string(),
        ];
        let view = profile.settings_for(&schema, None);
        assert_eq!(view.get("build_type"), Some("Release"));
        assert_eq!(view.get("arch"), Some("armv8"));
        // cppstd is declared by the recipe but not in the propagated set
        assert_eq!(view.get("compiler.cppstd"), None);

        let extra = vec!["compiler.cppstd".to_string()];
        let widened = profile.settings_for(&schema, Some(&extra));
        assert_eq!(widened.get("compiler.cppstd"), Some("20"));
    }

    #[test]
    fn test_profile_package_options() {
        let profile = Profile::new()
            .package_option("zlib", "shared", "true")
            .package_option("zlib", "fPIC", "false")
            .package_option("openssl", "shared", "false");

        assert_eq!(profile.option_for("zlib", "shared"), Some("true"));
        assert_eq!(profile.option_for("zlib", "missing"), None);
        let zlib: Vec<_> = profile.options_for("zlib").collect();
        assert_eq!(zlib, vec![("shared", "true"), ("fPIC", "false")]);
    }
}
