//! Recipe metadata served by a recipe index.
//!
//! A `Recipe` is what the index knows about one concrete package version:
//! its requirements, the settings axes it consumes, its option schema and
//! its package-id policy. Validated at resolution time, never trusted at
//! use time.

use indexmap::IndexMap;

use mortar_core::types::{Reference, RequirementSpec};

/// One declared option: default value, allowed choices, identity policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDecl {
    /// Value used when nothing assigns the option
    pub default: String,
    /// Allowed values; `None` means free-form
    pub choices: Option<Vec<String>>,
    /// Folded into the package id (true for all but cosmetic knobs)
    pub affects_id: bool,
}

/// Everything the index knows about one concrete package version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    /// The concrete reference this recipe describes
    pub reference: Reference,
    /// Requirements in declaration order (edge order matters for identity)
    pub requirements: Vec<RequirementSpec>,
    /// Setting keys this recipe consumes
    pub settings_schema: Vec<String>,
    /// Declared options keyed by name, in declaration order
    pub options_schema: IndexMap<String, OptionDecl>,
    /// Settings excluded from the package id (recipe marked them "none")
    pub id_ignored_settings: Vec<String>,
}

impl Recipe {
    /// Create an empty recipe for a reference
    pub fn new(reference: Reference) -> Self {
        Self {
            reference,
            requirements: Vec::new(),
            settings_schema: Vec::new(),
            options_schema: IndexMap::new(),
            id_ignored_settings: Vec::new(),
        }
    }

    /// Add a requirement (declaration order is preserved)
    pub fn requires(mut self, spec: RequirementSpec) -> Self {
        self.requirements.push(spec);
        self
    }

    /// Declare a consumed setting axis
    pub fn setting(mut self, key: impl Into<String>) -> Self {
        self.settings_schema.push(key.into());
        self
    }

    /// Declare the usual compiled-package axes in one call
    pub fn default_settings(self) -> Self {
        self.setting("build_type").setting("arch").setting("compiler")
    }

    /// Declare an identity-affecting option
    pub fn option(
        mut self,
        name: impl Into<String>,
        default: impl Into<String>,
        choices: &[&str],
    ) -> Self {
        self.options_schema.insert(
            name.into(),
            OptionDecl {
                default: default.into(),
                choices: if choices.is_empty() {
                    None
                } else {
                    Some(choices.iter().map(|c| c.to_string()).collect())
                },
                affects_id: true,
            },
        );
        self
    }

    /// Declare an option that never affects the package id
    pub fn cosmetic_option(
        mut self,
        name: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        self.options_schema.insert(
            name.into(),
            OptionDecl {
                default: default.into(),
                choices: None,
                affects_id: false,
            },
        );
        self
    }

    /// Exclude a consumed setting from the package id
    pub fn ignore_setting_for_id(mut self, key: impl Into<String>) -> Self {
        self.id_ignored_settings.push(key.into());
        self
    }

    /// Check an assigned value against the declared choices
    pub fn validate_option(&self, name: &str, value: &str) -> Result<(), String> {
        let Some(decl) = self.options_schema.get(name) else {
            return Err(format!("option '{name}' is not declared by the recipe"));
        };
        if let Some(choices) = &decl.choices {
            if !choices.iter().any(|c| c == value) {
                return Err(format!(
                    "value '{}' not in allowed choices [{}]",
                    value,
                    choices.join(", ")
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(s: &str) -> Reference {
        s.parse().unwrap()
    }

    #[test]
    fn test_builder_preserves_declaration_order() {
        let recipe = Recipe::new(reference("libfoo/1.0"))
            .requires(RequirementSpec::parse("zlib/1.2.11").unwrap())
            .requires(RequirementSpec::parse("openssl/[>=3.0]").unwrap())
            .default_settings()
            .option("shared", "false", &["true", "false"])
            .cosmetic_option("verbose", "off");

        let req_names: Vec<_> = recipe.requirements.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(req_names, vec!["zlib", "openssl"]);
        let opt_names: Vec<_> = recipe.options_schema.keys().map(String::as_str).collect();
        assert_eq!(opt_names, vec!["shared", "verbose"]);
        assert!(!recipe.options_schema["verbose"].affects_id);
    }

    #[test]
    fn test_option_validation() {
        let recipe = Recipe::new(reference("libfoo/1.0"))
            .option("shared", "false", &["true", "false"])
            .option("mode", "fast", &[]);

        assert!(recipe.validate_option("shared", "true").is_ok());
        assert!(recipe.validate_option("shared", "maybe").is_err());
        assert!(recipe.validate_option("mode", "anything").is_ok()); // free-form
        assert!(recipe.validate_option("unknown", "x").is_err());
    }
}
