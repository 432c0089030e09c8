//! Compile options consumed by the semantic core.
//!
//! Options start from the defaults of a [`SourceLevel`] and can be overridden
//! from the `[language]` table of a TOML file:
//!
//! ```toml
//! [language]
//! source = "7"
//! string_switch = false
//! lint = ["unchecked"]
//! ```

use serde::{Deserialize, Serialize};

use crate::diagnostic::LintCategory;
use crate::error::CompileError;

/// Language level the defaults are derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceLevel {
    #[serde(rename = "1.4")]
    V1_4,
    #[serde(rename = "5")]
    V5,
    #[serde(rename = "6")]
    V6,
    #[serde(rename = "7")]
    V7,
}

impl SourceLevel {
    /// The level as written on a command line, e.g. `"1.4"`.
    pub fn name(self) -> &'static str {
        match self {
            SourceLevel::V1_4 => "1.4",
            SourceLevel::V5 => "5",
            SourceLevel::V6 => "6",
            SourceLevel::V7 => "7",
        }
    }
}

impl Default for SourceLevel {
    fn default() -> Self {
        SourceLevel::V7
    }
}

/// Feature switches and target decisions for one compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOptions {
    pub source: SourceLevel,
    /// Type variables, parameterized types, erasure and bridges.
    pub generics: bool,
    /// Variable-arity methods (third resolution phase).
    pub varargs: bool,
    /// Boxing and unboxing conversions (second resolution phase).
    pub boxing: bool,
    pub enums: bool,
    pub string_switch: bool,
    pub covariant_returns: bool,
    /// `new C<>()` type argument inference.
    pub diamond: bool,
    /// Loosens constructor-body and abstract-method-body checks for legacy
    /// class libraries.
    pub relaxed: bool,
    /// Warn when a field is used before its declaration in an initializer.
    pub warn_forward_ref: bool,
    /// Store outer-this and captured-variable fields before the super
    /// constructor call instead of after it.
    pub outer_this_before_super: bool,
    /// Emit bridges for public methods inherited from a non-public class into
    /// a public subclass.
    pub public_bridges_from_hidden_supertypes: bool,
    /// Enabled lint categories.
    pub lint: Vec<LintCategory>,
}

impl CompileOptions {
    /// Defaults for a language level.
    pub fn for_source(source: SourceLevel) -> Self {
        let modern = source >= SourceLevel::V5;
        CompileOptions {
            source,
            generics: modern,
            varargs: modern,
            boxing: modern,
            enums: modern,
            string_switch: source >= SourceLevel::V7,
            covariant_returns: modern,
            diamond: source >= SourceLevel::V7,
            relaxed: false,
            warn_forward_ref: false,
            outer_this_before_super: modern,
            public_bridges_from_hidden_supertypes: false,
            lint: Vec::new(),
        }
    }

    /// Parse options from the `[language]` table of a TOML document.
    ///
    /// Keys that are absent fall back to the defaults of the `source` level
    /// given in the same table (or the latest level).
    pub fn from_toml_str(content: &str) -> Result<CompileOptions, CompileError> {
        let file: OptionsFile = toml::from_str(content)
            .map_err(|e| CompileError::Config(format!("failed to parse options: {}", e)))?;
        Ok(file.language.unwrap_or_default().resolve())
    }

    pub fn lint_enabled(&self, category: LintCategory) -> bool {
        self.lint.contains(&category)
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions::for_source(SourceLevel::default())
    }
}

#[derive(Debug, Deserialize)]
struct OptionsFile {
    #[serde(default)]
    language: Option<LanguageTable>,
}

/// The `[language]` table, every key optional.
#[derive(Debug, Default, Deserialize)]
struct LanguageTable {
    source: Option<SourceLevel>,
    generics: Option<bool>,
    varargs: Option<bool>,
    boxing: Option<bool>,
    enums: Option<bool>,
    string_switch: Option<bool>,
    covariant_returns: Option<bool>,
    diamond: Option<bool>,
    relaxed: Option<bool>,
    warn_forward_ref: Option<bool>,
    outer_this_before_super: Option<bool>,
    public_bridges_from_hidden_supertypes: Option<bool>,
    #[serde(default)]
    lint: Vec<LintCategory>,
}

impl LanguageTable {
    fn resolve(self) -> CompileOptions {
        let mut opts = CompileOptions::for_source(self.source.unwrap_or_default());
        let overrides = [
            (self.generics, &mut opts.generics),
            (self.varargs, &mut opts.varargs),
            (self.boxing, &mut opts.boxing),
            (self.enums, &mut opts.enums),
            (self.string_switch, &mut opts.string_switch),
            (self.covariant_returns, &mut opts.covariant_returns),
            (self.diamond, &mut opts.diamond),
            (self.relaxed, &mut opts.relaxed),
            (self.warn_forward_ref, &mut opts.warn_forward_ref),
            (self.outer_this_before_super, &mut opts.outer_this_before_super),
            (
                self.public_bridges_from_hidden_supertypes,
                &mut opts.public_bridges_from_hidden_supertypes,
            ),
        ];
        for (value, slot) in overrides {
            if let Some(value) = value {
                *slot = value;
            }
        }
        opts.lint = self.lint;
        opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_level_disables_modern_features() {
        let opts = CompileOptions::for_source(SourceLevel::V1_4);
        assert!(!opts.generics);
        assert!(!opts.boxing);
        assert!(!opts.string_switch);
    }

    #[test]
    fn toml_overrides_source_defaults() {
        let opts = CompileOptions::from_toml_str(
            r#"
[language]
source = "6"
string_switch = true
lint = ["unchecked", "try"]
"#,
        )
        .unwrap();
        assert_eq!(opts.source, SourceLevel::V6);
        assert!(opts.generics);
        assert!(opts.string_switch);
        assert!(!opts.diamond);
        assert!(opts.lint_enabled(LintCategory::Try));
    }

    #[test]
    fn empty_document_gives_latest_defaults() {
        let opts = CompileOptions::from_toml_str("").unwrap();
        assert_eq!(opts, CompileOptions::default());
    }

    #[test]
    fn malformed_document_is_config_error() {
        let err = CompileOptions::from_toml_str("[language]\nsource = 12").unwrap_err();
        assert!(matches!(err, CompileError::Config(_)));
    }
}
