//! Compiler configuration for extensibility (SPEC_FULL.md §9).
//!
//! External projects can extend `schemec` with additional primitives --
//! Scheme names bound to a runtime-provided code label -- without
//! modifying the compiler itself.
//!
//! # Example
//!
//! ```rust,ignore
//! use schemec::CompilerConfig;
//!
//! let config = CompilerConfig::new()
//!     .with_primitive("sqrt", "prim_sqrt")
//!     .with_primitive("string-reverse", "prim_string_reverse");
//! ```

/// One extra primitive: a Scheme name bound to a runtime code-pointer
/// label, exactly like an entry in [`crate::codegen::runtime::PRIMITIVES`].
#[derive(Debug, Clone)]
pub struct ExternalPrimitive {
    /// The name used in Scheme source (e.g. `"sqrt"`).
    pub scheme_name: String,
    /// The NASM label the runtime defines this primitive's code under.
    ///
    /// Must contain only alphanumerics, underscores, and periods --
    /// validated at construction time, since this string is spliced
    /// directly into generated assembly text.
    pub label: String,
}

impl ExternalPrimitive {
    /// Validate that a label is safe to splice into generated assembly.
    ///
    /// Valid labels contain only alphanumerics, underscores, and periods.
    fn validate_label(label: &str) -> Result<(), String> {
        if label.is_empty() {
            return Err("primitive label cannot be empty".to_string());
        }
        for c in label.chars() {
            if !c.is_alphanumeric() && c != '_' && c != '.' {
                return Err(format!(
                    "invalid character '{c}' in primitive label '{label}'; \
                     labels may only contain alphanumerics, underscores, and periods"
                ));
            }
        }
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if `label` contains a character unsafe for a NASM label.
    pub fn new(scheme_name: impl Into<String>, label: impl Into<String>) -> ExternalPrimitive {
        let label = label.into();
        Self::validate_label(&label).expect("invalid primitive label");
        ExternalPrimitive {
            scheme_name: scheme_name.into(),
            label,
        }
    }
}

/// Configuration for one compilation: lets a caller register primitives
/// beyond [`crate::codegen::runtime::PRIMITIVES`] before handing source
/// to [`crate::compile_source`].
#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
    pub external_primitives: Vec<ExternalPrimitive>,
}

impl CompilerConfig {
    pub fn new() -> CompilerConfig {
        CompilerConfig::default()
    }

    /// Register one extra primitive (builder pattern).
    ///
    /// # Panics
    ///
    /// Panics if `label` contains a character unsafe for a NASM label.
    pub fn with_primitive(mut self, scheme_name: impl Into<String>, label: impl Into<String>) -> Self {
        self.external_primitives
            .push(ExternalPrimitive::new(scheme_name, label));
        self
    }

    /// The Scheme names of every registered external primitive.
    pub fn external_names(&self) -> Vec<&str> {
        self.external_primitives
            .iter()
            .map(|p| p.scheme_name.as_str())
            .collect()
    }

    /// `(name, label)` pairs, in the shape [`crate::codegen::runtime::PRIMITIVES`] uses.
    pub fn as_pairs(&self) -> Vec<(&str, &str)> {
        self.external_primitives
            .iter()
            .map(|p| (p.scheme_name.as_str(), p.label.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_primitive_new_keeps_name_and_label() {
        let p = ExternalPrimitive::new("sqrt", "prim_sqrt");
        assert_eq!(p.scheme_name, "sqrt");
        assert_eq!(p.label, "prim_sqrt");
    }

    #[test]
    fn config_builder_accumulates_primitives() {
        let config = CompilerConfig::new()
            .with_primitive("sqrt", "prim_sqrt")
            .with_primitive("string-reverse", "prim_string_reverse");
        assert_eq!(config.external_primitives.len(), 2);
        assert_eq!(config.external_names(), vec!["sqrt", "string-reverse"]);
    }

    #[test]
    fn label_validation_accepts_alphanumerics_underscore_and_period() {
        let _ = ExternalPrimitive::new("a", "valid_label.123");
    }

    #[test]
    #[should_panic(expected = "invalid primitive label")]
    fn label_validation_rejects_hyphen() {
        let _ = ExternalPrimitive::new("a", "invalid-label");
    }

    #[test]
    #[should_panic(expected = "invalid primitive label")]
    fn label_validation_rejects_empty() {
        let _ = ExternalPrimitive::new("a", "");
    }
}
