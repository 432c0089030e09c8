//! Structured diagnostics and the diagnostic log.
//!
//! Every phase of the core reports problems by pushing a [`Diagnostic`] into
//! a [`Log`]. A diagnostic is data, not text: a span, a severity, a stable
//! dotted message key and pre-rendered arguments. Rendering to text lives in
//! `cinder-typeck::diagnostics`.

use std::fmt;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::span::Span;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

/// Optional warning categories that can be switched on and off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LintCategory {
    /// Unchecked conversions, mostly member access through raw types.
    Unchecked,
    /// Suspicious try-with-resources resources.
    Try,
    /// Redundant casts.
    Cast,
}

impl LintCategory {
    pub fn name(self) -> &'static str {
        match self {
            LintCategory::Unchecked => "unchecked",
            LintCategory::Try => "try",
            LintCategory::Cast => "cast",
        }
    }
}

/// A single reported problem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub span: Span,
    pub severity: Severity,
    /// Stable message key, e.g. `"cant.resolve"`.
    pub key: &'static str,
    /// Message arguments, already rendered to text.
    pub args: Vec<String>,
    /// Lint category for warnings that belong to one.
    pub lint: Option<LintCategory>,
}

impl Diagnostic {
    pub fn error(span: Span, key: &'static str, args: Vec<String>) -> Self {
        Diagnostic { span, severity: Severity::Error, key, args, lint: None }
    }

    pub fn warning(span: Span, key: &'static str, args: Vec<String>) -> Self {
        Diagnostic { span, severity: Severity::Warning, key, args, lint: None }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        if !self.args.is_empty() {
            write!(f, ": {}", self.args.join(", "))?;
        }
        Ok(())
    }
}

/// The diagnostic collaborator.
///
/// Collects diagnostics in report order. Only one error is kept per source
/// position, so a failing subtree that is revisited cannot flood the log.
#[derive(Debug, Default)]
pub struct Log {
    diagnostics: Vec<Diagnostic>,
    /// Positions that already carry an error.
    error_positions: FxHashSet<Span>,
    /// Enabled lint categories.
    lint: FxHashSet<LintCategory>,
    /// Nesting depth of "deferred" mode, where nothing is recorded.
    muted: u32,
}

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log with the given lint categories enabled.
    pub fn with_lint(lint: impl IntoIterator<Item = LintCategory>) -> Self {
        Log { lint: lint.into_iter().collect(), ..Self::default() }
    }

    /// Report an error unless one was already reported at the same position.
    pub fn error(&mut self, span: Span, key: &'static str, args: Vec<String>) {
        self.report(Diagnostic::error(span, key, args));
    }

    pub fn warning(&mut self, span: Span, key: &'static str, args: Vec<String>) {
        self.report(Diagnostic::warning(span, key, args));
    }

    /// Report a warning that belongs to a lint category. Dropped when the
    /// category is not enabled.
    pub fn lint(&mut self, category: LintCategory, span: Span, key: &'static str, args: Vec<String>) {
        if !self.lint.contains(&category) {
            return;
        }
        let mut diag = Diagnostic::warning(span, key, args);
        diag.lint = Some(category);
        self.report(diag);
    }

    pub fn is_lint_enabled(&self, category: LintCategory) -> bool {
        self.lint.contains(&category)
    }

    pub fn report(&mut self, diag: Diagnostic) {
        if self.muted > 0 {
            return;
        }
        if diag.is_error() && !self.error_positions.insert(diag.span) {
            return;
        }
        self.diagnostics.push(diag);
    }

    /// Run `f` with reporting switched off. Used for speculative checks.
    pub fn muted<R>(&mut self, f: impl FnOnce(&mut Log) -> R) -> R {
        self.muted += 1;
        let result = f(self);
        self.muted -= 1;
        result
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Drain all collected diagnostics.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        self.error_positions.clear();
        std::mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_error_per_position() {
        let mut log = Log::new();
        log.error(Span::new(3, 5), "cant.resolve", vec!["x".into()]);
        log.error(Span::new(3, 5), "incompatible.types", vec![]);
        log.error(Span::new(6, 7), "cant.resolve", vec!["y".into()]);
        assert_eq!(log.error_count(), 2);
        assert_eq!(log.diagnostics()[0].key, "cant.resolve");
    }

    #[test]
    fn lint_warnings_respect_categories() {
        let mut log = Log::with_lint([LintCategory::Unchecked]);
        log.lint(LintCategory::Unchecked, Span::new(0, 1), "unchecked.call", vec![]);
        log.lint(LintCategory::Try, Span::new(0, 1), "try.resource.throws.interrupted", vec![]);
        assert_eq!(log.warnings().count(), 1);
        assert_eq!(log.diagnostics()[0].lint, Some(LintCategory::Unchecked));
    }

    #[test]
    fn muted_log_records_nothing() {
        let mut log = Log::new();
        log.muted(|log| log.error(Span::new(0, 1), "cant.resolve", vec![]));
        assert!(!log.has_errors());
        log.error(Span::new(0, 1), "cant.resolve", vec![]);
        assert!(log.has_errors());
    }

    #[test]
    fn display_joins_args() {
        let d = Diagnostic::error(Span::DUMMY, "cant.resolve", vec!["variable".into(), "x".into()]);
        assert_eq!(d.to_string(), "cant.resolve: variable, x");
    }
}
