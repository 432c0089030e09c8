//! Shared types for the Cinder semantic core.
//!
//! - [`span`]: byte spans and line/column lookup
//! - [`diagnostic`]: structured diagnostics and the diagnostic log
//! - [`options`]: feature switches consumed by every phase
//! - [`error`]: fatal errors that abort a compilation unit

pub mod diagnostic;
pub mod error;
pub mod options;
pub mod span;

pub use diagnostic::{Diagnostic, LintCategory, Log, Severity};
pub use error::CompileError;
pub use options::{CompileOptions, SourceLevel};
pub use span::{LineCol, LineIndex, Span};
