//! Cinder semantic analysis: member entry, name resolution and attribution
//! of the syntax tree.
//!
//! # Architecture
//!
//! - [`env`]: layered, structurally shared scoping contexts
//! - [`enter`]: symbols for classes, members and their signatures
//! - [`resolve`]: identifier, member and overload resolution
//! - [`infer`]: type argument inference for generic methods
//! - [`attr`]: the attributor
//! - [`constfold`]: compile-time evaluation of constant expressions
//! - [`check`]: declaration legality checks
//! - [`defaults`]: fail-over filling of unattributed slots
//! - [`diagnostics`]: ariadne rendering of logged diagnostics

pub mod attr;
pub mod check;
pub mod constfold;
pub mod defaults;
pub mod diagnostics;
pub mod enter;
pub mod env;
pub mod infer;
pub mod resolve;

use cinder_ast::CompilationUnit;
use cinder_common::{CompileError, CompileOptions, Log, Span};
use cinder_symtab::Symtab;

pub use attr::Attr;
pub use defaults::default_unset;
pub use env::Env;
pub use resolve::{KindSel, ResolveError, Resolver};

/// Enter and attribute a compilation unit. Source errors go to `log`;
/// `Err` means the unit could not be processed at all.
pub fn check_unit(syms: &mut Symtab, unit: &mut CompilationUnit, opts: &CompileOptions, log: &mut Log) -> Result<(), CompileError> {
    Attr::new(syms, log, opts).attrib_unit(unit)
}

/// Attribute `unit` up to the tree at `span` and return the environment
/// that tree was attributed in, or `None` when no tree has that span.
pub fn attrib_until(
    syms: &mut Symtab,
    unit: &mut CompilationUnit,
    opts: &CompileOptions,
    log: &mut Log,
    span: Span,
) -> Result<Option<Env>, CompileError> {
    Attr::new(syms, log, opts).attrib_until(unit, span)
}
