//! Cinder back half: lowering of attributed trees to sugar-free, flat class
//! declarations, followed by erasure of generic types.
//!
//! # Architecture
//!
//! - [`fresh`]: synthetic name allocation
//! - [`lower`]: the lowerer (access methods, capture, enums, switches,
//!   loops, resources, assertions, boxing, constant conditionals)
//! - [`erase`]: retyping to erased types and cast insertion
//! - [`bridge`]: bridge method synthesis
//!
//! [`compile`] runs the whole pipeline for one compilation unit.

pub mod bridge;
pub mod erase;
pub mod fresh;
pub mod lower;

use tracing::debug;

use cinder_ast::{ClassDecl, CompilationUnit};
use cinder_common::{CompileError, CompileOptions, Log};
use cinder_symtab::Symtab;

pub use erase::erase_classes;
pub use lower::{lower_unit, Lowerer};

/// Attribute, lower and erase `unit`.
///
/// Source errors go to `log`. When attribution reported any, no classes are
/// produced and the result is an empty list; `Err` is reserved for failures
/// that stop the unit from being processed at all.
pub fn compile(
    syms: &mut Symtab,
    unit: &mut CompilationUnit,
    opts: &CompileOptions,
    log: &mut Log,
) -> Result<Vec<ClassDecl>, CompileError> {
    cinder_typeck::check_unit(syms, unit, opts, log)?;
    if log.has_errors() {
        debug!(errors = log.error_count(), "skipping lowering of erroneous unit");
        return Ok(Vec::new());
    }
    let mut classes = lower_unit(syms, unit, opts)?;
    erase_classes(syms, &mut classes, opts, log);
    Ok(classes)
}
