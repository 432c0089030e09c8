//! Symbol table and type model.
//!
//! Symbols live in a single arena ([`Symtab`]) and are referred to by
//! [`SymbolId`]. Types are plain values that mention symbols by id; the
//! structural operations over them (subtyping, substitution, erasure, lub,
//! override relations) are methods on [`Symtab`] in [`types`].

pub mod display;
pub mod flags;
pub mod names;
pub mod predef;
pub mod scope;
pub mod symbol;
pub mod symtab;
pub mod ty;
pub mod types;

pub use flags::Flags;
pub use predef::Predef;
pub use scope::Scope;
pub use symbol::{ClassInfo, CompletionState, SymData, SymKind, Symbol, SymbolId};
pub use symtab::{Completer, CompletionFailure, Symtab};
pub use ty::{BoundKind, ClassType, Constant, ForAll, MethodType, Prim, Type, Wildcard};
