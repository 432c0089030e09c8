//! The syntax tree the semantic phases annotate and rewrite.
//!
//! - [`tree`]: node definitions
//! - [`build`]: unattributed, source-shaped construction
//! - [`make`]: attributed construction of synthesized code
//! - [`visit`]: immutable and mutable traversals
//! - [`pretty`]: source-like printing

pub mod build;
pub mod make;
pub mod pretty;
pub mod tree;
pub mod visit;

pub use build::SourceBuilder;
pub use make::TreeMaker;
pub use tree::*;
