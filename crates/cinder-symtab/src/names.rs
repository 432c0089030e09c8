//! Well-known names.

pub const INIT: &str = "<init>";
pub const CLINIT: &str = "<clinit>";
pub const THIS: &str = "this";
pub const SUPER: &str = "super";
pub const CLASS: &str = "class";
pub const LENGTH: &str = "length";
pub const CLONE: &str = "clone";
pub const VALUES: &str = "values";
pub const VALUE_OF: &str = "valueOf";
pub const ORDINAL: &str = "ordinal";
pub const NAME: &str = "name";
pub const ITERATOR: &str = "iterator";
pub const HAS_NEXT: &str = "hasNext";
pub const NEXT: &str = "next";
pub const CLOSE: &str = "close";
pub const HASH_CODE: &str = "hashCode";
pub const EQUALS: &str = "equals";
pub const ADD_SUPPRESSED: &str = "addSuppressed";
pub const DESIRED_ASSERTION_STATUS: &str = "desiredAssertionStatus";
pub const GET_COMPONENT_TYPE: &str = "getComponentType";
pub const ERROR: &str = "<error>";
pub const ANY: &str = "<any>";
pub const STAR: &str = "*";

/// Name of the synthesized enum constant cache.
pub const ENUM_VALUES_FIELD: &str = "$VALUES";
/// Name of the synthesized assertions switch.
pub const ASSERTIONS_DISABLED: &str = "$assertionsDisabled";

/// The conventional name of the accessor for an unboxed value, e.g. `intValue`.
pub fn unbox_method(prim: crate::ty::Prim) -> String {
    format!("{}Value", prim.name())
}
