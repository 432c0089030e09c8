//! Symbol flags.
//!
//! The low bits mirror the class-file access flags; everything above bit 16
//! is compiler-internal bookkeeping.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

/// A set of symbol flags.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Flags(pub u64);

impl Flags {
    pub const EMPTY: Flags = Flags(0);

    pub const PUBLIC: Flags = Flags(1 << 0);
    pub const PRIVATE: Flags = Flags(1 << 1);
    pub const PROTECTED: Flags = Flags(1 << 2);
    pub const STATIC: Flags = Flags(1 << 3);
    pub const FINAL: Flags = Flags(1 << 4);
    pub const SYNCHRONIZED: Flags = Flags(1 << 5);
    pub const VOLATILE: Flags = Flags(1 << 6);
    pub const TRANSIENT: Flags = Flags(1 << 7);
    pub const NATIVE: Flags = Flags(1 << 8);
    pub const INTERFACE: Flags = Flags(1 << 9);
    pub const ABSTRACT: Flags = Flags(1 << 10);
    pub const STRICTFP: Flags = Flags(1 << 11);
    pub const SYNTHETIC: Flags = Flags(1 << 12);
    pub const ANNOTATION: Flags = Flags(1 << 13);
    pub const ENUM: Flags = Flags(1 << 14);

    /// Deprecated API element.
    pub const DEPRECATED: Flags = Flags(1 << 17);
    /// Variable has an initializer.
    pub const HASINIT: Flags = Flags(1 << 18);
    /// Method is a bridge.
    pub const BRIDGE: Flags = Flags(1 << 19);
    /// Method takes a variable number of arguments.
    pub const VARARGS: Flags = Flags(1 << 20);
    /// Class is known to have no inheritance cycle.
    pub const ACYCLIC: Flags = Flags(1 << 21);
    /// Class or method whose signature (type variable bounds, supertypes)
    /// has not been attributed yet.
    pub const UNATTRIBUTED: Flags = Flags(1 << 22);
    /// Class is being attributed or checked for cycles.
    pub const LOCKED: Flags = Flags(1 << 23);
    /// Placeholder produced when two inherited methods clash.
    pub const CLASH: Flags = Flags(1 << 24);
    /// Synthetic bridge that also overrides a source method.
    pub const OVERRIDE_BRIDGE: Flags = Flags(1 << 25);
    /// Predefined operator.
    pub const OPERATOR: Flags = Flags(1 << 26);
    /// Default constructor generated by member entry.
    pub const GENERATED_CTOR: Flags = Flags(1 << 27);
    /// Constructor of an anonymous class.
    pub const ANON_CTOR: Flags = Flags(1 << 28);
    /// Inner class that never reads its outer instance.
    pub const NO_OUTER_THIS: Flags = Flags(1 << 29);
    /// Variable is a method or catch parameter.
    pub const PARAMETER: Flags = Flags(1 << 30);
    /// Merged symbol built while comparing abstract methods; never entered.
    pub const HYPOTHETICAL: Flags = Flags(1 << 31);
    /// Class attribution has completed.
    pub const ATTRIBUTED: Flags = Flags(1 << 32);
    /// Symbol was created by the lowering or erasure phases.
    pub const LOWERED: Flags = Flags(1 << 33);
    /// Enum constant field.
    pub const ENUM_CONSTANT: Flags = Flags(1 << 34);
    /// Resource variable of a try-with-resources statement.
    pub const RESOURCE: Flags = Flags(1 << 35);

    pub const ACCESS: Flags = Flags(Self::PUBLIC.0 | Self::PROTECTED.0 | Self::PRIVATE.0);

    /// Modifiers a source class may carry.
    pub const CLASS_MODIFIERS: Flags = Flags(
        Self::PUBLIC.0 | Self::ABSTRACT.0 | Self::FINAL.0 | Self::STRICTFP.0,
    );
    /// Modifiers a member class may carry.
    pub const MEMBER_CLASS_MODIFIERS: Flags = Flags(
        Self::CLASS_MODIFIERS.0 | Self::PRIVATE.0 | Self::PROTECTED.0 | Self::STATIC.0,
    );
    pub const METHOD_MODIFIERS: Flags = Flags(
        Self::ACCESS.0
            | Self::ABSTRACT.0
            | Self::STATIC.0
            | Self::FINAL.0
            | Self::SYNCHRONIZED.0
            | Self::NATIVE.0
            | Self::STRICTFP.0,
    );
    pub const VAR_MODIFIERS: Flags = Flags(
        Self::ACCESS.0 | Self::STATIC.0 | Self::FINAL.0 | Self::VOLATILE.0 | Self::TRANSIENT.0,
    );
    pub const INTERFACE_METHOD_MODIFIERS: Flags = Flags(Self::ABSTRACT.0 | Self::PUBLIC.0);
    pub const CONSTRUCTOR_MODIFIERS: Flags = Flags(Self::ACCESS.0);

    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Flags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Flags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Flags) {
        self.0 &= !other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Only the visibility bits.
    pub fn access(self) -> Flags {
        self & Flags::ACCESS
    }
}

impl BitOr for Flags {
    type Output = Flags;
    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Flags {
    type Output = Flags;
    fn bitand(self, rhs: Flags) -> Flags {
        Flags(self.0 & rhs.0)
    }
}

impl Not for Flags {
    type Output = Flags;
    fn not(self) -> Flags {
        Flags(!self.0)
    }
}

const NAMES: &[(Flags, &str)] = &[
    (Flags::PUBLIC, "public"),
    (Flags::PROTECTED, "protected"),
    (Flags::PRIVATE, "private"),
    (Flags::ABSTRACT, "abstract"),
    (Flags::STATIC, "static"),
    (Flags::FINAL, "final"),
    (Flags::SYNCHRONIZED, "synchronized"),
    (Flags::NATIVE, "native"),
    (Flags::TRANSIENT, "transient"),
    (Flags::VOLATILE, "volatile"),
    (Flags::STRICTFP, "strictfp"),
];

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flags({:#x})", self.0)
    }
}

/// Renders the source-level modifiers in canonical order.
impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(*flag) {
                if !first {
                    write!(f, " ")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_bits_only() {
        let flags = Flags::PUBLIC | Flags::STATIC | Flags::FINAL;
        assert_eq!(flags.access(), Flags::PUBLIC);
        assert!(flags.contains(Flags::STATIC | Flags::FINAL));
        assert!(!flags.contains(Flags::PRIVATE));
    }

    #[test]
    fn display_canonical_order() {
        let flags = Flags::FINAL | Flags::STATIC | Flags::PRIVATE | Flags::SYNTHETIC;
        assert_eq!(flags.to_string(), "private static final");
    }
}
