//! Type representation.
//!
//! Types refer to symbols by [`SymbolId`]; anything that needs the symbol
//! table (bounds, supertypes, display) goes through [`Symtab`](crate::Symtab).

use std::fmt;

use crate::symbol::SymbolId;

/// The eight primitive types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Prim {
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    Boolean,
}

impl Prim {
    pub const ALL: [Prim; 8] = [
        Prim::Byte,
        Prim::Short,
        Prim::Char,
        Prim::Int,
        Prim::Long,
        Prim::Float,
        Prim::Double,
        Prim::Boolean,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Prim::Byte => "byte",
            Prim::Short => "short",
            Prim::Char => "char",
            Prim::Int => "int",
            Prim::Long => "long",
            Prim::Float => "float",
            Prim::Double => "double",
            Prim::Boolean => "boolean",
        }
    }

    /// Simple name of the wrapper class.
    pub fn boxed_name(self) -> &'static str {
        match self {
            Prim::Byte => "Byte",
            Prim::Short => "Short",
            Prim::Char => "Character",
            Prim::Int => "Integer",
            Prim::Long => "Long",
            Prim::Float => "Float",
            Prim::Double => "Double",
            Prim::Boolean => "Boolean",
        }
    }

    pub fn is_numeric(self) -> bool {
        self != Prim::Boolean
    }

    pub fn is_integral(self) -> bool {
        matches!(self, Prim::Byte | Prim::Short | Prim::Char | Prim::Int | Prim::Long)
    }

    /// Whether a value of this type widens to `to` (identity included).
    pub fn widens_to(self, to: Prim) -> bool {
        use Prim::*;
        if self == to {
            return true;
        }
        match self {
            Byte => matches!(to, Short | Int | Long | Float | Double),
            Short | Char => matches!(to, Int | Long | Float | Double),
            Int => matches!(to, Long | Float | Double),
            Long => matches!(to, Float | Double),
            Float => to == Double,
            Double | Boolean => false,
        }
    }

    /// `byte`, `short` and `char`: types narrower than `int`.
    pub fn is_subrange(self) -> bool {
        matches!(self, Prim::Byte | Prim::Short | Prim::Char)
    }
}

/// Wildcard bound kinds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BoundKind {
    Unbound,
    Extends,
    Super,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Wildcard {
    pub kind: BoundKind,
    pub bound: Option<Box<Type>>,
}

/// A class or interface type, possibly parameterized.
///
/// An empty `args` list on a generic class is the raw type.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassType {
    pub sym: SymbolId,
    pub args: Vec<Type>,
    /// Enclosing instance type of an inner class, if any.
    pub outer: Option<Box<Type>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodType {
    pub params: Vec<Type>,
    pub ret: Box<Type>,
    pub thrown: Vec<Type>,
}

impl MethodType {
    pub fn new(params: Vec<Type>, ret: Type, thrown: Vec<Type>) -> Self {
        MethodType { params, ret: Box::new(ret), thrown }
    }
}

/// A generic method type pending inference of `tvars`.
#[derive(Clone, Debug, PartialEq)]
pub struct ForAll {
    pub tvars: Vec<SymbolId>,
    pub mt: MethodType,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    Prim(Prim),
    Void,
    /// Type of the `null` literal.
    Null,
    Class(ClassType),
    Array(Box<Type>),
    TypeVar(SymbolId),
    Wildcard(Wildcard),
    Method(MethodType),
    ForAll(ForAll),
    /// Alternatives of a multi-catch parameter.
    Union(Vec<Type>),
    /// Compound bound of a type variable.
    Intersection(Vec<Type>),
    Package(SymbolId),
    Error,
    /// Absent type; as an expected type it accepts anything.
    None,
}

impl Type {
    pub fn int() -> Type {
        Type::Prim(Prim::Int)
    }

    pub fn boolean() -> Type {
        Type::Prim(Prim::Boolean)
    }

    pub fn class(sym: SymbolId) -> Type {
        Type::Class(ClassType { sym, args: Vec::new(), outer: None })
    }

    pub fn class_with(sym: SymbolId, args: Vec<Type>) -> Type {
        Type::Class(ClassType { sym, args, outer: None })
    }

    pub fn array(elem: Type) -> Type {
        Type::Array(Box::new(elem))
    }

    pub fn method(params: Vec<Type>, ret: Type) -> Type {
        Type::Method(MethodType::new(params, ret, Vec::new()))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Type::None)
    }

    pub fn is_prim(&self) -> bool {
        matches!(self, Type::Prim(_))
    }

    pub fn prim(&self) -> Option<Prim> {
        match self {
            Type::Prim(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Prim(p) if p.is_numeric())
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Type::Prim(Prim::Boolean))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    /// Class, array, type variable, null, or compound types.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Type::Class(_)
                | Type::Array(_)
                | Type::TypeVar(_)
                | Type::Null
                | Type::Intersection(_)
                | Type::Union(_)
                | Type::Wildcard(_)
        )
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(_))
    }

    pub fn elem_type(&self) -> Option<&Type> {
        match self {
            Type::Array(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn class_sym(&self) -> Option<SymbolId> {
        match self {
            Type::Class(ct) => Some(ct.sym),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassType> {
        match self {
            Type::Class(ct) => Some(ct),
            _ => None,
        }
    }

    /// The method type, looking through `ForAll`.
    pub fn as_method(&self) -> Option<&MethodType> {
        match self {
            Type::Method(mt) => Some(mt),
            Type::ForAll(fa) => Some(&fa.mt),
            _ => None,
        }
    }

    pub fn as_method_mut(&mut self) -> Option<&mut MethodType> {
        match self {
            Type::Method(mt) => Some(mt),
            Type::ForAll(fa) => Some(&mut fa.mt),
            _ => None,
        }
    }

    pub fn params(&self) -> &[Type] {
        self.as_method().map(|mt| mt.params.as_slice()).unwrap_or(&[])
    }

    pub fn ret(&self) -> Type {
        self.as_method().map(|mt| (*mt.ret).clone()).unwrap_or(Type::Error)
    }

    pub fn thrown(&self) -> &[Type] {
        self.as_method().map(|mt| mt.thrown.as_slice()).unwrap_or(&[])
    }

    pub fn type_args(&self) -> &[Type] {
        match self {
            Type::Class(ct) => &ct.args,
            _ => &[],
        }
    }

    /// Whether a type variable occurs anywhere in this type.
    pub fn mentions_type_var(&self) -> bool {
        match self {
            Type::TypeVar(_) => true,
            Type::Class(ct) => {
                ct.args.iter().any(Type::mentions_type_var)
                    || ct.outer.as_deref().is_some_and(Type::mentions_type_var)
            }
            Type::Array(elem) => elem.mentions_type_var(),
            Type::Wildcard(wc) => wc.bound.as_deref().is_some_and(Type::mentions_type_var),
            Type::Method(mt) => {
                mt.params.iter().any(Type::mentions_type_var) || mt.ret.mentions_type_var()
            }
            Type::ForAll(_) => true,
            Type::Union(ts) | Type::Intersection(ts) => ts.iter().any(Type::mentions_type_var),
            _ => false,
        }
    }
}

/// A compile-time constant value.
///
/// `byte` and `short` constants are stored as `Int`; the expression's type
/// says which primitive they belong to.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Char(u16),
    Str(String),
}

impl Constant {
    /// Integral value widened to `i64`, for integral and char constants.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Constant::Int(v) => Some(*v as i64),
            Constant::Long(v) => Some(*v),
            Constant::Char(c) => Some(*c as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Constant::Float(v) => Some(*v as f64),
            Constant::Double(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Constant::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Whether an int-valued constant fits in `target` without loss.
    pub fn fits(&self, target: Prim) -> bool {
        let Some(v) = self.as_i64() else { return false };
        match target {
            Prim::Byte => (i8::MIN as i64..=i8::MAX as i64).contains(&v),
            Prim::Short => (i16::MIN as i64..=i16::MAX as i64).contains(&v),
            Prim::Char => (0..=u16::MAX as i64).contains(&v),
            Prim::Int => (i32::MIN as i64..=i32::MAX as i64).contains(&v),
            Prim::Long => true,
            _ => false,
        }
    }

    /// Convert the constant to the representation of `target`.
    pub fn coerce(&self, target: Prim) -> Option<Constant> {
        Some(match target {
            Prim::Boolean => Constant::Bool(self.as_bool()?),
            Prim::Byte => Constant::Int(self.to_long()? as i8 as i32),
            Prim::Short => Constant::Int(self.to_long()? as i16 as i32),
            Prim::Char => Constant::Char(self.to_long()? as u16),
            Prim::Int => Constant::Int(self.to_long()? as i32),
            Prim::Long => Constant::Long(self.to_long()?),
            Prim::Float => Constant::Float(self.as_f64()? as f32),
            Prim::Double => Constant::Double(self.as_f64()?),
        })
    }

    /// Java narrowing of any numeric constant to `long`.
    fn to_long(&self) -> Option<i64> {
        match self {
            Constant::Float(v) => Some(*v as i64),
            Constant::Double(v) => Some(*v as i64),
            other => other.as_i64(),
        }
    }

    /// Rendering used for string concatenation.
    pub fn stringify(&self) -> String {
        match self {
            Constant::Int(v) => v.to_string(),
            Constant::Long(v) => v.to_string(),
            Constant::Float(v) => format_float(*v as f64, true),
            Constant::Double(v) => format_float(*v, false),
            Constant::Bool(b) => b.to_string(),
            Constant::Char(c) => char::from_u32(*c as u32).map(String::from).unwrap_or_default(),
            Constant::Str(s) => s.clone(),
        }
    }
}

fn format_float(v: f64, single: bool) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if v.fract() == 0.0 && v.abs() < 1e7 {
        format!("{:.1}", v)
    } else if single {
        (v as f32).to_string()
    } else {
        v.to_string()
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{}", v),
            Constant::Long(v) => write!(f, "{}L", v),
            Constant::Float(v) => write!(f, "{}f", format_float(*v as f64, true)),
            Constant::Double(v) => write!(f, "{}", format_float(*v, false)),
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Char(c) => match char::from_u32(*c as u32) {
                Some(ch) if !ch.is_control() => write!(f, "'{}'", ch),
                _ => write!(f, "'\\u{:04x}'", c),
            },
            Constant::Str(s) => write!(f, "{:?}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_widening() {
        assert!(Prim::Byte.widens_to(Prim::Int));
        assert!(Prim::Char.widens_to(Prim::Long));
        assert!(!Prim::Char.widens_to(Prim::Short));
        assert!(!Prim::Short.widens_to(Prim::Char));
        assert!(!Prim::Boolean.widens_to(Prim::Int));
        assert!(Prim::Long.widens_to(Prim::Float));
    }

    #[test]
    fn constant_fits_subranges() {
        assert!(Constant::Int(127).fits(Prim::Byte));
        assert!(!Constant::Int(128).fits(Prim::Byte));
        assert!(Constant::Int(65535).fits(Prim::Char));
        assert!(!Constant::Int(-1).fits(Prim::Char));
        assert!(!Constant::Str("x".into()).fits(Prim::Int));
    }

    #[test]
    fn constant_coercion_truncates() {
        assert_eq!(Constant::Int(300).coerce(Prim::Byte), Some(Constant::Int(44)));
        assert_eq!(Constant::Double(3.9).coerce(Prim::Int), Some(Constant::Int(3)));
        assert_eq!(Constant::Int(65).coerce(Prim::Char), Some(Constant::Char(65)));
        assert_eq!(Constant::Bool(true).coerce(Prim::Int), None);
    }

    #[test]
    fn stringify_matches_concatenation_rules() {
        assert_eq!(Constant::Double(1.0).stringify(), "1.0");
        assert_eq!(Constant::Char(b'a' as u16).stringify(), "a");
        assert_eq!(Constant::Long(-4).stringify(), "-4");
    }
}
