//! Human-readable rendering of types and symbols for diagnostics.

use std::fmt;

use crate::names;
use crate::symbol::{SymKind, SymbolId};
use crate::symtab::Symtab;
use crate::ty::{BoundKind, Type};

/// A type paired with the table needed to print it.
pub struct TypeDisplay<'a> {
    syms: &'a Symtab,
    ty: &'a Type,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_type(self.syms, self.ty, f)
    }
}

fn write_list(syms: &Symtab, tys: &[Type], sep: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, t) in tys.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write_type(syms, t, f)?;
    }
    Ok(())
}

fn write_type(syms: &Symtab, ty: &Type, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match ty {
        Type::Prim(p) => f.write_str(p.name()),
        Type::Void => f.write_str("void"),
        Type::Null => f.write_str("<nulltype>"),
        Type::Class(ct) => {
            if syms.is_anonymous(ct.sym) {
                let sup = syms.class_info(ct.sym).interfaces.first().cloned().or_else(|| {
                    syms.class_info(ct.sym).supertype.clone()
                });
                f.write_str("<anonymous ")?;
                if let Some(sup) = sup {
                    write_type(syms, &sup, f)?;
                }
                return f.write_str(">");
            }
            f.write_str(&syms.fullname(ct.sym))?;
            if !ct.args.is_empty() {
                f.write_str("<")?;
                write_list(syms, &ct.args, ",", f)?;
                f.write_str(">")?;
            }
            Ok(())
        }
        Type::Array(elem) => {
            write_type(syms, elem, f)?;
            f.write_str("[]")
        }
        Type::TypeVar(tv) => f.write_str(syms.name(*tv)),
        Type::Wildcard(wc) => {
            f.write_str("?")?;
            match (wc.kind, &wc.bound) {
                (BoundKind::Extends, Some(b)) => {
                    f.write_str(" extends ")?;
                    write_type(syms, b, f)
                }
                (BoundKind::Super, Some(b)) => {
                    f.write_str(" super ")?;
                    write_type(syms, b, f)
                }
                _ => Ok(()),
            }
        }
        Type::Method(mt) => {
            f.write_str("(")?;
            write_list(syms, &mt.params, ",", f)?;
            f.write_str(")")?;
            write_type(syms, &mt.ret, f)
        }
        Type::ForAll(fa) => {
            f.write_str("<")?;
            for (i, tv) in fa.tvars.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                f.write_str(syms.name(*tv))?;
            }
            f.write_str(">")?;
            write_type(syms, &Type::Method(fa.mt.clone()), f)
        }
        Type::Union(alts) => write_list(syms, alts, "|", f),
        Type::Intersection(parts) => write_list(syms, parts, "&", f),
        Type::Package(p) => f.write_str(&syms.fullname(*p)),
        Type::Error => f.write_str("<any>"),
        Type::None => f.write_str("<none>"),
    }
}

/// A symbol rendered the way diagnostics mention it: `f(int,java.lang.String)`
/// for methods, the class name for constructors, the simple name otherwise.
pub struct SymbolDisplay<'a> {
    syms: &'a Symtab,
    sym: SymbolId,
}

impl fmt::Display for SymbolDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let syms = self.syms;
        let s = syms.sym(self.sym);
        match s.kind {
            SymKind::Method => {
                if s.name == names::INIT {
                    let owner = s.owner.map(|o| syms.name(o).to_string()).unwrap_or_default();
                    f.write_str(&owner)?;
                } else {
                    f.write_str(&s.name)?;
                }
                f.write_str("(")?;
                write_list(syms, s.ty.params(), ",", f)?;
                f.write_str(")")
            }
            SymKind::Class | SymKind::Package => f.write_str(&syms.fullname(self.sym)),
            _ => f.write_str(&s.name),
        }
    }
}

impl Symtab {
    pub fn display<'a>(&'a self, ty: &'a Type) -> TypeDisplay<'a> {
        TypeDisplay { syms: self, ty }
    }

    pub fn display_sym(&self, sym: SymbolId) -> SymbolDisplay<'_> {
        SymbolDisplay { syms: self, sym }
    }

    /// Render an argument type list as `(int,java.lang.String)`.
    pub fn display_args(&self, args: &[Type]) -> String {
        let rendered: Vec<String> = args.iter().map(|t| self.display(t).to_string()).collect();
        format!("({})", rendered.join(","))
    }

    /// A symbol's kind as diagnostics name it.
    pub fn kind_name(&self, sym: SymbolId) -> &'static str {
        let s = self.sym(sym);
        match s.kind {
            SymKind::Package => "package",
            SymKind::Class if s.is_interface() => "interface",
            SymKind::Class if s.flags.contains(crate::Flags::ENUM) => "enum",
            SymKind::Class => "class",
            SymKind::TypeVar => "type variable",
            SymKind::Var => "variable",
            SymKind::Method if s.is_constructor() => "constructor",
            SymKind::Method => "method",
            SymKind::Error => "symbol",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::{Prim, Wildcard};
    use crate::Flags;

    #[test]
    fn renders_parameterized_and_wildcards() {
        let syms = Symtab::new();
        let ty = Type::class_with(
            syms.predef.comparable,
            vec![Type::Wildcard(Wildcard {
                kind: BoundKind::Extends,
                bound: Some(Box::new(Type::class(syms.predef.number))),
            })],
        );
        assert_eq!(syms.display(&ty).to_string(), "java.lang.Comparable<? extends java.lang.Number>");
        assert_eq!(syms.display(&Type::array(Type::Prim(Prim::Char))).to_string(), "char[]");
    }

    #[test]
    fn renders_methods_and_constructors() {
        let mut syms = Symtab::new();
        let pkg = syms.enter_package("");
        let c = syms.enter_class(pkg, "C", Flags::EMPTY);
        let ctor = syms.new_method(c, names::INIT, Flags::EMPTY, Type::method(vec![Type::int()], Type::Void), vec![]);
        let f = syms.new_method(c, "f", Flags::EMPTY, Type::method(vec![syms.string_type()], Type::Void), vec![]);
        assert_eq!(syms.display_sym(ctor).to_string(), "C(int)");
        assert_eq!(syms.display_sym(f).to_string(), "f(java.lang.String)");
        assert_eq!(syms.kind_name(ctor), "constructor");
    }
}
