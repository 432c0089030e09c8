//! Predefined packages, classes and operators.
//!
//! Mirrors the slice of `java.lang` the core relies on: the root class,
//! strings, boxes, the throwable hierarchy, the iteration and closing
//! protocols, plus the array pseudo-class and the operator table.

use crate::flags::Flags;
use crate::names;
use crate::symbol::{SymData, SymKind, Symbol, SymbolId};
use crate::symtab::Symtab;
use crate::ty::{BoundKind, ForAll, MethodType, Prim, Type, Wildcard};

/// Handles to the predefined symbols.
#[derive(Clone, Debug)]
pub struct Predef {
    pub root_package: SymbolId,
    pub java_lang: SymbolId,
    pub java_io: SymbolId,

    pub object: SymbolId,
    pub string: SymbolId,
    pub class: SymbolId,
    pub enum_: SymbolId,
    pub number: SymbolId,
    pub throwable: SymbolId,
    pub error: SymbolId,
    pub exception: SymbolId,
    pub runtime_exception: SymbolId,
    pub interrupted_exception: SymbolId,
    pub no_such_field_error: SymbolId,
    pub assertion_error: SymbolId,
    pub iterable: SymbolId,
    pub iterator: SymbolId,
    pub auto_closeable: SymbolId,
    pub cloneable: SymbolId,
    pub serializable: SymbolId,
    pub comparable: SymbolId,
    /// Wrapper classes, indexed like [`Prim::ALL`].
    pub boxed: [SymbolId; 8],

    /// Pseudo-class holding the members every array type has.
    pub array_class: SymbolId,
    pub length: SymbolId,
    pub array_clone: SymbolId,

    /// Pseudo-class whose members are the predefined operators.
    pub operators: SymbolId,

    /// The designated error placeholder symbol.
    pub error_sym: SymbolId,
}

impl Predef {
    /// A value with every handle pointing at symbol zero, used only while
    /// the table is being built.
    pub(crate) fn placeholder() -> Self {
        let z = SymbolId(0);
        Predef {
            root_package: z,
            java_lang: z,
            java_io: z,
            object: z,
            string: z,
            class: z,
            enum_: z,
            number: z,
            throwable: z,
            error: z,
            exception: z,
            runtime_exception: z,
            interrupted_exception: z,
            no_such_field_error: z,
            assertion_error: z,
            iterable: z,
            iterator: z,
            auto_closeable: z,
            cloneable: z,
            serializable: z,
            comparable: z,
            boxed: [z; 8],
            array_class: z,
            length: z,
            array_clone: z,
            operators: z,
            error_sym: z,
        }
    }

    pub fn boxed_class(&self, prim: Prim) -> SymbolId {
        self.boxed[prim_index(prim)]
    }

    /// The primitive a wrapper class boxes.
    pub fn unboxed_prim(&self, class: SymbolId) -> Option<Prim> {
        self.boxed.iter().position(|b| *b == class).map(|i| Prim::ALL[i])
    }
}

fn prim_index(prim: Prim) -> usize {
    Prim::ALL.iter().position(|p| *p == prim).unwrap_or(0)
}

// ── Builder ────────────────────────────────────────────────────────────

struct Builder<'a> {
    syms: &'a mut Symtab,
    object: Option<SymbolId>,
}

impl Builder<'_> {
    fn class(&mut self, pkg: SymbolId, name: &str, flags: Flags, supertype: Option<Type>) -> SymbolId {
        let id = self.syms.enter_class(pkg, name, flags | Flags::PUBLIC);
        let supertype = supertype.or_else(|| self.object.map(Type::class));
        self.syms.set_supertypes(id, supertype, Vec::new());
        id
    }

    fn interfaces(&mut self, class: SymbolId, interfaces: Vec<Type>) {
        self.syms.class_info_mut(class).interfaces = interfaces;
    }

    fn method(
        &mut self,
        class: SymbolId,
        name: &str,
        flags: Flags,
        params: Vec<Type>,
        ret: Type,
        thrown: Vec<Type>,
    ) -> SymbolId {
        self.method_type(class, name, flags, Type::Method(MethodType::new(params, ret, thrown)))
    }

    fn method_type(&mut self, class: SymbolId, name: &str, flags: Flags, ty: Type) -> SymbolId {
        let params: Vec<Type> = ty.params().to_vec();
        let m = self.syms.new_method(class, name, flags, ty, Vec::new());
        let param_syms = params
            .into_iter()
            .enumerate()
            .map(|(i, t)| self.syms.new_var(m, &format!("arg{}", i), Flags::PARAMETER, t))
            .collect();
        if let SymData::Method(info) = &mut self.syms.sym_mut(m).data {
            info.params = param_syms;
        }
        self.syms.enter_member(class, m);
        m
    }

    fn ctor(&mut self, class: SymbolId, flags: Flags, params: Vec<Type>) -> SymbolId {
        self.method(class, names::INIT, flags, params, Type::Void, Vec::new())
    }

    /// A generic class with one type parameter bounded by the root class.
    fn generic1(&mut self, class: SymbolId, tvar: &str) -> SymbolId {
        let tv = self.syms.new_type_var(class, tvar);
        let bound = Type::class(self.object.unwrap_or(class));
        self.syms.set_bound(tv, bound);
        self.syms.set_class_type_params(class, vec![tv]);
        tv
    }
}

/// Enter all predefined symbols into `syms`.
pub(crate) fn install(syms: &mut Symtab) -> Predef {
    let mut p = Predef::placeholder();
    p.root_package = syms.enter_package("");
    p.java_lang = syms.enter_package("java.lang");
    p.java_io = syms.enter_package("java.io");

    p.error_sym = syms.add_symbol(Symbol {
        name: names::ERROR.to_string(),
        kind: SymKind::Error,
        flags: Flags::PUBLIC | Flags::STATIC,
        owner: None,
        ty: Type::Error,
        data: SymData::None,
    });

    let mut b = Builder { syms, object: None };
    let lang = p.java_lang;
    let pf = Flags::PUBLIC;
    let pf_final = Flags::PUBLIC | Flags::FINAL;

    // java.lang.Object
    p.object = b.class(lang, "Object", Flags::EMPTY, None);
    b.syms.set_supertypes(p.object, None, Vec::new());
    b.object = Some(p.object);
    let object = Type::class(p.object);
    b.ctor(p.object, pf, vec![]);
    b.method(p.object, names::HASH_CODE, pf, vec![], Type::int(), vec![]);
    b.method(p.object, names::EQUALS, pf, vec![object.clone()], Type::boolean(), vec![]);

    p.serializable = b.class(p.java_io, "Serializable", Flags::INTERFACE | Flags::ABSTRACT, None);
    p.cloneable = b.class(lang, "Cloneable", Flags::INTERFACE | Flags::ABSTRACT, None);

    p.comparable = b.class(lang, "Comparable", Flags::INTERFACE | Flags::ABSTRACT, None);
    let cmp_t = b.generic1(p.comparable, "T");
    b.method(
        p.comparable,
        "compareTo",
        pf | Flags::ABSTRACT,
        vec![Type::TypeVar(cmp_t)],
        Type::int(),
        vec![],
    );

    p.string = b.class(lang, "String", Flags::FINAL, None);
    let string = Type::class(p.string);
    b.interfaces(
        p.string,
        vec![Type::class(p.serializable), Type::class_with(p.comparable, vec![string.clone()])],
    );
    b.ctor(p.string, pf, vec![]);
    b.method(p.string, names::LENGTH, pf, vec![], Type::int(), vec![]);
    b.method(p.string, names::HASH_CODE, pf, vec![], Type::int(), vec![]);
    b.method(p.string, names::EQUALS, pf, vec![object.clone()], Type::boolean(), vec![]);
    b.method(p.string, "compareTo", pf, vec![string.clone()], Type::int(), vec![]);
    b.method(p.string, names::VALUE_OF, pf | Flags::STATIC, vec![object.clone()], string.clone(), vec![]);

    // Object.clone() and toString() mention types entered after Object.
    b.method(p.object, "toString", pf, vec![], string.clone(), vec![]);
    b.method(p.object, names::CLONE, Flags::PROTECTED, vec![], object.clone(), vec![]);

    p.class = b.class(lang, "Class", Flags::FINAL, None);
    b.generic1(p.class, "T");
    let wild_class = Type::class_with(p.class, vec![Type::Wildcard(Wildcard { kind: BoundKind::Unbound, bound: None })]);
    b.method(p.class, names::DESIRED_ASSERTION_STATUS, pf, vec![], Type::boolean(), vec![]);
    b.method(p.class, names::GET_COMPONENT_TYPE, pf, vec![], wild_class, vec![]);

    // Throwables.
    p.throwable = b.class(lang, "Throwable", Flags::EMPTY, None);
    b.interfaces(p.throwable, vec![Type::class(p.serializable)]);
    let throwable = Type::class(p.throwable);
    b.ctor(p.throwable, pf, vec![]);
    b.ctor(p.throwable, pf, vec![string.clone()]);
    b.method(p.throwable, "getMessage", pf, vec![], string.clone(), vec![]);
    b.method(p.throwable, names::ADD_SUPPRESSED, pf_final, vec![throwable.clone()], Type::Void, vec![]);

    let throwable_sub = |b: &mut Builder<'_>, name: &str, sup: SymbolId| {
        let c = b.class(lang, name, Flags::EMPTY, Some(Type::class(sup)));
        b.ctor(c, pf, vec![]);
        b.ctor(c, pf, vec![string.clone()]);
        c
    };
    p.exception = throwable_sub(&mut b, "Exception", p.throwable);
    p.error = throwable_sub(&mut b, "Error", p.throwable);
    p.runtime_exception = throwable_sub(&mut b, "RuntimeException", p.exception);
    p.interrupted_exception = throwable_sub(&mut b, "InterruptedException", p.exception);
    p.no_such_field_error = throwable_sub(&mut b, "NoSuchFieldError", p.error);
    p.assertion_error = b.class(lang, "AssertionError", Flags::EMPTY, Some(Type::class(p.error)));
    b.ctor(p.assertion_error, pf, vec![]);
    b.ctor(p.assertion_error, pf, vec![object.clone()]);

    // Iteration and resource protocols.
    let java_util = b.syms.enter_package("java.util");
    p.iterator = b.class(java_util, "Iterator", Flags::INTERFACE | Flags::ABSTRACT, None);
    let it_e = b.generic1(p.iterator, "E");
    b.method(p.iterator, names::HAS_NEXT, pf | Flags::ABSTRACT, vec![], Type::boolean(), vec![]);
    b.method(p.iterator, names::NEXT, pf | Flags::ABSTRACT, vec![], Type::TypeVar(it_e), vec![]);

    p.iterable = b.class(lang, "Iterable", Flags::INTERFACE | Flags::ABSTRACT, None);
    let iterable_t = b.generic1(p.iterable, "T");
    b.method(
        p.iterable,
        names::ITERATOR,
        pf | Flags::ABSTRACT,
        vec![],
        Type::class_with(p.iterator, vec![Type::TypeVar(iterable_t)]),
        vec![],
    );

    p.auto_closeable = b.class(lang, "AutoCloseable", Flags::INTERFACE | Flags::ABSTRACT, None);
    b.method(
        p.auto_closeable,
        names::CLOSE,
        pf | Flags::ABSTRACT,
        vec![],
        Type::Void,
        vec![Type::class(p.exception)],
    );

    // Enum<E extends Enum<E>>
    p.enum_ = b.class(lang, "Enum", Flags::ABSTRACT, None);
    let enum_e = b.syms.new_type_var(p.enum_, "E");
    b.syms.set_bound(enum_e, Type::class_with(p.enum_, vec![Type::TypeVar(enum_e)]));
    b.syms.set_class_type_params(p.enum_, vec![enum_e]);
    b.interfaces(
        p.enum_,
        vec![Type::class_with(p.comparable, vec![Type::TypeVar(enum_e)]), Type::class(p.serializable)],
    );
    b.ctor(p.enum_, Flags::PROTECTED, vec![string.clone(), Type::int()]);
    b.method(p.enum_, names::NAME, pf_final, vec![], string.clone(), vec![]);
    b.method(p.enum_, names::ORDINAL, pf_final, vec![], Type::int(), vec![]);
    b.method(p.enum_, "compareTo", pf_final, vec![Type::TypeVar(enum_e)], Type::int(), vec![]);
    // The class file carries the bridge for Comparable.compareTo(Object).
    b.method(p.enum_, "compareTo", pf | Flags::SYNTHETIC | Flags::BRIDGE, vec![object.clone()], Type::int(), vec![]);
    {
        let placeholder = b.method_type(p.enum_, names::VALUE_OF, pf | Flags::STATIC, Type::Void);
        let t = b.syms.new_type_var(placeholder, "T");
        b.syms.set_bound(t, Type::class_with(p.enum_, vec![Type::TypeVar(t)]));
        let mt = MethodType::new(
            vec![Type::class_with(p.class, vec![Type::TypeVar(t)]), string.clone()],
            Type::TypeVar(t),
            vec![],
        );
        b.syms.sym_mut(placeholder).ty = Type::ForAll(ForAll { tvars: vec![t], mt: mt.clone() });
        let params = mt
            .params
            .iter()
            .enumerate()
            .map(|(i, t)| b.syms.new_var(placeholder, &format!("arg{}", i), Flags::PARAMETER, t.clone()))
            .collect();
        if let SymData::Method(info) = &mut b.syms.sym_mut(placeholder).data {
            info.params = params;
        }
    }

    // Boxes.
    p.number = b.class(lang, "Number", Flags::ABSTRACT, None);
    b.interfaces(p.number, vec![Type::class(p.serializable)]);
    for prim in Prim::ALL {
        let sup = if prim.is_numeric() && prim != Prim::Char { p.number } else { p.object };
        let c = b.class(lang, prim.boxed_name(), Flags::FINAL, Some(Type::class(sup)));
        let boxed = Type::class(c);
        b.interfaces(c, vec![Type::class_with(p.comparable, vec![boxed.clone()])]);
        b.ctor(c, pf, vec![Type::Prim(prim)]);
        b.method(c, names::VALUE_OF, pf | Flags::STATIC, vec![Type::Prim(prim)], boxed.clone(), vec![]);
        b.method(c, &names::unbox_method(prim), pf, vec![], Type::Prim(prim), vec![]);
        p.boxed[prim_index(prim)] = c;
    }

    // Array pseudo-class.
    p.array_class = b.class(p.root_package, "Array", Flags::FINAL | Flags::SYNTHETIC, None);
    b.interfaces(p.array_class, vec![Type::class(p.cloneable), Type::class(p.serializable)]);
    p.length = b.syms.new_var(p.array_class, names::LENGTH, pf_final, Type::int());
    b.syms.enter_member(p.array_class, p.length);
    p.array_clone = b.method(p.array_class, names::CLONE, pf, vec![], object, vec![]);

    p.operators = b.class(p.root_package, "<operators>", Flags::SYNTHETIC | Flags::FINAL, None);
    install_operators(&mut b, p.operators, p.string, p.object);

    p
}

// ── Operators ──────────────────────────────────────────────────────────

const NUMERIC: [Prim; 4] = [Prim::Int, Prim::Long, Prim::Float, Prim::Double];

fn install_operators(b: &mut Builder<'_>, ops: SymbolId, string: SymbolId, object: SymbolId) {
    let op_flags = Flags::PUBLIC | Flags::STATIC | Flags::OPERATOR;
    let unary = |b: &mut Builder<'_>, name: &str, arg: Type, ret: Type| {
        b.method(ops, name, op_flags, vec![arg], ret, vec![]);
    };
    for p in NUMERIC {
        unary(b, "+", Type::Prim(p), Type::Prim(p));
        unary(b, "-", Type::Prim(p), Type::Prim(p));
    }
    for p in [Prim::Int, Prim::Long] {
        unary(b, "~", Type::Prim(p), Type::Prim(p));
    }
    unary(b, "!", Type::boolean(), Type::boolean());

    let binary = |b: &mut Builder<'_>, name: &str, l: Type, r: Type, ret: Type| {
        b.method(ops, name, op_flags, vec![l, r], ret, vec![]);
    };

    let str_ty = Type::class(string);
    let obj_ty = Type::class(object);
    binary(b, "+", str_ty.clone(), obj_ty.clone(), str_ty.clone());
    binary(b, "+", obj_ty.clone(), str_ty.clone(), str_ty.clone());
    binary(b, "+", str_ty.clone(), str_ty.clone(), str_ty.clone());
    for p in Prim::ALL {
        binary(b, "+", str_ty.clone(), Type::Prim(p), str_ty.clone());
        binary(b, "+", Type::Prim(p), str_ty.clone(), str_ty.clone());
    }

    for name in ["+", "-", "*", "/", "%"] {
        for p in NUMERIC {
            binary(b, name, Type::Prim(p), Type::Prim(p), Type::Prim(p));
        }
    }
    for name in ["<<", ">>", ">>>"] {
        for (l, r) in [
            (Prim::Int, Prim::Int),
            (Prim::Int, Prim::Long),
            (Prim::Long, Prim::Int),
            (Prim::Long, Prim::Long),
        ] {
            binary(b, name, Type::Prim(l), Type::Prim(r), Type::Prim(l));
        }
    }
    for name in ["<", ">", "<=", ">="] {
        for p in NUMERIC {
            binary(b, name, Type::Prim(p), Type::Prim(p), Type::boolean());
        }
    }
    for name in ["==", "!="] {
        for p in NUMERIC {
            binary(b, name, Type::Prim(p), Type::Prim(p), Type::boolean());
        }
        binary(b, name, Type::boolean(), Type::boolean(), Type::boolean());
        binary(b, name, obj_ty.clone(), obj_ty.clone(), Type::boolean());
    }
    for name in ["&", "|", "^"] {
        binary(b, name, Type::boolean(), Type::boolean(), Type::boolean());
        for p in [Prim::Int, Prim::Long] {
            binary(b, name, Type::Prim(p), Type::Prim(p), Type::Prim(p));
        }
    }
    for name in ["&&", "||"] {
        binary(b, name, Type::boolean(), Type::boolean(), Type::boolean());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxes_round_trip() {
        let syms = Symtab::new();
        let integer = syms.predef.boxed_class(Prim::Int);
        assert_eq!(syms.name(integer), "Integer");
        assert_eq!(syms.predef.unboxed_prim(integer), Some(Prim::Int));
        assert_eq!(syms.predef.unboxed_prim(syms.predef.string), None);
        assert_eq!(syms.fullname(syms.predef.boxed_class(Prim::Char)), "java.lang.Character");
    }

    #[test]
    fn operators_are_overloaded_methods() {
        let syms = Symtab::new();
        let plus: Vec<_> = syms.members(syms.predef.operators).lookup("+").collect();
        // unary + and - for four numeric types, string concatenation, arithmetic
        assert!(plus.len() > 20);
        assert!(plus.iter().all(|m| syms.flags(*m).contains(Flags::OPERATOR)));
    }

    #[test]
    fn throwables_have_message_constructors() {
        let syms = Symtab::new();
        let ctors = syms.constructors(syms.predef.runtime_exception);
        assert_eq!(ctors.len(), 2);
        let with_msg = ctors.iter().find(|c| syms.ty(**c).params().len() == 1).unwrap();
        assert_eq!(syms.ty(*with_msg).params()[0], Type::class(syms.predef.string));
    }
}
