//! Structural type operations: supertypes, substitution, subtyping,
//! conversions, erasure, least upper bounds and override relations.

use rustc_hash::FxHashSet;

use crate::flags::Flags;
use crate::names;
use crate::symbol::{SymKind, SymbolId};
use crate::symtab::Symtab;
use crate::ty::{BoundKind, ClassType, Constant, ForAll, MethodType, Prim, Type, Wildcard};

impl Symtab {
    // ── Supertypes ─────────────────────────────────────────────────────

    /// Whether a class type is the raw form of a generic class.
    pub fn is_raw(&self, ty: &Type) -> bool {
        match ty {
            Type::Class(ct) => {
                ct.args.is_empty() && !self.class_type_params(ct.sym).is_empty()
                    || ct.outer.as_deref().is_some_and(|o| self.is_raw(o))
            }
            _ => false,
        }
    }

    /// Type parameters of a class type and its enclosing types, paired with
    /// the arguments the type supplies for them. Raw or partially applied
    /// levels contribute nothing.
    fn type_bindings(&self, ct: &ClassType) -> (Vec<SymbolId>, Vec<Type>) {
        let mut from = Vec::new();
        let mut to = Vec::new();
        let params = self.class_type_params(ct.sym);
        if params.len() == ct.args.len() {
            from.extend_from_slice(params);
            to.extend(ct.args.iter().cloned());
        }
        if let Some(Type::Class(outer)) = ct.outer.as_deref() {
            let (f, t) = self.type_bindings(outer);
            from.extend(f);
            to.extend(t);
        }
        (from, to)
    }

    /// The direct superclass type, with type arguments substituted.
    pub fn supertype(&self, ty: &Type) -> Option<Type> {
        match ty {
            Type::Class(ct) => {
                let decl = self.sym(ct.sym).class_info()?.supertype.clone()?;
                if self.is_raw(ty) {
                    Some(self.erasure(&decl))
                } else {
                    let (from, to) = self.type_bindings(ct);
                    Some(self.subst(&decl, &from, &to))
                }
            }
            Type::TypeVar(tv) => Some(self.bound(*tv)),
            Type::Array(elem) => match elem.as_ref() {
                e if e.is_reference() && !matches!(e, Type::TypeVar(_)) => {
                    self.supertype(e).map(Type::array).or_else(|| Some(self.object_type()))
                }
                _ => Some(self.object_type()),
            },
            _ => None,
        }
    }

    /// The directly implemented interfaces, with type arguments substituted.
    pub fn interfaces(&self, ty: &Type) -> Vec<Type> {
        match ty {
            Type::Class(ct) => {
                let Some(info) = self.sym(ct.sym).class_info() else { return Vec::new() };
                if self.is_raw(ty) {
                    info.interfaces.iter().map(|i| self.erasure(i)).collect()
                } else {
                    let (from, to) = self.type_bindings(ct);
                    info.interfaces.iter().map(|i| self.subst(i, &from, &to)).collect()
                }
            }
            Type::Array(_) => self.class_info(self.predef.array_class).interfaces.clone(),
            _ => Vec::new(),
        }
    }

    /// The supertype of `ty` whose class is `class`, if any.
    pub fn as_super(&self, ty: &Type, class: SymbolId) -> Option<Type> {
        match ty {
            Type::Class(ct) => {
                if ct.sym == class {
                    return Some(ty.clone());
                }
                if let Some(sup) = self.supertype(ty) {
                    if let Some(found) = self.as_super(&sup, class) {
                        return Some(found);
                    }
                }
                self.interfaces(ty).iter().find_map(|i| self.as_super(i, class))
            }
            Type::TypeVar(tv) => {
                if self.kind(class) == SymKind::TypeVar && *tv == class {
                    return Some(ty.clone());
                }
                self.as_super(&self.bound(*tv), class)
            }
            Type::Intersection(parts) => parts.iter().find_map(|p| self.as_super(p, class)),
            Type::Array(_) => {
                let p = &self.predef;
                if class == p.object || class == p.cloneable || class == p.serializable {
                    Some(Type::class(class))
                } else if class == p.array_class {
                    Some(ty.clone())
                } else {
                    None
                }
            }
            Type::Wildcard(_) => self.as_super(&self.upper_bound(ty), class),
            _ => None,
        }
    }

    /// Like [`as_super`](Self::as_super), also trying the enclosing
    /// instance types of `ty`.
    pub fn as_outer_super(&self, ty: &Type, class: SymbolId) -> Option<Type> {
        let mut cur = Some(ty.clone());
        while let Some(t) = cur {
            if let Some(found) = self.as_super(&t, class) {
                return Some(found);
            }
            cur = match t {
                Type::Class(ClassType { outer: Some(outer), .. }) => Some(*outer),
                _ => None,
            };
        }
        None
    }

    /// Whether class `c` is `base` or inherits from it.
    pub fn is_subclass(&self, c: SymbolId, base: SymbolId) -> bool {
        if c == base {
            return true;
        }
        let Some(info) = self.sym(c).class_info() else { return false };
        if info.supertype.as_ref().and_then(Type::class_sym).is_some_and(|s| self.is_subclass(s, base)) {
            return true;
        }
        info.interfaces.iter().filter_map(Type::class_sym).any(|i| self.is_subclass(i, base))
    }

    /// All supertypes of a class type including itself, subclasses first.
    pub fn closure(&self, ty: &Type) -> Vec<Type> {
        let mut out: Vec<Type> = Vec::new();
        let mut seen = FxHashSet::default();
        let mut work = vec![ty.clone()];
        while let Some(t) = work.pop() {
            let key = match &t {
                Type::Class(ct) => ct.sym,
                Type::TypeVar(tv) => *tv,
                _ => continue,
            };
            if !seen.insert(key) {
                continue;
            }
            let mut next: Vec<Type> = self.interfaces(&t);
            if let Some(sup) = self.supertype(&t) {
                next.push(sup);
            }
            out.push(t);
            work.extend(next.into_iter().rev());
        }
        out
    }

    // ── Substitution and member types ──────────────────────────────────

    /// Replace occurrences of the type variables `from` by `to`.
    pub fn subst(&self, ty: &Type, from: &[SymbolId], to: &[Type]) -> Type {
        if from.is_empty() {
            return ty.clone();
        }
        match ty {
            Type::TypeVar(tv) => match from.iter().position(|f| f == tv) {
                Some(i) => to.get(i).cloned().unwrap_or_else(|| ty.clone()),
                None => ty.clone(),
            },
            Type::Class(ct) => Type::Class(ClassType {
                sym: ct.sym,
                args: ct.args.iter().map(|a| self.subst(a, from, to)).collect(),
                outer: ct.outer.as_ref().map(|o| Box::new(self.subst(o, from, to))),
            }),
            Type::Array(elem) => Type::array(self.subst(elem, from, to)),
            Type::Wildcard(wc) => Type::Wildcard(Wildcard {
                kind: wc.kind,
                bound: wc.bound.as_ref().map(|b| Box::new(self.subst(b, from, to))),
            }),
            Type::Method(mt) => Type::Method(self.subst_method(mt, from, to)),
            Type::ForAll(fa) => Type::ForAll(ForAll {
                tvars: fa.tvars.clone(),
                mt: self.subst_method(&fa.mt, from, to),
            }),
            Type::Union(ts) => Type::Union(ts.iter().map(|t| self.subst(t, from, to)).collect()),
            Type::Intersection(ts) => {
                Type::Intersection(ts.iter().map(|t| self.subst(t, from, to)).collect())
            }
            _ => ty.clone(),
        }
    }

    fn subst_method(&self, mt: &MethodType, from: &[SymbolId], to: &[Type]) -> MethodType {
        MethodType {
            params: mt.params.iter().map(|p| self.subst(p, from, to)).collect(),
            ret: Box::new(self.subst(&mt.ret, from, to)),
            thrown: mt.thrown.iter().map(|t| self.subst(t, from, to)).collect(),
        }
    }

    /// The type of `member` as seen from `site`.
    ///
    /// Wildcard arguments of the site are approximated by their upper bound;
    /// a raw site yields the erased member type.
    pub fn member_type(&self, site: &Type, member: SymbolId) -> Type {
        let declared = self.ty(member).clone();
        let Some(owner) = self.owner_class(member) else { return declared };
        if self.is_static(member) && self.kind(member) != SymKind::Class {
            return declared;
        }
        let site = match site {
            Type::TypeVar(_) | Type::Wildcard(_) => self.upper_bound_class(site),
            other => other.clone(),
        };
        match self.as_outer_super(&site, owner) {
            Some(Type::Class(ct)) => {
                if self.is_raw(&Type::Class(ct.clone())) {
                    return self.erasure(&declared);
                }
                let (from, to) = self.type_bindings(&ct);
                let to: Vec<Type> = from
                    .iter()
                    .zip(to)
                    .map(|(tv, arg)| self.approximate_wildcard(&arg, *tv))
                    .collect();
                self.subst(&declared, &from, &to)
            }
            _ => declared,
        }
    }

    fn approximate_wildcard(&self, arg: &Type, tvar: SymbolId) -> Type {
        match arg {
            Type::Wildcard(Wildcard { kind: BoundKind::Extends, bound: Some(b) }) => (**b).clone(),
            Type::Wildcard(_) => self.erasure(&self.bound(tvar)),
            other => other.clone(),
        }
    }

    /// Upper bound of a wildcard; other types are returned unchanged.
    pub fn upper_bound(&self, ty: &Type) -> Type {
        match ty {
            Type::Wildcard(Wildcard { kind: BoundKind::Extends, bound: Some(b) }) => (**b).clone(),
            Type::Wildcard(_) => self.object_type(),
            other => other.clone(),
        }
    }

    /// Lower bound of a `? super` wildcard; other types are returned unchanged.
    pub fn lower_bound(&self, ty: &Type) -> Type {
        match ty {
            Type::Wildcard(Wildcard { kind: BoundKind::Super, bound: Some(b) }) => (**b).clone(),
            Type::Wildcard(_) => Type::Null,
            other => other.clone(),
        }
    }

    /// Follow type variable and wildcard bounds until a non-variable type.
    pub fn upper_bound_class(&self, ty: &Type) -> Type {
        let mut cur = self.upper_bound(ty);
        let mut steps = 0;
        while let Type::TypeVar(tv) = cur {
            cur = self.bound(tv);
            steps += 1;
            if steps > 64 {
                return self.object_type();
            }
        }
        match cur {
            Type::Intersection(parts) => parts.into_iter().next().unwrap_or_else(|| self.object_type()),
            other => other,
        }
    }

    // ── Erasure ────────────────────────────────────────────────────────

    pub fn erasure(&self, ty: &Type) -> Type {
        match ty {
            Type::Class(ct) => Type::class(ct.sym),
            Type::TypeVar(tv) => self.erasure(&self.bound_no_cycle(*tv)),
            Type::Array(elem) => Type::array(self.erasure(elem)),
            Type::Wildcard(_) => self.erasure(&self.upper_bound(ty)),
            Type::Method(mt) => Type::Method(self.erase_method(mt)),
            Type::ForAll(fa) => Type::Method(self.erase_method(&fa.mt)),
            Type::Intersection(parts) => match parts.first() {
                Some(first) => self.erasure(first),
                None => self.object_type(),
            },
            Type::Union(alts) => self.erasure(&self.lub(alts)),
            other => other.clone(),
        }
    }

    fn erase_method(&self, mt: &MethodType) -> MethodType {
        MethodType {
            params: mt.params.iter().map(|p| self.erasure(p)).collect(),
            ret: Box::new(self.erasure(&mt.ret)),
            thrown: mt.thrown.iter().map(|t| self.erasure(t)).collect(),
        }
    }

    /// A type variable's bound with self-referential chains cut off.
    fn bound_no_cycle(&self, tv: SymbolId) -> Type {
        let mut seen = vec![tv];
        let mut cur = self.bound(tv);
        while let Type::TypeVar(next) = cur {
            if seen.contains(&next) {
                return self.object_type();
            }
            seen.push(next);
            cur = self.bound(next);
        }
        cur
    }

    /// The erased type of a symbol.
    pub fn erased_sym_type(&self, sym: SymbolId) -> Type {
        self.erasure(self.ty(sym))
    }

    pub fn is_reifiable(&self, ty: &Type) -> bool {
        match ty {
            Type::Prim(_) | Type::Void | Type::Null | Type::Error => true,
            Type::Class(ct) => {
                ct.args.iter().all(|a| {
                    matches!(a, Type::Wildcard(Wildcard { kind: BoundKind::Unbound, .. }))
                }) && ct.outer.as_deref().map_or(true, |o| self.is_reifiable(o))
            }
            Type::Array(elem) => self.is_reifiable(elem),
            _ => false,
        }
    }

    // ── Sameness and subtyping ─────────────────────────────────────────

    pub fn is_same_type(&self, t: &Type, s: &Type) -> bool {
        match (t, s) {
            (Type::Error, _) | (_, Type::Error) => true,
            (Type::Class(a), Type::Class(b)) => {
                a.sym == b.sym
                    && a.args.len() == b.args.len()
                    && a.args.iter().zip(&b.args).all(|(x, y)| self.is_same_type(x, y))
                    && match (&a.outer, &b.outer) {
                        (Some(x), Some(y)) => self.is_same_type(x, y),
                        _ => true,
                    }
            }
            (Type::Array(a), Type::Array(b)) => self.is_same_type(a, b),
            (Type::Wildcard(a), Type::Wildcard(b)) => {
                let bound_of = |w: &Wildcard| match w.kind {
                    BoundKind::Unbound => (BoundKind::Extends, self.object_type()),
                    kind => (kind, w.bound.as_deref().cloned().unwrap_or_else(|| self.object_type())),
                };
                let (ka, ba) = bound_of(a);
                let (kb, bb) = bound_of(b);
                ka == kb && self.is_same_type(&ba, &bb)
            }
            (Type::Method(a), Type::Method(b)) => {
                a.params.len() == b.params.len()
                    && a.params.iter().zip(&b.params).all(|(x, y)| self.is_same_type(x, y))
                    && self.is_same_type(&a.ret, &b.ret)
            }
            (Type::Union(a), Type::Union(b)) | (Type::Intersection(a), Type::Intersection(b)) => {
                a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| self.is_same_type(x, y)))
            }
            _ => t == s,
        }
    }

    /// Subtyping, including primitive widening.
    pub fn is_subtype(&self, t: &Type, s: &Type) -> bool {
        self.is_subtype_impl(t, s, false)
    }

    /// Subtyping that also admits unchecked conversion from a raw type to
    /// any parameterization of it.
    pub fn is_subtype_unchecked(&self, t: &Type, s: &Type) -> bool {
        self.is_subtype_impl(t, s, true)
    }

    fn is_subtype_impl(&self, t: &Type, s: &Type, unchecked: bool) -> bool {
        if t.is_error() || s.is_error() || s.is_none() {
            return true;
        }
        match (t, s) {
            (Type::Prim(a), Type::Prim(b)) => a.widens_to(*b),
            (Type::Prim(_), _) | (_, Type::Prim(_)) => false,
            (Type::Void, Type::Void) => true,
            (Type::Void, _) | (_, Type::Void) => false,
            (Type::Null, _) => s.is_reference(),
            (_, Type::Intersection(parts)) => parts.iter().all(|p| self.is_subtype_impl(t, p, unchecked)),
            (Type::Union(alts), _) => alts.iter().all(|a| self.is_subtype_impl(a, s, unchecked)),
            (Type::Intersection(parts), _) => parts.iter().any(|p| self.is_subtype_impl(p, s, unchecked)),
            (Type::TypeVar(a), Type::TypeVar(b)) if a == b => true,
            (Type::TypeVar(a), _) => self.is_subtype_impl(&self.bound_no_cycle(*a), s, unchecked),
            (Type::Wildcard(_), _) => self.is_subtype_impl(&self.upper_bound(t), s, unchecked),
            (_, Type::TypeVar(_)) => false,
            (Type::Array(a), Type::Array(b)) => match (a.as_ref(), b.as_ref()) {
                (Type::Prim(x), Type::Prim(y)) => x == y,
                (x, y) if x.is_reference() && y.is_reference() => self.is_subtype_impl(x, y, unchecked),
                _ => false,
            },
            (Type::Array(_), Type::Class(ct)) => {
                let p = &self.predef;
                ct.sym == p.object || ct.sym == p.cloneable || ct.sym == p.serializable
            }
            (Type::Class(_), Type::Class(sc)) => {
                let Some(sup) = self.as_super(t, sc.sym) else { return false };
                if sc.args.is_empty() {
                    return true;
                }
                if self.is_raw(&sup) {
                    return unchecked;
                }
                sup.type_args().len() == sc.args.len()
                    && sup.type_args().iter().zip(&sc.args).all(|(a, b)| self.contains_type(a, b))
            }
            _ => false,
        }
    }

    /// Whether the type argument `s` contains the type argument `t`.
    pub fn contains_type(&self, t: &Type, s: &Type) -> bool {
        match s {
            Type::Wildcard(w) => match w.kind {
                BoundKind::Unbound => true,
                BoundKind::Extends => {
                    let bound = w.bound.as_deref().cloned().unwrap_or_else(|| self.object_type());
                    self.is_subtype(&self.upper_bound(t), &bound)
                }
                BoundKind::Super => {
                    let bound = w.bound.as_deref().cloned().unwrap_or(Type::Null);
                    let lower = self.lower_bound(t);
                    !matches!(t, Type::Wildcard(w2) if w2.kind != BoundKind::Super)
                        && self.is_subtype(&bound, &lower)
                }
            },
            _ => !matches!(t, Type::Wildcard(_)) && self.is_same_type(t, s),
        }
    }

    // ── Boxing and conversions ─────────────────────────────────────────

    pub fn boxed_type(&self, prim: Prim) -> Type {
        Type::class(self.predef.boxed_class(prim))
    }

    /// The primitive a boxed reference type unboxes to.
    pub fn unboxed_type(&self, ty: &Type) -> Option<Prim> {
        let bound = self.upper_bound_class(ty);
        let p = &self.predef;
        p.boxed.iter().find_map(|b| {
            self.as_super(&bound, *b).and_then(|_| p.unboxed_prim(*b))
        })
    }

    /// Method invocation conversion. Boxing and unboxing are only considered
    /// when `allow_boxing` is set.
    pub fn is_convertible(&self, t: &Type, s: &Type, allow_boxing: bool) -> bool {
        if t.is_error() || s.is_error() {
            return true;
        }
        match (t.is_prim(), s.is_prim()) {
            (true, true) | (false, false) => self.is_subtype_unchecked(t, s),
            (true, false) => {
                allow_boxing && t.prim().is_some_and(|p| self.is_subtype(&self.boxed_type(p), s))
            }
            (false, true) => {
                allow_boxing
                    && match (self.unboxed_type(t), s.prim()) {
                        (Some(from), Some(to)) => from.widens_to(to),
                        _ => false,
                    }
            }
        }
    }

    /// Assignment conversion: invocation conversion plus narrowing of
    /// constant `int` expressions into `byte`, `short` and `char` (or their
    /// boxes).
    pub fn is_assignable(&self, t: &Type, s: &Type, constant: Option<&Constant>, allow_boxing: bool) -> bool {
        if let (Some(Prim::Int | Prim::Short | Prim::Char | Prim::Byte), Some(value)) = (t.prim(), constant) {
            let target = match s {
                Type::Prim(p) => Some(*p),
                Type::Class(ct) if allow_boxing => self.predef.unboxed_prim(ct.sym),
                _ => None,
            };
            if let Some(target) = target {
                if target.is_subrange() && value.fits(target) {
                    return true;
                }
            }
        }
        self.is_convertible(t, s, allow_boxing)
    }

    /// Whether a cast from `t` to `s` is legal.
    pub fn is_castable(&self, t: &Type, s: &Type) -> bool {
        if t.is_error() || s.is_error() || self.is_same_type(t, s) {
            return true;
        }
        match (t, s) {
            (Type::Prim(a), Type::Prim(b)) => a.is_numeric() == b.is_numeric(),
            (Type::Prim(p), _) => self.is_subtype(&self.boxed_type(*p), s),
            (_, Type::Prim(p)) => match self.unboxed_type(t) {
                Some(from) => from.widens_to(*p),
                None => self.is_subtype(&self.boxed_type(*p), &self.erasure(t)),
            },
            (Type::Null, _) => s.is_reference(),
            (Type::Void, _) | (_, Type::Void) => false,
            _ => {
                let et = self.erasure(t);
                let es = self.erasure(s);
                if self.is_subtype(&et, &es) || self.is_subtype(&es, &et) {
                    return true;
                }
                match (&et, &es) {
                    (Type::Array(a), Type::Array(b)) => {
                        a.is_reference() && b.is_reference() && self.is_castable(a, b)
                    }
                    (Type::Class(a), Type::Class(b)) => {
                        let final_a = self.flags(a.sym).contains(Flags::FINAL);
                        let final_b = self.flags(b.sym).contains(Flags::FINAL);
                        (self.is_interface(a.sym) && !final_b) || (self.is_interface(b.sym) && !final_a)
                    }
                    _ => false,
                }
            }
        }
    }

    // ── Least upper bound ──────────────────────────────────────────────

    /// Least upper bound of reference types. Type arguments that differ
    /// between the inputs become unbounded wildcards.
    pub fn lub(&self, tys: &[Type]) -> Type {
        let tys: Vec<&Type> = tys.iter().filter(|t| !matches!(t, Type::Null)).collect();
        if tys.iter().any(|t| t.is_error()) {
            return Type::Error;
        }
        let Some(first) = tys.first() else { return Type::Null };
        if tys.iter().all(|t| self.is_same_type(t, first)) {
            return (*first).clone();
        }
        if tys.iter().all(|t| t.is_array()) {
            let elems: Vec<Type> = tys.iter().filter_map(|t| t.elem_type().cloned()).collect();
            if elems.iter().all(Type::is_reference) {
                return Type::array(self.lub(&elems));
            }
            if elems.iter().all(|e| e == &elems[0]) {
                return (*first).clone();
            }
            return self.object_type();
        }
        for t in &tys {
            if tys.iter().all(|u| self.is_subtype(u, t)) {
                return (*t).clone();
            }
        }

        // Erased candidates: classes every input inherits from.
        let closures: Vec<Vec<Type>> = tys
            .iter()
            .map(|t| self.closure(&self.upper_bound_class(t)))
            .collect();
        let mut candidates: Vec<SymbolId> = closures[0].iter().filter_map(Type::class_sym).collect();
        for cl in &closures[1..] {
            candidates.retain(|c| cl.iter().any(|t| t.class_sym() == Some(*c)));
        }
        let minimal: Vec<SymbolId> = candidates
            .iter()
            .copied()
            .filter(|c| !candidates.iter().any(|d| d != c && self.is_subclass(*d, *c)))
            .collect();

        let mut parts: Vec<Type> = minimal
            .iter()
            .map(|c| {
                let supers: Vec<Type> = tys.iter().filter_map(|t| self.as_super(&self.upper_bound_class(t), *c)).collect();
                let head = &supers[0];
                if supers.iter().any(|s| self.is_raw(s)) {
                    Type::class(*c)
                } else if supers.iter().all(|s| self.is_same_type(s, head)) {
                    head.clone()
                } else {
                    let args = head
                        .type_args()
                        .iter()
                        .enumerate()
                        .map(|(i, a)| {
                            if supers.iter().all(|s| s.type_args().get(i).is_some_and(|b| self.is_same_type(a, b))) {
                                a.clone()
                            } else {
                                Type::Wildcard(Wildcard { kind: BoundKind::Unbound, bound: None })
                            }
                        })
                        .collect();
                    Type::class_with(*c, args)
                }
            })
            .collect();
        // Classes before interfaces.
        parts.sort_by_key(|p| p.class_sym().is_some_and(|c| self.is_interface(c)));
        match parts.len() {
            0 => self.object_type(),
            1 => parts.remove(0),
            _ => Type::Intersection(parts),
        }
    }

    // ── Method signatures ──────────────────────────────────────────────

    /// Whether two method types have the same parameter types, after
    /// renaming the type variables of `s` to those of `t`.
    pub fn has_same_args(&self, t: &Type, s: &Type) -> bool {
        let s = match (t, s) {
            (Type::ForAll(ft), Type::ForAll(fs)) if ft.tvars.len() == fs.tvars.len() => {
                let to: Vec<Type> = ft.tvars.iter().map(|v| Type::TypeVar(*v)).collect();
                self.subst(&Type::Method(fs.mt.clone()), &fs.tvars, &to)
            }
            _ => s.clone(),
        };
        let (tp, sp) = (t.params(), s.params());
        tp.len() == sp.len() && tp.iter().zip(sp).all(|(a, b)| self.is_same_type(a, b))
    }

    /// Whether `t`'s signature is a subsignature of `s`'s.
    pub fn is_sub_signature(&self, t: &Type, s: &Type) -> bool {
        self.has_same_args(t, s) || self.has_same_args(t, &self.erasure(s))
    }

    pub fn override_equivalent(&self, t: &Type, s: &Type) -> bool {
        self.has_same_args(t, s) || self.is_sub_signature(t, s) || self.is_sub_signature(s, t)
    }

    /// Whether a method returning `r1` may override one returning `r2`.
    pub fn return_type_substitutable(&self, r1: &Type, r2: &Type, covariant: bool) -> bool {
        if r1.is_prim() || r1.is_void() || r2.is_prim() || r2.is_void() {
            return self.is_same_type(r1, r2);
        }
        if self.is_same_type(r1, r2) {
            return true;
        }
        covariant && (self.is_subtype_unchecked(r1, r2) || self.is_same_type(r1, &self.erasure(r2)))
    }

    /// Whether method `m` overrides `other` when viewed as members of
    /// `origin`.
    pub fn overrides(&self, m: SymbolId, other: SymbolId, origin: SymbolId, check_result: bool) -> bool {
        if m == other
            || self.kind(m) != SymKind::Method
            || self.kind(other) != SymKind::Method
            || self.name(m) != self.name(other)
            || self.is_constructor(m)
            || self.flags(other).intersects(Flags::PRIVATE | Flags::STATIC)
            || self.flags(m).contains(Flags::STATIC)
        {
            return false;
        }
        let (Some(mo), Some(oo)) = (self.owner_class(m), self.owner_class(other)) else { return false };
        if !self.is_subclass(mo, oo) && !(self.is_interface(oo) && self.is_subclass(origin, oo)) {
            return false;
        }
        if !self.is_inherited_in(other, mo) && !self.is_interface(oo) {
            return false;
        }
        let site = self.ty(origin).clone();
        let mt = self.member_type(&site, m);
        let ot = self.member_type(&site, other);
        if !self.is_sub_signature(&mt, &ot) {
            return false;
        }
        !check_result || self.return_type_substitutable(&mt.ret(), &ot.ret(), true)
    }

    /// The method that runs when `m` is invoked on an instance of `origin`.
    pub fn implementation(&self, m: SymbolId, origin: SymbolId) -> Option<SymbolId> {
        let name = self.name(m).to_string();
        let mut cur = Some(origin);
        while let Some(c) = cur {
            for e in self.members(c).lookup(&name) {
                if self.kind(e) != SymKind::Method || self.flags(e).contains(Flags::HYPOTHETICAL) {
                    continue;
                }
                if e == m || self.overrides(e, m, origin, false) {
                    if self.flags(e).contains(Flags::SYNTHETIC) && !self.flags(e).contains(Flags::OVERRIDE_BRIDGE) {
                        continue;
                    }
                    return Some(e);
                }
            }
            cur = self.superclass_sym(c);
        }
        // Inherited only through interfaces.
        self.interface_implementation(m, origin, &name)
    }

    fn interface_implementation(&self, m: SymbolId, origin: SymbolId, name: &str) -> Option<SymbolId> {
        for t in self.closure(self.ty(origin)) {
            let Some(c) = t.class_sym() else { continue };
            if !self.is_interface(c) {
                continue;
            }
            for e in self.members(c).lookup(name) {
                if e == m || self.overrides(e, m, origin, false) {
                    return Some(e);
                }
            }
        }
        None
    }

    pub fn superclass_sym(&self, class: SymbolId) -> Option<SymbolId> {
        self.sym(class).class_info()?.supertype.as_ref()?.class_sym()
    }

    /// Whether `member` is inherited into `class`.
    pub fn is_inherited_in(&self, member: SymbolId, class: SymbolId) -> bool {
        let flags = self.flags(member);
        let Some(owner) = self.owner(member) else { return false };
        if flags.contains(Flags::PUBLIC) {
            return true;
        }
        if flags.contains(Flags::PRIVATE) {
            return owner == class;
        }
        if flags.contains(Flags::PROTECTED) {
            return !self.is_interface(class) || owner == class;
        }
        // Package access: every class between `class` and `owner` must be
        // in the owner's package.
        if self.is_interface(class) && owner != class {
            return false;
        }
        let pkg = self.package_of(owner);
        let mut cur = Some(class);
        while let Some(c) = cur {
            if c == owner {
                return true;
            }
            if self.package_of(c) != pkg {
                return false;
            }
            cur = self.superclass_sym(c);
        }
        self.package_of(class) == pkg
    }

    // ── Exceptions ─────────────────────────────────────────────────────

    pub fn is_throwable(&self, ty: &Type) -> bool {
        ty.is_error() || self.is_subtype(ty, &Type::class(self.predef.throwable))
    }

    /// Exceptions the compiler requires to be caught or declared.
    pub fn is_checked_exception(&self, ty: &Type) -> bool {
        let p = &self.predef;
        self.is_throwable(ty)
            && !ty.is_error()
            && !self.is_subtype(ty, &Type::class(p.runtime_exception))
            && !self.is_subtype(ty, &Type::class(p.error))
    }

    /// Element type of a variable-arity method's trailing array parameter.
    pub fn varargs_elem(&self, method_ty: &Type) -> Option<Type> {
        method_ty.params().last().and_then(Type::elem_type).cloned()
    }

    /// The class symbol used for member lookup on `site`: the array
    /// pseudo-class for arrays, the bound's class for type variables.
    pub fn site_class(&self, site: &Type) -> Option<SymbolId> {
        match site {
            Type::Array(_) => Some(self.predef.array_class),
            Type::Class(ct) => Some(ct.sym),
            Type::TypeVar(_) | Type::Wildcard(_) | Type::Intersection(_) => {
                self.upper_bound_class(site).class_sym()
            }
            _ => None,
        }
    }

    /// Whether `name` is one of the pseudo-members arrays understand.
    pub fn is_array_member_name(name: &str) -> bool {
        name == names::LENGTH || name == names::CLONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `class Box<T> { T get(); }` and `class IntBox extends Box<Integer>`.
    fn boxes() -> (Symtab, SymbolId, SymbolId, SymbolId) {
        let mut syms = Symtab::new();
        let pkg = syms.enter_package("");
        let bx = syms.enter_class(pkg, "Box", Flags::EMPTY);
        let t = syms.new_type_var(bx, "T");
        syms.set_bound(t, syms.object_type());
        syms.set_class_type_params(bx, vec![t]);
        syms.set_supertypes(bx, Some(syms.object_type()), vec![]);
        let get = syms.new_method(bx, "get", Flags::PUBLIC, Type::method(vec![], Type::TypeVar(t)), vec![]);
        syms.enter_member(bx, get);
        let int_box = syms.enter_class(pkg, "IntBox", Flags::EMPTY);
        let integer = syms.boxed_type(Prim::Int);
        syms.set_supertypes(int_box, Some(Type::class_with(bx, vec![integer])), vec![]);
        (syms, bx, int_box, get)
    }

    #[test]
    fn member_type_substitutes_through_supertypes() {
        let (syms, _, int_box, get) = boxes();
        let mt = syms.member_type(&Type::class(int_box), get);
        assert_eq!(mt.ret(), syms.boxed_type(Prim::Int));
    }

    #[test]
    fn raw_site_erases_member() {
        let (syms, bx, _, get) = boxes();
        let mt = syms.member_type(&Type::class(bx), get);
        assert_eq!(mt.ret(), syms.object_type());
    }

    #[test]
    fn erasure_is_idempotent() {
        let (syms, bx, _, get) = boxes();
        let ty = syms.ty(get).clone();
        let once = syms.erasure(&ty);
        assert_eq!(syms.erasure(&once), once);
        let boxed = Type::class_with(bx, vec![syms.string_type()]);
        assert_eq!(syms.erasure(&syms.erasure(&boxed)), Type::class(bx));
    }

    #[test]
    fn parameterized_subtyping_is_invariant() {
        let (syms, bx, int_box, _) = boxes();
        let box_int = Type::class_with(bx, vec![syms.boxed_type(Prim::Int)]);
        let box_num = Type::class_with(bx, vec![Type::class(syms.predef.number)]);
        let box_ext_num = Type::class_with(
            bx,
            vec![Type::Wildcard(Wildcard {
                kind: BoundKind::Extends,
                bound: Some(Box::new(Type::class(syms.predef.number))),
            })],
        );
        assert!(syms.is_subtype(&Type::class(int_box), &box_int));
        assert!(!syms.is_subtype(&box_int, &box_num));
        assert!(syms.is_subtype(&box_int, &box_ext_num));
        assert!(!syms.is_subtype(&Type::class(bx), &box_int));
        assert!(syms.is_subtype_unchecked(&Type::class(bx), &box_int));
    }

    #[test]
    fn boxing_conversions() {
        let syms = Symtab::new();
        let integer = syms.boxed_type(Prim::Int);
        assert!(!syms.is_convertible(&Type::int(), &integer, false));
        assert!(syms.is_convertible(&Type::int(), &integer, true));
        assert!(syms.is_convertible(&Type::int(), &syms.object_type(), true));
        assert!(syms.is_convertible(&integer, &Type::Prim(Prim::Long), true));
        assert!(!syms.is_convertible(&integer, &Type::Prim(Prim::Short), true));
    }

    #[test]
    fn constant_narrowing_in_assignment() {
        let syms = Symtab::new();
        let byte = Type::Prim(Prim::Byte);
        assert!(syms.is_assignable(&Type::int(), &byte, Some(&Constant::Int(12)), true));
        assert!(!syms.is_assignable(&Type::int(), &byte, Some(&Constant::Int(1000)), true));
        assert!(!syms.is_assignable(&Type::int(), &byte, None, true));
        let character = syms.boxed_type(Prim::Char);
        assert!(syms.is_assignable(&Type::int(), &character, Some(&Constant::Int(65)), true));
    }

    #[test]
    fn lub_of_boxes_is_number_and_comparable() {
        let syms = Symtab::new();
        let lub = syms.lub(&[syms.boxed_type(Prim::Int), syms.boxed_type(Prim::Long)]);
        let Type::Intersection(parts) = &lub else { panic!("expected intersection, got {:?}", lub) };
        assert_eq!(parts[0], Type::class(syms.predef.number));
        assert_eq!(parts[1].class_sym(), Some(syms.predef.comparable));
        assert_eq!(syms.lub(&[syms.string_type(), Type::Null]), syms.string_type());
    }

    #[test]
    fn casts() {
        let syms = Symtab::new();
        let object = syms.object_type();
        let string = syms.string_type();
        assert!(syms.is_castable(&object, &string));
        assert!(!syms.is_castable(&string, &syms.boxed_type(Prim::Int)));
        assert!(syms.is_castable(&Type::Prim(Prim::Double), &Type::Prim(Prim::Byte)));
        assert!(!syms.is_castable(&Type::boolean(), &Type::int()));
        assert!(syms.is_castable(&object, &Type::int()));
    }

    #[test]
    fn overriding_through_parameterized_supertype() {
        let (mut syms, _, int_box, get) = boxes();
        let integer = syms.boxed_type(Prim::Int);
        let get2 = syms.new_method(int_box, "get", Flags::PUBLIC, Type::method(vec![], integer), vec![]);
        syms.enter_member(int_box, get2);
        assert!(syms.overrides(get2, get, int_box, true));
        assert_eq!(syms.implementation(get, int_box), Some(get2));
    }
}
