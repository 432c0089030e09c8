//! Type argument inference for generic method calls.
//!
//! Each type variable of the method becomes an [`InferVar`] in an `ena`
//! union-find table. Walking the formal parameter types against the
//! actual argument types records equality, lower and upper bounds on the
//! variables; two variables constrained to be equal are unified and share
//! their bounds. Variables are then solved one root at a time: an equality
//! bound wins, otherwise the lub of the lower bounds, otherwise the most
//! specific upper bound. Variables the arguments say nothing about may be
//! inferred from the expected result type.

use ena::unify::{InPlaceUnificationTable, NoError, UnifyKey, UnifyValue};
use rustc_hash::FxHashSet;
use tracing::trace;

use cinder_symtab::{BoundKind, ForAll, MethodType, SymbolId, Symtab, Type, Wildcard};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct InferVar(u32);

/// Constraints collected for one variable (or unified group).
#[derive(Clone, Debug, Default)]
struct Bounds {
    eq: Vec<Type>,
    lower: Vec<Type>,
    upper: Vec<Type>,
}

impl Bounds {
    fn is_empty(&self) -> bool {
        self.eq.is_empty() && self.lower.is_empty() && self.upper.is_empty()
    }
}

// ── ena trait implementations ──────────────────────────────────────────

impl UnifyKey for InferVar {
    type Value = Bounds;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        InferVar(u)
    }

    fn tag() -> &'static str {
        "InferVar"
    }
}

impl UnifyValue for Bounds {
    type Error = NoError;

    fn unify_values(a: &Self, b: &Self) -> Result<Self, NoError> {
        let mut out = a.clone();
        out.eq.extend(b.eq.iter().cloned());
        out.lower.extend(b.lower.iter().cloned());
        out.upper.extend(b.upper.iter().cloned());
        Ok(out)
    }
}

// ── Constraint collection ──────────────────────────────────────────────

/// How the known type relates to the type mentioning variables.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Rel {
    /// known <: formal
    Sub,
    /// formal <: known
    Super,
    Eq,
}

struct Inference<'a> {
    syms: &'a Symtab,
    tvars: &'a [SymbolId],
    table: InPlaceUnificationTable<InferVar>,
    keys: Vec<InferVar>,
    /// When set, bounds are only recorded on these roots.
    only: Option<FxHashSet<InferVar>>,
}

impl<'a> Inference<'a> {
    fn new(syms: &'a Symtab, tvars: &'a [SymbolId]) -> Self {
        let mut table = InPlaceUnificationTable::new();
        let keys = tvars.iter().map(|_| table.new_key(Bounds::default())).collect();
        Inference { syms, tvars, table, keys, only: None }
    }

    fn var_of(&self, ty: &Type) -> Option<InferVar> {
        match ty {
            Type::TypeVar(tv) => self.tvars.iter().position(|t| t == tv).map(|i| self.keys[i]),
            _ => None,
        }
    }

    fn mentions_var(&self, ty: &Type) -> bool {
        match ty {
            Type::TypeVar(tv) => self.tvars.contains(tv),
            Type::Class(ct) => ct.args.iter().any(|a| self.mentions_var(a)),
            Type::Array(elem) => self.mentions_var(elem),
            Type::Wildcard(w) => w.bound.as_deref().is_some_and(|b| self.mentions_var(b)),
            Type::Intersection(parts) => parts.iter().any(|p| self.mentions_var(p)),
            _ => false,
        }
    }

    fn add_bound(&mut self, var: InferVar, rel: Rel, ty: &Type) {
        if matches!(ty, Type::Null | Type::Error | Type::None) || ty.is_prim() {
            return;
        }
        if let Some(other) = self.var_of(ty) {
            if rel == Rel::Eq {
                self.table.union(var, other);
            }
            return;
        }
        if let Some(only) = &self.only {
            if !only.contains(&self.table.find(var)) {
                return;
            }
        }
        trace!(var = var.0, ?rel, ty = %self.syms.display(ty), "bound");
        let mut bounds = Bounds::default();
        match rel {
            Rel::Eq => bounds.eq.push(ty.clone()),
            Rel::Sub => bounds.lower.push(ty.clone()),
            Rel::Super => bounds.upper.push(ty.clone()),
        }
        self.table.union_value(var, bounds);
    }

    /// Record what `known REL formal` says about the variables in
    /// `formal`.
    fn constrain(&mut self, known: &Type, formal: &Type, rel: Rel) {
        if !self.mentions_var(formal) {
            return;
        }
        if let Some(var) = self.var_of(formal) {
            self.add_bound(var, rel, known);
            return;
        }
        match formal {
            Type::Array(felem) => {
                let kelem = match known {
                    Type::Array(e) => (**e).clone(),
                    _ => return,
                };
                if kelem.is_reference() || rel == Rel::Eq {
                    self.constrain(&kelem, felem, rel);
                }
            }
            Type::Class(fc) => match rel {
                Rel::Sub => {
                    let base = match known {
                        Type::TypeVar(_) | Type::Wildcard(_) => self.syms.upper_bound_class(known),
                        other => other.clone(),
                    };
                    let Some(sup) = self.syms.as_super(&base, fc.sym) else { return };
                    if self.syms.is_raw(&sup) {
                        return;
                    }
                    let pairs: Vec<(Type, Type)> =
                        sup.type_args().iter().cloned().zip(fc.args.iter().cloned()).collect();
                    for (k, f) in pairs {
                        self.constrain_arg(&k, &f);
                    }
                }
                Rel::Super => {
                    let Some(kc) = known.as_class() else { return };
                    let Some(sup) = self.syms.as_super(formal, kc.sym) else { return };
                    let pairs: Vec<(Type, Type)> =
                        kc.args.iter().cloned().zip(sup.type_args().iter().cloned()).collect();
                    for (k, f) in pairs {
                        match &k {
                            Type::Wildcard(Wildcard { kind: BoundKind::Extends, bound: Some(b) }) => {
                                self.constrain(b, &f, Rel::Super)
                            }
                            Type::Wildcard(Wildcard { kind: BoundKind::Super, bound: Some(b) }) => {
                                self.constrain(b, &f, Rel::Sub)
                            }
                            Type::Wildcard(_) => {}
                            _ => self.constrain(&k, &f, Rel::Eq),
                        }
                    }
                }
                Rel::Eq => {
                    let Some(kc) = known.as_class() else { return };
                    if kc.sym != fc.sym || kc.args.len() != fc.args.len() {
                        return;
                    }
                    let pairs: Vec<(Type, Type)> = kc.args.iter().cloned().zip(fc.args.iter().cloned()).collect();
                    for (k, f) in pairs {
                        match (&k, &f) {
                            (Type::Wildcard(kw), Type::Wildcard(fw)) if kw.kind == fw.kind => {
                                if let (Some(kb), Some(fb)) = (&kw.bound, &fw.bound) {
                                    self.constrain(kb, fb, Rel::Eq);
                                }
                            }
                            _ => self.constrain(&k, &f, Rel::Eq),
                        }
                    }
                }
            },
            Type::Wildcard(w) => {
                if let Some(b) = &w.bound {
                    let rel = if w.kind == BoundKind::Super { Rel::Super } else { rel };
                    self.constrain(known, b, rel);
                }
            }
            _ => {}
        }
    }

    /// A type argument `known` of the actual type against the formal type
    /// argument `formal`.
    fn constrain_arg(&mut self, known: &Type, formal: &Type) {
        match formal {
            Type::Wildcard(Wildcard { kind: BoundKind::Extends, bound: Some(b) }) => {
                if !matches!(known, Type::Wildcard(Wildcard { kind: BoundKind::Super, .. })) {
                    let upper = self.syms.upper_bound(known);
                    self.constrain(&upper, b, Rel::Sub);
                }
            }
            Type::Wildcard(Wildcard { kind: BoundKind::Super, bound: Some(b) }) => {
                if let Type::Wildcard(Wildcard { kind: BoundKind::Super, bound: Some(kb) }) = known {
                    self.constrain(kb, b, Rel::Super);
                } else if !matches!(known, Type::Wildcard(_)) {
                    self.constrain(known, b, Rel::Super);
                }
            }
            Type::Wildcard(_) => {}
            _ => self.constrain(known, formal, Rel::Eq),
        }
    }

    fn roots(&mut self) -> Vec<InferVar> {
        let mut seen = FxHashSet::default();
        let keys = self.keys.clone();
        keys.into_iter().map(|k| self.table.find(k)).filter(|r| seen.insert(*r)).collect()
    }

    /// A solution for the group rooted at `root`, or `None` when it is
    /// unconstrained.
    fn solve_root(&mut self, root: InferVar) -> Result<Option<Type>, String> {
        let bounds = self.table.probe_value(root);
        let syms = self.syms;
        if let Some(first) = bounds.eq.first() {
            if let Some(other) = bounds.eq.iter().find(|t| !syms.is_same_type(t, first)) {
                return Err(format!(
                    "inferred type does not conform to equality constraint(s) {}, {}",
                    syms.display(first),
                    syms.display(other)
                ));
            }
            return Ok(Some(first.clone()));
        }
        if !bounds.lower.is_empty() {
            return Ok(Some(syms.lub(&bounds.lower)));
        }
        if !bounds.upper.is_empty() {
            let glb = bounds
                .upper
                .iter()
                .find(|u| bounds.upper.iter().all(|v| syms.is_subtype(u, v)))
                .unwrap_or(&bounds.upper[0]);
            return Ok(Some(glb.clone()));
        }
        Ok(None)
    }
}

// ── Entry point ────────────────────────────────────────────────────────

/// Infer the type arguments of the generic method type `fa` for a call
/// with `actuals` and return the instantiated method type.
///
/// Argument applicability is not checked here; the caller checks the
/// instantiated parameter types against the actuals. Bounds of the type
/// variables are checked.
pub fn infer_method(
    syms: &Symtab,
    fa: &ForAll,
    actuals: &[Type],
    boxing: bool,
    varargs: bool,
    expected: Option<&Type>,
) -> Result<MethodType, String> {
    let mut cx = Inference::new(syms, &fa.tvars);
    let formals = &fa.mt.params;
    let fixed = if varargs { formals.len().saturating_sub(1) } else { formals.len() };
    let pairs = actuals.iter().enumerate().map(|(i, a)| {
        let f = if i < fixed { formals.get(i).cloned() } else { formals.last().and_then(Type::elem_type).cloned() };
        (a, f)
    });
    for (actual, formal) in pairs {
        let Some(formal) = formal else { continue };
        let actual = match actual.prim() {
            Some(p) if boxing && cx.var_of(&formal).is_some() => syms.boxed_type(p),
            _ => actual.clone(),
        };
        cx.constrain(&actual, &formal, Rel::Sub);
    }

    if let Some(expected) = expected.filter(|t| !t.is_none() && !t.is_void() && !t.is_error()) {
        let mut unconstrained = FxHashSet::default();
        for root in cx.roots() {
            if cx.table.probe_value(root).is_empty() {
                unconstrained.insert(root);
            }
        }
        if !unconstrained.is_empty() {
            let expected = match expected.prim() {
                Some(p) => syms.boxed_type(p),
                None => expected.clone(),
            };
            cx.only = Some(unconstrained);
            cx.constrain(&expected, &fa.mt.ret, Rel::Super);
            cx.only = None;
        }
    }

    let mut solutions = Vec::with_capacity(fa.tvars.len());
    for (i, tv) in fa.tvars.iter().enumerate() {
        let root = cx.table.find(cx.keys[i]);
        let solved = match cx.solve_root(root)? {
            Some(t) => t,
            None => {
                let bound = syms.bound(*tv);
                if cx.mentions_var(&bound) { syms.erasure(&bound) } else { bound }
            }
        };
        solutions.push(solved);
    }

    for (tv, solved) in fa.tvars.iter().zip(&solutions) {
        let bound = syms.subst(&syms.bound(*tv), &fa.tvars, &solutions);
        if !syms.is_subtype_unchecked(solved, &bound) {
            return Err(format!(
                "inferred type {} does not conform to declared bound(s) {}",
                syms.display(solved),
                syms.display(&bound)
            ));
        }
    }

    match syms.subst(&Type::Method(fa.mt.clone()), &fa.tvars, &solutions) {
        Type::Method(mt) => Ok(mt),
        _ => Ok(fa.mt.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_symtab::{Flags, Prim};

    fn generic(syms: &mut Symtab, bound: Option<Type>) -> SymbolId {
        let pkg = syms.enter_package("p");
        let c = syms.enter_class(pkg, "G", Flags::PUBLIC);
        let tv = syms.new_type_var(c, "T");
        let bound = bound.unwrap_or_else(|| syms.object_type());
        syms.set_bound(tv, bound);
        tv
    }

    fn forall(tv: SymbolId, params: Vec<Type>, ret: Type) -> ForAll {
        ForAll { tvars: vec![tv], mt: MethodType::new(params, ret, vec![]) }
    }

    #[test]
    fn infers_from_a_plain_argument() {
        let mut syms = Symtab::new();
        let t = generic(&mut syms, None);
        let fa = forall(t, vec![Type::TypeVar(t)], Type::TypeVar(t));
        let string = syms.string_type();
        let mt = infer_method(&syms, &fa, &[string.clone()], false, false, None).unwrap();
        assert_eq!(*mt.ret, string);
    }

    #[test]
    fn boxes_primitive_arguments_when_allowed() {
        let mut syms = Symtab::new();
        let t = generic(&mut syms, None);
        let fa = forall(t, vec![Type::TypeVar(t)], Type::TypeVar(t));
        let mt = infer_method(&syms, &fa, &[Type::int()], true, false, None).unwrap();
        assert_eq!(*mt.ret, syms.boxed_type(Prim::Int));
    }

    #[test]
    fn lower_bounds_are_joined() {
        let mut syms = Symtab::new();
        let t = generic(&mut syms, None);
        let fa = forall(t, vec![Type::TypeVar(t), Type::TypeVar(t)], Type::TypeVar(t));
        let (string, integer) = (syms.string_type(), syms.boxed_type(Prim::Int));
        let mt = infer_method(&syms, &fa, &[string.clone(), integer.clone()], false, false, None).unwrap();
        assert!(syms.is_subtype(&string, &mt.ret));
        assert!(syms.is_subtype(&integer, &mt.ret));
    }

    #[test]
    fn wildcard_formal_reads_through_the_argument_type() {
        let mut syms = Symtab::new();
        let t = generic(&mut syms, None);
        let iterable = syms.predef.iterable;
        let formal = Type::class_with(
            iterable,
            vec![Type::Wildcard(Wildcard { kind: BoundKind::Extends, bound: Some(Box::new(Type::TypeVar(t))) })],
        );
        let fa = forall(t, vec![formal], Type::TypeVar(t));
        let string = syms.string_type();
        let actual = Type::class_with(iterable, vec![string.clone()]);
        let mt = infer_method(&syms, &fa, &[actual], false, false, None).unwrap();
        assert_eq!(*mt.ret, string);
    }

    #[test]
    fn declared_bound_is_enforced() {
        let mut syms = Symtab::new();
        let number = Type::class(syms.predef.number);
        let t = generic(&mut syms, Some(number));
        let fa = forall(t, vec![Type::TypeVar(t)], Type::Void);
        let string = syms.string_type();
        let err = infer_method(&syms, &fa, &[string], false, false, None).unwrap_err();
        assert!(err.contains("does not conform to declared bound"), "{}", err);
    }

    #[test]
    fn expected_type_fills_unconstrained_variables() {
        let mut syms = Symtab::new();
        let t = generic(&mut syms, None);
        let fa = forall(t, vec![], Type::TypeVar(t));
        let string = syms.string_type();
        let mt = infer_method(&syms, &fa, &[], false, false, Some(&string)).unwrap();
        assert_eq!(*mt.ret, string);
        let mt = infer_method(&syms, &fa, &[], false, false, Some(&Type::int())).unwrap();
        assert_eq!(*mt.ret, syms.boxed_type(Prim::Int));
        let mt = infer_method(&syms, &fa, &[], false, false, None).unwrap();
        assert_eq!(*mt.ret, syms.object_type());
    }
}
