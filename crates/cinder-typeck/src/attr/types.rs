//! Attribution of type trees: parameterized types, wildcards and the
//! alternatives of a multi-catch parameter.

use cinder_ast::Expr;
use cinder_common::Span;
use cinder_symtab::{BoundKind, ClassType, Flags, SymbolId, Type, Wildcard};

use super::{Attr, AttrResult, DeferredBound};
use crate::env::Env;
use crate::resolve::KindSel;

impl Attr<'_> {
    /// `Base<A1, ..., An>`. An empty argument list is the diamond and
    /// stands for the raw type until the creation expression infers it.
    pub(crate) fn attrib_type_apply(&mut self, span: Span, base: &mut Expr, args: &mut [Expr], env: &Env) -> AttrResult<Type> {
        let base_ty = self.attrib_type(base, env)?;
        let mut actuals = Vec::with_capacity(args.len());
        for a in args.iter_mut() {
            let t = self.attrib_tree(a, env, KindSel::TYP, &Type::None)?;
            if t.is_prim() {
                let shown = vec![self.show(&t), "reference".to_string()];
                self.error(a.span, "type.found.req", shown);
                actuals.push(Type::Error);
                continue;
            }
            actuals.push(t);
        }
        let Type::Class(ct) = base_ty else {
            return Ok(Type::Error);
        };
        if args.is_empty() {
            return Ok(Type::Class(ct));
        }
        if actuals.iter().any(Type::is_error) {
            return Ok(Type::Error);
        }
        let c = ct.sym;
        let formals = self.syms.class_type_params(c).to_vec();
        if formals.is_empty() {
            self.error(span, "type.doesnt.take.params", vec![self.syms.fullname(c)]);
            return Ok(Type::Error);
        }
        if formals.len() != actuals.len() {
            self.error(span, "wrong.number.type.args", vec![formals.len().to_string()]);
            return Ok(Type::Error);
        }
        if self.header_depth > 0 {
            // Argument classes may still lack their supertypes.
            for (index, a) in args.iter().enumerate() {
                let deferred = DeferredBound { span: a.span, formals: formals.clone(), actuals: actuals.clone(), index };
                self.deferred_bounds.push(deferred);
            }
        } else if !self.syms.flags(c).contains(Flags::UNATTRIBUTED) {
            for (i, actual) in actuals.iter().enumerate() {
                if !self.within_bound(&formals, &actuals, i) {
                    let shown = vec![self.show(actual)];
                    self.error(args[i].span, "not.within.bounds", shown);
                    return Ok(Type::Error);
                }
            }
        }
        Ok(Type::Class(ClassType { sym: c, args: actuals, outer: ct.outer }))
    }

    /// Whether the `index`th of `actuals` lies within the bound of its formal.
    fn within_bound(&self, formals: &[SymbolId], actuals: &[Type], index: usize) -> bool {
        let bound = self.syms.subst(&self.syms.bound(formals[index]), formals, actuals);
        match &actuals[index] {
            Type::Wildcard(w) => match (&w.kind, &w.bound) {
                (BoundKind::Extends, Some(b)) => self.syms.is_castable(b, &bound),
                _ => true,
            },
            other => self.syms.is_subtype(other, &bound),
        }
    }

    /// Check the header type arguments deferred while headers were pending.
    pub(crate) fn check_deferred_bounds(&mut self) {
        for d in std::mem::take(&mut self.deferred_bounds) {
            if d.actuals[d.index].is_error() || self.within_bound(&d.formals, &d.actuals, d.index) {
                continue;
            }
            let shown = vec![self.show(&d.actuals[d.index])];
            self.error(d.span, "not.within.bounds", shown);
        }
    }

    pub(crate) fn attrib_wildcard(&mut self, kind: BoundKind, bound: &mut Option<Box<Expr>>, env: &Env) -> AttrResult<Type> {
        let bound_ty = match bound.as_mut() {
            Some(b) => {
                let t = self.attrib_type(b, env)?;
                if t.is_error() {
                    return Ok(Type::Error);
                }
                if t.is_prim() {
                    let args = vec![self.show(&t), "reference".to_string()];
                    self.error(b.span, "type.found.req", args);
                    return Ok(Type::Error);
                }
                Some(Box::new(t))
            }
            None => None,
        };
        Ok(Type::Wildcard(Wildcard { kind, bound: bound_ty }))
    }

    /// `A | B | ...` in a catch clause. Alternatives must be throwable and
    /// unrelated by subclassing.
    pub(crate) fn attrib_union(&mut self, alts: &mut [Expr], env: &Env) -> AttrResult<Type> {
        let mut tys: Vec<Type> = Vec::with_capacity(alts.len());
        for alt in alts.iter_mut() {
            let t = self.attrib_type(alt, env)?;
            if t.is_error() {
                continue;
            }
            if !self.syms.is_throwable(&t) {
                let throwable = self.syms.ty(self.syms.predef.throwable).clone();
                let args = vec![self.show(&t), self.show(&throwable)];
                self.error(alt.span, "incompatible.types", args);
                continue;
            }
            if let Some(other) = tys.iter().find(|o| self.syms.is_subtype(&t, o) || self.syms.is_subtype(o, &t)) {
                let (sub, sup) = if self.syms.is_subtype(&t, other) { (&t, other) } else { (other, &t) };
                let args = vec![self.show(sub), self.show(sup)];
                self.error(alt.span, "multicatch.types.must.be.disjoint", args);
                continue;
            }
            tys.push(t);
        }
        Ok(match tys.len() {
            0 => Type::Error,
            1 => tys.remove(0),
            _ => Type::Union(tys),
        })
    }
}
