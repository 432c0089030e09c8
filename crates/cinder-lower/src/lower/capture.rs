//! Captured locals and enclosing instances.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use cinder_ast::visit::{walk_class, walk_expr, Visit};
use cinder_ast::{ClassDecl, Expr, ExprKind, TreeMaker};
use cinder_common::Span;
use cinder_symtab::{SymKind, SymbolId, Symtab};

use super::{Ctx, Lowerer};

/// The locals each local class below `decl` captures, sorted by symbol.
///
/// A class captures the locals its body reads that are declared outside it,
/// plus those captured by any local class it instantiates or extends.
pub(crate) fn free_vars(syms: &Symtab, decl: &ClassDecl) -> FxHashMap<SymbolId, Vec<SymbolId>> {
    let mut scan = CaptureScan { syms, stack: Vec::new(), uses: FxHashMap::default(), creations: FxHashMap::default() };
    scan.visit_class(decl);
    let CaptureScan { uses, creations, .. } = scan;

    let mut free: FxHashMap<SymbolId, BTreeSet<SymbolId>> = FxHashMap::default();
    for (c, vars) in uses {
        let vars: BTreeSet<SymbolId> = vars.into_iter().filter(|v| !declared_within(syms, *v, c)).collect();
        free.insert(c, vars);
    }
    loop {
        let mut changed = false;
        for (c, created) in &creations {
            for d in created.iter().filter(|d| *d != c) {
                let inherited: Vec<SymbolId> = free.get(d).map(|vs| vs.iter().copied().collect()).unwrap_or_default();
                for v in inherited {
                    if !declared_within(syms, v, *c) && free.entry(*c).or_default().insert(v) {
                        changed = true;
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }
    free.into_iter()
        .filter(|(c, vars)| !vars.is_empty() && syms.is_local(*c))
        .map(|(c, vars)| (c, vars.into_iter().collect()))
        .collect()
}

fn declared_within(syms: &Symtab, var: SymbolId, class: SymbolId) -> bool {
    let mut cur = syms.owner(var);
    while let Some(s) = cur {
        if s == class {
            return true;
        }
        cur = syms.owner(s);
    }
    false
}

struct CaptureScan<'a> {
    syms: &'a Symtab,
    stack: Vec<SymbolId>,
    /// Locals read directly in each class body.
    uses: FxHashMap<SymbolId, BTreeSet<SymbolId>>,
    /// Classes whose constructors each class body invokes.
    creations: FxHashMap<SymbolId, BTreeSet<SymbolId>>,
}

impl CaptureScan<'_> {
    fn created(&mut self, ctor: SymbolId) {
        let (Some(current), Some(class)) = (self.stack.last().copied(), self.syms.owner_class(ctor)) else { return };
        self.creations.entry(current).or_default().insert(class);
    }
}

impl Visit for CaptureScan<'_> {
    fn visit_class(&mut self, class: &ClassDecl) {
        let Some(c) = class.sym else { return walk_class(self, class) };
        if let Some(sup) = self.syms.superclass_sym(c) {
            self.creations.entry(c).or_default().insert(sup);
        }
        self.stack.push(c);
        walk_class(self, class);
        self.stack.pop();
    }

    fn visit_expr(&mut self, e: &Expr) {
        match &e.kind {
            ExprKind::Ident(_) if !e.is_this_or_super() => {
                let local = e.sym.filter(|v| {
                    self.syms.kind(*v) == SymKind::Var
                        && self.syms.owner(*v).is_some_and(|o| !self.syms.is_class(o))
                        && self.syms.sym(*v).const_value().is_none()
                });
                if let (Some(v), Some(current)) = (local, self.stack.last().copied()) {
                    self.uses.entry(current).or_default().insert(v);
                }
            }
            ExprKind::New { .. } => {
                if let Some(ctor) = e.sym {
                    self.created(ctor);
                }
            }
            ExprKind::Call { .. } => {
                if let Some(m) = e.sym.filter(|m| self.syms.is_constructor(*m)) {
                    self.created(m);
                }
            }
            _ => {}
        }
        walk_expr(self, e);
    }
}

impl Lowerer<'_> {
    /// A synthesized field of the current class: the constructor parameter
    /// that initializes it inside a constructor, `this.f` elsewhere.
    fn own_field(&self, field: SymbolId, span: Span, cx: &Ctx) -> Expr {
        let make = TreeMaker::at(span);
        match cx.field_params.get(&field) {
            Some(param) => make.ident(self.syms, *param),
            None => make.select(self.syms, self.this_expr(cx, span), field),
        }
    }

    /// An instance of `target` (or a subclass) reachable from the current
    /// class by following outer-instance fields.
    pub(crate) fn outer_instance(&mut self, target: SymbolId, span: Span, cx: &Ctx) -> Expr {
        let mut class = cx.class;
        if self.syms.is_subclass(class, target) {
            return self.this_expr(cx, span);
        }
        let Some(field) = self.outer_fields.get(&class).copied() else { return self.this_expr(cx, span) };
        let make = TreeMaker::at(span);
        let mut e = self.own_field(field, span, cx);
        while let Some(outer) = self.syms.outer_class(class) {
            class = outer;
            if self.syms.is_subclass(class, target) {
                break;
            }
            let Some(field) = self.outer_fields.get(&class).copied() else { break };
            e = make.select(self.syms, e, field);
        }
        e
    }

    /// A read of captured local `var` from the current class.
    pub(crate) fn local_ref(&mut self, var: SymbolId, span: Span, cx: &Ctx) -> Expr {
        match self.proxies.get(&(cx.class, var)).copied() {
            Some(field) => self.own_field(field, span, cx),
            None => TreeMaker::at(span).ident(self.syms, var),
        }
    }

    /// The instance an unqualified reference to instance member `member`
    /// goes through, when that is not `this`.
    pub(crate) fn implicit_receiver(&mut self, member: SymbolId, span: Span, cx: &Ctx) -> Option<Expr> {
        let owner = self.syms.owner_class(member)?;
        let mut c = cx.class;
        while c != owner && !(self.syms.is_subclass(c, owner) && self.syms.is_inherited_in(member, c)) {
            c = self.syms.enclosing_class(self.syms.owner(c)?)?;
        }
        if c == cx.class {
            return None;
        }
        Some(self.outer_instance(c, span, cx))
    }
}
