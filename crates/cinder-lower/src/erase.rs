//! Erasure of lowered classes.
//!
//! Every tree is retyped to the erasure of the type its symbol declares,
//! type trees are rebuilt from erased types, and a cast is inserted
//! wherever an erased value flows into a position expecting a more specific
//! reference type. Bridges are added to each class first.
//!
//! Running erasure twice yields the same trees: casts are only inserted
//! where the erased type is not already a subtype of the expected one.

use tracing::{debug_span, trace};

use cinder_ast::{Block, ClassDecl, Expr, ExprKind, Member, MethodDecl, Stmt, StmtKind, TreeMaker, VarDecl};
use cinder_common::{CompileOptions, Log};
use cinder_symtab::{SymKind, SymbolId, Symtab, Type};

use crate::bridge::add_bridges;

/// Erase lowered classes in place, adding bridges to each.
pub fn erase_classes(syms: &mut Symtab, classes: &mut [ClassDecl], opts: &CompileOptions, log: &mut Log) {
    if opts.generics || opts.covariant_returns {
        // Superclasses first, so their bridges are visible to subclasses.
        let mut order: Vec<usize> = (0..classes.len()).collect();
        order.sort_by_key(|i| classes[*i].sym.map_or(0, |c| superclass_depth(syms, c)));
        for i in order {
            add_bridges(syms, &mut classes[i], opts, log);
        }
    }
    for class in classes.iter_mut() {
        let Some(c) = class.sym else { continue };
        let _span = debug_span!("erase_class", class = %syms.flatname(c)).entered();
        Eraser { syms }.class(class);
    }
}

fn superclass_depth(syms: &Symtab, class: SymbolId) -> usize {
    let mut depth = 0;
    let mut cur = syms.superclass_sym(class);
    while let Some(c) = cur {
        depth += 1;
        cur = syms.superclass_sym(c);
    }
    depth
}

struct Eraser<'a> {
    syms: &'a Symtab,
}

impl Eraser<'_> {
    fn erased(&self, sym: SymbolId) -> Type {
        self.syms.erasure(self.syms.ty(sym))
    }

    fn class(&mut self, decl: &mut ClassDecl) {
        decl.type_params.clear();
        let Some(c) = decl.sym else { return };
        let make = TreeMaker::at(decl.span);
        let info = self.syms.class_info(c);
        // Anonymous and synthesized classes carry their supertypes only on
        // the symbol.
        let object = self.syms.predef.object;
        decl.extends = info
            .supertype
            .as_ref()
            .filter(|t| t.class_sym() != Some(object))
            .map(|t| make.type_tree(self.syms, &self.syms.erasure(t)));
        decl.implements = info.interfaces.iter().map(|t| make.type_tree(self.syms, &self.syms.erasure(t))).collect();
        for member in &mut decl.members {
            match member {
                Member::Class(inner) => self.class(inner),
                Member::Method(md) => self.method(md),
                Member::Var(var) => self.var(var),
                Member::Init(init) => self.block(&mut init.body, None),
            }
        }
    }

    fn method(&mut self, md: &mut MethodDecl) {
        md.type_params.clear();
        let Some(m) = md.sym else { return };
        let erased = self.erased(m);
        let make = TreeMaker::at(md.span);
        if md.ret.is_some() {
            md.ret = Some(make.type_tree(self.syms, &erased.ret()));
        }
        md.thrown = erased.thrown().iter().map(|t| make.type_tree(self.syms, t)).collect();
        for param in &mut md.params {
            self.var(param);
        }
        let ret = erased.ret();
        if let Some(body) = md.body.as_mut() {
            self.block(body, Some(&ret));
        }
        trace!(method = %self.syms.name(m), "erased");
    }

    fn var(&mut self, var: &mut VarDecl) {
        let Some(v) = var.sym else { return };
        let ty = self.erased(v);
        var.vtype = Some(TreeMaker::at(var.span).type_tree(self.syms, &ty));
        if let Some(init) = var.init.as_mut() {
            self.expr(init, Some(&ty));
        }
    }

    // ── Statements ─────────────────────────────────────────────────────

    /// `ret` is the erased return type of the enclosing method.
    fn block(&mut self, block: &mut Block, ret: Option<&Type>) {
        for stmt in &mut block.stmts {
            self.stmt(stmt, ret);
        }
    }

    fn stmt(&mut self, stmt: &mut Stmt, ret: Option<&Type>) {
        match &mut stmt.kind {
            StmtKind::Block(block) => self.block(block, ret),
            StmtKind::LocalVar(var) => self.var(var),
            StmtKind::LocalClass(decl) => self.class(decl),
            StmtKind::Expr(e) => self.expr(e, None),
            StmtKind::If { cond, then, els } => {
                self.expr(cond, None);
                self.stmt(then, ret);
                if let Some(els) = els {
                    self.stmt(els, ret);
                }
            }
            StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
                self.expr(cond, None);
                self.stmt(body, ret);
            }
            StmtKind::For { init, cond, step, body } => {
                for s in init {
                    self.stmt(s, ret);
                }
                if let Some(cond) = cond {
                    self.expr(cond, None);
                }
                for e in step {
                    self.expr(e, None);
                }
                self.stmt(body, ret);
            }
            StmtKind::ForEach { var, expr, body } => {
                self.var(var);
                self.expr(expr, None);
                self.stmt(body, ret);
            }
            StmtKind::Labeled { body, .. } => self.stmt(body, ret),
            StmtKind::Switch { selector, cases } => {
                self.expr(selector, None);
                for case in cases {
                    for s in &mut case.stmts {
                        self.stmt(s, ret);
                    }
                }
            }
            StmtKind::Return(Some(e)) => self.expr(e, ret),
            StmtKind::Throw(e) => {
                let throwable = Type::class(self.syms.predef.throwable);
                self.expr(e, Some(&throwable));
            }
            StmtKind::Try { resources, body, catches, finalizer } => {
                for r in resources {
                    self.var(r);
                }
                self.block(body, ret);
                for catch in catches {
                    self.var(&mut catch.param);
                    self.block(&mut catch.body, ret);
                }
                if let Some(f) = finalizer {
                    self.block(f, ret);
                }
            }
            StmtKind::Synchronized { lock, body } => {
                self.expr(lock, None);
                self.block(body, ret);
            }
            StmtKind::Assert { cond, detail } => {
                self.expr(cond, None);
                if let Some(d) = detail {
                    self.expr(d, None);
                }
            }
            StmtKind::Return(None) | StmtKind::Break { .. } | StmtKind::Continue { .. } | StmtKind::Skip => {}
        }
    }

    // ── Expressions ────────────────────────────────────────────────────

    /// Erase `e`, casting it to the erasure of `pt` when its erased type
    /// does not conform.
    fn expr(&mut self, e: &mut Expr, pt: Option<&Type>) {
        if let Some(kind) = self.names_type(e) {
            let erased = e.ty.as_ref().map(|t| self.syms.erasure(t));
            match (kind, erased) {
                (SymKind::TypeVar, Some(ty)) => *e = TreeMaker::at(e.span).type_tree(self.syms, &ty),
                (_, erased) => e.ty = erased,
            }
            return;
        }
        if e.is_type_tree() {
            if let Some(ty) = e.ty.as_ref().map(|t| self.syms.erasure(t)) {
                *e = TreeMaker::at(e.span).type_tree(self.syms, &ty);
            }
            return;
        }

        let own = self.syms.erasure(&e.ty());
        match &mut e.kind {
            ExprKind::Select { target, .. } => {
                let owner = e.sym.and_then(|s| self.syms.owner_class(s)).filter(|o| *o != self.syms.predef.array_class);
                let expected = owner.map(|o| self.erased(o));
                self.expr(target, expected.as_ref());
            }
            ExprKind::Call { meth, type_args, args, .. } => {
                type_args.clear();
                self.expr(meth, None);
                let params = e.sym.map(|m| self.erased(m).params().to_vec()).unwrap_or_default();
                self.args(args, &params);
            }
            ExprKind::New { encl, class, type_args, args, .. } => {
                type_args.clear();
                if let Some(encl) = encl {
                    self.expr(encl, None);
                }
                self.expr(class, None);
                let params = e.sym.map(|m| self.erased(m).params().to_vec()).unwrap_or_default();
                self.args(args, &params);
            }
            ExprKind::NewArray { elem, dims, elems } => {
                if let Some(elem) = elem {
                    self.expr(elem, None);
                }
                for d in dims {
                    self.expr(d, None);
                }
                let elem_ty = own.elem_type().cloned();
                for x in elems.iter_mut().flatten() {
                    self.expr(x, elem_ty.as_ref());
                }
            }
            ExprKind::Parens(inner) => self.expr(inner, pt),
            ExprKind::Assign { lhs, rhs } => {
                self.expr(lhs, None);
                let target = lhs.ty();
                self.expr(rhs, Some(&target));
            }
            ExprKind::AssignOp { lhs, rhs, .. } | ExprKind::Binary { lhs, rhs, .. } => {
                let operands = self.operands(e.sym, &[&**lhs, &**rhs]);
                self.expr(lhs, operands.first());
                self.expr(rhs, operands.get(1));
            }
            ExprKind::Unary { arg, .. } => {
                let operands = self.operands(e.sym, &[&**arg]);
                self.expr(arg, operands.first());
            }
            ExprKind::Cast { clazz, expr } => {
                **clazz = TreeMaker::at(clazz.span).type_tree(self.syms, &own);
                self.expr(expr, None);
            }
            ExprKind::InstanceOf { expr, clazz } => {
                self.expr(expr, None);
                let tested = self.syms.erasure(&clazz.ty());
                **clazz = TreeMaker::at(clazz.span).type_tree(self.syms, &tested);
            }
            ExprKind::Conditional { cond, then, els } => {
                self.expr(cond, None);
                self.expr(then, Some(&own));
                self.expr(els, Some(&own));
            }
            ExprKind::Index { indexed, index } => {
                let array = self.syms.erasure(&indexed.ty());
                self.expr(indexed, Some(&array));
                self.expr(index, None);
            }
            ExprKind::Let { stmts, expr } => {
                for s in stmts {
                    self.stmt(s, None);
                }
                self.expr(expr, pt);
            }
            _ => {}
        }

        let declared = self.declared_type(e).unwrap_or(own);
        e.ty = Some(declared.clone());
        if let Some(pt) = pt {
            let expected = self.syms.erasure(pt);
            if expected.is_reference()
                && declared.is_reference()
                && !matches!(declared, Type::Null)
                && !self.syms.is_subtype(&declared, &expected)
            {
                trace!(from = ?declared, to = ?expected, "cast inserted");
                let inner = e.take();
                *e = TreeMaker::at(inner.span).cast(self.syms, expected, inner);
            }
        }
    }

    fn args(&mut self, args: &mut [Expr], params: &[Type]) {
        for (i, arg) in args.iter_mut().enumerate() {
            self.expr(arg, params.get(i));
        }
    }

    /// The erased type `e` has at run time: what its symbol declares for
    /// variables and method results.
    fn declared_type(&self, e: &Expr) -> Option<Type> {
        let sym = e.sym?;
        match (&e.kind, self.syms.kind(sym)) {
            (ExprKind::Call { .. }, SymKind::Method) if !self.syms.is_constructor(sym) => Some(self.erased(sym).ret()),
            (ExprKind::Ident(_) | ExprKind::Select { .. }, SymKind::Var) if !e.is_this_or_super() => {
                Some(self.erased(sym))
            }
            (ExprKind::Ident(_) | ExprKind::Select { .. }, SymKind::Method) => Some(self.erased(sym)),
            _ => None,
        }
    }

    /// The expected operand types of an operator application: the
    /// operator's erased parameters, or failing that the erased operand
    /// types themselves.
    fn operands(&self, operator: Option<SymbolId>, args: &[&Expr]) -> Vec<Type> {
        match operator {
            Some(op) if self.syms.kind(op) == SymKind::Method => self.erased(op).params().to_vec(),
            _ => args.iter().map(|a| self.syms.erasure(&a.ty())).collect(),
        }
    }

    /// The symbol kind of identifiers and selections that name a class,
    /// type variable or package.
    fn names_type(&self, e: &Expr) -> Option<SymKind> {
        if !matches!(e.kind, ExprKind::Ident(_) | ExprKind::Select { .. }) || e.is_this_or_super() {
            return None;
        }
        let kind = self.syms.kind(e.sym?);
        matches!(kind, SymKind::Class | SymKind::TypeVar | SymKind::Package).then_some(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_common::Span;
    use cinder_symtab::Prim;

    #[test]
    fn object_valued_arguments_are_cast_to_parameter_types() {
        let syms = Symtab::new();
        let make = TreeMaker::at(Span::DUMMY);
        let mut eraser = Eraser { syms: &syms };
        let string = syms.string_type();

        let mut e = make.cast(&syms, syms.object_type(), make.null());
        eraser.expr(&mut e, Some(&string));
        assert!(matches!(e.kind, ExprKind::Cast { .. }));
        assert_eq!(e.ty(), string);

        let mut again = e.clone();
        eraser.expr(&mut again, Some(&string));
        assert_eq!(cinder_ast::pretty::print_expr(&again), cinder_ast::pretty::print_expr(&e));

        let mut number = make.int(1);
        eraser.expr(&mut number, Some(&Type::Prim(Prim::Long)));
        assert_eq!(number.ty(), Type::int());
    }
}
