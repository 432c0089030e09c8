//! Tree traversal.
//!
//! [`Visit`] and [`VisitMut`] have one hook per node category. Each hook
//! defaults to the matching `walk_*` function, which visits the node's
//! children left to right; overriding a hook and calling the walker from it
//! keeps the default descent.

use crate::tree::*;

pub trait Visit {
    fn visit_class(&mut self, class: &ClassDecl) {
        walk_class(self, class)
    }
    fn visit_method(&mut self, method: &MethodDecl) {
        walk_method(self, method)
    }
    fn visit_var(&mut self, var: &VarDecl) {
        walk_var(self, var)
    }
    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block)
    }
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt)
    }
    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr)
    }
}

pub fn walk_class<V: Visit + ?Sized>(v: &mut V, class: &ClassDecl) {
    for tp in &class.type_params {
        tp.bounds.iter().for_each(|b| v.visit_expr(b));
    }
    if let Some(ext) = &class.extends {
        v.visit_expr(ext);
    }
    class.implements.iter().for_each(|i| v.visit_expr(i));
    for member in &class.members {
        match member {
            Member::Class(c) => v.visit_class(c),
            Member::Method(m) => v.visit_method(m),
            Member::Var(var) => v.visit_var(var),
            Member::Init(init) => v.visit_block(&init.body),
        }
    }
}

pub fn walk_method<V: Visit + ?Sized>(v: &mut V, method: &MethodDecl) {
    if let Some(ret) = &method.ret {
        v.visit_expr(ret);
    }
    method.params.iter().for_each(|p| v.visit_var(p));
    method.thrown.iter().for_each(|t| v.visit_expr(t));
    if let Some(body) = &method.body {
        v.visit_block(body);
    }
}

pub fn walk_var<V: Visit + ?Sized>(v: &mut V, var: &VarDecl) {
    if let Some(t) = &var.vtype {
        v.visit_expr(t);
    }
    if let Some(init) = &var.init {
        v.visit_expr(init);
    }
}

pub fn walk_block<V: Visit + ?Sized>(v: &mut V, block: &Block) {
    block.stmts.iter().for_each(|s| v.visit_stmt(s));
}

pub fn walk_stmt<V: Visit + ?Sized>(v: &mut V, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::Block(b) => v.visit_block(b),
        StmtKind::LocalVar(var) => v.visit_var(var),
        StmtKind::LocalClass(c) => v.visit_class(c),
        StmtKind::Expr(e) | StmtKind::Throw(e) => v.visit_expr(e),
        StmtKind::If { cond, then, els } => {
            v.visit_expr(cond);
            v.visit_stmt(then);
            if let Some(els) = els {
                v.visit_stmt(els);
            }
        }
        StmtKind::While { cond, body } => {
            v.visit_expr(cond);
            v.visit_stmt(body);
        }
        StmtKind::DoWhile { body, cond } => {
            v.visit_stmt(body);
            v.visit_expr(cond);
        }
        StmtKind::For { init, cond, step, body } => {
            init.iter().for_each(|s| v.visit_stmt(s));
            if let Some(c) = cond {
                v.visit_expr(c);
            }
            step.iter().for_each(|e| v.visit_expr(e));
            v.visit_stmt(body);
        }
        StmtKind::ForEach { var, expr, body } => {
            v.visit_var(var);
            v.visit_expr(expr);
            v.visit_stmt(body);
        }
        StmtKind::Labeled { body, .. } => v.visit_stmt(body),
        StmtKind::Switch { selector, cases } => {
            v.visit_expr(selector);
            for case in cases {
                if let Some(l) = &case.label {
                    v.visit_expr(l);
                }
                case.stmts.iter().for_each(|s| v.visit_stmt(s));
            }
        }
        StmtKind::Return(e) => {
            if let Some(e) = e {
                v.visit_expr(e);
            }
        }
        StmtKind::Try { resources, body, catches, finalizer } => {
            resources.iter().for_each(|r| v.visit_var(r));
            v.visit_block(body);
            for c in catches {
                v.visit_var(&c.param);
                v.visit_block(&c.body);
            }
            if let Some(f) = finalizer {
                v.visit_block(f);
            }
        }
        StmtKind::Synchronized { lock, body } => {
            v.visit_expr(lock);
            v.visit_block(body);
        }
        StmtKind::Assert { cond, detail } => {
            v.visit_expr(cond);
            if let Some(d) = detail {
                v.visit_expr(d);
            }
        }
        StmtKind::Break { .. } | StmtKind::Continue { .. } | StmtKind::Skip => {}
    }
}

pub fn walk_expr<V: Visit + ?Sized>(v: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Null | ExprKind::Ident(_) | ExprKind::PrimType(_) => {}
        ExprKind::VoidType | ExprKind::Erroneous => {}
        ExprKind::Select { target, .. } => v.visit_expr(target),
        ExprKind::Call { meth, type_args, args, .. } => {
            v.visit_expr(meth);
            type_args.iter().for_each(|a| v.visit_expr(a));
            args.iter().for_each(|a| v.visit_expr(a));
        }
        ExprKind::New { encl, class, type_args, args, body, .. } => {
            if let Some(e) = encl {
                v.visit_expr(e);
            }
            v.visit_expr(class);
            type_args.iter().for_each(|a| v.visit_expr(a));
            args.iter().for_each(|a| v.visit_expr(a));
            if let Some(b) = body {
                v.visit_class(b);
            }
        }
        ExprKind::NewArray { elem, dims, elems } => {
            if let Some(e) = elem {
                v.visit_expr(e);
            }
            dims.iter().for_each(|d| v.visit_expr(d));
            if let Some(es) = elems {
                es.iter().for_each(|e| v.visit_expr(e));
            }
        }
        ExprKind::Parens(e) | ExprKind::ArrayType(e) => v.visit_expr(e),
        ExprKind::Assign { lhs, rhs } | ExprKind::AssignOp { lhs, rhs, .. } | ExprKind::Binary { lhs, rhs, .. } => {
            v.visit_expr(lhs);
            v.visit_expr(rhs);
        }
        ExprKind::Unary { arg, .. } => v.visit_expr(arg),
        ExprKind::Cast { clazz, expr } => {
            v.visit_expr(clazz);
            v.visit_expr(expr);
        }
        ExprKind::InstanceOf { expr, clazz } => {
            v.visit_expr(expr);
            v.visit_expr(clazz);
        }
        ExprKind::Conditional { cond, then, els } => {
            v.visit_expr(cond);
            v.visit_expr(then);
            v.visit_expr(els);
        }
        ExprKind::Index { indexed, index } => {
            v.visit_expr(indexed);
            v.visit_expr(index);
        }
        ExprKind::Let { stmts, expr } => {
            stmts.iter().for_each(|s| v.visit_stmt(s));
            v.visit_expr(expr);
        }
        ExprKind::TypeApply { base, args } => {
            v.visit_expr(base);
            args.iter().for_each(|a| v.visit_expr(a));
        }
        ExprKind::WildcardType { bound, .. } => {
            if let Some(b) = bound {
                v.visit_expr(b);
            }
        }
        ExprKind::UnionType(alts) => alts.iter().for_each(|a| v.visit_expr(a)),
    }
}

// ── Mutable traversal ──────────────────────────────────────────────────

pub trait VisitMut {
    fn visit_class_mut(&mut self, class: &mut ClassDecl) {
        walk_class_mut(self, class)
    }
    fn visit_method_mut(&mut self, method: &mut MethodDecl) {
        walk_method_mut(self, method)
    }
    fn visit_var_mut(&mut self, var: &mut VarDecl) {
        walk_var_mut(self, var)
    }
    fn visit_block_mut(&mut self, block: &mut Block) {
        walk_block_mut(self, block)
    }
    fn visit_stmt_mut(&mut self, stmt: &mut Stmt) {
        walk_stmt_mut(self, stmt)
    }
    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        walk_expr_mut(self, expr)
    }
}

pub fn walk_class_mut<V: VisitMut + ?Sized>(v: &mut V, class: &mut ClassDecl) {
    for tp in &mut class.type_params {
        tp.bounds.iter_mut().for_each(|b| v.visit_expr_mut(b));
    }
    if let Some(ext) = &mut class.extends {
        v.visit_expr_mut(ext);
    }
    class.implements.iter_mut().for_each(|i| v.visit_expr_mut(i));
    for member in &mut class.members {
        match member {
            Member::Class(c) => v.visit_class_mut(c),
            Member::Method(m) => v.visit_method_mut(m),
            Member::Var(var) => v.visit_var_mut(var),
            Member::Init(init) => v.visit_block_mut(&mut init.body),
        }
    }
}

pub fn walk_method_mut<V: VisitMut + ?Sized>(v: &mut V, method: &mut MethodDecl) {
    if let Some(ret) = &mut method.ret {
        v.visit_expr_mut(ret);
    }
    method.params.iter_mut().for_each(|p| v.visit_var_mut(p));
    method.thrown.iter_mut().for_each(|t| v.visit_expr_mut(t));
    if let Some(body) = &mut method.body {
        v.visit_block_mut(body);
    }
}

pub fn walk_var_mut<V: VisitMut + ?Sized>(v: &mut V, var: &mut VarDecl) {
    if let Some(t) = &mut var.vtype {
        v.visit_expr_mut(t);
    }
    if let Some(init) = &mut var.init {
        v.visit_expr_mut(init);
    }
}

pub fn walk_block_mut<V: VisitMut + ?Sized>(v: &mut V, block: &mut Block) {
    block.stmts.iter_mut().for_each(|s| v.visit_stmt_mut(s));
}

pub fn walk_stmt_mut<V: VisitMut + ?Sized>(v: &mut V, stmt: &mut Stmt) {
    match &mut stmt.kind {
        StmtKind::Block(b) => v.visit_block_mut(b),
        StmtKind::LocalVar(var) => v.visit_var_mut(var),
        StmtKind::LocalClass(c) => v.visit_class_mut(c),
        StmtKind::Expr(e) | StmtKind::Throw(e) => v.visit_expr_mut(e),
        StmtKind::If { cond, then, els } => {
            v.visit_expr_mut(cond);
            v.visit_stmt_mut(then);
            if let Some(els) = els {
                v.visit_stmt_mut(els);
            }
        }
        StmtKind::While { cond, body } => {
            v.visit_expr_mut(cond);
            v.visit_stmt_mut(body);
        }
        StmtKind::DoWhile { body, cond } => {
            v.visit_stmt_mut(body);
            v.visit_expr_mut(cond);
        }
        StmtKind::For { init, cond, step, body } => {
            init.iter_mut().for_each(|s| v.visit_stmt_mut(s));
            if let Some(c) = cond {
                v.visit_expr_mut(c);
            }
            step.iter_mut().for_each(|e| v.visit_expr_mut(e));
            v.visit_stmt_mut(body);
        }
        StmtKind::ForEach { var, expr, body } => {
            v.visit_var_mut(var);
            v.visit_expr_mut(expr);
            v.visit_stmt_mut(body);
        }
        StmtKind::Labeled { body, .. } => v.visit_stmt_mut(body),
        StmtKind::Switch { selector, cases } => {
            v.visit_expr_mut(selector);
            for case in cases {
                if let Some(l) = &mut case.label {
                    v.visit_expr_mut(l);
                }
                case.stmts.iter_mut().for_each(|s| v.visit_stmt_mut(s));
            }
        }
        StmtKind::Return(e) => {
            if let Some(e) = e {
                v.visit_expr_mut(e);
            }
        }
        StmtKind::Try { resources, body, catches, finalizer } => {
            resources.iter_mut().for_each(|r| v.visit_var_mut(r));
            v.visit_block_mut(body);
            for c in catches {
                v.visit_var_mut(&mut c.param);
                v.visit_block_mut(&mut c.body);
            }
            if let Some(f) = finalizer {
                v.visit_block_mut(f);
            }
        }
        StmtKind::Synchronized { lock, body } => {
            v.visit_expr_mut(lock);
            v.visit_block_mut(body);
        }
        StmtKind::Assert { cond, detail } => {
            v.visit_expr_mut(cond);
            if let Some(d) = detail {
                v.visit_expr_mut(d);
            }
        }
        StmtKind::Break { .. } | StmtKind::Continue { .. } | StmtKind::Skip => {}
    }
}

pub fn walk_expr_mut<V: VisitMut + ?Sized>(v: &mut V, expr: &mut Expr) {
    match &mut expr.kind {
        ExprKind::Literal(_) | ExprKind::Null | ExprKind::Ident(_) | ExprKind::PrimType(_) => {}
        ExprKind::VoidType | ExprKind::Erroneous => {}
        ExprKind::Select { target, .. } => v.visit_expr_mut(target),
        ExprKind::Call { meth, type_args, args, .. } => {
            v.visit_expr_mut(meth);
            type_args.iter_mut().for_each(|a| v.visit_expr_mut(a));
            args.iter_mut().for_each(|a| v.visit_expr_mut(a));
        }
        ExprKind::New { encl, class, type_args, args, body, .. } => {
            if let Some(e) = encl {
                v.visit_expr_mut(e);
            }
            v.visit_expr_mut(class);
            type_args.iter_mut().for_each(|a| v.visit_expr_mut(a));
            args.iter_mut().for_each(|a| v.visit_expr_mut(a));
            if let Some(b) = body {
                v.visit_class_mut(b);
            }
        }
        ExprKind::NewArray { elem, dims, elems } => {
            if let Some(e) = elem {
                v.visit_expr_mut(e);
            }
            dims.iter_mut().for_each(|d| v.visit_expr_mut(d));
            if let Some(es) = elems {
                es.iter_mut().for_each(|e| v.visit_expr_mut(e));
            }
        }
        ExprKind::Parens(e) | ExprKind::ArrayType(e) => v.visit_expr_mut(e),
        ExprKind::Assign { lhs, rhs } | ExprKind::AssignOp { lhs, rhs, .. } | ExprKind::Binary { lhs, rhs, .. } => {
            v.visit_expr_mut(lhs);
            v.visit_expr_mut(rhs);
        }
        ExprKind::Unary { arg, .. } => v.visit_expr_mut(arg),
        ExprKind::Cast { clazz, expr } => {
            v.visit_expr_mut(clazz);
            v.visit_expr_mut(expr);
        }
        ExprKind::InstanceOf { expr, clazz } => {
            v.visit_expr_mut(expr);
            v.visit_expr_mut(clazz);
        }
        ExprKind::Conditional { cond, then, els } => {
            v.visit_expr_mut(cond);
            v.visit_expr_mut(then);
            v.visit_expr_mut(els);
        }
        ExprKind::Index { indexed, index } => {
            v.visit_expr_mut(indexed);
            v.visit_expr_mut(index);
        }
        ExprKind::Let { stmts, expr } => {
            stmts.iter_mut().for_each(|s| v.visit_stmt_mut(s));
            v.visit_expr_mut(expr);
        }
        ExprKind::TypeApply { base, args } => {
            v.visit_expr_mut(base);
            args.iter_mut().for_each(|a| v.visit_expr_mut(a));
        }
        ExprKind::WildcardType { bound, .. } => {
            if let Some(b) = bound {
                v.visit_expr_mut(b);
            }
        }
        ExprKind::UnionType(alts) => alts.iter_mut().for_each(|a| v.visit_expr_mut(a)),
    }
}

/// Point every `break`/`continue` aimed at `from` to `to` instead, without
/// descending into nested classes.
pub fn retarget_jumps(stmt: &mut Stmt, from: NodeId, to: NodeId) {
    struct Retarget {
        from: NodeId,
        to: NodeId,
    }
    impl VisitMut for Retarget {
        fn visit_stmt_mut(&mut self, stmt: &mut Stmt) {
            if let StmtKind::Break { target, .. } | StmtKind::Continue { target, .. } = &mut stmt.kind {
                if *target == Some(self.from) {
                    *target = Some(self.to);
                }
            }
            walk_stmt_mut(self, stmt)
        }
        fn visit_class_mut(&mut self, _class: &mut ClassDecl) {}
    }
    Retarget { from, to }.visit_stmt_mut(stmt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_common::Span;

    #[test]
    fn retargets_nested_jumps() {
        let old = NodeId::fresh();
        let new = NodeId::fresh();
        let brk = Stmt::new(Span::DUMMY, StmtKind::Break { label: None, target: Some(old) });
        let other = Stmt::new(Span::DUMMY, StmtKind::Continue { label: None, target: Some(NodeId(0)) });
        let mut body = Stmt::new(Span::DUMMY, StmtKind::Block(Block::new(Span::DUMMY, vec![brk, other])));
        retarget_jumps(&mut body, old, new);
        let StmtKind::Block(b) = &body.kind else { unreachable!() };
        assert!(matches!(b.stmts[0].kind, StmtKind::Break { target: Some(t), .. } if t == new));
        assert!(matches!(b.stmts[1].kind, StmtKind::Continue { target: Some(NodeId(0)), .. }));
    }

    #[test]
    fn counts_identifiers() {
        struct Count(usize);
        impl Visit for Count {
            fn visit_expr(&mut self, e: &Expr) {
                if matches!(e.kind, ExprKind::Ident(_)) {
                    self.0 += 1;
                }
                walk_expr(self, e)
            }
        }
        let x = Expr::new(Span::DUMMY, ExprKind::Ident("x".into()));
        let y = Expr::new(Span::DUMMY, ExprKind::Ident("y".into()));
        let sum = Expr::new(
            Span::DUMMY,
            ExprKind::Binary { op: BinOp::Add, lhs: Box::new(x), rhs: Box::new(y) },
        );
        let mut c = Count(0);
        c.visit_expr(&sum);
        assert_eq!(c.0, 2);
    }
}
