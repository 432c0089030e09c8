//! Construction of unattributed, source-shaped trees.
//!
//! [`SourceBuilder`] stands in for a parser: it produces trees with every
//! attribute slot empty, exactly as they would arrive from source. Each
//! node gets a fresh, distinct span so diagnostics and stop positions can
//! tell nodes apart.

use std::cell::Cell;

use cinder_common::Span;
use cinder_symtab::{names, BoundKind, Constant, Flags, Prim};

use crate::tree::*;

#[derive(Debug, Default)]
pub struct SourceBuilder {
    next: Cell<u32>,
}

impl SourceBuilder {
    pub fn new() -> Self {
        SourceBuilder { next: Cell::new(0) }
    }

    /// A span not used by any node built so far.
    pub fn span(&self) -> Span {
        let start = self.next.get();
        self.next.set(start + 2);
        Span::new(start, start + 1)
    }

    fn expr(&self, kind: ExprKind) -> Expr {
        Expr::new(self.span(), kind)
    }

    fn stmt(&self, kind: StmtKind) -> Stmt {
        Stmt::new(self.span(), kind)
    }

    // ── Expressions ────────────────────────────────────────────────────

    pub fn ident(&self, name: &str) -> Expr {
        self.expr(ExprKind::Ident(name.to_string()))
    }

    /// A dotted name such as `java.lang.String`.
    pub fn qualified(&self, dotted: &str) -> Expr {
        let mut parts = dotted.split('.');
        let first = parts.next().unwrap_or_default();
        parts.fold(self.ident(first), |acc, part| self.select(acc, part))
    }

    pub fn select(&self, target: Expr, name: &str) -> Expr {
        self.expr(ExprKind::Select { target: Box::new(target), name: name.to_string() })
    }

    pub fn this(&self) -> Expr {
        self.ident(names::THIS)
    }

    pub fn super_(&self) -> Expr {
        self.ident(names::SUPER)
    }

    pub fn literal(&self, value: Constant) -> Expr {
        self.expr(ExprKind::Literal(value))
    }

    pub fn int(&self, v: i32) -> Expr {
        self.literal(Constant::Int(v))
    }

    pub fn long(&self, v: i64) -> Expr {
        self.literal(Constant::Long(v))
    }

    pub fn double(&self, v: f64) -> Expr {
        self.literal(Constant::Double(v))
    }

    pub fn bool(&self, v: bool) -> Expr {
        self.literal(Constant::Bool(v))
    }

    pub fn char(&self, c: char) -> Expr {
        self.literal(Constant::Char(c as u16))
    }

    pub fn str(&self, s: &str) -> Expr {
        self.literal(Constant::Str(s.to_string()))
    }

    pub fn null(&self) -> Expr {
        self.expr(ExprKind::Null)
    }

    pub fn call(&self, meth: Expr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Call { meth: Box::new(meth), type_args: Vec::new(), args, varargs_elem: None })
    }

    /// `name(args)`.
    pub fn call_named(&self, name: &str, args: Vec<Expr>) -> Expr {
        self.call(self.ident(name), args)
    }

    /// `target.name(args)`.
    pub fn invoke(&self, target: Expr, name: &str, args: Vec<Expr>) -> Expr {
        self.call(self.select(target, name), args)
    }

    pub fn new_(&self, class: Expr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::New {
            encl: None,
            class: Box::new(class),
            type_args: Vec::new(),
            args,
            body: None,
            varargs_elem: None,
        })
    }

    /// `outer.new Inner(args)`.
    pub fn new_qualified(&self, encl: Expr, class: Expr, args: Vec<Expr>) -> Expr {
        let mut e = self.new_(class, args);
        if let ExprKind::New { encl: slot, .. } = &mut e.kind {
            *slot = Some(Box::new(encl));
        }
        e
    }

    /// `new Super(args) { members }`.
    pub fn new_anonymous(&self, class: Expr, args: Vec<Expr>, members: Vec<Member>) -> Expr {
        let body = self.class(Flags::EMPTY, "", members);
        let mut e = self.new_(class, args);
        if let ExprKind::New { body: slot, .. } = &mut e.kind {
            *slot = Some(Box::new(body));
        }
        e
    }

    pub fn new_array(&self, elem: Expr, dims: Vec<Expr>) -> Expr {
        self.expr(ExprKind::NewArray { elem: Some(Box::new(elem)), dims, elems: None })
    }

    /// `new Elem[] { elems }`, or a bare `{ elems }` when `elem` is `None`.
    pub fn array_init(&self, elem: Option<Expr>, elems: Vec<Expr>) -> Expr {
        self.expr(ExprKind::NewArray { elem: elem.map(Box::new), dims: Vec::new(), elems: Some(elems) })
    }

    pub fn parens(&self, e: Expr) -> Expr {
        self.expr(ExprKind::Parens(Box::new(e)))
    }

    pub fn assign(&self, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::Assign { lhs: Box::new(lhs), rhs: Box::new(rhs) })
    }

    pub fn assign_op(&self, op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::AssignOp { op, lhs: Box::new(lhs), rhs: Box::new(rhs) })
    }

    pub fn unary(&self, op: UnOp, arg: Expr) -> Expr {
        self.expr(ExprKind::Unary { op, arg: Box::new(arg) })
    }

    pub fn binary(&self, op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) })
    }

    pub fn cast(&self, clazz: Expr, expr: Expr) -> Expr {
        self.expr(ExprKind::Cast { clazz: Box::new(clazz), expr: Box::new(expr) })
    }

    pub fn instance_of(&self, expr: Expr, clazz: Expr) -> Expr {
        self.expr(ExprKind::InstanceOf { expr: Box::new(expr), clazz: Box::new(clazz) })
    }

    pub fn conditional(&self, cond: Expr, then: Expr, els: Expr) -> Expr {
        self.expr(ExprKind::Conditional { cond: Box::new(cond), then: Box::new(then), els: Box::new(els) })
    }

    pub fn index(&self, indexed: Expr, index: Expr) -> Expr {
        self.expr(ExprKind::Index { indexed: Box::new(indexed), index: Box::new(index) })
    }

    /// `T.class`.
    pub fn class_literal(&self, ty: Expr) -> Expr {
        self.select(ty, names::CLASS)
    }

    // ── Type trees ─────────────────────────────────────────────────────

    pub fn prim(&self, p: Prim) -> Expr {
        self.expr(ExprKind::PrimType(p))
    }

    pub fn void(&self) -> Expr {
        self.expr(ExprKind::VoidType)
    }

    pub fn array_of(&self, elem: Expr) -> Expr {
        self.expr(ExprKind::ArrayType(Box::new(elem)))
    }

    /// `Base<args>`; an empty list is the diamond.
    pub fn apply(&self, base: Expr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::TypeApply { base: Box::new(base), args })
    }

    pub fn wildcard(&self, kind: BoundKind, bound: Option<Expr>) -> Expr {
        self.expr(ExprKind::WildcardType { kind, bound: bound.map(Box::new) })
    }

    pub fn union(&self, alts: Vec<Expr>) -> Expr {
        self.expr(ExprKind::UnionType(alts))
    }

    // ── Statements ─────────────────────────────────────────────────────

    pub fn exec(&self, e: Expr) -> Stmt {
        self.stmt(StmtKind::Expr(e))
    }

    pub fn block(&self, stmts: Vec<Stmt>) -> Block {
        Block::new(self.span(), stmts)
    }

    pub fn block_stmt(&self, stmts: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::Block(self.block(stmts)))
    }

    pub fn var(&self, mods: Flags, vtype: Expr, name: &str, init: Option<Expr>) -> VarDecl {
        VarDecl { span: self.span(), mods, name: name.to_string(), vtype: Some(vtype), init, sym: None }
    }

    pub fn local(&self, vtype: Expr, name: &str, init: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::LocalVar(self.var(Flags::EMPTY, vtype, name, init)))
    }

    pub fn local_class(&self, decl: ClassDecl) -> Stmt {
        self.stmt(StmtKind::LocalClass(Box::new(decl)))
    }

    pub fn if_(&self, cond: Expr, then: Stmt, els: Option<Stmt>) -> Stmt {
        self.stmt(StmtKind::If { cond, then: Box::new(then), els: els.map(Box::new) })
    }

    pub fn while_(&self, cond: Expr, body: Stmt) -> Stmt {
        self.stmt(StmtKind::While { cond, body: Box::new(body) })
    }

    pub fn do_while(&self, body: Stmt, cond: Expr) -> Stmt {
        self.stmt(StmtKind::DoWhile { body: Box::new(body), cond })
    }

    pub fn for_(&self, init: Vec<Stmt>, cond: Option<Expr>, step: Vec<Expr>, body: Stmt) -> Stmt {
        self.stmt(StmtKind::For { init, cond, step, body: Box::new(body) })
    }

    pub fn foreach(&self, vtype: Expr, name: &str, expr: Expr, body: Stmt) -> Stmt {
        let var = self.var(Flags::EMPTY, vtype, name, None);
        self.stmt(StmtKind::ForEach { var, expr, body: Box::new(body) })
    }

    pub fn labeled(&self, label: &str, body: Stmt) -> Stmt {
        self.stmt(StmtKind::Labeled { label: label.to_string(), body: Box::new(body) })
    }

    pub fn switch(&self, selector: Expr, cases: Vec<Case>) -> Stmt {
        self.stmt(StmtKind::Switch { selector, cases })
    }

    pub fn case(&self, label: Expr, stmts: Vec<Stmt>) -> Case {
        Case { span: self.span(), label: Some(label), stmts }
    }

    pub fn default_case(&self, stmts: Vec<Stmt>) -> Case {
        Case { span: self.span(), label: None, stmts }
    }

    pub fn break_(&self, label: Option<&str>) -> Stmt {
        self.stmt(StmtKind::Break { label: label.map(str::to_string), target: None })
    }

    pub fn continue_(&self, label: Option<&str>) -> Stmt {
        self.stmt(StmtKind::Continue { label: label.map(str::to_string), target: None })
    }

    pub fn return_(&self, e: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Return(e))
    }

    pub fn throw(&self, e: Expr) -> Stmt {
        self.stmt(StmtKind::Throw(e))
    }

    pub fn try_(&self, resources: Vec<VarDecl>, body: Vec<Stmt>, catches: Vec<Catch>, finalizer: Option<Vec<Stmt>>) -> Stmt {
        self.stmt(StmtKind::Try {
            resources,
            body: self.block(body),
            catches,
            finalizer: finalizer.map(|f| self.block(f)),
        })
    }

    pub fn catch(&self, vtype: Expr, name: &str, body: Vec<Stmt>) -> Catch {
        Catch { span: self.span(), param: self.var(Flags::EMPTY, vtype, name, None), body: self.block(body) }
    }

    pub fn synchronized(&self, lock: Expr, body: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::Synchronized { lock, body: self.block(body) })
    }

    pub fn assert_(&self, cond: Expr, detail: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Assert { cond, detail })
    }

    pub fn skip(&self) -> Stmt {
        self.stmt(StmtKind::Skip)
    }

    // ── Declarations ───────────────────────────────────────────────────

    pub fn class(&self, mods: Flags, name: &str, members: Vec<Member>) -> ClassDecl {
        ClassDecl {
            span: self.span(),
            mods,
            suppress: Vec::new(),
            name: name.to_string(),
            type_params: Vec::new(),
            extends: None,
            implements: Vec::new(),
            members,
            sym: None,
        }
    }

    pub fn interface(&self, mods: Flags, name: &str, members: Vec<Member>) -> ClassDecl {
        self.class(mods | Flags::INTERFACE | Flags::ABSTRACT, name, members)
    }

    /// An enum with the given constants, each `(name, args)`, followed by
    /// `members`.
    pub fn enum_(&self, mods: Flags, name: &str, constants: Vec<(&str, Vec<Expr>)>, members: Vec<Member>) -> ClassDecl {
        let mut all: Vec<Member> = constants
            .into_iter()
            .map(|(c, args)| {
                let mut v = crate::make::TreeMaker::at(self.span()).enum_constant(name, c, args, None);
                v.span = self.span();
                Member::Var(v)
            })
            .collect();
        all.extend(members);
        self.class(mods | Flags::ENUM, name, all)
    }

    pub fn type_param(&self, name: &str, bounds: Vec<Expr>) -> TypeParam {
        TypeParam { span: self.span(), name: name.to_string(), bounds, sym: None }
    }

    pub fn field(&self, mods: Flags, vtype: Expr, name: &str, init: Option<Expr>) -> Member {
        Member::Var(self.var(mods, vtype, name, init))
    }

    pub fn param(&self, vtype: Expr, name: &str) -> VarDecl {
        self.var(Flags::EMPTY, vtype, name, None)
    }

    /// A method; `body` is `None` for abstract and native methods.
    pub fn method(&self, mods: Flags, ret: Expr, name: &str, params: Vec<VarDecl>, body: Option<Vec<Stmt>>) -> MethodDecl {
        MethodDecl {
            span: self.span(),
            mods,
            suppress: Vec::new(),
            name: name.to_string(),
            type_params: Vec::new(),
            ret: Some(ret),
            params,
            thrown: Vec::new(),
            body: body.map(|b| self.block(b)),
            sym: None,
        }
    }

    pub fn ctor(&self, mods: Flags, params: Vec<VarDecl>, body: Vec<Stmt>) -> MethodDecl {
        let mut m = self.method(mods, self.void(), names::INIT, params, Some(body));
        m.ret = None;
        m
    }

    pub fn init_block(&self, is_static: bool, stmts: Vec<Stmt>) -> Member {
        Member::Init(Initializer { is_static, body: self.block(stmts) })
    }

    pub fn import(&self, name: &str, is_static: bool) -> Import {
        Import { span: self.span(), name: name.to_string(), is_static }
    }

    pub fn unit(&self, package: &str, imports: Vec<Import>, classes: Vec<ClassDecl>) -> CompilationUnit {
        CompilationUnit { span: self.span(), package: package.to_string(), imports, classes, package_sym: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_are_distinct() {
        let b = SourceBuilder::new();
        let x = b.ident("x");
        let y = b.ident("y");
        assert_ne!(x.span, y.span);
        assert!(x.ty.is_none() && x.sym.is_none());
    }

    #[test]
    fn dotted_names_nest_left() {
        let b = SourceBuilder::new();
        let q = b.qualified("java.lang.String");
        assert_eq!(qualified_name(&q).as_deref(), Some("java.lang.String"));
        assert_eq!(q.name(), Some("String"));
    }

    #[test]
    fn constructors_have_no_return_type() {
        let b = SourceBuilder::new();
        let c = b.ctor(Flags::PUBLIC, vec![], vec![]);
        assert!(c.is_constructor());
        assert!(c.ret.is_none());
        assert!(c.body.is_some());
    }
}
