//! Construction of attributed trees for synthesized code.
//!
//! Every node a [`TreeMaker`] produces carries the position it was created
//! at, and expressions built from symbols come out already attributed, so
//! later phases can treat synthesized and parsed code alike.

use cinder_common::Span;
use cinder_symtab::{names, Constant, Flags, Prim, SymKind, SymbolId, Symtab, Type};

use crate::tree::*;

#[derive(Copy, Clone, Debug, Default)]
pub struct TreeMaker {
    pub pos: Span,
}

impl TreeMaker {
    pub fn at(pos: Span) -> TreeMaker {
        TreeMaker { pos }
    }

    fn expr(&self, kind: ExprKind, ty: Type) -> Expr {
        Expr::new(self.pos, kind).with_type(ty)
    }

    fn stmt(&self, kind: StmtKind) -> Stmt {
        Stmt::new(self.pos, kind)
    }

    // ── Expressions ────────────────────────────────────────────────────

    pub fn literal(&self, value: Constant, ty: Type) -> Expr {
        let mut e = self.expr(ExprKind::Literal(value.clone()), ty);
        e.constant = Some(value);
        e
    }

    pub fn int(&self, value: i32) -> Expr {
        self.literal(Constant::Int(value), Type::int())
    }

    pub fn bool(&self, value: bool) -> Expr {
        self.literal(Constant::Bool(value), Type::boolean())
    }

    pub fn string(&self, syms: &Symtab, value: &str) -> Expr {
        self.literal(Constant::Str(value.to_string()), syms.string_type())
    }

    pub fn null(&self) -> Expr {
        self.expr(ExprKind::Null, Type::Null)
    }

    /// An identifier referring to `sym`, typed with the symbol's type.
    pub fn ident(&self, syms: &Symtab, sym: SymbolId) -> Expr {
        let name = syms.name(sym).to_string();
        self.expr(ExprKind::Ident(name), syms.ty(sym).clone()).with_sym(sym)
    }

    /// An identifier with an explicit name and type, e.g. `this`.
    pub fn ident_named(&self, name: &str, sym: SymbolId, ty: Type) -> Expr {
        self.expr(ExprKind::Ident(name.to_string()), ty).with_sym(sym)
    }

    pub fn this(&self, class: SymbolId, ty: Type) -> Expr {
        self.ident_named(names::THIS, class, ty)
    }

    pub fn select(&self, syms: &Symtab, target: Expr, sym: SymbolId) -> Expr {
        let ty = match &target.ty {
            Some(site) if !site.is_error() && syms.kind(sym) != SymKind::Class => syms.member_type(site, sym),
            _ => syms.ty(sym).clone(),
        };
        self.select_typed(target, sym, syms.name(sym), ty)
    }

    pub fn select_typed(&self, target: Expr, sym: SymbolId, name: &str, ty: Type) -> Expr {
        self.expr(ExprKind::Select { target: Box::new(target), name: name.to_string() }, ty).with_sym(sym)
    }

    /// An invocation of a method tree (identifier or selection) whose symbol
    /// and method type are already set.
    pub fn call(&self, meth: Expr, args: Vec<Expr>) -> Expr {
        let ret = meth.ty().ret();
        let sym = meth.sym;
        let mut e = self.expr(
            ExprKind::Call { meth: Box::new(meth), type_args: Vec::new(), args, varargs_elem: None },
            ret,
        );
        e.sym = sym;
        e
    }

    /// `target.method(args)` resolved to `method`.
    pub fn call_method(&self, syms: &Symtab, target: Expr, method: SymbolId, args: Vec<Expr>) -> Expr {
        let meth = self.select(syms, target, method);
        self.call(meth, args)
    }

    /// `Class.method(args)` for a static method.
    pub fn call_static(&self, syms: &Symtab, method: SymbolId, args: Vec<Expr>) -> Expr {
        let owner = syms.owner(method).unwrap_or(syms.predef.object);
        let target = self.type_ident(syms, owner);
        self.call_method(syms, target, method, args)
    }

    /// `new C(args)` resolved to constructor `ctor`.
    pub fn new_class(&self, syms: &Symtab, class_ty: Type, ctor: SymbolId, args: Vec<Expr>) -> Expr {
        let clazz = self.type_tree(syms, &class_ty);
        self.expr(
            ExprKind::New {
                encl: None,
                class: Box::new(clazz),
                type_args: Vec::new(),
                args,
                body: None,
                varargs_elem: None,
            },
            class_ty,
        )
        .with_sym(ctor)
    }

    /// `new T[len]`.
    pub fn new_array(&self, syms: &Symtab, elem: Type, dims: Vec<Expr>) -> Expr {
        let elem_tree = self.type_tree(syms, &elem);
        let mut ty = elem;
        for _ in 0..dims.len() {
            ty = Type::array(ty);
        }
        self.expr(ExprKind::NewArray { elem: Some(Box::new(elem_tree)), dims, elems: None }, ty)
    }

    /// `new T[] { elems }`.
    pub fn new_array_init(&self, syms: &Symtab, elem: Type, elems: Vec<Expr>) -> Expr {
        let elem_tree = self.type_tree(syms, &elem);
        self.expr(
            ExprKind::NewArray { elem: Some(Box::new(elem_tree)), dims: Vec::new(), elems: Some(elems) },
            Type::array(elem),
        )
    }

    pub fn index(&self, indexed: Expr, index: Expr) -> Expr {
        let ty = indexed.ty().elem_type().cloned().unwrap_or(Type::Error);
        self.expr(ExprKind::Index { indexed: Box::new(indexed), index: Box::new(index) }, ty)
    }

    pub fn assign(&self, lhs: Expr, rhs: Expr) -> Expr {
        let ty = lhs.ty();
        self.expr(ExprKind::Assign { lhs: Box::new(lhs), rhs: Box::new(rhs) }, ty)
    }

    pub fn assign_op(&self, op: BinOp, operator: SymbolId, lhs: Expr, rhs: Expr) -> Expr {
        let ty = lhs.ty();
        self.expr(ExprKind::AssignOp { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, ty).with_sym(operator)
    }

    /// A binary operation resolved to `operator`.
    pub fn binary(&self, syms: &Symtab, op: BinOp, operator: SymbolId, lhs: Expr, rhs: Expr) -> Expr {
        let ty = syms.ty(operator).ret();
        self.expr(ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, ty).with_sym(operator)
    }

    pub fn unary(&self, syms: &Symtab, op: UnOp, operator: Option<SymbolId>, arg: Expr) -> Expr {
        let ty = match operator {
            Some(o) if !op.is_increment() => syms.ty(o).ret(),
            _ => arg.ty(),
        };
        let mut e = self.expr(ExprKind::Unary { op, arg: Box::new(arg) }, ty);
        e.sym = operator;
        e
    }

    pub fn cast(&self, syms: &Symtab, ty: Type, expr: Expr) -> Expr {
        let clazz = self.type_tree(syms, &ty);
        self.expr(ExprKind::Cast { clazz: Box::new(clazz), expr: Box::new(expr) }, ty)
    }

    pub fn conditional(&self, cond: Expr, then: Expr, els: Expr, ty: Type) -> Expr {
        self.expr(ExprKind::Conditional { cond: Box::new(cond), then: Box::new(then), els: Box::new(els) }, ty)
    }

    pub fn let_expr(&self, stmts: Vec<Stmt>, expr: Expr) -> Expr {
        let ty = expr.ty();
        self.expr(ExprKind::Let { stmts, expr: Box::new(expr) }, ty)
    }

    pub fn parens(&self, expr: Expr) -> Expr {
        let ty = expr.ty();
        let constant = expr.constant.clone();
        let mut e = self.expr(ExprKind::Parens(Box::new(expr)), ty);
        e.constant = constant;
        e
    }

    /// `C.class`, typed `Class<C>`.
    pub fn class_literal(&self, syms: &Symtab, class_ty: Type) -> Expr {
        let target = self.type_tree(syms, &class_ty);
        let ty = Type::class_with(syms.predef.class, vec![syms.erasure(&class_ty)]);
        self.expr(ExprKind::Select { target: Box::new(target), name: names::CLASS.to_string() }, ty)
    }

    // ── Type trees ─────────────────────────────────────────────────────

    /// An identifier naming a class, printed with its binary simple name.
    pub fn type_ident(&self, syms: &Symtab, class: SymbolId) -> Expr {
        let name = simple_flatname(syms, class);
        self.expr(ExprKind::Ident(name), syms.erasure(syms.ty(class))).with_sym(class)
    }

    /// A tree denoting `ty`.
    pub fn type_tree(&self, syms: &Symtab, ty: &Type) -> Expr {
        match ty {
            Type::Prim(p) => self.prim_type(*p),
            Type::Void => self.expr(ExprKind::VoidType, Type::Void),
            Type::Array(elem) => {
                let elem_tree = self.type_tree(syms, elem);
                self.expr(ExprKind::ArrayType(Box::new(elem_tree)), ty.clone())
            }
            Type::Class(ct) => {
                let base = self.type_ident(syms, ct.sym);
                if ct.args.is_empty() {
                    base.with_type(ty.clone())
                } else {
                    let args = ct.args.iter().map(|a| self.type_tree(syms, a)).collect();
                    self.expr(ExprKind::TypeApply { base: Box::new(base), args }, ty.clone())
                }
            }
            Type::TypeVar(tv) => self.expr(ExprKind::Ident(syms.name(*tv).to_string()), ty.clone()).with_sym(*tv),
            Type::Wildcard(wc) => {
                let bound = wc.bound.as_ref().map(|b| Box::new(self.type_tree(syms, b)));
                self.expr(ExprKind::WildcardType { kind: wc.kind, bound }, ty.clone())
            }
            Type::Union(alts) => {
                let alts = alts.iter().map(|a| self.type_tree(syms, a)).collect();
                self.expr(ExprKind::UnionType(alts), ty.clone())
            }
            Type::Intersection(parts) => match parts.first() {
                Some(first) => self.type_tree(syms, first),
                None => self.type_tree(syms, &syms.object_type()),
            },
            _ => self.expr(ExprKind::Erroneous, Type::Error),
        }
    }

    pub fn prim_type(&self, prim: Prim) -> Expr {
        self.expr(ExprKind::PrimType(prim), Type::Prim(prim))
    }

    // ── Statements ─────────────────────────────────────────────────────

    pub fn exec(&self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Expr(expr))
    }

    pub fn block(&self, stmts: Vec<Stmt>) -> Block {
        Block::new(self.pos, stmts)
    }

    pub fn block_stmt(&self, stmts: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::Block(self.block(stmts)))
    }

    pub fn if_(&self, cond: Expr, then: Stmt, els: Option<Stmt>) -> Stmt {
        self.stmt(StmtKind::If { cond, then: Box::new(then), els: els.map(Box::new) })
    }

    pub fn return_(&self, expr: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Return(expr))
    }

    pub fn throw(&self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Throw(expr))
    }

    pub fn break_(&self, target: NodeId) -> Stmt {
        self.stmt(StmtKind::Break { label: None, target: Some(target) })
    }

    pub fn skip(&self) -> Stmt {
        self.stmt(StmtKind::Skip)
    }

    pub fn try_(&self, body: Block, catches: Vec<Catch>, finalizer: Option<Block>) -> Stmt {
        self.stmt(StmtKind::Try { resources: Vec::new(), body, catches, finalizer })
    }

    pub fn catch(&self, param: VarDecl, body: Block) -> Catch {
        Catch { span: self.pos, param, body }
    }

    pub fn switch(&self, selector: Expr, cases: Vec<Case>) -> Stmt {
        self.stmt(StmtKind::Switch { selector, cases })
    }

    pub fn case(&self, label: Option<Expr>, stmts: Vec<Stmt>) -> Case {
        Case { span: self.pos, label, stmts }
    }

    /// A declaration of variable `sym` with an optional initializer.
    pub fn var_decl(&self, syms: &Symtab, sym: SymbolId, init: Option<Expr>) -> VarDecl {
        let s = syms.sym(sym);
        VarDecl {
            span: self.pos,
            mods: s.flags,
            name: s.name.clone(),
            vtype: Some(self.type_tree(syms, &s.ty)),
            init,
            sym: Some(sym),
        }
    }

    pub fn local_var(&self, syms: &Symtab, sym: SymbolId, init: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::LocalVar(self.var_decl(syms, sym, init)))
    }

    /// A method declaration for `method` with the given body, taking its
    /// parameters from the symbol.
    pub fn method_decl(&self, syms: &Symtab, method: SymbolId, body: Option<Block>) -> MethodDecl {
        let s = syms.sym(method);
        let params = s.method_params().iter().map(|p| self.var_decl(syms, *p, None)).collect();
        let ret = if s.is_constructor() { None } else { Some(self.type_tree(syms, &s.ty.ret())) };
        let thrown = s.ty.thrown().iter().map(|t| self.type_tree(syms, t)).collect();
        MethodDecl {
            span: self.pos,
            mods: s.flags,
            suppress: Vec::new(),
            name: s.name.clone(),
            type_params: Vec::new(),
            ret,
            params,
            thrown,
            body,
            sym: Some(method),
        }
    }

    /// A bare class declaration for `class` with the given members.
    pub fn class_decl(&self, syms: &Symtab, class: SymbolId, members: Vec<Member>) -> ClassDecl {
        let info = syms.class_info(class);
        let extends = info
            .supertype
            .as_ref()
            .filter(|t| t.class_sym() != Some(syms.predef.object))
            .map(|t| self.type_tree(syms, t));
        let implements = info.interfaces.iter().map(|t| self.type_tree(syms, t)).collect();
        ClassDecl {
            span: self.pos,
            mods: syms.flags(class),
            suppress: Vec::new(),
            name: syms.name(class).to_string(),
            type_params: Vec::new(),
            extends,
            implements,
            members,
            sym: Some(class),
        }
    }

    /// `EnumType NAME = new EnumType(args) { body }`, the shape enum
    /// constants take in a class body.
    pub fn enum_constant(&self, enum_name: &str, name: &str, args: Vec<Expr>, body: Option<ClassDecl>) -> VarDecl {
        let ty = Expr::new(self.pos, ExprKind::Ident(enum_name.to_string()));
        let class = Expr::new(self.pos, ExprKind::Ident(enum_name.to_string()));
        let init = Expr::new(
            self.pos,
            ExprKind::New {
                encl: None,
                class: Box::new(class),
                type_args: Vec::new(),
                args,
                body: body.map(Box::new),
                varargs_elem: None,
            },
        );
        VarDecl {
            span: self.pos,
            mods: Flags::PUBLIC | Flags::STATIC | Flags::FINAL | Flags::ENUM,
            name: name.to_string(),
            vtype: Some(ty),
            init: Some(init),
            sym: None,
        }
    }
}

/// A class's binary name without its package prefix, e.g. `Outer$Inner`.
pub fn simple_flatname(syms: &Symtab, class: SymbolId) -> String {
    if !syms.is_class(class) {
        return syms.name(class).to_string();
    }
    let flat = syms.flatname(class);
    match flat.rfind('.') {
        Some(dot) => flat[dot + 1..].to_string(),
        None => flat.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selections_are_typed_through_the_site() {
        let syms = Symtab::new();
        let make = TreeMaker::at(Span::new(3, 9));
        let s = make.string(&syms, "abc");
        let len = syms.methods_named(syms.predef.string, names::LENGTH).next().unwrap();
        let call = make.call_method(&syms, s, len, vec![]);
        assert_eq!(call.ty, Some(Type::int()));
        assert_eq!(call.sym, Some(len));
        assert_eq!(call.span, Span::new(3, 9));
    }

    #[test]
    fn type_trees_for_arrays_and_generics() {
        let syms = Symtab::new();
        let make = TreeMaker::default();
        let ty = Type::array(Type::class_with(syms.predef.comparable, vec![syms.string_type()]));
        let tree = make.type_tree(&syms, &ty);
        let ExprKind::ArrayType(elem) = &tree.kind else { panic!("expected array type") };
        assert!(matches!(elem.kind, ExprKind::TypeApply { .. }));
        assert_eq!(tree.ty, Some(ty));
    }
}
