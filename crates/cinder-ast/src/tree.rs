//! Syntax tree node definitions.
//!
//! The tree is a closed sum type. Expression nodes carry the slots the
//! attributor fills in (`ty`, `sym`, `constant`); statements carry a
//! [`NodeId`] so `break` and `continue` can name their target.

use std::sync::atomic::{AtomicU32, Ordering};

use cinder_common::{LintCategory, Span};
use cinder_symtab::{BoundKind, Constant, Flags, Prim, SymbolId, Type};

/// Identity of a statement, used as a jump target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(1);

impl NodeId {
    pub fn fresh() -> NodeId {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

// ── Declarations ───────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct CompilationUnit {
    pub span: Span,
    /// Dotted package name; empty for the unnamed package.
    pub package: String,
    pub imports: Vec<Import>,
    pub classes: Vec<ClassDecl>,
    pub package_sym: Option<SymbolId>,
}

#[derive(Clone, Debug)]
pub struct Import {
    pub span: Span,
    /// Dotted name; ends in `*` for on-demand imports.
    pub name: String,
    pub is_static: bool,
}

impl Import {
    pub fn is_on_demand(&self) -> bool {
        self.name.ends_with(".*")
    }
}

#[derive(Clone, Debug)]
pub struct TypeParam {
    pub span: Span,
    pub name: String,
    pub bounds: Vec<Expr>,
    pub sym: Option<SymbolId>,
}

#[derive(Clone, Debug)]
pub struct ClassDecl {
    pub span: Span,
    pub mods: Flags,
    /// Lint categories suppressed for this declaration.
    pub suppress: Vec<LintCategory>,
    /// Simple name; empty for anonymous classes.
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub extends: Option<Expr>,
    pub implements: Vec<Expr>,
    pub members: Vec<Member>,
    pub sym: Option<SymbolId>,
}

impl ClassDecl {
    pub fn is_interface(&self) -> bool {
        self.mods.contains(Flags::INTERFACE)
    }

    pub fn is_enum(&self) -> bool {
        self.mods.contains(Flags::ENUM)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Method(md) => Some(md),
            _ => None,
        })
    }

    pub fn methods_mut(&mut self) -> impl Iterator<Item = &mut MethodDecl> {
        self.members.iter_mut().filter_map(|m| match m {
            Member::Method(md) => Some(md),
            _ => None,
        })
    }
}

#[derive(Clone, Debug)]
pub enum Member {
    Class(ClassDecl),
    Method(MethodDecl),
    Var(VarDecl),
    Init(Initializer),
}

impl Member {
    pub fn span(&self) -> Span {
        match self {
            Member::Class(c) => c.span,
            Member::Method(m) => m.span,
            Member::Var(v) => v.span,
            Member::Init(i) => i.body.span,
        }
    }

    pub fn sym(&self) -> Option<SymbolId> {
        match self {
            Member::Class(c) => c.sym,
            Member::Method(m) => m.sym,
            Member::Var(v) => v.sym,
            Member::Init(_) => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Initializer {
    pub is_static: bool,
    pub body: Block,
}

#[derive(Clone, Debug)]
pub struct MethodDecl {
    pub span: Span,
    pub mods: Flags,
    pub suppress: Vec<LintCategory>,
    pub name: String,
    pub type_params: Vec<TypeParam>,
    /// `None` for constructors.
    pub ret: Option<Expr>,
    pub params: Vec<VarDecl>,
    pub thrown: Vec<Expr>,
    pub body: Option<Block>,
    pub sym: Option<SymbolId>,
}

impl MethodDecl {
    pub fn is_constructor(&self) -> bool {
        self.name == cinder_symtab::names::INIT
    }
}

#[derive(Clone, Debug)]
pub struct VarDecl {
    pub span: Span,
    pub mods: Flags,
    pub name: String,
    /// `None` only for synthesized variables whose type is on the symbol.
    pub vtype: Option<Expr>,
    pub init: Option<Expr>,
    pub sym: Option<SymbolId>,
}

// ── Statements ─────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Block {
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug)]
pub struct Stmt {
    pub id: NodeId,
    pub span: Span,
    pub kind: StmtKind,
}

#[derive(Clone, Debug)]
pub struct Case {
    pub span: Span,
    /// `None` for `default`.
    pub label: Option<Expr>,
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug)]
pub struct Catch {
    pub span: Span,
    pub param: VarDecl,
    pub body: Block,
}

#[derive(Clone, Debug)]
pub enum StmtKind {
    Block(Block),
    LocalVar(VarDecl),
    LocalClass(Box<ClassDecl>),
    Expr(Expr),
    If {
        cond: Expr,
        then: Box<Stmt>,
        els: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Vec<Stmt>,
        cond: Option<Expr>,
        step: Vec<Expr>,
        body: Box<Stmt>,
    },
    ForEach {
        var: VarDecl,
        expr: Expr,
        body: Box<Stmt>,
    },
    Labeled {
        label: String,
        body: Box<Stmt>,
    },
    Switch {
        selector: Expr,
        cases: Vec<Case>,
    },
    Break {
        label: Option<String>,
        target: Option<NodeId>,
    },
    Continue {
        label: Option<String>,
        target: Option<NodeId>,
    },
    Return(Option<Expr>),
    Throw(Expr),
    Try {
        resources: Vec<VarDecl>,
        body: Block,
        catches: Vec<Catch>,
        finalizer: Option<Block>,
    },
    Synchronized {
        lock: Expr,
        body: Block,
    },
    Assert {
        cond: Expr,
        detail: Option<Expr>,
    },
    Skip,
}

impl Stmt {
    pub fn new(span: Span, kind: StmtKind) -> Stmt {
        Stmt { id: NodeId::fresh(), span, kind }
    }

    pub fn is_loop(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::While { .. } | StmtKind::DoWhile { .. } | StmtKind::For { .. } | StmtKind::ForEach { .. }
        )
    }
}

// ── Expressions ────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnOp {
    Pos,
    Neg,
    Not,
    Compl,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Pos => "+",
            UnOp::Neg => "-",
            UnOp::Not => "!",
            UnOp::Compl => "~",
            UnOp::PreInc | UnOp::PostInc => "++",
            UnOp::PreDec | UnOp::PostDec => "--",
        }
    }

    pub fn is_increment(self) -> bool {
        matches!(self, UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec)
    }

    pub fn is_postfix(self) -> bool {
        matches!(self, UnOp::PostInc | UnOp::PostDec)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Shl,
    Shr,
    Ushr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    pub const ALL: [BinOp; 19] = [
        BinOp::Or,
        BinOp::And,
        BinOp::BitOr,
        BinOp::BitXor,
        BinOp::BitAnd,
        BinOp::Eq,
        BinOp::Ne,
        BinOp::Lt,
        BinOp::Gt,
        BinOp::Le,
        BinOp::Ge,
        BinOp::Shl,
        BinOp::Shr,
        BinOp::Ushr,
        BinOp::Add,
        BinOp::Sub,
        BinOp::Mul,
        BinOp::Div,
        BinOp::Mod,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Or => "||",
            BinOp::And => "&&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::BitAnd => "&",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Ushr => ">>>",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
        }
    }

    /// Binding strength used by the printer; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::BitOr => 3,
            BinOp::BitXor => 4,
            BinOp::BitAnd => 5,
            BinOp::Eq | BinOp::Ne => 6,
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => 7,
            BinOp::Shl | BinOp::Shr | BinOp::Ushr => 8,
            BinOp::Add | BinOp::Sub => 9,
            BinOp::Mul | BinOp::Div | BinOp::Mod => 10,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
    /// Attributed type.
    pub ty: Option<Type>,
    /// Resolved symbol of identifiers, selections, invocations, instance
    /// creations and operator applications.
    pub sym: Option<SymbolId>,
    /// Compile-time constant value, if any.
    pub constant: Option<Constant>,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Literal(Constant),
    Null,
    Ident(String),
    Select {
        target: Box<Expr>,
        name: String,
    },
    Call {
        meth: Box<Expr>,
        type_args: Vec<Expr>,
        args: Vec<Expr>,
        /// Element type of the variable-arity parameter when the call was
        /// resolved in the variable-arity phase.
        varargs_elem: Option<Type>,
    },
    New {
        encl: Option<Box<Expr>>,
        class: Box<Expr>,
        type_args: Vec<Expr>,
        args: Vec<Expr>,
        body: Option<Box<ClassDecl>>,
        varargs_elem: Option<Type>,
    },
    NewArray {
        elem: Option<Box<Expr>>,
        dims: Vec<Expr>,
        elems: Option<Vec<Expr>>,
    },
    Parens(Box<Expr>),
    Assign {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    AssignOp {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnOp,
        arg: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Cast {
        clazz: Box<Expr>,
        expr: Box<Expr>,
    },
    InstanceOf {
        expr: Box<Expr>,
        clazz: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        els: Box<Expr>,
    },
    Index {
        indexed: Box<Expr>,
        index: Box<Expr>,
    },
    /// Statements evaluated before a value, produced by lowering.
    Let {
        stmts: Vec<Stmt>,
        expr: Box<Expr>,
    },
    PrimType(Prim),
    VoidType,
    ArrayType(Box<Expr>),
    TypeApply {
        base: Box<Expr>,
        args: Vec<Expr>,
    },
    WildcardType {
        kind: BoundKind,
        bound: Option<Box<Expr>>,
    },
    UnionType(Vec<Expr>),
    Erroneous,
}

impl Expr {
    pub fn new(span: Span, kind: ExprKind) -> Expr {
        Expr { span, kind, ty: None, sym: None, constant: None }
    }

    /// The attributed type, or the error type if attribution has not run.
    pub fn ty(&self) -> Type {
        self.ty.clone().unwrap_or(Type::Error)
    }

    pub fn with_type(mut self, ty: Type) -> Expr {
        self.ty = Some(ty);
        self
    }

    pub fn with_sym(mut self, sym: SymbolId) -> Expr {
        self.sym = Some(sym);
        self
    }

    /// Strip any number of enclosing parentheses.
    pub fn skip_parens(&self) -> &Expr {
        let mut e = self;
        while let ExprKind::Parens(inner) = &e.kind {
            e = inner;
        }
        e
    }

    pub fn skip_parens_mut(&mut self) -> &mut Expr {
        let mut e = self;
        while let ExprKind::Parens(_) = e.kind {
            let ExprKind::Parens(inner) = &mut e.kind else { unreachable!() };
            e = inner;
        }
        e
    }

    /// The simple name of an identifier or selection.
    pub fn name(&self) -> Option<&str> {
        match &self.skip_parens().kind {
            ExprKind::Ident(n) => Some(n),
            ExprKind::Select { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Whether this is the identifier `this` or `super`, or a qualified
    /// form of it.
    pub fn is_this_or_super(&self) -> bool {
        matches!(self.name(), Some("this" | "super"))
    }

    pub fn is_type_tree(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::PrimType(_)
                | ExprKind::VoidType
                | ExprKind::ArrayType(_)
                | ExprKind::TypeApply { .. }
                | ExprKind::WildcardType { .. }
                | ExprKind::UnionType(_)
        )
    }

    /// Replace this node by a placeholder, returning the previous node.
    pub fn take(&mut self) -> Expr {
        std::mem::replace(self, Expr::new(self.span, ExprKind::Erroneous))
    }
}

impl Block {
    pub fn new(span: Span, stmts: Vec<Stmt>) -> Block {
        Block { span, stmts }
    }
}

/// The dotted name of a qualified identifier tree, e.g. `java.lang.String`.
pub fn qualified_name(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Ident(n) => Some(n.clone()),
        ExprKind::Select { target, name } => Some(format!("{}.{}", qualified_name(target)?, name)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique() {
        let a = Stmt::new(Span::DUMMY, StmtKind::Skip);
        let b = Stmt::new(Span::DUMMY, StmtKind::Skip);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn qualified_names() {
        let java = Expr::new(Span::DUMMY, ExprKind::Ident("java".into()));
        let lang = Expr::new(Span::DUMMY, ExprKind::Select { target: Box::new(java), name: "lang".into() });
        let parens = Expr::new(Span::DUMMY, ExprKind::Parens(Box::new(lang.clone())));
        assert_eq!(qualified_name(&lang).as_deref(), Some("java.lang"));
        assert_eq!(parens.name(), Some("lang"));
    }
}
