//! Deterministic source-like rendering of trees, used by tests and debug
//! dumps of lowered and erased code.

use std::fmt::Write;

use cinder_symtab::{BoundKind, Flags};

use crate::tree::*;

const INDENT: &str = "    ";

pub fn print_unit(unit: &CompilationUnit) -> String {
    let mut p = Printer::default();
    if !unit.package.is_empty() {
        p.line(&format!("package {};", unit.package));
    }
    for imp in &unit.imports {
        let kw = if imp.is_static { "import static" } else { "import" };
        p.line(&format!("{} {};", kw, imp.name));
    }
    for class in &unit.classes {
        p.class(class);
    }
    p.out
}

pub fn print_class(class: &ClassDecl) -> String {
    let mut p = Printer::default();
    p.class(class);
    p.out
}

pub fn print_method(method: &MethodDecl) -> String {
    let mut p = Printer::default();
    p.method(method);
    p.out
}

pub fn print_stmt(stmt: &Stmt) -> String {
    let mut p = Printer::default();
    p.stmt(stmt);
    p.out
}

pub fn print_expr(expr: &Expr) -> String {
    let mut s = String::new();
    expr_to(&mut s, expr, 0);
    s
}

#[derive(Default)]
struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn class(&mut self, class: &ClassDecl) {
        let mut head = modifiers(class.mods & !(Flags::INTERFACE | Flags::ENUM));
        head.push_str(if class.is_interface() {
            "interface "
        } else if class.is_enum() {
            "enum "
        } else {
            "class "
        });
        head.push_str(&class.name);
        head.push_str(&type_params(&class.type_params));
        if let Some(ext) = &class.extends {
            head.push_str(" extends ");
            head.push_str(&print_expr(ext));
        }
        if !class.implements.is_empty() {
            head.push_str(if class.is_interface() { " extends " } else { " implements " });
            head.push_str(&join(&class.implements));
        }
        head.push_str(" {");
        self.line(&head);
        self.depth += 1;
        for member in &class.members {
            match member {
                Member::Class(c) => self.class(c),
                Member::Method(m) => self.method(m),
                Member::Var(v) => {
                    let text = var_decl(v);
                    self.line(&format!("{};", text));
                }
                Member::Init(init) => {
                    self.line(if init.is_static { "static {" } else { "{" });
                    self.block_body(&init.body);
                    self.line("}");
                }
            }
        }
        self.depth -= 1;
        self.line("}");
    }

    fn method(&mut self, method: &MethodDecl) {
        let mut head = modifiers(method.mods);
        let tps = type_params(&method.type_params);
        if !tps.is_empty() {
            head.push_str(&tps);
            head.push(' ');
        }
        if let Some(ret) = &method.ret {
            head.push_str(&print_expr(ret));
            head.push(' ');
        }
        head.push_str(&method.name);
        head.push('(');
        let params: Vec<String> = method.params.iter().map(var_decl).collect();
        head.push_str(&params.join(", "));
        head.push(')');
        if !method.thrown.is_empty() {
            head.push_str(" throws ");
            head.push_str(&join(&method.thrown));
        }
        match &method.body {
            Some(body) => {
                head.push_str(" {");
                self.line(&head);
                self.block_body(body);
                self.line("}");
            }
            None => {
                head.push(';');
                self.line(&head);
            }
        }
    }

    fn block_body(&mut self, block: &Block) {
        self.depth += 1;
        for s in &block.stmts {
            self.stmt(s);
        }
        self.depth -= 1;
    }

    /// Print `stmt` as the body of a compound statement whose head is
    /// `head`, closing with `tail`.
    fn nested(&mut self, head: &str, body: &Stmt, tail: &str) {
        match &body.kind {
            StmtKind::Block(b) => {
                self.line(&format!("{} {{", head));
                self.block_body(b);
                self.line(&format!("}}{}", tail));
            }
            _ => {
                self.line(head);
                self.depth += 1;
                self.stmt(body);
                self.depth -= 1;
                if !tail.is_empty() {
                    self.line(tail.trim());
                }
            }
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Block(b) => {
                self.line("{");
                self.block_body(b);
                self.line("}");
            }
            StmtKind::LocalVar(v) => {
                let text = var_decl(v);
                self.line(&format!("{};", text));
            }
            StmtKind::LocalClass(c) => self.class(c),
            StmtKind::Expr(e) => self.line(&format!("{};", print_expr(e))),
            StmtKind::If { cond, then, els } => {
                let head = format!("if ({})", print_expr(cond));
                match els {
                    None => self.nested(&head, then, ""),
                    Some(els) => {
                        self.nested(&head, then, "");
                        self.nested("else", els, "");
                    }
                }
            }
            StmtKind::While { cond, body } => {
                let head = format!("while ({})", print_expr(cond));
                self.nested(&head, body, "");
            }
            StmtKind::DoWhile { body, cond } => {
                let tail = format!(" while ({});", print_expr(cond));
                self.nested("do", body, &tail);
            }
            StmtKind::For { init, cond, step, body } => {
                let init: Vec<String> = init
                    .iter()
                    .map(|s| match &s.kind {
                        StmtKind::LocalVar(v) => var_decl(v),
                        StmtKind::Expr(e) => print_expr(e),
                        _ => String::from("/* ? */"),
                    })
                    .collect();
                let cond = cond.as_ref().map(print_expr).unwrap_or_default();
                let head = format!("for ({}; {}; {})", init.join(", "), cond, join(step));
                self.nested(&head, body, "");
            }
            StmtKind::ForEach { var, expr, body } => {
                let head = format!("for ({} : {})", var_decl(var), print_expr(expr));
                self.nested(&head, body, "");
            }
            StmtKind::Labeled { label, body } => {
                self.line(&format!("{}:", label));
                self.stmt(body);
            }
            StmtKind::Switch { selector, cases } => {
                self.line(&format!("switch ({}) {{", print_expr(selector)));
                for case in cases {
                    match &case.label {
                        Some(l) => self.line(&format!("case {}:", print_expr(l))),
                        None => self.line("default:"),
                    }
                    self.depth += 1;
                    for s in &case.stmts {
                        self.stmt(s);
                    }
                    self.depth -= 1;
                }
                self.line("}");
            }
            StmtKind::Break { label, .. } => match label {
                Some(l) => self.line(&format!("break {};", l)),
                None => self.line("break;"),
            },
            StmtKind::Continue { label, .. } => match label {
                Some(l) => self.line(&format!("continue {};", l)),
                None => self.line("continue;"),
            },
            StmtKind::Return(e) => match e {
                Some(e) => self.line(&format!("return {};", print_expr(e))),
                None => self.line("return;"),
            },
            StmtKind::Throw(e) => self.line(&format!("throw {};", print_expr(e))),
            StmtKind::Try { resources, body, catches, finalizer } => {
                if resources.is_empty() {
                    self.line("try {");
                } else {
                    let rs: Vec<String> = resources.iter().map(var_decl).collect();
                    self.line(&format!("try ({}) {{", rs.join("; ")));
                }
                self.block_body(body);
                for c in catches {
                    self.line(&format!("}} catch ({}) {{", var_decl(&c.param)));
                    self.block_body(&c.body);
                }
                if let Some(f) = finalizer {
                    self.line("} finally {");
                    self.block_body(f);
                }
                self.line("}");
            }
            StmtKind::Synchronized { lock, body } => {
                self.line(&format!("synchronized ({}) {{", print_expr(lock)));
                self.block_body(body);
                self.line("}");
            }
            StmtKind::Assert { cond, detail } => match detail {
                Some(d) => self.line(&format!("assert {} : {};", print_expr(cond), print_expr(d))),
                None => self.line(&format!("assert {};", print_expr(cond))),
            },
            StmtKind::Skip => self.line(";"),
        }
    }
}

fn modifiers(flags: Flags) -> String {
    let text = flags.to_string();
    if text.is_empty() {
        text
    } else {
        format!("{} ", text)
    }
}

fn type_params(tps: &[TypeParam]) -> String {
    if tps.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = tps
        .iter()
        .map(|tp| {
            if tp.bounds.is_empty() {
                tp.name.clone()
            } else {
                let bounds: Vec<String> = tp.bounds.iter().map(print_expr).collect();
                format!("{} extends {}", tp.name, bounds.join(" & "))
            }
        })
        .collect();
    format!("<{}>", parts.join(", "))
}

fn var_decl(v: &VarDecl) -> String {
    let mut s = modifiers(v.mods);
    if let Some(t) = &v.vtype {
        s.push_str(&print_expr(t));
        s.push(' ');
    }
    s.push_str(&v.name);
    if let Some(init) = &v.init {
        s.push_str(" = ");
        s.push_str(&print_expr(init));
    }
    s
}

fn join(exprs: &[Expr]) -> String {
    let parts: Vec<String> = exprs.iter().map(print_expr).collect();
    parts.join(", ")
}

/// Precedence levels above binary operators.
const PREC_ASSIGN: u8 = 0;
const PREC_COND: u8 = 1;
const PREC_UNARY: u8 = 12;
const PREC_POSTFIX: u8 = 13;

fn expr_prec(e: &Expr) -> u8 {
    match &e.kind {
        ExprKind::Assign { .. } | ExprKind::AssignOp { .. } => PREC_ASSIGN,
        ExprKind::Conditional { .. } => PREC_COND,
        ExprKind::Binary { op, .. } => op.precedence() + 1,
        ExprKind::InstanceOf { .. } => BinOp::Lt.precedence() + 1,
        ExprKind::Unary { op, .. } if op.is_postfix() => PREC_POSTFIX,
        ExprKind::Unary { .. } | ExprKind::Cast { .. } => PREC_UNARY,
        _ => PREC_POSTFIX + 1,
    }
}

fn expr_to(out: &mut String, e: &Expr, min_prec: u8) {
    let prec = expr_prec(e);
    let wrap = prec < min_prec;
    if wrap {
        out.push('(');
    }
    match &e.kind {
        ExprKind::Literal(c) => {
            let _ = write!(out, "{}", c);
        }
        ExprKind::Null => out.push_str("null"),
        ExprKind::Ident(n) => out.push_str(n),
        ExprKind::Select { target, name } => {
            expr_to(out, target, PREC_POSTFIX);
            out.push('.');
            out.push_str(name);
        }
        ExprKind::Call { meth, args, .. } => {
            expr_to(out, meth, PREC_POSTFIX);
            out.push('(');
            out.push_str(&join(args));
            out.push(')');
        }
        ExprKind::New { encl, class, args, body, .. } => {
            if let Some(encl) = encl {
                expr_to(out, encl, PREC_POSTFIX);
                out.push('.');
            }
            out.push_str("new ");
            expr_to(out, class, PREC_POSTFIX);
            out.push('(');
            out.push_str(&join(args));
            out.push(')');
            if let Some(body) = body {
                out.push_str(" { ");
                let members = body.members.len();
                let _ = write!(out, "/* {} members */", members);
                out.push_str(" }");
            }
        }
        ExprKind::NewArray { elem, dims, elems } => {
            out.push_str("new ");
            if let Some(elem) = elem {
                expr_to(out, elem, PREC_POSTFIX);
            }
            for d in dims {
                out.push('[');
                expr_to(out, d, PREC_ASSIGN);
                out.push(']');
            }
            if let Some(es) = elems {
                out.push_str("[]{");
                out.push_str(&join(es));
                out.push('}');
            }
        }
        ExprKind::Parens(inner) => {
            out.push('(');
            expr_to(out, inner, PREC_ASSIGN);
            out.push(')');
        }
        ExprKind::Assign { lhs, rhs } => {
            expr_to(out, lhs, PREC_COND);
            out.push_str(" = ");
            expr_to(out, rhs, PREC_ASSIGN);
        }
        ExprKind::AssignOp { op, lhs, rhs } => {
            expr_to(out, lhs, PREC_COND);
            let _ = write!(out, " {}= ", op.symbol());
            expr_to(out, rhs, PREC_ASSIGN);
        }
        ExprKind::Unary { op, arg } => {
            if op.is_postfix() {
                expr_to(out, arg, PREC_POSTFIX);
                out.push_str(op.symbol());
            } else {
                out.push_str(op.symbol());
                expr_to(out, arg, PREC_UNARY);
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            expr_to(out, lhs, prec);
            let _ = write!(out, " {} ", op.symbol());
            expr_to(out, rhs, prec + 1);
        }
        ExprKind::Cast { clazz, expr } => {
            out.push('(');
            expr_to(out, clazz, PREC_ASSIGN);
            out.push(')');
            expr_to(out, expr, PREC_UNARY);
        }
        ExprKind::InstanceOf { expr, clazz } => {
            expr_to(out, expr, prec);
            out.push_str(" instanceof ");
            expr_to(out, clazz, prec + 1);
        }
        ExprKind::Conditional { cond, then, els } => {
            expr_to(out, cond, PREC_COND + 1);
            out.push_str(" ? ");
            expr_to(out, then, PREC_COND + 1);
            out.push_str(" : ");
            expr_to(out, els, PREC_COND);
        }
        ExprKind::Index { indexed, index } => {
            expr_to(out, indexed, PREC_POSTFIX);
            out.push('[');
            expr_to(out, index, PREC_ASSIGN);
            out.push(']');
        }
        ExprKind::Let { stmts, expr } => {
            out.push_str("(let ");
            for s in stmts {
                let text = print_stmt(s);
                out.push_str(&text.split_whitespace().collect::<Vec<_>>().join(" "));
                out.push(' ');
            }
            out.push_str("in ");
            expr_to(out, expr, PREC_ASSIGN);
            out.push(')');
        }
        ExprKind::PrimType(p) => out.push_str(p.name()),
        ExprKind::VoidType => out.push_str("void"),
        ExprKind::ArrayType(elem) => {
            expr_to(out, elem, PREC_POSTFIX);
            out.push_str("[]");
        }
        ExprKind::TypeApply { base, args } => {
            expr_to(out, base, PREC_POSTFIX);
            out.push('<');
            out.push_str(&join(args));
            out.push('>');
        }
        ExprKind::WildcardType { kind, bound } => {
            out.push('?');
            match (kind, bound) {
                (BoundKind::Extends, Some(b)) => {
                    out.push_str(" extends ");
                    expr_to(out, b, PREC_POSTFIX);
                }
                (BoundKind::Super, Some(b)) => {
                    out.push_str(" super ");
                    expr_to(out, b, PREC_POSTFIX);
                }
                _ => {}
            }
        }
        ExprKind::UnionType(alts) => {
            let parts: Vec<String> = alts.iter().map(print_expr).collect();
            out.push_str(&parts.join(" | "));
        }
        ExprKind::Erroneous => out.push_str("<error>"),
    }
    if wrap {
        out.push(')');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_common::Span;
    use cinder_symtab::Constant;

    fn ident(n: &str) -> Expr {
        Expr::new(Span::DUMMY, ExprKind::Ident(n.into()))
    }

    fn bin(op: BinOp, l: Expr, r: Expr) -> Expr {
        Expr::new(Span::DUMMY, ExprKind::Binary { op, lhs: Box::new(l), rhs: Box::new(r) })
    }

    #[test]
    fn binary_precedence_adds_parentheses_only_when_needed() {
        let e = bin(BinOp::Mul, bin(BinOp::Add, ident("a"), ident("b")), ident("c"));
        assert_eq!(print_expr(&e), "(a + b) * c");
        let e = bin(BinOp::Add, ident("a"), bin(BinOp::Mul, ident("b"), ident("c")));
        assert_eq!(print_expr(&e), "a + b * c");
        let e = bin(BinOp::Sub, ident("a"), bin(BinOp::Sub, ident("b"), ident("c")));
        assert_eq!(print_expr(&e), "a - (b - c)");
    }

    #[test]
    fn prints_statements_with_nesting() {
        let cond = bin(BinOp::Lt, ident("i"), Expr::new(Span::DUMMY, ExprKind::Literal(Constant::Int(3))));
        let body = Stmt::new(Span::DUMMY, StmtKind::Block(Block::new(
            Span::DUMMY,
            vec![Stmt::new(Span::DUMMY, StmtKind::Break { label: None, target: None })],
        )));
        let w = Stmt::new(Span::DUMMY, StmtKind::While { cond, body: Box::new(body) });
        assert_eq!(print_stmt(&w), "while (i < 3) {\n    break;\n}\n");
    }
}
