//! Switch statements on enums, strings and boxed integers.

use tracing::trace;

use cinder_ast::{Case, Expr, ExprKind, NodeId, Stmt, StmtKind, TreeMaker};
use cinder_common::Span;
use cinder_symtab::{names, Constant, Flags, Type};

use super::{Ctx, Lowerer};

impl Lowerer<'_> {
    pub(crate) fn switch(&mut self, id: NodeId, span: Span, selector: Expr, cases: Vec<Case>, cx: &Ctx) -> Stmt {
        let ty = selector.ty();
        let class = ty.class_sym();
        if let Some(e) = class.filter(|c| self.syms.flags(*c).contains(Flags::ENUM)) {
            return self.enum_switch(id, span, e, selector, cases, cx);
        }
        if self.opts.string_switch && class == Some(self.syms.predef.string) {
            return self.string_switch(id, span, selector, cases, cx);
        }
        let selector = self.expr(selector, cx);
        let selector = match self.syms.unboxed_type(&ty) {
            Some(p) => self.coerce(selector, &Type::Prim(p)),
            None => selector,
        };
        let cases = self.cases(cases, cx);
        Stmt { id, span, kind: StmtKind::Switch { selector, cases } }
    }

    /// A switch on a string becomes a switch on its hash code that finds
    /// the position of the matching label, followed by a switch on that
    /// position carrying the original statements:
    ///
    /// ```text
    /// { String s$ = sel; int tmp$ = -1;
    ///   switch (s$.hashCode()) { case h: if (s$.equals("a")) tmp$ = 0; break; }
    ///   switch (tmp$) { case 0: ... } }
    /// ```
    fn string_switch(&mut self, id: NodeId, span: Span, selector: Expr, cases: Vec<Case>, cx: &Ctx) -> Stmt {
        let make = TreeMaker::at(span);
        let string = self.syms.string_type();
        let flags = Flags::FINAL | Flags::SYNTHETIC | Flags::LOWERED;
        let s_name = self.fresh.name(cx.owner, "s$");
        let s = self.syms.new_var(cx.owner, &s_name, flags, string);
        let tmp_name = self.fresh.name(cx.owner, "tmp$");
        let tmp = self.syms.new_var(cx.owner, &tmp_name, Flags::SYNTHETIC | Flags::LOWERED, Type::int());

        let selector = self.expr(selector, cx);
        let mut stmts = vec![make.local_var(self.syms, s, Some(selector)), make.local_var(self.syms, tmp, Some(make.int(-1)))];

        // Labels grouped by hash code, in order of first appearance.
        let mut buckets: Vec<(i32, Vec<(String, i32)>)> = Vec::new();
        for (position, case) in cases.iter().enumerate() {
            let Some(label) = case.label.as_ref().and_then(string_label) else { continue };
            let hash = java_hash(&label);
            let entry = (label, position as i32);
            match buckets.iter_mut().find(|(h, _)| *h == hash) {
                Some((_, labels)) => labels.push(entry),
                None => buckets.push((hash, vec![entry])),
            }
        }

        let hash_code = self.syms.methods_named(self.syms.predef.string, names::HASH_CODE).next();
        let equals = self.syms.methods_named(self.syms.predef.string, names::EQUALS).next();
        if let (Some(hash_code), Some(equals)) = (hash_code, equals) {
            let hash_switch = NodeId::fresh();
            let mut hash_cases = Vec::with_capacity(buckets.len());
            for (hash, labels) in &buckets {
                let mut chain: Option<Stmt> = None;
                for (label, position) in labels.iter().rev() {
                    let test = make.call_method(self.syms, make.ident(self.syms, s), equals, vec![make.string(self.syms, label)]);
                    let found = make.exec(make.assign(make.ident(self.syms, tmp), make.int(*position)));
                    chain = Some(make.if_(test, found, chain));
                }
                let mut body: Vec<Stmt> = chain.into_iter().collect();
                body.push(make.break_(hash_switch));
                hash_cases.push(make.case(Some(make.int(*hash)), body));
            }
            let hashed = make.call_method(self.syms, make.ident(self.syms, s), hash_code, Vec::new());
            stmts.push(Stmt { id: hash_switch, span, kind: StmtKind::Switch { selector: hashed, cases: hash_cases } });
        }

        let mut positional = Vec::with_capacity(cases.len());
        for (position, case) in cases.into_iter().enumerate() {
            let label = case.label.map(|_| make.int(position as i32));
            let body = case.stmts.into_iter().map(|st| self.stmt(st, cx)).collect();
            positional.push(Case { span: case.span, label, stmts: body });
        }
        // Breaks in the original cases still name `id`.
        stmts.push(Stmt { id, span, kind: StmtKind::Switch { selector: make.ident(self.syms, tmp), cases: positional } });
        trace!(buckets = buckets.len(), "string switch");
        make.block_stmt(stmts)
    }
}

fn string_label(e: &Expr) -> Option<String> {
    match (&e.constant, &e.kind) {
        (Some(Constant::Str(s)), _) | (None, ExprKind::Literal(Constant::Str(s))) => Some(s.clone()),
        _ => None,
    }
}

/// The hash code a string has at run time: the polynomial over its UTF-16
/// code units with multiplier 31, wrapping on overflow.
pub(crate) fn java_hash(s: &str) -> i32 {
    s.encode_utf16().fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

#[cfg(test)]
mod tests {
    use super::java_hash;

    #[test]
    fn hash_codes_match_the_runtime() {
        assert_eq!(java_hash(""), 0);
        assert_eq!(java_hash("a"), 97);
        assert_eq!(java_hash("hello"), 99162322);
        assert_eq!(java_hash("Aa"), java_hash("BB"));
        assert_eq!(java_hash("polygenelubricants"), i32::MIN);
    }
}
