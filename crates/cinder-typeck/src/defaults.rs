//! Fail-over pass run after attribution was cut short: every slot the
//! attributor left unset gets the error placeholder, so later phases never
//! meet a half-attributed tree.

use tracing::debug;

use cinder_ast::visit::{walk_class_mut, walk_expr_mut, walk_method_mut, walk_var_mut, VisitMut};
use cinder_ast::{ClassDecl, Expr, ExprKind, MethodDecl, VarDecl};
use cinder_symtab::{SymbolId, Type};

struct DefaultUnset {
    error_sym: SymbolId,
    filled: usize,
}

impl DefaultUnset {
    fn fill_sym(&mut self, slot: &mut Option<SymbolId>) {
        if slot.is_none() {
            *slot = Some(self.error_sym);
            self.filled += 1;
        }
    }
}

impl VisitMut for DefaultUnset {
    fn visit_class_mut(&mut self, class: &mut ClassDecl) {
        self.fill_sym(&mut class.sym);
        walk_class_mut(self, class);
    }

    fn visit_method_mut(&mut self, method: &mut MethodDecl) {
        self.fill_sym(&mut method.sym);
        walk_method_mut(self, method);
    }

    fn visit_var_mut(&mut self, var: &mut VarDecl) {
        self.fill_sym(&mut var.sym);
        walk_var_mut(self, var);
    }

    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        if expr.ty.is_none() {
            expr.ty = Some(Type::Error);
            self.filled += 1;
        }
        if matches!(expr.kind, ExprKind::Ident(_) | ExprKind::Select { .. } | ExprKind::New { .. }) {
            self.fill_sym(&mut expr.sym);
        }
        walk_expr_mut(self, expr);
    }
}

/// Fill unset types and symbols below `class` with the error placeholders.
/// Returns the number of slots filled.
pub fn default_unset(class: &mut ClassDecl, error_sym: SymbolId) -> usize {
    let mut pass = DefaultUnset { error_sym, filled: 0 };
    pass.visit_class_mut(class);
    if pass.filled > 0 {
        debug!(class = %class.name, filled = pass.filled, "defaulted unattributed slots");
    }
    pass.filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_ast::{Member, SourceBuilder, StmtKind};
    use cinder_symtab::{Flags, Symtab};

    #[test]
    fn fills_only_missing_slots() {
        let syms = Symtab::new();
        let err = syms.predef.error_sym;
        let b = SourceBuilder::new();
        let typed = b.int(3).with_type(Type::int());
        let untyped = b.ident("x");
        let mut class = b.class(Flags::EMPTY, "C", vec![b.init_block(false, vec![b.exec(typed), b.exec(untyped)])]);

        // class symbol, the identifier's type and its symbol
        assert_eq!(default_unset(&mut class, err), 3);
        assert_eq!(class.sym, Some(err));
        let Member::Init(init) = &class.members[0] else { panic!("initializer expected") };
        let StmtKind::Expr(first) = &init.body.stmts[0].kind else { panic!("expression statement expected") };
        assert_eq!(first.ty, Some(Type::int()));
        assert!(first.sym.is_none());
        assert_eq!(default_unset(&mut class, err), 0);
    }
}
