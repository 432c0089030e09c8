//! Boxing and unboxing conversions.

use cinder_ast::{BinOp, Expr, TreeMaker, UnOp};
use cinder_common::Span;
use cinder_symtab::{names, Constant, Flags, Prim, Type};

use super::{Ctx, Lowerer};

impl Lowerer<'_> {
    /// `e` converted to `target` where one is primitive and the other a
    /// reference. Anything else is returned unchanged.
    pub(crate) fn coerce(&self, e: Expr, target: &Type) -> Expr {
        if !self.opts.boxing {
            return e;
        }
        let ty = e.ty();
        if ty.is_error() || target.is_error() {
            return e;
        }
        match (ty.prim(), target.prim()) {
            (Some(p), None) if target.is_reference() => self.box_value(e, p, target),
            (None, Some(p)) if ty.is_reference() && !matches!(ty, Type::Null) => self.unbox(e, p),
            _ => e,
        }
    }

    /// `Box.valueOf(e)`, boxing into the box `target` names when it is one.
    fn box_value(&self, e: Expr, prim: Prim, target: &Type) -> Expr {
        let make = TreeMaker::at(e.span);
        let boxed = self.syms.unboxed_type(target).unwrap_or(prim);
        let e = if boxed != prim { make.cast(self.syms, Type::Prim(boxed), e) } else { e };
        let class = self.syms.predef.boxed_class(boxed);
        let value_of = self
            .syms
            .methods_named(class, names::VALUE_OF)
            .find(|m| self.syms.is_static(*m) && self.syms.ty(*m).params() == [Type::Prim(boxed)]);
        match value_of {
            Some(m) => make.call_static(self.syms, m, vec![e]),
            None => e,
        }
    }

    /// `e.xxxValue()`, widened to `target` when the box holds a narrower
    /// primitive.
    fn unbox(&self, e: Expr, target: Prim) -> Expr {
        let make = TreeMaker::at(e.span);
        let (e, source) = match self.syms.unboxed_type(&e.ty()) {
            Some(p) => (e, p),
            None => (make.cast(self.syms, self.syms.boxed_type(target), e), target),
        };
        let class = self.syms.predef.boxed_class(source);
        let name = names::unbox_method(source);
        let Some(accessor) = self.syms.methods_named(class, &name).next() else { return e };
        let value = make.call_method(self.syms, e, accessor, Vec::new());
        if source == target {
            value
        } else {
            make.cast(self.syms, Type::Prim(target), value)
        }
    }

    /// `++b` and friends on a boxed variable. Prefix forms assign and yield
    /// the new box; postfix forms keep the old box in a temporary.
    pub(crate) fn boxed_increment(&mut self, op: UnOp, prim: Prim, arg: Expr, span: Span, cx: &Ctx) -> Expr {
        let make = TreeMaker::at(span);
        let boxed = arg.ty();
        let (current, saved) = if op.is_postfix() {
            let name = self.fresh.name(cx.owner, "tmp$");
            let tmp = self.syms.new_var(cx.owner, &name, Flags::FINAL | Flags::SYNTHETIC | Flags::LOWERED, boxed.clone());
            (make.ident(self.syms, tmp), Some((tmp, arg.clone())))
        } else {
            (arg.clone(), None)
        };

        let promoted = match prim {
            Prim::Byte | Prim::Short | Prim::Char => Prim::Int,
            p => p,
        };
        let one = match promoted {
            Prim::Long => Constant::Long(1),
            Prim::Float => Constant::Float(1.0),
            Prim::Double => Constant::Double(1.0),
            _ => Constant::Int(1),
        };
        let bin = if matches!(op, UnOp::PreInc | UnOp::PostInc) { BinOp::Add } else { BinOp::Sub };
        let promoted_ty = Type::Prim(promoted);
        let operator = self.operator(bin.symbol(), &[promoted_ty.clone(), promoted_ty.clone()]);
        let current = self.unbox(current, promoted);
        let sum = make.binary(self.syms, bin, operator, current, make.literal(one, promoted_ty));
        let sum = if promoted != prim { make.cast(self.syms, Type::Prim(prim), sum) } else { sum };
        let update = make.assign(arg, self.box_value(sum, prim, &boxed));

        match saved {
            Some((tmp, old)) => {
                let init = make.local_var(self.syms, tmp, Some(old));
                let result = make.ident(self.syms, tmp);
                make.let_expr(vec![init, make.exec(update)], result).with_type(boxed)
            }
            None => update,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_common::CompileOptions;
    use cinder_symtab::Symtab;

    #[test]
    fn boxes_and_unboxes_across_assignment_boundaries() {
        let mut syms = Symtab::new();
        let opts = CompileOptions::default();
        let integer = syms.boxed_type(Prim::Int);
        let lowerer = Lowerer::new(&mut syms, &opts);
        let make = TreeMaker::at(Span::DUMMY);

        let boxed = lowerer.coerce(make.int(3), &integer);
        assert_eq!(boxed.ty(), integer);
        assert_eq!(boxed.sym.map(|m| lowerer.syms.name(m).to_string()).as_deref(), Some("valueOf"));

        let unboxed = lowerer.coerce(boxed, &Type::int());
        assert_eq!(unboxed.ty(), Type::int());
        assert_eq!(unboxed.sym.map(|m| lowerer.syms.name(m).to_string()).as_deref(), Some("intValue"));

        let plain = lowerer.coerce(make.int(3), &Type::Prim(Prim::Long));
        assert_eq!(plain.ty(), Type::int());
    }

    #[test]
    fn disabled_boxing_leaves_trees_alone() {
        let mut syms = Symtab::new();
        let opts = CompileOptions { boxing: false, ..CompileOptions::default() };
        let integer = syms.boxed_type(Prim::Int);
        let lowerer = Lowerer::new(&mut syms, &opts);
        let e = lowerer.coerce(TreeMaker::at(Span::DUMMY).int(3), &integer);
        assert_eq!(e.ty(), Type::int());
    }
}
