//! Access methods and access constructors.
//!
//! A private member used from another class of the same top-level class,
//! or a protected member used from an enclosing class's nested class in
//! another package, is reached through a static synthetic method in the
//! class that may legally touch it.

use tracing::debug;

use cinder_ast::{BinOp, Expr, Member, TreeMaker, UnOp};
use cinder_common::Span;
use cinder_symtab::{names, Flags, MethodType, SymData, SymKind, SymbolId, Type};

use super::{Ctx, Lowerer};
use crate::fresh::Purpose;

/// How an access method touches its member.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AccessCode {
    /// Read a field or invoke a method.
    Deref,
    Assign,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
    AssignOp(BinOp),
}

const ASSIGN_OPS: [BinOp; 11] = [
    BinOp::Add,
    BinOp::Sub,
    BinOp::Mul,
    BinOp::Div,
    BinOp::Mod,
    BinOp::BitAnd,
    BinOp::BitOr,
    BinOp::BitXor,
    BinOp::Shl,
    BinOp::Shr,
    BinOp::Ushr,
];

impl AccessCode {
    /// The code an access method's name ends with. Codes are even; access
    /// through a qualified `super` adds one.
    pub fn number(self) -> u32 {
        match self {
            AccessCode::Deref => 0,
            AccessCode::Assign => 2,
            AccessCode::PreInc => 4,
            AccessCode::PreDec => 6,
            AccessCode::PostInc => 8,
            AccessCode::PostDec => 10,
            AccessCode::AssignOp(op) => {
                let index = ASSIGN_OPS.iter().position(|o| *o == op).unwrap_or(0) as u32;
                12 + 2 * index
            }
        }
    }

    pub fn for_unary(op: UnOp) -> AccessCode {
        match op {
            UnOp::PreInc => AccessCode::PreInc,
            UnOp::PreDec => AccessCode::PreDec,
            UnOp::PostInc => AccessCode::PostInc,
            UnOp::PostDec => AccessCode::PostDec,
            _ => AccessCode::Deref,
        }
    }

    fn unary_op(self) -> Option<UnOp> {
        match self {
            AccessCode::PreInc => Some(UnOp::PreInc),
            AccessCode::PreDec => Some(UnOp::PreDec),
            AccessCode::PostInc => Some(UnOp::PostInc),
            AccessCode::PostDec => Some(UnOp::PostDec),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct AccessKey {
    sym: SymbolId,
    code: AccessCode,
    via_super: bool,
}

impl Lowerer<'_> {
    /// The class that must host an access method for `sym` used from `cx`,
    /// or `None` when the use is legal as written.
    pub(crate) fn access_host(&self, sym: SymbolId, cx: &Ctx) -> Option<SymbolId> {
        if !matches!(self.syms.kind(sym), SymKind::Var | SymKind::Method) || self.syms.is_constructor(sym) {
            return None;
        }
        let owner = self.syms.owner_class(sym)?;
        if owner == cx.class {
            return None;
        }
        let flags = self.syms.flags(sym);
        if flags.contains(Flags::PRIVATE) {
            return (self.syms.outermost_class(owner) == Some(cx.outermost)).then_some(owner);
        }
        if flags.contains(Flags::PROTECTED)
            && !self.syms.same_package(owner, cx.class)
            && !self.syms.is_subclass(cx.class, owner)
        {
            let mut cur = self.syms.owner(cx.class);
            while let Some(s) = cur {
                if self.syms.is_class(s) && self.syms.is_subclass(s, owner) {
                    return Some(s);
                }
                cur = self.syms.owner(s);
            }
        }
        None
    }

    /// `Host.access$NNN(receiver, args)`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn access_call(
        &mut self,
        sym: SymbolId,
        code: AccessCode,
        host: SymbolId,
        receiver: Option<Expr>,
        args: Vec<Expr>,
        operator: Option<SymbolId>,
        span: Span,
    ) -> Expr {
        let accessor = self.accessor(sym, code, false, host, operator);
        let mut full: Vec<Expr> = receiver.into_iter().collect();
        full.extend(args);
        TreeMaker::at(span).call_static(self.syms, accessor, full)
    }

    /// `outer.access$NN1(args)`, running `C.super.m(args)` inside `C`.
    pub(crate) fn super_access_call(
        &mut self,
        method: SymbolId,
        host: SymbolId,
        outer: Expr,
        args: Vec<Expr>,
        span: Span,
    ) -> Expr {
        let accessor = self.accessor(method, AccessCode::Deref, true, host, None);
        TreeMaker::at(span).call_method(self.syms, outer, accessor, args)
    }

    fn accessor(
        &mut self,
        sym: SymbolId,
        code: AccessCode,
        via_super: bool,
        host: SymbolId,
        operator: Option<SymbolId>,
    ) -> SymbolId {
        let key = AccessKey { sym, code, via_super };
        if let Some(existing) = self.accessors.get(&key) {
            return *existing;
        }
        let number = match self.access_numbers.get(&sym) {
            Some(n) => *n,
            None => {
                let n = self.fresh.next(self.top, Purpose::Access);
                self.access_numbers.insert(sym, n);
                n
            }
        };
        let name = format!("access${}{:02}", number, code.number() + u32::from(via_super));

        let is_method = self.syms.kind(sym) == SymKind::Method;
        let takes_receiver = !self.syms.is_static(sym) && !via_super;
        let member_ty = self.syms.erasure(self.syms.ty(sym));
        let mut param_tys = Vec::new();
        if takes_receiver {
            param_tys.push(self.syms.erasure(self.syms.ty(host)));
        }
        let (ret, thrown) = if is_method {
            param_tys.extend(member_ty.params().iter().cloned());
            (member_ty.ret(), member_ty.thrown().to_vec())
        } else {
            match code {
                AccessCode::Assign => param_tys.push(member_ty.clone()),
                AccessCode::AssignOp(_) => {
                    let rhs = operator
                        .and_then(|o| self.syms.ty(o).params().get(1).cloned())
                        .unwrap_or_else(|| member_ty.clone());
                    param_tys.push(rhs);
                }
                _ => {}
            }
            (member_ty.clone(), Vec::new())
        };

        let flags = if via_super { Flags::SYNTHETIC | Flags::LOWERED } else { Flags::STATIC | Flags::SYNTHETIC | Flags::LOWERED };
        let method_ty = Type::Method(MethodType::new(param_tys.clone(), ret.clone(), thrown));
        let accessor = self.syms.new_method(host, &name, flags, method_ty, Vec::new());
        let params: Vec<SymbolId> = param_tys
            .into_iter()
            .enumerate()
            .map(|(i, ty)| {
                self.syms.new_var(accessor, &format!("x{}", i), Flags::PARAMETER | Flags::SYNTHETIC | Flags::LOWERED, ty)
            })
            .collect();
        if let SymData::Method(info) = &mut self.syms.sym_mut(accessor).data {
            info.params = params.clone();
        }
        self.syms.enter_member(host, accessor);
        self.accessors.insert(key, accessor);

        let make = TreeMaker::at(self.top_span);
        let (target, values) = if via_super {
            let sup = self.syms.class_info(host).supertype.clone().unwrap_or_else(|| self.syms.object_type());
            (make.ident_named(names::SUPER, host, sup), &params[..])
        } else if takes_receiver {
            (make.ident(self.syms, params[0]), &params[1..])
        } else {
            let owner = self.syms.owner_class(sym).unwrap_or(host);
            (make.type_ident(self.syms, owner), &params[..])
        };
        let mut values = values.iter().map(|p| make.ident(self.syms, *p)).collect::<Vec<_>>().into_iter();
        let member = make.select(self.syms, target, sym);
        let result = if is_method {
            make.call(member, values.collect())
        } else {
            match code {
                AccessCode::Deref => member,
                AccessCode::Assign => match values.next() {
                    Some(v) => make.assign(member, v),
                    None => member,
                },
                AccessCode::AssignOp(op) => match (values.next(), operator) {
                    (Some(v), Some(o)) => make.assign_op(op, o, member, v),
                    (Some(v), None) => make.assign(member, v),
                    (None, _) => member,
                },
                _ => make.unary(self.syms, code.unary_op().unwrap_or(UnOp::PreInc), operator, member),
            }
        };
        let body = if ret.is_void() { make.exec(result) } else { make.return_(Some(result)) };
        let decl = make.method_decl(self.syms, accessor, Some(make.block(vec![body])));
        self.extra_members.entry(host).or_default().push(Member::Method(decl));
        debug!(
            host = %self.syms.flatname(host),
            member = %self.syms.name(sym),
            accessor = %name,
            "access method"
        );
        accessor
    }

    /// The constructor to invoke in place of `ctor` from `cx`, and the tag
    /// argument to append when it is an access constructor.
    pub(crate) fn constructor_access(&mut self, ctor: SymbolId, cx: &Ctx, span: Span) -> (SymbolId, Option<Expr>) {
        let Some(owner) = self.syms.owner_class(ctor) else { return (ctor, None) };
        if !self.syms.flags(ctor).contains(Flags::PRIVATE)
            || owner == cx.class
            || self.syms.outermost_class(owner) != Some(cx.outermost)
        {
            return (ctor, None);
        }
        let access = self.access_constructor(ctor, owner);
        let tag = self.holder();
        let make = TreeMaker::at(span);
        let null = make.cast(self.syms, Type::class(tag), make.null());
        (access, Some(null))
    }

    /// A package-private constructor taking the parameters of `ctor` plus
    /// a tag of the holder class, delegating to `ctor`.
    fn access_constructor(&mut self, ctor: SymbolId, class: SymbolId) -> SymbolId {
        if let Some(existing) = self.access_ctors.get(&ctor) {
            return *existing;
        }
        let tag = self.holder();
        let ctor_ty = self.syms.ty(ctor).clone();
        let mut param_tys = ctor_ty.params().to_vec();
        let arity = param_tys.len();
        param_tys.push(Type::class(tag));
        let mut flags = self.syms.flags(ctor);
        flags.remove(Flags::ACCESS | Flags::GENERATED_CTOR | Flags::ANON_CTOR);
        flags.insert(Flags::SYNTHETIC | Flags::LOWERED);
        let method_ty = Type::Method(MethodType::new(param_tys.clone(), Type::Void, ctor_ty.thrown().to_vec()));
        let access = self.syms.new_method(class, names::INIT, flags, method_ty, Vec::new());
        let params: Vec<SymbolId> = param_tys
            .into_iter()
            .enumerate()
            .map(|(i, ty)| {
                self.syms.new_var(access, &format!("x{}", i), Flags::PARAMETER | Flags::SYNTHETIC | Flags::LOWERED, ty)
            })
            .collect();
        if let SymData::Method(info) = &mut self.syms.sym_mut(access).data {
            info.params = params.clone();
        }
        self.syms.enter_member(class, access);
        self.access_ctors.insert(ctor, access);

        let make = TreeMaker::at(self.top_span);
        let args = params[..arity].iter().map(|p| make.ident(self.syms, *p)).collect();
        let callee = make.ident_named(names::THIS, ctor, ctor_ty);
        let body = make.block(vec![make.exec(make.call(callee, args))]);
        let decl = make.method_decl(self.syms, access, Some(body));
        self.extra_members.entry(class).or_default().push(Member::Method(decl));
        debug!(class = %self.syms.flatname(class), "access constructor");
        access
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_operator_table() {
        assert_eq!(AccessCode::Deref.number(), 0);
        assert_eq!(AccessCode::Assign.number(), 2);
        assert_eq!(AccessCode::PostDec.number(), 10);
        assert_eq!(AccessCode::AssignOp(BinOp::Add).number(), 12);
        assert_eq!(AccessCode::AssignOp(BinOp::Ushr).number(), 32);
    }

    #[test]
    fn unary_codes() {
        assert_eq!(AccessCode::for_unary(UnOp::PostInc), AccessCode::PostInc);
        assert_eq!(AccessCode::for_unary(UnOp::Neg), AccessCode::Deref);
    }
}
