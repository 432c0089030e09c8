//! Attribution of value expressions.

use cinder_ast::{BinOp, ClassDecl, Expr, ExprKind, UnOp};
use cinder_common::{LintCategory, Span};
use cinder_symtab::{names, ClassType, Constant, Flags, ForAll, MethodType, Prim, SymKind, SymbolId, Type};

use super::{Attr, AttrResult, Found};
use crate::constfold;
use crate::env::{Env, Frame};
use crate::infer;
use crate::resolve::{AccessCtx, KindSel, Resolved};

/// The kinds a qualifier may have when the whole selection is expected to
/// be of kind `pkind`.
fn qualifier_kind(pkind: KindSel) -> KindSel {
    let mut k = KindSel::NIL;
    if pkind.contains(KindSel::PCK) {
        k = k | KindSel::PCK;
    }
    if pkind.contains(KindSel::TYP) {
        k = k | KindSel::TYP | KindSel::PCK;
    }
    if pkind.intersects(KindSel::VAL) || pkind.contains(KindSel::MTH) {
        k = k | KindSel::VAL | KindSel::TYP | KindSel::PCK;
    }
    k
}

impl Attr<'_> {
    pub(crate) fn visit_expr(&mut self, e: &mut Expr, env: &Env, pkind: KindSel, pt: &Type) -> AttrResult<Type> {
        let span = e.span;
        let found = match &mut e.kind {
            ExprKind::Literal(c) => Found::value(self.literal_type(c)).with_constant(Some(c.clone())),
            ExprKind::Null => Found::value(Type::Null),
            ExprKind::Ident(name) => {
                let name = name.clone();
                self.attrib_ident(&name, span, env, pkind)
            }
            ExprKind::Select { target, name } => {
                let name = name.clone();
                self.attrib_select(span, target, &name, env, pkind)?
            }
            ExprKind::Parens(inner) => {
                let ty = self.attrib_tree(inner, env, pkind, pt)?;
                Found { ty, kind: KindSel::NIL, sym: inner.sym, constant: inner.constant.clone() }
            }
            ExprKind::Call { meth, type_args, args, varargs_elem } => {
                self.attrib_call(span, meth, type_args, args, varargs_elem, env, pt)?
            }
            ExprKind::New { encl, class, type_args, args, body, varargs_elem } => {
                self.attrib_new(span, encl, class, type_args, args, body, varargs_elem, env, pt)?
            }
            ExprKind::NewArray { elem, dims, elems } => self.attrib_new_array(span, elem, dims, elems, env, pt)?,
            ExprKind::Assign { lhs, rhs } => self.attrib_assign(lhs, rhs, env)?,
            ExprKind::AssignOp { op, lhs, rhs } => self.attrib_assign_op(span, *op, lhs, rhs, env)?,
            ExprKind::Unary { op, arg } => self.attrib_unary(span, *op, arg, env)?,
            ExprKind::Binary { op, lhs, rhs } => self.attrib_binary(span, *op, lhs, rhs, env)?,
            ExprKind::Cast { clazz, expr } => self.attrib_cast(span, clazz, expr, env)?,
            ExprKind::InstanceOf { expr, clazz } => self.attrib_instanceof(span, expr, clazz, env)?,
            ExprKind::Conditional { cond, then, els } => self.attrib_conditional(span, cond, then, els, env, pt)?,
            ExprKind::Index { indexed, index } => {
                let t = self.attrib_expr(indexed, env, &Type::None)?;
                self.attrib_expr(index, env, &Type::int())?;
                match t.elem_type() {
                    Some(elem) => Found { ty: elem.clone(), kind: KindSel::VAR, sym: None, constant: None },
                    None if t.is_error() => Found::error(),
                    None => {
                        let args = vec![self.show(&t)];
                        self.error(indexed.span, "array.req.but.found", args);
                        Found::error()
                    }
                }
            }
            ExprKind::Let { stmts, expr } => {
                let lenv = env.dup(Frame::Block);
                for s in stmts.iter_mut() {
                    self.attrib_stmt(s, &lenv)?;
                }
                let ty = self.attrib_tree(expr, &lenv, pkind, pt)?;
                Found { ty, kind: KindSel::NIL, sym: None, constant: None }
            }
            ExprKind::PrimType(p) => Found::typ(Type::Prim(*p)),
            ExprKind::VoidType => Found::typ(Type::Void),
            ExprKind::ArrayType(elem) => {
                let t = self.attrib_type(elem, env)?;
                if t.is_error() { Found::error() } else { Found::typ(Type::array(t)) }
            }
            ExprKind::TypeApply { base, args } => Found::typ(self.attrib_type_apply(span, base, args, env)?),
            ExprKind::WildcardType { kind, bound } => Found::typ(self.attrib_wildcard(*kind, bound, env)?),
            ExprKind::UnionType(alts) => Found::typ(self.attrib_union(alts, env)?),
            ExprKind::Erroneous => Found::error(),
        };
        if let Some(sym) = found.sym {
            e.sym = Some(sym);
        }
        e.constant = found.constant;
        Ok(self.check(e, found.ty, found.kind, pkind, pt, env))
    }

    fn literal_type(&self, c: &Constant) -> Type {
        match c {
            Constant::Int(_) => Type::Prim(Prim::Int),
            Constant::Long(_) => Type::Prim(Prim::Long),
            Constant::Float(_) => Type::Prim(Prim::Float),
            Constant::Double(_) => Type::Prim(Prim::Double),
            Constant::Bool(_) => Type::boolean(),
            Constant::Char(_) => Type::Prim(Prim::Char),
            Constant::Str(_) => self.syms.string_type(),
        }
    }

    // ── Names ──────────────────────────────────────────────────────────

    fn attrib_ident(&mut self, name: &str, span: Span, env: &Env, pkind: KindSel) -> Found {
        if name == names::THIS || name == names::SUPER {
            return self.attrib_self_ref(None, name, span, env);
        }
        let lookup = self.resolver().find_ident(env, name, pkind);
        let sym = self.access(lookup, span, None, name, None);
        if self.is_field(sym) {
            self.check_field_reference(sym, span, env, false);
            if !self.syms.is_static(sym) {
                let site = self.resolver().fun_site(env, sym);
                return self.found_for_symbol(sym, Some(&site));
            }
        }
        self.found_for_symbol(sym, None)
    }

    /// The kind, type and constant value of a resolved symbol, seen as a
    /// member of `site` when one is given.
    pub(crate) fn found_for_symbol(&mut self, sym: SymbolId, site: Option<&Type>) -> Found {
        match self.syms.kind(sym) {
            SymKind::Var => {
                let ty = match site {
                    Some(s) if !self.syms.is_static(sym) && !s.is_error() => self.syms.member_type(s, sym),
                    _ => self.syms.ty(sym).clone(),
                };
                let constant = self.syms.sym(sym).const_value().cloned();
                Found::var(ty, sym).with_constant(constant)
            }
            SymKind::Class => Found::typ(self.raw_type(sym)).with_sym(sym),
            SymKind::TypeVar => Found::typ(Type::TypeVar(sym)).with_sym(sym),
            SymKind::Package => Found { ty: Type::Package(sym), kind: KindSel::PCK, sym: Some(sym), constant: None },
            SymKind::Method => Found { ty: self.syms.ty(sym).clone(), kind: KindSel::MTH, sym: Some(sym), constant: None },
            SymKind::Error => Found::error().with_sym(sym),
        }
    }

    /// Checks on a field named without a qualifier, or through `this`:
    /// use before the superclass constructor ran, and forward references
    /// from initializers.
    fn check_field_reference(&mut self, sym: SymbolId, span: Span, env: &Env, via_this: bool) {
        let Some(owner) = self.syms.owner_class(sym) else { return };
        let is_static = self.syms.is_static(sym);
        if !via_this && !is_static && env.is_self_call() {
            if env.enclosing_class().is_some_and(|c| self.syms.is_subclass(c, owner)) {
                self.error(span, "cant.ref.before.ctor.called", vec![self.syms.name(sym).to_string()]);
                return;
            }
        }
        if env.enclosing_class() != Some(owner) || self.assign_lhs == Some(span) {
            return;
        }
        let Some(pos) = self.initializer_position(env, is_static) else { return };
        let declared = self.syms.var_decl_pos(sym);
        if declared < pos {
            return;
        }
        let name = self.syms.name(sym).to_string();
        if via_this {
            if self.opts.warn_forward_ref {
                self.log.warning(span, "forward.ref", vec![name]);
            }
        } else if declared == pos {
            self.error(span, "illegal.self.ref", vec![]);
        } else {
            self.error(span, "illegal.forward.ref", vec![]);
        }
    }

    /// Source position of the field initializer or initializer block the
    /// environment is in, when its static-ness is `is_static`.
    fn initializer_position(&self, env: &Env, is_static: bool) -> Option<u32> {
        for frame in env.local_frames() {
            match frame.frame() {
                Frame::VarInit(f) => {
                    let field = *f;
                    return (self.is_field(field) && self.syms.is_static(field) == is_static)
                        .then(|| self.syms.var_decl_pos(field));
                }
                Frame::Init(b) => {
                    let block = *b;
                    return (self.syms.is_static(block) == is_static).then(|| self.init_pos.get(&block).copied()).flatten();
                }
                Frame::Method(_) | Frame::Class(_) => return None,
                _ => {}
            }
        }
        None
    }

    /// `this`, `super`, `C.this` or `C.super`.
    fn attrib_self_ref(&mut self, qual: Option<&Type>, name: &str, span: Span, env: &Env) -> Found {
        let lookup = match qual {
            None => self.resolver().find_var(env, name),
            Some(t) if t.is_error() => return Found::error(),
            Some(t) => match t.class_sym() {
                Some(c) => self.resolver().resolve_self(env, c, name),
                None => {
                    let args = vec!["class".to_string(), self.show(t)];
                    self.error(span, "type.found.req", args);
                    return Found::error();
                }
            },
        };
        let sym = self.access(lookup, span, None, name, None);
        if self.syms.kind(sym) != SymKind::Var {
            return Found::error().with_sym(sym);
        }
        if env.is_self_call() && self.syms.owner(sym) == env.enclosing_class() {
            self.error(span, "cant.ref.before.ctor.called", vec![name.to_string()]);
            return Found::error().with_sym(sym);
        }
        Found::value(self.syms.ty(sym).clone()).with_sym(sym)
    }

    fn attrib_select(&mut self, span: Span, target: &mut Expr, name: &str, env: &Env, pkind: KindSel) -> AttrResult<Found> {
        if name == names::CLASS {
            let t = self.attrib_tree(target, env, KindSel::TYP, &Type::None)?;
            return Ok(Found::value(self.class_literal_type(&t)));
        }
        if name == names::THIS || name == names::SUPER {
            let t = self.attrib_type(target, env)?;
            return Ok(self.attrib_self_ref(Some(&t), name, span, env));
        }
        let site = self.attrib_tree(target, env, qualifier_kind(pkind), &Type::None)?;
        let inner = target.skip_parens();
        let is_super = inner.name() == Some(names::SUPER);
        let via_this = matches!(&inner.kind, ExprKind::Ident(n) if n == names::THIS);
        let static_ref = inner.sym.is_some_and(|s| matches!(self.syms.kind(s), SymKind::Class | SymKind::TypeVar));
        let sym = self.select_sym(&site, name, span, env, pkind, is_super);
        match self.syms.kind(sym) {
            SymKind::Var => {
                if static_ref && !self.syms.is_static(sym) {
                    self.error(span, "non-static.cant.be.ref", vec!["variable".to_string(), name.to_string()]);
                    return Ok(Found::error().with_sym(sym));
                }
                if via_this && self.is_field(sym) {
                    self.check_field_reference(sym, span, env, true);
                }
                Ok(self.found_for_symbol(sym, Some(&site)))
            }
            SymKind::Class => {
                let inner_of_generic = matches!(&site, Type::Class(ct) if !ct.args.is_empty())
                    && !self.syms.flags(sym).intersects(Flags::STATIC | Flags::INTERFACE);
                if inner_of_generic {
                    let ty = Type::Class(ClassType { sym, args: Vec::new(), outer: Some(Box::new(site)) });
                    return Ok(Found::typ(ty).with_sym(sym));
                }
                Ok(self.found_for_symbol(sym, None))
            }
            _ => Ok(self.found_for_symbol(sym, Some(&site))),
        }
    }

    fn select_sym(&mut self, site: &Type, name: &str, span: Span, env: &Env, pkind: KindSel, is_super: bool) -> SymbolId {
        let ctx = AccessCtx::of(env, self.syms).with_super(is_super);
        let lookup = match site {
            Type::Error => return self.syms.predef.error_sym,
            Type::Package(p) => {
                let k = if pkind.contains(KindSel::PCK) { KindSel::TYP | KindSel::PCK } else { KindSel::TYP };
                self.resolver().find_ident_in_package(&ctx, *p, name, k)
            }
            Type::Class(_) | Type::Array(_) | Type::TypeVar(_) | Type::Intersection(_) | Type::Wildcard(_) => {
                let mut k = KindSel::NIL;
                if pkind.intersects(KindSel::VAL) || pkind.contains(KindSel::MTH) || pkind == KindSel::NIL {
                    k = k | KindSel::VAL;
                }
                if pkind.contains(KindSel::TYP) {
                    k = k | KindSel::TYP;
                }
                self.resolver().find_ident_in_type(&ctx, site, name, k)
            }
            _ => {
                let args = vec![self.show(site)];
                self.error(span, "cant.deref", args);
                return self.syms.predef.error_sym;
            }
        };
        self.access(lookup, span, Some(site), name, None)
    }

    fn class_literal_type(&self, t: &Type) -> Type {
        let class = self.syms.predef.class;
        match t {
            Type::Error => Type::Error,
            Type::Void => Type::class(class),
            Type::Prim(p) => Type::class_with(class, vec![self.syms.boxed_type(*p)]),
            other => Type::class_with(class, vec![self.syms.erasure(other)]),
        }
    }

    // ── Calls ──────────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn attrib_call(
        &mut self,
        span: Span,
        meth: &mut Expr,
        type_args: &mut [Expr],
        args: &mut [Expr],
        varargs_elem: &mut Option<Type>,
        env: &Env,
        pt: &Type,
    ) -> AttrResult<Found> {
        let mut typeargs = Vec::with_capacity(type_args.len());
        for t in type_args.iter_mut() {
            typeargs.push(self.attrib_type(t, env)?);
        }
        let self_call = match &meth.kind {
            ExprKind::Ident(n) if n == names::THIS || n == names::SUPER => Some(n.clone()),
            ExprKind::Select { name, .. } if name == names::SUPER => Some(name.clone()),
            _ => None,
        };
        if let Some(name) = self_call {
            return self.attrib_self_call(span, meth, &name, &typeargs, args, varargs_elem, env);
        }

        let argtypes = self.attrib_args(args, env)?;
        let (resolved, site) = match &mut meth.kind {
            ExprKind::Ident(name) => {
                let name = name.clone();
                let result = self.resolver().resolve_method(env, &name, &argtypes, &typeargs);
                let resolved = self.access_method(result, meth.span, None, &name, &argtypes);
                match resolved {
                    Some(res) => {
                        let site = self.resolver().fun_site(env, res.sym);
                        let before_super = env.is_self_call()
                            && !self.syms.is_static(res.sym)
                            && match (env.enclosing_class(), self.syms.owner_class(res.sym)) {
                                (Some(c), Some(o)) => self.syms.is_subclass(c, o),
                                _ => false,
                            };
                        if before_super {
                            self.error(meth.span, "cant.ref.before.ctor.called", vec![name]);
                            (None, site)
                        } else {
                            (Some(res), site)
                        }
                    }
                    None => (None, Type::Error),
                }
            }
            ExprKind::Select { target, name } => {
                let name = name.clone();
                let site = self.attrib_tree(target, env, KindSel::VAL | KindSel::TYP, &Type::None)?;
                let inner = target.skip_parens();
                let is_super = inner.name() == Some(names::SUPER);
                let static_ref = inner.sym.is_some_and(|s| matches!(self.syms.kind(s), SymKind::Class | SymKind::TypeVar));
                let resolved = if site.is_error() {
                    None
                } else if !site.is_reference() || matches!(site, Type::Null) {
                    let args = vec![self.show(&site)];
                    self.error(target.span, "cant.deref", args);
                    None
                } else {
                    let ctx = AccessCtx::of(env, self.syms).with_super(is_super);
                    let result = self.resolver().resolve_qualified_method(&ctx, &site, &name, &argtypes, &typeargs);
                    let resolved = self.access_method(result, meth.span, Some(&site), &name, &argtypes);
                    resolved.and_then(|res| self.check_qualified_call(meth.span, res, &site, static_ref, is_super, env))
                };
                (resolved, site)
            }
            _ => {
                self.error(meth.span, "illegal.start.of.expr", vec![]);
                (None, Type::Error)
            }
        };
        let Some(res) = resolved else {
            meth.sym = Some(self.syms.predef.error_sym);
            meth.ty = Some(Type::Error);
            return Ok(Found::error());
        };
        Ok(self.finish_call(meth, res, &site, &typeargs, &argtypes, varargs_elem, pt))
    }

    fn check_qualified_call(&mut self, span: Span, res: Resolved, site: &Type, static_ref: bool, is_super: bool, env: &Env) -> Option<Resolved> {
        let sym = res.sym;
        if static_ref && !self.syms.is_static(sym) {
            let args = vec!["method".to_string(), self.show_sym(sym)];
            self.error(span, "non-static.cant.be.ref", args);
            return None;
        }
        if is_super && self.syms.flags(sym).contains(Flags::ABSTRACT) {
            let owner = self.syms.owner(sym).map(|o| self.syms.fullname(o)).unwrap_or_default();
            let args = vec!["method".to_string(), self.show_sym(sym), owner];
            self.error(span, "abstract.cant.be.accessed.directly", args);
            return None;
        }
        if !self.syms.is_static(sym) && self.syms.is_raw(site) {
            let declared = self.syms.ty(sym).clone();
            if declared.params().iter().any(Type::mentions_type_var) {
                let args = vec![self.show_sym(sym), self.show(site)];
                self.lint(env, LintCategory::Unchecked, span, "unchecked.call.mbr.of.raw.type", args);
            }
        }
        Some(res)
    }

    /// Record the chosen method in the callee node and compute the type of
    /// the call. A generic method whose result depends on its type
    /// variables is inferred again with the expected type.
    #[allow(clippy::too_many_arguments)]
    fn finish_call(
        &mut self,
        meth: &mut Expr,
        res: Resolved,
        site: &Type,
        typeargs: &[Type],
        argtypes: &[Type],
        varargs_elem: &mut Option<Type>,
        pt: &Type,
    ) -> Found {
        let varargs = res.phase.is_varargs() && self.syms.flags(res.sym).contains(Flags::VARARGS);
        let mut mtype = res.mtype.clone();
        if typeargs.is_empty() && !matches!(pt, Type::None | Type::Error | Type::Void) {
            if let Type::ForAll(fa) = self.syms.member_type(site, res.sym) {
                if fa.mt.ret.mentions_type_var() {
                    if let Ok(mt) = infer::infer_method(self.syms, &fa, argtypes, res.phase.allows_boxing(), varargs, Some(pt)) {
                        mtype = mt;
                    }
                }
            }
        }
        if res.sym == self.syms.predef.array_clone && site.is_array() {
            mtype.ret = Box::new(site.clone());
        }
        *varargs_elem = if varargs { mtype.params.last().and_then(Type::elem_type).cloned() } else { None };
        let ret = (*mtype.ret).clone();
        meth.sym = Some(res.sym);
        meth.ty = Some(Type::Method(mtype));
        Found::value(ret).with_sym(res.sym)
    }

    /// `this(...)` or `super(...)` as the first statement of a constructor.
    #[allow(clippy::too_many_arguments)]
    fn attrib_self_call(
        &mut self,
        span: Span,
        meth: &mut Expr,
        name: &str,
        typeargs: &[Type],
        args: &mut [Expr],
        varargs_elem: &mut Option<Type>,
        env: &Env,
    ) -> AttrResult<Found> {
        let first = std::mem::take(&mut self.self_call_ok);
        let qualified = match &mut meth.kind {
            ExprKind::Select { target, .. } => Some(self.attrib_expr(target, env, &Type::None)?),
            _ => None,
        };
        let args_env = env.dup_with(Frame::SelfCall, |info| info.is_self_call = true);
        let argtypes = self.attrib_args(args, &args_env)?;
        meth.ty = Some(Type::Error);

        let in_ctor = env.enclosing_method().is_some_and(|m| self.syms.is_constructor(m));
        let Some(c) = env.enclosing_class().filter(|_| first && in_ctor) else {
            self.error(span, "call.must.be.first.stmt.in.ctor", vec![name.to_string()]);
            return Ok(Found::error());
        };
        let is_super = name == names::SUPER;
        let site = if is_super {
            self.syms.class_info(c).supertype.clone().unwrap_or(Type::Error)
        } else {
            self.syms.ty(c).clone()
        };
        let Some(site_class) = site.class_sym() else { return Ok(Found::error()) };

        match &qualified {
            Some(q) if !q.is_error() && !self.syms.has_outer_instance(site_class) => {
                self.error(span, "illegal.qual.not.icls", vec![self.syms.fullname(site_class)]);
                return Ok(Found::error());
            }
            None if is_super && self.syms.has_outer_instance(site_class) => {
                let lookup = self.resolver().resolve_implicit_this(env, &site, true);
                self.access(lookup, span, None, names::THIS, None);
            }
            _ => {}
        }

        let mut res_args = argtypes;
        if site_class == self.syms.predef.enum_ {
            res_args.insert(0, Type::int());
            res_args.insert(0, self.syms.string_type());
        }
        let ctx = AccessCtx::of(env, self.syms).with_super(is_super);
        let result = self.resolver().resolve_constructor(&ctx, &site, &res_args, typeargs);
        let Some(res) = self.access_method(result, meth.span, Some(&site), names::INIT, &res_args) else {
            return Ok(Found::error());
        };
        *varargs_elem = res.varargs_elem(self.syms);
        meth.sym = Some(res.sym);
        meth.ty = Some(Type::Method(res.mtype.clone()));
        Ok(Found::value(Type::Void).with_sym(res.sym))
    }

    // ── Instance creation ──────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn attrib_new(
        &mut self,
        span: Span,
        encl: &mut Option<Box<Expr>>,
        class: &mut Expr,
        type_args: &mut [Expr],
        args: &mut [Expr],
        body: &mut Option<Box<ClassDecl>>,
        varargs_elem: &mut Option<Type>,
        env: &Env,
        pt: &Type,
    ) -> AttrResult<Found> {
        let mut typeargs = Vec::with_capacity(type_args.len());
        for t in type_args.iter_mut() {
            typeargs.push(self.attrib_type(t, env)?);
        }
        let diamond = matches!(&class.kind, ExprKind::TypeApply { args, .. } if args.is_empty());
        if diamond && !self.opts.diamond {
            self.error(class.span, "diamond.not.supported.in.source", vec![self.opts.source.name().to_string()]);
        }
        let mut clazz = match encl.as_mut() {
            Some(outer) => {
                let outer_ty = self.attrib_expr(outer, env, &Type::None)?;
                self.attrib_inner_class_name(class, &outer_ty, env)?
            }
            None => self.attrib_type(class, env)?,
        };
        let argtypes = self.attrib_args(args, env)?;
        if clazz.is_error() {
            return Ok(Found::error());
        }
        let Some(c) = clazz.class_sym() else {
            let args = vec!["class".to_string(), self.show(&clazz)];
            self.error(class.span, "type.found.req", args);
            return Ok(Found::error());
        };

        let flags = self.syms.flags(c);
        let is_enum = flags.contains(Flags::ENUM);
        let is_interface = flags.contains(Flags::INTERFACE);
        if is_enum {
            let in_constant = matches!(env.frame(), Frame::VarInit(f) if self.syms.flags(*f).contains(Flags::ENUM_CONSTANT));
            if !in_constant {
                self.error(span, "enum.cant.be.instantiated", vec![]);
                return Ok(Found::error());
            }
        } else if body.is_none() && flags.intersects(Flags::ABSTRACT | Flags::INTERFACE) {
            self.error(span, "abstract.cant.be.instantiated", vec![self.syms.fullname(c)]);
            return Ok(Found::error());
        }
        if body.is_some() {
            if is_interface && !args.is_empty() {
                self.error(span, "anon.class.impl.intf.no.args", vec![]);
                return Ok(Found::error());
            }
            if flags.contains(Flags::FINAL) && !is_enum {
                self.error(class.span, "cant.inherit.from.final", vec![self.syms.fullname(c)]);
                return Ok(Found::error());
            }
            if diamond {
                self.error(class.span, "cant.apply.diamond.1", vec![self.syms.fullname(c)]);
                return Ok(Found::error());
            }
        }

        if encl.is_none() && !is_interface && self.syms.has_outer_instance(c) {
            let lookup = self.resolver().resolve_implicit_this(env, &clazz, false);
            self.access(lookup, class.span, None, names::THIS, None);
        } else if encl.is_some() && !self.syms.has_outer_instance(c) {
            self.error(span, "qualified.new.of.static.class", vec![self.syms.fullname(c)]);
        }

        let ctor_site = if is_interface { self.syms.object_type() } else { clazz.clone() };
        let ctx = AccessCtx::of(env, self.syms);
        let result = self.resolver().resolve_constructor(&ctx, &ctor_site, &argtypes, &typeargs);
        let Some(res) = self.access_method(result, span, Some(&ctor_site), names::INIT, &argtypes) else {
            return Ok(Found::error());
        };
        if diamond {
            if let Some(inferred) = self.infer_diamond(c, &res, &argtypes, pt) {
                clazz = inferred;
                class.ty = Some(clazz.clone());
            }
        }

        let mut ctor = res.sym;
        *varargs_elem = res.varargs_elem(self.syms);
        if let Some(decl) = body.as_mut() {
            let super_flags = self.syms.flags(res.sym);
            let anon = self.enter_anonymous_class(decl, env, &clazz, &res.mtype, super_flags)?;
            self.attrib_class(decl)?;
            if let Some(anon_ctor) = self.syms.constructors(anon).first().copied() {
                ctor = anon_ctor;
            }
            clazz = self.syms.ty(anon).clone();
        }
        Ok(Found::value(clazz).with_sym(ctor))
    }

    /// The class named in `outer.new Inner(...)`, looked up as a member
    /// type of the qualifier's type.
    fn attrib_inner_class_name(&mut self, class: &mut Expr, outer_ty: &Type, env: &Env) -> AttrResult<Type> {
        if outer_ty.is_error() {
            return Ok(Type::Error);
        }
        let applied = matches!(class.kind, ExprKind::TypeApply { .. });
        let (base, targs) = if applied {
            let ExprKind::TypeApply { base, args } = &mut class.kind else { return Ok(Type::Error) };
            (&mut **base, Some(args))
        } else {
            (&mut *class, None)
        };
        let Some(name) = base.name().map(str::to_string) else {
            self.error(base.span, "cant.resolve", vec!["class".to_string(), String::new()]);
            return Ok(Type::Error);
        };
        let ctx = AccessCtx::of(env, self.syms);
        let lookup = self.resolver().find_member_type(&ctx, outer_ty, &name);
        let sym = self.access(lookup, base.span, Some(outer_ty), &name, None);
        if self.syms.kind(sym) != SymKind::Class {
            return Ok(Type::Error);
        }
        base.sym = Some(sym);
        let mut args = Vec::new();
        if let Some(targs) = targs {
            for a in targs.iter_mut() {
                args.push(self.attrib_type(a, env)?);
            }
        }
        let ty = Type::Class(ClassType { sym, args, outer: Some(Box::new(outer_ty.clone())) });
        base.ty = Some(ty.clone());
        if applied {
            class.ty = Some(ty.clone());
        }
        Ok(ty)
    }

    /// Type arguments of `new C<>(...)`, inferred from the constructor
    /// arguments and the expected type.
    fn infer_diamond(&mut self, c: SymbolId, res: &Resolved, argtypes: &[Type], pt: &Type) -> Option<Type> {
        let class_tvars = self.syms.class_type_params(c).to_vec();
        if class_tvars.is_empty() {
            return None;
        }
        let (ctor_tvars, mt) = match self.syms.ty(res.sym).clone() {
            Type::ForAll(fa) => (fa.tvars, fa.mt),
            Type::Method(mt) => (Vec::new(), mt),
            _ => return None,
        };
        let mut tvars = class_tvars;
        tvars.extend(ctor_tvars);
        let fa = ForAll { tvars, mt: MethodType::new(mt.params, self.syms.ty(c).clone(), mt.thrown) };
        let expected = (!matches!(pt, Type::None | Type::Error)).then_some(pt);
        let varargs = res.phase.is_varargs() && self.syms.flags(res.sym).contains(Flags::VARARGS);
        infer::infer_method(self.syms, &fa, argtypes, res.phase.allows_boxing(), varargs, expected)
            .ok()
            .map(|m| *m.ret)
    }

    fn attrib_new_array(
        &mut self,
        span: Span,
        elem: &mut Option<Box<Expr>>,
        dims: &mut [Expr],
        elems: &mut Option<Vec<Expr>>,
        env: &Env,
        pt: &Type,
    ) -> AttrResult<Found> {
        let mut owntype = match elem.as_mut() {
            Some(el) => {
                let t = self.attrib_type(el, env)?;
                if !t.is_error() && !self.syms.is_reifiable(&t) {
                    self.error(span, "generic.array.creation", vec![]);
                    return Ok(Found::error());
                }
                t
            }
            None => match pt.elem_type() {
                Some(t) => t.clone(),
                None => {
                    if !pt.is_error() {
                        let args = vec![self.show(pt)];
                        self.error(span, "illegal.initializer.for.type", args);
                    }
                    Type::Error
                }
            },
        };
        for d in dims.iter_mut() {
            self.attrib_expr(d, env, &Type::int())?;
            owntype = Type::array(owntype);
        }
        if let Some(items) = elems.as_mut() {
            owntype = if elem.is_some() {
                Type::array(owntype)
            } else if owntype.is_error() {
                Type::Error
            } else {
                pt.clone()
            };
            let item_ty = owntype.elem_type().cloned().unwrap_or(Type::Error);
            for item in items.iter_mut() {
                self.attrib_expr(item, env, &item_ty)?;
            }
        }
        if owntype.is_error() {
            return Ok(Found::error());
        }
        Ok(Found::value(owntype))
    }

    // ── Assignment ─────────────────────────────────────────────────────

    fn attrib_assign(&mut self, lhs: &mut Expr, rhs: &mut Expr, env: &Env) -> AttrResult<Found> {
        let lhs_span = lhs.skip_parens().span;
        let prev = self.assign_lhs.replace(lhs_span);
        let owntype = self.attrib_tree(lhs, env, KindSel::VAR, &Type::None)?;
        self.assign_lhs = prev;
        self.check_assignable(lhs, env);
        self.attrib_expr(rhs, env, &owntype)?;
        Ok(Found::value(owntype))
    }

    fn attrib_assign_op(&mut self, span: Span, op: BinOp, lhs: &mut Expr, rhs: &mut Expr, env: &Env) -> AttrResult<Found> {
        let owntype = self.attrib_tree(lhs, env, KindSel::VAR, &Type::None)?;
        self.check_assignable(lhs, env);
        let operand = self.attrib_expr(rhs, env, &Type::None)?;
        if owntype.is_error() || operand.is_error() {
            return Ok(Found::value(owntype));
        }
        let result = self.resolver().resolve_operator(op.symbol(), &[owntype.clone(), operand.clone()]);
        let res = match result {
            Ok(res) => res,
            Err(_) => {
                let args = vec![op.symbol().to_string(), self.show(&owntype), self.show(&operand)];
                self.error(span, "operator.cant.be.applied.1", args);
                return Ok(Found::error());
            }
        };
        let ret = (*res.mtype.ret).clone();
        if !self.syms.is_castable(&ret, &owntype) {
            let args = vec![self.show(&ret), self.show(&owntype)];
            self.error(span, "incompatible.types", args);
            return Ok(Found::error());
        }
        Ok(Found::value(owntype).with_sym(res.sym))
    }

    /// Reject assignments to final variables other than the first
    /// assignment of a blank final in its own class's constructor or
    /// initializer.
    fn check_assignable(&mut self, lhs: &Expr, env: &Env) {
        let target = lhs.skip_parens();
        let Some(sym) = target.sym else { return };
        if self.syms.kind(sym) != SymKind::Var || !self.syms.flags(sym).contains(Flags::FINAL) {
            return;
        }
        let flags = self.syms.flags(sym);
        let blank = !flags.intersects(Flags::HASINIT | Flags::PARAMETER);
        let allowed = blank
            && if self.is_field(sym) {
                let simple = match &target.kind {
                    ExprKind::Ident(_) => true,
                    ExprKind::Select { target: t, .. } => matches!(&t.kind, ExprKind::Ident(n) if n == names::THIS),
                    _ => false,
                };
                let in_init = env.enclosing_method().is_some_and(|m| {
                    let is_init_block = self.init_pos.contains_key(&m);
                    let ctor = self.syms.is_constructor(m);
                    let field_init = self.is_field(m);
                    (ctor || is_init_block || field_init) && self.syms.is_static(m) == self.syms.is_static(sym)
                });
                simple && in_init && env.enclosing_class() == self.syms.owner(sym)
            } else {
                true
            };
        if !allowed {
            let args = vec![self.syms.name(sym).to_string()];
            self.error(target.span, "cant.assign.val.to.final.var", args);
        }
    }

    // ── Operators ──────────────────────────────────────────────────────

    fn attrib_unary(&mut self, span: Span, op: UnOp, arg: &mut Expr, env: &Env) -> AttrResult<Found> {
        if op.is_increment() {
            let t = self.attrib_tree(arg, env, KindSel::VAR, &Type::None)?;
            self.check_assignable(arg, env);
            if t.is_error() {
                return Ok(Found::error());
            }
            let name = if matches!(op, UnOp::PreInc | UnOp::PostInc) { "+" } else { "-" };
            return match self.resolver().resolve_operator(name, &[t.clone(), Type::int()]) {
                Ok(res) if res.mtype.params.first().is_some_and(Type::is_numeric) => Ok(Found::value(t).with_sym(res.sym)),
                _ => {
                    let args = vec![op.symbol().to_string(), self.show(&t)];
                    self.error(span, "operator.cant.be.applied", args);
                    Ok(Found::error())
                }
            };
        }
        let t = self.attrib_expr(arg, env, &Type::None)?;
        let t = self.check_non_void(arg.span, t);
        if t.is_error() {
            return Ok(Found::error());
        }
        let res = match self.resolver().resolve_operator(op.symbol(), &[t.clone()]) {
            Ok(res) => res,
            Err(_) => {
                let args = vec![op.symbol().to_string(), self.show(&t)];
                self.error(span, "operator.cant.be.applied", args);
                return Ok(Found::error());
            }
        };
        let ret = (*res.mtype.ret).clone();
        let constant = match (&arg.constant, ret.prim()) {
            (Some(c), Some(p)) => constfold::fold_unary(op, c, p),
            _ => None,
        };
        Ok(Found::value(ret).with_sym(res.sym).with_constant(constant))
    }

    fn attrib_binary(&mut self, span: Span, op: BinOp, lhs: &mut Expr, rhs: &mut Expr, env: &Env) -> AttrResult<Found> {
        let l = self.attrib_expr(lhs, env, &Type::None)?;
        let l = self.check_non_void(lhs.span, l);
        let r = self.attrib_expr(rhs, env, &Type::None)?;
        let r = self.check_non_void(rhs.span, r);
        if l.is_error() || r.is_error() {
            return Ok(Found::error());
        }
        let res = match self.resolver().resolve_operator(op.symbol(), &[l.clone(), r.clone()]) {
            Ok(res) => res,
            Err(_) => {
                let args = vec![op.symbol().to_string(), self.show(&l), self.show(&r)];
                self.error(span, "operator.cant.be.applied.1", args);
                return Ok(Found::error());
            }
        };
        let params = res.mtype.params.clone();
        let ret = (*res.mtype.ret).clone();
        if matches!(op, BinOp::Eq | BinOp::Ne) && params.first().is_some_and(Type::is_reference) {
            if !self.syms.is_castable(&l, &r) && !self.syms.is_castable(&r, &l) {
                let args = vec![self.show(&l), self.show(&r)];
                self.error(span, "incomparable.types", args);
                return Ok(Found::error());
            }
        }
        let constant = match (&lhs.constant, &rhs.constant, params.first(), params.get(1)) {
            (Some(a), Some(b), Some(pl), Some(pr)) => constfold::fold_binary(op, a, b, pl, pr, &ret),
            _ => None,
        };
        Ok(Found::value(ret).with_sym(res.sym).with_constant(constant))
    }

    fn attrib_cast(&mut self, span: Span, clazz: &mut Expr, expr: &mut Expr, env: &Env) -> AttrResult<Found> {
        let ct = self.attrib_type(clazz, env)?;
        let et = self.attrib_expr(expr, env, &Type::None)?;
        if ct.is_error() || et.is_error() {
            return Ok(Found::error());
        }
        if !self.syms.is_castable(&et, &ct) {
            let args = vec![self.show(&et), self.show(&ct)];
            self.error(span, "inconvertible.types", args);
            return Ok(Found::error());
        }
        if self.syms.is_same_type(&et, &ct) {
            let args = vec![self.show(&ct)];
            self.lint(env, LintCategory::Cast, span, "redundant.cast", args);
        }
        let constant = match (&expr.constant, &ct) {
            (Some(c), Type::Prim(p)) => c.coerce(*p),
            (Some(c @ Constant::Str(_)), Type::Class(ct)) if ct.sym == self.syms.predef.string => Some(c.clone()),
            _ => None,
        };
        Ok(Found::value(ct).with_constant(constant))
    }

    fn attrib_instanceof(&mut self, span: Span, expr: &mut Expr, clazz: &mut Expr, env: &Env) -> AttrResult<Found> {
        let et = self.attrib_expr(expr, env, &Type::None)?;
        let ct = self.attrib_type(clazz, env)?;
        if et.is_error() || ct.is_error() {
            return Ok(Found::value(Type::boolean()));
        }
        if et.is_prim() || ct.is_prim() {
            let shown = if et.is_prim() { &et } else { &ct };
            let args = vec![self.show(shown), "reference".to_string()];
            self.error(span, "type.found.req", args);
        } else if !self.syms.is_reifiable(&ct) {
            self.error(clazz.span, "illegal.generic.type.for.instof", vec![]);
        } else if !self.syms.is_castable(&et, &ct) {
            let args = vec![self.show(&et), self.show(&ct)];
            self.error(span, "inconvertible.types", args);
        }
        Ok(Found::value(Type::boolean()))
    }

    // ── Conditional ────────────────────────────────────────────────────

    fn attrib_conditional(
        &mut self,
        span: Span,
        cond: &mut Expr,
        then: &mut Expr,
        els: &mut Expr,
        env: &Env,
        pt: &Type,
    ) -> AttrResult<Found> {
        self.attrib_bool(cond, env)?;
        let arm_pt = if pt.is_prim() || matches!(pt, Type::None | Type::Error) { Type::None } else { pt.clone() };
        let t = self.attrib_expr(then, env, &arm_pt)?;
        let e = self.attrib_expr(els, env, &arm_pt)?;
        let ty = self.conditional_type(span, &t, &e, then.constant.as_ref(), els.constant.as_ref());
        if ty.is_error() {
            return Ok(Found::error());
        }
        let constant = match (&cond.constant, &then.constant, &els.constant) {
            (Some(Constant::Bool(b)), Some(a), Some(c)) => {
                let picked = if *b { a } else { c };
                match &ty {
                    Type::Prim(p) => picked.coerce(*p),
                    _ => Some(picked.clone()),
                }
            }
            _ => None,
        };
        Ok(Found::value(ty).with_constant(constant))
    }

    /// The type of `c ? t : e` from the types of the two arms.
    pub(crate) fn conditional_type(&mut self, span: Span, t: &Type, e: &Type, tc: Option<&Constant>, ec: Option<&Constant>) -> Type {
        if t.is_error() || e.is_error() {
            return Type::Error;
        }
        if t.is_void() || e.is_void() {
            self.error(span, "void.not.allowed.here", vec![]);
            return Type::Error;
        }
        if self.syms.is_same_type(t, e) {
            return t.clone();
        }
        let boxing = self.opts.boxing;
        let unbox = |a: &Attr<'_>, ty: &Type| ty.prim().or_else(|| if boxing { a.syms.unboxed_type(ty) } else { None });
        if let (Some(a), Some(b)) = (unbox(self, t), unbox(self, e)) {
            if a == b {
                return Type::Prim(a);
            }
            if a.is_subrange() && b == Prim::Int && ec.is_some_and(|c| c.fits(a)) {
                return Type::Prim(a);
            }
            if b.is_subrange() && a == Prim::Int && tc.is_some_and(|c| c.fits(b)) {
                return Type::Prim(b);
            }
            for p in [Prim::Byte, Prim::Short, Prim::Char, Prim::Int, Prim::Long, Prim::Float, Prim::Double] {
                if a.widens_to(p) && b.widens_to(p) {
                    return Type::Prim(p);
                }
            }
        }
        if (t.is_prim() || e.is_prim()) && !boxing {
            let args = vec![self.show(t), self.show(e)];
            self.error(span, "neither.conditional.subtype", args);
            return Type::Error;
        }
        let boxed = |a: &Attr<'_>, ty: &Type| match ty.prim() {
            Some(p) => a.syms.boxed_type(p),
            None => ty.clone(),
        };
        let (bt, be) = (boxed(self, t), boxed(self, e));
        if matches!(bt, Type::Null) {
            return be;
        }
        if matches!(be, Type::Null) {
            return bt;
        }
        if self.syms.is_subtype(&bt, &be) {
            return be;
        }
        if self.syms.is_subtype(&be, &bt) {
            return bt;
        }
        self.syms.lub(&[bt, be])
    }
}
