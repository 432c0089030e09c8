//! Attribution of member bodies and statements.

use tracing::trace;

use cinder_ast::{Block, Case, Catch, Expr, ExprKind, Initializer, MethodDecl, Stmt, StmtKind, VarDecl};
use cinder_common::{LintCategory, Span};
use cinder_symtab::{names, Constant, Flags, Prim, SymKind, SymbolId, Type};
use rustc_hash::FxHashSet;

use super::{Attr, AttrResult};
use crate::enter::constant_for;
use crate::env::{Env, Frame};
use crate::resolve::AccessCtx;

/// Whether `s` is an explicit `this(...)` or `super(...)` call.
pub(crate) fn is_self_call(s: &Stmt) -> bool {
    self_call_name(s).is_some()
}

fn self_call_name(s: &Stmt) -> Option<&str> {
    let StmtKind::Expr(Expr { kind: ExprKind::Call { meth, .. }, .. }) = &s.kind else { return None };
    match &meth.kind {
        ExprKind::Ident(n) if n == names::THIS || n == names::SUPER => Some(n),
        ExprKind::Select { name, .. } if name == names::SUPER => Some(name),
        _ => None,
    }
}

/// How the labels of a switch are checked.
enum SwitchMode {
    Enum(SymbolId),
    Str,
    Int(Type),
    Error,
}

impl Attr<'_> {
    // ── Members ────────────────────────────────────────────────────────

    pub(crate) fn attrib_field(&mut self, v: &mut VarDecl, env: &Env) -> AttrResult<()> {
        let Some(sym) = v.sym else { return Ok(()) };
        let Some(init) = v.init.as_mut() else { return Ok(()) };
        let is_static = self.syms.is_static(sym);
        let ty = self.syms.ty(sym).clone();
        let ienv = env.init_env(Frame::VarInit(sym), is_static);
        let pt = if ty.is_error() { Type::None } else { ty.clone() };
        self.attrib_expr(init, &ienv, &pt)?;
        if self.syms.flags(sym).contains(Flags::FINAL) && self.syms.sym(sym).const_value().is_none() {
            if let Some(value) = init.constant.as_ref().and_then(|c| constant_for(&ty, c)) {
                self.syms.set_const_value(sym, value);
            }
        }
        self.note_position(v.span, env);
        Ok(())
    }

    pub(crate) fn attrib_initializer(&mut self, init: &mut Initializer, env: &Env, c: SymbolId) -> AttrResult<()> {
        let (name, flags) = if init.is_static { (names::CLINIT, Flags::STATIC) } else { ("", Flags::EMPTY) };
        let block = self.syms.new_method(c, name, flags | Flags::SYNTHETIC, Type::method(vec![], Type::Void), vec![]);
        self.init_pos.insert(block, init.body.span.start);
        let ienv = env.init_env(Frame::Init(block), init.is_static);
        self.attrib_block(&mut init.body, &ienv)
    }

    pub(crate) fn attrib_method(&mut self, md: &mut MethodDecl, env: &Env) -> AttrResult<()> {
        let Some(m) = md.sym else { return Ok(()) };
        let Some(c) = self.syms.owner(m) else { return Ok(()) };
        let _span = tracing::trace_span!("attrib_method", method = %md.name).entered();
        let flags = self.syms.flags(m);
        let ret = self.syms.ty(m).ret();
        let menv = env.method_env(m, flags.contains(Flags::STATIC), ret, &md.suppress);
        for tp in md.type_params.iter() {
            if let Some(tv) = tp.sym {
                menv.enter(&tp.name, tv);
            }
        }
        for p in md.params.iter() {
            if let Some(ps) = p.sym {
                menv.enter(&p.name, ps);
            }
        }
        self.check_override(md.span, m);

        let class_flags = self.syms.flags(c);
        match (&md.body, class_flags.contains(Flags::INTERFACE)) {
            (Some(_), true) => {
                self.error(md.span, "intf.meth.cant.have.body", vec![]);
                return Ok(());
            }
            (None, false) if !flags.intersects(Flags::ABSTRACT | Flags::NATIVE) && !self.opts.relaxed => {
                self.error(md.span, "missing.meth.body.or.decl.abstract", vec![]);
                return Ok(());
            }
            (Some(_), false) if flags.contains(Flags::ABSTRACT) && !self.opts.relaxed => {
                self.error(md.span, "abstract.meth.cant.have.body", vec![]);
                return Ok(());
            }
            (Some(_), false) if flags.contains(Flags::NATIVE) => {
                self.error(md.span, "native.meth.cant.have.body", vec![]);
                return Ok(());
            }
            _ => {}
        }
        let is_ctor = md.is_constructor();
        let Some(body) = md.body.as_mut() else { return Ok(()) };

        if is_ctor {
            let first = body.stmts.first().and_then(self_call_name);
            if class_flags.contains(Flags::ENUM) && first == Some(names::SUPER) && !flags.contains(Flags::GENERATED_CTOR) {
                let span = body.stmts[0].span;
                self.error(span, "call.to.super.not.allowed.in.enum.ctor", vec![self.syms.fullname(c)]);
                body.stmts.remove(0);
            }
            let has_self_call = body.stmts.first().is_some_and(is_self_call);
            if !has_self_call && c != self.syms.predef.object {
                let span = Span::new(body.span.start, body.span.start);
                let call = Expr::new(
                    span,
                    ExprKind::Call {
                        meth: Box::new(Expr::new(span, ExprKind::Ident(names::SUPER.to_string()))),
                        type_args: Vec::new(),
                        args: Vec::new(),
                        varargs_elem: None,
                    },
                );
                body.stmts.insert(0, Stmt::new(span, StmtKind::Expr(call)));
                trace!(class = %self.syms.fullname(c), "implicit super call");
            }
        }

        let benv = menv.dup(Frame::Block);
        for (i, s) in body.stmts.iter_mut().enumerate() {
            if self.is_stopped() {
                break;
            }
            self.self_call_ok = is_ctor && i == 0;
            self.attrib_stmt(s, &benv)?;
            self.self_call_ok = false;
            if is_ctor && i == 0 && self_call_name(s) == Some(names::THIS) {
                if let StmtKind::Expr(Expr { kind: ExprKind::Call { meth, .. }, .. }) = &s.kind {
                    if let Some(target) = meth.sym.filter(|t| self.syms.kind(*t) == SymKind::Method) {
                        self.ctor_calls.insert(m, target);
                    }
                }
            }
        }
        self.note_position(md.span, env);
        Ok(())
    }

    // ── Statements ─────────────────────────────────────────────────────

    pub(crate) fn attrib_block(&mut self, block: &mut Block, env: &Env) -> AttrResult<()> {
        let benv = env.dup(Frame::Block);
        for s in block.stmts.iter_mut() {
            if self.is_stopped() {
                break;
            }
            self.attrib_stmt(s, &benv)?;
        }
        Ok(())
    }

    /// Attribute a statement nested in another one, in its own frame.
    fn attrib_nested(&mut self, s: &mut Stmt, env: &Env) -> AttrResult<()> {
        let nenv = env.dup(Frame::Block);
        self.attrib_stmt(s, &nenv)
    }

    pub(crate) fn attrib_stmt(&mut self, s: &mut Stmt, env: &Env) -> AttrResult<()> {
        if self.is_stopped() {
            return Ok(());
        }
        let id = s.id;
        let span = s.span;
        let is_loop_body = match &s.kind {
            StmtKind::Labeled { body, .. } => body.is_loop().then_some(body.id),
            _ => None,
        };
        match &mut s.kind {
            StmtKind::Block(b) => self.attrib_block(b, env)?,
            StmtKind::LocalVar(v) => self.attrib_local_var(v, env)?,
            StmtKind::LocalClass(decl) => {
                self.enter_local_class(decl, env)?;
                self.attrib_class(decl)?;
            }
            StmtKind::Expr(e) => {
                self.attrib_expr(e, env, &Type::None)?;
            }
            StmtKind::If { cond, then, els } => {
                self.attrib_bool(cond, env)?;
                self.attrib_nested(then, env)?;
                if let Some(els) = els.as_mut() {
                    self.attrib_nested(els, env)?;
                }
            }
            StmtKind::While { cond, body } => {
                self.attrib_bool(cond, env)?;
                let lenv = env.dup(Frame::Loop(id));
                self.attrib_nested(body, &lenv)?;
            }
            StmtKind::DoWhile { body, cond } => {
                let lenv = env.dup(Frame::Loop(id));
                self.attrib_nested(body, &lenv)?;
                self.attrib_bool(cond, env)?;
            }
            StmtKind::For { init, cond, step, body } => {
                let lenv = env.dup(Frame::Loop(id));
                for s in init.iter_mut() {
                    self.attrib_stmt(s, &lenv)?;
                }
                if let Some(cond) = cond.as_mut() {
                    self.attrib_bool(cond, &lenv)?;
                }
                for e in step.iter_mut() {
                    self.attrib_expr(e, &lenv, &Type::None)?;
                }
                self.attrib_nested(body, &lenv)?;
            }
            StmtKind::ForEach { var, expr, body } => self.attrib_foreach(id, var, expr, body, env)?,
            StmtKind::Labeled { label, body } => {
                let in_use = env.local_frames().any(|f| matches!(f.frame(), Frame::Labeled { label: l, .. } if *l == *label));
                if in_use {
                    self.error(span, "label.already.in.use", vec![label.clone()]);
                }
                let lenv = env.dup(Frame::Labeled { label: label.clone(), id, body: is_loop_body });
                self.attrib_stmt(body, &lenv)?;
            }
            StmtKind::Switch { selector, cases } => self.attrib_switch(id, selector, cases, env)?,
            StmtKind::Break { label, target } => {
                *target = self.jump_target(span, label.as_deref(), env, false);
            }
            StmtKind::Continue { label, target } => {
                *target = self.jump_target(span, label.as_deref(), env, true);
            }
            StmtKind::Return(value) => self.attrib_return(span, value, env)?,
            StmtKind::Throw(e) => {
                let throwable = self.syms.ty(self.syms.predef.throwable).clone();
                self.attrib_expr(e, env, &throwable)?;
            }
            StmtKind::Try { resources, body, catches, finalizer } => {
                if resources.is_empty() && catches.is_empty() && finalizer.is_none() {
                    self.error(span, "try.without.catch.or.finally", vec![]);
                }
                let tenv = env.dup(Frame::Block);
                for r in resources.iter_mut() {
                    self.attrib_resource(r, &tenv)?;
                }
                self.attrib_block(body, &tenv)?;
                for c in catches.iter_mut() {
                    self.attrib_catch(c, env)?;
                }
                if let Some(f) = finalizer.as_mut() {
                    self.attrib_block(f, env)?;
                }
            }
            StmtKind::Synchronized { lock, body } => {
                let t = self.attrib_expr(lock, env, &Type::None)?;
                if !t.is_error() && !t.is_reference() {
                    let args = vec![self.show(&t), "reference".to_string()];
                    self.error(lock.span, "type.found.req", args);
                }
                self.attrib_block(body, env)?;
            }
            StmtKind::Assert { cond, detail } => {
                self.attrib_bool(cond, env)?;
                if let Some(d) = detail.as_mut() {
                    let t = self.attrib_expr(d, env, &Type::None)?;
                    self.check_non_void(d.span, t);
                }
            }
            StmtKind::Skip => {}
        }
        self.note_position(span, env);
        Ok(())
    }

    fn attrib_local_var(&mut self, v: &mut VarDecl, env: &Env) -> AttrResult<()> {
        let ty = match v.vtype.as_mut() {
            Some(t) => self.attrib_type(t, env)?,
            None => v.sym.map(|s| self.syms.ty(s).clone()).unwrap_or(Type::Error),
        };
        if ty.is_void() {
            self.error(v.span, "void.not.allowed.here", vec![]);
        }
        let sym = self.declare_local(v, env, ty.clone(), Flags::EMPTY);
        if let Some(init) = v.init.as_mut() {
            let pt = if ty.is_error() || ty.is_void() { Type::None } else { ty.clone() };
            self.attrib_expr(init, env, &pt)?;
            if self.syms.flags(sym).contains(Flags::FINAL) {
                if let Some(value) = init.constant.as_ref().and_then(|c| constant_for(&ty, c)) {
                    self.syms.set_const_value(sym, value);
                }
            }
        }
        Ok(())
    }

    /// Create (or reuse) the symbol of a local variable and enter it,
    /// reporting a clash with another local of the same method.
    fn declare_local(&mut self, v: &mut VarDecl, env: &Env, ty: Type, extra: Flags) -> SymbolId {
        let clash = env
            .local_frames()
            .take_while(|f| !f.is_class_frame())
            .find_map(|f| {
                let found = f.scope().lookup(&v.name).find(|s| self.syms.kind(*s) == SymKind::Var && Some(*s) != v.sym);
                found
            });
        if clash.is_some() {
            let owner = env.enclosing_method().map(|m| self.show_sym(m)).unwrap_or_default();
            let args = vec!["variable".to_string(), v.name.clone(), "method".to_string(), owner];
            self.error(v.span, "already.defined", args);
        }
        let sym = match v.sym {
            Some(s) => s,
            None => {
                let owner = env.enclosing_method().or(env.enclosing_class()).unwrap_or(self.syms.predef.object);
                let mut flags = v.mods | extra;
                if v.init.is_some() {
                    flags |= Flags::HASINIT;
                }
                let s = self.syms.new_var(owner, &v.name, flags, ty);
                self.syms.set_var_decl_pos(s, v.span.start);
                v.sym = Some(s);
                s
            }
        };
        env.enter(&v.name, sym);
        sym
    }

    fn attrib_foreach(&mut self, id: cinder_ast::NodeId, var: &mut VarDecl, expr: &mut Expr, body: &mut Stmt, env: &Env) -> AttrResult<()> {
        let lenv = env.dup(Frame::Loop(id));
        let et = self.attrib_expr(expr, env, &Type::None)?;
        let elem = match &et {
            Type::Error => Type::Error,
            t if t.is_array() => t.elem_type().cloned().unwrap_or(Type::Error),
            t => match self.syms.as_super(t, self.syms.predef.iterable) {
                Some(Type::Class(ct)) => match ct.args.first() {
                    Some(Type::Wildcard(w)) => w.bound.as_deref().cloned().unwrap_or_else(|| self.syms.object_type()),
                    Some(arg) => arg.clone(),
                    None => self.syms.object_type(),
                },
                _ => {
                    let args = vec![self.show(t), "java.lang.Iterable".to_string()];
                    self.error(expr.span, "foreach.not.applicable.to.type", args);
                    Type::Error
                }
            },
        };
        let vt = match var.vtype.as_mut() {
            Some(t) => self.attrib_type(t, &lenv)?,
            None => elem.clone(),
        };
        if !elem.is_error() && !vt.is_error() {
            self.check_type(expr.span, elem, &vt, None, env);
        }
        self.declare_local(var, &lenv, vt, Flags::HASINIT);
        self.attrib_nested(body, &lenv)
    }

    fn attrib_return(&mut self, span: Span, value: &mut Option<Expr>, env: &Env) -> AttrResult<()> {
        let Some(ret) = env.info().return_type.clone() else {
            self.error(span, "ret.outside.meth", vec![]);
            return Ok(());
        };
        match value.as_mut() {
            Some(e) if ret.is_void() => {
                self.attrib_expr(e, env, &Type::None)?;
                self.error(e.span, "unexpected.ret.val", vec![]);
            }
            Some(e) => {
                self.attrib_expr(e, env, &ret)?;
            }
            None if !ret.is_void() && !ret.is_error() => self.error(span, "missing.ret.val", vec![]),
            None => {}
        }
        Ok(())
    }

    /// Resolve the statement a `break` or `continue` leaves.
    fn jump_target(&mut self, span: Span, label: Option<&str>, env: &Env, is_continue: bool) -> Option<cinder_ast::NodeId> {
        for f in env.local_frames() {
            match (f.frame(), label) {
                (Frame::Labeled { label: l, id, body }, Some(want)) if l == want => {
                    if !is_continue {
                        return Some(*id);
                    }
                    if body.is_none() {
                        self.error(span, "not.loop.label", vec![want.to_string()]);
                    }
                    return *body;
                }
                (Frame::Loop(id), None) => return Some(*id),
                (Frame::Switch(id), None) if !is_continue => return Some(*id),
                (Frame::Method(_) | Frame::VarInit(_) | Frame::Init(_), _) => break,
                _ => {}
            }
        }
        match label {
            Some(l) => self.error(span, "undef.label", vec![l.to_string()]),
            None if is_continue => self.error(span, "cont.outside.loop", vec![]),
            None => self.error(span, "break.outside.switch.loop", vec![]),
        }
        None
    }

    // ── Switch ─────────────────────────────────────────────────────────

    fn attrib_switch(&mut self, id: cinder_ast::NodeId, selector: &mut Expr, cases: &mut [Case], env: &Env) -> AttrResult<()> {
        let st = self.attrib_expr(selector, env, &Type::None)?;
        let mode = self.switch_mode(selector.span, &st);
        let senv = env.dup(Frame::Switch(id));
        let mut seen_consts: FxHashSet<String> = FxHashSet::default();
        let mut seen_enum: FxHashSet<SymbolId> = FxHashSet::default();
        let mut has_default = false;
        for case in cases.iter_mut() {
            match case.label.as_mut() {
                None => {
                    if has_default {
                        self.error(case.span, "duplicate.default.label", vec![]);
                    }
                    has_default = true;
                }
                Some(label) => match &mode {
                    SwitchMode::Enum(e) => {
                        if let Some(k) = self.enum_label(label, *e) {
                            if !seen_enum.insert(k) {
                                self.error(label.span, "duplicate.case.label", vec![]);
                            }
                        }
                    }
                    SwitchMode::Str | SwitchMode::Int(_) => {
                        let pt = match &mode {
                            SwitchMode::Int(t) => t.clone(),
                            _ => self.syms.string_type(),
                        };
                        let t = self.attrib_expr(label, &senv, &pt)?;
                        if !t.is_error() {
                            match &label.constant {
                                None => {
                                    let key = if matches!(mode, SwitchMode::Str) { "string.const.req" } else { "const.expr.req" };
                                    self.error(label.span, key, vec![]);
                                }
                                Some(c) => {
                                    if !seen_consts.insert(label_key(c)) {
                                        self.error(label.span, "duplicate.case.label", vec![]);
                                    }
                                }
                            }
                        }
                    }
                    SwitchMode::Error => {
                        self.attrib_expr(label, &senv, &Type::None)?;
                    }
                },
            }
            for s in case.stmts.iter_mut() {
                if self.is_stopped() {
                    return Ok(());
                }
                self.attrib_stmt(s, &senv)?;
            }
        }
        Ok(())
    }

    fn switch_mode(&mut self, span: Span, st: &Type) -> SwitchMode {
        if st.is_error() {
            return SwitchMode::Error;
        }
        if let Some(c) = st.class_sym() {
            if self.syms.flags(c).contains(Flags::ENUM) && self.opts.enums {
                return SwitchMode::Enum(c);
            }
            if c == self.syms.predef.string {
                if !self.opts.string_switch {
                    self.error(span, "string.switch.not.supported.in.source", vec![self.opts.source.name().to_string()]);
                    return SwitchMode::Error;
                }
                return SwitchMode::Str;
            }
        }
        let unboxed = st.prim().or_else(|| if self.opts.boxing { self.syms.unboxed_type(st) } else { None });
        match unboxed {
            Some(p) if p.widens_to(Prim::Int) => SwitchMode::Int(Type::Prim(p)),
            _ => {
                let args = vec![self.show(st), "int".to_string()];
                self.error(span, "incompatible.types", args);
                SwitchMode::Error
            }
        }
    }

    /// A case label of an enum switch: the simple name of a constant of
    /// the selector's enum class.
    fn enum_label(&mut self, label: &mut Expr, e: SymbolId) -> Option<SymbolId> {
        let ExprKind::Ident(name) = &label.kind else {
            self.error(label.span, "enum.label.must.be.unqualified.enum", vec![]);
            label.ty = Some(Type::Error);
            return None;
        };
        let found = self
            .syms
            .members(e)
            .lookup(name)
            .find(|s| self.syms.kind(*s) == SymKind::Var && self.syms.flags(*s).contains(Flags::ENUM_CONSTANT));
        match found {
            Some(k) => {
                label.sym = Some(k);
                label.ty = Some(self.syms.ty(k).clone());
                Some(k)
            }
            None => {
                self.error(label.span, "enum.label.must.be.unqualified.enum", vec![]);
                label.ty = Some(Type::Error);
                None
            }
        }
    }

    // ── Try ────────────────────────────────────────────────────────────

    fn attrib_resource(&mut self, r: &mut VarDecl, env: &Env) -> AttrResult<()> {
        let ty = match r.vtype.as_mut() {
            Some(t) => self.attrib_type(t, env)?,
            None => Type::Error,
        };
        self.declare_local(r, env, ty.clone(), Flags::RESOURCE | Flags::FINAL);
        if let Some(init) = r.init.as_mut() {
            let pt = if ty.is_error() { Type::None } else { ty.clone() };
            self.attrib_expr(init, env, &pt)?;
        }
        if ty.is_error() {
            return Ok(());
        }
        let closeable = Type::class(self.syms.predef.auto_closeable);
        if !self.syms.is_subtype(&ty, &closeable) {
            let args = vec![self.show(&ty)];
            self.error(r.span, "try.not.applicable.to.type", args);
            return Ok(());
        }
        let ctx = AccessCtx::of(env, self.syms);
        let close = self.resolver().resolve_qualified_method(&ctx, &ty, names::CLOSE, &[], &[]);
        if let Ok(res) = close {
            let interrupted = Type::class(self.syms.predef.interrupted_exception);
            let throws_interrupt = res.mtype.thrown.iter().any(|t| self.syms.is_subtype(&interrupted, t));
            if throws_interrupt {
                let args = vec![self.show(&ty)];
                self.lint(env, LintCategory::Try, r.span, "try.resource.throws.interrupted.exc", args);
            }
        }
        Ok(())
    }

    fn attrib_catch(&mut self, c: &mut Catch, env: &Env) -> AttrResult<()> {
        let cenv = env.dup(Frame::Block);
        let ty = match c.param.vtype.as_mut() {
            Some(t) => self.attrib_type(t, &cenv)?,
            None => Type::Error,
        };
        if !ty.is_error() && !matches!(ty, Type::Union(_)) && !self.syms.is_throwable(&ty) {
            let throwable = self.syms.ty(self.syms.predef.throwable).clone();
            let args = vec![self.show(&ty), self.show(&throwable)];
            self.error(c.param.span, "incompatible.types", args);
        }
        let extra = if matches!(ty, Type::Union(_)) { Flags::PARAMETER | Flags::FINAL } else { Flags::PARAMETER };
        self.declare_local(&mut c.param, &cenv, ty, extra | Flags::HASINIT);
        self.attrib_block(&mut c.body, &cenv)
    }
}

/// A key identifying a case constant for duplicate detection.
fn label_key(c: &Constant) -> String {
    match c {
        Constant::Str(s) => format!("s:{}", s),
        other => format!("i:{}", other.as_i64().unwrap_or_default()),
    }
}
