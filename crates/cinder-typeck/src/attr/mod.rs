//! Attribution: name resolution, type checking and constant folding over
//! the syntax tree.
//!
//! [`Attr`] walks a compilation unit depth first. Every expression is
//! attributed against an expected kind ([`KindSel`]) and an expected type,
//! `Type::None` when any type will do. The node's `ty`, `sym` and
//! `constant` slots are filled in place. Errors stay local: the failing
//! node gets the error type, one diagnostic is logged, and the walk goes on
//! with the siblings.

mod expr;
mod stmt;
mod types;

use rustc_hash::FxHashMap;
use tracing::{debug, debug_span};

use cinder_ast::{ClassDecl, CompilationUnit, Expr, Member, TypeParam};
use cinder_common::{CompileError, CompileOptions, Diagnostic, LintCategory, Log, Span};
use cinder_symtab::{Constant, Flags, SymKind, SymbolId, Symtab, Type};

use crate::defaults::default_unset;
use crate::env::Env;
use crate::resolve::{KindSel, Lookup, ResolveError, Resolved, Resolver};

pub type AttrResult<T> = Result<T, CompileError>;

/// Supertype clauses of a class whose header has not been attributed yet.
pub(crate) struct PendingHeader {
    pub env: Env,
    pub type_params: Vec<TypeParam>,
    pub extends: Option<Expr>,
    pub implements: Vec<Expr>,
}

/// Header clauses after attribution, put back into the tree when the class
/// body is attributed.
pub(crate) struct AttributedHeader {
    pub type_params: Vec<TypeParam>,
    pub extends: Option<Expr>,
    pub implements: Vec<Expr>,
}

/// A type argument in a class header, checked against its bound once every
/// header of the unit is attributed.
pub(crate) struct DeferredBound {
    pub span: Span,
    pub formals: Vec<SymbolId>,
    pub actuals: Vec<Type>,
    pub index: usize,
}

/// What attributing one expression node found, before it is checked
/// against the expectation.
pub(crate) struct Found {
    pub ty: Type,
    pub kind: KindSel,
    pub sym: Option<SymbolId>,
    pub constant: Option<Constant>,
}

impl Found {
    pub fn value(ty: Type) -> Found {
        Found { ty, kind: KindSel::VAL, sym: None, constant: None }
    }

    pub fn var(ty: Type, sym: SymbolId) -> Found {
        Found { ty, kind: KindSel::VAR, sym: Some(sym), constant: None }
    }

    pub fn typ(ty: Type) -> Found {
        Found { ty, kind: KindSel::TYP, sym: None, constant: None }
    }

    pub fn error() -> Found {
        Found { ty: Type::Error, kind: KindSel::NIL, sym: None, constant: None }
    }

    pub fn with_sym(mut self, sym: SymbolId) -> Found {
        self.sym = Some(sym);
        self
    }

    pub fn with_constant(mut self, constant: Option<Constant>) -> Found {
        self.constant = constant;
        self
    }
}

pub struct Attr<'a> {
    pub syms: &'a mut Symtab,
    pub log: &'a mut Log,
    pub opts: &'a CompileOptions,
    /// Class frame of every class entered so far.
    pub(crate) class_envs: FxHashMap<SymbolId, Env>,
    pub(crate) headers: FxHashMap<SymbolId, PendingHeader>,
    pub(crate) done_headers: FxHashMap<SymbolId, AttributedHeader>,
    /// Number of class headers being attributed on the current path.
    pub(crate) header_depth: u32,
    pub(crate) deferred_bounds: Vec<DeferredBound>,
    /// Source position of each initializer block symbol.
    pub(crate) init_pos: FxHashMap<SymbolId, u32>,
    /// Target of each constructor whose body starts with `this(...)`.
    pub(crate) ctor_calls: FxHashMap<SymbolId, SymbolId>,
    /// Set while the first statement of a constructor body is attributed.
    pub(crate) self_call_ok: bool,
    /// Span of the simple name on the left of the assignment being
    /// attributed.
    pub(crate) assign_lhs: Option<Span>,
    pub(crate) stop_at: Option<Span>,
    pub(crate) stopped: Option<Env>,
}

impl<'a> Attr<'a> {
    pub fn new(syms: &'a mut Symtab, log: &'a mut Log, opts: &'a CompileOptions) -> Self {
        Attr {
            syms,
            log,
            opts,
            class_envs: FxHashMap::default(),
            headers: FxHashMap::default(),
            done_headers: FxHashMap::default(),
            header_depth: 0,
            deferred_bounds: Vec::new(),
            init_pos: FxHashMap::default(),
            ctor_calls: FxHashMap::default(),
            self_call_ok: false,
            assign_lhs: None,
            stop_at: None,
            stopped: None,
        }
    }

    /// The class frame of an entered class.
    pub fn class_env(&self, class: SymbolId) -> Option<&Env> {
        self.class_envs.get(&class)
    }

    /// Stop attribution once the tree at `span` has been attributed and
    /// remember the environment it was attributed in.
    pub(crate) fn stop_at(&mut self, span: Span) {
        self.stop_at = Some(span);
        self.stopped = None;
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.is_some()
    }

    pub(crate) fn take_stopped(&mut self) -> Option<Env> {
        self.stop_at = None;
        self.stopped.take()
    }

    fn note_position(&mut self, span: Span, env: &Env) {
        if self.stopped.is_none() && self.stop_at == Some(span) {
            self.stopped = Some(env.clone());
        }
    }

    /// Run `f` with diagnostics discarded and the stop position disabled.
    pub(crate) fn speculative<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let mut scratch = Log::new();
        std::mem::swap(&mut *self.log, &mut scratch);
        let stop = self.stop_at.take();
        let out = f(self);
        self.stop_at = stop;
        std::mem::swap(&mut *self.log, &mut scratch);
        out
    }

    // ── Resolver plumbing ──────────────────────────────────────────────

    pub(crate) fn resolver(&mut self) -> Resolver<'_> {
        Resolver::new(self.syms, self.opts)
    }

    pub(crate) fn access(&mut self, result: Lookup, span: Span, site: Option<&Type>, name: &str, args: Option<&[Type]>) -> SymbolId {
        Resolver::new(self.syms, self.opts).access(self.log, result, span, site, name, args)
    }

    pub(crate) fn access_method(
        &mut self,
        result: Result<Resolved, ResolveError>,
        span: Span,
        site: Option<&Type>,
        name: &str,
        args: &[Type],
    ) -> Option<Resolved> {
        Resolver::new(self.syms, self.opts).access_method(self.log, result, span, site, name, args)
    }

    // ── Reporting ──────────────────────────────────────────────────────

    pub(crate) fn error(&mut self, span: Span, key: &'static str, args: Vec<String>) {
        self.log.error(span, key, args);
    }

    /// Report a lint warning unless the category is off or suppressed here.
    pub(crate) fn lint(&mut self, env: &Env, category: LintCategory, span: Span, key: &'static str, args: Vec<String>) {
        if env.is_suppressed(category) || !self.opts.lint_enabled(category) {
            return;
        }
        let mut diag = Diagnostic::warning(span, key, args);
        diag.lint = Some(category);
        self.log.report(diag);
    }

    pub(crate) fn show(&self, ty: &Type) -> String {
        self.syms.display(ty).to_string()
    }

    pub(crate) fn show_sym(&self, sym: SymbolId) -> String {
        self.syms.display_sym(sym).to_string()
    }

    // ── Checks ─────────────────────────────────────────────────────────

    /// Check the kind and type found for `e` against the expectation and
    /// record the result in the node.
    pub(crate) fn check(&mut self, e: &mut Expr, found: Type, ownkind: KindSel, pkind: KindSel, pt: &Type, env: &Env) -> Type {
        let ty = if found.is_error() || ownkind == KindSel::NIL {
            found
        } else if !ownkind.subset_of(pkind) {
            self.error(e.span, "unexpected.type", vec![pkind.names(), ownkind.names()]);
            Type::Error
        } else if pkind.intersects(KindSel::VAL) && ownkind.intersects(KindSel::VAL) {
            let constant = e.constant.clone();
            self.check_type(e.span, found, pt, constant.as_ref(), env)
        } else {
            found
        };
        e.ty = Some(ty.clone());
        ty
    }

    /// Check that a value of type `found` may be assigned to `req`.
    /// Returns `found` on success and the error type otherwise.
    pub(crate) fn check_type(&mut self, span: Span, found: Type, req: &Type, constant: Option<&Constant>, env: &Env) -> Type {
        if found.is_error() || matches!(req, Type::None | Type::Error | Type::Method(_) | Type::ForAll(_) | Type::Package(_)) {
            return found;
        }
        if self.syms.is_assignable(&found, req, constant, self.opts.boxing) {
            if found.is_reference() && req.is_reference() && !self.syms.is_subtype(&found, req) {
                let args = vec!["unchecked conversion".to_string(), self.show(&found), self.show(req)];
                self.lint(env, LintCategory::Unchecked, span, "prob.found.req", args);
            }
            return found;
        }
        let key = if found.is_numeric() && req.is_numeric() { "possible.loss.of.precision" } else { "incompatible.types" };
        let args = vec![self.show(&found), self.show(req)];
        self.error(span, key, args);
        Type::Error
    }

    pub(crate) fn check_non_void(&mut self, span: Span, ty: Type) -> Type {
        if ty.is_void() {
            self.error(span, "void.not.allowed.here", vec![]);
            Type::Error
        } else {
            ty
        }
    }

    /// The raw or declared type of a class as named in a type position.
    pub(crate) fn raw_type(&mut self, class: SymbolId) -> Type {
        let _ = self.syms.complete(class);
        let declared = self.syms.ty(class).clone();
        match declared {
            Type::Class(mut ct) if !ct.args.is_empty() => {
                ct.args.clear();
                Type::Class(ct)
            }
            other => other,
        }
    }

    // ── Entry points for trees ─────────────────────────────────────────

    /// Attribute `e` as something of kind `pkind` and check it against
    /// `pt`.
    pub(crate) fn attrib_tree(&mut self, e: &mut Expr, env: &Env, pkind: KindSel, pt: &Type) -> AttrResult<Type> {
        let ty = self.visit_expr(e, env, pkind, pt)?;
        self.note_position(e.span, env);
        Ok(ty)
    }

    pub(crate) fn attrib_expr(&mut self, e: &mut Expr, env: &Env, pt: &Type) -> AttrResult<Type> {
        self.attrib_tree(e, env, KindSel::VAL, pt)
    }

    pub(crate) fn attrib_type(&mut self, e: &mut Expr, env: &Env) -> AttrResult<Type> {
        self.attrib_tree(e, env, KindSel::TYP, &Type::None)
    }

    /// Attribute call arguments; `void` arguments are rejected.
    pub(crate) fn attrib_args(&mut self, args: &mut [Expr], env: &Env) -> AttrResult<Vec<Type>> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args.iter_mut() {
            let t = self.attrib_expr(arg, env, &Type::None)?;
            let t = self.check_non_void(arg.span, t);
            if t.is_error() {
                arg.ty = Some(Type::Error);
            }
            out.push(t);
        }
        Ok(out)
    }

    pub(crate) fn attrib_bool(&mut self, e: &mut Expr, env: &Env) -> AttrResult<Type> {
        self.attrib_expr(e, env, &Type::boolean())
    }

    // ── Classes ────────────────────────────────────────────────────────

    /// Put the attributed header clauses of `c` back into its declaration.
    fn restore_header(&mut self, decl: &mut ClassDecl, c: SymbolId) {
        if let Some(h) = self.done_headers.remove(&c) {
            decl.type_params = h.type_params;
            decl.extends = h.extends;
            decl.implements = h.implements;
        }
    }

    /// Attribute a class body: fields, methods and initializers in
    /// declaration order, then the member classes, superclasses first.
    pub(crate) fn attrib_class(&mut self, decl: &mut ClassDecl) -> AttrResult<()> {
        let Some(c) = decl.sym else {
            return Err(CompileError::internal(format!("class `{}` was never entered", decl.name)));
        };
        if self.syms.flags(c).contains(Flags::ATTRIBUTED) {
            return Ok(());
        }
        let _span = debug_span!("attrib_class", class = %self.syms.fullname(c)).entered();
        self.restore_header(decl, c);
        let env = self
            .class_envs
            .get(&c)
            .cloned()
            .ok_or_else(|| CompileError::internal(format!("no environment for class `{}`", decl.name)))?;
        self.check_class_flags(decl, c);

        for member in decl.members.iter_mut() {
            if self.is_stopped() {
                return Ok(());
            }
            match member {
                Member::Var(v) => self.attrib_field(v, &env)?,
                Member::Method(m) => self.attrib_method(m, &env)?,
                Member::Init(init) => self.attrib_initializer(init, &env, c)?,
                Member::Class(_) => {}
            }
        }
        self.check_class(decl, c);

        let mut nested: Vec<&mut ClassDecl> = decl
            .members
            .iter_mut()
            .filter_map(|m| match m {
                Member::Class(cd) => Some(cd),
                _ => None,
            })
            .collect();
        nested.sort_by_key(|cd| cd.sym.map_or(0, |s| self.source_depth(s)));
        for inner in nested {
            if self.is_stopped() {
                return Ok(());
            }
            self.attrib_class(inner)?;
        }
        self.syms.sym_mut(c).flags.insert(Flags::ATTRIBUTED);
        debug!(class = %self.syms.fullname(c), "attributed");
        Ok(())
    }

    // ── Compilation units ──────────────────────────────────────────────

    /// Enter and attribute every class of `unit`. A class whose
    /// attribution needs an external class that cannot be loaded gets one
    /// diagnostic at its declaration and its remaining slots defaulted.
    pub fn attrib_unit(&mut self, unit: &mut CompilationUnit) -> AttrResult<()> {
        self.enter_unit(unit)?;
        let mut order: Vec<usize> = (0..unit.classes.len()).collect();
        order.sort_by_key(|&i| unit.classes[i].sym.map_or(0, |s| self.source_depth(s)));
        for i in order {
            let decl = &mut unit.classes[i];
            match self.attrib_class(decl) {
                Ok(()) => {}
                Err(CompileError::CompletionFailure { class, reason }) => {
                    self.error(decl.span, "cant.access", vec![class, reason]);
                    default_unset(decl, self.syms.predef.error_sym);
                }
                Err(e) => return Err(e),
            }
            if self.is_stopped() {
                break;
            }
        }
        Ok(())
    }

    /// Attribute `unit` only until the tree at `span` has been attributed
    /// and return the environment that tree was attributed in. Everything
    /// left unattributed is filled with the error placeholders.
    pub fn attrib_until(&mut self, unit: &mut CompilationUnit, span: Span) -> AttrResult<Option<Env>> {
        self.stop_at(span);
        let result = self.attrib_unit(unit);
        let stopped = self.take_stopped();
        result?;
        for class in unit.classes.iter_mut() {
            default_unset(class, self.syms.predef.error_sym);
        }
        Ok(stopped)
    }

    /// Number of superclasses of `c` that are declared in the sources being
    /// compiled; used to attribute superclasses before their subclasses.
    pub(crate) fn source_depth(&self, c: SymbolId) -> usize {
        let mut depth = 0;
        let mut cur = self.syms.superclass_sym(c);
        while let Some(s) = cur {
            if !self.class_envs.contains_key(&s) || depth > 64 {
                break;
            }
            depth += 1;
            cur = self.syms.superclass_sym(s);
        }
        depth
    }

    /// Whether `sym` is a variable declared as a field.
    pub(crate) fn is_field(&self, sym: SymbolId) -> bool {
        self.syms.kind(sym) == SymKind::Var && self.syms.owner(sym).is_some_and(|o| self.syms.is_class(o))
    }
}
