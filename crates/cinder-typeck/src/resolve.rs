//! Name and overload resolution.
//!
//! Every lookup returns `Result<SymbolId, ResolveError>`. An error is
//! plain data describing why the lookup failed; the attributor decides
//! where to report it and substitutes the error symbol through
//! [`Resolver::access`], so each failed lookup produces exactly one
//! diagnostic.
//!
//! Method resolution runs the phases of [`MethodPhase`] in order. The
//! first phase that yields an applicable candidate decides the call; the
//! candidates of different phases are never compared with each other.

use std::fmt;

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use cinder_common::{CompileError, CompileOptions, Diagnostic, Log, Severity, Span};
use cinder_symtab::{
    names, CompletionFailure, Flags, MethodType, SymData, SymKind, Symbol, SymbolId, Symtab, Type,
};

use crate::env::Env;
use crate::infer;

// ── Kinds ──────────────────────────────────────────────────────────────

/// A set of symbol kinds a name may resolve to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct KindSel(u8);

impl KindSel {
    pub const NIL: KindSel = KindSel(0);
    /// An assignable variable.
    pub const VAR: KindSel = KindSel(1);
    /// Any value; includes `VAR`.
    pub const VAL: KindSel = KindSel(3);
    pub const TYP: KindSel = KindSel(4);
    pub const PCK: KindSel = KindSel(8);
    pub const MTH: KindSel = KindSel(16);

    pub fn contains(self, other: KindSel) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: KindSel) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether every kind of `self` is allowed by `allowed`.
    pub fn subset_of(self, allowed: KindSel) -> bool {
        self.0 & !allowed.0 == 0
    }

    /// The kind a resolved symbol has.
    pub fn of_symbol(syms: &Symtab, sym: SymbolId) -> KindSel {
        match syms.kind(sym) {
            SymKind::Var => KindSel::VAR,
            SymKind::Class | SymKind::TypeVar => KindSel::TYP,
            SymKind::Package => KindSel::PCK,
            SymKind::Method => KindSel::MTH,
            SymKind::Error => KindSel::NIL,
        }
    }

    /// Name used when a lookup of this kind finds nothing.
    pub fn absent_name(self) -> &'static str {
        if self.intersects(KindSel::VAL) {
            "variable"
        } else if self.contains(KindSel::MTH) {
            "method"
        } else if self.contains(KindSel::TYP) {
            "class"
        } else if self.contains(KindSel::PCK) {
            "package"
        } else {
            "symbol"
        }
    }

    /// Comma-separated names of the kinds in this set.
    pub fn names(self) -> String {
        let mut out = Vec::new();
        if self.contains(KindSel::VAL) {
            out.push("value");
        } else if self.contains(KindSel::VAR) {
            out.push("variable");
        }
        if self.contains(KindSel::MTH) {
            out.push("method");
        }
        if self.contains(KindSel::TYP) {
            out.push("class");
        }
        if self.contains(KindSel::PCK) {
            out.push("package");
        }
        out.join(",")
    }
}

impl std::ops::BitOr for KindSel {
    type Output = KindSel;

    fn bitor(self, rhs: KindSel) -> KindSel {
        KindSel(self.0 | rhs.0)
    }
}

// ── Phases ─────────────────────────────────────────────────────────────

/// Applicability phases, in the order they are tried.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MethodPhase {
    /// Subtyping and primitive widening only.
    Basic,
    /// Also boxing and unboxing.
    Box,
    /// Also variable arity.
    VarArity,
}

impl MethodPhase {
    pub const ALL: [MethodPhase; 3] = [MethodPhase::Basic, MethodPhase::Box, MethodPhase::VarArity];

    pub fn allows_boxing(self) -> bool {
        self != MethodPhase::Basic
    }

    pub fn is_varargs(self) -> bool {
        self == MethodPhase::VarArity
    }

    pub fn enabled(self, opts: &CompileOptions) -> bool {
        match self {
            MethodPhase::Basic => true,
            MethodPhase::Box => opts.boxing,
            MethodPhase::VarArity => opts.boxing && opts.varargs,
        }
    }
}

/// A method chosen by overload resolution.
#[derive(Clone, Debug)]
pub struct Resolved {
    pub sym: SymbolId,
    pub phase: MethodPhase,
    /// The method's type as a member of the site, with inferred type
    /// arguments substituted.
    pub mtype: MethodType,
}

impl Resolved {
    /// Element type of the trailing array parameter when the call passes
    /// its variable arguments individually.
    pub fn varargs_elem(&self, syms: &Symtab) -> Option<Type> {
        if self.phase.is_varargs() && syms.flags(self.sym).contains(Flags::VARARGS) {
            self.mtype.params.last().and_then(Type::elem_type).cloned()
        } else {
            None
        }
    }
}

// ── Access context ─────────────────────────────────────────────────────

/// Where a lookup happens, for accessibility checks.
#[derive(Clone, Debug)]
pub struct AccessCtx {
    pub class: Option<SymbolId>,
    pub package: SymbolId,
    /// The selection is qualified by `super`.
    pub select_super: bool,
    /// Inside a generated anonymous-class constructor.
    pub anon_ctor: bool,
    /// Compiler-internal lookups ignore access control.
    pub privileged: bool,
}

impl AccessCtx {
    pub fn of(env: &Env, syms: &Symtab) -> AccessCtx {
        let anon_ctor = env
            .enclosing_method()
            .is_some_and(|m| syms.kind(m) == SymKind::Method && syms.flags(m).contains(Flags::ANON_CTOR));
        AccessCtx {
            class: env.enclosing_class(),
            package: env.toplevel_info().package,
            select_super: env.info().select_super,
            anon_ctor,
            privileged: false,
        }
    }

    pub fn privileged(package: SymbolId) -> AccessCtx {
        AccessCtx { class: None, package, select_super: false, anon_ctor: false, privileged: true }
    }

    pub fn with_super(mut self, select_super: bool) -> AccessCtx {
        self.select_super = select_super;
        self
    }
}

// ── Errors ─────────────────────────────────────────────────────────────

/// Why a lookup failed.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolveError {
    NotFound { kind: KindSel, name: String, site: Option<Type>, args: Option<Vec<Type>> },
    /// The only candidate is not applicable.
    Inapplicable { sym: SymbolId, reason: String },
    /// Several candidates, none applicable.
    InapplicableMany { candidates: Vec<(SymbolId, String)> },
    Inaccessible { sym: SymbolId, site: Option<Type> },
    /// An instance member referenced from a static context.
    StaticViolation { sym: SymbolId },
    /// The first two symbols are the pair reported.
    Ambiguous { syms: Vec<SymbolId> },
    Completion(CompletionFailure),
    /// `C.this` or `C.super` where `C` does not enclose the reference.
    NotEnclosing { class: SymbolId },
    /// No enclosing instance of the class that declares `member`.
    NoEnclosingInstance { member: SymbolId },
}

/// What a failed lookup tells the user about the name, from most to least
/// telling. When several lookups fail the most telling failure is reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Insight {
    /// The name resolves, but to more than one symbol, or its class could
    /// not be loaded.
    Conflict,
    Hidden,
    WrongContext,
    MissingValue,
    /// Several candidates were found and none fits the arguments.
    NoneFit,
    /// The one candidate found does not fit the arguments.
    NoFit,
    MissingMethod,
    Missing,
    NoEnclosing,
}

impl ResolveError {
    fn insight(&self) -> Insight {
        match self {
            ResolveError::Ambiguous { .. } | ResolveError::Completion(_) => Insight::Conflict,
            ResolveError::Inaccessible { .. } => Insight::Hidden,
            ResolveError::StaticViolation { .. } => Insight::WrongContext,
            ResolveError::NotFound { kind, .. } if kind.intersects(KindSel::VAL) => Insight::MissingValue,
            ResolveError::InapplicableMany { .. } => Insight::NoneFit,
            ResolveError::Inapplicable { .. } => Insight::NoFit,
            ResolveError::NotFound { kind, .. } if kind.contains(KindSel::MTH) => Insight::MissingMethod,
            ResolveError::NotFound { .. } => Insight::Missing,
            ResolveError::NotEnclosing { .. } | ResolveError::NoEnclosingInstance { .. } => Insight::NoEnclosing,
        }
    }

    /// Whether `self` says more about the failed name than `other`.
    fn better_than(&self, other: &ResolveError) -> bool {
        self.insight() < other.insight()
    }

    /// A method-phase failure that later phases cannot improve on: the
    /// name was found but is ambiguous, hidden or out of context.
    fn is_conclusive(&self) -> bool {
        matches!(self.insight(), Insight::Conflict | Insight::Hidden | Insight::WrongContext | Insight::MissingValue)
    }

    pub fn not_found(kind: KindSel, name: &str) -> ResolveError {
        ResolveError::NotFound { kind, name: name.to_string(), site: None, args: None }
    }

    fn at(mut self, location: &Type) -> ResolveError {
        if let ResolveError::NotFound { site, .. } = &mut self {
            if site.is_none() {
                *site = Some(location.clone());
            }
        }
        self
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NotFound { kind, name, .. } => write!(f, "{} `{}` not found", kind.absent_name(), name),
            ResolveError::Inapplicable { reason, .. } => write!(f, "inapplicable: {}", reason),
            ResolveError::InapplicableMany { candidates } => write!(f, "{} inapplicable candidates", candidates.len()),
            ResolveError::Inaccessible { sym, .. } => write!(f, "symbol #{} is not accessible", sym.0),
            ResolveError::StaticViolation { sym } => write!(f, "symbol #{} referenced from a static context", sym.0),
            ResolveError::Ambiguous { syms } => write!(f, "ambiguous reference ({} candidates)", syms.len()),
            ResolveError::Completion(cf) => write!(f, "{}", cf),
            ResolveError::NotEnclosing { class } => write!(f, "class #{} is not enclosing", class.0),
            ResolveError::NoEnclosingInstance { member } => {
                write!(f, "no enclosing instance for symbol #{}", member.0)
            }
        }
    }
}

pub type Lookup = Result<SymbolId, ResolveError>;

/// The more informative of two outcomes; a success beats any failure and
/// ties keep `a`.
fn pick_better(a: Lookup, b: Lookup) -> Lookup {
    match (&a, &b) {
        (Ok(_), _) => a,
        (Err(_), Ok(_)) => b,
        (Err(ea), Err(eb)) if eb.better_than(ea) => b,
        _ => a,
    }
}

// ── Method search state ────────────────────────────────────────────────

/// The applicable candidate(s) found so far: a single most specific
/// method or an unresolved ambiguity between two picks.
#[derive(Clone, Debug, PartialEq)]
enum Pick {
    One(SymbolId),
    Ambiguous(Box<Pick>, Box<Pick>),
}

impl Pick {
    fn leaves(&self, out: &mut Vec<SymbolId>) {
        match self {
            Pick::One(s) => {
                if !out.contains(s) {
                    out.push(*s)
                }
            }
            Pick::Ambiguous(a, b) => {
                a.leaves(out);
                b.leaves(out);
            }
        }
    }

    /// The innermost ambiguous pair first, then the remaining leaves.
    fn ambiguous_syms(&self) -> Vec<SymbolId> {
        let mut pair = self;
        while let Pick::Ambiguous(a, b) = pair {
            match (a.as_ref(), b.as_ref()) {
                (inner @ Pick::Ambiguous(..), _) | (_, inner @ Pick::Ambiguous(..)) => pair = inner,
                _ => break,
            }
        }
        let mut out = Vec::new();
        pair.leaves(&mut out);
        self.leaves(&mut out);
        out
    }
}

#[derive(Clone, Debug)]
enum Best {
    Absent,
    Wrong(SymbolId, String),
    WrongMany(Vec<(SymbolId, String)>),
    Inaccessible(SymbolId),
    Found(Pick),
}

const ARG_LENGTH_MISMATCH: &str = "actual and formal argument lists differ in length";

// ── Resolver ───────────────────────────────────────────────────────────

pub struct Resolver<'a> {
    pub syms: &'a mut Symtab,
    opts: &'a CompileOptions,
}

impl<'a> Resolver<'a> {
    pub fn new(syms: &'a mut Symtab, opts: &'a CompileOptions) -> Self {
        Resolver { syms, opts }
    }

    fn complete(&mut self, class: SymbolId) -> Result<(), ResolveError> {
        self.syms.complete(class).map_err(ResolveError::Completion)
    }

    // ── Accessibility ──────────────────────────────────────────────────

    /// Whether class `c` may be named from `ctx`.
    pub fn is_class_accessible(&self, ctx: &AccessCtx, c: SymbolId) -> bool {
        if ctx.privileged || self.syms.kind(c) != SymKind::Class {
            return true;
        }
        let syms = &*self.syms;
        let flags = syms.flags(c);
        if flags.contains(Flags::PUBLIC) {
            true
        } else if flags.contains(Flags::PRIVATE) {
            let owner_outer = syms.owner(c).and_then(|o| syms.outermost_class(o));
            ctx.class.is_some_and(|e| syms.outermost_class(e) == owner_outer)
        } else if flags.contains(Flags::PROTECTED) {
            syms.package_of(c) == ctx.package
                || match (ctx.class, syms.owner(c)) {
                    (Some(cur), Some(owner)) => self.is_inner_subclass(cur, owner),
                    _ => false,
                }
        } else {
            syms.package_of(c) == ctx.package || ctx.anon_ctor
        }
    }

    /// Whether `c` or a class enclosing it is a subclass of `base`.
    fn is_inner_subclass(&self, c: SymbolId, base: SymbolId) -> bool {
        let mut cur = Some(c);
        while let Some(cc) = cur {
            if self.syms.is_class(base) && self.syms.is_subclass(cc, base) {
                return true;
            }
            cur = self.syms.owner(cc).and_then(|o| self.syms.enclosing_class(o));
        }
        false
    }

    fn is_type_accessible(&self, ctx: &AccessCtx, site: &Type) -> bool {
        match site {
            Type::Array(elem) => self.is_type_accessible(ctx, elem),
            Type::Class(ct) => self.is_class_accessible(ctx, ct.sym),
            _ => true,
        }
    }

    /// Whether `sym`, a member of `site`, may be used from `ctx`.
    pub fn is_accessible(&self, ctx: &AccessCtx, site: &Type, sym: SymbolId) -> bool {
        if ctx.privileged {
            return true;
        }
        let syms = &*self.syms;
        let Some(owner) = syms.owner(sym) else { return true };
        let Some(site_class) = syms.site_class(site).or_else(|| syms.owner_class(sym)) else { return true };
        if syms.is_constructor(sym) && owner != site_class {
            return false;
        }
        let flags = syms.flags(sym);
        let same_package = syms.package_of(sym) == ctx.package;
        if flags.contains(Flags::PRIVATE) {
            let owner_outer = syms.outermost_class(owner);
            let visible = ctx.class.is_some_and(|c| c == owner || syms.outermost_class(c) == owner_outer);
            visible && syms.is_inherited_in(sym, site_class)
        } else if flags.contains(Flags::PROTECTED) {
            (same_package
                || self.is_protected_accessible(ctx, sym, site_class)
                || (ctx.select_super && !flags.contains(Flags::STATIC) && syms.kind(sym) != SymKind::Class))
                && self.is_type_accessible(ctx, site)
                && self.not_overridden_in(site, sym)
        } else if flags.contains(Flags::PUBLIC) {
            self.is_type_accessible(ctx, site) && self.not_overridden_in(site, sym)
        } else {
            same_package
                && self.is_type_accessible(ctx, site)
                && syms.is_inherited_in(sym, site_class)
                && self.not_overridden_in(site, sym)
        }
    }

    /// Protected access from a subclass: instance members only through a
    /// site that is the accessing class or one of its subclasses.
    fn is_protected_accessible(&self, ctx: &AccessCtx, sym: SymbolId, site_class: SymbolId) -> bool {
        let syms = &*self.syms;
        let Some(owner) = syms.owner_class(sym) else { return false };
        let mut cur = ctx.class;
        while let Some(c) = cur {
            if syms.is_subclass(c, owner)
                && !syms.is_interface(c)
                && (syms.is_static(sym) || syms.kind(sym) == SymKind::Class || syms.is_subclass(site_class, c))
            {
                return true;
            }
            cur = syms.owner(c).and_then(|o| syms.enclosing_class(o));
        }
        false
    }

    /// A method is hidden from a site that overrides it with a
    /// subsignature.
    fn not_overridden_in(&self, site: &Type, sym: SymbolId) -> bool {
        let syms = &*self.syms;
        if syms.kind(sym) != SymKind::Method || syms.is_constructor(sym) || syms.is_static(sym) {
            return true;
        }
        let Some(site_class) = syms.site_class(site) else { return true };
        match syms.implementation(sym, site_class) {
            None => true,
            Some(s2) if s2 == sym || syms.owner(s2) == syms.owner(sym) => true,
            Some(s2) => !syms.is_sub_signature(&syms.member_type(site, s2), &syms.member_type(site, sym)),
        }
    }

    // ── Fields and member types ────────────────────────────────────────

    /// Field or member-type lookup in `c` and its supertypes. A hit in an
    /// interface that differs from an earlier hit is ambiguous.
    fn find_inherited(
        &mut self,
        ctx: &AccessCtx,
        site: &Type,
        c: SymbolId,
        name: &str,
        want: SymKind,
        not_found: &ResolveError,
    ) -> Lookup {
        self.complete(c)?;
        let own = self.syms.members(c).lookup(name).find(|s| {
            self.syms.kind(*s) == want && !(want == SymKind::Var && self.syms.flags(*s).contains(Flags::SYNTHETIC))
        });
        if let Some(sym) = own {
            return if self.is_accessible(ctx, site, sym) {
                Ok(sym)
            } else {
                Err(ResolveError::Inaccessible { sym, site: Some(site.clone()) })
            };
        }
        let mut best: Lookup = Err(not_found.clone());
        if let Some(sup) = self.syms.superclass_sym(c) {
            let r = self.find_inherited(ctx, site, sup, name, want, not_found);
            best = pick_better(best, r);
        }
        let interfaces: Vec<SymbolId> = match self.syms.sym(c).class_info() {
            Some(info) => info.interfaces.iter().filter_map(Type::class_sym).collect(),
            None => Vec::new(),
        };
        for i in interfaces {
            if matches!(best, Err(ResolveError::Ambiguous { .. })) {
                break;
            }
            let r = self.find_inherited(ctx, site, i, name, want, not_found);
            best = match (best, r) {
                (Ok(a), Ok(b)) if self.syms.owner(a) != self.syms.owner(b) => {
                    Err(ResolveError::Ambiguous { syms: vec![a, b] })
                }
                (best, r) => pick_better(best, r),
            };
        }
        best
    }

    /// A field of `site`.
    pub fn find_field(&mut self, ctx: &AccessCtx, site: &Type, name: &str) -> Lookup {
        let not_found = ResolveError::not_found(KindSel::VAR, name).at(site);
        let Some(c) = self.syms.site_class(site) else { return Err(not_found) };
        self.find_inherited(ctx, site, c, name, SymKind::Var, &not_found)
    }

    /// A member class of `site`.
    pub fn find_member_type(&mut self, ctx: &AccessCtx, site: &Type, name: &str) -> Lookup {
        let not_found = ResolveError::not_found(KindSel::TYP, name).at(site);
        let Some(c) = self.syms.site_class(site) else { return Err(not_found) };
        self.find_inherited(ctx, site, c, name, SymKind::Class, &not_found)
    }

    /// An unqualified variable: locals and fields of each enclosing class
    /// from the innermost outward, then static imports.
    pub fn find_var(&mut self, env: &Env, name: &str) -> Lookup {
        let mut best: Lookup = Err(ResolveError::not_found(KindSel::VAR, name));
        let mut static_only = false;
        let mut cur = Some(env.clone());
        while let Some(e) = cur {
            if e.is_toplevel() {
                break;
            }
            if e.is_static() {
                static_only = true;
            }
            let local = e
                .local_frames()
                .find_map(|f| f.scope().lookup(name).find(|s| self.syms.kind(*s) == SymKind::Var));
            let found = match (local, e.enclosing_class()) {
                (Some(sym), _) => Ok(sym),
                (None, Some(c)) => {
                    let site = self.syms.ty(c).clone();
                    let ctx = AccessCtx::of(&e, self.syms);
                    self.find_field(&ctx, &site, name)
                }
                (None, None) => Err(ResolveError::not_found(KindSel::VAR, name)),
            };
            match found {
                Ok(sym) => {
                    let member = self.syms.owner(sym).is_some_and(|o| self.syms.is_class(o));
                    if static_only && member && !self.syms.is_static(sym) {
                        return Err(ResolveError::StaticViolation { sym });
                    }
                    return Ok(sym);
                }
                Err(err) => best = pick_better(best, Err(err)),
            }
            if e.enclosing_class().is_some_and(|c| self.syms.is_static(c)) {
                static_only = true;
            }
            cur = e.outer().cloned();
        }
        let ctx = AccessCtx::of(env, self.syms);
        for class in self.static_import_classes(env, name) {
            let site = self.syms.ty(class).clone();
            if let Ok(sym) = self.find_field(&ctx, &site, name) {
                if self.syms.is_static(sym) {
                    return Ok(sym);
                }
            }
        }
        if let (Err(e), Some(c)) = (&best, env.enclosing_class()) {
            return Err(e.clone().at(&self.syms.ty(c).clone()));
        }
        best
    }

    /// Classes whose static members named `name` are imported.
    fn static_import_classes(&self, env: &Env, name: &str) -> Vec<SymbolId> {
        let top = env.toplevel_info();
        let mut out: Vec<SymbolId> =
            top.static_named_imports.iter().filter(|(_, n)| n == name).map(|(c, _)| *c).collect();
        out.extend(top.static_star_imports.iter().copied());
        out
    }

    /// An unqualified type name: type parameters and local classes, member
    /// classes of each enclosing class, then single-type imports, the
    /// current package, and on-demand imports.
    pub fn find_type(&mut self, env: &Env, name: &str) -> Lookup {
        let mut best: Lookup = Err(ResolveError::not_found(KindSel::TYP, name));
        let mut static_only = false;
        let mut cur = Some(env.clone());
        while let Some(e) = cur {
            if e.is_toplevel() {
                break;
            }
            if e.is_static() {
                static_only = true;
            }
            let local = e.local_frames().find_map(|f| {
                f.scope()
                    .lookup(name)
                    .find(|s| matches!(self.syms.kind(*s), SymKind::Class | SymKind::TypeVar))
            });
            if let Some(sym) = local {
                let class_tvar = self.syms.kind(sym) == SymKind::TypeVar
                    && self.syms.owner(sym).is_some_and(|o| self.syms.is_class(o));
                if static_only && class_tvar {
                    return Err(ResolveError::StaticViolation { sym });
                }
                return Ok(sym);
            }
            if let Some(c) = e.enclosing_class() {
                let site = self.syms.ty(c).clone();
                let ctx = AccessCtx::of(&e, self.syms);
                match self.find_member_type(&ctx, &site, name) {
                    Ok(sym) => return Ok(sym),
                    Err(err) => best = pick_better(best, Err(err)),
                }
                if self.syms.is_static(c) {
                    static_only = true;
                }
            }
            cur = e.outer().cloned();
        }
        let ctx = AccessCtx::of(env, self.syms);
        let top = env.toplevel_rc();
        let named: Vec<SymbolId> = top.named_imports.lookup(name).collect();
        let r = self.find_global_type(&ctx, &named);
        if r.is_ok() {
            return r;
        }
        best = pick_better(best, r);
        let in_package: Vec<SymbolId> = match self.syms.package_members(top.package) {
            Some(scope) => scope.lookup(name).collect(),
            None => Vec::new(),
        };
        let r = self.find_global_type(&ctx, &in_package);
        if r.is_ok() {
            return r;
        }
        best = pick_better(best, r);
        let r = self.find_star_imported(&ctx, &top.star_imports, name);
        if r.is_ok() {
            return r;
        }
        pick_better(best, r)
    }

    fn find_global_type(&mut self, ctx: &AccessCtx, candidates: &[SymbolId]) -> Lookup {
        for &sym in candidates {
            if self.syms.kind(sym) == SymKind::Class {
                return if self.is_class_accessible(ctx, sym) {
                    Ok(sym)
                } else {
                    Err(ResolveError::Inaccessible { sym, site: None })
                };
            }
        }
        Err(ResolveError::not_found(KindSel::TYP, ""))
    }

    /// On-demand imports; two different classes of the same name are
    /// ambiguous.
    fn find_star_imported(&mut self, ctx: &AccessCtx, imports: &[SymbolId], name: &str) -> Lookup {
        let mut best: Lookup = Err(ResolveError::not_found(KindSel::TYP, name));
        for &imported in imports {
            let r = match self.syms.kind(imported) {
                SymKind::Package => {
                    let found: Vec<SymbolId> = match self.syms.package_members(imported) {
                        Some(scope) => scope.lookup(name).collect(),
                        None => Vec::new(),
                    };
                    self.find_global_type(ctx, &found)
                }
                SymKind::Class => {
                    let site = self.syms.ty(imported).clone();
                    self.find_member_type(ctx, &site, name)
                }
                _ => continue,
            };
            best = match (best, r) {
                (Ok(a), Ok(b)) if a != b => return Err(ResolveError::Ambiguous { syms: vec![a, b] }),
                (best, r) => pick_better(best, r),
            };
        }
        best
    }

    /// An unqualified name of one of the kinds in `kind`.
    pub fn find_ident(&mut self, env: &Env, name: &str, kind: KindSel) -> Lookup {
        let mut best: Lookup = Err(ResolveError::not_found(kind, name));
        if kind.intersects(KindSel::VAL) {
            let r = self.find_var(env, name);
            if r.is_ok() {
                return r;
            }
            best = r;
        }
        if kind.contains(KindSel::TYP) {
            let r = self.find_type(env, name);
            if r.is_ok() {
                return r;
            }
            best = pick_better(best, r);
        }
        if kind.contains(KindSel::PCK) {
            return Ok(self.syms.enter_package(name));
        }
        best
    }

    /// A class or subpackage of `pkg`.
    pub fn find_ident_in_package(&mut self, ctx: &AccessCtx, pkg: SymbolId, name: &str, kind: KindSel) -> Lookup {
        if kind.contains(KindSel::TYP) {
            let found = self
                .syms
                .package_members(pkg)
                .and_then(|s| s.lookup(name).find(|m| self.syms.kind(*m) == SymKind::Class));
            if let Some(class) = found {
                self.complete(class)?;
                return if self.is_class_accessible(ctx, class) {
                    Ok(class)
                } else {
                    Err(ResolveError::Inaccessible { sym: class, site: None })
                };
            }
        }
        if kind.contains(KindSel::PCK) {
            let prefix = self.syms.package_fullname(pkg).to_string();
            let full = if prefix.is_empty() { name.to_string() } else { format!("{}.{}", prefix, name) };
            return Ok(self.syms.enter_package(&full));
        }
        Err(ResolveError::not_found(KindSel::TYP, name).at(&Type::Package(pkg)))
    }

    /// A field or member class of `site`.
    pub fn find_ident_in_type(&mut self, ctx: &AccessCtx, site: &Type, name: &str, kind: KindSel) -> Lookup {
        let mut best: Lookup = Err(ResolveError::not_found(kind, name).at(site));
        if kind.intersects(KindSel::VAL) {
            let r = self.find_field(ctx, site, name);
            if r.is_ok() {
                return r;
            }
            best = r;
        }
        if kind.contains(KindSel::TYP) {
            let r = self.find_member_type(ctx, site, name);
            if r.is_ok() {
                return r;
            }
            best = pick_better(best, r);
        }
        best
    }

    // ── Applicability ──────────────────────────────────────────────────

    /// The type of `sym` as a member of `site`, instantiated for a call with
    /// `argtypes` under the rules of `phase`.
    pub fn instantiate(
        &mut self,
        site: &Type,
        sym: SymbolId,
        argtypes: &[Type],
        typeargs: &[Type],
        phase: MethodPhase,
    ) -> Result<MethodType, String> {
        let mt = self.syms.member_type(site, sym);
        let varargs = phase.is_varargs() && self.syms.flags(sym).contains(Flags::VARARGS);
        self.instantiate_type(&mt, argtypes, typeargs, phase.allows_boxing(), varargs, true)
    }

    fn instantiate_type(
        &mut self,
        mt: &Type,
        argtypes: &[Type],
        typeargs: &[Type],
        boxing: bool,
        varargs: bool,
        unchecked: bool,
    ) -> Result<MethodType, String> {
        let inst = match mt {
            Type::ForAll(fa) if !typeargs.is_empty() => {
                if typeargs.len() != fa.tvars.len() {
                    return Err(format!("wrong number of type arguments; required {}", fa.tvars.len()));
                }
                for (tv, ta) in fa.tvars.iter().zip(typeargs) {
                    let bound = self.syms.subst(&self.syms.bound(*tv), &fa.tvars, typeargs);
                    if !self.syms.is_subtype_unchecked(ta, &bound) {
                        return Err(format!(
                            "explicit type argument {} does not conform to declared bound(s) {}",
                            self.syms.display(ta),
                            self.syms.display(&bound)
                        ));
                    }
                }
                match self.syms.subst(&Type::Method(fa.mt.clone()), &fa.tvars, typeargs) {
                    Type::Method(m) => m,
                    _ => fa.mt.clone(),
                }
            }
            Type::ForAll(fa) => infer::infer_method(self.syms, fa, argtypes, boxing, varargs, None)?,
            Type::Method(m) => m.clone(),
            _ => return Err("not a method".to_string()),
        };
        self.check_args(&inst.params, argtypes, boxing, varargs, unchecked)?;
        Ok(inst)
    }

    fn convertible(&self, t: &Type, s: &Type, boxing: bool, unchecked: bool) -> bool {
        if unchecked || t.is_prim() != s.is_prim() {
            self.syms.is_convertible(t, s, boxing)
        } else {
            self.syms.is_subtype(t, s)
        }
    }

    fn check_args(&self, formals: &[Type], actuals: &[Type], boxing: bool, varargs: bool, unchecked: bool) -> Result<(), String> {
        let fixed = if varargs { formals.len().saturating_sub(1) } else { formals.len() };
        if (varargs && actuals.len() < fixed) || (!varargs && actuals.len() != formals.len()) {
            return Err(ARG_LENGTH_MISMATCH.to_string());
        }
        for (a, f) in actuals.iter().zip(&formals[..fixed]) {
            if !self.convertible(a, f, boxing, unchecked) {
                return Err(format!(
                    "actual argument {} cannot be converted to {} by method invocation conversion",
                    self.syms.display(a),
                    self.syms.display(f)
                ));
            }
        }
        if varargs {
            let elem = formals.last().and_then(Type::elem_type).cloned().unwrap_or(Type::Error);
            for a in &actuals[fixed..] {
                if !self.convertible(a, &elem, boxing, unchecked) {
                    return Err(format!(
                        "argument type {} does not conform to vararg element type {}",
                        self.syms.display(a),
                        self.syms.display(&elem)
                    ));
                }
            }
        }
        Ok(())
    }

    // ── Most specific ──────────────────────────────────────────────────

    /// Parameter types of `to` as a member of `site`. When both methods
    /// are variable-arity in the variable-arity phase, the trailing array
    /// is replaced by enough element slots to match the longer list.
    fn adjusted_params(&self, site: &Type, to: SymbolId, from: SymbolId, use_varargs: bool) -> (Type, Vec<Type>) {
        let mt = self.syms.member_type(site, to);
        let params = mt.params().to_vec();
        let both = self.syms.flags(to).contains(Flags::VARARGS) && self.syms.flags(from).contains(Flags::VARARGS);
        if !(use_varargs && both) || params.is_empty() {
            return (mt, params);
        }
        let width = params.len().max(self.syms.ty(from).params().len());
        let elem = params.last().and_then(Type::elem_type).cloned().unwrap_or(Type::Error);
        let mut out: Vec<Type> = params[..params.len() - 1].to_vec();
        while out.len() < width {
            out.push(elem.clone());
        }
        (mt, out)
    }

    /// Whether `m1`'s signature is at least as specific as `m2`'s: `m2`
    /// accepts `m1`'s parameter types without unchecked conversion.
    fn signature_more_specific(&mut self, site: &Type, m1: SymbolId, m2: SymbolId, boxing: bool, use_varargs: bool) -> bool {
        let (_, p1) = self.adjusted_params(site, m1, m2, use_varargs);
        let (mut mt2, p2) = self.adjusted_params(site, m2, m1, use_varargs);
        if let Some(mt) = mt2.as_method_mut() {
            mt.params = p2;
        }
        let args: Vec<Type> = p1.iter().map(|t| self.syms.lower_bound(t)).collect();
        self.instantiate_type(&mt2, &args, &[], boxing, false, false).is_ok()
    }

    fn ambiguity(&self, a: Pick, b: Pick) -> Pick {
        let clash = |p: &Pick| matches!(p, Pick::One(s) if self.syms.flags(*s).contains(Flags::CLASH));
        match (clash(&a), clash(&b)) {
            (true, false) => b,
            (false, true) | (true, true) => a,
            _ => Pick::Ambiguous(Box::new(a), Box::new(b)),
        }
    }

    fn most_specific(&mut self, m1: SymbolId, m2: Pick, site: &Type, boxing: bool, use_varargs: bool) -> Pick {
        match m2 {
            Pick::One(m2) => self.most_specific_one(m1, m2, site, boxing, use_varargs),
            Pick::Ambiguous(a, b) => {
                let err1 = self.most_specific(m1, (*a).clone(), site, boxing, use_varargs);
                let err2 = self.most_specific(m1, (*b).clone(), site, boxing, use_varargs);
                if err1 == err2 {
                    return err1;
                }
                if err1 == *a && err2 == *b {
                    return Pick::Ambiguous(a, b);
                }
                let same_head = matches!((&err1, &err2), (Pick::Ambiguous(x1, _), Pick::Ambiguous(x2, _)) if x1 == x2);
                if same_head {
                    self.ambiguity(Pick::One(m1), Pick::Ambiguous(a, b))
                } else {
                    self.ambiguity(err1, err2)
                }
            }
        }
    }

    fn most_specific_one(&mut self, m1: SymbolId, m2: SymbolId, site: &Type, boxing: bool, use_varargs: bool) -> Pick {
        if m1 == m2 {
            return Pick::One(m1);
        }
        let m1_more = self.signature_more_specific(site, m1, m2, boxing, use_varargs);
        let m2_more = self.signature_more_specific(site, m2, m1, boxing, use_varargs);
        if m1_more && m2_more {
            return self.merge_equivalent(m1, m2, site);
        }
        if m1_more {
            Pick::One(m1)
        } else if m2_more {
            Pick::One(m2)
        } else {
            self.ambiguity(Pick::One(m1), Pick::One(m2))
        }
    }

    /// Both signatures are equally specific: prefer the non-bridge, the
    /// overrider, or the concrete method; merge two abstract methods with
    /// equal erasures into a hypothetical method.
    fn merge_equivalent(&mut self, m1: SymbolId, m2: SymbolId, site: &Type) -> Pick {
        let syms = &*self.syms;
        let mt1 = syms.member_type(site, m1);
        let mt2 = syms.member_type(site, m2);
        if !syms.override_equivalent(&mt1, &mt2) {
            return self.ambiguity(Pick::One(m1), Pick::One(m2));
        }
        let (b1, b2) = (syms.flags(m1).contains(Flags::BRIDGE), syms.flags(m2).contains(Flags::BRIDGE));
        if b1 != b2 {
            return Pick::One(if b1 { m2 } else { m1 });
        }
        let (Some(o1), Some(o2)) = (syms.owner_class(m1), syms.owner_class(m2)) else {
            return self.ambiguity(Pick::One(m1), Pick::One(m2));
        };
        let overrider = |m: SymbolId, mo: SymbolId, other: SymbolId, oo: SymbolId| {
            syms.as_super(syms.ty(mo), oo).is_some()
                && (!syms.is_interface(mo) || syms.is_interface(oo))
                && syms.overrides(m, other, mo, false)
        };
        if overrider(m1, o1, m2, o2) {
            return Pick::One(m1);
        }
        if overrider(m2, o2, m1, o1) {
            return Pick::One(m2);
        }
        let a1 = syms.flags(m1).contains(Flags::ABSTRACT);
        let a2 = syms.flags(m2).contains(Flags::ABSTRACT);
        if a1 && !a2 {
            return Pick::One(m2);
        }
        if a2 && !a1 {
            return Pick::One(m1);
        }
        if !a1 && !a2 {
            return self.ambiguity(Pick::One(m1), Pick::One(m2));
        }
        let e1 = syms.erased_sym_type(m1);
        let e2 = syms.erased_sym_type(m2);
        let same_erasure = e1.params().len() == e2.params().len()
            && e1.params().iter().zip(e2.params()).all(|(a, b)| syms.is_same_type(a, b));
        if !same_erasure {
            return self.ambiguity(Pick::One(m1), Pick::One(m2));
        }
        let Some(first) = self.most_specific_return(&mt1, &mt2) else {
            return self.ambiguity(Pick::One(m1), Pick::One(m2));
        };
        let chosen = if first { m1 } else { m2 };
        let thrown = self.intersect_thrown(mt1.thrown(), mt2.thrown());
        Pick::One(self.hypothetical(chosen, thrown))
    }

    fn most_specific_return(&self, mt1: &Type, mt2: &Type) -> Option<bool> {
        let syms = &*self.syms;
        let mut r1 = mt1.ret();
        let r2 = mt2.ret();
        if let (Type::ForAll(f1), Type::ForAll(f2)) = (mt1, mt2) {
            let to: Vec<Type> = f2.tvars.iter().map(|t| Type::TypeVar(*t)).collect();
            r1 = syms.subst(&r1, &f1.tvars, &to);
        }
        if syms.is_subtype(&r1, &r2) {
            Some(true)
        } else if syms.is_subtype(&r2, &r1) {
            Some(false)
        } else if syms.return_type_substitutable(&r1, &r2, self.opts.covariant_returns) {
            Some(true)
        } else if syms.return_type_substitutable(&r2, &r1, self.opts.covariant_returns) {
            Some(false)
        } else {
            None
        }
    }

    /// Exceptions thrown by both signatures.
    fn intersect_thrown(&self, ts1: &[Type], ts2: &[Type]) -> Vec<Type> {
        let syms = &*self.syms;
        let subset = |t: &Type, ts: &[Type]| ts.iter().any(|s| syms.is_subtype(t, s));
        let mut out: Vec<Type> = Vec::new();
        let incl = |t: &Type, out: &mut Vec<Type>| {
            if !subset(t, out.as_slice()) {
                out.retain(|s| !syms.is_subtype(s, t));
                out.push(t.clone());
            }
        };
        for t in ts1.iter().filter(|t| subset(t, ts2)) {
            incl(t, &mut out);
        }
        for t in ts2.iter().filter(|t| subset(t, ts1)) {
            incl(t, &mut out);
        }
        out
    }

    /// A method symbol that stands for two merged abstract methods. It is
    /// never entered into a scope.
    fn hypothetical(&mut self, chosen: SymbolId, thrown: Vec<Type>) -> SymbolId {
        let base = self.syms.sym(chosen).clone();
        let mut ty = base.ty.clone();
        if let Some(mt) = ty.as_method_mut() {
            mt.thrown = thrown;
        }
        let params = base.method_params().to_vec();
        self.syms.add_symbol(Symbol {
            name: base.name,
            kind: SymKind::Method,
            flags: base.flags | Flags::HYPOTHETICAL,
            owner: base.owner,
            ty,
            data: SymData::Method(cinder_symtab::symbol::MethodInfo { params }),
        })
    }

    // ── Method lookup ──────────────────────────────────────────────────

    fn select_best(
        &mut self,
        ctx: &AccessCtx,
        site: &Type,
        argtypes: &[Type],
        typeargs: &[Type],
        sym: SymbolId,
        best: Best,
        phase: MethodPhase,
        operator: bool,
    ) -> Best {
        let site_class = match site {
            Type::Class(_) | Type::Array(_) => self.syms.site_class(site),
            _ => None,
        };
        if site_class.is_some_and(|c| !self.syms.is_inherited_in(sym, c)) {
            return best;
        }
        if let Err(reason) = self.instantiate(site, sym, argtypes, typeargs, phase) {
            trace!(candidate = %self.syms.display_sym(sym), %reason, "inapplicable");
            return match best {
                Best::Absent => Best::Wrong(sym, reason),
                Best::Wrong(s0, r0) if !operator => Best::WrongMany(vec![(s0, r0), (sym, reason)]),
                Best::WrongMany(mut all) => {
                    all.push((sym, reason));
                    Best::WrongMany(all)
                }
                other => other,
            };
        }
        if !self.is_accessible(ctx, site, sym) {
            return match best {
                Best::Absent => Best::Inaccessible(sym),
                other => other,
            };
        }
        match best {
            Best::Found(pick) => {
                let boxing = phase.allows_boxing() && operator;
                Best::Found(self.most_specific(sym, pick, site, boxing, phase.is_varargs()))
            }
            _ => Best::Found(Pick::One(sym)),
        }
    }

    /// The classes searched for members of `site`: the site's class, or
    /// every component of an intersection bound.
    fn search_roots(&self, site: &Type) -> Vec<Type> {
        let bound = match site {
            Type::TypeVar(_) | Type::Wildcard(_) => {
                let mut cur = self.syms.upper_bound(site);
                let mut steps = 0;
                while let Type::TypeVar(tv) = cur {
                    cur = self.syms.bound(tv);
                    steps += 1;
                    if steps > 64 {
                        break;
                    }
                }
                cur
            }
            other => other.clone(),
        };
        match bound {
            Type::Intersection(parts) => parts
                .iter()
                .filter_map(|p| self.syms.site_class(p).map(|c| self.syms.ty(c).clone()))
                .collect(),
            other => self.syms.site_class(&other).map(|c| vec![self.syms.ty(c).clone()]).unwrap_or_default(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn find_method_in(
        &mut self,
        ctx: &AccessCtx,
        site: &Type,
        name: &str,
        argtypes: &[Type],
        typeargs: &[Type],
        start: &Type,
        mut abstract_ok: bool,
        mut best: Best,
        phase: MethodPhase,
        operator: bool,
        seen: &mut FxHashSet<SymbolId>,
    ) -> Result<Best, ResolveError> {
        let mut ct = Some(start.clone());
        while let Some(t) = ct {
            let t = match t {
                Type::TypeVar(_) => self.syms.upper_bound_class(&t),
                other => other,
            };
            let Some(c) = self.syms.site_class(&t) else { break };
            if !seen.insert(c) {
                return Ok(best);
            }
            self.complete(c)?;
            if !self.syms.flags(c).intersects(Flags::ABSTRACT | Flags::INTERFACE | Flags::ENUM) {
                abstract_ok = false;
            }
            let candidates: Vec<SymbolId> = self
                .syms
                .members(c)
                .lookup(name)
                .filter(|m| self.syms.kind(*m) == SymKind::Method && !self.syms.flags(*m).contains(Flags::SYNTHETIC))
                .collect();
            for m in candidates {
                best = self.select_best(ctx, site, argtypes, typeargs, m, best, phase, operator);
            }
            if name == names::INIT {
                break;
            }
            if abstract_ok {
                let concrete = match &best {
                    Best::Found(Pick::One(s)) if !self.syms.flags(*s).contains(Flags::ABSTRACT) => Some(*s),
                    _ => None,
                };
                for i in self.syms.interfaces(&t) {
                    best = self.find_method_in(ctx, site, name, argtypes, typeargs, &i, abstract_ok, best, phase, operator, seen)?;
                }
                if let (Some(concrete), Best::Found(Pick::One(found))) = (concrete, &best) {
                    if concrete != *found && self.syms.is_sub_signature(self.syms.ty(concrete), self.syms.ty(*found)) {
                        best = Best::Found(Pick::One(concrete));
                    }
                }
            }
            ct = self.syms.supertype(&t);
        }
        Ok(best)
    }

    /// One phase of method lookup in `site`.
    #[allow(clippy::too_many_arguments)]
    fn find_method(
        &mut self,
        ctx: &AccessCtx,
        site: &Type,
        name: &str,
        argtypes: &[Type],
        typeargs: &[Type],
        phase: MethodPhase,
        operator: bool,
    ) -> Lookup {
        let mut best = Best::Absent;
        let mut seen = FxHashSet::default();
        for root in self.search_roots(site) {
            best = self.find_method_in(ctx, site, name, argtypes, typeargs, &root, true, best, phase, operator, &mut seen)?;
        }
        match best {
            Best::Found(Pick::One(sym)) => Ok(sym),
            Best::Found(pick) => Err(ResolveError::Ambiguous { syms: pick.ambiguous_syms() }),
            Best::Absent => Err(ResolveError::NotFound {
                kind: KindSel::MTH,
                name: name.to_string(),
                site: Some(site.clone()),
                args: Some(argtypes.to_vec()),
            }),
            Best::Wrong(sym, reason) => Err(ResolveError::Inapplicable { sym, reason }),
            Best::WrongMany(candidates) => Err(ResolveError::InapplicableMany { candidates }),
            Best::Inaccessible(sym) => Err(ResolveError::Inaccessible { sym, site: Some(site.clone()) }),
        }
    }

    /// Run `step` for each enabled phase until one finds an applicable
    /// method or an ambiguity. On failure the error of the first phase
    /// that did better than "no applicable candidates" is returned, or
    /// the last phase's error.
    fn run_phases(
        &mut self,
        varargs_allowed: bool,
        mut step: impl FnMut(&mut Self, MethodPhase) -> Lookup,
    ) -> Result<(SymbolId, MethodPhase), ResolveError> {
        let mut errors: Vec<ResolveError> = Vec::new();
        let phases: Vec<MethodPhase> = MethodPhase::ALL
            .into_iter()
            .filter(|p| p.enabled(self.opts) && (varargs_allowed || !p.is_varargs()))
            .collect();
        for phase in phases {
            match step(self, phase) {
                Ok(sym) => return Ok((sym, phase)),
                Err(e @ ResolveError::Ambiguous { .. }) => return Err(e),
                Err(e) => {
                    debug!(?phase, error = %e, "no applicable method in phase");
                    errors.push(e);
                }
            }
        }
        let idx = errors.iter().position(ResolveError::is_conclusive).unwrap_or(errors.len().saturating_sub(1));
        Err(errors
            .into_iter()
            .nth(idx)
            .unwrap_or_else(|| ResolveError::not_found(KindSel::MTH, "")))
    }

    fn finish(&mut self, site: &Type, sym: SymbolId, phase: MethodPhase, argtypes: &[Type], typeargs: &[Type]) -> Result<Resolved, ResolveError> {
        match self.instantiate(site, sym, argtypes, typeargs, phase) {
            Ok(mtype) => Ok(Resolved { sym, phase, mtype }),
            Err(reason) => Err(ResolveError::Inapplicable { sym, reason }),
        }
    }

    /// An unqualified method call: members of each enclosing class from
    /// the innermost outward, then static imports.
    pub fn resolve_method(&mut self, env: &Env, name: &str, argtypes: &[Type], typeargs: &[Type]) -> Result<Resolved, ResolveError> {
        let (sym, phase) = self.run_phases(true, |r, phase| r.find_fun(env, name, argtypes, typeargs, phase))?;
        let site = self.fun_site(env, sym);
        self.finish(&site, sym, phase, argtypes, typeargs)
    }

    /// The type of the enclosing class through which an unqualified call
    /// reaches `sym`.
    pub(crate) fn fun_site(&self, env: &Env, sym: SymbolId) -> Type {
        let owner = self.syms.owner_class(sym);
        let mut cur = Some(env.clone());
        while let Some(e) = cur {
            if let (Some(c), Some(o)) = (e.enclosing_class(), owner) {
                if self.syms.is_subclass(c, o) {
                    return self.syms.ty(c).clone();
                }
            }
            cur = e.outer().cloned();
        }
        owner.map(|o| self.syms.ty(o).clone()).unwrap_or(Type::Error)
    }

    fn find_fun(&mut self, env: &Env, name: &str, argtypes: &[Type], typeargs: &[Type], phase: MethodPhase) -> Lookup {
        let mut best: Lookup = Err(ResolveError::NotFound {
            kind: KindSel::MTH,
            name: name.to_string(),
            site: env.enclosing_class().map(|c| self.syms.ty(c).clone()),
            args: Some(argtypes.to_vec()),
        });
        let mut static_only = false;
        let mut cur = Some(env.clone());
        while let Some(e) = cur {
            if e.is_toplevel() {
                break;
            }
            if e.is_static() {
                static_only = true;
            }
            if let Some(c) = e.enclosing_class() {
                let site = self.syms.ty(c).clone();
                let ctx = AccessCtx::of(&e, self.syms);
                match self.find_method(&ctx, &site, name, argtypes, typeargs, phase, false) {
                    Ok(sym) => {
                        if static_only && !self.syms.is_static(sym) {
                            return Err(ResolveError::StaticViolation { sym });
                        }
                        return Ok(sym);
                    }
                    Err(err) => best = pick_better(best, Err(err)),
                }
                if self.syms.is_static(c) {
                    static_only = true;
                }
            }
            cur = e.outer().cloned();
        }
        let ctx = AccessCtx::of(env, self.syms);
        for class in self.static_import_classes(env, name) {
            let site = self.syms.ty(class).clone();
            if let Ok(sym) = self.find_method(&ctx, &site, name, argtypes, typeargs, phase, false) {
                if self.syms.is_static(sym) {
                    return Ok(sym);
                }
            }
        }
        best
    }

    /// A method selected from `site`.
    pub fn resolve_qualified_method(
        &mut self,
        ctx: &AccessCtx,
        site: &Type,
        name: &str,
        argtypes: &[Type],
        typeargs: &[Type],
    ) -> Result<Resolved, ResolveError> {
        let (sym, phase) =
            self.run_phases(true, |r, phase| r.find_method(ctx, site, name, argtypes, typeargs, phase, false))?;
        self.finish(site, sym, phase, argtypes, typeargs)
    }

    /// A constructor of the class type `site`.
    pub fn resolve_constructor(
        &mut self,
        ctx: &AccessCtx,
        site: &Type,
        argtypes: &[Type],
        typeargs: &[Type],
    ) -> Result<Resolved, ResolveError> {
        let (sym, phase) =
            self.run_phases(true, |r, phase| r.find_method(ctx, site, names::INIT, argtypes, typeargs, phase, false))?;
        self.finish(site, sym, phase, argtypes, typeargs)
    }

    /// A predefined operator for the operand types. Operators never use
    /// variable arity.
    pub fn resolve_operator(&mut self, name: &str, argtypes: &[Type]) -> Result<Resolved, ResolveError> {
        let ops = self.syms.predef.operators;
        let site = self.syms.ty(ops).clone();
        let ctx = AccessCtx::privileged(self.syms.predef.root_package);
        let (sym, phase) = self.run_phases(false, |r, phase| r.find_method(&ctx, &site, name, argtypes, &[], phase, true))?;
        self.finish(&site, sym, phase, argtypes, &[])
    }

    // ── Self references ────────────────────────────────────────────────

    /// `C.this` or `C.super`: the `this`/`super` variable of the enclosing
    /// class `c`.
    pub fn resolve_self(&mut self, env: &Env, c: SymbolId, name: &str) -> Lookup {
        let mut static_only = false;
        let mut cur = Some(env.clone());
        while let Some(e) = cur {
            if e.is_toplevel() {
                break;
            }
            if e.is_static() {
                static_only = true;
            }
            if e.enclosing_class() == Some(c) {
                let found = e.class_frame().and_then(|f| f.scope().first(name));
                if let Some(sym) = found {
                    return if static_only { Err(ResolveError::StaticViolation { sym }) } else { Ok(sym) };
                }
            } else if e.enclosing_class().is_some_and(|ec| self.syms.is_static(ec)) {
                static_only = true;
            }
            cur = e.outer().cloned();
        }
        Err(ResolveError::NotEnclosing { class: c })
    }

    /// The `this` of the innermost enclosing class that is a subclass of
    /// `member`'s owner. `skip_current` starts the search outside the
    /// current class, for the enclosing instance of a superclass.
    pub fn resolve_self_containing(&mut self, env: &Env, member: SymbolId, skip_current: bool) -> Lookup {
        let owner = self.syms.owner(member);
        let mut static_only = false;
        let mut cur = if skip_current { env.outer().cloned() } else { Some(env.clone()) };
        while let Some(e) = cur {
            if e.is_toplevel() {
                break;
            }
            if e.is_static() {
                static_only = true;
            }
            if let (Some(c), Some(o)) = (e.enclosing_class(), owner) {
                if self.syms.is_class(o) && self.syms.is_subclass(c, o) {
                    let found = e.class_frame().and_then(|f| f.scope().first(names::THIS));
                    if let Some(sym) = found {
                        return if static_only { Err(ResolveError::StaticViolation { sym }) } else { Ok(sym) };
                    }
                }
                if self.syms.is_static(c) {
                    static_only = true;
                }
            }
            cur = e.outer().cloned();
        }
        Err(ResolveError::NoEnclosingInstance { member })
    }

    /// The enclosing instance needed to create an instance of the inner
    /// class type `t`.
    pub fn resolve_implicit_this(&mut self, env: &Env, t: &Type, is_super_call: bool) -> Lookup {
        let Some(class) = t.class_sym() else { return Err(ResolveError::not_found(KindSel::TYP, "")) };
        let local = self.syms.owner(class).is_some_and(|o| matches!(self.syms.kind(o), SymKind::Method | SymKind::Var));
        if local {
            match self.syms.outer_class(class) {
                Some(outer) => self.resolve_self(env, outer, names::THIS),
                None => Err(ResolveError::NoEnclosingInstance { member: class }),
            }
        } else {
            self.resolve_self_containing(env, class, is_super_call)
        }
    }

    // ── Internal lookups ───────────────────────────────────────────────

    fn internal_failure(&self, what: &str, name: &str, site: &Type, err: &ResolveError) -> CompileError {
        CompileError::internal(format!("cannot resolve {} `{}` in {}: {}", what, name, self.syms.display(site), err))
    }

    /// A method the compiler itself calls; access control is ignored and
    /// failure is an internal error.
    pub fn resolve_internal_method(&mut self, site: &Type, name: &str, argtypes: &[Type]) -> Result<SymbolId, CompileError> {
        let ctx = AccessCtx::privileged(self.syms.predef.root_package);
        self.resolve_qualified_method(&ctx, site, name, argtypes, &[])
            .map(|r| r.sym)
            .map_err(|e| self.internal_failure("method", name, site, &e))
    }

    pub fn resolve_internal_constructor(&mut self, site: &Type, argtypes: &[Type]) -> Result<SymbolId, CompileError> {
        let ctx = AccessCtx::privileged(self.syms.predef.root_package);
        self.resolve_constructor(&ctx, site, argtypes, &[])
            .map(|r| r.sym)
            .map_err(|e| self.internal_failure("constructor", names::INIT, site, &e))
    }

    pub fn resolve_internal_field(&mut self, site: &Type, name: &str) -> Result<SymbolId, CompileError> {
        let ctx = AccessCtx::privileged(self.syms.predef.root_package);
        self.find_field(&ctx, site, name).map_err(|e| self.internal_failure("field", name, site, &e))
    }

    // ── Reporting ──────────────────────────────────────────────────────

    /// Accept a lookup result, reporting a failure once and substituting
    /// the error symbol. Nothing is reported when the site or an argument
    /// type is already erroneous.
    pub fn access(
        &mut self,
        log: &mut Log,
        result: Lookup,
        span: Span,
        site: Option<&Type>,
        name: &str,
        argtypes: Option<&[Type]>,
    ) -> SymbolId {
        match result {
            Ok(sym) => sym,
            Err(err) => {
                self.report(log, &err, span, site, name, argtypes);
                self.syms.predef.error_sym
            }
        }
    }

    /// Like [`access`](Self::access) for method resolutions.
    pub fn access_method(
        &mut self,
        log: &mut Log,
        result: Result<Resolved, ResolveError>,
        span: Span,
        site: Option<&Type>,
        name: &str,
        argtypes: &[Type],
    ) -> Option<Resolved> {
        match result {
            Ok(r) => Some(r),
            Err(err) => {
                self.report(log, &err, span, site, name, Some(argtypes));
                None
            }
        }
    }

    fn location(&self, site: &Type) -> Option<(String, String)> {
        let syms = &*self.syms;
        match site {
            Type::Class(ct) => Some((syms.kind_name(ct.sym).to_string(), syms.display(site).to_string())),
            Type::Package(p) => Some(("package".to_string(), syms.package_fullname(*p).to_string())),
            Type::TypeVar(tv) => Some(("type variable".to_string(), syms.name(*tv).to_string())),
            Type::Array(_) => Some(("class".to_string(), syms.display(site).to_string())),
            _ => None,
        }
    }

    fn args_or_none(&self, args: &[Type]) -> String {
        if args.is_empty() {
            "no arguments".to_string()
        } else {
            self.syms.display_args(args).trim_start_matches('(').trim_end_matches(')').to_string()
        }
    }

    fn owner_location(&self, sym: SymbolId) -> (String, String) {
        match self.syms.owner(sym) {
            Some(o) => (self.syms.kind_name(o).to_string(), self.syms.fullname(o)),
            None => (String::new(), String::new()),
        }
    }

    /// Display name of a method or constructor as the user wrote it.
    fn callee_name(&self, sym: SymbolId) -> String {
        if self.syms.is_constructor(sym) {
            self.syms.owner(sym).map(|o| self.syms.name(o).to_string()).unwrap_or_default()
        } else {
            self.syms.name(sym).to_string()
        }
    }

    pub fn report(
        &self,
        log: &mut Log,
        err: &ResolveError,
        span: Span,
        site: Option<&Type>,
        name: &str,
        argtypes: Option<&[Type]>,
    ) {
        if site.is_some_and(Type::is_error) || argtypes.is_some_and(|a| a.iter().any(Type::is_error)) {
            return;
        }
        if name == names::ERROR {
            return;
        }
        let syms = &*self.syms;
        match err {
            ResolveError::NotFound { kind, name: found_name, site: err_site, args } => {
                let name = if found_name.is_empty() { name } else { found_name.as_str() };
                let (kind_name, shown) = if name == names::INIT {
                    let class = site.or(err_site.as_ref()).and_then(Type::class_sym);
                    ("constructor", class.map(|c| syms.name(c).to_string()).unwrap_or_default())
                } else {
                    (kind.absent_name(), name.to_string())
                };
                let location = site.or(err_site.as_ref());
                if let Some(Type::Package(p)) = location {
                    let empty = syms.package_members(*p).map_or(true, |m| m.is_empty());
                    if empty {
                        log.error(span, "doesnt.exist", vec![syms.package_fullname(*p).to_string()]);
                        return;
                    }
                }
                let args = args.as_deref().or(argtypes).filter(|_| kind.contains(KindSel::MTH));
                let loc = location.and_then(|l| self.location(l));
                let mut out = vec![kind_name.to_string(), shown];
                let key = match (args, loc) {
                    (Some(a), Some((lk, l))) => {
                        out.extend([self.args_or_none(a), lk, l]);
                        "cant.resolve.location.args"
                    }
                    (Some(a), None) => {
                        out.push(self.args_or_none(a));
                        "cant.resolve.args"
                    }
                    (None, Some((lk, l))) => {
                        out.extend([lk, l]);
                        "cant.resolve.location"
                    }
                    (None, None) => "cant.resolve",
                };
                log.error(span, key, out);
            }
            ResolveError::Inapplicable { sym, reason } => {
                let (ok, owner) = self.owner_location(*sym);
                log.error(
                    span,
                    "cant.apply.symbol",
                    vec![
                        syms.kind_name(*sym).to_string(),
                        self.callee_name(*sym),
                        self.args_or_none(syms.ty(*sym).params()),
                        self.args_or_none(argtypes.unwrap_or(&[])),
                        ok,
                        owner,
                        reason.clone(),
                    ],
                );
            }
            ResolveError::InapplicableMany { candidates } => {
                let first = candidates.first().map(|(s, _)| *s);
                let kind = first.map(|s| syms.kind_name(s)).unwrap_or("method");
                let shown = first.map(|s| self.callee_name(s)).unwrap_or_else(|| name.to_string());
                log.error(
                    span,
                    "cant.apply.symbols",
                    vec![kind.to_string(), shown, self.args_or_none(argtypes.unwrap_or(&[]))],
                );
                for (cand, reason) in candidates {
                    log.report(Diagnostic {
                        span,
                        severity: Severity::Note,
                        key: "inapplicable.candidate",
                        args: vec![syms.display_sym(*cand).to_string(), reason.clone()],
                        lint: None,
                    });
                }
            }
            ResolveError::Inaccessible { sym, site: err_site } => {
                let site_class = err_site.as_ref().or(site).and_then(Type::class_sym);
                if syms.is_constructor(*sym) && site_class.is_some_and(|c| syms.owner(*sym) != Some(c)) {
                    let class = site_class.map(|c| syms.name(c).to_string()).unwrap_or_default();
                    log.error(span, "cant.resolve.args", vec!["constructor".into(), class, self.args_or_none(argtypes.unwrap_or(&[]))]);
                    return;
                }
                let flags = syms.flags(*sym);
                let shown = syms.display_sym(*sym).to_string();
                let (_, location) = self.owner_location(*sym);
                if flags.contains(Flags::PUBLIC) {
                    let via = err_site.as_ref().or(site).map(|s| syms.display(s).to_string()).unwrap_or(location);
                    log.error(span, "not.def.access.class.intf.cant.access", vec![shown, via]);
                } else if flags.intersects(Flags::PRIVATE | Flags::PROTECTED) {
                    let access = (flags & (Flags::PRIVATE | Flags::PROTECTED)).to_string();
                    log.error(span, "report.access", vec![shown, access, location]);
                } else {
                    log.error(span, "not.def.public.cant.access", vec![shown, location]);
                }
            }
            ResolveError::StaticViolation { sym } => {
                log.error(
                    span,
                    "non-static.cant.be.ref",
                    vec![syms.kind_name(*sym).to_string(), syms.display_sym(*sym).to_string()],
                );
            }
            ResolveError::Ambiguous { syms: candidates } => {
                let (Some(a), Some(b)) = (candidates.first(), candidates.get(1)) else { return };
                let shown = if syms.is_constructor(*a) { self.callee_name(*a) } else { syms.name(*a).to_string() };
                let (_, la) = self.owner_location(*a);
                let (_, lb) = self.owner_location(*b);
                log.error(
                    span,
                    "ref.ambiguous",
                    vec![
                        shown,
                        syms.kind_name(*a).to_string(),
                        syms.display_sym(*a).to_string(),
                        la,
                        syms.kind_name(*b).to_string(),
                        syms.display_sym(*b).to_string(),
                        lb,
                    ],
                );
            }
            ResolveError::Completion(cf) => {
                log.error(span, "cant.access", vec![cf.class.clone(), cf.reason.clone()]);
            }
            ResolveError::NotEnclosing { class } => {
                log.error(span, "not.encl.class", vec![syms.fullname(*class)]);
            }
            ResolveError::NoEnclosingInstance { member } => {
                let class = if syms.is_class(*member) { *member } else { syms.owner(*member).unwrap_or(*member) };
                log.error(span, "encl.class.required", vec![syms.fullname(class)]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_symtab::Prim;

    fn method(syms: &mut Symtab, class: SymbolId, name: &str, flags: Flags, params: Vec<Type>) -> SymbolId {
        let m = syms.new_method(class, name, flags, Type::method(params, Type::Void), vec![]);
        syms.enter_member(class, m);
        m
    }

    fn class(syms: &mut Symtab, name: &str) -> SymbolId {
        let pkg = syms.enter_package("p");
        let c = syms.enter_class(pkg, name, Flags::PUBLIC);
        let object = syms.object_type();
        syms.set_supertypes(c, Some(object), vec![]);
        c
    }

    #[test]
    fn most_telling_failure_is_kept() {
        let syms = Symtab::new();
        let object = syms.predef.object;
        let missing = ResolveError::not_found(KindSel::MTH, "f");
        let hidden = ResolveError::Inaccessible { sym: object, site: None };
        let one = ResolveError::Inapplicable { sym: object, reason: String::new() };
        let many = ResolveError::InapplicableMany { candidates: vec![(object, String::new())] };

        assert_eq!(pick_better(Err(missing.clone()), Err(hidden.clone())), Err(hidden.clone()));
        assert_eq!(pick_better(Err(one.clone()), Err(many.clone())), Err(many.clone()));
        assert_eq!(pick_better(Err(hidden.clone()), Ok(object)), Ok(object));
        assert_eq!(pick_better(Err(one.clone()), Err(one.clone())), Err(one.clone()));
        assert!(hidden.is_conclusive());
        assert!(!many.is_conclusive() && !missing.is_conclusive());
    }

    fn ctx(syms: &Symtab, class: SymbolId) -> AccessCtx {
        AccessCtx {
            class: Some(class),
            package: syms.package_of(class),
            select_super: false,
            anon_ctor: false,
            privileged: false,
        }
    }

    #[test]
    fn exact_primitive_beats_boxing() {
        let mut syms = Symtab::new();
        let opts = CompileOptions::default();
        let c = class(&mut syms, "C");
        let f_int = method(&mut syms, c, "f", Flags::PUBLIC, vec![Type::int()]);
        let integer = syms.boxed_type(Prim::Int);
        method(&mut syms, c, "f", Flags::PUBLIC, vec![integer]);
        let site = syms.ty(c).clone();
        let ctx = ctx(&syms, c);
        let mut rs = Resolver::new(&mut syms, &opts);
        let r = rs.resolve_qualified_method(&ctx, &site, "f", &[Type::int()], &[]).unwrap();
        assert_eq!(r.sym, f_int);
        assert_eq!(r.phase, MethodPhase::Basic);
    }

    #[test]
    fn widening_is_preferred_over_boxing() {
        let mut syms = Symtab::new();
        let opts = CompileOptions::default();
        let c = class(&mut syms, "C");
        let f_long = method(&mut syms, c, "f", Flags::PUBLIC, vec![Type::Prim(Prim::Long)]);
        let integer = syms.boxed_type(Prim::Int);
        method(&mut syms, c, "f", Flags::PUBLIC, vec![integer]);
        let site = syms.ty(c).clone();
        let ctx = ctx(&syms, c);
        let mut rs = Resolver::new(&mut syms, &opts);
        let r = rs.resolve_qualified_method(&ctx, &site, "f", &[Type::int()], &[]).unwrap();
        assert_eq!(r.sym, f_long);
    }

    #[test]
    fn boxing_phase_when_nothing_else_applies() {
        let mut syms = Symtab::new();
        let opts = CompileOptions::default();
        let c = class(&mut syms, "C");
        let object = syms.object_type();
        let f_obj = method(&mut syms, c, "f", Flags::PUBLIC, vec![object]);
        let site = syms.ty(c).clone();
        let ctx = ctx(&syms, c);
        let mut rs = Resolver::new(&mut syms, &opts);
        let r = rs.resolve_qualified_method(&ctx, &site, "f", &[Type::int()], &[]).unwrap();
        assert_eq!(r.sym, f_obj);
        assert_eq!(r.phase, MethodPhase::Box);
    }

    #[test]
    fn varargs_only_in_last_phase() {
        let mut syms = Symtab::new();
        let opts = CompileOptions::default();
        let c = class(&mut syms, "C");
        let f = method(&mut syms, c, "f", Flags::PUBLIC | Flags::VARARGS, vec![Type::array(Type::int())]);
        let site = syms.ty(c).clone();
        let ctx = ctx(&syms, c);
        let mut rs = Resolver::new(&mut syms, &opts);
        let r = rs.resolve_qualified_method(&ctx, &site, "f", &[Type::int(), Type::int()], &[]).unwrap();
        assert_eq!(r.sym, f);
        assert_eq!(r.phase, MethodPhase::VarArity);
        assert_eq!(r.varargs_elem(rs.syms), Some(Type::int()));
        let r = rs.resolve_qualified_method(&ctx, &site, "f", &[Type::array(Type::int())], &[]).unwrap();
        assert_eq!(r.phase, MethodPhase::Basic);
        assert_eq!(r.varargs_elem(rs.syms), None);
    }

    #[test]
    fn crossed_overloads_are_ambiguous() {
        let mut syms = Symtab::new();
        let opts = CompileOptions::default();
        let c = class(&mut syms, "C");
        let (object, string) = (syms.object_type(), syms.string_type());
        method(&mut syms, c, "f", Flags::PUBLIC, vec![object.clone(), string.clone()]);
        method(&mut syms, c, "f", Flags::PUBLIC, vec![string.clone(), object]);
        let site = syms.ty(c).clone();
        let ctx = ctx(&syms, c);
        let mut rs = Resolver::new(&mut syms, &opts);
        let err = rs.resolve_qualified_method(&ctx, &site, "f", &[string.clone(), string], &[]).unwrap_err();
        let ResolveError::Ambiguous { syms: pair } = err else { panic!("expected ambiguity, got {:?}", err) };
        assert_eq!(pair.len(), 2);
    }

    #[test]
    fn private_member_of_another_class_is_inaccessible() {
        let mut syms = Symtab::new();
        let opts = CompileOptions::default();
        let a = class(&mut syms, "A");
        let b = class(&mut syms, "B");
        let secret = method(&mut syms, a, "secret", Flags::PRIVATE, vec![]);
        let site = syms.ty(a).clone();
        let from_b = ctx(&syms, b);
        let mut rs = Resolver::new(&mut syms, &opts);
        let err = rs.resolve_qualified_method(&from_b, &site, "secret", &[], &[]).unwrap_err();
        assert_eq!(err, ResolveError::Inaccessible { sym: secret, site: Some(site.clone()) });
        let from_a = AccessCtx { class: Some(a), ..from_b };
        assert_eq!(rs.resolve_qualified_method(&from_a, &site, "secret", &[], &[]).unwrap().sym, secret);
    }

    #[test]
    fn wrong_arguments_report_every_candidate() {
        let mut syms = Symtab::new();
        let opts = CompileOptions::default();
        let c = class(&mut syms, "C");
        method(&mut syms, c, "f", Flags::PUBLIC, vec![Type::int()]);
        method(&mut syms, c, "f", Flags::PUBLIC, vec![Type::int(), Type::int()]);
        let site = syms.ty(c).clone();
        let ctx = ctx(&syms, c);
        let string = syms.string_type();
        let mut rs = Resolver::new(&mut syms, &opts);
        let err = rs.resolve_qualified_method(&ctx, &site, "f", &[string.clone()], &[]).unwrap_err();
        let ResolveError::InapplicableMany { candidates } = &err else { panic!("got {:?}", err) };
        assert_eq!(candidates.len(), 2);
        let mut log = Log::new();
        rs.report(&mut log, &err, Span::new(0, 1), Some(&site), "f", Some(&[string]));
        assert_eq!(log.error_count(), 1);
        assert_eq!(log.errors().next().map(|d| d.key), Some("cant.apply.symbols"));
    }

    #[test]
    fn operators_pick_the_narrowest_numeric_form() {
        let mut syms = Symtab::new();
        let opts = CompileOptions::default();
        let integer = syms.boxed_type(Prim::Int);
        let mut rs = Resolver::new(&mut syms, &opts);
        let plus = rs.resolve_operator("+", &[Type::int(), integer.clone()]).unwrap();
        assert_eq!(plus.mtype.ret.as_ref(), &Type::int());
        let eq = rs.resolve_operator("==", &[integer.clone(), integer]).unwrap();
        assert!(eq.mtype.params[0].is_reference());
        let string = rs.syms.string_type();
        let cat = rs.resolve_operator("+", &[string, Type::Prim(Prim::Char)]).unwrap();
        assert_eq!(cat.mtype.params[1], Type::Prim(Prim::Char));
        assert!(rs.resolve_operator("-", &[Type::boolean()]).is_err());
    }
}
