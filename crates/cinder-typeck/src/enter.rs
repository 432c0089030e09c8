//! Entering declarations: class symbols, imports, class headers and member
//! signatures.
//!
//! Entering runs before any body is attributed. Classes are entered first
//! so that every header can name every class of the unit; headers are then
//! attributed on demand (a class's supertypes must be known before its
//! subclasses look members up through them), and finally the members of
//! every class are given symbols with complete signatures.

use std::rc::Rc;

use tracing::{debug, trace};

use cinder_ast::{make::TreeMaker, Block, ClassDecl, CompilationUnit, Expr, ExprKind, Member, MethodDecl, Stmt, StmtKind, TypeParam, VarDecl};
use cinder_common::{CompileError, Span};
use cinder_symtab::symbol::MethodInfo;
use cinder_symtab::{names, ForAll, Flags, MethodType, Scope, SymData, SymKind, SymbolId, Type};

use crate::attr::{Attr, AttrResult, PendingHeader, AttributedHeader};
use crate::env::{Env, Frame, Toplevel};

impl Attr<'_> {
    /// Enter every declaration of `unit` and return its top-level
    /// environment.
    pub(crate) fn enter_unit(&mut self, unit: &mut CompilationUnit) -> AttrResult<Env> {
        let _span = tracing::debug_span!("enter_unit", package = %unit.package).entered();
        let pkg = self.syms.enter_package(&unit.package);
        unit.package_sym = Some(pkg);

        for class in unit.classes.iter_mut() {
            self.enter_class_sym(class, pkg);
        }
        let toplevel = self.enter_imports(unit, pkg);
        let top = Env::toplevel(Rc::new(toplevel));
        for class in unit.classes.iter_mut() {
            self.register_class(class, &top, true);
        }
        for class in unit.classes.iter() {
            self.complete_headers(class)?;
        }
        self.check_deferred_bounds();
        for class in unit.classes.iter_mut() {
            self.enter_members(class, None)?;
        }
        self.fold_field_constants(unit)?;
        debug!(classes = unit.classes.len(), "entered");
        Ok(top)
    }

    // ── Class symbols ──────────────────────────────────────────────────

    /// Create the symbol of `decl` and, recursively, of its member classes.
    pub(crate) fn enter_class_sym(&mut self, decl: &mut ClassDecl, owner: SymbolId) -> SymbolId {
        let owner_is_class = self.syms.is_class(owner);
        let mut flags = decl.mods;
        if decl.is_interface() {
            flags |= Flags::ABSTRACT | Flags::INTERFACE;
        }
        if decl.is_enum() {
            flags |= Flags::ENUM;
            if !enum_constants_have_bodies(decl) {
                flags |= Flags::FINAL;
            }
        }
        if owner_is_class && (decl.is_interface() || decl.is_enum()) {
            flags |= Flags::STATIC;
        }
        if owner_is_class && self.syms.is_interface(owner) {
            flags |= Flags::PUBLIC | Flags::STATIC;
        }
        flags |= Flags::UNATTRIBUTED;

        if !decl.name.is_empty() {
            let existing = match self.syms.kind(owner) {
                SymKind::Class => self.syms.members(owner).lookup(&decl.name).find(|s| self.syms.is_class(*s)),
                SymKind::Package => self
                    .syms
                    .package_members(owner)
                    .and_then(|m| m.lookup(&decl.name).find(|s| self.syms.is_class(*s)))
                    .filter(|s| self.class_envs.contains_key(s) || self.syms.flags(*s).contains(Flags::UNATTRIBUTED)),
                _ => None,
            };
            if let Some(prev) = existing {
                if owner_is_class {
                    let args = vec![
                        self.syms.kind_name(prev).to_string(),
                        decl.name.clone(),
                        self.syms.kind_name(owner).to_string(),
                        self.syms.fullname(owner),
                    ];
                    self.error(decl.span, "already.defined", args);
                } else {
                    let args = vec![self.syms.fullname(prev)];
                    self.error(decl.span, "duplicate.class", args);
                }
            }
        }

        let c = self.syms.enter_class(owner, &decl.name, flags);
        decl.sym = Some(c);
        trace!(class = %self.syms.fullname(c), "entered class");

        let mut tvars = Vec::with_capacity(decl.type_params.len());
        for tp in decl.type_params.iter_mut() {
            if tvars.iter().any(|tv| self.syms.name(*tv) == tp.name) {
                let args = vec!["type variable".to_string(), tp.name.clone(), "class".to_string(), decl.name.clone()];
                self.error(tp.span, "already.defined", args);
            }
            let tv = self.syms.new_type_var(c, &tp.name);
            tp.sym = Some(tv);
            tvars.push(tv);
        }
        self.syms.set_class_type_params(c, tvars);

        for member in decl.members.iter_mut() {
            if let Member::Class(inner) = member {
                self.enter_class_sym(inner, c);
            }
        }
        c
    }

    /// Create the class frame of `decl` and its member classes, declared in
    /// `outer`, and queue their headers.
    pub(crate) fn register_class(&mut self, decl: &ClassDecl, outer: &Env, with_header: bool) {
        let Some(c) = decl.sym else { return };
        let env = outer.class_env(c, &decl.suppress);
        for tv in self.syms.class_type_params(c).to_vec() {
            let name = self.syms.name(tv).to_string();
            env.enter(&name, tv);
        }
        if with_header {
            let header_env = outer.dup(Frame::Block);
            for tv in self.syms.class_type_params(c) {
                header_env.enter(self.syms.name(*tv), *tv);
            }
            self.headers.insert(
                c,
                PendingHeader {
                    env: header_env,
                    type_params: decl.type_params.clone(),
                    extends: decl.extends.clone(),
                    implements: decl.implements.clone(),
                },
            );
        }
        self.class_envs.insert(c, env.clone());
        for member in decl.members.iter() {
            if let Member::Class(inner) = member {
                self.register_class(inner, &env, true);
            }
        }
    }

    // ── Imports ────────────────────────────────────────────────────────

    fn enter_imports(&mut self, unit: &CompilationUnit, pkg: SymbolId) -> Toplevel {
        let mut top = Toplevel {
            package: pkg,
            named_imports: Scope::new(),
            star_imports: vec![self.syms.predef.java_lang],
            static_star_imports: Vec::new(),
            static_named_imports: Vec::new(),
        };
        for imp in unit.imports.iter() {
            let Some((prefix, last)) = imp.name.rsplit_once('.') else {
                self.error(imp.span, "cant.resolve", vec!["class".to_string(), imp.name.clone()]);
                continue;
            };
            if imp.is_static {
                let Some(class) = self.lookup_class_path(prefix, imp.span) else {
                    self.report_missing_path(prefix, imp.span);
                    continue;
                };
                if last == names::STAR {
                    top.static_star_imports.push(class);
                } else {
                    if let Some(member) = self.syms.members(class).lookup(last).find(|s| self.syms.is_class(*s)) {
                        top.named_imports.enter(last, member);
                    }
                    top.static_named_imports.push((class, last.to_string()));
                }
            } else if last == names::STAR {
                if let Some(p) = self.syms.package(prefix) {
                    top.star_imports.push(p);
                } else if let Some(c) = self.lookup_class_path(prefix, imp.span) {
                    top.star_imports.push(c);
                } else {
                    self.error(imp.span, "doesnt.exist", vec![prefix.to_string()]);
                }
            } else if let Some(c) = self.lookup_class_path(&imp.name, imp.span) {
                top.named_imports.enter(last, c);
            } else if self.syms.package(prefix).is_some() {
                let args = vec!["class".to_string(), last.to_string(), "package".to_string(), prefix.to_string()];
                self.error(imp.span, "cant.resolve.location", args);
            } else if let Some(c) = self.lookup_class_path(prefix, imp.span) {
                let args = vec!["class".to_string(), last.to_string(), "class".to_string(), self.syms.fullname(c)];
                self.error(imp.span, "cant.resolve.location", args);
            } else {
                self.error(imp.span, "doesnt.exist", vec![prefix.to_string()]);
            }
        }
        top
    }

    fn report_missing_path(&mut self, path: &str, span: Span) {
        match path.rsplit_once('.') {
            Some((prefix, last)) if self.syms.package(prefix).is_some() => {
                let args = vec!["class".to_string(), last.to_string(), "package".to_string(), prefix.to_string()];
                self.error(span, "cant.resolve.location", args);
            }
            _ => self.error(span, "doesnt.exist", vec![path.to_string()]),
        }
    }

    /// Find the class named by a dotted path: the longest package prefix
    /// that holds the first class, then member classes.
    fn lookup_class_path(&mut self, path: &str, span: Span) -> Option<SymbolId> {
        let segments: Vec<&str> = path.split('.').collect();
        for split in (0..segments.len()).rev() {
            let pkg = if split == 0 {
                Some(self.syms.predef.root_package)
            } else {
                self.syms.package(&segments[..split].join("."))
            };
            let Some(pkg) = pkg else { continue };
            let first = self
                .syms
                .package_members(pkg)
                .and_then(|m| m.lookup(segments[split]).find(|s| self.syms.is_class(*s)));
            let Some(mut class) = first else { continue };
            let mut ok = true;
            for seg in &segments[split + 1..] {
                if let Err(cf) = self.syms.complete(class) {
                    self.error(span, "cant.access", vec![cf.class, cf.reason]);
                    return None;
                }
                match self.syms.members(class).lookup(seg).find(|s| self.syms.is_class(*s)) {
                    Some(inner) => class = inner,
                    None => {
                        ok = false;
                        break;
                    }
                }
            }
            if ok {
                if let Err(cf) = self.syms.complete(class) {
                    self.error(span, "cant.access", vec![cf.class, cf.reason]);
                }
                return Some(class);
            }
        }
        None
    }

    // ── Headers ────────────────────────────────────────────────────────

    pub(crate) fn complete_headers(&mut self, decl: &ClassDecl) -> AttrResult<()> {
        if let Some(c) = decl.sym {
            self.ensure_header(c)?;
        }
        for member in decl.members.iter() {
            if let Member::Class(inner) = member {
                self.complete_headers(inner)?;
            }
        }
        Ok(())
    }

    /// Attribute the type parameter bounds and supertypes of `c` if that
    /// has not happened yet. Returns `false` when `c` is already being
    /// completed further up, which means its inheritance is cyclic.
    pub(crate) fn ensure_header(&mut self, c: SymbolId) -> AttrResult<bool> {
        if self.syms.flags(c).contains(Flags::LOCKED) {
            return Ok(false);
        }
        let Some(h) = self.headers.remove(&c) else { return Ok(true) };
        self.syms.sym_mut(c).flags.insert(Flags::LOCKED);
        self.header_depth += 1;
        let done = self.attrib_header(c, h);
        self.header_depth -= 1;
        done?;
        trace!(class = %self.syms.fullname(c), "header complete");
        Ok(true)
    }

    fn attrib_header(&mut self, c: SymbolId, mut h: PendingHeader) -> AttrResult<()> {
        let env = h.env.clone();

        for tp in h.type_params.iter_mut() {
            let bound = self.attrib_bounds(tp, &env)?;
            if let Some(tv) = tp.sym {
                self.syms.set_bound(tv, bound);
            }
        }

        let flags = self.syms.flags(c);
        let object = self.syms.object_type();
        let mut supertype = None;
        let mut interfaces = Vec::new();
        if flags.contains(Flags::ENUM) {
            supertype = Some(Type::class_with(self.syms.predef.enum_, vec![self.syms.ty(c).clone()]));
            if let Some(ext) = &h.extends {
                self.error(ext.span, "cant.inherit.from.final", vec![self.syms.fullname(self.syms.predef.enum_)]);
            }
        } else if flags.contains(Flags::INTERFACE) {
            supertype = Some(object.clone());
        } else if let Some(ext) = h.extends.as_mut() {
            let t = self.attrib_type(ext, &env)?;
            supertype = Some(self.check_superclass(c, ext.span, t)?);
        } else if c != self.syms.predef.object {
            supertype = Some(object.clone());
        }

        for iface in h.implements.iter_mut() {
            let t = self.attrib_type(iface, &env)?;
            let Some(s) = t.class_sym() else {
                if !t.is_error() {
                    let args = vec![self.show(&t)];
                    self.error(iface.span, "intf.expected.here", args);
                }
                continue;
            };
            if !self.syms.is_interface(s) {
                self.error(iface.span, "intf.expected.here", vec![self.syms.fullname(s)]);
                continue;
            }
            if !self.ensure_header(s)? {
                self.error(iface.span, "cyclic.inheritance", vec![self.syms.fullname(c)]);
                continue;
            }
            if interfaces.iter().any(|i: &Type| i.class_sym() == Some(s)) {
                self.error(iface.span, "repeated.interface", vec![]);
                continue;
            }
            interfaces.push(t);
        }

        self.syms.set_supertypes(c, supertype, interfaces);
        let sym = self.syms.sym_mut(c);
        sym.flags.remove(Flags::LOCKED | Flags::UNATTRIBUTED);
        sym.flags.insert(Flags::ACYCLIC);
        self.enter_self_vars(c);
        self.done_headers.insert(
            c,
            AttributedHeader { type_params: h.type_params, extends: h.extends, implements: h.implements },
        );
        Ok(())
    }

    fn check_superclass(&mut self, c: SymbolId, span: Span, t: Type) -> AttrResult<Type> {
        let object = self.syms.object_type();
        let Some(s) = t.class_sym() else {
            if !t.is_error() {
                let args = vec!["class".to_string(), self.show(&t)];
                self.error(span, "type.found.req", args);
            }
            return Ok(object);
        };
        if self.syms.is_interface(s) {
            self.error(span, "no.intf.expected.here", vec![]);
            return Ok(object);
        }
        if s == self.syms.predef.enum_ || self.syms.flags(s).contains(Flags::ENUM) {
            self.error(span, "enum.types.not.extensible", vec![]);
            return Ok(object);
        }
        if self.syms.flags(s).contains(Flags::FINAL) {
            self.error(span, "cant.inherit.from.final", vec![self.syms.fullname(s)]);
            return Ok(object);
        }
        if s == c || !self.ensure_header(s)? || self.syms.is_subclass(s, c) {
            self.error(span, "cyclic.inheritance", vec![self.syms.fullname(c)]);
            return Ok(object);
        }
        Ok(t)
    }

    /// The bound of a type parameter: `Object`, a single type, or an
    /// intersection whose later components are interfaces.
    pub(crate) fn attrib_bounds(&mut self, tp: &mut TypeParam, env: &Env) -> AttrResult<Type> {
        if tp.bounds.is_empty() {
            return Ok(self.syms.object_type());
        }
        let mut out = Vec::with_capacity(tp.bounds.len());
        for (i, b) in tp.bounds.iter_mut().enumerate() {
            let t = self.attrib_type(b, env)?;
            if t.is_error() {
                continue;
            }
            if i > 0 && !t.class_sym().is_some_and(|s| self.syms.is_interface(s)) {
                let args = vec![self.show(&t)];
                self.error(b.span, "intf.expected.here", args);
                continue;
            }
            out.push(t);
        }
        Ok(match out.len() {
            0 => self.syms.object_type(),
            1 => out.remove(0),
            _ => Type::Intersection(out),
        })
    }

    /// Enter the `this` and `super` variables into the class frame of `c`.
    pub(crate) fn enter_self_vars(&mut self, c: SymbolId) {
        let Some(env) = self.class_envs.get(&c).cloned() else { return };
        let this_ty = self.syms.ty(c).clone();
        let this = self.syms.new_var(c, names::THIS, Flags::FINAL | Flags::HASINIT, this_ty);
        env.enter(names::THIS, this);
        if !self.syms.is_interface(c) {
            if let Some(sup) = self.syms.class_info(c).supertype.clone() {
                let sup_var = self.syms.new_var(c, names::SUPER, Flags::FINAL | Flags::HASINIT, sup);
                env.enter(names::SUPER, sup_var);
            }
        }
    }

    // ── Members ────────────────────────────────────────────────────────

    /// Give every field and method of `decl` a symbol with a complete
    /// signature. `anon_ctor` is the constructor signature of an anonymous
    /// class, which gets a constructor passing its arguments through.
    pub(crate) fn enter_members(&mut self, decl: &mut ClassDecl, anon_ctor: Option<(&MethodType, Flags)>) -> AttrResult<()> {
        let Some(c) = decl.sym else { return Ok(()) };
        let env = self
            .class_envs
            .get(&c)
            .cloned()
            .ok_or_else(|| CompileError::internal(format!("no environment for class `{}`", decl.name)))?;
        let is_interface = decl.is_interface();
        let is_enum = decl.is_enum();
        let mut has_ctor = false;
        for member in decl.members.iter_mut() {
            match member {
                Member::Var(v) => self.enter_field(v, c, &env, is_interface)?,
                Member::Method(m) => {
                    has_ctor |= m.is_constructor();
                    self.enter_method(m, c, &env, is_interface, is_enum)?;
                }
                Member::Class(_) | Member::Init(_) => {}
            }
        }
        if !has_ctor && !is_interface {
            let ctor = self.default_constructor(decl, c, anon_ctor);
            decl.members.push(Member::Method(ctor));
        }
        if is_enum {
            self.enter_enum_members(c);
        }
        for member in decl.members.iter_mut() {
            if let Member::Class(inner) = member {
                self.enter_members(inner, None)?;
            }
        }
        Ok(())
    }

    fn enter_field(&mut self, v: &mut VarDecl, c: SymbolId, env: &Env, is_interface: bool) -> AttrResult<()> {
        let ty = match v.vtype.as_mut() {
            Some(t) => self.attrib_type(t, env)?,
            None => Type::Error,
        };
        let mut flags = v.mods;
        if is_interface {
            flags |= Flags::PUBLIC | Flags::STATIC | Flags::FINAL;
        }
        if v.mods.contains(Flags::ENUM) {
            flags = Flags::PUBLIC | Flags::STATIC | Flags::FINAL | Flags::ENUM | Flags::ENUM_CONSTANT;
        }
        if v.init.is_some() {
            flags |= Flags::HASINIT;
        }
        let duplicate = self.syms.members(c).lookup(&v.name).any(|s| self.syms.kind(s) == SymKind::Var);
        let s = self.syms.new_var(c, &v.name, flags, ty);
        self.syms.set_var_decl_pos(s, v.span.start);
        v.sym = Some(s);
        if duplicate {
            let args = vec!["variable".to_string(), v.name.clone(), self.syms.kind_name(c).to_string(), self.syms.fullname(c)];
            self.error(v.span, "already.defined", args);
        } else {
            self.syms.enter_member(c, s);
        }
        Ok(())
    }

    fn enter_method(&mut self, md: &mut MethodDecl, c: SymbolId, env: &Env, is_interface: bool, is_enum: bool) -> AttrResult<()> {
        let mut flags = md.mods;
        if is_interface {
            flags |= Flags::PUBLIC | Flags::ABSTRACT;
        }
        if is_enum && md.is_constructor() {
            if flags.intersects(Flags::PUBLIC | Flags::PROTECTED) {
                let args = vec![(flags & (Flags::PUBLIC | Flags::PROTECTED)).to_string()];
                self.error(md.span, "mod.not.allowed.here", args);
            }
            flags = (flags & !(Flags::PUBLIC | Flags::PROTECTED)) | Flags::PRIVATE;
        }
        if flags.contains(Flags::VARARGS) && !self.opts.varargs {
            self.error(md.span, "varargs.not.supported.in.source", vec![self.opts.source.name().to_string()]);
        }
        let m = self.syms.new_method(c, &md.name, flags | Flags::UNATTRIBUTED, Type::Error, vec![]);
        md.sym = Some(m);

        let menv = env.dup(Frame::Block);
        let mut tvars = Vec::with_capacity(md.type_params.len());
        for tp in md.type_params.iter_mut() {
            let tv = self.syms.new_type_var(m, &tp.name);
            tp.sym = Some(tv);
            menv.enter(&tp.name, tv);
            tvars.push(tv);
        }
        for tp in md.type_params.iter_mut() {
            let bound = self.attrib_bounds(tp, &menv)?;
            if let Some(tv) = tp.sym {
                self.syms.set_bound(tv, bound);
            }
        }

        let ret = match md.ret.as_mut() {
            Some(r) => self.attrib_type(r, &menv)?,
            None => Type::Void,
        };
        let mut params = Vec::with_capacity(md.params.len());
        let mut param_syms = Vec::with_capacity(md.params.len());
        for p in md.params.iter_mut() {
            let ty = match p.vtype.as_mut() {
                Some(t) => self.attrib_type(t, &menv)?,
                None => Type::Error,
            };
            if param_syms.iter().any(|s| self.syms.name(*s) == p.name) {
                let args = vec!["variable".to_string(), p.name.clone(), "method".to_string(), md.name.clone()];
                self.error(p.span, "already.defined", args);
            }
            let ps = self.syms.new_var(m, &p.name, p.mods | Flags::PARAMETER | Flags::HASINIT, ty.clone());
            self.syms.set_var_decl_pos(ps, p.span.start);
            p.sym = Some(ps);
            params.push(ty);
            param_syms.push(ps);
        }
        let mut thrown = Vec::with_capacity(md.thrown.len());
        for t in md.thrown.iter_mut() {
            let ty = self.attrib_type(t, &menv)?;
            if !ty.is_error() && !self.syms.is_throwable(&ty) {
                let throwable = self.syms.ty(self.syms.predef.throwable).clone();
                let args = vec![self.show(&ty), self.show(&throwable)];
                self.error(t.span, "incompatible.types", args);
                continue;
            }
            thrown.push(ty);
        }

        let mt = MethodType::new(params, ret, thrown);
        let ty = if tvars.is_empty() { Type::Method(mt) } else { Type::ForAll(ForAll { tvars, mt }) };
        {
            let sym = self.syms.sym_mut(m);
            sym.ty = ty;
            sym.data = SymData::Method(MethodInfo { params: param_syms });
            sym.flags.remove(Flags::UNATTRIBUTED);
        }

        let others: Vec<SymbolId> = self.syms.methods_named(c, &md.name).collect();
        for other in others {
            let (mine, theirs) = (self.syms.ty(m).clone(), self.syms.ty(other).clone());
            if self.syms.has_same_args(&mine, &theirs) {
                let args = vec![
                    self.syms.kind_name(m).to_string(),
                    self.show_sym(m),
                    self.syms.kind_name(c).to_string(),
                    self.syms.fullname(c),
                ];
                self.error(md.span, "already.defined", args);
                return Ok(());
            }
            let (em, eo) = (self.syms.erasure(&mine), self.syms.erasure(&theirs));
            if self.syms.has_same_args(&em, &eo) {
                let args = vec![self.show_sym(m), self.show_sym(other)];
                self.error(md.span, "name.clash.same.erasure", args);
                return Ok(());
            }
        }
        self.syms.enter_member(c, m);
        Ok(())
    }

    /// The constructor a class without one gets. For an anonymous class it
    /// takes the arguments of the superclass constructor and passes them on.
    fn default_constructor(&mut self, decl: &ClassDecl, c: SymbolId, anon: Option<(&MethodType, Flags)>) -> MethodDecl {
        let class_flags = self.syms.flags(c);
        let mut flags = Flags::GENERATED_CTOR;
        let (params, thrown) = match anon {
            Some((mt, extra)) => {
                flags |= Flags::ANON_CTOR | extra;
                (mt.params.clone(), mt.thrown.clone())
            }
            None if class_flags.contains(Flags::ENUM) => {
                flags |= Flags::PRIVATE;
                (Vec::new(), Vec::new())
            }
            None => {
                flags |= class_flags.access();
                (Vec::new(), Vec::new())
            }
        };
        let ty = Type::Method(MethodType::new(params.clone(), Type::Void, thrown));
        let m = self.syms.new_method(c, names::INIT, flags, ty, vec![]);
        let param_syms: Vec<SymbolId> = params
            .into_iter()
            .enumerate()
            .map(|(i, t)| self.syms.new_var(m, &format!("x{}", i), Flags::PARAMETER | Flags::SYNTHETIC | Flags::HASINIT, t))
            .collect();
        if let SymData::Method(info) = &mut self.syms.sym_mut(m).data {
            info.params = param_syms.clone();
        }
        self.syms.enter_member(c, m);

        let make = TreeMaker::at(decl.span);
        let syms = &*self.syms;
        let args: Vec<Expr> = param_syms.iter().map(|p| make.ident(syms, *p)).collect();
        let call = Expr::new(
            decl.span,
            ExprKind::Call {
                meth: Box::new(Expr::new(decl.span, ExprKind::Ident(names::SUPER.to_string()))),
                type_args: Vec::new(),
                args,
                varargs_elem: None,
            },
        );
        let body = if c == syms.predef.object {
            Block::new(decl.span, Vec::new())
        } else {
            Block::new(decl.span, vec![Stmt::new(decl.span, StmtKind::Expr(call))])
        };
        trace!(class = %syms.fullname(c), "default constructor");
        make.method_decl(syms, m, Some(body))
    }

    /// `values()` and `valueOf(String)` of an enum class.
    fn enter_enum_members(&mut self, c: SymbolId) {
        let ety = self.syms.ty(c).clone();
        let values_ty = Type::method(vec![], Type::array(ety.clone()));
        let values = self.syms.new_method(c, names::VALUES, Flags::PUBLIC | Flags::STATIC, values_ty, vec![]);
        self.syms.enter_member(c, values);

        let string = self.syms.string_type();
        let value_of = self.syms.new_method(
            c,
            names::VALUE_OF,
            Flags::PUBLIC | Flags::STATIC,
            Type::method(vec![string.clone()], ety),
            vec![],
        );
        let name = self.syms.new_var(value_of, names::NAME, Flags::PARAMETER | Flags::HASINIT, string);
        if let SymData::Method(info) = &mut self.syms.sym_mut(value_of).data {
            info.params = vec![name];
        }
        self.syms.enter_member(c, value_of);
    }

    // ── Local and anonymous classes ────────────────────────────────────

    /// The symbol that owns classes declared in `env`.
    fn local_owner(&self, env: &Env) -> SymbolId {
        env.enclosing_method().or(env.enclosing_class()).unwrap_or(self.syms.predef.object)
    }

    /// Enter a class declared in a block and make it visible there.
    pub(crate) fn enter_local_class(&mut self, decl: &mut ClassDecl, env: &Env) -> AttrResult<SymbolId> {
        let owner = self.local_owner(env);
        let c = self.enter_class_sym(decl, owner);
        env.enter(&decl.name, c);
        self.register_class(decl, env, true);
        self.complete_headers(decl)?;
        self.check_deferred_bounds();
        self.enter_members(decl, None)?;
        Ok(c)
    }

    /// Enter the body of an anonymous class creation. `supertype` is the
    /// instantiated class or interface; `ctor` the signature of the chosen
    /// superclass constructor.
    pub(crate) fn enter_anonymous_class(
        &mut self,
        body: &mut ClassDecl,
        env: &Env,
        supertype: &Type,
        ctor: &MethodType,
        ctor_flags: Flags,
    ) -> AttrResult<SymbolId> {
        let owner = self.local_owner(env);
        body.name.clear();
        body.mods = Flags::EMPTY;
        let c = self.enter_class_sym(body, owner);
        self.register_class(body, env, false);
        let is_interface = supertype.class_sym().is_some_and(|s| self.syms.is_interface(s));
        let (sup, ifaces) = if is_interface {
            (self.syms.object_type(), vec![supertype.clone()])
        } else {
            (supertype.clone(), Vec::new())
        };
        self.syms.set_supertypes(c, Some(sup), ifaces);
        self.syms.sym_mut(c).flags.remove(Flags::UNATTRIBUTED);
        self.enter_self_vars(c);
        for member in body.members.iter() {
            if let Member::Class(inner) = member {
                self.complete_headers(inner)?;
            }
        }
        self.check_deferred_bounds();
        self.enter_members(body, Some((ctor, ctor_flags & Flags::VARARGS)))?;
        debug!(class = %self.syms.flatname(c), "entered anonymous class");
        Ok(c)
    }

    // ── Constants ──────────────────────────────────────────────────────

    /// Compute the values of constant fields before any body is attributed,
    /// so that constants declared later in the unit can be used in case
    /// labels and other constant expressions.
    fn fold_field_constants(&mut self, unit: &CompilationUnit) -> AttrResult<()> {
        let mut candidates = Vec::new();
        for class in unit.classes.iter() {
            self.collect_constant_fields(class, &mut candidates);
        }
        if candidates.is_empty() {
            return Ok(());
        }
        for _round in 0..8 {
            let mut progress = false;
            for (field, init, env) in candidates.iter() {
                if self.syms.sym(*field).const_value().is_some() {
                    continue;
                }
                let is_static = self.syms.is_static(*field);
                let field_ty = self.syms.ty(*field).clone();
                let init_env = env.init_env(Frame::VarInit(*field), is_static);
                let mut e = init.clone();
                let folded = self.speculative(|a| a.attrib_expr(&mut e, &init_env, &field_ty))?;
                if folded.is_error() {
                    continue;
                }
                if let Some(value) = e.constant.as_ref().and_then(|c| constant_for(&field_ty, c)) {
                    self.syms.set_const_value(*field, value);
                    progress = true;
                }
            }
            if !progress {
                break;
            }
        }
        Ok(())
    }

    fn collect_constant_fields(&self, decl: &ClassDecl, out: &mut Vec<(SymbolId, Expr, Env)>) {
        let Some(env) = decl.sym.and_then(|c| self.class_envs.get(&c)) else { return };
        for member in decl.members.iter() {
            match member {
                Member::Var(v) => {
                    let (Some(s), Some(init)) = (v.sym, v.init.as_ref()) else { continue };
                    let flags = self.syms.flags(s);
                    let ty = self.syms.ty(s);
                    let constant_type = ty.is_prim() || ty.class_sym() == Some(self.syms.predef.string);
                    if flags.contains(Flags::FINAL) && !flags.contains(Flags::ENUM_CONSTANT) && constant_type && !has_class_body(init) {
                        out.push((s, init.clone(), env.clone()));
                    }
                }
                Member::Class(inner) => self.collect_constant_fields(inner, out),
                _ => {}
            }
        }
    }
}

/// The value a constant initializer gives a variable of type `ty`.
pub(crate) fn constant_for(ty: &Type, c: &cinder_symtab::Constant) -> Option<cinder_symtab::Constant> {
    match ty {
        Type::Prim(p) => c.coerce(*p),
        Type::Class(_) => matches!(c, cinder_symtab::Constant::Str(_)).then(|| c.clone()),
        _ => None,
    }
}

fn enum_constants_have_bodies(decl: &ClassDecl) -> bool {
    decl.members.iter().any(|m| match m {
        Member::Var(v) if v.mods.contains(Flags::ENUM) => {
            matches!(&v.init, Some(Expr { kind: ExprKind::New { body: Some(_), .. }, .. }))
        }
        _ => false,
    })
}

/// Whether an expression declares a class anywhere inside it.
fn has_class_body(e: &Expr) -> bool {
    struct Finder(bool);
    impl cinder_ast::visit::Visit for Finder {
        fn visit_expr(&mut self, e: &Expr) {
            if matches!(&e.kind, ExprKind::New { body: Some(_), .. }) {
                self.0 = true;
            }
            cinder_ast::visit::walk_expr(self, e);
        }
    }
    let mut f = Finder(false);
    cinder_ast::visit::Visit::visit_expr(&mut f, e);
    f.0
}
