//! The lowerer: rewrites one attributed top-level class into flat,
//! sugar-free class declarations.
//!
//! Member, local and anonymous classes come out as siblings of their
//! top-level class, with synthesized fields for their enclosing instance
//! and captured locals. Where a tree sits travels down the recursion in a
//! [`Ctx`]; the [`Lowerer`] only keeps tables that grow while one top-level
//! class is translated.

mod access;
mod boxing;
mod capture;
mod enums;
mod sugar;
mod switch;

use rustc_hash::FxHashMap;
use tracing::{debug, debug_span, trace, trace_span};

use cinder_ast::make::simple_flatname;
use cinder_ast::visit::{walk_class, Visit};
use cinder_ast::{
    Block, Case, Catch, ClassDecl, CompilationUnit, Expr, ExprKind, Initializer, Member, MethodDecl, Stmt,
    StmtKind, TreeMaker, VarDecl,
};
use cinder_common::{CompileError, CompileOptions, Span};
use cinder_symtab::{names, Constant, Flags, SymData, SymKind, SymbolId, Symtab, Type};

use crate::fresh::FreshNames;

pub use access::AccessCode;

/// Lower every class of an attributed, error-free unit. Each top-level class
/// is followed by the classes flattened out of it.
pub fn lower_unit(
    syms: &mut Symtab,
    unit: &CompilationUnit,
    opts: &CompileOptions,
) -> Result<Vec<ClassDecl>, CompileError> {
    let mut lowerer = Lowerer::new(syms, opts);
    for decl in &unit.classes {
        lowerer.prepare(decl);
    }
    let mut out = Vec::new();
    for decl in &unit.classes {
        out.extend(lowerer.lower_class(decl.clone())?);
    }
    Ok(out)
}

/// Where a tree being lowered sits.
#[derive(Clone, Debug)]
pub(crate) struct Ctx {
    /// The class whose body is being translated.
    pub class: SymbolId,
    pub outermost: SymbolId,
    /// Owner of synthesized locals: the method, the field being
    /// initialized, or the class for initializer blocks.
    pub owner: SymbolId,
    pub method: Option<SymbolId>,
    /// Inside a constructor, the parameters that stand in for the
    /// synthesized fields they initialize.
    pub field_params: FxHashMap<SymbolId, SymbolId>,
    /// Inside a constructor of an enum class, its name and ordinal
    /// parameters.
    pub enum_params: Option<(SymbolId, SymbolId)>,
}

impl Ctx {
    fn new(class: SymbolId, outermost: SymbolId, owner: SymbolId) -> Ctx {
        Ctx {
            class,
            outermost,
            owner,
            method: None,
            field_params: FxHashMap::default(),
            enum_params: None,
        }
    }
}

/// The parameters a constructor gains during lowering.
#[derive(Clone, Debug, Default)]
pub(crate) struct CtorShape {
    pub enum_params: Option<(SymbolId, SymbolId)>,
    pub outer: Option<SymbolId>,
    /// `(proxy field, parameter)` in the order of the class's captured
    /// locals.
    pub proxies: Vec<(SymbolId, SymbolId)>,
    /// Synthetic parameters ahead of the source ones.
    pub lead: usize,
    pub arity: usize,
}

pub struct Lowerer<'a> {
    pub(crate) syms: &'a mut Symtab,
    pub(crate) opts: &'a CompileOptions,
    pub(crate) fresh: FreshNames,
    /// The top-level class being lowered.
    pub(crate) top: SymbolId,
    pub(crate) top_span: Span,
    /// Flattened classes, in the order their translation finished.
    nested: Vec<ClassDecl>,
    /// Members synthesized for a class, attached once it is translated.
    pub(crate) extra_members: FxHashMap<SymbolId, Vec<Member>>,
    /// Captured locals of each local class, sorted by symbol.
    pub(crate) free_vars: FxHashMap<SymbolId, Vec<SymbolId>>,
    pub(crate) proxies: FxHashMap<(SymbolId, SymbolId), SymbolId>,
    pub(crate) outer_fields: FxHashMap<SymbolId, SymbolId>,
    pub(crate) ctor_shapes: FxHashMap<SymbolId, CtorShape>,
    pub(crate) accessors: FxHashMap<access::AccessKey, SymbolId>,
    pub(crate) access_numbers: FxHashMap<SymbolId, u32>,
    pub(crate) access_ctors: FxHashMap<SymbolId, SymbolId>,
    /// Synthetic class holding switch maps and tagging access constructors.
    pub(crate) holder: Option<SymbolId>,
    pub(crate) switch_maps: Vec<enums::SwitchMap>,
    pub(crate) assertion_flags: FxHashMap<SymbolId, SymbolId>,
    pub(crate) enum_ordinals: FxHashMap<SymbolId, i32>,
}

impl<'a> Lowerer<'a> {
    pub fn new(syms: &'a mut Symtab, opts: &'a CompileOptions) -> Self {
        let top = syms.predef.object;
        Lowerer {
            syms,
            opts,
            fresh: FreshNames::new(),
            top,
            top_span: Span::DUMMY,
            nested: Vec::new(),
            extra_members: FxHashMap::default(),
            free_vars: FxHashMap::default(),
            proxies: FxHashMap::default(),
            outer_fields: FxHashMap::default(),
            ctor_shapes: FxHashMap::default(),
            accessors: FxHashMap::default(),
            access_numbers: FxHashMap::default(),
            access_ctors: FxHashMap::default(),
            holder: None,
            switch_maps: Vec::new(),
            assertion_flags: FxHashMap::default(),
            enum_ordinals: FxHashMap::default(),
        }
    }

    /// Lower one top-level class that went through [`Lowerer::prepare`].
    /// The result starts with the class itself.
    pub fn lower_class(&mut self, decl: ClassDecl) -> Result<Vec<ClassDecl>, CompileError> {
        let c = decl
            .sym
            .ok_or_else(|| CompileError::internal(format!("class {} reached lowering unentered", decl.name)))?;
        let _span = debug_span!("lower_class", class = %self.syms.fullname(c)).entered();
        self.top = c;
        self.top_span = decl.span;
        self.holder = None;
        self.switch_maps.clear();

        let cx = Ctx::new(c, c, c);
        let top = self.class(decl, &cx);
        let mut classes = vec![top];
        classes.append(&mut self.nested);
        if let Some(holder) = self.holder_decl() {
            classes.push(holder);
        }
        for class in &mut classes {
            if let Some(extra) = class.sym.and_then(|s| self.extra_members.remove(&s)) {
                class.members.extend(extra);
            }
        }
        if let Some(stray) = self.extra_members.keys().next() {
            return Err(CompileError::internal(format!(
                "members synthesized for {} outside the lowered class",
                self.syms.fullname(*stray)
            )));
        }
        debug!(classes = classes.len(), "lowered");
        Ok(classes)
    }

    // ── Synthesized fields and constructor signatures ──────────────────

    /// Enter the outer-instance and proxy fields of every class in the
    /// top-level class `decl` and give constructors their final
    /// signatures. Every top-level class of a unit is prepared before any
    /// is lowered, so instance creations can be rewritten in any order.
    pub fn prepare(&mut self, decl: &ClassDecl) {
        let captured = capture::free_vars(self.syms, decl);
        self.free_vars.extend(captured);
        let mut collector = ClassCollector::default();
        collector.visit_class(decl);
        for (c, ctors) in collector.classes {
            let outer = if self.syms.has_outer_instance(c) { Some(self.outer_field(c)) } else { None };
            let captured = self.free_vars.get(&c).cloned().unwrap_or_default();
            let proxies: Vec<SymbolId> = captured.iter().map(|v| self.proxy_field(c, *v)).collect();
            for ctor in ctors {
                self.extend_constructor(c, ctor, outer, &proxies);
            }
        }
    }

    fn outer_field(&mut self, c: SymbolId) -> SymbolId {
        let outer = self.syms.outer_class(c);
        let mut depth = 0;
        let mut cur = outer.and_then(|o| self.syms.owner(o));
        while let Some(s) = cur {
            if self.syms.is_class(s) {
                depth += 1;
            }
            cur = self.syms.owner(s);
        }
        let ty = outer.map(|o| self.syms.ty(o).clone()).unwrap_or(Type::Error);
        let name = format!("this${}", depth);
        let field = self.syms.new_var(c, &name, Flags::FINAL | Flags::SYNTHETIC | Flags::LOWERED, ty);
        self.syms.enter_member(c, field);
        self.outer_fields.insert(c, field);
        trace!(class = %self.syms.flatname(c), field = %name, "outer instance field");
        field
    }

    fn proxy_field(&mut self, c: SymbolId, var: SymbolId) -> SymbolId {
        let base = format!("val${}", self.syms.name(var));
        let name = self.fresh.name(c, &base);
        let ty = self.syms.ty(var).clone();
        let field = self.syms.new_var(c, &name, Flags::FINAL | Flags::SYNTHETIC | Flags::LOWERED, ty);
        self.syms.enter_member(c, field);
        self.proxies.insert((c, var), field);
        debug!(class = %self.syms.flatname(c), local = %self.syms.name(var), field = %name, "proxy field");
        field
    }

    fn extend_constructor(&mut self, c: SymbolId, ctor: SymbolId, outer: Option<SymbolId>, proxies: &[SymbolId]) {
        let flags = Flags::PARAMETER | Flags::FINAL | Flags::SYNTHETIC | Flags::LOWERED;
        let mut lead = Vec::new();
        let enum_params = if self.is_enum_like(c) {
            let string = self.syms.string_type();
            let name = self.syms.new_var(ctor, "$enum$name", flags, string);
            let ordinal = self.syms.new_var(ctor, "$enum$ordinal", flags, Type::int());
            lead.extend([name, ordinal]);
            Some((name, ordinal))
        } else {
            None
        };
        let outer_param = outer.map(|field| {
            let name = self.syms.name(field).to_string();
            let ty = self.syms.ty(field).clone();
            let p = self.syms.new_var(ctor, &name, flags, ty);
            lead.push(p);
            p
        });
        let trailing: Vec<(SymbolId, SymbolId)> = proxies
            .iter()
            .map(|field| {
                let name = self.syms.name(*field).to_string();
                let ty = self.syms.ty(*field).clone();
                (*field, self.syms.new_var(ctor, &name, flags, ty))
            })
            .collect();

        let source_types = self.syms.ty(ctor).params().to_vec();
        let mut types: Vec<Type> = lead.iter().map(|p| self.syms.ty(*p).clone()).collect();
        types.extend(source_types.iter().cloned());
        types.extend(trailing.iter().map(|(_, p)| self.syms.ty(*p).clone()));
        let mut params = lead.clone();
        params.extend_from_slice(self.syms.sym(ctor).method_params());
        params.extend(trailing.iter().map(|(_, p)| *p));

        let sym = self.syms.sym_mut(ctor);
        if let Some(mt) = sym.ty.as_method_mut() {
            mt.params = types;
        }
        if let SymData::Method(info) = &mut sym.data {
            info.params = params;
        }
        self.ctor_shapes.insert(
            ctor,
            CtorShape { enum_params, outer: outer_param, proxies: trailing, lead: lead.len(), arity: source_types.len() },
        );
    }

    /// The parameter types a constructor had in source.
    pub(crate) fn source_params(&self, ctor: SymbolId) -> Vec<Type> {
        let params = self.syms.ty(ctor).params();
        match self.ctor_shapes.get(&ctor) {
            Some(shape) => params.iter().skip(shape.lead).take(shape.arity).cloned().collect(),
            None => params.to_vec(),
        }
    }

    // ── Declarations ───────────────────────────────────────────────────

    /// Translate a class body. Member classes are lowered on the way and
    /// end up in `self.nested`.
    fn class(&mut self, mut decl: ClassDecl, outer: &Ctx) -> ClassDecl {
        let Some(c) = decl.sym else { return decl };
        let _span = trace_span!("class", class = %self.syms.flatname(c)).entered();
        let outermost = outer.outermost;
        if decl.is_enum() {
            self.enum_class(&mut decl, c);
        }

        let make = TreeMaker::at(decl.span);
        let mut members = Vec::new();
        for var in self.free_vars.get(&c).cloned().unwrap_or_default() {
            if let Some(field) = self.proxies.get(&(c, var)).copied() {
                members.push(Member::Var(make.var_decl(self.syms, field, None)));
            }
        }
        if let Some(field) = self.outer_fields.get(&c).copied() {
            members.push(Member::Var(make.var_decl(self.syms, field, None)));
        }
        for member in std::mem::take(&mut decl.members) {
            match member {
                Member::Class(inner) => {
                    let class_cx = Ctx::new(c, outermost, c);
                    let lowered = self.class(inner, &class_cx);
                    self.nested.push(lowered);
                }
                Member::Method(md) => members.push(Member::Method(self.method(md, c, outermost))),
                Member::Var(var) => members.push(Member::Var(self.field(var, c, outermost))),
                Member::Init(init) => {
                    let cx = Ctx::new(c, outermost, c);
                    let body = self.block(init.body, &cx);
                    members.push(Member::Init(Initializer { is_static: init.is_static, body }));
                }
            }
        }
        if let Some(flag) = self.assertion_flags.get(&c).copied() {
            members.insert(0, Member::Var(self.assertion_flag_decl(flag, decl.span)));
        }
        decl.members = members;
        if c != outermost {
            decl.name = simple_flatname(self.syms, c);
            decl.mods = flattened_flags(decl.mods);
        }
        decl
    }

    fn method(&mut self, mut md: MethodDecl, c: SymbolId, outermost: SymbolId) -> MethodDecl {
        let Some(m) = md.sym else { return md };
        let mut cx = Ctx::new(c, outermost, m);
        cx.method = Some(m);
        if md.is_constructor() {
            return self.constructor(md, cx);
        }
        md.body = md.body.map(|body| self.block(body, &cx));
        md
    }

    fn constructor(&mut self, mut md: MethodDecl, mut cx: Ctx) -> MethodDecl {
        let Some(ctor) = cx.method else { return md };
        let shape = self.ctor_shapes.get(&ctor).cloned().unwrap_or_default();
        cx.enum_params = shape.enum_params;
        let outer_field = self.outer_fields.get(&cx.class).copied();
        if let (Some(field), Some(param)) = (outer_field, shape.outer) {
            cx.field_params.insert(field, param);
        }
        for (field, param) in &shape.proxies {
            cx.field_params.insert(*field, *param);
        }

        let make = TreeMaker::at(md.span);
        let mut params = Vec::new();
        if let Some((name, ordinal)) = shape.enum_params {
            params.push(make.var_decl(self.syms, name, None));
            params.push(make.var_decl(self.syms, ordinal, None));
        }
        if let Some(p) = shape.outer {
            params.push(make.var_decl(self.syms, p, None));
        }
        params.append(&mut md.params);
        for (_, p) in &shape.proxies {
            params.push(make.var_decl(self.syms, *p, None));
        }
        md.params = params;

        let Some(body) = md.body.take() else { return md };
        let mut stmts = body.stmts;
        let self_call = if stmts.first().is_some_and(|s| self_call_name(s).is_some()) { Some(stmts.remove(0)) } else { None };
        // Only constructors that do not delegate to `this(...)` store the
        // synthesized fields.
        let initial = self_call.as_ref().map_or(true, |s| self_call_name(s) != Some(names::THIS));
        let self_call = self_call.map(|s| self.stmt(s, &cx));
        let rest: Vec<Stmt> = stmts.into_iter().map(|s| self.stmt(s, &cx)).collect();

        let mut inits = Vec::new();
        if initial {
            let this = self.this_expr(&cx, md.span);
            if let (Some(field), Some(param)) = (outer_field, shape.outer) {
                let lhs = make.select(self.syms, this.clone(), field);
                inits.push(make.exec(make.assign(lhs, make.ident(self.syms, param))));
            }
            for (field, param) in &shape.proxies {
                let lhs = make.select(self.syms, this.clone(), *field);
                inits.push(make.exec(make.assign(lhs, make.ident(self.syms, *param))));
            }
        }
        let mut out = Vec::new();
        if self.opts.outer_this_before_super {
            out.extend(inits);
            out.extend(self_call);
        } else {
            out.extend(self_call);
            out.extend(inits);
        }
        out.extend(rest);
        md.body = Some(Block::new(body.span, out));
        md
    }

    fn field(&mut self, mut var: VarDecl, c: SymbolId, outermost: SymbolId) -> VarDecl {
        let Some(f) = var.sym else { return var };
        let cx = Ctx::new(c, outermost, f);
        let target = self.syms.ty(f).clone();
        var.init = var.init.map(|init| {
            let init = self.expr(init, &cx);
            self.coerce(init, &target)
        });
        if self.syms.flags(f).contains(Flags::ENUM_CONSTANT) {
            self.number_enum_constant(&mut var, f);
        }
        var
    }

    // ── Statements ─────────────────────────────────────────────────────

    pub(crate) fn block(&mut self, block: Block, cx: &Ctx) -> Block {
        let stmts = block.stmts.into_iter().map(|s| self.stmt(s, cx)).collect();
        Block::new(block.span, stmts)
    }

    fn boxed_stmt(&mut self, stmt: Stmt, cx: &Ctx) -> Box<Stmt> {
        Box::new(self.stmt(stmt, cx))
    }

    fn condition(&mut self, cond: Expr, cx: &Ctx) -> Expr {
        let cond = self.expr(cond, cx);
        self.coerce(cond, &Type::boolean())
    }

    pub(crate) fn local_var(&mut self, mut var: VarDecl, cx: &Ctx) -> VarDecl {
        let target = var.sym.map(|v| self.syms.ty(v).clone()).unwrap_or(Type::Error);
        var.init = var.init.map(|init| {
            let init = self.expr(init, cx);
            self.coerce(init, &target)
        });
        var
    }

    pub(crate) fn catch(&mut self, catch: Catch, cx: &Ctx) -> Catch {
        Catch { span: catch.span, param: catch.param, body: self.block(catch.body, cx) }
    }

    pub(crate) fn stmt(&mut self, stmt: Stmt, cx: &Ctx) -> Stmt {
        let Stmt { id, span, kind } = stmt;
        let kind = match kind {
            StmtKind::Block(block) => StmtKind::Block(self.block(block, cx)),
            StmtKind::LocalVar(var) => StmtKind::LocalVar(self.local_var(var, cx)),
            StmtKind::LocalClass(decl) => {
                let lowered = self.class(*decl, cx);
                self.nested.push(lowered);
                StmtKind::Skip
            }
            StmtKind::Expr(e) => StmtKind::Expr(self.expr(e, cx)),
            StmtKind::If { cond, then, els } => match cond.constant {
                // The branch not taken is dropped with any declarations in it.
                Some(Constant::Bool(true)) => return self.stmt(*then, cx),
                Some(Constant::Bool(false)) => match els {
                    Some(els) => return self.stmt(*els, cx),
                    None => StmtKind::Skip,
                },
                _ => StmtKind::If {
                    cond: self.condition(cond, cx),
                    then: self.boxed_stmt(*then, cx),
                    els: els.map(|s| self.boxed_stmt(*s, cx)),
                },
            },
            StmtKind::While { cond, body } => {
                StmtKind::While { cond: self.condition(cond, cx), body: self.boxed_stmt(*body, cx) }
            }
            StmtKind::DoWhile { body, cond } => {
                StmtKind::DoWhile { body: self.boxed_stmt(*body, cx), cond: self.condition(cond, cx) }
            }
            StmtKind::For { init, cond, step, body } => StmtKind::For {
                init: init.into_iter().map(|s| self.stmt(s, cx)).collect(),
                cond: cond.map(|c| self.condition(c, cx)),
                step: step.into_iter().map(|e| self.expr(e, cx)).collect(),
                body: self.boxed_stmt(*body, cx),
            },
            StmtKind::ForEach { var, expr, body } => return self.foreach(id, span, var, expr, *body, cx),
            StmtKind::Labeled { label, body } => StmtKind::Labeled { label, body: self.boxed_stmt(*body, cx) },
            StmtKind::Switch { selector, cases } => return self.switch(id, span, selector, cases, cx),
            StmtKind::Break { .. } | StmtKind::Continue { .. } | StmtKind::Skip => kind,
            StmtKind::Return(value) => {
                let ret = cx.method.map(|m| self.syms.ty(m).ret()).unwrap_or(Type::Void);
                StmtKind::Return(value.map(|v| {
                    let v = self.expr(v, cx);
                    self.coerce(v, &ret)
                }))
            }
            StmtKind::Throw(e) => StmtKind::Throw(self.expr(e, cx)),
            StmtKind::Try { resources, body, catches, finalizer } => {
                if !resources.is_empty() {
                    return self.try_with_resources(id, span, resources, body, catches, finalizer, cx);
                }
                StmtKind::Try {
                    resources,
                    body: self.block(body, cx),
                    catches: catches.into_iter().map(|c| self.catch(c, cx)).collect(),
                    finalizer: finalizer.map(|f| self.block(f, cx)),
                }
            }
            StmtKind::Synchronized { lock, body } => {
                StmtKind::Synchronized { lock: self.expr(lock, cx), body: self.block(body, cx) }
            }
            StmtKind::Assert { cond, detail } => return self.assert(id, span, cond, detail, cx),
        };
        Stmt { id, span, kind }
    }

    pub(crate) fn cases(&mut self, cases: Vec<Case>, cx: &Ctx) -> Vec<Case> {
        cases
            .into_iter()
            .map(|case| Case {
                span: case.span,
                label: case.label.map(|l| self.expr(l, cx)),
                stmts: case.stmts.into_iter().map(|s| self.stmt(s, cx)).collect(),
            })
            .collect()
    }

    // ── Expressions ────────────────────────────────────────────────────

    pub(crate) fn expr(&mut self, e: Expr, cx: &Ctx) -> Expr {
        if let Some(folded) = self.fold_constant(&e) {
            return folded;
        }
        match &e.kind {
            ExprKind::Ident(_) => return self.ident(e, cx),
            ExprKind::Select { .. } => return self.select(e, cx),
            ExprKind::Call { .. } => return self.call(e, cx),
            ExprKind::New { .. } => return self.new_class(e, cx),
            ExprKind::Assign { .. } => return self.assign(e, cx),
            ExprKind::AssignOp { .. } => return self.assign_op(e, cx),
            ExprKind::Unary { op, .. } if op.is_increment() => return self.increment(e, cx),
            _ => {}
        }
        let ty = e.ty();
        let operator = e.sym;
        let mut e = e;
        let kind = std::mem::replace(&mut e.kind, ExprKind::Erroneous);
        e.kind = match kind {
            ExprKind::NewArray { elem, dims, elems } => {
                let elem_ty = ty.elem_type().cloned().unwrap_or(Type::Error);
                let dims = dims
                    .into_iter()
                    .map(|d| {
                        let d = self.expr(d, cx);
                        self.coerce(d, &Type::int())
                    })
                    .collect();
                let elems = elems.map(|elems| {
                    elems
                        .into_iter()
                        .map(|x| {
                            let x = self.expr(x, cx);
                            self.coerce(x, &elem_ty)
                        })
                        .collect()
                });
                ExprKind::NewArray { elem, dims, elems }
            }
            ExprKind::Parens(inner) => ExprKind::Parens(Box::new(self.expr(*inner, cx))),
            ExprKind::Unary { op, arg } => {
                let param = self.operand_types(operator).and_then(|p| p.into_iter().next());
                let arg = self.expr(*arg, cx);
                let arg = match param {
                    Some(p) => self.coerce(arg, &p),
                    None => arg,
                };
                ExprKind::Unary { op, arg: Box::new(arg) }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let params = self.operand_types(operator);
                let lhs = self.expr(*lhs, cx);
                let rhs = self.expr(*rhs, cx);
                let (lhs, rhs) = match params.as_deref() {
                    Some([l, r]) => (self.coerce(lhs, l), self.coerce(rhs, r)),
                    _ => (lhs, rhs),
                };
                ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }
            }
            ExprKind::Cast { clazz, expr } => {
                let inner = self.expr(*expr, cx);
                let inner_ty = inner.ty();
                if self.opts.boxing && ty.is_prim() && inner_ty.is_reference() {
                    // `(int) o` unboxes through the box of the target type.
                    let inner = match self.syms.unboxed_type(&inner_ty) {
                        Some(_) => inner,
                        None => match ty.prim() {
                            Some(p) => {
                                let boxed = self.syms.boxed_type(p);
                                TreeMaker::at(e.span).cast(self.syms, boxed, inner)
                            }
                            None => inner,
                        },
                    };
                    return self.coerce(inner, &ty);
                }
                ExprKind::Cast { clazz, expr: Box::new(self.coerce(inner, &ty)) }
            }
            ExprKind::InstanceOf { expr, clazz } => ExprKind::InstanceOf { expr: Box::new(self.expr(*expr, cx)), clazz },
            ExprKind::Conditional { cond, then, els } => {
                if let Some(Constant::Bool(taken)) = cond.constant {
                    let branch = if taken { *then } else { *els };
                    let branch = self.expr(branch, cx);
                    return self.coerce(branch, &ty);
                }
                let cond = self.condition(*cond, cx);
                let then = self.expr(*then, cx);
                let els = self.expr(*els, cx);
                ExprKind::Conditional {
                    cond: Box::new(cond),
                    then: Box::new(self.coerce(then, &ty)),
                    els: Box::new(self.coerce(els, &ty)),
                }
            }
            ExprKind::Index { indexed, index } => {
                let indexed = self.expr(*indexed, cx);
                let index = self.expr(*index, cx);
                ExprKind::Index { indexed: Box::new(indexed), index: Box::new(self.coerce(index, &Type::int())) }
            }
            ExprKind::Let { stmts, expr } => ExprKind::Let {
                stmts: stmts.into_iter().map(|s| self.stmt(s, cx)).collect(),
                expr: Box::new(self.expr(*expr, cx)),
            },
            other => other,
        };
        e
    }

    /// A literal for a constant-valued expression of primitive or string
    /// type that is not already one.
    fn fold_constant(&self, e: &Expr) -> Option<Expr> {
        let value = e.constant.as_ref()?;
        if matches!(e.kind, ExprKind::Literal(_)) {
            return None;
        }
        let ty = e.ty();
        if !ty.is_prim() && ty.class_sym() != Some(self.syms.predef.string) {
            return None;
        }
        Some(TreeMaker::at(e.span).literal(value.clone(), ty))
    }

    /// Parameter types of a predefined operator, or `None` for string
    /// concatenation, whose operands are never boxed or unboxed.
    pub(crate) fn operand_types(&self, operator: Option<SymbolId>) -> Option<Vec<Type>> {
        let op = operator?;
        if self.syms.owner(op) != Some(self.syms.predef.operators) {
            return None;
        }
        let ty = self.syms.ty(op);
        if ty.ret().class_sym() == Some(self.syms.predef.string) {
            return None;
        }
        Some(ty.params().to_vec())
    }

    /// The predefined operator `name` over exactly `params`.
    pub(crate) fn operator(&self, name: &str, params: &[Type]) -> SymbolId {
        self.syms
            .members(self.syms.predef.operators)
            .lookup(name)
            .find(|op| self.syms.ty(*op).params() == params)
            .unwrap_or(self.syms.predef.error_sym)
    }

    pub(crate) fn this_expr(&self, cx: &Ctx, span: Span) -> Expr {
        TreeMaker::at(span).this(cx.class, self.syms.ty(cx.class).clone())
    }

    /// Whether `e` names a class or package rather than a value.
    fn is_type_name(&self, e: &Expr) -> bool {
        matches!(e.kind, ExprKind::Ident(_) | ExprKind::Select { .. })
            && !e.is_this_or_super()
            && e.sym.is_some_and(|s| matches!(self.syms.kind(s), SymKind::Class | SymKind::Package))
    }

    /// Translate the target of a selection. Class names are replaced by
    /// their flat names.
    fn target(&mut self, target: Expr, cx: &Ctx) -> Expr {
        if self.is_type_name(&target) {
            return match target.sym.filter(|s| self.syms.is_class(*s)) {
                Some(c) => TreeMaker::at(target.span).type_ident(self.syms, c),
                None => target,
            };
        }
        self.expr(target, cx)
    }

    fn ident(&mut self, e: Expr, cx: &Ctx) -> Expr {
        let Some(sym) = e.sym else { return e };
        if self.syms.kind(sym) != SymKind::Var || e.is_this_or_super() {
            return e;
        }
        match self.syms.owner(sym) {
            Some(owner) if self.syms.is_class(owner) => self.field_ref(e, None, sym, cx),
            Some(owner) => {
                if self.syms.enclosing_class(owner) == Some(cx.class) {
                    e
                } else {
                    self.local_ref(sym, e.span, cx)
                }
            }
            None => e,
        }
    }

    /// A read of field `sym`, through `receiver` when one was written.
    fn field_ref(&mut self, e: Expr, receiver: Option<Expr>, sym: SymbolId, cx: &Ctx) -> Expr {
        let span = e.span;
        let ty = e.ty();
        let is_static = self.syms.is_static(sym);
        let receiver = match receiver {
            Some(r) => Some(r),
            None if is_static => None,
            None => self.implicit_receiver(sym, span, cx),
        };
        if let Some(host) = self.access_host(sym, cx) {
            let receiver = if is_static { None } else { Some(receiver.unwrap_or_else(|| self.this_expr(cx, span))) };
            return self.access_call(sym, AccessCode::Deref, host, receiver, Vec::new(), None, span).with_type(ty);
        }
        let make = TreeMaker::at(span);
        let name = self.syms.name(sym).to_string();
        match receiver {
            Some(r) => make.select_typed(r, sym, &name, ty),
            None => match self.syms.owner_class(sym) {
                Some(owner) if is_static && owner != cx.class => {
                    let qualifier = make.type_ident(self.syms, owner);
                    make.select_typed(qualifier, sym, &name, ty)
                }
                _ => e,
            },
        }
    }

    fn select(&mut self, e: Expr, cx: &Ctx) -> Expr {
        let Some(sym) = e.sym else { return e };
        let span = e.span;
        let ty = e.ty();
        let ExprKind::Select { target, name } = e.kind else { unreachable!("selection expected") };
        match self.syms.kind(sym) {
            SymKind::Var if name == names::THIS => match self.syms.owner_class(sym) {
                Some(c) if c != cx.class => self.outer_instance(c, span, cx),
                _ => TreeMaker::at(span).this(cx.class, ty),
            },
            SymKind::Var if self.syms.owner_class(sym).is_some() && sym != self.syms.predef.length => {
                let receiver = if target.is_this_or_super() && target.name() == Some(names::SUPER) {
                    *target
                } else {
                    self.target(*target, cx)
                };
                let read = TreeMaker::at(span).select_typed(receiver.clone(), sym, &name, ty);
                let receiver = if self.is_type_name(&receiver) { None } else { Some(receiver) };
                match receiver {
                    Some(r) => self.field_ref(read, Some(r), sym, cx),
                    None if self.access_host(sym, cx).is_some() => self.field_ref(read, None, sym, cx),
                    None => read,
                }
            }
            SymKind::Class => TreeMaker::at(span).type_ident(self.syms, sym),
            SymKind::Package => TreeMaker::at(span).select_typed(*target, sym, &name, ty),
            _ => {
                let target = self.target(*target, cx);
                TreeMaker::at(span).select_typed(target, sym, &name, ty)
            }
        }
    }

    fn call(&mut self, e: Expr, cx: &Ctx) -> Expr {
        let span = e.span;
        let ty = e.ty();
        let Some(m) = e.sym else { return e };
        let ExprKind::Call { meth, args, varargs_elem, .. } = e.kind else { unreachable!("call expected") };
        let varargs = varargs_elem.is_some();
        if self.syms.is_constructor(m) {
            return self.self_call(span, *meth, args, varargs, m, cx);
        }
        let method_ty = meth.ty();
        let args = self.args(args, method_ty.params(), varargs, span, cx);
        let is_static = self.syms.is_static(m);
        let make = TreeMaker::at(span);
        let meth = *meth;
        let (receiver, meth) = match meth.kind {
            ExprKind::Select { target, name } => {
                if target.name() == Some(names::SUPER) {
                    // `C.super.m()` from inside a class nested in `C`.
                    let qualifier = match &target.kind {
                        ExprKind::Select { target: q, .. } => q.sym.filter(|s| self.syms.is_class(*s)),
                        _ => None,
                    };
                    if let Some(c) = qualifier.filter(|c| *c != cx.class) {
                        let outer = self.outer_instance(c, span, cx);
                        return self.super_access_call(m, c, outer, args, span).with_type(ty);
                    }
                    let meth = Expr { kind: ExprKind::Select { target, name }, ..meth };
                    return make.call(meth, args).with_type(ty);
                }
                let target = self.target(*target, cx);
                let receiver = if self.is_type_name(&target) { None } else { Some(target.clone()) };
                let meth = Expr { kind: ExprKind::Select { target: Box::new(target), name }, ..meth };
                (receiver, meth)
            }
            ExprKind::Ident(name) => {
                let receiver = if is_static { None } else { self.implicit_receiver(m, span, cx) };
                let meth = Expr { kind: ExprKind::Ident(name), ..meth };
                (receiver, meth)
            }
            kind => (None, Expr { kind, ..meth }),
        };
        if let Some(host) = self.access_host(m, cx) {
            let receiver = if is_static { None } else { Some(receiver.unwrap_or_else(|| self.this_expr(cx, span))) };
            return self.access_call(m, AccessCode::Deref, host, receiver, args, None, span).with_type(ty);
        }
        let meth = if let ExprKind::Ident(name) = &meth.kind {
            let name = name.clone();
            match (receiver, self.syms.owner_class(m)) {
                (Some(r), _) => make.select_typed(r, m, &name, meth.ty()),
                (None, Some(owner)) if is_static && owner != cx.class => {
                    let qualifier = make.type_ident(self.syms, owner);
                    make.select_typed(qualifier, m, &name, meth.ty())
                }
                _ => meth,
            }
        } else {
            meth
        };
        make.call(meth, args).with_type(ty)
    }

    /// Translate call arguments against the parameter types, packing
    /// trailing variable arguments into an array.
    pub(crate) fn args(&mut self, args: Vec<Expr>, params: &[Type], varargs: bool, span: Span, cx: &Ctx) -> Vec<Expr> {
        let fixed = if varargs { params.len().saturating_sub(1) } else { params.len() };
        let mut out = Vec::with_capacity(params.len());
        let mut args = args.into_iter();
        for param in &params[..fixed] {
            if let Some(arg) = args.next() {
                let arg = self.expr(arg, cx);
                out.push(self.coerce(arg, param));
            }
        }
        if varargs {
            let elem = params.last().and_then(Type::elem_type).cloned().unwrap_or(Type::Error);
            let mut rest = Vec::new();
            for arg in args {
                let arg = self.expr(arg, cx);
                rest.push(self.coerce(arg, &elem));
            }
            out.push(TreeMaker::at(span).new_array_init(self.syms, elem, rest));
        } else {
            for arg in args {
                out.push(self.expr(arg, cx));
            }
        }
        out
    }

    /// `this(...)` or `super(...)` with the synthesized arguments of the
    /// invoked constructor.
    fn self_call(&mut self, span: Span, meth: Expr, args: Vec<Expr>, varargs: bool, ctor: SymbolId, cx: &Ctx) -> Expr {
        let make = TreeMaker::at(span);
        let is_this = meth.name() == Some(names::THIS);
        let qualifier = match meth.kind {
            ExprKind::Select { target, .. } => Some(*target),
            _ => None,
        };
        let Some(class) = self.syms.owner_class(ctor) else { return Expr::new(span, ExprKind::Erroneous) };
        let params = self.source_params(ctor);
        let args = self.args(args, &params, varargs, span, cx);
        let shape = self.ctor_shapes.get(&ctor).cloned();

        let mut full = Vec::new();
        let takes_enum_args =
            shape.as_ref().is_some_and(|s| s.enum_params.is_some()) || class == self.syms.predef.enum_;
        if takes_enum_args {
            if let Some((name, ordinal)) = cx.enum_params {
                full.push(make.ident(self.syms, name));
                full.push(make.ident(self.syms, ordinal));
            }
        }
        if shape.as_ref().is_some_and(|s| s.outer.is_some()) {
            let outer = match qualifier {
                Some(q) => self.expr(q, cx),
                None => match self.syms.outer_class(class) {
                    Some(o) => self.outer_instance(o, span, cx),
                    None => self.this_expr(cx, span),
                },
            };
            full.push(outer);
        }
        full.extend(args);
        for var in self.free_vars.get(&class).cloned().unwrap_or_default() {
            full.push(self.local_ref(var, span, cx));
        }
        let (target, tag) = self.constructor_access(ctor, cx, span);
        full.extend(tag);

        let name = if is_this { names::THIS } else { names::SUPER };
        let callee = make.ident_named(name, target, self.syms.ty(target).clone());
        make.call(callee, full)
    }

    fn new_class(&mut self, e: Expr, cx: &Ctx) -> Expr {
        let span = e.span;
        let ty = e.ty();
        let Some(ctor) = e.sym else { return e };
        let ExprKind::New { encl, class, args, body, varargs_elem, .. } = e.kind else { unreachable!("instance creation expected") };
        let Some(c) = self.syms.owner_class(ctor) else {
            return Expr::new(span, ExprKind::New { encl, class, type_args: Vec::new(), args, body, varargs_elem });
        };
        // An anonymous class takes the instance enclosing the creation; a
        // qualifier names the outer instance of its superclass and is not
        // carried through.
        let encl = if body.is_some() { None } else { encl };
        if let Some(body) = body {
            let lowered = self.class(*body, cx);
            self.nested.push(lowered);
        }
        let params = self.source_params(ctor);
        let args = self.args(args, &params, varargs_elem.is_some(), span, cx);

        let mut full = Vec::new();
        if self.ctor_shapes.get(&ctor).is_some_and(|s| s.outer.is_some()) {
            let outer = match encl {
                Some(q) => self.expr(*q, cx),
                None => match self.syms.outer_class(c) {
                    Some(o) => self.outer_instance(o, span, cx),
                    None => self.this_expr(cx, span),
                },
            };
            full.push(outer);
        }
        full.extend(args);
        for var in self.free_vars.get(&c).cloned().unwrap_or_default() {
            full.push(self.local_ref(var, span, cx));
        }
        let (target, tag) = self.constructor_access(ctor, cx, span);
        full.extend(tag);

        let clazz = TreeMaker::at(span).type_ident(self.syms, c);
        Expr {
            span,
            kind: ExprKind::New {
                encl: None,
                class: Box::new(clazz),
                type_args: Vec::new(),
                args: full,
                body: None,
                varargs_elem: None,
            },
            ty: Some(ty),
            sym: Some(target),
            constant: None,
        }
    }

    fn assign(&mut self, e: Expr, cx: &Ctx) -> Expr {
        let span = e.span;
        let ty = e.ty();
        let ExprKind::Assign { lhs, rhs } = e.kind else { unreachable!("assignment expected") };
        let target = lhs.ty();
        let rhs = self.expr(*rhs, cx);
        let rhs = self.coerce(rhs, &target);
        match self.lvalue(*lhs, cx) {
            Lvalue::Plain(lhs) => TreeMaker::at(span).assign(lhs, rhs).with_type(ty),
            Lvalue::Access { sym, host, receiver } => {
                self.access_call(sym, AccessCode::Assign, host, receiver, vec![rhs], None, span).with_type(ty)
            }
        }
    }

    fn assign_op(&mut self, e: Expr, cx: &Ctx) -> Expr {
        let span = e.span;
        let ty = e.ty();
        let operator = e.sym;
        let ExprKind::AssignOp { op, lhs, rhs } = e.kind else { unreachable!("compound assignment expected") };
        let params = self.operand_types(operator);
        let lhs_ty = lhs.ty();
        let rhs = self.expr(*rhs, cx);
        let rhs = match params.as_deref() {
            Some([_, r]) => self.coerce(rhs, r),
            _ => rhs,
        };
        let make = TreeMaker::at(span);
        match self.lvalue(*lhs, cx) {
            Lvalue::Access { sym, host, receiver } => {
                self.access_call(sym, AccessCode::AssignOp(op), host, receiver, vec![rhs], operator, span).with_type(ty)
            }
            Lvalue::Plain(lhs) => {
                let unboxed = if self.opts.boxing { self.syms.unboxed_type(&lhs_ty) } else { None };
                match (unboxed, operator, params) {
                    // `b += r` on a boxed variable becomes `b = box(unbox(b) + r)`.
                    (Some(_), Some(operator), Some(params)) if is_pure(&lhs) => {
                        let current = match params.first() {
                            Some(p) => self.coerce(lhs.clone(), p),
                            None => lhs.clone(),
                        };
                        let value = make.binary(self.syms, op, operator, current, rhs);
                        let value = self.coerce(value, &lhs_ty);
                        make.assign(lhs, value).with_type(ty)
                    }
                    (_, Some(operator), _) => make.assign_op(op, operator, lhs, rhs).with_type(ty),
                    _ => Expr { span, kind: ExprKind::AssignOp { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, ty: Some(ty), sym: None, constant: None },
                }
            }
        }
    }

    fn increment(&mut self, e: Expr, cx: &Ctx) -> Expr {
        let span = e.span;
        let ty = e.ty();
        let operator = e.sym;
        let ExprKind::Unary { op, arg } = e.kind else { unreachable!("increment expected") };
        let arg_ty = arg.ty();
        let make = TreeMaker::at(span);
        match self.lvalue(*arg, cx) {
            Lvalue::Access { sym, host, receiver } => {
                self.access_call(sym, AccessCode::for_unary(op), host, receiver, Vec::new(), operator, span).with_type(ty)
            }
            Lvalue::Plain(arg) => {
                let unboxed = if self.opts.boxing { self.syms.unboxed_type(&arg_ty) } else { None };
                match unboxed {
                    Some(p) if is_pure(&arg) => self.boxed_increment(op, p, arg, span, cx),
                    _ => make.unary(self.syms, op, operator, arg).with_type(ty),
                }
            }
        }
    }

    fn lvalue(&mut self, lhs: Expr, cx: &Ctx) -> Lvalue {
        let field = lhs
            .sym
            .filter(|s| self.syms.kind(*s) == SymKind::Var && self.syms.owner_class(*s).is_some())
            .filter(|s| !matches!(self.syms.name(*s), names::THIS | names::SUPER));
        if let Some(sym) = field {
            if let Some(host) = self.access_host(sym, cx) {
                let span = lhs.span;
                let receiver = if self.syms.is_static(sym) {
                    None
                } else {
                    Some(match lhs.kind {
                        ExprKind::Select { target, .. } => self.target(*target, cx),
                        _ => match self.implicit_receiver(sym, span, cx) {
                            Some(r) => r,
                            None => self.this_expr(cx, span),
                        },
                    })
                };
                return Lvalue::Access { sym, host, receiver };
            }
        }
        Lvalue::Plain(self.expr(lhs, cx))
    }
}

/// A translated assignment target.
enum Lvalue {
    Plain(Expr),
    /// A field only reachable through an access method in `host`.
    Access { sym: SymbolId, host: SymbolId, receiver: Option<Expr> },
}

/// Class declarations below a top-level class, with their constructors.
#[derive(Default)]
struct ClassCollector {
    classes: Vec<(SymbolId, Vec<SymbolId>)>,
}

impl Visit for ClassCollector {
    fn visit_class(&mut self, class: &ClassDecl) {
        if let Some(c) = class.sym {
            let ctors = class.methods().filter(|m| m.is_constructor()).filter_map(|m| m.sym).collect();
            self.classes.push((c, ctors));
        }
        walk_class(self, class);
    }
}

/// The name of the constructor a statement invokes, for `this(...)` and
/// `super(...)` calls.
pub(crate) fn self_call_name(stmt: &Stmt) -> Option<&'static str> {
    let StmtKind::Expr(Expr { kind: ExprKind::Call { meth, .. }, .. }) = &stmt.kind else { return None };
    match meth.name() {
        Some(names::THIS) => Some(names::THIS),
        Some(names::SUPER) => Some(names::SUPER),
        _ => None,
    }
}

/// Whether evaluating `e` twice is the same as evaluating it once.
pub(crate) fn is_pure(e: &Expr) -> bool {
    match &e.kind {
        ExprKind::Ident(_) => true,
        ExprKind::Select { target, .. } => matches!(target.kind, ExprKind::Ident(_)),
        ExprKind::Parens(inner) => is_pure(inner),
        _ => false,
    }
}

/// Modifiers of a nested class once it is a top-level one.
fn flattened_flags(flags: Flags) -> Flags {
    let mut out = flags;
    if flags.contains(Flags::PROTECTED) {
        out.insert(Flags::PUBLIC);
    }
    out.remove(Flags::PRIVATE | Flags::PROTECTED | Flags::STATIC);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_access_modifiers_widen_when_flattened() {
        assert_eq!(flattened_flags(Flags::PRIVATE | Flags::STATIC), Flags::EMPTY);
        assert_eq!(flattened_flags(Flags::PROTECTED | Flags::FINAL), Flags::PUBLIC | Flags::FINAL);
        assert_eq!(flattened_flags(Flags::PUBLIC), Flags::PUBLIC);
    }

    #[test]
    fn purity_of_simple_lvalues() {
        let span = Span::DUMMY;
        let x = Expr::new(span, ExprKind::Ident("x".into()));
        assert!(is_pure(&x));
        let field = Expr::new(span, ExprKind::Select { target: Box::new(x.clone()), name: "f".into() });
        assert!(is_pure(&field));
        let index = Expr::new(span, ExprKind::Index { indexed: Box::new(x.clone()), index: Box::new(x) });
        assert!(!is_pure(&index));
    }
}
