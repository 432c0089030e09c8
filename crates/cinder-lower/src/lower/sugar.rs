//! Enhanced for loops, try-with-resources and assertions.

use tracing::trace;

use cinder_ast::{BinOp, Block, Catch, Expr, NodeId, Stmt, StmtKind, TreeMaker, UnOp, VarDecl};
use cinder_common::Span;
use cinder_symtab::{names, Constant, Flags, SymbolId, Type};

use super::{Ctx, Lowerer};

impl Lowerer<'_> {
    // ── Enhanced for ───────────────────────────────────────────────────

    /// An enhanced for loop over an array or an `Iterable`. The loop that
    /// replaces it keeps its id, so jumps in the body need no retargeting.
    pub(crate) fn foreach(&mut self, id: NodeId, span: Span, var: VarDecl, expr: Expr, body: Stmt, cx: &Ctx) -> Stmt {
        let expr = self.expr(expr, cx);
        if expr.ty().is_array() {
            self.array_loop(id, span, var, expr, body, cx)
        } else {
            self.iterator_loop(id, span, var, expr, body, cx)
        }
    }

    /// ```text
    /// { final T[] arr$ = expr; final int len$ = arr$.length;
    ///   for (int i$ = 0; i$ < len$; ++i$) { T x = arr$[i$]; body } }
    /// ```
    fn array_loop(&mut self, id: NodeId, span: Span, var: VarDecl, expr: Expr, body: Stmt, cx: &Ctx) -> Stmt {
        let make = TreeMaker::at(span);
        let int = Type::int();
        let flags = Flags::FINAL | Flags::SYNTHETIC | Flags::LOWERED;
        let arr = self.fresh_local(cx, "arr$", flags, expr.ty());
        let len = self.fresh_local(cx, "len$", flags, int.clone());
        let index = self.fresh_local(cx, "i$", Flags::SYNTHETIC | Flags::LOWERED, int.clone());

        let length = make.select(self.syms, make.ident(self.syms, arr), self.syms.predef.length);
        let less = self.operator(BinOp::Lt.symbol(), &[int.clone(), int.clone()]);
        let plus = self.operator(BinOp::Add.symbol(), &[int.clone(), int]);
        let cond = make.binary(self.syms, BinOp::Lt, less, make.ident(self.syms, index), make.ident(self.syms, len));
        let step = make.unary(self.syms, UnOp::PreInc, Some(plus), make.ident(self.syms, index));
        let elem = make.index(make.ident(self.syms, arr), make.ident(self.syms, index));

        let body = self.loop_body(span, var, elem, body, cx);
        let lowered = Stmt {
            id,
            span,
            kind: StmtKind::For {
                init: vec![make.local_var(self.syms, index, Some(make.int(0)))],
                cond: Some(cond),
                step: vec![step],
                body: Box::new(body),
            },
        };
        make.block_stmt(vec![
            make.local_var(self.syms, arr, Some(expr)),
            make.local_var(self.syms, len, Some(length)),
            lowered,
        ])
    }

    /// ```text
    /// for (Iterator<T> i$ = expr.iterator(); i$.hasNext(); ) { T x = i$.next(); body }
    /// ```
    fn iterator_loop(&mut self, id: NodeId, span: Span, var: VarDecl, expr: Expr, body: Stmt, cx: &Ctx) -> Stmt {
        let make = TreeMaker::at(span);
        let p = &self.syms.predef;
        let (iterable, iterator) = (p.iterable, p.iterator);
        let iterator_method = self.syms.methods_named(iterable, names::ITERATOR).next();
        let has_next = self.syms.methods_named(iterator, names::HAS_NEXT).next();
        let next = self.syms.methods_named(iterator, names::NEXT).next();
        let (Some(iterator_method), Some(has_next), Some(next)) = (iterator_method, has_next, next) else {
            return Stmt { id, span, kind: StmtKind::ForEach { var, expr, body: Box::new(self.stmt(body, cx)) } };
        };

        let start = make.call_method(self.syms, expr, iterator_method, Vec::new());
        let it = self.fresh_local(cx, "i$", Flags::SYNTHETIC | Flags::LOWERED, start.ty());
        let cond = make.call_method(self.syms, make.ident(self.syms, it), has_next, Vec::new());
        let elem = make.call_method(self.syms, make.ident(self.syms, it), next, Vec::new());
        let body = self.loop_body(span, var, elem, body, cx);
        Stmt {
            id,
            span,
            kind: StmtKind::For {
                init: vec![make.local_var(self.syms, it, Some(start))],
                cond: Some(cond),
                step: Vec::new(),
                body: Box::new(body),
            },
        }
    }

    fn loop_body(&mut self, span: Span, mut var: VarDecl, elem: Expr, body: Stmt, cx: &Ctx) -> Stmt {
        let target = var.sym.map(|v| self.syms.ty(v).clone()).unwrap_or(Type::Error);
        var.init = Some(self.coerce(elem, &target));
        let body = self.stmt(body, cx);
        TreeMaker::at(span).block_stmt(vec![Stmt::new(var.span, StmtKind::LocalVar(var)), body])
    }

    fn fresh_local(&mut self, cx: &Ctx, base: &str, flags: Flags, ty: Type) -> SymbolId {
        let name = self.fresh.name(cx.owner, base);
        self.syms.new_var(cx.owner, &name, flags, ty)
    }

    // ── Try with resources ─────────────────────────────────────────────

    /// Resources are closed innermost first. Each one becomes
    ///
    /// ```text
    /// { final R r = init; Throwable primary$ = null;
    ///   try { inner } catch (Throwable t$) { primary$ = t$; throw t$; }
    ///   finally { if (r != null) { if (primary$ != null) {
    ///     try { r.close(); } catch (Throwable x$) { primary$.addSuppressed(x$); }
    ///   } else { r.close(); } } } }
    /// ```
    ///
    /// and the catches and finalizer of the statement wrap the outermost.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn try_with_resources(
        &mut self,
        id: NodeId,
        span: Span,
        resources: Vec<VarDecl>,
        body: Block,
        catches: Vec<Catch>,
        finalizer: Option<Block>,
        cx: &Ctx,
    ) -> Stmt {
        let count = resources.len();
        let block = self.resource_block(resources, body, span, cx);
        trace!(resources = count, "try with resources");
        if catches.is_empty() && finalizer.is_none() {
            return Stmt { id, span, kind: StmtKind::Block(block) };
        }
        Stmt {
            id,
            span,
            kind: StmtKind::Try {
                resources: Vec::new(),
                body: block,
                catches: catches.into_iter().map(|c| self.catch(c, cx)).collect(),
                finalizer: finalizer.map(|f| self.block(f, cx)),
            },
        }
    }

    fn resource_block(&mut self, mut resources: Vec<VarDecl>, body: Block, span: Span, cx: &Ctx) -> Block {
        if resources.is_empty() {
            return self.block(body, cx);
        }
        let resource = resources.remove(0);
        let resource = self.local_var(resource, cx);
        let inner = self.resource_block(resources, body, span, cx);
        let Some(r) = resource.sym else { return inner };

        let make = TreeMaker::at(span);
        let object = self.syms.object_type();
        let throwable = Type::class(self.syms.predef.throwable);
        let primary = self.fresh_local(cx, "primary$", Flags::SYNTHETIC | Flags::LOWERED, throwable.clone());
        let caught = self.fresh_local(cx, "t$", Flags::FINAL | Flags::PARAMETER | Flags::SYNTHETIC | Flags::LOWERED, throwable.clone());
        let suppressed = self.fresh_local(cx, "x$", Flags::FINAL | Flags::PARAMETER | Flags::SYNTHETIC | Flags::LOWERED, throwable);

        let rethrow = make.catch(
            make.var_decl(self.syms, caught, None),
            make.block(vec![
                make.exec(make.assign(make.ident(self.syms, primary), make.ident(self.syms, caught))),
                make.throw(make.ident(self.syms, caught)),
            ]),
        );

        let close = self.close_method(self.syms.ty(r).clone());
        let close_call = |lowerer: &Self| match close {
            Some(m) => make.exec(make.call_method(lowerer.syms, make.ident(lowerer.syms, r), m, Vec::new())),
            None => make.skip(),
        };
        let add_suppressed = self.syms.methods_named(self.syms.predef.throwable, names::ADD_SUPPRESSED).next();
        let record = match add_suppressed {
            Some(m) => make.exec(make.call_method(
                self.syms,
                make.ident(self.syms, primary),
                m,
                vec![make.ident(self.syms, suppressed)],
            )),
            None => make.skip(),
        };
        let guarded_close = make.try_(
            make.block(vec![close_call(self)]),
            vec![make.catch(make.var_decl(self.syms, suppressed, None), make.block(vec![record]))],
            None,
        );
        let ne = self.operator(BinOp::Ne.symbol(), &[object.clone(), object]);
        let primary_set = make.binary(self.syms, BinOp::Ne, ne, make.ident(self.syms, primary), make.null());
        let resource_set = make.binary(self.syms, BinOp::Ne, ne, make.ident(self.syms, r), make.null());
        let closing = make.if_(
            resource_set,
            make.block_stmt(vec![make.if_(primary_set, make.block_stmt(vec![guarded_close]), Some(make.block_stmt(vec![close_call(self)])))]),
            None,
        );

        let guarded = make.try_(inner, vec![rethrow], Some(make.block(vec![closing])));
        make.block(vec![
            Stmt::new(resource.span, StmtKind::LocalVar(resource)),
            make.local_var(self.syms, primary, Some(make.null())),
            guarded,
        ])
    }

    /// The `close()` a resource of type `ty` invokes: the most specific
    /// one among its supertypes, else `AutoCloseable.close()`.
    fn close_method(&self, ty: Type) -> Option<SymbolId> {
        self.syms
            .closure(&ty)
            .iter()
            .filter_map(Type::class_sym)
            .find_map(|c| {
                self.syms.methods_named(c, names::CLOSE).find(|m| self.syms.ty(*m).params().is_empty())
            })
            .or_else(|| self.syms.methods_named(self.syms.predef.auto_closeable, names::CLOSE).next())
    }

    // ── Assertions ─────────────────────────────────────────────────────

    /// `if (!C.$assertionsDisabled && !cond) throw new AssertionError(detail);`
    /// An assertion that holds as a constant disappears.
    pub(crate) fn assert(&mut self, id: NodeId, span: Span, cond: Expr, detail: Option<Expr>, cx: &Ctx) -> Stmt {
        if cond.constant == Some(Constant::Bool(true)) {
            return Stmt { id, span, kind: StmtKind::Skip };
        }
        let make = TreeMaker::at(span);
        let boolean = Type::boolean();
        let not = self.operator(UnOp::Not.symbol(), &[boolean.clone()]);
        let and = self.operator(BinOp::And.symbol(), &[boolean.clone(), boolean]);

        let flag = self.assertions_flag(cx.class);
        let flag_ref = match self.syms.owner_class(flag) {
            Some(owner) if owner != cx.class => make.select(self.syms, make.type_ident(self.syms, owner), flag),
            _ => make.ident(self.syms, flag),
        };
        let enabled = make.unary(self.syms, UnOp::Not, Some(not), flag_ref);
        let cond = self.condition(cond, cx);
        let failed = make.unary(self.syms, UnOp::Not, Some(not), cond);
        let test = make.binary(self.syms, BinOp::And, and, enabled, failed);

        let error = self.syms.predef.assertion_error;
        let arity = usize::from(detail.is_some());
        let ctor = self.syms.constructors(error).into_iter().find(|c| self.syms.ty(*c).params().len() == arity);
        let object = self.syms.object_type();
        let args: Vec<Expr> = detail
            .map(|d| {
                let d = self.expr(d, cx);
                self.coerce(d, &object)
            })
            .into_iter()
            .collect();
        let Some(ctor) = ctor else { return Stmt { id, span, kind: StmtKind::Skip } };
        let raise = make.throw(make.new_class(self.syms, Type::class(error), ctor, args));
        Stmt { id, span, kind: StmtKind::If { cond: test, then: Box::new(raise), els: None } }
    }

    /// The `$assertionsDisabled` field consulted from `class`. Interfaces
    /// cannot hold one and use their top-level class's.
    fn assertions_flag(&mut self, class: SymbolId) -> SymbolId {
        let host = if self.syms.is_interface(class) { self.top } else { class };
        if let Some(flag) = self.assertion_flags.get(&host) {
            return *flag;
        }
        let flags = Flags::STATIC | Flags::FINAL | Flags::SYNTHETIC | Flags::LOWERED;
        let flag = self.syms.new_var(host, names::ASSERTIONS_DISABLED, flags, Type::boolean());
        self.syms.enter_member(host, flag);
        self.assertion_flags.insert(host, flag);
        flag
    }

    /// `static final boolean $assertionsDisabled = !Top.class.desiredAssertionStatus();`
    pub(crate) fn assertion_flag_decl(&self, flag: SymbolId, span: Span) -> VarDecl {
        let make = TreeMaker::at(span);
        let top = self.syms.outermost_class(flag).unwrap_or(self.top);
        let desired = self.syms.methods_named(self.syms.predef.class, names::DESIRED_ASSERTION_STATUS).next();
        let init = desired.map(|m| {
            let literal = make.class_literal(self.syms, self.syms.erasure(self.syms.ty(top)));
            let status = make.call_method(self.syms, literal, m, Vec::new());
            let not = self.operator(UnOp::Not.symbol(), &[Type::boolean()]);
            make.unary(self.syms, UnOp::Not, Some(not), status)
        });
        make.var_decl(self.syms, flag, init)
    }
}
