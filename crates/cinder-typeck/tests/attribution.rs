//! Attribution of method bodies: expression typing, constant folding,
//! overload resolution and the inline diagnostics.

use cinder_ast::visit::{walk_expr, Visit};
use cinder_ast::{BinOp, ClassDecl, CompilationUnit, Expr, ExprKind, Member, SourceBuilder, Stmt, StmtKind};
use cinder_common::{CompileOptions, LintCategory, Log, SourceLevel};
use cinder_symtab::{Constant, Flags, Prim, SymbolId, Symtab, Type};
use cinder_typeck::check_unit;

// ── Helpers ────────────────────────────────────────────────────────────

fn check_with(mut unit: CompilationUnit, opts: &CompileOptions) -> (Symtab, Log, CompilationUnit) {
    let mut syms = Symtab::new();
    let mut log = Log::new();
    check_unit(&mut syms, &mut unit, opts, &mut log).expect("unit should be processed");
    (syms, log, unit)
}

fn check(unit: CompilationUnit) -> (Symtab, Log, CompilationUnit) {
    check_with(unit, &CompileOptions::default())
}

fn error_keys(log: &Log) -> Vec<&'static str> {
    log.errors().map(|d| d.key).collect()
}

/// A unit with one class `C` whose only method `void m()` has `body`.
fn unit_with_body(b: &SourceBuilder, extra: Vec<Member>, body: Vec<Stmt>) -> CompilationUnit {
    let mut members = extra;
    members.push(Member::Method(b.method(Flags::EMPTY, b.void(), "m", vec![], Some(body))));
    b.unit("p", vec![], vec![b.class(Flags::PUBLIC, "C", members)])
}

fn int(b: &SourceBuilder) -> Expr {
    b.prim(Prim::Int)
}

struct Calls(Vec<Option<SymbolId>>);

impl Visit for Calls {
    fn visit_expr(&mut self, e: &Expr) {
        if matches!(e.kind, ExprKind::Call { .. }) {
            self.0.push(e.sym);
        }
        walk_expr(self, e);
    }
}

fn call_syms(class: &ClassDecl) -> Vec<Option<SymbolId>> {
    let mut calls = Calls(Vec::new());
    calls.visit_class(class);
    calls.0
}

struct VarargsElems(Vec<Option<Type>>);

impl Visit for VarargsElems {
    fn visit_expr(&mut self, e: &Expr) {
        if let ExprKind::Call { varargs_elem, .. } = &e.kind {
            self.0.push(varargs_elem.clone());
        }
        walk_expr(self, e);
    }
}

fn field_sym(syms: &Symtab, class: &ClassDecl, name: &str) -> SymbolId {
    let c = class.sym.expect("class entered");
    syms.members(c).lookup(name).next().expect("field entered")
}

// ── Well-typed code ────────────────────────────────────────────────────

#[test]
fn arithmetic_on_fields_and_locals() {
    let b = SourceBuilder::new();
    let field = b.field(Flags::EMPTY, int(&b), "f", None);
    let body = vec![
        b.local(int(&b), "x", Some(b.binary(BinOp::Add, b.ident("f"), b.int(1)))),
        b.exec(b.assign(b.ident("f"), b.binary(BinOp::Mul, b.ident("x"), b.int(2)))),
    ];
    let (_, log, _) = check(unit_with_body(&b, vec![field], body));
    assert!(!log.has_errors(), "{:?}", log.diagnostics());
}

#[test]
fn constant_fields_are_folded() {
    let b = SourceBuilder::new();
    let k = b.field(
        Flags::STATIC | Flags::FINAL,
        int(&b),
        "K",
        Some(b.binary(BinOp::Add, b.binary(BinOp::Mul, b.int(2), b.int(3)), b.int(1))),
    );
    let s = b.field(Flags::STATIC | Flags::FINAL, b.ident("String"), "S", Some(b.binary(BinOp::Add, b.str("a"), b.ident("K"))));
    let unit = b.unit("p", vec![], vec![b.class(Flags::EMPTY, "C", vec![k, s])]);
    let (syms, log, unit) = check(unit);
    assert!(!log.has_errors(), "{:?}", log.diagnostics());
    let class = &unit.classes[0];
    assert_eq!(syms.sym(field_sym(&syms, class, "K")).const_value(), Some(&Constant::Int(7)));
    assert_eq!(syms.sym(field_sym(&syms, class, "S")).const_value(), Some(&Constant::Str("a7".into())));
}

#[test]
fn most_specific_overload_is_chosen() {
    let b = SourceBuilder::new();
    let f_obj = b.method(Flags::EMPTY, b.void(), "f", vec![b.param(b.ident("Object"), "o")], Some(vec![]));
    let f_str = b.method(Flags::EMPTY, b.void(), "f", vec![b.param(b.ident("String"), "s")], Some(vec![]));
    let body = vec![b.exec(b.call_named("f", vec![b.str("x")]))];
    let (syms, log, unit) = check(unit_with_body(&b, vec![Member::Method(f_obj), Member::Method(f_str)], body));
    assert!(!log.has_errors(), "{:?}", log.diagnostics());
    let calls = call_syms(&unit.classes[0]);
    let chosen = calls.iter().flatten().find(|s| syms.name(**s) == "f").copied().expect("call resolved");
    assert_eq!(syms.ty(chosen).params(), &[syms.string_type()]);
}

#[test]
fn generic_method_type_argument_is_inferred() {
    let b = SourceBuilder::new();
    let mut id = b.method(Flags::STATIC, b.ident("T"), "id", vec![b.param(b.ident("T"), "t")], Some(vec![b.return_(Some(b.ident("t")))]));
    id.type_params = vec![b.type_param("T", vec![])];
    let body = vec![b.local(b.ident("String"), "s", Some(b.call_named("id", vec![b.str("x")])))];
    let (_, log, _) = check(unit_with_body(&b, vec![Member::Method(id)], body));
    assert!(!log.has_errors(), "{:?}", log.diagnostics());
}

#[test]
fn boxing_depends_on_source_level() {
    let body = |b: &SourceBuilder| vec![b.local(b.ident("Integer"), "i", Some(b.int(5)))];
    let b = SourceBuilder::new();
    let (_, log, _) = check(unit_with_body(&b, vec![], body(&b)));
    assert!(!log.has_errors(), "{:?}", log.diagnostics());

    let b = SourceBuilder::new();
    let (_, log, _) = check_with(unit_with_body(&b, vec![], body(&b)), &CompileOptions::for_source(SourceLevel::V1_4));
    assert_eq!(error_keys(&log), vec!["incompatible.types"]);
}

#[test]
fn foreach_over_arrays() {
    let b = SourceBuilder::new();
    let arr = b.array_init(Some(int(&b)), vec![b.int(1), b.int(2)]);
    let body = vec![
        b.local(b.array_of(int(&b)), "xs", Some(arr)),
        b.local(int(&b), "sum", Some(b.int(0))),
        b.foreach(int(&b), "x", b.ident("xs"), b.exec(b.assign_op(BinOp::Add, b.ident("sum"), b.ident("x")))),
    ];
    let (_, log, _) = check(unit_with_body(&b, vec![], body));
    assert!(!log.has_errors(), "{:?}", log.diagnostics());
}

#[test]
fn variable_arity_calls_collect_trailing_arguments() {
    let b = SourceBuilder::new();
    let count = b.method(
        Flags::STATIC | Flags::VARARGS,
        int(&b),
        "count",
        vec![b.param(b.array_of(b.ident("String")), "xs")],
        Some(vec![b.return_(Some(b.select(b.ident("xs"), "length")))]),
    );
    let body = vec![
        b.exec(b.call_named("count", vec![b.str("a"), b.str("b")])),
        b.exec(b.call_named("count", vec![])),
        b.exec(b.call_named("count", vec![b.array_init(Some(b.ident("String")), vec![b.str("c")])])),
    ];
    let (syms, log, unit) = check(unit_with_body(&b, vec![Member::Method(count)], body));
    assert!(!log.has_errors(), "{:?}", log.diagnostics());

    let mut elems = VarargsElems(Vec::new());
    elems.visit_class(&unit.classes[0]);
    // An array argument is passed as is.
    assert_eq!(elems.0, vec![Some(syms.string_type()), Some(syms.string_type()), None]);
}

#[test]
fn inner_class_created_through_qualifying_instance() {
    let b = SourceBuilder::new();
    let inner = b.class(Flags::EMPTY, "Inner", vec![]);
    let outer = b.class(Flags::EMPTY, "Outer", vec![Member::Class(inner)]);
    let create = b.new_qualified(b.ident("o"), b.ident("Inner"), vec![]);
    let m = b.method(Flags::EMPTY, b.ident("Object"), "m", vec![b.param(b.ident("Outer"), "o")], Some(vec![b.return_(Some(create))]));
    let user = b.class(Flags::EMPTY, "User", vec![Member::Method(m)]);
    let (_, log, _) = check(b.unit("p", vec![], vec![outer, user]));
    assert!(!log.has_errors(), "{:?}", log.diagnostics());
}

// ── Inline diagnostics ─────────────────────────────────────────────────

#[test]
fn incompatible_initializer() {
    let b = SourceBuilder::new();
    let body = vec![b.local(int(&b), "x", Some(b.str("s")))];
    let (_, log, _) = check(unit_with_body(&b, vec![], body));
    assert_eq!(error_keys(&log), vec!["incompatible.types"]);
}

#[test]
fn narrowing_constants_fit_or_lose_precision() {
    let b = SourceBuilder::new();
    let body = vec![
        b.local(b.prim(Prim::Byte), "ok", Some(b.int(10))),
        b.local(b.prim(Prim::Byte), "bad", Some(b.int(300))),
    ];
    let (_, log, _) = check(unit_with_body(&b, vec![], body));
    assert_eq!(error_keys(&log), vec!["possible.loss.of.precision"]);
}

#[test]
fn unknown_variable_is_reported_once() {
    let b = SourceBuilder::new();
    let body = vec![b.local(int(&b), "x", Some(b.binary(BinOp::Add, b.ident("nope"), b.int(1))))];
    let (_, log, _) = check(unit_with_body(&b, vec![], body));
    let keys = error_keys(&log);
    assert_eq!(keys.len(), 1, "{keys:?}");
    assert!(keys[0].starts_with("cant.resolve"), "{keys:?}");
}

#[test]
fn assignment_to_final_local() {
    let b = SourceBuilder::new();
    let decl = b.var(Flags::FINAL, int(&b), "x", Some(b.int(1)));
    let body = vec![
        Stmt::new(b.span(), StmtKind::LocalVar(decl)),
        b.exec(b.assign(b.ident("x"), b.int(2))),
    ];
    let (_, log, _) = check(unit_with_body(&b, vec![], body));
    assert_eq!(error_keys(&log), vec!["cant.assign.val.to.final.var"]);
}

#[test]
fn return_checks() {
    let b = SourceBuilder::new();
    let needs_value = b.method(Flags::EMPTY, int(&b), "f", vec![], Some(vec![b.return_(None)]));
    let body = vec![b.return_(Some(b.int(1)))];
    let (_, log, _) = check(unit_with_body(&b, vec![Member::Method(needs_value)], body));
    let mut keys = error_keys(&log);
    keys.sort();
    assert_eq!(keys, vec!["missing.ret.val", "unexpected.ret.val"]);
}

#[test]
fn jumps_need_targets() {
    let b = SourceBuilder::new();
    let body = vec![
        b.break_(None),
        b.while_(b.bool(true), b.block_stmt(vec![b.continue_(Some("outer"))])),
        b.labeled("l", b.labeled("l", b.skip())),
    ];
    let (_, log, _) = check(unit_with_body(&b, vec![], body));
    assert_eq!(error_keys(&log), vec!["break.outside.switch.loop", "undef.label", "label.already.in.use"]);
}

#[test]
fn ambiguous_overloads() {
    let b = SourceBuilder::new();
    let f1 = b.method(Flags::EMPTY, b.void(), "f", vec![b.param(b.ident("String"), "a"), b.param(b.ident("Object"), "b")], Some(vec![]));
    let f2 = b.method(Flags::EMPTY, b.void(), "f", vec![b.param(b.ident("Object"), "a"), b.param(b.ident("String"), "b")], Some(vec![]));
    let body = vec![b.exec(b.call_named("f", vec![b.str("x"), b.str("y")]))];
    let (_, log, _) = check(unit_with_body(&b, vec![Member::Method(f1), Member::Method(f2)], body));
    assert_eq!(error_keys(&log), vec!["ref.ambiguous"]);
}

#[test]
fn abstract_and_enum_instantiation() {
    let b = SourceBuilder::new();
    let shape = b.class(Flags::ABSTRACT, "Shape", vec![]);
    let color = b.enum_(Flags::EMPTY, "Color", vec![("RED", vec![]), ("GREEN", vec![])], vec![]);
    let body = vec![b.exec(b.new_(b.ident("Shape"), vec![])), b.exec(b.new_(b.ident("Color"), vec![]))];
    let main = b.class(Flags::EMPTY, "C", vec![Member::Method(b.method(Flags::EMPTY, b.void(), "m", vec![], Some(body)))]);
    let (_, log, _) = check(b.unit("p", vec![], vec![shape, color, main]));
    assert_eq!(error_keys(&log), vec!["abstract.cant.be.instantiated", "enum.cant.be.instantiated"]);
}

#[test]
fn duplicate_case_labels() {
    let b = SourceBuilder::new();
    let sw = b.switch(
        b.int(1),
        vec![b.case(b.int(1), vec![]), b.case(b.int(1), vec![]), b.default_case(vec![]), b.default_case(vec![])],
    );
    let (_, log, _) = check(unit_with_body(&b, vec![], vec![sw]));
    assert_eq!(error_keys(&log), vec!["duplicate.case.label", "duplicate.default.label"]);
}

#[test]
fn enum_switch_takes_unqualified_constants() {
    let b = SourceBuilder::new();
    let color = b.enum_(Flags::EMPTY, "Color", vec![("RED", vec![]), ("GREEN", vec![])], vec![]);
    let sw = b.switch(
        b.ident("c"),
        vec![b.case(b.ident("RED"), vec![b.break_(None)]), b.case(b.select(b.ident("Color"), "GREEN"), vec![])],
    );
    let m = b.method(Flags::EMPTY, b.void(), "m", vec![b.param(b.ident("Color"), "c")], Some(vec![sw]));
    let main = b.class(Flags::EMPTY, "C", vec![Member::Method(m)]);
    let (_, log, _) = check(b.unit("p", vec![], vec![color, main]));
    assert_eq!(error_keys(&log), vec!["enum.label.must.be.unqualified.enum"]);
}

#[test]
fn illegal_forward_reference_between_fields() {
    let b = SourceBuilder::new();
    let a = b.field(Flags::EMPTY, int(&b), "a", Some(b.ident("z")));
    let z = b.field(Flags::EMPTY, int(&b), "z", Some(b.int(1)));
    let (_, log, _) = check(b.unit("p", vec![], vec![b.class(Flags::EMPTY, "C", vec![a, z])]));
    assert_eq!(error_keys(&log), vec!["illegal.forward.ref"]);
}

#[test]
fn redundant_cast_lint_is_opt_in() {
    let body = |b: &SourceBuilder| vec![b.local(b.prim(Prim::Int), "x", Some(b.cast(b.prim(Prim::Int), b.int(1))))];
    let b = SourceBuilder::new();
    let (_, log, _) = check(unit_with_body(&b, vec![], body(&b)));
    assert_eq!(log.warnings().count(), 0);

    let b = SourceBuilder::new();
    let opts = CompileOptions { lint: vec![LintCategory::Cast], ..CompileOptions::default() };
    let (_, log, _) = check_with(unit_with_body(&b, vec![], body(&b)), &opts);
    let warnings: Vec<_> = log.warnings().map(|d| (d.key, d.lint)).collect();
    assert_eq!(warnings, vec![("redundant.cast", Some(LintCategory::Cast))]);
}

#[test]
fn class_literal_has_parameterized_class_type() {
    let b = SourceBuilder::new();
    let lit = b.class_literal(b.ident("String"));
    let body = vec![b.exec(b.invoke(lit, "desiredAssertionStatus", vec![]))];
    let (syms, log, unit) = check(unit_with_body(&b, vec![], body));
    assert!(!log.has_errors(), "{:?}", log.diagnostics());
    let calls = call_syms(&unit.classes[0]);
    assert!(calls.iter().flatten().any(|s| syms.owner(*s) == Some(syms.predef.class)));
}
