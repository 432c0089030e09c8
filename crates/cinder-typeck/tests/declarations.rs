//! Declaration-level checks, partial attribution and rendered diagnostics.

use cinder_ast::{CompilationUnit, ExprKind, Member, SourceBuilder, StmtKind};
use cinder_common::{CompileOptions, Log};
use cinder_symtab::{Flags, Prim, Symtab, Type};
use cinder_typeck::diagnostics::{format_message, render_diagnostic};
use cinder_typeck::{attrib_until, check_unit};

fn check(mut unit: CompilationUnit) -> (Symtab, Log) {
    let mut syms = Symtab::new();
    let mut log = Log::new();
    check_unit(&mut syms, &mut unit, &CompileOptions::default(), &mut log).expect("unit should be processed");
    (syms, log)
}

fn error_keys(log: &Log) -> Vec<&'static str> {
    log.errors().map(|d| d.key).collect()
}

// ── Overriding ─────────────────────────────────────────────────────────

#[test]
fn weaker_access_in_override() {
    let b = SourceBuilder::new();
    let p = b.class(Flags::EMPTY, "P", vec![Member::Method(b.method(Flags::PUBLIC, b.void(), "run", vec![], Some(vec![])))]);
    let mut q = b.class(Flags::EMPTY, "Q", vec![Member::Method(b.method(Flags::EMPTY, b.void(), "run", vec![], Some(vec![])))]);
    q.extends = Some(b.ident("P"));
    let (_, log) = check(b.unit("p", vec![], vec![p, q]));
    assert_eq!(error_keys(&log), vec!["override.weaker.access"]);
}

#[test]
fn incompatible_return_in_override() {
    let b = SourceBuilder::new();
    let p = b.class(
        Flags::EMPTY,
        "P",
        vec![Member::Method(b.method(Flags::EMPTY, b.prim(Prim::Int), "size", vec![], Some(vec![b.return_(Some(b.int(0)))])))],
    );
    let mut q = b.class(Flags::EMPTY, "Q", vec![Member::Method(b.method(Flags::EMPTY, b.void(), "size", vec![], Some(vec![])))]);
    q.extends = Some(b.ident("P"));
    let (_, log) = check(b.unit("p", vec![], vec![p, q]));
    assert_eq!(error_keys(&log), vec!["override.incompatible.ret"]);
}

#[test]
fn covariant_return_is_accepted() {
    let b = SourceBuilder::new();
    let p = b.class(
        Flags::EMPTY,
        "P",
        vec![Member::Method(b.method(Flags::EMPTY, b.ident("Object"), "get", vec![], Some(vec![b.return_(Some(b.null()))])))],
    );
    let mut q = b.class(
        Flags::EMPTY,
        "Q",
        vec![Member::Method(b.method(Flags::EMPTY, b.ident("String"), "get", vec![], Some(vec![b.return_(Some(b.str("q")))])))],
    );
    q.extends = Some(b.ident("P"));
    let (_, log) = check(b.unit("p", vec![], vec![p, q]));
    assert!(!log.has_errors(), "{:?}", log.diagnostics());
}

#[test]
fn final_methods_cannot_be_overridden() {
    let b = SourceBuilder::new();
    let p = b.class(Flags::EMPTY, "P", vec![Member::Method(b.method(Flags::FINAL, b.void(), "m", vec![], Some(vec![])))]);
    let mut q = b.class(Flags::EMPTY, "Q", vec![Member::Method(b.method(Flags::EMPTY, b.void(), "m", vec![], Some(vec![])))]);
    q.extends = Some(b.ident("P"));
    let (_, log) = check(b.unit("p", vec![], vec![p, q]));
    assert_eq!(error_keys(&log), vec!["override.meth"]);
    assert_eq!(log.errors().next().and_then(|d| d.args.last()).map(String::as_str), Some("final"));
}

#[test]
fn static_method_cannot_hide_instance_method() {
    let b = SourceBuilder::new();
    let p = b.class(Flags::EMPTY, "P", vec![Member::Method(b.method(Flags::EMPTY, b.void(), "m", vec![], Some(vec![])))]);
    let mut q = b.class(Flags::EMPTY, "Q", vec![Member::Method(b.method(Flags::STATIC, b.void(), "m", vec![], Some(vec![])))]);
    q.extends = Some(b.ident("P"));
    let (_, log) = check(b.unit("p", vec![], vec![p, q]));
    assert_eq!(error_keys(&log), vec!["override.static"]);
}

#[test]
fn unimplemented_interface_method() {
    let b = SourceBuilder::new();
    let task = b.interface(Flags::EMPTY, "Task", vec![Member::Method(b.method(Flags::EMPTY, b.void(), "run", vec![], None))]);
    let mut job = b.class(Flags::EMPTY, "Job", vec![]);
    job.implements = vec![b.ident("Task")];
    let (_, log) = check(b.unit("p", vec![], vec![task, job]));
    assert_eq!(error_keys(&log), vec!["does.not.override.abstract"]);

    let b = SourceBuilder::new();
    let task = b.interface(Flags::EMPTY, "Task", vec![Member::Method(b.method(Flags::EMPTY, b.void(), "run", vec![], None))]);
    let mut job = b.class(Flags::EMPTY, "Job", vec![Member::Method(b.method(Flags::PUBLIC, b.void(), "run", vec![], Some(vec![])))]);
    job.implements = vec![b.ident("Task")];
    let (_, log) = check(b.unit("p", vec![], vec![task, job]));
    assert!(!log.has_errors(), "{:?}", log.diagnostics());
}

// ── Class headers ──────────────────────────────────────────────────────

#[test]
fn enum_declaration_is_well_formed() {
    let b = SourceBuilder::new();
    let color = b.enum_(Flags::EMPTY, "Color", vec![("RED", vec![]), ("GREEN", vec![])], vec![]);
    let (_, log) = check(b.unit("p", vec![], vec![color]));
    assert!(!log.has_errors(), "{:?}", log.diagnostics());
}

#[test]
fn protected_constructor_reached_through_super_call() {
    let b = SourceBuilder::new();
    let base = b.class(Flags::EMPTY, "Base", vec![Member::Method(b.ctor(Flags::PROTECTED, vec![b.param(b.prim(Prim::Int), "x")], vec![]))]);
    let ctor = b.ctor(Flags::EMPTY, vec![], vec![b.exec(b.call_named("super", vec![b.int(1)]))]);
    let mut sub = b.class(Flags::EMPTY, "Sub", vec![Member::Method(ctor)]);
    sub.extends = Some(b.ident("Base"));
    let (_, log) = check(b.unit("p", vec![], vec![base, sub]));
    assert!(!log.has_errors(), "{:?}", log.diagnostics());
}

#[test]
fn header_type_arguments_may_name_classes_not_yet_completed() {
    let b = SourceBuilder::new();
    let compare = |b: &SourceBuilder, other: &str| {
        Member::Method(b.method(Flags::PUBLIC, b.prim(Prim::Int), "compareTo", vec![b.param(b.ident(other), "o")], Some(vec![b.return_(Some(b.int(0)))])))
    };
    let mut name = b.class(Flags::EMPTY, "Name", vec![compare(&b, "Name")]);
    name.implements = vec![b.apply(b.ident("Comparable"), vec![b.ident("Name")])];
    let mut first = b.class(Flags::EMPTY, "First", vec![compare(&b, "Later")]);
    first.implements = vec![b.apply(b.ident("Comparable"), vec![b.ident("Later")])];
    let later = b.class(Flags::EMPTY, "Later", vec![]);
    let (_, log) = check(b.unit("p", vec![], vec![name, first, later]));
    assert!(!log.has_errors(), "{:?}", log.diagnostics());
}

#[test]
fn header_type_argument_outside_its_bound() {
    let b = SourceBuilder::new();
    let mut num = b.class(Flags::EMPTY, "Num", vec![]);
    num.type_params = vec![b.type_param("T", vec![b.ident("Number")])];
    let mut bad = b.class(Flags::EMPTY, "Bad", vec![]);
    bad.extends = Some(b.apply(b.ident("Num"), vec![b.ident("String")]));
    let mut good = b.class(Flags::EMPTY, "Good", vec![]);
    good.extends = Some(b.apply(b.ident("Num"), vec![b.ident("Integer")]));
    let (_, log) = check(b.unit("p", vec![], vec![num, bad, good]));
    assert_eq!(error_keys(&log), vec!["not.within.bounds"]);
}

// ── Modifiers and bodies ───────────────────────────────────────────────

#[test]
fn abstract_final_class() {
    let b = SourceBuilder::new();
    let c = b.class(Flags::ABSTRACT | Flags::FINAL, "C", vec![]);
    let (_, log) = check(b.unit("p", vec![], vec![c]));
    assert_eq!(error_keys(&log), vec!["illegal.combination.of.modifiers"]);
}

#[test]
fn method_bodies_must_match_modifiers() {
    let b = SourceBuilder::new();
    let members = vec![
        Member::Method(b.method(Flags::EMPTY, b.void(), "missing", vec![], None)),
        Member::Method(b.method(Flags::ABSTRACT, b.void(), "extra", vec![], Some(vec![]))),
    ];
    let c = b.class(Flags::ABSTRACT, "C", members);
    let (_, log) = check(b.unit("p", vec![], vec![c]));
    assert_eq!(error_keys(&log), vec!["missing.meth.body.or.decl.abstract", "abstract.meth.cant.have.body"]);
}

#[test]
fn recursive_constructor_invocation() {
    let b = SourceBuilder::new();
    let first = b.ctor(Flags::EMPTY, vec![], vec![b.exec(b.call(b.this(), vec![b.int(1)]))]);
    let second = b.ctor(Flags::EMPTY, vec![b.param(b.prim(Prim::Int), "x")], vec![b.exec(b.call(b.this(), vec![]))]);
    let c = b.class(Flags::EMPTY, "C", vec![Member::Method(first), Member::Method(second)]);
    let (_, log) = check(b.unit("p", vec![], vec![c]));
    assert_eq!(error_keys(&log), vec!["recursive.ctor.invocation"]);
}

#[test]
fn self_call_must_come_first() {
    let b = SourceBuilder::new();
    let ctor = b.ctor(Flags::EMPTY, vec![], vec![b.skip(), b.exec(b.call(b.super_(), vec![]))]);
    let c = b.class(Flags::EMPTY, "C", vec![Member::Method(ctor)]);
    let (_, log) = check(b.unit("p", vec![], vec![c]));
    assert_eq!(error_keys(&log), vec!["call.must.be.first.stmt.in.ctor"]);
}

#[test]
fn implicit_super_call_is_inserted() {
    let b = SourceBuilder::new();
    let ctor = b.ctor(Flags::EMPTY, vec![], vec![b.skip()]);
    let mut unit = b.unit("p", vec![], vec![b.class(Flags::EMPTY, "C", vec![Member::Method(ctor)])]);
    let mut syms = Symtab::new();
    let mut log = Log::new();
    check_unit(&mut syms, &mut unit, &CompileOptions::default(), &mut log).expect("unit should be processed");
    assert!(!log.has_errors(), "{:?}", log.diagnostics());
    let md = unit.classes[0].methods().next().expect("constructor kept");
    let body = md.body.as_ref().expect("constructor body");
    assert_eq!(body.stmts.len(), 2);
    let StmtKind::Expr(call) = &body.stmts[0].kind else { panic!("super call expected first") };
    let ExprKind::Call { meth, .. } = &call.kind else { panic!("call expected") };
    assert_eq!(meth.name(), Some("super"));
    assert_eq!(call.sym.and_then(|s| syms.owner(s)), Some(syms.predef.object));
}

// ── Partial attribution ────────────────────────────────────────────────

#[test]
fn attribution_stops_at_the_marked_tree() {
    let b = SourceBuilder::new();
    let target = b.ident("x");
    let stop = target.span;
    let body = vec![
        b.local(b.prim(Prim::Int), "x", Some(b.int(1))),
        b.local(b.prim(Prim::Int), "y", Some(target)),
        b.local(b.prim(Prim::Int), "z", Some(b.ident("y"))),
    ];
    let m = b.method(Flags::EMPTY, b.void(), "m", vec![], Some(body));
    let mut unit = b.unit("p", vec![], vec![b.class(Flags::EMPTY, "C", vec![Member::Method(m)])]);
    let mut syms = Symtab::new();
    let mut log = Log::new();
    let env = attrib_until(&mut syms, &mut unit, &CompileOptions::default(), &mut log, stop)
        .expect("unit should be processed")
        .expect("stop position reached");
    assert!(env.enclosing_method().is_some());
    assert!(!log.has_errors(), "{:?}", log.diagnostics());

    let md = unit.classes[0].methods().find(|m| m.name == "m").expect("method kept");
    let stmts = &md.body.as_ref().expect("body").stmts;
    let StmtKind::LocalVar(y) = &stmts[1].kind else { panic!("local expected") };
    assert_eq!(y.init.as_ref().and_then(|e| e.ty.clone()), Some(Type::int()));
    let StmtKind::LocalVar(z) = &stmts[2].kind else { panic!("local expected") };
    assert_eq!(z.init.as_ref().and_then(|e| e.ty.clone()), Some(Type::Error));
}

#[test]
fn unreached_stop_position_yields_none() {
    let b = SourceBuilder::new();
    let mut unit = b.unit("p", vec![], vec![b.class(Flags::EMPTY, "C", vec![])]);
    let mut syms = Symtab::new();
    let mut log = Log::new();
    let nowhere = b.span();
    let env = attrib_until(&mut syms, &mut unit, &CompileOptions::default(), &mut log, nowhere).expect("unit should be processed");
    assert!(env.is_none());
}

// ── Rendering ──────────────────────────────────────────────────────────

#[test]
fn rendered_override_error() {
    let b = SourceBuilder::new();
    let p = b.class(Flags::EMPTY, "P", vec![Member::Method(b.method(Flags::PUBLIC, b.void(), "run", vec![], Some(vec![])))]);
    let mut q = b.class(Flags::EMPTY, "Q", vec![Member::Method(b.method(Flags::EMPTY, b.void(), "run", vec![], Some(vec![])))]);
    q.extends = Some(b.ident("P"));
    let (_, log) = check(b.unit("p", vec![], vec![p, q]));
    let diag = log.errors().next().expect("one error");
    insta::assert_snapshot!(
        format_message(diag),
        @"run() in p.Q cannot override run() in p.P; attempting to assign weaker access privileges; was public"
    );
    let source = "x".repeat(256);
    let rendered = render_diagnostic(diag, &source, "Q.java");
    assert!(rendered.contains("E0062"), "{rendered}");
}
