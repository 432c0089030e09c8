//! Erasure, cast insertion and bridge methods.

use cinder_ast::pretty::print_class;
use cinder_ast::{ClassDecl, CompilationUnit, Member, SourceBuilder};
use cinder_common::{CompileOptions, Log};
use cinder_lower::{compile, erase_classes};
use cinder_symtab::{Flags, Prim, Symtab};
use cinder_typeck::diagnostics::format_message;

fn compile_with(mut unit: CompilationUnit, opts: &CompileOptions) -> (Symtab, Vec<ClassDecl>, Log) {
    let mut syms = Symtab::new();
    let mut log = Log::new();
    let classes = compile(&mut syms, &mut unit, opts, &mut log).expect("unit should be processed");
    (syms, classes, log)
}

fn erase(unit: CompilationUnit) -> Vec<ClassDecl> {
    let (_, classes, log) = compile_with(unit, &CompileOptions::default());
    assert!(!log.has_errors(), "{:?}", log.diagnostics());
    classes
}

fn printed(classes: &[ClassDecl], name: &str) -> String {
    classes.iter().find(|c| c.name == name).map(print_class).unwrap_or_else(|| panic!("no class {}", name))
}

/// `class A<T> { void put(T t) {} }`
fn generic_holder(b: &SourceBuilder) -> ClassDecl {
    let put = b.method(Flags::EMPTY, b.void(), "put", vec![b.param(b.ident("T"), "t")], Some(vec![]));
    let mut a = b.class(Flags::EMPTY, "A", vec![Member::Method(put)]);
    a.type_params = vec![b.type_param("T", vec![])];
    a
}

/// `class Box<T> { T val; T get() { return val; } }`
fn generic_box(b: &SourceBuilder) -> ClassDecl {
    let get = b.method(Flags::EMPTY, b.ident("T"), "get", vec![], Some(vec![b.return_(Some(b.ident("val")))]));
    let mut class = b.class(Flags::EMPTY, "Box", vec![b.field(Flags::EMPTY, b.ident("T"), "val", None), Member::Method(get)]);
    class.type_params = vec![b.type_param("T", vec![])];
    class
}

// ── Erased declarations and casts ──────────────────────────────────────

#[test]
fn type_variables_erase_to_their_bounds() {
    let b = SourceBuilder::new();
    let classes = erase(b.unit("p", vec![], vec![generic_box(&b)]));
    let class = printed(&classes, "Box");
    assert!(class.contains("class Box {"), "{}", class);
    assert!(class.contains("Object val;"), "{}", class);
    assert!(class.contains("Object get() {"), "{}", class);
    assert!(!class.contains("T "), "{}", class);
}

#[test]
fn generic_results_are_cast_where_used() {
    let b = SourceBuilder::new();
    let string_box = || b.apply(b.ident("Box"), vec![b.ident("String")]);
    let len = b.method(
        Flags::EMPTY,
        b.prim(Prim::Int),
        "len",
        vec![b.param(string_box(), "x")],
        Some(vec![b.return_(Some(b.invoke(b.invoke(b.ident("x"), "get", vec![]), "length", vec![])))]),
    );
    let field = b.method(
        Flags::EMPTY,
        b.ident("String"),
        "field",
        vec![b.param(string_box(), "x")],
        Some(vec![b.return_(Some(b.select(b.ident("x"), "val")))]),
    );
    let loose = b.method(
        Flags::EMPTY,
        b.ident("Object"),
        "loose",
        vec![b.param(string_box(), "x")],
        Some(vec![b.return_(Some(b.invoke(b.ident("x"), "get", vec![])))]),
    );
    let user = b.class(Flags::EMPTY, "User", vec![Member::Method(len), Member::Method(field), Member::Method(loose)]);
    let classes = erase(b.unit("p", vec![], vec![generic_box(&b), user]));
    let class = printed(&classes, "User");
    assert!(class.contains("int len(Box x) {"), "{}", class);
    assert!(class.contains("return ((String)x.get()).length();"), "{}", class);
    assert!(class.contains("return (String)x.val;"), "{}", class);
    // Already an Object: no cast.
    assert!(class.contains("return x.get();"), "{}", class);
}

#[test]
fn erasing_twice_changes_nothing() {
    let b = SourceBuilder::new();
    let string_box = b.apply(b.ident("Box"), vec![b.ident("String")]);
    let body = vec![b.return_(Some(b.invoke(b.ident("x"), "get", vec![])))];
    let m = b.method(Flags::EMPTY, b.ident("String"), "m", vec![b.param(string_box, "x")], Some(body));
    let user = b.class(Flags::EMPTY, "User", vec![Member::Method(m)]);
    let (mut syms, mut classes, mut log) = compile_with(b.unit("p", vec![], vec![generic_box(&b), user]), &CompileOptions::default());
    let once: Vec<String> = classes.iter().map(print_class).collect();
    erase_classes(&mut syms, &mut classes, &CompileOptions::default(), &mut log);
    let twice: Vec<String> = classes.iter().map(print_class).collect();
    assert_eq!(once, twice);
    assert!(!log.has_errors(), "{:?}", log.diagnostics());
}

// ── Bridges ────────────────────────────────────────────────────────────

#[test]
fn generic_override_gets_a_bridge() {
    let b = SourceBuilder::new();
    let put = b.method(Flags::EMPTY, b.void(), "put", vec![b.param(b.ident("String"), "s")], Some(vec![]));
    let mut sub = b.class(Flags::EMPTY, "B", vec![Member::Method(put)]);
    sub.extends = Some(b.apply(b.ident("A"), vec![b.ident("String")]));
    let classes = erase(b.unit("p", vec![], vec![generic_holder(&b), sub]));

    let base = printed(&classes, "A");
    assert!(base.contains("void put(Object t) {"), "{}", base);
    let class = printed(&classes, "B");
    assert!(class.contains("class B extends A {"), "{}", class);
    assert!(class.contains("void put(String s) {"), "{}", class);
    assert!(class.contains("void put(Object x0) {"), "{}", class);
    assert!(class.contains("this.put((String)x0);"), "{}", class);
}

#[test]
fn covariant_override_gets_a_bridge() {
    let b = SourceBuilder::new();
    let get = b.method(Flags::EMPTY, b.ident("Object"), "get", vec![], Some(vec![b.return_(Some(b.null()))]));
    let p = b.class(Flags::EMPTY, "P", vec![Member::Method(get)]);
    let get = b.method(Flags::EMPTY, b.ident("String"), "get", vec![], Some(vec![b.return_(Some(b.str("q")))]));
    let mut q = b.class(Flags::EMPTY, "Q", vec![Member::Method(get)]);
    q.extends = Some(b.ident("P"));
    let classes = erase(b.unit("p", vec![], vec![p, q]));

    let class = printed(&classes, "Q");
    assert!(class.contains("String get() {"), "{}", class);
    assert!(class.contains("Object get() {"), "{}", class);
    assert!(class.contains("return this.get();"), "{}", class);
}

#[test]
fn interface_implementation_gets_a_bridge() {
    let b = SourceBuilder::new();
    let cmp = b.method(Flags::PUBLIC, b.prim(Prim::Int), "compareTo", vec![b.param(b.ident("Name"), "o")], Some(vec![b.return_(Some(b.int(0)))]));
    let mut name = b.class(Flags::EMPTY, "Name", vec![Member::Method(cmp)]);
    name.implements = vec![b.apply(b.ident("Comparable"), vec![b.ident("Name")])];
    let classes = erase(b.unit("p", vec![], vec![name]));

    let class = printed(&classes, "Name");
    assert!(class.contains("class Name implements Comparable {"), "{}", class);
    assert!(class.contains("public int compareTo(Object x0) {"), "{}", class);
    assert!(class.contains("return this.compareTo((Name)x0);"), "{}", class);
}

#[test]
fn inherited_method_needs_no_bridge() {
    let b = SourceBuilder::new();
    let mut sub = b.class(Flags::EMPTY, "C", vec![]);
    sub.extends = Some(b.apply(b.ident("A"), vec![b.ident("String")]));
    let classes = erase(b.unit("p", vec![], vec![generic_holder(&b), sub]));
    let class = printed(&classes, "C");
    assert!(!class.contains("put"), "{}", class);
}

#[test]
fn public_bridge_from_hidden_superclass_is_opt_in() {
    let unit = |b: &SourceBuilder| {
        let run = b.method(Flags::PUBLIC, b.void(), "run", vec![], Some(vec![]));
        let base = b.class(Flags::EMPTY, "Base", vec![Member::Method(run)]);
        let mut public = b.class(Flags::PUBLIC, "Pub", vec![]);
        public.extends = Some(b.ident("Base"));
        b.unit("p", vec![], vec![base, public])
    };

    let b = SourceBuilder::new();
    let classes = erase(unit(&b));
    assert!(!printed(&classes, "Pub").contains("run"));

    let b = SourceBuilder::new();
    let opts = CompileOptions { public_bridges_from_hidden_supertypes: true, ..CompileOptions::default() };
    let (_, classes, log) = compile_with(unit(&b), &opts);
    assert!(!log.has_errors(), "{:?}", log.diagnostics());
    let class = printed(&classes, "Pub");
    assert!(class.contains("public void run() {"), "{}", class);
    assert!(class.contains("super.run();"), "{}", class);
}

#[test]
fn inherited_methods_with_same_erasure_clash() {
    let b = SourceBuilder::new();
    let m = b.method(Flags::EMPTY, b.void(), "m", vec![b.param(b.ident("Object"), "o")], None);
    let iface = b.interface(Flags::EMPTY, "I", vec![Member::Method(m)]);
    let m = b.method(Flags::PUBLIC, b.void(), "m", vec![b.param(b.ident("T"), "t")], Some(vec![]));
    let mut a = b.class(Flags::EMPTY, "A", vec![Member::Method(m)]);
    a.type_params = vec![b.type_param("T", vec![])];
    let mut c = b.class(Flags::ABSTRACT, "C", vec![]);
    c.extends = Some(b.apply(b.ident("A"), vec![b.ident("String")]));
    c.implements = vec![b.ident("I")];

    let (_, _, log) = compile_with(b.unit("p", vec![], vec![iface, a, c]), &CompileOptions::default());
    let keys: Vec<&str> = log.errors().map(|d| d.key).collect();
    assert_eq!(keys, vec!["name.clash.same.erasure.no.override"]);
    let clash = log.errors().next().expect("one error");
    insta::assert_snapshot!(
        format_message(clash),
        @"name clash: m(T) in p.A and m(java.lang.Object) in p.I have the same erasure, yet neither overrides the other"
    );
}
