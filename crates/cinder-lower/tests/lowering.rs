//! Lowering of attributed units to flat, sugar-free classes, checked on the
//! printed form of the result.

use cinder_ast::pretty::print_class;
use cinder_ast::{BinOp, ClassDecl, CompilationUnit, Member, SourceBuilder};
use cinder_common::{CompileOptions, Log, SourceLevel};
use cinder_lower::compile;
use cinder_symtab::{Flags, Prim, Symtab};

// ── Helpers ────────────────────────────────────────────────────────────

fn lower_with(mut unit: CompilationUnit, opts: &CompileOptions) -> Vec<ClassDecl> {
    let mut syms = Symtab::new();
    let mut log = Log::new();
    let classes = compile(&mut syms, &mut unit, opts, &mut log).expect("unit should be processed");
    assert!(!log.has_errors(), "{:?}", log.diagnostics());
    classes
}

fn lower(unit: CompilationUnit) -> Vec<ClassDecl> {
    lower_with(unit, &CompileOptions::default())
}

/// The printed class named `name`.
fn printed(classes: &[ClassDecl], name: &str) -> String {
    let class = classes
        .iter()
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("no class {} among {:?}", name, classes.iter().map(|c| &c.name).collect::<Vec<_>>()));
    print_class(class)
}

fn int(b: &SourceBuilder) -> cinder_ast::Expr {
    b.prim(Prim::Int)
}

// ── Enums ──────────────────────────────────────────────────────────────

fn color_switch_unit(b: &SourceBuilder) -> CompilationUnit {
    let color = b.enum_(Flags::EMPTY, "Color", vec![("RED", vec![]), ("GREEN", vec![])], vec![]);
    let sw = b.switch(
        b.ident("c"),
        vec![
            b.case(b.ident("GREEN"), vec![b.exec(b.assign(b.ident("r"), b.int(2))), b.break_(None)]),
            b.case(b.ident("RED"), vec![b.exec(b.assign(b.ident("r"), b.int(1)))]),
        ],
    );
    let body = vec![b.local(int(b), "r", Some(b.int(0))), sw, b.return_(Some(b.ident("r")))];
    let pick = b.method(Flags::EMPTY, int(b), "pick", vec![b.param(b.ident("Color"), "c")], Some(body));
    let user = b.class(Flags::EMPTY, "C", vec![Member::Method(pick)]);
    b.unit("p", vec![], vec![color, user])
}

#[test]
fn enum_class_becomes_final_subclass_of_enum() {
    let b = SourceBuilder::new();
    let classes = lower(color_switch_unit(&b));
    let color = printed(&classes, "Color");
    assert!(color.contains("final class Color extends Enum {"), "{}", color);
    assert!(color.contains("new Color(\"RED\", 0)"), "{}", color);
    assert!(color.contains("new Color(\"GREEN\", 1)"), "{}", color);
    assert!(color.contains("private static final Color[] $VALUES = new Color[]{"), "{}", color);
    assert!(color.contains("return (Color[])$VALUES.clone();"), "{}", color);
    // Enum already carries the bridge for Comparable.compareTo.
    assert!(!color.contains("compareTo"), "{}", color);
}

#[test]
fn enum_switch_reads_the_holder_map() {
    let b = SourceBuilder::new();
    let classes = lower(color_switch_unit(&b));
    let user = printed(&classes, "C");
    assert!(user.contains("switch (C$1.$SwitchMap$p$Color[c.ordinal()]) {"), "{}", user);
    assert!(user.contains("case 1:"), "{}", user);
    assert!(user.contains("case 2:"), "{}", user);

    let holder = printed(&classes, "C$1");
    assert!(holder.contains("static final int[] $SwitchMap$p$Color = new int[Color.values().length];"), "{}", holder);
    assert!(holder.contains("$SwitchMap$p$Color[Color.GREEN.ordinal()] = 1;"), "{}", holder);
    assert!(holder.contains("$SwitchMap$p$Color[Color.RED.ordinal()] = 2;"), "{}", holder);
    assert!(holder.contains("catch (NoSuchFieldError ex)"), "{}", holder);
}

#[test]
fn enum_switch_maps_only_the_constants_it_names() {
    let b = SourceBuilder::new();
    let color = b.enum_(Flags::EMPTY, "Color", vec![("RED", vec![]), ("GREEN", vec![]), ("BLUE", vec![])], vec![]);
    let sw = b.switch(
        b.ident("c"),
        vec![
            b.case(b.ident("RED"), vec![b.return_(Some(b.int(1)))]),
            b.case(b.ident("BLUE"), vec![b.return_(Some(b.int(3)))]),
        ],
    );
    let pick = b.method(Flags::EMPTY, int(&b), "pick", vec![b.param(b.ident("Color"), "c")], Some(vec![sw, b.return_(Some(b.int(0)))]));
    let user = b.class(Flags::EMPTY, "C", vec![Member::Method(pick)]);
    let classes = lower(b.unit("p", vec![], vec![color, user]));

    let holder = printed(&classes, "C$1");
    assert!(holder.contains("$SwitchMap$p$Color[Color.RED.ordinal()] = 1;"), "{}", holder);
    assert!(holder.contains("$SwitchMap$p$Color[Color.BLUE.ordinal()] = 2;"), "{}", holder);
    assert!(!holder.contains("GREEN"), "{}", holder);
    let user = printed(&classes, "C");
    assert!(user.contains("case 1:"), "{}", user);
    assert!(user.contains("case 2:"), "{}", user);
    assert!(!user.contains("case 3:"), "{}", user);
}

// ── Nested classes ─────────────────────────────────────────────────────

#[test]
fn private_member_of_enclosing_class_goes_through_access_method() {
    let b = SourceBuilder::new();
    let peek = b.method(Flags::EMPTY, int(&b), "peek", vec![], Some(vec![b.return_(Some(b.ident("secret")))]));
    let inner = b.class(Flags::EMPTY, "Inner", vec![Member::Method(peek)]);
    let outer = b.class(
        Flags::EMPTY,
        "Outer",
        vec![b.field(Flags::PRIVATE, int(&b), "secret", None), Member::Class(inner)],
    );
    let classes = lower(b.unit("p", vec![], vec![outer]));

    let outer = printed(&classes, "Outer");
    assert!(outer.contains("static int access$000(Outer x0) {"), "{}", outer);
    assert!(outer.contains("return x0.secret;"), "{}", outer);

    let inner = printed(&classes, "Outer$Inner");
    assert!(inner.contains("final Outer this$0;"), "{}", inner);
    assert!(inner.contains("Outer.access$000("), "{}", inner);
    assert!(!inner.contains("return secret;"), "{}", inner);
}

#[test]
fn local_class_captures_local_through_proxy_field() {
    let b = SourceBuilder::new();
    let get = b.method(Flags::EMPTY, int(&b), "get", vec![], Some(vec![b.return_(Some(b.ident("n")))]));
    let local = b.class(Flags::EMPTY, "Local", vec![Member::Method(get)]);
    let body = vec![b.local_class(local), b.return_(Some(b.new_(b.ident("Local"), vec![])))];
    let make = b.method(Flags::EMPTY, b.ident("Object"), "make", vec![b.var(Flags::FINAL, int(&b), "n", None)], Some(body));
    let host = b.class(Flags::EMPTY, "Host", vec![Member::Method(make)]);
    let classes = lower(b.unit("p", vec![], vec![host]));

    let local = printed(&classes, "Host$1Local");
    assert!(local.contains("final int val$n;"), "{}", local);
    assert!(local.contains("this.val$n"), "{}", local);
    let host = printed(&classes, "Host");
    assert!(host.contains("new Host$1Local("), "{}", host);
    assert!(!host.contains("class Local"), "{}", host);
}

#[test]
fn anonymous_subclass_of_local_class_passes_captured_locals_on() {
    let b = SourceBuilder::new();
    let get = b.method(Flags::EMPTY, int(&b), "get", vec![], Some(vec![b.return_(Some(b.ident("n")))]));
    let local = b.class(Flags::EMPTY, "Local", vec![Member::Method(get)]);
    let body = vec![b.local_class(local), b.return_(Some(b.new_anonymous(b.ident("Local"), vec![], vec![])))];
    let make = b.method(Flags::EMPTY, b.ident("Object"), "make", vec![b.var(Flags::FINAL, int(&b), "n", None)], Some(body));
    let host = b.class(Flags::EMPTY, "Host", vec![Member::Method(make)]);
    let classes = lower(b.unit("p", vec![], vec![host]));

    let anon = printed(&classes, "Host$2");
    assert!(anon.contains("class Host$2 extends Host$1Local {"), "{}", anon);
    assert!(anon.contains("val$n"), "{}", anon);
    let host = printed(&classes, "Host");
    assert!(host.contains("new Host$2("), "{}", host);
}

#[test]
fn anonymous_classes_keep_their_supertypes() {
    let b = SourceBuilder::new();
    let base = b.class(Flags::EMPTY, "A", vec![]);
    let iface = b.interface(Flags::EMPTY, "I", vec![]);
    let sub = b.method(Flags::EMPTY, b.ident("Object"), "sub", vec![], Some(vec![b.return_(Some(b.new_anonymous(b.ident("A"), vec![], vec![])))]));
    let imp = b.method(Flags::EMPTY, b.ident("Object"), "imp", vec![], Some(vec![b.return_(Some(b.new_anonymous(b.ident("I"), vec![], vec![])))]));
    let host = b.class(Flags::EMPTY, "Host", vec![Member::Method(sub), Member::Method(imp)]);
    let classes = lower(b.unit("p", vec![], vec![base, iface, host]));

    let first = printed(&classes, "Host$1");
    assert!(first.contains("class Host$1 extends A {"), "{}", first);
    let second = printed(&classes, "Host$2");
    assert!(second.contains("class Host$2 implements I {"), "{}", second);
}

// ── Statements ─────────────────────────────────────────────────────────

#[test]
fn foreach_over_array_becomes_index_loop() {
    let b = SourceBuilder::new();
    let body = vec![
        b.local(int(&b), "sum", Some(b.int(0))),
        b.foreach(int(&b), "x", b.ident("xs"), b.exec(b.assign_op(BinOp::Add, b.ident("sum"), b.ident("x")))),
        b.return_(Some(b.ident("sum"))),
    ];
    let sum = b.method(Flags::EMPTY, int(&b), "sum", vec![b.param(b.array_of(int(&b)), "xs")], Some(body));
    let classes = lower(b.unit("p", vec![], vec![b.class(Flags::EMPTY, "C", vec![Member::Method(sum)])]));
    let c = printed(&classes, "C");
    assert!(c.contains("final int[] arr$ = xs;"), "{}", c);
    assert!(c.contains("final int len$ = arr$.length;"), "{}", c);
    assert!(c.contains("for (int i$ = 0; i$ < len$; ++i$) {"), "{}", c);
    assert!(c.contains("int x = arr$[i$];"), "{}", c);
}

#[test]
fn string_switch_dispatches_on_hash_then_position() {
    let b = SourceBuilder::new();
    let sw = b.switch(
        b.ident("s"),
        vec![
            b.case(b.str("a"), vec![b.exec(b.assign(b.ident("r"), b.int(1))), b.break_(None)]),
            b.case(b.str("b"), vec![b.exec(b.assign(b.ident("r"), b.int(2))), b.break_(None)]),
        ],
    );
    let body = vec![b.local(int(&b), "r", Some(b.int(0))), sw, b.return_(Some(b.ident("r")))];
    let code = b.method(Flags::EMPTY, int(&b), "code", vec![b.param(b.ident("String"), "s")], Some(body));
    let classes = lower(b.unit("p", vec![], vec![b.class(Flags::EMPTY, "C", vec![Member::Method(code)])]));
    let c = printed(&classes, "C");
    assert!(c.contains("int tmp$ = -1;"), "{}", c);
    assert!(c.contains("switch (s$.hashCode()) {"), "{}", c);
    assert!(c.contains("case 97:"), "{}", c);
    assert!(c.contains("case 98:"), "{}", c);
    assert!(c.contains("if (s$.equals(\"a\"))"), "{}", c);
    assert!(c.contains("switch (tmp$) {"), "{}", c);
    assert!(c.contains("case 0:"), "{}", c);
    assert!(c.contains("case 1:"), "{}", c);
}

#[test]
fn switch_on_boxed_integer_unboxes_selector() {
    let b = SourceBuilder::new();
    let sw = b.switch(b.ident("x"), vec![b.case(b.int(1), vec![b.break_(None)])]);
    let m = b.method(Flags::EMPTY, b.void(), "m", vec![b.param(b.ident("Integer"), "x")], Some(vec![sw]));
    let opts = CompileOptions::for_source(SourceLevel::V6);
    let classes = lower_with(b.unit("p", vec![], vec![b.class(Flags::EMPTY, "C", vec![Member::Method(m)])]), &opts);
    let c = printed(&classes, "C");
    assert!(c.contains("switch (x.intValue()) {"), "{}", c);
}

#[test]
fn try_with_resources_closes_and_records_suppressed() {
    let b = SourceBuilder::new();
    let close = b.method(Flags::PUBLIC, b.void(), "close", vec![], Some(vec![]));
    let mut res = b.class(Flags::EMPTY, "Res", vec![Member::Method(close)]);
    res.implements = vec![b.ident("AutoCloseable")];
    let resource = b.var(Flags::EMPTY, b.ident("Res"), "r", Some(b.new_(b.ident("Res"), vec![])));
    let body = vec![b.try_(vec![resource], vec![], vec![], None)];
    let use_ = b.method(Flags::EMPTY, b.void(), "use", vec![], Some(body));
    let classes = lower(b.unit("p", vec![], vec![res, b.class(Flags::EMPTY, "C", vec![Member::Method(use_)])]));
    let c = printed(&classes, "C");
    assert!(c.contains("Res r = new Res();"), "{}", c);
    assert!(c.contains("Throwable primary$ = null;"), "{}", c);
    assert!(c.contains("primary$.addSuppressed(x$);"), "{}", c);
    assert!(c.contains("r.close();"), "{}", c);
    assert!(!c.contains("try (Res"), "{}", c);
}

#[test]
fn assertion_consults_class_flag() {
    let b = SourceBuilder::new();
    let check = b.assert_(b.binary(BinOp::Gt, b.ident("x"), b.int(0)), Some(b.str("neg")));
    let m = b.method(Flags::EMPTY, b.void(), "check", vec![b.param(int(&b), "x")], Some(vec![check]));
    let classes = lower(b.unit("p", vec![], vec![b.class(Flags::EMPTY, "C", vec![Member::Method(m)])]));
    let c = printed(&classes, "C");
    assert!(c.contains("static final boolean $assertionsDisabled = !C.class.desiredAssertionStatus();"), "{}", c);
    assert!(c.contains("if (!$assertionsDisabled && !(x > 0))"), "{}", c);
    assert!(c.contains("throw new AssertionError(\"neg\");"), "{}", c);
}

#[test]
fn constant_false_condition_drops_branch() {
    let b = SourceBuilder::new();
    let debug = b.field(Flags::STATIC | Flags::FINAL, b.prim(Prim::Boolean), "DEBUG", Some(b.bool(false)));
    let body = vec![b.if_(b.ident("DEBUG"), b.block_stmt(vec![b.exec(b.call_named("m", vec![]))]), None)];
    let m = b.method(Flags::EMPTY, b.void(), "m", vec![], Some(body));
    let classes = lower(b.unit("p", vec![], vec![b.class(Flags::EMPTY, "C", vec![debug, Member::Method(m)])]));
    let c = printed(&classes, "C");
    assert!(!c.contains("if ("), "{}", c);
}

// ── Boxing ─────────────────────────────────────────────────────────────

#[test]
fn boxing_and_unboxing_become_calls() {
    let b = SourceBuilder::new();
    let boxed = b.method(Flags::EMPTY, b.ident("Integer"), "box", vec![b.param(int(&b), "x")], Some(vec![b.return_(Some(b.ident("x")))]));
    let unboxed = b.method(Flags::EMPTY, int(&b), "unbox", vec![b.param(b.ident("Integer"), "i")], Some(vec![b.return_(Some(b.ident("i")))]));
    let classes = lower(b.unit("p", vec![], vec![b.class(Flags::EMPTY, "C", vec![Member::Method(boxed), Member::Method(unboxed)])]));
    let c = printed(&classes, "C");
    assert!(c.contains("return Integer.valueOf(x);"), "{}", c);
    assert!(c.contains("return i.intValue();"), "{}", c);
}
