//! Ariadne-based rendering of logged diagnostics.
//!
//! A [`Diagnostic`] carries a message key and pre-rendered arguments; this
//! module owns the message texts and the error codes, and turns a
//! diagnostic into a labelled report over the source text.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};

use cinder_common::{Diagnostic, LineIndex, Severity};

// ── Message table ──────────────────────────────────────────────────────

/// `(key, code, template)`. `{0}`, `{1}`, ... stand for the arguments.
const MESSAGES: &[(&str, &str, &str)] = &[
    // resolution
    ("cant.resolve", "E0001", "cannot find symbol: {0} {1}"),
    ("cant.resolve.args", "E0001", "cannot find symbol: {0} {1}({2})"),
    ("cant.resolve.location", "E0001", "cannot find symbol: {0} {1} in {2} {3}"),
    ("cant.resolve.location.args", "E0001", "cannot find symbol: {0} {1}({2}) in {3} {4}"),
    ("doesnt.exist", "E0002", "package {0} does not exist"),
    ("cant.apply.symbol", "E0003", "{0} {1} in {2} cannot be applied to given types: {3}"),
    ("cant.apply.symbols", "E0004", "no suitable {0} found for {1}({2})"),
    ("inapplicable.candidate", "E0004", "{0} is not applicable: {1}"),
    ("report.access", "E0005", "{0} has {1} access in {2}"),
    ("not.def.public.cant.access", "E0005", "{0} is not public in {1}; cannot be accessed from outside package"),
    ("not.def.access.class.intf.cant.access", "E0005", "{0} is defined in an inaccessible class or interface {1}"),
    ("non-static.cant.be.ref", "E0006", "non-static {0} {1} cannot be referenced from a static context"),
    ("ref.ambiguous", "E0007", "reference to {0} is ambiguous, both {1} {2} in {3} and {4} {5} in {6} match"),
    ("cant.access", "E0008", "cannot access {0}: {1}"),
    ("not.encl.class", "E0009", "not an enclosing class: {0}"),
    ("encl.class.required", "E0010", "an enclosing instance that contains {0} is required"),
    ("cant.deref", "E0011", "{0} cannot be dereferenced"),
    // types
    ("unexpected.type", "E0020", "unexpected type: required {0}, found {1}"),
    ("incompatible.types", "E0021", "incompatible types: {0} cannot be converted to {1}"),
    ("possible.loss.of.precision", "E0022", "possible loss of precision: {0} to {1}"),
    ("prob.found.req", "W0001", "{0}: {1} to {2}"),
    ("type.found.req", "E0023", "unexpected type {0}, required {1}"),
    ("inconvertible.types", "E0024", "{0} cannot be cast to {1}"),
    ("incomparable.types", "E0025", "incomparable types: {0} and {1}"),
    ("operator.cant.be.applied", "E0026", "bad operand type {1} for unary operator '{0}'"),
    ("operator.cant.be.applied.1", "E0026", "bad operand types for binary operator '{0}': {1} and {2}"),
    ("neither.conditional.subtype", "E0027", "incompatible types for ?: neither is a subtype of the other: {0} and {1}"),
    ("void.not.allowed.here", "E0028", "'void' type not allowed here"),
    ("array.req.but.found", "E0029", "array required, but {0} found"),
    ("type.doesnt.take.params", "E0030", "type {0} does not take parameters"),
    ("wrong.number.type.args", "E0031", "wrong number of type arguments; required {0}"),
    ("not.within.bounds", "E0032", "type argument {0} is not within bounds of type-variable"),
    ("generic.array.creation", "E0033", "generic array creation"),
    ("illegal.initializer.for.type", "E0034", "illegal initializer for {0}"),
    ("illegal.generic.type.for.instof", "E0035", "illegal generic type for instanceof"),
    ("multicatch.types.must.be.disjoint", "E0036", "alternatives in a multi-catch statement cannot be related by subclassing: {0} is a subclass of {1}"),
    ("foreach.not.applicable.to.type", "E0037", "for-each not applicable to expression type {0}"),
    ("try.not.applicable.to.type", "E0038", "incompatible types: try-with-resources not applicable to variable type {0}"),
    ("illegal.start.of.expr", "E0039", "illegal start of expression"),
    ("const.expr.req", "E0040", "constant expression required"),
    ("string.const.req", "E0041", "constant string expression required"),
    // declarations
    ("already.defined", "E0050", "{0} {1} is already defined in {2} {3}"),
    ("duplicate.class", "E0051", "duplicate class: {0}"),
    ("cyclic.inheritance", "E0052", "cyclic inheritance involving {0}"),
    ("intf.expected.here", "E0053", "interface expected here"),
    ("no.intf.expected.here", "E0054", "no interface expected here"),
    ("repeated.interface", "E0055", "repeated interface"),
    ("cant.inherit.from.final", "E0056", "cannot inherit from final {0}"),
    ("enum.types.not.extensible", "E0057", "enum types are not extensible"),
    ("mod.not.allowed.here", "E0058", "modifier {0} not allowed here"),
    ("illegal.combination.of.modifiers", "E0059", "illegal combination of modifiers: {0} and {1}"),
    ("override.static", "E0060", "{0} in {1} cannot override {2} in {3}; overriding method is static"),
    ("override.meth", "E0061", "{0} in {1} cannot override {2} in {3}; overridden method is {4}"),
    ("override.weaker.access", "E0062", "{0} in {1} cannot override {2} in {3}; attempting to assign weaker access privileges; was {4}"),
    ("override.incompatible.ret", "E0063", "{0} in {1} cannot override {2} in {3}; return type {4} is not compatible with {5}"),
    ("override.meth.doesnt.throw", "E0064", "{0} in {1} cannot override {2} in {3}; overridden method does not throw {4}"),
    ("name.clash.same.erasure", "E0065", "name clash: {0} and {1} have the same erasure"),
    ("name.clash.same.erasure.no.override", "E0065", "name clash: {0} in {1} and {2} in {3} have the same erasure, yet neither overrides the other"),
    ("does.not.override.abstract", "E0066", "{0} is not abstract and does not override abstract method {1} in {2}"),
    ("recursive.ctor.invocation", "E0067", "recursive constructor invocation"),
    ("intf.meth.cant.have.body", "E0068", "interface abstract methods cannot have body"),
    ("missing.meth.body.or.decl.abstract", "E0069", "missing method body, or declare abstract"),
    ("abstract.meth.cant.have.body", "E0070", "abstract methods cannot have a body"),
    ("native.meth.cant.have.body", "E0071", "native methods cannot have a body"),
    ("call.must.be.first.stmt.in.ctor", "E0072", "call to {0} must be first statement in constructor"),
    ("call.to.super.not.allowed.in.enum.ctor", "E0073", "call to super not allowed in enum constructor"),
    ("illegal.qual.not.icls", "E0074", "illegal qualifier; {0} is not an inner class"),
    ("qualified.new.of.static.class", "E0075", "qualified new of static class"),
    ("anon.class.impl.intf.no.args", "E0076", "anonymous class implements interface; cannot have arguments"),
    ("abstract.cant.be.instantiated", "E0077", "{0} is abstract; cannot be instantiated"),
    ("abstract.cant.be.accessed.directly", "E0078", "abstract {0} {1} in {2} cannot be accessed directly"),
    ("enum.cant.be.instantiated", "E0079", "enum types may not be instantiated"),
    ("enum.label.must.be.unqualified.enum", "E0080", "an enum switch case label must be the unqualified name of an enumeration constant"),
    ("cant.apply.diamond.1", "E0081", "cannot infer type arguments for {0}: {1}"),
    ("varargs.not.supported.in.source", "E0082", "variable-arity methods are not supported in -source {0}"),
    ("diamond.not.supported.in.source", "E0083", "diamond operator is not supported in -source {0}"),
    ("string.switch.not.supported.in.source", "E0084", "strings in switch are not supported in -source {0}"),
    // references and assignment
    ("cant.assign.val.to.final.var", "E0090", "cannot assign a value to final variable {0}"),
    ("cant.ref.before.ctor.called", "E0091", "cannot reference {0} before supertype constructor has been called"),
    ("illegal.forward.ref", "E0092", "illegal forward reference"),
    ("illegal.self.ref", "E0093", "self-reference in initializer"),
    ("forward.ref", "W0002", "reference to variable '{0}' before it has been initialized"),
    // control flow
    ("ret.outside.meth", "E0100", "return outside method"),
    ("unexpected.ret.val", "E0101", "incompatible types: unexpected return value"),
    ("missing.ret.val", "E0102", "missing return value"),
    ("break.outside.switch.loop", "E0103", "break outside switch or loop"),
    ("cont.outside.loop", "E0104", "continue outside of loop"),
    ("undef.label", "E0105", "undefined label: {0}"),
    ("not.loop.label", "E0106", "not a loop label: {0}"),
    ("label.already.in.use", "E0107", "label {0} already in use"),
    ("duplicate.case.label", "E0108", "duplicate case label"),
    ("duplicate.default.label", "E0109", "duplicate default label"),
    ("try.without.catch.or.finally", "E0110", "'try' without 'catch', 'finally' or resource declarations"),
    // lints
    ("unchecked.call.mbr.of.raw.type", "W0003", "unchecked call to {0} as a member of the raw type {1}"),
    ("redundant.cast", "W0004", "redundant cast to {0}"),
    ("try.resource.throws.interrupted.exc", "W0005", "auto-closeable resource {0} has a member method close() that could throw InterruptedException"),
];

fn lookup(key: &str) -> Option<&'static (&'static str, &'static str, &'static str)> {
    MESSAGES.iter().find(|(k, _, _)| *k == key)
}

/// The stable code of a message key, `"E0000"` for unknown keys.
pub fn error_code(key: &str) -> &'static str {
    lookup(key).map_or("E0000", |(_, code, _)| code)
}

/// The human-readable message of a diagnostic. Unknown keys render as the
/// key followed by the arguments.
pub fn format_message(diag: &Diagnostic) -> String {
    let Some((_, _, template)) = lookup(diag.key) else {
        return diag.to_string();
    };
    let mut out = String::with_capacity(template.len());
    let mut rest = *template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}').and_then(|close| after[..close].parse::<usize>().ok().map(|i| (i, close))) {
            Some((index, close)) => {
                out.push_str(diag.args.get(index).map_or("", String::as_str));
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

// ── Rendering ──────────────────────────────────────────────────────────

fn label_text(diag: &Diagnostic) -> &'static str {
    match diag.key {
        k if k.starts_with("cant.resolve") => "not found here",
        "incompatible.types" | "possible.loss.of.precision" => "found here",
        "ref.ambiguous" => "ambiguous reference",
        _ if diag.severity == Severity::Warning => "warning raised here",
        _ => "error raised here",
    }
}

fn help_text(diag: &Diagnostic) -> Option<String> {
    match diag.key {
        "possible.loss.of.precision" => Some(format!("add an explicit cast to {}", diag.args.get(1)?)),
        "missing.meth.body.or.decl.abstract" => Some("declare the method abstract or give it a body".into()),
        "does.not.override.abstract" => Some(format!("implement {} or declare {} abstract", diag.args.get(1)?, diag.args.first()?)),
        _ => diag.lint.map(|l| format!("suppress with the `{}` lint category", l.name())),
    }
}

/// Render a diagnostic against the source it was reported in.
pub fn render_diagnostic(diag: &Diagnostic, source: &str, filename: &str) -> String {
    let config = Config::default().with_color(false);
    let source_len = source.len();

    let clamp = |r: Range<usize>| -> Range<usize> {
        let s = r.start.min(source_len);
        let e = r.end.min(source_len).max(s);
        if s == e {
            s..e.saturating_add(1).min(source_len)
        } else {
            s..e
        }
    };
    let span = clamp(diag.span.start as usize..diag.span.end as usize);

    let kind = match diag.severity {
        Severity::Error => ReportKind::Error,
        Severity::Warning => ReportKind::Warning,
        Severity::Note => ReportKind::Advice,
    };
    let color = match diag.severity {
        Severity::Error => Color::Red,
        Severity::Warning => Color::Yellow,
        Severity::Note => Color::Blue,
    };
    let msg = format_message(diag);

    let mut builder = Report::build(kind, span.clone())
        .with_code(error_code(diag.key))
        .with_message(&msg)
        .with_config(config)
        .with_label(Label::new(span).with_message(label_text(diag)).with_color(color));
    if let Some(help) = help_text(diag) {
        builder = builder.with_help(help);
    }
    let at = LineIndex::new(source).start_of(diag.span);
    builder = builder.with_note(format!("at {}:{}", filename, at));
    let report = builder.finish();

    let mut buf = Vec::new();
    if report.write(Source::from(source), &mut buf).is_err() {
        return format!("[{}] {}", error_code(diag.key), msg);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_common::Span;

    #[test]
    fn every_key_has_one_code() {
        let mut seen = rustc_hash::FxHashSet::default();
        for (key, code, _) in MESSAGES {
            assert!(seen.insert(*key), "duplicate key {key}");
            assert!(code.starts_with('E') || code.starts_with('W'));
        }
    }

    #[test]
    fn placeholders_are_substituted() {
        let d = Diagnostic::error(Span::new(0, 1), "incompatible.types", vec!["String".into(), "int".into()]);
        insta::assert_snapshot!(format_message(&d), @"incompatible types: String cannot be converted to int");
        let d = Diagnostic::error(Span::new(0, 1), "cant.resolve.location", vec!["variable".into(), "x".into(), "class".into(), "p.C".into()]);
        insta::assert_snapshot!(format_message(&d), @"cannot find symbol: variable x in class p.C");
    }

    #[test]
    fn unknown_keys_fall_back_to_key() {
        let d = Diagnostic::error(Span::new(0, 1), "no.such.key", vec!["a".into()]);
        assert_eq!(format_message(&d), "no.such.key: a");
        assert_eq!(error_code("no.such.key"), "E0000");
    }

    #[test]
    fn render_includes_code_message_and_source() {
        let src = "int x = \"s\";";
        let d = Diagnostic::error(Span::new(8, 11), "incompatible.types", vec!["String".into(), "int".into()]);
        let out = render_diagnostic(&d, src, "Test.java");
        assert!(out.contains("E0021"), "{out}");
        assert!(out.contains("incompatible types: String cannot be converted to int"), "{out}");
        assert!(out.contains("found here"), "{out}");
        assert!(out.contains("at Test.java:1:9"), "{out}");
    }

    #[test]
    fn empty_spans_are_widened() {
        let d = Diagnostic::error(Span::new(3, 3), "illegal.start.of.expr", vec![]);
        let out = render_diagnostic(&d, "a = ;", "Test.java");
        assert!(out.contains("illegal start of expression"), "{out}");
    }
}
