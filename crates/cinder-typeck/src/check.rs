//! Declaration legality: modifier combinations, override and hiding
//! rules, unimplemented abstract methods and constructor call cycles.

use rustc_hash::FxHashSet;
use tracing::trace;

use cinder_ast::{ClassDecl, Member};
use cinder_common::Span;
use cinder_symtab::{names, Flags, SymKind, SymbolId};

use crate::attr::Attr;

/// Visibility rank: private < package < protected < public.
fn access_rank(flags: Flags) -> u8 {
    if flags.contains(Flags::PUBLIC) {
        3
    } else if flags.contains(Flags::PROTECTED) {
        2
    } else if flags.contains(Flags::PRIVATE) {
        0
    } else {
        1
    }
}

fn access_name(flags: Flags) -> &'static str {
    match access_rank(flags) {
        3 => "public",
        2 => "protected",
        0 => "private",
        _ => "package",
    }
}

impl Attr<'_> {
    // ── Modifiers ──────────────────────────────────────────────────────

    pub(crate) fn check_class_flags(&mut self, decl: &ClassDecl, c: SymbolId) {
        if self.syms.is_anonymous(c) {
            return;
        }
        let source = decl.mods & !(Flags::INTERFACE | Flags::ENUM | Flags::ANNOTATION);
        let allowed = if self.syms.is_local(c) {
            Flags::ABSTRACT | Flags::FINAL | Flags::STRICTFP
        } else if self.syms.owner_class(c).is_some() {
            Flags::MEMBER_CLASS_MODIFIERS
        } else {
            Flags::CLASS_MODIFIERS
        };
        let bad = source & !allowed;
        if !bad.is_empty() {
            self.error(decl.span, "mod.not.allowed.here", vec![bad.to_string()]);
        }
        if decl.mods.contains(Flags::ENUM) && source.intersects(Flags::ABSTRACT | Flags::FINAL) {
            let shown = source & (Flags::ABSTRACT | Flags::FINAL);
            self.error(decl.span, "mod.not.allowed.here", vec![shown.to_string()]);
        } else if source.contains(Flags::ABSTRACT | Flags::FINAL)
            || decl.mods.contains(Flags::INTERFACE) && source.contains(Flags::FINAL)
        {
            self.error(decl.span, "illegal.combination.of.modifiers", vec!["abstract".into(), "final".into()]);
        }
        if let Some((a, b)) = conflicting_access(source) {
            self.error(decl.span, "illegal.combination.of.modifiers", vec![a.into(), b.into()]);
        }

        for member in &decl.members {
            match member {
                Member::Method(md) => {
                    let flags = md.sym.map_or(md.mods, |m| self.syms.flags(m));
                    if let Some((a, b)) = conflicting_access(md.mods) {
                        self.error(md.span, "illegal.combination.of.modifiers", vec![a.into(), b.into()]);
                    } else if flags.contains(Flags::ABSTRACT) {
                        let clash = [
                            (Flags::PRIVATE, "private"),
                            (Flags::STATIC, "static"),
                            (Flags::FINAL, "final"),
                            (Flags::NATIVE, "native"),
                            (Flags::SYNCHRONIZED, "synchronized"),
                        ]
                        .into_iter()
                        .find(|(f, _)| md.mods.contains(*f));
                        if let Some((_, name)) = clash {
                            self.error(md.span, "illegal.combination.of.modifiers", vec!["abstract".into(), name.into()]);
                        }
                    }
                }
                Member::Var(v) => {
                    if let Some((a, b)) = conflicting_access(v.mods) {
                        self.error(v.span, "illegal.combination.of.modifiers", vec![a.into(), b.into()]);
                    } else if v.mods.contains(Flags::FINAL | Flags::VOLATILE) {
                        self.error(v.span, "illegal.combination.of.modifiers", vec!["final".into(), "volatile".into()]);
                    }
                }
                Member::Class(_) | Member::Init(_) => {}
            }
        }
    }

    // ── Overriding ─────────────────────────────────────────────────────

    /// Check `m` against every same-named method of its supertypes.
    pub(crate) fn check_override(&mut self, span: Span, m: SymbolId) {
        if self.syms.is_constructor(m) || self.syms.kind(m) != SymKind::Method {
            return;
        }
        let Some(c) = self.syms.owner_class(m) else { return };
        let name = self.syms.name(m).to_string();
        let site = self.syms.ty(c).clone();
        for sup in self.syms.closure(&site) {
            let Some(sc) = sup.class_sym() else { continue };
            if sc == c {
                continue;
            }
            let others: Vec<SymbolId> = self.syms.methods_named(sc, &name).collect();
            for other in others {
                if self.check_one_override(span, m, other, c) {
                    return;
                }
            }
        }
    }

    /// Returns true once an error was reported for the pair.
    fn check_one_override(&mut self, span: Span, m: SymbolId, other: SymbolId, c: SymbolId) -> bool {
        let mflags = self.syms.flags(m);
        let oflags = self.syms.flags(other);
        if oflags.contains(Flags::SYNTHETIC) {
            return false;
        }
        let site = self.syms.ty(c).clone();
        let mt = self.syms.member_type(&site, m);
        let ot = self.syms.member_type(&site, other);

        if mflags.contains(Flags::STATIC) {
            if !oflags.intersects(Flags::STATIC | Flags::PRIVATE)
                && self.syms.is_inherited_in(other, c)
                && self.syms.is_sub_signature(&mt, &ot)
            {
                let args = self.override_args(m, other);
                self.error(span, "override.static", args);
                return true;
            }
            return false;
        }

        if oflags.contains(Flags::STATIC) && self.syms.is_inherited_in(other, c) && self.syms.is_sub_signature(&mt, &ot) {
            let mut args = self.override_args(m, other);
            args.push("static".to_string());
            self.error(span, "override.meth", args);
            return true;
        }
        if !self.syms.overrides(m, other, c, false) {
            if !oflags.intersects(Flags::STATIC | Flags::PRIVATE)
                && self.syms.is_inherited_in(other, c)
                && self.syms.has_same_args(&self.syms.erasure(&mt), &self.syms.erasure(&ot))
            {
                let args = self.override_args(m, other);
                self.error(span, "name.clash.same.erasure.no.override", args);
                return true;
            }
            return false;
        }
        trace!(method = %self.show_sym(m), overridden = %self.show_sym(other), "override");

        if oflags.contains(Flags::FINAL) {
            let mut args = self.override_args(m, other);
            args.push("final".to_string());
            self.error(span, "override.meth", args);
            return true;
        }
        if access_rank(mflags) < access_rank(oflags) {
            let mut args = self.override_args(m, other);
            args.push(access_name(oflags).to_string());
            self.error(span, "override.weaker.access", args);
            return true;
        }
        let (mr, or) = (mt.ret(), ot.ret());
        if !self.syms.return_type_substitutable(&mr, &or, self.opts.covariant_returns) {
            let mut args = self.override_args(m, other);
            args.push(self.show(&mr));
            args.push(self.show(&or));
            self.error(span, "override.incompatible.ret", args);
            return true;
        }
        let uncovered = mt
            .thrown()
            .iter()
            .find(|t| self.syms.is_checked_exception(t) && !ot.thrown().iter().any(|o| self.syms.is_subtype(t, o)))
            .cloned();
        if let Some(t) = uncovered {
            let mut args = self.override_args(m, other);
            args.push(self.show(&t));
            self.error(span, "override.meth.doesnt.throw", args);
            return true;
        }
        false
    }

    fn override_args(&self, m: SymbolId, other: SymbolId) -> Vec<String> {
        let owner = |s: SymbolId| self.syms.owner(s).map(|o| self.syms.fullname(o)).unwrap_or_default();
        vec![self.show_sym(m), owner(m), self.show_sym(other), owner(other)]
    }

    // ── Whole-class checks ─────────────────────────────────────────────

    pub(crate) fn check_class(&mut self, decl: &ClassDecl, c: SymbolId) {
        self.check_abstract_implemented(decl, c);
        self.check_ctor_cycles(decl, c);
    }

    /// A concrete class must implement every abstract method it inherits.
    fn check_abstract_implemented(&mut self, decl: &ClassDecl, c: SymbolId) {
        let flags = self.syms.flags(c);
        if flags.intersects(Flags::ABSTRACT | Flags::INTERFACE) {
            return;
        }
        // Enums with constant bodies are implicitly abstract until their
        // constants supply the methods.
        if flags.contains(Flags::ENUM) && !flags.contains(Flags::FINAL) {
            return;
        }
        let site = self.syms.ty(c).clone();
        for sup in self.syms.closure(&site) {
            let Some(sc) = sup.class_sym() else { continue };
            let abstracts: Vec<SymbolId> = self
                .syms
                .members(sc)
                .iter()
                .filter(|&s| self.syms.kind(s) == SymKind::Method && self.syms.flags(s).contains(Flags::ABSTRACT))
                .collect();
            for am in abstracts {
                let implemented = self
                    .syms
                    .implementation(am, c)
                    .is_some_and(|i| !self.syms.flags(i).contains(Flags::ABSTRACT));
                if !implemented {
                    let args = vec![self.syms.fullname(c), self.show_sym(am), self.syms.fullname(sc)];
                    self.error(decl.span, "does.not.override.abstract", args);
                    return;
                }
            }
        }
    }

    /// Constructors of `c` that reach themselves through `this(...)` calls.
    fn check_ctor_cycles(&mut self, decl: &ClassDecl, c: SymbolId) {
        let mut reported: FxHashSet<SymbolId> = FxHashSet::default();
        for member in &decl.members {
            let Member::Method(md) = member else { continue };
            let Some(start) = md.sym else { continue };
            if md.name != names::INIT || reported.contains(&start) {
                continue;
            }
            let mut chain = vec![start];
            let mut cur = start;
            while let Some(&next) = self.ctor_calls.get(&cur) {
                if self.syms.owner(next) != Some(c) {
                    break;
                }
                if next == start {
                    self.error(md.span, "recursive.ctor.invocation", vec![]);
                    reported.extend(chain.iter().copied());
                    break;
                }
                if chain.contains(&next) {
                    break;
                }
                chain.push(next);
                cur = next;
            }
        }
    }
}

fn conflicting_access(flags: Flags) -> Option<(&'static str, &'static str)> {
    let present: Vec<&'static str> = [(Flags::PUBLIC, "public"), (Flags::PROTECTED, "protected"), (Flags::PRIVATE, "private")]
        .into_iter()
        .filter(|(f, _)| flags.contains(*f))
        .map(|(_, n)| n)
        .collect();
    match present.as_slice() {
        [a, b, ..] => Some((*a, *b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_ranks_are_ordered() {
        assert!(access_rank(Flags::PRIVATE) < access_rank(Flags::EMPTY));
        assert!(access_rank(Flags::EMPTY) < access_rank(Flags::PROTECTED));
        assert!(access_rank(Flags::PROTECTED) < access_rank(Flags::PUBLIC | Flags::STATIC));
        assert_eq!(access_name(Flags::FINAL), "package");
    }

    #[test]
    fn two_access_modifiers_conflict() {
        assert_eq!(conflicting_access(Flags::PUBLIC | Flags::PRIVATE), Some(("public", "private")));
        assert_eq!(conflicting_access(Flags::PUBLIC | Flags::FINAL), None);
    }
}
