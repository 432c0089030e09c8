//! Bridge methods.
//!
//! After erasure a method that overrides a generic or covariant supertype
//! method may no longer have the erased signature callers of the supertype
//! method use. For each such pair the class gets a synthetic method with the
//! supertype's erased signature that forwards to the implementation:
//!
//! ```text
//! class A<T> { void m(T t) }
//! class B extends A<String> { void m(String s) }
//! // B gains: /*synthetic bridge*/ void m(Object x0) { this.m((String) x0); }
//! ```
//!
//! Argument casts are left to erasure, which runs over the bridge bodies
//! like any other code.

use rustc_hash::FxHashMap;
use tracing::debug;

use cinder_ast::{ClassDecl, Member, TreeMaker};
use cinder_common::{CompileOptions, Log};
use cinder_symtab::{names, Flags, SymData, SymKind, SymbolId, Symtab, Type};

/// Add the bridges `class` needs, entering their symbols into its scope.
pub fn add_bridges(syms: &mut Symtab, class: &mut ClassDecl, opts: &CompileOptions, log: &mut Log) {
    let Some(origin) = class.sym else { return };
    if syms.is_interface(origin) {
        return;
    }
    let mut bridger = Bridger { syms, opts, log, origin, overridden: FxHashMap::default(), added: Vec::new() };
    let supertypes: Vec<Type> = bridger.syms.closure(bridger.syms.ty(origin)).into_iter().skip(1).collect();
    for st in supertypes {
        let Some(c) = st.class_sym() else { continue };
        let members: Vec<SymbolId> = bridger.syms.members(c).iter().collect();
        for m in members {
            bridger.bridge_if_needed(m, class);
        }
    }
    let added = std::mem::take(&mut bridger.added);
    if !added.is_empty() {
        debug!(class = %bridger.syms.flatname(origin), bridges = added.len(), "bridges added");
    }
    class.members.extend(added);
}

struct Bridger<'a> {
    syms: &'a mut Symtab,
    opts: &'a CompileOptions,
    log: &'a mut Log,
    origin: SymbolId,
    /// Bridge symbol to the supertype method it was added for.
    overridden: FxHashMap<SymbolId, SymbolId>,
    added: Vec<Member>,
}

impl Bridger<'_> {
    fn bridge_if_needed(&mut self, m: SymbolId, class: &ClassDecl) {
        let syms = &*self.syms;
        let flags = syms.flags(m);
        if syms.kind(m) != SymKind::Method
            || syms.is_constructor(m)
            || flags.intersects(Flags::PRIVATE | Flags::STATIC | Flags::OPERATOR)
            || (flags.contains(Flags::SYNTHETIC) && !flags.contains(Flags::OVERRIDE_BRIDGE))
            || !syms.is_inherited_in(m, self.origin)
        {
            return;
        }
        let origin = self.origin;
        let bridge = self.binary_implementation(m);
        let implementation = self.class_implementation(m);
        let owner = |s: SymbolId| self.syms.owner(s).unwrap_or(origin);

        let unbridged = match (bridge, implementation) {
            (None, _) => true,
            (Some(b), _) if b == m => true,
            (Some(b), Some(i)) => !self.syms.is_subclass(owner(b), owner(i)),
            (Some(_), None) => false,
        };
        if unbridged {
            let Some(i) = implementation else { return };
            if bridge != Some(i) && self.is_bridge_needed(m, i) {
                self.add_bridge(m, i, class);
            } else if self.opts.public_bridges_from_hidden_supertypes && self.is_hidden_public(m, i) {
                self.add_bridge(m, i, class);
            }
            return;
        }

        let Some(b) = bridge else { return };
        let bflags = self.syms.flags(b);
        if bflags.contains(Flags::SYNTHETIC) && !bflags.contains(Flags::OVERRIDE_BRIDGE) {
            // A bridge with this erasure was already added for another method.
            let Some(other) = self.overridden.get(&b).copied() else { return };
            if other != m && !implementation.is_some_and(|i| self.syms.overrides(i, other, origin, true)) {
                self.name_clash(class, other, m);
            }
        } else if !self.syms.overrides(b, m, origin, true) {
            let related = self.syms.ty(owner(b)).clone();
            if owner(b) == origin || self.syms.as_super(&related, owner(m)).is_none() {
                self.name_clash(class, b, m);
            }
        }
    }

    /// The method with the same name and erased signature as `m` that a
    /// virtual call dispatches to from `origin`, ignoring source overriding.
    fn binary_implementation(&self, m: SymbolId) -> Option<SymbolId> {
        let syms = &*self.syms;
        let erased = syms.erasure(syms.ty(m));
        let mut cur = Some(self.origin);
        while let Some(c) = cur {
            let found = syms.methods_named(c, syms.name(m)).find(|e| {
                *e == m || (!syms.is_constructor(*e) && syms.is_same_type(&syms.erasure(syms.ty(*e)), &erased))
            });
            if found.is_some() {
                return found;
            }
            cur = syms.superclass_sym(c);
        }
        None
    }

    /// The method overriding `m` in `origin` or its superclasses.
    fn class_implementation(&self, m: SymbolId) -> Option<SymbolId> {
        let syms = &*self.syms;
        let mut cur = Some(self.origin);
        while let Some(c) = cur {
            let found = syms.methods_named(c, syms.name(m)).find(|e| {
                let flags = syms.flags(*e);
                !flags.contains(Flags::HYPOTHETICAL)
                    && !(flags.contains(Flags::SYNTHETIC) && !flags.contains(Flags::OVERRIDE_BRIDGE))
                    && (*e == m || syms.overrides(*e, m, self.origin, true))
            });
            if found.is_some() {
                return found;
            }
            cur = syms.superclass_sym(c);
        }
        None
    }

    fn is_bridge_needed(&self, m: SymbolId, implementation: SymbolId) -> bool {
        let syms = &*self.syms;
        let erased = syms.erasure(syms.ty(m));
        if implementation == m {
            return !syms.flags(m).contains(Flags::ABSTRACT) && !self.same_when_erased(m, &erased);
        }
        let impl_erased = syms.erasure(syms.ty(implementation));
        !self.same_when_erased(m, &erased)
            || !self.same_when_erased(implementation, &impl_erased)
            || !syms.is_same_type(&impl_erased.ret(), &erased.ret())
    }

    /// Whether `m` seen as a member of `origin` still erases to `erased`.
    fn same_when_erased(&self, m: SymbolId, erased: &Type) -> bool {
        let syms = &*self.syms;
        let site = syms.ty(self.origin).clone();
        syms.is_same_type(&syms.erasure(&syms.member_type(&site, m)), erased)
    }

    /// A public method of a non-public superclass, inherited unchanged into
    /// a public class.
    fn is_hidden_public(&self, m: SymbolId, implementation: SymbolId) -> bool {
        let syms = &*self.syms;
        let Some(owner) = syms.owner(implementation) else { return false };
        implementation == m
            && owner != self.origin
            && !syms.flags(implementation).contains(Flags::FINAL)
            && syms.flags(m).contains(Flags::PUBLIC)
            && !syms.flags(m).contains(Flags::ABSTRACT)
            && syms.flags(self.origin).contains(Flags::PUBLIC)
            && !syms.flags(owner).contains(Flags::PUBLIC)
    }

    fn add_bridge(&mut self, m: SymbolId, implementation: SymbolId, class: &ClassDecl) {
        let origin = self.origin;
        let bridge_ty = self.syms.erasure(self.syms.ty(m));
        let flags = (self.syms.flags(implementation) & Flags::ACCESS) | Flags::SYNTHETIC | Flags::BRIDGE | Flags::LOWERED;
        let name = self.syms.name(m).to_string();
        let bridge = self.syms.new_method(origin, &name, flags, bridge_ty.clone(), Vec::new());
        let params: Vec<SymbolId> = bridge_ty
            .params()
            .iter()
            .enumerate()
            .map(|(i, ty)| {
                self.syms.new_var(bridge, &format!("x{}", i), Flags::PARAMETER | Flags::SYNTHETIC | Flags::LOWERED, ty.clone())
            })
            .collect();
        if let SymData::Method(info) = &mut self.syms.sym_mut(bridge).data {
            info.params = params.clone();
        }
        self.syms.enter_member(origin, bridge);
        self.overridden.insert(bridge, m);

        let syms = &*self.syms;
        let make = TreeMaker::at(class.span);
        let receiver = match syms.owner(implementation) {
            Some(owner) if owner != origin => {
                let sup = syms.superclass_sym(origin).unwrap_or(syms.predef.object);
                make.ident_named(names::SUPER, origin, syms.erasure(syms.ty(sup)))
            }
            _ => make.this(origin, syms.erasure(syms.ty(origin))),
        };
        let args = params.iter().map(|p| make.ident(syms, *p)).collect();
        let call = make.call_method(syms, receiver, implementation, args);
        let stmt = if bridge_ty.ret().is_void() { make.exec(call) } else { make.return_(Some(call)) };
        let decl = make.method_decl(syms, bridge, Some(make.block(vec![stmt])));
        debug!(
            bridge = %syms.display_sym(bridge),
            target = %syms.display_sym(implementation),
            class = %syms.flatname(origin),
            "bridge"
        );
        self.added.push(Member::Method(decl));
    }

    fn name_clash(&mut self, class: &ClassDecl, first: SymbolId, second: SymbolId) {
        let syms = &*self.syms;
        let location = |s: SymbolId| syms.owner(s).map(|o| syms.fullname(o)).unwrap_or_default();
        let args = vec![
            syms.display_sym(first).to_string(),
            location(first),
            syms.display_sym(second).to_string(),
            location(second),
        ];
        self.log.error(class.span, "name.clash.same.erasure.no.override", args);
    }
}
