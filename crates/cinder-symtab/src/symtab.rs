//! The symbol arena and its bookkeeping.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::flags::Flags;
use crate::names;
use crate::predef::{self, Predef};
use crate::scope::Scope;
use crate::symbol::{
    ClassInfo, CompletionState, MethodInfo, PackageInfo, SymData, SymKind, Symbol, SymbolId,
    VarInfo,
};
use crate::ty::{ClassType, Type};

/// Failure to load an external class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionFailure {
    pub class: String,
    pub reason: String,
}

impl fmt::Display for CompletionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class file for {} not found: {}", self.class, self.reason)
    }
}

impl std::error::Error for CompletionFailure {}

/// The class-reader collaborator: fills in members and supertypes of classes
/// that were entered lazily.
pub trait Completer {
    fn complete(&mut self, syms: &mut Symtab, class: SymbolId) -> Result<(), CompletionFailure>;
}

/// The symbol table: an arena of symbols plus package and class indexes.
pub struct Symtab {
    symbols: Vec<Symbol>,
    packages: FxHashMap<String, SymbolId>,
    /// Classes by binary (flat) name.
    classes: FxHashMap<String, SymbolId>,
    pub predef: Predef,
    completer: Option<Box<dyn Completer>>,
}

impl Symtab {
    /// A symbol table with the root package, `java.lang` and the predefined
    /// classes and operators entered.
    pub fn new() -> Self {
        let mut syms = Symtab {
            symbols: Vec::new(),
            packages: FxHashMap::default(),
            classes: FxHashMap::default(),
            predef: Predef::placeholder(),
            completer: None,
        };
        syms.predef = predef::install(&mut syms);
        syms
    }

    pub fn set_completer(&mut self, completer: Box<dyn Completer>) {
        self.completer = Some(completer);
    }

    // ── Arena access ───────────────────────────────────────────────────

    pub fn sym(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn sym_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.index()]
    }

    pub fn name(&self, id: SymbolId) -> &str {
        &self.sym(id).name
    }

    pub fn kind(&self, id: SymbolId) -> SymKind {
        self.sym(id).kind
    }

    pub fn flags(&self, id: SymbolId) -> Flags {
        self.sym(id).flags
    }

    pub fn owner(&self, id: SymbolId) -> Option<SymbolId> {
        self.sym(id).owner
    }

    pub fn ty(&self, id: SymbolId) -> &Type {
        &self.sym(id).ty
    }

    pub fn is_static(&self, id: SymbolId) -> bool {
        self.flags(id).contains(Flags::STATIC)
    }

    pub fn is_interface(&self, id: SymbolId) -> bool {
        self.flags(id).contains(Flags::INTERFACE)
    }

    pub fn is_constructor(&self, id: SymbolId) -> bool {
        self.sym(id).is_constructor()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn add_symbol(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(symbol);
        id
    }

    // ── Packages ───────────────────────────────────────────────────────

    /// The package with the given dotted name, entering it (and its parents)
    /// if needed. The empty name is the unnamed package.
    pub fn enter_package(&mut self, fullname: &str) -> SymbolId {
        if let Some(id) = self.packages.get(fullname) {
            return *id;
        }
        let (owner, simple) = match fullname.rfind('.') {
            Some(dot) => (Some(self.enter_package(&fullname[..dot])), &fullname[dot + 1..]),
            None if fullname.is_empty() => (None, ""),
            None => (Some(self.enter_package("")), fullname),
        };
        let id = self.add_symbol(Symbol {
            name: simple.to_string(),
            kind: SymKind::Package,
            flags: Flags::EMPTY,
            owner,
            ty: Type::None,
            data: SymData::Package(PackageInfo { fullname: fullname.to_string(), members: Scope::new() }),
        });
        self.sym_mut(id).ty = Type::Package(id);
        if let Some(owner) = owner {
            if let SymData::Package(info) = &mut self.sym_mut(owner).data {
                info.members.enter(simple, id);
            }
        }
        self.packages.insert(fullname.to_string(), id);
        id
    }

    pub fn package(&self, fullname: &str) -> Option<SymbolId> {
        self.packages.get(fullname).copied()
    }

    pub fn package_fullname(&self, pkg: SymbolId) -> &str {
        match &self.sym(pkg).data {
            SymData::Package(info) => &info.fullname,
            _ => "",
        }
    }

    pub fn package_members(&self, pkg: SymbolId) -> Option<&Scope> {
        match &self.sym(pkg).data {
            SymData::Package(info) => Some(&info.members),
            _ => None,
        }
    }

    // ── Classes ────────────────────────────────────────────────────────

    /// Enter a class symbol owned by a package, a class, or (for local and
    /// anonymous classes) a method or variable. An empty `name` makes an
    /// anonymous class.
    pub fn enter_class(&mut self, owner: SymbolId, name: &str, flags: Flags) -> SymbolId {
        let (fullname, flatname) = self.class_names(owner, name);
        let outer = self.implicit_outer_type(owner, flags);
        let id = self.add_symbol(Symbol {
            name: name.to_string(),
            kind: SymKind::Class,
            flags,
            owner: Some(owner),
            ty: Type::Error,
            data: SymData::Class(ClassInfo {
                fullname,
                flatname: flatname.clone(),
                members: Scope::new(),
                supertype: None,
                interfaces: Vec::new(),
                type_params: Vec::new(),
                state: CompletionState::Complete,
                local_class_count: 0,
            }),
        });
        self.sym_mut(id).ty = Type::Class(ClassType { sym: id, args: Vec::new(), outer: outer.map(Box::new) });
        match self.kind(owner) {
            SymKind::Package => {
                if let SymData::Package(info) = &mut self.sym_mut(owner).data {
                    info.members.enter(name, id);
                }
            }
            SymKind::Class => self.members_mut(owner).enter(name, id),
            _ => {}
        }
        self.classes.insert(flatname, id);
        id
    }

    /// Enter a class whose members are loaded on first use.
    pub fn enter_lazy_class(&mut self, owner: SymbolId, name: &str, flags: Flags) -> SymbolId {
        let id = self.enter_class(owner, name, flags);
        if let Some(info) = self.sym_mut(id).class_info_mut() {
            info.state = CompletionState::Pending;
        }
        id
    }

    fn class_names(&mut self, owner: SymbolId, name: &str) -> (String, String) {
        match self.kind(owner) {
            SymKind::Package => {
                let pkg = self.package_fullname(owner);
                if pkg.is_empty() {
                    (name.to_string(), name.to_string())
                } else {
                    (format!("{}.{}", pkg, name), format!("{}.{}", pkg, name))
                }
            }
            SymKind::Class => {
                let info = self.class_info(owner);
                (format!("{}.{}", info.fullname, name), format!("{}${}", info.flatname, name))
            }
            _ => {
                let encl = self.enclosing_class(owner).unwrap_or(self.predef.object);
                let index = {
                    let info = self.class_info_mut(encl);
                    info.local_class_count += 1;
                    info.local_class_count
                };
                let flat = format!("{}${}{}", self.class_info(encl).flatname, index, name);
                (name.to_string(), flat)
            }
        }
    }

    /// The enclosing instance type a new class gets: the enclosing class's
    /// type for non-static member classes and for local classes declared in
    /// a non-static context.
    fn implicit_outer_type(&self, owner: SymbolId, flags: Flags) -> Option<Type> {
        if flags.intersects(Flags::STATIC | Flags::INTERFACE) {
            return None;
        }
        match self.kind(owner) {
            SymKind::Class if !self.is_interface(owner) => Some(self.ty(owner).clone()),
            SymKind::Method | SymKind::Var if !self.is_static(owner) => {
                self.enclosing_class(owner).map(|c| self.ty(c).clone())
            }
            _ => None,
        }
    }

    pub fn class_by_flatname(&self, flatname: &str) -> Option<SymbolId> {
        self.classes.get(flatname).copied()
    }

    pub fn class_info(&self, class: SymbolId) -> &ClassInfo {
        match &self.sym(class).data {
            SymData::Class(info) => info,
            _ => panic!("symbol `{}` is not a class", self.name(class)),
        }
    }

    pub fn class_info_mut(&mut self, class: SymbolId) -> &mut ClassInfo {
        let name = self.name(class).to_string();
        match &mut self.sym_mut(class).data {
            SymData::Class(info) => info,
            _ => panic!("symbol `{}` is not a class", name),
        }
    }

    pub fn is_class(&self, id: SymbolId) -> bool {
        self.kind(id) == SymKind::Class
    }

    pub fn members(&self, class: SymbolId) -> &Scope {
        &self.class_info(class).members
    }

    pub fn members_mut(&mut self, class: SymbolId) -> &mut Scope {
        &mut self.class_info_mut(class).members
    }

    pub fn class_type_params(&self, class: SymbolId) -> &[SymbolId] {
        match &self.sym(class).data {
            SymData::Class(info) => &info.type_params,
            _ => &[],
        }
    }

    /// Declare the type parameters of a class and refresh its declared type.
    pub fn set_class_type_params(&mut self, class: SymbolId, params: Vec<SymbolId>) {
        let args = params.iter().map(|p| Type::TypeVar(*p)).collect();
        self.class_info_mut(class).type_params = params;
        if let Type::Class(ct) = &mut self.sym_mut(class).ty {
            ct.args = args;
        }
    }

    pub fn set_supertypes(&mut self, class: SymbolId, supertype: Option<Type>, interfaces: Vec<Type>) {
        let info = self.class_info_mut(class);
        info.supertype = supertype;
        info.interfaces = interfaces;
    }

    pub fn fullname(&self, id: SymbolId) -> String {
        match &self.sym(id).data {
            SymData::Class(info) => info.fullname.clone(),
            SymData::Package(info) => info.fullname.clone(),
            _ => self.name(id).to_string(),
        }
    }

    pub fn flatname(&self, class: SymbolId) -> &str {
        &self.class_info(class).flatname
    }

    // ── Members ────────────────────────────────────────────────────────

    /// Enter a member symbol into its owning class's scope.
    pub fn enter_member(&mut self, class: SymbolId, member: SymbolId) {
        let name = self.name(member).to_string();
        self.members_mut(class).enter(&name, member);
    }

    pub fn new_var(&mut self, owner: SymbolId, name: &str, flags: Flags, ty: Type) -> SymbolId {
        self.add_symbol(Symbol {
            name: name.to_string(),
            kind: SymKind::Var,
            flags,
            owner: Some(owner),
            ty,
            data: SymData::Var(VarInfo::default()),
        })
    }

    pub fn new_method(
        &mut self,
        owner: SymbolId,
        name: &str,
        flags: Flags,
        ty: Type,
        params: Vec<SymbolId>,
    ) -> SymbolId {
        self.add_symbol(Symbol {
            name: name.to_string(),
            kind: SymKind::Method,
            flags,
            owner: Some(owner),
            ty,
            data: SymData::Method(MethodInfo { params }),
        })
    }

    /// A type variable with an unattributed (absent) bound.
    pub fn new_type_var(&mut self, owner: SymbolId, name: &str) -> SymbolId {
        let id = self.add_symbol(Symbol {
            name: name.to_string(),
            kind: SymKind::TypeVar,
            flags: Flags::EMPTY,
            owner: Some(owner),
            ty: Type::Error,
            data: SymData::TypeVar(None),
        });
        self.sym_mut(id).ty = Type::TypeVar(id);
        id
    }

    /// Upper bound of a type variable. Falls back to the root class when
    /// the bound has not been attributed yet.
    pub fn bound(&self, tv: SymbolId) -> Type {
        match &self.sym(tv).data {
            SymData::TypeVar(Some(bound)) => bound.clone(),
            _ => {
                debug_assert!(
                    self.owner(tv)
                        .map_or(true, |o| self.flags(o).contains(Flags::UNATTRIBUTED)),
                    "type variable `{}` observed without a bound",
                    self.name(tv)
                );
                self.object_type()
            }
        }
    }

    pub fn set_bound(&mut self, tv: SymbolId, bound: Type) {
        self.sym_mut(tv).data = SymData::TypeVar(Some(bound));
    }

    pub fn set_const_value(&mut self, var: SymbolId, value: crate::ty::Constant) {
        if let SymData::Var(info) = &mut self.sym_mut(var).data {
            info.const_value = Some(value);
        }
    }

    pub fn var_decl_pos(&self, var: SymbolId) -> u32 {
        match &self.sym(var).data {
            SymData::Var(info) => info.decl_pos,
            _ => 0,
        }
    }

    pub fn set_var_decl_pos(&mut self, var: SymbolId, pos: u32) {
        if let SymData::Var(info) = &mut self.sym_mut(var).data {
            info.decl_pos = pos;
        }
    }

    /// Type parameters of a class or generic method.
    pub fn type_params(&self, id: SymbolId) -> Vec<SymbolId> {
        match (&self.sym(id).data, &self.sym(id).ty) {
            (SymData::Class(info), _) => info.type_params.clone(),
            (_, Type::ForAll(fa)) => fa.tvars.clone(),
            _ => Vec::new(),
        }
    }

    // ── Completion ─────────────────────────────────────────────────────

    /// Make sure a class's members and supertypes are available.
    pub fn complete(&mut self, class: SymbolId) -> Result<(), CompletionFailure> {
        let state = match &self.sym(class).data {
            SymData::Class(info) => info.state.clone(),
            _ => return Ok(()),
        };
        match state {
            CompletionState::Complete => Ok(()),
            CompletionState::Failed(reason) => {
                Err(CompletionFailure { class: self.fullname(class), reason })
            }
            CompletionState::Pending => {
                // Mark complete first so that re-entrant lookups from the
                // completer see an (empty) class instead of recursing.
                self.class_info_mut(class).state = CompletionState::Complete;
                let Some(mut completer) = self.completer.take() else {
                    let reason = "no class reader available".to_string();
                    self.class_info_mut(class).state = CompletionState::Failed(reason.clone());
                    return Err(CompletionFailure { class: self.fullname(class), reason });
                };
                let result = completer.complete(self, class);
                self.completer = Some(completer);
                if let Err(failure) = &result {
                    self.class_info_mut(class).state = CompletionState::Failed(failure.reason.clone());
                    if self.class_info(class).supertype.is_none() && class != self.predef.object {
                        self.class_info_mut(class).supertype = Some(self.object_type());
                    }
                }
                result
            }
        }
    }

    // ── Ownership queries ──────────────────────────────────────────────

    /// The nearest class enclosing (or equal to) `id`.
    pub fn enclosing_class(&self, id: SymbolId) -> Option<SymbolId> {
        let mut cur = Some(id);
        while let Some(s) = cur {
            if self.kind(s) == SymKind::Class {
                return Some(s);
            }
            cur = self.owner(s);
        }
        None
    }

    /// The top-level class containing `id`.
    pub fn outermost_class(&self, id: SymbolId) -> Option<SymbolId> {
        let mut result = None;
        let mut cur = Some(id);
        while let Some(s) = cur {
            if self.kind(s) == SymKind::Class {
                result = Some(s);
            }
            cur = self.owner(s);
        }
        result
    }

    pub fn package_of(&self, id: SymbolId) -> SymbolId {
        let mut cur = id;
        while self.kind(cur) != SymKind::Package {
            match self.owner(cur) {
                Some(owner) => cur = owner,
                None => return self.predef.root_package,
            }
        }
        cur
    }

    /// Whether a class is declared inside a method, initializer or variable.
    pub fn is_local(&self, class: SymbolId) -> bool {
        let mut cur = self.owner(class);
        while let Some(s) = cur {
            match self.kind(s) {
                SymKind::Method | SymKind::Var => return true,
                SymKind::Package => return false,
                _ => cur = self.owner(s),
            }
        }
        false
    }

    pub fn is_anonymous(&self, class: SymbolId) -> bool {
        self.is_class(class) && self.name(class).is_empty()
    }

    /// Whether instances of `class` carry a reference to an enclosing
    /// instance.
    pub fn has_outer_instance(&self, class: SymbolId) -> bool {
        matches!(self.ty(class), Type::Class(ClassType { outer: Some(_), .. }))
            && !self.flags(class).intersects(Flags::INTERFACE | Flags::NO_OUTER_THIS)
    }

    /// The class whose instance encloses instances of `class`.
    pub fn outer_class(&self, class: SymbolId) -> Option<SymbolId> {
        match self.ty(class) {
            Type::Class(ClassType { outer: Some(outer), .. }) => outer.class_sym(),
            _ => None,
        }
    }

    /// Whether `a` and `b` live in the same package.
    pub fn same_package(&self, a: SymbolId, b: SymbolId) -> bool {
        self.package_of(a) == self.package_of(b)
    }

    /// The class that owns a member, for members owned by a class.
    pub fn owner_class(&self, member: SymbolId) -> Option<SymbolId> {
        self.owner(member).filter(|o| self.is_class(*o))
    }

    pub fn object_type(&self) -> Type {
        self.ty(self.predef.object).clone()
    }

    pub fn string_type(&self) -> Type {
        self.ty(self.predef.string).clone()
    }

    /// Iterate all symbols, e.g. for debugging dumps.
    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols.iter().enumerate().map(|(i, s)| (SymbolId(i as u32), s))
    }

    /// The method symbols named `name` declared directly in `class`.
    pub fn methods_named<'a>(&'a self, class: SymbolId, name: &'a str) -> impl Iterator<Item = SymbolId> + 'a {
        self.members(class).lookup(name).filter(move |m| self.kind(*m) == SymKind::Method)
    }

    /// Constructors declared in `class`.
    pub fn constructors(&self, class: SymbolId) -> Vec<SymbolId> {
        self.methods_named(class, names::INIT).collect()
    }
}

impl Default for Symtab {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packages_are_entered_with_parents() {
        let mut syms = Symtab::new();
        let util = syms.enter_package("java.util");
        let java = syms.package("java").unwrap();
        assert_eq!(syms.owner(util), Some(java));
        assert_eq!(syms.package_fullname(util), "java.util");
        assert_eq!(syms.enter_package("java.util"), util);
    }

    #[test]
    fn member_class_names() {
        let mut syms = Symtab::new();
        let pkg = syms.enter_package("p");
        let outer = syms.enter_class(pkg, "Outer", Flags::PUBLIC);
        let inner = syms.enter_class(outer, "Inner", Flags::EMPTY);
        let nested = syms.enter_class(outer, "Nested", Flags::STATIC);
        assert_eq!(syms.fullname(inner), "p.Outer.Inner");
        assert_eq!(syms.flatname(inner), "p.Outer$Inner");
        assert!(syms.has_outer_instance(inner));
        assert!(!syms.has_outer_instance(nested));
        assert_eq!(syms.class_by_flatname("p.Outer$Nested"), Some(nested));
        assert_eq!(syms.members(outer).first("Inner"), Some(inner));
    }

    #[test]
    fn local_classes_are_numbered_per_enclosing_class() {
        let mut syms = Symtab::new();
        let pkg = syms.enter_package("");
        let outer = syms.enter_class(pkg, "O", Flags::EMPTY);
        let m = syms.new_method(outer, "m", Flags::EMPTY, Type::method(vec![], Type::Void), vec![]);
        let anon = syms.enter_class(m, "", Flags::EMPTY);
        let local = syms.enter_class(m, "Local", Flags::EMPTY);
        assert_eq!(syms.flatname(anon), "O$1");
        assert_eq!(syms.flatname(local), "O$2Local");
        assert!(syms.is_local(local));
        assert!(syms.is_anonymous(anon));
        assert_eq!(syms.outermost_class(local), Some(outer));
    }

    struct FailingReader;

    impl Completer for FailingReader {
        fn complete(&mut self, _syms: &mut Symtab, _class: SymbolId) -> Result<(), CompletionFailure> {
            Err(CompletionFailure { class: "q.Missing".into(), reason: "bad class file".into() })
        }
    }

    #[test]
    fn completion_failure_is_sticky() {
        let mut syms = Symtab::new();
        syms.set_completer(Box::new(FailingReader));
        let pkg = syms.enter_package("q");
        let missing = syms.enter_lazy_class(pkg, "Missing", Flags::PUBLIC);
        assert!(syms.complete(missing).is_err());
        let again = syms.complete(missing).unwrap_err();
        assert_eq!(again.reason, "bad class file");
        assert!(syms.class_info(missing).supertype.is_some());
    }
}
