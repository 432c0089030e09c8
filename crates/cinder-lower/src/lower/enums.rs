//! Enum classes and switches on enum values.
//!
//! An enum class becomes a final subclass of `Enum` whose constructors take
//! the constant's name and ordinal first. A switch on an enum value goes
//! through an `int[]` map, indexed by ordinal, that lives in a synthetic
//! holder class nested in the top-level class.

use tracing::debug;

use cinder_ast::make::simple_flatname;
use cinder_ast::{Case, ClassDecl, Expr, ExprKind, Initializer, Member, NodeId, Stmt, StmtKind, TreeMaker, VarDecl};
use cinder_common::Span;
use cinder_symtab::{names, Flags, SymbolId, Type};

use super::{flattened_flags, Ctx, Lowerer};

/// Ordinal-to-label table for one enum class.
#[derive(Clone, Debug)]
pub(crate) struct SwitchMap {
    pub enum_: SymbolId,
    pub field: SymbolId,
    /// Constants in order of first use as a case label; the label of
    /// `constants[i]` is `i + 1`.
    pub constants: Vec<SymbolId>,
}

impl Lowerer<'_> {
    /// Enum classes and the anonymous bodies of their constants, whose
    /// constructors take a name and an ordinal.
    pub(crate) fn is_enum_like(&self, c: SymbolId) -> bool {
        let flags = self.syms.flags(c);
        if flags.contains(Flags::ENUM) {
            return true;
        }
        self.syms.is_anonymous(c)
            && self
                .syms
                .superclass_sym(c)
                .is_some_and(|s| s != self.syms.predef.enum_ && self.syms.flags(s).contains(Flags::ENUM))
    }

    /// Give an enum class its `$VALUES` cache and the bodies of `values()`
    /// and `valueOf(String)`, and turn it into a plain class.
    pub(crate) fn enum_class(&mut self, decl: &mut ClassDecl, c: SymbolId) {
        let make = TreeMaker::at(decl.span);
        let ety = self.syms.ty(c).clone();
        let array = Type::array(ety.clone());

        let mut constants = Vec::new();
        let mut after_constants = 0;
        for (i, member) in decl.members.iter().enumerate() {
            let Member::Var(var) = member else { continue };
            if let Some(f) = var.sym.filter(|f| self.syms.flags(*f).contains(Flags::ENUM_CONSTANT)) {
                self.enum_ordinals.insert(f, constants.len() as i32);
                constants.push(f);
                after_constants = i + 1;
            }
        }

        let flags = Flags::PRIVATE | Flags::STATIC | Flags::FINAL | Flags::SYNTHETIC | Flags::LOWERED;
        let cache = self.syms.new_var(c, names::ENUM_VALUES_FIELD, flags, array.clone());
        self.syms.enter_member(c, cache);
        let elems = constants.iter().map(|k| make.ident(self.syms, *k)).collect();
        let init = make.new_array_init(self.syms, ety.clone(), elems);
        decl.members.insert(after_constants, Member::Var(make.var_decl(self.syms, cache, Some(init))));

        let values = self
            .syms
            .methods_named(c, names::VALUES)
            .find(|m| self.syms.is_static(*m) && self.syms.ty(*m).params().is_empty());
        if let Some(values) = values {
            let copy = make.call_method(self.syms, make.ident(self.syms, cache), self.syms.predef.array_clone, Vec::new());
            let body = make.return_(Some(make.cast(self.syms, array, copy)));
            decl.members.push(Member::Method(make.method_decl(self.syms, values, Some(make.block(vec![body])))));
        }

        let string = self.syms.string_type();
        let value_of = self
            .syms
            .methods_named(c, names::VALUE_OF)
            .find(|m| self.syms.is_static(*m) && self.syms.ty(*m).params() == [string.clone()]);
        let lookup = self.syms.methods_named(self.syms.predef.enum_, names::VALUE_OF).next();
        if let (Some(value_of), Some(lookup)) = (value_of, lookup) {
            let name = self.syms.sym(value_of).method_params().first().copied();
            if let Some(name) = name {
                let args = vec![make.class_literal(self.syms, ety.clone()), make.ident(self.syms, name)];
                let found = make.call_static(self.syms, lookup, args);
                let body = make.return_(Some(make.cast(self.syms, ety.clone(), found)));
                decl.members.push(Member::Method(make.method_decl(self.syms, value_of, Some(make.block(vec![body])))));
            }
        }

        decl.mods.remove(Flags::ENUM);
        if self.syms.flags(c).contains(Flags::FINAL) {
            decl.mods.insert(Flags::FINAL);
        }
        let supertype = Type::class_with(self.syms.predef.enum_, vec![ety]);
        decl.extends = Some(make.type_tree(self.syms, &supertype));
        debug!(class = %self.syms.flatname(c), constants = constants.len(), "enum class");
    }

    /// Pass the name and ordinal of enum constant `f` to the constructor
    /// its lowered initializer invokes.
    pub(crate) fn number_enum_constant(&mut self, var: &mut VarDecl, f: SymbolId) {
        let Some(ordinal) = self.enum_ordinals.get(&f).copied() else { return };
        let Some(init) = var.init.as_mut() else { return };
        if let ExprKind::New { args, .. } = &mut init.kind {
            let make = TreeMaker::at(init.span);
            args.insert(0, make.int(ordinal));
            args.insert(0, make.string(self.syms, self.syms.name(f)));
        }
    }

    // ── Switch maps ────────────────────────────────────────────────────

    /// The synthetic class holding switch maps and tagging access
    /// constructors of the current top-level class.
    pub(crate) fn holder(&mut self) -> SymbolId {
        if let Some(h) = self.holder {
            return h;
        }
        let top = self.top;
        let number = {
            let info = self.syms.class_info_mut(top);
            info.local_class_count += 1;
            info.local_class_count
        };
        let flags = Flags::STATIC | Flags::FINAL | Flags::SYNTHETIC | Flags::LOWERED;
        let h = self.syms.enter_class(top, &number.to_string(), flags);
        let object = self.syms.object_type();
        self.syms.set_supertypes(h, Some(object), Vec::new());
        self.holder = Some(h);
        debug!(holder = %self.syms.flatname(h), "holder class");
        h
    }

    fn switch_map(&mut self, e: SymbolId) -> usize {
        if let Some(i) = self.switch_maps.iter().position(|m| m.enum_ == e) {
            return i;
        }
        let holder = self.holder();
        let name = format!("$SwitchMap${}", self.syms.fullname(e).replace('.', "$"));
        let flags = Flags::STATIC | Flags::FINAL | Flags::SYNTHETIC | Flags::LOWERED;
        let field = self.syms.new_var(holder, &name, flags, Type::array(Type::int()));
        self.syms.enter_member(holder, field);
        self.switch_maps.push(SwitchMap { enum_: e, field, constants: Vec::new() });
        self.switch_maps.len() - 1
    }

    fn switch_map_entry(&mut self, map: usize, constant: SymbolId) -> i32 {
        let constants = &mut self.switch_maps[map].constants;
        let index = match constants.iter().position(|k| *k == constant) {
            Some(i) => i,
            None => {
                constants.push(constant);
                constants.len() - 1
            }
        };
        index as i32 + 1
    }

    /// `switch (Holder.$SwitchMap$E[sel.ordinal()])` with each constant
    /// label replaced by its entry in the map.
    pub(crate) fn enum_switch(
        &mut self,
        id: NodeId,
        span: Span,
        e: SymbolId,
        selector: Expr,
        cases: Vec<Case>,
        cx: &Ctx,
    ) -> Stmt {
        let make = TreeMaker::at(span);
        let selector = self.expr(selector, cx);
        let map = self.switch_map(e);
        let field = self.switch_maps[map].field;
        let holder = self.holder();
        let table = make.select(self.syms, make.type_ident(self.syms, holder), field);
        let index = match self.syms.methods_named(self.syms.predef.enum_, names::ORDINAL).next() {
            Some(ordinal) => make.call_method(self.syms, selector, ordinal, Vec::new()),
            None => selector,
        };
        let selector = make.index(table, index);

        let mut lowered = Vec::with_capacity(cases.len());
        for case in cases {
            let label = case.label.map(|l| match l.sym {
                Some(k) => make.int(self.switch_map_entry(map, k)),
                None => l,
            });
            let stmts = case.stmts.into_iter().map(|s| self.stmt(s, cx)).collect();
            lowered.push(Case { span: case.span, label, stmts });
        }
        Stmt { id, span, kind: StmtKind::Switch { selector, cases: lowered } }
    }

    /// The holder class, with one map field per enum switched on and a
    /// static initializer filling them. Every store is guarded against the
    /// constant having disappeared from the enum.
    pub(crate) fn holder_decl(&mut self) -> Option<ClassDecl> {
        let h = self.holder?;
        let make = TreeMaker::at(self.top_span);
        let mut members = Vec::new();
        let mut fills = Vec::new();
        let ordinal = self.syms.methods_named(self.syms.predef.enum_, names::ORDINAL).next();
        let missing = Type::class(self.syms.predef.no_such_field_error);

        for map in std::mem::take(&mut self.switch_maps) {
            let init = self.values_length(&make, map.enum_).map(|len| make.new_array(self.syms, Type::int(), vec![len]));
            members.push(Member::Var(make.var_decl(self.syms, map.field, init)));
            let Some(ordinal) = ordinal else { continue };
            for (i, k) in map.constants.iter().enumerate() {
                let constant = make.select(self.syms, make.type_ident(self.syms, map.enum_), *k);
                let slot = make.index(make.ident(self.syms, map.field), make.call_method(self.syms, constant, ordinal, Vec::new()));
                let store = make.exec(make.assign(slot, make.int(i as i32 + 1)));
                let name = self.fresh.name(h, "ex");
                let ex = self.syms.new_var(h, &name, Flags::PARAMETER | Flags::SYNTHETIC | Flags::LOWERED, missing.clone());
                let catch = make.catch(make.var_decl(self.syms, ex, None), make.block(Vec::new()));
                fills.push(make.try_(make.block(vec![store]), vec![catch], None));
            }
        }
        if !fills.is_empty() {
            members.push(Member::Init(Initializer { is_static: true, body: make.block(fills) }));
        }
        let mut decl = make.class_decl(self.syms, h, members);
        decl.name = simple_flatname(self.syms, h);
        decl.mods = flattened_flags(decl.mods);
        Some(decl)
    }

    /// `E.values().length`.
    fn values_length(&self, make: &TreeMaker, e: SymbolId) -> Option<Expr> {
        let values = self.syms.methods_named(e, names::VALUES).next()?;
        let all = make.call_static(self.syms, values, Vec::new());
        Some(make.select(self.syms, all, self.syms.predef.length))
    }
}
