//! Symbols: packages, classes, type variables, variables and methods.

use crate::flags::Flags;
use crate::scope::Scope;
use crate::ty::{Constant, Type};

/// Index of a symbol in the [`Symtab`](crate::Symtab) arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SymKind {
    Package,
    Class,
    TypeVar,
    /// Fields, locals and parameters.
    Var,
    /// Methods, constructors and operators.
    Method,
    /// The designated error placeholder.
    Error,
}

/// Whether an external class has been loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompletionState {
    Complete,
    Pending,
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct PackageInfo {
    pub fullname: String,
    pub members: Scope,
}

#[derive(Clone, Debug)]
pub struct ClassInfo {
    /// Dotted source name, e.g. `java.util.Map.Entry`.
    pub fullname: String,
    /// Binary name, e.g. `java.util.Map$Entry`.
    pub flatname: String,
    pub members: Scope,
    /// `None` only for the root class.
    pub supertype: Option<Type>,
    pub interfaces: Vec<Type>,
    pub type_params: Vec<SymbolId>,
    pub state: CompletionState,
    /// Counter used to name the anonymous and local classes declared
    /// directly inside this class.
    pub local_class_count: u32,
}

#[derive(Clone, Debug, Default)]
pub struct VarInfo {
    pub const_value: Option<Constant>,
    /// Source offset of the declaration, used for forward-reference checks.
    pub decl_pos: u32,
}

#[derive(Clone, Debug, Default)]
pub struct MethodInfo {
    pub params: Vec<SymbolId>,
}

#[derive(Clone, Debug)]
pub enum SymData {
    None,
    Package(PackageInfo),
    Class(ClassInfo),
    /// Upper bound of a type variable. `None` only while the declaring
    /// symbol is still flagged `UNATTRIBUTED`.
    TypeVar(Option<Type>),
    Var(VarInfo),
    Method(MethodInfo),
}

#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub kind: SymKind,
    pub flags: Flags,
    pub owner: Option<SymbolId>,
    pub ty: Type,
    pub data: SymData,
}

impl Symbol {
    pub fn is_static(&self) -> bool {
        self.flags.contains(Flags::STATIC)
    }

    pub fn is_constructor(&self) -> bool {
        self.kind == SymKind::Method && self.name == crate::names::INIT
    }

    pub fn is_interface(&self) -> bool {
        self.flags.contains(Flags::INTERFACE)
    }

    pub fn class_info(&self) -> Option<&ClassInfo> {
        match &self.data {
            SymData::Class(info) => Some(info),
            _ => None,
        }
    }

    pub fn class_info_mut(&mut self) -> Option<&mut ClassInfo> {
        match &mut self.data {
            SymData::Class(info) => Some(info),
            _ => None,
        }
    }

    pub fn method_params(&self) -> &[SymbolId] {
        match &self.data {
            SymData::Method(info) => &info.params,
            _ => &[],
        }
    }

    pub fn const_value(&self) -> Option<&Constant> {
        match &self.data {
            SymData::Var(info) => info.const_value.as_ref(),
            _ => None,
        }
    }
}
