//! The scoped environment threaded through attribution.
//!
//! An [`Env`] is a persistent, reference-counted frame. `next` links to the
//! syntactically enclosing frame and `outer` skips straight to the frame
//! that encloses the current class. Entering a nested construct builds a
//! new frame layered on the old one; leaving it just drops the new frame,
//! so sibling traversals never observe each other's entries. The only
//! mutable part of a frame is its own scope, where the declarations of the
//! construct it represents are entered.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use cinder_ast::NodeId;
use cinder_common::LintCategory;
use cinder_symtab::{Scope, SymbolId, Type};

/// What a frame represents.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    TopLevel,
    Class(SymbolId),
    Method(SymbolId),
    /// A field initializer, owned by the field.
    VarInit(SymbolId),
    /// An instance or static initializer block, owned by a synthetic
    /// block symbol.
    Init(SymbolId),
    Block,
    Loop(NodeId),
    Switch(NodeId),
    Labeled { label: String, id: NodeId, body: Option<NodeId> },
    /// The arguments of a `this(...)` or `super(...)` call.
    SelfCall,
}

/// Per-compilation-unit information shared by every frame of the unit.
#[derive(Debug)]
pub struct Toplevel {
    pub package: SymbolId,
    /// Single-type imports, by simple name.
    pub named_imports: Scope,
    /// Packages and classes imported on demand, `java.lang` first.
    pub star_imports: Vec<SymbolId>,
    /// Classes whose static members are imported on demand.
    pub static_star_imports: Vec<SymbolId>,
    /// Single static imports: (class, member name).
    pub static_named_imports: Vec<(SymbolId, String)>,
}

/// The mutable-by-copy context carried by each frame.
#[derive(Clone, Debug, Default)]
pub struct AttrInfo {
    /// This frame opens a static context.
    pub is_static: bool,
    /// Inside the arguments of an explicit constructor call.
    pub is_self_call: bool,
    /// The current selection is qualified by `super`.
    pub select_super: bool,
    /// Lint categories suppressed here.
    pub suppressed: Rc<Vec<LintCategory>>,
    /// Declared return type of the enclosing method; `None` where `return`
    /// is illegal.
    pub return_type: Option<Type>,
    /// Type variables of generic methods being attributed.
    pub tvars: Vec<SymbolId>,
}

struct EnvNode {
    frame: Frame,
    next: Option<Env>,
    outer: Option<Env>,
    toplevel: Rc<Toplevel>,
    class: Option<SymbolId>,
    method: Option<SymbolId>,
    info: AttrInfo,
    scope: RefCell<Scope>,
}

#[derive(Clone)]
pub struct Env(Rc<EnvNode>);

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("frame", &self.0.frame)
            .field("class", &self.0.class)
            .field("method", &self.0.method)
            .finish()
    }
}

impl Env {
    /// The root frame of a compilation unit.
    pub fn toplevel(toplevel: Rc<Toplevel>) -> Env {
        Env(Rc::new(EnvNode {
            frame: Frame::TopLevel,
            next: None,
            outer: None,
            toplevel,
            class: None,
            method: None,
            info: AttrInfo::default(),
            scope: RefCell::new(Scope::new()),
        }))
    }

    fn layer(&self, frame: Frame, outer: Option<Env>, class: Option<SymbolId>, method: Option<SymbolId>, info: AttrInfo) -> Env {
        Env(Rc::new(EnvNode {
            frame,
            next: Some(self.clone()),
            outer,
            toplevel: self.0.toplevel.clone(),
            class,
            method,
            info,
            scope: RefCell::new(Scope::new()),
        }))
    }

    fn suppressed_with(&self, extra: &[LintCategory]) -> Rc<Vec<LintCategory>> {
        if extra.iter().all(|l| self.is_suppressed(*l)) {
            return self.0.info.suppressed.clone();
        }
        let mut all = (*self.0.info.suppressed).clone();
        all.extend(extra.iter().copied().filter(|l| !self.is_suppressed(*l)));
        Rc::new(all)
    }

    /// A frame for the body of `class`, declared in this frame. `suppress`
    /// adds lint categories silenced on the class declaration.
    pub fn class_env(&self, class: SymbolId, suppress: &[LintCategory]) -> Env {
        let info = AttrInfo { suppressed: self.suppressed_with(suppress), ..AttrInfo::default() };
        self.layer(Frame::Class(class), Some(self.clone()), Some(class), None, info)
    }

    /// A frame for the body of `method`.
    pub fn method_env(&self, method: SymbolId, is_static: bool, return_type: Type, suppress: &[LintCategory]) -> Env {
        let info = AttrInfo {
            is_static,
            return_type: Some(return_type),
            suppressed: self.suppressed_with(suppress),
            ..AttrInfo::default()
        };
        self.layer(Frame::Method(method), self.0.outer.clone(), self.0.class, Some(method), info)
    }

    /// A frame for a field initializer or initializer block.
    pub fn init_env(&self, frame: Frame, is_static: bool) -> Env {
        let info = AttrInfo { is_static, suppressed: self.0.info.suppressed.clone(), ..AttrInfo::default() };
        let method = match frame {
            Frame::VarInit(owner) | Frame::Init(owner) => Some(owner),
            _ => None,
        };
        self.layer(frame, self.0.outer.clone(), self.0.class, method, info)
    }

    /// A nested frame with a fresh scope and the same context.
    pub fn dup(&self, frame: Frame) -> Env {
        self.dup_with(frame, |_| {})
    }

    /// A nested frame whose context is adjusted by `f`.
    pub fn dup_with(&self, frame: Frame, f: impl FnOnce(&mut AttrInfo)) -> Env {
        let mut info = self.0.info.clone();
        info.is_static = false;
        info.select_super = false;
        f(&mut info);
        self.layer(frame, self.0.outer.clone(), self.0.class, self.0.method, info)
    }

    // ── Accessors ──────────────────────────────────────────────────────

    pub fn frame(&self) -> &Frame {
        &self.0.frame
    }

    pub fn next(&self) -> Option<&Env> {
        self.0.next.as_ref()
    }

    pub fn outer(&self) -> Option<&Env> {
        self.0.outer.as_ref()
    }

    pub fn toplevel_info(&self) -> &Toplevel {
        &self.0.toplevel
    }

    pub fn toplevel_rc(&self) -> Rc<Toplevel> {
        self.0.toplevel.clone()
    }

    /// The class whose body this frame is in.
    pub fn enclosing_class(&self) -> Option<SymbolId> {
        self.0.class
    }

    /// The method, field being initialized, or initializer block this frame
    /// is in.
    pub fn enclosing_method(&self) -> Option<SymbolId> {
        self.0.method
    }

    pub fn info(&self) -> &AttrInfo {
        &self.0.info
    }

    pub fn scope(&self) -> Ref<'_, Scope> {
        self.0.scope.borrow()
    }

    /// Enter a declaration into this frame's scope.
    pub fn enter(&self, name: &str, sym: SymbolId) {
        self.0.scope.borrow_mut().enter(name, sym);
    }

    pub fn is_class_frame(&self) -> bool {
        matches!(self.0.frame, Frame::Class(_))
    }

    pub fn is_toplevel(&self) -> bool {
        matches!(self.0.frame, Frame::TopLevel)
    }

    pub fn is_suppressed(&self, lint: LintCategory) -> bool {
        self.0.info.suppressed.contains(&lint)
    }

    /// The class frame of the current class.
    pub fn class_frame(&self) -> Option<Env> {
        let mut cur = Some(self.clone());
        while let Some(e) = cur {
            if e.is_class_frame() {
                return Some(e);
            }
            cur = e.next().cloned();
        }
        None
    }

    /// Whether this frame is in a static context relative to its class: a
    /// static member or static initializer sits between it and the class
    /// frame.
    pub fn is_static(&self) -> bool {
        self.any_local(|info| info.is_static)
    }

    /// Whether this frame is inside the arguments of an explicit
    /// constructor call of its class.
    pub fn is_self_call(&self) -> bool {
        self.any_local(|info| info.is_self_call)
    }

    fn any_local(&self, f: impl Fn(&AttrInfo) -> bool) -> bool {
        let mut cur = Some(self);
        while let Some(e) = cur {
            if e.is_class_frame() {
                return false;
            }
            if f(&e.0.info) {
                return true;
            }
            cur = e.next();
        }
        false
    }

    /// Frames from this one outward, stopping at (and including) the
    /// nearest class frame.
    pub fn local_frames(&self) -> LocalFrames {
        LocalFrames { cur: Some(self.clone()) }
    }

    /// Frames from this one all the way to the top level.
    pub fn ancestors(&self) -> Ancestors {
        Ancestors { cur: Some(self.clone()) }
    }
}

pub struct LocalFrames {
    cur: Option<Env>,
}

impl Iterator for LocalFrames {
    type Item = Env;

    fn next(&mut self) -> Option<Env> {
        let e = self.cur.take()?;
        if !e.is_class_frame() && !e.is_toplevel() {
            self.cur = e.next().cloned();
        }
        Some(e)
    }
}

pub struct Ancestors {
    cur: Option<Env>,
}

impl Iterator for Ancestors {
    type Item = Env;

    fn next(&mut self) -> Option<Env> {
        let e = self.cur.take()?;
        self.cur = e.next().cloned();
        Some(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toplevel() -> Env {
        Env::toplevel(Rc::new(Toplevel {
            package: SymbolId(0),
            named_imports: Scope::new(),
            star_imports: Vec::new(),
            static_star_imports: Vec::new(),
            static_named_imports: Vec::new(),
        }))
    }

    #[test]
    fn sibling_frames_do_not_share_entries() {
        let class = toplevel().class_env(SymbolId(10), &[]);
        let method = class.method_env(SymbolId(11), false, Type::Void, &[]);
        let a = method.dup(Frame::Block);
        let b = method.dup(Frame::Block);
        a.enter("x", SymbolId(12));
        assert_eq!(a.scope().first("x"), Some(SymbolId(12)));
        assert_eq!(b.scope().first("x"), None);
        assert_eq!(method.scope().first("x"), None);
    }

    #[test]
    fn outer_skips_to_the_enclosing_class_context() {
        let top = toplevel();
        let outer_class = top.class_env(SymbolId(1), &[]);
        let m = outer_class.method_env(SymbolId(2), false, Type::Void, &[]);
        let block = m.dup(Frame::Block);
        let local = block.class_env(SymbolId(3), &[]);
        let inner_m = local.method_env(SymbolId(4), false, Type::Void, &[]);
        assert_eq!(inner_m.enclosing_class(), Some(SymbolId(3)));
        assert!(matches!(inner_m.outer().map(|e| e.frame().clone()), Some(Frame::Block)));
        assert!(matches!(block.outer().map(|e| e.frame().clone()), Some(Frame::TopLevel)));
    }

    #[test]
    fn static_context_stops_at_the_class_frame() {
        let class = toplevel().class_env(SymbolId(1), &[]);
        let m = class.method_env(SymbolId(2), true, Type::Void, &[]);
        let block = m.dup(Frame::Block);
        assert!(block.is_static());
        let local = block.class_env(SymbolId(3), &[]);
        let inner = local.method_env(SymbolId(4), false, Type::Void, &[]);
        assert!(!inner.is_static());
        let args = inner.dup_with(Frame::SelfCall, |i| i.is_self_call = true);
        assert!(!args.is_static());
        assert!(args.is_self_call());
        assert!(!inner.is_self_call());
    }

    #[test]
    fn suppression_accumulates_inward() {
        let class = toplevel().class_env(SymbolId(1), &[LintCategory::Cast]);
        let m = class.method_env(SymbolId(2), false, Type::Void, &[LintCategory::Unchecked]);
        assert!(m.is_suppressed(LintCategory::Cast));
        assert!(m.is_suppressed(LintCategory::Unchecked));
        assert!(!class.is_suppressed(LintCategory::Unchecked));
        assert!(!m.is_suppressed(LintCategory::Try));
    }
}
