//! Activation records and the lexical scope chain.
//!
//! A [`Context`] is one unit's activation: dense register slots for SSA
//! transients and dense variable slots pre-initialised from the declared
//! types. Contexts for one evaluation frame live in a [`ScopeStack`] indexed
//! by lexical depth; entries above the callee's own depth are materialised
//! lazily, the first time a variable reference escapes into an enclosing
//! unit, by running that unit's initialisation block.

use crate::ir::{RegId, Unit};
use std::rc::Rc;

use super::heap::Heap;
use super::value::Value;

#[derive(Debug)]
pub(crate) struct Context {
    pub unit: Rc<Unit>,
    pub regs: Vec<Option<Value>>,
    pub vars: Vec<Value>,
}

impl Context {
    /// Build an activation for `unit`, sizing the slot vectors from the
    /// unit's counts. Constrained-array variables get an arena run of the
    /// declared size; returns `None` when the arena cannot hold it.
    pub fn new(unit: Rc<Unit>, heap: &mut Heap) -> Option<Context> {
        let regs = vec![None; unit.regs];
        let mut vars = Vec::with_capacity(unit.vars.len());
        for decl in &unit.vars {
            let value = match Value::default_of(&decl.ty) {
                Some(v) => v,
                None => {
                    // Constrained array: storage lives in the arena.
                    let len = decl.ty.element_count().unwrap_or(0);
                    let data = heap.alloc(len)?;
                    Value::Carray { data, len }
                }
            };
            vars.push(value);
        }
        Some(Context { unit, regs, vars })
    }

    pub fn reg(&self, r: RegId) -> Option<&Value> {
        self.regs.get(r).and_then(|slot| slot.as_ref())
    }

    pub fn set_reg(&mut self, r: RegId, value: Value) {
        if let Some(slot) = self.regs.get_mut(r) {
            *slot = Some(value);
        }
    }
}

/// Depth-indexed chain of contexts for one evaluation frame.
///
/// `scopes[d]` holds the activation of the unit at lexical depth `d`; the
/// slot is `None` until an escape forces it into existence. `active` names
/// the context ops currently execute against -- normally the innermost one,
/// temporarily an ancestor while its initialisation block runs.
#[derive(Debug)]
pub(crate) struct ScopeStack {
    scopes: Vec<Option<Context>>,
    active: usize,
}

impl ScopeStack {
    pub fn new(ctx: Context) -> Self {
        let depth = ctx.unit.depth;
        let mut scopes: Vec<Option<Context>> = Vec::with_capacity(depth + 1);
        scopes.resize_with(depth, || None);
        scopes.push(Some(ctx));
        Self {
            scopes,
            active: depth,
        }
    }

    pub fn active_depth(&self) -> usize {
        self.active
    }

    /// Re-target execution at `depth`; returns the previous target so the
    /// caller can restore it.
    pub fn set_active(&mut self, depth: usize) -> usize {
        debug_assert!(self.scopes[depth].is_some());
        std::mem::replace(&mut self.active, depth)
    }

    pub fn active(&self) -> &Context {
        self.scopes[self.active]
            .as_ref()
            .expect("active scope always materialised")
    }

    pub fn active_mut(&mut self) -> &mut Context {
        self.scopes[self.active]
            .as_mut()
            .expect("active scope always materialised")
    }

    pub fn at(&self, depth: usize) -> Option<&Context> {
        self.scopes.get(depth).and_then(|slot| slot.as_ref())
    }

    pub fn at_mut(&mut self, depth: usize) -> Option<&mut Context> {
        self.scopes.get_mut(depth).and_then(|slot| slot.as_mut())
    }

    pub fn install(&mut self, depth: usize, ctx: Context) {
        debug_assert!(depth < self.scopes.len() && self.scopes[depth].is_none());
        self.scopes[depth] = Some(ctx);
    }
}
