//! The evaluation loop.
//!
//! One [`Interp`] exists per root evaluation; nested function calls re-enter
//! [`Interp::run_unit`] on the same interpreter, sharing the heap, the flag
//! set, and the block quota. Within a frame, dispatch is iterative: a
//! current-block variable is re-assigned by the control-flow handlers, so
//! pathological IR cannot grow the Rust call stack (only real calls
//! recurse).
//!
//! Dispatch tries the handler families in turn; each family claims the
//! opcodes it implements and leaves the rest for the next. The per-iteration
//! guard in `exec_block` stops the frame as soon as a handler sets the
//! `failed` flag.

mod arith;
mod call;
mod checks;
mod flow;
mod image;
mod memory;

use std::rc::Rc;

use enumflags2::BitFlags;

use crate::diag::{DiagSink, FatalError};
use crate::ir::{Op, RegId, Unit, UnitDb, VarRef};
use crate::library::UnitLibrary;
use crate::span::Span;

use super::frame::{Context, ScopeStack};
use super::heap::Heap;
use super::value::{Slot, Value, ValueTag};
use super::EvalFlag;

use flow::FlowResult;

/// Block selections allowed per root evaluation. Runaway IR loops hit this
/// quota long before they make observable progress.
pub const BLOCK_QUOTA: usize = 1 << 16;

/// How a block finished executing.
enum BlockExit {
    Branch(usize),
    Return(Option<RegId>),
    Failed,
}

/// Result of dispatching a single operation.
enum Dispatch {
    Continue,
    Branch(usize),
    Return(Option<RegId>),
}

pub(crate) struct Interp<'a> {
    pub units: &'a mut UnitDb,
    pub library: Option<&'a dyn UnitLibrary>,
    pub sink: &'a mut DiagSink,
    pub heap: Heap,
    pub flags: BitFlags<EvalFlag>,
    /// The call site being folded; diagnostics for ops without their own
    /// bookmark land here.
    pub callsite: Span,
    pub failed: bool,
    blocks_entered: usize,
}

impl std::fmt::Debug for Interp<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interp")
            .field("flags", &self.flags)
            .field("failed", &self.failed)
            .field("blocks_entered", &self.blocks_entered)
            .finish_non_exhaustive()
    }
}

impl<'a> Interp<'a> {
    pub fn new(
        units: &'a mut UnitDb,
        library: Option<&'a dyn UnitLibrary>,
        sink: &'a mut DiagSink,
        flags: BitFlags<EvalFlag>,
        callsite: Span,
    ) -> Self {
        Self {
            units,
            library,
            sink,
            heap: Heap::new(),
            flags,
            callsite,
            failed: false,
            blocks_entered: 0,
        }
    }

    /// Evaluate `unit` with `args` bound positionally into its first
    /// registers. Returns the result value, or `None` when the fold failed.
    pub fn run_unit(
        &mut self,
        unit: Rc<Unit>,
        args: Vec<Value>,
    ) -> Result<Option<Value>, FatalError> {
        let Some(mut ctx) = Context::new(Rc::clone(&unit), &mut self.heap) else {
            self.fail(
                self.callsite,
                "evaluation heap exhausted, cannot constant fold",
            );
            return Ok(None);
        };
        for (i, arg) in args.into_iter().enumerate() {
            ctx.set_reg(i, arg);
        }
        let mut scopes = ScopeStack::new(ctx);

        let mut block = 0;
        loop {
            match self.exec_block(&mut scopes, block)? {
                BlockExit::Branch(next) => block = next,
                BlockExit::Failed => return Ok(None),
                BlockExit::Return(None) => {
                    return Err(self.fatal(
                        self.callsite,
                        format!("unit {} returned without a result", unit.name),
                    ));
                }
                BlockExit::Return(Some(r)) => return self.reg(&scopes, r).map(Some),
            }
        }
    }

    /// Run a unit's initialisation code (from block 0) against an already
    /// installed ancestor context. A bare return ends it; any result value
    /// is ignored. Returns false when the fold failed.
    fn run_init(&mut self, scopes: &mut ScopeStack) -> Result<bool, FatalError> {
        let mut block = 0;
        loop {
            match self.exec_block(scopes, block)? {
                BlockExit::Branch(next) => block = next,
                BlockExit::Failed => return Ok(false),
                BlockExit::Return(_) => return Ok(true),
            }
        }
    }

    fn exec_block(
        &mut self,
        scopes: &mut ScopeStack,
        block: usize,
    ) -> Result<BlockExit, FatalError> {
        self.blocks_entered += 1;
        if self.blocks_entered > BLOCK_QUOTA {
            self.fail(
                self.callsite,
                "iteration limit reached, cannot constant fold",
            );
            return Ok(BlockExit::Failed);
        }

        let unit = Rc::clone(&scopes.active().unit);
        let Some(ops) = unit.block(block).map(|b| b.ops.len()) else {
            return Err(self.fatal(
                self.callsite,
                format!("unit {} has no block {}", unit.name, block),
            ));
        };

        for i in 0..ops {
            // The unit is shared and immutable; clone the op so handlers can
            // borrow the scope stack freely.
            let op = unit.blocks[block].ops[i].clone();
            let dispatch = self.exec_op(scopes, &op)?;
            if self.failed {
                return Ok(BlockExit::Failed);
            }
            match dispatch {
                Dispatch::Continue => {}
                Dispatch::Branch(next) => return Ok(BlockExit::Branch(next)),
                Dispatch::Return(r) => return Ok(BlockExit::Return(r)),
            }
        }

        Err(self.fatal(
            self.callsite,
            format!(
                "block {} of unit {} ends without a branch or return",
                block, unit.name
            ),
        ))
    }

    fn exec_op(&mut self, scopes: &mut ScopeStack, op: &Op) -> Result<Dispatch, FatalError> {
        if self.exec_arith(scopes, op)? {
            return Ok(Dispatch::Continue);
        }
        if self.exec_memory(scopes, op)? {
            return Ok(Dispatch::Continue);
        }
        if self.exec_checks(scopes, op)? {
            return Ok(Dispatch::Continue);
        }
        if self.exec_call(scopes, op)? {
            return Ok(Dispatch::Continue);
        }
        if self.exec_image(scopes, op)? {
            return Ok(Dispatch::Continue);
        }
        match self.exec_flow(scopes, op)? {
            FlowResult::Branch(next) => return Ok(Dispatch::Branch(next)),
            FlowResult::Return(r) => return Ok(Dispatch::Return(r)),
            FlowResult::NotHandled => {}
        }
        match op {
            Op::Comment(_) | Op::HeapSave { .. } | Op::HeapRestore { .. } => {
                Ok(Dispatch::Continue)
            }
            Op::NestedFcall { name, span, .. } => {
                self.fail(
                    *span,
                    format!("call to nested function {} prevents constant folding", name),
                );
                Ok(Dispatch::Continue)
            }
            // All implemented opcodes are claimed above; anything that falls
            // through is IR the producer should never have emitted.
            other => Err(self.fatal(
                self.callsite,
                format!("cannot evaluate opcode {:?}", other),
            )),
        }
    }

    // ── Variable resolution ─────────────────────────────────────────────

    /// Resolve a variable reference for access, materialising enclosing
    /// activations as needed. `Ok(false)` means the fold has failed.
    pub(super) fn resolve_var(
        &mut self,
        scopes: &mut ScopeStack,
        var: VarRef,
        span: Span,
    ) -> Result<bool, FatalError> {
        if var.depth > scopes.active_depth() {
            return Err(self.fatal(
                span,
                format!(
                    "variable reference at depth {} beyond active unit {}",
                    var.depth,
                    scopes.active().unit.name
                ),
            ));
        }
        if scopes.at(var.depth).is_none() && !self.materialise(scopes, var.depth, span)? {
            return Ok(false);
        }
        let ctx = scopes.at(var.depth).expect("just materialised");
        let unit_name = ctx.unit.name.clone();
        let Some(decl) = ctx.unit.var(var.index) else {
            return Err(self.fatal(
                span,
                format!("unit {} has no variable {}", unit_name, var.index),
            ));
        };
        if decl.extern_def {
            let name = decl.name.clone();
            self.fail(
                span,
                format!("global variable {} prevents constant folding", name),
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Build every missing ancestor context between the active depth and
    /// `depth`, outermost first, running each unit's initialisation block.
    fn materialise(
        &mut self,
        scopes: &mut ScopeStack,
        depth: usize,
        span: Span,
    ) -> Result<bool, FatalError> {
        let mut chain: Vec<Rc<Unit>> = Vec::new();
        let mut unit = Rc::clone(&scopes.active().unit);
        while unit.depth > depth {
            let Some(parent_name) = unit.parent.clone() else {
                return Err(self.fatal(
                    span,
                    format!("unit {} has no enclosing unit", unit.name),
                ));
            };
            let Some(parent) = self.units.get(&parent_name) else {
                self.fail(
                    span,
                    format!(
                        "enclosing unit {} not available, cannot constant fold",
                        parent_name
                    ),
                );
                return Ok(false);
            };
            if parent.depth + 1 != unit.depth {
                return Err(self.fatal(
                    span,
                    format!("unit {} nests at inconsistent depth", parent.name),
                ));
            }
            chain.push(Rc::clone(&parent));
            unit = parent;
        }

        for ancestor in chain.into_iter().rev() {
            let d = ancestor.depth;
            if scopes.at(d).is_some() {
                continue;
            }
            let Some(ctx) = Context::new(ancestor, &mut self.heap) else {
                self.fail(span, "evaluation heap exhausted, cannot constant fold");
                return Ok(false);
            };
            scopes.install(d, ctx);
            let prev = scopes.set_active(d);
            let ok = self.run_init(scopes)?;
            scopes.set_active(prev);
            if !ok || self.failed {
                self.failed = true;
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ── Register and heap access ────────────────────────────────────────

    /// Read a register of the active context. Reading a register before any
    /// op has written it is an IR ordering violation.
    pub(super) fn reg(&mut self, scopes: &ScopeStack, r: RegId) -> Result<Value, FatalError> {
        match scopes.active().reg(r) {
            Some(v) => Ok(v.clone()),
            None => Err(self.fatal(
                self.callsite,
                format!(
                    "read of undefined register {} in unit {}",
                    r,
                    scopes.active().unit.name
                ),
            )),
        }
    }

    pub(super) fn set_reg(&mut self, scopes: &mut ScopeStack, r: RegId, value: Value) {
        scopes.active_mut().set_reg(r, value);
    }

    /// Read a register that must hold an integer.
    pub(super) fn integer(&mut self, scopes: &ScopeStack, r: RegId) -> Result<i64, FatalError> {
        let v = self.reg(scopes, r)?;
        match v.as_integer() {
            Some(i) => Ok(i),
            None => Err(self.tag_error(ValueTag::Integer, &v)),
        }
    }

    /// Read a register that must hold a pointer.
    pub(super) fn pointer(&mut self, scopes: &ScopeStack, r: RegId) -> Result<Slot, FatalError> {
        let v = self.reg(scopes, r)?;
        match v.as_pointer() {
            Some(p) => Ok(p),
            None => Err(self.tag_error(ValueTag::Pointer, &v)),
        }
    }

    pub(super) fn heap_read(&mut self, slot: Slot) -> Result<Value, FatalError> {
        match self.heap.read(slot) {
            Some(v) => Ok(v),
            None => Err(self.fatal(self.callsite, "pointer outside the evaluation heap")),
        }
    }

    pub(super) fn heap_write(&mut self, slot: Slot, value: Value) -> Result<(), FatalError> {
        if self.heap.write(slot, value) {
            Ok(())
        } else {
            Err(self.fatal(self.callsite, "pointer outside the evaluation heap"))
        }
    }

    // ── Failure plumbing ────────────────────────────────────────────────

    /// Give up on this fold. Not an error in the source: a warning is
    /// emitted only when the caller asked for one.
    pub(super) fn fail(&mut self, span: Span, message: impl Into<String>) {
        if self.flags.contains(EvalFlag::Warn) && !self.failed {
            self.sink.warn_at(span, message);
        }
        self.failed = true;
    }

    /// Record a contract violation and hand back the error that unwinds the
    /// whole evaluation.
    pub(super) fn fatal(&mut self, span: Span, message: impl Into<String>) -> FatalError {
        let message = message.into();
        self.sink.fatal_at(span, message.clone());
        self.failed = true;
        FatalError::new(span, message)
    }

    pub(super) fn tag_error(&mut self, want: ValueTag, got: &Value) -> FatalError {
        self.fatal(
            self.callsite,
            format!("expected {} value, got {}", want.name(), got.tag().name()),
        )
    }
}
