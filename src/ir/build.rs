//! Append-style builder for IR units.
//!
//! Used by thunk lowering and by tests that hand-construct function bodies.
//! Blocks are created empty and selected for appending; registers are dense
//! and allocated in order, so function arguments are simply the first
//! `n` registers allocated.

use super::{Block, BlockId, Op, RegId, Type, Unit, UnitKind, VarDecl};

#[derive(Debug)]
pub struct UnitBuilder {
    unit: Unit,
    current: BlockId,
}

impl UnitBuilder {
    fn new(name: &str, kind: UnitKind) -> Self {
        Self {
            unit: Unit {
                name: name.to_string(),
                kind,
                parent: None,
                depth: 0,
                regs: 0,
                vars: Vec::new(),
                blocks: vec![Block::default()],
                result: None,
            },
            current: 0,
        }
    }

    pub fn function(name: &str, impure: bool) -> Self {
        Self::new(name, UnitKind::Function { impure })
    }

    pub fn package(name: &str) -> Self {
        Self::new(name, UnitKind::Package)
    }

    pub fn package_body(name: &str) -> Self {
        Self::new(name, UnitKind::PackageBody)
    }

    pub fn thunk(name: &str) -> Self {
        Self::new(name, UnitKind::Thunk)
    }

    /// Nest this unit inside `parent`, fixing its lexical depth.
    pub fn nested_in(mut self, parent: &Unit) -> Self {
        self.unit.parent = Some(parent.name.clone());
        self.unit.depth = parent.depth + 1;
        self
    }

    pub fn result(mut self, ty: Type) -> Self {
        self.unit.result = Some(ty);
        self
    }

    /// Allocate a fresh virtual register.
    pub fn reg(&mut self) -> RegId {
        let r = self.unit.regs;
        self.unit.regs += 1;
        r
    }

    /// Declare a variable; returns its index within this unit.
    pub fn var(&mut self, name: &str, ty: Type) -> usize {
        self.declare(name, ty, false)
    }

    /// Declare an extern variable: one whose value lives outside the
    /// compile-time world and therefore prevents folding when touched.
    pub fn extern_var(&mut self, name: &str, ty: Type) -> usize {
        self.declare(name, ty, true)
    }

    fn declare(&mut self, name: &str, ty: Type, extern_def: bool) -> usize {
        let index = self.unit.vars.len();
        self.unit.vars.push(VarDecl {
            name: name.to_string(),
            ty,
            extern_def,
        });
        index
    }

    /// Append a new empty block and return its id.
    pub fn block(&mut self) -> BlockId {
        self.unit.blocks.push(Block::default());
        self.unit.blocks.len() - 1
    }

    /// Select the block subsequent `push` calls append to.
    pub fn select(&mut self, block: BlockId) {
        debug_assert!(block < self.unit.blocks.len());
        self.current = block;
    }

    pub fn push(&mut self, op: Op) {
        self.unit.blocks[self.current].ops.push(op);
    }

    /// Allocate a register holding an integer immediate.
    pub fn const_int(&mut self, value: i64) -> RegId {
        let dest = self.reg();
        self.push(Op::Const { dest, value });
        dest
    }

    /// Allocate a register holding a real immediate.
    pub fn const_real(&mut self, value: f64) -> RegId {
        let dest = self.reg();
        self.push(Op::ConstReal { dest, value });
        dest
    }

    pub fn finish(self) -> Unit {
        self.unit
    }
}
