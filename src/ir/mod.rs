//! Block-structured IR consumed by the evaluator.
//!
//! A [`Unit`] is a named container of basic blocks: a function body, a
//! package, a package body, or a thunk compiled for a single expression.
//! Instructions name dense virtual registers local to an activation and
//! variables addressed by `(lexical depth, index)`. The evaluator consumes
//! units through the accessors here; it never mutates them, so the registry
//! hands out shared `Rc` references.
//!
//! # Module organization
//!
//! - `mod.rs`: unit/block/op types and the unit registry
//! - `build.rs`: append-style builder used by lowering and tests

pub mod build;

use crate::span::Span;
use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;

pub type RegId = usize;
pub type BlockId = usize;

/// Comparison sub-kind carried by [`Op::Cmp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
}

/// Assertion severity levels, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssertLevel {
    Note,
    Warning,
    Error,
    Failure,
}

impl AssertLevel {
    /// Decode a severity from its runtime integer value.
    pub fn from_value(v: i64) -> Option<Self> {
        match v {
            0 => Some(AssertLevel::Note),
            1 => Some(AssertLevel::Warning),
            2 => Some(AssertLevel::Error),
            3 => Some(AssertLevel::Failure),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AssertLevel::Note => "Note",
            AssertLevel::Warning => "Warning",
            AssertLevel::Error => "Error",
            AssertLevel::Failure => "Failure",
        }
    }
}

/// Reference to a variable slot, possibly in an enclosing unit.
///
/// `depth` counts from the outermost unit (0) down the nesting chain; a
/// reference with a depth shallower than the current unit's escapes into an
/// enclosing activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarRef {
    pub depth: usize,
    pub index: usize,
}

/// One dimension operand of [`Op::Wrap`]: the bound and direction registers.
/// The direction register holds 0 for ascending, 1 for descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapDim {
    pub left: RegId,
    pub right: RegId,
    pub dir: RegId,
}

/// A single IR operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Source-level comment preserved by lowering; ignored at evaluation.
    Comment(String),

    // Immediates
    Const { dest: RegId, value: i64 },
    ConstReal { dest: RegId, value: f64 },

    // Arithmetic / logical
    Add { dest: RegId, lhs: RegId, rhs: RegId },
    Sub { dest: RegId, lhs: RegId, rhs: RegId },
    Mul { dest: RegId, lhs: RegId, rhs: RegId },
    Div { dest: RegId, lhs: RegId, rhs: RegId, span: Span },
    Mod { dest: RegId, lhs: RegId, rhs: RegId, span: Span },
    Rem { dest: RegId, lhs: RegId, rhs: RegId, span: Span },
    Neg { dest: RegId, src: RegId },
    Abs { dest: RegId, src: RegId },
    Exp { dest: RegId, lhs: RegId, rhs: RegId },
    Cmp { dest: RegId, op: CmpOp, lhs: RegId, rhs: RegId },
    And { dest: RegId, lhs: RegId, rhs: RegId },
    Or { dest: RegId, lhs: RegId, rhs: RegId },
    Not { dest: RegId, src: RegId },
    Cast { dest: RegId, src: RegId, ty: Type, span: Span },
    Select { dest: RegId, test: RegId, if_true: RegId, if_false: RegId },

    // Memory
    ConstArray { dest: RegId, values: Vec<RegId> },
    Wrap { dest: RegId, src: RegId, dims: Vec<WrapDim>, span: Span },
    Unwrap { dest: RegId, src: RegId },
    UarrayLen { dest: RegId, src: RegId, dim: usize },
    UarrayLeft { dest: RegId, src: RegId, dim: usize },
    UarrayRight { dest: RegId, src: RegId, dim: usize },
    UarrayDir { dest: RegId, src: RegId, dim: usize },
    Load { dest: RegId, var: VarRef },
    Store { var: VarRef, src: RegId },
    LoadIndirect { dest: RegId, addr: RegId },
    StoreIndirect { addr: RegId, src: RegId },
    Index { dest: RegId, var: VarRef },
    Copy { dst: RegId, src: RegId, count: RegId },
    Alloca { dest: RegId, count: RegId },
    Memcmp { dest: RegId, lhs: RegId, rhs: RegId, count: RegId },

    // Control flow
    Jump { target: BlockId },
    Cond { test: RegId, if_true: BlockId, if_false: BlockId },
    Case { value: RegId, branches: Vec<(i64, BlockId)>, default: BlockId },
    /// End the current frame. Functions and thunks name a result register;
    /// package initialisation returns bare.
    Return { src: Option<RegId> },

    // Checks
    Bounds { src: RegId, low: i64, high: i64, span: Span },
    DynBounds { src: RegId, low: RegId, high: RegId, span: Span },
    IndexCheck { low: RegId, high: RegId, min: i64, max: i64, span: Span },
    Assert { test: RegId, level: RegId, msg: Option<RegId>, span: Span },
    Report { level: RegId, msg: RegId, span: Span },
    Undefined { span: Span },

    // Calls
    Fcall { dest: RegId, name: String, args: Vec<RegId>, span: Span },
    /// Closure-bearing call through a nested function value. Not supported
    /// by the evaluator; its presence always prevents folding.
    NestedFcall { dest: RegId, name: String, args: Vec<RegId>, span: Span },

    /// Convert a scalar to its textual image under `ty`'s formatting rules.
    Image { dest: RegId, src: RegId, ty: Type, span: Span },

    // Heap bookkeeping markers emitted by lowering; no-ops here because the
    // evaluation arena is never rolled back mid-evaluation.
    HeapSave { dest: RegId },
    HeapRestore { src: RegId },
}

/// Kind of IR container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    Function { impure: bool },
    Package,
    PackageBody,
    Thunk,
}

/// A variable declaration in a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    pub ty: Type,
    /// Declared elsewhere; its value is not available at compile time.
    pub extern_def: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub ops: Vec<Op>,
}

/// A named IR container. Block 0 is the entry block; for packages it holds
/// the variable initialisation code run when an enclosing activation is
/// materialised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    pub kind: UnitKind,
    /// Name of the lexically enclosing unit, if any.
    pub parent: Option<String>,
    /// Lexical depth: 0 for root units, parent depth + 1 otherwise.
    pub depth: usize,
    /// Number of virtual registers an activation needs. Arguments are bound
    /// positionally into the first registers.
    pub regs: usize,
    pub vars: Vec<VarDecl>,
    pub blocks: Vec<Block>,
    /// Result type for functions and thunks.
    pub result: Option<Type>,
}

impl Unit {
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn var(&self, index: usize) -> Option<&VarDecl> {
        self.vars.get(index)
    }

    /// A function with no impurity flag; packages, bodies and thunks are
    /// trivially pure.
    pub fn is_pure(&self) -> bool {
        !matches!(self.kind, UnitKind::Function { impure: true })
    }
}

/// Registry of lowered units, keyed by fully-qualified name.
///
/// Loads are idempotent: re-inserting a name replaces the entry, and lookups
/// hand out shared references so nested evaluations of the same callee do
/// not copy its blocks.
#[derive(Debug, Default)]
pub struct UnitDb {
    units: HashMap<String, Rc<Unit>>,
}

impl UnitDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, unit: Unit) -> Rc<Unit> {
        let rc = Rc::new(unit);
        self.units.insert(rc.name.clone(), Rc::clone(&rc));
        rc
    }

    pub fn get(&self, name: &str) -> Option<Rc<Unit>> {
        self.units.get(name).map(Rc::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
