//! Compile-time expression evaluator for the RTLC HDL front-end.
//!
//! Folds side-effect-free function calls and constant-bearing expressions
//! down to literal scalar values by interpreting the front-end's
//! block-structured IR: a per-call sub-virtual-machine that runs straight
//! line code inside basic blocks, branches between them, descends into
//! callee units, walks enclosing scopes to reach outer variables, and
//! enforces bounds and assertion checks as it goes.
//!
//! The two driver entry points are [`eval`], which offers a single call-site
//! expression and returns either a literal of equal value or the original
//! node, and [`fold`], which rewrites every eligible node under a tree.

// Diagnostics are collected, never printed; keep it that way.
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]

pub mod diag;
pub mod eval;
pub mod fold;
pub mod ir;
pub mod library;
pub mod lower;
pub mod span;
pub mod tree;
pub mod types;

pub use diag::{DiagSink, Diagnostic, FatalError, Severity};
pub use eval::{eval, EvalFlag, Session};
pub use fold::fold;
pub use library::{FileLibrary, LibraryError, UnitLibrary};
pub use lower::{ExprLower, ThunkLower};
pub use span::Span;
pub use tree::Expr;
pub use types::{RangeDir, Type, TypeKind};
