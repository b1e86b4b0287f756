//! Public entry points of the constant evaluator.
//!
//! [`eval`] offers a single call-site expression for folding: it rejects
//! non-scalar results and syntactic non-candidates, asks the lowering
//! collaborator for a thunk unit, interprets it, and reifies the result as a
//! literal of the matching syntactic kind. Every failure short of a contract
//! violation returns the original node unchanged -- the call is either
//! reconsidered later or emitted for runtime evaluation.
//!
//! # Module organization
//!
//! - `value.rs`: the closed runtime value universe
//! - `heap.rs`: the bump-allocated evaluation arena
//! - `frame.rs`: activation records and the lexical scope chain
//! - `exec/`: the dispatch loop and the per-family op handlers

pub mod heap;
pub mod value;

mod exec;
mod frame;

use enumflags2::{bitflags, BitFlags};
use once_cell::sync::Lazy;

use crate::diag::{DiagSink, Diagnostic, FatalError};
use crate::ir::UnitDb;
use crate::library::UnitLibrary;
use crate::lower::{ExprLower, ThunkLower};
use crate::tree::Expr;
use crate::types::{Type, TypeKind};

use exec::Interp;
use value::Value;

/// Options controlling one evaluation.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalFlag {
    /// Invoked from the folder: arguments that are still scalar-returning
    /// calls would already have been folded, so their presence rejects the
    /// candidate.
    Fold,
    /// Permit descending into function calls.
    FnCall,
    /// Report bounds violations as errors.
    Bounds,
    /// Emit a warning when something prevents folding.
    Warn,
    /// Permit folding through assertions and reports, delivering their
    /// messages through the diagnostic sink.
    Report,
    /// Log each successful fold as a note.
    Verbose,
    /// Permit registering freshly loaded library units.
    Lower,
}

/// `RTLC_EVAL_VERBOSE` forces verbose folding with warnings and bounds
/// reporting for the whole process.
static FORCE_VERBOSE: Lazy<bool> = Lazy::new(|| std::env::var("RTLC_EVAL_VERBOSE").is_ok());

/// Long-lived evaluator state for one compiler session: the unit registry,
/// the collaborators, and the diagnostic sink with its error counter.
pub struct Session {
    pub units: UnitDb,
    lowering: Box<dyn ThunkLower>,
    library: Option<Box<dyn UnitLibrary>>,
    pub sink: DiagSink,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("units", &self.units.len())
            .field("errors", &self.sink.error_count())
            .finish_non_exhaustive()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            units: UnitDb::new(),
            lowering: Box::new(ExprLower),
            library: None,
            sink: DiagSink::new(),
        }
    }

    /// Replace the lowering collaborator.
    pub fn set_lowering(&mut self, lowering: Box<dyn ThunkLower>) {
        self.lowering = lowering;
    }

    /// Attach a library serving persisted units on demand.
    pub fn set_library(&mut self, library: Box<dyn UnitLibrary>) {
        self.library = Some(library);
    }

    /// Count of error diagnostics issued so far, mostly by bounds reporting.
    pub fn eval_errors(&self) -> usize {
        self.sink.error_count()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.sink.entries()
    }
}

/// Try to fold one call-site expression down to a literal.
///
/// Returns the folded literal on success and a clone of `expr` whenever the
/// fold was prevented; only a contract violation (of the source or of the IR
/// producer) escapes as an error.
pub fn eval(
    session: &mut Session,
    expr: &Expr,
    flags: BitFlags<EvalFlag>,
) -> Result<Expr, FatalError> {
    let mut flags = flags;
    if *FORCE_VERBOSE {
        flags |= EvalFlag::Verbose | EvalFlag::Warn | EvalFlag::Bounds;
    }

    // Aggregate results cannot be reified as a literal.
    if !expr.ty().is_scalar() {
        return Ok(expr.clone());
    }
    if !eval_possible(&mut session.sink, expr, flags) {
        return Ok(expr.clone());
    }

    let Some(thunk) = session.lowering.lower_thunk(expr, &session.units) else {
        return Ok(expr.clone());
    };

    let mut interp = Interp::new(
        &mut session.units,
        session.library.as_deref(),
        &mut session.sink,
        flags,
        expr.span(),
    );
    let result = interp.run_unit(std::rc::Rc::new(thunk), Vec::new())?;
    let failed = interp.failed;

    match result {
        Some(value) if !failed => match reify(expr, &value) {
            Some(folded) => {
                if flags.contains(EvalFlag::Verbose) {
                    session.sink.note_at(
                        expr.span(),
                        format!("folded {} to {}", expr.describe(), folded.describe()),
                    );
                }
                Ok(folded)
            }
            None => Ok(expr.clone()),
        },
        _ => Ok(expr.clone()),
    }
}

/// Syntactic pre-filter: can this expression be lowered to a thunk whose
/// evaluation has a chance of succeeding?
fn eval_possible(sink: &mut DiagSink, expr: &Expr, flags: BitFlags<EvalFlag>) -> bool {
    match expr {
        Expr::IntLit { .. }
        | Expr::RealLit { .. }
        | Expr::StrLit { .. }
        | Expr::EnumLit { .. }
        | Expr::PhysLit { .. } => true,

        Expr::TypeConv { arg, .. } => eval_possible(sink, arg, flags),

        Expr::ConstRef { init: Some(init), .. } => eval_possible(sink, init, flags),
        Expr::ConstRef {
            init: None,
            name,
            span,
            ..
        } => {
            if flags.contains(EvalFlag::Warn) {
                sink.warn_at(
                    *span,
                    format!("deferred constant {} prevents constant folding", name),
                );
            }
            false
        }

        Expr::FnCall {
            name,
            args,
            pure,
            span,
            ..
        } => {
            if !flags.contains(EvalFlag::FnCall) {
                return false;
            }
            if !*pure {
                if flags.contains(EvalFlag::Warn) {
                    sink.warn_at(
                        *span,
                        format!("impure function {} prevents constant folding", name),
                    );
                }
                return false;
            }
            args.iter().all(|arg| {
                // When invoked from the folder, a scalar-returning call in
                // argument position would already have been folded; its
                // survival means it is not foldable, so give up early rather
                // than rediscover that below.
                if flags.contains(EvalFlag::Fold)
                    && matches!(arg, Expr::FnCall { .. })
                    && arg.ty().is_scalar()
                {
                    return false;
                }
                eval_possible(sink, arg, flags)
            })
        }
    }
}

/// Build the literal node for a successful scalar evaluation.
fn reify(expr: &Expr, value: &Value) -> Option<Expr> {
    let span = expr.span();
    let ty = expr.ty().clone();
    match (ty.kind(), value) {
        (TypeKind::Int, Value::Integer(v)) => Some(Expr::IntLit {
            value: *v,
            ty,
            span,
        }),
        (TypeKind::Enum, Value::Integer(v)) => {
            // A position outside the declared literals means the IR and the
            // tree type disagree; leave the node alone.
            let count = match &ty {
                Type::Enum { literals, .. } => literals.len() as i64,
                _ => 0,
            };
            if *v < 0 || *v >= count {
                return None;
            }
            Some(Expr::EnumLit {
                index: *v,
                ty,
                span,
            })
        }
        (TypeKind::Physical, Value::Integer(v)) => Some(Expr::PhysLit {
            value: *v,
            ty,
            span,
        }),
        (TypeKind::Real, Value::Real(v)) => Some(Expr::RealLit {
            value: *v,
            ty,
            span,
        }),
        _ => None,
    }
}
