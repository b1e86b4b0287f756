//! The fold driver.
//!
//! Walks an expression tree bottom-up and offers every scalar-returning
//! call site to the evaluator. Children are rewritten first, so by the time
//! a call is considered its foldable arguments are already literals -- the
//! conservatism of the pre-filter under [`EvalFlag::Fold`] depends on this
//! ordering.

use enumflags2::BitFlags;

use crate::diag::FatalError;
use crate::eval::{eval, EvalFlag, Session};
use crate::tree::Expr;

/// Rewrite every folding-eligible node under `expr`.
pub fn fold(
    session: &mut Session,
    expr: &Expr,
    flags: BitFlags<EvalFlag>,
) -> Result<Expr, FatalError> {
    let rebuilt = match expr {
        Expr::FnCall {
            name,
            args,
            ty,
            pure,
            span,
        } => {
            let mut folded = Vec::with_capacity(args.len());
            for arg in args {
                folded.push(fold(session, arg, flags)?);
            }
            Expr::FnCall {
                name: name.clone(),
                args: folded,
                ty: ty.clone(),
                pure: *pure,
                span: *span,
            }
        }
        Expr::TypeConv { arg, ty, span } => Expr::TypeConv {
            arg: Box::new(fold(session, arg, flags)?),
            ty: ty.clone(),
            span: *span,
        },
        Expr::ConstRef {
            name,
            init,
            ty,
            span,
        } => Expr::ConstRef {
            name: name.clone(),
            init: match init {
                Some(init) => Some(Box::new(fold(session, init, flags)?)),
                None => None,
            },
            ty: ty.clone(),
            span: *span,
        },
        other => other.clone(),
    };

    match &rebuilt {
        Expr::FnCall { ty, .. } if ty.is_scalar() => {
            eval(session, &rebuilt, flags | EvalFlag::Fold | EvalFlag::FnCall)
        }
        _ => Ok(rebuilt),
    }
}
