//! Thunk lowering.
//!
//! The real lowering pass lives in the front-end; the evaluator only sees it
//! through [`ThunkLower`]. The default implementation here covers exactly
//! the syntactic forms the pre-filter accepts -- literals, conversions,
//! constant references, calls with acceptable arguments -- which is all a
//! thunk compiled for a single folding candidate ever contains.

use crate::ir::build::UnitBuilder;
use crate::ir::{Op, RegId, Unit, UnitDb, WrapDim};
use crate::tree::Expr;
use crate::types::RangeDir;

/// Produces the IR unit for a single, stand-alone expression.
pub trait ThunkLower {
    /// Returns `None` when the expression cannot be lowered, in which case
    /// the fold is abandoned and the call site survives unchanged.
    fn lower_thunk(&self, expr: &Expr, units: &UnitDb) -> Option<Unit>;
}

/// Default expression lowerer.
#[derive(Debug, Default)]
pub struct ExprLower;

impl ThunkLower for ExprLower {
    fn lower_thunk(&self, expr: &Expr, _units: &UnitDb) -> Option<Unit> {
        let mut b = UnitBuilder::thunk("thunk").result(expr.ty().clone());
        let result = lower_expr(&mut b, expr)?;
        b.push(Op::Return { src: Some(result) });
        Some(b.finish())
    }
}

fn lower_expr(b: &mut UnitBuilder, expr: &Expr) -> Option<RegId> {
    match expr {
        Expr::IntLit { value, .. } => Some(b.const_int(*value)),
        Expr::EnumLit { index, .. } => Some(b.const_int(*index)),
        Expr::PhysLit { value, .. } => Some(b.const_int(*value)),
        Expr::RealLit { value, .. } => Some(b.const_real(*value)),

        Expr::StrLit { value, .. } => {
            // Character cells, wrapped as a one-dimensional ascending array
            // indexed from 1.
            let cells: Vec<RegId> = value
                .bytes()
                .map(|ch| b.const_int(ch as i64))
                .collect();
            let data = b.reg();
            b.push(Op::ConstArray {
                dest: data,
                values: cells,
            });
            let left = b.const_int(1);
            let right = b.const_int(value.len() as i64);
            let dir = b.const_int(RangeDir::To as i64);
            let dest = b.reg();
            b.push(Op::Wrap {
                dest,
                src: data,
                dims: vec![WrapDim { left, right, dir }],
                span: expr.span(),
            });
            Some(dest)
        }

        Expr::TypeConv { arg, ty, span } => {
            let src = lower_expr(b, arg)?;
            let dest = b.reg();
            b.push(Op::Cast {
                dest,
                src,
                ty: ty.clone(),
                span: *span,
            });
            Some(dest)
        }

        Expr::ConstRef { init, .. } => lower_expr(b, init.as_deref()?),

        Expr::FnCall {
            name, args, span, ..
        } => {
            let mut arg_regs = Vec::with_capacity(args.len());
            for arg in args {
                arg_regs.push(lower_expr(b, arg)?);
            }
            let dest = b.reg();
            b.push(Op::Fcall {
                dest,
                name: name.clone(),
                args: arg_regs,
                span: *span,
            });
            Some(dest)
        }
    }
}
