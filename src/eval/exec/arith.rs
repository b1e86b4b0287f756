//! Arithmetic and logical operation handlers.
//!
//! Integer arithmetic wraps as two's-complement 64-bit; range enforcement is
//! the job of the bounds ops the lowering pass emits, not of these handlers.
//! Remainder is the truncated remainder `a - (a/b)*b`; modulo is its
//! absolute value. Mixing value tags in one operation is an IR type
//! violation and fatal.

use crate::diag::FatalError;
use crate::ir::{CmpOp, Op};
use crate::span::Span;
use crate::types::{Type, TypeKind};

use super::super::frame::ScopeStack;
use super::super::value::{Value, ValueTag};
use super::super::EvalFlag;
use super::Interp;

impl Interp<'_> {
    /// Execute arithmetic/logical operations. Returns false when the op is
    /// not handled by this family.
    pub(super) fn exec_arith(
        &mut self,
        scopes: &mut ScopeStack,
        op: &Op,
    ) -> Result<bool, FatalError> {
        match op {
            Op::Const { dest, value } => {
                self.set_reg(scopes, *dest, Value::Integer(*value));
            }
            Op::ConstReal { dest, value } => {
                self.set_reg(scopes, *dest, Value::Real(*value));
            }

            Op::Add { dest, lhs, rhs } => {
                let a = self.reg(scopes, *lhs)?;
                let b = self.reg(scopes, *rhs)?;
                let v = match (&a, &b) {
                    (Value::Integer(a), Value::Integer(b)) => Value::Integer(a.wrapping_add(*b)),
                    (Value::Real(a), Value::Real(b)) => Value::Real(a + b),
                    // Pointer arithmetic advances by value slots.
                    (Value::Pointer(p), Value::Integer(n)) => {
                        Value::Pointer((*p as i64).wrapping_add(*n) as usize)
                    }
                    _ => return Err(self.tag_error(a.tag(), &b)),
                };
                self.set_reg(scopes, *dest, v);
            }
            Op::Sub { dest, lhs, rhs } => {
                let a = self.reg(scopes, *lhs)?;
                let b = self.reg(scopes, *rhs)?;
                let v = match (&a, &b) {
                    (Value::Integer(a), Value::Integer(b)) => Value::Integer(a.wrapping_sub(*b)),
                    (Value::Real(a), Value::Real(b)) => Value::Real(a - b),
                    _ => return Err(self.tag_error(a.tag(), &b)),
                };
                self.set_reg(scopes, *dest, v);
            }
            Op::Mul { dest, lhs, rhs } => {
                let a = self.reg(scopes, *lhs)?;
                let b = self.reg(scopes, *rhs)?;
                let v = match (&a, &b) {
                    (Value::Integer(a), Value::Integer(b)) => Value::Integer(a.wrapping_mul(*b)),
                    (Value::Real(a), Value::Real(b)) => Value::Real(a * b),
                    _ => return Err(self.tag_error(a.tag(), &b)),
                };
                self.set_reg(scopes, *dest, v);
            }

            Op::Div {
                dest,
                lhs,
                rhs,
                span,
            } => {
                let a = self.reg(scopes, *lhs)?;
                let b = self.reg(scopes, *rhs)?;
                let v = match (&a, &b) {
                    (Value::Integer(a), Value::Integer(b)) => {
                        if *b == 0 {
                            self.div_by_zero(*span);
                            return Ok(true);
                        }
                        Value::Integer(a.wrapping_div(*b))
                    }
                    (Value::Real(a), Value::Real(b)) => Value::Real(a / b),
                    _ => return Err(self.tag_error(a.tag(), &b)),
                };
                self.set_reg(scopes, *dest, v);
            }
            Op::Mod {
                dest,
                lhs,
                rhs,
                span,
            } => {
                let a = self.integer(scopes, *lhs)?;
                let b = self.integer(scopes, *rhs)?;
                if b == 0 {
                    self.div_by_zero(*span);
                    return Ok(true);
                }
                self.set_reg(
                    scopes,
                    *dest,
                    Value::Integer(a.wrapping_rem(b).wrapping_abs()),
                );
            }
            Op::Rem {
                dest,
                lhs,
                rhs,
                span,
            } => {
                let a = self.integer(scopes, *lhs)?;
                let b = self.integer(scopes, *rhs)?;
                if b == 0 {
                    self.div_by_zero(*span);
                    return Ok(true);
                }
                self.set_reg(scopes, *dest, Value::Integer(a.wrapping_rem(b)));
            }

            Op::Neg { dest, src } => {
                let v = match self.reg(scopes, *src)? {
                    Value::Integer(a) => Value::Integer(a.wrapping_neg()),
                    Value::Real(a) => Value::Real(-a),
                    other => return Err(self.tag_error(ValueTag::Integer, &other)),
                };
                self.set_reg(scopes, *dest, v);
            }
            Op::Abs { dest, src } => {
                let v = match self.reg(scopes, *src)? {
                    Value::Integer(a) => Value::Integer(a.wrapping_abs()),
                    Value::Real(a) => Value::Real(a.abs()),
                    other => return Err(self.tag_error(ValueTag::Integer, &other)),
                };
                self.set_reg(scopes, *dest, v);
            }
            Op::Exp { dest, lhs, rhs } => {
                // Real-only; integer exponentiation is expanded by lowering.
                let a = self.reg(scopes, *lhs)?;
                let b = self.reg(scopes, *rhs)?;
                let v = match (&a, &b) {
                    (Value::Real(a), Value::Real(b)) => Value::Real(a.powf(*b)),
                    _ => return Err(self.tag_error(ValueTag::Real, &a)),
                };
                self.set_reg(scopes, *dest, v);
            }

            Op::Cmp {
                dest,
                op: kind,
                lhs,
                rhs,
            } => {
                let a = self.reg(scopes, *lhs)?;
                let b = self.reg(scopes, *rhs)?;
                let result = self.compare(*kind, &a, &b)?;
                self.set_reg(scopes, *dest, Value::Integer(result as i64));
            }

            Op::And { dest, lhs, rhs } => {
                let a = self.integer(scopes, *lhs)?;
                let b = self.integer(scopes, *rhs)?;
                self.set_reg(scopes, *dest, Value::Integer((a != 0 && b != 0) as i64));
            }
            Op::Or { dest, lhs, rhs } => {
                let a = self.integer(scopes, *lhs)?;
                let b = self.integer(scopes, *rhs)?;
                self.set_reg(scopes, *dest, Value::Integer((a != 0 || b != 0) as i64));
            }
            Op::Not { dest, src } => {
                let a = self.integer(scopes, *src)?;
                self.set_reg(scopes, *dest, Value::Integer((a == 0) as i64));
            }

            Op::Cast {
                dest,
                src,
                ty,
                span,
            } => {
                let v = self.reg(scopes, *src)?;
                match self.cast(&v, ty) {
                    Some(cast) => self.set_reg(scopes, *dest, cast),
                    None => {
                        self.fail(
                            *span,
                            format!(
                                "cannot cast {} value at compile time",
                                v.tag().name()
                            ),
                        );
                    }
                }
            }

            Op::Select {
                dest,
                test,
                if_true,
                if_false,
            } => {
                let t = self.integer(scopes, *test)?;
                let chosen = if t != 0 { *if_true } else { *if_false };
                let v = self.reg(scopes, chosen)?;
                self.set_reg(scopes, *dest, v);
            }

            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Compare two values of the same tag. Integer and pointer comparisons
    /// are total; real comparisons follow IEEE ordering.
    pub(super) fn compare(
        &mut self,
        kind: CmpOp,
        a: &Value,
        b: &Value,
    ) -> Result<bool, FatalError> {
        let result = match (a, b) {
            (Value::Integer(a), Value::Integer(b)) => cmp_with(kind, a, b),
            (Value::Real(a), Value::Real(b)) => cmp_with(kind, a, b),
            (Value::Pointer(a), Value::Pointer(b)) => cmp_with(kind, a, b),
            _ => {
                return Err(self.fatal(
                    self.callsite,
                    format!(
                        "comparison of {} value with {} value",
                        a.tag().name(),
                        b.tag().name()
                    ),
                ));
            }
        };
        Ok(result)
    }

    fn cast(&self, v: &Value, ty: &Type) -> Option<Value> {
        match (v, ty.kind()) {
            // Integer-class targets: value-preserving from integers,
            // truncation toward zero from reals.
            (Value::Integer(a), TypeKind::Int | TypeKind::Enum | TypeKind::Physical) => {
                Some(Value::Integer(*a))
            }
            (Value::Real(a), TypeKind::Int | TypeKind::Enum | TypeKind::Physical) => {
                Some(Value::Integer(a.trunc() as i64))
            }
            (Value::Integer(a), TypeKind::Real) => Some(Value::Real(*a as f64)),
            (Value::Real(a), TypeKind::Real) => Some(Value::Real(*a)),
            _ => None,
        }
    }

    /// Integer division by zero is a genuine error in the source, reported
    /// like a bounds violation rather than as a silent fold failure.
    fn div_by_zero(&mut self, span: Span) {
        if self.flags.contains(EvalFlag::Bounds) {
            self.sink.error_at(span, "division by zero");
        }
        self.failed = true;
    }
}

fn cmp_with<T: PartialOrd>(kind: CmpOp, a: &T, b: &T) -> bool {
    match kind {
        CmpOp::Eq => a == b,
        CmpOp::Neq => a != b,
        CmpOp::Lt => a < b,
        CmpOp::Leq => a <= b,
        CmpOp::Gt => a > b,
        CmpOp::Geq => a >= b,
    }
}
