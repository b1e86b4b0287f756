//! Memory operation handlers: arena allocation, array construction and
//! inspection, variable and pointer traffic.
//!
//! All pointers flowing through these handlers refer to the evaluation
//! arena; a pointer outside it means the IR producer leaked an address and
//! is fatal. Arena exhaustion is not an error at all -- the expression is
//! simply too big to fold.

use crate::diag::FatalError;
use crate::ir::Op;
use crate::types::RangeDir;

use super::super::frame::ScopeStack;
use super::super::value::{Dim, Value, ValueTag, MAX_DIMS};
use super::Interp;

impl Interp<'_> {
    /// Execute memory operations. Returns false when the op is not handled
    /// by this family.
    pub(super) fn exec_memory(
        &mut self,
        scopes: &mut ScopeStack,
        op: &Op,
    ) -> Result<bool, FatalError> {
        match op {
            Op::ConstArray { dest, values } => {
                let Some(base) = self.heap.alloc(values.len()) else {
                    self.fail(
                        self.callsite,
                        "evaluation heap exhausted, cannot constant fold",
                    );
                    return Ok(true);
                };
                for (i, r) in values.iter().enumerate() {
                    let v = self.reg(scopes, *r)?;
                    self.heap_write(base + i, v)?;
                }
                self.set_reg(scopes, *dest, Value::Pointer(base));
            }

            Op::Wrap {
                dest,
                src,
                dims,
                span,
            } => {
                if dims.is_empty() || dims.len() > MAX_DIMS {
                    self.fail(
                        *span,
                        format!(
                            "{} dimensional array prevents constant folding",
                            dims.len()
                        ),
                    );
                    return Ok(true);
                }
                let data = self.pointer(scopes, *src)?;
                let mut built = Vec::with_capacity(dims.len());
                for d in dims {
                    let left = self.integer(scopes, d.left)?;
                    let right = self.integer(scopes, d.right)?;
                    let dir = match self.integer(scopes, d.dir)? {
                        0 => RangeDir::To,
                        1 => RangeDir::Downto,
                        other => {
                            return Err(self.fatal(
                                *span,
                                format!("invalid range direction {}", other),
                            ));
                        }
                    };
                    built.push(Dim { left, right, dir });
                }
                self.set_reg(scopes, *dest, Value::Uarray { data, dims: built });
            }

            Op::Unwrap { dest, src } => {
                let v = self.reg(scopes, *src)?;
                match v {
                    Value::Uarray { data, .. } => {
                        self.set_reg(scopes, *dest, Value::Pointer(data));
                    }
                    other => return Err(self.tag_error(ValueTag::Uarray, &other)),
                }
            }

            Op::UarrayLen { dest, src, dim } => {
                let d = self.uarray_dim(scopes, *src, *dim)?;
                self.set_reg(scopes, *dest, Value::Integer(d.len()));
            }
            Op::UarrayLeft { dest, src, dim } => {
                let d = self.uarray_dim(scopes, *src, *dim)?;
                self.set_reg(scopes, *dest, Value::Integer(d.left));
            }
            Op::UarrayRight { dest, src, dim } => {
                let d = self.uarray_dim(scopes, *src, *dim)?;
                self.set_reg(scopes, *dest, Value::Integer(d.right));
            }
            Op::UarrayDir { dest, src, dim } => {
                let d = self.uarray_dim(scopes, *src, *dim)?;
                let dir = match d.dir {
                    RangeDir::To => 0,
                    RangeDir::Downto => 1,
                };
                self.set_reg(scopes, *dest, Value::Integer(dir));
            }

            Op::Load { dest, var } => {
                if !self.resolve_var(scopes, *var, self.callsite)? {
                    return Ok(true);
                }
                let v = scopes
                    .at(var.depth)
                    .expect("resolved")
                    .vars[var.index]
                    .clone();
                self.set_reg(scopes, *dest, v);
            }
            Op::Store { var, src } => {
                let v = self.reg(scopes, *src)?;
                if !self.resolve_var(scopes, *var, self.callsite)? {
                    return Ok(true);
                }
                scopes.at_mut(var.depth).expect("resolved").vars[var.index] = v;
            }

            Op::LoadIndirect { dest, addr } => {
                let p = self.pointer(scopes, *addr)?;
                let v = self.heap_read(p)?;
                self.set_reg(scopes, *dest, v);
            }
            Op::StoreIndirect { addr, src } => {
                let p = self.pointer(scopes, *addr)?;
                let v = self.reg(scopes, *src)?;
                self.heap_write(p, v)?;
            }

            Op::Index { dest, var } => {
                if !self.resolve_var(scopes, *var, self.callsite)? {
                    return Ok(true);
                }
                let v = scopes.at(var.depth).expect("resolved").vars[var.index].clone();
                match v {
                    Value::Carray { data, .. } => {
                        self.set_reg(scopes, *dest, Value::Pointer(data));
                    }
                    other => return Err(self.tag_error(ValueTag::Carray, &other)),
                }
            }

            Op::Copy { dst, src, count } => {
                let to = self.pointer(scopes, *dst)?;
                let from = self.pointer(scopes, *src)?;
                let n = self.integer(scopes, *count)?;
                // Overlap is not defined; a forward copy is as good as any.
                for i in 0..n.max(0) as usize {
                    let v = self.heap_read(from + i)?;
                    self.heap_write(to + i, v)?;
                }
            }

            Op::Alloca { dest, count } => {
                let n = self.integer(scopes, *count)?;
                let Some(base) = self.heap.alloc(n.max(0) as usize) else {
                    self.fail(
                        self.callsite,
                        "evaluation heap exhausted, cannot constant fold",
                    );
                    return Ok(true);
                };
                self.set_reg(scopes, *dest, Value::Pointer(base));
            }

            Op::Memcmp {
                dest,
                lhs,
                rhs,
                count,
            } => {
                let a = self.pointer(scopes, *lhs)?;
                let b = self.pointer(scopes, *rhs)?;
                let n = self.integer(scopes, *count)?;
                let mut equal = true;
                for i in 0..n.max(0) as usize {
                    let x = self.heap_read(a + i)?;
                    let y = self.heap_read(b + i)?;
                    if !self.values_equal(&x, &y)? {
                        equal = false;
                        break;
                    }
                }
                self.set_reg(scopes, *dest, Value::Integer(equal as i64));
            }

            _ => return Ok(false),
        }
        Ok(true)
    }

    fn uarray_dim(
        &mut self,
        scopes: &ScopeStack,
        src: usize,
        dim: usize,
    ) -> Result<Dim, FatalError> {
        let v = self.reg(scopes, src)?;
        match v {
            Value::Uarray { ref dims, .. } => match dims.get(dim) {
                Some(d) => Ok(*d),
                None => Err(self.fatal(
                    self.callsite,
                    format!("array has no dimension {}", dim),
                )),
            },
            other => Err(self.tag_error(ValueTag::Uarray, &other)),
        }
    }

    fn values_equal(&mut self, a: &Value, b: &Value) -> Result<bool, FatalError> {
        match (a, b) {
            (Value::Integer(a), Value::Integer(b)) => Ok(a == b),
            (Value::Real(a), Value::Real(b)) => Ok(a == b),
            (Value::Pointer(a), Value::Pointer(b)) => Ok(a == b),
            _ => Err(self.fatal(
                self.callsite,
                format!(
                    "comparison of {} value with {} value",
                    a.tag().name(),
                    b.tag().name()
                ),
            )),
        }
    }
}
