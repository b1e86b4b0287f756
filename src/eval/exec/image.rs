//! The image operation: scalar to character sequence.
//!
//! Formatting depends on the source type recorded in the op: integers print
//! as signed decimal, enumeration values as their declared literal, reals in
//! general format with `DBL_DIG + 3` significant digits, and physical values
//! as the decimal multiple followed by the base-unit identifier. The result
//! is a one-dimensional ascending array of character cells indexed from 1,
//! allocated on the evaluation arena.

use crate::diag::FatalError;
use crate::ir::Op;
use crate::types::{RangeDir, Type};

use super::super::frame::ScopeStack;
use super::super::value::{Dim, Value, ValueTag};
use super::Interp;

/// Significant digits used for the image of a real value.
const REAL_DIGITS: i32 = 18;

impl Interp<'_> {
    /// Execute the image operation. Returns false when the op is not handled
    /// by this family.
    pub(super) fn exec_image(
        &mut self,
        scopes: &mut ScopeStack,
        op: &Op,
    ) -> Result<bool, FatalError> {
        let Op::Image {
            dest,
            src,
            ty,
            span,
        } = op
        else {
            return Ok(false);
        };

        let v = self.reg(scopes, *src)?;
        let text = match ty {
            Type::Int { .. } => match v.as_integer() {
                Some(i) => i.to_string(),
                None => return Err(self.tag_error(ValueTag::Integer, &v)),
            },
            Type::Enum { literals, .. } => match v.as_integer() {
                Some(i) => match literals.get(i as usize) {
                    Some(lit) => lit.clone(),
                    None => {
                        return Err(self.fatal(
                            *span,
                            format!("enumeration has no literal at position {}", i),
                        ));
                    }
                },
                None => return Err(self.tag_error(ValueTag::Integer, &v)),
            },
            Type::Real => match v.as_real() {
                Some(r) => format_real(r),
                None => return Err(self.tag_error(ValueTag::Real, &v)),
            },
            Type::Physical { unit, .. } => match v.as_integer() {
                Some(i) => format!("{} {}", i, unit),
                None => return Err(self.tag_error(ValueTag::Integer, &v)),
            },
            Type::Carray { .. } | Type::Uarray { .. } => {
                self.sink.error_at(
                    *span,
                    "cannot compute image of a composite value at compile time",
                );
                self.failed = true;
                return Ok(true);
            }
        };

        let Some(base) = self.heap.alloc(text.len()) else {
            self.fail(*span, "evaluation heap exhausted, cannot constant fold");
            return Ok(true);
        };
        for (i, ch) in text.bytes().enumerate() {
            self.heap_write(base + i, Value::Integer(ch as i64))?;
        }
        self.set_reg(
            scopes,
            *dest,
            Value::Uarray {
                data: base,
                dims: vec![Dim {
                    left: 1,
                    right: text.len() as i64,
                    dir: RangeDir::To,
                }],
            },
        );
        Ok(true)
    }
}

/// `%g`-style formatting: fixed notation when the exponent is moderate,
/// scientific otherwise, with trailing zeros trimmed.
fn format_real(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    if !v.is_finite() {
        return v.to_string();
    }
    let exponent = v.abs().log10().floor() as i32;
    if (-4..REAL_DIGITS).contains(&exponent) {
        let decimals = (REAL_DIGITS - 1 - exponent).max(0) as usize;
        trim_zeros(format!("{:.*}", decimals, v))
    } else {
        let formatted = format!("{:.*e}", (REAL_DIGITS - 1) as usize, v);
        match formatted.split_once('e') {
            Some((mantissa, exp)) => {
                format!("{}e{}", trim_zeros(mantissa.to_string()), exp)
            }
            None => formatted,
        }
    }
}

fn trim_zeros(mut s: String) -> String {
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}
