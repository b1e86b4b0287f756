//! Bounds, index and assertion check handlers.
//!
//! A failed bounds check is an error in the source being compiled, not a
//! limitation of the evaluator: when bounds reporting is enabled it is
//! diagnosed at the op's bookmark and counted, and the fold is abandoned
//! either way. Assertions and reports are observable side effects, so they
//! may only be folded through when the caller opted in with
//! [`EvalFlag::Report`].

use crate::diag::FatalError;
use crate::ir::{AssertLevel, Op, RegId};
use crate::span::Span;

use super::super::frame::ScopeStack;
use super::super::value::{Value, ValueTag};
use super::super::EvalFlag;
use super::Interp;

impl Interp<'_> {
    /// Execute check operations. Returns false when the op is not handled
    /// by this family.
    pub(super) fn exec_checks(
        &mut self,
        scopes: &mut ScopeStack,
        op: &Op,
    ) -> Result<bool, FatalError> {
        match op {
            Op::Bounds {
                src,
                low,
                high,
                span,
            } => {
                let v = self.integer(scopes, *src)?;
                if v < *low || v > *high {
                    self.bounds_failure(
                        *span,
                        format!("value {} outside of bounds {} to {}", v, low, high),
                    );
                }
            }

            Op::DynBounds {
                src,
                low,
                high,
                span,
            } => {
                let v = self.integer(scopes, *src)?;
                let low = self.integer(scopes, *low)?;
                let high = self.integer(scopes, *high)?;
                if v < low || v > high {
                    self.bounds_failure(
                        *span,
                        format!("value {} outside of bounds {} to {}", v, low, high),
                    );
                }
            }

            Op::IndexCheck {
                low,
                high,
                min,
                max,
                span,
            } => {
                let lo = self.integer(scopes, *low)?;
                let hi = self.integer(scopes, *high)?;
                if lo < *min || hi > *max {
                    self.bounds_failure(
                        *span,
                        format!(
                            "range {} to {} outside of index range {} to {}",
                            lo, hi, min, max
                        ),
                    );
                }
            }

            Op::Assert {
                test,
                level,
                msg,
                span,
            } => {
                let t = self.integer(scopes, *test)?;
                if t != 0 {
                    return Ok(true);
                }
                let level = self.severity(scopes, *level)?;
                let text = match msg {
                    Some(r) => self.message_text(scopes, *r)?,
                    None => "Assertion violation.".to_string(),
                };
                self.deliver(*span, level, format!("Assertion {}: {}", level.name(), text));
            }

            Op::Report { level, msg, span } => {
                let level = self.severity(scopes, *level)?;
                let text = self.message_text(scopes, *msg)?;
                self.deliver(*span, level, format!("Report {}: {}", level.name(), text));
            }

            Op::Undefined { span } => {
                self.fail(*span, "undefined value prevents constant folding");
            }

            _ => return Ok(false),
        }
        Ok(true)
    }

    fn bounds_failure(&mut self, span: Span, message: String) {
        if self.flags.contains(EvalFlag::Bounds) {
            self.sink.error_at(span, message);
        }
        self.failed = true;
    }

    /// Deliver an assertion or report message. Folding through one deletes
    /// an observable side effect, so without the `Report` flag the fold is
    /// abandoned instead; with it the message goes to the sink, and a
    /// severity of error or worse still abandons the fold as a genuine
    /// failure of the source.
    fn deliver(&mut self, span: Span, level: AssertLevel, message: String) {
        if !self.flags.contains(EvalFlag::Report) {
            self.fail(span, "assertion or report prevents constant folding");
            return;
        }
        match level {
            AssertLevel::Note => self.sink.note_at(span, message),
            AssertLevel::Warning => self.sink.warn_at(span, message),
            AssertLevel::Error | AssertLevel::Failure => {
                self.sink.error_at(span, message);
                self.failed = true;
            }
        }
    }

    fn severity(&mut self, scopes: &ScopeStack, r: RegId) -> Result<AssertLevel, FatalError> {
        let v = self.integer(scopes, r)?;
        match AssertLevel::from_value(v) {
            Some(level) => Ok(level),
            None => Err(self.fatal(
                self.callsite,
                format!("invalid assertion severity {}", v),
            )),
        }
    }

    /// Decode a character-array message register into a string.
    fn message_text(&mut self, scopes: &ScopeStack, r: RegId) -> Result<String, FatalError> {
        let v = self.reg(scopes, r)?;
        let (data, len) = match &v {
            Value::Uarray { data, dims } => {
                let len = dims.first().map(|d| d.len()).unwrap_or(0);
                (*data, len.max(0) as usize)
            }
            Value::Carray { data, len } => (*data, *len),
            other => return Err(self.tag_error(ValueTag::Uarray, other)),
        };
        let mut text = String::with_capacity(len);
        for i in 0..len {
            let cell = self.heap_read(data + i)?;
            match cell.as_integer() {
                Some(code) => text.push((code as u8) as char),
                None => return Err(self.tag_error(ValueTag::Integer, &cell)),
            }
        }
        Ok(text)
    }
}
