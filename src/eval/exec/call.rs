//! Function call machinery.
//!
//! A call re-enters the evaluation loop on the same interpreter: the callee
//! gets a fresh activation but shares the heap, so aggregate results handed
//! back through pointers stay valid in the caller. Callees missing from the
//! unit registry are requested from the library collaborator; a package pulls
//! its body unit along, and the lexical parent chain is loaded eagerly so
//! escaping variable references can be materialised later.

use std::rc::Rc;

use crate::diag::FatalError;
use crate::ir::{Op, Unit, UnitKind};
use crate::library::split_name;
use crate::span::Span;

use super::super::frame::ScopeStack;
use super::super::EvalFlag;
use super::Interp;

impl Interp<'_> {
    /// Execute call operations. Returns false when the op is not handled by
    /// this family.
    pub(super) fn exec_call(
        &mut self,
        scopes: &mut ScopeStack,
        op: &Op,
    ) -> Result<bool, FatalError> {
        match op {
            Op::Fcall {
                dest,
                name,
                args,
                span,
            } => {
                let Some(unit) = self.resolve_unit(name, *span)? else {
                    // resolve_unit has already failed the fold.
                    return Ok(true);
                };
                let mut argv = Vec::with_capacity(args.len());
                for r in args {
                    argv.push(self.reg(scopes, *r)?);
                }
                match self.run_unit(unit, argv)? {
                    Some(v) if !self.failed => self.set_reg(scopes, *dest, v),
                    _ => self.failed = true,
                }
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Find a callee by fully-qualified name, loading it (and its lexical
    /// surroundings) from the library on demand.
    fn resolve_unit(
        &mut self,
        name: &str,
        span: Span,
    ) -> Result<Option<Rc<Unit>>, FatalError> {
        if let Some(unit) = self.units.get(name) {
            return Ok(Some(unit));
        }
        if let Some(unit) = self.load_with_surroundings(name, span)? {
            return Ok(Some(unit));
        }
        if !self.failed {
            self.fail(
                span,
                format!("function {} not defined, cannot constant fold", name),
            );
        }
        Ok(None)
    }

    /// Load `name` from the library together with the units an evaluation of
    /// it can touch: a package's body, and every missing enclosing unit.
    fn load_with_surroundings(
        &mut self,
        name: &str,
        span: Span,
    ) -> Result<Option<Rc<Unit>>, FatalError> {
        let Some(unit) = self.load_one(name, span)? else {
            return Ok(None);
        };

        let mut pending = vec![Rc::clone(&unit)];
        while let Some(current) = pending.pop() {
            if matches!(current.kind, UnitKind::Package) {
                let body = format!("{}-body", current.name);
                if !self.units.contains(&body) && self.load_one(&body, span)?.is_none() {
                    if !self.failed {
                        self.fail(
                            span,
                            format!("body of package {} not available", current.name),
                        );
                    }
                    return Ok(None);
                }
            }
            if let Some(parent) = current.parent.clone() {
                if !self.units.contains(&parent) {
                    match self.load_one(&parent, span)? {
                        Some(p) => pending.push(p),
                        None => {
                            if !self.failed {
                                self.fail(
                                    span,
                                    format!("enclosing unit {} not available", parent),
                                );
                            }
                            return Ok(None);
                        }
                    }
                }
            }
        }
        Ok(Some(unit))
    }

    /// Load a single unit file from the library and register it. Returns
    /// `None` when no library is attached, the unit does not exist there, or
    /// JIT-loading was not permitted.
    fn load_one(&mut self, name: &str, span: Span) -> Result<Option<Rc<Unit>>, FatalError> {
        let Some(library) = self.library else {
            return Ok(None);
        };
        let Some((lib, unit_name)) = split_name(name) else {
            return Ok(None);
        };
        let loaded = match library.load(lib, unit_name) {
            Ok(Some(unit)) => unit,
            Ok(None) => return Ok(None),
            Err(err) => {
                self.fail(span, format!("failed to load unit {}: {}", name, err));
                return Ok(None);
            }
        };
        if loaded.name != name {
            return Err(self.fatal(
                span,
                format!("library served unit {} for {}", loaded.name, name),
            ));
        }
        if !self.flags.contains(EvalFlag::Lower) {
            self.fail(
                span,
                format!("unit {} is not lowered, cannot constant fold", name),
            );
            return Ok(None);
        }
        Ok(Some(self.units.insert(loaded)))
    }
}
