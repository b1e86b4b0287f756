//! Control-flow operation handlers.
//!
//! Branches do not execute anything themselves: they hand the next block id
//! back to the dispatch loop, which re-enters iteration on the same frame.
//! `return` ends the frame, capturing the result register if one is named.

use crate::diag::FatalError;
use crate::ir::{Op, RegId};

use super::super::frame::ScopeStack;
use super::Interp;

/// Result of executing a control-flow op.
pub(super) enum FlowResult {
    /// Op not handled by this family.
    NotHandled,
    /// Re-select the given block and continue dispatch.
    Branch(usize),
    /// End the current frame.
    Return(Option<RegId>),
}

impl Interp<'_> {
    pub(super) fn exec_flow(
        &mut self,
        scopes: &mut ScopeStack,
        op: &Op,
    ) -> Result<FlowResult, FatalError> {
        match op {
            Op::Jump { target } => Ok(FlowResult::Branch(*target)),

            Op::Cond {
                test,
                if_true,
                if_false,
            } => {
                let t = self.integer(scopes, *test)?;
                Ok(FlowResult::Branch(if t != 0 { *if_true } else { *if_false }))
            }

            Op::Case {
                value,
                branches,
                default,
            } => {
                let v = self.integer(scopes, *value)?;
                let target = branches
                    .iter()
                    .find(|(choice, _)| *choice == v)
                    .map(|(_, block)| *block)
                    .unwrap_or(*default);
                Ok(FlowResult::Branch(target))
            }

            Op::Return { src } => Ok(FlowResult::Return(*src)),

            _ => Ok(FlowResult::NotHandled),
        }
    }
}
