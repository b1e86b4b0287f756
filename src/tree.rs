//! Typed expression nodes consumed by the constant folder.
//!
//! This is the slice of the front-end's syntax tree the evaluator can see:
//! exactly the forms the syntactic pre-filter accepts. Elaboration and type
//! checking have already run, so every node carries its resolved type and a
//! call node knows whether its callee was declared pure.

use crate::span::Span;
use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLit {
        value: i64,
        ty: Type,
        span: Span,
    },
    RealLit {
        value: f64,
        ty: Type,
        span: Span,
    },
    /// String literal; elaboration has already given it its array type.
    StrLit {
        value: String,
        ty: Type,
        span: Span,
    },
    /// Reference to an enumeration literal, by position.
    EnumLit {
        index: i64,
        ty: Type,
        span: Span,
    },
    /// Physical literal, stored as a multiple of the type's base unit.
    PhysLit {
        value: i64,
        ty: Type,
        span: Span,
    },
    /// Reference to a named constant. `init` is the elaborated initializer,
    /// absent for deferred constants whose value is not yet known.
    ConstRef {
        name: String,
        init: Option<Box<Expr>>,
        ty: Type,
        span: Span,
    },
    /// Type conversion over a single argument.
    TypeConv {
        arg: Box<Expr>,
        ty: Type,
        span: Span,
    },
    /// Call to a named function. `name` is the fully-qualified unit name of
    /// the callee; `pure` reflects the callee's declaration.
    FnCall {
        name: String,
        args: Vec<Expr>,
        ty: Type,
        pure: bool,
        span: Span,
    },
}

impl Expr {
    pub fn ty(&self) -> &Type {
        match self {
            Expr::IntLit { ty, .. }
            | Expr::RealLit { ty, .. }
            | Expr::StrLit { ty, .. }
            | Expr::EnumLit { ty, .. }
            | Expr::PhysLit { ty, .. }
            | Expr::ConstRef { ty, .. }
            | Expr::TypeConv { ty, .. }
            | Expr::FnCall { ty, .. } => ty,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Expr::IntLit { span, .. }
            | Expr::RealLit { span, .. }
            | Expr::StrLit { span, .. }
            | Expr::EnumLit { span, .. }
            | Expr::PhysLit { span, .. }
            | Expr::ConstRef { span, .. }
            | Expr::TypeConv { span, .. }
            | Expr::FnCall { span, .. } => *span,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expr::IntLit { .. }
                | Expr::RealLit { .. }
                | Expr::StrLit { .. }
                | Expr::EnumLit { .. }
                | Expr::PhysLit { .. }
        )
    }

    /// Short description used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Expr::IntLit { value, .. } => value.to_string(),
            Expr::RealLit { value, .. } => value.to_string(),
            Expr::StrLit { value, .. } => format!("\"{}\"", value),
            Expr::EnumLit { index, ty, .. } => match ty {
                Type::Enum { literals, .. } => literals
                    .get(*index as usize)
                    .cloned()
                    .unwrap_or_else(|| index.to_string()),
                _ => index.to_string(),
            },
            Expr::PhysLit { value, ty, .. } => match ty {
                Type::Physical { unit, .. } => format!("{} {}", value, unit),
                _ => value.to_string(),
            },
            Expr::ConstRef { name, .. } => name.clone(),
            Expr::TypeConv { arg, .. } => format!("conversion of {}", arg.describe()),
            Expr::FnCall { name, .. } => format!("{}(...)", name),
        }
    }
}
