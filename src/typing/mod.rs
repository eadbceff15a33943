//! The core engine: the `Value` data model, structural convergence, scope
//! and substitution machinery, the evaluator, implicit-parameter resolution,
//! and the type checker.

#[macro_use]
pub mod macros;

pub mod check;
pub mod eval;
pub mod implicits;
pub mod scope;
pub mod state;
pub mod subst;
pub mod unify;
pub mod value;

pub use check::{type_check, TypeChecker, TypeInfo, TypedExpression};
pub use eval::{evaluate_expression, simplify};
pub use scope::{Scope, ScopeBinding};
pub use state::NameFactory;
pub use subst::{ApplyReplacements, FreeVariables, Replacements, VariableReplacement};
pub use unify::{converge, destructure_value, remove_implicit_parameters};
pub use value::{PatternCase, Value};

/// A human-readable diagnostic. Checking never aborts on the first problem;
/// messages accumulate and the caller decides how to present them.
pub type Message = String;
