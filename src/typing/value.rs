use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::utils::{join, map_join};

/// A single arm of an unreduced pattern match: `test` is converged against the
/// scrutinee and, on the first structural match, `value` is the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternCase {
    pub test: Value,
    pub value: Value,
}

impl PatternCase {
    pub fn new(test: Value, value: Value) -> PatternCase {
        PatternCase { test, value }
    }
}

/// The central type of the engine. Both runtime values and types are `Value`s;
/// the language is type-in-value, so a function's "type" may mention literal
/// values and unbound `FreeVariable`s interchangeably.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// An unbound unification variable, globally unique by name.
    FreeVariable(String),
    BooleanLiteral(bool),
    NumberLiteral(f64),
    StringLiteral(String),
    SymbolLiteral(String),
    /// An instance of a user-declared data constructor. The name is itself a
    /// `Value` (usually a `SymbolLiteral`) so it can be a free variable
    /// during inference.
    Data(Box<Value>, Vec<Value>),
    /// Structural record; property insertion order is irrelevant.
    Record(BTreeMap<String, Value>),
    /// Two simultaneously-valid views of the same underlying value.
    Dual(Box<Value>, Box<Value>),
    /// parameter pattern, body.
    Function(Box<Value>, Box<Value>),
    /// Like `Function`, but the parameter is resolved from scope rather than
    /// supplied at the call site.
    ImplicitFunction(Box<Value>, Box<Value>),
    /// An unreduced application (callee not yet known to be a function).
    Application(Box<Value>, Box<Value>),
    /// An unreduced positional projection from a data value.
    ReadDataProperty(Box<Value>, usize),
    /// An unreduced named projection from a record.
    ReadRecordProperty(Box<Value>, String),
    /// An unreduced pattern match over a not-yet-concrete scrutinee.
    PatternMatch(Box<Value>, Vec<PatternCase>),
}

impl Value {
    pub fn free_variable<S: ToString>(name: S) -> Value {
        Value::FreeVariable(name.to_string())
    }

    pub fn boolean(value: bool) -> Value {
        Value::BooleanLiteral(value)
    }

    pub fn number(value: f64) -> Value {
        Value::NumberLiteral(value)
    }

    pub fn string<S: ToString>(value: S) -> Value {
        Value::StringLiteral(value.to_string())
    }

    pub fn symbol<S: ToString>(name: S) -> Value {
        Value::SymbolLiteral(name.to_string())
    }

    pub fn data(name: Value, parameters: Vec<Value>) -> Value {
        Value::Data(Box::new(name), parameters)
    }

    pub fn data_named<S: ToString>(name: S, parameters: Vec<Value>) -> Value {
        Value::data(Value::symbol(name), parameters)
    }

    pub fn record<I>(properties: I) -> Value
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        Value::Record(properties.into_iter().collect())
    }

    pub fn dual(left: Value, right: Value) -> Value {
        Value::Dual(Box::new(left), Box::new(right))
    }

    pub fn function(parameter: Value, body: Value) -> Value {
        Value::Function(Box::new(parameter), Box::new(body))
    }

    pub fn implicit_function(parameter: Value, body: Value) -> Value {
        Value::ImplicitFunction(Box::new(parameter), Box::new(body))
    }

    pub fn application(callee: Value, parameter: Value) -> Value {
        Value::Application(Box::new(callee), Box::new(parameter))
    }

    pub fn read_data_property(base: Value, index: usize) -> Value {
        Value::ReadDataProperty(Box::new(base), index)
    }

    pub fn read_record_property<S: ToString>(base: Value, name: S) -> Value {
        Value::ReadRecordProperty(Box::new(base), name.to_string())
    }

    pub fn pattern_match(value: Value, patterns: Vec<PatternCase>) -> Value {
        Value::PatternMatch(Box::new(value), patterns)
    }

    /// The `void` data value used as a best-effort fallback type when a
    /// diagnosable error leaves a node without a meaningful type.
    pub fn void() -> Value {
        Value::data_named("void", vec![])
    }

    pub fn is_free_variable(&self) -> bool {
        matches!(self, Value::FreeVariable(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(..) | Value::ImplicitFunction(..))
    }

    /// True for the unreduced forms that only exist as evaluation residue.
    pub fn is_residue(&self) -> bool {
        matches!(
            self,
            Value::Application(..)
                | Value::ReadDataProperty(..)
                | Value::ReadRecordProperty(..)
                | Value::PatternMatch(..)
        )
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::FreeVariable(name) => write!(f, "{}", name),
            Value::BooleanLiteral(b) => write!(f, "{}", b),
            Value::NumberLiteral(n) => write!(f, "{}", n),
            Value::StringLiteral(s) => write!(f, "{:?}", s),
            Value::SymbolLiteral(s) => write!(f, ":{}", s),
            Value::Data(name, parameters) => {
                if parameters.len() != 0 {
                    write!(f, "{} {}", name, join(parameters, " "))
                } else {
                    write!(f, "{}", name)
                }
            }
            Value::Record(properties) => write!(
                f,
                "{{ {} }}",
                map_join(properties, ", ", |(k, v)| format!("{} = {}", k, v))
            ),
            Value::Dual(left, right) => write!(f, "{}:{}", left, right),
            Value::Function(parameter, body) => write!(f, "({} -> {})", parameter, body),
            Value::ImplicitFunction(parameter, body) => {
                write!(f, "(implicit {} -> {})", parameter, body)
            }
            Value::Application(callee, parameter) => write!(f, "({} {})", callee, parameter),
            Value::ReadDataProperty(base, index) => write!(f, "{}#{}", base, index),
            Value::ReadRecordProperty(base, name) => write!(f, "{}.{}", base, name),
            Value::PatternMatch(value, patterns) => write!(
                f,
                "(match {} {})",
                value,
                map_join(patterns, " ", |p| format!("| {} = {}", p.test, p.value))
            ),
        }
    }
}

#[cfg(test)]
mod value_tests {
    use super::Value;

    #[test]
    fn test_display() {
        let v = Value::function(
            Value::free_variable("a"),
            Value::data_named("Maybe", vec![Value::free_variable("a")]),
        );
        assert_eq!(v.to_string(), "(a -> :Maybe a)");
    }

    #[test]
    fn test_residue() {
        assert!(Value::application(Value::free_variable("f"), Value::number(1.0)).is_residue());
        assert!(!Value::number(1.0).is_residue());
    }
}
