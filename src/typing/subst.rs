use std::collections::HashSet;
use std::fmt::Display;
use std::iter::FromIterator;
use std::ops::{Deref, DerefMut};

use crate::errors::{MicaError, MicaResult};
use crate::utils::map_join;

use super::value::{PatternCase, Value};

/// The unit of substitution produced by unification: replace the free
/// variable `from` with `to` wherever it appears.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableReplacement {
    pub from: String,
    pub to: Value,
}

impl VariableReplacement {
    pub fn new<S: ToString>(from: S, to: Value) -> VariableReplacement {
        VariableReplacement {
            from: from.to_string(),
            to,
        }
    }
}

impl Display for VariableReplacement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} => {}", self.from, self.to)
    }
}

/// An ordered replacement list; first match wins, and chains are resolved
/// transitively at application time through recursive descent rather than by
/// pre-closing the map.
#[derive(Clone, Default, PartialEq)]
pub struct Replacements(Vec<VariableReplacement>);

impl Deref for Replacements {
    type Target = Vec<VariableReplacement>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Replacements {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl FromIterator<VariableReplacement> for Replacements {
    fn from_iter<T: IntoIterator<Item = VariableReplacement>>(iter: T) -> Self {
        Replacements(iter.into_iter().collect())
    }
}

impl IntoIterator for Replacements {
    type Item = VariableReplacement;
    type IntoIter = std::vec::IntoIter<VariableReplacement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Vec<VariableReplacement>> for Replacements {
    fn from(v: Vec<VariableReplacement>) -> Replacements {
        Replacements(v)
    }
}

impl std::fmt::Debug for Replacements {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", map_join(&self.0, ", ", |r| r.to_string()))
    }
}

impl Display for Replacements {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Replacements {
    pub fn new() -> Replacements {
        Replacements(vec![])
    }

    pub fn single<S: ToString>(from: S, to: Value) -> Replacements {
        Replacements(vec![VariableReplacement::new(from, to)])
    }

    /// First replacement for `name`, if any.
    pub fn find(&self, name: &str) -> Option<&VariableReplacement> {
        self.0.iter().find(|r| r.from == name)
    }

    /// Append `other`'s entries after this list's own.
    pub fn concat(mut self, other: Replacements) -> Replacements {
        self.0.extend(other.0);
        self
    }
}

/// Application of a replacement list to a tree. Chains (`a => b`, `b => 2`)
/// resolve transitively; a cyclic chain is reported as a fatal internal
/// error, since `converge`'s occurs check keeps cycles from being emitted in
/// the first place.
pub trait ApplyReplacements: Sized {
    fn apply_replacements(self, repls: &Replacements) -> MicaResult<Self>;
}

impl ApplyReplacements for Value {
    fn apply_replacements(self, repls: &Replacements) -> MicaResult<Value> {
        let mut visiting = vec![];
        apply_guarded(self, repls, &mut visiting)
    }
}

fn apply_guarded(
    value: Value,
    repls: &Replacements,
    visiting: &mut Vec<String>,
) -> MicaResult<Value> {
    Ok(match value {
        Value::FreeVariable(name) => match repls.find(&name) {
            Some(r) => {
                if visiting.iter().any(|n| n == &name) {
                    return Err(MicaError::internal(format!(
                        "recursive replacement for `{}`",
                        name
                    )));
                }
                visiting.push(name);
                let to = apply_guarded(r.to.clone(), repls, visiting)?;
                visiting.pop();
                to
            }
            _ => Value::FreeVariable(name),
        },
        v @ Value::BooleanLiteral(_)
        | v @ Value::NumberLiteral(_)
        | v @ Value::StringLiteral(_)
        | v @ Value::SymbolLiteral(_) => v,
        Value::Data(name, parameters) => Value::Data(
            Box::new(apply_guarded(*name, repls, visiting)?),
            parameters
                .into_iter()
                .map(|p| apply_guarded(p, repls, visiting))
                .collect::<MicaResult<_>>()?,
        ),
        Value::Record(properties) => Value::Record(
            properties
                .into_iter()
                .map(|(k, v)| Ok((k, apply_guarded(v, repls, visiting)?)))
                .collect::<MicaResult<_>>()?,
        ),
        Value::Dual(left, right) => Value::Dual(
            Box::new(apply_guarded(*left, repls, visiting)?),
            Box::new(apply_guarded(*right, repls, visiting)?),
        ),
        Value::Function(parameter, body) => Value::Function(
            Box::new(apply_guarded(*parameter, repls, visiting)?),
            Box::new(apply_guarded(*body, repls, visiting)?),
        ),
        Value::ImplicitFunction(parameter, body) => Value::ImplicitFunction(
            Box::new(apply_guarded(*parameter, repls, visiting)?),
            Box::new(apply_guarded(*body, repls, visiting)?),
        ),
        Value::Application(callee, parameter) => Value::Application(
            Box::new(apply_guarded(*callee, repls, visiting)?),
            Box::new(apply_guarded(*parameter, repls, visiting)?),
        ),
        Value::ReadDataProperty(base, index) => {
            Value::ReadDataProperty(Box::new(apply_guarded(*base, repls, visiting)?), index)
        }
        Value::ReadRecordProperty(base, name) => {
            Value::ReadRecordProperty(Box::new(apply_guarded(*base, repls, visiting)?), name)
        }
        Value::PatternMatch(value, patterns) => Value::PatternMatch(
            Box::new(apply_guarded(*value, repls, visiting)?),
            patterns
                .into_iter()
                .map(|p| {
                    Ok(PatternCase::new(
                        apply_guarded(p.test, repls, visiting)?,
                        apply_guarded(p.value, repls, visiting)?,
                    ))
                })
                .collect::<MicaResult<_>>()?,
        ),
    })
}

impl<T: ApplyReplacements> ApplyReplacements for Box<T> {
    fn apply_replacements(self, repls: &Replacements) -> MicaResult<Box<T>> {
        Ok(Box::new((*self).apply_replacements(repls)?))
    }
}

impl<T: ApplyReplacements> ApplyReplacements for Option<T> {
    fn apply_replacements(self, repls: &Replacements) -> MicaResult<Self> {
        self.map(|t| t.apply_replacements(repls)).transpose()
    }
}

impl<T: ApplyReplacements> ApplyReplacements for Vec<T> {
    fn apply_replacements(self, repls: &Replacements) -> MicaResult<Vec<T>> {
        self.into_iter()
            .map(|x| x.apply_replacements(repls))
            .collect()
    }
}

/// Free-variable extraction.
pub trait FreeVariables {
    fn free_variables(&self) -> HashSet<&str>;
}

impl FreeVariables for Value {
    fn free_variables(&self) -> HashSet<&str> {
        let mut h = HashSet::new();
        collect_free_variables(self, &mut h);
        h
    }
}

impl FreeVariables for Vec<Value> {
    fn free_variables(&self) -> HashSet<&str> {
        let mut h = HashSet::new();
        for v in self {
            collect_free_variables(v, &mut h);
        }
        h
    }
}

fn collect_free_variables<'a>(value: &'a Value, h: &mut HashSet<&'a str>) {
    match value {
        Value::FreeVariable(name) => {
            h.insert(name.as_str());
        }
        Value::BooleanLiteral(_)
        | Value::NumberLiteral(_)
        | Value::StringLiteral(_)
        | Value::SymbolLiteral(_) => {}
        Value::Data(name, parameters) => {
            collect_free_variables(name, h);
            for p in parameters {
                collect_free_variables(p, h);
            }
        }
        Value::Record(properties) => {
            for v in properties.values() {
                collect_free_variables(v, h);
            }
        }
        Value::Dual(left, right) => {
            collect_free_variables(left, h);
            collect_free_variables(right, h);
        }
        Value::Function(parameter, body) | Value::ImplicitFunction(parameter, body) => {
            collect_free_variables(parameter, h);
            collect_free_variables(body, h);
        }
        Value::Application(callee, parameter) => {
            collect_free_variables(callee, h);
            collect_free_variables(parameter, h);
        }
        Value::ReadDataProperty(base, _) | Value::ReadRecordProperty(base, _) => {
            collect_free_variables(base, h);
        }
        Value::PatternMatch(value, patterns) => {
            collect_free_variables(value, h);
            for p in patterns {
                collect_free_variables(&p.test, h);
                collect_free_variables(&p.value, h);
            }
        }
    }
}

#[cfg(test)]
mod subst_tests {
    use super::{ApplyReplacements, FreeVariables, Replacements, VariableReplacement};
    use crate::typing::value::Value;

    #[test]
    fn test_chain_resolution() {
        // a => b, b => 2 resolves transitively
        let repls = Replacements::from(vec![
            VariableReplacement::new("a", Value::free_variable("b")),
            VariableReplacement::new("b", Value::number(2.0)),
        ]);
        let v = Value::free_variable("a").apply_replacements(&repls).unwrap();
        assert_eq!(v, Value::number(2.0));
    }

    #[test]
    fn test_first_match_wins() {
        let repls = Replacements::from(vec![
            VariableReplacement::new("a", Value::number(1.0)),
            VariableReplacement::new("a", Value::number(2.0)),
        ]);
        let v = Value::free_variable("a").apply_replacements(&repls).unwrap();
        assert_eq!(v, Value::number(1.0));
    }

    #[test]
    fn test_cycle_is_an_error() {
        let repls = Replacements::from(vec![
            VariableReplacement::new(
                "a",
                Value::data_named("F", vec![Value::free_variable("b")]),
            ),
            VariableReplacement::new(
                "b",
                Value::data_named("F", vec![Value::free_variable("a")]),
            ),
        ]);
        assert!(Value::free_variable("a").apply_replacements(&repls).is_err());
    }

    #[test]
    fn test_free_variables() {
        let v = Value::function(
            Value::free_variable("x"),
            Value::data_named("Pair", vec![Value::free_variable("x"), Value::free_variable("y")]),
        );
        let fv = v.free_variables();
        assert!(fv.contains("x") && fv.contains("y"));
        assert_eq!(fv.len(), 2);
    }
}
