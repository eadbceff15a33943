use std::rc::Rc;

use crate::ast::Expression;

use super::value::Value;

/// A name visible at some point of the program, carrying its type, the scope
/// at its definition site (used to evaluate `expression`), and the defining
/// expression itself. A binding with no expression is opaque: looking it up
/// during evaluation yields its declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeBinding {
    pub name: String,
    pub ty: Value,
    pub scope: Scope,
    pub expression: Option<Expression>,
}

impl ScopeBinding {
    pub fn new<S: ToString>(
        name: S,
        ty: Value,
        scope: Scope,
        expression: Option<Expression>,
    ) -> ScopeBinding {
        ScopeBinding {
            name: name.to_string(),
            ty,
            scope,
            expression,
        }
    }
}

/// An ordered binding list searched front-to-back (front = innermost).
/// Scopes are extended by prepending and never mutated in place, so sharing
/// one scope across sibling subtrees is safe; the bindings themselves are
/// reference-counted to keep extension cheap.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scope {
    pub bindings: Vec<Rc<ScopeBinding>>,
}

impl Scope {
    pub fn new() -> Scope {
        Scope { bindings: vec![] }
    }

    /// A new scope with `binding` prepended; `self` is untouched.
    pub fn extend(&self, binding: ScopeBinding) -> Scope {
        let mut bindings = Vec::with_capacity(self.bindings.len() + 1);
        bindings.push(Rc::new(binding));
        bindings.extend(self.bindings.iter().cloned());
        Scope { bindings }
    }

    /// Prepend several bindings at once, preserving their given order at the
    /// front of the new scope.
    pub fn extend_many<I>(&self, new_bindings: I) -> Scope
    where
        I: IntoIterator<Item = ScopeBinding>,
    {
        let mut bindings = new_bindings
            .into_iter()
            .map(Rc::new)
            .collect::<Vec<_>>();
        bindings.extend(self.bindings.iter().cloned());
        Scope { bindings }
    }

    /// First (innermost) binding with the given name.
    pub fn find(&self, name: &str) -> Option<&Rc<ScopeBinding>> {
        self.bindings.iter().find(|b| b.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<ScopeBinding>> {
        self.bindings.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod scope_tests {
    use super::{Scope, ScopeBinding};
    use crate::typing::value::Value;

    #[test]
    fn test_shadowing() {
        let outer = Scope::new().extend(ScopeBinding::new(
            "x",
            Value::number(1.0),
            Scope::new(),
            None,
        ));
        let inner = outer.extend(ScopeBinding::new(
            "x",
            Value::number(2.0),
            outer.clone(),
            None,
        ));

        assert_eq!(outer.find("x").unwrap().ty, Value::number(1.0));
        assert_eq!(inner.find("x").unwrap().ty, Value::number(2.0));
    }

    #[test]
    fn test_extension_does_not_mutate() {
        let outer = Scope::new();
        let _ = outer.extend(ScopeBinding::new(
            "y",
            Value::boolean(true),
            Scope::new(),
            None,
        ));
        assert!(outer.is_empty());
    }
}
