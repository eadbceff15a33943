use std::collections::BTreeMap;

use crate::ast::{ExprKind, Expression, Node};
use crate::errors::MicaResult;

use super::scope::{Scope, ScopeBinding};
use super::subst::{ApplyReplacements, FreeVariables};
use super::unify::{converge, destructure_value};
use super::value::{PatternCase, Value};

/// Reduce an expression to a value using `scope` for lookups. `None` means
/// "cannot be evaluated yet" (an unbound name, an opaque native leaf, a
/// subexpression that itself cannot proceed); callers treat it as total
/// failure of this attempt, not as an error to report.
pub fn evaluate_expression(scope: &Scope, expr: &Expression) -> MicaResult<Option<Value>> {
    let value = match &expr.kind {
        ExprKind::Identifier(name) => match scope.find(name) {
            Some(binding) => {
                let binding = binding.clone();
                match &binding.expression {
                    Some(defining) => {
                        // evaluate the defining expression in the scope at
                        // the definition site
                        match evaluate_expression(&binding.scope, defining)? {
                            Some(v) => Some(v),
                            _ => None,
                        }
                    }
                    // opaque binding: its declared type stands in for it
                    _ => Some(binding.ty.clone()),
                }
            }
            _ => {
                log::trace!("evaluate: `{}` is not in scope", name);
                None
            }
        },
        ExprKind::BooleanLiteral(b) => Some(Value::boolean(*b)),
        ExprKind::NumberLiteral(n) => Some(Value::number(*n)),
        ExprKind::StringLiteral(s) => Some(Value::string(s)),
        ExprKind::SymbolLiteral(s) => Some(Value::symbol(s)),
        ExprKind::Function(parameter, body) => {
            evaluate_function(scope, parameter, body, Value::function)?
        }
        ExprKind::ImplicitFunction(parameter, body) => {
            evaluate_function(scope, parameter, body, Value::implicit_function)?
        }
        ExprKind::Application(callee, parameter) => {
            let callee = match evaluate_expression(scope, callee)? {
                Some(v) => v,
                _ => return Ok(None),
            };
            let parameter = match evaluate_expression(scope, parameter)? {
                Some(v) => v,
                _ => return Ok(None),
            };
            Some(simplify(Value::application(callee, parameter))?)
        }
        ExprKind::Binding(name, value, body) => {
            let inner = scope.extend(ScopeBinding::new(
                name,
                Value::free_variable(name),
                scope.clone(),
                Some((**value).clone()),
            ));
            return evaluate_expression(&inner, body);
        }
        ExprKind::Dual(left, right) => {
            match (
                evaluate_expression(scope, left)?,
                evaluate_expression(scope, right)?,
            ) {
                (Some(l), Some(r)) => Some(Value::dual(l, r)),
                _ => None,
            }
        }
        ExprKind::Record(properties) => {
            let mut props = BTreeMap::new();
            for (name, value) in properties {
                match evaluate_expression(scope, value)? {
                    Some(v) => {
                        props.insert(name.clone(), v);
                    }
                    _ => return Ok(None),
                }
            }
            Some(Value::Record(props))
        }
        ExprKind::DataInstantiation(name, parameters) => {
            let mut params = Vec::with_capacity(parameters.len());
            for p in parameters {
                match evaluate_expression(scope, p)? {
                    Some(v) => params.push(v),
                    _ => return Ok(None),
                }
            }
            Some(Value::data_named(name, params))
        }
        ExprKind::ReadRecordProperty(base, name) => match evaluate_expression(scope, base)? {
            Some(base) => Some(simplify(Value::read_record_property(base, name))?),
            _ => None,
        },
        ExprKind::ReadDataProperty(base, index) => match evaluate_expression(scope, base)? {
            Some(base) => Some(simplify(Value::read_data_property(base, *index))?),
            _ => None,
        },
        ExprKind::PatternMatch(value, cases) => {
            let scrutinee = match evaluate_expression(scope, value)? {
                Some(v) => v,
                _ => return Ok(None),
            };
            let mut patterns = Vec::with_capacity(cases.len());
            for case in cases {
                let case_scope = bind_pattern_names(scope, &case.test);
                let test = match evaluate_expression(&case_scope, &case.test)? {
                    Some(v) => v,
                    _ => return Ok(None),
                };
                let value = match evaluate_expression(&case_scope, &case.value)? {
                    Some(v) => v,
                    _ => return Ok(None),
                };
                patterns.push(PatternCase::new(test, value));
            }
            Some(simplify(Value::pattern_match(scrutinee, patterns))?)
        }
        ExprKind::Native(_) => None,
    };
    Ok(value)
}

fn evaluate_function<F>(
    scope: &Scope,
    parameter: &Expression,
    body: &Expression,
    make: F,
) -> MicaResult<Option<Value>>
where
    F: FnOnce(Value, Value) -> Value,
{
    let inner = bind_pattern_names(scope, parameter);
    let parameter = match evaluate_expression(&inner, parameter)? {
        Some(v) => v,
        _ => return Ok(None),
    };
    let body = match evaluate_expression(&inner, body)? {
        Some(v) => v,
        _ => return Ok(None),
    };
    Ok(Some(make(parameter, body)))
}

/// Identifiers in a parameter pattern that are not already in scope are the
/// pattern's binding names; they enter the scope as free variables under
/// their own names so that the pattern and body evaluate to open values,
/// closed later by `destructure_value` at the application site.
fn bind_pattern_names(scope: &Scope, pattern: &Node<()>) -> Scope {
    let mut bound = vec![];
    let mut names = vec![];
    for name in pattern.identifiers() {
        if !scope.contains(name) && !names.contains(&name) {
            names.push(name);
            bound.push(ScopeBinding::new(
                name,
                Value::free_variable(name),
                scope.clone(),
                None,
            ));
        }
    }
    scope.extend_many(bound)
}

/// Bottom-up idempotent normalizer: collapses projection residues whose base
/// is now concrete, beta-reduces applications whose callee is now a function
/// literal, and resolves a pattern match once its scrutinee is
/// free-variable-free. Everything else passes through unchanged.
pub fn simplify(value: Value) -> MicaResult<Value> {
    let value = simplify_children(value)?;
    match value {
        Value::Application(callee, parameter) => match &*callee {
            Value::Function(p, b) => match destructure_value(p, &parameter) {
                Some(repls) => {
                    let body = (**b).clone().apply_replacements(&repls)?;
                    simplify(body)
                }
                _ => Ok(Value::Application(callee, parameter)),
            },
            Value::ImplicitFunction(p, b) => {
                // An argument that converges with the implicit pattern fills
                // that layer; any other argument is explicit and passes
                // through to the underlying function, with its bindings
                // reflected into the remaining implicit shape.
                if converge(&Scope::new(), p, &parameter).is_some() {
                    match destructure_value(p, &parameter) {
                        Some(repls) => {
                            let body = (**b).clone().apply_replacements(&repls)?;
                            simplify(body)
                        }
                        _ => Ok(Value::Application(callee, parameter)),
                    }
                } else if let Value::Function(q, body) = &**b {
                    match destructure_value(q, &parameter) {
                        Some(repls) => {
                            let shape = (**p).clone().apply_replacements(&repls)?;
                            let body = (**body).clone().apply_replacements(&repls)?;
                            Ok(Value::implicit_function(simplify(shape)?, simplify(body)?))
                        }
                        _ => Ok(Value::Application(callee, parameter)),
                    }
                } else {
                    let inner =
                        simplify(Value::application((**b).clone(), (*parameter).clone()))?;
                    if inner.is_residue() {
                        Ok(Value::Application(callee, parameter))
                    } else {
                        Ok(Value::implicit_function((**p).clone(), inner))
                    }
                }
            }
            _ => Ok(Value::Application(callee, parameter)),
        },
        Value::ReadDataProperty(base, index) => match data_view(&base) {
            Some((_, params)) if index < params.len() => Ok(params[index].clone()),
            _ => Ok(Value::ReadDataProperty(base, index)),
        },
        Value::ReadRecordProperty(base, name) => match record_view(&base) {
            Some(props) => match props.get(&name) {
                Some(v) => Ok(v.clone()),
                _ => Ok(Value::ReadRecordProperty(base, name)),
            },
            _ => Ok(Value::ReadRecordProperty(base, name)),
        },
        Value::PatternMatch(scrutinee, patterns) => {
            if !scrutinee.free_variables().is_empty() || scrutinee.is_residue() {
                return Ok(Value::PatternMatch(scrutinee, patterns));
            }
            // first structurally-matching pattern wins; source order is the
            // tie-break and exhaustiveness is not required
            for case in patterns.iter() {
                if let Some(repls) = converge(&Scope::new(), &case.test, &scrutinee) {
                    let result = case.value.clone().apply_replacements(&repls)?;
                    return simplify(result);
                }
            }
            Ok(Value::PatternMatch(scrutinee, patterns))
        }
        v => Ok(v),
    }
}

fn simplify_children(value: Value) -> MicaResult<Value> {
    Ok(match value {
        v @ Value::FreeVariable(_)
        | v @ Value::BooleanLiteral(_)
        | v @ Value::NumberLiteral(_)
        | v @ Value::StringLiteral(_)
        | v @ Value::SymbolLiteral(_) => v,
        Value::Data(name, parameters) => Value::Data(
            Box::new(simplify(*name)?),
            parameters
                .into_iter()
                .map(simplify)
                .collect::<MicaResult<_>>()?,
        ),
        Value::Record(properties) => Value::Record(
            properties
                .into_iter()
                .map(|(k, v)| Ok((k, simplify(v)?)))
                .collect::<MicaResult<_>>()?,
        ),
        Value::Dual(left, right) => Value::dual(simplify(*left)?, simplify(*right)?),
        Value::Function(parameter, body) => {
            Value::function(simplify(*parameter)?, simplify(*body)?)
        }
        Value::ImplicitFunction(parameter, body) => {
            Value::implicit_function(simplify(*parameter)?, simplify(*body)?)
        }
        Value::Application(callee, parameter) => {
            Value::application(simplify(*callee)?, simplify(*parameter)?)
        }
        Value::ReadDataProperty(base, index) => Value::read_data_property(simplify(*base)?, index),
        Value::ReadRecordProperty(base, name) => {
            Value::read_record_property(simplify(*base)?, name)
        }
        Value::PatternMatch(value, patterns) => Value::pattern_match(
            simplify(*value)?,
            patterns
                .into_iter()
                .map(|p| Ok(PatternCase::new(simplify(p.test)?, simplify(p.value)?)))
                .collect::<MicaResult<_>>()?,
        ),
    })
}

/// Look through dual bindings for a concrete data view.
fn data_view(value: &Value) -> Option<(&Value, &Vec<Value>)> {
    match value {
        Value::Data(name, parameters) => Some((name, parameters)),
        Value::Dual(left, right) => data_view(left).or_else(|| data_view(right)),
        _ => None,
    }
}

/// Look through dual bindings for a concrete record view.
fn record_view(value: &Value) -> Option<&std::collections::BTreeMap<String, Value>> {
    match value {
        Value::Record(properties) => Some(properties),
        Value::Dual(left, right) => record_view(left).or_else(|| record_view(right)),
        _ => None,
    }
}

#[cfg(test)]
mod eval_tests {
    use super::{evaluate_expression, simplify};
    use crate::ast::Expression;
    use crate::typing::scope::{Scope, ScopeBinding};
    use crate::typing::value::{PatternCase, Value};

    #[test]
    fn test_simplify_idempotent() {
        let values = vec![
            num!(2),
            Value::application(Value::function(fvar!(x), fvar!(x)), num!(3)),
            Value::read_data_property(dval!(Pair, num!(1), num!(2)), 1),
            Value::read_data_property(fvar!(opaque), 0),
            Value::pattern_match(
                num!(2),
                vec![PatternCase::new(num!(2), Value::string("two"))],
            ),
        ];
        for v in values {
            let once = simplify(v).unwrap();
            let twice = simplify(once.clone()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_beta_reduction() {
        let v = Value::application(Value::function(fvar!(x), fvar!(x)), num!(3));
        assert_eq!(simplify(v).unwrap(), num!(3));
    }

    #[test]
    fn test_projection_collapse() {
        let v = Value::read_data_property(dval!(Pair, num!(1), num!(2)), 1);
        assert_eq!(simplify(v).unwrap(), num!(2));

        let v = Value::read_record_property(rec! { a: num!(5) }, "a");
        assert_eq!(simplify(v).unwrap(), num!(5));
    }

    #[test]
    fn test_projection_residue_survives() {
        let v = Value::read_data_property(fvar!(opaque), 0);
        assert_eq!(
            simplify(v).unwrap(),
            Value::read_data_property(fvar!(opaque), 0)
        );
    }

    #[test]
    fn test_pattern_match_first_wins() {
        let v = Value::pattern_match(
            num!(2),
            vec![
                PatternCase::new(num!(1), Value::string("one")),
                PatternCase::new(num!(2), Value::string("two")),
                PatternCase::new(fvar!(other), Value::string("many")),
            ],
        );
        assert_eq!(simplify(v).unwrap(), Value::string("two"));
    }

    #[test]
    fn test_pattern_match_waits_for_concrete_scrutinee() {
        let v = Value::pattern_match(
            fvar!(x),
            vec![PatternCase::new(num!(1), Value::string("one"))],
        );
        let s = simplify(v.clone()).unwrap();
        assert_eq!(s, v);
    }

    #[test]
    fn test_pattern_binds_through_destructure() {
        // (Pair l r -> l) applied to Pair 1 2
        let f = Value::function(dval!(Pair, fvar!(l), fvar!(r)), fvar!(l));
        let v = Value::application(f, dval!(Pair, num!(1), num!(2)));
        assert_eq!(simplify(v).unwrap(), num!(1));
    }

    #[test]
    fn test_explicit_argument_commutes_past_implicit_layer() {
        // (implicit (Color color) -> color -> 5) applied to Red, then to the
        // resolved implicit Color Red
        let go = Value::implicit_function(
            dval!(Color, fvar!(color)),
            Value::function(fvar!(color), num!(5)),
        );
        let v = Value::application(
            Value::application(go, dval!(Red)),
            dval!(Color, dval!(Red)),
        );
        assert_eq!(simplify(v).unwrap(), num!(5));
    }

    #[test]
    fn test_implicit_argument_fills_layer_directly() {
        let f = Value::implicit_function(dval!(Color, fvar!(c)), fvar!(c));
        let v = Value::application(f, dval!(Color, dval!(Red)));
        assert_eq!(simplify(v).unwrap(), dval!(Red));
    }

    #[test]
    fn test_evaluate_literals_and_identifiers() {
        let scope = Scope::new().extend(ScopeBinding::new(
            "x",
            num!(9),
            Scope::new(),
            None,
        ));
        assert_eq!(
            evaluate_expression(&scope, &Expression::number(1.0)).unwrap(),
            Some(num!(1))
        );
        assert_eq!(
            evaluate_expression(&scope, &Expression::identifier("x")).unwrap(),
            Some(num!(9))
        );
        assert_eq!(
            evaluate_expression(&scope, &Expression::identifier("missing")).unwrap(),
            None
        );
    }

    #[test]
    fn test_evaluate_binding_and_application() {
        // let id = x -> x in id 41
        let expr = Expression::binding(
            "id",
            Expression::function(Expression::identifier("x"), Expression::identifier("x")),
            Expression::application(Expression::identifier("id"), Expression::number(41.0)),
        );
        assert_eq!(
            evaluate_expression(&Scope::new(), &expr).unwrap(),
            Some(num!(41))
        );
    }

    #[test]
    fn test_evaluate_defining_expression_uses_definition_scope() {
        // let a = 1 in let a = 2 in let f = (x -> a) in f 0 — the `a` in f's
        // body is the innermost at f's definition, i.e. 2
        let expr = Expression::binding(
            "a",
            Expression::number(1.0),
            Expression::binding(
                "a",
                Expression::number(2.0),
                Expression::binding(
                    "f",
                    Expression::function(
                        Expression::identifier("x"),
                        Expression::identifier("a"),
                    ),
                    Expression::application(Expression::identifier("f"), Expression::number(0.0)),
                ),
            ),
        );
        assert_eq!(
            evaluate_expression(&Scope::new(), &expr).unwrap(),
            Some(num!(2))
        );
    }

    #[test]
    fn test_evaluate_data_pattern_match() {
        // match (Just 5) | Just x = x | None = 0
        let expr = Expression::pattern_match(
            Expression::data("Just", vec![Expression::number(5.0)]),
            vec![
                (
                    Expression::data("Just", vec![Expression::identifier("x")]),
                    Expression::identifier("x"),
                ),
                (Expression::data("None", vec![]), Expression::number(0.0)),
            ],
        );
        assert_eq!(
            evaluate_expression(&Scope::new(), &expr).unwrap(),
            Some(num!(5))
        );
    }

    #[test]
    fn test_native_does_not_evaluate() {
        let expr = crate::ast::Expression::new(crate::ast::ExprKind::Native(Default::default()));
        assert_eq!(evaluate_expression(&Scope::new(), &expr).unwrap(), None);
    }
}
