use super::scope::Scope;
use super::subst::{FreeVariables, Replacements};
use super::value::Value;

/// Skip past the leading run of implicit-function layers, returning the first
/// non-implicit layer.
pub fn remove_implicit_parameters(value: &Value) -> &Value {
    let mut v = value;
    while let Value::ImplicitFunction(_, body) = v {
        v = body;
    }
    v
}

/// Attempt to make `shape` and `child` structurally identical by finding
/// substitutions for the free variables appearing on either side. Matching is
/// all-or-nothing: `None` means the two values cannot be made to agree, and
/// no partial replacement list ever escapes a failed match.
pub fn converge(scope: &Scope, shape: &Value, child: &Value) -> Option<Replacements> {
    log::trace!("converge: {} ~ {}", shape, child);

    // A dual binding unifies with the other side only if both of its views
    // do; the match is conjunctive and the replacements accumulate.
    if let Value::Dual(left, right) = shape {
        let a = converge(scope, left, child)?;
        let b = converge(scope, right, child)?;
        return Some(a.concat(b));
    }
    if let Value::Dual(left, right) = child {
        let a = converge(scope, shape, left)?;
        let b = converge(scope, shape, right)?;
        return Some(a.concat(b));
    }

    if let Value::FreeVariable(name) = shape {
        return converge_free_variable(scope, name, child);
    }
    if let Value::FreeVariable(name) = child {
        return converge_free_variable(scope, name, shape);
    }

    match (shape, child) {
        (Value::BooleanLiteral(a), Value::BooleanLiteral(b)) if a == b => {
            Some(Replacements::new())
        }
        (Value::NumberLiteral(a), Value::NumberLiteral(b)) if a == b => Some(Replacements::new()),
        (Value::StringLiteral(a), Value::StringLiteral(b)) if a == b => Some(Replacements::new()),
        (Value::SymbolLiteral(a), Value::SymbolLiteral(b)) if a == b => Some(Replacements::new()),
        (Value::Record(shape_props), Value::Record(child_props)) => {
            // Every property of the shape must exist in the child; extra
            // child properties are ignored.
            let mut repls = Replacements::new();
            for (name, shape_value) in shape_props {
                let child_value = child_props.get(name)?;
                repls = repls.concat(converge(scope, shape_value, child_value)?);
            }
            Some(repls)
        }
        (Value::Data(shape_name, shape_params), Value::Data(child_name, child_params)) => {
            if shape_params.len() != child_params.len() {
                return None;
            }
            let mut repls = converge(scope, shape_name, child_name)?;
            for (s, c) in shape_params.iter().zip(child_params.iter()) {
                repls = repls.concat(converge(scope, s, c)?);
            }
            Some(repls)
        }
        (shape, child) if shape.is_function() && child.is_function() => {
            let shape = remove_implicit_parameters(shape);
            let child = remove_implicit_parameters(child);
            match (shape, child) {
                (Value::Function(sp, sb), Value::Function(cp, cb)) => {
                    let a = converge(scope, sp, cp)?;
                    let b = converge(scope, sb, cb)?;
                    Some(a.concat(b))
                }
                // Stripping exposed a non-function layer on at least one
                // side; retry from the top on the smaller values.
                (shape, child) => converge(scope, shape, child),
            }
        }
        (
            Value::Application(shape_callee, shape_param),
            Value::Application(child_callee, child_param),
        ) => {
            let a = converge(scope, shape_callee, child_callee)?;
            let b = converge(scope, shape_param, child_param)?;
            Some(a.concat(b))
        }
        // A partially-applied constructor can unify with an uncurried data
        // value: the data value's last parameter plays the application's
        // parameter, the rest its callee.
        (Value::Application(callee, param), Value::Data(name, params))
        | (Value::Data(name, params), Value::Application(callee, param)) => {
            let (last, init) = params.split_last()?;
            let a = converge(
                scope,
                callee,
                &Value::Data(name.clone(), init.to_vec()),
            )?;
            let b = converge(scope, param, last)?;
            Some(a.concat(b))
        }
        _ => {
            log::trace!("converge failed: {} !~ {}", shape, child);
            None
        }
    }
}

fn converge_free_variable(scope: &Scope, name: &str, other: &Value) -> Option<Replacements> {
    if matches!(other, Value::FreeVariable(o) if o == name) {
        return Some(Replacements::new());
    }

    // A variable that already has a concrete binding in scope stands for
    // that binding's type; a self-referential binding is treated as unbound.
    if let Some(binding) = scope.find(name) {
        if !matches!(&binding.ty, Value::FreeVariable(n) if n == name) {
            return converge(scope, &binding.ty, other);
        }
    }

    if other.free_variables().contains(name) {
        log::debug!("occurs check: `{}` would be recursive in {}", name, other);
        return None;
    }

    Some(Replacements::single(name, other.clone()))
}

/// Bind a function parameter pattern to an argument that need not be reduced
/// yet. Free variables in the pattern bind to (possibly unreduced)
/// projections of the argument instead of requiring the argument to already
/// have matching structure; positions with no binding opportunity succeed
/// with no replacements.
pub fn destructure_value(shape: &Value, value: &Value) -> Option<Replacements> {
    match shape {
        Value::FreeVariable(name) => Some(Replacements::single(name, value.clone())),
        Value::Dual(left, right) => {
            let a = destructure_value(left, value)?;
            let b = destructure_value(right, value)?;
            Some(a.concat(b))
        }
        Value::Data(_, parameters) => {
            let mut repls = Replacements::new();
            for (i, p) in parameters.iter().enumerate() {
                let projected = match value {
                    Value::Data(_, args) if args.len() == parameters.len() => args[i].clone(),
                    _ => Value::read_data_property(value.clone(), i),
                };
                repls = repls.concat(destructure_value(p, &projected)?);
            }
            Some(repls)
        }
        Value::Record(properties) => {
            let mut repls = Replacements::new();
            for (name, p) in properties {
                let projected = match value {
                    Value::Record(props) => match props.get(name) {
                        Some(v) => v.clone(),
                        _ => Value::read_record_property(value.clone(), name),
                    },
                    _ => Value::read_record_property(value.clone(), name),
                };
                repls = repls.concat(destructure_value(p, &projected)?);
            }
            Some(repls)
        }
        _ => Some(Replacements::new()),
    }
}

/// Does an existing implementation's type satisfy the requested shape,
/// without requiring the implementation to have been given every implicit
/// explicitly? Both sides are stripped of leading implicit layers first.
pub fn can_satisfy_shape(scope: &Scope, shape: &Value, child: &Value) -> Option<Replacements> {
    converge(
        scope,
        remove_implicit_parameters(shape),
        remove_implicit_parameters(child),
    )
}

#[cfg(test)]
mod unify_tests {
    use super::{can_satisfy_shape, converge, destructure_value, remove_implicit_parameters};
    use crate::typing::scope::{Scope, ScopeBinding};
    use crate::typing::value::Value;

    #[test]
    fn test_literal_equality() {
        let scope = Scope::new();
        assert_eq!(converge(&scope, &num!(2), &num!(2)), Some(repl!()));
        assert_eq!(converge(&scope, &num!(2), &num!(3)), None);
        assert_eq!(converge(&scope, &sym!(a), &sym!(a)), Some(repl!()));
        assert_eq!(converge(&scope, &sym!(a), &num!(2)), None);
    }

    #[test]
    fn test_free_variable_binds() {
        let scope = Scope::new();
        assert_eq!(
            converge(&scope, &fvar!(x), &num!(5)),
            Some(repl! { x => num!(5) })
        );
        // same variable on both sides binds nothing
        assert_eq!(converge(&scope, &fvar!(x), &fvar!(x)), Some(repl!()));
    }

    #[test]
    fn test_symmetry() {
        let scope = Scope::new();
        let a = dval!(Pair, fvar!(x), num!(2));
        let b = dval!(Pair, num!(1), fvar!(y));
        assert!(converge(&scope, &a, &b).is_some());
        assert!(converge(&scope, &b, &a).is_some());

        let c = dval!(Pair, num!(1), num!(3));
        assert!(converge(&scope, &a, &c).is_none());
        assert!(converge(&scope, &c, &a).is_none());
    }

    #[test]
    fn test_dual_binding_conjunction() {
        let scope = Scope::new();
        let shape = Value::dual(fvar!(a), dval!(Integer, num!(2)));
        let child = dval!(Integer, num!(2));
        assert_eq!(
            converge(&scope, &shape, &child),
            Some(repl! { a => dval!(Integer, num!(2)) })
        );

        // both views must agree
        let bad = Value::dual(num!(1), dval!(Integer, num!(2)));
        assert_eq!(converge(&scope, &bad, &child), None);
    }

    #[test]
    fn test_record_partial_match() {
        let scope = Scope::new();
        let shape = rec! { a: fvar!(x) };
        let child = rec! { a: num!(5), b: Value::boolean(true) };
        assert_eq!(
            converge(&scope, &shape, &child),
            Some(repl! { x => num!(5) })
        );

        let missing = rec! { b: Value::boolean(true) };
        assert_eq!(converge(&scope, &shape, &missing), None);
    }

    #[test]
    fn test_data_arity_mismatch() {
        let scope = Scope::new();
        let a = dval!(Pair, num!(1), num!(2));
        let b = dval!(Pair, num!(1));
        assert_eq!(converge(&scope, &a, &b), None);
    }

    #[test]
    fn test_application_against_data() {
        let scope = Scope::new();
        // (Pair 1) x  ~  Pair 1 2  binds x -> 2
        let app = Value::application(dval!(Pair, num!(1)), fvar!(x));
        let data = dval!(Pair, num!(1), num!(2));
        assert_eq!(
            converge(&scope, &app, &data),
            Some(repl! { x => num!(2) })
        );
    }

    #[test]
    fn test_function_strips_implicits() {
        let scope = Scope::new();
        let plain = Value::function(fvar!(a), num!(5));
        let with_implicit = Value::implicit_function(
            dval!(Color, fvar!(c)),
            Value::function(fvar!(b), num!(5)),
        );
        assert!(converge(&scope, &plain, &with_implicit).is_some());
        assert_eq!(
            remove_implicit_parameters(&with_implicit),
            &Value::function(fvar!(b), num!(5))
        );
    }

    #[test]
    fn test_occurs_check_fails() {
        let scope = Scope::new();
        let shape = fvar!(a);
        let child = dval!(F, fvar!(a));
        assert_eq!(converge(&scope, &shape, &child), None);
    }

    #[test]
    fn test_scope_bound_variable() {
        let scope = Scope::new().extend(ScopeBinding::new("v", num!(7), Scope::new(), None));
        assert!(converge(&scope, &fvar!(v), &num!(7)).is_some());
        assert!(converge(&scope, &fvar!(v), &num!(8)).is_none());
    }

    #[test]
    fn test_residue_shapes_never_match() {
        let scope = Scope::new();
        let residue = Value::read_data_property(fvar!(x), 0);
        assert_eq!(converge(&scope, &residue, &num!(1)), None);
        let pm = Value::pattern_match(fvar!(x), vec![]);
        assert_eq!(converge(&scope, &pm, &pm.clone()), None);
    }

    #[test]
    fn test_destructure_binds_projections() {
        // shape `Pair l r` against an opaque argument binds through reads
        let shape = dval!(Pair, fvar!(l), fvar!(r));
        let arg = fvar!(p);
        let repls = destructure_value(&shape, &arg).unwrap();
        assert_eq!(
            repls,
            repl! {
                l => Value::read_data_property(fvar!(p), 0),
                r => Value::read_data_property(fvar!(p), 1),
            }
        );
    }

    #[test]
    fn test_destructure_concrete_data() {
        let shape = dval!(Pair, fvar!(l), fvar!(r));
        let arg = dval!(Pair, num!(1), num!(2));
        assert_eq!(
            destructure_value(&shape, &arg),
            Some(repl! { l => num!(1), r => num!(2) })
        );
    }

    #[test]
    fn test_destructure_non_binding_shapes() {
        // function/application/literal shapes bind nothing but succeed
        assert_eq!(
            destructure_value(&Value::function(fvar!(x), num!(1)), &num!(2)),
            Some(repl!())
        );
        assert_eq!(destructure_value(&num!(3), &num!(4)), Some(repl!()));
    }

    #[test]
    fn test_can_satisfy_shape() {
        let scope = Scope::new();
        let shape = dval!(Color, fvar!(c));
        let implementation =
            Value::implicit_function(dval!(Show, fvar!(s)), dval!(Color, dval!(Red)));
        assert!(can_satisfy_shape(&scope, &shape, &implementation).is_some());
    }
}
