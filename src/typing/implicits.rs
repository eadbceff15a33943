use std::collections::HashSet;

use itertools::Itertools;
use lazy_static::lazy_static;

use crate::ast::Expression;
use crate::errors::MicaResult;

use super::eval::simplify;
use super::scope::Scope;
use super::subst::{FreeVariables, Replacements};
use super::unify::{can_satisfy_shape, converge};
use super::value::Value;
use super::Message;

/// Name reported for implementations satisfied by the built-in literal
/// rules rather than a user binding.
pub const BUILT_IN: &str = "BUILT_IN";

lazy_static! {
    static ref BUILT_IN_DATA: HashSet<&'static str> =
        ["Integer", "Float", "String"].iter().cloned().collect();
}

/// A candidate implementation for one implicit parameter shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Implementation {
    /// The shape is satisfied by a built-in literal rule; the carried value
    /// is the shape itself.
    BuiltIn(Value),
    /// A scope binding: name and its evaluated type.
    Binding(String, Value),
}

impl Implementation {
    pub fn name(&self) -> &str {
        match self {
            Implementation::BuiltIn(_) => BUILT_IN,
            Implementation::Binding(name, _) => name,
        }
    }

    pub fn ty(&self) -> &Value {
        match self {
            Implementation::BuiltIn(shape) => shape,
            Implementation::Binding(_, ty) => ty,
        }
    }
}

/// Peel the leading run of implicit layers off `ty`, returning the peeled
/// parameter shapes in order and the residual explicit type.
pub fn extract_implicit_parameters(ty: &Value) -> (Vec<Value>, Value) {
    let mut implicits = vec![];
    let mut v = ty;
    while let Value::ImplicitFunction(parameter, body) = v {
        implicits.push((**parameter).clone());
        v = body;
    }
    (implicits, v.clone())
}

/// Re-wrap implicit parameter shapes around an explicit type, innermost
/// last, restoring the order `extract_implicit_parameters` peeled them in.
pub fn wrap_implicit_parameters<I>(implicits: I, explicit: Value) -> Value
where
    I: IntoIterator<Item = Value>,
    I::IntoIter: DoubleEndedIterator,
{
    implicits
        .into_iter()
        .rev()
        .fold(explicit, |body, parameter| {
            Value::implicit_function(parameter, body)
        })
}

/// Split `implicits` into those transitively sharing a free variable with
/// `related_to` and the rest. The related set grows by fixpoint: start from
/// the variables of `related_to`, then keep pulling in any implicit whose
/// variables intersect the growing set.
pub fn partition_unrelated_values(
    implicits: Vec<Value>,
    related_to: &Value,
) -> (Vec<Value>, Vec<Value>) {
    let mut related_names: HashSet<String> = related_to
        .free_variables()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut related = vec![];
    let mut remaining = implicits;
    loop {
        let (newly, rest): (Vec<Value>, Vec<Value>) = remaining.into_iter().partition(|v| {
            v.free_variables()
                .iter()
                .any(|name| related_names.contains(*name))
        });
        remaining = rest;
        if newly.is_empty() {
            break;
        }
        for v in &newly {
            related_names.extend(v.free_variables().into_iter().map(str::to_string));
        }
        related.extend(newly);
    }

    (related, remaining)
}

fn built_in_implementation(shape: &Value) -> Option<Implementation> {
    if let Value::Data(name, parameters) = shape {
        if let (Value::SymbolLiteral(n), [literal]) = (&**name, &parameters[..]) {
            if !BUILT_IN_DATA.contains(n.as_str()) {
                return None;
            }
            let matches = match (n.as_str(), literal) {
                ("Integer", Value::NumberLiteral(_)) => true,
                ("Float", Value::NumberLiteral(_)) => true,
                ("String", Value::StringLiteral(_)) => true,
                _ => false,
            };
            if matches {
                return Some(Implementation::BuiltIn(shape.clone()));
            }
        }
    }
    None
}

/// All implementations in scope that could satisfy `shape`. The built-in
/// literal rules take precedence and skip the scope search entirely.
pub fn find_matching_implementations(
    scope: &Scope,
    shape: &Value,
) -> MicaResult<Vec<Implementation>> {
    if let Some(built_in) = built_in_implementation(shape) {
        return Ok(vec![built_in]);
    }

    let mut implementations = vec![];
    for binding in scope.iter() {
        let ty = simplify(binding.ty.clone())?;
        if can_satisfy_shape(scope, shape, &ty).is_some() {
            log::debug!("implicit candidate for {}: {} : {}", shape, binding.name, ty);
            implementations.push(Implementation::Binding(binding.name.clone(), ty));
        }
    }
    Ok(implementations)
}

pub const NO_MATCH_MESSAGE: &str = "Could not find a valid set of replacements for implicits";
pub const AMBIGUOUS_MESSAGE: &str = "Found more than one valid set of replacements for implicits";

/// A combination is valid when every shape is satisfied by its chosen
/// candidate and the replacement sets produced by those matches agree: two
/// candidates binding the same free variable must bind it to values that
/// themselves converge.
fn is_valid_combination(
    scope: &Scope,
    shapes: &[Value],
    combination: &[Implementation],
) -> bool {
    let mut merged = Replacements::new();
    for (shape, implementation) in shapes.iter().zip(combination.iter()) {
        let repls = match can_satisfy_shape(scope, shape, implementation.ty()) {
            Some(repls) => repls,
            _ => return false,
        };
        for repl in repls {
            match merged.find(&repl.from) {
                Some(existing) => {
                    if converge(&Scope::new(), &existing.to, &repl.to).is_none() {
                        log::debug!(
                            "conflicting implicit replacements for `{}`: {} vs {}",
                            repl.from,
                            existing.to,
                            repl.to
                        );
                        return false;
                    }
                }
                _ => merged.push(repl),
            }
        }
    }
    true
}

/// Outcome of searching scope for one candidate per implicit shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ImplicitSearch {
    /// Exactly one combination survived.
    Resolved(Vec<Implementation>),
    /// More than one combination survived; nothing may be picked.
    Ambiguous(usize),
    /// No combination survived.
    NoMatch,
}

/// Run the candidate search for a list of implicit shapes: per-shape
/// candidate lists, their cartesian product, and the validity filter. The
/// outcome is deterministic because candidate order follows scope order.
pub fn search_implicits(scope: &Scope, shapes: &[Value]) -> MicaResult<ImplicitSearch> {
    let mut candidates = Vec::with_capacity(shapes.len());
    for shape in shapes {
        candidates.push(find_matching_implementations(scope, shape)?);
    }

    let combinations = candidates
        .iter()
        .map(|c| c.iter())
        .multi_cartesian_product()
        .map(|combo| combo.into_iter().cloned().collect::<Vec<_>>())
        .filter(|combo| is_valid_combination(scope, shapes, combo))
        .collect::<Vec<_>>();

    Ok(match combinations.len() {
        0 => ImplicitSearch::NoMatch,
        1 => ImplicitSearch::Resolved(combinations.into_iter().next().unwrap()),
        n => ImplicitSearch::Ambiguous(n),
    })
}

/// Outcome of resolving the implicits of one let-binding.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImplicits {
    pub messages: Vec<Message>,
    pub expression: Expression,
    pub ty: Value,
}

/// Resolve the implicit parameters of a typed node with declared type `ty`.
/// Implicits related to the explicit type are re-wrapped so an outer call
/// site can supply them once its variables are known; unrelated implicits
/// are searched for immediately, and the node is only rewritten when exactly
/// one combination of candidates survives.
pub fn resolve_implicits(
    scope: &Scope,
    expression: Expression,
    ty: &Value,
) -> MicaResult<ResolvedImplicits> {
    let (implicits, explicit) = extract_implicit_parameters(ty);
    if implicits.is_empty() {
        return Ok(ResolvedImplicits {
            messages: vec![],
            expression,
            ty: ty.clone(),
        });
    }

    let (related, unrelated) = partition_unrelated_values(implicits, &explicit);
    if unrelated.is_empty() {
        return Ok(ResolvedImplicits {
            messages: vec![],
            expression,
            ty: wrap_implicit_parameters(related, explicit),
        });
    }

    match search_implicits(scope, &unrelated)? {
        ImplicitSearch::NoMatch => {
            log::debug!("no implicit combination survived for {}", ty);
            Ok(ResolvedImplicits {
                messages: vec![str!(NO_MATCH_MESSAGE)],
                expression,
                ty: ty.clone(),
            })
        }
        ImplicitSearch::Resolved(combination) => {
            let mut expression = expression;
            for implementation in &combination {
                let argument = implementation_expression(implementation)?;
                expression = Expression::application(expression, argument);
            }
            log::debug!(
                "resolved implicits: {}",
                crate::utils::map_join(&combination, ", ", |i| str!(i.name()))
            );
            Ok(ResolvedImplicits {
                messages: vec![],
                expression,
                ty: wrap_implicit_parameters(related, explicit),
            })
        }
        ImplicitSearch::Ambiguous(n) => {
            log::debug!("{} implicit combinations survived for {}", n, ty);
            Ok(ResolvedImplicits {
                messages: vec![str!(AMBIGUOUS_MESSAGE)],
                expression,
                ty: ty.clone(),
            })
        }
    }
}

/// Rebuild an expression that evaluates to the given implementation, to be
/// supplied as an implicit argument.
pub fn implementation_expression(implementation: &Implementation) -> MicaResult<Expression> {
    match implementation {
        Implementation::Binding(name, _) => Ok(Expression::identifier(name)),
        Implementation::BuiltIn(shape) => expression_from_value(shape),
    }
}

fn expression_from_value(value: &Value) -> MicaResult<Expression> {
    Ok(match value {
        Value::BooleanLiteral(b) => Expression::boolean(*b),
        Value::NumberLiteral(n) => Expression::number(*n),
        Value::StringLiteral(s) => Expression::string(s),
        Value::SymbolLiteral(s) => Expression::symbol(s),
        Value::FreeVariable(name) => Expression::identifier(name),
        Value::Data(name, parameters) => {
            let name = match &**name {
                Value::SymbolLiteral(s) => s.clone(),
                v => {
                    return Err(crate::errors::MicaError::internal(format!(
                        "cannot rebuild an expression from data named {}",
                        v
                    )))
                }
            };
            Expression::data(
                name,
                parameters
                    .iter()
                    .map(expression_from_value)
                    .collect::<MicaResult<_>>()?,
            )
        }
        Value::Record(properties) => Expression::record(
            properties
                .iter()
                .map(|(k, v)| Ok((k.clone(), expression_from_value(v)?)))
                .collect::<MicaResult<_>>()?,
        ),
        Value::Dual(left, right) => {
            Expression::dual(expression_from_value(left)?, expression_from_value(right)?)
        }
        v => {
            return Err(crate::errors::MicaError::internal(format!(
                "cannot rebuild an expression from {}",
                v
            )))
        }
    })
}

#[cfg(test)]
mod implicits_tests {
    use super::{
        extract_implicit_parameters, find_matching_implementations, partition_unrelated_values,
        resolve_implicits, Implementation, BUILT_IN,
    };
    use crate::ast::Expression;
    use crate::typing::scope::{Scope, ScopeBinding};
    use crate::typing::value::Value;

    #[test]
    fn test_extract_and_rewrap() {
        let ty = Value::implicit_function(
            dval!(Show, fvar!(a)),
            Value::implicit_function(dval!(Eq, fvar!(b)), Value::function(fvar!(a), fvar!(b))),
        );
        let (implicits, explicit) = extract_implicit_parameters(&ty);
        assert_eq!(
            implicits,
            vec![dval!(Show, fvar!(a)), dval!(Eq, fvar!(b))]
        );
        assert_eq!(explicit, Value::function(fvar!(a), fvar!(b)));

        let rewrapped = super::wrap_implicit_parameters(implicits, explicit);
        assert_eq!(rewrapped, ty);
    }

    #[test]
    fn test_partition_fixpoint() {
        // related_to mentions `a`; Show a is related directly, Eq b becomes
        // related transitively through Pair a b; Ord c stays unrelated
        let implicits = vec![
            dval!(Ord, fvar!(c)),
            dval!(Pair, fvar!(a), fvar!(b)),
            dval!(Eq, fvar!(b)),
        ];
        let related_to = Value::function(fvar!(a), num!(1));
        let (related, unrelated) = partition_unrelated_values(implicits, &related_to);
        assert_eq!(
            related,
            vec![dval!(Pair, fvar!(a), fvar!(b)), dval!(Eq, fvar!(b))]
        );
        assert_eq!(unrelated, vec![dval!(Ord, fvar!(c))]);
    }

    #[test]
    fn test_built_in_integer() {
        let shape = dval!(Integer, num!(2));
        let found = find_matching_implementations(&Scope::new(), &shape).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), BUILT_IN);
        assert!(matches!(found[0], Implementation::BuiltIn(_)));
    }

    #[test]
    fn test_built_in_string_and_float() {
        let shape = dval!(String, Value::string("hi"));
        assert_eq!(
            find_matching_implementations(&Scope::new(), &shape)
                .unwrap()
                .len(),
            1
        );
        let shape = dval!(Float, num!(1.5));
        assert_eq!(
            find_matching_implementations(&Scope::new(), &shape)
                .unwrap()
                .len(),
            1
        );
        // kind mismatch is not satisfiable
        let shape = dval!(Integer, Value::string("nope"));
        assert!(find_matching_implementations(&Scope::new(), &shape)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_scope_search() {
        let scope = Scope::new().extend(ScopeBinding::new(
            "colorRedImpl",
            dval!(Color, dval!(Red)),
            Scope::new(),
            None,
        ));
        let shape = dval!(Color, fvar!(c));
        let found = find_matching_implementations(&scope, &shape).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "colorRedImpl");
    }

    #[test]
    fn test_resolution_wraps_single_candidate() {
        let scope = Scope::new().extend(ScopeBinding::new(
            "colorRedImpl",
            dval!(Color, dval!(Red)),
            Scope::new(),
            None,
        ));
        let ty = Value::implicit_function(dval!(Color, fvar!(c)), num!(5));
        let resolved =
            resolve_implicits(&scope, Expression::identifier("go"), &ty).unwrap();
        assert!(resolved.messages.is_empty());
        assert_eq!(
            resolved.expression,
            Expression::application(
                Expression::identifier("go"),
                Expression::identifier("colorRedImpl"),
            )
        );
        assert_eq!(resolved.ty, num!(5));
    }

    #[test]
    fn test_resolution_ambiguous() {
        let scope = Scope::new()
            .extend(ScopeBinding::new(
                "redImpl",
                dval!(Color, dval!(Red)),
                Scope::new(),
                None,
            ))
            .extend(ScopeBinding::new(
                "blueImpl",
                dval!(Color, dval!(Blue)),
                Scope::new(),
                None,
            ));
        let ty = Value::implicit_function(dval!(Color, fvar!(c)), num!(5));
        let resolved =
            resolve_implicits(&scope, Expression::identifier("go"), &ty).unwrap();
        assert_eq!(resolved.messages.len(), 1);
        assert_eq!(
            resolved.messages[0],
            "Found more than one valid set of replacements for implicits"
        );
        // nothing was picked
        assert_eq!(resolved.expression, Expression::identifier("go"));
        assert_eq!(resolved.ty, ty);
    }

    #[test]
    fn test_resolution_unresolved() {
        let ty = Value::implicit_function(dval!(Color, fvar!(c)), num!(5));
        let resolved =
            resolve_implicits(&Scope::new(), Expression::identifier("go"), &ty).unwrap();
        assert_eq!(
            resolved.messages,
            vec!["Could not find a valid set of replacements for implicits".to_string()]
        );
        assert_eq!(resolved.ty, ty);
    }

    #[test]
    fn test_related_implicits_are_rewrapped_not_resolved() {
        let ty = Value::implicit_function(
            dval!(Color, fvar!(c)),
            Value::function(fvar!(c), num!(5)),
        );
        let resolved =
            resolve_implicits(&Scope::new(), Expression::identifier("go"), &ty).unwrap();
        assert!(resolved.messages.is_empty());
        assert_eq!(resolved.ty, ty);
        assert_eq!(resolved.expression, Expression::identifier("go"));
    }

    #[test]
    fn test_conflicting_combination_is_rejected() {
        // both shapes mention the same variable but the only candidates
        // bind it to different concrete colors
        let scope = Scope::new()
            .extend(ScopeBinding::new(
                "redImpl",
                dval!(Color, dval!(Red)),
                Scope::new(),
                None,
            ))
            .extend(ScopeBinding::new(
                "blueShade",
                dval!(Shade, dval!(Blue)),
                Scope::new(),
                None,
            ));
        let ty = Value::implicit_function(
            dval!(Color, fvar!(c)),
            Value::implicit_function(dval!(Shade, fvar!(c)), num!(5)),
        );
        let resolved =
            resolve_implicits(&scope, Expression::identifier("go"), &ty).unwrap();
        assert_eq!(
            resolved.messages,
            vec!["Could not find a valid set of replacements for implicits".to_string()]
        );
    }
}
