use std::collections::BTreeMap;

use crate::ast::{ExprKind, Expression, MatchCase, Node};
use crate::errors::MicaResult;

use super::eval::simplify;
use super::implicits::{
    extract_implicit_parameters, implementation_expression, partition_unrelated_values,
    resolve_implicits, search_implicits, wrap_implicit_parameters, ImplicitSearch,
    AMBIGUOUS_MESSAGE, NO_MATCH_MESSAGE,
};
use super::scope::{Scope, ScopeBinding};
use super::state::NameFactory;
use super::subst::ApplyReplacements;
use super::unify::{converge, remove_implicit_parameters};
use super::value::Value;
use super::Message;

/// What type checking attaches to every node: the node's type with its
/// implicit prefix intact, the same type with leading implicits stripped,
/// and the scope the node was checked in.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    pub explicit_ty: Value,
    pub implicit_ty: Value,
    pub scope: Scope,
}

impl TypeInfo {
    fn new(implicit_ty: Value, scope: Scope) -> TypeInfo {
        let explicit_ty = remove_implicit_parameters(&implicit_ty).clone();
        TypeInfo {
            explicit_ty,
            implicit_ty,
            scope,
        }
    }
}

pub type TypedExpression = Node<TypeInfo>;

/// Walks the AST bottom-up, assigning every node a `TypeInfo`, converging
/// function applications, and resolving implicit parameters. Diagnosable
/// errors are collected as messages and checking continues with a fresh
/// free variable standing in for the failed type, so one run surfaces every
/// error it can.
pub struct TypeChecker {
    names: NameFactory,
    messages: Vec<Message>,
}

/// The single entry point collaborators need: check an expression, get back
/// the diagnostics and the typed tree.
pub fn type_check(expr: &Expression) -> MicaResult<(Vec<Message>, TypedExpression)> {
    let mut checker = TypeChecker::new();
    let typed = checker.type_expression(&Scope::new(), expr)?;
    log::debug!(
        "type checked: {} ({} message(s))",
        typed.meta.implicit_ty,
        checker.messages.len()
    );
    Ok((checker.messages, typed))
}

impl TypeChecker {
    pub fn new() -> TypeChecker {
        TypeChecker {
            names: NameFactory::new("$v"),
            messages: vec![],
        }
    }

    fn fresh(&mut self) -> Value {
        Value::FreeVariable(self.names.next())
    }

    /// Identifiers in a parameter pattern that are not already bound become
    /// scope bindings typed as fresh free variables; the uniqueness of the
    /// generated names is what keeps unrelated variables from unifying.
    fn bind_pattern(&mut self, scope: &Scope, pattern: &Expression) -> Scope {
        let mut bound = vec![];
        let mut seen = vec![];
        for name in pattern.identifiers() {
            if !scope.contains(name) && !seen.contains(&name) {
                seen.push(name);
                bound.push(ScopeBinding::new(name, self.fresh(), scope.clone(), None));
            }
        }
        scope.extend_many(bound)
    }

    pub fn type_expression(
        &mut self,
        scope: &Scope,
        expr: &Expression,
    ) -> MicaResult<TypedExpression> {
        Ok(match &expr.kind {
            ExprKind::Identifier(name) => {
                let ty = match scope.find(name) {
                    Some(binding) => binding.ty.clone(),
                    _ => {
                        self.messages
                            .push(format!("Could not find `{}` in scope", name));
                        self.fresh()
                    }
                };
                Node {
                    kind: ExprKind::Identifier(name.clone()),
                    meta: TypeInfo::new(ty, scope.clone()),
                }
            }
            ExprKind::BooleanLiteral(b) => Node {
                kind: ExprKind::BooleanLiteral(*b),
                meta: TypeInfo::new(Value::boolean(*b), scope.clone()),
            },
            ExprKind::NumberLiteral(n) => Node {
                kind: ExprKind::NumberLiteral(*n),
                meta: TypeInfo::new(Value::number(*n), scope.clone()),
            },
            ExprKind::StringLiteral(s) => Node {
                kind: ExprKind::StringLiteral(s.clone()),
                meta: TypeInfo::new(Value::string(s), scope.clone()),
            },
            ExprKind::SymbolLiteral(s) => Node {
                kind: ExprKind::SymbolLiteral(s.clone()),
                meta: TypeInfo::new(Value::symbol(s), scope.clone()),
            },
            ExprKind::Function(parameter, body) => {
                self.type_function(scope, parameter, body, false)?
            }
            ExprKind::ImplicitFunction(parameter, body) => {
                self.type_function(scope, parameter, body, true)?
            }
            ExprKind::Application(callee, parameter) => {
                self.type_application(scope, callee, parameter)?
            }
            ExprKind::Binding(name, value, body) => {
                if scope.contains(name) {
                    self.messages
                        .push(format!("A binding named `{}` already exists in scope", name));
                }
                let value_t = self.type_expression(scope, value)?;
                let resolved =
                    resolve_implicits(scope, (**value).clone(), &value_t.meta.implicit_ty)?;
                self.messages.extend(resolved.messages);
                let inner = scope.extend(ScopeBinding::new(
                    name,
                    resolved.ty,
                    scope.clone(),
                    Some(resolved.expression),
                ));
                let body_t = self.type_expression(&inner, body)?;
                let meta = TypeInfo::new(body_t.meta.implicit_ty.clone(), scope.clone());
                Node {
                    kind: ExprKind::Binding(name.clone(), Box::new(value_t), Box::new(body_t)),
                    meta,
                }
            }
            ExprKind::Dual(left, right) => {
                let left_t = self.type_expression(scope, left)?;
                let right_t = self.type_expression(scope, right)?;
                let ty = Value::dual(
                    left_t.meta.explicit_ty.clone(),
                    right_t.meta.explicit_ty.clone(),
                );
                Node {
                    kind: ExprKind::Dual(Box::new(left_t), Box::new(right_t)),
                    meta: TypeInfo::new(ty, scope.clone()),
                }
            }
            ExprKind::Record(properties) => {
                let mut typed_props = Vec::with_capacity(properties.len());
                let mut prop_tys = BTreeMap::new();
                for (name, value) in properties {
                    let value_t = self.type_expression(scope, value)?;
                    prop_tys.insert(name.clone(), value_t.meta.explicit_ty.clone());
                    typed_props.push((name.clone(), value_t));
                }
                Node {
                    kind: ExprKind::Record(typed_props),
                    meta: TypeInfo::new(Value::Record(prop_tys), scope.clone()),
                }
            }
            ExprKind::DataInstantiation(name, parameters) => {
                let mut typed_params = Vec::with_capacity(parameters.len());
                let mut param_tys = Vec::with_capacity(parameters.len());
                for p in parameters {
                    let p_t = self.type_expression(scope, p)?;
                    param_tys.push(p_t.meta.explicit_ty.clone());
                    typed_params.push(p_t);
                }
                Node {
                    kind: ExprKind::DataInstantiation(name.clone(), typed_params),
                    meta: TypeInfo::new(Value::data_named(name, param_tys), scope.clone()),
                }
            }
            ExprKind::ReadRecordProperty(base, name) => {
                let base_t = self.type_expression(scope, base)?;
                let ty = match &base_t.meta.explicit_ty {
                    Value::Record(props) => match props.get(name) {
                        Some(v) => v.clone(),
                        _ => {
                            self.messages.push(format!(
                                "Record does not have a property named `{}`",
                                name
                            ));
                            self.fresh()
                        }
                    },
                    base_ty => simplify(Value::read_record_property(base_ty.clone(), name))?,
                };
                Node {
                    kind: ExprKind::ReadRecordProperty(Box::new(base_t), name.clone()),
                    meta: TypeInfo::new(ty, scope.clone()),
                }
            }
            ExprKind::ReadDataProperty(base, index) => {
                let base_t = self.type_expression(scope, base)?;
                let ty = match &base_t.meta.explicit_ty {
                    Value::Data(_, params) => match params.get(*index) {
                        Some(v) => v.clone(),
                        _ => {
                            self.messages.push(format!(
                                "Data value does not have a parameter at index {}",
                                index
                            ));
                            self.fresh()
                        }
                    },
                    base_ty => simplify(Value::read_data_property(base_ty.clone(), *index))?,
                };
                Node {
                    kind: ExprKind::ReadDataProperty(Box::new(base_t), *index),
                    meta: TypeInfo::new(ty, scope.clone()),
                }
            }
            ExprKind::PatternMatch(value, cases) => {
                let value_t = self.type_expression(scope, value)?;
                let mut result_ty: Option<Value> = None;
                let mut typed_cases = Vec::with_capacity(cases.len());
                for case in cases {
                    let case_scope = self.bind_pattern(scope, &case.test);
                    let test_t = self.type_expression(&case_scope, &case.test)?;
                    let repls = match converge(
                        &case_scope,
                        &test_t.meta.explicit_ty,
                        &value_t.meta.explicit_ty,
                    ) {
                        Some(repls) => repls,
                        _ => {
                            self.messages.push(format!(
                                "Pattern `{}` can never match `{}`",
                                test_t.meta.explicit_ty, value_t.meta.explicit_ty
                            ));
                            Default::default()
                        }
                    };
                    let case_value_t = self.type_expression(&case_scope, &case.value)?;
                    let case_ty = case_value_t
                        .meta
                        .explicit_ty
                        .clone()
                        .apply_replacements(&repls)?;
                    match &result_ty {
                        Some(prev) => {
                            if converge(scope, prev, &case_ty).is_none() {
                                self.messages.push(format!(
                                    "Pattern match branches `{}` and `{}` do not converge",
                                    prev, case_ty
                                ));
                            }
                        }
                        _ => result_ty = Some(case_ty),
                    }
                    typed_cases.push(MatchCase {
                        test: test_t,
                        value: case_value_t,
                    });
                }
                let ty = match result_ty {
                    Some(ty) => ty,
                    _ => self.fresh(),
                };
                Node {
                    kind: ExprKind::PatternMatch(Box::new(value_t), typed_cases),
                    meta: TypeInfo::new(ty, scope.clone()),
                }
            }
            ExprKind::Native(data) => {
                let ty = self.fresh();
                Node {
                    kind: ExprKind::Native(data.clone()),
                    meta: TypeInfo::new(ty, scope.clone()),
                }
            }
        })
    }

    fn type_function(
        &mut self,
        scope: &Scope,
        parameter: &Expression,
        body: &Expression,
        implicit: bool,
    ) -> MicaResult<TypedExpression> {
        let inner = self.bind_pattern(scope, parameter);
        let param_t = self.type_expression(&inner, parameter)?;
        let body_t = self.type_expression(&inner, body)?;
        let param_ty = param_t.meta.explicit_ty.clone();
        let body_ty = body_t.meta.implicit_ty.clone();
        let (ty, kind) = if implicit {
            (
                Value::implicit_function(param_ty, body_ty),
                ExprKind::ImplicitFunction(Box::new(param_t), Box::new(body_t)),
            )
        } else {
            (
                Value::function(param_ty, body_ty),
                ExprKind::Function(Box::new(param_t), Box::new(body_t)),
            )
        };
        Ok(Node {
            kind,
            meta: TypeInfo::new(ty, scope.clone()),
        })
    }

    fn type_application(
        &mut self,
        scope: &Scope,
        callee: &Expression,
        parameter: &Expression,
    ) -> MicaResult<TypedExpression> {
        let callee_t = self.type_expression(scope, callee)?;
        let param_t = self.type_expression(scope, parameter)?;

        let (implicits, explicit) = extract_implicit_parameters(&callee_t.meta.implicit_ty);
        let arg_ty = param_t.meta.explicit_ty.clone();

        // When the callee's type is already a function, converge its
        // parameter with the argument and substitute into the body directly;
        // the result-variable shape below only sees callees whose function
        // structure is not yet known.
        let outcome = match &explicit {
            Value::Function(p, b) => {
                converge(scope, p, &arg_ty).map(|repls| ((**b).clone(), repls))
            }
            callee_ty => {
                let result_var = self.names.next();
                let shape = Value::function(arg_ty.clone(), Value::free_variable(&result_var));
                converge(scope, callee_ty, &shape)
                    .map(|repls| (Value::free_variable(result_var), repls))
            }
        };

        let mut node = Node {
            kind: ExprKind::Application(Box::new(callee_t), Box::new(param_t)),
            // placeholder; the real type is attached below
            meta: TypeInfo::new(Value::void(), scope.clone()),
        };

        let ty = match outcome {
            Some((raw_result, repls)) => {
                let result = simplify(raw_result.apply_replacements(&repls)?)?;
                let implicits = implicits.apply_replacements(&repls)?;
                let (related, unrelated) = partition_unrelated_values(implicits, &result);
                if unrelated.is_empty() {
                    wrap_implicit_parameters(related, result)
                } else {
                    match search_implicits(scope, &unrelated)? {
                        ImplicitSearch::Resolved(combination) => {
                            // the unwrapped node keeps its unconsumed
                            // implicit layers; the supplied arguments wrap it
                            let unconsumed = wrap_implicit_parameters(
                                related.iter().cloned().chain(unrelated.iter().cloned()),
                                result.clone(),
                            );
                            node.meta = TypeInfo::new(unconsumed, scope.clone());
                            for implementation in &combination {
                                let arg = implementation_expression(implementation)?;
                                let arg_t = self.type_expression(scope, &arg)?;
                                let meta = node.meta.clone();
                                node = Node {
                                    kind: ExprKind::Application(Box::new(node), Box::new(arg_t)),
                                    meta,
                                };
                            }
                            wrap_implicit_parameters(related, result)
                        }
                        ImplicitSearch::NoMatch => {
                            self.messages.push(str!(NO_MATCH_MESSAGE));
                            wrap_implicit_parameters(
                                related.into_iter().chain(unrelated),
                                result,
                            )
                        }
                        ImplicitSearch::Ambiguous(n) => {
                            log::debug!("{} implicit combinations survived", n);
                            self.messages.push(str!(AMBIGUOUS_MESSAGE));
                            wrap_implicit_parameters(
                                related.into_iter().chain(unrelated),
                                result,
                            )
                        }
                    }
                }
            }
            _ => {
                self.messages.push(format!(
                    "Could not apply `{}` to `{}`",
                    explicit, arg_ty
                ));
                self.fresh()
            }
        };

        node.meta = TypeInfo::new(ty, scope.clone());
        Ok(node)
    }
}
