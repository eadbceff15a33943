use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::utils::map_join;

/// One arm of a pattern-match expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCase<M> {
    pub test: Node<M>,
    pub value: Node<M>,
}

/// An expression node, generic over the per-node metadata `M`. The parser
/// produces `Node<()>`; the type checker re-decorates the same shape with
/// `TypeInfo`, so structural walks are written once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node<M> {
    pub kind: ExprKind<M>,
    pub meta: M,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind<M> {
    Identifier(String),
    BooleanLiteral(bool),
    NumberLiteral(f64),
    StringLiteral(String),
    SymbolLiteral(String),
    /// parameter pattern, body.
    Function(Box<Node<M>>, Box<Node<M>>),
    ImplicitFunction(Box<Node<M>>, Box<Node<M>>),
    Application(Box<Node<M>>, Box<Node<M>>),
    /// `let name = value in body`.
    Binding(String, Box<Node<M>>, Box<Node<M>>),
    Dual(Box<Node<M>>, Box<Node<M>>),
    Record(Vec<(String, Node<M>)>),
    /// Instantiation of a data constructor by name.
    DataInstantiation(String, Vec<Node<M>>),
    ReadRecordProperty(Box<Node<M>>, String),
    ReadDataProperty(Box<Node<M>>, usize),
    PatternMatch(Box<Node<M>>, Vec<MatchCase<M>>),
    /// Opaque backend-specific leaf. The core never interprets the payload.
    Native(BTreeMap<String, String>),
}

/// The untyped tree consumed from the external parser.
pub type Expression = Node<()>;

impl Expression {
    pub fn new(kind: ExprKind<()>) -> Expression {
        Node { kind, meta: () }
    }

    pub fn identifier<S: ToString>(name: S) -> Expression {
        Expression::new(ExprKind::Identifier(name.to_string()))
    }

    pub fn boolean(value: bool) -> Expression {
        Expression::new(ExprKind::BooleanLiteral(value))
    }

    pub fn number(value: f64) -> Expression {
        Expression::new(ExprKind::NumberLiteral(value))
    }

    pub fn string<S: ToString>(value: S) -> Expression {
        Expression::new(ExprKind::StringLiteral(value.to_string()))
    }

    pub fn symbol<S: ToString>(name: S) -> Expression {
        Expression::new(ExprKind::SymbolLiteral(name.to_string()))
    }

    pub fn function(parameter: Expression, body: Expression) -> Expression {
        Expression::new(ExprKind::Function(Box::new(parameter), Box::new(body)))
    }

    pub fn implicit_function(parameter: Expression, body: Expression) -> Expression {
        Expression::new(ExprKind::ImplicitFunction(
            Box::new(parameter),
            Box::new(body),
        ))
    }

    pub fn application(callee: Expression, parameter: Expression) -> Expression {
        Expression::new(ExprKind::Application(Box::new(callee), Box::new(parameter)))
    }

    pub fn binding<S: ToString>(name: S, value: Expression, body: Expression) -> Expression {
        Expression::new(ExprKind::Binding(
            name.to_string(),
            Box::new(value),
            Box::new(body),
        ))
    }

    pub fn dual(left: Expression, right: Expression) -> Expression {
        Expression::new(ExprKind::Dual(Box::new(left), Box::new(right)))
    }

    pub fn record(properties: Vec<(String, Expression)>) -> Expression {
        Expression::new(ExprKind::Record(properties))
    }

    pub fn data<S: ToString>(name: S, parameters: Vec<Expression>) -> Expression {
        Expression::new(ExprKind::DataInstantiation(name.to_string(), parameters))
    }

    pub fn read_record_property<S: ToString>(base: Expression, name: S) -> Expression {
        Expression::new(ExprKind::ReadRecordProperty(
            Box::new(base),
            name.to_string(),
        ))
    }

    pub fn read_data_property(base: Expression, index: usize) -> Expression {
        Expression::new(ExprKind::ReadDataProperty(Box::new(base), index))
    }

    pub fn pattern_match(value: Expression, cases: Vec<(Expression, Expression)>) -> Expression {
        Expression::new(ExprKind::PatternMatch(
            Box::new(value),
            cases
                .into_iter()
                .map(|(test, value)| MatchCase { test, value })
                .collect(),
        ))
    }
}

impl<M> Node<M> {
    /// Re-decorate the tree with new metadata, preserving the shape. The
    /// single generic walk over immediate children; every other traversal in
    /// the crate builds on the child lists this produces.
    pub fn map_meta<N, F>(&self, f: &mut F) -> Node<N>
    where
        F: FnMut(&M) -> N,
    {
        let kind = match &self.kind {
            ExprKind::Identifier(name) => ExprKind::Identifier(name.clone()),
            ExprKind::BooleanLiteral(b) => ExprKind::BooleanLiteral(*b),
            ExprKind::NumberLiteral(n) => ExprKind::NumberLiteral(*n),
            ExprKind::StringLiteral(s) => ExprKind::StringLiteral(s.clone()),
            ExprKind::SymbolLiteral(s) => ExprKind::SymbolLiteral(s.clone()),
            ExprKind::Function(p, b) => {
                ExprKind::Function(Box::new(p.map_meta(f)), Box::new(b.map_meta(f)))
            }
            ExprKind::ImplicitFunction(p, b) => {
                ExprKind::ImplicitFunction(Box::new(p.map_meta(f)), Box::new(b.map_meta(f)))
            }
            ExprKind::Application(c, p) => {
                ExprKind::Application(Box::new(c.map_meta(f)), Box::new(p.map_meta(f)))
            }
            ExprKind::Binding(name, value, body) => ExprKind::Binding(
                name.clone(),
                Box::new(value.map_meta(f)),
                Box::new(body.map_meta(f)),
            ),
            ExprKind::Dual(l, r) => {
                ExprKind::Dual(Box::new(l.map_meta(f)), Box::new(r.map_meta(f)))
            }
            ExprKind::Record(props) => ExprKind::Record(
                props
                    .iter()
                    .map(|(name, value)| (name.clone(), value.map_meta(f)))
                    .collect(),
            ),
            ExprKind::DataInstantiation(name, parameters) => ExprKind::DataInstantiation(
                name.clone(),
                parameters.iter().map(|p| p.map_meta(f)).collect(),
            ),
            ExprKind::ReadRecordProperty(base, name) => {
                ExprKind::ReadRecordProperty(Box::new(base.map_meta(f)), name.clone())
            }
            ExprKind::ReadDataProperty(base, index) => {
                ExprKind::ReadDataProperty(Box::new(base.map_meta(f)), *index)
            }
            ExprKind::PatternMatch(value, cases) => ExprKind::PatternMatch(
                Box::new(value.map_meta(f)),
                cases
                    .iter()
                    .map(|c| MatchCase {
                        test: c.test.map_meta(f),
                        value: c.value.map_meta(f),
                    })
                    .collect(),
            ),
            ExprKind::Native(data) => ExprKind::Native(data.clone()),
        };
        let meta = f(&self.meta);
        Node { kind, meta }
    }

    /// Strip all metadata, producing the plain expression shape the
    /// evaluator consumes.
    pub fn strip(&self) -> Expression {
        self.map_meta(&mut |_| ())
    }

    /// Every identifier mentioned anywhere in this subtree, in source order.
    /// For a parameter pattern, the caller filters out names already in
    /// scope; what remains are the pattern's binding names.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut names = vec![];
        self.collect_identifiers(&mut names);
        names
    }

    fn collect_identifiers<'a>(&'a self, names: &mut Vec<&'a str>) {
        match &self.kind {
            ExprKind::Identifier(name) => names.push(name),
            ExprKind::BooleanLiteral(_)
            | ExprKind::NumberLiteral(_)
            | ExprKind::StringLiteral(_)
            | ExprKind::SymbolLiteral(_)
            | ExprKind::Native(_) => {}
            ExprKind::Function(p, b) | ExprKind::ImplicitFunction(p, b) => {
                p.collect_identifiers(names);
                b.collect_identifiers(names);
            }
            ExprKind::Application(c, p) => {
                c.collect_identifiers(names);
                p.collect_identifiers(names);
            }
            ExprKind::Binding(_, value, body) => {
                value.collect_identifiers(names);
                body.collect_identifiers(names);
            }
            ExprKind::Dual(l, r) => {
                l.collect_identifiers(names);
                r.collect_identifiers(names);
            }
            ExprKind::Record(props) => {
                for (_, value) in props {
                    value.collect_identifiers(names);
                }
            }
            ExprKind::DataInstantiation(_, parameters) => {
                for p in parameters {
                    p.collect_identifiers(names);
                }
            }
            ExprKind::ReadRecordProperty(base, _) | ExprKind::ReadDataProperty(base, _) => {
                base.collect_identifiers(names);
            }
            ExprKind::PatternMatch(value, cases) => {
                value.collect_identifiers(names);
                for c in cases {
                    c.test.collect_identifiers(names);
                    c.value.collect_identifiers(names);
                }
            }
        }
    }
}

impl<M> Display for Node<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ExprKind::Identifier(name) => write!(f, "{}", name),
            ExprKind::BooleanLiteral(b) => write!(f, "{}", b),
            ExprKind::NumberLiteral(n) => write!(f, "{}", n),
            ExprKind::StringLiteral(s) => write!(f, "{:?}", s),
            ExprKind::SymbolLiteral(s) => write!(f, ":{}", s),
            ExprKind::Function(p, b) => write!(f, "({} -> {})", p, b),
            ExprKind::ImplicitFunction(p, b) => write!(f, "(implicit {} -> {})", p, b),
            ExprKind::Application(c, p) => write!(f, "({} {})", c, p),
            ExprKind::Binding(name, value, body) => {
                write!(f, "let {} = {}\n{}", name, value, body)
            }
            ExprKind::Dual(l, r) => write!(f, "{}:{}", l, r),
            ExprKind::Record(props) => write!(
                f,
                "{{ {} }}",
                map_join(props, ", ", |(k, v)| format!("{} = {}", k, v))
            ),
            ExprKind::DataInstantiation(name, parameters) => {
                if parameters.len() != 0 {
                    write!(f, "(data {} {})", name, map_join(parameters, " ", |p| p.to_string()))
                } else {
                    write!(f, "(data {})", name)
                }
            }
            ExprKind::ReadRecordProperty(base, name) => write!(f, "{}.{}", base, name),
            ExprKind::ReadDataProperty(base, index) => write!(f, "{}#{}", base, index),
            ExprKind::PatternMatch(value, cases) => write!(
                f,
                "(match {} {})",
                value,
                map_join(cases, " ", |c| format!("| {} = {}", c.test, c.value))
            ),
            ExprKind::Native(_) => write!(f, "#native"),
        }
    }
}

#[cfg(test)]
mod ast_tests {
    use super::Expression;

    #[test]
    fn test_identifiers() {
        let e = Expression::application(
            Expression::identifier("Color"),
            Expression::identifier("color"),
        );
        assert_eq!(e.identifiers(), vec!["Color", "color"]);
    }

    #[test]
    fn test_display() {
        let e = Expression::function(
            Expression::identifier("x"),
            Expression::application(Expression::identifier("f"), Expression::identifier("x")),
        );
        assert_eq!(e.to_string(), "(x -> (f x))");
    }
}
