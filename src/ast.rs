//! Expression tree handed over by the query front end.
//!
//! Every pass over the tree borrows it and builds a new one, so a parsed
//! query can be translated any number of times.

use std::fmt;

use crate::field::Column;

/// A node of a parsed search filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A field reference exactly as the user wrote it, e.g. `labels.env`.
    Identifier(String),
    /// A field reference that already points at its physical column.
    Field(Column),
    Literal(Literal),
    /// `NOT x`, `x IS NULL`, `x IS NOT NULL`
    Unary { op: UnaryOp, operand: Box<Node> },
    /// Comparisons and the `AND` / `OR` connectives.
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    /// `IN`, `NOT IN`, `BETWEEN`, `NOT BETWEEN`
    List {
        op: ListOp,
        left: Box<Node>,
        right: Vec<Node>,
    },
}

/// Literal values. They are always bound as query parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    And,
    Or,
    Eq,       // =
    NotEq,    // !=
    Lt,       // <
    Lte,      // <=
    Gt,       // >
    Gte,      // >=
    Like,     // LIKE
    NotLike,  // NOT LIKE
    ILike,    // ILIKE
    NotILike, // NOT ILIKE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListOp {
    In,
    NotIn,
    Between,
    NotBetween,
}

impl BinaryOp {
    /// `AND` and `OR` combine predicates; everything else compares values.
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::Like => "LIKE",
            BinaryOp::NotLike => "NOT LIKE",
            BinaryOp::ILike => "ILIKE",
            BinaryOp::NotILike => "NOT ILIKE",
        }
    }
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Not => "NOT",
            UnaryOp::IsNull => "IS NULL",
            UnaryOp::IsNotNull => "IS NOT NULL",
        }
    }
}

impl ListOp {
    pub fn as_str(self) -> &'static str {
        match self {
            ListOp::In => "IN",
            ListOp::NotIn => "NOT IN",
            ListOp::Between => "BETWEEN",
            ListOp::NotBetween => "NOT BETWEEN",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ListOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Node {
    pub fn ident(name: impl Into<String>) -> Self {
        Node::Identifier(name.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Node::Literal(Literal::String(value.into()))
    }

    pub fn integer(value: i64) -> Self {
        Node::Literal(Literal::Integer(value))
    }

    pub fn float(value: f64) -> Self {
        Node::Literal(Literal::Float(value))
    }

    pub fn boolean(value: bool) -> Self {
        Node::Literal(Literal::Boolean(value))
    }

    pub fn binary(op: BinaryOp, left: Node, right: Node) -> Self {
        Node::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Node) -> Self {
        Node::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn list(op: ListOp, left: Node, right: Vec<Node>) -> Self {
        Node::List {
            op,
            left: Box::new(left),
            right,
        }
    }

    pub fn eq(left: Node, right: Node) -> Self {
        Node::binary(BinaryOp::Eq, left, right)
    }

    pub fn and(left: Node, right: Node) -> Self {
        Node::binary(BinaryOp::And, left, right)
    }

    pub fn or(left: Node, right: Node) -> Self {
        Node::binary(BinaryOp::Or, left, right)
    }

    pub fn not(operand: Node) -> Self {
        Node::unary(UnaryOp::Not, operand)
    }

    /// The `1 = 1` node left behind where a sub-expression was lifted out of
    /// the tree.
    pub fn always_true() -> Self {
        Node::eq(Node::integer(1), Node::integer(1))
    }

    pub fn is_always_true(&self) -> bool {
        matches!(
            self,
            Node::Binary { op: BinaryOp::Eq, left, right }
                if matches!(**left, Node::Literal(Literal::Integer(1)))
                    && matches!(**right, Node::Literal(Literal::Integer(1)))
        )
    }

    /// The node a predicate is about: the left side of a comparison or list
    /// operator, or the operand of a null check. Connectives have no subject.
    pub fn subject(&self) -> Option<&Node> {
        match self {
            Node::Binary { op, left, .. } if !op.is_logical() => Some(left.as_ref()),
            Node::List { left, .. } => Some(left.as_ref()),
            Node::Unary {
                op: UnaryOp::IsNull | UnaryOp::IsNotNull,
                operand,
            } => Some(operand.as_ref()),
            _ => None,
        }
    }

    /// Rebuilds a predicate node around a new subject, keeping operator and
    /// right side. Nodes without a subject are returned unchanged.
    pub fn with_subject(&self, subject: Node) -> Node {
        match self {
            Node::Binary { op, right, .. } if !op.is_logical() => Node::Binary {
                op: *op,
                left: Box::new(subject),
                right: right.clone(),
            },
            Node::List { op, right, .. } => Node::List {
                op: *op,
                left: Box::new(subject),
                right: right.clone(),
            },
            Node::Unary {
                op: op @ (UnaryOp::IsNull | UnaryOp::IsNotNull),
                ..
            } => Node::unary(*op, subject),
            other => other.clone(),
        }
    }

    /// Every identifier still waiting to be resolved, left to right.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_identifiers(&mut names);
        names
    }

    fn collect_identifiers<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Node::Identifier(name) => names.push(name.as_str()),
            Node::Field(_) | Node::Literal(_) => {}
            Node::Unary { operand, .. } => operand.collect_identifiers(names),
            Node::Binary { left, right, .. } => {
                left.collect_identifiers(names);
                right.collect_identifiers(names);
            }
            Node::List { left, right, .. } => {
                left.collect_identifiers(names);
                for item in right {
                    item.collect_identifiers(names);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_true_placeholder() {
        assert!(Node::always_true().is_always_true());
        assert!(!Node::eq(Node::integer(1), Node::integer(2)).is_always_true());
        assert!(!Node::eq(Node::ident("a"), Node::integer(1)).is_always_true());
    }

    #[test]
    fn test_subject_of_predicates() {
        let cmp = Node::eq(Node::ident("name"), Node::string("x"));
        assert_eq!(cmp.subject(), Some(&Node::ident("name")));

        let list = Node::list(ListOp::In, Node::ident("kind"), vec![Node::string("a")]);
        assert_eq!(list.subject(), Some(&Node::ident("kind")));

        let null = Node::unary(UnaryOp::IsNull, Node::ident("deleted_at"));
        assert_eq!(null.subject(), Some(&Node::ident("deleted_at")));

        assert_eq!(Node::and(cmp.clone(), cmp).subject(), None);
        assert_eq!(Node::not(Node::ident("x")).subject(), None);
    }

    #[test]
    fn test_with_subject_keeps_operator_and_value() {
        let cmp = Node::binary(BinaryOp::Gt, Node::ident("size"), Node::integer(3));
        let rebuilt = cmp.with_subject(Node::ident("other"));
        assert_eq!(
            rebuilt,
            Node::binary(BinaryOp::Gt, Node::ident("other"), Node::integer(3))
        );
    }

    #[test]
    fn test_identifiers_in_order() {
        let tree = Node::and(
            Node::eq(Node::ident("a"), Node::string("x")),
            Node::list(
                ListOp::Between,
                Node::ident("b"),
                vec![Node::ident("c"), Node::integer(2)],
            ),
        );
        assert_eq!(tree.identifiers(), vec!["a", "b", "c"]);
    }
}
