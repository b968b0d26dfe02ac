//! Status condition extraction.
//!
//! Conditions live in a JSON array column. `status.conditions.<Type> = <Status>`
//! is lifted out of the tree and turned into a lookup of the first array
//! element with that type, written exactly like the expression index built
//! for it:
//!
//! ```text
//! jsonb_path_query_first(status_conditions, '$[*] ? (@.type == "Ready")') ->> 'status'
//! ```
//!
//! The lifted node is replaced with `1 = 1` and the predicate is returned
//! separately, to be ANDed onto the final query.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use sea_query::{Expr, SimpleExpr};
use tracing::debug;

use crate::ast::{BinaryOp, Literal, Node, UnaryOp};
use crate::error::{FilterError, FilterResult};
use crate::field::{is_identifier, CONDITIONS_PREFIX};

/// JSON array column holding status conditions.
pub const CONDITIONS_COLUMN: &str = "status_conditions";

static CONDITION_TYPE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][a-zA-Z0-9]*$").expect("condition type pattern"));

/// Status of a condition, spelled the way it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    pub const ALL: [ConditionStatus; 3] = [
        ConditionStatus::True,
        ConditionStatus::False,
        ConditionStatus::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        }
    }
}

impl FromStr for ConditionStatus {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConditionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| FilterError::InvalidConditionStatus(s.to_string()))
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An extracted condition predicate.
///
/// The type is inlined into the SQL text (it has passed the PascalCase
/// pattern); the status is bound as the single parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConditionExpr {
    condition_type: String,
    status: ConditionStatus,
}

impl ConditionExpr {
    pub fn new(condition_type: &str, status: ConditionStatus) -> FilterResult<Self> {
        if !CONDITION_TYPE_PATTERN.is_match(condition_type) {
            return Err(FilterError::InvalidConditionType(condition_type.to_string()));
        }
        Ok(Self {
            condition_type: condition_type.to_string(),
            status,
        })
    }

    pub fn condition_type(&self) -> &str {
        &self.condition_type
    }

    pub fn status(&self) -> ConditionStatus {
        self.status
    }

    /// Predicate text with one `?` placeholder for the status.
    pub fn sql(&self) -> String {
        format!("{} = ?", condition_index_expression(&self.condition_type))
    }

    pub fn params(&self) -> Vec<String> {
        vec![self.status.as_str().to_string()]
    }

    pub fn to_expr(&self) -> SimpleExpr {
        Expr::expr(Expr::cust(condition_index_expression(&self.condition_type)))
            .eq(self.status.as_str())
    }
}

/// The indexed expression for one condition type. Queries must reproduce
/// it character for character for the planner to pick the index.
pub fn condition_index_expression(condition_type: &str) -> String {
    format!(
        "jsonb_path_query_first({CONDITIONS_COLUMN}, '$[*] ? (@.type == \"{condition_type}\")') ->> 'status'"
    )
}

/// `CREATE INDEX` statement backing lookups of one condition type.
///
/// `table` must be a bare identifier; it is used unquoted in the index name
/// and the `ON` clause.
pub fn condition_index_ddl(table: &str, condition_type: &str) -> FilterResult<String> {
    if !is_identifier(table) {
        return Err(FilterError::InvalidFieldName(table.to_string()));
    }
    if !CONDITION_TYPE_PATTERN.is_match(condition_type) {
        return Err(FilterError::InvalidConditionType(condition_type.to_string()));
    }
    Ok(format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_condition_{} ON {table} (({}))",
        condition_type.to_ascii_lowercase(),
        condition_index_expression(condition_type)
    ))
}

/// Lifts every condition comparison out of `node`.
///
/// Returns the remaining tree, with `1 = 1` in place of each lifted
/// comparison, and the predicates in depth-first, left-to-right order.
/// A condition below `OR` or `NOT` is rejected: the caller ANDs the
/// predicates onto the query, which only preserves meaning for conjuncts.
pub fn extract_conditions(node: &Node) -> FilterResult<(Node, Vec<ConditionExpr>)> {
    let mut extracted = Vec::new();
    let tree = extract(node, true, &mut extracted)?;
    Ok((tree, extracted))
}

fn extract(node: &Node, conjunctive: bool, out: &mut Vec<ConditionExpr>) -> FilterResult<Node> {
    if let Some(name) = condition_subject(node) {
        let condition = build_condition(node, name)?;
        if !conjunctive {
            return Err(FilterError::ConditionNotConjunctive(name.to_string()));
        }
        debug!(
            condition_type = condition.condition_type(),
            status = %condition.status(),
            "extracted status condition"
        );
        out.push(condition);
        return Ok(Node::always_true());
    }

    match node {
        Node::Identifier(_) | Node::Field(_) | Node::Literal(_) => Ok(node.clone()),
        Node::Unary { op, operand } => {
            let conjunctive = conjunctive && *op != UnaryOp::Not;
            Ok(Node::unary(*op, extract(operand, conjunctive, out)?))
        }
        Node::Binary { op, left, right } => {
            let conjunctive = conjunctive && *op == BinaryOp::And;
            let left = extract(left, conjunctive, out)?;
            let right = extract(right, conjunctive, out)?;
            Ok(Node::binary(*op, left, right))
        }
        Node::List { op, left, right } => {
            let left = extract(left, false, out)?;
            let right = right
                .iter()
                .map(|item| extract(item, false, out))
                .collect::<FilterResult<Vec<_>>>()?;
            Ok(Node::list(*op, left, right))
        }
    }
}

fn condition_subject(node: &Node) -> Option<&str> {
    match node.subject() {
        Some(Node::Identifier(name)) if name.trim().starts_with(CONDITIONS_PREFIX) => {
            Some(name.trim())
        }
        _ => None,
    }
}

fn build_condition(node: &Node, name: &str) -> FilterResult<ConditionExpr> {
    let segments: Vec<&str> = name.split('.').collect();
    let condition_type = match segments.as_slice() {
        ["status", "conditions", condition_type] => *condition_type,
        _ => return Err(FilterError::InvalidConditionField(name.to_string())),
    };
    if !CONDITION_TYPE_PATTERN.is_match(condition_type) {
        return Err(FilterError::InvalidConditionType(condition_type.to_string()));
    }

    let value = match node {
        Node::Binary {
            op: BinaryOp::Eq,
            right,
            ..
        } => right.as_ref(),
        Node::Binary { op, .. } => return Err(unsupported(name, op.as_str())),
        Node::List { op, .. } => return Err(unsupported(name, op.as_str())),
        Node::Unary { op, .. } => return Err(unsupported(name, op.as_str())),
        _ => return Err(FilterError::InvalidConditionField(name.to_string())),
    };

    let status = match value {
        Node::Literal(Literal::String(status)) => status.parse::<ConditionStatus>()?,
        other => return Err(FilterError::InvalidConditionStatus(value_text(other))),
    };

    ConditionExpr::new(condition_type, status)
}

fn unsupported(field: &str, op: &str) -> FilterError {
    FilterError::UnsupportedConditionOperator {
        field: field.to_string(),
        op: op.to_string(),
    }
}

fn value_text(node: &Node) -> String {
    match node {
        Node::Identifier(name) => name.clone(),
        Node::Field(column) => column.to_string(),
        Node::Literal(Literal::String(value)) => value.clone(),
        Node::Literal(Literal::Integer(value)) => value.to_string(),
        Node::Literal(Literal::Float(value)) => value.to_string(),
        Node::Literal(Literal::Boolean(value)) => value.to_string(),
        _ => "expression".to_string(),
    }
}
