//! SQL compiler that renders translated search filters with sea-query.

use std::collections::BTreeSet;

use sea_query::extension::postgres::PgExpr;
use sea_query::{
    Asterisk, Expr, Iden, Order, PostgresQueryBuilder, SelectStatement, SimpleExpr, Value, Values,
};

use crate::ast::{BinaryOp, ListOp, Literal, Node, UnaryOp};
use crate::conditions::ConditionExpr;
use crate::error::{FilterError, FilterResult};
use crate::field::Column;
use crate::order_by::{parse_order_by_list, Direction};
use crate::translate;

/// Table identifier for sea-query
#[derive(Debug, Clone)]
pub struct TableName(pub String);

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

/// Renders search filters against one resource table.
#[derive(Debug, Clone)]
pub struct SqlCompiler {
    table: String,
    disallowed_fields: BTreeSet<String>,
}

/// Result of compiling a search request
#[derive(Debug)]
pub struct CompileResult {
    pub sql: String,
    pub values: Values,
    /// Condition predicates lifted out of the filter, already part of `sql`.
    pub conditions: Vec<ConditionExpr>,
    /// Normalized `"<field> asc|desc"` entries, already part of `sql`.
    pub order_by: Vec<String>,
}

impl SqlCompiler {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            disallowed_fields: BTreeSet::new(),
        }
    }

    /// Hide fields from the filter language
    pub fn with_disallowed_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disallowed_fields
            .extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn disallowed_fields(&self) -> &BTreeSet<String> {
        &self.disallowed_fields
    }

    /// Compile a filter tree and order-by list into a parameterized SELECT
    pub fn compile<S: AsRef<str>>(
        &self,
        tree: &Node,
        order_by: &[S],
    ) -> FilterResult<CompileResult> {
        let translation = translate(tree, &self.disallowed_fields)?;
        let ordering = parse_order_by_list(order_by, &self.disallowed_fields)?;

        let mut select = SelectStatement::new();
        select.from(TableName(self.table.clone()));
        select.column(Asterisk);

        if !translation.tree.is_always_true() {
            select.and_where(compile_node(&translation.tree)?);
        }
        for condition in &translation.conditions {
            select.and_where(condition.to_expr());
        }
        for item in &ordering {
            let order = match item.direction {
                Direction::Asc => Order::Asc,
                Direction::Desc => Order::Desc,
            };
            select.order_by_expr(column_expr(&item.column)?, order);
        }

        let (sql, values) = select.build(PostgresQueryBuilder);

        Ok(CompileResult {
            sql,
            values,
            conditions: translation.conditions,
            order_by: ordering.iter().map(ToString::to_string).collect(),
        })
    }
}

/// Compile a resolved filter tree into a sea-query expression.
///
/// Literals are bound as values. Every identifier must have been resolved
/// to a [`Node::Field`] beforehand.
pub fn compile_node(node: &Node) -> FilterResult<SimpleExpr> {
    if node.is_always_true() {
        return Ok(Expr::cust("1 = 1"));
    }

    let expr = match node {
        Node::Identifier(name) => return Err(FilterError::UnresolvedIdentifier(name.clone())),
        Node::Field(column) => column_expr(column)?,
        Node::Literal(literal) => SimpleExpr::Value(literal_to_value(literal)),
        Node::Unary { op, operand } => {
            let inner = compile_node(operand)?;
            match op {
                UnaryOp::Not => inner.not(),
                UnaryOp::IsNull => Expr::expr(inner).is_null(),
                UnaryOp::IsNotNull => Expr::expr(inner).is_not_null(),
            }
        }
        Node::Binary { op, left, right } => compile_binary(*op, left, right)?,
        Node::List { op, left, right } => compile_list(*op, left, right)?,
    };

    Ok(expr)
}

fn compile_binary(op: BinaryOp, left: &Node, right: &Node) -> FilterResult<SimpleExpr> {
    let left_expr = compile_node(left)?;

    let expr = match op {
        BinaryOp::And => left_expr.and(compile_node(right)?),
        BinaryOp::Or => left_expr.or(compile_node(right)?),
        BinaryOp::Eq => Expr::expr(left_expr).eq(compile_node(right)?),
        BinaryOp::NotEq => Expr::expr(left_expr).ne(compile_node(right)?),
        BinaryOp::Lt => Expr::expr(left_expr).lt(compile_node(right)?),
        BinaryOp::Lte => Expr::expr(left_expr).lte(compile_node(right)?),
        BinaryOp::Gt => Expr::expr(left_expr).gt(compile_node(right)?),
        BinaryOp::Gte => Expr::expr(left_expr).gte(compile_node(right)?),
        BinaryOp::Like => Expr::expr(left_expr).like(like_pattern(op, right)?),
        BinaryOp::NotLike => Expr::expr(left_expr).not_like(like_pattern(op, right)?),
        BinaryOp::ILike => Expr::expr(left_expr).ilike(like_pattern(op, right)?),
        BinaryOp::NotILike => Expr::expr(left_expr).not_ilike(like_pattern(op, right)?),
    };

    Ok(expr)
}

/// Pattern operators only take a string literal on the right.
fn like_pattern(op: BinaryOp, right: &Node) -> FilterResult<String> {
    match right {
        Node::Literal(Literal::String(pattern)) => Ok(pattern.clone()),
        _ => Err(FilterError::LikePattern { op: op.to_string() }),
    }
}

fn compile_list(op: ListOp, left: &Node, right: &[Node]) -> FilterResult<SimpleExpr> {
    let subject = Expr::expr(compile_node(left)?);
    let values = right
        .iter()
        .map(compile_node)
        .collect::<FilterResult<Vec<_>>>()?;

    let expr = match op {
        ListOp::In => subject.is_in(values),
        ListOp::NotIn => subject.is_not_in(values),
        ListOp::Between | ListOp::NotBetween => {
            let count = values.len();
            let [low, high]: [SimpleExpr; 2] =
                values.try_into().map_err(|_| FilterError::BetweenArity {
                    op: op.to_string(),
                    count,
                })?;
            if op == ListOp::Between {
                subject.between(low, high)
            } else {
                subject.not_between(low, high)
            }
        }
    };

    Ok(expr)
}

/// Quoted identifier for real columns, raw lookup text for map lookups.
fn column_expr(column: &Column) -> FilterResult<SimpleExpr> {
    column.validate()?;
    let expr = match column {
        Column::Named {
            table: Some(table),
            name,
        } => Expr::col((TableName(table.clone()), ColumnName(name.clone()))).into(),
        Column::Named { table: None, name } => Expr::col(ColumnName(name.clone())).into(),
        lookup => Expr::cust(lookup.to_string()),
    };
    Ok(expr)
}

/// Convert AST Literal to sea-query Value
fn literal_to_value(literal: &Literal) -> Value {
    match literal {
        Literal::String(s) => Value::from(s.clone()),
        Literal::Integer(n) => Value::from(*n),
        Literal::Float(f) => Value::from(*f),
        Literal::Boolean(b) => Value::from(*b),
    }
}
