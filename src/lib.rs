//! Translation of parsed search filters into parameterized SQL.
//!
//! ```text
//! parsed tree
//!   ├─ conditions::extract_conditions   status.conditions.<Type> = <Status>  -> index lookups
//!   └─ walker::resolve_tree             identifiers -> physical columns
//!        └─ properties::rewrite_property_access (at each level)
//! order-by strings
//!   └─ order_by::normalize_order_by
//! ```
//!
//! The caller ANDs the extracted condition predicates onto the SQL generated
//! for the rewritten tree. [`sql_compiler::SqlCompiler`] does all of it in
//! one call for callers that want a ready statement.
//!
//! Condition comparisons are only accepted where they are conjuncts of the
//! whole filter, that is, reachable from the root through `AND` alone. One
//! below `OR` or `NOT` fails with [`FilterError::ConditionNotConjunctive`],
//! since ANDing it onto the query would change what the filter matches.
//!
//! Trees may carry [`Node::Field`] leaves built by the caller. They are
//! checked against the same patterns and disallowed fields as identifiers.

pub mod ast;
pub mod conditions;
pub mod config;
pub mod error;
pub mod field;
pub mod order_by;
pub mod properties;
pub mod sql_compiler;
pub mod walker;

use tracing::debug;

pub use ast::{BinaryOp, ListOp, Literal, Node, UnaryOp};
pub use conditions::{extract_conditions, ConditionExpr, ConditionStatus};
pub use config::{ConfigError, FilterConfig, ResourceConfig};
pub use error::{ErrorKind, FilterError, FilterResult};
pub use field::{resolve_field, Column, DisallowedFields};
pub use order_by::{normalize_order_by, Direction, OrderBy};
pub use sql_compiler::{CompileResult, SqlCompiler};
pub use walker::resolve_tree;

/// A filter tree rewritten to physical columns, plus the condition
/// predicates lifted out of it.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub tree: Node,
    /// In extraction order. All of them are ANDed onto the query.
    pub conditions: Vec<ConditionExpr>,
}

/// Runs condition extraction, then field resolution, over `tree`.
pub fn translate<D>(tree: &Node, disallowed: &D) -> FilterResult<Translation>
where
    D: DisallowedFields + ?Sized,
{
    let (tree, conditions) = extract_conditions(tree)
        .and_then(|(rest, conditions)| Ok((resolve_tree(&rest, disallowed)?, conditions)))
        .inspect_err(|err| debug!(error = %err, "rejected search filter"))?;

    debug!(conditions = conditions.len(), "translated search filter");
    Ok(Translation { tree, conditions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sea_query::Value;
    use std::collections::HashMap;

    fn no_fields() -> HashMap<String, ()> {
        HashMap::new()
    }

    #[test]
    fn test_label_equality_end_to_end() {
        let tree = Node::eq(Node::ident("labels.env"), Node::string("prod"));

        let translation = translate(&tree, &no_fields()).unwrap();
        assert_eq!(
            translation.tree,
            Node::eq(Node::Field(Column::Label("env".into())), Node::string("prod"))
        );
        assert!(translation.conditions.is_empty());

        let result = SqlCompiler::new("clusters").compile(&tree, &[] as &[&str]).unwrap();
        assert!(result.sql.contains("labels->>'env'"));
        assert!(result.sql.contains("= $1"));
        assert_eq!(result.values.0, vec![Value::from("prod")]);
    }

    #[test]
    fn test_condition_end_to_end() {
        let tree = Node::eq(Node::ident("status.conditions.Ready"), Node::string("True"));

        let translation = translate(&tree, &no_fields()).unwrap();
        assert!(translation.tree.is_always_true());
        assert_eq!(
            translation.conditions,
            vec![ConditionExpr::new("Ready", ConditionStatus::True).unwrap()]
        );
        assert!(translation.tree.identifiers().is_empty());
    }

    #[test]
    fn test_injection_is_rejected_before_sql() {
        let tree = Node::eq(Node::ident("labels.env; DROP TABLE x"), Node::string("prod"));

        let err = translate(&tree, &no_fields()).unwrap_err();
        assert_eq!(err, FilterError::InvalidLabelKey("env; DROP TABLE x".into()));
        assert_eq!(err.kind(), ErrorKind::BadRequest);

        assert!(SqlCompiler::new("clusters")
            .compile(&tree, &[] as &[&str])
            .is_err());
    }

    #[test]
    fn test_hand_built_field_is_rejected_by_translate() {
        let tree = Node::eq(
            Node::Field(Column::Label("env' = 'x' OR 1=1 --".into())),
            Node::string("prod"),
        );
        assert_eq!(
            translate(&tree, &no_fields()).unwrap_err(),
            FilterError::InvalidLabelKey("env' = 'x' OR 1=1 --".into())
        );

        let tree = Node::eq(Node::Field(Column::Label("env".into())), Node::string("prod"));
        assert_eq!(translate(&tree, &no_fields()).unwrap().tree, tree);
    }

    #[test]
    fn test_order_by_end_to_end() {
        let normalized = normalize_order_by(&["name desc", "created_time"], &no_fields()).unwrap();
        assert_eq!(normalized, vec!["name desc", "created_time asc"]);
    }

    #[test]
    fn test_mixed_filter() {
        let mut disallowed = HashMap::new();
        disallowed.insert("owner_token".to_string(), "internal");

        let tree = Node::and(
            Node::and(
                Node::eq(Node::ident("status.conditions.Available"), Node::string("False")),
                Node::binary(BinaryOp::Gt, Node::ident("properties.replicas"), Node::integer(2)),
            ),
            Node::or(
                Node::eq(Node::ident("labels.team"), Node::string("core")),
                Node::unary(UnaryOp::IsNull, Node::ident("status.phase")),
            ),
        );

        let translation = translate(&tree, &disallowed).unwrap();
        assert_eq!(
            translation.tree,
            Node::and(
                Node::and(
                    Node::always_true(),
                    Node::binary(
                        BinaryOp::Gt,
                        Node::Field(Column::Property("replicas".into())),
                        Node::integer(2),
                    ),
                ),
                Node::or(
                    Node::eq(Node::Field(Column::Label("team".into())), Node::string("core")),
                    Node::unary(UnaryOp::IsNull, Node::Field(Column::named("status_phase"))),
                ),
            )
        );
        assert_eq!(translation.conditions.len(), 1);
        assert_eq!(translation.conditions[0].condition_type(), "Available");

        let tree = Node::and(tree, Node::eq(Node::ident("owner_token"), Node::string("t")));
        assert_eq!(
            translate(&tree, &disallowed).unwrap_err(),
            FilterError::DisallowedField("owner_token".into())
        );
    }

    #[test]
    fn test_translation_is_repeatable() {
        let tree = Node::and(
            Node::eq(Node::ident("status.conditions.Ready"), Node::string("True")),
            Node::eq(Node::ident("name"), Node::string("a")),
        );
        let first = translate(&tree, &no_fields()).unwrap();
        let second = translate(&tree, &no_fields()).unwrap();
        assert_eq!(first, second);
    }
}
