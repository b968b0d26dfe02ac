//! Field resolution over a whole tree.

use crate::ast::Node;
use crate::error::FilterResult;
use crate::field::{check_column, resolve_field, DisallowedFields};
use crate::properties::rewrite_property_access;

/// Rebuilds `node` with every identifier replaced by its physical column.
///
/// Property comparisons are rewritten first at each level. Fields that are
/// already resolved are checked again. The walk stops at the first field
/// that fails to resolve.
pub fn resolve_tree<D>(node: &Node, disallowed: &D) -> FilterResult<Node>
where
    D: DisallowedFields + ?Sized,
{
    if let Some(rewritten) = rewrite_property_access(node)? {
        return resolve_children(&rewritten, disallowed);
    }
    resolve_children(node, disallowed)
}

fn resolve_children<D>(node: &Node, disallowed: &D) -> FilterResult<Node>
where
    D: DisallowedFields + ?Sized,
{
    match node {
        Node::Identifier(name) => Ok(Node::Field(resolve_field(name, disallowed)?)),
        Node::Field(column) => {
            check_column(column, disallowed)?;
            Ok(node.clone())
        }
        Node::Literal(_) => Ok(node.clone()),
        Node::Unary { op, operand } => Ok(Node::unary(*op, resolve_tree(operand, disallowed)?)),
        Node::Binary { op, left, right } => {
            let left = resolve_tree(left, disallowed)?;
            let right = resolve_tree(right, disallowed)?;
            Ok(Node::binary(*op, left, right))
        }
        Node::List { op, left, right } => {
            let left = resolve_tree(left, disallowed)?;
            let right = right
                .iter()
                .map(|item| resolve_tree(item, disallowed))
                .collect::<FilterResult<Vec<_>>>()?;
            Ok(Node::list(*op, left, right))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, ListOp, UnaryOp};
    use crate::error::FilterError;
    use crate::field::Column;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn resolve(node: &Node) -> FilterResult<Node> {
        resolve_tree(node, &HashSet::<String>::new())
    }

    #[test]
    fn test_identifiers_become_fields() {
        let tree = Node::and(
            Node::eq(Node::ident("name"), Node::string("prod-1")),
            Node::eq(Node::ident("labels.env"), Node::string("prod")),
        );
        assert_eq!(
            resolve(&tree).unwrap(),
            Node::and(
                Node::eq(Node::Field(Column::named("name")), Node::string("prod-1")),
                Node::eq(Node::Field(Column::Label("env".into())), Node::string("prod")),
            )
        );
    }

    #[test]
    fn test_list_operands_are_resolved() {
        let tree = Node::list(
            ListOp::Between,
            Node::ident("created_time"),
            vec![Node::ident("updated_time"), Node::string("2024-01-01")],
        );
        assert_eq!(
            resolve(&tree).unwrap(),
            Node::list(
                ListOp::Between,
                Node::Field(Column::named("created_time")),
                vec![Node::Field(Column::named("updated_time")), Node::string("2024-01-01")],
            )
        );
    }

    #[test]
    fn test_properties_are_rewritten_before_resolution() {
        let tree = Node::not(Node::binary(
            BinaryOp::Lt,
            Node::ident("properties.replicas"),
            Node::integer(3),
        ));
        assert_eq!(
            resolve(&tree).unwrap(),
            Node::not(Node::binary(
                BinaryOp::Lt,
                Node::Field(Column::Property("replicas".into())),
                Node::integer(3),
            ))
        );
    }

    #[test]
    fn test_placeholder_passes_through() {
        let tree = Node::and(
            Node::always_true(),
            Node::unary(UnaryOp::IsNull, Node::ident("deleted_at")),
        );
        let resolved = resolve(&tree).unwrap();
        assert_eq!(
            resolved,
            Node::and(
                Node::always_true(),
                Node::unary(UnaryOp::IsNull, Node::Field(Column::named("deleted_at"))),
            )
        );
    }

    #[test]
    fn test_hand_built_field_is_checked() {
        let tree = Node::eq(
            Node::Field(Column::Label("env' = 'x' OR 1=1 --".into())),
            Node::string("prod"),
        );
        assert_eq!(
            resolve(&tree).unwrap_err(),
            FilterError::InvalidLabelKey("env' = 'x' OR 1=1 --".into())
        );

        let disallowed: &[&str] = &["token"];
        let tree = Node::eq(Node::Field(Column::named("token")), Node::string("t"));
        assert_eq!(
            resolve_tree(&tree, disallowed).unwrap_err(),
            FilterError::DisallowedField("token".into())
        );
    }

    #[test]
    fn test_first_failure_aborts_the_walk() {
        let tree = Node::or(
            Node::eq(Node::ident("labels.BAD"), Node::string("x")),
            Node::eq(Node::ident("a.b.c"), Node::string("y")),
        );
        assert_eq!(
            resolve(&tree).unwrap_err(),
            FilterError::InvalidLabelKey("BAD".into())
        );
    }

    #[test]
    fn test_disallowed_field_deep_in_tree() {
        let disallowed: &[&str] = &["token"];
        let tree = Node::and(
            Node::eq(Node::ident("name"), Node::string("x")),
            Node::not(Node::list(ListOp::In, Node::ident("token"), vec![Node::string("t")])),
        );
        assert_eq!(
            resolve_tree(&tree, disallowed).unwrap_err(),
            FilterError::DisallowedField("token".into())
        );
    }

    #[test]
    fn test_unextracted_condition_is_rejected() {
        let tree = Node::eq(Node::ident("status.conditions.Ready"), Node::string("True"));
        assert!(matches!(
            resolve(&tree).unwrap_err(),
            FilterError::FieldTooDeep(_)
        ));
    }
}
