//! Rewrites `properties.<name>` comparisons into property map lookups.
//!
//! The rewritten subject is a [`Node::Field`], so the tree walker leaves it
//! alone instead of validating the lookup text as a plain column name.

use crate::ast::Node;
use crate::error::FilterResult;
use crate::field::{Column, PROPERTIES_PREFIX};

/// Returns the rewritten node when `node` compares a property against a
/// value, `None` for every other shape.
///
/// Only the subject changes; the operator and right side are carried over
/// as they are and resolved later by the walker.
pub fn rewrite_property_access(node: &Node) -> FilterResult<Option<Node>> {
    let Some(Node::Identifier(name)) = node.subject() else {
        return Ok(None);
    };
    let Some(property) = name.trim().strip_prefix(PROPERTIES_PREFIX) else {
        return Ok(None);
    };

    let column = Column::property(property)?;
    Ok(Some(node.with_subject(Node::Field(column))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, ListOp, UnaryOp};
    use crate::error::FilterError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_comparison_is_rewritten() {
        let node = Node::binary(
            BinaryOp::Gte,
            Node::ident("properties.replicas"),
            Node::integer(3),
        );
        let rewritten = rewrite_property_access(&node).unwrap().unwrap();
        assert_eq!(
            rewritten,
            Node::binary(
                BinaryOp::Gte,
                Node::Field(Column::Property("replicas".into())),
                Node::integer(3),
            )
        );
    }

    #[test]
    fn test_list_and_null_checks_are_rewritten() {
        let node = Node::list(
            ListOp::In,
            Node::ident("properties.region"),
            vec![Node::string("eu"), Node::string("us")],
        );
        let rewritten = rewrite_property_access(&node).unwrap().unwrap();
        assert_eq!(
            rewritten.subject(),
            Some(&Node::Field(Column::Property("region".into())))
        );

        let node = Node::unary(UnaryOp::IsNotNull, Node::ident("properties.region"));
        let rewritten = rewrite_property_access(&node).unwrap().unwrap();
        assert_eq!(
            rewritten,
            Node::unary(
                UnaryOp::IsNotNull,
                Node::Field(Column::Property("region".into()))
            )
        );
    }

    #[test]
    fn test_right_side_is_untouched() {
        let node = Node::eq(Node::ident("properties.a"), Node::ident("name"));
        let rewritten = rewrite_property_access(&node).unwrap().unwrap();
        assert_eq!(
            rewritten,
            Node::eq(Node::Field(Column::Property("a".into())), Node::ident("name"))
        );
    }

    #[test]
    fn test_other_shapes_pass_through() {
        let plain = Node::eq(Node::ident("name"), Node::string("x"));
        assert_eq!(rewrite_property_access(&plain).unwrap(), None);

        let labels = Node::eq(Node::ident("labels.env"), Node::string("x"));
        assert_eq!(rewrite_property_access(&labels).unwrap(), None);

        let conjunction = Node::and(plain.clone(), plain);
        assert_eq!(rewrite_property_access(&conjunction).unwrap(), None);

        assert_eq!(rewrite_property_access(&Node::ident("properties.a")).unwrap(), None);
    }

    #[test]
    fn test_invalid_property_name() {
        let node = Node::eq(Node::ident("properties.a'b"), Node::string("x"));
        assert_eq!(
            rewrite_property_access(&node).unwrap_err(),
            FilterError::InvalidPropertyName("a'b".into())
        );
    }
}
