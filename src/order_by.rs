//! Validation of user supplied sort orders.
//!
//! Entries look like `"<field>"` or `"<field> asc|desc"`. The direction is
//! case sensitive and the field goes through the same resolver as filters.

use std::fmt;

use crate::error::{FilterError, FilterResult};
use crate::field::{resolve_field, Column, DisallowedFields};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// A validated `ORDER BY` item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderBy {
    pub column: Column,
    pub direction: Direction,
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column, self.direction.as_str())
    }
}

/// Parses a single order-by entry.
pub fn parse_order_by<D>(entry: &str, disallowed: &D) -> FilterResult<OrderBy>
where
    D: DisallowedFields + ?Sized,
{
    let trimmed = entry.trim();
    let (field, direction) = match trimmed.split(' ').collect::<Vec<_>>().as_slice() {
        [field] => (*field, Direction::Asc),
        [field, "asc"] => (*field, Direction::Asc),
        [field, "desc"] => (*field, Direction::Desc),
        _ => return Err(FilterError::BadOrderValue(trimmed.to_string())),
    };

    Ok(OrderBy {
        column: resolve_field(field, disallowed)?,
        direction,
    })
}

/// Parses every entry, stopping at the first invalid one.
pub fn parse_order_by_list<D, S>(entries: &[S], disallowed: &D) -> FilterResult<Vec<OrderBy>>
where
    D: DisallowedFields + ?Sized,
    S: AsRef<str>,
{
    entries
        .iter()
        .map(|entry| parse_order_by(entry.as_ref(), disallowed))
        .collect()
}

/// Normalizes entries to `"<physical field> asc|desc"`.
pub fn normalize_order_by<D, S>(entries: &[S], disallowed: &D) -> FilterResult<Vec<String>>
where
    D: DisallowedFields + ?Sized,
    S: AsRef<str>,
{
    Ok(parse_order_by_list(entries, disallowed)?
        .iter()
        .map(OrderBy::to_string)
        .collect())
}
