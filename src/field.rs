//! Field name resolution.
//!
//! Field names end up in the query text itself (identifiers cannot be bound
//! as parameters), so every name has to pass one of the patterns below
//! before it is turned into a [`Column`].
//!
//! ## Accepted forms
//!
//! ```text
//! name                     plain column            -> "name"
//! cluster.name             table-qualified column  -> "cluster"."name"
//! labels.env               label map lookup        -> labels->>'env'
//! properties.region        property map lookup     -> properties->>'region'
//! status.phase             legacy alias            -> "status_phase"
//! labels->>'env'           already physical        -> labels->>'env'
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::BuildHasher;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{FilterError, FilterResult};

/// JSON object column holding resource labels.
pub const LABELS_COLUMN: &str = "labels";
/// JSON object column holding schemaless resource properties.
pub const PROPERTIES_COLUMN: &str = "properties";

pub const LABELS_PREFIX: &str = "labels.";
pub const PROPERTIES_PREFIX: &str = "properties.";
pub const CONDITIONS_PREFIX: &str = "status.conditions.";

/// Deprecated field names and the column that replaced them.
const LEGACY_ALIASES: &[(&str, &str)] = &[
    ("status.phase", "status_phase"),
    ("status.conditions", "status_conditions"),
];

static LABEL_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]+$").expect("label key pattern"));

static PROPERTY_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("property name pattern"));

static COLUMN_SEGMENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("column segment pattern"));

/// A field reference in its physical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Column {
    /// A real column, optionally qualified with its table.
    Named { table: Option<String>, name: String },
    /// `labels->>'<key>'`
    Label(String),
    /// `properties->>'<name>'`
    Property(String),
}

impl Column {
    pub fn named(name: impl Into<String>) -> Self {
        Column::Named {
            table: None,
            name: name.into(),
        }
    }

    /// Label lookup for a key that passes the label key pattern.
    pub fn label(key: &str) -> FilterResult<Self> {
        if LABEL_KEY_PATTERN.is_match(key) {
            Ok(Column::Label(key.to_string()))
        } else {
            Err(FilterError::InvalidLabelKey(key.to_string()))
        }
    }

    /// Property lookup for a name that passes the property name pattern.
    pub fn property(name: &str) -> FilterResult<Self> {
        if PROPERTY_NAME_PATTERN.is_match(name) {
            Ok(Column::Property(name.to_string()))
        } else {
            Err(FilterError::InvalidPropertyName(name.to_string()))
        }
    }

    /// Parses the text produced by `Display` for map lookups. Anything that
    /// is not exactly such a lookup with a valid key yields `None`.
    pub fn from_physical(expr: &str) -> Option<Self> {
        if let Some(key) = map_lookup_key(expr, LABELS_COLUMN) {
            return Column::label(key).ok();
        }
        if let Some(name) = map_lookup_key(expr, PROPERTIES_COLUMN) {
            return Column::property(name).ok();
        }
        None
    }

    /// Re-checks a column against the same patterns the constructors use.
    ///
    /// The enum is open, so a [`Column`] handed in from outside the resolver
    /// may carry any text; it goes into the query verbatim.
    pub fn validate(&self) -> FilterResult<()> {
        match self {
            Column::Label(key) if !LABEL_KEY_PATTERN.is_match(key) => {
                Err(FilterError::InvalidLabelKey(key.clone()))
            }
            Column::Property(name) if !PROPERTY_NAME_PATTERN.is_match(name) => {
                Err(FilterError::InvalidPropertyName(name.clone()))
            }
            Column::Named { table, name } => {
                if table.iter().chain([name]).all(|segment| is_identifier(segment)) {
                    Ok(())
                } else {
                    Err(FilterError::InvalidFieldName(self.to_string()))
                }
            }
            Column::Label(_) | Column::Property(_) => Ok(()),
        }
    }
}

/// Whether `segment` is usable as a bare SQL identifier.
pub(crate) fn is_identifier(segment: &str) -> bool {
    COLUMN_SEGMENT_PATTERN.is_match(segment)
}

fn map_lookup_key<'a>(expr: &'a str, column: &str) -> Option<&'a str> {
    expr.strip_prefix(column)?
        .strip_prefix("->>'")?
        .strip_suffix('\'')
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Column::Named {
                table: Some(table),
                name,
            } => write!(f, "{table}.{name}"),
            Column::Named { table: None, name } => f.write_str(name),
            Column::Label(key) => write!(f, "{LABELS_COLUMN}->>'{key}'"),
            Column::Property(name) => write!(f, "{PROPERTIES_COLUMN}->>'{name}'"),
        }
    }
}

/// Fields a resource type hides from the filter language.
///
/// Implemented for the usual map and set types so callers can pass whatever
/// they already keep per resource type; map values are ignored.
pub trait DisallowedFields {
    fn is_disallowed(&self, field: &str) -> bool;
}

impl<V, S: BuildHasher> DisallowedFields for HashMap<String, V, S> {
    fn is_disallowed(&self, field: &str) -> bool {
        self.contains_key(field)
    }
}

impl<S: BuildHasher> DisallowedFields for HashSet<String, S> {
    fn is_disallowed(&self, field: &str) -> bool {
        self.contains(field)
    }
}

impl<V> DisallowedFields for BTreeMap<String, V> {
    fn is_disallowed(&self, field: &str) -> bool {
        self.contains_key(field)
    }
}

impl DisallowedFields for BTreeSet<String> {
    fn is_disallowed(&self, field: &str) -> bool {
        self.contains(field)
    }
}

impl DisallowedFields for [&str] {
    fn is_disallowed(&self, field: &str) -> bool {
        self.iter().any(|candidate| *candidate == field)
    }
}

impl<T: DisallowedFields + ?Sized> DisallowedFields for &T {
    fn is_disallowed(&self, field: &str) -> bool {
        (**self).is_disallowed(field)
    }
}

/// What a trimmed user field name refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldName<'a> {
    /// A map lookup that was resolved earlier.
    Physical(Column),
    /// `labels.<key>`, key not yet validated
    Label(&'a str),
    /// `properties.<name>`, name not yet validated
    Property(&'a str),
    /// `status.conditions.<rest>`
    Condition(&'a str),
    /// A deprecated name, carrying the column that replaced it.
    LegacyAlias(&'static str),
    /// Anything else: a plain or table-qualified column.
    Column(&'a str),
}

impl<'a> FieldName<'a> {
    pub fn classify(name: &'a str) -> Self {
        if let Some(column) = Column::from_physical(name) {
            return FieldName::Physical(column);
        }
        if let Some(key) = name.strip_prefix(LABELS_PREFIX) {
            return FieldName::Label(key);
        }
        if let Some(property) = name.strip_prefix(PROPERTIES_PREFIX) {
            return FieldName::Property(property);
        }
        if let Some(rest) = name.strip_prefix(CONDITIONS_PREFIX) {
            return FieldName::Condition(rest);
        }
        if let Some((_, column)) = LEGACY_ALIASES.iter().find(|(alias, _)| *alias == name) {
            return FieldName::LegacyAlias(*column);
        }
        FieldName::Column(name)
    }
}

/// Resolves a user supplied field name to its physical column.
///
/// Property references are only valid as the subject of a comparison, where
/// the property rewriter has already replaced them, so they are rejected
/// here. Condition references are handled by the condition extractor and
/// fail here for having more than one `.`.
pub fn resolve_field<D>(name: &str, disallowed: &D) -> FilterResult<Column>
where
    D: DisallowedFields + ?Sized,
{
    let name = name.trim();
    match FieldName::classify(name) {
        FieldName::Physical(column) => Ok(column),
        FieldName::Label(key) => Column::label(key),
        FieldName::Property(_) => Err(FilterError::MisplacedProperty(name.to_string())),
        FieldName::Condition(_) => Err(FilterError::FieldTooDeep(name.to_string())),
        FieldName::LegacyAlias(column) => Ok(Column::named(column)),
        FieldName::Column(name) => resolve_column(name, disallowed),
    }
}

fn resolve_column<D>(name: &str, disallowed: &D) -> FilterResult<Column>
where
    D: DisallowedFields + ?Sized,
{
    let segments: Vec<&str> = name.split('.').collect();
    if segments.len() > 2 {
        return Err(FilterError::FieldTooDeep(name.to_string()));
    }
    if !segments.iter().all(|segment| is_identifier(segment)) {
        return Err(FilterError::InvalidFieldName(name.to_string()));
    }

    let (table, column) = match segments.as_slice() {
        [table, column] => (Some(*table), *column),
        _ => (None, name),
    };
    let column = Column::Named {
        table: table.map(str::to_string),
        name: column.to_string(),
    };
    check_disallowed(&column, disallowed)?;
    Ok(column)
}

/// Validates a column that reached the walker already resolved.
pub(crate) fn check_column<D>(column: &Column, disallowed: &D) -> FilterResult<()>
where
    D: DisallowedFields + ?Sized,
{
    column.validate()?;
    check_disallowed(column, disallowed)
}

fn check_disallowed<D>(column: &Column, disallowed: &D) -> FilterResult<()>
where
    D: DisallowedFields + ?Sized,
{
    if let Column::Named { name, .. } = column {
        let full = column.to_string();
        if disallowed.is_disallowed(name) || disallowed.is_disallowed(&full) {
            debug!(field = %full, "rejected disallowed field");
            return Err(FilterError::DisallowedField(full));
        }
    }
    Ok(())
}
