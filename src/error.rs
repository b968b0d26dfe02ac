//! Errors raised while translating a search filter.
//!
//! Every variant is a problem with the client's input. Callers answer them
//! with a 400 response; retrying the same input fails the same way.

use thiserror::Error;

pub type FilterResult<T> = Result<T, FilterError>;

/// Coarse classification used by HTTP layers to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("label key '{0}' is invalid")]
    InvalidLabelKey(String),

    #[error("property name '{0}' is invalid")]
    InvalidPropertyName(String),

    #[error("property '{0}' can only be compared against a value")]
    MisplacedProperty(String),

    #[error("field name '{0}' is invalid")]
    InvalidFieldName(String),

    #[error("field name '{0}' is invalid, only one '.' is allowed")]
    FieldTooDeep(String),

    #[error("field name '{0}' is not allowed")]
    DisallowedField(String),

    #[error("condition field '{0}' is invalid, expected status.conditions.<Type>")]
    InvalidConditionField(String),

    #[error("condition type '{0}' is invalid, must be PascalCase")]
    InvalidConditionType(String),

    #[error("operator '{op}' is not supported for condition '{field}', only equality is supported")]
    UnsupportedConditionOperator { field: String, op: String },

    #[error("condition status '{0}' is invalid, must be one of True, False, Unknown")]
    InvalidConditionStatus(String),

    #[error("condition '{0}' can only be combined with AND")]
    ConditionNotConjunctive(String),

    #[error("bad order value '{0}'")]
    BadOrderValue(String),

    #[error("field '{0}' has not been resolved")]
    UnresolvedIdentifier(String),

    #[error("{op} requires exactly two values, got {count}")]
    BetweenArity { op: String, count: usize },

    #[error("{op} requires a string pattern")]
    LikePattern { op: String },
}

impl FilterError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::BadRequest
    }

    /// HTTP status code to answer the originating request with.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::BadRequest => 400,
        }
    }
}
