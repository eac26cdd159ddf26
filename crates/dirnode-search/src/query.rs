//! Search query types (§6 `SearchService.Search`).

use crate::error::{Result, SearchError};

/// A queryable attribute field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Name,
    Version,
    SkillId,
    SkillName,
    Locator,
    Module,
}

impl Field {
    pub fn parse(s: &str) -> Result<Field> {
        match s.to_ascii_uppercase().as_str() {
            "NAME" => Ok(Field::Name),
            "VERSION" => Ok(Field::Version),
            "SKILL_ID" => Ok(Field::SkillId),
            "SKILL_NAME" => Ok(Field::SkillName),
            "LOCATOR" => Ok(Field::Locator),
            "MODULE" => Ok(Field::Module),
            other => Err(SearchError::BadQuery(other.to_string())),
        }
    }
}

/// One `(field, value)` predicate. Predicates within a query are ANDed
/// (§4.3 "Query language").
#[derive(Clone, Debug)]
pub struct Query {
    pub field: Field,
    pub value: String,
}

impl Query {
    pub fn new(field_name: &str, value: impl Into<String>) -> Result<Query> {
        Ok(Query {
            field: Field::parse(field_name)?,
            value: value.into(),
        })
    }
}

/// Pagination, default limit 100 (§4.3).
#[derive(Clone, Copy, Debug)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Default for Page {
    fn default() -> Self {
        Page { limit: 100, offset: 0 }
    }
}
