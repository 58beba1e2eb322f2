//! Record trait and index/filter types

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// A value published to the index table for filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl IndexValue {
    pub(crate) fn sql_value(&self) -> rusqlite::types::Value {
        match self {
            Self::String(s) => rusqlite::types::Value::Text(s.clone()),
            Self::Int(i) => rusqlite::types::Value::Integer(*i),
            Self::Bool(b) => rusqlite::types::Value::Integer(i64::from(*b)),
        }
    }
}

/// Comparison used by a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl FilterOp {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
        }
    }
}

/// Filter on an indexed field. Multiple filters are AND-combined.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: IndexValue,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: IndexValue) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    /// Shorthand for an equality filter
    pub fn eq(field: impl Into<String>, value: IndexValue) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }
}

/// A persistable record
pub trait Record: Serialize + DeserializeOwned {
    /// Unique id within the collection
    fn id(&self) -> &str;

    /// Last update timestamp (Unix milliseconds), used for optimistic checks
    fn updated_at(&self) -> i64;

    /// Collection (table-like namespace) the record lives in
    fn collection_name() -> &'static str;

    /// Fields written to the index table
    fn indexed_fields(&self) -> HashMap<String, IndexValue>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_eq() {
        let filter = Filter::eq("status", IndexValue::String("active".to_string()));
        assert_eq!(filter.field, "status");
        assert_eq!(filter.op, FilterOp::Eq);
    }

    #[test]
    fn test_bool_index_stored_as_integer() {
        assert_eq!(IndexValue::Bool(true).sql_value(), rusqlite::types::Value::Integer(1));
        assert_eq!(IndexValue::Bool(false).sql_value(), rusqlite::types::Value::Integer(0));
    }
}
