use crate::errors::QueryError;
use sea_orm::{ColumnTrait, ColumnType, EntityTrait, IdenStatic, Iterable, Value};
use std::collections::BTreeMap;

/// Column names and types of one entity, captured once at registration.
///
/// Filter operands arrive as strings; the schema turns them into typed values
/// so comparisons behave the same on every backend.
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    table: String,
    columns: BTreeMap<String, ColumnType>,
    fulltext: BTreeMap<String, String>,
}

impl ColumnSchema {
    #[must_use]
    pub fn of<E: EntityTrait>() -> Self {
        let table = E::default().table_name().to_string();
        let columns = E::Column::iter()
            .map(|column| {
                (
                    column.as_str().to_string(),
                    column.def().get_column_type().clone(),
                )
            })
            .collect();
        Self {
            table,
            columns,
            fulltext: BTreeMap::new(),
        }
    }

    /// Build a schema by hand, mainly for tests and benches.
    #[must_use]
    pub fn new(table: impl Into<String>, columns: Vec<(&str, ColumnType)>) -> Self {
        Self {
            table: table.into(),
            columns: columns
                .into_iter()
                .map(|(name, ty)| (name.to_string(), ty))
                .collect(),
            fulltext: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_fulltext(mut self, overrides: BTreeMap<String, String>) -> Self {
        self.fulltext = overrides;
        self
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn column_type(&self, field: &str) -> Option<&ColumnType> {
        self.columns.get(field)
    }

    #[must_use]
    pub fn has_column(&self, field: &str) -> bool {
        self.columns.contains_key(field)
    }

    /// The column a full-text query on `field` runs against.
    #[must_use]
    pub fn fulltext_column<'a>(&'a self, field: &'a str) -> &'a str {
        self.fulltext.get(field).map_or(field, String::as_str)
    }

    #[must_use]
    pub fn has_fulltext_override(&self, field: &str) -> bool {
        self.fulltext.contains_key(field)
    }

    /// Typed value for `raw` according to the declared type of `field`.
    ///
    /// # Errors
    /// Returns [`QueryError::InvalidOperand`] when `raw` doesn't parse as the column type.
    pub fn coerce(&self, field: &str, raw: &str) -> Result<Value, QueryError> {
        let Some(ty) = self.columns.get(field) else {
            return Ok(Value::from(raw.to_string()));
        };
        coerce_operand(field, ty, raw)
    }

    /// Typed value for a JSON body value. `None` means SQL NULL.
    ///
    /// # Errors
    /// Returns [`QueryError::InvalidOperand`] when the value doesn't fit the column type.
    pub fn coerce_json(
        &self,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<Option<Value>, QueryError> {
        match value {
            serde_json::Value::Null => Ok(None),
            serde_json::Value::String(s) => self.coerce(field, s).map(Some),
            other => self.coerce(field, &other.to_string()).map(Some),
        }
    }
}

fn invalid(field: &str, raw: &str, expected: &'static str) -> QueryError {
    QueryError::InvalidOperand {
        field: field.to_string(),
        value: raw.to_string(),
        expected,
    }
}

fn coerce_operand(field: &str, ty: &ColumnType, raw: &str) -> Result<Value, QueryError> {
    match ty {
        ColumnType::TinyInteger
        | ColumnType::SmallInteger
        | ColumnType::Integer
        | ColumnType::BigInteger
        | ColumnType::TinyUnsigned
        | ColumnType::SmallUnsigned
        | ColumnType::Unsigned
        | ColumnType::BigUnsigned => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid(field, raw, "integer")),
        ColumnType::Float | ColumnType::Double | ColumnType::Decimal(_) => raw
            .trim()
            .parse::<f64>()
            .map(Value::from)
            .map_err(|_| invalid(field, raw, "number")),
        ColumnType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::from(true)),
            "false" | "0" => Ok(Value::from(false)),
            _ => Err(invalid(field, raw, "boolean")),
        },
        ColumnType::Uuid => uuid::Uuid::parse_str(raw.trim())
            .map(Value::from)
            .map_err(|_| invalid(field, raw, "uuid")),
        _ => Ok(Value::from(raw.to_string())),
    }
}
