use super::filter::{FilterSet, Verb};
use super::pagination::Pagination;
use super::schema::ColumnSchema;
use super::sort::{Order, apply_orders, default_orders};
use crate::errors::QueryError;
use sea_orm::{
    Condition, DbBackend, QueryFilter, QueryOrder, QuerySelect, Value,
    sea_query::{Alias, Expr, Func, LikeExpr, SimpleExpr},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A single predicate on one column, independent of every other clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    /// Case-insensitive substring match.
    Like {
        column: String,
        pattern: String,
        negated: bool,
    },
    /// OR of substring matches.
    AnyLike {
        column: String,
        patterns: Vec<String>,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
        negated: bool,
    },
    Regex {
        column: String,
        pattern: String,
    },
    FullText {
        column: String,
        query: String,
    },
    IsNull {
        column: String,
    },
}

/// Escape character for LIKE patterns. Backslash quoting differs per backend, `!` doesn't.
pub const LIKE_ESCAPE: char = '!';

/// Escape LIKE wildcards so user input matches literally.
#[must_use]
pub fn escape_like_wildcards(input: &str) -> String {
    input
        .replace(LIKE_ESCAPE, "!!")
        .replace('%', "!%")
        .replace('_', "!_")
}

fn column_expr(table: &str, column: &str) -> Expr {
    Expr::col((Alias::new(table), Alias::new(column)))
}

fn contains_like(table: &str, column: &str, needle: &str, negated: bool) -> SimpleExpr {
    let pattern = format!("%{}%", escape_like_wildcards(needle).to_uppercase());
    let upper = Expr::expr(Func::upper(column_expr(table, column)));
    let like = LikeExpr::new(pattern).escape(LIKE_ESCAPE);
    if negated {
        upper.not_like(like)
    } else {
        upper.like(like)
    }
}

impl Clause {
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Compare { column, .. }
            | Self::In { column, .. }
            | Self::Like { column, .. }
            | Self::AnyLike { column, .. }
            | Self::Between { column, .. }
            | Self::Regex { column, .. }
            | Self::FullText { column, .. }
            | Self::IsNull { column } => column,
        }
    }

    /// Render against `table` for `backend`.
    #[must_use]
    pub fn to_condition(&self, table: &str, backend: DbBackend) -> Condition {
        let expr = match self {
            Self::Compare { column, op, value } => {
                let col = column_expr(table, column);
                let value = value.clone();
                match op {
                    CompareOp::Eq => col.eq(value),
                    CompareOp::Ne => col.ne(value),
                    CompareOp::Gt => col.gt(value),
                    CompareOp::Gte => col.gte(value),
                    CompareOp::Lt => col.lt(value),
                    CompareOp::Lte => col.lte(value),
                }
            }
            Self::In {
                column,
                values,
                negated,
            } => {
                let col = column_expr(table, column);
                if *negated {
                    col.is_not_in(values.clone())
                } else {
                    col.is_in(values.clone())
                }
            }
            Self::Like {
                column,
                pattern,
                negated,
            } => contains_like(table, column, pattern, *negated),
            Self::AnyLike { column, patterns } => {
                return patterns
                    .iter()
                    .fold(Condition::any(), |cond, pattern| {
                        cond.add(contains_like(table, column, pattern, false))
                    });
            }
            Self::Between {
                column,
                low,
                high,
                negated,
            } => {
                let col = column_expr(table, column);
                if *negated {
                    col.not_between(low.clone(), high.clone())
                } else {
                    col.between(low.clone(), high.clone())
                }
            }
            Self::Regex { column, pattern } => {
                let sql = match backend {
                    DbBackend::Postgres => "$1 ~* $2",
                    _ => "$1 REGEXP $2",
                };
                Expr::cust_with_exprs(
                    sql,
                    [
                        column_expr(table, column).into(),
                        SimpleExpr::Value(Value::from(pattern.clone())),
                    ],
                )
            }
            Self::FullText { column, query } => match backend {
                DbBackend::Postgres => Expr::cust_with_exprs(
                    "$1 @@ to_tsquery($2)",
                    [
                        column_expr(table, column).into(),
                        SimpleExpr::Value(Value::from(query.clone())),
                    ],
                ),
                _ => contains_like(table, column, query, false),
            },
            Self::IsNull { column } => column_expr(table, column).is_null(),
        };
        Condition::all().add(expr)
    }
}

impl ColumnSchema {
    /// Compile filters into clauses, in field order then verb order.
    ///
    /// Fields that aren't columns are skipped, except full-text fields with a
    /// declared index override.
    ///
    /// # Errors
    /// Returns [`QueryError::InvalidOperand`] when an operand doesn't fit its column type.
    pub fn compile(&self, filters: &FilterSet) -> Result<Vec<Clause>, QueryError> {
        let mut clauses = Vec::new();
        for (field, filter) in filters {
            for (verb, operands) in filter.active_slots() {
                if verb == Verb::FullText && self.has_fulltext_override(field) {
                    clauses.push(Clause::FullText {
                        column: self.fulltext_column(field).to_string(),
                        query: operands[0].clone(),
                    });
                    continue;
                }
                if !self.has_column(field) {
                    tracing::warn!(
                        table = self.table(),
                        field = %field,
                        verb = verb.as_str(),
                        "Ignoring filter on unknown column"
                    );
                    continue;
                }
                self.compile_slot(field, verb, operands, &mut clauses)?;
            }
            if filter.is_null() {
                if self.has_column(field) {
                    clauses.push(Clause::IsNull {
                        column: field.clone(),
                    });
                } else {
                    tracing::warn!(
                        table = self.table(),
                        field = %field,
                        "Ignoring null test on unknown column"
                    );
                }
            }
        }
        Ok(clauses)
    }

    fn compile_slot(
        &self,
        field: &str,
        verb: Verb,
        operands: &[String],
        clauses: &mut Vec<Clause>,
    ) -> Result<(), QueryError> {
        let column = field.to_string();
        let first = &operands[0];
        let compare = |op: CompareOp| -> Result<Clause, QueryError> {
            Ok(Clause::Compare {
                column: field.to_string(),
                op,
                value: self.coerce(field, first)?,
            })
        };
        match verb {
            Verb::Eq => clauses.push(compare(CompareOp::Eq)?),
            Verb::Ne => clauses.push(compare(CompareOp::Ne)?),
            Verb::Gt => clauses.push(compare(CompareOp::Gt)?),
            Verb::Gte => clauses.push(compare(CompareOp::Gte)?),
            Verb::Lt => clauses.push(compare(CompareOp::Lt)?),
            Verb::Lte => clauses.push(compare(CompareOp::Lte)?),
            Verb::Like | Verb::NotLike => clauses.push(Clause::Like {
                column,
                pattern: first.clone(),
                negated: verb == Verb::NotLike,
            }),
            Verb::LikeAny => clauses.push(Clause::AnyLike {
                column,
                patterns: operands.to_vec(),
            }),
            Verb::Between | Verb::NotBetween => {
                for pair in operands.chunks_exact(2) {
                    clauses.push(Clause::Between {
                        column: column.clone(),
                        low: self.coerce(field, &pair[0])?,
                        high: self.coerce(field, &pair[1])?,
                        negated: verb == Verb::NotBetween,
                    });
                }
            }
            Verb::In | Verb::NotIn => clauses.push(Clause::In {
                column,
                values: operands
                    .iter()
                    .map(|raw| self.coerce(field, raw))
                    .collect::<Result<_, _>>()?,
                negated: verb == Verb::NotIn,
            }),
            Verb::Regex => clauses.push(Clause::Regex {
                column,
                pattern: first.clone(),
            }),
            Verb::FullText => clauses.push(Clause::FullText {
                column: self.fulltext_column(field).to_string(),
                query: first.clone(),
            }),
            // Carried as a flag on the filter, never as a slot
            Verb::IsNull => {}
        }
        Ok(())
    }

    /// AND every compiled clause into one condition.
    ///
    /// # Errors
    /// See [`ColumnSchema::compile`].
    pub fn condition(
        &self,
        filters: &FilterSet,
        backend: DbBackend,
    ) -> Result<Condition, QueryError> {
        Ok(self
            .compile(filters)?
            .iter()
            .fold(Condition::all(), |cond, clause| {
                cond.add(clause.to_condition(self.table(), backend))
            }))
    }
}

/// Everything one list request asks for, parsed once and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct FindConditions {
    pub filters: FilterSet,
    pub orders: Vec<Order>,
    pub pagination: Pagination,
    /// Relation names to eager-load alongside the rows.
    pub embeds: Vec<String>,
}

impl Default for FindConditions {
    fn default() -> Self {
        Self {
            filters: FilterSet::new(),
            orders: default_orders(),
            pagination: Pagination::default(),
            embeds: Vec::new(),
        }
    }
}

impl FindConditions {
    /// Filters, then orders, then pagination.
    ///
    /// # Errors
    /// See [`ColumnSchema::compile`].
    pub fn apply<S>(
        &self,
        query: S,
        schema: &ColumnSchema,
        backend: DbBackend,
    ) -> Result<S, QueryError>
    where
        S: QueryFilter + QueryOrder + QuerySelect,
    {
        let query = apply_filters(query, &self.filters, schema, backend)?;
        let query = apply_orders(query, &self.orders, schema);
        Ok(self.pagination.apply(query))
    }
}

/// Filters only, as used for counts.
///
/// # Errors
/// See [`ColumnSchema::compile`].
pub fn apply_filters<S: QueryFilter>(
    query: S,
    filters: &FilterSet,
    schema: &ColumnSchema,
    backend: DbBackend,
) -> Result<S, QueryError> {
    if filters.values().all(super::filter::Filter::is_inert) {
        return Ok(query);
    }
    Ok(query.filter(schema.condition(filters, backend)?))
}
