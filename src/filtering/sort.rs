use super::schema::ColumnSchema;
use sea_orm::{
    QueryOrder,
    sea_query::{Alias, Expr, Order as SortDirection, SimpleExpr},
};

pub const DEFAULT_SORT_COLUMN: &str = "id";

/// One sort key. The first order in a sequence is the primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub desc: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            desc: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            desc: true,
        }
    }

    /// `direction` is compared case-insensitively to `desc`; anything else is ascending.
    pub fn from_direction(column: impl Into<String>, direction: &str) -> Self {
        Self {
            column: column.into(),
            desc: direction.eq_ignore_ascii_case("desc"),
        }
    }

    /// Sort by this key. Columns are qualified with `table`.
    pub fn apply<S: QueryOrder>(&self, query: S, table: &str) -> S {
        let direction = if self.desc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        let column: SimpleExpr =
            Expr::col((Alias::new(table), Alias::new(self.column.as_str()))).into();
        query.order_by(column, direction)
    }
}

/// The order used when the request names none.
#[must_use]
pub fn default_orders() -> Vec<Order> {
    vec![Order::asc(DEFAULT_SORT_COLUMN)]
}

/// Apply `orders` in sequence, skipping columns the model doesn't have.
pub fn apply_orders<S: QueryOrder>(mut query: S, orders: &[Order], schema: &ColumnSchema) -> S {
    for order in orders {
        if schema.has_column(&order.column) {
            query = order.apply(query, schema.table());
        } else {
            tracing::warn!(
                table = schema.table(),
                column = %order.column,
                "Ignoring sort on unknown column"
            );
        }
    }
    query
}
