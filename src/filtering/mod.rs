pub mod conditions;
pub mod filter;
pub mod pagination;
pub mod query_parser;
pub mod schema;
pub mod sort;

pub use conditions::{Clause, CompareOp, FindConditions, apply_filters, escape_like_wildcards};
pub use filter::{Filter, FilterSet, Verb, VerbTable, insert_filter};
pub use pagination::{Pagination, content_range, content_range_headers};
pub use query_parser::{QueryParams, QueryParser, QueryProfile};
pub use schema::ColumnSchema;
pub use sort::Order;
