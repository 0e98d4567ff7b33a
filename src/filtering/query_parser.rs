//! Query-string parsing into [`FindConditions`].
//!
//! Two conventions are supported, selected per deployment:
//!
//! - [`QueryProfile::SimpleRest`]:
//!   `?filter={"name_like":"ssd"}&sort=["name","DESC"]&range=[0,24]&embed=["tags"]`
//! - [`QueryProfile::Bracket`]:
//!   `?name[like]=ssd&order=name&desc=true&page=2&limit=10&embed=["tags"]`

use super::conditions::FindConditions;
use super::filter::{FilterSet, Verb, VerbTable, insert_filter, json_operands};
use super::pagination::{DEFAULT_RANGE, Pagination};
use super::sort::{Order, default_orders};
use crate::errors::QueryError;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(\d+)[-,]\s*(\d+)]$").expect("Invalid range pattern regex")
});

static BRACKET_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z]\w*)(\[(\w+)\])?$").expect("Invalid filter key regex")
});

const RESERVED_BRACKET_KEYS: &[&str] = &["page", "limit", "order", "desc", "embed"];

/// Raw query pairs in request order. Keys may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    #[must_use]
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    #[must_use]
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get_all(key).next()
    }

    pub fn get_all<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a str> {
        self.0
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Query-string convention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryProfile {
    /// JSON `filter`/`sort`/`range`/`embed` parameters with suffix verbs.
    #[default]
    SimpleRest,
    /// `field[verb]=value`, `page`/`limit`, repeated `order`/`desc`.
    Bracket,
}

/// Parser for one profile, owning its immutable suffix table.
#[derive(Debug, Clone)]
pub struct QueryParser {
    profile: QueryProfile,
    verbs: VerbTable,
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new(QueryProfile::default())
    }
}

impl QueryParser {
    #[must_use]
    pub fn new(profile: QueryProfile) -> Self {
        Self {
            profile,
            verbs: VerbTable::standard(),
        }
    }

    #[must_use]
    pub fn with_verbs(mut self, verbs: VerbTable) -> Self {
        self.verbs = verbs;
        self
    }

    #[must_use]
    pub const fn profile(&self) -> QueryProfile {
        self.profile
    }

    /// # Errors
    /// Returns a [`QueryError`] for malformed sort, range, paging or embed parameters.
    pub fn parse(&self, params: &QueryParams) -> Result<FindConditions, QueryError> {
        match self.profile {
            QueryProfile::SimpleRest => self.parse_simple_rest(params),
            QueryProfile::Bracket => parse_bracket(params),
        }
    }

    fn parse_simple_rest(&self, params: &QueryParams) -> Result<FindConditions, QueryError> {
        Ok(FindConditions {
            filters: params
                .first("filter")
                .map(|raw| self.parse_filter_json(raw))
                .unwrap_or_default(),
            orders: match params.first("sort") {
                Some(raw) => parse_sort_json(raw)?,
                None => default_orders(),
            },
            pagination: parse_range(params.first("range"))?,
            embeds: parse_embed(params.first("embed"))?,
        })
    }

    /// Malformed JSON yields no filters rather than an error.
    #[must_use]
    pub fn parse_filter_json(&self, raw: &str) -> FilterSet {
        let object = match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Object(object)) => object,
            Ok(_) => {
                tracing::warn!(filter = raw, "Ignoring filter that is not a JSON object");
                return FilterSet::new();
            }
            Err(err) => {
                tracing::warn!(filter = raw, error = %err, "Ignoring malformed filter JSON");
                return FilterSet::new();
            }
        };

        let mut filters = FilterSet::new();
        for (key, value) in &object {
            let (field, verb) = self.verbs.split(key);
            insert_filter(&mut filters, field, verb, json_operands(value));
        }
        filters
    }
}

/// `[start-end]` or `[start,end]`. Absent or unmatched tokens give the default range.
///
/// # Errors
/// Returns [`QueryError::InvalidNumber`] when a bound overflows.
pub fn parse_range(raw: Option<&str>) -> Result<Pagination, QueryError> {
    let Some(captures) = raw.and_then(|raw| RANGE_PATTERN.captures(raw)) else {
        return Ok(DEFAULT_RANGE);
    };
    let bound = |index: usize| -> Result<i64, QueryError> {
        let digits = &captures[index];
        digits.parse::<i32>().map(i64::from).map_err(|_| QueryError::InvalidNumber {
            param: "range".to_string(),
            value: digits.to_string(),
        })
    };
    Ok(Pagination::range(bound(1)?, bound(2)?))
}

/// `["field","asc|desc",...]`.
///
/// # Errors
/// Returns [`QueryError::SortPairs`] for odd-length arrays.
pub fn parse_sort_json(raw: &str) -> Result<Vec<Order>, QueryError> {
    let items: Vec<String> =
        serde_json::from_str(raw).map_err(|source| QueryError::InvalidJson {
            param: "sort",
            source,
        })?;
    if items.len() % 2 != 0 {
        return Err(QueryError::SortPairs);
    }
    Ok(items
        .chunks_exact(2)
        .map(|pair| Order::from_direction(pair[0].as_str(), &pair[1]))
        .collect())
}

/// Optional JSON array of relation names.
///
/// # Errors
/// Returns [`QueryError::InvalidJson`] when the value isn't a string array.
pub fn parse_embed(raw: Option<&str>) -> Result<Vec<String>, QueryError> {
    raw.map_or_else(
        || Ok(Vec::new()),
        |raw| {
            serde_json::from_str(raw).map_err(|source| QueryError::InvalidJson {
                param: "embed",
                source,
            })
        },
    )
}

fn parse_int(param: &str, raw: Option<&str>, default: i64) -> Result<i64, QueryError> {
    raw.map_or(Ok(default), |value| {
        value.trim().parse::<i32>().map(i64::from).map_err(|_| QueryError::InvalidNumber {
            param: param.to_string(),
            value: value.to_string(),
        })
    })
}

fn parse_bool(param: &str, value: &str) -> Result<bool, QueryError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(QueryError::InvalidBool {
            param: param.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Repeated `order=field&desc=bool` pairs.
///
/// # Errors
/// Returns [`QueryError::OrderDescMismatch`] when `desc` is given a different number of times than `order`.
pub fn parse_order_desc(params: &QueryParams) -> Result<Vec<Order>, QueryError> {
    let columns: Vec<&str> = params.get_all("order").collect();
    let descs = params
        .get_all("desc")
        .map(|value| parse_bool("desc", value))
        .collect::<Result<Vec<_>, _>>()?;

    if columns.is_empty() && descs.is_empty() {
        return Ok(default_orders());
    }
    if !descs.is_empty() && descs.len() != columns.len() {
        return Err(QueryError::OrderDescMismatch {
            orders: columns.len(),
            descs: descs.len(),
        });
    }
    Ok(columns
        .iter()
        .enumerate()
        .map(|(i, column)| Order {
            column: (*column).to_string(),
            desc: descs.get(i).copied().unwrap_or(false),
        })
        .collect())
}

fn parse_bracket(params: &QueryParams) -> Result<FindConditions, QueryError> {
    let page = parse_int("page", params.first("page"), 1)?;
    let limit = parse_int("limit", params.first("limit"), 0)?;

    // Operands for one (field, verb) collect in request order
    let mut slots: BTreeMap<(String, Verb), Vec<String>> = BTreeMap::new();
    for (key, value) in params.iter() {
        if RESERVED_BRACKET_KEYS.contains(&key) {
            continue;
        }
        let Some(captures) = BRACKET_KEY_PATTERN.captures(key) else {
            continue;
        };
        let field = &captures[1];
        let verb = match captures.get(3) {
            None => Verb::Eq,
            Some(token) => match Verb::from_bracket(token.as_str()) {
                Some(verb) => verb,
                None => {
                    tracing::debug!(key, "Ignoring unknown filter verb");
                    continue;
                }
            },
        };
        slots
            .entry((field.to_string(), verb))
            .or_default()
            .push(value.to_string());
    }

    let mut filters = FilterSet::new();
    for ((field, verb), operands) in slots {
        insert_filter(&mut filters, &field, verb, operands);
    }

    Ok(FindConditions {
        filters,
        orders: parse_order_desc(params)?,
        pagination: Pagination::page(page, limit),
        embeds: parse_embed(params.first("embed"))?,
    })
}
