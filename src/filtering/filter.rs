use std::collections::BTreeMap;

/// Predicate verbs a filter slot can carry.
///
/// The declaration order is the order clauses are emitted in for a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verb {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
    /// Substring match against any operand, ORed.
    LikeAny,
    Between,
    NotBetween,
    In,
    NotIn,
    Regex,
    FullText,
    IsNull,
}

impl Verb {
    /// Resolve a `field[verb]` token. Unknown tokens yield `None`.
    #[must_use]
    pub fn from_bracket(token: &str) -> Option<Self> {
        let verb = match token {
            "eq" => Self::Eq,
            "ne" | "neq" => Self::Ne,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "like" => Self::Like,
            "nlike" | "not_like" => Self::NotLike,
            "inc_any" => Self::LikeAny,
            "between" => Self::Between,
            "nbetween" | "not_between" => Self::NotBetween,
            "in" => Self::In,
            "nin" | "not_in" => Self::NotIn,
            "regex" => Self::Regex,
            "ts" | "q" => Self::FullText,
            "null" | "is_null" => Self::IsNull,
            _ => return None,
        };
        Some(verb)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Like => "like",
            Self::NotLike => "not_like",
            Self::LikeAny => "inc_any",
            Self::Between => "between",
            Self::NotBetween => "not_between",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Regex => "regex",
            Self::FullText => "q",
            Self::IsNull => "is_null",
        }
    }
}

/// A single-field predicate made of verb slots.
///
/// A slot with no operands contributes nothing. `IsNull` is a flag rather than
/// a slot since it never reads its operand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    slots: BTreeMap<Verb, Vec<String>>,
    is_null: bool,
}

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the operands of one slot.
    pub fn set(&mut self, verb: Verb, operands: Vec<String>) {
        if verb == Verb::IsNull {
            self.is_null = true;
        } else {
            self.slots.insert(verb, operands);
        }
    }

    /// Builder form of [`Filter::set`].
    #[must_use]
    pub fn with(mut self, verb: Verb, operands: Vec<String>) -> Self {
        self.set(verb, operands);
        self
    }

    #[must_use]
    pub fn operands(&self, verb: Verb) -> &[String] {
        self.slots.get(&verb).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.is_null
    }

    /// Slots that will produce at least one clause, in verb order.
    pub fn active_slots(&self) -> impl Iterator<Item = (Verb, &[String])> {
        self.slots
            .iter()
            .filter(|(_, operands)| !operands.is_empty())
            .map(|(verb, operands)| (*verb, operands.as_slice()))
    }

    #[must_use]
    pub fn is_inert(&self) -> bool {
        !self.is_null && self.active_slots().next().is_none()
    }
}

/// Field name to filter. Keys are unique; iteration is by field name.
pub type FilterSet = BTreeMap<String, Filter>;

/// Record `operands` under `field`/`verb`, merging with any slots already present.
pub fn insert_filter(set: &mut FilterSet, field: &str, verb: Verb, operands: Vec<String>) {
    set.entry(field.to_string())
        .or_default()
        .set(verb, operands);
}

/// Immutable suffix table for the `filter={...}` JSON convention.
#[derive(Debug, Clone)]
pub struct VerbTable {
    // Longest suffix first: `x_neq_any` also ends in `_eq_any`.
    entries: Vec<(&'static str, Verb)>,
}

impl VerbTable {
    #[must_use]
    pub fn standard() -> Self {
        Self::from_entries(vec![
            ("_eq", Verb::Eq),
            ("_eq_any", Verb::In),
            ("_neq", Verb::Ne),
            ("_neq_any", Verb::NotIn),
            ("_gt", Verb::Gt),
            ("_gte", Verb::Gte),
            ("_lt", Verb::Lt),
            ("_lte", Verb::Lte),
            ("_like", Verb::LikeAny),
            ("_inc_any", Verb::LikeAny),
            ("_not_like", Verb::NotLike),
            ("_between", Verb::Between),
            ("_not_between", Verb::NotBetween),
            ("_in", Verb::In),
            ("_nin", Verb::NotIn),
            ("_is_null", Verb::IsNull),
            ("_regex", Verb::Regex),
            ("_q", Verb::FullText),
        ])
    }

    #[must_use]
    pub fn from_entries(mut entries: Vec<(&'static str, Verb)>) -> Self {
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
        Self { entries }
    }

    /// Split a key into field and verb. Unknown suffixes mean the whole key is
    /// the field, compared for equality.
    #[must_use]
    pub fn split<'k>(&self, key: &'k str) -> (&'k str, Verb) {
        for (suffix, verb) in &self.entries {
            if let Some(field) = key.strip_suffix(suffix) {
                if !field.is_empty() {
                    return (field, *verb);
                }
            }
        }
        (key, Verb::Eq)
    }
}

impl Default for VerbTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Flatten a JSON filter value into string operands.
#[must_use]
pub fn json_operands(value: &serde_json::Value) -> Vec<String> {
    use serde_json::Value;
    match value {
        Value::Null => Vec::new(),
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().flat_map(json_operands).collect(),
        Value::Bool(_) | Value::Number(_) | Value::Object(_) => vec![value.to_string()],
    }
}
