//! Query features shared by every collection endpoint
//!
//! A raw query string such as `difficulty=easy&duration[gte]=5&sort=-price&page=2`
//! is refined step by step into a [`Retrieval`]:
//!
//! ```ignore
//! let retrieval = ApiFeatures::new(&query, TourRepository::FIELDS, Retrieval::new())
//!     .filter()
//!     .sort()
//!     .limit_fields()
//!     .paginate()
//!     .build();
//! ```
//!
//! The retrieval then renders itself into a `QueryBuilder` after the
//! repository's scoped base query, and projects each serialized record.
//! Nothing here fails: unknown keys are ignored and bad numbers fall back to
//! defaults. Filter values are bound as text and cast by PostgreSQL, so a
//! malformed value surfaces later as a data error.

use serde_json::{Map, Value};
use sqlx::{Postgres, QueryBuilder};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 100;
pub const DEFAULT_SORT: &str = "-createdAt";

/// Keys consumed by sorting, projection and pagination instead of filtering
const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Internal counter hidden by the default projection
const VERSION_FIELD: &str = "version";

/// A field clients may filter or sort on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Name on the wire, e.g. `maxGroupSize`
    pub name: &'static str,
    /// Column in the table, e.g. `max_group_size`
    pub column: &'static str,
    /// PostgreSQL type the bound text is cast to
    pub sql_type: &'static str,
}

impl FieldSpec {
    pub const fn new(name: &'static str, column: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            column,
            sql_type,
        }
    }
}

fn lookup<'f>(fields: &'f [FieldSpec], name: &str) -> Option<&'f FieldSpec> {
    fields.iter().find(|field| field.name == name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Gte,
    Gt,
    Lte,
    Lt,
}

impl Comparison {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "gte" => Some(Comparison::Gte),
            "gt" => Some(Comparison::Gt),
            "lte" => Some(Comparison::Lte),
            "lt" => Some(Comparison::Lt),
            _ => None,
        }
    }

    fn operator(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Gte => ">=",
            Comparison::Gt => ">",
            Comparison::Lte => "<=",
            Comparison::Lt => "<",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: &'static str,
    pub comparison: Comparison,
    pub value: String,
    pub sql_type: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: &'static str,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    /// Everything except the internal version field
    #[default]
    Default,
    /// Only these fields (plus `id`)
    Include(Vec<String>),
    /// Everything except these fields
    Exclude(Vec<String>),
}

/// A refined data-access request
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieval {
    pub conditions: Vec<Condition>,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub page: i64,
    pub limit: i64,
}

impl Default for Retrieval {
    fn default() -> Self {
        Self {
            conditions: Vec::new(),
            sort: Vec::new(),
            projection: Projection::Default,
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Retrieval {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-filter applied before any client supplied condition
    pub fn scoped(mut self, column: &'static str, value: impl ToString, sql_type: &'static str) -> Self {
        self.conditions.push(Condition {
            column,
            comparison: Comparison::Eq,
            value: value.to_string(),
            sql_type,
        });
        self
    }

    /// Rows skipped before the current page, saturating instead of overflowing
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.limit)
    }

    /// Append ` AND <column> <op> CAST($n AS <type>)` for every condition.
    /// The builder must already hold a `WHERE` clause.
    pub fn push_conditions(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        for condition in &self.conditions {
            builder
                .push(" AND ")
                .push(condition.column)
                .push(" ")
                .push(condition.comparison.operator())
                .push(" CAST(")
                .push_bind(condition.value.clone())
                .push(" AS ")
                .push(condition.sql_type)
                .push(")");
        }
    }

    /// Append the ordering, with `id` as the final tiebreaker
    pub fn push_order(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" ORDER BY ");
        for key in &self.sort {
            builder
                .push(key.column)
                .push(if key.descending { " DESC, " } else { " ASC, " });
        }
        builder.push("id");
    }

    pub fn push_page(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder
            .push(" LIMIT ")
            .push_bind(self.limit)
            .push(" OFFSET ")
            .push_bind(self.offset());
    }

    /// Apply the field projection to one serialized record
    pub fn project(&self, record: Value) -> Value {
        let Value::Object(map) = record else {
            return record;
        };

        let projected: Map<String, Value> = match &self.projection {
            Projection::Default => map
                .into_iter()
                .filter(|(key, _)| key != VERSION_FIELD)
                .collect(),
            Projection::Include(fields) => map
                .into_iter()
                .filter(|(key, _)| key == "id" || fields.iter().any(|f| f == key))
                .collect(),
            Projection::Exclude(fields) => map
                .into_iter()
                .filter(|(key, _)| !fields.iter().any(|f| f == key))
                .collect(),
        };

        Value::Object(projected)
    }
}

/// Chainable builder over the raw query pairs
pub struct ApiFeatures<'a> {
    query: &'a [(String, String)],
    fields: &'a [FieldSpec],
    retrieval: Retrieval,
}

impl<'a> ApiFeatures<'a> {
    pub fn new(query: &'a [(String, String)], fields: &'a [FieldSpec], base: Retrieval) -> Self {
        Self {
            query,
            fields,
            retrieval: base,
        }
    }

    /// Last occurrence wins when a reserved key is repeated
    fn reserved(&self, key: &str) -> Option<&'a str> {
        self.query
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Equality and range conditions from every non-reserved key
    pub fn filter(mut self) -> Self {
        for (key, value) in self.query {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }

            let Some((name, comparison)) = parse_filter_key(key) else {
                continue;
            };
            let Some(field) = lookup(self.fields, name) else {
                continue;
            };

            self.retrieval.conditions.push(Condition {
                column: field.column,
                comparison,
                value: value.clone(),
                sql_type: field.sql_type,
            });
        }
        self
    }

    pub fn sort(mut self) -> Self {
        let requested = self.reserved("sort").unwrap_or(DEFAULT_SORT);
        let mut keys = parse_sort(requested, self.fields);
        if keys.is_empty() {
            keys = parse_sort(DEFAULT_SORT, self.fields);
        }
        self.retrieval.sort = keys;
        self
    }

    pub fn limit_fields(mut self) -> Self {
        let names: Vec<&str> = self
            .reserved("fields")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();

        self.retrieval.projection = if names.is_empty() {
            Projection::Default
        } else if names.iter().all(|name| name.starts_with('-')) {
            Projection::Exclude(names.iter().map(|n| n[1..].to_string()).collect())
        } else {
            Projection::Include(
                names
                    .iter()
                    .filter(|n| !n.starts_with('-'))
                    .map(|n| n.to_string())
                    .collect(),
            )
        };
        self
    }

    /// A page whose offset does not fit in an i64 falls back to the first page
    pub fn paginate(mut self) -> Self {
        let limit = positive(self.reserved("limit")).unwrap_or(DEFAULT_LIMIT);
        let page = positive(self.reserved("page"))
            .filter(|page| (page - 1).checked_mul(limit).is_some())
            .unwrap_or(DEFAULT_PAGE);

        self.retrieval.page = page;
        self.retrieval.limit = limit;
        self
    }

    pub fn build(self) -> Retrieval {
        self.retrieval
    }
}

/// `duration[gte]` -> (`duration`, Gte); `difficulty` -> (`difficulty`, Eq)
fn parse_filter_key(key: &str) -> Option<(&str, Comparison)> {
    match key.split_once('[') {
        None => Some((key, Comparison::Eq)),
        Some((name, rest)) => {
            let suffix = rest.strip_suffix(']')?;
            Some((name, Comparison::from_suffix(suffix)?))
        }
    }
}

fn parse_sort(raw: &str, fields: &[FieldSpec]) -> Vec<SortKey> {
    raw.split(',')
        .map(str::trim)
        .filter_map(|name| {
            let (name, descending) = match name.strip_prefix('-') {
                Some(stripped) => (stripped, true),
                None => (name, false),
            };
            lookup(fields, name).map(|field| SortKey {
                column: field.column,
                descending,
            })
        })
        .collect()
}

fn positive(raw: Option<&str>) -> Option<i64> {
    raw?.trim().parse::<i64>().ok().filter(|n| *n > 0)
}
