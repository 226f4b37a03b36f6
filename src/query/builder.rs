use std::fmt;

use serde_json::Value;
use tracing::{debug, warn};

use super::params::{QueryParams, QueryValue};
use crate::error::{AppError, AppResult};

pub const RESERVED_KEYS: [&str; 4] = ["sort", "select", "page", "limit"];
pub const DEFAULT_SORT: &str = "-price";
pub const VERSION_FIELD: &str = "version";
pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Ne,
}

impl Operator {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "gt" => Some(Operator::Gt),
            "gte" => Some(Operator::Gte),
            "lt" => Some(Operator::Lt),
            "lte" => Some(Operator::Lte),
            "ne" => Some(Operator::Ne),
            _ => None,
        }
    }

    /// Operator name with the query-engine prefix, e.g. `$gte`.
    pub fn prefixed(self) -> &'static str {
        match self {
            Operator::Eq => "$eq",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::Ne => "$ne",
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Ne => "<>",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    pub field: String,
    pub op: Operator,
    pub value: String,
}

impl fmt::Display for FieldFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.op.prefixed(), self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    /// Shapes one serialized document; `id` always survives an include list.
    pub fn apply(&self, value: Value) -> Value {
        let Value::Object(mut map) = value else {
            return value;
        };
        match self {
            Projection::Include(fields) => {
                map.retain(|k, _| k == "id" || fields.iter().any(|f| f == k));
            }
            Projection::Exclude(fields) => {
                for f in fields {
                    map.remove(f);
                }
            }
        }
        Value::Object(map)
    }
}

/// A composed, not yet executed request against a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub filters: Vec<FieldFilter>,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub skip: u64,
    pub limit: u64,
}

impl Default for QueryDescriptor {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: parse_sort(DEFAULT_SORT),
            projection: Projection::Exclude(vec![VERSION_FIELD.to_string()]),
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_sort(raw: &str) -> Vec<SortKey> {
    split_list(raw)
        .filter_map(|part| {
            let (field, direction) = match part.strip_prefix('-') {
                Some(rest) => (rest, Direction::Desc),
                None => (part.trim_start_matches('+'), Direction::Asc),
            };
            (!field.is_empty()).then(|| SortKey {
                field: field.to_string(),
                direction,
            })
        })
        .collect()
}

fn positive(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

/// Builds a [`QueryDescriptor`] stage by stage from a parsed query string.
pub struct FilterBuilder<'a> {
    params: &'a QueryParams,
    max_filter_keys: usize,
    descriptor: QueryDescriptor,
}

impl<'a> FilterBuilder<'a> {
    pub fn new(params: &'a QueryParams, max_filter_keys: usize) -> Self {
        Self {
            params,
            max_filter_keys,
            descriptor: QueryDescriptor::default(),
        }
    }

    pub fn filter(mut self) -> AppResult<Self> {
        let keys: Vec<_> = self
            .params
            .iter()
            .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
            .collect();

        // Too many keys: no filter at all, the remaining stages still run.
        if keys.len() >= self.max_filter_keys {
            warn!(
                keys = keys.len(),
                cap = self.max_filter_keys,
                "filter key count reached the cap; filtering skipped"
            );
            return Ok(self);
        }

        for (field, value) in keys {
            match value {
                QueryValue::Scalar(v) => self.descriptor.filters.push(FieldFilter {
                    field: field.clone(),
                    op: Operator::Eq,
                    value: v.clone(),
                }),
                QueryValue::Nested(ops) => {
                    for (raw_op, v) in ops {
                        let op = Operator::parse(raw_op).ok_or_else(|| {
                            AppError::bad_request(format!(
                                "The operator '{raw_op}' is not supported on {field}."
                            ))
                        })?;
                        self.descriptor.filters.push(FieldFilter {
                            field: field.clone(),
                            op,
                            value: v.clone(),
                        });
                    }
                }
            }
        }
        Ok(self)
    }

    pub fn sort(mut self) -> Self {
        if let Some(raw) = self.params.scalar("sort") {
            let keys = parse_sort(raw);
            if !keys.is_empty() {
                self.descriptor.sort = keys;
            }
        }
        self
    }

    pub fn select(mut self) -> Self {
        if let Some(raw) = self.params.scalar("select") {
            let (excluded, included): (Vec<&str>, Vec<&str>) =
                split_list(raw).partition(|f| f.starts_with('-'));
            if !included.is_empty() {
                self.descriptor.projection =
                    Projection::Include(included.into_iter().map(String::from).collect());
            } else if !excluded.is_empty() {
                self.descriptor.projection = Projection::Exclude(
                    excluded
                        .into_iter()
                        .map(|f| f.trim_start_matches('-').to_string())
                        .collect(),
                );
            }
        }
        self
    }

    pub fn paginate(mut self) -> Self {
        let page = positive(self.params.scalar("page"), DEFAULT_PAGE);
        let limit = positive(self.params.scalar("limit"), DEFAULT_LIMIT);
        self.descriptor.limit = limit;
        self.descriptor.skip = (page - 1).saturating_mul(limit);
        self
    }

    pub fn build(self) -> QueryDescriptor {
        let filters = self
            .descriptor
            .filters
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        debug!(
            %filters,
            sort = ?self.descriptor.sort,
            skip = self.descriptor.skip,
            limit = self.descriptor.limit,
            "query descriptor built"
        );
        self.descriptor
    }
}

/// Runs every stage in order.
pub fn describe(params: &QueryParams, max_filter_keys: usize) -> AppResult<QueryDescriptor> {
    Ok(FilterBuilder::new(params, max_filter_keys)
        .filter()?
        .sort()
        .select()
        .paginate()
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(items: &[(&str, &str)]) -> QueryParams {
        QueryParams::from_pairs(items.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    #[test]
    fn range_sort_and_page() {
        let q = params(&[
            ("price[gte]", "100"),
            ("sort", "price"),
            ("page", "2"),
            ("limit", "5"),
        ]);
        let d = describe(&q, 6).expect("descriptor");

        assert_eq!(
            d.filters,
            vec![FieldFilter {
                field: "price".into(),
                op: Operator::Gte,
                value: "100".into(),
            }]
        );
        assert_eq!(d.filters[0].to_string(), "price $gte 100");
        assert_eq!(
            d.sort,
            vec![SortKey {
                field: "price".into(),
                direction: Direction::Asc,
            }]
        );
        assert_eq!(d.skip, 5);
        assert_eq!(d.limit, 5);
    }

    #[test]
    fn defaults_apply_without_reserved_keys() {
        let d = describe(&QueryParams::default(), 6).expect("descriptor");
        assert!(d.filters.is_empty());
        assert_eq!(
            d.sort,
            vec![SortKey {
                field: "price".into(),
                direction: Direction::Desc,
            }]
        );
        assert_eq!(d.projection, Projection::Exclude(vec!["version".into()]));
        assert_eq!((d.skip, d.limit), (0, 100));
    }

    #[test]
    fn filtering_is_skipped_when_key_count_reaches_cap() {
        // Deliberately a silent no-op rather than a rejection.
        let q = params(&[
            ("a", "1"),
            ("b", "2"),
            ("c", "3"),
            ("sort", "name"),
            ("limit", "3"),
        ]);
        let d = describe(&q, 3).expect("descriptor");
        assert!(d.filters.is_empty());
        assert_eq!(d.sort[0].field, "name");
        assert_eq!(d.limit, 3);

        let under_cap = describe(&q, 4).expect("descriptor");
        assert_eq!(under_cap.filters.len(), 3);
    }

    #[test]
    fn every_nested_operator_is_kept() {
        let q = params(&[("price[gte]", "100"), ("price[lt]", "500")]);
        let d = describe(&q, 6).expect("descriptor");
        let ops: Vec<_> = d.filters.iter().map(|f| f.op).collect();
        assert_eq!(ops, vec![Operator::Gte, Operator::Lt]);
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let q = params(&[("price[regex]", "1")]);
        assert!(describe(&q, 6).is_err());
    }

    #[test]
    fn pagination_falls_back_on_non_positive_values() {
        let q = params(&[("page", "0"), ("limit", "-4")]);
        let d = describe(&q, 6).expect("descriptor");
        assert_eq!((d.skip, d.limit), (0, 100));

        let q = params(&[("page", "three")]);
        assert_eq!(describe(&q, 6).expect("descriptor").skip, 0);
    }

    #[test]
    fn select_projects_documents() {
        let q = params(&[("select", "name, price")]);
        let d = describe(&q, 6).expect("descriptor");
        let shaped = d
            .projection
            .apply(json!({"id": "t1", "name": "Sea Explorer", "price": 497, "version": 0}));
        assert_eq!(shaped, json!({"id": "t1", "name": "Sea Explorer", "price": 497}));

        let q = params(&[("select", "-summary")]);
        let d = describe(&q, 6).expect("descriptor");
        assert_eq!(d.projection, Projection::Exclude(vec!["summary".into()]));
    }

    #[test]
    fn multi_key_sort() {
        let q = params(&[("sort", "price,-ratingsAverage")]);
        let d = describe(&q, 6).expect("descriptor");
        assert_eq!(d.sort.len(), 2);
        assert_eq!(d.sort[1].direction, Direction::Desc);
        assert_eq!(d.sort[1].field, "ratingsAverage");
    }
}
