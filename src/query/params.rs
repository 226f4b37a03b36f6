use std::collections::BTreeMap;

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};

use crate::error::AppError;

/// A query-string value: `price=500` or `price[gte]=500`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Scalar(String),
    Nested(BTreeMap<String, String>),
}

/// Parsed query string, keyed by field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, QueryValue>);

/// Splits `price[gte]` into `("price", Some("gte"))`.
fn split_key(raw: &str) -> (&str, Option<&str>) {
    if let Some(open) = raw.find('[') {
        if let Some(inner) = raw[open + 1..].strip_suffix(']') {
            if open > 0 && !inner.is_empty() && !inner.contains(|c| c == '[' || c == ']') {
                return (&raw[..open], Some(inner));
            }
        }
    }
    (raw, None)
}

impl QueryParams {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map: BTreeMap<String, QueryValue> = BTreeMap::new();
        for (raw_key, value) in pairs {
            match split_key(&raw_key) {
                (key, Some(op)) => {
                    let entry = map
                        .entry(key.to_string())
                        .or_insert_with(|| QueryValue::Nested(BTreeMap::new()));
                    if let QueryValue::Scalar(_) = entry {
                        *entry = QueryValue::Nested(BTreeMap::new());
                    }
                    if let QueryValue::Nested(ops) = entry {
                        ops.insert(op.to_string(), value);
                    }
                }
                (key, None) => {
                    map.insert(key.to_string(), QueryValue::Scalar(value));
                }
            }
        }
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.0.get(key)
    }

    pub fn scalar(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(QueryValue::Scalar(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.0
            .insert(key.to_string(), QueryValue::Scalar(value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &QueryValue)> {
        self.0.iter()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map_err(|e| AppError::bad_request(format!("Invalid query string: {e}")))?;
        Ok(Self::from_pairs(pairs))
    }
}
