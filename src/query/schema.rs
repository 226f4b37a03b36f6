use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Timestamp,
}

/// A query value after it has been cast to its column type.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Timestamp(OffsetDateTime),
}

/// Maps an API field name onto a column the filter may touch.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self { name, column, kind }
    }

    pub fn cast(&self, raw: &str) -> AppResult<Scalar> {
        let value = raw.trim();
        let cast = match self.kind {
            FieldKind::Text => Some(Scalar::Text(raw.to_string())),
            FieldKind::Integer => value.parse::<i64>().ok().map(Scalar::Integer),
            FieldKind::Float => value
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Scalar::Float),
            FieldKind::Timestamp => parse_timestamp(value).map(Scalar::Timestamp),
        };
        cast.ok_or_else(|| AppError::cast(self.name, raw))
    }
}

pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|d| d.midnight().assume_utc())
}

pub fn lookup<'s>(schema: &'s [FieldSpec], name: &str) -> AppResult<&'s FieldSpec> {
    schema
        .iter()
        .find(|f| f.name == name)
        .ok_or_else(|| AppError::bad_request(format!("The field '{name}' cannot be queried.")))
}
