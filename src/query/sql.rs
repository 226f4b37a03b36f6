use sqlx::{Postgres, QueryBuilder};

use super::builder::{Direction, QueryDescriptor};
use super::schema::{lookup, FieldSpec, Scalar};
use crate::error::AppResult;

fn push_scalar(qb: &mut QueryBuilder<'_, Postgres>, value: Scalar) {
    match value {
        Scalar::Text(v) => qb.push_bind(v),
        Scalar::Integer(v) => qb.push_bind(v),
        Scalar::Float(v) => qb.push_bind(v),
        Scalar::Timestamp(v) => qb.push_bind(v),
    };
}

/// Appends ` WHERE ...` for every field filter, casting each value by column type.
pub fn push_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    descriptor: &QueryDescriptor,
    schema: &[FieldSpec],
) -> AppResult<()> {
    for (i, filter) in descriptor.filters.iter().enumerate() {
        let spec = lookup(schema, &filter.field)?;
        let value = spec.cast(&filter.value)?;
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        qb.push(spec.column)
            .push(" ")
            .push(filter.op.sql())
            .push(" ");
        push_scalar(qb, value);
    }
    Ok(())
}

/// Appends ` ORDER BY ... LIMIT ... OFFSET ...`.
pub fn push_order_and_page(
    qb: &mut QueryBuilder<'_, Postgres>,
    descriptor: &QueryDescriptor,
    schema: &[FieldSpec],
) -> AppResult<()> {
    qb.push(" ORDER BY ");
    for key in &descriptor.sort {
        let spec = lookup(schema, &key.field)?;
        qb.push(spec.column).push(match key.direction {
            Direction::Asc => " ASC, ",
            Direction::Desc => " DESC, ",
        });
    }
    qb.push("id ASC");

    qb.push(" LIMIT ")
        .push_bind(descriptor.limit.min(i64::MAX as u64) as i64)
        .push(" OFFSET ")
        .push_bind(descriptor.skip.min(i64::MAX as u64) as i64);
    Ok(())
}
