//! Turns a request query string into a filter descriptor and renders it to SQL.

pub mod builder;
pub mod params;
pub mod schema;
pub mod sql;

pub use builder::{describe, Direction, Operator, Projection, QueryDescriptor};
pub use params::QueryParams;
pub use schema::{FieldKind, FieldSpec, Scalar};
