//! Typed bind values for dynamically built INSERT/UPDATE statements.

use backoffice_core::types::Timestamp;
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

/// A single bindable column value. `None` binds SQL `NULL`.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(Option<String>),
    BigInt(Option<i64>),
    Int(Option<i32>),
    Bool(Option<bool>),
    Timestamp(Option<Timestamp>),
    Uuid(Option<Uuid>),
    Json(Option<Value>),
}

impl SqlValue {
    pub fn push_bind(self, qb: &mut QueryBuilder<'static, Postgres>) {
        match self {
            SqlValue::Text(v) => qb.push_bind(v),
            SqlValue::BigInt(v) => qb.push_bind(v),
            SqlValue::Int(v) => qb.push_bind(v),
            SqlValue::Bool(v) => qb.push_bind(v),
            SqlValue::Timestamp(v) => qb.push_bind(v),
            SqlValue::Uuid(v) => qb.push_bind(v),
            SqlValue::Json(v) => qb.push_bind(v),
        };
    }

    /// Discriminant name, used to check that multi-row inserts line up.
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Text(_) => "text",
            SqlValue::BigInt(_) => "bigint",
            SqlValue::Int(_) => "int",
            SqlValue::Bool(_) => "bool",
            SqlValue::Timestamp(_) => "timestamp",
            SqlValue::Uuid(_) => "uuid",
            SqlValue::Json(_) => "json",
        }
    }
}

macro_rules! sql_value_from {
    ($ty:ty => $variant:ident) => {
        impl From<$ty> for SqlValue {
            fn from(v: $ty) -> Self {
                SqlValue::$variant(Some(v.into()))
            }
        }

        impl From<Option<$ty>> for SqlValue {
            fn from(v: Option<$ty>) -> Self {
                SqlValue::$variant(v.map(Into::into))
            }
        }
    };
}

sql_value_from!(String => Text);
sql_value_from!(&str => Text);
sql_value_from!(i64 => BigInt);
sql_value_from!(i32 => Int);
sql_value_from!(bool => Bool);
sql_value_from!(Timestamp => Timestamp);
sql_value_from!(Uuid => Uuid);
sql_value_from!(Value => Json);

/// A DTO that can be written through the generic repository.
///
/// Create DTOs return every column they own (unset optionals as `NULL`);
/// update DTOs return only the fields the caller supplied, so absent fields
/// keep their stored value.
pub trait Fillable {
    fn attributes(&self) -> Vec<(&'static str, SqlValue)>;
}

/// Collect `Some` fields of an update DTO.
///
/// ```ignore
/// changed(&mut attrs, "name", &self.name);
/// ```
pub fn changed<T>(attrs: &mut Vec<(&'static str, SqlValue)>, column: &'static str, value: &Option<T>)
where
    T: Clone + Into<SqlValue>,
{
    if let Some(v) = value {
        attrs.push((column, v.clone().into()));
    }
}
