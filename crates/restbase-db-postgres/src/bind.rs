//! Binding compiled parameters to sqlx arguments.

use restbase_query::SqlValue;
use sqlx_core::arguments::Arguments;
use sqlx_core::encode::{Encode, IsNull};
use sqlx_core::error::{BoxDynError, Error as SqlxError};
use sqlx_core::types::Type;
use sqlx_postgres::types::Oid;
use sqlx_postgres::{PgArgumentBuffer, PgArguments, PgTypeInfo, Postgres};

/// A NULL whose type the server infers from the statement.
///
/// No bytes are sent for NULL, so leaving the type unspecified is safe and
/// lets `SET col = $1` work for any column type.
#[derive(Debug, Clone, Copy)]
struct UntypedNull;

impl Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

/// Bind parameters in placeholder order.
///
/// | value | PostgreSQL type |
/// |---|---|
/// | `Text`, `Vector` | `text` (vectors are cast in SQL) |
/// | `Integer` | `int8` |
/// | `Float` | `float8` |
/// | `Boolean` | `bool` |
/// | `TextArray` | `text[]` |
/// | `Json` | `jsonb` |
/// | `Null` | inferred |
pub fn to_arguments(params: &[SqlValue]) -> Result<PgArguments, SqlxError> {
    let mut args = PgArguments::default();
    for param in params {
        add(&mut args, param).map_err(SqlxError::Encode)?;
    }
    Ok(args)
}

fn add(args: &mut PgArguments, param: &SqlValue) -> Result<(), BoxDynError> {
    match param {
        SqlValue::Text(s) | SqlValue::Vector(s) => args.add(s.clone()),
        SqlValue::Integer(i) => args.add(*i),
        SqlValue::Float(f) => args.add(*f),
        SqlValue::Boolean(b) => args.add(*b),
        SqlValue::TextArray(items) => args.add(items.clone()),
        SqlValue::Json(value) => args.add(value.clone()),
        SqlValue::Null => args.add(UntypedNull),
    }
}
