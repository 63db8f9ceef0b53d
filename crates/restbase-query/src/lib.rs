//! Query language for restbase.
//!
//! Turns a PostgREST-style query string into a [`QueryParams`] description,
//! applies a [`PaginationPolicy`], and compiles the result into
//! parameterized PostgreSQL via [`QueryCompiler`]. Everything here is pure
//! and synchronous; execution lives in `restbase-db-postgres`.

pub mod error;
pub mod ident;
pub mod pagination;
pub mod params;
pub mod parser;
pub mod schema;
pub mod sql_builder;
pub mod value;

pub use error::{CompileError, ParseError, QueryError, Result, ValidationError};
pub use ident::{ColumnPath, quote_identifier, quote_table};
pub use pagination::{Pagination, PaginationPolicy, normalize};
pub use params::{
    AggregateFunction, Aggregation, CountMode, Filter, NullsOrder, Operator, OrderBy, QueryParams,
    QueryParamsBuilder, SelectColumn,
};
pub use parser::{QueryStringParser, parse};
pub use schema::{ColumnInfo, SchemaCatalog, StaticCatalog, TableInfo, validate_columns};
pub use sql_builder::{
    CompiledQuery, MAX_FILTERS, ParamSink, QueryCompiler, build_group_by_clause,
    build_order_clause, build_select_clause, build_where_clause, compile, row_values,
};
pub use value::{
    FilterValue, SqlValue, vector_literal_from_json, vector_literal_from_slice,
    vector_literal_from_str,
};
