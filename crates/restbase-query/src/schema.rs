//! Table metadata supplied by schema introspection.
//!
//! Metadata is used to check that referenced columns exist and to declare
//! the type of each placeholder compared with a plain column
//! (`"id" = $1::integer`). Values themselves are bound unchanged; the
//! server performs the conversion.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::ident::ColumnPath;
use crate::params::QueryParams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            primary_key: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Type name usable in a `::type` cast, if `data_type` is one.
    ///
    /// Accepts plain and schema-qualified names with numeric modifiers and
    /// array brackets (`integer`, `character varying(20)`, `numeric(10,2)`,
    /// `timestamp with time zone`, `public.mood`, `text[]`). The
    /// information_schema placeholders `ARRAY` and `USER-DEFINED`, and
    /// anything needing quotes, yield `None`.
    pub fn cast_type(&self) -> Option<&str> {
        let data_type = self.data_type.trim();
        if matches!(data_type, "" | "ARRAY" | "USER-DEFINED") {
            return None;
        }

        let mut in_modifier = false;
        for c in data_type.chars() {
            match c {
                '(' if !in_modifier => in_modifier = true,
                ')' if in_modifier => in_modifier = false,
                c if in_modifier => {
                    if !(c.is_ascii_digit() || c == ',' || c == ' ') {
                        return None;
                    }
                }
                c if c.is_ascii_alphanumeric() || matches!(c, '_' | ' ' | '.' | '[' | ']') => {}
                _ => return None,
            }
        }
        (!in_modifier).then_some(data_type)
    }

    /// Whether the column holds an array.
    pub fn is_array(&self) -> bool {
        let data_type = self.data_type.trim();
        data_type == "ARRAY" || data_type.ends_with(']')
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnInfo) -> Self {
        self.columns.push(column);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Check that the root column of a column reference exists.
    pub fn check_column(&self, raw: &str) -> Result<(), ValidationError> {
        let path = ColumnPath::parse(raw)?;
        if self.has_column(path.column()) {
            Ok(())
        } else {
            Err(ValidationError::UnknownColumn(path.column().to_string()))
        }
    }

    pub fn primary_key(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter().filter(|c| c.primary_key)
    }
}

/// Source of table metadata.
pub trait SchemaCatalog: Send + Sync {
    fn table(&self, name: &str) -> Option<Arc<TableInfo>>;
}

/// In-memory catalog, keyed by table name.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    tables: HashMap<String, Arc<TableInfo>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: TableInfo) -> Self {
        self.insert(table);
        self
    }

    pub fn insert(&mut self, table: TableInfo) {
        self.tables.insert(table.name.clone(), Arc::new(table));
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl SchemaCatalog for StaticCatalog {
    fn table(&self, name: &str) -> Option<Arc<TableInfo>> {
        self.tables.get(name).cloned()
    }
}

/// Check that every column referenced by `params` exists in `table`.
///
/// JSONB paths are checked by their root column. Aggregate aliases may be
/// used in ORDER BY.
pub fn validate_columns(params: &QueryParams, table: &TableInfo) -> Result<(), ValidationError> {
    let check = |raw: &str| table.check_column(raw);

    for column in params.select.iter().filter(|c| !c.is_wildcard()) {
        check(&column.column)?;
    }
    for filter in &params.filters {
        check(&filter.column)?;
    }
    for column in &params.group_by {
        check(column)?;
    }
    for aggregation in &params.aggregations {
        if let Some(column) = &aggregation.column {
            check(column)?;
        }
    }

    let output_names: Vec<String> = params
        .aggregations
        .iter()
        .map(|a| a.output_alias())
        .chain(params.select.iter().filter_map(|c| c.alias.clone()))
        .collect();
    for order in &params.order {
        if !output_names.iter().any(|name| *name == order.column) {
            check(&order.column)?;
        }
    }

    Ok(())
}
