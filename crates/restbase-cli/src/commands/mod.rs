pub mod compile;
pub mod query;

use anyhow::{Result, bail};
use restbase_query::{ColumnInfo, QueryCompiler, TableInfo};

/// Compiler for `table`, typed by `--column NAME:TYPE` arguments if any.
pub fn compiler_for(table: &str, schema: Option<&str>, columns: &[String]) -> Result<QueryCompiler> {
    let mut compiler = QueryCompiler::new(table);
    if let Some(schema) = schema {
        compiler = compiler.with_schema(schema);
    }
    if columns.is_empty() {
        return Ok(compiler);
    }

    let mut info = TableInfo::new(schema.unwrap_or("public"), table);
    for column in columns {
        let Some((name, data_type)) = column.split_once(':') else {
            bail!("--column expects NAME:TYPE, got '{column}'");
        };
        let column = ColumnInfo::new(name.trim(), data_type.trim());
        if column.cast_type().is_none() {
            bail!("unsupported column type '{}'", column.data_type);
        }
        info = info.with_column(column);
    }
    Ok(compiler.with_table_info(info))
}
