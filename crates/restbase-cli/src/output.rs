use colored::Colorize;
use restbase_query::CompiledQuery;
use serde_json::{Value, json};
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

pub fn print_value(value: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_compiled(query: &CompiledQuery, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let params: Vec<Value> = query.params.iter().map(|p| p.to_json()).collect();
            print_value(&json!({ "sql": query.sql, "params": params }));
        }
        OutputFormat::Table => {
            println!("{}", query.sql.cyan());
            if query.params.is_empty() {
                return;
            }
            let mut builder = Builder::default();
            builder.push_record(["Placeholder", "Value"]);
            for (i, param) in query.params.iter().enumerate() {
                builder.push_record([format!("${}", i + 1), param.to_json().to_string()]);
            }
            println!("{}", builder.build().with(Style::rounded()));
        }
    }
}

pub fn print_rows(rows: &[Value], total: Option<i64>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let mut out = json!({ "rows": rows });
            if let Some(total) = total {
                out["total"] = json!(total);
            }
            print_value(&out);
        }
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("No rows found.");
            } else {
                println!("{}", rows_table(rows));
            }
            if let Some(total) = total {
                println!("Total: {total}");
            }
        }
    }
}

/// Columns in first-seen order across all rows.
fn columns(rows: &[Value]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        if let Some(obj) = row.as_object() {
            for key in obj.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    columns
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn rows_table(rows: &[Value]) -> String {
    let columns = columns(rows);
    let mut builder = Builder::default();
    builder.push_record(columns.iter().cloned());
    for row in rows {
        builder.push_record(columns.iter().map(|c| cell(row.get(c))));
    }
    builder.build().with(Style::rounded()).to_string()
}
