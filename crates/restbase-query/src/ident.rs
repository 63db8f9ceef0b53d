//! Identifier quoting and JSONB column paths.
//!
//! Every column, table and alias that reaches SQL text passes through
//! [`quote_identifier`]; every JSONB key passes through [`ColumnPath`].
//! Nothing else in the crate writes caller-supplied names into SQL.

use std::fmt;

use crate::error::ValidationError;

/// PostgreSQL truncates identifiers beyond NAMEDATALEN - 1 bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Validate an identifier (table name, column name, alias).
fn validate_identifier(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::InvalidIdentifier(
            "Empty identifier".to_string(),
        ));
    }

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::InvalidIdentifier(format!(
            "{name} (longer than {MAX_IDENTIFIER_LEN} bytes)"
        )));
    }

    if name.chars().any(char::is_control) {
        return Err(ValidationError::InvalidIdentifier(name.escape_debug().to_string()));
    }

    Ok(())
}

/// Double-quote a PostgreSQL identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> Result<String, ValidationError> {
    validate_identifier(name)?;
    Ok(quote_validated(name))
}

fn quote_validated(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a possibly schema-qualified table reference.
pub fn quote_table(schema: Option<&str>, table: &str) -> Result<String, ValidationError> {
    let table = quote_identifier(table)?;
    match schema {
        Some(schema) => Ok(format!("{}.{table}", quote_identifier(schema)?)),
        None => Ok(table),
    }
}

/// JSONB accessor operator preceding a path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessor {
    /// `->` keeps the result as `jsonb`.
    Json,
    /// `->>` extracts the result as `text`.
    Text,
}

impl Accessor {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Json => "->",
            Self::Text => "->>",
        }
    }
}

/// A single key or array index below the root column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKey {
    Key(String),
    Index(u32),
}

impl PathKey {
    fn parse(raw: &str) -> Result<Self, ValidationError> {
        if raw.is_empty() {
            return Err(ValidationError::InvalidIdentifier(
                "Empty JSON path segment".to_string(),
            ));
        }

        if raw.bytes().all(|b| b.is_ascii_digit())
            && let Ok(index) = raw.parse::<u32>()
        {
            return Ok(Self::Index(index));
        }

        if raw.chars().any(char::is_control) {
            return Err(ValidationError::InvalidIdentifier(raw.escape_debug().to_string()));
        }

        Ok(Self::Key(raw.to_string()))
    }

    fn to_sql(&self) -> String {
        match self {
            Self::Key(key) => format!("'{}'", key.replace('\'', "''")),
            Self::Index(index) => index.to_string(),
        }
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A column reference, optionally chained through JSONB accessors.
///
/// `metadata->stats->>count` parses into the root column `metadata`
/// followed by `-> 'stats'` and `->> 'count'`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPath {
    column: String,
    segments: Vec<(Accessor, PathKey)>,
}

impl ColumnPath {
    /// Parse a column reference in `col`, `col->a->>b` or `col->0` form.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let mut parts = raw.split("->");
        let column = parts.next().unwrap_or_default().trim();
        validate_identifier(column)?;

        let mut segments = Vec::new();
        for part in parts {
            // "a->>b" splits into "a" and ">b"
            let (accessor, key) = match part.strip_prefix('>') {
                Some(key) => (Accessor::Text, key),
                None => (Accessor::Json, part),
            };
            segments.push((accessor, PathKey::parse(key)?));
        }

        Ok(Self {
            column: column.to_string(),
            segments,
        })
    }

    /// The root column name.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Whether the reference descends into a JSONB document.
    pub fn is_json(&self) -> bool {
        !self.segments.is_empty()
    }

    /// Whether the final accessor is `->>`.
    pub fn extracts_text(&self) -> bool {
        matches!(self.segments.last(), Some((Accessor::Text, _)))
    }

    /// Whether the final accessor is `->`.
    pub fn extracts_json(&self) -> bool {
        matches!(self.segments.last(), Some((Accessor::Json, _)))
    }

    /// Name used for the output column: the last key, or the column itself.
    pub fn output_name(&self) -> String {
        self.segments
            .last()
            .map_or_else(|| self.column.clone(), |(_, key)| key.to_string())
    }

    /// Render as SQL, e.g. `"metadata"->'stats'->>'count'`.
    pub fn to_sql(&self) -> String {
        // validated by `parse`
        let mut sql = quote_validated(&self.column);
        for (accessor, key) in &self.segments {
            sql.push_str(accessor.as_sql());
            sql.push_str(&key.to_sql());
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("name").unwrap(), "\"name\"");
        assert_eq!(quote_identifier("we\"ird").unwrap(), "\"we\"\"ird\"");
        assert!(quote_identifier("").is_err());
        assert!(quote_identifier("bad\0name").is_err());
        assert!(quote_identifier(&"x".repeat(64)).is_err());
    }

    #[test]
    fn test_quote_table() {
        assert_eq!(quote_table(None, "users").unwrap(), "\"users\"");
        assert_eq!(
            quote_table(Some("public"), "users").unwrap(),
            "\"public\".\"users\""
        );
    }

    #[test]
    fn test_plain_column() {
        let path = ColumnPath::parse("name").unwrap();
        assert!(!path.is_json());
        assert!(!path.extracts_text());
        assert_eq!(path.to_sql(), "\"name\"");
    }

    #[test]
    fn test_jsonb_text_path() {
        let path = ColumnPath::parse("metadata->stats->>count").unwrap();
        assert_eq!(path.column(), "metadata");
        assert!(path.extracts_text());
        assert_eq!(path.to_sql(), "\"metadata\"->'stats'->>'count'");
        assert_eq!(path.output_name(), "count");
    }

    #[test]
    fn test_jsonb_array_index_is_unquoted() {
        let path = ColumnPath::parse("tags->0").unwrap();
        assert!(path.extracts_json());
        assert_eq!(path.to_sql(), "\"tags\"->0");

        let path = ColumnPath::parse("items->2->>sku").unwrap();
        assert_eq!(path.to_sql(), "\"items\"->2->>'sku'");
    }

    #[test]
    fn test_path_column_quoted_like_identifiers() {
        for name in ["we\"ird", "Mixed Case", "a\"\"b"] {
            let path = ColumnPath::parse(name).unwrap();
            assert_eq!(path.to_sql(), quote_identifier(name).unwrap());
        }
        let path = ColumnPath::parse("we\"ird->>k").unwrap();
        assert_eq!(path.to_sql(), "\"we\"\"ird\"->>'k'");
    }

    #[test]
    fn test_jsonb_key_quotes_are_escaped() {
        let path = ColumnPath::parse("data->>it's").unwrap();
        assert_eq!(path.to_sql(), "\"data\"->>'it''s'");
    }

    #[test]
    fn test_empty_segment_rejected() {
        assert!(ColumnPath::parse("data->").is_err());
        assert!(ColumnPath::parse("->a").is_err());
    }
}
