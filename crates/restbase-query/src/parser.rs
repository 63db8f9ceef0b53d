//! Query-string grammar parser.
//!
//! ```text
//! query      = param *("&" param)
//! param      = "select=" items / "order=" orders / "limit=" uint / "offset=" int
//!            / "group_by=" cols / "count=" mode
//!            / ("or=" / "and=") group
//!            / column "." op "=" value / column "=" op "." value
//! group      = "(" expr *("," expr) ")"
//! expr       = "or" group / "and" group / column "." op "." value
//! op         = eq / neq / gt / gte / lt / lte / like / ilike / is / in / st_dwithin
//! ```
//!
//! Logical groups are flattened into [`Filter`]s tagged with an OR-group id.
//! Ids come from a counter local to one [`QueryStringParser::parse`] call, so
//! concurrent parses never share state.

use std::borrow::Cow;

use url::form_urlencoded;

use crate::error::ParseError;
use crate::params::{CountMode, Filter, NullsOrder, Operator, OrderBy, QueryParams, QueryParamsBuilder};
use crate::value::FilterValue;

/// Hands out OR-group ids for a single parse, starting at 1.
#[derive(Debug, Default)]
struct GroupCounter {
    last: u32,
}

impl GroupCounter {
    fn next(&mut self) -> u32 {
        self.last += 1;
        self.last
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Logic {
    And,
    Or,
}

impl Logic {
    fn keyword(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

pub struct QueryStringParser;

impl QueryStringParser {
    /// Parse an `application/x-www-form-urlencoded` query string.
    ///
    /// Repeated keys are preserved: `age=gte.18&age=lte.65` yields two
    /// filters on `age`.
    pub fn parse(query: &str) -> Result<QueryParams, ParseError> {
        let mut builder = QueryParams::builder();
        let mut groups = GroupCounter::default();

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            builder = Self::apply_param(builder, &key, &value, &mut groups)?;
        }

        let params = builder.build();
        tracing::trace!(
            filters = params.filters.len(),
            or_groups = groups.last,
            aggregations = params.aggregations.len(),
            "parsed query string"
        );
        Ok(params)
    }

    fn apply_param(
        mut builder: QueryParamsBuilder,
        key: &str,
        value: &str,
        groups: &mut GroupCounter,
    ) -> Result<QueryParamsBuilder, ParseError> {
        match key {
            "select" => {
                if value.trim().is_empty() {
                    return Ok(builder);
                }
                for item in split_top_level(value, ',')? {
                    builder = builder.select_item(item)?;
                }
                Ok(builder)
            }
            "order" => {
                for item in split_top_level(value, ',')? {
                    builder = builder.order(parse_order_item(item)?);
                }
                Ok(builder)
            }
            "limit" => {
                // LIMIT is a bigint in PostgreSQL
                let limit = value
                    .trim()
                    .parse::<i64>()
                    .ok()
                    .and_then(|limit| u64::try_from(limit).ok())
                    .ok_or_else(|| {
                        ParseError::new(value, "limit must be a non-negative 64-bit integer")
                    })?;
                Ok(builder.limit(limit))
            }
            "offset" => {
                let offset = value
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| ParseError::new(value, "offset must be an integer"))?;
                Ok(builder.offset(offset))
            }
            "group_by" => Ok(builder.group_by(value)),
            "count" => {
                let mode = CountMode::parse(value.trim()).ok_or_else(|| {
                    ParseError::new(value, "count must be one of exact, planned, estimated")
                })?;
                Ok(builder.count(mode))
            }
            "or" | "and" => {
                let logic = if key == "or" { Logic::Or } else { Logic::And };
                let mut filters = Vec::new();
                parse_group(value, logic, None, groups, &mut filters)?;
                Ok(builder.filters(filters))
            }
            _ => Ok(builder.filter(parse_filter_param(key, value)?)),
        }
    }
}

/// Parse a query string. See [`QueryStringParser::parse`].
pub fn parse(query: &str) -> Result<QueryParams, ParseError> {
    QueryStringParser::parse(query)
}

/// A column filter in `column.op=value` or `column=op.value` form.
fn parse_filter_param(key: &str, value: &str) -> Result<Filter, ParseError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(ParseError::new(format!("{key}={value}"), "empty filter expression"));
    }

    if let Some((column, op)) = key.rsplit_once('.')
        && let Some(operator) = Operator::from_keyword(op)
    {
        return build_filter(column, operator, value, key);
    }

    match value.split_once('.') {
        Some((op, rest)) => match Operator::from_keyword(op) {
            Some(operator) => build_filter(key, operator, rest, value),
            None => Err(ParseError::new(
                format!("{key}={value}"),
                format!("unknown operator '{op}'"),
            )),
        },
        None => Err(ParseError::new(
            format!("{key}={value}"),
            "expected column.operator=value or column=operator.value",
        )),
    }
}

fn build_filter(
    column: &str,
    operator: Operator,
    raw: &str,
    fragment: &str,
) -> Result<Filter, ParseError> {
    let column = column.trim();
    if column.is_empty() {
        return Err(ParseError::new(fragment, "missing column name"));
    }
    let value = coerce_value(operator, raw)?;
    Ok(Filter::new(column, operator, value))
}

/// Resolve a raw value into its typed form for the given operator.
fn coerce_value(operator: Operator, raw: &str) -> Result<FilterValue, ParseError> {
    match operator {
        Operator::Is => match raw.trim().to_ascii_lowercase().as_str() {
            "null" => Ok(FilterValue::Null),
            "true" => Ok(FilterValue::Bool(true)),
            "false" => Ok(FilterValue::Bool(false)),
            _ => Err(ParseError::new(raw, "is expects null, true or false")),
        },
        Operator::In => {
            let list = strip_parens(raw.trim());
            if list.trim().is_empty() {
                return Ok(FilterValue::StringArray(Vec::new()));
            }
            let items = split_top_level(list, ',')?
                .into_iter()
                .map(|item| unquote(item.trim()).into_owned())
                .collect();
            Ok(FilterValue::StringArray(items))
        }
        Operator::StDWithin => Ok(FilterValue::String(strip_parens(raw.trim()).to_string())),
        _ => Ok(FilterValue::String(unquote(raw).into_owned())),
    }
}

/// Flatten an `or=(...)` / `and=(...)` body into `out`.
///
/// OR nested in OR joins the enclosing group, AND nested in AND flattens,
/// and OR nested in AND opens a fresh group. AND nested in OR has no flat
/// representation and is rejected.
fn parse_group(
    body: &str,
    logic: Logic,
    enclosing_or: Option<u32>,
    groups: &mut GroupCounter,
    out: &mut Vec<Filter>,
) -> Result<(), ParseError> {
    let trimmed = body.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| {
            ParseError::new(
                trimmed,
                format!("{} group must be wrapped in parentheses", logic.keyword()),
            )
        })?;

    let items = split_top_level(inner, ',')?;
    if items.iter().all(|item| item.trim().is_empty()) {
        return Err(ParseError::new(trimmed, "empty logical group"));
    }

    let group_id = match logic {
        Logic::Or => Some(enclosing_or.unwrap_or_else(|| groups.next())),
        Logic::And => None,
    };

    for item in items {
        let item = item.trim();
        if item.is_empty() {
            return Err(ParseError::new(trimmed, "empty filter expression"));
        }

        if let Some(nested) = item.strip_prefix("or(").map(|_| &item[2..]) {
            parse_group(nested, Logic::Or, group_id, groups, out)?;
        } else if let Some(nested) = item.strip_prefix("and(").map(|_| &item[3..]) {
            if logic == Logic::Or {
                return Err(ParseError::new(item, "and groups cannot be nested inside or"));
            }
            parse_group(nested, Logic::And, None, groups, out)?;
        } else {
            let mut filter = parse_condition(item)?;
            filter.or_group = group_id;
            out.push(filter);
        }
    }

    Ok(())
}

/// A raw `column.op.value` condition from inside a logical group.
fn parse_condition(expr: &str) -> Result<Filter, ParseError> {
    for (idx, _) in expr.match_indices('.') {
        if let Some((op, value)) = expr[idx + 1..].split_once('.')
            && let Some(operator) = Operator::from_keyword(op)
        {
            return build_filter(&expr[..idx], operator, value, expr);
        }
    }
    Err(ParseError::new(expr, "expected column.operator.value"))
}

/// `column[.asc|.desc][.nullsfirst|.nullslast]`
fn parse_order_item(item: &str) -> Result<OrderBy, ParseError> {
    let item = item.trim();
    let mut parts = item.split('.');
    let column = parts.next().unwrap_or_default().trim();
    if column.is_empty() {
        return Err(ParseError::new(item, "empty order term"));
    }

    let mut order = OrderBy::asc(column);
    for modifier in parts {
        match modifier.to_ascii_lowercase().as_str() {
            "asc" => order.desc = false,
            "desc" => order.desc = true,
            "nullsfirst" => order.nulls = Some(NullsOrder::First),
            "nullslast" => order.nulls = Some(NullsOrder::Last),
            other => {
                return Err(ParseError::new(
                    item,
                    format!("unknown order modifier '{other}'"),
                ));
            }
        }
    }
    Ok(order)
}

/// Split on `delimiter` outside of brackets and double quotes.
fn split_top_level(input: &str, delimiter: char) -> Result<Vec<&str>, ParseError> {
    let mut parts = Vec::new();
    let mut stack = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (idx, ch) in input.char_indices() {
        if in_quotes {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_quotes = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_quotes = true,
            '(' | '[' | '{' => stack.push(ch),
            ')' | ']' | '}' => {
                let open = match ch {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(open) {
                    return Err(ParseError::new(input, "unbalanced parentheses"));
                }
            }
            c if c == delimiter && stack.is_empty() => {
                parts.push(&input[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }

    if in_quotes {
        return Err(ParseError::new(input, "unterminated quoted value"));
    }
    if !stack.is_empty() {
        return Err(ParseError::new(input, "unbalanced parentheses"));
    }

    parts.push(&input[start..]);
    Ok(parts)
}

fn strip_parens(s: &str) -> &str {
    s.strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(s)
}

/// Remove surrounding double quotes, resolving `\"` and `\\`.
fn unquote(s: &str) -> Cow<'_, str> {
    match s.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) if s.len() >= 2 => {
            Cow::Owned(inner.replace("\\\"", "\"").replace("\\\\", "\\"))
        }
        _ => Cow::Borrowed(s),
    }
}
