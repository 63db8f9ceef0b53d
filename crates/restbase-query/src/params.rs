//! Request-scoped query description and its builder.
//!
//! A [`QueryParams`] is assembled once per request, either by the
//! query-string parser or directly through [`QueryParamsBuilder`], and is
//! not mutated afterwards. [`QueryParams::paginate`] consumes it and
//! returns the normalized copy.

use std::fmt;

use crate::error::ParseError;
use crate::pagination::{PaginationPolicy, normalize};
use crate::value::FilterValue;

/// Filter operators accepted by the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
    Is,
    In,
    StDWithin,
}

impl Operator {
    /// Look up an operator by its query-string keyword.
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "eq" => Some(Self::Eq),
            "neq" => Some(Self::Neq),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "like" => Some(Self::Like),
            "ilike" => Some(Self::ILike),
            "is" => Some(Self::Is),
            "in" => Some(Self::In),
            "st_dwithin" => Some(Self::StDWithin),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Like => "like",
            Self::ILike => "ilike",
            Self::Is => "is",
            Self::In => "in",
            Self::StDWithin => "st_dwithin",
        }
    }

    /// Binary SQL operator for the operators rendered as `lhs op $n`.
    pub fn as_sql(self) -> Option<&'static str> {
        match self {
            Self::Eq => Some("="),
            Self::Neq => Some("<>"),
            Self::Gt => Some(">"),
            Self::Gte => Some(">="),
            Self::Lt => Some("<"),
            Self::Lte => Some("<="),
            Self::Like => Some("LIKE"),
            Self::ILike => Some("ILIKE"),
            Self::Is | Self::In | Self::StDWithin => None,
        }
    }

    /// Ordering comparisons; these take the numeric cast on `->>` paths.
    pub fn is_ordering(self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single predicate on a column or JSONB path.
///
/// Filters sharing an `or_group` are OR-ed together; distinct groups and
/// ungrouped filters are AND-ed.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub operator: Operator,
    pub value: FilterValue,
    pub or_group: Option<u32>,
}

impl Filter {
    pub fn new(column: impl Into<String>, operator: Operator, value: impl Into<FilterValue>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
            or_group: None,
        }
    }

    /// Place the filter into an OR group. Group ids start at 1.
    pub fn in_group(mut self, group: u32) -> Self {
        self.or_group = Some(group);
        self
    }

    pub fn is_or(&self) -> bool {
        self.or_group.is_some()
    }
}

/// NULL placement for an ORDER BY term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub desc: bool,
    pub nulls: Option<NullsOrder>,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            desc: false,
            nulls: None,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            desc: true,
            nulls: None,
        }
    }

    pub fn nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = Some(nulls);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Count,
    /// `count(*)`
    CountAll,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "count" => Some(Self::Count),
            "sum" => Some(Self::Sum),
            "avg" => Some(Self::Avg),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::CountAll => "count_all",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Count | Self::CountAll => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }

    /// Functions that need a numeric argument.
    pub fn is_arithmetic(self) -> bool {
        matches!(self, Self::Sum | Self::Avg)
    }
}

/// An aggregate in the SELECT list. `column` is `None` iff `CountAll`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub function: AggregateFunction,
    pub column: Option<String>,
    pub alias: Option<String>,
}

impl Aggregation {
    pub fn count_all() -> Self {
        Self {
            function: AggregateFunction::CountAll,
            column: None,
            alias: None,
        }
    }

    pub fn new(function: AggregateFunction, column: impl Into<String>) -> Self {
        Self {
            function,
            column: Some(column.into()),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// `count` for `count(*)`, `<func>_<column>` otherwise.
    ///
    /// For JSONB paths the last key stands in for the column.
    pub fn default_alias(&self) -> String {
        match (&self.function, &self.column) {
            (AggregateFunction::CountAll, _) | (_, None) => "count".to_string(),
            (function, Some(column)) => {
                let stem = column
                    .rsplit("->")
                    .next()
                    .map_or(column.as_str(), |key| key.trim_start_matches('>'));
                format!("{}_{stem}", function.name())
            }
        }
    }

    /// The alias used in SQL; an explicit alias always wins.
    pub fn output_alias(&self) -> String {
        self.alias.clone().unwrap_or_else(|| self.default_alias())
    }
}

/// A plain SELECT column with an optional output alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectColumn {
    pub column: String,
    pub alias: Option<String>,
}

impl SelectColumn {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            alias: None,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.column == "*"
    }
}

/// Total-count strategy requested with `count=`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CountMode {
    #[default]
    None,
    Exact,
    Planned,
    Estimated,
}

impl CountMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "exact" => Some(Self::Exact),
            "planned" => Some(Self::Planned),
            "estimated" => Some(Self::Estimated),
            "none" | "" => Some(Self::None),
            _ => None,
        }
    }
}

/// The full request-scoped query description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    pub select: Vec<SelectColumn>,
    pub filters: Vec<Filter>,
    pub order: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<i64>,
    pub aggregations: Vec<Aggregation>,
    pub group_by: Vec<String>,
    pub count: CountMode,
}

impl QueryParams {
    pub fn builder() -> QueryParamsBuilder {
        QueryParamsBuilder::default()
    }

    /// Whether the SELECT list is aggregation-driven.
    pub fn is_aggregate(&self) -> bool {
        !self.aggregations.is_empty() || !self.group_by.is_empty()
    }

    /// Columns for GROUP BY.
    ///
    /// When aggregating, plain select columns are grouping keys: the explicit
    /// `group_by` list comes first, followed by any select column missing
    /// from it.
    pub fn grouping_keys(&self) -> Vec<&str> {
        if !self.is_aggregate() {
            return Vec::new();
        }

        let mut keys: Vec<&str> = self.group_by.iter().map(String::as_str).collect();
        for column in &self.select {
            if !column.is_wildcard() && !keys.contains(&column.column.as_str()) {
                keys.push(&column.column);
            }
        }
        keys
    }

    /// Apply a pagination policy, returning the normalized description.
    pub fn paginate(mut self, policy: &PaginationPolicy) -> Self {
        let page = normalize(self.limit, self.offset, policy);
        self.limit = page.limit;
        self.offset = Some(i64::try_from(page.offset).unwrap_or(i64::MAX));
        self
    }
}

/// Fluent builder for [`QueryParams`].
///
/// # Example
///
/// ```
/// use restbase_query::{Filter, Operator, OrderBy, QueryParams};
///
/// let params = QueryParams::builder()
///     .select_item("id")
///     .unwrap()
///     .filter(Filter::new("status", Operator::Eq, "active"))
///     .order(OrderBy::desc("created_at"))
///     .limit(10)
///     .build();
/// assert_eq!(params.filters.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryParamsBuilder {
    params: QueryParams,
}

impl QueryParamsBuilder {
    /// Add one `select` item, extracting `func(col)` aggregates.
    ///
    /// Accepts `col`, `alias:col`, `func(col)`, `alias:func(col)` and
    /// `count(*)`.
    pub fn select_item(mut self, raw: &str) -> Result<Self, ParseError> {
        let item = raw.trim();
        if item.is_empty() {
            return Err(ParseError::new(raw, "empty select item"));
        }

        let (alias, expr) = split_alias(item);
        if let Some(alias) = alias
            && alias.is_empty()
        {
            return Err(ParseError::new(item, "empty alias in select item"));
        }

        match parse_aggregate(expr)? {
            Some(mut aggregation) => {
                aggregation.alias = alias.map(str::to_string);
                self.params.aggregations.push(aggregation);
            }
            None => self.params.select.push(SelectColumn {
                column: expr.to_string(),
                alias: alias.map(str::to_string),
            }),
        }
        Ok(self)
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.params.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.params.filters.extend(filters);
        self
    }

    pub fn order(mut self, order: OrderBy) -> Self {
        self.params.order.push(order);
        self
    }

    pub fn aggregation(mut self, aggregation: Aggregation) -> Self {
        self.params.aggregations.push(aggregation);
        self
    }

    /// Add grouping columns from a comma-separated list.
    pub fn group_by(mut self, raw: &str) -> Self {
        self.params.group_by.extend(
            raw.split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        );
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.params.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.params.offset = Some(offset);
        self
    }

    pub fn count(mut self, count: CountMode) -> Self {
        self.params.count = count;
        self
    }

    pub fn build(self) -> QueryParams {
        self.params
    }
}

/// Split `alias:expr`, leaving `::` casts alone.
fn split_alias(item: &str) -> (Option<&str>, &str) {
    match item.find(':') {
        Some(pos) if !item[pos + 1..].starts_with(':') => {
            (Some(item[..pos].trim()), item[pos + 1..].trim())
        }
        _ => (None, item),
    }
}

/// Recognize `func(column)` / `count(*)`.
fn parse_aggregate(expr: &str) -> Result<Option<Aggregation>, ParseError> {
    let Some(open) = expr.find('(') else {
        return Ok(None);
    };
    let Some(function) = AggregateFunction::from_name(expr[..open].trim()) else {
        return Ok(None);
    };
    let Some(arg) = expr[open + 1..].strip_suffix(')') else {
        return Err(ParseError::new(expr, "unterminated aggregate"));
    };

    let arg = arg.trim();
    match (function, arg) {
        (_, "") => Err(ParseError::new(expr, "aggregate requires a column")),
        (AggregateFunction::Count, "*") => Ok(Some(Aggregation::count_all())),
        (_, "*") => Err(ParseError::new(expr, "only count accepts '*'")),
        (function, column) => Ok(Some(Aggregation::new(function, column))),
    }
}
