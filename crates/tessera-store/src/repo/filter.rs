//! Query composition: filters, aggregations, sorting and pages
//!
//! A filter appends conditions and their bound parameters to a
//! [`WhereClause`]; the clause joins everything it collects with AND. Field
//! names passed to the helpers go through the same field → column transform
//! as entity fields. A name that does not come out as a plain identifier is
//! never rendered; the repository refuses the whole query with `InvalidInput`.

use crate::errors::{invalid_field, Result};
use crate::mapping::{is_valid_identifier, to_column_name, ToColumn, Value};

/// Conditions and parameters collected from filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    conditions: Vec<String>,
    params: Vec<Value>,
    rejected: Vec<String>,
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one condition using `?` placeholders, with its parameters in order
    pub fn push<I>(&mut self, condition: impl Into<String>, params: I) -> &mut Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.conditions.push(condition.into());
        self.params.extend(params);
        self
    }

    /// Record a field name that could not be used as a column
    pub fn reject(&mut self, field: impl Into<String>) -> &mut Self {
        self.rejected.push(field.into());
        self
    }

    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    /// Fails with `InvalidInput` naming the first rejected field
    pub fn ensure_valid(&self, op: &str) -> Result<()> {
        match self.rejected.first() {
            Some(field) => Err(invalid_field(op, field)),
            None => Ok(()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// ` WHERE (a) AND (b)`, or empty when nothing was added
    pub fn to_sql(&self) -> String {
        if self.conditions.is_empty() {
            return String::new();
        }
        let joined = self
            .conditions
            .iter()
            .map(|c| format!("({})", c))
            .collect::<Vec<_>>()
            .join(" AND ");
        format!(" WHERE {}", joined)
    }

    pub fn into_params(self) -> Vec<Value> {
        self.params
    }
}

/// A field resolved to its column, or kept as given when it is not an identifier
#[derive(Debug, Clone, PartialEq, Eq)]
enum Column {
    Named(String),
    Rejected(String),
}

impl Column {
    fn for_field(field: &str) -> Self {
        let column = to_column_name(field);
        if is_valid_identifier(&column) {
            Column::Named(column)
        } else {
            Column::Rejected(field.to_string())
        }
    }

    /// The column name, or `None` after noting the rejection on `clause`
    fn name_in(&self, clause: &mut WhereClause) -> Option<&str> {
        match self {
            Column::Named(column) => Some(column.as_str()),
            Column::Rejected(field) => {
                clause.reject(field.as_str());
                None
            }
        }
    }

    fn rejected(&self) -> Option<&str> {
        match self {
            Column::Named(_) => None,
            Column::Rejected(field) => Some(field.as_str()),
        }
    }
}

/// Something that can narrow a query
pub trait Filter {
    fn apply(&self, clause: &mut WhereClause);

    /// Both filters must hold
    fn and<F: Filter>(self, other: F) -> And<Self, F>
    where
        Self: Sized,
    {
        And(self, other)
    }
}

impl<F> Filter for F
where
    F: Fn(&mut WhereClause),
{
    fn apply(&self, clause: &mut WhereClause) {
        self(clause)
    }
}

#[derive(Debug, Clone)]
pub struct And<A, B>(A, B);

impl<A: Filter, B: Filter> Filter for And<A, B> {
    fn apply(&self, clause: &mut WhereClause) {
        self.0.apply(clause);
        self.1.apply(clause);
    }
}

/// Any number of filters, all of which must hold
#[derive(Default)]
pub struct AllOf(Vec<Box<dyn Filter + Send + Sync>>);

impl AllOf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: impl Filter + Send + Sync + 'static) -> Self {
        self.0.push(Box::new(filter));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Filter for AllOf {
    fn apply(&self, clause: &mut WhereClause) {
        for filter in &self.0 {
            filter.apply(clause);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl CompareOp {
    fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Like => "LIKE",
        }
    }
}

/// `column <op> ?`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    column: Column,
    op: CompareOp,
    value: Value,
    escape: bool,
}

impl Condition {
    pub fn new(field: &str, op: CompareOp, value: impl ToColumn) -> Self {
        Self {
            column: Column::for_field(field),
            op,
            value: value.to_column(),
            escape: false,
        }
    }
}

impl Filter for Condition {
    fn apply(&self, clause: &mut WhereClause) {
        let Some(column) = self.column.name_in(clause) else {
            return;
        };
        let mut sql = format!("{} {} ?", column, self.op.as_sql());
        if self.escape {
            sql.push_str(" ESCAPE '\\'");
        }
        clause.push(sql, [self.value.clone()]);
    }
}

/// `column IS [NOT] NULL`
#[derive(Debug, Clone, PartialEq)]
pub struct NullCheck {
    column: Column,
    negated: bool,
}

impl Filter for NullCheck {
    fn apply(&self, clause: &mut WhereClause) {
        let Some(column) = self.column.name_in(clause) else {
            return;
        };
        let check = if self.negated { "IS NOT NULL" } else { "IS NULL" };
        clause.push(format!("{} {}", column, check), []);
    }
}

/// `column IN (?, ...)`; an empty list matches nothing
#[derive(Debug, Clone, PartialEq)]
pub struct InList {
    column: Column,
    values: Vec<Value>,
}

impl Filter for InList {
    fn apply(&self, clause: &mut WhereClause) {
        let Some(column) = self.column.name_in(clause) else {
            return;
        };
        if self.values.is_empty() {
            clause.push("1 = 0", []);
            return;
        }
        let placeholders = vec!["?"; self.values.len()].join(", ");
        clause.push(
            format!("{} IN ({})", column, placeholders),
            self.values.iter().cloned(),
        );
    }
}

pub fn eq(field: &str, value: impl ToColumn) -> Condition {
    Condition::new(field, CompareOp::Eq, value)
}

pub fn not_eq(field: &str, value: impl ToColumn) -> Condition {
    Condition::new(field, CompareOp::NotEq, value)
}

pub fn lt(field: &str, value: impl ToColumn) -> Condition {
    Condition::new(field, CompareOp::Lt, value)
}

pub fn le(field: &str, value: impl ToColumn) -> Condition {
    Condition::new(field, CompareOp::Le, value)
}

pub fn gt(field: &str, value: impl ToColumn) -> Condition {
    Condition::new(field, CompareOp::Gt, value)
}

pub fn ge(field: &str, value: impl ToColumn) -> Condition {
    Condition::new(field, CompareOp::Ge, value)
}

/// Raw LIKE pattern; `%` and `_` keep their wildcard meaning
pub fn like(field: &str, pattern: impl ToColumn) -> Condition {
    Condition::new(field, CompareOp::Like, pattern)
}

/// Substring match with wildcards in `fragment` taken literally
pub fn contains(field: &str, fragment: &str) -> Condition {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    let mut condition = Condition::new(field, CompareOp::Like, format!("%{}%", escaped));
    condition.escape = true;
    condition
}

pub fn is_null(field: &str) -> NullCheck {
    NullCheck {
        column: Column::for_field(field),
        negated: false,
    }
}

pub fn is_not_null(field: &str) -> NullCheck {
    NullCheck {
        column: Column::for_field(field),
        negated: true,
    }
}

pub fn in_list<I, V>(field: &str, values: I) -> InList
where
    I: IntoIterator<Item = V>,
    V: ToColumn,
{
    InList {
        column: Column::for_field(field),
        values: values.into_iter().map(|v| v.to_column()).collect(),
    }
}

/// Adds select and group-by fragments to a grouped query
pub trait Aggregation {
    fn apply(&self, select: &mut Vec<String>, group_by: &mut Vec<String>);

    /// Field names that could not be turned into columns
    fn rejected_fields(&self) -> Vec<&str> {
        Vec::new()
    }
}

/// `SELECT column, COUNT(*) ... GROUP BY column`
#[derive(Debug, Clone, PartialEq)]
pub struct CountBy {
    column: Column,
}

impl CountBy {
    pub fn new(field: &str) -> Self {
        Self {
            column: Column::for_field(field),
        }
    }
}

impl Aggregation for CountBy {
    fn apply(&self, select: &mut Vec<String>, group_by: &mut Vec<String>) {
        if let Column::Named(column) = &self.column {
            select.push(column.clone());
            select.push("COUNT(*) AS total".to_string());
            group_by.push(column.clone());
        }
    }

    fn rejected_fields(&self) -> Vec<&str> {
        self.column.rejected().into_iter().collect()
    }
}

/// `SELECT column, SUM(summed) ... GROUP BY column`
#[derive(Debug, Clone, PartialEq)]
pub struct SumBy {
    column: Column,
    summed: Column,
}

impl SumBy {
    pub fn new(field: &str, summed_field: &str) -> Self {
        Self {
            column: Column::for_field(field),
            summed: Column::for_field(summed_field),
        }
    }
}

impl Aggregation for SumBy {
    fn apply(&self, select: &mut Vec<String>, group_by: &mut Vec<String>) {
        if let (Column::Named(column), Column::Named(summed)) = (&self.column, &self.summed) {
            select.push(column.clone());
            select.push(format!("COALESCE(SUM({}), 0) AS total", summed));
            group_by.push(column.clone());
        }
    }

    fn rejected_fields(&self) -> Vec<&str> {
        self.column
            .rejected()
            .into_iter()
            .chain(self.summed.rejected())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    field: String,
    ascending: bool,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: true,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: false,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    pub(crate) fn direction(&self) -> &'static str {
        if self.ascending {
            "ASC"
        } else {
            "DESC"
        }
    }
}

/// Offset/limit window; `limit: None` means no limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    offset: u64,
    limit: Option<u64>,
}

impl Page {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }

    pub fn all() -> Self {
        Self {
            offset: 0,
            limit: None,
        }
    }

    pub fn first(limit: u64) -> Self {
        Self::new(0, limit)
    }

    /// Page `index` (zero-based) of `size` rows each
    pub fn nth(index: u64, size: u64) -> Self {
        Self::new(index.saturating_mul(size), size)
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Parameters for `LIMIT ? OFFSET ?`; SQLite reads a negative limit as unbounded
    pub(crate) fn bind_values(&self) -> [Value; 2] {
        let limit = self
            .limit
            .map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        let offset = i64::try_from(self.offset).unwrap_or(i64::MAX);
        [Value::Integer(limit), Value::Integer(offset)]
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_clause_renders_nothing() {
        let clause = WhereClause::new();
        assert!(clause.is_empty());
        assert_eq!(clause.to_sql(), "");
    }

    #[test]
    fn test_conditions_join_with_and() {
        let filter = eq("role", "ADMIN").and(gt("createdAt", "2024-01-01"));
        let mut clause = WhereClause::new();
        filter.apply(&mut clause);

        assert_eq!(clause.to_sql(), " WHERE (role = ?) AND (created_at > ?)");
        assert_eq!(
            clause.params(),
            &[Value::Text("ADMIN".into()), Value::Text("2024-01-01".into())]
        );
    }

    #[test]
    fn test_closure_filter_keeps_or_inside_its_group() {
        let either = |clause: &mut WhereClause| {
            clause.push(
                "status = ? OR status = ?",
                [Value::Text("DRAFT".into()), Value::Text("ARCHIVED".into())],
            );
        };
        let all = AllOf::new().with(either).with(eq("ownerId", 7_i64));
        let mut clause = WhereClause::new();
        all.apply(&mut clause);

        assert_eq!(
            clause.to_sql(),
            " WHERE (status = ? OR status = ?) AND (owner_id = ?)"
        );
        assert_eq!(clause.into_params().len(), 3);
    }

    #[test]
    fn test_in_list_and_null_checks() {
        let mut clause = WhereClause::new();
        in_list("id", [1_i64, 2, 3]).apply(&mut clause);
        is_null("description").apply(&mut clause);
        in_list::<_, i64>("id", []).apply(&mut clause);

        assert_eq!(
            clause.conditions(),
            &["id IN (?, ?, ?)", "description IS NULL", "1 = 0"]
        );
    }

    #[test]
    fn test_contains_escapes_wildcards() {
        let mut clause = WhereClause::new();
        contains("username", "50%_off").apply(&mut clause);
        assert_eq!(clause.conditions()[0], "username LIKE ? ESCAPE '\\'");
        assert_eq!(clause.params()[0], Value::Text("%50\\%\\_off%".into()));
    }

    #[test]
    fn test_aggregations() {
        let mut select = Vec::new();
        let mut group_by = Vec::new();
        CountBy::new("role").apply(&mut select, &mut group_by);
        assert_eq!(select, vec!["role", "COUNT(*) AS total"]);
        assert_eq!(group_by, vec!["role"]);

        let mut select = Vec::new();
        let mut group_by = Vec::new();
        SumBy::new("courseId", "sizeBytes").apply(&mut select, &mut group_by);
        assert_eq!(select[1], "COALESCE(SUM(size_bytes), 0) AS total");
        assert_eq!(group_by, vec!["course_id"]);
    }

    #[test]
    fn test_non_identifier_fields_are_rejected_not_rendered() {
        let filter = eq("1=1 OR name", "nope").and(is_null("description"));
        let mut clause = WhereClause::new();
        filter.apply(&mut clause);

        assert_eq!(clause.conditions(), &["description IS NULL"]);
        assert_eq!(clause.rejected(), &["1=1 OR name"]);
        let err = clause.ensure_valid("find_all").unwrap_err();
        assert_eq!(err.kind(), tessera_core::ExErrorKind::InvalidInput);
        assert!(err.message().contains("1=1 OR name"));

        let sum = SumBy::new("courseId", "size) FROM users; --");
        let mut select = Vec::new();
        let mut group_by = Vec::new();
        sum.apply(&mut select, &mut group_by);
        assert!(select.is_empty());
        assert_eq!(sum.rejected_fields(), vec!["size) FROM users; --"]);
    }

    #[test]
    fn test_page_bind_values() {
        assert_eq!(
            Page::all().bind_values(),
            [Value::Integer(-1), Value::Integer(0)]
        );
        assert_eq!(
            Page::nth(2, 10).bind_values(),
            [Value::Integer(10), Value::Integer(20)]
        );
    }
}
