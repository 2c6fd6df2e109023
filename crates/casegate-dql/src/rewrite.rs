//! Statement rewriting for ad-hoc DQL.
//!
//! A caller-supplied statement is inspected in three steps:
//!
//! ```text
//! SELECT <projection> FROM <source ...> [ENABLE(<hints>)]
//!        └─ identifier injected here      └─ RETURN_TOP bound read or added
//! ```
//!
//! Statements we do not understand (not a SELECT, no FROM) and statements
//! whose projection must not be touched (`*`, aggregates, `DISTINCT`) are
//! returned as-is. The repository rejects anything that is truly invalid.

use regex::Regex;
use std::fmt;

/// Column every projected row must carry so the UI can address the object.
pub const IDENTIFIER_COLUMN: &str = "r_object_id";

/// Object-kind column; only injected under [`RequiredColumns::IdentifierAndType`].
pub const OBJECT_TYPE_COLUMN: &str = "r_object_type";

/// Default `RETURN_TOP` bound for ad-hoc queries.
pub const DEFAULT_RETURN_TOP: u32 = 10_000;

/// Which columns the rewriter guarantees in a plain projection.
///
/// Not every repository type carries `r_object_type` (registered tables,
/// for one), so the default only injects the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequiredColumns {
    #[default]
    IdentifierOnly,
    IdentifierAndType,
}

impl RequiredColumns {
    fn names(self) -> &'static [&'static str] {
        match self {
            Self::IdentifierOnly => &[IDENTIFIER_COLUMN],
            Self::IdentifierAndType => &[IDENTIFIER_COLUMN, OBJECT_TYPE_COLUMN],
        }
    }
}

/// How the rewriter classified a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryShape {
    /// Does not start with `SELECT`.
    NotSelect,
    /// `SELECT` without a `FROM` boundary (or with an empty projection).
    Malformed,
    /// `SELECT * FROM ...`
    Wildcard,
    /// Aggregate calls or `DISTINCT` in the projection.
    Aggregate,
    /// A plain column list; eligible for rewriting.
    Projection,
}

/// A statement ready to be sent to the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    effective_limit: u32,
    shape: QueryShape,
}

impl Query {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Row bound the engine was asked for (or the caller default when the
    /// statement could not carry one).
    pub fn effective_limit(&self) -> u32 {
        self.effective_limit
    }

    pub fn shape(&self) -> QueryShape {
        self.shape
    }

    /// False for statements returned untouched because of their shape.
    pub fn requires_rewrite(&self) -> bool {
        self.shape == QueryShape::Projection
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

enum Hint<'a> {
    Absent,
    /// `ENABLE(...)` exists without `RETURN_TOP`; byte offset of its `)`.
    EnableWithout { close: usize, empty: bool },
    ReturnTop(&'a str),
}

/// Rewrites caller-supplied DQL (see module docs).
#[derive(Debug, Clone)]
pub struct QueryRewriter {
    required: RequiredColumns,
    select_re: Regex,
    from_re: Regex,
    aggregate_re: Regex,
    return_top_re: Regex,
}

impl Default for QueryRewriter {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryRewriter {
    pub fn new() -> Self {
        Self {
            required: RequiredColumns::default(),
            select_re: Regex::new(r"(?i)^SELECT\s+").expect("valid SELECT pattern"),
            from_re: Regex::new(r"(?i)\sFROM\s").expect("valid FROM pattern"),
            aggregate_re: Regex::new(r"(?i)\b(?:COUNT|SUM|AVG|MIN|MAX)\s*\(|\bDISTINCT\b")
                .expect("valid aggregate pattern"),
            return_top_re: Regex::new(r"(?i)^RETURN_TOP(?:\s+(.*))?$")
                .expect("valid RETURN_TOP pattern"),
        }
    }

    pub fn with_required_columns(mut self, required: RequiredColumns) -> Self {
        if required == RequiredColumns::IdentifierAndType {
            tracing::warn!(
                column = OBJECT_TYPE_COLUMN,
                "object-kind column injection enabled; statements against types without it will be rejected"
            );
        }
        self.required = required;
        self
    }

    pub fn required_columns(&self) -> RequiredColumns {
        self.required
    }

    pub fn rewrite(&self, query: &str, default_limit: u32) -> Query {
        let default_limit = default_limit.max(1);
        let trimmed = query.trim();

        let Some(select) = self.select_re.find(trimmed) else {
            return Query {
                text: trimmed.to_string(),
                effective_limit: default_limit,
                shape: QueryShape::NotSelect,
            };
        };

        let keyword = trimmed[..select.end()].trim_end();
        let rest = &trimmed[select.end()..];
        let boundary = match self.from_re.find(rest) {
            Some(m) if !rest[..m.start()].trim().is_empty() => m.start(),
            _ => return self.untouched(trimmed, default_limit, QueryShape::Malformed),
        };

        let projection = rest[..boundary].trim();
        if projection == "*" {
            return self.untouched(trimmed, default_limit, QueryShape::Wildcard);
        }
        if self.aggregate_re.is_match(projection) {
            return self.untouched(trimmed, default_limit, QueryShape::Aggregate);
        }

        let items = split_projection(projection);
        let missing: Vec<&str> = self
            .required
            .names()
            .iter()
            .copied()
            .filter(|column| !items.iter().any(|item| projects_column(item, column)))
            .collect();

        let text = if missing.is_empty() {
            trimmed.to_string()
        } else {
            format!(
                "{keyword} {}, {projection}{}",
                missing.join(", "),
                &rest[boundary..]
            )
        };

        let (text, effective_limit) = match self.locate_hint(&text) {
            Hint::ReturnTop(raw) => {
                let limit = parse_return_top(raw, default_limit);
                (text, limit)
            }
            Hint::EnableWithout { close, empty } => {
                let mut text = text;
                let separator = if empty { "" } else { ", " };
                text.insert_str(close, &format!("{separator}RETURN_TOP {default_limit}"));
                (text, default_limit)
            }
            Hint::Absent => {
                let base = text.trim_end().trim_end_matches(';').trim_end();
                (
                    format!("{base} ENABLE(RETURN_TOP {default_limit})"),
                    default_limit,
                )
            }
        };

        Query {
            text,
            effective_limit,
            shape: QueryShape::Projection,
        }
    }

    /// Statements left as-is still report a `RETURN_TOP` they already carry.
    fn untouched(&self, text: &str, default_limit: u32, shape: QueryShape) -> Query {
        let effective_limit = match self.locate_hint(text) {
            Hint::ReturnTop(raw) => parse_return_top(raw, default_limit),
            _ => default_limit,
        };
        Query {
            text: text.to_string(),
            effective_limit,
            shape,
        }
    }

    fn locate_hint<'a>(&self, text: &'a str) -> Hint<'a> {
        let Some((start, end)) = trailing_enable(text) else {
            return Hint::Absent;
        };
        let inner = &text[start..end];

        for option in inner.split(',') {
            if let Some(top) = self.return_top_re.captures(option.trim()) {
                return Hint::ReturnTop(top.get(1).map_or("", |m| m.as_str()));
            }
        }

        Hint::EnableWithout {
            close: end,
            empty: inner.trim().is_empty(),
        }
    }
}

/// Rewrite with the default column policy.
pub fn rewrite(query: &str, default_limit: u32) -> Query {
    QueryRewriter::new().rewrite(query, default_limit)
}

fn parse_return_top(raw: &str, default_limit: u32) -> u32 {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => {
            tracing::warn!(
                hint = raw,
                default_limit,
                "unparseable RETURN_TOP hint; using default limit"
            );
            default_limit
        }
    }
}

/// Split a projection on top-level commas (function arguments stay intact).
fn split_projection(projection: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut in_literal = false;
    let mut start = 0;

    for (i, ch) in projection.char_indices() {
        match ch {
            '\'' => in_literal = !in_literal,
            '(' if !in_literal => depth += 1,
            ')' if !in_literal => depth = depth.saturating_sub(1),
            ',' if !in_literal && depth == 0 => {
                items.push(projection[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(projection[start..].trim());
    items
}

/// Byte range of the option list of the statement's closing `ENABLE(...)`
/// clause. Only a parenthesised group outside quoted literals that ends the
/// statement (before an optional `;`) counts.
fn trailing_enable(text: &str) -> Option<(usize, usize)> {
    let body = text.trim_end().trim_end_matches(';').trim_end();

    let mut depth = 0usize;
    let mut in_literal = false;
    let mut open = 0;
    let mut last_group = None;
    for (i, ch) in body.char_indices() {
        match ch {
            '\'' => in_literal = !in_literal,
            '(' if !in_literal => {
                if depth == 0 {
                    open = i;
                }
                depth += 1;
            }
            ')' if !in_literal && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    last_group = Some((open, i));
                }
            }
            _ => {}
        }
    }

    let (open, close) = last_group?;
    if in_literal || depth != 0 || close + 1 != body.len() {
        return None;
    }

    let head = body[..open].trim_end();
    let keyword_at = head.len().checked_sub("ENABLE".len())?;
    if !head.get(keyword_at..)?.eq_ignore_ascii_case("ENABLE") {
        return None;
    }
    let standalone = head[..keyword_at]
        .chars()
        .next_back()
        .map_or(true, |c| !(c.is_alphanumeric() || c == '_'));
    standalone.then_some((open + 1, close))
}

/// `r_object_id`, `f.r_object_id` and `r_object_id AS id` all project the column.
fn projects_column(item: &str, column: &str) -> bool {
    let expr = item.split_whitespace().next().unwrap_or("");
    let name = expr.rsplit('.').next().unwrap_or(expr);
    name.eq_ignore_ascii_case(column)
}
