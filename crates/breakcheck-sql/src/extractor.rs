//! Projection-list extraction
//!
//! This is deliberately not a SQL parser. It tokenizes a model with the
//! sqlparser tokenizer and reads the top-level `SELECT ... FROM` span of the
//! first statement, collecting identifier tokens as output columns.
//!
//! Known blind spots:
//! - `a AS b` yields both `a` and `b`, and `a + b AS c` yields all three
//! - unaliased casts and function calls (`count(*)`) yield no column
//! - subqueries and CTE bodies are not recursed into
//! - `*` is recorded as a wildcard, never expanded
//!
//! Window frames (`NULLS FIRST`, `ROWS BETWEEN ... CURRENT ROW`) sit inside
//! `OVER (...)` and are never read, so words such as `first`, `row` or
//! `range` are columns when they appear at the top level.

use breakcheck_core::{DialectConfig, Schema};
use sqlparser::dialect::{BigQueryDialect, Dialect, GenericDialect, PostgreSqlDialect, SnowflakeDialect};
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, Tokenizer, Word};
use std::collections::{BTreeMap, BTreeSet};

use crate::template::TemplateRenderer;

/// Words that never name a projected column
const PROJECTION_KEYWORDS: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "AT", "BETWEEN", "BY", "CASE", "CURRENT_DATE", "CURRENT_TIME",
    "CURRENT_TIMESTAMP", "DESC", "DISTINCT", "ELSE", "END", "EXISTS", "FALSE", "FOLLOWING",
    "GROUP", "ILIKE", "IN", "INTERVAL", "IS", "LIKE", "LOCALTIMESTAMP", "NOT", "NULL", "NULLS",
    "OR", "ORDER", "OVER", "PARTITION", "PRECEDING", "ROWS", "THEN", "TRUE", "UNBOUNDED", "WHEN",
    "WITHIN",
];

/// Words that continue a type name after its first word
const TYPE_CONTINUATIONS: &[&str] = &["PRECISION", "VARYING"];

/// Functions whose `AS <type>` argument declares the item's type
const CAST_FUNCTIONS: &[&str] = &["CAST", "TRY_CAST", "SAFE_CAST"];

/// Failure to read a model's text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    /// The tokenizer rejected the text (unterminated string, comment, ...)
    #[error("failed to tokenize SQL: {message}")]
    Tokenize { message: String },
}

/// Extracts a [`Schema`] from model definition text
pub struct SchemaExtractor {
    dialect: Box<dyn Dialect>,
    renderer: TemplateRenderer,
}

impl SchemaExtractor {
    /// Create an extractor with the default (generic) dialect
    pub fn new() -> Self {
        Self::from_dialect(&DialectConfig::Ansi)
    }

    /// Create an extractor from a dialect config
    pub fn from_dialect(dialect: &DialectConfig) -> Self {
        let dialect: Box<dyn Dialect> = match dialect {
            DialectConfig::BigQuery => Box::new(BigQueryDialect {}),
            DialectConfig::Snowflake => Box::new(SnowflakeDialect {}),
            DialectConfig::Postgres => Box::new(PostgreSqlDialect {}),
            DialectConfig::Ansi => Box::new(GenericDialect {}),
        };

        Self {
            dialect,
            renderer: TemplateRenderer::default(),
        }
    }

    /// Replace the template renderer (custom vars or target)
    pub fn with_renderer(mut self, renderer: TemplateRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// Extract the output schema of a model
    ///
    /// Empty text (a file absent at that revision) yields the empty schema.
    pub fn extract(&self, text: &str) -> Result<Schema, ExtractError> {
        if text.trim().is_empty() {
            return Ok(Schema::new());
        }

        let sql = self.renderer.render(text);

        let tokens = Tokenizer::new(&*self.dialect, &sql)
            .tokenize()
            .map_err(|e| ExtractError::Tokenize { message: e.to_string() })?;

        let tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|t| !matches!(t, Token::Whitespace(_)))
            .collect();

        Ok(scan_projection(&tokens))
    }
}

impl Default for SchemaExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// State of the select-list item being read
#[derive(Default)]
struct ProjectionItem {
    current_column: Option<String>,
    data_type: Option<String>,
    case_depth: usize,
    tokens_seen: usize,
}

impl ProjectionItem {
    fn finish(self, types: &mut BTreeMap<String, String>) {
        if let (Some(column), Some(data_type)) = (self.current_column, self.data_type) {
            types.insert(column, data_type);
        }
    }
}

fn scan_projection(tokens: &[Token]) -> Schema {
    let Some(start) = projection_start(tokens) else {
        return Schema::new();
    };

    let mut columns = BTreeSet::new();
    let mut types = BTreeMap::new();
    let mut wildcard = false;
    let mut item = ProjectionItem::default();
    let mut depth = 0usize;
    let mut i = start;

    while i < tokens.len() {
        let token = &tokens[i];
        let next = tokens.get(i + 1);

        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Token::SemiColon if depth == 0 => break,
            Token::EOF => break,
            _ if depth > 0 => {}
            Token::Word(w) if w.keyword == Keyword::FROM => break,
            Token::Comma => {
                std::mem::take(&mut item).finish(&mut types);
                i += 1;
                continue;
            }
            Token::Mul => {
                let after_period = i > 0 && matches!(tokens[i - 1], Token::Period);
                if item.tokens_seen == 0 || after_period {
                    wildcard = true;
                }
            }
            Token::DoubleColon => {
                if let Some((data_type, resume)) = read_suffix_type(tokens, i + 1) {
                    item.data_type = Some(data_type);
                    item.tokens_seen += 1;
                    i = resume;
                    continue;
                }
            }
            Token::Word(w) => {
                let upper = w.value.to_uppercase();
                let unquoted = w.quote_style.is_none();

                if unquoted && upper == "AT" && is_time_zone(tokens, i + 1) {
                    // `ts AT TIME ZONE 'UTC'`
                    item.tokens_seen += 3;
                    i += 3;
                    continue;
                } else if unquoted && upper == "CASE" {
                    item.case_depth += 1;
                } else if unquoted && upper == "END" {
                    item.case_depth = item.case_depth.saturating_sub(1);
                } else if unquoted
                    && CAST_FUNCTIONS.contains(&upper.as_str())
                    && matches!(next, Some(Token::LParen))
                {
                    let (data_type, resume) = read_cast(tokens, i + 1);
                    if data_type.is_some() {
                        item.data_type = data_type;
                    }
                    item.tokens_seen += 1;
                    i = resume;
                    continue;
                } else if is_column_word(w, next) && item.case_depth == 0 {
                    let name = normalize_identifier(w);
                    columns.insert(name.clone());
                    item.current_column = Some(name);
                }
            }
            _ => {}
        }

        item.tokens_seen += 1;
        i += 1;
    }

    item.finish(&mut types);

    let mut schema = Schema::from_columns(columns).with_wildcard(wildcard);
    for (column, data_type) in types {
        schema = schema.with_typed_column(column, data_type);
    }
    schema
}

/// Index just past the first top-level `SELECT` of the first statement
fn projection_start(tokens: &[Token]) -> Option<usize> {
    let mut depth = 0usize;

    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::SemiColon if depth == 0 => return None,
            Token::Word(w) if depth == 0 && w.keyword == Keyword::SELECT => return Some(i + 1),
            _ => {}
        }
    }

    None
}

/// Whether a word at depth 0 names an output column
fn is_column_word(word: &Word, next: Option<&Token>) -> bool {
    // function call, qualifier (`t.col`) or typed literal (`DATE '2024-01-01'`)
    if matches!(
        next,
        Some(Token::LParen) | Some(Token::Period) | Some(Token::SingleQuotedString(_))
    ) {
        return false;
    }

    if word.quote_style.is_some() {
        return true;
    }

    !PROJECTION_KEYWORDS.contains(&word.value.to_uppercase().as_str())
}

fn normalize_identifier(word: &Word) -> String {
    match word.quote_style {
        Some(_) => word.value.clone(),
        None => word.value.to_lowercase(),
    }
}

/// Whether `TIME ZONE` starts at `start`
fn is_time_zone(tokens: &[Token], start: usize) -> bool {
    is_plain_word(tokens.get(start), "TIME") && is_plain_word(tokens.get(start + 1), "ZONE")
}

fn is_plain_word(token: Option<&Token>, expected: &str) -> bool {
    matches!(
        token,
        Some(Token::Word(w)) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(expected)
    )
}

/// Read the type after `::`
///
/// Multi-word names (`double precision`, `character varying(20)`,
/// `timestamp with time zone`) and parameter lists are part of the type.
/// Reading stops at the first token that cannot continue it.
fn read_suffix_type(tokens: &[Token], start: usize) -> Option<(String, usize)> {
    let Some(Token::Word(w)) = tokens.get(start) else {
        return None;
    };

    let mut parts = vec![w.value.clone()];
    let mut i = start + 1;
    let mut params_allowed = true;

    loop {
        match tokens.get(i) {
            Some(Token::LParen) if params_allowed => {
                i = push_group(tokens, i, &mut parts);
                params_allowed = false;
            }
            Some(Token::Word(w))
                if w.quote_style.is_none()
                    && TYPE_CONTINUATIONS.contains(&w.value.to_uppercase().as_str()) =>
            {
                parts.push(w.value.clone());
                i += 1;
                params_allowed = true;
            }
            Some(Token::Word(w))
                if w.quote_style.is_none()
                    && (w.value.eq_ignore_ascii_case("WITH")
                        || w.value.eq_ignore_ascii_case("WITHOUT"))
                    && is_time_zone(tokens, i + 1) =>
            {
                parts.extend([w.value.clone(), "TIME".to_string(), "ZONE".to_string()]);
                i += 3;
                params_allowed = false;
            }
            _ => break,
        }
    }

    Some((normalize_type(&parts.join(" ")), i))
}

/// Append a balanced parenthesized group starting at `open`
///
/// Returns the index just past the closing parenthesis.
fn push_group(tokens: &[Token], open: usize, parts: &mut Vec<String>) -> usize {
    let mut depth = 0usize;
    let mut i = open;

    while let Some(token) = tokens.get(i) {
        parts.push(token.to_string());
        i += 1;
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
    }

    i
}

/// Read `CAST(<expr> AS <type>)` starting at its opening parenthesis
///
/// Returns the declared type (if an `AS` was found) and the index just past
/// the matching closing parenthesis.
fn read_cast(tokens: &[Token], open: usize) -> (Option<String>, usize) {
    let mut depth = 0usize;
    let mut type_parts: Option<Vec<String>> = None;
    let mut i = open;

    while let Some(token) = tokens.get(i) {
        i += 1;
        match token {
            Token::LParen => {
                depth += 1;
                if depth == 1 {
                    continue;
                }
            }
            Token::RParen => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Token::Word(w) if depth == 1 && w.keyword == Keyword::AS => {
                type_parts = Some(Vec::new());
                continue;
            }
            _ => {}
        }

        if let Some(parts) = type_parts.as_mut() {
            parts.push(token.to_string());
        }
    }

    let data_type = type_parts
        .filter(|parts| !parts.is_empty())
        .map(|parts| normalize_type(&parts.join(" ")));

    (data_type, i)
}

/// Canonical spelling of a type: uppercase, no space around punctuation
///
/// `numeric( 10 , 2 )` and `NUMERIC(10,2)` compare equal.
pub fn normalize_type(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut out = String::with_capacity(collapsed.len());
    for ch in collapsed.chars() {
        if ch == ' ' && (out.ends_with('(') || out.ends_with(',')) {
            continue;
        }
        if matches!(ch, '(' | ')' | ',') && out.ends_with(' ') {
            out.pop();
        }
        out.push(ch);
    }

    out.to_uppercase()
}
