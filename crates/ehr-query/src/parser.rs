//! Query parser implementation using nom over a token stream.
//!
//! The grammar is deliberately small and forgiving:
//!
//! ```text
//! query     := junk? clause*
//! clause    := SELECT body | FROM body | WHERE body | GROUP BY body | LIMIT body
//! body      := token* up to the next clause keyword or end of input
//! select    := '*' | word (',' word)*
//! where     := condition (AND condition)*
//! condition := word '=' string | word LIKE string
//! ```
//!
//! Each clause body is parsed independently. A body that does not fit its
//! clause shape contributes nothing to the plan instead of failing the query.

use nom::{
    branch::alt,
    combinator::{map, value},
    error::{Error, ErrorKind},
    multi::{many0, separated_list1},
    sequence::{pair, preceded, tuple},
    IResult,
};

use crate::ast::{Columns, GroupBy, Predicate, QueryPlan};
use crate::lexer::{tokenize, Token};

type Tokens<'t, 'a> = &'t [Token<'a>];
type TokenResult<'t, 'a, O> = IResult<Tokens<'t, 'a>, O>;

/// Parses a textual query into a [`QueryPlan`].
///
/// Parsing never fails. Clauses that are missing or malformed fall back to
/// the defaults of [`QueryPlan::default`].
///
/// # Examples
///
/// ```rust
/// use ehr_query::{parse_query, GroupBy, MatchKind};
///
/// let plan = parse_query("SELECT * FROM ehr_records WHERE condition LIKE '%abet%' LIMIT 10");
/// assert_eq!(plan.predicate("condition").unwrap().value, "abet");
/// assert_eq!(plan.predicate("condition").unwrap().kind, MatchKind::Like);
/// assert_eq!(plan.limit, Some(10));
///
/// let plan = parse_query("select * from ehr_records group by GENDER");
/// assert_eq!(plan.group_by, Some(GroupBy::Gender));
///
/// // Unsupported syntax degrades instead of erroring
/// let plan = parse_query("DROP TABLE ehr_records");
/// assert!(plan.predicates.is_empty());
/// ```
pub fn parse_query(input: &str) -> QueryPlan {
    let tokens = tokenize(input);
    let mut plan = QueryPlan::default();

    let clauses = match query(&tokens) {
        Ok((_, clauses)) => clauses,
        Err(_) => return plan,
    };

    for (clause, body) in clauses {
        match clause {
            Clause::Select => plan.columns = select_columns(body),
            Clause::From => {
                if let Ok((_, table)) = word(body) {
                    plan.table = Some(table.to_string());
                }
            }
            Clause::Where => {
                for condition_tokens in body.split(|t| t.is_keyword("AND")) {
                    if let Some((field, predicate)) = condition(condition_tokens) {
                        plan.predicates.insert(field, predicate);
                    }
                }
            }
            Clause::GroupBy => {
                plan.group_by = word(body)
                    .ok()
                    .and_then(|(_, field)| field.parse::<GroupBy>().ok());
            }
            Clause::Limit => {
                plan.limit = number(body)
                    .ok()
                    .and_then(|(_, digits)| digits.parse::<usize>().ok());
            }
        }
    }

    plan
}

/// Normalizes query text for use as a cache key.
///
/// Collapses whitespace runs into single spaces and trims both ends. Case
/// is preserved because quoted match values are case-sensitive text.
///
/// # Example
///
/// ```rust
/// use ehr_query::normalize_query_key;
///
/// assert_eq!(
///     normalize_query_key("  SELECT *\n FROM   ehr_records "),
///     "SELECT * FROM ehr_records"
/// );
/// ```
pub fn normalize_query_key(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Clause splitting
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    Select,
    From,
    Where,
    GroupBy,
    Limit,
}

fn query<'t, 'a>(input: Tokens<'t, 'a>) -> TokenResult<'t, 'a, Vec<(Clause, Tokens<'t, 'a>)>> {
    // Anything before the first recognised keyword is ignored
    preceded(clause_body, many0(pair(clause_keyword, clause_body)))(input)
}

fn clause_keyword<'t, 'a>(input: Tokens<'t, 'a>) -> TokenResult<'t, 'a, Clause> {
    alt((
        value(Clause::Select, keyword("SELECT")),
        value(Clause::From, keyword("FROM")),
        value(Clause::Where, keyword("WHERE")),
        value(Clause::GroupBy, pair(keyword("GROUP"), keyword("BY"))),
        value(Clause::Limit, keyword("LIMIT")),
    ))(input)
}

/// Takes tokens up to (not including) the next clause keyword.
fn clause_body<'t, 'a>(input: Tokens<'t, 'a>) -> TokenResult<'t, 'a, Tokens<'t, 'a>> {
    let mut end = 0;
    while end < input.len() && clause_keyword(&input[end..]).is_err() {
        end += 1;
    }
    Ok((&input[end..], &input[..end]))
}

// ============================================================================
// Clause bodies
// ============================================================================

fn select_columns(body: Tokens<'_, '_>) -> Columns {
    let columns = alt((
        value(Columns::All, star),
        map(separated_list1(comma, word), |names: Vec<&str>| {
            Columns::Named(names.iter().map(|n| n.to_ascii_lowercase()).collect())
        }),
    ))(body);

    match columns {
        Ok((_, columns)) => columns,
        Err(_) => Columns::All,
    }
}

/// Parses one `WHERE` condition. Tokens after a recognised shape are ignored.
fn condition(tokens: Tokens<'_, '_>) -> Option<(String, Predicate)> {
    let parsed = alt((
        map(
            tuple((word, equals, string_literal)),
            |(field, _, text): (&str, (), &str)| (field, Predicate::equals(text.trim())),
        ),
        map(
            tuple((word, keyword("LIKE"), string_literal)),
            |(field, _, text): (&str, (), &str)| {
                (field, Predicate::like(text.trim_matches('%').trim()))
            },
        ),
    ))(tokens);

    match parsed {
        Ok((_, (field, predicate))) if !predicate.value.is_empty() => {
            Some((field.to_ascii_lowercase(), predicate))
        }
        _ => None,
    }
}

// ============================================================================
// Token primitives
// ============================================================================

fn reject<'t, 'a, O>(input: Tokens<'t, 'a>) -> TokenResult<'t, 'a, O> {
    Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)))
}

fn keyword<'t, 'a: 't>(kw: &'static str) -> impl Fn(Tokens<'t, 'a>) -> TokenResult<'t, 'a, ()> {
    move |input| match input.split_first() {
        Some((token, rest)) if token.is_keyword(kw) => Ok((rest, ())),
        _ => reject(input),
    }
}

fn word<'t, 'a>(input: Tokens<'t, 'a>) -> TokenResult<'t, 'a, &'a str> {
    match input.split_first() {
        Some((Token::Word(w), rest)) => Ok((rest, *w)),
        _ => reject(input),
    }
}

fn number<'t, 'a>(input: Tokens<'t, 'a>) -> TokenResult<'t, 'a, &'a str> {
    match input.split_first() {
        Some((Token::Number(n), rest)) => Ok((rest, *n)),
        _ => reject(input),
    }
}

fn string_literal<'t, 'a>(input: Tokens<'t, 'a>) -> TokenResult<'t, 'a, &'a str> {
    match input.split_first() {
        Some((Token::Str(s), rest)) => Ok((rest, *s)),
        _ => reject(input),
    }
}

fn star<'t, 'a>(input: Tokens<'t, 'a>) -> TokenResult<'t, 'a, ()> {
    match input.split_first() {
        Some((Token::Star, rest)) => Ok((rest, ())),
        _ => reject(input),
    }
}

fn comma<'t, 'a>(input: Tokens<'t, 'a>) -> TokenResult<'t, 'a, ()> {
    match input.split_first() {
        Some((Token::Comma, rest)) => Ok((rest, ())),
        _ => reject(input),
    }
}

fn equals<'t, 'a>(input: Tokens<'t, 'a>) -> TokenResult<'t, 'a, ()> {
    match input.split_first() {
        Some((Token::Eq, rest)) => Ok((rest, ())),
        _ => reject(input),
    }
}

// ============================================================================
// Tests
// ============================================================================
