//! Tokenizer for the record query language.
//!
//! Splits query text into words, numbers, quoted strings and punctuation.
//! The tokenizer is total: characters it does not recognise become
//! [`Token::Symbol`] so the parser can skip them.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while1},
    character::complete::{anychar, char, multispace0},
    combinator::{map, opt, recognize, value},
    multi::many0,
    sequence::{preceded, terminated},
    IResult,
};

/// A lexical token borrowed from the query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Identifier or keyword (letters, digits, `_`, `.`).
    Word(&'a str),
    /// Unsigned integer literal.
    Number(&'a str),
    /// Contents of a single- or double-quoted string, quotes removed.
    Str(&'a str),
    /// `*`
    Star,
    /// `,`
    Comma,
    /// `=`
    Eq,
    /// Any other operator or punctuation.
    Symbol(&'a str),
}

impl<'a> Token<'a> {
    /// Returns true if this is a word equal to `keyword`, ignoring case.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

/// Tokenizes query text.
///
/// # Examples
///
/// ```rust
/// use ehr_query::{tokenize, Token};
///
/// let tokens = tokenize("WHERE gender = 'Male'");
/// assert_eq!(
///     tokens,
///     vec![Token::Word("WHERE"), Token::Word("gender"), Token::Eq, Token::Str("Male")]
/// );
/// ```
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    match terminated(many0(preceded(multispace0, token)), multispace0)(input) {
        Ok((_, tokens)) => tokens,
        Err(_) => Vec::new(),
    }
}

fn token(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        quoted('\''),
        quoted('"'),
        word_or_number,
        value(Token::Star, char('*')),
        value(Token::Comma, char(',')),
        operator,
        value(Token::Eq, char('=')),
        map(recognize(anychar), Token::Symbol),
    ))(input)
}

/// A quoted string. An unterminated quote runs to the end of the input.
fn quoted<'a>(quote: char) -> impl FnMut(&'a str) -> IResult<&'a str, Token<'a>> {
    map(
        preceded(
            char(quote),
            terminated(take_till(move |c: char| c == quote), opt(char(quote))),
        ),
        Token::Str,
    )
}

fn word_or_number(input: &str) -> IResult<&str, Token<'_>> {
    map(
        take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '.'),
        |text: &str| {
            if text.chars().all(|c| c.is_ascii_digit()) {
                Token::Number(text)
            } else {
                Token::Word(text)
            }
        },
    )(input)
}

fn operator(input: &str) -> IResult<&str, Token<'_>> {
    map(
        alt((
            tag("!="),
            tag("<>"),
            tag("<="),
            tag(">="),
            tag("<"),
            tag(">"),
        )),
        Token::Symbol,
    )(input)
}
