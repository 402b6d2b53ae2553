//! Lexical sub-scanners invoked by the main scanner.
//!
//! These handle the spans the flat token scan cannot: quoted string
//! literals (single- and double-quote variants), complete `[attr=value]`
//! groups folded into selector tokens, and the numeric `/<n>` build ref
//! that can follow an opening `{` in a previously compiled sheet.

use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::is_not;
use nom::character::complete::{anychar, char, digit1};
use nom::combinator::{map_res, opt, recognize};
use nom::multi::many0_count;
use nom::sequence::{delimited, preceded, terminated};

/// Matches the body of a quoted string up to (and including) the closing
/// quote. The input starts just after the opening quote; the parsed value
/// is the raw body with escape sequences intact.
pub fn quoted_body(quote: char) -> impl Fn(&str) -> IResult<&str, &str> {
    move |input| {
        let stop = match quote {
            '\'' => "\\'",
            _ => "\\\"",
        };
        terminated(
            recognize(many0_count(alt((
                recognize(is_not(stop)),
                recognize(preceded(char('\\'), anychar)),
            )))),
            char(quote),
        )(input)
    }
}

/// Matches a complete attribute group starting at `[`, including quoted
/// strings inside it. Incomplete groups fail, leaving `[` to be treated
/// as a structural operator.
pub fn attr_group(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        char('['),
        many0_count(alt((
            recognize(is_not("]'\"")),
            recognize(preceded(char('\''), quoted_body('\''))),
            recognize(preceded(char('"'), quoted_body('"'))),
        ))),
        char(']'),
    ))(input)
}

/// Matches the `/<digits>` build-time rule reference after `{`.
pub fn build_ref(input: &str) -> IResult<&str, usize> {
    map_res(preceded(char('/'), digit1), str::parse)(input)
}

/// Matches an optional trailing `?` conditional marker.
pub fn conditional_marker(input: &str) -> IResult<&str, bool> {
    let (rest, marker) = opt(char('?'))(input)?;
    Ok((rest, marker.is_some()))
}

/// Removes escape sequences from a raw string body: `\x` becomes `x`.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// The trailing identifier of `text`: the callee name in `0 calc` is
/// `calc`. Identifier characters are word characters and `-`.
pub fn trailing_ident(text: &str) -> &str {
    match text
        .char_indices()
        .rfind(|(_, c)| !(c.is_alphanumeric() || *c == '_' || *c == '-'))
    {
        Some((i, c)) => &text[i + c.len_utf8()..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_body_simple() {
        let (rest, body) = quoted_body('"')("hello\" tail").unwrap();
        assert_eq!(body, "hello");
        assert_eq!(rest, " tail");
    }

    #[test]
    fn quoted_body_with_escape() {
        let (rest, body) = quoted_body('"')("a\\\"b\";").unwrap();
        assert_eq!(body, "a\\\"b");
        assert_eq!(rest, ";");
        assert_eq!(unescape(body), "a\"b");
    }

    #[test]
    fn quoted_body_empty() {
        let (rest, body) = quoted_body('\'')("'x").unwrap();
        assert_eq!(body, "");
        assert_eq!(rest, "x");
    }

    #[test]
    fn quoted_body_unterminated() {
        assert!(quoted_body('"')("no close").is_err());
    }

    #[test]
    fn attr_group_plain() {
        let (rest, group) = attr_group("[type=text] rest").unwrap();
        assert_eq!(group, "[type=text]");
        assert_eq!(rest, " rest");
    }

    #[test]
    fn attr_group_quoted() {
        let (_, group) = attr_group("[name=\"a]b\"]").unwrap();
        assert_eq!(group, "[name=\"a]b\"]");
    }

    #[test]
    fn attr_group_incomplete() {
        assert!(attr_group("[unclosed").is_err());
    }

    #[test]
    fn build_ref_digits() {
        let (rest, n) = build_ref("/42 ").unwrap();
        assert_eq!(n, 42);
        assert_eq!(rest, " ");
    }

    #[test]
    fn trailing_ident_of_mixed_text() {
        assert_eq!(trailing_ident("0 calc"), "calc");
        assert_eq!(trailing_ident("rgb"), "rgb");
        assert_eq!(trailing_ident("a b "), "");
    }
}
