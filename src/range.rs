//! Unit selector parsing
//!
//! A selector token is either a single unit number (`10`, `1000.5`) or a range
//! `<a>-<b>` whose bounds may be the sentinels `debut` (resolves to 1) and `fin`
//! (resolves to the catalog's last chapter number or volume count). Parsing is pure;
//! only resolving `fin` needs the catalog totals.

use crate::error::RangeError;
use crate::types::{Range, Selector};

/// Sentinel for the first unit
pub const START_SENTINEL: &str = "debut";
/// Sentinel for the last known unit
pub const END_SENTINEL: &str = "fin";

/// One side of a range token
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bound {
    /// A literal number
    Number(f64),
    /// `debut`, always 1
    First,
    /// `fin`, the last unit known to the catalog
    Last,
}

impl Bound {
    fn parse(text: &str) -> std::result::Result<Self, RangeError> {
        let text = text.trim();
        match text {
            START_SENTINEL => Ok(Bound::First),
            END_SENTINEL => Ok(Bound::Last),
            _ => parse_number(text).map(Bound::Number),
        }
    }

    fn resolve(self, last: f64) -> f64 {
        match self {
            Bound::Number(n) => n,
            Bound::First => 1.0,
            Bound::Last => last,
        }
    }
}

/// A parsed but unresolved selector token
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Token {
    /// A single unit number
    Single(f64),
    /// A range whose bounds may still be sentinels
    Range {
        /// Lower bound
        start: Bound,
        /// Upper bound
        end: Bound,
    },
}

impl Token {
    /// Whether resolving this token needs the catalog totals
    pub fn needs_totals(&self) -> bool {
        matches!(
            self,
            Token::Range {
                start: Bound::Last,
                ..
            } | Token::Range {
                end: Bound::Last,
                ..
            }
        )
    }

    /// Resolve sentinels against a known last unit number
    pub fn resolve_with(self, last: f64) -> std::result::Result<Selector, RangeError> {
        match self {
            Token::Single(number) => Ok(Selector::Single { number }),
            Token::Range { start, end } => {
                let range = Range::new(start.resolve(last), end.resolve(last))?;
                Ok(Selector::Range { range })
            }
        }
    }
}

/// Parse a selector token without resolving sentinels
///
/// # Examples
///
/// ```
/// use japdl::range::{parse_token, Bound, Token};
///
/// assert_eq!(parse_token("10").unwrap(), Token::Single(10.0));
/// assert_eq!(
///     parse_token("debut-fin").unwrap(),
///     Token::Range { start: Bound::First, end: Bound::Last }
/// );
/// assert!(parse_token("abc").is_err());
/// ```
pub fn parse_token(token: &str) -> std::result::Result<Token, RangeError> {
    let token = token.trim();
    match token.split_once('-') {
        None => parse_number(token)
            .map(Token::Single)
            .map_err(|_| RangeError::Parse {
                bound: token.to_string(),
            }),
        Some((start, end)) => {
            // "1--5" is tolerated, "1-5-7" is not
            let end = end.trim_start_matches('-');
            if end.contains('-') {
                return Err(RangeError::Parse {
                    bound: end.to_string(),
                });
            }
            Ok(Token::Range {
                start: Bound::parse(start)?,
                end: Bound::parse(end)?,
            })
        }
    }
}

/// Parse and resolve a selector token against a known last unit number
///
/// # Examples
///
/// ```
/// use japdl::range::parse_selector;
/// use japdl::types::{Range, Selector};
///
/// let selector = parse_selector("debut-50", 120.0).unwrap();
/// assert_eq!(selector, Selector::Range { range: Range::new(1.0, 50.0).unwrap() });
/// assert!(parse_selector("50-debut", 120.0).is_err());
/// ```
pub fn parse_selector(token: &str, last: f64) -> std::result::Result<Selector, RangeError> {
    parse_token(token)?.resolve_with(last)
}

fn parse_number(text: &str) -> std::result::Result<f64, RangeError> {
    let invalid = || RangeError::Parse {
        bound: text.to_string(),
    };
    let number: f64 = text.parse().map_err(|_| invalid())?;
    if !number.is_finite() || number < 0.0 {
        return Err(invalid());
    }
    Ok(number)
}
