//! Tokenizer and parser for dice notation.
//!
//! The grammar is small: an expression is one or more terms separated by
//! `+` or `-`, where a term is either `[count]d<sides>` (count defaults
//! to 1) or a bare non-negative integer. Whitespace is ignored and the
//! `d` separator is case-insensitive.

use crate::expression::{ConstantTerm, DiceTerm, Expression, Sign, Term, Value, MAX_COUNT, MAX_SIDES};

/// A malformed piece of dice notation, carrying the offending text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected token `{0}`")]
    UnexpectedToken(String),

    #[error("dangling operator `{0}` at end of expression")]
    TrailingOperator(char),

    #[error("invalid dice count `{0}`: count must be at least 1")]
    InvalidCount(String),

    #[error("invalid sides count `{0}`: dice need at least 2 sides")]
    InvalidSides(String),

    #[error("`d` must be followed by a number of sides, got `{0}`")]
    MissingSides(String),

    #[error("number `{0}` is too large")]
    NumberTooLarge(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Number(u32),
    D,
    Plus,
    Minus,
}

struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            if self.position >= self.input.len() {
                return Ok(tokens);
            }
            let ch = self.input[self.position];
            match ch {
                '+' => {
                    self.position += 1;
                    tokens.push(Token::Plus);
                }
                '-' => {
                    self.position += 1;
                    tokens.push(Token::Minus);
                }
                'd' | 'D' => {
                    self.position += 1;
                    tokens.push(Token::D);
                }
                '0'..='9' => tokens.push(self.read_number()?),
                other => return Err(ParseError::UnexpectedToken(other.to_string())),
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while self.position < self.input.len() && self.input[self.position].is_whitespace() {
            self.position += 1;
        }
    }

    fn read_number(&mut self) -> Result<Token, ParseError> {
        let start = self.position;
        while self.position < self.input.len() && self.input[self.position].is_ascii_digit() {
            self.position += 1;
        }
        let digits: String = self.input[start..self.position].iter().collect();
        let number: u32 = digits
            .parse()
            .map_err(|_| ParseError::NumberTooLarge(digits.clone()))?;
        Ok(Token::Number(number))
    }
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn parse(mut self) -> Result<Expression, ParseError> {
        let mut terms = Vec::new();

        // leading sign is optional, implicit `+`
        let first_sign = self.maybe_sign().unwrap_or(Sign::Plus);
        terms.push(self.term(first_sign)?);

        while let Some(token) = self.advance() {
            let sign = match token {
                Token::Plus => Sign::Plus,
                Token::Minus => Sign::Minus,
                Token::Number(n) => return Err(ParseError::UnexpectedToken(n.to_string())),
                Token::D => return Err(ParseError::UnexpectedToken("d".into())),
            };
            terms.push(self.term(sign)?);
        }

        // terms is non-empty and every term passed validation, so this
        // cannot fail; keep the constructor as the single gatekeeper anyway
        Expression::new(terms).map_err(|_| ParseError::Empty)
    }

    fn maybe_sign(&mut self) -> Option<Sign> {
        match self.peek() {
            Some(Token::Plus) => {
                self.position += 1;
                Some(Sign::Plus)
            }
            Some(Token::Minus) => {
                self.position += 1;
                Some(Sign::Minus)
            }
            _ => None,
        }
    }

    /// One term after its sign: `count d sides`, `d sides` or a constant.
    fn term(&mut self, sign: Sign) -> Result<Term, ParseError> {
        match self.advance() {
            Some(Token::Number(n)) => match self.peek() {
                Some(Token::D) => {
                    self.position += 1;
                    let sides = self.sides()?;
                    if n < 1 {
                        return Err(ParseError::InvalidCount(format!("{n}d{sides}")));
                    }
                    if n > MAX_COUNT {
                        return Err(ParseError::NumberTooLarge(n.to_string()));
                    }
                    Ok(Term::Dice(DiceTerm {
                        count: n,
                        sides,
                        sign,
                    }))
                }
                _ => Ok(Term::Constant(ConstantTerm {
                    value: n as Value,
                    sign,
                })),
            },
            Some(Token::D) => {
                let sides = self.sides()?;
                Ok(Term::Dice(DiceTerm {
                    count: 1,
                    sides,
                    sign,
                }))
            }
            Some(Token::Plus) => Err(ParseError::UnexpectedToken("+".into())),
            Some(Token::Minus) => Err(ParseError::UnexpectedToken("-".into())),
            None => match sign {
                // `3 +` or a lone `-`
                Sign::Plus => {
                    if self.tokens.is_empty() {
                        Err(ParseError::Empty)
                    } else {
                        Err(ParseError::TrailingOperator('+'))
                    }
                }
                Sign::Minus => Err(ParseError::TrailingOperator('-')),
            },
        }
    }

    fn sides(&mut self) -> Result<u32, ParseError> {
        match self.advance() {
            Some(Token::Number(sides)) if sides > MAX_SIDES => {
                Err(ParseError::NumberTooLarge(sides.to_string()))
            }
            Some(Token::Number(sides)) if sides >= 2 => Ok(sides),
            Some(Token::Number(sides)) => Err(ParseError::InvalidSides(format!("d{sides}"))),
            Some(Token::Plus) => Err(ParseError::MissingSides("+".into())),
            Some(Token::Minus) => Err(ParseError::MissingSides("-".into())),
            Some(Token::D) => Err(ParseError::MissingSides("d".into())),
            None => Err(ParseError::MissingSides("end of input".into())),
        }
    }
}

/// Parses dice notation like `3d6+2` or `2d8 + 1d4 - 3` into an
/// [`Expression`].
///
/// # Errors
/// Returns a [`ParseError`] naming the offending text for empty input,
/// unknown tokens, dangling or doubled operators, counts below 1 or above
/// [`MAX_COUNT`] and sides below 2 or above [`MAX_SIDES`].
///
/// ```
/// use dice_average::parser::parse;
///
/// let expr = parse("2d8 + 1d4 - 3").unwrap();
/// assert_eq!(expr.to_string(), "2d8 + 1d4 - 3");
/// assert!(parse("0d6").is_err());
/// assert!(parse("d1").is_err());
/// ```
pub fn parse(input: &str) -> Result<Expression, ParseError> {
    let tokens = Lexer::new(input).tokenize()?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::expression::Sign;

    #[test]
    fn parses_count_dice_and_modifier() {
        let expr = parse("3d6+2").unwrap();
        assert_eq!(
            expr.terms(),
            &[
                Term::Dice(DiceTerm {
                    count: 3,
                    sides: 6,
                    sign: Sign::Plus
                }),
                Term::Constant(ConstantTerm {
                    value: 2,
                    sign: Sign::Plus
                }),
            ]
        );
        assert_eq!(expr.theoretical_mean(), 12.5);
    }

    #[test]
    fn count_defaults_to_one() {
        let expr = parse("d20").unwrap();
        assert_eq!(
            expr.terms(),
            &[Term::Dice(DiceTerm {
                count: 1,
                sides: 20,
                sign: Sign::Plus
            })]
        );
        assert_eq!(expr.theoretical_mean(), 10.5);
    }

    #[test]
    fn mixed_signs_and_whitespace() {
        let expr = parse("  2d8 - 1d4 + 3 ").unwrap();
        let signs: Vec<Sign> = expr
            .terms()
            .iter()
            .map(|t| match t {
                Term::Dice(d) => d.sign,
                Term::Constant(c) => c.sign,
            })
            .collect();
        assert_eq!(signs, vec![Sign::Plus, Sign::Minus, Sign::Plus]);
        assert_eq!(expr.theoretical_mean(), 9.5);
    }

    #[test]
    fn d_separator_is_case_insensitive() {
        assert_eq!(parse("3D6").unwrap(), parse("3d6").unwrap());
    }

    #[test]
    fn leading_sign_is_allowed() {
        let expr = parse("-d6 + 10").unwrap();
        assert_eq!(expr.to_string(), "-1d6 + 10");
        assert_eq!(parse("+3d6").unwrap(), parse("3d6").unwrap());
    }

    #[test]
    fn whitespace_inside_tokens_is_ignored() {
        assert_eq!(parse("3 d 6 + 2").unwrap(), parse("3d6+2").unwrap());
    }

    #[test]
    fn constant_only_expression_is_valid() {
        let expr = parse("5").unwrap();
        assert_eq!(expr.theoretical_mean(), 5.0);
        assert_eq!(expr.total_dice(), 0);
    }

    #[test]
    fn rejects_zero_count() {
        assert!(matches!(parse("0d6"), Err(ParseError::InvalidCount(_))));
    }

    #[test]
    fn rejects_too_few_sides() {
        assert!(matches!(parse("d1"), Err(ParseError::InvalidSides(s)) if s == "d1"));
        assert!(matches!(parse("2d0"), Err(ParseError::InvalidSides(_))));
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(parse(""), Err(ParseError::Empty));
        assert_eq!(parse("   "), Err(ParseError::Empty));
    }

    #[test]
    fn rejects_dangling_operator() {
        assert!(matches!(
            parse("3d6 +"),
            Err(ParseError::TrailingOperator('+'))
        ));
        assert!(matches!(parse("-"), Err(ParseError::TrailingOperator('-'))));
    }

    #[test]
    fn rejects_consecutive_operators() {
        assert!(matches!(
            parse("3d6 + + 2"),
            Err(ParseError::UnexpectedToken(_))
        ));
        assert!(matches!(
            parse("3d6 - + 2"),
            Err(ParseError::UnexpectedToken(_))
        ));
    }

    #[test]
    fn rejects_unknown_tokens() {
        assert!(matches!(
            parse("3d6 * 2"),
            Err(ParseError::UnexpectedToken(s)) if s == "*"
        ));
        assert!(matches!(parse("2x6"), Err(ParseError::UnexpectedToken(_))));
    }

    #[test]
    fn rejects_missing_sides() {
        assert!(matches!(parse("3d"), Err(ParseError::MissingSides(_))));
        assert!(matches!(parse("3d+2"), Err(ParseError::MissingSides(_))));
        assert!(matches!(parse("3dd6"), Err(ParseError::MissingSides(_))));
    }

    #[test]
    fn rejects_oversized_counts_and_sides() {
        assert!(matches!(
            parse("4000000000d4000000000"),
            Err(ParseError::NumberTooLarge(_))
        ));
        assert!(matches!(
            parse(&format!("{}d6", MAX_COUNT + 1)),
            Err(ParseError::NumberTooLarge(_))
        ));
        assert!(matches!(
            parse(&format!("1d{}", MAX_SIDES + 1)),
            Err(ParseError::NumberTooLarge(_))
        ));
        assert!(parse(&format!("{MAX_COUNT}d{MAX_SIDES}")).is_ok());
    }

    #[test]
    fn rejects_adjacent_numbers() {
        // `3 6` lexes to two numbers with no operator between them
        assert!(matches!(
            parse("3 6"),
            Err(ParseError::UnexpectedToken(_))
        ));
    }

    fn term_strategy() -> impl Strategy<Value = Term> {
        let sign = prop_oneof![Just(Sign::Plus), Just(Sign::Minus)];
        prop_oneof![
            (1u32..=50, 2u32..=1000, sign.clone()).prop_map(|(count, sides, sign)| {
                Term::Dice(DiceTerm { count, sides, sign })
            }),
            (0i64..=10_000, sign).prop_map(|(value, sign)| {
                Term::Constant(ConstantTerm { value, sign })
            }),
        ]
    }

    fn expression_strategy() -> impl Strategy<Value = Expression> {
        prop::collection::vec(term_strategy(), 1..6)
            .prop_map(|terms| Expression::new(terms).unwrap())
    }

    proptest! {
        #[test]
        fn canonical_round_trip(expr in expression_strategy()) {
            let canonical = expr.to_string();
            let reparsed = parse(&canonical).unwrap();
            prop_assert_eq!(&reparsed, &expr);
            prop_assert_eq!(reparsed.to_string(), canonical);
        }

        #[test]
        fn parse_never_panics(input in "\\PC{0,40}") {
            let _ = parse(&input);
        }

        #[test]
        fn valid_simple_dice_always_parse(count in 1u32..=1000, sides in 2u32..=1000) {
            let expr = parse(&format!("{count}d{sides}")).unwrap();
            prop_assert_eq!(expr.total_dice(), count as u64);
        }
    }
}
