use std::fmt::{self, Display};
use std::str::FromStr;

use fraction::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::parser::{self, ParseError};

/// Totals and individual face values are of type [`i64`].
pub type Value = i64;

/// Largest accepted dice count per term.
pub const MAX_COUNT: u32 = 1_000_000;
/// Largest accepted number of sides per die.
///
/// Together with [`MAX_COUNT`] this keeps `count * sides` of every term,
/// and thus the min/max totals of any parseable expression, far inside
/// the [`Value`] range, so the closed-form queries never overflow.
pub const MAX_SIDES: u32 = 1_000_000;
/// Exact aggregate values (means, variances) use [`BigFraction`](fraction::BigFraction)
/// to avoid floating point precision errors.
pub type AggrValue = fraction::BigFraction;

/// Whether a term adds to or subtracts from the expression total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    Plus,
    Minus,
}

impl Sign {
    /// The multiplier this sign applies to its term: `+1` or `-1`.
    pub const fn factor(self) -> Value {
        match self {
            Sign::Plus => 1,
            Sign::Minus => -1,
        }
    }
}

impl Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sign::Plus => write!(f, "+"),
            Sign::Minus => write!(f, "-"),
        }
    }
}

/// A group of identical dice, like the `3d6` in `3d6+2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceTerm {
    /// Number of dice in the group, at least 1 and at most [`MAX_COUNT`].
    pub count: u32,
    /// Faces per die, at least 2 and at most [`MAX_SIDES`].
    pub sides: u32,
    pub sign: Sign,
}

impl DiceTerm {
    /// Smallest total this group can contribute, sign applied.
    pub fn min_value(&self) -> Value {
        match self.sign {
            Sign::Plus => self.count as Value,
            Sign::Minus => -(self.count as Value * self.sides as Value),
        }
    }

    /// Largest total this group can contribute, sign applied.
    pub fn max_value(&self) -> Value {
        match self.sign {
            Sign::Plus => self.count as Value * self.sides as Value,
            Sign::Minus => -(self.count as Value),
        }
    }

    /// Exact expected contribution: `sign * count * (sides + 1) / 2`.
    pub fn expected_value(&self) -> AggrValue {
        let numerator = self.count as u64 * (self.sides as u64 + 1);
        let ev = AggrValue::new(numerator, 2u64);
        match self.sign {
            Sign::Plus => ev,
            Sign::Minus => -ev,
        }
    }
}

/// A flat modifier, like the `+2` in `3d6+2`.
///
/// `value` is the magnitude as written in the notation; the sign lives in
/// `sign` so that canonical re-serialization is lossless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantTerm {
    /// Magnitude of the modifier, non-negative.
    pub value: Value,
    pub sign: Sign,
}

impl ConstantTerm {
    /// The value this constant contributes to the total, sign applied.
    pub fn signed_value(&self) -> Value {
        self.sign.factor() * self.value
    }
}

/// One additive component of a dice expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum Term {
    Dice(DiceTerm),
    Constant(ConstantTerm),
}

impl Term {
    fn min_value(&self) -> Value {
        match self {
            Term::Dice(d) => d.min_value(),
            Term::Constant(c) => c.signed_value(),
        }
    }

    fn max_value(&self) -> Value {
        match self {
            Term::Dice(d) => d.max_value(),
            Term::Constant(c) => c.signed_value(),
        }
    }

    fn expected_value(&self) -> AggrValue {
        match self {
            Term::Dice(d) => d.expected_value(),
            Term::Constant(c) => AggrValue::from(c.signed_value()),
        }
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Dice(d) => write!(f, "{}d{}", d.count, d.sides),
            Term::Constant(c) => write!(f, "{}", c.value),
        }
    }
}

/// A parsed dice expression: an ordered, non-empty sequence of [`Term`]s.
///
/// Term order is preserved for display only; evaluation treats the terms as
/// an unordered multiset (summation is commutative). An `Expression` is
/// immutable once constructed, either via [`Expression::new`] or by parsing:
///
/// ```
/// use dice_average::Expression;
///
/// let expr: Expression = "3d6 + 2".parse().unwrap();
/// assert_eq!(expr.to_string(), "3d6 + 2");
/// assert_eq!(expr.theoretical_mean(), 12.5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Term>", into = "Vec<Term>")]
pub struct Expression {
    terms: Vec<Term>,
}

impl Expression {
    /// Builds an expression from terms, checking the term invariants:
    /// at least one term, dice counts in `1..=MAX_COUNT`, sides in
    /// `2..=MAX_SIDES`, constant magnitudes non-negative.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if any invariant is violated.
    pub fn new(terms: Vec<Term>) -> Result<Self, Error> {
        if terms.is_empty() {
            return Err(Error::Validation(
                "an expression needs at least one term".into(),
            ));
        }
        for term in &terms {
            match term {
                Term::Dice(d) if d.count < 1 => {
                    return Err(Error::Validation(format!(
                        "dice count must be at least 1, got {}",
                        d.count
                    )));
                }
                Term::Dice(d) if d.count > MAX_COUNT => {
                    return Err(Error::Validation(format!(
                        "dice count must be at most {MAX_COUNT}, got {}",
                        d.count
                    )));
                }
                Term::Dice(d) if d.sides < 2 => {
                    return Err(Error::Validation(format!(
                        "dice need at least 2 sides, got {}",
                        d.sides
                    )));
                }
                Term::Dice(d) if d.sides > MAX_SIDES => {
                    return Err(Error::Validation(format!(
                        "dice can have at most {MAX_SIDES} sides, got {}",
                        d.sides
                    )));
                }
                Term::Constant(c) if c.value < 0 => {
                    return Err(Error::Validation(format!(
                        "constant magnitude must be non-negative, got {}",
                        c.value
                    )));
                }
                _ => {}
            }
        }
        Ok(Expression { terms })
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// The dice terms of the expression, in declaration order.
    pub fn dice_terms(&self) -> impl Iterator<Item = &DiceTerm> {
        self.terms.iter().filter_map(|t| match t {
            Term::Dice(d) => Some(d),
            Term::Constant(_) => None,
        })
    }

    /// Total number of individual dice rolled per iteration.
    pub fn total_dice(&self) -> u64 {
        self.dice_terms().map(|d| d.count as u64).sum()
    }

    /// Smallest total the expression can produce.
    pub fn min_value(&self) -> Value {
        self.terms.iter().map(Term::min_value).sum()
    }

    /// Largest total the expression can produce.
    pub fn max_value(&self) -> Value {
        self.terms.iter().map(Term::max_value).sum()
    }

    /// Exact expected value, computed in closed form without sampling.
    ///
    /// Queryable independently of any evaluation run, for inspection
    /// features and as a ground-truth comparator against empirical means.
    pub fn theoretical_mean_exact(&self) -> AggrValue {
        self.terms
            .iter()
            .map(Term::expected_value)
            .fold(AggrValue::from(0), |acc, ev| acc + ev)
    }

    /// [`Expression::theoretical_mean_exact`] as an `f64`.
    pub fn theoretical_mean(&self) -> f64 {
        // the exact mean of finitely many finite terms always fits an f64
        self.theoretical_mean_exact().to_f64().unwrap_or(f64::NAN)
    }

    /// Summary of the expression without rolling anything.
    pub fn info(&self) -> ExpressionInfo {
        ExpressionInfo {
            expression: self.to_string(),
            dice_groups: self.dice_terms().count(),
            total_dice: self.total_dice(),
            min_value: self.min_value(),
            max_value: self.max_value(),
            theoretical_mean: self.theoretical_mean(),
        }
    }
}

impl Display for Expression {
    /// Canonical notation: terms joined by ` + ` / ` - `, dice counts always
    /// printed (`1d20`, never `d20`). Parsing the canonical form yields an
    /// equal expression.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            let sign = match term {
                Term::Dice(d) => d.sign,
                Term::Constant(c) => c.sign,
            };
            if i == 0 {
                if sign == Sign::Minus {
                    write!(f, "-")?;
                }
            } else {
                write!(f, " {} ", sign)?;
            }
            write!(f, "{}", term)?;
        }
        Ok(())
    }
}

impl FromStr for Expression {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parser::parse(s)
    }
}

impl TryFrom<Vec<Term>> for Expression {
    type Error = Error;

    fn try_from(terms: Vec<Term>) -> Result<Self, Error> {
        Expression::new(terms)
    }
}

impl From<Expression> for Vec<Term> {
    fn from(expr: Expression) -> Self {
        expr.terms
    }
}

/// Plain-data inspection of an expression, serializable for the
/// presentation layer. Produced by [`Expression::info`] without sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionInfo {
    pub expression: String,
    pub dice_groups: usize,
    pub total_dice: u64,
    pub min_value: Value,
    pub max_value: Value,
    pub theoretical_mean: f64,
}

#[cfg(test)]
mod test {
    use super::*;

    fn dice(count: u32, sides: u32, sign: Sign) -> Term {
        Term::Dice(DiceTerm { count, sides, sign })
    }

    fn constant(value: Value, sign: Sign) -> Term {
        Term::Constant(ConstantTerm { value, sign })
    }

    #[test]
    fn theoretical_mean_of_3d6_plus_2() {
        let expr =
            Expression::new(vec![dice(3, 6, Sign::Plus), constant(2, Sign::Plus)]).unwrap();
        assert_eq!(expr.theoretical_mean(), 12.5);
        assert_eq!(expr.min_value(), 5);
        assert_eq!(expr.max_value(), 20);
    }

    #[test]
    fn theoretical_mean_with_subtracted_dice() {
        // 2d8 - 1d4 + 3 => 9.0 - 2.5 + 3.0
        let expr = Expression::new(vec![
            dice(2, 8, Sign::Plus),
            dice(1, 4, Sign::Minus),
            constant(3, Sign::Plus),
        ])
        .unwrap();
        assert_eq!(expr.theoretical_mean(), 9.5);
        assert_eq!(expr.min_value(), 2 - 4 + 3);
        assert_eq!(expr.max_value(), 16 - 1 + 3);
    }

    #[test]
    fn exact_mean_has_no_rounding() {
        let expr = Expression::new(vec![dice(1, 3, Sign::Plus)]).unwrap();
        assert_eq!(expr.theoretical_mean_exact(), AggrValue::new(2u64, 1u64));
    }

    #[test]
    fn canonical_display() {
        let expr = Expression::new(vec![
            dice(2, 8, Sign::Plus),
            dice(1, 4, Sign::Minus),
            constant(3, Sign::Plus),
        ])
        .unwrap();
        assert_eq!(expr.to_string(), "2d8 - 1d4 + 3");

        let leading_minus =
            Expression::new(vec![dice(1, 6, Sign::Minus), constant(10, Sign::Plus)]).unwrap();
        assert_eq!(leading_minus.to_string(), "-1d6 + 10");
    }

    #[test]
    fn new_rejects_invalid_terms() {
        assert!(Expression::new(vec![]).is_err());
        assert!(Expression::new(vec![dice(0, 6, Sign::Plus)]).is_err());
        assert!(Expression::new(vec![dice(1, 1, Sign::Plus)]).is_err());
        assert!(Expression::new(vec![constant(-2, Sign::Plus)]).is_err());
    }

    #[test]
    fn new_rejects_oversized_terms() {
        assert!(Expression::new(vec![dice(MAX_COUNT + 1, 6, Sign::Plus)]).is_err());
        assert!(Expression::new(vec![dice(1, MAX_SIDES + 1, Sign::Plus)]).is_err());
    }

    #[test]
    fn largest_accepted_term_never_overflows_closed_forms() {
        let expr = Expression::new(vec![dice(MAX_COUNT, MAX_SIDES, Sign::Plus)]).unwrap();
        let info = expr.info();
        assert_eq!(info.max_value, MAX_COUNT as Value * MAX_SIDES as Value);
        assert_eq!(info.min_value, MAX_COUNT as Value);
    }

    #[test]
    fn info_counts_dice() {
        let expr = Expression::new(vec![
            dice(3, 6, Sign::Plus),
            dice(2, 4, Sign::Plus),
            constant(1, Sign::Minus),
        ])
        .unwrap();
        let info = expr.info();
        assert_eq!(info.dice_groups, 2);
        assert_eq!(info.total_dice, 5);
        assert_eq!(info.expression, "3d6 + 2d4 - 1");
    }
}
