//! Random sampling of dice expressions.
//!
//! All face draws of an evaluation come from a single generator stream.
//! Seeded runs pin [`ChaCha8Rng`] so that the same seed, expression and
//! iteration count reproduce bit-identical face sequences; `StdRng` makes
//! no such stability promise across releases. Unseeded runs draw their
//! state from OS entropy and are not reproducible.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::expression::{Expression, Term, Value};
use crate::stats::StatisticsSummary;

/// Upper bound on `iterations * total dice` (and on `iterations` alone)
/// per evaluation. Work beyond this fails with [`Error::ResourceLimit`]
/// instead of grinding on.
pub const MAX_FACE_DRAWS: u64 = 10_000_000;

/// The outcome of rolling an expression once.
///
/// `faces` holds one inner vector per dice term of the expression, in
/// declaration order, each listing the individual face values in the order
/// they were drawn. Constant terms contribute no faces. Immutable once
/// produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollRecord {
    pub faces: Vec<Vec<u32>>,
    /// Sum of all signed face sums and signed constants.
    pub total: Value,
}

impl RollRecord {
    /// Unsigned face sum of each dice term, in declaration order.
    pub fn group_totals(&self) -> Vec<Value> {
        self.faces
            .iter()
            .map(|group| group.iter().map(|&f| f as Value).sum())
            .collect()
    }
}

/// Rolls the expression once, drawing every face from `rng`.
///
/// The generator is passed in rather than taken from global state, so tests
/// and callers can substitute any [`Rng`] implementation.
///
/// # Errors
/// Returns [`Error::ResourceLimit`] if the running total overflows.
pub fn roll_once_with<R: Rng + ?Sized>(expr: &Expression, rng: &mut R) -> Result<RollRecord, Error> {
    let mut faces: Vec<Vec<u32>> = Vec::with_capacity(expr.dice_terms().count());
    let mut total: Value = 0;

    for term in expr.terms() {
        match term {
            Term::Dice(dice) => {
                let mut group = Vec::with_capacity(dice.count as usize);
                let mut group_sum: Value = 0;
                for _ in 0..dice.count {
                    let face: u32 = rng.gen_range(1..=dice.sides);
                    group_sum = group_sum
                        .checked_add(face as Value)
                        .ok_or_else(|| overflow(expr))?;
                    group.push(face);
                }
                let signed = group_sum
                    .checked_mul(dice.sign.factor())
                    .ok_or_else(|| overflow(expr))?;
                total = total.checked_add(signed).ok_or_else(|| overflow(expr))?;
                faces.push(group);
            }
            Term::Constant(c) => {
                total = total
                    .checked_add(c.signed_value())
                    .ok_or_else(|| overflow(expr))?;
            }
        }
    }

    Ok(RollRecord { faces, total })
}

fn overflow(expr: &Expression) -> Error {
    Error::ResourceLimit(format!("total of `{expr}` overflows i64"))
}

/// Samples dice expressions from an owned generator stream.
///
/// One `Roller` equals one pseudo-random stream; concurrent evaluations
/// must each construct their own.
#[derive(Debug, Clone)]
pub struct Roller {
    rng: ChaCha8Rng,
    seed: Option<u64>,
}

impl Roller {
    /// A roller with the given seed, or entropy-seeded when `None`.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Roller { rng, seed }
    }

    /// The seed this roller was built with, if any.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Rolls `expr` once.
    ///
    /// # Errors
    /// Returns [`Error::ResourceLimit`] on total overflow.
    pub fn roll_once(&mut self, expr: &Expression) -> Result<RollRecord, Error> {
        roll_once_with(expr, &mut self.rng)
    }

    /// Rolls `expr` for `iterations` iterations from this roller's stream.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if `iterations` is 0 and
    /// [`Error::ResourceLimit`] if `iterations * total dice`, or
    /// `iterations` itself, exceeds [`MAX_FACE_DRAWS`]. No partial batch
    /// is produced on error.
    pub fn roll_many(
        &mut self,
        expr: &Expression,
        iterations: u64,
    ) -> Result<Vec<RollRecord>, Error> {
        if iterations < 1 {
            return Err(Error::Validation("iterations must be at least 1".into()));
        }
        // a constant-only expression draws no faces but still allocates one
        // record per iteration, so iterations count against the budget too
        let draws = iterations
            .checked_mul(expr.total_dice().max(1))
            .ok_or_else(|| draw_budget(expr, iterations))?;
        if draws > MAX_FACE_DRAWS {
            return Err(draw_budget(expr, iterations));
        }

        let mut records = Vec::with_capacity(iterations as usize);
        for _ in 0..iterations {
            records.push(self.roll_once(expr)?);
        }
        Ok(records)
    }
}

fn draw_budget(expr: &Expression, iterations: u64) -> Error {
    Error::ResourceLimit(format!(
        "{iterations} iterations of `{expr}` exceed the budget of {MAX_FACE_DRAWS} face draws"
    ))
}

/// Parses nothing, rolls everything: evaluates an already parsed expression
/// `iterations` times and derives the batch statistics.
///
/// This is the core contract the CLI layer consumes. All randomness comes
/// from one stream per call; see the module docs for the generator choice.
///
/// ```
/// use dice_average::{evaluate, parser::parse};
///
/// let expr = parse("2d6").unwrap();
/// let (records, summary) = evaluate(&expr, 100, Some(42)).unwrap();
/// assert_eq!(records.len(), 100);
/// assert_eq!(summary.theoretical_mean, 7.0);
/// ```
///
/// # Errors
/// [`Error::Validation`] for `iterations == 0`, [`Error::ResourceLimit`]
/// when the draw budget is exceeded.
pub fn evaluate(
    expr: &Expression,
    iterations: u64,
    seed: Option<u64>,
) -> Result<(Vec<RollRecord>, StatisticsSummary), Error> {
    let mut roller = Roller::new(seed);
    let records = roller.roll_many(expr, iterations)?;
    let summary = StatisticsSummary::from_records(expr, &records)?;
    Ok((records, summary))
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::parser::parse;

    #[test]
    fn faces_follow_declaration_order() {
        let expr = parse("2d6 + 1d4 - 3").unwrap();
        let record = Roller::new(Some(7)).roll_once(&expr).unwrap();
        assert_eq!(record.faces.len(), 2);
        assert_eq!(record.faces[0].len(), 2);
        assert_eq!(record.faces[1].len(), 1);
    }

    #[test]
    fn group_totals_sum_each_dice_term() {
        let expr = parse("2d6 + 1d4 - 3").unwrap();
        let record = Roller::new(Some(11)).roll_once(&expr).unwrap();
        let totals = record.group_totals();
        assert_eq!(totals.len(), 2);
        assert_eq!(
            totals[0],
            record.faces[0].iter().map(|&f| f as Value).sum::<Value>()
        );
        assert_eq!(totals[1], record.faces[1][0] as Value);
    }

    #[test]
    fn total_matches_faces() {
        let expr = parse("2d8 - 1d4 + 3").unwrap();
        let mut roller = Roller::new(Some(123));
        for _ in 0..200 {
            let record = roller.roll_once(&expr).unwrap();
            let expected =
                record.faces[0].iter().map(|&f| f as Value).sum::<Value>()
                    - record.faces[1][0] as Value
                    + 3;
            assert_eq!(record.total, expected);
        }
    }

    #[test]
    fn same_seed_reproduces_records() {
        let expr = parse("2d6").unwrap();
        let (records_a, summary_a) = evaluate(&expr, 10_000, Some(42)).unwrap();
        let (records_b, summary_b) = evaluate(&expr, 10_000, Some(42)).unwrap();
        assert_eq!(records_a, records_b);
        assert_eq!(summary_a, summary_b);
    }

    #[test]
    fn different_seeds_diverge() {
        let expr = parse("10d20").unwrap();
        let a = Roller::new(Some(1)).roll_once(&expr).unwrap();
        let b = Roller::new(Some(2)).roll_once(&expr).unwrap();
        assert_ne!(a.faces, b.faces);
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let expr = parse("1d6").unwrap();
        assert!(matches!(
            Roller::new(None).roll_many(&expr, 0),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn draw_budget_is_enforced() {
        let expr = parse("1000d1000").unwrap();
        assert!(matches!(
            Roller::new(None).roll_many(&expr, 1_000_000),
            Err(Error::ResourceLimit(_))
        ));
    }

    #[test]
    fn iterations_alone_count_against_the_budget() {
        // no dice to draw, but 50 billion records must still be refused
        let expr = parse("5").unwrap();
        assert!(matches!(
            Roller::new(None).roll_many(&expr, 50_000_000_000),
            Err(Error::ResourceLimit(_))
        ));
    }

    #[test]
    fn constant_only_expression_rolls_no_dice() {
        let expr = parse("5 - 2").unwrap();
        let (records, summary) = evaluate(&expr, 50, None).unwrap();
        assert!(records.iter().all(|r| r.faces.is_empty() && r.total == 3));
        assert_eq!(summary.std_dev, 0.0);
        assert_eq!(summary.theoretical_mean, 3.0);
    }

    #[test]
    fn empirical_mean_approaches_theoretical() {
        let expr = parse("3d6 + 2").unwrap();
        let (_, summary) = evaluate(&expr, 100_000, Some(99)).unwrap();
        let theoretical = expr.theoretical_mean();
        let tolerance = theoretical.abs() * 0.02;
        assert!(
            (summary.mean - theoretical).abs() <= tolerance,
            "empirical {} vs theoretical {}",
            summary.mean,
            theoretical
        );
    }

    proptest! {
        #[test]
        fn every_face_is_in_range(
            count in 1u32..=10,
            sides in 2u32..=100,
            seed in any::<u64>()
        ) {
            let expr = parse(&format!("{count}d{sides}")).unwrap();
            let records = Roller::new(Some(seed)).roll_many(&expr, 20).unwrap();
            for record in &records {
                for &face in &record.faces[0] {
                    prop_assert!((1..=sides).contains(&face));
                }
            }
        }

        #[test]
        fn totals_stay_within_bounds(seed in any::<u64>()) {
            let expr = parse("2d8 - 1d4 + 3").unwrap();
            let records = Roller::new(Some(seed)).roll_many(&expr, 50).unwrap();
            for record in &records {
                prop_assert!(record.total >= expr.min_value());
                prop_assert!(record.total <= expr.max_value());
            }
        }
    }
}
