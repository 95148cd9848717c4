//! Exact probability distributions for dice expressions.
//!
//! Probabilities are [`BigFraction`](fraction::BigFraction)s, so repeated
//! convolution stays precise no matter how many dice are stacked; the cost
//! is slower arithmetic than floats, which is acceptable at analysis time.

use std::collections::HashMap;

use fraction::ToPrimitive;

use crate::error::Error;
use crate::expression::{AggrValue, DiceTerm, Expression, Sign, Term, Value};

/// Exact probability of one total.
pub type Prob = fraction::BigFraction;

/// Upper bound on `support span * total faces` of an exact computation.
/// Convolution work and memory both grow with these, so anything beyond
/// fails with [`Error::ResourceLimit`] before the first convolution.
pub const MAX_CONVOLUTION_WORK: u64 = 10_000_000;

type DistributionMap = HashMap<Value, Prob>;

/// The exact probability distribution of an [`Expression`], computed by
/// convoluting the uniform distributions of its dice and shifting by its
/// constants. No sampling is involved.
///
/// ```
/// use dice_average::{Distribution, parser::parse};
///
/// let dist = Distribution::of(&parse("2d6").unwrap()).unwrap();
/// assert_eq!(dist.min(), 2);
/// assert_eq!(dist.max(), 12);
/// assert_eq!(dist.mean_f64(), 7.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    /// Probability mass function, ascending by value.
    pmf: Vec<(Value, Prob)>,
}

impl Distribution {
    /// # Errors
    /// Returns [`Error::ResourceLimit`] when the expression's support and
    /// face count would exceed [`MAX_CONVOLUTION_WORK`].
    pub fn of(expr: &Expression) -> Result<Self, Error> {
        let span = (expr.max_value() - expr.min_value()) as u64 + 1;
        let faces: u64 = expr
            .dice_terms()
            .map(|d| d.count as u64 * d.sides as u64)
            .sum();
        let work = span.checked_mul(faces.max(1));
        if work.map_or(true, |w| w > MAX_CONVOLUTION_WORK) {
            return Err(Error::ResourceLimit(format!(
                "exact distribution of `{expr}` exceeds the budget of \
                 {MAX_CONVOLUTION_WORK} convolution steps"
            )));
        }

        let mut map: DistributionMap = HashMap::new();
        map.insert(0, Prob::new(1u64, 1u64));

        for term in expr.terms() {
            match term {
                Term::Dice(dice) => {
                    let die = single_die(dice);
                    for _ in 0..dice.count {
                        map = convolute(&map, &die);
                    }
                }
                Term::Constant(c) => {
                    map = map
                        .into_iter()
                        .map(|(v, p)| (v + c.signed_value(), p))
                        .collect();
                }
            }
        }

        let mut pmf: Vec<(Value, Prob)> = map.into_iter().collect();
        pmf.sort_by_key(|&(v, _)| v);
        Ok(Distribution { pmf })
    }

    /// Value/probability pairs in ascending value order.
    pub fn pmf(&self) -> &[(Value, Prob)] {
        &self.pmf
    }

    pub fn min(&self) -> Value {
        self.pmf.first().map(|&(v, _)| v).unwrap_or(0)
    }

    pub fn max(&self) -> Value {
        self.pmf.last().map(|&(v, _)| v).unwrap_or(0)
    }

    /// Exact probability of `value`, zero for impossible totals.
    pub fn probability(&self, value: Value) -> Prob {
        self.pmf
            .binary_search_by_key(&value, |&(v, _)| v)
            .map(|i| self.pmf[i].1.clone())
            .unwrap_or_else(|_| Prob::new(0u64, 1u64))
    }

    /// Exact mean of the distribution. Always equals the closed-form
    /// [`Expression::theoretical_mean_exact`] of the source expression.
    pub fn mean(&self) -> AggrValue {
        self.pmf
            .iter()
            .fold(AggrValue::from(0), |acc, (v, p)| {
                acc + p.clone() * AggrValue::from(*v)
            })
    }

    pub fn mean_f64(&self) -> f64 {
        self.mean().to_f64().unwrap_or(f64::NAN)
    }

    /// Exact variance, `Σ p · (v - mean)²`.
    pub fn variance(&self) -> AggrValue {
        let mean = self.mean();
        self.pmf.iter().fold(AggrValue::from(0), |acc, (v, p)| {
            let value = AggrValue::from(*v);
            let deviation = &value - &mean;
            acc + (&deviation * &deviation) * p.clone()
        })
    }

    pub fn std_dev_f64(&self) -> f64 {
        self.variance().to_f64().map(f64::sqrt).unwrap_or(f64::NAN)
    }

    /// `Σ p · (v - mean)^k`, exact.
    fn central_moment(&self, k: u32) -> AggrValue {
        let mean = self.mean();
        self.pmf.iter().fold(AggrValue::from(0), |acc, (v, p)| {
            let value = AggrValue::from(*v);
            let deviation = &value - &mean;
            let mut power = AggrValue::from(1);
            for _ in 0..k {
                power = &power * &deviation;
            }
            acc + power * p.clone()
        })
    }

    /// Third standardized moment, `Σ p · ((v - mean) / σ)³`; 0 for a
    /// degenerate distribution. Symmetric distributions have skewness 0.
    pub fn skewness(&self) -> f64 {
        let variance = self.variance().to_f64().unwrap_or(0.0);
        if variance == 0.0 {
            return 0.0;
        }
        let m3 = self.central_moment(3).to_f64().unwrap_or(f64::NAN);
        m3 / variance.powf(1.5)
    }

    /// Excess kurtosis, `Σ p · ((v - mean) / σ)⁴ - 3`; 0 for a degenerate
    /// distribution.
    pub fn kurtosis(&self) -> f64 {
        let variance = self.variance().to_f64().unwrap_or(0.0);
        if variance == 0.0 {
            return 0.0;
        }
        let m4 = self.central_moment(4).to_f64().unwrap_or(f64::NAN);
        m4 / (variance * variance) - 3.0
    }

    /// Cumulative distribution, ascending by value.
    pub fn cumulative(&self) -> Vec<(Value, Prob)> {
        let mut acc = Prob::new(0u64, 1u64);
        self.pmf
            .iter()
            .map(|(v, p)| {
                acc += p.clone();
                (*v, acc.clone())
            })
            .collect()
    }

    /// Smallest value whose cumulative probability reaches `p`.
    /// `None` when `p` is outside `[0, 1]`.
    pub fn percentile(&self, p: f64) -> Option<Value> {
        if !(0.0..=1.0).contains(&p) {
            return None;
        }
        let mut acc = 0.0;
        for (v, prob) in &self.pmf {
            acc += prob.to_f64().unwrap_or(0.0);
            if acc >= p {
                return Some(*v);
            }
        }
        self.pmf.last().map(|&(v, _)| v)
    }

    /// The median, the 50th percentile of the distribution.
    pub fn median(&self) -> Value {
        self.percentile(0.5).unwrap_or(0)
    }

    /// The most probable value or values, ascending.
    pub fn modes(&self) -> Vec<Value> {
        let mut best: Option<&Prob> = None;
        for (_, p) in &self.pmf {
            match best {
                Some(b) if p <= b => {}
                _ => best = Some(p),
            }
        }
        match best {
            Some(best) => self
                .pmf
                .iter()
                .filter(|(_, p)| p == best)
                .map(|&(v, _)| v)
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Distribution of one die of a dice term: uniform over `[1, sides]`,
/// negated for minus-signed terms.
fn single_die(dice: &DiceTerm) -> DistributionMap {
    let prob = Prob::new(1u64, dice.sides as u64);
    (1..=dice.sides as Value)
        .map(|face| match dice.sign {
            Sign::Plus => (face, prob.clone()),
            Sign::Minus => (-face, prob.clone()),
        })
        .collect()
}

fn convolute(a: &DistributionMap, b: &DistributionMap) -> DistributionMap {
    let mut out = DistributionMap::new();
    for (v1, p1) in a {
        for (v2, p2) in b {
            let p = p1 * p2;
            match out.entry(v1 + v2) {
                std::collections::hash_map::Entry::Vacant(e) => {
                    e.insert(p);
                }
                std::collections::hash_map::Entry::Occupied(mut e) => {
                    *e.get_mut() += p;
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::parser::parse;

    fn dist(input: &str) -> Distribution {
        Distribution::of(&parse(input).unwrap()).unwrap()
    }

    #[test]
    fn two_d6_distribution() {
        let d = dist("2d6");
        assert_eq!(d.min(), 2);
        assert_eq!(d.max(), 12);
        assert_eq!(d.probability(2), Prob::new(1u64, 36u64));
        assert_eq!(d.probability(7), Prob::new(6u64, 36u64));
        assert_eq!(d.probability(13), Prob::new(0u64, 1u64));
        assert_eq!(d.modes(), vec![7]);
        assert_eq!(d.median(), 7);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let d = dist("2d6 + 1d4 - 2");
        let total = d
            .pmf()
            .iter()
            .fold(Prob::new(0u64, 1u64), |acc, (_, p)| acc + p.clone());
        assert_eq!(total, Prob::new(1u64, 1u64));
    }

    #[test]
    fn constant_shift_moves_the_support() {
        let d = dist("1d6 + 3");
        assert_eq!(d.min(), 4);
        assert_eq!(d.max(), 9);
        assert_eq!(d.probability(4), Prob::new(1u64, 6u64));
    }

    #[test]
    fn subtracted_die_negates_the_support() {
        let d = dist("1d4 - 1d4");
        assert_eq!(d.min(), -3);
        assert_eq!(d.max(), 3);
        assert_eq!(d.probability(0), Prob::new(4u64, 16u64));
        assert_eq!(d.mean_f64(), 0.0);
    }

    #[test]
    fn constant_only_distribution_is_a_point_mass() {
        let d = dist("5");
        assert_eq!(d.pmf(), &[(5, Prob::new(1u64, 1u64))]);
        assert_eq!(d.std_dev_f64(), 0.0);
    }

    #[test]
    fn variance_of_one_d6() {
        // E[X^2] - E[X]^2 for 1d6 = 91/6 - 49/4 = 35/12
        let d = dist("1d6");
        assert_eq!(d.variance(), AggrValue::new(35u64, 12u64));
    }

    #[test]
    fn uniform_die_modes_are_all_faces() {
        let d = dist("1d4");
        assert_eq!(d.modes(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn symmetric_distributions_have_zero_skewness() {
        assert_eq!(dist("2d6").skewness(), 0.0);
        assert_eq!(dist("3d4 + 5").skewness(), 0.0);
        assert_eq!(dist("1d6 - 1d6").skewness(), 0.0);
    }

    #[test]
    fn kurtosis_of_a_coin_flip_is_minus_two() {
        // a two-point uniform is the flattest possible distribution
        assert_eq!(dist("1d2").kurtosis(), -2.0);
    }

    #[test]
    fn degenerate_distribution_has_zero_moments() {
        let d = dist("5");
        assert_eq!(d.skewness(), 0.0);
        assert_eq!(d.kurtosis(), 0.0);
    }

    #[test]
    fn oversized_expressions_are_rejected() {
        let expr = parse("1000d1000").unwrap();
        assert!(matches!(
            Distribution::of(&expr),
            Err(Error::ResourceLimit(_))
        ));
        let wide = parse("1d1000000").unwrap();
        assert!(matches!(
            Distribution::of(&wide),
            Err(Error::ResourceLimit(_))
        ));
    }

    #[test]
    fn cumulative_ends_at_one() {
        let d = dist("2d4 + 1");
        let cdf = d.cumulative();
        assert_eq!(cdf.last().unwrap().1, Prob::new(1u64, 1u64));
        assert_eq!(d.percentile(1.0), Some(d.max()));
        assert_eq!(d.percentile(1.5), None);
    }

    proptest! {
        #[test]
        fn exact_mean_matches_closed_form(
            count in 1u32..=4,
            sides in 2u32..=12,
            modifier in 0i64..=20
        ) {
            let expr = parse(&format!("{count}d{sides} + {modifier}")).unwrap();
            let d = Distribution::of(&expr).unwrap();
            prop_assert_eq!(d.mean(), expr.theoretical_mean_exact());
        }
    }
}
